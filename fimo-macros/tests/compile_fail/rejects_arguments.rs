use fimo_macros::fimo_module;

struct Export;

#[fimo_module(oops)]
const EXPORT: Export = Export;

fn main() {}
