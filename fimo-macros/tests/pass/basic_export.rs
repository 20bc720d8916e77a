use fimo_macros::fimo_module;

struct Export {
    name: &'static str,
}

struct Builder {
    name: &'static str,
}

impl Builder {
    fn new(name: &'static str) -> Self {
        Self { name }
    }

    fn build(self) -> Export {
        Export { name: self.name }
    }
}

#[fimo_module]
const EXPORT: Export = Builder::new("greeter").build();

fn main() {
    assert_eq!(EXPORT().name, "greeter");
    // Calling twice must hand back the same cached instance.
    assert!(std::ptr::eq(EXPORT(), EXPORT()));
}
