//! Proc macros supporting module export declarations.
//!
//! Currently a single attribute macro, [`macro@fimo_module`].

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemConst};

/// Turns a `const` built from `ModuleExportBuilder` into a function
/// returning a `&'static ModuleExport`, computed once and cached.
///
/// ```ignore
/// #[fimo_module]
/// const EXPORT: ModuleExport = ModuleExportBuilder::new("greeter")
///     .version(Version::new(0, 1, 0))
///     .constructor(construct)
///     .destructor(destroy)
///     .build();
/// ```
///
/// expands to a function `EXPORT() -> &'static ModuleExport` that builds
/// the export exactly once (via `std::sync::OnceLock`) and hands back a
/// `'static` reference, ready to be placed in the slice passed to
/// `LoadingSet::append_modules`.
#[proc_macro_attribute]
pub fn fimo_module(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(
            proc_macro2::Span::call_site(),
            "fimo_module takes no arguments",
        )
        .to_compile_error()
        .into();
    }

    let item = parse_macro_input!(item as ItemConst);
    let ItemConst {
        attrs,
        vis,
        ident,
        ty,
        expr,
        ..
    } = item;

    let expanded = quote! {
        #(#attrs)*
        #[must_use]
        #vis fn #ident() -> &'static #ty {
            static __FIMO_MODULE_EXPORT_CELL: ::std::sync::OnceLock<#ty> = ::std::sync::OnceLock::new();
            __FIMO_MODULE_EXPORT_CELL.get_or_init(|| #expr)
        }
    };
    TokenStream::from(expanded)
}
