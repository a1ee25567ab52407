use proc_macro::TokenStream;
use syn::{LitInt, parse_macro_input};

mod mapping;

/// Generates the `N`-ary dispatch entry points `loop_N`, `loop_icount_N`, `tile_N` and
/// `tile_icount_N`. Expects to be expanded inside `weft::mapping`.
#[proc_macro]
pub fn build_mapping(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as LitInt);
    let expanded = match mapping::build_mapping(input) {
        Ok(expanded) => expanded,
        Err(err) => err.to_compile_error(),
    };
    expanded.into()
}
