use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemFn};

// Wraps a matcher method returning `Result<bool, E>`.
//
// Before the body runs, `self.save_state()?` pushes a snapshot of the parser's position.
// If the body produced `Ok(true)` the snapshot is released with `self.release_state()`,
// otherwise `self.restore_state()` rewinds the parser to where it was on entry.
//
// This allows a caller to try one alternative, automatically backtrack, try the next, etc.
#[proc_macro_attribute]
pub fn restore_state_unless_matched(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    let attrs = &input.attrs;
    let name = &input.sig.ident;
    let visibility = &input.vis;
    let generics = &input.sig.generics;
    let inputs = &input.sig.inputs;
    let output = &input.sig.output;
    let body = &input.block;

    let expanded = quote! {
        #(#attrs)*
        #visibility fn #name #generics(#inputs) #output {
            self.save_state()?;
            let result = (|| #output #body)();
            if matches!(result, Ok(true)) {
                self.release_state();
            } else {
                self.restore_state();
            }
            result
        }
    };

    TokenStream::from(expanded)
}
