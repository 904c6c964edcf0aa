//! Procedural macros for flowrunner.
//!
//! - `#[flowrunner_macros::block]` — attribute macro applied to a
//!   block's `impl` block. Enumerates `process`'s parameter list to
//!   derive port count and element types, detects the optional
//!   `initialize`/`deinitialize`/`set_rate`/`stop` hooks, and treats
//!   every other method as part of the block's asynchronous control
//!   surface.
//!
//! # Example
//!
//! ```ignore
//! use flowrunner::prelude::*;
//!
//! pub struct Gain {
//!     block: BlockHandle,
//!     factor: f32,
//! }
//!
//! #[flowrunner_macros::block]
//! impl Gain {
//!     fn process(&mut self, input: &[f32], output: &mut [f32]) -> ProcessResult {
//!         let n = input.len().min(output.len());
//!         for i in 0..n {
//!             output[i] = input[i] * self.factor;
//!         }
//!         Ok(ProcessOutcome::produced([n], [n]))
//!     }
//!
//!     fn set_gain(&mut self, factor: f32) -> anyhow::Result<()> {
//!         self.factor = factor;
//!         Ok(())
//!     }
//! }
//! ```
//!
//! Generates an `impl BlockOps for Gain` carrying a `'static`
//! `StaticShape` (ports `in1`/`out1`, a trampoline dispatching
//! `process`, and a control entry for `set_gain`) plus `impl
//! HasBlockHandle for Gain` reading the struct's canonical `block`
//! field.

mod analysis;
mod codegen;

use proc_macro::TokenStream;
use syn::{parse_macro_input, ItemImpl};

use analysis::PortNames;

#[proc_macro_attribute]
pub fn block(attr: TokenStream, item: TokenStream) -> TokenStream {
    let item_impl = parse_macro_input!(item as ItemImpl);
    let names = parse_macro_input!(attr as PortNames);

    let analysis = match analysis::analyze(&item_impl, &names) {
        Ok(a) => a,
        Err(err) => {
            let mut out = TokenStream::from(err.to_compile_error());
            out.extend(TokenStream::from(quote::quote! { #item_impl }));
            return out;
        }
    };

    let generated = codegen::generate(&analysis);

    let mut out = TokenStream::from(quote::quote! { #item_impl });
    out.extend(TokenStream::from(generated));
    out
}
