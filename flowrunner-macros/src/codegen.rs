//! Emits the trampolines, `StaticShape`, and `BlockOps` impl for one
//! block type from its [`crate::analysis::BlockAnalysis`]
//! steps 3-5).

use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::analysis::BlockAnalysis;

pub fn generate(analysis: &BlockAnalysis) -> TokenStream {
    let self_ty = &analysis.self_ty;

    let input_names: Vec<&str> = analysis.inputs.iter().map(|p| p.name.as_str()).collect();
    let output_names: Vec<&str> = analysis.outputs.iter().map(|p| p.name.as_str()).collect();
    let input_tys: Vec<&syn::Type> = analysis.inputs.iter().map(|p| &p.element_ty).collect();
    let output_tys: Vec<&syn::Type> = analysis.outputs.iter().map(|p| &p.element_ty).collect();

    let mut arg_exprs: Vec<TokenStream> = Vec::new();
    for (i, ty) in input_tys.iter().enumerate() {
        arg_exprs.push(quote! { unsafe { inputs[#i].typed::<#ty>() } });
    }
    for (j, ty) in output_tys.iter().enumerate() {
        arg_exprs.push(quote! { unsafe { outputs[#j].typed_mut::<#ty>() } });
    }

    let process_trampoline = quote! {
        fn __flowrunner_process(
            ptr: *mut (),
            inputs: &[::flowrunner::block::RawSlice],
            outputs: &mut [::flowrunner::block::RawSliceMut],
        ) -> ::flowrunner::block::ProcessResult {
            let this = unsafe { &mut *(ptr as *mut #self_ty) };
            this.process(#(#arg_exprs),*)
        }
    };

    let initialize_trampoline = analysis.has_initialize.then(|| quote! {
        fn __flowrunner_initialize(ptr: *mut (), alloc: &::flowrunner::block::Allocator) -> ::anyhow::Result<()> {
            let this = unsafe { &mut *(ptr as *mut #self_ty) };
            this.initialize(alloc)
        }
    });
    let deinitialize_trampoline = analysis.has_deinitialize.then(|| quote! {
        fn __flowrunner_deinitialize(ptr: *mut (), alloc: &::flowrunner::block::Allocator) -> ::anyhow::Result<()> {
            let this = unsafe { &mut *(ptr as *mut #self_ty) };
            this.deinitialize(alloc)
        }
    });
    let set_rate_trampoline = analysis.has_set_rate.then(|| quote! {
        fn __flowrunner_set_rate(ptr: *mut (), upstream_rate: f64) -> f64 {
            let this = unsafe { &mut *(ptr as *mut #self_ty) };
            this.set_rate(upstream_rate)
        }
    });
    let stop_trampoline = analysis.has_stop.then(|| quote! {
        fn __flowrunner_stop(ptr: *mut ()) {
            let this = unsafe { &mut *(ptr as *mut #self_ty) };
            this.stop()
        }
    });

    let initialize_field = trampoline_field(analysis.has_initialize, quote!(__flowrunner_initialize));
    let deinitialize_field = trampoline_field(analysis.has_deinitialize, quote!(__flowrunner_deinitialize));
    let set_rate_field = trampoline_field(analysis.has_set_rate, quote!(__flowrunner_set_rate));
    let stop_field = trampoline_field(analysis.has_stop, quote!(__flowrunner_stop));

    let mut control_fns = Vec::new();
    let mut control_entries = Vec::new();
    for control in &analysis.controls {
        let method = &control.method;
        let trampoline_ident = format_ident!("__flowrunner_control_{}", method);
        let method_name = method.to_string();

        let body = match &control.arg_ty {
            Some(arg_ty) => quote! {
                let arg = *args.downcast::<#arg_ty>()
                    .map_err(|_| ::anyhow::anyhow!(concat!("bad argument type for control method '", #method_name, "'")))?;
                let ret = this.#method(arg)?;
            },
            None => quote! {
                args.downcast::<()>()
                    .map_err(|_| ::anyhow::anyhow!(concat!("bad argument type for control method '", #method_name, "'")))?;
                let ret = this.#method()?;
            },
        };

        control_fns.push(quote! {
            fn #trampoline_ident(
                ptr: *mut (),
                args: ::std::boxed::Box<dyn ::std::any::Any + Send>,
            ) -> ::anyhow::Result<::std::boxed::Box<dyn ::std::any::Any + Send>> {
                let this = unsafe { &mut *(ptr as *mut #self_ty) };
                #body
                Ok(::std::boxed::Box::new(ret))
            }
        });
        control_entries.push(quote! {
            ::flowrunner::block::ControlEntry { name: #method_name, call: #trampoline_ident }
        });
    }

    let type_name = quote!(#self_ty).to_string();

    quote! {
        impl ::flowrunner::block::BlockOps for #self_ty {
            fn shape() -> &'static ::flowrunner::block::StaticShape {
                #process_trampoline
                #initialize_trampoline
                #deinitialize_trampoline
                #set_rate_trampoline
                #stop_trampoline
                #( #control_fns )*

                // `const`, not `static`: a `static` initializer may only
                // refer to other items by value if those items are
                // `const` (E0013).
                const CONTROLS: &[::flowrunner::block::ControlEntry] = &[ #( #control_entries ),* ];
                const INPUTS: &[::flowrunner::block::PortSpec] = &[
                    #( ::flowrunner::block::PortSpec {
                        name: #input_names,
                        element: ::flowrunner::block::ElementType::of::<#input_tys>(),
                    } ),*
                ];
                const OUTPUTS: &[::flowrunner::block::PortSpec] = &[
                    #( ::flowrunner::block::PortSpec {
                        name: #output_names,
                        element: ::flowrunner::block::ElementType::of::<#output_tys>(),
                    } ),*
                ];
                static SHAPE: ::flowrunner::block::StaticShape = ::flowrunner::block::StaticShape {
                    type_name: #type_name,
                    inputs: INPUTS,
                    outputs: OUTPUTS,
                    process: __flowrunner_process,
                    initialize: #initialize_field,
                    deinitialize: #deinitialize_field,
                    set_rate: #set_rate_field,
                    stop: #stop_field,
                    controls: CONTROLS,
                };
                &SHAPE
            }
        }

        impl ::flowrunner::block::HasBlockHandle for #self_ty {
            fn block_handle(&self) -> &::flowrunner::block::BlockHandle {
                &self.block
            }
        }
    }
}

fn trampoline_field(present: bool, ident: TokenStream) -> TokenStream {
    if present {
        quote! { Some(#ident) }
    } else {
        quote! { None }
    }
}
