//! Parses the `impl` block annotated with `#[flowrunner_macros::block]`
//! into the facts [`super::codegen`] needs: port order and element
//! types derived from `process`'s parameter list, which optional hooks
//! are present, and which remaining methods form the control surface
//! which remaining methods form the control surface.

use syn::{FnArg, ImplItem, ImplItemFn, ItemImpl, ReturnType, Type};

pub struct PortInfo {
    pub name: String,
    pub element_ty: Type,
}

pub struct ControlInfo {
    pub method: syn::Ident,
    /// `None` for a zero-argument control method (erased as `()`).
    pub arg_ty: Option<Type>,
}

pub struct BlockAnalysis {
    pub self_ty: Type,
    pub inputs: Vec<PortInfo>,
    pub outputs: Vec<PortInfo>,
    pub has_initialize: bool,
    pub has_deinitialize: bool,
    pub has_set_rate: bool,
    pub has_stop: bool,
    pub controls: Vec<ControlInfo>,
}

/// Explicit port names supplied via `#[flowrunner_macros::block(inputs =
/// ["left", "right"], outputs = ["out"])]`; empty when the author relies
/// on the default `in1..inN` / `out1..outM` naming.
#[derive(Default)]
pub struct PortNames {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl syn::parse::Parse for PortNames {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        let mut names = PortNames::default();
        if input.is_empty() {
            return Ok(names);
        }
        let pairs = syn::punctuated::Punctuated::<PortNameArg, syn::Token![,]>::parse_terminated(input)?;
        for pair in pairs {
            match pair.key.to_string().as_str() {
                "inputs" => names.inputs = pair.values,
                "outputs" => names.outputs = pair.values,
                other => {
                    return Err(syn::Error::new(
                        pair.key.span(),
                        format!("unknown `block` attribute key `{other}`, expected `inputs` or `outputs`"),
                    ))
                }
            }
        }
        Ok(names)
    }
}

struct PortNameArg {
    key: syn::Ident,
    values: Vec<String>,
}

impl syn::parse::Parse for PortNameArg {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        let key: syn::Ident = input.parse()?;
        input.parse::<syn::Token![=]>()?;
        let content;
        syn::bracketed!(content in input);
        let lits =
            syn::punctuated::Punctuated::<syn::LitStr, syn::Token![,]>::parse_terminated(&content)?;
        Ok(PortNameArg {
            key,
            values: lits.into_iter().map(|l| l.value()).collect(),
        })
    }
}

const HOOK_NAMES: &[&str] = &["initialize", "deinitialize", "set_rate", "stop"];

pub fn analyze(item: &ItemImpl, names: &PortNames) -> syn::Result<BlockAnalysis> {
    let self_ty = (*item.self_ty).clone();

    let process = item
        .items
        .iter()
        .find_map(|i| match i {
            ImplItem::Fn(f) if f.sig.ident == "process" => Some(f),
            _ => None,
        })
        .ok_or_else(|| syn::Error::new_spanned(&item.self_ty, "block impl must define `process`"))?;

    let (inputs, outputs) = classify_ports(process, names)?;

    let has_initialize = find_method(item, "initialize").is_some();
    let has_deinitialize = find_method(item, "deinitialize").is_some();
    let has_set_rate = find_method(item, "set_rate").is_some();
    let has_stop = find_method(item, "stop").is_some();

    let mut controls = Vec::new();
    for i in &item.items {
        let ImplItem::Fn(f) = i else { continue };
        let name = f.sig.ident.to_string();
        if name == "process" || HOOK_NAMES.contains(&name.as_str()) {
            continue;
        }
        controls.push(analyze_control(f)?);
    }

    Ok(BlockAnalysis {
        self_ty,
        inputs,
        outputs,
        has_initialize,
        has_deinitialize,
        has_set_rate,
        has_stop,
        controls,
    })
}

fn find_method<'a>(item: &'a ItemImpl, name: &str) -> Option<&'a ImplItemFn> {
    item.items.iter().find_map(|i| match i {
        ImplItem::Fn(f) if f.sig.ident == name => Some(f),
        _ => None,
    })
}

fn classify_ports(
    process: &ImplItemFn,
    names: &PortNames,
) -> syn::Result<(Vec<PortInfo>, Vec<PortInfo>)> {
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();

    for arg in process.sig.inputs.iter().skip(1) {
        let FnArg::Typed(pat_ty) = arg else {
            continue;
        };
        let Type::Reference(reference) = pat_ty.ty.as_ref() else {
            return Err(syn::Error::new_spanned(
                &pat_ty.ty,
                "process() parameters must be `&[T]` (input) or `&mut [T]` (output)",
            ));
        };
        let Type::Slice(slice) = reference.elem.as_ref() else {
            return Err(syn::Error::new_spanned(
                &pat_ty.ty,
                "process() parameters must be slice references, e.g. `&[f32]` or `&mut [f32]`",
            ));
        };
        let element_ty = (*slice.elem).clone();

        if reference.mutability.is_some() {
            let name = names
                .outputs
                .get(outputs.len())
                .cloned()
                .unwrap_or_else(|| format!("out{}", outputs.len() + 1));
            outputs.push(PortInfo { name, element_ty });
        } else {
            let name = names
                .inputs
                .get(inputs.len())
                .cloned()
                .unwrap_or_else(|| format!("in{}", inputs.len() + 1));
            inputs.push(PortInfo { name, element_ty });
        }
    }

    Ok((inputs, outputs))
}

fn analyze_control(f: &ImplItemFn) -> syn::Result<ControlInfo> {
    let arg_ty = f
        .sig
        .inputs
        .iter()
        .skip(1)
        .find_map(|arg| match arg {
            FnArg::Typed(pat_ty) => Some((*pat_ty.ty).clone()),
            FnArg::Receiver(_) => None,
        });

    if matches!(f.sig.output, ReturnType::Default) {
        return Err(syn::Error::new_spanned(
            &f.sig,
            "control methods must return `anyhow::Result<T>`",
        ));
    }

    // At most one non-self argument: the control surface is invoked with
    // a single type-erased `args_tuple` value; callers that
    // need several values pass a tuple as that one argument.
    let extra_args = f.sig.inputs.iter().skip(1).count();
    if extra_args > 1 {
        return Err(syn::Error::new_spanned(
            &f.sig,
            "control methods take at most one argument; pass a tuple for multiple values",
        ));
    }

    Ok(ControlInfo {
        method: f.sig.ident.clone(),
        arg_ty,
    })
}
