//! Provides derive macros for `synth::HasDependencies`.
use quote::{format_ident, quote};
use syn::{Attribute, Data, DataEnum, DataStruct, DeriveInput, Fields};

/// Returns `true` if the field carries `#[synth(skip)]`.
fn is_skipped(attrs: &[Attribute]) -> syn::Result<bool> {
    let mut skip = false;
    for att in attrs.iter() {
        if att.path().is_ident("synth") {
            att.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    skip = true;
                    Ok(())
                } else {
                    Err(meta.error(format!(
                        "unsupported field attribute {:?} - must be 'skip'",
                        meta.path
                            .get_ident()
                            .map(|id| id.to_string())
                            .unwrap_or("unknown".to_string())
                    )))
                }
            })?;
        }
    }
    Ok(skip)
}

/// Folds the dependencies of the given field accessors into one expression.
fn merge_all(accessors: Vec<proc_macro2::TokenStream>) -> proc_macro2::TokenStream {
    quote! {
        synth::Dependencies::default()
            #(.merge(synth::HasDependencies::dependencies(#accessors)))*
    }
}

fn struct_body(data: &DataStruct) -> syn::Result<proc_macro2::TokenStream> {
    let mut accessors = vec![];
    match &data.fields {
        Fields::Named(named) => {
            for field in named.named.iter() {
                if is_skipped(&field.attrs)? {
                    continue;
                }
                let ident = &field.ident;
                accessors.push(quote! { &self.#ident });
            }
        }
        Fields::Unnamed(unnamed) => {
            for (i, field) in unnamed.unnamed.iter().enumerate() {
                if is_skipped(&field.attrs)? {
                    continue;
                }
                let index = syn::Index::from(i);
                accessors.push(quote! { &self.#index });
            }
        }
        Fields::Unit => {}
    }
    Ok(merge_all(accessors))
}

fn enum_body(data: &DataEnum) -> syn::Result<proc_macro2::TokenStream> {
    let mut arms = vec![];
    for variant in data.variants.iter() {
        let ident = &variant.ident;
        let arm = match &variant.fields {
            Fields::Named(named) => {
                let mut bindings = vec![];
                let mut accessors = vec![];
                for field in named.named.iter() {
                    let name = &field.ident;
                    if is_skipped(&field.attrs)? {
                        bindings.push(quote! { #name: _ });
                    } else {
                        bindings.push(quote! { #name });
                        accessors.push(quote! { #name });
                    }
                }
                let body = merge_all(accessors);
                quote! { Self::#ident { #(#bindings),* } => #body, }
            }
            Fields::Unnamed(unnamed) => {
                let mut bindings = vec![];
                let mut accessors = vec![];
                for (i, field) in unnamed.unnamed.iter().enumerate() {
                    if is_skipped(&field.attrs)? {
                        bindings.push(quote! { _ });
                    } else {
                        let name = format_ident!("field_{i}");
                        bindings.push(quote! { #name });
                        accessors.push(quote! { #name });
                    }
                }
                let body = merge_all(accessors);
                quote! { Self::#ident(#(#bindings),*) => #body, }
            }
            Fields::Unit => quote! { Self::#ident => synth::Dependencies::default(), },
        };
        arms.push(arm);
    }
    if arms.is_empty() {
        return Ok(quote! { synth::Dependencies::default() });
    }
    Ok(quote! {
        match self {
            #(#arms)*
        }
    })
}

fn field_types(data: &Data) -> Vec<&syn::Type> {
    let fields: Vec<&Fields> = match data {
        Data::Struct(s) => vec![&s.fields],
        Data::Enum(e) => e.variants.iter().map(|v| &v.fields).collect(),
        Data::Union(_) => vec![],
    };
    fields
        .into_iter()
        .flat_map(|fields| fields.iter().map(|field| &field.ty))
        .collect()
}

/// Derives `HasDependencies` by merging the dependencies of every field.
///
/// Fields marked `#[synth(skip)]` contribute nothing.
#[proc_macro_derive(HasDependencies, attributes(synth))]
pub fn derive_has_dependencies(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input: DeriveInput = syn::parse_macro_input!(input);
    let name = &input.ident;

    let body = match &input.data {
        Data::Struct(data) => struct_body(data),
        Data::Enum(data) => enum_body(data),
        Data::Union(_) => Err(syn::Error::new(
            name.span(),
            "deriving HasDependencies is not supported for unions".to_string(),
        )),
    };
    let body = match body {
        Ok(body) => body,
        Err(e) => return e.into_compile_error().into(),
    };

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let where_constraints: Vec<_> = if input.generics.params.is_empty() {
        vec![]
    } else {
        field_types(&input.data)
            .into_iter()
            .map(|ty| quote! { #ty: synth::HasDependencies })
            .collect()
    };
    let where_clause = match where_clause {
        Some(clause) => {
            let predicates = &clause.predicates;
            quote! { where #predicates, #(#where_constraints),* }
        }
        None if where_constraints.is_empty() => quote! {},
        None => quote! { where #(#where_constraints),* },
    };

    quote! {
        impl #impl_generics synth::HasDependencies for #name #ty_generics #where_clause {
            fn dependencies(&self) -> synth::Dependencies {
                #body
            }
        }
    }
    .into()
}
