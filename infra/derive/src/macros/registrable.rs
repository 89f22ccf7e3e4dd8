use proc_macro2::{TokenStream, TokenTree};
use quote::quote;
use syn::ext::IdentExt;
use syn::{Attribute, Data, DeriveInput, Field, Fields, Ident, LitStr, Path};

#[derive(Default)]
struct RegistrableArgs {
    type_id: Option<LitStr>,
    extends: Vec<Path>,
    constructors: Vec<Ident>,
    params: Option<Vec<LitStr>>,
}

#[derive(Default)]
struct SerdeFieldInfo {
    rename: Option<LitStr>,
    skipped: bool,
}

pub fn expand_derive(input: DeriveInput) -> TokenStream {
    match expand(&input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Registrable cannot be derived for generic types",
        ));
    }

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(name, "Registrable can only be derived for structs"));
    };

    let args = parse_args(&input.attrs)?;
    let body = construct_body(input, &data.fields, args.params.as_deref())?;

    let type_id = args.type_id.as_ref().map_or_else(
        || quote! { ::core::option::Option::None },
        |lit| quote! { ::core::option::Option::Some(#lit) },
    );
    let extends = &args.extends;
    let constructors = &args.constructors;
    let constructor_names = constructors.iter().map(|ident| ident.unraw().to_string());

    Ok(quote! {
        #[automatically_derived]
        impl ::dessinemoi::Registrable for #name {
            const TYPE_ID: ::core::option::Option<&'static str> = #type_id;

            fn construct(
                args: ::dessinemoi::Arguments,
            ) -> ::core::result::Result<Self, ::dessinemoi::ConstructError> {
                #body
            }

            fn describe(ty: &mut ::dessinemoi::TypeBuilder<Self>) {
                let _ = &ty;
                #( ty.extends::<#extends>(); )*
                #( ty.constructor(#constructor_names, Self::#constructors); )*
            }
        }
    })
}

fn parse_args(attrs: &[Attribute]) -> syn::Result<RegistrableArgs> {
    let mut args = RegistrableArgs::default();

    for attr in attrs {
        if !attr.path().is_ident("registrable") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("type_id") {
                if args.type_id.is_some() {
                    return Err(meta.error("duplicate `type_id = \"...\"` argument"));
                }
                let lit: LitStr = meta.value()?.parse()?;
                if lit.value().is_empty() {
                    return Err(syn::Error::new_spanned(lit, "`type_id` must be non-empty"));
                }
                args.type_id = Some(lit);
                return Ok(());
            }
            if meta.path.is_ident("extends") {
                return meta.parse_nested_meta(|inner| {
                    args.extends.push(inner.path);
                    Ok(())
                });
            }
            if meta.path.is_ident("constructors") {
                return meta.parse_nested_meta(|inner| {
                    let ident = inner.path.require_ident()?.clone();
                    args.constructors.push(ident);
                    Ok(())
                });
            }
            if meta.path.is_ident("params") {
                let mut params = Vec::new();
                meta.parse_nested_meta(|inner| {
                    let ident = inner.path.require_ident()?;
                    params.push(LitStr::new(&ident.unraw().to_string(), ident.span()));
                    Ok(())
                })?;
                args.params = Some(params);
                return Ok(());
            }
            Err(meta.error(
                "expected `type_id = \"...\"`, `extends(...)`, `constructors(...)` or `params(...)`",
            ))
        })?;
    }

    Ok(args)
}

fn construct_body(
    input: &DeriveInput,
    fields: &Fields,
    params: Option<&[LitStr]>,
) -> syn::Result<TokenStream> {
    match fields {
        Fields::Named(named) => {
            let params = match params {
                Some(params) => params.to_vec(),
                None => {
                    if has_container_rename(&input.attrs)? {
                        return Err(syn::Error::new_spanned(
                            &input.ident,
                            "containers using `rename_all` must list `params(...)` explicitly",
                        ));
                    }
                    named_params(named.named.iter())?
                },
            };
            Ok(quote! { args.bind::<Self>(&[#(#params),*]) })
        },
        Fields::Unnamed(unnamed) if unnamed.unnamed.len() == 1 => {
            Ok(quote! { args.bind_single::<Self>() })
        },
        Fields::Unnamed(_) => Ok(quote! { args.bind_sequence::<Self>() }),
        Fields::Unit => Ok(quote! {
            args.expect_empty()?;
            ::core::result::Result::Ok(Self)
        }),
    }
}

fn named_params<'a>(fields: impl Iterator<Item = &'a Field>) -> syn::Result<Vec<LitStr>> {
    let mut params = Vec::new();
    for field in fields {
        let Some(ident) = &field.ident else { continue };
        let serde = serde_field_info(&field.attrs)?;
        if serde.skipped {
            continue;
        }
        params.push(
            serde.rename.unwrap_or_else(|| LitStr::new(&ident.unraw().to_string(), ident.span())),
        );
    }
    Ok(params)
}

fn serde_field_info(attrs: &[Attribute]) -> syn::Result<SerdeFieldInfo> {
    let mut info = SerdeFieldInfo::default();

    for attr in attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") && meta.input.peek(syn::Token![=]) {
                info.rename = Some(meta.value()?.parse()?);
                return Ok(());
            }
            if meta.path.is_ident("skip") || meta.path.is_ident("skip_deserializing") {
                info.skipped = true;
            }
            skip_meta_value(&meta)
        })?;
    }

    Ok(info)
}

fn has_container_rename(attrs: &[Attribute]) -> syn::Result<bool> {
    let mut found = false;

    for attr in attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                found = true;
            }
            skip_meta_value(&meta)
        })?;
    }

    Ok(found)
}

/// Consumes `= value` or `(...)` of a serde argument this macro does not interpret.
fn skip_meta_value(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<()> {
    if meta.input.peek(syn::Token![=]) {
        let _: syn::Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        let _: TokenTree = meta.input.parse()?;
    }
    Ok(())
}
