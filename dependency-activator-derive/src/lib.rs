//! Derive macros for dependency-activator
//!
//! This crate provides `#[derive(Injectable)]`, which implements
//! `dependency_activator::Activate` for a struct: one public constructor whose
//! parameters are the struct's injected fields.
//!
//! # Example
//!
//! ```rust,ignore
//! use dependency_activator::{descriptor, Container, Injectable};
//! use std::sync::Arc;
//!
//! #[derive(Injectable)]
//! struct Database;
//!
//! #[derive(Injectable)]
//! struct UserService {
//!     #[inject]
//!     db: Arc<Database>,
//!     #[inject(optional)]
//!     cache: Option<Arc<Cache>>,
//!     #[inject(all)]
//!     plugins: Vec<Arc<dyn Plugin>>,
//!     // Non-injected fields use Default
//!     request_count: u64,
//! }
//!
//! let container = Container::build([
//!     descriptor!(singleton Database),
//!     descriptor!(scoped UserService),
//! ])
//! .unwrap();
//!
//! let service = container.get::<UserService>().unwrap();
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, Type, parse_macro_input};

/// Derive macro implementing `Activate`.
///
/// # Field attributes
///
/// - `#[inject]` - Inject a required service. The field type must be `Arc<T>`.
/// - `#[inject(optional)]` - Inject a service when one is registered. Uses `Option<Arc<T>>`.
/// - `#[inject(all)]` - Inject every registration of a service, in registration
///   order. Uses `Vec<Arc<T>>`.
///
/// Fields without `#[inject]` use `Default::default()`.
///
/// # Container attributes
///
/// - `#[injectable(dispose)]` - The type implements `Dispose`; the owning
///   scope disposes each instance.
/// - `#[injectable(expose = dyn Trait)]` - Produce instances as `Arc<dyn Trait>`
///   so the type can be registered under a trait-object contract.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Injectable)]
/// #[injectable(dispose, expose = dyn Repository)]
/// struct SqlRepository {
///     #[inject]
///     pool: Arc<Pool>,
/// }
///
/// impl Dispose for SqlRepository {
///     fn dispose(&self) {}
/// }
///
/// let descriptor = descriptor!(scoped dyn Repository => SqlRepository);
/// ```
#[proc_macro_derive(Injectable, attributes(inject, injectable))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_injectable(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_injectable(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let options = find_injectable_attr(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Injectable can only be derived for structs",
            ));
        }
    };

    let mut parameters = Vec::new();
    let mut field_inits = Vec::new();

    match fields {
        Fields::Named(named) => {
            for field in named.named.iter() {
                let Some(field_name) = field.ident.as_ref() else {
                    continue;
                };
                let index = parameters.len();
                match find_inject_attr(&field.attrs)? {
                    Some(InjectAttr::Required) => {
                        let inner = extract_arc_inner_type(&field.ty).ok_or_else(|| {
                            syn::Error::new_spanned(
                                &field.ty,
                                "Fields marked with #[inject] must have type Arc<T>",
                            )
                        })?;
                        parameters.push(quote! {
                            ::dependency_activator::Parameter::new(
                                ::dependency_activator::ServiceType::of::<#inner>()
                            )
                        });
                        field_inits.push(quote! {
                            #field_name: args.get::<#inner>(#index)?
                        });
                    }
                    Some(InjectAttr::Optional) => {
                        let inner = extract_option_arc_inner_type(&field.ty).ok_or_else(|| {
                            syn::Error::new_spanned(
                                &field.ty,
                                "Fields marked with #[inject(optional)] must have type Option<Arc<T>>",
                            )
                        })?;
                        // An unregistered service falls back to a unit default,
                        // which downcasts to `None`
                        parameters.push(quote! {
                            ::dependency_activator::Parameter::new(
                                ::dependency_activator::ServiceType::of::<#inner>()
                            )
                            .with_default(::dependency_activator::Instance::new(()))
                        });
                        field_inits.push(quote! {
                            #field_name: args.instance(#index).downcast::<#inner>()
                        });
                    }
                    Some(InjectAttr::All) => {
                        let inner = extract_vec_arc_inner_type(&field.ty).ok_or_else(|| {
                            syn::Error::new_spanned(
                                &field.ty,
                                "Fields marked with #[inject(all)] must have type Vec<Arc<T>>",
                            )
                        })?;
                        parameters.push(quote! {
                            ::dependency_activator::Parameter::new(
                                ::dependency_activator::ServiceType::enumerable(
                                    ::dependency_activator::ServiceType::of::<#inner>()
                                )
                            )
                        });
                        field_inits.push(quote! {
                            #field_name: args.all::<#inner>(#index)?
                        });
                    }
                    None => {
                        field_inits.push(quote! {
                            #field_name: ::std::default::Default::default()
                        });
                    }
                }
            }
        }
        Fields::Unit => {}
        Fields::Unnamed(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Injectable can only be derived for structs with named fields or unit structs",
            ));
        }
    }

    let construct = match fields {
        Fields::Unit => quote! { Self },
        _ => quote! { Self { #(#field_inits),* } },
    };

    let produce = match (&options.expose, options.dispose) {
        (None, false) => quote! { ::dependency_activator::Instance::new(value) },
        (None, true) => quote! { ::dependency_activator::Instance::disposable(value) },
        (Some(exposed), false) => quote! {
            ::dependency_activator::Instance::from_arc(
                ::std::sync::Arc::new(value) as ::std::sync::Arc<#exposed>
            )
        },
        (Some(exposed), true) => quote! {{
            let value = ::std::sync::Arc::new(value);
            ::dependency_activator::Instance::from_arc(
                ::std::sync::Arc::clone(&value) as ::std::sync::Arc<#exposed>
            )
            .with_disposer(value)
        }},
    };

    // `args` is unused by parameterless constructors
    let args_binding = if parameters.is_empty() {
        quote! { _args }
    } else {
        quote! { args }
    };

    Ok(quote! {
        impl #impl_generics ::dependency_activator::Activate for #name #ty_generics #where_clause {
            fn implementation() -> ::dependency_activator::Implementation {
                let parameters: ::std::vec::Vec<::dependency_activator::Parameter> =
                    ::std::vec![#(#parameters),*];
                ::dependency_activator::Implementation::new(
                    ::dependency_activator::ServiceType::of::<Self>()
                )
                .constructor(::dependency_activator::Constructor::new(
                    parameters,
                    |#args_binding: ::dependency_activator::Arguments| {
                        let value = #construct;
                        ::std::result::Result::Ok(#produce)
                    },
                ))
            }
        }
    })
}

/// Types of inject attributes
enum InjectAttr {
    Required,
    Optional,
    All,
}

/// Find and parse the #[inject] attribute
fn find_inject_attr(attrs: &[Attribute]) -> syn::Result<Option<InjectAttr>> {
    for attr in attrs {
        if attr.path().is_ident("inject") {
            if attr.meta.require_path_only().is_ok() {
                return Ok(Some(InjectAttr::Required));
            }

            let nested = attr.parse_args::<syn::Ident>()?;
            return if nested == "optional" {
                Ok(Some(InjectAttr::Optional))
            } else if nested == "all" {
                Ok(Some(InjectAttr::All))
            } else {
                Err(syn::Error::new_spanned(
                    nested,
                    "expected #[inject], #[inject(optional)] or #[inject(all)]",
                ))
            };
        }
    }
    Ok(None)
}

/// Parsed #[injectable(...)] options
#[derive(Default)]
struct InjectableAttr {
    dispose: bool,
    expose: Option<Type>,
}

/// Find and parse the #[injectable] attribute
fn find_injectable_attr(attrs: &[Attribute]) -> syn::Result<InjectableAttr> {
    let mut options = InjectableAttr::default();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("injectable")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("dispose") {
                options.dispose = true;
                Ok(())
            } else if meta.path.is_ident("expose") {
                options.expose = Some(meta.value()?.parse::<Type>()?);
                Ok(())
            } else {
                Err(meta.error("expected `dispose` or `expose = Type`"))
            }
        })?;
    }
    Ok(options)
}

/// Extract the first type argument of `Wrapper<T>` when the last path segment is `wrapper`
fn extract_wrapped_type<'t>(ty: &'t Type, wrapper: &str) -> Option<&'t Type> {
    if let Type::Path(type_path) = ty {
        let segment = type_path.path.segments.last()?;
        if segment.ident == wrapper {
            if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                    return Some(inner);
                }
            }
        }
    }
    None
}

/// Extract T from Arc<T>
fn extract_arc_inner_type(ty: &Type) -> Option<&Type> {
    extract_wrapped_type(ty, "Arc")
}

/// Extract T from Option<Arc<T>>
fn extract_option_arc_inner_type(ty: &Type) -> Option<&Type> {
    extract_wrapped_type(ty, "Option").and_then(extract_arc_inner_type)
}

/// Extract T from Vec<Arc<T>>
fn extract_vec_arc_inner_type(ty: &Type) -> Option<&Type> {
    extract_wrapped_type(ty, "Vec").and_then(extract_arc_inner_type)
}
