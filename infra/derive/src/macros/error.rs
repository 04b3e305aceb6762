use fxhash::FxHashSet;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Field, Fields, GenericArgument, Ident, PathArguments, Type};

/// What the expansion needs to know about one variant.
struct Shape<'a> {
    ident: &'a Ident,
    cfg: Vec<&'a Attribute>,
    source: Option<(&'a Ident, &'a Type)>,
    contextual: bool,
    internal: bool,
}

pub fn expand(input: DeriveInput) -> TokenStream {
    let Data::Enum(data) = &input.data else {
        return syn::Error::new_spanned(&input.ident, "weave_error can only be applied to enums")
            .to_compile_error();
    };

    let mut shapes = Vec::with_capacity(data.variants.len());
    for variant in &data.variants {
        match shape_of(variant) {
            Ok(shape) => shapes.push(shape),
            Err(err) => return err.to_compile_error(),
        }
    }

    let name = &input.ident;
    let ext = format_ident!("{}Ext", name);

    let derives = missing_derives(&input.attrs);
    let context_trait = context_trait(name, &ext, &shapes);
    let conversions = shapes.iter().filter_map(|shape| source_conversion(name, &ext, shape));
    let internal = internal_conversions(name, &shapes);

    quote! {
        #derives
        #input

        #context_trait
        #(#conversions)*
        #internal

        #[allow(dead_code)]
        fn format_context(
            context: &Option<std::borrow::Cow<'static, str>>,
        ) -> std::borrow::Cow<'static, str> {
            match context {
                Some(c) => std::borrow::Cow::Owned(format!(" ({c})")),
                None => std::borrow::Cow::Borrowed(""),
            }
        }
    }
}

fn shape_of(variant: &syn::Variant) -> syn::Result<Shape<'_>> {
    let Fields::Named(fields) = &variant.fields else {
        return Err(syn::Error::new_spanned(
            variant,
            "weave_error variants must use named fields (`{ source, context }` or `{ message, context }`)",
        ));
    };

    let mut source = None;
    let mut contextual = false;

    for field in &fields.named {
        let Some(ident) = &field.ident else { continue };

        if ident == "context" {
            if !is_optional_cow(&field.ty) {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    "`context` must be `Option<Cow<'static, str>>`",
                ));
            }
            contextual = true;
        } else if ident == "source" || marked(field, "source") || marked(field, "from") {
            source = Some((ident, &field.ty));
        }
    }

    if source.is_some() && !contextual {
        return Err(syn::Error::new_spanned(
            &variant.ident,
            "variants wrapping a source need a `context: Option<Cow<'static, str>>` field",
        ));
    }

    Ok(Shape {
        ident: &variant.ident,
        cfg: variant.attrs.iter().filter(|attr| attr.path().is_ident("cfg")).collect(),
        source,
        contextual,
        internal: variant.ident == "Internal",
    })
}

fn missing_derives(attrs: &[Attribute]) -> TokenStream {
    let present = derived(attrs);
    let mut wanted = Vec::new();
    if !present.contains("Debug") {
        wanted.push(quote! { Debug });
    }
    if !present.contains("Error") {
        wanted.push(quote! { ::thiserror::Error });
    }

    if wanted.is_empty() {
        quote! {}
    } else {
        quote! { #[derive(#(#wanted),*)] }
    }
}

fn context_trait(name: &Ident, ext: &Ident, shapes: &[Shape<'_>]) -> TokenStream {
    let arms: Vec<TokenStream> = shapes
        .iter()
        .filter(|shape| shape.contextual)
        .map(|shape| {
            let cfg = &shape.cfg;
            let ident = shape.ident;
            quote! { #(#cfg)* #name::#ident { context, .. } => *context = Some(value), }
        })
        .collect();

    quote! {
        /// Attaches human-readable context to fallible results.
        pub trait #ext<T> {
            /// Sets the context of the resulting error.
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> std::result::Result<T, #name>;

            /// Like `context`, but only builds the message on the error path.
            fn with_context<C, F>(self, f: F) -> std::result::Result<T, #name>
            where
                C: Into<std::borrow::Cow<'static, str>>,
                F: FnOnce() -> C;
        }

        #[automatically_derived]
        impl<T> #ext<T> for std::result::Result<T, #name> {
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> Self {
                <Self as #ext<T>>::with_context(self, || context)
            }

            #[allow(unreachable_patterns, unused_variables)]
            fn with_context<C, F>(self, f: F) -> Self
            where
                C: Into<std::borrow::Cow<'static, str>>,
                F: FnOnce() -> C,
            {
                self.map_err(|mut err| {
                    let value: std::borrow::Cow<'static, str> = f().into();
                    match &mut err {
                        #(#arms)*
                        _ => {}
                    }
                    err
                })
            }
        }
    }
}

fn source_conversion(name: &Ident, ext: &Ident, shape: &Shape<'_>) -> Option<TokenStream> {
    if shape.internal {
        return None;
    }
    let (field, ty) = shape.source?;
    let ident = shape.ident;
    let cfg = &shape.cfg;

    Some(quote! {
        #(#cfg)*
        #[automatically_derived]
        impl From<#ty> for #name {
            fn from(#field: #ty) -> Self {
                Self::#ident { #field, context: None }
            }
        }

        #(#cfg)*
        #[automatically_derived]
        impl<T> #ext<T> for std::result::Result<T, #ty> {
            fn context(
                self,
                context: impl Into<std::borrow::Cow<'static, str>>,
            ) -> std::result::Result<T, #name> {
                self.map_err(|#field| #name::#ident { #field, context: Some(context.into()) })
            }

            fn with_context<C, F>(self, f: F) -> std::result::Result<T, #name>
            where
                C: Into<std::borrow::Cow<'static, str>>,
                F: FnOnce() -> C,
            {
                self.map_err(|#field| #name::#ident { #field, context: Some(f().into()) })
            }
        }
    })
}

fn internal_conversions(name: &Ident, shapes: &[Shape<'_>]) -> TokenStream {
    let Some(internal) = shapes.iter().find(|shape| shape.internal) else {
        return quote! {};
    };
    let cfg = &internal.cfg;

    quote! {
        #(#cfg)*
        #[automatically_derived]
        impl From<&'static str> for #name {
            fn from(message: &'static str) -> Self {
                Self::Internal { message: std::borrow::Cow::Borrowed(message), context: None }
            }
        }

        #(#cfg)*
        #[automatically_derived]
        impl From<String> for #name {
            fn from(message: String) -> Self {
                Self::Internal { message: std::borrow::Cow::Owned(message), context: None }
            }
        }
    }
}

fn marked(field: &Field, attr: &str) -> bool {
    field.attrs.iter().any(|a| a.path().is_ident(attr))
}

fn derived(attrs: &[Attribute]) -> FxHashSet<String> {
    let mut names = FxHashSet::default();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("derive")) {
        let _ = attr.parse_nested_meta(|meta| {
            if let Some(last) = meta.path.segments.last() {
                names.insert(last.ident.to_string());
            }
            Ok(())
        });
    }
    names
}

/// Matches `Option<Cow<'static, str>>`, with or without path qualifiers.
fn is_optional_cow(ty: &Type) -> bool {
    let Some(inner) = single_generic(ty, "Option") else {
        return false;
    };
    let Type::Path(path) = inner else {
        return false;
    };
    let Some(segment) = path.path.segments.last() else {
        return false;
    };
    if segment.ident != "Cow" {
        return false;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return false;
    };

    let mut args = args.args.iter();
    let lifetime_ok =
        matches!(args.next(), Some(GenericArgument::Lifetime(lt)) if lt.ident == "static");
    let str_ok = matches!(
        args.next(),
        Some(GenericArgument::Type(Type::Path(p)))
            if p.path.segments.last().is_some_and(|s| s.ident == "str")
    );
    lifetime_ok && str_ok
}

fn single_generic<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}
