//! `#[derive(EnuMap)]` turns a fieldless enum into a total map type.
//!
//! For `enum Topic { Vocabulary, Analogies }` it generates `TopicMap<T>` with one public field per
//! variant (`vocabulary`, `analogies`), plus `Topic::ALL` listing the variants in declaration order.
//! Because every variant has a slot, lookups can never miss.

use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(ch.to_ascii_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}

#[proc_macro_derive(EnuMap)]
pub fn derive_enumap(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let enum_name = &input.ident;
    let vis = &input.vis;
    let map_name = syn::Ident::new(&format!("{enum_name}Map"), enum_name.span());

    let Data::Enum(data_enum) = &input.data else {
        return syn::Error::new_spanned(&input.ident, "EnuMap can only be derived for enums")
            .to_compile_error()
            .into();
    };

    let mut variant_names = Vec::new();
    let mut field_names = Vec::new();
    for variant in &data_enum.variants {
        match &variant.fields {
            Fields::Unit => {
                variant_names.push(&variant.ident);
                let field_name = syn::Ident::new(
                    &to_snake_case(&variant.ident.to_string()),
                    variant.ident.span(),
                );
                field_names.push(field_name);
            }
            _ => {
                return syn::Error::new_spanned(
                    variant,
                    "EnuMap only supports unit variants (variants without fields)",
                )
                .to_compile_error()
                .into();
            }
        }
    }
    let variant_count = variant_names.len();

    let struct_fields = field_names.iter().map(|name| {
        quote! {
            pub #name: T
        }
    });

    let expanded = quote! {
        #[derive(Clone, Debug, Default, PartialEq, Eq)]
        #vis struct #map_name<T> {
            #(#struct_fields),*
        }

        impl #enum_name {
            /// Every variant, in declaration order.
            pub const ALL: [#enum_name; #variant_count] = [#(#enum_name::#variant_names),*];
        }

        impl<T> #map_name<T> {
            pub fn get(&self, key: &#enum_name) -> &T {
                match key {
                    #(#enum_name::#variant_names => &self.#field_names),*
                }
            }

            pub fn get_mut(&mut self, key: &#enum_name) -> &mut T {
                match key {
                    #(#enum_name::#variant_names => &mut self.#field_names),*
                }
            }

            /// Builds a map by calling `f` once per variant, in declaration order.
            pub fn from_fn(mut f: impl FnMut(#enum_name) -> T) -> Self {
                Self {
                    #(#field_names: f(#enum_name::#variant_names)),*
                }
            }

            pub fn map<U>(self, mut f: impl FnMut(#enum_name, T) -> U) -> #map_name<U> {
                let #map_name { #(#field_names),* } = self;
                #map_name {
                    #(#field_names: f(#enum_name::#variant_names, #field_names)),*
                }
            }

            pub fn iter(&self) -> impl Iterator<Item = (#enum_name, &T)> {
                [#((#enum_name::#variant_names, &self.#field_names)),*].into_iter()
            }

            pub fn values(&self) -> impl Iterator<Item = &T> {
                [#(&self.#field_names),*].into_iter()
            }
        }
    };

    TokenStream::from(expanded)
}
