use proc_macro::{self, TokenStream};
use quote::{format_ident, quote};
use syn::{parse_macro_input, DeriveInput};

use super::utils::{clog2, get_enum_encode_value, get_enum_width};

pub fn derive(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();
    let name = &ast.ident;
    match ast.data {
        syn::Data::Struct(syn::DataStruct {
            fields: syn::Fields::Named(syn::FieldsNamed { ref named, .. }), ..
        }) => {
            let fields = named;

            let ty_widths = fields.iter().map(|f| {
                let ty = &f.ty;
                quote! { <#ty as Signal>::WIDTH }
            });

            // fields for `transl`.
            let into_fields = fields.iter().map(|f| {
                let name = &f.ident;
                quote! { bits.extend(Signal::transl(self.#name)); }
            });

            // fields for `from_bits`.
            let from_fields = fields.iter().map(|f| {
                let name = f.ident.as_ref().unwrap();
                let ty = &f.ty;
                let local = format_ident!("field_{}", name);
                quote! {
                    let #local = <#ty as Signal>::from_bits(&bits[offset..offset + <#ty as Signal>::WIDTH])?;
                    offset += <#ty as Signal>::WIDTH;
                }
            });

            let init_fields = fields.iter().map(|f| {
                let name = f.ident.as_ref().unwrap();
                let local = format_ident!("field_{}", name);
                quote! { #name: #local }
            });

            let expanded = quote! {
                impl #impl_generics Signal for #name #ty_generics #where_clause {
                    const WIDTH: usize = 0 #(+ #ty_widths)*;

                    fn transl(self) -> Vec<bool> {
                        let mut bits = Vec::with_capacity(<Self as Signal>::WIDTH);
                        #(#into_fields)*
                        bits
                    }

                    fn from_bits(bits: &[bool]) -> Option<Self> {
                        if bits.len() != <Self as Signal>::WIDTH {
                            return None;
                        }
                        let mut offset = 0;
                        #(#from_fields)*
                        debug_assert_eq!(offset, <Self as Signal>::WIDTH);
                        Some(Self { #(#init_fields,)* })
                    }
                }
            };

            expanded.into()
        }
        syn::Data::Enum(syn::DataEnum { ref variants, .. }) => {
            let variant_count = variants.iter().count();
            assert!(variant_count > 0, "{name}: Empty enums cannot be derived as pitonflow `Signal`");
            let width = if let Some(width) = get_enum_width(&ast.attrs) {
                width.base10_parse::<usize>().unwrap_or_else(|_| panic!("{name}: Enum width should be usize"))
            } else if variant_count == 1 {
                1
            } else {
                clog2(variant_count)
            };

            let encodings = variants
                .iter()
                .enumerate()
                .map(|(i, f)| {
                    let variant_name = &f.ident;
                    assert!(
                        matches!(f.fields, syn::Fields::Unit),
                        "{name}::{variant_name}: Only Unit Variant is allowed to be derived as pitonflow Signal"
                    );

                    let encode_value = if let Some(encode_value_lit) = get_enum_encode_value(&f.attrs) {
                        encode_value_lit
                            .base10_parse::<usize>()
                            .unwrap_or_else(|_| panic!("encoding value of {name}::{variant_name} should be usize"))
                    } else {
                        i
                    };
                    assert!(
                        encode_value < (1 << width),
                        "{encode_value}(encoding of {name}::{variant_name}) exceeds maximum for {width} bits",
                    );
                    (variant_name, encode_value)
                })
                .collect::<Vec<_>>();

            let into_variants = encodings.iter().map(|(variant_name, encode_value)| {
                quote! { Self::#variant_name => #encode_value, }
            });

            let from_variants = encodings.iter().map(|(variant_name, encode_value)| {
                quote! { #encode_value => Some(Self::#variant_name), }
            });

            let expanded = quote! {
                impl #impl_generics Signal for #name #ty_generics #where_clause {
                    const WIDTH: usize = #width;

                    fn transl(self) -> Vec<bool> {
                        let value: usize = match self {
                            #(#into_variants)*
                        };
                        (0..#width).map(|idx| ((value >> idx) & 1) != 0).collect::<Vec<bool>>()
                    }

                    fn from_bits(bits: &[bool]) -> Option<Self> {
                        if bits.len() != #width {
                            return None;
                        }
                        let value = bits.iter().rev().fold(0usize, |acc, bit| (acc << 1) | usize::from(*bit));
                        match value {
                            #(#from_variants)*
                            _ => None,
                        }
                    }
                }
            };

            expanded.into()
        }
        _ => todo!("Signal macro is not implemented for union type"),
    }
}
