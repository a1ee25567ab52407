use itertools::izip;
use proc_macro2::{Literal, Span, TokenStream};
use quote::quote;
use syn::{Ident, LitInt};

pub fn build_mapping(input: LitInt) -> syn::Result<TokenStream> {
    let n = input.base10_parse::<usize>()?;
    if !(1..=3).contains(&n) {
        return Err(syn::Error::new(input.span(), "mapping arity must be 1, 2 or 3"));
    }

    let ident = |prefix: &str, i: usize| Ident::new(&format!("{prefix}{i}"), Span::call_site());
    let segments = (0..n).map(|i| ident("s", i)).collect::<Vec<_>>();
    let types = (0..n).map(|i| ident("S", i)).collect::<Vec<_>>();
    let coords = (0..n).map(|i| ident("i", i)).collect::<Vec<_>>();
    let axes = (0..n).map(Literal::usize_unsuffixed).collect::<Vec<_>>();
    let arity = Literal::usize_unsuffixed(n);

    // wraps `body` in one walk per axis, axis 0 outermost
    let nest = |body: TokenStream, tiled: bool| -> TokenStream {
        izip!(&segments, &coords, &axes)
            .rev()
            .fold(body, |inner, (s, i, k)| {
                let tile = match tiled {
                    true => quote! { tile.size(#k) },
                    false => quote! { 1 },
                };
                quote! {
                    for #i in policy.walk(ctx, #k, #s.len(), #tile) {
                        #inner
                    }
                }
            })
    };

    let offsets = izip!(&segments, &coords)
        .map(|(s, i)| quote! { #s.at(#i) })
        .collect::<Vec<_>>();
    let slices = izip!(&segments, &coords, &axes)
        .map(|(s, i, k)| quote! { #s.slice(#i, tile.size(#k)) })
        .collect::<Vec<_>>();
    let tile_counts = izip!(&coords, &axes)
        .map(|(i, k)| quote! { #i / tile.size(#k) })
        .collect::<Vec<_>>();

    let offset_types = (0..n).map(|_| quote! { Offset }).collect::<Vec<_>>();
    let count_types = (0..n).map(|_| quote! { usize }).collect::<Vec<_>>();

    let loop_body = nest(quote! { body(#(#offsets),*); }, false);
    let loop_icount_body = nest(quote! { body(#(#offsets,)* #(#coords),*); }, false);
    let tile_body = nest(quote! { body(#(#slices),*); }, true);
    let tile_icount_body = nest(quote! { body(#(#slices,)* #(#tile_counts),*); }, true);

    let name = |prefix: &str| Ident::new(&format!("{prefix}_{n}"), Span::call_site());
    let loop_name = name("loop");
    let loop_icount_name = name("loop_icount");
    let tile_name = name("tile");
    let tile_icount_name = name("tile_icount");

    let loop_doc = format!(
        "Invokes `body` with one offset per segment for each unit owned under a {n}-axis `policy`."
    );
    let loop_icount_doc = format!(
        "Same as [`{loop_name}`], also passing the element index along each of the {n} axes."
    );
    let tile_doc = format!(
        "Invokes `body` with one tile per segment for each tile owned under a {n}-axis `policy`."
    );
    let tile_icount_doc = format!(
        "Same as [`{tile_name}`], also passing the tile index along each of the {n} axes."
    );

    Ok(quote! {
        #[doc = #loop_doc]
        pub fn #loop_name<#(#types,)* F>(
            ctx: &LaunchContext,
            policy: &Policy<#arity>,
            #(#segments: &#types,)*
            mut body: F,
        ) where
            #(#types: Segment,)*
            F: FnMut(#(#offset_types),*),
        {
            #loop_body
        }

        #[doc = #loop_icount_doc]
        pub fn #loop_icount_name<#(#types,)* F>(
            ctx: &LaunchContext,
            policy: &Policy<#arity>,
            #(#segments: &#types,)*
            mut body: F,
        ) where
            #(#types: Segment,)*
            F: FnMut(#(#offset_types,)* #(#count_types),*),
        {
            #loop_icount_body
        }

        #[doc = #tile_doc]
        pub fn #tile_name<#(#types,)* F>(
            ctx: &LaunchContext,
            policy: &Policy<#arity>,
            tile: &Tile<#arity>,
            #(#segments: &#types,)*
            mut body: F,
        ) where
            #(#types: Segment,)*
            F: FnMut(#(#types),*),
        {
            #tile_body
        }

        #[doc = #tile_icount_doc]
        pub fn #tile_icount_name<#(#types,)* F>(
            ctx: &LaunchContext,
            policy: &Policy<#arity>,
            tile: &Tile<#arity>,
            #(#segments: &#types,)*
            mut body: F,
        ) where
            #(#types: Segment,)*
            F: FnMut(#(#types,)* #(#count_types),*),
        {
            #tile_icount_body
        }
    })
}
