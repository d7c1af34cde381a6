use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, parse_quote, spanned::Spanned, Ident, ItemFn, LitStr, Stmt};

const USAGE: &str = "rxreplay_macro::test only accepts: #[rxreplay_macro::test], \
                     #[rxreplay_macro::test(current)] or #[rxreplay_macro::test(multi)]";

/// Marks a test function.
///
/// Sync tests expand to `#[test]`, async tests to `#[tokio::test]` (the
/// `current` / `multi` argument selects the runtime flavor). On wasm32 the
/// `wasm_bindgen_test` harness is used instead. Every test gets a
/// `tracing-subscriber` writer wired to the test output, so `RUST_LOG`-style
/// diagnostics from the subject show up next to a failing assertion.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
  let mut input = parse_macro_input!(item as ItemFn);
  let is_async = input.sig.asyncness.is_some();

  let raw_args = proc_macro2::TokenStream::from(attr);
  let flavor = if raw_args.is_empty() {
    None
  } else if !is_async {
    return syn::Error::new(raw_args.span(), "runtime flavor args are only valid on async tests")
      .to_compile_error()
      .into();
  } else {
    let name = if let Ok(ident) = syn::parse2::<Ident>(raw_args.clone()) {
      ident.to_string()
    } else if let Ok(lit) = syn::parse2::<LitStr>(raw_args.clone()) {
      lit.value()
    } else {
      return syn::Error::new(raw_args.span(), USAGE).to_compile_error().into();
    };
    match name.as_str() {
      "current" => Some(quote!(flavor = "current_thread")),
      "multi" => Some(quote!(flavor = "multi_thread", worker_threads = 4)),
      _ => return syn::Error::new(raw_args.span(), USAGE).to_compile_error().into(),
    }
  };

  let init: Stmt = parse_quote! {
    let _ = ::tracing_subscriber::fmt().with_test_writer().try_init();
  };
  input.block.stmts.insert(0, init);

  let wasm_attr = if is_async {
    quote!(wasm_bindgen_test::wasm_bindgen_test(async))
  } else {
    quote!(wasm_bindgen_test::wasm_bindgen_test)
  };
  let native_attr = match (is_async, flavor) {
    (true, Some(flavor)) => quote!(tokio::test(#flavor)),
    (true, None) => quote!(tokio::test),
    (false, _) => quote!(test),
  };

  let expanded = quote! {
    #[cfg_attr(target_arch = "wasm32", #wasm_attr)]
    #[cfg_attr(not(target_arch = "wasm32"), #native_attr)]
    #input
  };
  TokenStream::from(expanded)
}
