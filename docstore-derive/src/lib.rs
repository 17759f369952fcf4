#![recursion_limit = "128"]
//! # docstore derive macros
//!
//! ## Macros
//!
//! ### `DocumentObject`
//!
//! Derives `docstore::document::DocumentObject` and
//! `docstore::common::Convertible` for a struct with named fields, so that
//! values of the struct can be wrapped in a `docstore::document::Document`
//! and nested inside other derived structs.
//!
//! - **Supported for**: Structs with named fields and no generic parameters
//! - **Field attribute**: `#[document(rename = "...")]` stores the field under another name
//! - **Field attribute**: `#[document(skip)]` leaves the field out of the document
//!
//! Every kept field must implement `Convertible`; skipped fields need only
//! `Default`. The struct itself must implement `Default`.
//!
//! # Examples
//!
//! ```rust,ignore
//! use docstore_derive::DocumentObject;
//!
//! #[derive(DocumentObject, Default)]
//! pub struct Book {
//!     pub title: String,
//!     #[document(rename = "Pages")]
//!     pub pages: i64,
//!     #[document(skip)]
//!     pub scratch: u32,
//! }
//! ```

extern crate proc_macro;
mod object;

use crate::object::generate_document_object;
use proc_macro::TokenStream;
use syn::{Data, DeriveInput};

/// Derives `DocumentObject` and `Convertible` for a struct.
///
/// # Errors
///
/// Returns a compile error if:
/// - Applied to an enum or union
/// - Used on tuple structs, unit structs or generic structs
/// - Two fields end up with the same document name
/// - A `#[document(...)]` attribute is not `rename = "..."` or `skip`
#[proc_macro_derive(DocumentObject, attributes(document))]
pub fn derive_document_object(input: TokenStream) -> TokenStream {
    let ast = syn::parse_macro_input!(input as DeriveInput);

    match ast.data {
        Data::Struct(ref data) => match generate_document_object(&ast, data) {
            Ok(token_stream) => token_stream,
            Err(e) => e.to_compile_error().into(),
        },
        Data::Enum(_) => {
            let error = syn::Error::new_spanned(
                &ast,
                "Cannot derive DocumentObject for enums. Only structs are supported.",
            );
            error.to_compile_error().into()
        }
        Data::Union(_) => {
            let error = syn::Error::new_spanned(
                &ast,
                "Cannot derive DocumentObject for unions. Only structs are supported.",
            );
            error.to_compile_error().into()
        }
    }
}
