use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{DataStruct, DeriveInput, Error, Fields, Ident, LitStr, Result, Type};

/// One document field of the struct being derived.
struct DocumentField<'a> {
    ident: &'a Ident,
    ty: &'a Type,
    wire_name: String,
    renamed: bool,
}

/// Reads the `#[document(...)]` attributes of a field. Returns `None` for a
/// skipped field.
fn parse_field(field: &syn::Field) -> Result<Option<DocumentField<'_>>> {
    let ident = match &field.ident {
        Some(ident) => ident,
        None => return Err(Error::new_spanned(field, "only named fields are supported")),
    };

    let mut rename: Option<String> = None;
    let mut skip = false;
    for attr in &field.attrs {
        if !attr.path().is_ident("document") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                if rename.is_some() {
                    return Err(meta.error("rename given more than once"));
                }
                let value = meta.value()?;
                let s: LitStr = value.parse()?;
                if s.value().is_empty() {
                    return Err(Error::new_spanned(&s, "rename cannot be empty"));
                }
                rename = Some(s.value());
                Ok(())
            } else if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error("unknown document attribute, expected `rename = \"...\"` or `skip`"))
            }
        })?;
    }

    if skip {
        if rename.is_some() {
            return Err(Error::new_spanned(field, "a skipped field cannot be renamed"));
        }
        return Ok(None);
    }

    let renamed = rename.is_some();
    let wire_name = rename.unwrap_or_else(|| ident.to_string());
    Ok(Some(DocumentField {
        ident,
        ty: &field.ty,
        wire_name,
        renamed,
    }))
}

pub(crate) fn generate_document_object(ast: &DeriveInput, data: &DataStruct) -> Result<TokenStream> {
    let name = &ast.ident;
    if !ast.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &ast.generics,
            "generic structs cannot derive DocumentObject",
        ));
    }

    let named = match &data.fields {
        Fields::Named(fields) => &fields.named,
        Fields::Unit => {
            return Err(Error::new(Span::call_site(), "unit structs have no document fields"));
        }
        Fields::Unnamed(_) => {
            return Err(Error::new_spanned(&data.fields, "tuple structs are not supported"));
        }
    };

    let mut fields = Vec::with_capacity(named.len());
    for field in named {
        if let Some(parsed) = parse_field(field)? {
            if let Some(existing) = fields
                .iter()
                .find(|f: &&DocumentField| f.wire_name == parsed.wire_name)
            {
                return Err(Error::new_spanned(
                    field,
                    format!(
                        "document field name `{}` is used by both `{}` and `{}`",
                        parsed.wire_name, existing.ident, parsed.ident
                    ),
                ));
            }
            fields.push(parsed);
        }
    }

    let type_name = name.to_string();
    let indices: Vec<usize> = (0..fields.len()).collect();
    let idents: Vec<&Ident> = fields.iter().map(|f| f.ident).collect();
    let types: Vec<&Type> = fields.iter().map(|f| f.ty).collect();
    let wire_names: Vec<&str> = fields.iter().map(|f| f.wire_name.as_str()).collect();
    let renamed: Vec<bool> = fields.iter().map(|f| f.renamed).collect();

    let gen = quote! {
        impl docstore::document::DocumentObject for #name {
            fn type_name(&self) -> &'static str {
                #type_name
            }

            fn describe(&self) -> ::std::vec::Vec<docstore::codec::FieldInfo> {
                ::std::vec![
                    #(docstore::codec::FieldInfo::new(
                        #wire_names,
                        #renamed,
                        #indices,
                        <#types as docstore::common::Convertible>::field_type(),
                    ),)*
                ]
            }

            fn field_value(&self, index: usize) -> docstore::errors::DocResult<docstore::common::Value> {
                match index {
                    #(#indices => docstore::common::Convertible::to_value(&self.#idents),)*
                    _ => Err(docstore::document::field_index_error(#type_name, index)),
                }
            }

            fn set_field_value(
                &mut self,
                index: usize,
                value: &docstore::common::Value,
            ) -> docstore::errors::DocResult<()> {
                match index {
                    #(#indices => {
                        self.#idents = <#types as docstore::common::Convertible>::from_value(value)?;
                        Ok(())
                    })*
                    _ => Err(docstore::document::field_index_error(#type_name, index)),
                }
            }

            fn reset_field(&mut self, index: usize) -> docstore::errors::DocResult<()> {
                match index {
                    #(#indices => {
                        self.#idents = <#types as ::core::default::Default>::default();
                        Ok(())
                    })*
                    _ => Err(docstore::document::field_index_error(#type_name, index)),
                }
            }

            fn field_node_mut(
                &mut self,
                index: usize,
            ) -> docstore::errors::DocResult<::core::option::Option<docstore::document::NodeMut<'_>>> {
                match index {
                    #(#indices => Ok(docstore::common::Convertible::node_mut(&mut self.#idents)),)*
                    _ => Err(docstore::document::field_index_error(#type_name, index)),
                }
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }

            fn into_any(self: ::std::boxed::Box<Self>) -> ::std::boxed::Box<dyn ::std::any::Any> {
                self
            }
        }

        impl docstore::common::Convertible for #name {
            fn field_type() -> docstore::codec::FieldType {
                docstore::codec::FieldType::Object(#type_name)
            }

            fn to_value(&self) -> docstore::errors::DocResult<docstore::common::Value> {
                docstore::codec::object_to_value(self)
            }

            fn from_value(value: &docstore::common::Value) -> docstore::errors::DocResult<Self> {
                let mut object = <Self as ::core::default::Default>::default();
                docstore::codec::object_from_value(&mut object, value)?;
                Ok(object)
            }

            fn node_mut(&mut self) -> ::core::option::Option<docstore::document::NodeMut<'_>> {
                Some(docstore::document::NodeMut::Object(self))
            }
        }
    };

    Ok(TokenStream::from(gen))
}
