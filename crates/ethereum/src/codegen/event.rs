//! Classified event descriptors
//!
//! An [`EventDescriptor`] is an [`AbiEvent`] whose every field type has been run
//! through the classifier. Building one is where unsupported types surface,
//! with the dotted path of the offending field.

use abi_schema_core::{Error, Result};

use super::parser::{AbiEvent, AbiParameter};
use super::types::{classify, TypeDescriptor, TypeError};

/// Name given to the single field of a primitive array's element table
pub const ARRAY_ELEMENT_FIELD: &str = "value";

/// One classified field, with its components when it is a tuple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: TypeDescriptor,
    pub components: Vec<FieldDescriptor>,
    pub indexed: bool,
}

/// A contract event with classified fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    pub anonymous: bool,
}

impl EventDescriptor {
    /// Classify every field of a parsed ABI event
    pub fn from_abi(event: &AbiEvent) -> Result<Self> {
        let fields = classify_fields(&event.inputs, &event.name)?;
        Ok(Self {
            name: event.name.clone(),
            fields,
            anonymous: event.anonymous,
        })
    }

    /// `Name(type,...)` with tuples expanded into parenthesized type lists
    pub fn canonical_signature(&self) -> String {
        let types: Vec<String> = self.fields.iter().map(FieldDescriptor::canonical_type).collect();
        format!("{}({})", self.name, types.join(","))
    }
}

impl FieldDescriptor {
    /// Element field used for the child table of a primitive array
    pub fn array_element(ty: &TypeDescriptor) -> Self {
        Self {
            name: ARRAY_ELEMENT_FIELD.to_string(),
            ty: ty.element(),
            components: Vec::new(),
            indexed: false,
        }
    }

    /// Canonical type string, recursing into tuple components
    pub fn canonical_type(&self) -> String {
        if self.ty.is_tuple() {
            let inner: Vec<String> = self.components.iter().map(Self::canonical_type).collect();
            format!("({}){}", inner.join(","), self.ty.array_suffix())
        } else {
            self.ty.to_string()
        }
    }
}

fn classify_fields(params: &[AbiParameter], path: &str) -> Result<Vec<FieldDescriptor>> {
    params
        .iter()
        .enumerate()
        .map(|(index, param)| {
            let name = if param.name.is_empty() {
                format!("param_{}", index)
            } else {
                param.name.clone()
            };
            let field_path = format!("{}.{}", path, name);

            let ty = classify(&param.param_type)
                .map_err(|reason| unsupported(&field_path, &param.param_type, reason))?;

            let components = if ty.is_tuple() {
                match param.components.as_deref() {
                    Some(components) if !components.is_empty() => classify_fields(components, &field_path)?,
                    _ => {
                        return Err(Error::UnsupportedType {
                            path: field_path,
                            type_name: param.param_type.clone(),
                            reason: "tuple without components".to_string(),
                        })
                    }
                }
            } else {
                Vec::new()
            };

            Ok(FieldDescriptor {
                name,
                ty,
                components,
                indexed: param.indexed,
            })
        })
        .collect()
}

pub(crate) fn unsupported(path: &str, type_name: &str, reason: TypeError) -> Error {
    Error::UnsupportedType {
        path: path.to_string(),
        type_name: type_name.to_string(),
        reason: reason.to_string(),
    }
}
