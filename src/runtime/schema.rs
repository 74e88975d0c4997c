// Runtime type schemas
//
// A schema is the emitted description of one host type: generated names,
// std140 offsets, texture units and initial locations. `StructInstance`
// interprets it dynamically; the source artifact is printed from it.

use std::sync::Arc;

use crate::compiler::declaration::DeclarationKind;
use crate::compiler::glsl_types::{BaseType, OpaqueKind};
use crate::compiler::layout::ArrayLayout;
use crate::compiler::registry::TypeIdentity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Value(BaseType),
    Handle(OpaqueKind),
    Aggregate(Arc<TypeSchema>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    /// GLSL field name.
    pub name: String,
    /// GLSL type name as declared.
    pub type_name: String,
    pub kind: FieldKind,
    pub offset: u32,
    pub size: u32,
    pub array: Option<ArrayLayout>,
    /// Location known at compile time (`layout(location = N)`).
    pub location: Option<u32>,
    /// First texture unit of an opaque uniform; arrays use consecutive units.
    /// On a struct uniform, the first unit of its opaque leaves, which take
    /// consecutive units in declaration order.
    pub texture_unit: Option<u32>,
}

impl FieldSchema {
    pub fn len(&self) -> usize {
        self.array.map_or(1, |array| array.length as usize)
    }

    pub fn is_array(&self) -> bool {
        self.array.is_some()
    }

    pub fn element_offset(&self, index: usize) -> u32 {
        match self.array {
            Some(array) => self.offset + index as u32 * array.stride,
            None => self.offset,
        }
    }

    pub fn element_size(&self) -> u32 {
        match &self.kind {
            FieldKind::Value(base) => base.size(),
            FieldKind::Handle(_) => 4,
            FieldKind::Aggregate(schema) => schema.size,
        }
    }

    /// Opaque leaves under this field, arrays and aggregates expanded.
    pub fn opaque_count(&self) -> u32 {
        let per_element = match &self.kind {
            FieldKind::Value(_) => 0,
            FieldKind::Handle(_) => 1,
            FieldKind::Aggregate(schema) => schema.opaque_count(),
        };
        per_element * self.len() as u32
    }

    /// Human-readable type for error messages, `vec3[4]` style.
    pub fn display_type(&self) -> String {
        match self.array {
            Some(array) => format!("{}[{}]", self.type_name, array.length),
            None => self.type_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSchema {
    pub identity: TypeIdentity,
    pub kind: DeclarationKind,
    pub size: u32,
    pub alignment: u32,
    pub fields: Vec<FieldSchema>,
}

impl TypeSchema {
    pub fn name(&self) -> &str {
        &self.identity.generated_name
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn opaque_count(&self) -> u32 {
        self.fields.iter().map(FieldSchema::opaque_count).sum()
    }

    pub fn is_uniform_set(&self) -> bool {
        self.kind == DeclarationKind::UniformSet
    }
}
