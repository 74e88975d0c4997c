// std140 layout compiler
//
// Computes size, alignment and per-field offsets for one aggregate. Nested
// aggregates must already have been laid out; the resolver guarantees that
// by compiling in dependency order.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::declaration::{DeclarationKind, FieldQualifiers, TypeDeclaration};
use super::glsl_types::{checked_round_up, BaseType};
use super::registry::TypeIdentity;
use crate::error::CompileError;

/// Minimum alignment of arrays and aggregates under std140.
pub const STD140_MIN_ALIGNMENT: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldShape {
    Base(BaseType),
    Aggregate(Arc<StructLayout>),
}

impl FieldShape {
    /// `(size, alignment)` of a single element.
    pub fn footprint(&self) -> (u32, u32) {
        match self {
            FieldShape::Base(base) => (base.size(), base.alignment()),
            FieldShape::Aggregate(layout) => (layout.size, layout.alignment),
        }
    }

    pub fn as_aggregate(&self) -> Option<&Arc<StructLayout>> {
        match self {
            FieldShape::Aggregate(layout) => Some(layout),
            FieldShape::Base(_) => None,
        }
    }

    pub fn as_base(&self) -> Option<BaseType> {
        match self {
            FieldShape::Base(base) => Some(*base),
            FieldShape::Aggregate(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayLayout {
    pub length: u32,
    pub stride: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    pub name: String,
    pub type_name: String,
    pub shape: FieldShape,
    pub offset: u32,
    /// Whole footprint, all elements included for arrays.
    pub size: u32,
    pub alignment: u32,
    pub array: Option<ArrayLayout>,
    pub qualifiers: FieldQualifiers,
}

impl FieldLayout {
    /// Size of one element (the whole field for non-arrays).
    pub fn element_size(&self) -> u32 {
        self.shape.footprint().0
    }

    /// Byte offset of element `index`. Non-arrays only have element 0.
    pub fn element_offset(&self, index: u32) -> u32 {
        match self.array {
            Some(array) => self.offset + index * array.stride,
            None => self.offset,
        }
    }

    pub fn len(&self) -> u32 {
        self.array.map_or(1, |array| array.length)
    }

    pub fn is_array(&self) -> bool {
        self.array.is_some()
    }

    /// Texture units this field needs: one per opaque leaf, arrays and
    /// nested aggregates expanded.
    pub fn opaque_count(&self) -> u32 {
        let per_element = match &self.shape {
            FieldShape::Base(base) => u32::from(base.is_opaque()),
            FieldShape::Aggregate(layout) => layout.opaque_count(),
        };
        per_element.saturating_mul(self.len())
    }

    /// Array elements are packed tightly, so `[T; N]` reproduces the stride.
    pub fn is_tightly_packed(&self) -> bool {
        self.array
            .map_or(true, |array| array.stride == self.element_size())
    }
}

/// Layout of one aggregate, independent of any registered identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    /// Declared name in the unit that produced this layout.
    pub name: String,
    pub content_hash: String,
    pub kind: DeclarationKind,
    pub fields: Vec<FieldLayout>,
    pub size: u32,
    pub alignment: u32,
}

impl StructLayout {
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn field_offsets(&self) -> Vec<(&str, u32)> {
        self.fields
            .iter()
            .map(|field| (field.name.as_str(), field.offset))
            .collect()
    }

    pub fn opaque_count(&self) -> u32 {
        self.fields
            .iter()
            .map(FieldLayout::opaque_count)
            .fold(0, u32::saturating_add)
    }

    /// Whether any byte of the aggregate is not covered by a field.
    pub fn has_padding(&self) -> bool {
        let covered: u32 = self.fields.iter().map(|field| field.size).sum();
        covered != self.size
            || self
                .fields
                .iter()
                .any(|field| !field.is_tightly_packed())
    }

    /// Check size/alignment consistency, field bounds and field overlap.
    pub fn validate(&self) -> Result<(), LayoutViolation> {
        if self.alignment == 0 || self.size % self.alignment != 0 {
            return Err(LayoutViolation::UnalignedSize {
                size: self.size,
                alignment: self.alignment,
            });
        }
        let mut previous: Option<&FieldLayout> = None;
        for field in &self.fields {
            let end = field.offset + field.size;
            if end > self.size {
                return Err(LayoutViolation::FieldOutOfBounds {
                    field: field.name.clone(),
                    end,
                    size: self.size,
                });
            }
            if let Some(previous) = previous {
                if previous.offset + previous.size > field.offset {
                    return Err(LayoutViolation::Overlap {
                        first: previous.name.clone(),
                        second: field.name.clone(),
                    });
                }
            }
            previous = Some(field);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutViolation {
    #[error("size {size} is not a multiple of alignment {alignment}")]
    UnalignedSize { size: u32, alignment: u32 },
    #[error("field `{field}` ends at {end}, past the aggregate size {size}")]
    FieldOutOfBounds { field: String, end: u32, size: u32 },
    #[error("fields `{first}` and `{second}` overlap")]
    Overlap { first: String, second: String },
}

/// A laid-out aggregate bound to its registry identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutDescriptor {
    pub identity: TypeIdentity,
    pub layout: Arc<StructLayout>,
}

impl LayoutDescriptor {
    pub fn new(identity: TypeIdentity, layout: Arc<StructLayout>) -> Self {
        Self { identity, layout }
    }

    pub fn total_size(&self) -> u32 {
        self.layout.size
    }

    pub fn alignment(&self) -> u32 {
        self.layout.alignment
    }

    pub fn field_offset(&self, name: &str) -> Option<u32> {
        self.layout.field(name).map(|field| field.offset)
    }

    pub fn field_offsets(&self) -> Vec<(&str, u32)> {
        self.layout.field_offsets()
    }

    pub fn validate(&self) -> Result<(), LayoutViolation> {
        self.layout.validate()
    }
}

/// std140 stride of an array whose elements have the given footprint, or
/// `None` if it does not fit in 32 bits.
pub fn array_stride(element_size: u32, element_alignment: u32) -> Option<u32> {
    checked_round_up(checked_round_up(element_size, element_alignment)?, STD140_MIN_ALIGNMENT)
}

/// Lay out `declaration`. `nested` maps every aggregate field type name to
/// its already computed layout.
pub fn compile_layout(
    declaration: &TypeDeclaration,
    content_hash: &str,
    nested: &HashMap<String, Arc<StructLayout>>,
) -> Result<StructLayout, CompileError> {
    let mut cursor = 0u32;
    let mut alignment = STD140_MIN_ALIGNMENT;
    let mut fields = Vec::with_capacity(declaration.fields.len());

    for field in &declaration.fields {
        let shape = match field.base_type() {
            Some(base) => FieldShape::Base(base),
            None => {
                let layout = nested.get(&field.type_name).ok_or_else(|| CompileError::UnresolvedType {
                    type_name: declaration.name.clone(),
                    dependency: field.type_name.clone(),
                })?;
                FieldShape::Aggregate(Arc::clone(layout))
            }
        };

        let overflow = || CompileError::LayoutOverflow {
            type_name: declaration.name.clone(),
            field: field.field_name.clone(),
        };

        let (element_size, element_alignment) = shape.footprint();
        let (size, field_alignment, array) = match field.array_length {
            Some(length) => {
                let stride = array_stride(element_size, element_alignment).ok_or_else(overflow)?;
                (
                    stride.checked_mul(length).ok_or_else(overflow)?,
                    element_alignment.max(STD140_MIN_ALIGNMENT),
                    Some(ArrayLayout { length, stride }),
                )
            }
            None => (element_size, element_alignment, None),
        };

        let offset = checked_round_up(cursor, field_alignment).ok_or_else(overflow)?;
        cursor = offset.checked_add(size).ok_or_else(overflow)?;
        alignment = alignment.max(field_alignment);

        fields.push(FieldLayout {
            name: field.field_name.clone(),
            type_name: field.type_name.clone(),
            shape,
            offset,
            size,
            alignment: field_alignment,
            array,
            qualifiers: field.qualifiers,
        });
    }

    let size = checked_round_up(cursor, alignment).ok_or_else(|| CompileError::LayoutOverflow {
        type_name: declaration.name.clone(),
        field: fields.last().map(|field| field.name.clone()).unwrap_or_default(),
    })?;
    let layout = StructLayout {
        name: declaration.name.clone(),
        content_hash: content_hash.to_string(),
        kind: declaration.kind.clone(),
        fields,
        size,
        alignment,
    };
    log::debug!(
        "Laid out {}: size {}, alignment {}, offsets {:?}",
        layout.name,
        layout.size,
        layout.alignment,
        layout.field_offsets()
    );
    Ok(layout)
}
