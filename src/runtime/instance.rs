// Dynamic struct instances
//
// A `StructInstance` holds the values of one emitted type and mirrors the
// generated wrapper's accessors at runtime: bounds-checked element access,
// owned child instances, opaque handles and per-leaf dirty flags.
//
// Detached instances accept every write. Once attached to a host binding,
// writes to leaves without a location fail with `UnlocatedField` and leave
// the instance untouched.

use std::sync::Arc;

use super::dirty::{DirtyField, DirtyFieldSet, DirtyState};
use super::schema::{FieldKind, FieldSchema, TypeSchema};
use super::value::UniformValue;
use crate::bindings::{HandleRegistrar, TextureHandle};
use crate::error::AccessError;

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Values(Vec<UniformValue>),
    Handles(Vec<Option<TextureHandle>>),
    Children(Vec<StructInstance>),
}

#[derive(Debug, Clone, PartialEq)]
struct FieldState {
    slot: Slot,
    /// One flag per element. Unused for aggregates, which track their own.
    dirty: Vec<bool>,
    location: Option<u32>,
    /// First texture unit of an opaque field, per instance.
    unit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructInstance {
    schema: Arc<TypeSchema>,
    fields: Vec<FieldState>,
    attached: bool,
}

impl StructInstance {
    /// Zero-initialised, clean and detached.
    ///
    /// Struct uniforms of a free-uniform set hand their texture units down
    /// to the samplers they contain, one unit per opaque leaf.
    pub fn new(schema: Arc<TypeSchema>) -> Self {
        let fields = schema
            .fields
            .iter()
            .map(|field| {
                let len = field.len();
                let slot = match &field.kind {
                    FieldKind::Value(base) => match UniformValue::zero(*base) {
                        Some(zero) => Slot::Values(vec![zero; len]),
                        None => Slot::Handles(vec![None; len]),
                    },
                    FieldKind::Handle(_) => Slot::Handles(vec![None; len]),
                    FieldKind::Aggregate(child) => {
                        let mut children: Vec<StructInstance> =
                            (0..len).map(|_| StructInstance::new(Arc::clone(child))).collect();
                        if let Some(first) = field.texture_unit {
                            children
                                .iter_mut()
                                .fold(first, |next, child| child.assign_units(next));
                        }
                        Slot::Children(children)
                    }
                };
                FieldState {
                    slot,
                    dirty: vec![false; len],
                    location: field.location,
                    unit: field.texture_unit,
                }
            })
            .collect();

        Self {
            schema,
            fields,
            attached: false,
        }
    }

    /// Give opaque leaves consecutive units from `next` in declaration
    /// order. Returns the first unit past this instance.
    fn assign_units(&mut self, mut next: u32) -> u32 {
        let schema = Arc::clone(&self.schema);
        for (field, state) in schema.fields.iter().zip(&mut self.fields) {
            match &mut state.slot {
                Slot::Children(children) => {
                    for child in children.iter_mut() {
                        next = child.assign_units(next);
                    }
                }
                _ if matches!(field.kind, FieldKind::Handle(_)) => {
                    state.unit = Some(next);
                    next += field.len() as u32;
                }
                _ => {}
            }
        }
        next
    }

    /// Texture unit of element `element` of an opaque field, once assigned.
    pub fn texture_unit(&self, field: &str, element: usize) -> Result<Option<u32>, AccessError> {
        let (index, schema) = self.lookup(field)?;
        bounds(&schema, element)?;
        Ok(self.fields[index].unit.map(|unit| unit + element as u32))
    }

    pub fn schema(&self) -> &Arc<TypeSchema> {
        &self.schema
    }

    pub fn type_name(&self) -> &str {
        self.schema.name()
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Bind to the host. From now on unlocated leaves reject writes.
    pub fn attach(&mut self) {
        self.attached = true;
        for state in &mut self.fields {
            if let Slot::Children(children) = &mut state.slot {
                children.iter_mut().for_each(StructInstance::attach);
            }
        }
    }

    /// Give every leaf its absolute byte offset as location. Used for
    /// block members, which are addressed inside the bound buffer.
    pub fn locate_at_offsets(&mut self) {
        self.locate_from(0);
    }

    fn locate_from(&mut self, base: u32) {
        let schema = Arc::clone(&self.schema);
        for (field, state) in schema.fields.iter().zip(&mut self.fields) {
            match &mut state.slot {
                Slot::Children(children) => {
                    for (index, child) in children.iter_mut().enumerate() {
                        child.locate_from(base + field.element_offset(index));
                    }
                }
                _ => state.location = Some(base + field.offset),
            }
        }
    }

    /// Assign a host location to a leaf field.
    pub fn locate(&mut self, field: &str, location: u32) -> Result<(), AccessError> {
        let (index, schema) = self.lookup(field)?;
        if matches!(schema.kind, FieldKind::Aggregate(_)) {
            return Err(mismatch(&schema, "a leaf location"));
        }
        self.fields[index].location = Some(location);
        Ok(())
    }

    pub fn location(&self, field: &str) -> Result<Option<u32>, AccessError> {
        let (index, _) = self.lookup(field)?;
        Ok(self.fields[index].location)
    }

    // -------------------------------------------------------------------------
    // values
    // -------------------------------------------------------------------------

    pub fn get(&self, field: &str) -> Result<&UniformValue, AccessError> {
        let (index, schema) = self.lookup(field)?;
        if schema.is_array() {
            return Err(mismatch(&schema, "a single value"));
        }
        self.value_at(index, &schema, 0)
    }

    pub fn set(&mut self, field: &str, value: impl Into<UniformValue>) -> Result<(), AccessError> {
        let (index, schema) = self.lookup(field)?;
        if schema.is_array() {
            return Err(mismatch(&schema, "a single value"));
        }
        self.store(index, &schema, 0, value.into())
    }

    pub fn get_element(&self, field: &str, element: usize) -> Result<&UniformValue, AccessError> {
        let (index, schema) = self.lookup(field)?;
        check_element(&schema, element)?;
        self.value_at(index, &schema, element)
    }

    pub fn set_element(
        &mut self,
        field: &str,
        element: usize,
        value: impl Into<UniformValue>,
    ) -> Result<(), AccessError> {
        let (index, schema) = self.lookup(field)?;
        check_element(&schema, element)?;
        self.store(index, &schema, element, value.into())
    }

    fn value_at(&self, index: usize, schema: &FieldSchema, element: usize) -> Result<&UniformValue, AccessError> {
        match &self.fields[index].slot {
            Slot::Values(values) => Ok(&values[element]),
            _ => Err(mismatch(schema, "a value")),
        }
    }

    fn store(&mut self, index: usize, schema: &FieldSchema, element: usize, value: UniformValue) -> Result<(), AccessError> {
        let expected = match schema.kind {
            FieldKind::Value(base) => base,
            _ => return Err(mismatch(schema, &value.describe())),
        };
        if value.base_type() != expected || !value.is_well_formed() {
            return Err(mismatch(schema, &value.describe()));
        }
        self.check_located(index, schema)?;

        let state = &mut self.fields[index];
        if let Slot::Values(values) = &mut state.slot {
            values[element] = value;
            state.dirty[element] = true;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // opaque handles
    // -------------------------------------------------------------------------

    pub fn handle(&self, field: &str, element: usize) -> Result<Option<TextureHandle>, AccessError> {
        let (index, schema) = self.lookup(field)?;
        bounds(&schema, element)?;
        match &self.fields[index].slot {
            Slot::Handles(handles) => Ok(handles[element]),
            _ => Err(mismatch(&schema, "a texture handle")),
        }
    }

    /// Store a texture handle and hand it to the registrar under the
    /// field's texture unit.
    pub fn set_handle(
        &mut self,
        field: &str,
        element: usize,
        handle: TextureHandle,
        registrar: &mut dyn HandleRegistrar,
    ) -> Result<(), AccessError> {
        let (index, schema) = self.lookup(field)?;
        let FieldKind::Handle(opaque) = schema.kind else {
            return Err(mismatch(&schema, "a texture handle"));
        };
        bounds(&schema, element)?;
        self.check_located(index, &schema)?;

        let state = &mut self.fields[index];
        if let Slot::Handles(handles) = &mut state.slot {
            handles[element] = Some(handle);
            state.dirty[element] = true;
        }
        let unit = state.unit;
        match unit {
            Some(unit) => registrar.register_handle(&schema.name, opaque.texture_target(), unit + element as u32, handle),
            None => log::debug!("{}.{} has no texture unit, handle stored only", self.type_name(), field),
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // nested aggregates
    // -------------------------------------------------------------------------

    pub fn child(&self, field: &str) -> Result<&StructInstance, AccessError> {
        let (index, schema) = self.lookup(field)?;
        if schema.is_array() {
            return Err(mismatch(&schema, "a single aggregate"));
        }
        self.children(index, &schema).map(|children| &children[0])
    }

    pub fn child_mut(&mut self, field: &str) -> Result<&mut StructInstance, AccessError> {
        let (index, schema) = self.lookup(field)?;
        if schema.is_array() {
            return Err(mismatch(&schema, "a single aggregate"));
        }
        self.children_mut(index, &schema).map(|children| &mut children[0])
    }

    pub fn child_at(&self, field: &str, element: usize) -> Result<&StructInstance, AccessError> {
        let (index, schema) = self.lookup(field)?;
        check_element(&schema, element)?;
        self.children(index, &schema).map(|children| &children[element])
    }

    pub fn child_at_mut(&mut self, field: &str, element: usize) -> Result<&mut StructInstance, AccessError> {
        let (index, schema) = self.lookup(field)?;
        check_element(&schema, element)?;
        self.children_mut(index, &schema).map(|children| &mut children[element])
    }

    fn children(&self, index: usize, schema: &FieldSchema) -> Result<&[StructInstance], AccessError> {
        match &self.fields[index].slot {
            Slot::Children(children) => Ok(children),
            _ => Err(AccessError::NotAnAggregate {
                field: schema.name.clone(),
            }),
        }
    }

    fn children_mut(&mut self, index: usize, schema: &FieldSchema) -> Result<&mut [StructInstance], AccessError> {
        match &mut self.fields[index].slot {
            Slot::Children(children) => Ok(children),
            _ => Err(AccessError::NotAnAggregate {
                field: schema.name.clone(),
            }),
        }
    }

    // -------------------------------------------------------------------------
    // packing
    // -------------------------------------------------------------------------

    /// std140 image of the instance, exactly `size` bytes long.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.schema.size as usize];
        self.write_to(&mut out);
        out
    }

    /// Write the std140 image at the start of `out`.
    pub fn write_to(&self, out: &mut [u8]) {
        for (field, state) in self.schema.fields.iter().zip(&self.fields) {
            match &state.slot {
                Slot::Values(values) => {
                    for (element, value) in values.iter().enumerate() {
                        value.write_std140(&mut out[field.element_offset(element) as usize..]);
                    }
                }
                Slot::Handles(handles) => {
                    for element in 0..handles.len() {
                        let unit = state.unit.map_or(0, |unit| unit + element as u32) as i32;
                        let at = field.element_offset(element) as usize;
                        out[at..at + 4].copy_from_slice(bytemuck::bytes_of(&unit));
                    }
                }
                Slot::Children(children) => {
                    for (element, child) in children.iter().enumerate() {
                        child.write_to(&mut out[field.element_offset(element) as usize..]);
                    }
                }
            }
        }
    }

    /// Leaves modified since the last `set_clean`, with absolute offsets.
    pub fn dirty_fields(&self) -> DirtyFieldSet {
        let mut set = DirtyFieldSet::new();
        self.collect_dirty("", 0, &mut set);
        set
    }

    fn collect_dirty(&self, prefix: &str, base: u32, set: &mut DirtyFieldSet) {
        for (field, state) in self.schema.fields.iter().zip(&self.fields) {
            let path = |element: usize| match field.array {
                Some(_) => format!("{}{}[{}]", prefix, field.name, element),
                None => format!("{}{}", prefix, field.name),
            };
            match &state.slot {
                Slot::Children(children) => {
                    for (element, child) in children.iter().enumerate() {
                        let child_prefix = format!("{}.", path(element));
                        child.collect_dirty(&child_prefix, base + field.element_offset(element), set);
                    }
                }
                _ => {
                    for (element, _) in state.dirty.iter().enumerate().filter(|(_, dirty)| **dirty) {
                        set.push(DirtyField {
                            path: path(element),
                            offset: base + field.element_offset(element),
                            size: field.element_size(),
                            location: state.location.map(|location| location + element as u32),
                        });
                    }
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // helpers
    // -------------------------------------------------------------------------

    fn lookup(&self, field: &str) -> Result<(usize, FieldSchema), AccessError> {
        self.schema
            .field_index(field)
            .map(|index| (index, self.schema.fields[index].clone()))
            .ok_or_else(|| AccessError::NoSuchField {
                type_name: self.type_name().to_string(),
                field: field.to_string(),
            })
    }

    fn check_located(&self, index: usize, schema: &FieldSchema) -> Result<(), AccessError> {
        if self.attached && self.fields[index].location.is_none() {
            return Err(AccessError::UnlocatedField {
                field: schema.name.clone(),
            });
        }
        Ok(())
    }
}

impl DirtyState for StructInstance {
    fn is_dirty(&self) -> bool {
        self.fields.iter().any(|state| match &state.slot {
            Slot::Children(children) => children.is_dirty(),
            _ => state.dirty.iter().any(|dirty| *dirty),
        })
    }

    fn set_clean(&mut self) {
        for state in &mut self.fields {
            match &mut state.slot {
                Slot::Children(children) => children.set_clean(),
                _ => state.dirty.iter_mut().for_each(|dirty| *dirty = false),
            }
        }
    }
}

fn mismatch(schema: &FieldSchema, found: &str) -> AccessError {
    AccessError::TypeMismatch {
        field: schema.name.clone(),
        expected: schema.display_type(),
        found: found.to_string(),
    }
}

fn bounds(schema: &FieldSchema, element: usize) -> Result<(), AccessError> {
    if element >= schema.len() {
        return Err(AccessError::IndexOutOfRange {
            field: schema.name.clone(),
            index: element,
            len: schema.len(),
        });
    }
    Ok(())
}

fn check_element(schema: &FieldSchema, element: usize) -> Result<(), AccessError> {
    if !schema.is_array() {
        return Err(AccessError::NotAnArray {
            field: schema.name.clone(),
        });
    }
    bounds(schema, element)
}
