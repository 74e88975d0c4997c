// Binding collaborators
//
// Interfaces to the host graphics layer plus in-process implementations:
// a binding-point pool for uniform blocks, texture-unit assignment for
// sampler uniforms, a handle table and a CPU staging transport.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use anyhow::Result;

use crate::compiler::glsl_types::TextureTarget;
use crate::compiler::layout::FieldLayout;
use crate::error::BindingError;
use crate::runtime::{DirtyFieldSet, DirtyState, StructInstance};

/// Uniform-block binding points per program.
pub const DEFAULT_MAX_BINDING_POINTS: u32 = 72;

/// Texture units available to one program.
pub const DEFAULT_MAX_TEXTURE_UNITS: u32 = 32;

// =============================================================================
// BINDING POINTS
// =============================================================================

/// Hands out uniform-block binding slots.
pub trait SlotAllocator {
    /// Reserve `explicit` if given, otherwise the lowest free slot.
    fn allocate(&mut self, explicit: Option<u32>) -> Result<u32, BindingError>;
}

/// Fixed-size pool of binding points for one program.
#[derive(Debug, Clone)]
pub struct BindingPointPool {
    max: u32,
    used: BTreeSet<u32>,
}

impl Default for BindingPointPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BINDING_POINTS)
    }
}

impl BindingPointPool {
    pub fn new(max: u32) -> Self {
        Self {
            max,
            used: BTreeSet::new(),
        }
    }

    pub fn release(&mut self, slot: u32) {
        self.used.remove(&slot);
    }

    pub fn release_all(&mut self) {
        self.used.clear();
    }

    pub fn in_use(&self) -> usize {
        self.used.len()
    }

    pub fn is_used(&self, slot: u32) -> bool {
        self.used.contains(&slot)
    }
}

impl SlotAllocator for BindingPointPool {
    fn allocate(&mut self, explicit: Option<u32>) -> Result<u32, BindingError> {
        let slot = match explicit {
            Some(slot) if slot >= self.max => {
                return Err(BindingError::SlotOutOfRange { slot, max: self.max });
            }
            Some(slot) if self.used.contains(&slot) => return Err(BindingError::SlotConflict(slot)),
            Some(slot) => slot,
            None => (0..self.max)
                .find(|slot| !self.used.contains(slot))
                .ok_or(BindingError::Exhausted)?,
        };
        self.used.insert(slot);
        log::debug!("Allocated binding point {}", slot);
        Ok(slot)
    }
}

// =============================================================================
// TEXTURE UNITS
// =============================================================================

/// Assign texture units to the opaque fields of a free-uniform set.
///
/// Explicit `binding` qualifiers are honoured first; the remaining fields
/// take the lowest free units in declaration order. A field spans one unit
/// per opaque leaf: an array of N samplers takes N consecutive units, and a
/// struct uniform takes one unit for every sampler it contains, in
/// declaration order, starting at the returned one.
pub fn assign_texture_units(fields: &[FieldLayout], max_units: u32) -> Result<BTreeMap<String, u32>, BindingError> {
    let opaque: Vec<(&FieldLayout, u32)> = fields
        .iter()
        .map(|field| (field, field.opaque_count()))
        .filter(|(_, count)| *count > 0)
        .collect();

    let mut taken = BTreeSet::new();
    let mut units = BTreeMap::new();

    // Reserve explicit bindings
    for (field, count) in opaque.iter().filter(|(field, _)| field.qualifiers.binding.is_some()) {
        let first = field.qualifiers.binding.unwrap_or_default();
        let end = first.checked_add(*count).ok_or(BindingError::Exhausted)?;
        if end > max_units {
            return Err(BindingError::SlotOutOfRange {
                slot: end - 1,
                max: max_units,
            });
        }
        if let Some(conflict) = (first..end).find(|unit| taken.contains(unit)) {
            return Err(BindingError::SlotConflict(conflict));
        }
        taken.extend(first..end);
        units.insert(field.name.clone(), first);
    }

    // Fill the rest from the lowest free unit
    for (field, count) in opaque.iter().filter(|(field, _)| field.qualifiers.binding.is_none()) {
        let len = *count;
        let first = (0..max_units)
            .find(|&start| {
                start.checked_add(len).is_some_and(|end| end <= max_units)
                    && (start..start + len).all(|unit| !taken.contains(&unit))
            })
            .ok_or(BindingError::Exhausted)?;
        taken.extend(first..first + len);
        units.insert(field.name.clone(), first);
    }

    Ok(units)
}

// =============================================================================
// TEXTURE HANDLES
// =============================================================================

/// Opaque texture handle owned by the host graphics layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u64);

/// Receives texture handles assigned to sampler fields.
pub trait HandleRegistrar {
    fn register_handle(&mut self, field: &str, target: Option<TextureTarget>, unit: u32, handle: TextureHandle);
}

/// Texture unit -> bound handle, for hosts that bind lazily before a draw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleTable {
    bound: BTreeMap<u32, (Option<TextureTarget>, TextureHandle)>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, unit: u32) -> Option<(Option<TextureTarget>, TextureHandle)> {
        self.bound.get(&unit).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, Option<TextureTarget>, TextureHandle)> + '_ {
        self.bound
            .iter()
            .map(|(unit, (target, handle))| (*unit, *target, *handle))
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}

impl HandleRegistrar for HandleTable {
    fn register_handle(&mut self, field: &str, target: Option<TextureTarget>, unit: u32, handle: TextureHandle) {
        log::debug!("Texture unit {} <- {:?} ({})", unit, handle, field);
        self.bound.insert(unit, (target, handle));
    }
}

// =============================================================================
// BUFFER TRANSPORT
// =============================================================================

/// Pushes instance contents to wherever the device reads them from.
pub trait BufferTransport {
    fn upload(&mut self, instance: &StructInstance, dirty: &DirtyFieldSet) -> Result<()>;
}

/// Upload `instance` if anything changed, then mark it clean. Returns
/// whether an upload happened.
pub fn synchronize(instance: &mut StructInstance, transport: &mut dyn BufferTransport) -> Result<bool> {
    if !instance.is_dirty() {
        return Ok(false);
    }
    let dirty = instance.dirty_fields();
    transport.upload(instance, &dirty)?;
    instance.set_clean();
    Ok(true)
}

/// Host-visible copy of a uniform buffer.
///
/// Only the byte ranges of dirty leaves are copied, the way a mapped
/// device buffer would be patched.
#[derive(Debug, Clone)]
pub struct StagingBuffer {
    bytes: Vec<u8>,
    uploads: usize,
    copied: usize,
}

impl StagingBuffer {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
            uploads: 0,
            copied: 0,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of uploads received.
    pub fn uploads(&self) -> usize {
        self.uploads
    }

    /// Total bytes copied over all uploads.
    pub fn bytes_copied(&self) -> usize {
        self.copied
    }

    fn copy_range(&mut self, source: &[u8], range: Range<usize>) {
        self.bytes[range.clone()].copy_from_slice(&source[range.clone()]);
        self.copied += range.len();
    }
}

impl BufferTransport for StagingBuffer {
    fn upload(&mut self, instance: &StructInstance, dirty: &DirtyFieldSet) -> Result<()> {
        let size = instance.schema().size as usize;
        if size > self.bytes.len() {
            anyhow::bail!(
                "{} needs {} bytes, staging buffer holds {}",
                instance.type_name(),
                size,
                self.bytes.len()
            );
        }

        // Pack once, then copy only what changed
        let image = instance.to_bytes();
        for range in dirty.ranges() {
            self.copy_range(&image, range);
        }
        self.uploads += 1;
        Ok(())
    }
}
