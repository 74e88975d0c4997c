// Dirty tracking

use std::ops::Range;

/// Change tracking shared by generated wrappers and dynamic instances.
///
/// Mutation sets the flag implicitly; only the consumer clears it, after it
/// has pushed the new contents to the device.
pub trait DirtyState {
    fn is_dirty(&self) -> bool;
    fn set_clean(&mut self);
}

impl<T: DirtyState> DirtyState for [T] {
    fn is_dirty(&self) -> bool {
        self.iter().any(DirtyState::is_dirty)
    }

    fn set_clean(&mut self) {
        self.iter_mut().for_each(DirtyState::set_clean);
    }
}

impl<T: DirtyState, const N: usize> DirtyState for [T; N] {
    fn is_dirty(&self) -> bool {
        self.as_slice().is_dirty()
    }

    fn set_clean(&mut self) {
        self.as_mut_slice().set_clean();
    }
}

impl<T: DirtyState> DirtyState for Vec<T> {
    fn is_dirty(&self) -> bool {
        self.as_slice().is_dirty()
    }

    fn set_clean(&mut self) {
        self.as_mut_slice().set_clean();
    }
}

/// One modified leaf: its path from the root and where its bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtyField {
    /// `light.color`, `weights[2]`, `lights[1].radius`.
    pub path: String,
    pub offset: u32,
    pub size: u32,
    pub location: Option<u32>,
}

impl DirtyField {
    pub fn range(&self) -> Range<usize> {
        self.offset as usize..(self.offset + self.size) as usize
    }
}

/// Leaves modified since the last `set_clean`, in layout order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyFieldSet {
    fields: Vec<DirtyField>,
}

impl DirtyFieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: DirtyField) {
        self.fields.push(field);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DirtyField> {
        self.fields.iter()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.fields.iter().any(|field| field.path == path)
    }

    /// Byte ranges to upload, with touching ranges merged.
    pub fn ranges(&self) -> Vec<Range<usize>> {
        let mut ranges: Vec<Range<usize>> = self.fields.iter().map(DirtyField::range).collect();
        ranges.sort_by_key(|range| range.start);
        let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
                _ => merged.push(range),
            }
        }
        merged
    }
}
