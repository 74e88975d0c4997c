// Generated by shader-layout. Do not edit.
//
// Type:     Material (struct)
// Identity: d32abf53ed3639d6
// Hash:     2d7e6e22939c70613258590197b3236abd2f0de8
// Layout:   std140, 48 bytes, 16-byte aligned
//
//       0  sampler2D albedo
//      16  bool[2] flags

#[repr(C)]
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialFlagsElement {
    pub value: u32,
    pub _pad: [u8; 12],
}

#[repr(C)]
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialData {
    pub albedo: i32,
    pub __pad0: [u8; 12],
    pub flags: [MaterialFlagsElement; 2],
}

const _: () = assert!(core::mem::size_of::<MaterialData>() == 48);
const _: () = assert!(core::mem::offset_of!(MaterialData, albedo) == 0);
const _: () = assert!(core::mem::offset_of!(MaterialData, flags) == 16);

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    __data: MaterialData,
    albedo: Option<shader_layout::TextureHandle>,
    __first_unit: Option<u32>,
    __dirty: [bool; 3],
}

impl Default for Material {
    fn default() -> Self {
        Self::new()
    }
}

impl Material {
    pub const SIZE: usize = 48;
    pub const ALIGNMENT: usize = 16;
    pub const PERSISTENT_ID: &'static str = "d32abf53ed3639d6";

    pub fn new() -> Self {
        let data: MaterialData = bytemuck::Zeroable::zeroed();
        Self {
            __data: data,
            albedo: None,
            __first_unit: None,
            __dirty: [false; 3],
        }
    }

    pub fn albedo(&self) -> Option<shader_layout::TextureHandle> {
        self.albedo
    }

    pub fn set_albedo(&mut self, handle: shader_layout::TextureHandle, registrar: &mut dyn shader_layout::HandleRegistrar) {
        self.albedo = Some(handle);
        if let Some(first) = self.__first_unit {
            registrar.register_handle("albedo", Some(shader_layout::TextureTarget::Texture2D), first, handle);
        }
        self.__dirty[0] = true;
    }

    /// `flags` element at offset 16 + index * 16.
    pub fn flags(&self, index: usize) -> Result<bool, shader_layout::AccessError> {
        if index >= 2 {
            return Err(Self::out_of_range("flags", index, 2));
        }
        Ok(self.__data.flags[index].value != 0)
    }

    pub fn set_flags(&mut self, index: usize, value: bool) -> Result<(), shader_layout::AccessError> {
        if index >= 2 {
            return Err(Self::out_of_range("flags", index, 2));
        }
        self.__data.flags[index].value = u32::from(value);
        self.__dirty[1 + index] = true;
        Ok(())
    }

    /// Give the samplers of this struct consecutive texture units from `first`.
    pub fn bind_texture_units(&mut self, first: u32) {
        self.__first_unit = Some(first);
        self.__data.albedo = first as i32;
    }

    /// Plain-data image with every child's current values.
    pub fn data(&self) -> MaterialData {
        self.__data
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bytemuck::bytes_of(&self.data()).to_vec()
    }

    /// Leaves modified since the last `set_clean`, with absolute offsets.
    pub fn dirty_fields(&self) -> shader_layout::DirtyFieldSet {
        let mut set = shader_layout::DirtyFieldSet::new();
        self.collect_dirty_fields("", 0, &mut set);
        set
    }

    #[doc(hidden)]
    pub fn collect_dirty_fields(&self, prefix: &str, base: u32, set: &mut shader_layout::DirtyFieldSet) {
        if self.__dirty[0] {
            set.push(shader_layout::DirtyField {
                path: format!("{}albedo", prefix),
                offset: base,
                size: 4,
                location: None,
            });
        }
        for index in 0..2 {
            if self.__dirty[1 + index] {
                set.push(shader_layout::DirtyField {
                    path: format!("{}flags[{}]", prefix, index),
                    offset: base + 16 + index as u32 * 16,
                    size: 4,
                    location: None,
                });
            }
        }
    }

    fn out_of_range(field: &str, index: usize, len: usize) -> shader_layout::AccessError {
        shader_layout::AccessError::IndexOutOfRange { field: field.to_string(), index, len }
    }
}

impl shader_layout::DirtyState for Material {
    fn is_dirty(&self) -> bool {
        self.__dirty.iter().any(|dirty| *dirty)
    }

    fn set_clean(&mut self) {
        self.__dirty = [false; 3];
    }
}
