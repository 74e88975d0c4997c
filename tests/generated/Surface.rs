// Generated by shader-layout. Do not edit.
//
// Type:     Surface (struct)
// Identity: f0c7c492a6523f51
// Hash:     dd7374c73a2693337dfdb4cb5c57b1ec5edd7104
// Layout:   std140, 80 bytes, 16-byte aligned
//
//       0  Material data
//      48  float dirty
//      64  vec3 lightColor
//      76  float light_color

#[repr(C)]
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SurfaceData {
    pub data_field: MaterialData,
    pub dirty: f32,
    pub __pad0: [u8; 12],
    pub light_color: [f32; 3],
    pub light_color_2: f32,
}

const _: () = assert!(core::mem::size_of::<SurfaceData>() == 80);
const _: () = assert!(core::mem::offset_of!(SurfaceData, data_field) == 0);
const _: () = assert!(core::mem::offset_of!(SurfaceData, dirty) == 48);
const _: () = assert!(core::mem::offset_of!(SurfaceData, light_color) == 64);
const _: () = assert!(core::mem::offset_of!(SurfaceData, light_color_2) == 76);

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    __data: SurfaceData,
    data_field: Material,
    __first_unit: Option<u32>,
    __dirty: [bool; 3],
}

impl Default for Surface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface {
    pub const SIZE: usize = 80;
    pub const ALIGNMENT: usize = 16;
    pub const PERSISTENT_ID: &'static str = "f0c7c492a6523f51";

    pub fn new() -> Self {
        let data: SurfaceData = bytemuck::Zeroable::zeroed();
        Self {
            __data: data,
            data_field: Material::new(),
            __first_unit: None,
            __dirty: [false; 3],
        }
    }

    pub fn data_field(&self) -> &Material {
        &self.data_field
    }

    pub fn data_field_mut(&mut self) -> &mut Material {
        &mut self.data_field
    }

    /// `dirty` at offset 48.
    pub fn dirty(&self) -> f32 {
        self.__data.dirty
    }

    pub fn set_dirty(&mut self, value: f32) {
        self.__data.dirty = value;
        self.__dirty[0] = true;
    }

    /// `lightColor` at offset 64.
    pub fn light_color(&self) -> [f32; 3] {
        self.__data.light_color
    }

    pub fn set_light_color(&mut self, value: [f32; 3]) {
        self.__data.light_color = value;
        self.__dirty[1] = true;
    }

    /// `light_color` at offset 76.
    pub fn light_color_2(&self) -> f32 {
        self.__data.light_color_2
    }

    pub fn set_light_color_2(&mut self, value: f32) {
        self.__data.light_color_2 = value;
        self.__dirty[2] = true;
    }

    /// Give the samplers of this struct consecutive texture units from `first`.
    pub fn bind_texture_units(&mut self, first: u32) {
        self.__first_unit = Some(first);
        self.data_field.bind_texture_units(first);
    }

    /// Plain-data image with every child's current values.
    pub fn data(&self) -> SurfaceData {
        let mut data = self.__data;
        data.data_field = self.data_field.data();
        data
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
        self.data_field.collect_dirty_fields(&format!("{}data.", prefix), base, set);
        if self.__dirty[0] {
            set.push(shader_layout::DirtyField {
                path: format!("{}dirty", prefix),
                offset: base + 48,
                size: 4,
                location: None,
            });
        }
        if self.__dirty[1] {
            set.push(shader_layout::DirtyField {
                path: format!("{}lightColor", prefix),
                offset: base + 64,
                size: 12,
                location: None,
            });
        }
        if self.__dirty[2] {
            set.push(shader_layout::DirtyField {
                path: format!("{}light_color", prefix),
                offset: base + 76,
                size: 4,
                location: None,
            });
        }
    }
}

impl shader_layout::DirtyState for Surface {
    fn is_dirty(&self) -> bool {
        self.__dirty.iter().any(|dirty| *dirty) || shader_layout::DirtyState::is_dirty(&self.data_field)
    }

    fn set_clean(&mut self) {
        self.__dirty = [false; 3];
        shader_layout::DirtyState::set_clean(&mut self.data_field);
    }
}
