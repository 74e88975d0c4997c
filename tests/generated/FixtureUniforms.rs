// Generated by shader-layout. Do not edit.
//
// Type:     FixtureUniforms (free uniforms)
// Identity: 3ad5b9aff8484213
// Hash:     66d0f502a44218f537df94026a760970d6cff4ba
// Layout:   std140, 96 bytes, 16-byte aligned
//
//       0  float exposure
//       4  sampler2D shadow
//      16  Surface surface

#[repr(C)]
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FixtureUniformsData {
    pub exposure: f32,
    pub shadow: i32,
    pub __pad0: [u8; 8],
    pub surface: SurfaceData,
}

const _: () = assert!(core::mem::size_of::<FixtureUniformsData>() == 96);
const _: () = assert!(core::mem::offset_of!(FixtureUniformsData, exposure) == 0);
const _: () = assert!(core::mem::offset_of!(FixtureUniformsData, shadow) == 4);
const _: () = assert!(core::mem::offset_of!(FixtureUniformsData, surface) == 16);

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureUniforms {
    __data: FixtureUniformsData,
    shadow: Option<shader_layout::TextureHandle>,
    surface: Surface,
    __locations: [Option<u32>; 3],
    __dirty: [bool; 2],
}

impl Default for FixtureUniforms {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureUniforms {
    pub const SIZE: usize = 96;
    pub const ALIGNMENT: usize = 16;
    pub const PERSISTENT_ID: &'static str = "3ad5b9aff8484213";

    pub fn new() -> Self {
        let mut data: FixtureUniformsData = bytemuck::Zeroable::zeroed();
        data.shadow = 0;
        let mut this = Self {
            __data: data,
            shadow: None,
            surface: Surface::new(),
            __locations: [Some(0), None, None],
            __dirty: [false; 2],
        };
        this.surface.bind_texture_units(1);
        this
    }

    /// `exposure` at offset 0.
    pub fn exposure(&self) -> f32 {
        self.__data.exposure
    }

    pub fn set_exposure(&mut self, value: f32) {
        if self.__locations[0].is_none() {
            return;
        }
        self.__data.exposure = value;
        self.__dirty[0] = true;
    }

    pub fn shadow(&self) -> Option<shader_layout::TextureHandle> {
        self.shadow
    }

    pub fn set_shadow(&mut self, handle: shader_layout::TextureHandle, registrar: &mut dyn shader_layout::HandleRegistrar) {
        if self.__locations[1].is_none() {
            return;
        }
        self.shadow = Some(handle);
        registrar.register_handle("shadow", Some(shader_layout::TextureTarget::Texture2D), 0, handle);
        self.__dirty[1] = true;
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    /// Record the host location of a uniform. Returns `false` for unknown names.
    pub fn locate(&mut self, field: &str, location: u32) -> bool {
        let index = match field {
            "exposure" => 0,
            "shadow" => 1,
            "surface" => 2,
            _ => return false,
        };
        self.__locations[index] = Some(location);
        true
    }

    pub fn location(&self, field: &str) -> Option<u32> {
        match field {
            "exposure" => self.__locations[0],
            "shadow" => self.__locations[1],
            "surface" => self.__locations[2],
            _ => None,
        }
    }

    /// Plain-data image with every child's current values.
    pub fn data(&self) -> FixtureUniformsData {
        let mut data = self.__data;
        data.surface = self.surface.data();
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
        if self.__dirty[0] {
            set.push(shader_layout::DirtyField {
                path: format!("{}exposure", prefix),
                offset: base,
                size: 4,
                location: self.__locations[0],
            });
        }
        if self.__dirty[1] {
            set.push(shader_layout::DirtyField {
                path: format!("{}shadow", prefix),
                offset: base + 4,
                size: 4,
                location: self.__locations[1],
            });
        }
        self.surface.collect_dirty_fields(&format!("{}surface.", prefix), base + 16, set);
    }
}

impl shader_layout::DirtyState for FixtureUniforms {
    fn is_dirty(&self) -> bool {
        self.__dirty.iter().any(|dirty| *dirty) || shader_layout::DirtyState::is_dirty(&self.surface)
    }

    fn set_clean(&mut self) {
        self.__dirty = [false; 2];
        shader_layout::DirtyState::set_clean(&mut self.surface);
    }
}
