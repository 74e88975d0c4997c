// GLSL base types and their std140 footprint
//
// Every type that is not a user aggregate lives here: scalars, vectors,
// matrices and opaque handles (samplers, images, atomic counters).

use std::fmt;

/// Component type of scalars, vectors and matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int,
    Uint,
    Float,
    Double,
}

impl ScalarKind {
    /// Byte size of one component. `bool` occupies a full 32-bit word.
    pub const fn size(self) -> u32 {
        match self {
            ScalarKind::Double => 8,
            _ => 4,
        }
    }

    /// Rust type used for one component in generated plain-data structs.
    pub const fn host_type(self) -> &'static str {
        match self {
            ScalarKind::Bool | ScalarKind::Uint => "u32",
            ScalarKind::Int => "i32",
            ScalarKind::Float => "f32",
            ScalarKind::Double => "f64",
        }
    }

    const fn glsl_name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::Uint => "uint",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
        }
    }

    const fn vector_prefix(self) -> &'static str {
        match self {
            ScalarKind::Bool => "b",
            ScalarKind::Int => "i",
            ScalarKind::Uint => "u",
            ScalarKind::Float => "",
            ScalarKind::Double => "d",
        }
    }
}

/// Texture target an opaque sampler or image binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture1D,
    Texture2D,
    Texture3D,
    CubeMap,
    Rectangle,
    Texture1DArray,
    Texture2DArray,
    CubeMapArray,
    Buffer,
    Multisample2D,
    Multisample2DArray,
}

impl TextureTarget {
    fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "1D" => Self::Texture1D,
            "2D" => Self::Texture2D,
            "3D" => Self::Texture3D,
            "Cube" => Self::CubeMap,
            "2DRect" => Self::Rectangle,
            "1DArray" => Self::Texture1DArray,
            "2DArray" => Self::Texture2DArray,
            "CubeArray" => Self::CubeMapArray,
            "Buffer" => Self::Buffer,
            "2DMS" => Self::Multisample2D,
            "2DMSArray" => Self::Multisample2DArray,
            _ => return None,
        })
    }
}

/// Opaque handle types. They carry no packed data of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpaqueKind {
    Sampler(TextureTarget),
    Image(TextureTarget),
    AtomicCounter,
}

impl OpaqueKind {
    pub fn texture_target(self) -> Option<TextureTarget> {
        match self {
            OpaqueKind::Sampler(target) | OpaqueKind::Image(target) => Some(target),
            OpaqueKind::AtomicCounter => None,
        }
    }
}

/// A GLSL type that is not a user-declared aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Scalar(ScalarKind),
    Vector { kind: ScalarKind, lanes: u8 },
    /// `columns` x `rows`, stored column-major as in GLSL.
    Matrix { kind: ScalarKind, columns: u8, rows: u8 },
    Opaque(OpaqueKind),
}

impl BaseType {
    /// Parse a GLSL type name. Returns `None` for user aggregates and
    /// unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        if let Some(kind) = parse_scalar(name) {
            return Some(BaseType::Scalar(kind));
        }
        if let Some(vector) = parse_vector(name) {
            return Some(vector);
        }
        if let Some(matrix) = parse_matrix(name) {
            return Some(matrix);
        }
        parse_opaque(name).map(BaseType::Opaque)
    }

    /// Whether `name` is a base type (including opaque handles).
    pub fn is_base_type(name: &str) -> bool {
        Self::parse(name).is_some()
    }

    pub fn is_opaque(self) -> bool {
        matches!(self, BaseType::Opaque(_))
    }

    /// Component type, `None` for opaque handles.
    pub fn scalar_kind(self) -> Option<ScalarKind> {
        match self {
            BaseType::Scalar(kind) => Some(kind),
            BaseType::Vector { kind, .. } | BaseType::Matrix { kind, .. } => Some(kind),
            BaseType::Opaque(_) => None,
        }
    }

    /// std140 base alignment in bytes.
    pub fn alignment(self) -> u32 {
        match self {
            BaseType::Scalar(kind) => kind.size(),
            BaseType::Vector { kind, lanes } => match lanes {
                2 => 2 * kind.size(),
                _ => 4 * kind.size(),
            },
            BaseType::Matrix { .. } => self.column_stride(),
            // Treated as a 32-bit scalar slot.
            BaseType::Opaque(_) => 4,
        }
    }

    /// Bytes of data the type occupies, excluding trailing padding.
    pub fn size(self) -> u32 {
        match self {
            BaseType::Scalar(kind) => kind.size(),
            BaseType::Vector { kind, lanes } => u32::from(lanes) * kind.size(),
            BaseType::Matrix { columns, .. } => u32::from(columns) * self.column_stride(),
            BaseType::Opaque(_) => 4,
        }
    }

    /// Byte distance between matrix columns. Columns are laid out as an
    /// array of column vectors, so each one is rounded up to 16 bytes.
    pub fn column_stride(self) -> u32 {
        match self {
            BaseType::Matrix { kind, rows, .. } => {
                let column = BaseType::Vector { kind, lanes: rows };
                round_up(column.alignment().max(16), 16)
            }
            _ => self.size(),
        }
    }

    /// Rust type of this value inside a generated `#[repr(C)]` struct.
    ///
    /// Matrix columns are widened to the column stride so the Rust
    /// footprint matches the std140 one exactly.
    pub fn host_type(self) -> String {
        match self {
            BaseType::Scalar(kind) => kind.host_type().to_string(),
            BaseType::Vector { kind, lanes } => format!("[{}; {}]", kind.host_type(), lanes),
            BaseType::Matrix { kind, columns, .. } => {
                let lanes = self.column_stride() / kind.size();
                format!("[[{}; {}]; {}]", kind.host_type(), lanes, columns)
            }
            BaseType::Opaque(_) => "i32".to_string(),
        }
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            BaseType::Scalar(kind) => f.write_str(kind.glsl_name()),
            BaseType::Vector { kind, lanes } => write!(f, "{}vec{}", kind.vector_prefix(), lanes),
            BaseType::Matrix {
                kind,
                columns,
                rows,
            } => {
                let prefix = if kind == ScalarKind::Double { "d" } else { "" };
                if columns == rows {
                    write!(f, "{}mat{}", prefix, columns)
                } else {
                    write!(f, "{}mat{}x{}", prefix, columns, rows)
                }
            }
            BaseType::Opaque(OpaqueKind::AtomicCounter) => f.write_str("atomic_uint"),
            BaseType::Opaque(OpaqueKind::Sampler(target)) => write!(f, "sampler({:?})", target),
            BaseType::Opaque(OpaqueKind::Image(target)) => write!(f, "image({:?})", target),
        }
    }
}

/// Round `value` up to the next multiple of `alignment`.
pub const fn round_up(value: u32, alignment: u32) -> u32 {
    if alignment == 0 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

/// [`round_up`] that reports overflow instead of wrapping.
pub const fn checked_round_up(value: u32, alignment: u32) -> Option<u32> {
    if alignment == 0 {
        return Some(value);
    }
    value.div_ceil(alignment).checked_mul(alignment)
}

fn parse_scalar(name: &str) -> Option<ScalarKind> {
    Some(match name {
        "bool" => ScalarKind::Bool,
        "int" => ScalarKind::Int,
        "uint" => ScalarKind::Uint,
        "float" => ScalarKind::Float,
        "double" => ScalarKind::Double,
        _ => return None,
    })
}

fn parse_dimension(text: &str) -> Option<u8> {
    match text {
        "2" => Some(2),
        "3" => Some(3),
        "4" => Some(4),
        _ => None,
    }
}

fn parse_vector(name: &str) -> Option<BaseType> {
    let (kind, rest) = match name.as_bytes().first()? {
        b'b' => (ScalarKind::Bool, &name[1..]),
        b'i' => (ScalarKind::Int, &name[1..]),
        b'u' => (ScalarKind::Uint, &name[1..]),
        b'd' => (ScalarKind::Double, &name[1..]),
        _ => (ScalarKind::Float, name),
    };
    let lanes = parse_dimension(rest.strip_prefix("vec")?)?;
    Some(BaseType::Vector { kind, lanes })
}

fn parse_matrix(name: &str) -> Option<BaseType> {
    let (kind, rest) = match name.strip_prefix('d') {
        Some(rest) => (ScalarKind::Double, rest),
        None => (ScalarKind::Float, name),
    };
    let dims = rest.strip_prefix("mat")?;
    let (columns, rows) = match dims.split_once('x') {
        Some((columns, rows)) => (parse_dimension(columns)?, parse_dimension(rows)?),
        None => {
            let n = parse_dimension(dims)?;
            (n, n)
        }
    };
    Some(BaseType::Matrix {
        kind,
        columns,
        rows,
    })
}

fn parse_opaque(name: &str) -> Option<OpaqueKind> {
    if name == "atomic_uint" {
        return Some(OpaqueKind::AtomicCounter);
    }
    let integer_stripped = name.strip_prefix('i').or_else(|| name.strip_prefix('u'));
    std::iter::once(name)
        .chain(integer_stripped)
        .find_map(|candidate| {
            if let Some(suffix) = candidate.strip_prefix("sampler") {
                let suffix = suffix.strip_suffix("Shadow").unwrap_or(suffix);
                return TextureTarget::from_suffix(suffix).map(OpaqueKind::Sampler);
            }
            let suffix = candidate.strip_prefix("image")?;
            TextureTarget::from_suffix(suffix).map(OpaqueKind::Image)
        })
}
