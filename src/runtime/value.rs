// Uniform values
//
// Host-side values for base-typed fields, backed by glam types. Each value
// knows its GLSL base type and how to write itself in std140 form.

use glam::{
    BVec2, BVec3, BVec4, DMat2, DMat3, DMat4, DVec2, DVec3, DVec4, IVec2, IVec3, IVec4, Mat2, Mat3, Mat4,
    UVec2, UVec3, UVec4, Vec2, Vec3, Vec4,
};

use crate::compiler::glsl_types::{BaseType, ScalarKind};

#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Uint(u32),
    Float(f32),
    Double(f64),
    BVec2(BVec2),
    BVec3(BVec3),
    BVec4(BVec4),
    IVec2(IVec2),
    IVec3(IVec3),
    IVec4(IVec4),
    UVec2(UVec2),
    UVec3(UVec3),
    UVec4(UVec4),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    DVec2(DVec2),
    DVec3(DVec3),
    DVec4(DVec4),
    Mat2(Mat2),
    Mat3(Mat3),
    Mat4(Mat4),
    DMat2(DMat2),
    DMat3(DMat3),
    DMat4(DMat4),
    /// Non-square float matrix, column-major.
    Matrix { columns: u8, rows: u8, values: Vec<f32> },
    /// Non-square double matrix, column-major.
    DMatrix { columns: u8, rows: u8, values: Vec<f64> },
}

impl UniformValue {
    pub fn base_type(&self) -> BaseType {
        use ScalarKind::*;
        let vector = |kind, lanes| BaseType::Vector { kind, lanes };
        let matrix = |kind, columns, rows| BaseType::Matrix { kind, columns, rows };
        match self {
            UniformValue::Bool(_) => BaseType::Scalar(Bool),
            UniformValue::Int(_) => BaseType::Scalar(Int),
            UniformValue::Uint(_) => BaseType::Scalar(Uint),
            UniformValue::Float(_) => BaseType::Scalar(Float),
            UniformValue::Double(_) => BaseType::Scalar(Double),
            UniformValue::BVec2(_) => vector(Bool, 2),
            UniformValue::BVec3(_) => vector(Bool, 3),
            UniformValue::BVec4(_) => vector(Bool, 4),
            UniformValue::IVec2(_) => vector(Int, 2),
            UniformValue::IVec3(_) => vector(Int, 3),
            UniformValue::IVec4(_) => vector(Int, 4),
            UniformValue::UVec2(_) => vector(Uint, 2),
            UniformValue::UVec3(_) => vector(Uint, 3),
            UniformValue::UVec4(_) => vector(Uint, 4),
            UniformValue::Vec2(_) => vector(Float, 2),
            UniformValue::Vec3(_) => vector(Float, 3),
            UniformValue::Vec4(_) => vector(Float, 4),
            UniformValue::DVec2(_) => vector(Double, 2),
            UniformValue::DVec3(_) => vector(Double, 3),
            UniformValue::DVec4(_) => vector(Double, 4),
            UniformValue::Mat2(_) => matrix(Float, 2, 2),
            UniformValue::Mat3(_) => matrix(Float, 3, 3),
            UniformValue::Mat4(_) => matrix(Float, 4, 4),
            UniformValue::DMat2(_) => matrix(Double, 2, 2),
            UniformValue::DMat3(_) => matrix(Double, 3, 3),
            UniformValue::DMat4(_) => matrix(Double, 4, 4),
            UniformValue::Matrix { columns, rows, .. } => matrix(Float, *columns, *rows),
            UniformValue::DMatrix { columns, rows, .. } => matrix(Double, *columns, *rows),
        }
    }

    /// Non-square matrices carry exactly `columns * rows` components.
    pub fn is_well_formed(&self) -> bool {
        match self {
            UniformValue::Matrix { columns, rows, values } => values.len() == usize::from(*columns) * usize::from(*rows),
            UniformValue::DMatrix { columns, rows, values } => values.len() == usize::from(*columns) * usize::from(*rows),
            _ => true,
        }
    }

    /// Short description for error messages: the GLSL type, plus the
    /// component count of a malformed matrix.
    pub fn describe(&self) -> String {
        match self {
            UniformValue::Matrix { values, .. } if !self.is_well_formed() => {
                format!("{} with {} components", self.base_type(), values.len())
            }
            UniformValue::DMatrix { values, .. } if !self.is_well_formed() => {
                format!("{} with {} components", self.base_type(), values.len())
            }
            _ => self.base_type().to_string(),
        }
    }

    /// All-zero value of `base`. Opaque handles have no value.
    pub fn zero(base: BaseType) -> Option<Self> {
        use ScalarKind::*;
        Some(match base {
            BaseType::Scalar(Bool) => UniformValue::Bool(false),
            BaseType::Scalar(Int) => UniformValue::Int(0),
            BaseType::Scalar(Uint) => UniformValue::Uint(0),
            BaseType::Scalar(Float) => UniformValue::Float(0.0),
            BaseType::Scalar(Double) => UniformValue::Double(0.0),
            BaseType::Vector { kind, lanes } => match (kind, lanes) {
                (Bool, 2) => UniformValue::BVec2(BVec2::FALSE),
                (Bool, 3) => UniformValue::BVec3(BVec3::FALSE),
                (Bool, _) => UniformValue::BVec4(BVec4::FALSE),
                (Int, 2) => UniformValue::IVec2(IVec2::ZERO),
                (Int, 3) => UniformValue::IVec3(IVec3::ZERO),
                (Int, _) => UniformValue::IVec4(IVec4::ZERO),
                (Uint, 2) => UniformValue::UVec2(UVec2::ZERO),
                (Uint, 3) => UniformValue::UVec3(UVec3::ZERO),
                (Uint, _) => UniformValue::UVec4(UVec4::ZERO),
                (Float, 2) => UniformValue::Vec2(Vec2::ZERO),
                (Float, 3) => UniformValue::Vec3(Vec3::ZERO),
                (Float, _) => UniformValue::Vec4(Vec4::ZERO),
                (Double, 2) => UniformValue::DVec2(DVec2::ZERO),
                (Double, 3) => UniformValue::DVec3(DVec3::ZERO),
                (Double, _) => UniformValue::DVec4(DVec4::ZERO),
            },
            BaseType::Matrix { kind, columns, rows } => match (kind, columns, rows) {
                (Double, 2, 2) => UniformValue::DMat2(DMat2::ZERO),
                (Double, 3, 3) => UniformValue::DMat3(DMat3::ZERO),
                (Double, 4, 4) => UniformValue::DMat4(DMat4::ZERO),
                (Double, _, _) => UniformValue::DMatrix {
                    columns,
                    rows,
                    values: vec![0.0; usize::from(columns) * usize::from(rows)],
                },
                (_, 2, 2) => UniformValue::Mat2(Mat2::ZERO),
                (_, 3, 3) => UniformValue::Mat3(Mat3::ZERO),
                (_, 4, 4) => UniformValue::Mat4(Mat4::ZERO),
                _ => UniformValue::Matrix {
                    columns,
                    rows,
                    values: vec![0.0; usize::from(columns) * usize::from(rows)],
                },
            },
            BaseType::Opaque(_) => return None,
        })
    }

    /// Write the std140 encoding at the start of `out`. `out` must hold at
    /// least `base_type().size()` bytes.
    pub fn write_std140(&self, out: &mut [u8]) {
        fn put<T: bytemuck::Pod>(out: &mut [u8], at: usize, value: &T) {
            let bytes = bytemuck::bytes_of(value);
            out[at..at + bytes.len()].copy_from_slice(bytes);
        }
        fn bools(out: &mut [u8], lanes: &[bool]) {
            for (i, lane) in lanes.iter().enumerate() {
                put(out, i * 4, &u32::from(*lane));
            }
        }
        fn columns<T: bytemuck::Pod>(out: &mut [u8], stride: usize, rows: usize, values: &[T]) {
            for (column, chunk) in values.chunks(rows).enumerate() {
                let bytes: &[u8] = bytemuck::cast_slice(chunk);
                let at = column * stride;
                out[at..at + bytes.len()].copy_from_slice(bytes);
            }
        }

        let stride = self.base_type().column_stride() as usize;
        match self {
            UniformValue::Bool(v) => put(out, 0, &u32::from(*v)),
            UniformValue::Int(v) => put(out, 0, v),
            UniformValue::Uint(v) => put(out, 0, v),
            UniformValue::Float(v) => put(out, 0, v),
            UniformValue::Double(v) => put(out, 0, v),
            UniformValue::BVec2(v) => bools(out, &[v.x, v.y]),
            UniformValue::BVec3(v) => bools(out, &[v.x, v.y, v.z]),
            UniformValue::BVec4(v) => bools(out, &[v.x, v.y, v.z, v.w]),
            UniformValue::IVec2(v) => put(out, 0, v),
            UniformValue::IVec3(v) => put(out, 0, v),
            UniformValue::IVec4(v) => put(out, 0, v),
            UniformValue::UVec2(v) => put(out, 0, v),
            UniformValue::UVec3(v) => put(out, 0, v),
            UniformValue::UVec4(v) => put(out, 0, v),
            UniformValue::Vec2(v) => put(out, 0, v),
            UniformValue::Vec3(v) => put(out, 0, v),
            UniformValue::Vec4(v) => put(out, 0, v),
            UniformValue::DVec2(v) => put(out, 0, v),
            UniformValue::DVec3(v) => put(out, 0, v),
            UniformValue::DVec4(v) => put(out, 0, v),
            UniformValue::Mat2(m) => columns(out, stride, 2, &m.to_cols_array()),
            UniformValue::Mat3(m) => columns(out, stride, 3, &m.to_cols_array()),
            UniformValue::Mat4(m) => columns(out, stride, 4, &m.to_cols_array()),
            UniformValue::DMat2(m) => columns(out, stride, 2, &m.to_cols_array()),
            UniformValue::DMat3(m) => columns(out, stride, 3, &m.to_cols_array()),
            UniformValue::DMat4(m) => columns(out, stride, 4, &m.to_cols_array()),
            UniformValue::Matrix { columns: count, rows, values } => {
                let used = values.len().min(usize::from(*count) * usize::from(*rows));
                columns(out, stride, usize::from(*rows), &values[..used])
            }
            UniformValue::DMatrix { columns: count, rows, values } => {
                let used = values.len().min(usize::from(*count) * usize::from(*rows));
                columns(out, stride, usize::from(*rows), &values[..used])
            }
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for UniformValue {
                fn from(value: $ty) -> Self {
                    UniformValue::$variant(value)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool, i32 => Int, u32 => Uint, f32 => Float, f64 => Double,
    BVec2 => BVec2, BVec3 => BVec3, BVec4 => BVec4,
    IVec2 => IVec2, IVec3 => IVec3, IVec4 => IVec4,
    UVec2 => UVec2, UVec3 => UVec3, UVec4 => UVec4,
    Vec2 => Vec2, Vec3 => Vec3, Vec4 => Vec4,
    DVec2 => DVec2, DVec3 => DVec3, DVec4 => DVec4,
    Mat2 => Mat2, Mat3 => Mat3, Mat4 => Mat4,
    DMat2 => DMat2, DMat3 => DMat3, DMat4 => DMat4,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(bytes: &[u8]) -> Vec<u32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes(chunk.try_into().unwrap()))
            .collect()
    }

    #[test]
    fn test_zero_matches_base_type() {
        for name in ["float", "bvec3", "uvec2", "dvec4", "mat3", "mat2x4", "dmat3x2", "dmat4"] {
            let base = BaseType::parse(name).unwrap();
            assert_eq!(UniformValue::zero(base).unwrap().base_type(), base, "{name}");
        }
        assert!(UniformValue::zero(BaseType::parse("sampler2D").unwrap()).is_none());
    }

    #[test]
    fn test_mat3_columns_are_padded() {
        let value = UniformValue::from(Mat3::from_cols_array(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]));
        let mut out = vec![0u8; 48];
        value.write_std140(&mut out);
        let floats: Vec<f32> = words(&out).into_iter().map(f32::from_bits).collect();
        assert_eq!(floats, [1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0, 0.0, 7.0, 8.0, 9.0, 0.0]);
    }

    #[test]
    fn test_matrix_component_count() {
        let good = UniformValue::Matrix { columns: 2, rows: 3, values: vec![1.0; 6] };
        assert!(good.is_well_formed());
        assert_eq!(good.describe(), good.base_type().to_string());

        let bad = UniformValue::Matrix { columns: 2, rows: 3, values: vec![1.0; 60] };
        assert!(!bad.is_well_formed());
        assert!(bad.describe().ends_with("with 60 components"));

        // Extra components are never written past the matrix footprint
        let mut out = vec![0u8; bad.base_type().size() as usize];
        bad.write_std140(&mut out);
        assert_eq!(f32::from_bits(words(&out)[0]), 1.0);
    }

    #[test]
    fn test_bools_are_words() {
        let mut out = vec![0xffu8; 12];
        UniformValue::from(BVec3::new(true, false, true)).write_std140(&mut out);
        assert_eq!(words(&out), [1, 0, 1]);
    }
}
