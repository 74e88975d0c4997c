// Runtime module - Host-side instances of emitted types
//
// Design: Schemas are immutable and shared, instances own values and dirty flags

pub mod dirty;
pub mod instance;
pub mod schema;
pub mod value;

pub use dirty::{DirtyField, DirtyFieldSet, DirtyState};
pub use instance::StructInstance;
pub use schema::{FieldKind, FieldSchema, TypeSchema};
pub use value::UniformValue;
