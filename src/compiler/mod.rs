// Compiler module - GLSL declarations to std140 host types
//
// Design: Extract -> register -> resolve -> lay out -> emit, one unit at a time
// Sharing: The type registry is the only state shared between units

pub mod declaration;
pub mod emit;
pub mod extract;
pub mod glsl_types;
pub mod layout;
pub mod pipeline;
pub mod registry;
pub mod resolve;

pub use declaration::{DeclarationKind, FieldDeclaration, Packing, SourceLocation, TypeDeclaration};
pub use emit::{emit_rust, EmittedType};
pub use extract::{extract, ExtractWarning, ExtractedUnit};
pub use glsl_types::{BaseType, OpaqueKind, ScalarKind, TextureTarget};
pub use layout::{compile_layout, LayoutDescriptor, StructLayout};
pub use pipeline::{CompilationUnit, CompiledUnit, ShaderCompiler};
pub use registry::{TypeIdentity, TypeRegistry};
pub use resolve::{resolve, Resolution};
