// =============================================================================
// SHADER LAYOUT - GLSL struct and uniform-block layouts as Rust types
// =============================================================================
//
// Reads the struct declarations, uniform blocks and free uniforms of GLSL
// sources and compiles them into host types whose bytes match the std140
// uniform-buffer layout exactly.
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  ShaderCompiler (one unit per file, units in parallel)          │
// │    └── Extractor (declarations, free uniforms, attributes)      │
// │          └── TypeRegistry (content hash -> stable identity)     │
// │                └── Resolver + std140 layout                     │
// │                      └── Emitter (Rust artifacts + schemas)     │
// └─────────────────────────────────────────────────────────────────┘
//
// HOST SIDE:
// 1. Generated `<Name>Data` structs are `bytemuck::Pod` images of a buffer
// 2. Wrappers and `StructInstance`s track which fields changed
// 3. `bindings::synchronize` uploads dirty ranges and marks them clean
//
// =============================================================================

pub mod bindings;
pub mod compiler;
pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod sink;
pub mod watch;

pub use bindings::{
    synchronize, BindingPointPool, BufferTransport, HandleRegistrar, HandleTable, SlotAllocator, StagingBuffer,
    TextureHandle,
};
pub use compiler::{CompilationUnit, CompiledUnit, EmittedType, ShaderCompiler, TextureTarget, TypeIdentity, TypeRegistry};
pub use config::CompilerConfig;
pub use error::{AccessError, BindingError, CompileError};
pub use logging::{build_logger, init_logging};
pub use runtime::{DirtyField, DirtyFieldSet, DirtyState, StructInstance, UniformValue};
pub use sink::{ArtifactSink, DirectorySink, MemorySink};
pub use watch::ShaderWatcher;
