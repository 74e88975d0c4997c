// Error taxonomy
//
// Compile-time errors abort a whole compilation unit. Access errors are raised
// by runtime instances and are local to the call that produced them.

use thiserror::Error;

/// Failure of a compilation unit (extraction, resolution, layout, emission).
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{file}:{line}: malformed declaration in `{declaration}`: {reason}")]
    MalformedDeclaration {
        file: String,
        line: u32,
        declaration: String,
        reason: String,
    },

    #[error("{file}: circular dependency between {}", names.join(", "))]
    CircularDependency { file: String, names: Vec<String> },

    #[error("layout of `{type_name}` requested before `{dependency}` was laid out")]
    UnresolvedType { type_name: String, dependency: String },

    #[error("{file}: `{declaration}` uses unknown type `{type_name}`")]
    UnknownType {
        file: String,
        declaration: String,
        type_name: String,
    },

    #[error("{file}: `{name}` is declared twice with different fields")]
    DuplicateDeclaration { file: String, name: String },

    #[error("layout of `{type_name}` overflows 32-bit offsets at field `{field}`")]
    LayoutOverflow { type_name: String, field: String },

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error(transparent)]
    Sink(#[from] anyhow::Error),
}

impl CompileError {
    /// Type names this error is about, for unit-level reporting.
    pub fn type_names(&self) -> Vec<&str> {
        match self {
            Self::MalformedDeclaration { declaration, .. } => vec![declaration.as_str()],
            Self::CircularDependency { names, .. } => names.iter().map(String::as_str).collect(),
            Self::UnresolvedType {
                type_name,
                dependency,
            } => vec![type_name.as_str(), dependency.as_str()],
            Self::UnknownType { declaration, .. } => vec![declaration.as_str()],
            Self::DuplicateDeclaration { name, .. } => vec![name.as_str()],
            Self::LayoutOverflow { type_name, .. } => vec![type_name.as_str()],
            Self::Binding(_) | Self::Sink(_) => Vec::new(),
        }
    }
}

/// Binding-slot collaborator failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("binding slot {0} is already taken")]
    SlotConflict(u32),

    #[error("binding slot {slot} is outside the pool (0..{max})")]
    SlotOutOfRange { slot: u32, max: u32 },

    #[error("no free binding slots left")]
    Exhausted,
}

/// Misuse of a runtime instance accessor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("index {index} is out of range for `{field}` of length {len}")]
    IndexOutOfRange {
        field: String,
        index: usize,
        len: usize,
    },

    #[error("`{field}` has no assigned location")]
    UnlocatedField { field: String },

    #[error("`{type_name}` has no field `{field}`")]
    NoSuchField { type_name: String, field: String },

    #[error("`{field}` expects `{expected}`, got `{found}`")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("`{field}` is not an aggregate")]
    NotAnAggregate { field: String },

    #[error("`{field}` is not an array")]
    NotAnArray { field: String },
}
