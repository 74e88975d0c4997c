// Declarations extracted from shader source
//
// These records are immutable once the extractor produces them and are shared
// between pipeline stages behind `Arc`.

use std::fmt;

use super::glsl_types::BaseType;

/// Where a declaration was found. `file` is the unit's stable source key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// `[name:value]` annotation written above a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// `layout(...)` values that apply to a single uniform, not to its type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FieldQualifiers {
    pub binding: Option<u32>,
    pub location: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDeclaration {
    pub type_name: String,
    pub field_name: String,
    /// Positive compile-time length; `None` for non-array fields.
    pub array_length: Option<u32>,
    pub qualifiers: FieldQualifiers,
    pub source: SourceLocation,
}

impl FieldDeclaration {
    pub fn base_type(&self) -> Option<BaseType> {
        BaseType::parse(&self.type_name)
    }

    /// Same type, name and array length. Source position is ignored.
    pub fn same_shape(&self, other: &Self) -> bool {
        self.type_name == other.type_name
            && self.field_name == other.field_name
            && self.array_length == other.array_length
    }
}

/// Memory layout standard requested by a uniform block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Packing {
    #[default]
    Std140,
    Std430,
    Packed,
    Shared,
}

impl Packing {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "std140" => Packing::Std140,
            "std430" => Packing::Std430,
            "packed" => Packing::Packed,
            "shared" => Packing::Shared,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Packing::Std140 => "std140",
            Packing::Std430 => "std430",
            Packing::Packed => "packed",
            Packing::Shared => "shared",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationKind {
    /// Plain `struct Name { ... };`
    Struct,
    /// `layout(...) uniform Name { ... } instance;`
    UniformBlock {
        binding_slot: Option<u32>,
        instance_name: Option<String>,
        packing: Packing,
    },
    /// Synthetic aggregate holding a unit's free-standing uniforms.
    UniformSet,
}

impl DeclarationKind {
    /// Part of the structural fingerprint. Binding slots and instance names
    /// do not change the host type and are left out.
    pub fn hash_tag(&self) -> String {
        match self {
            DeclarationKind::Struct => "struct".to_string(),
            DeclarationKind::UniformBlock { packing, .. } => format!("block:{}", packing.as_str()),
            DeclarationKind::UniformSet => "uniforms".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDeclaration {
    pub name: String,
    pub kind: DeclarationKind,
    pub fields: Vec<FieldDeclaration>,
    pub attributes: Vec<Attribute>,
    pub source: SourceLocation,
}

impl TypeDeclaration {
    pub fn is_uniform_block(&self) -> bool {
        matches!(self.kind, DeclarationKind::UniformBlock { .. })
    }

    pub fn binding_slot(&self) -> Option<u32> {
        match self.kind {
            DeclarationKind::UniformBlock { binding_slot, .. } => binding_slot,
            _ => None,
        }
    }

    /// Names of the non-base types this declaration's fields refer to, in
    /// field order, without repeats.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for field in &self.fields {
            if field.base_type().is_none() && !names.contains(&field.type_name.as_str()) {
                names.push(&field.type_name);
            }
        }
        names
    }

    /// Same kind and field-for-field identical.
    pub fn same_shape(&self, other: &Self) -> bool {
        self.kind.hash_tag() == other.kind.hash_tag()
            && self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.same_shape(b))
    }

    pub fn field(&self, name: &str) -> Option<&FieldDeclaration> {
        self.fields.iter().find(|field| field.field_name == name)
    }
}

/// Free-standing `uniform Type name;` outside any block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDeclaration {
    pub type_name: String,
    pub name: String,
    pub array_length: Option<u32>,
    pub qualifiers: FieldQualifiers,
    pub attributes: Vec<Attribute>,
    pub source: SourceLocation,
}

impl UniformDeclaration {
    pub fn as_field(&self) -> FieldDeclaration {
        FieldDeclaration {
            type_name: self.type_name.clone(),
            field_name: self.name.clone(),
            array_length: self.array_length,
            qualifiers: self.qualifiers,
            source: self.source.clone(),
        }
    }
}
