// Dependency resolution
//
// Orders a unit's declarations so every aggregate is laid out after the
// aggregates its fields use. Resolution proceeds in waves: each pass takes
// every pending declaration whose field types are all resolved.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::declaration::TypeDeclaration;
use super::layout::LayoutDescriptor;
use super::registry::{content_hash, TypeRegistry};
use crate::error::CompileError;

/// A declaration that needs a layout and, possibly, an artifact.
#[derive(Debug, Clone)]
pub struct ResolvedType {
    pub declaration: TypeDeclaration,
    pub content_hash: String,
}

/// A declaration or field type whose layout was generated earlier.
#[derive(Debug, Clone)]
pub struct ReusedType {
    /// Name the unit refers to it by.
    pub name: String,
    pub descriptor: Arc<LayoutDescriptor>,
    /// The unit's own declaration, absent for types only referenced by name.
    pub declaration: Option<TypeDeclaration>,
}

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Declared names per wave.
    pub waves: Vec<Vec<String>>,
    /// Declarations to lay out, in dependency order.
    pub order: Vec<ResolvedType>,
    /// Types already generated in the registry.
    pub reused: Vec<ReusedType>,
    /// Content hash of every name the unit resolved.
    pub hashes: HashMap<String, String>,
}

impl Resolution {
    pub fn len(&self) -> usize {
        self.order.len() + self.reused.iter().filter(|r| r.declaration.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drop identical duplicates, reject conflicting ones.
fn deduplicate(source_key: &str, declarations: Vec<TypeDeclaration>) -> Result<Vec<TypeDeclaration>, CompileError> {
    let mut unique: Vec<TypeDeclaration> = Vec::with_capacity(declarations.len());
    for declaration in declarations {
        match unique.iter().find(|existing| existing.name == declaration.name) {
            Some(existing) if existing.same_shape(&declaration) => {
                log::warn!(
                    "{}: `{}` declared again at {}, identical copy ignored",
                    source_key,
                    declaration.name,
                    declaration.source
                );
            }
            Some(_) => {
                return Err(CompileError::DuplicateDeclaration {
                    file: source_key.to_string(),
                    name: declaration.name,
                });
            }
            None => unique.push(declaration),
        }
    }
    Ok(unique)
}

/// Resolve `declarations` of the unit `source_key` against each other and
/// against the types `registry` already generated.
pub fn resolve(
    source_key: &str,
    declarations: Vec<TypeDeclaration>,
    registry: &TypeRegistry,
) -> Result<Resolution, CompileError> {
    let declarations = deduplicate(source_key, declarations)?;
    let declared: HashSet<&str> = declarations.iter().map(|d| d.name.as_str()).collect();

    let mut resolution = Resolution::default();
    let mut resolved: HashSet<String> = HashSet::new();

    // Field types from outside the unit must already be generated.
    for declaration in &declarations {
        for dependency in declaration.dependencies() {
            if declared.contains(dependency) || resolved.contains(dependency) {
                continue;
            }
            let descriptor = registry
                .resolve_declared_in(dependency, source_key)
                .and_then(|identity| registry.descriptor_for_hash(&identity.content_hash))
                .ok_or_else(|| CompileError::UnknownType {
                    file: source_key.to_string(),
                    declaration: declaration.name.clone(),
                    type_name: dependency.to_string(),
                })?;
            log::debug!(
                "{}: `{}` refers to previously generated {}",
                source_key,
                dependency,
                descriptor.identity.generated_name
            );
            resolution
                .hashes
                .insert(dependency.to_string(), descriptor.identity.content_hash.clone());
            resolution.reused.push(ReusedType {
                name: dependency.to_string(),
                descriptor,
                declaration: None,
            });
            resolved.insert(dependency.to_string());
        }
    }

    let mut pending: Vec<TypeDeclaration> = declarations;
    while !pending.is_empty() {
        let (ready, blocked): (Vec<_>, Vec<_>) = pending.into_iter().partition(|declaration| {
            declaration
                .dependencies()
                .iter()
                .all(|dependency| resolved.contains(*dependency))
        });

        if ready.is_empty() {
            let names: Vec<String> = blocked.iter().map(|d| d.name.clone()).collect();
            return Err(CompileError::CircularDependency {
                file: source_key.to_string(),
                names,
            });
        }

        let mut wave = Vec::with_capacity(ready.len());
        for declaration in ready {
            let hash = content_hash(&declaration, &resolution.hashes);
            wave.push(declaration.name.clone());
            resolved.insert(declaration.name.clone());
            resolution.hashes.insert(declaration.name.clone(), hash.clone());

            match registry.descriptor_for_hash(&hash) {
                Some(descriptor) => {
                    log::debug!(
                        "{}: `{}` matches generated {}, not regenerated",
                        source_key,
                        declaration.name,
                        descriptor.identity.generated_name
                    );
                    resolution.reused.push(ReusedType {
                        name: declaration.name.clone(),
                        descriptor,
                        declaration: Some(declaration),
                    });
                }
                None => resolution.order.push(ResolvedType {
                    declaration,
                    content_hash: hash,
                }),
            }
        }
        resolution.waves.push(wave);
        pending = blocked;
    }

    log::debug!(
        "{}: resolved {} types in {} waves",
        source_key,
        resolution.len(),
        resolution.waves.len()
    );
    Ok(resolution)
}
