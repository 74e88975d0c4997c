// =============================================================================
// PIPELINE - One shader unit from text to emitted types
// =============================================================================
//
// UNIT FLOW:
// 1. Extract declarations (plus structs from shared type files)
// 2. Fold free uniforms into a synthetic `<FileStem>Uniforms` set
// 3. Resolve dependencies against the unit and the registry
// 4. Lay out every new aggregate
// 5. Check texture units and allocate block binding slots
// 6. Register identities
// 7. Emit artifacts for identities nobody generated yet
//
// Steps 1-5 touch no shared state. If emission fails, the unit's new
// aliases and its still-pending identities are rolled back; types whose
// artifacts were already written stay generated.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use rayon::prelude::*;

use super::declaration::{DeclarationKind, TypeDeclaration, UniformDeclaration};
use super::emit::{emit_rust, to_pascal_case, EmittedType, SchemaBuilder};
use super::extract::{extract, extract_types, AnonymousBlock, ExtractWarning};
use super::layout::{compile_layout, LayoutDescriptor, StructLayout};
use super::registry::{Registration, TypeRegistry};
use super::resolve::resolve;
use crate::bindings::{assign_texture_units, BindingPointPool, SlotAllocator};
use crate::config::CompilerConfig;
use crate::error::CompileError;
use crate::sink::ArtifactSink;

/// Auxiliary type-only file whose structs are visible to a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedSource {
    pub key: String,
    pub text: String,
}

/// One shader file, already include-expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationUnit {
    pub source_key: String,
    pub source: String,
    pub shared: Vec<SharedSource>,
}

impl CompilationUnit {
    pub fn new(source_key: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            source_key: source_key.into(),
            source: source.into(),
            shared: Vec::new(),
        }
    }

    /// Read a unit from disk, keyed by its path.
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read shader source: {}", path.display()))?;
        Ok(Self::new(path.to_string_lossy().replace('\\', "/"), source))
    }

    pub fn with_shared(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.shared.push(SharedSource {
            key: key.into(),
            text: text.into(),
        });
        self
    }
}

/// Result of compiling one unit.
#[derive(Debug, Clone, Default)]
pub struct CompiledUnit {
    pub source_key: String,
    /// Every type the unit declares, in dependency order, reused ones included.
    pub types: Vec<EmittedType>,
    /// Generated names this unit wrote artifacts for.
    pub generated: Vec<String>,
    pub warnings: Vec<ExtractWarning>,
    pub anonymous_blocks: Vec<AnonymousBlock>,
}

impl CompiledUnit {
    /// Type declared as `name` in this unit.
    pub fn get(&self, name: &str) -> Option<&EmittedType> {
        self.types.iter().find(|emitted| emitted.declared_name == name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// `shaders/scene_lit.frag` -> `SceneLitUniforms`.
pub fn uniform_set_name(source_key: &str) -> String {
    let stem = Path::new(source_key)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(source_key);
    let stem = to_pascal_case(stem);
    if stem.is_empty() {
        "Uniforms".to_string()
    } else if stem.starts_with(|c: char| c.is_ascii_digit()) {
        format!("U{}Uniforms", stem)
    } else {
        format!("{}Uniforms", stem)
    }
}

fn uniform_set(source_key: &str, uniforms: &[UniformDeclaration]) -> Option<TypeDeclaration> {
    let first = uniforms.first()?;
    Some(TypeDeclaration {
        name: uniform_set_name(source_key),
        kind: DeclarationKind::UniformSet,
        fields: uniforms.iter().map(UniformDeclaration::as_field).collect(),
        attributes: Vec::new(),
        source: first.source.clone(),
    })
}

/// A declared type on its way to emission.
struct Planned {
    declaration: TypeDeclaration,
    descriptor: Option<Arc<LayoutDescriptor>>,
    layout: Arc<StructLayout>,
    content_hash: String,
}

pub struct ShaderCompiler {
    registry: Arc<TypeRegistry>,
    config: CompilerConfig,
}

impl ShaderCompiler {
    /// Fresh registry, seeded from the configured cache file when present.
    pub fn new(config: CompilerConfig) -> Self {
        let registry = TypeRegistry::from_config(&config.registry);
        if let Some(cache) = config.registry.cache_file.as_ref().filter(|path| path.exists()) {
            if let Err(err) = registry.load(cache) {
                log::warn!("Ignoring registry cache: {:#}", err);
            }
        }
        Self::with_registry(config, Arc::new(registry))
    }

    /// Share `registry` with other compilers.
    pub fn with_registry(config: CompilerConfig, registry: Arc<TypeRegistry>) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile one unit. Artifacts go to `sink`, block binding slots come
    /// from `allocator`.
    pub fn compile(
        &self,
        unit: &CompilationUnit,
        allocator: &mut dyn SlotAllocator,
        sink: &dyn ArtifactSink,
    ) -> Result<CompiledUnit, CompileError> {
        let source_key = unit.source_key.as_str();
        log::info!("Compiling {}", source_key);

        // Extract
        let extracted = extract(source_key, &unit.source)?;
        let mut declarations = Vec::new();
        for shared in &unit.shared {
            declarations.extend(extract_types(&shared.key, &shared.text)?);
        }
        declarations.extend(extracted.declarations);
        declarations.extend(uniform_set(source_key, &extracted.uniforms));

        // Resolve
        let resolution = resolve(source_key, declarations, &self.registry)?;

        // Lay out
        let mut nested: HashMap<String, Arc<StructLayout>> = HashMap::new();
        let mut planned: HashMap<String, Planned> = HashMap::new();
        for reused in &resolution.reused {
            nested.insert(reused.name.clone(), Arc::clone(&reused.descriptor.layout));
            if let Some(declaration) = &reused.declaration {
                planned.insert(
                    reused.name.clone(),
                    Planned {
                        declaration: declaration.clone(),
                        descriptor: Some(Arc::clone(&reused.descriptor)),
                        layout: Arc::clone(&reused.descriptor.layout),
                        content_hash: reused.descriptor.identity.content_hash.clone(),
                    },
                );
            }
        }
        for resolved in &resolution.order {
            let layout = Arc::new(compile_layout(
                &resolved.declaration,
                &resolved.content_hash,
                &nested,
            )?);
            debug_assert!(layout.validate().is_ok(), "{:?}", layout.validate());
            nested.insert(resolved.declaration.name.clone(), Arc::clone(&layout));
            planned.insert(
                resolved.declaration.name.clone(),
                Planned {
                    declaration: resolved.declaration.clone(),
                    descriptor: None,
                    layout,
                    content_hash: resolved.content_hash.clone(),
                },
            );
        }

        // Dependency order; every declared name landed in exactly one wave
        let ordered: Vec<&Planned> = resolution
            .waves
            .iter()
            .flatten()
            .filter_map(|name| planned.get(name))
            .collect();

        // Texture units and binding slots
        let max_units = self.config.bindings.max_texture_units;
        let mut slots: HashMap<&str, u32> = HashMap::new();
        for plan in &ordered {
            match &plan.declaration.kind {
                DeclarationKind::UniformSet => {
                    assign_texture_units(&plan.layout.fields, max_units)?;
                }
                DeclarationKind::UniformBlock { binding_slot, .. } => {
                    let slot = allocator.allocate(*binding_slot)?;
                    log::debug!("{}: block `{}` bound to slot {}", source_key, plan.declaration.name, slot);
                    slots.insert(plan.declaration.name.as_str(), slot);
                }
                DeclarationKind::Struct => {}
            }
        }

        // Register
        let registrations: Vec<Registration> = ordered
            .iter()
            .map(|plan| self.registry.register(&plan.declaration, &plan.content_hash))
            .collect();

        let compiled = CompiledUnit {
            source_key: source_key.to_string(),
            warnings: extracted.warnings,
            anonymous_blocks: extracted.anonymous_blocks,
            ..CompiledUnit::default()
        };
        match self.emit_unit(compiled, &ordered, &slots, sink) {
            Ok(compiled) => {
                log::info!(
                    "Compiled {}: {} types, {} generated",
                    source_key,
                    compiled.types.len(),
                    compiled.generated.len()
                );
                Ok(compiled)
            }
            Err(err) => {
                self.registry.roll_back(&registrations);
                Err(err)
            }
        }
    }

    /// Build schemas and write the artifacts nobody generated yet.
    fn emit_unit(
        &self,
        mut compiled: CompiledUnit,
        ordered: &[&Planned],
        slots: &HashMap<&str, u32>,
        sink: &dyn ArtifactSink,
    ) -> Result<CompiledUnit, CompileError> {
        let runtime_crate = self.config.output.runtime_crate.as_str();
        let mut builder = SchemaBuilder::new(&self.registry, self.config.bindings.max_texture_units);

        for plan in ordered {
            let name = plan.declaration.name.as_str();
            let identity = self
                .registry
                .identity_for_hash(&plan.content_hash)
                .ok_or_else(|| CompileError::UnresolvedType {
                    type_name: name.to_string(),
                    dependency: name.to_string(),
                })?;
            let descriptor = match &plan.descriptor {
                Some(descriptor) => Arc::clone(descriptor),
                None => Arc::new(LayoutDescriptor::new(identity.clone(), Arc::clone(&plan.layout))),
            };
            let schema = builder.build(&descriptor.layout)?;

            if plan.descriptor.is_none() && self.registry.begin_generation(&identity.persistent_id) {
                let source = emit_rust(&schema, runtime_crate);
                if let Err(err) = sink.write(&identity.generated_name, &source) {
                    self.registry.abandon_generation(&identity.persistent_id);
                    return Err(CompileError::Sink(err));
                }
                self.registry
                    .complete_generation(&identity.persistent_id, Arc::clone(&descriptor));
                log::debug!(
                    "{}: generated {} ({} bytes)",
                    compiled.source_key,
                    identity.generated_name,
                    descriptor.total_size()
                );
                compiled.generated.push(identity.generated_name.clone());
            }

            compiled.types.push(EmittedType {
                declared_name: name.to_string(),
                artifact_key: identity.generated_name.clone(),
                identity,
                descriptor,
                schema,
                binding_slot: slots.get(name).copied(),
            });
        }
        Ok(compiled)
    }

    /// Compile independent units in parallel, each with its own binding
    /// pool. Units that failed only because a type from another unit was
    /// not generated yet are retried until no further unit succeeds.
    pub fn compile_all(
        &self,
        units: &[CompilationUnit],
        sink: &dyn ArtifactSink,
    ) -> Vec<Result<CompiledUnit, CompileError>> {
        let compile = |unit: &CompilationUnit| {
            let mut pool = BindingPointPool::new(self.config.bindings.max_binding_points);
            self.compile(unit, &mut pool, sink)
        };

        let mut results: Vec<Result<CompiledUnit, CompileError>> = units.par_iter().map(compile).collect();

        loop {
            let waiting: Vec<usize> = results
                .iter()
                .enumerate()
                .filter(|(_, result)| matches!(result, Err(CompileError::UnknownType { .. })))
                .map(|(index, _)| index)
                .collect();
            if waiting.is_empty() {
                break;
            }
            let retried: Vec<(usize, Result<CompiledUnit, CompileError>)> = waiting
                .par_iter()
                .map(|&index| (index, compile(&units[index])))
                .collect();
            let progressed = retried.iter().any(|(_, result)| result.is_ok());
            for (index, result) in retried {
                results[index] = result;
            }
            if !progressed {
                break;
            }
        }

        for (unit, result) in units.iter().zip(&results) {
            if let Err(err) = result {
                log::error!(
                    "Failed to compile {} [{}]: {}",
                    unit.source_key,
                    err.type_names().join(", "),
                    err
                );
            }
        }
        results
    }

    /// Recompile changed files, e.g. from `ShaderWatcher::drain_changed`.
    pub fn compile_paths(
        &self,
        paths: &[PathBuf],
        sink: &dyn ArtifactSink,
    ) -> anyhow::Result<Vec<Result<CompiledUnit, CompileError>>> {
        let units = paths
            .iter()
            .map(CompilationUnit::from_path)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(self.compile_all(&units, sink))
    }

    /// Write the registry to the configured cache file, if any.
    pub fn save_registry(&self) -> anyhow::Result<()> {
        match &self.config.registry.cache_file {
            Some(path) => self.registry.save(path),
            None => Ok(()),
        }
    }
}
