// Type identity registry
//
// Maps structural content hashes to stable identities and generated host
// type names. The registry is the only shared mutable state of the compiler;
// every unit compiling in parallel goes through the same instance.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use super::declaration::TypeDeclaration;
use super::layout::LayoutDescriptor;
use crate::config::RegistryConfig;

/// Hex characters kept from the digest for a persistent id.
const PERSISTENT_ID_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeIdentity {
    pub content_hash: String,
    pub persistent_id: String,
    pub generated_name: String,
}

/// Structural fingerprint of a declaration.
///
/// Covers the declaration kind and every field's type, name, array length
/// and explicit binding, in order. The declared name is not part of it.
/// Aggregate field types are replaced by their own hash when `nested` knows
/// it, so two files whose `Light` differs never share an outer type.
pub fn content_hash(declaration: &TypeDeclaration, nested: &HashMap<String, String>) -> String {
    let mut hasher = Sha1::new();
    hasher.update(declaration.kind.hash_tag().as_bytes());
    for field in &declaration.fields {
        let type_key = nested
            .get(&field.type_name)
            .map_or(field.type_name.as_str(), String::as_str);
        hasher.update(b"\n");
        hasher.update(type_key.as_bytes());
        hasher.update(b" ");
        hasher.update(field.field_name.as_bytes());
        if let Some(length) = field.array_length {
            hasher.update(format!("[{}]", length).as_bytes());
        }
        // Explicit bindings fix texture units baked into the artifact.
        if let Some(binding) = field.qualifiers.binding {
            hasher.update(format!("@{}", binding).as_bytes());
        }
    }
    to_hex(&hasher.finalize())
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GenerationState {
    Pending,
    InProgress,
    Generated,
}

#[derive(Debug)]
struct Record {
    identity: TypeIdentity,
    /// `(declared name, source key)` pairs that resolved to this record.
    declared: Vec<(String, String)>,
    state: GenerationState,
    descriptor: Option<Arc<LayoutDescriptor>>,
}

#[derive(Debug, Default)]
struct Inner {
    records: Vec<Record>,
    by_hash: HashMap<String, usize>,
    by_persistent_id: HashMap<String, usize>,
    by_generated_name: HashMap<String, usize>,
    /// Declared name -> `(source key, record)` in registration order.
    by_declared_name: HashMap<String, Vec<(String, usize)>>,
}

impl Inner {
    /// Returns whether the alias is new.
    fn alias(&mut self, index: usize, name: &str, source_key: &str) -> bool {
        let entries = self.by_declared_name.entry(name.to_string()).or_default();
        if entries.iter().any(|(key, i)| key == source_key && *i == index) {
            return false;
        }
        entries.push((source_key.to_string(), index));
        self.records[index]
            .declared
            .push((name.to_string(), source_key.to_string()));
        true
    }

    fn unalias(&mut self, index: usize, name: &str, source_key: &str) {
        if let Some(entries) = self.by_declared_name.get_mut(name) {
            entries.retain(|(key, i)| !(key == source_key && *i == index));
            if entries.is_empty() {
                self.by_declared_name.remove(name);
            }
        }
        self.records[index]
            .declared
            .retain(|(declared, key)| !(declared == name && key == source_key));
    }

    /// Drop the records at `doomed`, keeping every index consistent and
    /// declared-name lookups in registration order.
    fn remove_records(&mut self, doomed: &HashSet<usize>) {
        let mut remap = Vec::with_capacity(self.records.len());
        let mut next = 0usize;
        for index in 0..self.records.len() {
            if doomed.contains(&index) {
                remap.push(None);
            } else {
                remap.push(Some(next));
                next += 1;
            }
        }

        let mut index = 0usize;
        self.records.retain(|_| {
            let keep = !doomed.contains(&index);
            index += 1;
            keep
        });
        for map in [&mut self.by_hash, &mut self.by_persistent_id, &mut self.by_generated_name] {
            map.retain(|_, index| match remap[*index] {
                Some(moved) => {
                    *index = moved;
                    true
                }
                None => false,
            });
        }
        self.by_declared_name.retain(|_, entries| {
            entries.retain_mut(|(_, index)| match remap[*index] {
                Some(moved) => {
                    *index = moved;
                    true
                }
                None => false,
            });
            !entries.is_empty()
        });
    }

    fn has_alias(&self, index: usize, name: &str, source_key: &str) -> bool {
        self.by_declared_name
            .get(name)
            .is_some_and(|entries| entries.iter().any(|(key, i)| key == source_key && *i == index))
    }

    fn mint_persistent_id(&self, content_hash: &str) -> String {
        (0u32..)
            .map(|attempt| {
                let mut hasher = Sha1::new();
                hasher.update(format!("{}:{}", content_hash, attempt).as_bytes());
                let mut id = to_hex(&hasher.finalize());
                id.truncate(PERSISTENT_ID_LEN);
                id
            })
            .find(|id| !self.by_persistent_id.contains_key(id))
            .unwrap_or_else(|| content_hash.to_string())
    }

    fn mint_generated_name(&self, declared: &str, persistent_id: &str, suffix_len: usize) -> String {
        if !self.by_generated_name.contains_key(declared) {
            return declared.to_string();
        }
        let start = suffix_len.clamp(1, persistent_id.len());
        (start..=persistent_id.len())
            .map(|len| format!("{}_{}", declared, &persistent_id[..len]))
            .chain((2u32..).map(|n| format!("{}_{}_{}", declared, persistent_id, n)))
            .find(|candidate| !self.by_generated_name.contains_key(candidate))
            .unwrap_or_else(|| format!("{}_{}", declared, persistent_id))
    }

    fn insert(&mut self, identity: TypeIdentity, state: GenerationState) -> usize {
        let index = self.records.len();
        self.by_hash.insert(identity.content_hash.clone(), index);
        self.by_persistent_id.insert(identity.persistent_id.clone(), index);
        self.by_generated_name.insert(identity.generated_name.clone(), index);
        self.records.push(Record {
            identity,
            declared: Vec::new(),
            state,
            descriptor: None,
        });
        index
    }

    fn index_of_id(&self, persistent_id: &str) -> Option<usize> {
        self.by_persistent_id.get(persistent_id).copied()
    }
}

/// Serializable form of the registry's identities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub types: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub content_hash: String,
    pub persistent_id: String,
    pub generated_name: String,
    #[serde(default)]
    pub declared: Vec<DeclaredName>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredName {
    pub name: String,
    pub source: String,
}

/// What one registration changed, so a failed unit can undo it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub identity: TypeIdentity,
    /// The registration created the record.
    pub minted: bool,
    /// `(declared name, source key)` recorded as a new alias.
    pub alias: Option<(String, String)>,
}

pub struct TypeRegistry {
    inner: RwLock<Inner>,
    name_suffix_len: usize,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::with_name_suffix_len(RegistryConfig::default().name_suffix_len)
    }

    pub fn with_name_suffix_len(name_suffix_len: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            name_suffix_len,
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::with_name_suffix_len(config.name_suffix_len)
    }

    /// Register `declaration` under its standalone content hash.
    pub fn register_or_reuse(&self, declaration: &TypeDeclaration) -> TypeIdentity {
        let hash = content_hash(declaration, &HashMap::new());
        self.register_hashed(declaration, &hash)
    }

    /// Return the identity for `content_hash`, minting one on first sight.
    /// The declared name and source are recorded as an alias either way.
    pub fn register_hashed(&self, declaration: &TypeDeclaration, content_hash: &str) -> TypeIdentity {
        self.register(declaration, content_hash).identity
    }

    /// [`register_hashed`](Self::register_hashed), reporting what changed.
    pub fn register(&self, declaration: &TypeDeclaration, content_hash: &str) -> Registration {
        let name = declaration.name.as_str();
        let source_key = declaration.source.file.as_str();
        let alias = (name.to_string(), source_key.to_string());

        {
            let inner = self.inner.read();
            if let Some(&index) = inner.by_hash.get(content_hash) {
                if inner.has_alias(index, name, source_key) {
                    return Registration {
                        identity: inner.records[index].identity.clone(),
                        minted: false,
                        alias: None,
                    };
                }
            }
        }

        let mut inner = self.inner.write();
        // Another thread may have registered the hash between the locks.
        if let Some(&index) = inner.by_hash.get(content_hash) {
            let added = inner.alias(index, name, source_key);
            let identity = inner.records[index].identity.clone();
            log::debug!(
                "Reusing {} ({}) for `{}` in {}",
                identity.generated_name,
                identity.persistent_id,
                name,
                source_key
            );
            return Registration {
                identity,
                minted: false,
                alias: added.then_some(alias),
            };
        }

        let persistent_id = inner.mint_persistent_id(content_hash);
        let generated_name = inner.mint_generated_name(name, &persistent_id, self.name_suffix_len);
        let identity = TypeIdentity {
            content_hash: content_hash.to_string(),
            persistent_id,
            generated_name,
        };
        let index = inner.insert(identity.clone(), GenerationState::Pending);
        inner.alias(index, name, source_key);
        log::debug!(
            "Registered `{}` from {} as {} ({})",
            name,
            source_key,
            identity.generated_name,
            identity.persistent_id
        );
        Registration {
            identity,
            minted: true,
            alias: Some(alias),
        }
    }

    /// Undo `registrations` after their unit failed: remove the aliases
    /// they added, then the records they minted that no other unit declared
    /// and that were never generated.
    pub fn roll_back(&self, registrations: &[Registration]) {
        let mut inner = self.inner.write();
        for registration in registrations.iter().rev() {
            let Some((name, source_key)) = &registration.alias else { continue };
            if let Some(index) = inner.index_of_id(&registration.identity.persistent_id) {
                inner.unalias(index, name, source_key);
            }
        }

        let doomed: HashSet<usize> = registrations
            .iter()
            .filter(|registration| registration.minted)
            .filter_map(|registration| inner.index_of_id(&registration.identity.persistent_id))
            .filter(|&index| {
                let record = &inner.records[index];
                record.state == GenerationState::Pending && record.declared.is_empty()
            })
            .collect();
        if doomed.is_empty() {
            return;
        }
        for &index in &doomed {
            log::debug!("Rolling back {}", inner.records[index].identity.generated_name);
        }
        inner.remove_records(&doomed);
    }

    /// Generated name for a persistent id.
    pub fn resolve_by_persistent_id(&self, persistent_id: &str) -> Option<String> {
        let inner = self.inner.read();
        inner
            .index_of_id(persistent_id)
            .map(|index| inner.records[index].identity.generated_name.clone())
    }

    /// First identity registered under `name`, in any file.
    pub fn resolve_by_declared_name(&self, name: &str) -> Option<TypeIdentity> {
        let inner = self.inner.read();
        let (_, index) = inner.by_declared_name.get(name)?.first()?;
        Some(inner.records[*index].identity.clone())
    }

    /// Identity of `name` as declared in `source_key`, falling back to the
    /// first match in any file.
    pub fn resolve_declared_in(&self, name: &str, source_key: &str) -> Option<TypeIdentity> {
        let inner = self.inner.read();
        let entries = inner.by_declared_name.get(name)?;
        let (_, index) = entries
            .iter()
            .find(|(key, _)| key == source_key)
            .or_else(|| entries.first())?;
        Some(inner.records[*index].identity.clone())
    }

    pub fn identity_for_hash(&self, content_hash: &str) -> Option<TypeIdentity> {
        let inner = self.inner.read();
        let index = *inner.by_hash.get(content_hash)?;
        Some(inner.records[index].identity.clone())
    }

    /// Descriptor of a fully generated type.
    pub fn descriptor_for_hash(&self, content_hash: &str) -> Option<Arc<LayoutDescriptor>> {
        let inner = self.inner.read();
        let index = *inner.by_hash.get(content_hash)?;
        inner.records[index].descriptor.clone()
    }

    pub fn descriptor_by_generated_name(&self, generated_name: &str) -> Option<Arc<LayoutDescriptor>> {
        let inner = self.inner.read();
        let index = *inner.by_generated_name.get(generated_name)?;
        inner.records[index].descriptor.clone()
    }

    pub fn is_generated(&self, content_hash: &str) -> bool {
        let inner = self.inner.read();
        inner
            .by_hash
            .get(content_hash)
            .is_some_and(|&index| inner.records[index].state == GenerationState::Generated)
    }

    /// Claim the right to emit `persistent_id`. Returns `false` when the
    /// type is already generated or another unit is emitting it.
    pub fn begin_generation(&self, persistent_id: &str) -> bool {
        let mut inner = self.inner.write();
        let Some(index) = inner.index_of_id(persistent_id) else {
            return false;
        };
        let record = &mut inner.records[index];
        if record.state != GenerationState::Pending {
            return false;
        }
        record.state = GenerationState::InProgress;
        true
    }

    pub fn complete_generation(&self, persistent_id: &str, descriptor: Arc<LayoutDescriptor>) {
        let mut inner = self.inner.write();
        if let Some(index) = inner.index_of_id(persistent_id) {
            let record = &mut inner.records[index];
            record.state = GenerationState::Generated;
            record.descriptor = Some(descriptor);
        }
    }

    /// Release a claim taken by `begin_generation` after a failed emission.
    pub fn abandon_generation(&self, persistent_id: &str) {
        let mut inner = self.inner.write();
        if let Some(index) = inner.index_of_id(persistent_id) {
            let record = &mut inner.records[index];
            if record.state == GenerationState::InProgress {
                record.state = GenerationState::Pending;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn identities(&self) -> Vec<TypeIdentity> {
        self.inner
            .read()
            .records
            .iter()
            .map(|record| record.identity.clone())
            .collect()
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    pub fn snapshot(&self) -> RegistrySnapshot {
        let inner = self.inner.read();
        let types = inner
            .records
            .iter()
            .map(|record| SnapshotEntry {
                content_hash: record.identity.content_hash.clone(),
                persistent_id: record.identity.persistent_id.clone(),
                generated_name: record.identity.generated_name.clone(),
                declared: record
                    .declared
                    .iter()
                    .map(|(name, source)| DeclaredName {
                        name: name.clone(),
                        source: source.clone(),
                    })
                    .collect(),
            })
            .collect();
        RegistrySnapshot { types }
    }

    /// Add the identities of `snapshot` that are not already known.
    /// Restored types are not marked generated; their artifacts are
    /// emitted again by the next unit that uses them.
    pub fn restore(&self, snapshot: &RegistrySnapshot) {
        let mut inner = self.inner.write();
        let mut restored = 0usize;
        for entry in &snapshot.types {
            if inner.by_hash.contains_key(&entry.content_hash)
                || inner.by_persistent_id.contains_key(&entry.persistent_id)
                || inner.by_generated_name.contains_key(&entry.generated_name)
            {
                log::debug!("Skipping restored type {}, already known", entry.generated_name);
                continue;
            }
            let identity = TypeIdentity {
                content_hash: entry.content_hash.clone(),
                persistent_id: entry.persistent_id.clone(),
                generated_name: entry.generated_name.clone(),
            };
            let index = inner.insert(identity, GenerationState::Pending);
            for declared in &entry.declared {
                inner.alias(index, &declared.name, &declared.source);
            }
            restored += 1;
        }
        log::info!("Restored {} type identities", restored);
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(&self.snapshot())
            .context("Failed to serialize type registry")?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(path, contents)
            .with_context(|| format!("Failed to write registry cache: {}", path.display()))?;
        log::info!("Saved {} type identities to {}", self.len(), path.display());
        Ok(())
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read registry cache: {}", path.display()))?;
        let snapshot: RegistrySnapshot = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse registry cache: {}", path.display()))?;
        self.restore(&snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::declaration::{DeclarationKind, FieldDeclaration, FieldQualifiers, SourceLocation};
    use crate::compiler::layout::{compile_layout, LayoutDescriptor};

    fn declare(name: &str, file: &str, fields: &[(&str, &str)]) -> TypeDeclaration {
        TypeDeclaration {
            name: name.to_string(),
            kind: DeclarationKind::Struct,
            fields: fields
                .iter()
                .map(|(type_name, field_name)| FieldDeclaration {
                    type_name: type_name.to_string(),
                    field_name: field_name.to_string(),
                    array_length: None,
                    qualifiers: FieldQualifiers::default(),
                    source: SourceLocation::default(),
                })
                .collect(),
            attributes: Vec::new(),
            source: SourceLocation {
                file: file.to_string(),
                line: 1,
                column: 1,
            },
        }
    }

    #[test]
    fn test_same_structure_same_identity_across_files_and_names() {
        let registry = TypeRegistry::new();
        let a = registry.register_or_reuse(&declare("Light", "a.glsl", &[("vec3", "pos")]));
        let b = registry.register_or_reuse(&declare("Lamp", "b.glsl", &[("vec3", "pos")]));
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
        assert_eq!(a.generated_name, "Light");
        assert_eq!(registry.resolve_by_declared_name("Lamp"), Some(a.clone()));
        assert_eq!(registry.resolve_by_persistent_id(&a.persistent_id), Some("Light".to_string()));
    }

    #[test]
    fn test_field_changes_change_the_hash() {
        let base = declare("S", "a.glsl", &[("vec3", "pos")]);
        let renamed = declare("S", "a.glsl", &[("vec3", "position")]);
        let retyped = declare("S", "a.glsl", &[("vec4", "pos")]);
        let mut arrayed = base.clone();
        arrayed.fields[0].array_length = Some(2);
        let hashes: Vec<_> = [&base, &renamed, &retyped, &arrayed]
            .iter()
            .map(|d| content_hash(d, &HashMap::new()))
            .collect();
        for (i, a) in hashes.iter().enumerate() {
            for b in &hashes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_colliding_names_get_id_suffix() {
        let registry = TypeRegistry::with_name_suffix_len(4);
        let first = registry.register_or_reuse(&declare("Light", "a.glsl", &[("vec3", "pos")]));
        let second = registry.register_or_reuse(&declare("Light", "b.glsl", &[("vec4", "pos")]));
        assert_eq!(first.generated_name, "Light");
        assert_eq!(second.generated_name, format!("Light_{}", &second.persistent_id[..4]));
        assert_eq!(
            registry.resolve_declared_in("Light", "b.glsl").map(|id| id.generated_name),
            Some(second.generated_name.clone())
        );
        assert_eq!(registry.resolve_declared_in("Light", "c.glsl"), Some(first));
    }

    #[test]
    fn test_roll_back_forgets_only_what_the_unit_added() {
        let registry = TypeRegistry::new();
        let kept = registry.register_or_reuse(&declare("Light", "a.glsl", &[("vec3", "pos")]));

        let reused = registry.register(&declare("Lamp", "b.glsl", &[("vec3", "pos")]), &kept.content_hash);
        let fresh_declaration = declare("Fresh", "b.glsl", &[("vec4", "v")]);
        let fresh_hash = content_hash(&fresh_declaration, &HashMap::new());
        let fresh = registry.register(&fresh_declaration, &fresh_hash);
        let other = registry.register_or_reuse(&declare("Other", "c.glsl", &[("float", "x")]));
        assert!(!reused.minted && reused.alias.is_some());
        assert!(fresh.minted);
        assert_eq!(registry.len(), 3);

        registry.roll_back(&[reused, fresh.clone()]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve_by_declared_name("Fresh"), None);
        assert_eq!(registry.resolve_by_declared_name("Lamp"), None);
        assert_eq!(registry.identity_for_hash(&fresh.identity.content_hash), None);
        assert_eq!(registry.resolve_by_declared_name("Light"), Some(kept.clone()));
        assert_eq!(registry.resolve_by_declared_name("Other"), Some(other.clone()));
        assert_eq!(registry.resolve_by_persistent_id(&other.persistent_id), Some("Other".to_string()));

        // A record another unit also declared survives
        let shared = declare("Shared", "d.glsl", &[("ivec2", "i")]);
        let shared_hash = content_hash(&shared, &HashMap::new());
        let first = registry.register(&shared, &shared_hash);
        registry.register_or_reuse(&declare("Shared", "e.glsl", &[("ivec2", "i")]));
        registry.roll_back(&[first]);
        assert!(registry.identity_for_hash(&shared_hash).is_some());
        assert_eq!(
            registry.resolve_declared_in("Shared", "d.glsl").map(|identity| identity.generated_name),
            Some("Shared".to_string())
        );
    }

    #[test]
    fn test_persistent_ids_are_deterministic() {
        let declaration = declare("S", "a.glsl", &[("float", "x")]);
        let one = TypeRegistry::new().register_or_reuse(&declaration);
        let two = TypeRegistry::new().register_or_reuse(&declaration);
        assert_eq!(one, two);
        assert_eq!(one.persistent_id.len(), PERSISTENT_ID_LEN);
    }

    #[test]
    fn test_concurrent_registration_mints_one_identity() {
        let registry = TypeRegistry::new();
        let identities: Vec<TypeIdentity> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let registry = &registry;
                    scope.spawn(move || {
                        let file = format!("unit{}.glsl", i);
                        registry.register_or_reuse(&declare("Shared", &file, &[("vec4", "v")]))
                    })
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });
        assert_eq!(registry.len(), 1);
        assert!(identities.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[test]
    fn test_generation_claim_is_test_and_set() {
        let registry = TypeRegistry::new();
        let declaration = declare("S", "a.glsl", &[("float", "x")]);
        let identity = registry.register_or_reuse(&declaration);

        assert!(registry.begin_generation(&identity.persistent_id));
        assert!(!registry.begin_generation(&identity.persistent_id));
        registry.abandon_generation(&identity.persistent_id);
        assert!(registry.begin_generation(&identity.persistent_id));

        let layout = compile_layout(&declaration, &identity.content_hash, &HashMap::new()).unwrap();
        let descriptor = Arc::new(LayoutDescriptor::new(identity.clone(), Arc::new(layout)));
        registry.complete_generation(&identity.persistent_id, descriptor);
        assert!(registry.is_generated(&identity.content_hash));
        assert!(!registry.begin_generation(&identity.persistent_id));
        assert_eq!(
            registry.descriptor_for_hash(&identity.content_hash).map(|d| d.total_size()),
            Some(16)
        );
        assert!(!registry.begin_generation("unknown"));
    }

    #[test]
    fn test_save_and_load_keep_identities() {
        let dir = std::env::temp_dir().join(format!("shader-layout-registry-{}", std::process::id()));
        let path = dir.join("registry.toml");

        let registry = TypeRegistry::new();
        let original = registry.register_or_reuse(&declare("Light", "a.glsl", &[("vec3", "pos")]));
        registry.save(&path).unwrap();

        let reloaded = TypeRegistry::new();
        reloaded.load(&path).unwrap();
        assert_eq!(reloaded.resolve_by_declared_name("Light"), Some(original.clone()));
        let again = reloaded.register_or_reuse(&declare("Light", "a.glsl", &[("vec3", "pos")]));
        assert_eq!(again, original);
        assert_eq!(reloaded.len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
