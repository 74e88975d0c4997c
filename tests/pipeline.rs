// End-to-end compilation of shader units

use std::path::PathBuf;

use shader_layout::config::RegistryConfig;
use shader_layout::{
    synchronize, BindingError, BindingPointPool, CompilationUnit, CompileError, CompilerConfig, DirectorySink,
    DirtyState, MemorySink, ShaderCompiler, SlotAllocator, StagingBuffer,
};

const LIGHT_BLOCK: &str = r#"
#version 450
layout(std140) uniform Light {
    vec3 pos;
    float intensity;
};
"#;

/// Records every slot request before delegating to a real pool.
struct CountingAllocator {
    requests: Vec<Option<u32>>,
    pool: BindingPointPool,
}

impl CountingAllocator {
    fn new() -> Self {
        Self {
            requests: Vec::new(),
            pool: BindingPointPool::default(),
        }
    }
}

impl SlotAllocator for CountingAllocator {
    fn allocate(&mut self, explicit: Option<u32>) -> Result<u32, BindingError> {
        self.requests.push(explicit);
        self.pool.allocate(explicit)
    }
}

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("shader-layout-it-{}-{}", name, std::process::id()))
}

#[test]
fn test_light_block_is_one_type_with_one_slot_request() {
    let compiler = ShaderCompiler::new(CompilerConfig::default());
    let mut allocator = CountingAllocator::new();
    let sink = MemorySink::new();

    let unit = compiler
        .compile(&CompilationUnit::new("light.frag", LIGHT_BLOCK), &mut allocator, &sink)
        .unwrap();

    assert_eq!(unit.types.len(), 1);
    let light = unit.get("Light").unwrap();
    assert_eq!(light.descriptor.total_size(), 16);
    assert_eq!(light.descriptor.field_offset("intensity"), Some(12));
    assert_eq!(light.binding_slot, Some(0));
    assert_eq!(allocator.requests, [None]);
    assert_eq!(sink.keys(), ["Light"]);
}

#[test]
fn test_cycle_registers_nothing() {
    let compiler = ShaderCompiler::new(CompilerConfig::default());
    let source = "struct A { B b; };\nstruct B { A a; };";
    let err = compiler
        .compile(&CompilationUnit::new("cycle.glsl", source), &mut BindingPointPool::default(), &MemorySink::new())
        .unwrap_err();

    match err {
        CompileError::CircularDependency { file, names } => {
            assert_eq!(file, "cycle.glsl");
            assert_eq!(names, ["A", "B"]);
        }
        other => panic!("expected a cycle, got {other}"),
    }
    assert!(compiler.registry().is_empty());
}

#[test]
fn test_identity_survives_renames_and_files() {
    let compiler = ShaderCompiler::new(CompilerConfig::default());
    let sink = MemorySink::new();
    let first = compiler
        .compile(
            &CompilationUnit::new("a.glsl", "struct Light { vec3 pos; float i; };"),
            &mut BindingPointPool::default(),
            &sink,
        )
        .unwrap();
    let second = compiler
        .compile(
            &CompilationUnit::new("b.glsl", "struct Lamp { vec3 pos; float i; };"),
            &mut BindingPointPool::default(),
            &sink,
        )
        .unwrap();

    assert_eq!(first.get("Light").unwrap().identity, second.get("Lamp").unwrap().identity);
    assert_eq!(compiler.registry().len(), 1);
    assert!(second.generated.is_empty());
    assert_eq!(sink.len(), 1);
}

#[test]
fn test_unchanged_input_gives_identical_artifacts() {
    let source = r#"
struct Material { vec4 albedo; float roughness; float metallic; };
layout(std140, binding = 2) uniform Materials { Material items[8]; int count; } materials;
layout(location = 0) uniform mat4 model;
uniform samplerCube environment;
"#;
    let run = || {
        let compiler = ShaderCompiler::new(CompilerConfig::default());
        let sink = MemorySink::new();
        compiler
            .compile(&CompilationUnit::new("pbr.frag", source), &mut BindingPointPool::default(), &sink)
            .unwrap();
        sink.snapshot()
    };
    let one = run();
    assert_eq!(one.len(), 3);
    assert_eq!(one, run());
}

#[test]
fn test_dirty_block_synchronizes_once() {
    let compiler = ShaderCompiler::new(CompilerConfig::default());
    let unit = compiler
        .compile(&CompilationUnit::new("light.frag", LIGHT_BLOCK), &mut BindingPointPool::default(), &MemorySink::new())
        .unwrap();
    let mut light = unit.get("Light").unwrap().instantiate();
    let mut staging = StagingBuffer::new(16);

    assert!(!synchronize(&mut light, &mut staging).unwrap());

    light.set("intensity", 2.0f32).unwrap();
    assert!(light.is_dirty());
    assert!(synchronize(&mut light, &mut staging).unwrap());
    assert!(!light.is_dirty());
    assert_eq!(&staging.bytes()[12..16], &2.0f32.to_le_bytes());
    assert_eq!(staging.bytes_copied(), 4);

    assert!(!synchronize(&mut light, &mut staging).unwrap());
    assert_eq!(staging.uploads(), 1);
}

#[test]
fn test_parallel_units_share_identities() {
    let compiler = ShaderCompiler::new(CompilerConfig::default());
    let sink = MemorySink::new();
    let mut units: Vec<CompilationUnit> = (0..16)
        .map(|i| {
            CompilationUnit::new(
                format!("unit{i}.frag"),
                "struct Light { vec3 pos; float range; };\nlayout(std140) uniform Lights { Light lights[4]; };",
            )
        })
        .collect();
    // Only resolvable once `Light` was generated by another unit
    units.push(CompilationUnit::new("late.frag", "uniform Light light;"));

    let results = compiler.compile_all(&units, &sink);
    assert!(results.iter().all(Result::is_ok));

    let generated: usize = results
        .iter()
        .map(|result| result.as_ref().map_or(0, |unit| unit.generated.len()))
        .sum();
    assert_eq!(generated, sink.len());
    assert_eq!(sink.keys(), ["LateUniforms", "Light", "Lights"]);
    assert_eq!(compiler.registry().len(), 3);
}

#[test]
fn test_directory_sink_and_registry_cache() {
    let dir = temp_dir("cache");
    let mut config = CompilerConfig::default();
    config.output.directory = dir.join("generated");
    config.registry = RegistryConfig {
        cache_file: Some(dir.join("registry.toml")),
        ..RegistryConfig::default()
    };

    let sink = DirectorySink::from_config(&config.output);
    let compiler = ShaderCompiler::new(config.clone());
    compiler
        .compile(
            &CompilationUnit::new("a.glsl", "struct Light { vec3 pos; };"),
            &mut BindingPointPool::default(),
            &sink,
        )
        .unwrap();
    let renamed = compiler
        .compile(
            &CompilationUnit::new("b.glsl", "struct Light { vec4 pos; };"),
            &mut BindingPointPool::default(),
            &sink,
        )
        .unwrap();
    let name = renamed.get("Light").unwrap().identity.generated_name.clone();
    assert_ne!(name, "Light");
    assert!(sink.path_for("Light").exists());
    let artifact = std::fs::read_to_string(sink.path_for(&name)).unwrap();
    assert!(artifact.contains(&format!("pub struct {name}Data {{")));
    compiler.save_registry().unwrap();

    // A new session keeps the disambiguated name even without `a.glsl`
    let reloaded = ShaderCompiler::new(config);
    let again = reloaded
        .compile(
            &CompilationUnit::new("b.glsl", "struct Light { vec4 pos; };"),
            &mut BindingPointPool::default(),
            &MemorySink::new(),
        )
        .unwrap();
    assert_eq!(again.get("Light").unwrap().identity.generated_name, name);

    let _ = std::fs::remove_dir_all(&dir);
}
