// Representation emitter
//
// Turns laid-out aggregates into their two host representations: a runtime
// `TypeSchema` interpreted by `StructInstance`, and a Rust source artifact
// with a `#[repr(C)]` plain-data struct plus a dirty-tracking wrapper.
//
// Artifacts depend only on the schema, never on which unit emitted them,
// so unchanged input always yields byte-identical output.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use super::declaration::{DeclarationKind, Packing};
use super::glsl_types::{BaseType, ScalarKind};
use super::layout::{FieldShape, LayoutDescriptor, StructLayout};
use super::registry::{TypeIdentity, TypeRegistry};
use crate::bindings::assign_texture_units;
use crate::error::CompileError;
use crate::runtime::{FieldKind, FieldSchema, StructInstance, TypeSchema};

/// Wrapper methods that generated field accessors must not shadow.
const RESERVED_METHODS: &[&str] = &[
    "new",
    "default",
    "clone",
    "data",
    "to_bytes",
    "locate",
    "location",
    "dirty_fields",
    "collect_dirty_fields",
    "bind_texture_units",
    "out_of_range",
    "is_dirty",
    "set_clean",
];

const RUST_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate", "do", "dyn",
    "else", "enum", "extern", "false", "final", "fn", "for", "if", "impl", "in", "let", "loop", "macro",
    "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "return", "self", "Self", "static",
    "struct", "super", "trait", "true", "try", "type", "typeof", "unsafe", "unsized", "use", "virtual",
    "where", "while", "yield",
];

/// One type as seen by a compiled unit.
#[derive(Debug, Clone)]
pub struct EmittedType {
    /// Name the unit declared it under.
    pub declared_name: String,
    pub identity: TypeIdentity,
    pub descriptor: Arc<LayoutDescriptor>,
    pub schema: Arc<TypeSchema>,
    /// Slot allocated for a uniform block, `None` for everything else.
    pub binding_slot: Option<u32>,
    /// Key of the source artifact (the generated name).
    pub artifact_key: String,
}

impl EmittedType {
    /// Fresh instance, attached the way the host would use it: blocks
    /// with a slot have every member located at its offset, free-uniform
    /// sets wait for the host to locate each uniform, plain structs stay
    /// detached.
    pub fn instantiate(&self) -> StructInstance {
        let mut instance = StructInstance::new(Arc::clone(&self.schema));
        match self.schema.kind {
            DeclarationKind::UniformBlock { .. } if self.binding_slot.is_some() => {
                instance.locate_at_offsets();
                instance.attach();
            }
            DeclarationKind::UniformSet => instance.attach(),
            _ => {}
        }
        instance
    }
}

// =============================================================================
// SCHEMAS
// =============================================================================

/// Builds runtime schemas, resolving child identities through the registry.
pub struct SchemaBuilder<'r> {
    registry: &'r TypeRegistry,
    max_texture_units: u32,
    cache: HashMap<String, Arc<TypeSchema>>,
}

impl<'r> SchemaBuilder<'r> {
    pub fn new(registry: &'r TypeRegistry, max_texture_units: u32) -> Self {
        Self {
            registry,
            max_texture_units,
            cache: HashMap::new(),
        }
    }

    pub fn build(&mut self, layout: &StructLayout) -> Result<Arc<TypeSchema>, CompileError> {
        if let Some(schema) = self.cache.get(&layout.content_hash) {
            return Ok(Arc::clone(schema));
        }
        let identity = self
            .registry
            .identity_for_hash(&layout.content_hash)
            .ok_or_else(|| CompileError::UnresolvedType {
                type_name: layout.name.clone(),
                dependency: layout.name.clone(),
            })?;

        let units = if layout.kind == DeclarationKind::UniformSet {
            assign_texture_units(&layout.fields, self.max_texture_units)?
        } else {
            BTreeMap::new()
        };

        let mut fields = Vec::with_capacity(layout.fields.len());
        for field in &layout.fields {
            let kind = match &field.shape {
                FieldShape::Base(BaseType::Opaque(opaque)) => FieldKind::Handle(*opaque),
                FieldShape::Base(base) => FieldKind::Value(*base),
                FieldShape::Aggregate(child) => FieldKind::Aggregate(self.build(child)?),
            };
            fields.push(FieldSchema {
                name: field.name.clone(),
                type_name: field.type_name.clone(),
                kind,
                offset: field.offset,
                size: field.size,
                array: field.array,
                location: field.qualifiers.location,
                texture_unit: units.get(&field.name).copied(),
            });
        }

        let schema = Arc::new(TypeSchema {
            identity,
            kind: layout.kind.clone(),
            size: layout.size,
            alignment: layout.alignment,
            fields,
        });
        self.cache
            .insert(layout.content_hash.clone(), Arc::clone(&schema));
        Ok(schema)
    }
}

// =============================================================================
// NAMING
// =============================================================================

/// `lightColor` -> `light_color`, `HDRScale` -> `hdr_scale`.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let previous = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if previous.is_ascii_lowercase() || (previous.is_ascii_uppercase() && next_lower) {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// `scene_lit` -> `SceneLit`, `shadowMap` -> `ShadowMap`.
pub fn to_pascal_case(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars
                .next()
                .map(|first| first.to_ascii_uppercase().to_string() + chars.as_str())
                .unwrap_or_default()
        })
        .collect()
}

fn rust_ident(name: &str) -> String {
    let snake = to_snake_case(name);
    if RUST_KEYWORDS.contains(&snake.as_str()) || snake.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{}_", snake)
    } else {
        snake
    }
}

// =============================================================================
// SOURCE ARTIFACTS
// =============================================================================

#[derive(Default)]
struct SourceWriter {
    out: String,
    indent: usize,
}

impl SourceWriter {
    fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.out.push_str("    ");
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.indent += 1;
    }

    fn close(&mut self, text: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }
}

/// How one field is stored and accessed in the generated code.
struct FieldPlan<'a> {
    field: &'a FieldSchema,
    index: usize,
    /// Unique Rust name of the field, in both structs and as its getter.
    ident: String,
    /// Element struct for arrays whose stride exceeds the element size.
    element: Option<String>,
    /// Host type of one element's value.
    host: String,
    /// First flag of the field in the wrapper's dirty array. Aggregates
    /// track their own.
    dirty: usize,
    /// Opaque leaves declared before this field.
    unit_offset: u32,
}

impl<'a> FieldPlan<'a> {
    fn len(&self) -> usize {
        self.field.len()
    }

    /// Type of the field inside the plain-data struct.
    fn storage(&self) -> String {
        match (self.field.array, &self.element) {
            (None, _) => self.host.clone(),
            (Some(array), Some(element)) => format!("[{}; {}]", element, array.length),
            (Some(array), None) => format!("[{}; {}]", self.host, array.length),
        }
    }

    /// Place expression of element `index` (a Rust expression) in `data`.
    fn element_place(&self, data: &str, index: &str) -> String {
        match (self.field.array, &self.element) {
            (None, _) => format!("{}.{}", data, self.ident),
            (Some(_), Some(_)) => format!("{}.{}[{}].value", data, self.ident, index),
            (Some(_), None) => format!("{}.{}[{}]", data, self.ident, index),
        }
    }

    fn is_bool(&self) -> bool {
        matches!(self.field.kind, FieldKind::Value(BaseType::Scalar(ScalarKind::Bool)))
    }

    fn is_aggregate(&self) -> bool {
        matches!(self.field.kind, FieldKind::Aggregate(_))
    }

    /// `self.__dirty[..]` entry of element `index`.
    fn dirty_flag(&self, index: Option<&str>) -> String {
        match (self.dirty, index) {
            (first, None) => format!("self.__dirty[{}]", first),
            (0, Some(index)) => format!("self.__dirty[{}]", index),
            (first, Some(index)) => format!("self.__dirty[{} + {}]", first, index),
        }
    }
}

/// `base` or `base + offset`.
fn plus(base: &str, offset: u32) -> String {
    if offset == 0 {
        base.to_string()
    } else {
        format!("{} + {}", base, offset)
    }
}

/// Plan every field of `schema`, giving each a Rust name that no other
/// field, accessor or wrapper member of the artifact uses.
fn plan_fields<'a>(owner: &str, schema: &'a TypeSchema) -> Vec<FieldPlan<'a>> {
    let mut idents = HashSet::new();
    let mut methods: HashSet<String> = RESERVED_METHODS.iter().map(|name| name.to_string()).collect();
    let mut elements = HashSet::new();
    let mut dirty = 0;
    let mut unit_offset = 0;

    let mut plans = Vec::with_capacity(schema.fields.len());
    for (index, field) in schema.fields.iter().enumerate() {
        let ident = unique_ident(field, &mut idents, &mut methods);
        let host = match &field.kind {
            FieldKind::Value(base) => base.host_type(),
            FieldKind::Handle(_) => "i32".to_string(),
            FieldKind::Aggregate(child) => format!("{}Data", child.name()),
        };
        let padded = field
            .array
            .is_some_and(|array| array.stride != field.element_size());
        let element = padded.then(|| {
            let stem = format!("{}{}Element", owner, to_pascal_case(&ident));
            let mut name = stem.clone();
            let mut n = 2;
            while !elements.insert(name.clone()) {
                name = format!("{}{}", stem, n);
                n += 1;
            }
            name
        });

        plans.push(FieldPlan {
            field,
            index,
            ident,
            element,
            host,
            dirty,
            unit_offset,
        });
        if !matches!(field.kind, FieldKind::Aggregate(_)) {
            dirty += field.len();
        }
        unit_offset += field.opaque_count();
    }
    plans
}

fn unique_ident(field: &FieldSchema, idents: &mut HashSet<String>, methods: &mut HashSet<String>) -> String {
    let mut stem = rust_ident(&field.name);
    // Wrapper internals start with two underscores
    if stem.starts_with("__") {
        stem = format!("field_{}", stem.trim_start_matches('_'));
    }
    if RESERVED_METHODS.contains(&stem.as_str()) {
        stem = format!("{}_field", stem);
    }

    let aggregate = matches!(field.kind, FieldKind::Aggregate(_));
    let accessors = |ident: &str| {
        let second = if aggregate {
            format!("{}_mut", ident)
        } else {
            format!("set_{}", ident)
        };
        [ident.to_string(), second]
    };
    let ident = std::iter::once(stem.clone())
        .chain((2u32..).map(|n| format!("{}_{}", stem, n)))
        .find(|candidate| {
            !idents.contains(candidate) && accessors(candidate.as_str()).iter().all(|name| !methods.contains(name))
        })
        .unwrap_or_default();

    idents.insert(ident.clone());
    methods.extend(accessors(ident.as_str()));
    ident
}

fn kind_label(kind: &DeclarationKind) -> String {
    match kind {
        DeclarationKind::Struct => "struct".to_string(),
        DeclarationKind::UniformBlock { packing, .. } if *packing == Packing::Std140 => {
            "uniform block".to_string()
        }
        DeclarationKind::UniformBlock { packing, .. } => {
            format!("uniform block, declared {} and laid out as std140", packing.as_str())
        }
        DeclarationKind::UniformSet => "free uniforms".to_string(),
    }
}

/// Render the Rust source artifact for `schema`. `runtime` is the path the
/// generated code uses to reach this crate (`shader_layout`).
pub fn emit_rust(schema: &TypeSchema, runtime: &str) -> String {
    let name = schema.name();
    let data = format!("{}Data", name);
    let is_uniform_set = schema.is_uniform_set();
    let binds_units = !is_uniform_set && schema.opaque_count() > 0;
    let plans = plan_fields(name, schema);
    let has_arrays = plans.iter().any(|plan| plan.field.is_array());
    let flags: usize = plans
        .iter()
        .filter(|plan| !plan.is_aggregate())
        .map(FieldPlan::len)
        .sum();

    let mut w = SourceWriter::default();

    // Header
    w.line("// Generated by shader-layout. Do not edit.");
    w.line("//");
    w.line(format!("// Type:     {} ({})", name, kind_label(&schema.kind)));
    w.line(format!("// Identity: {}", schema.identity.persistent_id));
    w.line(format!("// Hash:     {}", schema.identity.content_hash));
    w.line(format!("// Layout:   std140, {} bytes, {}-byte aligned", schema.size, schema.alignment));
    if !plans.is_empty() {
        w.line("//");
        for plan in &plans {
            w.line(format!(
                "//   {:>5}  {} {}",
                plan.field.offset,
                plan.field.display_type(),
                plan.field.name
            ));
        }
    }
    w.line("");

    // Padded array elements
    for plan in &plans {
        let Some(element) = &plan.element else { continue };
        let pad = plan.field.array.map_or(0, |array| array.stride) - plan.field.element_size();
        w.line("#[repr(C)]");
        w.line("#[allow(non_camel_case_types)]");
        w.line("#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]");
        w.open(format!("pub struct {} {{", element));
        w.line(format!("pub value: {},", plan.host));
        w.line(format!("pub _pad: [u8; {}],", pad));
        w.close("}");
        w.line("");
    }

    // Plain-data struct
    let mut cursor = 0u32;
    let mut pads = 0usize;
    w.line("#[repr(C)]");
    w.line("#[allow(non_camel_case_types)]");
    w.line("#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]");
    w.open(format!("pub struct {} {{", data));
    for plan in &plans {
        if plan.field.offset > cursor {
            w.line(format!("pub __pad{}: [u8; {}],", pads, plan.field.offset - cursor));
            pads += 1;
        }
        w.line(format!("pub {}: {},", plan.ident, plan.storage()));
        cursor = plan.field.offset + plan.field.size;
    }
    if schema.size > cursor {
        w.line(format!("pub __pad{}: [u8; {}],", pads, schema.size - cursor));
    }
    w.close("}");
    w.line("");

    // Layout assertions
    w.line(format!("const _: () = assert!(core::mem::size_of::<{}>() == {});", data, schema.size));
    for plan in &plans {
        w.line(format!(
            "const _: () = assert!(core::mem::offset_of!({}, {}) == {});",
            data, plan.ident, plan.field.offset
        ));
    }
    w.line("");

    // Wrapper
    w.line("#[allow(non_camel_case_types)]");
    w.line("#[derive(Debug, Clone, PartialEq)]");
    w.open(format!("pub struct {} {{", name));
    w.line(format!("__data: {},", data));
    for plan in &plans {
        match &plan.field.kind {
            FieldKind::Aggregate(child) => match plan.field.array {
                Some(array) => w.line(format!("{}: [{}; {}],", plan.ident, child.name(), array.length)),
                None => w.line(format!("{}: {},", plan.ident, child.name())),
            },
            FieldKind::Handle(_) => match plan.field.array {
                Some(array) => w.line(format!(
                    "{}: [Option<{}::TextureHandle>; {}],",
                    plan.ident, runtime, array.length
                )),
                None => w.line(format!("{}: Option<{}::TextureHandle>,", plan.ident, runtime)),
            },
            FieldKind::Value(_) => {}
        }
    }
    if is_uniform_set {
        w.line(format!("__locations: [Option<u32>; {}],", plans.len()));
    }
    if binds_units {
        w.line("__first_unit: Option<u32>,");
    }
    w.line(format!("__dirty: [bool; {}],", flags));
    w.close("}");
    w.line("");

    w.open(format!("impl Default for {} {{", name));
    w.open("fn default() -> Self {");
    w.line("Self::new()");
    w.close("}");
    w.close("}");
    w.line("");

    w.open(format!("impl {} {{", name));
    w.line(format!("pub const SIZE: usize = {};", schema.size));
    w.line(format!("pub const ALIGNMENT: usize = {};", schema.alignment));
    w.line(format!("pub const PERSISTENT_ID: &'static str = \"{}\";", schema.identity.persistent_id));
    w.line("");
    emit_constructor(&mut w, &plans, &data, is_uniform_set, binds_units, flags);
    for plan in &plans {
        w.line("");
        emit_accessors(&mut w, plan, is_uniform_set, binds_units, runtime);
    }
    if is_uniform_set {
        w.line("");
        emit_locations(&mut w, &plans);
    }
    if binds_units {
        w.line("");
        emit_bind_texture_units(&mut w, &plans);
    }
    w.line("");
    emit_data(&mut w, &plans, &data);
    w.line("");
    emit_dirty_fields(&mut w, &plans, is_uniform_set, runtime);
    if has_arrays {
        w.line("");
        w.open(format!(
            "fn out_of_range(field: &str, index: usize, len: usize) -> {}::AccessError {{",
            runtime
        ));
        w.line(format!(
            "{}::AccessError::IndexOutOfRange {{ field: field.to_string(), index, len }}",
            runtime
        ));
        w.close("}");
    }
    w.close("}");
    w.line("");

    emit_dirty_state(&mut w, &plans, name, runtime, flags);
    w.out
}

fn emit_constructor(
    w: &mut SourceWriter,
    plans: &[FieldPlan<'_>],
    data: &str,
    is_uniform_set: bool,
    binds_units: bool,
    flags: usize,
) {
    let handles: Vec<(&FieldPlan<'_>, u32)> = plans
        .iter()
        .filter(|plan| matches!(plan.field.kind, FieldKind::Handle(_)))
        .filter_map(|plan| plan.field.texture_unit.map(|unit| (plan, unit)))
        .collect();
    let children: Vec<(&FieldPlan<'_>, u32)> = plans
        .iter()
        .filter(|plan| plan.is_aggregate())
        .filter_map(|plan| plan.field.texture_unit.map(|unit| (plan, unit)))
        .collect();

    w.open("pub fn new() -> Self {");
    let binding = if handles.is_empty() { "let" } else { "let mut" };
    w.line(format!("{} data: {} = bytemuck::Zeroable::zeroed();", binding, data));
    for (plan, unit) in &handles {
        if plan.field.is_array() {
            let place = if plan.element.is_some() { "element.value" } else { "*element" };
            w.open(format!("for (i, element) in data.{}.iter_mut().enumerate() {{", plan.ident));
            w.line(format!("{} = {} + i as i32;", place, unit));
            w.close("}");
        } else {
            w.line(format!("data.{} = {};", plan.ident, unit));
        }
    }
    if children.is_empty() {
        w.open("Self {");
    } else {
        w.open("let mut this = Self {");
    }
    w.line("__data: data,");
    for plan in plans {
        match &plan.field.kind {
            FieldKind::Aggregate(child) if plan.field.is_array() => w.line(format!(
                "{}: std::array::from_fn(|_| {}::new()),",
                plan.ident,
                child.name()
            )),
            FieldKind::Aggregate(child) => w.line(format!("{}: {}::new(),", plan.ident, child.name())),
            FieldKind::Handle(_) if plan.field.is_array() => {
                w.line(format!("{}: [None; {}],", plan.ident, plan.len()))
            }
            FieldKind::Handle(_) => w.line(format!("{}: None,", plan.ident)),
            FieldKind::Value(_) => {}
        }
    }
    if is_uniform_set {
        let locations: Vec<String> = plans
            .iter()
            .map(|plan| match plan.field.location {
                Some(location) => format!("Some({})", location),
                None => "None".to_string(),
            })
            .collect();
        w.line(format!("__locations: [{}],", locations.join(", ")));
    }
    if binds_units {
        w.line("__first_unit: None,");
    }
    w.line(format!("__dirty: [false; {}],", flags));
    if children.is_empty() {
        w.close("}");
    } else {
        w.close("};");
        for (plan, unit) in &children {
            emit_child_units(w, plan, "this", &unit.to_string());
        }
        w.line("this");
    }
    w.close("}");
}

/// Hand consecutive units from `first` to a struct field's children.
fn emit_child_units(w: &mut SourceWriter, plan: &FieldPlan<'_>, owner: &str, first: &str) {
    let FieldKind::Aggregate(child) = &plan.field.kind else { return };
    if plan.field.is_array() {
        w.open(format!("for (i, child) in {}.{}.iter_mut().enumerate() {{", owner, plan.ident));
        w.line(format!("child.bind_texture_units({} + i as u32 * {});", first, child.opaque_count()));
        w.close("}");
    } else {
        w.line(format!("{}.{}.bind_texture_units({});", owner, plan.ident, first));
    }
}

fn emit_accessors(w: &mut SourceWriter, plan: &FieldPlan<'_>, is_uniform_set: bool, binds_units: bool, runtime: &str) {
    let field = plan.field;
    let glsl = &field.name;
    let ident = &plan.ident;
    let len = plan.len();
    let gate = is_uniform_set.then(|| format!("if self.__locations[{}].is_none() {{", plan.index));
    let converted = |place: String| {
        if plan.is_bool() {
            ("bool".to_string(), format!("{} != 0", place), "u32::from(value)".to_string())
        } else {
            (plan.host.clone(), place, "value".to_string())
        }
    };

    match &field.kind {
        FieldKind::Value(_) if !field.is_array() => {
            let place = plan.element_place("self.__data", "");
            let (ty, read, write) = converted(place.clone());
            w.line(format!("/// `{}` at offset {}.", glsl, field.offset));
            w.open(format!("pub fn {}(&self) -> {} {{", ident, ty));
            w.line(read);
            w.close("}");
            w.line("");
            w.open(format!("pub fn set_{}(&mut self, value: {}) {{", ident, ty));
            if let Some(gate) = &gate {
                w.open(gate);
                w.line("return;");
                w.close("}");
            }
            w.line(format!("{} = {};", place, write));
            w.line(format!("{} = true;", plan.dirty_flag(None)));
            w.close("}");
        }
        FieldKind::Value(_) => {
            let place = plan.element_place("self.__data", "index");
            let (ty, read, write) = converted(place.clone());
            w.line(format!(
                "/// `{}` element at offset {} + index * {}.",
                glsl,
                field.offset,
                field.array.map_or(0, |array| array.stride)
            ));
            w.open(format!(
                "pub fn {}(&self, index: usize) -> Result<{}, {}::AccessError> {{",
                ident, ty, runtime
            ));
            w.open(format!("if index >= {} {{", len));
            w.line(format!("return Err(Self::out_of_range(\"{}\", index, {}));", glsl, len));
            w.close("}");
            w.line(format!("Ok({})", read));
            w.close("}");
            w.line("");
            w.open(format!(
                "pub fn set_{}(&mut self, index: usize, value: {}) -> Result<(), {}::AccessError> {{",
                ident, ty, runtime
            ));
            w.open(format!("if index >= {} {{", len));
            w.line(format!("return Err(Self::out_of_range(\"{}\", index, {}));", glsl, len));
            w.close("}");
            if let Some(gate) = &gate {
                w.open(gate);
                w.line("return Ok(());");
                w.close("}");
            }
            w.line(format!("{} = {};", place, write));
            w.line(format!("{} = true;", plan.dirty_flag(Some("index"))));
            w.line("Ok(())");
            w.close("}");
        }
        FieldKind::Handle(opaque) => {
            let target = match opaque.texture_target() {
                Some(target) => format!("Some({}::TextureTarget::{:?})", runtime, target),
                None => "None".to_string(),
            };
            let index = field.is_array().then_some("index as u32");
            let register = |w: &mut SourceWriter| match (field.texture_unit, binds_units) {
                (Some(unit), _) => {
                    let unit = match index {
                        Some(index) => format!("{} + {}", unit, index),
                        None => unit.to_string(),
                    };
                    w.line(format!(
                        "registrar.register_handle(\"{}\", {}, {}, handle);",
                        glsl, target, unit
                    ));
                }
                (None, true) => {
                    let mut unit = plus("first", plan.unit_offset);
                    if let Some(index) = index {
                        unit = format!("{} + {}", unit, index);
                    }
                    w.open("if let Some(first) = self.__first_unit {");
                    w.line(format!(
                        "registrar.register_handle(\"{}\", {}, {}, handle);",
                        glsl, target, unit
                    ));
                    w.close("}");
                }
                (None, false) => w.line("let _ = registrar;"),
            };
            if field.is_array() {
                w.open(format!(
                    "pub fn {}(&self, index: usize) -> Result<Option<{}::TextureHandle>, {}::AccessError> {{",
                    ident, runtime, runtime
                ));
                w.line(format!(
                    "self.{}.get(index).copied().ok_or_else(|| Self::out_of_range(\"{}\", index, {}))",
                    ident, glsl, len
                ));
                w.close("}");
                w.line("");
                w.open(format!(
                    "pub fn set_{}(&mut self, index: usize, handle: {}::TextureHandle, registrar: &mut dyn {}::HandleRegistrar) -> Result<(), {}::AccessError> {{",
                    ident, runtime, runtime, runtime
                ));
                w.open(format!("if index >= {} {{", len));
                w.line(format!("return Err(Self::out_of_range(\"{}\", index, {}));", glsl, len));
                w.close("}");
                if let Some(gate) = &gate {
                    w.open(gate);
                    w.line("return Ok(());");
                    w.close("}");
                }
                w.line(format!("self.{}[index] = Some(handle);", ident));
                register(w);
                w.line(format!("{} = true;", plan.dirty_flag(Some("index"))));
                w.line("Ok(())");
                w.close("}");
            } else {
                w.open(format!("pub fn {}(&self) -> Option<{}::TextureHandle> {{", ident, runtime));
                w.line(format!("self.{}", ident));
                w.close("}");
                w.line("");
                w.open(format!(
                    "pub fn set_{}(&mut self, handle: {}::TextureHandle, registrar: &mut dyn {}::HandleRegistrar) {{",
                    ident, runtime, runtime
                ));
                if let Some(gate) = &gate {
                    w.open(gate);
                    w.line("return;");
                    w.close("}");
                }
                w.line(format!("self.{} = Some(handle);", ident));
                register(w);
                w.line(format!("{} = true;", plan.dirty_flag(None)));
                w.close("}");
            }
        }
        FieldKind::Aggregate(child) => {
            let child = child.name();
            if field.is_array() {
                w.open(format!(
                    "pub fn {}(&self, index: usize) -> Result<&{}, {}::AccessError> {{",
                    ident, child, runtime
                ));
                w.line(format!(
                    "self.{}.get(index).ok_or_else(|| Self::out_of_range(\"{}\", index, {}))",
                    ident, glsl, len
                ));
                w.close("}");
                w.line("");
                w.open(format!(
                    "pub fn {}_mut(&mut self, index: usize) -> Result<&mut {}, {}::AccessError> {{",
                    ident, child, runtime
                ));
                w.line(format!(
                    "self.{}.get_mut(index).ok_or_else(|| Self::out_of_range(\"{}\", index, {}))",
                    ident, glsl, len
                ));
                w.close("}");
            } else {
                w.open(format!("pub fn {}(&self) -> &{} {{", ident, child));
                w.line(format!("&self.{}", ident));
                w.close("}");
                w.line("");
                w.open(format!("pub fn {}_mut(&mut self) -> &mut {} {{", ident, child));
                w.line(format!("&mut self.{}", ident));
                w.close("}");
            }
        }
    }
}

fn emit_locations(w: &mut SourceWriter, plans: &[FieldPlan<'_>]) {
    w.line("/// Record the host location of a uniform. Returns `false` for unknown names.");
    w.open("pub fn locate(&mut self, field: &str, location: u32) -> bool {");
    w.open("let index = match field {");
    for plan in plans {
        w.line(format!("\"{}\" => {},", plan.field.name, plan.index));
    }
    w.line("_ => return false,");
    w.close("};");
    w.line("self.__locations[index] = Some(location);");
    w.line("true");
    w.close("}");
    w.line("");
    w.open("pub fn location(&self, field: &str) -> Option<u32> {");
    w.open("match field {");
    for plan in plans {
        w.line(format!("\"{}\" => self.__locations[{}],", plan.field.name, plan.index));
    }
    w.line("_ => None,");
    w.close("}");
    w.close("}");
}

fn emit_bind_texture_units(w: &mut SourceWriter, plans: &[FieldPlan<'_>]) {
    w.line("/// Give the samplers of this struct consecutive texture units from `first`.");
    w.open("pub fn bind_texture_units(&mut self, first: u32) {");
    w.line("self.__first_unit = Some(first);");
    for plan in plans.iter().filter(|plan| plan.field.opaque_count() > 0) {
        let first = plus("first", plan.unit_offset);
        match &plan.field.kind {
            FieldKind::Handle(_) if plan.field.is_array() => {
                let place = if plan.element.is_some() { "element.value" } else { "*element" };
                w.open(format!("for (i, element) in self.__data.{}.iter_mut().enumerate() {{", plan.ident));
                w.line(format!("{} = ({} + i as u32) as i32;", place, first));
                w.close("}");
            }
            FieldKind::Handle(_) if plan.unit_offset == 0 => {
                w.line(format!("self.__data.{} = first as i32;", plan.ident))
            }
            FieldKind::Handle(_) => w.line(format!("self.__data.{} = ({}) as i32;", plan.ident, first)),
            FieldKind::Aggregate(_) => emit_child_units(w, plan, "self", &first),
            FieldKind::Value(_) => {}
        }
    }
    w.close("}");
}

fn emit_data(w: &mut SourceWriter, plans: &[FieldPlan<'_>], data: &str) {
    let children: Vec<&FieldPlan<'_>> = plans.iter().filter(|plan| plan.is_aggregate()).collect();

    w.line("/// Plain-data image with every child's current values.");
    w.open(format!("pub fn data(&self) -> {} {{", data));
    if children.is_empty() {
        w.line("self.__data");
    } else {
        w.line("let mut data = self.__data;");
        for plan in &children {
            if plan.field.is_array() {
                w.open(format!(
                    "for (slot, child) in data.{}.iter_mut().zip(&self.{}) {{",
                    plan.ident, plan.ident
                ));
                w.line("*slot = child.data();");
                w.close("}");
            } else {
                w.line(format!("data.{} = self.{}.data();", plan.ident, plan.ident));
            }
        }
        w.line("data");
    }
    w.close("}");
    w.line("");
    w.open("pub fn to_bytes(&self) -> Vec<u8> {");
    w.line("bytemuck::bytes_of(&self.data()).to_vec()");
    w.close("}");
}

fn emit_dirty_fields(w: &mut SourceWriter, plans: &[FieldPlan<'_>], is_uniform_set: bool, runtime: &str) {
    w.line("/// Leaves modified since the last `set_clean`, with absolute offsets.");
    w.open(format!("pub fn dirty_fields(&self) -> {}::DirtyFieldSet {{", runtime));
    w.line(format!("let mut set = {}::DirtyFieldSet::new();", runtime));
    w.line("self.collect_dirty_fields(\"\", 0, &mut set);");
    w.line("set");
    w.close("}");
    w.line("");
    w.line("#[doc(hidden)]");
    w.open(format!(
        "pub fn collect_dirty_fields(&self, prefix: &str, base: u32, set: &mut {}::DirtyFieldSet) {{",
        runtime
    ));
    if plans.is_empty() {
        w.line("let _ = (prefix, base, set);");
    }
    for plan in plans {
        let field = plan.field;
        let glsl = &field.name;
        let offset = plus("base", field.offset);
        let stride = field.array.map_or(0, |array| array.stride);
        match (&field.kind, field.is_array()) {
            (FieldKind::Aggregate(_), false) => w.line(format!(
                "self.{}.collect_dirty_fields(&format!(\"{{}}{}.\", prefix), {}, set);",
                plan.ident, glsl, offset
            )),
            (FieldKind::Aggregate(_), true) => {
                w.open(format!("for (index, child) in self.{}.iter().enumerate() {{", plan.ident));
                w.line(format!(
                    "child.collect_dirty_fields(&format!(\"{{}}{}[{{}}].\", prefix, index), {} + index as u32 * {}, set);",
                    glsl, offset, stride
                ));
                w.close("}");
            }
            (_, false) => {
                let location = if is_uniform_set {
                    format!("self.__locations[{}]", plan.index)
                } else {
                    "None".to_string()
                };
                w.open(format!("if {} {{", plan.dirty_flag(None)));
                w.open(format!("set.push({}::DirtyField {{", runtime));
                w.line(format!("path: format!(\"{{}}{}\", prefix),", glsl));
                w.line(format!("offset: {},", offset));
                w.line(format!("size: {},", field.element_size()));
                w.line(format!("location: {},", location));
                w.close("});");
                w.close("}");
            }
            (_, true) => {
                let location = if is_uniform_set {
                    format!("self.__locations[{}].map(|location| location + index as u32)", plan.index)
                } else {
                    "None".to_string()
                };
                w.open(format!("for index in 0..{} {{", plan.len()));
                w.open(format!("if {} {{", plan.dirty_flag(Some("index"))));
                w.open(format!("set.push({}::DirtyField {{", runtime));
                w.line(format!("path: format!(\"{{}}{}[{{}}]\", prefix, index),", glsl));
                w.line(format!("offset: {} + index as u32 * {},", offset, stride));
                w.line(format!("size: {},", field.element_size()));
                w.line(format!("location: {},", location));
                w.close("});");
                w.close("}");
                w.close("}");
            }
        }
    }
    w.close("}");
}

fn emit_dirty_state(w: &mut SourceWriter, plans: &[FieldPlan<'_>], name: &str, runtime: &str, flags: usize) {
    let children: Vec<&FieldPlan<'_>> = plans.iter().filter(|plan| plan.is_aggregate()).collect();

    w.open(format!("impl {}::DirtyState for {} {{", runtime, name));
    w.open("fn is_dirty(&self) -> bool {");
    let mut terms = vec!["self.__dirty.iter().any(|dirty| *dirty)".to_string()];
    terms.extend(
        children
            .iter()
            .map(|plan| format!("{}::DirtyState::is_dirty(&self.{})", runtime, plan.ident)),
    );
    w.line(terms.join(" || "));
    w.close("}");
    w.line("");
    w.open("fn set_clean(&mut self) {");
    w.line(format!("self.__dirty = [false; {}];", flags));
    for plan in &children {
        w.line(format!("{}::DirtyState::set_clean(&mut self.{});", runtime, plan.ident));
    }
    w.close("}");
    w.close("}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::BindingPointPool;
    use crate::compiler::pipeline::{CompilationUnit, ShaderCompiler};
    use crate::config::CompilerConfig;
    use crate::sink::MemorySink;

    fn emit(source: &str) -> MemorySink {
        let compiler = ShaderCompiler::new(CompilerConfig::default());
        let sink = MemorySink::new();
        compiler
            .compile(&CompilationUnit::new("scene.glsl", source), &mut BindingPointPool::default(), &sink)
            .unwrap();
        sink
    }

    #[test]
    fn test_naming() {
        assert_eq!(to_snake_case("lightColor"), "light_color");
        assert_eq!(to_snake_case("HDRScale"), "hdr_scale");
        assert_eq!(to_snake_case("u_MVP"), "u_mvp");
        assert_eq!(to_pascal_case("scene_lit"), "SceneLit");
        assert_eq!(to_pascal_case("shadowMap"), "ShadowMap");
        assert_eq!(rust_ident("type"), "type_");
    }

    #[test]
    fn test_sequential_layout_has_no_padding_fields() {
        let sink = emit("struct Packed { vec3 a; float b; vec4 c; };");
        let source = sink.get("Packed").unwrap();
        assert!(source.contains("pub struct PackedData {"));
        assert!(!source.contains("_pad"));
        assert!(source.contains("const _: () = assert!(core::mem::size_of::<PackedData>() == 32);"));
        assert!(source.contains("const _: () = assert!(core::mem::offset_of!(PackedData, b) == 12);"));
    }

    #[test]
    fn test_gaps_become_explicit_padding() {
        let sink = emit("struct Gappy { float a; vec4 b; float weights[2]; };");
        let source = sink.get("Gappy").unwrap();
        assert!(source.contains("pub __pad0: [u8; 12],"));
        assert!(source.contains("pub struct GappyWeightsElement {"));
        assert!(source.contains("pub weights: [GappyWeightsElement; 2],"));
        assert!(source.contains("return Err(Self::out_of_range(\"weights\", index, 2));"));
        assert!(source.contains("pub fn set_b(&mut self, value: [f32; 4]) {"));
    }

    #[test]
    fn test_nested_children_are_owned_wrappers() {
        let sink = emit(
            "struct Light { vec3 color; float range; };\n\
             struct Rig { Light key; Light fills[2]; };",
        );
        let source = sink.get("Rig").unwrap();
        assert!(source.contains("key: Light,"));
        assert!(source.contains("fills: [Light; 2],"));
        assert!(source.contains("fills: std::array::from_fn(|_| Light::new()),"));
        assert!(source.contains("data.key = self.key.data();"));
        assert!(source.contains(
            "self.__dirty.iter().any(|dirty| *dirty) || shader_layout::DirtyState::is_dirty(&self.key) \
             || shader_layout::DirtyState::is_dirty(&self.fills)"
        ));
        assert!(source.contains("__dirty: [bool; 0],"));
    }

    #[test]
    fn test_free_uniforms_gate_on_location() {
        let sink = emit(
            "layout(location = 0) uniform mat4 model;\n\
             layout(binding = 2) uniform sampler2D albedo;",
        );
        let source = sink.get("SceneUniforms").unwrap();
        assert!(source.contains("__locations: [Some(0), None],"));
        assert!(source.contains("if self.__locations[1].is_none() {"));
        assert!(source.contains(
            "registrar.register_handle(\"albedo\", Some(shader_layout::TextureTarget::Texture2D), 2, handle);"
        ));
        assert!(source.contains("data.albedo = 2;"));
    }

    #[test]
    fn test_colliding_names_get_distinct_idents() {
        let sink = emit(
            "struct Inner { float x; };\n\
             struct Outer { Inner data; float dirty; vec3 lightColor; float light_color; float __locations; };",
        );
        let source = sink.get("Outer").unwrap();
        assert!(source.contains("__data: OuterData,"));
        assert!(source.contains("data_field: Inner,"));
        assert!(source.contains("pub fn data_field_mut(&mut self) -> &mut Inner {"));
        assert!(source.contains("pub dirty: f32,"));
        assert!(source.contains("pub light_color: [f32; 3],"));
        assert!(source.contains("pub light_color_2: f32,"));
        assert!(source.contains("pub field_locations: f32,"));
        assert_eq!(source.matches("pub fn set_light_color(").count(), 1);
        assert_eq!(source.matches("pub fn set_light_color_2(").count(), 1);

        let sink = emit("struct Setters { float x; float set_x; };");
        let source = sink.get("Setters").unwrap();
        assert!(source.contains("pub fn set_x(&mut self, value: f32) {"));
        assert!(source.contains("pub fn set_x_2(&self) -> f32 {"));
    }

    #[test]
    fn test_bool_arrays_use_bool_accessors() {
        let sink = emit("struct Flags { bool on; bool lanes[3]; };");
        let source = sink.get("Flags").unwrap();
        assert!(source.contains("pub fn on(&self) -> bool {"));
        assert!(source.contains("pub fn lanes(&self, index: usize) -> Result<bool, shader_layout::AccessError> {"));
        assert!(source.contains("Ok(self.__data.lanes[index].value != 0)"));
        assert!(source.contains("pub fn set_lanes(&mut self, index: usize, value: bool)"));
        assert!(source.contains("self.__data.lanes[index].value = u32::from(value);"));
        assert!(source.contains("self.__dirty[1 + index] = true;"));
    }

    #[test]
    fn test_struct_samplers_take_units_from_their_owner() {
        let sink = emit(
            "struct Material { float gloss; sampler2D albedo; sampler2D detail[2]; };\n\
             uniform sampler2D shadow;\n\
             uniform Material materials[2];",
        );
        let material = sink.get("Material").unwrap();
        assert!(material.contains("__first_unit: Option<u32>,"));
        assert!(material.contains("self.__data.albedo = first as i32;"));
        assert!(material.contains("element.value = (first + 1 + i as u32) as i32;"));
        assert!(material.contains(
            "registrar.register_handle(\"detail\", Some(shader_layout::TextureTarget::Texture2D), first + 1 + index as u32, handle);"
        ));

        let uniforms = sink.get("SceneUniforms").unwrap();
        assert!(uniforms.contains("let mut this = Self {"));
        assert!(uniforms.contains("child.bind_texture_units(1 + i as u32 * 3);"));
    }

    #[test]
    fn test_dirty_fields_report_paths_and_offsets() {
        let sink = emit(
            "struct Light { vec3 color; float range; };\n\
             layout(location = 2) uniform float weights[2];\n\
             uniform Light sun;",
        );
        let uniforms = sink.get("SceneUniforms").unwrap();
        assert!(uniforms.contains("path: format!(\"{}weights[{}]\", prefix, index),"));
        assert!(uniforms.contains("offset: base + index as u32 * 16,"));
        assert!(uniforms.contains("location: self.__locations[0].map(|location| location + index as u32),"));
        assert!(uniforms.contains("self.sun.collect_dirty_fields(&format!(\"{}sun.\", prefix), base + 32, set);"));

        let light = sink.get("Light").unwrap();
        assert!(light.contains("path: format!(\"{}range\", prefix),"));
        assert!(light.contains("offset: base + 12,"));
        assert!(light.contains("if self.__dirty[1] {"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let source = "struct A { vec2 uv; mat3 basis; };";
        assert_eq!(emit(source).snapshot(), emit(source).snapshot());
    }
}
