//! GPU program builder: compile, link, and location resolution.
//!
//! Compilation and linking run entirely on the CPU through the naga
//! front-end, so setup fails with a readable diagnostic before any device
//! object exists. `wgpu::ShaderModule` creation happens later, in
//! [`crate::gpu`], strictly after link and resolution succeed.

use naga::valid::{Capabilities, ValidationFlags, Validator};
use std::collections::BTreeMap;
use std::fmt;

/// Shader pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn naga(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

/// Fatal setup errors from the program builder.
#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("program link failed: {log}")]
    Link { log: String },
}

/// A compiled shader stage, retained for the lifetime of the program so the
/// diagnostics monitor can report its context later.
#[derive(Debug)]
pub struct ShaderHandle {
    pub stage: ShaderStage,
    pub source: String,
    pub entry_point: String,
    module: naga::Module,
}

impl ShaderHandle {
    /// One-line diagnostic summary used by the monitor.
    pub fn diagnostic(&self) -> String {
        format!(
            "{} stage `{}` ({} lines)",
            self.stage,
            self.entry_point,
            self.source.lines().count()
        )
    }
}

/// Compile one stage: WGSL parse plus full validation.
pub fn compile(source: &str, stage: ShaderStage) -> Result<ShaderHandle, ProgramError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ProgramError::Compile {
        stage,
        log: e.emit_to_string(source),
    })?;
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| ProgramError::Compile {
            stage,
            log: e.emit_to_string(source),
        })?;

    let entry_point = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage.naga())
        .map(|ep| ep.name.clone())
        .unwrap_or_default();

    tracing::debug!(stage = %stage, %entry_point, "compiled shader stage");
    Ok(ShaderHandle {
        stage,
        source: source.to_string(),
        entry_point,
        module,
    })
}

/// A linked program: both stage handles, interface-checked.
#[derive(Debug)]
pub struct ProgramHandle {
    pub vertex: ShaderHandle,
    pub fragment: ShaderHandle,
}

impl ProgramHandle {
    pub fn diagnostic(&self) -> String {
        format!(
            "program [{} | {}]",
            self.vertex.diagnostic(),
            self.fragment.diagnostic()
        )
    }
}

/// Link two compiled stages.
///
/// Verifies each stage exposes an entry point for its kind and that every
/// fragment input location is produced by a vertex output. On failure no
/// handle exists and setup must abort.
pub fn link(vertex: ShaderHandle, fragment: ShaderHandle) -> Result<ProgramHandle, ProgramError> {
    for handle in [&vertex, &fragment] {
        if handle.entry_point.is_empty() {
            return Err(ProgramError::Link {
                log: format!("{stage} source exposes no {stage} entry point", stage = handle.stage),
            });
        }
    }

    let vertex_outputs = entry_io_locations(&vertex.module, IoSide::Output);
    let fragment_inputs = entry_io_locations(&fragment.module, IoSide::Input);
    for location in &fragment_inputs {
        if !vertex_outputs.contains(location) {
            return Err(ProgramError::Link {
                log: format!("fragment input @location({location}) has no matching vertex output"),
            });
        }
    }

    tracing::debug!(
        varyings = vertex_outputs.len(),
        "linked shader program"
    );
    Ok(ProgramHandle { vertex, fragment })
}

enum IoSide {
    Input,
    Output,
}

/// Collect the user-defined @location slots of a module's sole entry point,
/// flattening IO structs and skipping builtins.
fn entry_io_locations(module: &naga::Module, side: IoSide) -> Vec<u32> {
    let mut locations = Vec::new();
    let Some(ep) = module.entry_points.first() else {
        return locations;
    };
    match side {
        IoSide::Input => {
            for arg in &ep.function.arguments {
                collect_locations(module, arg.ty, arg.binding.as_ref(), &mut locations);
            }
        }
        IoSide::Output => {
            if let Some(result) = &ep.function.result {
                collect_locations(module, result.ty, result.binding.as_ref(), &mut locations);
            }
        }
    }
    locations
}

fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut Vec<u32>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => out.push(*location),
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

/// A bind point on the pipeline layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindPoint {
    pub group: u32,
    pub binding: u32,
}

/// A named member inside the uniform block: byte offset plus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    pub offset: u32,
    pub size: u32,
}

/// The fragment stage's uniform block, resolved member-by-member.
#[derive(Debug, Clone)]
pub struct UniformBlock {
    pub bind: BindPoint,
    /// Total struct span in bytes.
    pub size: u32,
    members: BTreeMap<String, UniformSlot>,
}

impl UniformBlock {
    pub fn member(&self, name: &str) -> Option<UniformSlot> {
        self.members.get(name).copied()
    }
}

/// Resolved attribute and uniform slot tables.
///
/// Resolution is by string name; a name the program does not declare
/// resolves to `None` rather than raising, and callers must tolerate absent
/// optional slots (the reserved `objectDefinitions` slot stays unwritten
/// for exactly this reason).
#[derive(Debug, Clone)]
pub struct ProgramBindings {
    attributes: BTreeMap<String, u32>,
    pub uniform_block: Option<UniformBlock>,
    textures: BTreeMap<String, BindPoint>,
    samplers: BTreeMap<String, BindPoint>,
}

impl ProgramBindings {
    pub fn attribute(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).copied()
    }

    pub fn uniform(&self, name: &str) -> Option<UniformSlot> {
        self.uniform_block.as_ref().and_then(|b| b.member(name))
    }

    pub fn texture(&self, name: &str) -> Option<BindPoint> {
        self.textures.get(name).copied()
    }

    pub fn sampler(&self, name: &str) -> Option<BindPoint> {
        self.samplers.get(name).copied()
    }
}

/// Resolve attribute and uniform locations from the linked program.
///
/// Attributes come from the vertex entry point's arguments; uniform slots
/// from the fragment module's uniform-space block (member offsets as the
/// front-end laid them out); textures and samplers from its handle-space
/// globals.
pub fn resolve_locations(program: &ProgramHandle) -> ProgramBindings {
    let mut attributes = BTreeMap::new();
    if let Some(ep) = program.vertex.module.entry_points.first() {
        for arg in &ep.function.arguments {
            collect_named_locations(&program.vertex.module, arg.ty, arg.name.as_deref(), arg.binding.as_ref(), &mut attributes);
        }
    }

    let module = &program.fragment.module;
    let mut uniform_block = None;
    let mut textures = BTreeMap::new();
    let mut samplers = BTreeMap::new();
    for (_, var) in module.global_variables.iter() {
        let name = var.name.clone().unwrap_or_default();
        let Some(resource) = &var.binding else {
            continue;
        };
        let bind = BindPoint {
            group: resource.group,
            binding: resource.binding,
        };
        match (&var.space, &module.types[var.ty].inner) {
            (naga::AddressSpace::Uniform, naga::TypeInner::Struct { members, span }) => {
                let mut table = BTreeMap::new();
                for member in members {
                    let Some(member_name) = &member.name else {
                        continue;
                    };
                    let size = module.types[member.ty].inner.size(module.to_ctx());
                    table.insert(
                        member_name.clone(),
                        UniformSlot {
                            offset: member.offset,
                            size,
                        },
                    );
                }
                uniform_block = Some(UniformBlock {
                    bind,
                    size: *span,
                    members: table,
                });
            }
            (naga::AddressSpace::Handle, naga::TypeInner::Image { .. }) => {
                textures.insert(name, bind);
            }
            (naga::AddressSpace::Handle, naga::TypeInner::Sampler { .. }) => {
                samplers.insert(name, bind);
            }
            _ => {}
        }
    }

    let bindings = ProgramBindings {
        attributes,
        uniform_block,
        textures,
        samplers,
    };
    tracing::debug!(
        attributes = bindings.attributes.len(),
        uniforms = bindings
            .uniform_block
            .as_ref()
            .map(|b| b.members.len())
            .unwrap_or(0),
        textures = bindings.textures.len(),
        "resolved program locations"
    );
    bindings
}

fn collect_named_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    name: Option<&str>,
    binding: Option<&naga::Binding>,
    out: &mut BTreeMap<String, u32>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => {
            if let Some(name) = name {
                out.insert(name.to_string(), *location);
            }
        }
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_named_locations(
                        module,
                        member.ty,
                        member.name.as_deref(),
                        member.binding.as_ref(),
                        out,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD_VERT: &str = r#"
struct VertexOutput {
    @builtin(position) clipPosition: vec4<f32>,
    @location(0) ndc: vec2<f32>,
};

@vertex
fn vs_main(@location(0) vertexPosition: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clipPosition = vec4<f32>(vertexPosition, 0.0, 1.0);
    out.ndc = vertexPosition;
    return out;
}
"#;

    const TINY_FRAG: &str = r#"
struct Params {
    time: f32,
    resolution: vec2<f32>,
};

@group(0) @binding(0) var<uniform> params: Params;

@fragment
fn fs_main(@builtin(position) pos: vec4<f32>, @location(0) ndc: vec2<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(ndc * params.resolution / params.resolution, params.time * 0.0, 1.0);
}
"#;

    #[test]
    fn invalid_fragment_source_fails_with_log() {
        let err = compile("this is not wgsl", ShaderStage::Fragment).unwrap_err();
        match err {
            ProgramError::Compile { stage, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(!log.is_empty());
            }
            other => panic!("expected compile error, got: {other}"),
        }
    }

    #[test]
    fn valid_pair_compiles_and_links() {
        let vert = compile(QUAD_VERT, ShaderStage::Vertex).unwrap();
        let frag = compile(TINY_FRAG, ShaderStage::Fragment).unwrap();
        let program = link(vert, frag).unwrap();
        assert_eq!(program.vertex.entry_point, "vs_main");
        assert_eq!(program.fragment.entry_point, "fs_main");
    }

    #[test]
    fn missing_entry_point_fails_link() {
        // A vertex-only source compiled as fragment has no fragment entry.
        let vert = compile(QUAD_VERT, ShaderStage::Vertex).unwrap();
        let not_frag = compile(QUAD_VERT, ShaderStage::Fragment).unwrap();
        let err = link(vert, not_frag).unwrap_err();
        assert!(matches!(err, ProgramError::Link { .. }));
    }

    #[test]
    fn unmatched_varying_fails_link() {
        let lonely_vert = r#"
@vertex
fn vs_main(@location(0) vertexPosition: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(vertexPosition, 0.0, 1.0);
}
"#;
        let vert = compile(lonely_vert, ShaderStage::Vertex).unwrap();
        let frag = compile(TINY_FRAG, ShaderStage::Fragment).unwrap();
        assert!(matches!(
            link(vert, frag),
            Err(ProgramError::Link { .. })
        ));
    }

    #[test]
    fn resolves_attributes_and_uniform_offsets() {
        let vert = compile(QUAD_VERT, ShaderStage::Vertex).unwrap();
        let frag = compile(TINY_FRAG, ShaderStage::Fragment).unwrap();
        let program = link(vert, frag).unwrap();
        let bindings = resolve_locations(&program);

        assert_eq!(bindings.attribute("vertexPosition"), Some(0));
        // Optional attribute absent from the program: sentinel, not error.
        assert_eq!(bindings.attribute("vertexColor"), None);

        let time = bindings.uniform("time").unwrap();
        assert_eq!((time.offset, time.size), (0, 4));
        let resolution = bindings.uniform("resolution").unwrap();
        assert_eq!((resolution.offset, resolution.size), (8, 8));
        assert_eq!(bindings.uniform("objectDefinitions"), None);
    }

    #[test]
    fn shipped_shaders_satisfy_the_contract() {
        let vert_src = include_str!("../../../assets/shaders/raymarch.vert.wgsl");
        let frag_src = include_str!("../../../assets/shaders/raymarch.frag.wgsl");
        let vert = compile(vert_src, ShaderStage::Vertex).unwrap();
        let frag = compile(frag_src, ShaderStage::Fragment).unwrap();
        let program = link(vert, frag).unwrap();
        let bindings = resolve_locations(&program);

        assert_eq!(bindings.attribute("vertexPosition"), Some(0));
        for name in [
            "raysPerPixel",
            "bounceLimit",
            "depthOfField",
            "gravityStrength",
            "lightSpeed",
            "gravityExponent",
            "time",
            "directionalLight",
            "cameraPosition",
            "cameraOrientation",
            "resolution",
            "fovea",
            "spheres",
            "sphereColors",
        ] {
            assert!(bindings.uniform(name).is_some(), "missing uniform {name}");
        }
        assert!(bindings.texture("skybox").is_some());
        assert!(bindings.sampler("skyboxSampler").is_some());
        // Reserved slot: resolved if present, and our program does not
        // declare it.
        assert_eq!(bindings.uniform("objectDefinitions"), None);
    }
}
