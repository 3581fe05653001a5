//! Uniform sync protocol: the per-frame mapping from simulation and
//! settings state onto the resolved uniform slots.
//!
//! [`build_slot_table`] is a pure function of its inputs; for a fixed
//! snapshot it yields an identical table every frame. Encoding writes each
//! slot at the byte offset the program builder resolved, skipping slots the
//! program does not declare (the reserved `objectDefinitions` slot and the
//! `skybox` sampler index, which is realized as a bind group binding).

use crate::program::UniformBlock;
use gravpool_common::{BODY_COUNT, Settings, SimulationState};

/// Texture unit carrying the sky cubemap.
pub const SKYBOX_UNIT: i32 = 0;

/// Fixed sphere palette, one RGBA entry per body.
pub const SPHERE_PALETTE: [[f32; 4]; BODY_COUNT] = [
    [0.0, 0.0, 1.0, 0.90],
    [0.0, 1.0, 0.0, 0.10],
    [0.0, 1.0, 1.0, 0.80],
    [1.0, 0.0, 0.0, 0.20],
    [0.0, 0.0, 0.0, 0.70],
    [1.0, 1.0, 0.0, 0.30],
    [1.0, 0.5, 0.0, 0.60],
    [1.0, 0.0, 0.5, 0.40],
    [0.5, 1.0, 0.0, 0.45],
    [0.5, 0.0, 1.0, 0.55],
    [0.7, 0.7, 0.7, 0.50],
];

/// A typed uniform value, ready to encode.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Mat4([f32; 16]),
    Vec3Array([[f32; 3]; BODY_COUNT]),
    Vec4Array([[f32; 4]; BODY_COUNT]),
}

/// Per-frame values that are not part of the shared records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInputs {
    /// Drawable size in device pixels, after downsample scaling.
    pub viewport: (u32, u32),
    /// Window size in device pixels (the cursor's coordinate space).
    pub window: (u32, u32),
    /// Seconds since process start.
    pub elapsed_seconds: f32,
}

/// Build the slot-value table for one frame, in contract order.
pub fn build_slot_table(
    settings: &Settings,
    state: &SimulationState,
    inputs: &FrameInputs,
) -> Vec<(&'static str, UniformValue)> {
    let mut spheres = [[0.0f32; 3]; BODY_COUNT];
    for (slot, position) in spheres.iter_mut().zip(state.ball_positions.iter()) {
        *slot = position.to_array();
    }

    let (mouse_x, mouse_y) = state.mouse_coords;
    // {0,0} is bottom-left in the target convention; the cursor arrives
    // with a top-left origin, so flip against the window height.
    let fovea = [mouse_x, inputs.window.1 as f32 - mouse_y];

    vec![
        ("skybox", UniformValue::Int(SKYBOX_UNIT)),
        ("raysPerPixel", UniformValue::Int(settings.rays_per_pixel)),
        ("bounceLimit", UniformValue::Int(settings.bounce_limit)),
        ("depthOfField", UniformValue::Float(settings.depth_of_field)),
        (
            "gravityStrength",
            UniformValue::Float(settings.gravity_strength),
        ),
        ("lightSpeed", UniformValue::Float(settings.light_speed)),
        (
            "gravityExponent",
            UniformValue::Float(settings.gravity_exponent),
        ),
        ("time", UniformValue::Float(inputs.elapsed_seconds)),
        (
            "directionalLight",
            UniformValue::Vec3(settings.directional_light.to_array()),
        ),
        (
            "cameraPosition",
            UniformValue::Vec3(settings.camera_position.to_array()),
        ),
        (
            "cameraOrientation",
            UniformValue::Mat4(settings.camera_orientation.to_cols_array()),
        ),
        (
            "resolution",
            UniformValue::Vec2([inputs.viewport.0 as f32, inputs.viewport.1 as f32]),
        ),
        ("fovea", UniformValue::Vec2(fovea)),
        ("spheres", UniformValue::Vec3Array(spheres)),
        ("sphereColors", UniformValue::Vec4Array(SPHERE_PALETTE)),
    ]
}

/// Encode the slot table into the uniform staging buffer at the offsets the
/// program builder resolved. Slots the program does not declare are
/// skipped; slots that would overrun the block are skipped with a warning.
pub fn encode_block(
    table: &[(&'static str, UniformValue)],
    block: &UniformBlock,
    staging: &mut [u8],
) {
    for (name, value) in table {
        let Some(slot) = block.member(name) else {
            continue;
        };
        let offset = slot.offset as usize;
        match value {
            UniformValue::Int(v) => write_bytes(staging, offset, bytemuck::bytes_of(v), name),
            UniformValue::Float(v) => write_bytes(staging, offset, bytemuck::bytes_of(v), name),
            UniformValue::Vec2(v) => write_bytes(staging, offset, bytemuck::cast_slice(v), name),
            UniformValue::Vec3(v) => write_bytes(staging, offset, bytemuck::cast_slice(v), name),
            UniformValue::Mat4(v) => write_bytes(staging, offset, bytemuck::cast_slice(v), name),
            UniformValue::Vec3Array(rows) => {
                // vec3 array elements are padded to a 16-byte stride.
                for (i, row) in rows.iter().enumerate() {
                    write_bytes(staging, offset + i * 16, bytemuck::cast_slice(row), name);
                }
            }
            UniformValue::Vec4Array(rows) => {
                for (i, row) in rows.iter().enumerate() {
                    write_bytes(staging, offset + i * 16, bytemuck::cast_slice(row), name);
                }
            }
        }
    }
}

fn write_bytes(staging: &mut [u8], offset: usize, bytes: &[u8], name: &str) {
    let Some(dst) = staging.get_mut(offset..offset + bytes.len()) else {
        tracing::warn!(slot = name, offset, len = bytes.len(), "uniform slot overruns block; skipped");
        return;
    };
    dst.copy_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{ShaderStage, compile, link, resolve_locations};

    fn inputs() -> FrameInputs {
        FrameInputs {
            viewport: (640, 360),
            window: (1280, 720),
            elapsed_seconds: 12.5,
        }
    }

    #[test]
    fn table_is_deterministic_for_a_fixed_snapshot() {
        let settings = Settings::default();
        let state = SimulationState::default();
        let a = build_slot_table(&settings, &state, &inputs());
        let b = build_slot_table(&settings, &state, &inputs());
        assert_eq!(a, b);
    }

    #[test]
    fn palette_has_one_entry_per_body() {
        assert_eq!(SPHERE_PALETTE.len(), BODY_COUNT);
    }

    #[test]
    fn fovea_flips_y_against_window_height() {
        let settings = Settings::default();
        let mut state = SimulationState::default();
        state.mouse_coords = (100.0, 30.0);
        let table = build_slot_table(&settings, &state, &inputs());
        let (_, fovea) = table.iter().find(|(n, _)| *n == "fovea").unwrap();
        assert_eq!(*fovea, UniformValue::Vec2([100.0, 690.0]));
    }

    #[test]
    fn resolution_reflects_downsampled_viewport() {
        let settings = Settings::default();
        let state = SimulationState::default();
        let table = build_slot_table(&settings, &state, &inputs());
        let (_, res) = table.iter().find(|(n, _)| *n == "resolution").unwrap();
        assert_eq!(*res, UniformValue::Vec2([640.0, 360.0]));
    }

    #[test]
    fn encode_writes_resolved_offsets_and_skips_the_rest() {
        let frag = r#"
struct Params {
    time: f32,
    resolution: vec2<f32>,
    cameraPosition: vec3<f32>,
};
@group(0) @binding(0) var<uniform> params: Params;
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(params.cameraPosition * params.time, 1.0) + vec4<f32>(params.resolution, 0.0, 0.0);
}
"#;
        let vert = compile(
            "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }",
            ShaderStage::Vertex,
        )
        .unwrap();
        let frag = compile(frag, ShaderStage::Fragment).unwrap();
        let program = link(vert, frag).unwrap();
        let block = resolve_locations(&program).uniform_block.unwrap();

        let mut staging = vec![0u8; block.size as usize];
        let table = build_slot_table(&Settings::default(), &SimulationState::default(), &inputs());
        encode_block(&table, &block, &mut staging);

        let read_f32 = |offset: u32| {
            f32::from_le_bytes(staging[offset as usize..offset as usize + 4].try_into().unwrap())
        };
        let time = block.member("time").unwrap();
        assert_eq!(read_f32(time.offset), 12.5);

        let camera = block.member("cameraPosition").unwrap();
        let xyz = [
            read_f32(camera.offset),
            read_f32(camera.offset + 4),
            read_f32(camera.offset + 8),
        ];
        assert_eq!(xyz, [0.0, 2.0, -3.0]);

        // Slots the block does not declare (skybox, spheres, ...) were
        // skipped without touching the buffer.
        assert!(block.member("spheres").is_none());
    }
}
