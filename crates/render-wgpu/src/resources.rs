//! GPU resource loader: the full-screen quad buffer and the sky cubemap.
//!
//! The cubemap is allocated with placeholder storage before any image
//! exists, so binding it is legal immediately; face images are then
//! fetched in parallel behind an all-complete barrier and uploaded into
//! their designated layers.

use gravpool_assets::{AssetError, AssetSource, FaceImage, fetch_cubemap_faces};

/// Fixed per-face resolution of the cubemap's placeholder storage.
pub const FACE_EXTENT: u32 = 2048;

/// Two triangles covering the viewport in normalized device coordinates.
pub const QUAD_VERTICES: [[f32; 2]; 6] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [-1.0, 1.0],
    [-1.0, 1.0],
    [1.0, -1.0],
    [1.0, 1.0],
];

/// Allocate and upload the quad as static vertex data.
pub fn create_quad_buffer(device: &wgpu::Device) -> wgpu::Buffer {
    use wgpu::util::DeviceExt;
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("quad_vertex_buffer"),
        contents: bytemuck::cast_slice(&QUAD_VERTICES),
        usage: wgpu::BufferUsages::VERTEX,
    })
}

/// Attribute entry feeding the quad's 2-D positions into the resolved
/// `vertexPosition` slot. The caller owns the array so the layout can
/// borrow it for the pipeline descriptor's lifetime.
pub fn quad_vertex_attributes(position_slot: u32) -> [wgpu::VertexAttribute; 1] {
    [wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x2,
        offset: 0,
        shader_location: position_slot,
    }]
}

/// Vertex-layout descriptor over [`quad_vertex_attributes`].
pub fn quad_vertex_layout(attributes: &[wgpu::VertexAttribute]) -> wgpu::VertexBufferLayout<'_> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 2]>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    }
}

/// The sky cubemap with its view and sampler.
pub struct SkyboxTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl SkyboxTexture {
    /// Allocate the six faces with empty placeholder storage so the
    /// texture is usable before any image has loaded.
    pub fn placeholder(device: &wgpu::Device) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("skybox_cubemap"),
            size: wgpu::Extent3d {
                width: FACE_EXTENT,
                height: FACE_EXTENT,
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("skybox_view"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("skybox_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Upload one decoded face into its designated cube layer.
    pub fn upload_face(&self, queue: &wgpu::Queue, face: &FaceImage) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: face.face.layer(),
                },
                aspect: wgpu::TextureAspect::All,
            },
            face.rgba.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * FACE_EXTENT),
                rows_per_image: Some(FACE_EXTENT),
            },
            wgpu::Extent3d {
                width: FACE_EXTENT,
                height: FACE_EXTENT,
                depth_or_array_layers: 1,
            },
        );
    }
}

/// Fetch all six faces (barrier) and upload them into a fresh cubemap.
pub fn load_skybox(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    source: &dyn AssetSource,
) -> Result<SkyboxTexture, AssetError> {
    let skybox = SkyboxTexture::placeholder(device);
    let faces = fetch_cubemap_faces(source, FACE_EXTENT)?;
    for face in &faces {
        skybox.upload_face(queue, face);
    }
    tracing::info!(faces = faces.len(), extent = FACE_EXTENT, "skybox loaded");
    Ok(skybox)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_covers_ndc_with_six_vertices() {
        assert_eq!(QUAD_VERTICES.len(), 6);
        for [x, y] in QUAD_VERTICES {
            assert!(x.abs() == 1.0 && y.abs() == 1.0);
        }
        // The two triangles share their diagonal.
        assert_eq!(QUAD_VERTICES[2], QUAD_VERTICES[3]);
        assert_eq!(QUAD_VERTICES[1], QUAD_VERTICES[4]);
    }
}
