//! The ray-march renderer: GPU pipeline assembly and the per-frame draw.
//!
//! Construction requires an already linked and resolved program plus a
//! loaded skybox; `wgpu::ShaderModule` creation happens here, after that
//! barrier. Each frame runs the fixed sequence: viewport/resize, clear,
//! uniform sync, draw, fence poll.

use crate::diagnostics::DiagnosticsMonitor;
use crate::program::{ProgramBindings, ProgramError, ProgramHandle, UniformBlock};
use crate::resources::{self, SkyboxTexture};
use crate::uniforms::{self, FrameInputs};
use gravpool_common::{Settings, SimulationState};
use std::collections::BTreeMap;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

/// Per-frame observations surfaced to the frame controller.
#[derive(Debug, Clone, Copy)]
pub struct FrameReport {
    /// Drawable size in device pixels after downsample scaling.
    pub viewport: (u32, u32),
    /// Non-blocking fence poll result. Observed but unused beyond
    /// availability; a hook for future backpressure.
    pub fence_signalled: bool,
}

/// Owns every GPU handle of the ray-march pipeline.
pub struct RaymarchRenderer {
    pipeline: wgpu::RenderPipeline,
    bind_groups: Vec<(u32, wgpu::BindGroup)>,
    uniform_buffer: wgpu::Buffer,
    quad_buffer: wgpu::Buffer,
    skybox: SkyboxTexture,
    block: UniformBlock,
    staging: Vec<u8>,
    monitor: DiagnosticsMonitor,
    depth_view: wgpu::TextureView,
    depth_size: (u32, u32),
    _program: ProgramHandle,
}

impl RaymarchRenderer {
    /// Assemble the pipeline from a linked program and a loaded skybox.
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        program: ProgramHandle,
        bindings: &ProgramBindings,
        skybox: SkyboxTexture,
    ) -> Result<Self, ProgramError> {
        let block = bindings.uniform_block.clone().ok_or_else(|| ProgramError::Link {
            log: "fragment stage declares no uniform block".into(),
        })?;
        let position_slot =
            bindings
                .attribute("vertexPosition")
                .ok_or_else(|| ProgramError::Link {
                    log: "vertex stage does not consume vertexPosition".into(),
                })?;

        let monitor = DiagnosticsMonitor::new(&program);

        let vertex_module = monitor.scoped(device, "create_vertex_module", || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("raymarch_vertex"),
                source: wgpu::ShaderSource::Wgsl(program.vertex.source.as_str().into()),
            })
        });
        let fragment_module = monitor.scoped(device, "create_fragment_module", || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("raymarch_fragment"),
                source: wgpu::ShaderSource::Wgsl(program.fragment.source.as_str().into()),
            })
        });

        // Uniform buffer sized to the reflected block span.
        let block_size = (block.size as u64 + 15) & !15;
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("raymarch_uniforms"),
            size: block_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Collect layout entries per bind group, as resolved by name.
        let mut layout_entries: BTreeMap<u32, Vec<wgpu::BindGroupLayoutEntry>> = BTreeMap::new();
        layout_entries
            .entry(block.bind.group)
            .or_default()
            .push(wgpu::BindGroupLayoutEntry {
                binding: block.bind.binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        let skybox_bind = bindings.texture("skybox");
        let sampler_bind = bindings.sampler("skyboxSampler");
        if let Some(bind) = skybox_bind {
            layout_entries
                .entry(bind.group)
                .or_default()
                .push(wgpu::BindGroupLayoutEntry {
                    binding: bind.binding,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                });
        }
        if let Some(bind) = sampler_bind {
            layout_entries
                .entry(bind.group)
                .or_default()
                .push(wgpu::BindGroupLayoutEntry {
                    binding: bind.binding,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                });
        }

        let mut layouts: Vec<(u32, wgpu::BindGroupLayout)> = Vec::new();
        for (group, entries) in &layout_entries {
            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("raymarch_bind_layout"),
                entries,
            });
            layouts.push((*group, layout));
        }

        let mut bind_groups = Vec::new();
        for (group, layout) in &layouts {
            let mut entries = Vec::new();
            if block.bind.group == *group {
                entries.push(wgpu::BindGroupEntry {
                    binding: block.bind.binding,
                    resource: uniform_buffer.as_entire_binding(),
                });
            }
            if let Some(bind) = skybox_bind.filter(|b| b.group == *group) {
                entries.push(wgpu::BindGroupEntry {
                    binding: bind.binding,
                    resource: wgpu::BindingResource::TextureView(&skybox.view),
                });
            }
            if let Some(bind) = sampler_bind.filter(|b| b.group == *group) {
                entries.push(wgpu::BindGroupEntry {
                    binding: bind.binding,
                    resource: wgpu::BindingResource::Sampler(&skybox.sampler),
                });
            }
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("raymarch_bind_group"),
                layout,
                entries: &entries,
            });
            bind_groups.push((*group, bind_group));
        }

        let layout_refs: Vec<&wgpu::BindGroupLayout> =
            layouts.iter().map(|(_, layout)| layout).collect();
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("raymarch_pipeline_layout"),
            bind_group_layouts: &layout_refs,
            push_constant_ranges: &[],
        });

        let quad_attributes = resources::quad_vertex_attributes(position_slot);
        let pipeline = monitor.scoped(device, "create_pipeline", || {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("raymarch_pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex_module,
                    entry_point: Some(program.vertex.entry_point.as_str()),
                    compilation_options: Default::default(),
                    buffers: &[resources::quad_vertex_layout(&quad_attributes)],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fragment_module,
                    entry_point: Some(program.fragment.entry_point.as_str()),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: Default::default(),
                multiview: None,
                cache: None,
            })
        });

        let quad_buffer = resources::create_quad_buffer(device);
        let depth_size = (1, 1);
        let depth_view = create_depth_texture(device, depth_size);

        tracing::info!(
            uniform_block_bytes = block.size,
            bind_groups = bind_groups.len(),
            "raymarch pipeline assembled"
        );

        Ok(Self {
            pipeline,
            bind_groups,
            uniform_buffer,
            quad_buffer,
            skybox,
            staging: vec![0u8; block_size as usize],
            block,
            monitor,
            depth_view,
            depth_size,
            _program: program,
        })
    }

    /// Render one frame: steps 2-6 of the tick sequence.
    ///
    /// Returns `None` when the surface needed reconfiguration and the frame
    /// was skipped.
    #[allow(clippy::too_many_arguments)]
    pub fn render_frame(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface: &wgpu::Surface,
        config: &mut wgpu::SurfaceConfiguration,
        window_size: (u32, u32),
        settings: &Settings,
        sim: &SimulationState,
        elapsed_seconds: f32,
    ) -> Option<FrameReport> {
        // Step 2: recompute the viewport rect and resize the drawable
        // surface to match before the viewport call.
        let viewport = scaled_viewport(window_size, settings.downsample);
        if (config.width, config.height) != viewport {
            config.width = viewport.0;
            config.height = viewport.1;
            surface.configure(device, config);
        }
        if self.depth_size != viewport {
            self.depth_view = create_depth_texture(device, viewport);
            self.depth_size = viewport;
        }

        let output = match surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                surface.configure(device, config);
                return None;
            }
            Err(e) => {
                tracing::error!(error = %e, "surface error");
                return None;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        // Step 4 (first half): push the slot table into the staging block.
        let inputs = FrameInputs {
            viewport,
            window: window_size,
            elapsed_seconds,
        };
        let table = uniforms::build_slot_table(settings, sim, &inputs);
        uniforms::encode_block(&table, &self.block, &mut self.staging);
        self.monitor.scoped(device, "uniform_upload", || {
            queue.write_buffer(&self.uniform_buffer, 0, &self.staging);
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("raymarch_encoder"),
        });
        {
            // Step 3: clear depth, color and stencil together.
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("raymarch_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(0),
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                ..Default::default()
            });
            pass.set_viewport(0.0, 0.0, viewport.0 as f32, viewport.1 as f32, 0.0, 1.0);

            // Steps 4 (second half) and 5: bind and draw the quad.
            pass.set_pipeline(&self.pipeline);
            for (group, bind_group) in &self.bind_groups {
                pass.set_bind_group(*group, bind_group, &[]);
            }
            pass.set_vertex_buffer(0, self.quad_buffer.slice(..));
            pass.draw(0..6, 0..1);
        }

        self.monitor.scoped(device, "draw_submit", || {
            queue.submit(std::iter::once(encoder.finish()));
        });

        // Step 6: completion fence, polled once without blocking.
        let fence_signalled = device
            .poll(wgpu::Maintain::Poll)
            .is_queue_empty();

        output.present();

        Some(FrameReport {
            viewport,
            fence_signalled,
        })
    }

    /// Deterministic teardown of the owned GPU handles. The remaining
    /// objects (pipeline, bind groups, views) drop with the value.
    pub fn destroy(self) {
        self.skybox.texture.destroy();
        self.quad_buffer.destroy();
        self.uniform_buffer.destroy();
        tracing::debug!("raymarch renderer destroyed");
    }
}

fn scaled_viewport(window_size: (u32, u32), downsample: f32) -> (u32, u32) {
    let scale = if downsample.is_finite() && downsample > 0.0 {
        downsample
    } else {
        1.0
    };
    let width = ((window_size.0 as f32 * scale).round() as u32).max(1);
    let height = ((window_size.1 as f32 * scale).round() as u32).max(1);
    (width, height)
}

fn create_depth_texture(device: &wgpu::Device, size: (u32, u32)) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("raymarch_depth"),
        size: wgpu::Extent3d {
            width: size.0.max(1),
            height: size.1.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_scales_by_downsample() {
        assert_eq!(scaled_viewport((1280, 720), 1.0), (1280, 720));
        assert_eq!(scaled_viewport((1280, 720), 0.5), (640, 360));
        assert_eq!(scaled_viewport((1280, 720), 0.25), (320, 180));
    }

    #[test]
    fn viewport_never_collapses_to_zero() {
        assert_eq!(scaled_viewport((1280, 720), 0.0), (1280, 720));
        assert_eq!(scaled_viewport((3, 3), 0.1), (1, 1));
    }
}
