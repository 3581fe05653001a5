use anyhow::{Context, Result};
use clap::Parser;
use gravpool_assets::{AssetSource, FRAGMENT_SHADER_PATH, FsAssets, VERTEX_SHADER_PATH};
use gravpool_input::{Action, apply, map_key};
use gravpool_persist::SettingsStore;
use gravpool_render_wgpu::{
    FrameController, RaymarchRenderer, ShaderStage, TickSource, compile, link,
    program::resolve_locations, resources,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "gravpool-desktop", about = "Gravity-pool ray-march renderer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Settings data directory
    #[arg(long, default_value = "./gravpool_data")]
    data_dir: String,

    /// Asset root holding the shader sources and skybox faces
    #[arg(long, default_value = "./assets")]
    assets_dir: String,
}

/// Host-driven tick source: each tick schedules the next redraw.
struct WindowTicks(Arc<Window>);

impl TickSource for WindowTicks {
    fn request_tick(&self) {
        self.0.request_redraw();
    }
}

struct GpuApp {
    controller: FrameController,
    assets_dir: String,
    window: Option<Arc<Window>>,
    window_size: (u32, u32),
    surface: Option<wgpu::Surface<'static>>,
    device: Option<wgpu::Device>,
    queue: Option<wgpu::Queue>,
    config: Option<wgpu::SurfaceConfiguration>,
    renderer: Option<RaymarchRenderer>,
    ticks: Option<WindowTicks>,
}

impl GpuApp {
    fn new(controller: FrameController, assets_dir: String) -> Self {
        Self {
            controller,
            assets_dir,
            window: None,
            window_size: (1, 1),
            surface: None,
            device: None,
            queue: None,
            config: None,
            renderer: None,
            ticks: None,
        }
    }

    /// Setup barrier: compile -> link -> resolve -> upload. No draw is
    /// legal until this returns.
    fn build_renderer(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
    ) -> Result<RaymarchRenderer> {
        let assets = FsAssets::new(&self.assets_dir);

        let vert_src = assets
            .load_text(VERTEX_SHADER_PATH)
            .context("fetching vertex shader source")?;
        let frag_src = assets
            .load_text(FRAGMENT_SHADER_PATH)
            .context("fetching fragment shader source")?;

        let vertex = compile(&vert_src, ShaderStage::Vertex)?;
        let fragment = compile(&frag_src, ShaderStage::Fragment)?;
        let program = link(vertex, fragment)?;
        let bindings = resolve_locations(&program);

        let skybox =
            resources::load_skybox(device, queue, &assets).context("loading sky cubemap")?;

        let renderer = RaymarchRenderer::new(device, surface_format, program, &bindings, skybox)?;
        Ok(renderer)
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title("gravpool")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs).expect("create window"));

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .expect("create surface");

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .expect("find adapter");

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("gravpool_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .expect("create device");

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        match self.build_renderer(&device, &queue, surface_format) {
            Ok(renderer) => {
                self.renderer = Some(renderer);
                self.controller.mark_ready();
            }
            Err(e) => {
                // Fatal setup error: the controller never leaves
                // Uninitialized and the process exits.
                tracing::error!(error = ?e, "renderer setup failed");
                event_loop.exit();
                return;
            }
        }

        tracing::info!(
            backend = adapter.get_info().backend.to_str(),
            "GPU initialized"
        );

        self.window_size = (size.width.max(1), size.height.max(1));
        self.ticks = Some(WindowTicks(window.clone()));
        self.window = Some(window);
        self.surface = Some(surface);
        self.device = Some(device);
        self.queue = Some(queue);
        self.config = Some(config);

        if let Some(ticks) = &self.ticks {
            ticks.request_tick();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(renderer) = self.renderer.take() {
                    renderer.destroy();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.window_size = (new_size.width.max(1), new_size.height.max(1));
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        ..
                    },
                ..
            } => {
                let action = map_key(key, key_state == ElementState::Pressed);
                apply(action, &mut self.controller.sim, &mut self.controller.settings);
            }
            WindowEvent::CursorMoved { position, .. } => {
                apply(
                    Action::PointerMoved {
                        x: position.x as f32,
                        y: position.y as f32,
                    },
                    &mut self.controller.sim,
                    &mut self.controller.settings,
                );
            }
            WindowEvent::RedrawRequested => {
                let (Some(surface), Some(device), Some(queue), Some(config), Some(renderer)) = (
                    &self.surface,
                    &self.device,
                    &self.queue,
                    &mut self.config,
                    &mut self.renderer,
                ) else {
                    return;
                };

                self.controller.begin_tick();
                let elapsed = self.controller.elapsed_seconds();
                if let Some(report) = renderer.render_frame(
                    device,
                    queue,
                    surface,
                    config,
                    self.window_size,
                    &self.controller.settings,
                    &self.controller.sim,
                    elapsed,
                ) {
                    tracing::trace!(
                        width = report.viewport.0,
                        height = report.viewport.1,
                        fence_signalled = report.fence_signalled,
                        "frame submitted"
                    );
                }
                if let Some(ticks) = &self.ticks {
                    self.controller.end_tick(ticks);
                }
            }
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("gravpool-desktop starting");

    let store = SettingsStore::open(&cli.data_dir)
        .with_context(|| format!("opening settings store at {}", cli.data_dir))?;
    let controller = FrameController::new(store);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(controller, cli.assets_dir);
    event_loop.run_app(&mut app)?;

    Ok(())
}
