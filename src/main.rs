#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate more_asserts;

mod config;
mod presentation;
mod simulation;
mod wgpu_utils;

use cgmath::Point2;
use config::{ConfigError, SimulationConfig};
use presentation::SurfacePresenter;
use simulation::{FrameError, FramePacer, GridGeometry, PointerState, PushConstants};
use std::sync::Arc;
use wgpu_utils::pipelines::PipelineManager;
use wgpu_utils::shader::{ShaderDirectory, ShaderError};
use winit::{
    event::{ElementState, Event, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowBuilder},
};

#[derive(thiserror::Error, Debug)]
pub enum SetupError {
    #[error("no suitable graphics adapter found")]
    NoAdapter,
    #[error("adapter is missing required features {0:?}")]
    MissingFeatures(wgpu::Features),
    #[error("failed to request device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("failed to create window surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("failed to allocate simulation fields: {0}")]
    FieldAllocation(String),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error("failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

fn grid_for(resolution: winit::dpi::PhysicalSize<u32>) -> Option<GridGeometry> {
    // Minimized windows have no surface to simulate on.
    if resolution.width == 0 || resolution.height == 0 {
        None
    } else {
        Some(GridGeometry::new(resolution.width, resolution.height))
    }
}

struct Application {
    window: Arc<Window>,
    device: Arc<wgpu::Device>,
    presenter: SurfacePresenter,
    frame_pacer: FramePacer,

    shader_dir: ShaderDirectory,
    pipeline_manager: PipelineManager,

    fluid: simulation::Fluid,
    pointer: PointerState,
}

impl Application {
    fn new(window: Arc<Window>, config: &SimulationConfig) -> Result<Application, SetupError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;
        let adapter = futures::executor::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or(SetupError::NoAdapter)?;
        info!("using adapter {:?}", adapter.get_info());

        // Kernels pass all their parameters as push constants, fields are sampled with linear filtering.
        let required_features = wgpu::Features::PUSH_CONSTANTS | wgpu::Features::FLOAT32_FILTERABLE;
        if !adapter.features().contains(required_features) {
            return Err(SetupError::MissingFeatures(required_features - adapter.features()));
        }
        let (device, queue) = futures::executor::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Device: ink"),
                required_features,
                required_limits: wgpu::Limits {
                    max_push_constant_size: PushConstants::RANGE_SIZE,
                    ..wgpu::Limits::default().using_resolution(adapter.limits())
                },
            },
            None,
        ))?;
        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let resolution = window.inner_size();
        let presenter = SurfacePresenter::new(
            device.clone(),
            queue,
            &adapter,
            surface,
            resolution,
            config.frames_in_flight,
            config.vsync,
        );

        let shader_dir = ShaderDirectory::new(&config.shader_directory)?;
        let mut pipeline_manager = PipelineManager::new();
        // Grid is recreated with the first non-empty resize if the window starts out minimized.
        let grid = grid_for(resolution).unwrap_or_else(|| GridGeometry::new(1, 1));
        let fluid = simulation::Fluid::new(
            &device,
            &shader_dir,
            &mut pipeline_manager,
            presenter.format(),
            grid,
            presenter.num_images(),
            config,
        )?;

        Ok(Application {
            window,
            device,
            frame_pacer: FramePacer::new(presenter.num_images()),
            presenter,
            shader_dir,
            pipeline_manager,
            fluid,
            pointer: PointerState::default(),
        })
    }

    fn recreate(&mut self) -> Result<(), SetupError> {
        let resolution = self.window.inner_size();
        let grid = match grid_for(resolution) {
            Some(grid) => grid,
            None => return Ok(()),
        };
        self.presenter.configure(resolution);
        self.frame_pacer.reset();
        if grid != self.fluid.grid() {
            self.fluid.resize(&self.device, grid, self.presenter.num_images())?;
        }
        Ok(())
    }

    fn update(&mut self) {
        if self.shader_dir.detected_change() {
            info!("reloading shaders");
            self.pipeline_manager.reload_all(&self.device, &self.shader_dir);
        }
    }

    fn draw(&mut self) -> Result<(), FrameError> {
        if grid_for(self.window.inner_size()).is_none() {
            return Ok(());
        }

        let device = &self.device;
        let fluid = &mut self.fluid;
        let pipeline_manager = &self.pipeline_manager;
        let pointer = self.pointer;
        self.frame_pacer.frame(&mut self.presenter, |image_index, image| {
            let view = image.texture.create_view(&Default::default());
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Encoder: Frame"),
            });
            fluid.record_frame(device, &mut encoder, pipeline_manager, image_index, &view, pointer);
            encoder.finish()
        })
    }

    fn handle_key(&mut self, key: &Key) -> bool {
        match key {
            Key::Named(NamedKey::Escape) => return false,
            Key::Named(NamedKey::Space) => {
                self.fluid.toggle_pause();
                self.window.set_title(if self.fluid.is_paused() { "ink (paused)" } else { "ink" });
            }
            Key::Character(character) if character.eq_ignore_ascii_case("r") => self.fluid.reset(),
            _ => {}
        }
        true
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = SimulationConfig::load().map_err(SetupError::from)?;
    debug!("{:?}", config);

    let event_loop = EventLoop::new().map_err(SetupError::from)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("ink")
            .with_resizable(true)
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720))
            .build(&event_loop)
            .map_err(SetupError::from)?,
    );

    let mut application = Application::new(window.clone(), &config)?;
    let mut fatal_error: Option<Box<dyn std::error::Error>> = None;

    event_loop.set_control_flow(ControlFlow::Poll);
    event_loop.run(|event, target| match event {
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::CloseRequested => target.exit(),
            WindowEvent::Resized(_) => {
                if let Err(err) = application.recreate() {
                    fatal_error = Some(err.into());
                    target.exit();
                }
            }
            WindowEvent::KeyboardInput {
                event: KeyEvent {
                    logical_key,
                    state: ElementState::Pressed,
                    repeat: false,
                    ..
                },
                ..
            } => {
                if !application.handle_key(&logical_key) {
                    target.exit();
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                application.pointer.position = Point2::new(position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                application.pointer.primary_down = state == ElementState::Pressed;
            }
            WindowEvent::RedrawRequested => match application.draw() {
                Ok(()) => {}
                Err(FrameError::NeedsRecreation) => {
                    warn!("surface out of date, recreating");
                    if let Err(err) = application.recreate() {
                        fatal_error = Some(err.into());
                        target.exit();
                    }
                }
                Err(err) => {
                    fatal_error = Some(err.into());
                    target.exit();
                }
            },
            _ => {}
        },
        Event::AboutToWait => {
            application.update();
            window.request_redraw();
        }
        Event::LoopExiting => {
            info!("exiting after {} simulation steps", application.fluid.num_steps());
        }
        _ => {}
    })?;

    match fatal_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        error!("{}", err);
        std::process::exit(1);
    }
}
