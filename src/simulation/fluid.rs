use super::field_store::FieldStore;
use super::fields::{GridGeometry, SimulationState};
use super::force_injector::{ForceInjector, PointerState};
use super::frame_resources::FrameResources;
use super::gpu_recorder::GpuRecorder;
use super::kernels::PassKernels;
use super::scheduler::{StepScheduler, StepSettings};
use crate::config::SimulationConfig;
use crate::wgpu_utils::pipelines::PipelineManager;
use crate::wgpu_utils::shader::ShaderDirectory;

// Everything that depends on the grid resolution.
struct GridDependentProperties {
    fields: FieldStore,
    frame_resources: FrameResources,
    scheduler: StepScheduler,
}

impl GridDependentProperties {
    fn new(device: &wgpu::Device, grid: GridGeometry, settings: StepSettings, num_images: usize) -> Result<Self, crate::SetupError> {
        Ok(GridDependentProperties {
            fields: FieldStore::new(device, grid)?,
            frame_resources: FrameResources::new(num_images),
            scheduler: StepScheduler::new(grid, settings),
        })
    }
}

/// Ink simulation on a grid matching the output surface.
pub struct Fluid {
    kernels: PassKernels,
    grid_dependent: GridDependentProperties,
    settings: StepSettings,
    force_injector: ForceInjector,

    state: SimulationState,
    // Fields need to be cleared before the next step.
    needs_initialization: bool,
    paused: bool,
    num_steps: u64,
}

impl Fluid {
    pub fn new(
        device: &wgpu::Device,
        shader_dir: &ShaderDirectory,
        pipeline_manager: &mut PipelineManager,
        surface_format: wgpu::TextureFormat,
        grid: GridGeometry,
        num_images: usize,
        config: &SimulationConfig,
    ) -> Result<Self, crate::SetupError> {
        let settings = StepSettings::from_config(config);
        Ok(Fluid {
            kernels: PassKernels::new(device, shader_dir, pipeline_manager, surface_format)?,
            grid_dependent: GridDependentProperties::new(device, grid, settings, num_images)?,
            settings,
            force_injector: ForceInjector::new(&config.force),
            state: SimulationState::default(),
            needs_initialization: true,
            paused: false,
            num_steps: 0,
        })
    }

    pub fn grid(&self) -> GridGeometry {
        self.grid_dependent.fields.grid()
    }

    pub fn num_steps(&self) -> u64 {
        self.num_steps
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        // Pointer movement while paused must not turn into one big push.
        self.force_injector.reset();
        info!("simulation {}", if self.paused { "paused" } else { "resumed" });
    }

    /// Starts over from zero fields with the next recorded frame.
    pub fn reset(&mut self) {
        info!("resetting simulation after {} steps", self.num_steps);
        self.needs_initialization = true;
        self.num_steps = 0;
        self.force_injector.reset();
    }

    /// Rebuilds all grid sized resources. Previous field contents are lost. The device has to be idle.
    pub fn resize(&mut self, device: &wgpu::Device, grid: GridGeometry, num_images: usize) -> Result<(), crate::SetupError> {
        self.grid_dependent = GridDependentProperties::new(device, grid, self.settings, num_images)?;
        self.reset();
        Ok(())
    }

    /// Records a simulation step (or only the present pass while paused) for the given swapchain image.
    pub fn record_frame(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        pipeline_manager: &PipelineManager,
        image_index: usize,
        surface_view: &wgpu::TextureView,
        pointer: PointerState,
    ) {
        let grid = self.grid();
        let GridDependentProperties {
            fields,
            frame_resources,
            scheduler,
        } = &mut self.grid_dependent;

        let mut recorder = GpuRecorder {
            device,
            encoder,
            fields,
            kernels: &self.kernels,
            pipelines: pipeline_manager,
            resources: frame_resources.image(image_index),
            surface_view,
        };

        if self.needs_initialization {
            self.state = scheduler.initialize(&mut recorder);
            self.needs_initialization = false;
        }

        if self.paused {
            scheduler.record_present(self.state, &mut recorder);
        } else {
            let impulse = self.force_injector.update(pointer, grid);
            self.state = scheduler.record_step(self.state, &impulse, &mut recorder);
            self.num_steps += 1;
        }
    }
}
