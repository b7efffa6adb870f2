use crate::simulation::{AcquiredImage, FrameError, PresentationBackend};
use std::sync::Arc;

/// Presentation backend on top of a wgpu surface.
///
/// wgpu has no fence objects, the submission index of the last submit per sync slot takes their place.
/// The presentation engine's image index isn't exposed either: images are numbered in acquisition order,
/// which is what per-image resources need as long as there are as many of them as sync slots.
pub struct SurfacePresenter {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    fences: Vec<Option<wgpu::SubmissionIndex>>,
    num_acquired: usize,
    // Set if the last acquired image didn't match the surface anymore.
    suboptimal: bool,
}

impl SurfacePresenter {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        adapter: &wgpu::Adapter,
        surface: wgpu::Surface<'static>,
        resolution: winit::dpi::PhysicalSize<u32>,
        num_images: usize,
        vsync: bool,
    ) -> Self {
        let capabilities = surface.get_capabilities(adapter);
        let format = capabilities
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .unwrap_or(capabilities.formats[0]);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: resolution.width,
            height: resolution.height,
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            desired_maximum_frame_latency: num_images as u32,
            alpha_mode: capabilities.alpha_modes[0],
            view_formats: Vec::new(),
        };

        let mut presenter = SurfacePresenter {
            device,
            queue,
            surface,
            config,
            fences: (0..num_images).map(|_| None).collect(),
            num_acquired: 0,
            suboptimal: false,
        };
        presenter.configure(resolution);
        presenter
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn num_images(&self) -> usize {
        self.fences.len()
    }

    /// (Re)configures the surface. Waits for the device first, all sync slots are free afterwards.
    pub fn configure(&mut self, resolution: winit::dpi::PhysicalSize<u32>) {
        info!("configuring surface {:?} with {}x{}", self.config.format, resolution.width, resolution.height);
        self.wait_idle();
        self.config.width = resolution.width;
        self.config.height = resolution.height;
        self.surface.configure(&self.device, &self.config);
        self.num_acquired = 0;
        self.suboptimal = false;
    }

    pub fn wait_idle(&mut self) {
        self.device.poll(wgpu::Maintain::Wait);
        for fence in self.fences.iter_mut() {
            *fence = None;
        }
    }
}

impl PresentationBackend for SurfacePresenter {
    type Image = wgpu::SurfaceTexture;
    type Commands = wgpu::CommandBuffer;

    // wgpu offers no timeout for this, a hung gpu blocks here.
    fn wait_fence(&mut self, sync_index: usize) -> Result<(), FrameError> {
        if let Some(submission_index) = &self.fences[sync_index] {
            self.device.poll(wgpu::Maintain::WaitForSubmissionIndex(submission_index.clone()));
        }
        Ok(())
    }

    fn reset_fence(&mut self, sync_index: usize) {
        self.fences[sync_index] = None;
    }

    fn acquire(&mut self, _sync_index: usize) -> Result<AcquiredImage<Self::Image>, FrameError> {
        match self.surface.get_current_texture() {
            Ok(image) => {
                self.suboptimal = image.suboptimal;
                let index = self.num_acquired % self.fences.len();
                self.num_acquired += 1;
                Ok(AcquiredImage { index, image })
            }
            Err(wgpu::SurfaceError::Outdated) | Err(wgpu::SurfaceError::Lost) => Err(FrameError::NeedsRecreation),
            Err(wgpu::SurfaceError::Timeout) => Err(FrameError::Timeout),
            Err(wgpu::SurfaceError::OutOfMemory) => Err(FrameError::OutOfMemory),
        }
    }

    fn submit(&mut self, sync_index: usize, commands: Self::Commands) {
        self.fences[sync_index] = Some(self.queue.submit(Some(commands)));
    }

    fn present(&mut self, image: Self::Image) -> Result<(), FrameError> {
        image.present();
        if self.suboptimal {
            warn!("surface is suboptimal");
            Err(FrameError::NeedsRecreation)
        } else {
            Ok(())
        }
    }
}
