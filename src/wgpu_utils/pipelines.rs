use super::shader::{ShaderDirectory, ShaderError, SHADER_ENTRY_POINT_NAME};
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

pub type RenderPipelineHandle = Rc<usize>;

pub struct RenderPipelineCreationDesc {
    pub label: &'static str,

    /// The layout of bind groups and push constants for this pipeline.
    pub layout: Rc<wgpu::PipelineLayout>,

    pub vertex_shader_relative_path: PathBuf,
    pub fragment_shader_relative_path: PathBuf,

    /// The primitive topology used to interpret vertices.
    pub primitive_topology: wgpu::PrimitiveTopology,

    /// The effect of draw calls on the color aspect of the output target.
    pub color_targets: Vec<Option<wgpu::ColorTargetState>>,
}

impl RenderPipelineCreationDesc {
    // Defaults to a full screen triangle strip without vertex buffers, writing to a single target.
    pub fn new(
        label: &'static str,
        layout: Rc<wgpu::PipelineLayout>,
        vertex_shader_relative_path: &Path,
        fragment_shader_relative_path: &Path,
        target_format: wgpu::TextureFormat,
    ) -> Self {
        RenderPipelineCreationDesc {
            label,
            layout,
            vertex_shader_relative_path: PathBuf::from(vertex_shader_relative_path),
            fragment_shader_relative_path: PathBuf::from(fragment_shader_relative_path),
            primitive_topology: wgpu::PrimitiveTopology::TriangleStrip,
            color_targets: vec![Some(color_state::write_all(target_format))],
        }
    }

    fn try_create_pipeline(&self, device: &wgpu::Device, shader_dir: &ShaderDirectory) -> Result<wgpu::RenderPipeline, ShaderError> {
        let vs_module = shader_dir.load_shader_module(device, &self.vertex_shader_relative_path)?;
        let fs_module = shader_dir.load_shader_module(device, &self.fragment_shader_relative_path)?;

        // Anything naga accepted may still fail wgpu validation (e.g. mismatching layouts).
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(self.label),
            layout: Some(&self.layout),
            vertex: wgpu::VertexState {
                module: &vs_module,
                entry_point: SHADER_ENTRY_POINT_NAME,
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &fs_module,
                entry_point: SHADER_ENTRY_POINT_NAME,
                targets: &self.color_targets,
            }),
            primitive: wgpu::PrimitiveState {
                topology: self.primitive_topology,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });
        match futures::executor::block_on(device.pop_error_scope()) {
            None => Ok(pipeline),
            Some(error) => Err(ShaderError::Compilation {
                identifier: self.label.to_string(),
                message: error.to_string(),
            }),
        }
    }
}

struct ReloadableRenderPipeline {
    desc: RenderPipelineCreationDesc,
    pipeline: wgpu::RenderPipeline,
    handle: Weak<usize>,
}

pub struct PipelineManager {
    render_pipelines: Vec<ReloadableRenderPipeline>,
}

impl PipelineManager {
    pub fn new() -> Self {
        PipelineManager {
            render_pipelines: Vec::new(),
        }
    }

    pub fn create_render_pipeline(
        &mut self,
        device: &wgpu::Device,
        shader_dir: &ShaderDirectory,
        desc: RenderPipelineCreationDesc,
    ) -> Result<RenderPipelineHandle, ShaderError> {
        let pipeline = desc.try_create_pipeline(device, shader_dir)?;

        let mut first_free_slot = 0;
        while first_free_slot < self.render_pipelines.len() && self.render_pipelines[first_free_slot].handle.strong_count() > 0 {
            first_free_slot += 1;
        }

        let handle = Rc::new(first_free_slot);
        let new_reloadable_pipeline = ReloadableRenderPipeline {
            desc,
            pipeline,
            handle: Rc::downgrade(&handle),
        };
        if first_free_slot == self.render_pipelines.len() {
            self.render_pipelines.push(new_reloadable_pipeline);
        } else {
            self.render_pipelines[first_free_slot] = new_reloadable_pipeline;
        }
        Ok(handle)
    }

    // todo: reload only what's necessary
    pub fn reload_all(&mut self, device: &wgpu::Device, shader_dir: &ShaderDirectory) {
        for reloadable_pipeline in self.render_pipelines.iter_mut() {
            if reloadable_pipeline.handle.strong_count() == 0 {
                continue;
            }
            match reloadable_pipeline.desc.try_create_pipeline(device, shader_dir) {
                Ok(new_wgpu_pipeline) => reloadable_pipeline.pipeline = new_wgpu_pipeline,
                Err(err) => error!("Keeping previous version of {}: {}", reloadable_pipeline.desc.label, err),
            }
        }
    }

    pub fn get_render(&self, handle: &RenderPipelineHandle) -> &wgpu::RenderPipeline {
        let i: usize = **handle;
        assert!(self.render_pipelines[i].handle.ptr_eq(&Rc::downgrade(handle)));
        &self.render_pipelines[i].pipeline
    }
}

pub mod color_state {
    pub fn write_all(format: wgpu::TextureFormat) -> wgpu::ColorTargetState {
        wgpu::ColorTargetState {
            format,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        }
    }
}
