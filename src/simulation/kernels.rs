use super::field_store::FieldStore;
use super::passes::*;
use crate::wgpu_utils::binding_builder::*;
use crate::wgpu_utils::binding_glsl;
use crate::wgpu_utils::pipelines::*;
use crate::wgpu_utils::shader::{ShaderDirectory, ShaderError};
use std::rc::Rc;
use strum::IntoEnumIterator;

/// Pipeline and bind group layout of one pass kind.
pub struct PassKernel {
    descriptor: &'static PassDescriptor,
    group_layout: BindGroupLayoutWithDesc,
    pipeline: RenderPipelineHandle,
}

impl PassKernel {
    fn new(
        device: &wgpu::Device,
        shader_dir: &ShaderDirectory,
        pipeline_manager: &mut PipelineManager,
        descriptor: &'static PassDescriptor,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self, ShaderError> {
        // Shared sampler first, then the sampled fields in the order of PassInvocation::inputs.
        let mut layout_builder = BindGroupLayoutBuilder::new().next_binding_fragment(binding_glsl::sampler());
        for _ in 0..descriptor.num_inputs {
            layout_builder = layout_builder.next_binding_fragment(binding_glsl::texture2D());
        }
        let group_layout = layout_builder.create(device, descriptor.label);

        // Use same push constant range for all pipelines to improve internal Vulkan pipeline compatibility.
        let layout = Rc::new(device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(descriptor.label),
            bind_group_layouts: &[&group_layout.layout],
            push_constant_ranges: &[wgpu::PushConstantRange {
                stages: wgpu::ShaderStages::FRAGMENT,
                range: 0..PushConstants::RANGE_SIZE,
            }],
        }));

        let target_format = match descriptor.target {
            TargetFormat::Field => FieldStore::FORMAT,
            TargetFormat::Surface => surface_format,
        };
        let pipeline = pipeline_manager.create_render_pipeline(
            device,
            shader_dir,
            RenderPipelineCreationDesc::new(
                descriptor.label,
                layout,
                descriptor.vertex_shader_path(),
                descriptor.fragment_shader_path(),
                target_format,
            ),
        )?;

        Ok(PassKernel {
            descriptor,
            group_layout,
            pipeline,
        })
    }

    pub fn descriptor(&self) -> &'static PassDescriptor {
        self.descriptor
    }

    pub fn group_layout(&self) -> &BindGroupLayoutWithDesc {
        &self.group_layout
    }

    pub fn pipeline(&self) -> &RenderPipelineHandle {
        &self.pipeline
    }
}

/// All pass kernels. Independent of the grid size, created once.
pub struct PassKernels {
    kernels: Vec<PassKernel>,
}

impl PassKernels {
    pub fn new(
        device: &wgpu::Device,
        shader_dir: &ShaderDirectory,
        pipeline_manager: &mut PipelineManager,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self, ShaderError> {
        let kernels = PassKind::iter()
            .map(|kind| PassKernel::new(device, shader_dir, pipeline_manager, PassDescriptor::get(kind), surface_format))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PassKernels { kernels })
    }

    pub fn get(&self, kind: PassKind) -> &PassKernel {
        &self.kernels[kind as usize]
    }
}
