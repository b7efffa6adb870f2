use super::barriers::Barrier;
use super::field_store::FieldStore;
use super::fields::SlotId;
use super::frame_resources::ImageResources;
use super::kernels::PassKernels;
use super::passes::{PassInvocation, PassTarget};
use super::scheduler::PassRecorder;
use crate::wgpu_utils::pipelines::PipelineManager;

/// Records passes into a wgpu command encoder, one render pass per draw.
pub struct GpuRecorder<'a> {
    pub device: &'a wgpu::Device,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub fields: &'a FieldStore,
    pub kernels: &'a PassKernels,
    pub pipelines: &'a PipelineManager,
    pub resources: &'a mut ImageResources,
    // Color attachment handed out by the presentation side for this image.
    pub surface_view: &'a wgpu::TextureView,
}

impl<'a> PassRecorder for GpuRecorder<'a> {
    fn clear(&mut self, slot: SlotId) {
        self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(slot.label()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: self.fields.write_target(slot),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }

    // wgpu tracks texture usage itself and transitions at render pass boundaries.
    // The barrier only shows up as a marker in graphics debuggers.
    fn barrier(&mut self, barrier: &Barrier) {
        if cfg!(debug_assertions) {
            self.encoder.insert_debug_marker(&format!(
                "{}: {:?} -> {:?}",
                barrier.slot.label(),
                barrier.old_layout,
                barrier.new_layout
            ));
        }
    }

    fn draw(&mut self, pass: &PassInvocation) {
        let kernel = self.kernels.get(pass.kind);
        let bind_group = self.resources.bind_group(self.device, kernel, self.fields, &pass.inputs);
        let target = match pass.target {
            PassTarget::Field(slot) => self.fields.write_target(slot),
            PassTarget::Surface => self.surface_view,
        };

        let mut rpass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(kernel.descriptor().label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    // Every texel gets overwritten.
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rpass.set_pipeline(self.pipelines.get_render(kernel.pipeline()));
        rpass.set_bind_group(0, bind_group, &[]);
        rpass.set_push_constants(wgpu::ShaderStages::FRAGMENT, 0, pass.constants.as_bytes());
        rpass.draw(0..4, 0..1);
    }
}
