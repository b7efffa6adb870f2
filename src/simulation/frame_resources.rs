use super::field_store::FieldStore;
use super::fields::SlotId;
use super::kernels::PassKernel;
use super::passes::PassKind;
use crate::wgpu_utils::binding_builder::BindGroupBuilder;
use std::collections::HashMap;

// The same kernel is bound with different field combinations depending on ping-pong state.
type BindingKey = (PassKind, Vec<SlotId>);

/// Bindings owned by a single swapchain image.
pub struct ImageResources {
    bind_groups: HashMap<BindingKey, wgpu::BindGroup>,
}

impl ImageResources {
    /// Bind group for sampling `inputs` with `kernel`. Created on first use.
    pub fn bind_group(&mut self, device: &wgpu::Device, kernel: &PassKernel, fields: &FieldStore, inputs: &[SlotId]) -> &wgpu::BindGroup {
        let descriptor = kernel.descriptor();
        assert_eq!(inputs.len(), descriptor.num_inputs, "{:?} expects {} inputs", descriptor.kind, descriptor.num_inputs);

        self.bind_groups.entry((descriptor.kind, inputs.to_vec())).or_insert_with(|| {
            let mut builder = BindGroupBuilder::new(kernel.group_layout()).sampler(fields.sampler());
            for input in inputs {
                builder = builder.texture(fields.read(*input));
            }
            builder.create(device, descriptor.label)
        })
    }
}

/// Per-image resources for all swapchain images.
///
/// Bind groups reference the field textures and have to be dropped together with the FieldStore.
pub struct FrameResources {
    images: Vec<ImageResources>,
}

impl FrameResources {
    pub fn new(num_images: usize) -> Self {
        assert_gt!(num_images, 0);
        FrameResources {
            images: (0..num_images)
                .map(|_| ImageResources {
                    bind_groups: HashMap::new(),
                })
                .collect(),
        }
    }

    pub fn image(&mut self, image_index: usize) -> &mut ImageResources {
        &mut self.images[image_index]
    }
}
