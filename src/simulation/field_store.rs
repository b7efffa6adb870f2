use super::fields::{GridGeometry, SlotId};
use crate::wgpu_utils::binding_builder::simple_sampler;

struct FieldTexture {
    // Owned so the views stay valid.
    #[allow(dead_code)]
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// The six field textures plus the sampler every pass reads them with.
///
/// Sized to the surface resolution, rebuilt whenever that changes.
pub struct FieldStore {
    grid: GridGeometry,
    fields: Vec<FieldTexture>,
    sampler: wgpu::Sampler,
}

impl FieldStore {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

    pub fn new(device: &wgpu::Device, grid: GridGeometry) -> Result<Self, crate::SetupError> {
        info!("allocating fields for {}x{} grid", grid.width, grid.height);

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let fields = SlotId::all()
            .map(|slot| {
                let texture = device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(slot.label()),
                    size: grid.extent(),
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: Self::FORMAT,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                });
                let view = texture.create_view(&Default::default());
                FieldTexture { texture, view }
            })
            .collect();
        if let Some(error) = futures::executor::block_on(device.pop_error_scope()) {
            return Err(crate::SetupError::FieldAllocation(error.to_string()));
        }

        // Linear filtering of 32bit float textures needs FLOAT32_FILTERABLE.
        let sampler = device.create_sampler(&simple_sampler(
            wgpu::AddressMode::ClampToEdge,
            wgpu::FilterMode::Linear,
            "Sampler: Fields",
        ));

        Ok(FieldStore { grid, fields, sampler })
    }

    pub fn grid(&self) -> GridGeometry {
        self.grid
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    /// View for sampling a field.
    pub fn read(&self, slot: SlotId) -> &wgpu::TextureView {
        &self.fields[slot.index()].view
    }

    /// View for rendering into a field.
    pub fn write_target(&self, slot: SlotId) -> &wgpu::TextureView {
        // wgpu doesn't distinguish, layout transitions happen implicitly between passes.
        &self.fields[slot.index()].view
    }
}
