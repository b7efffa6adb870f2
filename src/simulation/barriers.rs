use super::fields::SlotId;

// Logical image layout of a field texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    Undefined,
    RenderTarget,
    Sampled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    TopOfPipe,
    ColorAttachmentOutput,
    FragmentShader,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    None,
    ColorAttachmentWrite,
    ShaderRead,
}

/// Layout transition plus the execution/memory dependency that has to precede the next use of a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Barrier {
    pub slot: SlotId,
    pub src_stage: Stage,
    pub src_access: Access,
    pub dst_stage: Stage,
    pub dst_access: Access,
    pub old_layout: Layout,
    pub new_layout: Layout,
}

impl Barrier {
    // Last write has to land before the texture is sampled.
    pub fn is_write_to_read(&self) -> bool {
        self.src_access == Access::ColorAttachmentWrite && self.dst_access == Access::ShaderRead
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SlotTracking {
    layout: Layout,
    // The slot was written by an already recorded pass.
    written: bool,
}

/// Tracks the layout of every field texture across passes and emits the transitions needed between them.
///
/// State persists across frames: the first write of a frame has to wait for the reads of the previous one.
pub struct BarrierController {
    slots: [SlotTracking; SlotId::COUNT],
}

impl BarrierController {
    pub fn new() -> Self {
        BarrierController {
            slots: [SlotTracking {
                layout: Layout::Undefined,
                written: false,
            }; SlotId::COUNT],
        }
    }

    #[cfg(test)]
    pub fn layout(&self, slot: SlotId) -> Layout {
        self.slots[slot.index()].layout
    }

    /// Barriers required before a pass that samples `inputs` and renders to `target` (if it renders to a field).
    pub fn prepare_pass(&mut self, inputs: &[SlotId], target: Option<SlotId>) -> Vec<Barrier> {
        if let Some(target) = target {
            assert!(
                !inputs.contains(&target),
                "{:?} would be sampled and rendered to in the same pass",
                target
            );
        }

        let mut barriers = Vec::new();
        for (i, input) in inputs.iter().enumerate() {
            // Same texture bound twice only needs one transition.
            if inputs[..i].contains(input) {
                continue;
            }
            if let Some(barrier) = self.prepare_read(*input) {
                barriers.push(barrier);
            }
        }
        if let Some(target) = target {
            barriers.push(self.prepare_write(target));
        }
        barriers
    }

    fn prepare_read(&mut self, slot: SlotId) -> Option<Barrier> {
        let tracking = &mut self.slots[slot.index()];
        assert!(tracking.written, "{:?} is sampled before anything was written to it", slot);

        match tracking.layout {
            Layout::Sampled => None,
            Layout::RenderTarget => {
                tracking.layout = Layout::Sampled;
                Some(Barrier {
                    slot,
                    src_stage: Stage::ColorAttachmentOutput,
                    src_access: Access::ColorAttachmentWrite,
                    dst_stage: Stage::FragmentShader,
                    dst_access: Access::ShaderRead,
                    old_layout: Layout::RenderTarget,
                    new_layout: Layout::Sampled,
                })
            }
            Layout::Undefined => unreachable!("written slots always have a defined layout"),
        }
    }

    // Writes always get a barrier: either the layout changes or a previous write has to be ordered before this one.
    fn prepare_write(&mut self, slot: SlotId) -> Barrier {
        let tracking = &mut self.slots[slot.index()];
        let (src_stage, src_access) = match tracking.layout {
            Layout::Undefined => (Stage::TopOfPipe, Access::None),
            Layout::Sampled => (Stage::FragmentShader, Access::ShaderRead),
            Layout::RenderTarget => (Stage::ColorAttachmentOutput, Access::ColorAttachmentWrite),
        };
        let barrier = Barrier {
            slot,
            src_stage,
            src_access,
            dst_stage: Stage::ColorAttachmentOutput,
            dst_access: Access::ColorAttachmentWrite,
            old_layout: tracking.layout,
            new_layout: Layout::RenderTarget,
        };
        tracking.layout = Layout::RenderTarget;
        tracking.written = true;
        barrier
    }

    /// Barriers before a slot gets cleared. A clear counts as a write.
    pub fn prepare_clear(&mut self, slot: SlotId) -> Barrier {
        self.prepare_write(slot)
    }
}
