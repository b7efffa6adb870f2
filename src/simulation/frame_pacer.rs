#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    // Transient: surface and everything sized to it need to be recreated.
    #[error("presentation surface is out of date and needs to be recreated")]
    NeedsRecreation,
    #[error("timed out while waiting for the gpu or the presentation engine")]
    Timeout,
    #[error("out of memory while acquiring a presentable image")]
    OutOfMemory,
}

/// An image acquired from the presentation engine.
pub struct AcquiredImage<I> {
    // Chosen by the presentation engine, unrelated to the sync index.
    pub index: usize,
    pub image: I,
}

/// Fences, acquire and present of a presentation surface.
pub trait PresentationBackend {
    type Image;
    type Commands;

    /// Blocks until the last submission signalling the given fence has retired.
    fn wait_fence(&mut self, sync_index: usize) -> Result<(), FrameError>;
    fn reset_fence(&mut self, sync_index: usize);
    fn acquire(&mut self, sync_index: usize) -> Result<AcquiredImage<Self::Image>, FrameError>;
    /// Submits, signalling the fence of `sync_index` on completion.
    fn submit(&mut self, sync_index: usize, commands: Self::Commands);
    fn present(&mut self, image: Self::Image) -> Result<(), FrameError>;
}

/// Drives one frame at a time through a ring of `N` synchronization slots.
pub struct FramePacer {
    sync_index: usize,
    // Whether a submission signalling the slot's fence is outstanding.
    in_flight: Vec<bool>,
}

impl FramePacer {
    pub fn new(num_sync_slots: usize) -> Self {
        assert_gt!(num_sync_slots, 0);
        FramePacer {
            sync_index: 0,
            in_flight: vec![false; num_sync_slots],
        }
    }

    #[cfg(test)]
    pub fn sync_index(&self) -> usize {
        self.sync_index
    }

    /// Forgets all outstanding submissions. Only valid once the device is idle.
    pub fn reset(&mut self) {
        self.sync_index = 0;
        for in_flight in self.in_flight.iter_mut() {
            *in_flight = false;
        }
    }

    /// Runs a full frame. `record` gets the acquired image index and image and returns the commands to submit.
    ///
    /// Failing acquisition leaves the sync index where it is, the caller decides whether to recreate and retry.
    pub fn frame<B, F>(&mut self, backend: &mut B, record: F) -> Result<(), FrameError>
    where
        B: PresentationBackend,
        F: FnOnce(usize, &B::Image) -> B::Commands,
    {
        let sync_index = self.sync_index;
        if self.in_flight[sync_index] {
            backend.wait_fence(sync_index)?;
            backend.reset_fence(sync_index);
            self.in_flight[sync_index] = false;
        }

        let acquired = backend.acquire(sync_index)?;
        let commands = record(acquired.index, &acquired.image);
        backend.submit(sync_index, commands);
        self.in_flight[sync_index] = true;
        self.sync_index = (sync_index + 1) % self.in_flight.len();

        // The submission happened, a failing present only affects the next frame.
        backend.present(acquired.image)
    }
}
