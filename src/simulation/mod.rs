mod barriers;
#[cfg(test)]
mod cpu_reference;
mod field_store;
mod fields;
mod fluid;
mod force_injector;
mod frame_pacer;
mod frame_resources;
mod gpu_recorder;
mod kernels;
mod passes;
mod scheduler;

pub use fields::GridGeometry;
pub use fluid::Fluid;
pub use force_injector::PointerState;
pub use frame_pacer::{AcquiredImage, FrameError, FramePacer, PresentationBackend};
pub use passes::{PassDescriptor, PassKind, PushConstants};
