pub mod backend;
pub mod recorder;

pub use backend::{AudioBackend, CaptureSession, DeviceBackend, PlaybackSession};
pub use recorder::Recorder;
