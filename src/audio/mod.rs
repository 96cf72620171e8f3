pub mod capture;
pub mod convert;
pub mod format;
pub mod playback;
pub mod sink;
pub mod wav_sink;

pub use capture::{AudioCapture, LiveCapture};
pub use format::{AudioFormat, Container};
pub use playback::Playback;
pub use sink::AudioSink;
pub use wav_sink::WavSink;
