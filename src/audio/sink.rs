use anyhow::Result;
use async_trait::async_trait;

/// Trait for streaming audio encoding
///
/// Implementations write samples as they arrive rather than buffering the
/// whole recording in memory.
#[async_trait]
pub trait AudioSink: Send {
    /// Write interleaved samples (called repeatedly during recording)
    /// The Vec is moved to avoid copying
    fn write_chunk(&mut self, samples: Vec<f32>) -> Result<()>;

    /// Finalize and close the sink
    async fn finalize(&mut self) -> Result<()>;
}
