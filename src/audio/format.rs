// NOTE: Capture always runs at this one fixed format. Samples travel through the
// pipeline as interleaved f32 and are only quantized by the WAV sink.

/// Output container of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Wav,
}

/// Encoder quality, expressed as PCM bit depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioQuality {
    High,
}

impl AudioQuality {
    pub fn bits_per_sample(self) -> u16 {
        match self {
            AudioQuality::High => 24,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub container: Container,
    pub sample_rate: u32,
    pub channels: u16,
    pub quality: AudioQuality,
}

impl AudioFormat {
    /// Calculate number of interleaved samples for a given duration in seconds
    pub fn samples_for_duration(&self, seconds: f32) -> usize {
        (self.sample_rate as f32 * seconds) as usize * self.channels as usize
    }

    /// Convert a count of interleaved samples into elapsed seconds
    pub fn seconds_for_samples(&self, samples: u64) -> f64 {
        let frames = samples / self.channels.max(1) as u64;
        frames as f64 / self.sample_rate as f64
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            container: Container::Wav,
            sample_rate: 44100,
            channels: 2,
            quality: AudioQuality::High,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_cd_rate_stereo_high_quality() {
        let format = AudioFormat::default();
        assert_eq!(format.container, Container::Wav);
        assert_eq!(format.sample_rate, 44100);
        assert_eq!(format.channels, 2);
        assert_eq!(format.quality.bits_per_sample(), 24);
    }

    #[test]
    fn sample_counts_include_every_channel() {
        let format = AudioFormat::default();
        assert_eq!(format.samples_for_duration(0.1), 4410 * 2);
        assert_eq!(format.samples_for_duration(1.0), 88200);
    }

    #[test]
    fn seconds_for_samples_counts_frames() {
        let format = AudioFormat::default();
        assert_eq!(format.seconds_for_samples(88200), 1.0);
        assert_eq!(format.seconds_for_samples(0), 0.0);
    }
}
