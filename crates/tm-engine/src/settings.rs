//! Mixer configuration.
//!
//! Out-of-range values are clamped by [`MixerSettings::sanitized`] and logged;
//! the engine never fails on configuration.

use log::warn;

use crate::error::EngineError;
use crate::voice_pool::MAX_VOICES;

pub const MIN_SAMPLE_RATE: u32 = 1000;
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Longest volume ramp in frames.
pub const MAX_RAMP_SAMPLES: u32 = 4096;

/// Full stereo separation.
pub const SEPARATION_NORMAL: u32 = 128;
pub const SEPARATION_MAX: u32 = 256;

/// How sample data is resampled to the output rate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InterpolationKind {
    Nearest,
    Linear,
    CubicSpline,
    /// 8-tap Kaiser windowed sinc, with anti-alias tables when downsampling
    #[default]
    Sinc,
    /// 8-tap FIR with a selectable window
    Fir,
}

/// Window applied to the configurable FIR kernel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FirWindow {
    Hann,
    Hamming,
    /// Exact Blackman
    #[default]
    Blackman,
    /// Blackman-Harris 3-term, -61 dB
    Blackman3T61,
    /// Blackman-Harris 4-term, -92 dB
    Blackman4T92,
    Kaiser,
}

/// Output sample encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SampleFormat {
    U8,
    #[default]
    S16,
    S24,
    S32,
    F32,
}

impl SampleFormat {
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S24 => 3,
            SampleFormat::S32 | SampleFormat::F32 => 4,
        }
    }

    pub const fn bits(self) -> u32 {
        self.bytes_per_sample() as u32 * 8
    }

    pub const fn is_float(self) -> bool {
        matches!(self, SampleFormat::F32)
    }

    /// Negotiate a format from a bit depth.
    pub fn from_bits(bits: u32, float: bool) -> Result<Self, EngineError> {
        match (bits, float) {
            (8, false) => Ok(SampleFormat::U8),
            (16, false) => Ok(SampleFormat::S16),
            (24, false) => Ok(SampleFormat::S24),
            (32, false) => Ok(SampleFormat::S32),
            (32, true) => Ok(SampleFormat::F32),
            _ => Err(EngineError::Configuration {
                setting: "sample format bits",
                value: bits,
            }),
        }
    }
}

/// Dither applied when reducing to the output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DitherMode {
    #[default]
    None,
    /// Rectangular noise of one output LSB
    Rectangular,
    /// Noise-shaped dither with first-order error feedback
    ModPlug,
}

/// Full mixer configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct MixerSettings {
    pub sample_rate: u32,
    /// 1 (mono) or 2 (stereo)
    pub channels: u16,
    pub sample_format: SampleFormat,
    /// Voices mixed per tick; the quietest beyond this are dropped
    pub max_mix_channels: usize,
    pub interpolation: InterpolationKind,
    pub fir_window: FirWindow,
    /// Frames a rising volume change is spread over
    pub ramp_up_samples: u32,
    /// Frames a falling volume change is spread over
    pub ramp_down_samples: u32,
    /// 0 = mono, 128 = normal, 256 = wide
    pub stereo_separation: u32,
    pub dither: DitherMode,
    pub agc: bool,
    /// Fade the last output value of a voice that reaches its sample end
    pub declick_sample_end: bool,
    /// 0 stops at song end, n restarts n more times, -1 loops forever
    pub repeat_count: i32,
    /// Seed for every random behaviour (random waveforms, swing, dither)
    pub seed: u64,
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            sample_format: SampleFormat::S16,
            max_mix_channels: 128,
            interpolation: InterpolationKind::Sinc,
            fir_window: FirWindow::Blackman,
            ramp_up_samples: 16,
            ramp_down_samples: 42,
            stereo_separation: SEPARATION_NORMAL,
            dither: DitherMode::None,
            agc: false,
            declick_sample_end: false,
            repeat_count: 0,
            seed: 0x5EED_0F_7AC4,
        }
    }
}

impl MixerSettings {
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_sample_format(mut self, format: SampleFormat) -> Self {
        self.sample_format = format;
        self
    }

    pub fn with_interpolation(mut self, kind: InterpolationKind) -> Self {
        self.interpolation = kind;
        self
    }

    pub fn with_ramping(mut self, up: u32, down: u32) -> Self {
        self.ramp_up_samples = up;
        self.ramp_down_samples = down;
        self
    }

    pub fn with_max_mix_channels(mut self, count: usize) -> Self {
        self.max_mix_channels = count;
        self
    }

    pub fn with_dither(mut self, dither: DitherMode) -> Self {
        self.dither = dither;
        self
    }

    pub fn with_repeat_count(mut self, count: i32) -> Self {
        self.repeat_count = count;
        self
    }

    pub fn with_declick(mut self, on: bool) -> Self {
        self.declick_sample_end = on;
        self
    }

    pub fn with_agc(mut self, on: bool) -> Self {
        self.agc = on;
        self
    }

    pub fn with_stereo_separation(mut self, separation: u32) -> Self {
        self.stereo_separation = separation;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Bytes per interleaved output frame.
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * self.sample_format.bytes_per_sample()
    }

    /// Clamp every field into its supported range, logging each change.
    pub fn sanitized(mut self) -> Self {
        let rate = self.sample_rate.clamp(MIN_SAMPLE_RATE, MAX_SAMPLE_RATE);
        if rate != self.sample_rate {
            warn!("sample rate {} out of range, using {}", self.sample_rate, rate);
            self.sample_rate = rate;
        }
        if !(1..=2).contains(&self.channels) {
            warn!("{} output channels unsupported, using stereo", self.channels);
            self.channels = 2;
        }
        let max = self.max_mix_channels.clamp(1, MAX_VOICES);
        if max != self.max_mix_channels {
            warn!("max mix channels {} out of range, using {}", self.max_mix_channels, max);
            self.max_mix_channels = max;
        }
        if self.ramp_up_samples > MAX_RAMP_SAMPLES || self.ramp_down_samples > MAX_RAMP_SAMPLES {
            warn!("volume ramp longer than {} frames, clamping", MAX_RAMP_SAMPLES);
            self.ramp_up_samples = self.ramp_up_samples.min(MAX_RAMP_SAMPLES);
            self.ramp_down_samples = self.ramp_down_samples.min(MAX_RAMP_SAMPLES);
        }
        if self.stereo_separation > SEPARATION_MAX {
            warn!("stereo separation {} out of range", self.stereo_separation);
            self.stereo_separation = SEPARATION_MAX;
        }
        if self.repeat_count < -1 {
            self.repeat_count = -1;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_clamps_out_of_range_values() {
        let s = MixerSettings {
            sample_rate: 10,
            channels: 6,
            max_mix_channels: 0,
            ramp_up_samples: 1 << 20,
            stereo_separation: 999,
            repeat_count: -7,
            ..MixerSettings::default()
        }
        .sanitized();
        assert_eq!(s.sample_rate, MIN_SAMPLE_RATE);
        assert_eq!(s.channels, 2);
        assert_eq!(s.max_mix_channels, 1);
        assert_eq!(s.ramp_up_samples, MAX_RAMP_SAMPLES);
        assert_eq!(s.stereo_separation, SEPARATION_MAX);
        assert_eq!(s.repeat_count, -1);
    }

    #[test]
    fn defaults_are_already_sane() {
        let s = MixerSettings::default();
        assert_eq!(s.clone().sanitized(), s);
        assert_eq!(s.frame_bytes(), 4);
    }

    #[test]
    fn format_negotiation() {
        assert_eq!(SampleFormat::from_bits(24, false), Ok(SampleFormat::S24));
        assert_eq!(SampleFormat::from_bits(32, true), Ok(SampleFormat::F32));
        assert!(SampleFormat::from_bits(12, false).is_err());
        assert_eq!(SampleFormat::S24.bits(), 24);
    }
}
