//! Dither for integer output formats narrower than the mix.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg32;

use crate::mixer::MIX_BITS;
use crate::settings::DitherMode;

/// Keeps the dither noise independent of the effect RNG.
const DITHER_SEED_SALT: u64 = 0xD1_7E_C0DE;

pub struct Dither {
    mode: DitherMode,
    rng: Pcg32,
    /// ModPlug generator state
    state: (u32, u32),
    /// Quantization error carried to the next frame, per side
    error: [i32; 2],
}

impl Dither {
    pub fn new(mode: DitherMode, seed: u64) -> Self {
        let mut dither = Self {
            mode,
            rng: Pcg32::seed_from_u64(seed ^ DITHER_SEED_SALT),
            state: (0, 0),
            error: [0; 2],
        };
        dither.reset(seed);
        dither
    }

    /// Restart the noise sequence.
    pub fn reset(&mut self, seed: u64) {
        self.rng = Pcg32::seed_from_u64(seed ^ DITHER_SEED_SALT);
        self.state = (self.rng.next_u32(), self.rng.next_u32());
        self.error = [0; 2];
    }

    pub fn mode(&self) -> DitherMode {
        self.mode
    }

    /// Add noise of one output LSB before the mix is reduced to `bits`.
    pub fn apply(&mut self, mix: &mut [i32], bits: u32) {
        if bits > MIX_BITS || bits == 0 {
            return;
        }
        let shift = MIX_BITS + 1 - bits;
        match self.mode {
            DitherMode::None => {}
            DitherMode::Rectangular => {
                let half = 1i32 << (shift - 1);
                for x in mix.iter_mut() {
                    let noise = (self.rng.next_u32() >> (32 - shift)) as i32 - half;
                    *x = x.saturating_add(noise);
                }
            }
            DitherMode::ModPlug => {
                let lsb_mask = !((1i32 << shift) - 1);
                for frame in mix.chunks_exact_mut(2) {
                    for (x, error) in frame.iter_mut().zip(self.error.iter_mut()) {
                        let noise = modplug_noise(&mut self.state) >> (32 - shift);
                        let wanted = x.saturating_add(*error);
                        let quantized = wanted.saturating_add(noise) & lsb_mask;
                        *error = wanted - quantized;
                        *x = quantized;
                    }
                }
            }
        }
    }
}

/// The classic ModPlug noise generator; returns the full 32-bit signed value.
fn modplug_noise(state: &mut (u32, u32)) -> i32 {
    let (mut a, mut b) = *state;
    a = a.rotate_left(1) ^ 0x1020_4080;
    a = a.wrapping_add(0x7864_9E7D).wrapping_add(b.wrapping_mul(4));
    b = b.wrapping_add(a.rotate_left(16).wrapping_mul(5));
    *state = (a, b);
    b as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dithered(mode: DitherMode, seed: u64) -> Vec<i32> {
        let mut mix = vec![1000; 256];
        Dither::new(mode, seed).apply(&mut mix, 16);
        mix
    }

    #[test]
    fn none_leaves_mix_untouched() {
        assert!(dithered(DitherMode::None, 1).iter().all(|&x| x == 1000));
    }

    #[test]
    fn rectangular_noise_is_one_lsb_wide() {
        let out = dithered(DitherMode::Rectangular, 1);
        assert!(out.iter().all(|&x| (1000 - 128..1000 + 128).contains(&x)));
        assert!(out.iter().any(|&x| x != 1000));
    }

    #[test]
    fn modplug_quantizes_to_output_lsb() {
        let out = dithered(DitherMode::ModPlug, 1);
        assert!(out.iter().all(|&x| x % 256 == 0));
        // Error feedback keeps the average close to the input
        let mean = out.iter().map(|&x| x as i64).sum::<i64>() / out.len() as i64;
        assert!((mean - 1000).abs() < 256, "{}", mean);
    }

    #[test]
    fn same_seed_same_noise() {
        assert_eq!(dithered(DitherMode::Rectangular, 9), dithered(DitherMode::Rectangular, 9));
        assert_eq!(dithered(DitherMode::ModPlug, 9), dithered(DitherMode::ModPlug, 9));
        assert_ne!(dithered(DitherMode::ModPlug, 9), dithered(DitherMode::ModPlug, 10));
    }

    #[test]
    fn wide_formats_skip_dither() {
        let mut mix = vec![1000; 8];
        Dither::new(DitherMode::Rectangular, 1).apply(&mut mix, 24);
        assert!(mix.iter().all(|&x| x == 1000));
    }
}
