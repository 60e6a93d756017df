//! The inner mixing loop, compiled once per combination of source format,
//! kernel, ramping and filtering.

use tm_ir::PcmFrame;

use super::MIX_SHIFT;
use crate::channel::ChannelState;
use crate::fixed::{SamplePosition, FRAC_BITS, FRAC_MASK};
use crate::ramp::RAMP_PRECISION;
use crate::resampler::Interpolate;

/// Where a source slice sits in the sample's virtual frame numbering:
/// `src[i]` is frame `base + i`.
#[derive(Clone, Copy)]
pub struct Source<'a, F> {
    pub frames: &'a [F],
    pub base: i64,
}

/// Mix `out.len() / 2` frames of `voice` from `src` into the interleaved
/// stereo accumulator.
///
/// The caller guarantees every visited position is addressable with the
/// kernel's neighbourhood and, when `RAMP` is set, that the ramp lasts at
/// least as long as the chunk.
#[inline(never)]
pub fn mix_chunk<F, I, const RAMP: bool, const FILTER: bool>(
    src: Source<'_, F>,
    interp: I,
    voice: &mut ChannelState,
    out: &mut [i32],
) where
    F: PcmFrame,
    I: Interpolate,
{
    let frames = out.len() / 2;
    let increment = voice.increment as i64;
    let mut pos = voice.position.raw() - (src.base << FRAC_BITS);
    let (mut ramp, step) = voice.mix.ramp.raw();
    let mut volume = voice.mix.ramp.volume();
    let coefs = voice.filter_coefs;
    let mut last = voice.mix.last;

    for frame in out.chunks_exact_mut(2) {
        let idx = (pos >> FRAC_BITS) as usize;
        let frac = (pos & FRAC_MASK) as u32;
        let (mut l, mut r) = interp.sample(src.frames, idx, frac);

        if FILTER {
            if let Some(coefs) = &coefs {
                l = coefs.process(&mut voice.mix.filter, 0, l);
                r = coefs.process(&mut voice.mix.filter, 1, r);
            }
        }
        if RAMP {
            ramp[0] += step[0];
            ramp[1] += step[1];
            volume = [ramp[0] >> RAMP_PRECISION, ramp[1] >> RAMP_PRECISION];
        }

        last = [(l * volume[0]) >> MIX_SHIFT, (r * volume[1]) >> MIX_SHIFT];
        frame[0] = frame[0].saturating_add(last[0]);
        frame[1] = frame[1].saturating_add(last[1]);
        pos += increment;
    }

    if RAMP {
        voice.mix.ramp.commit(ramp, frames as u32);
    }
    voice.mix.last = last;
    voice.position = SamplePosition::from_raw(pos + (src.base << FRAC_BITS));
}

/// Blend a stopped voice's decaying end offset into the mix.
pub fn mix_tail(tail: &mut [i32; 2], out: &mut [i32]) {
    for frame in out.chunks_exact_mut(2) {
        if *tail == [0, 0] {
            break;
        }
        for (acc, t) in frame.iter_mut().zip(tail.iter_mut()) {
            *acc = acc.saturating_add(*t);
            *t = decay(*t);
        }
    }
}

/// Decay per frame: 1/256 of the value, cut to zero once it is inaudible.
fn decay(t: i32) -> i32 {
    let next = t - (t >> 8);
    if next.abs() <= 1 << 8 {
        0
    } else {
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resampler::{Linear, Nearest};

    fn voice(volume: i32) -> ChannelState {
        let mut v = ChannelState::new();
        v.active = true;
        v.increment = 0x10000;
        v.mix.ramp.snap([volume, volume]);
        v
    }

    #[test]
    fn unity_nearest_reproduces_source() {
        let src: Vec<i16> = (0..64).map(|i| i * 300 - 9000).collect();
        let mut v = voice(1 << 12);
        let mut out = vec![0; 40 * 2];
        mix_chunk::<_, _, false, false>(Source { frames: &src, base: 0 }, Nearest, &mut v, &mut out);
        for (i, frame) in out.chunks(2).enumerate() {
            let want = (src[i] as i32) << (12 - MIX_SHIFT);
            assert_eq!(frame, [want, want]);
        }
        assert_eq!(v.position.frame(), 40);
    }

    #[test]
    fn base_offsets_positions() {
        let src = [0i16, 10, 20, 30, 40, 50];
        let mut v = voice(1 << 12);
        v.position = SamplePosition::from_frames(12);
        let mut out = vec![0; 2 * 2];
        mix_chunk::<_, _, false, false>(Source { frames: &src, base: 10 }, Nearest, &mut v, &mut out);
        assert_eq!(out[0], 20 << 8);
        assert_eq!(out[2], 30 << 8);
        assert_eq!(v.position.frame(), 14);
    }

    #[test]
    fn ramp_lands_on_target() {
        let src = [1000i16; 64];
        let mut v = voice(0);
        v.mix.ramp.set_target([4096, 2048], 16, 16);
        let mut out = vec![0; 16 * 2];
        mix_chunk::<_, _, true, false>(Source { frames: &src, base: 0 }, Linear, &mut v, &mut out);
        assert_eq!(v.mix.ramp.volume(), [4096, 2048]);
        assert!(!v.mix.ramp.is_ramping());
        assert_eq!(out[30], (1000 * 4096) >> MIX_SHIFT);
        assert!(out[0] > 0 && out[0] < out[30]);
    }

    #[test]
    fn accumulates_into_existing_mix() {
        let src = [100i16; 8];
        let mut v = voice(1 << 12);
        let mut out = vec![5; 4 * 2];
        mix_chunk::<_, _, false, false>(Source { frames: &src, base: 0 }, Nearest, &mut v, &mut out);
        assert!(out.iter().all(|&x| x == 5 + (100 << 8)));
    }

    #[test]
    fn accumulator_saturates_instead_of_wrapping() {
        let src = [i16::MAX; 8];
        let mut v = voice(1 << 12);
        let mut out = vec![i32::MAX - 100; 4 * 2];
        mix_chunk::<_, _, false, false>(Source { frames: &src, base: 0 }, Nearest, &mut v, &mut out);
        assert!(out.iter().all(|&x| x == i32::MAX));

        let mut tail = [-(1 << 20), -(1 << 20)];
        let mut out = vec![i32::MIN + 5; 2 * 2];
        mix_tail(&mut tail, &mut out);
        assert_eq!(out[0], i32::MIN);
    }

    #[test]
    fn tail_decays_to_silence() {
        let mut tail = [1 << 20, -(1 << 20)];
        let mut out = vec![0; 4096 * 2];
        mix_tail(&mut tail, &mut out);
        assert_eq!(tail, [0, 0]);
        assert_eq!(out[0], 1 << 20);
        assert!(out[2] < out[0]);
        assert_eq!(out[out.len() - 2], 0);
    }
}
