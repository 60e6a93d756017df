//! Mix-domain to output sample conversion.
//!
//! The mix is interleaved stereo `i32` with `MIX_BITS` bits of magnitude.
//! Integer formats clip; mono output averages the two sides.

use crate::mixer::MIX_BITS;
use crate::settings::SampleFormat;

const CLIP_MAX: i32 = (1 << MIX_BITS) - 1;
const CLIP_MIN: i32 = -(1 << MIX_BITS);

#[inline(always)]
fn clip(x: i32) -> i32 {
    x.clamp(CLIP_MIN, CLIP_MAX)
}

#[inline(always)]
fn frame_value(frame: &[i32], channels: u16, ch: usize) -> i32 {
    if channels == 1 {
        ((frame[0] as i64 + frame[1] as i64) >> 1) as i32
    } else {
        frame[ch]
    }
}

/// Frames of `mix` that fit into `out_len` output units of `unit` each.
fn frames_for(mix: &[i32], channels: u16, out_len: usize, unit: usize) -> usize {
    let per_frame = channels as usize * unit;
    if per_frame == 0 {
        return 0;
    }
    (mix.len() / 2).min(out_len / per_frame)
}

/// Write `mix` as little-endian `format` samples. Returns bytes written.
pub fn write_bytes(mix: &[i32], channels: u16, format: SampleFormat, out: &mut [u8]) -> usize {
    let width = format.bytes_per_sample();
    let frames = frames_for(mix, channels, out.len(), width);
    if format == SampleFormat::S16 && channels == 2 {
        write_s16_stereo(&mix[..frames * 2], &mut out[..frames * 4]);
        return frames * 4;
    }

    let mut bytes = out.chunks_exact_mut(width);
    for frame in mix.chunks_exact(2).take(frames) {
        for ch in 0..channels as usize {
            let x = clip(frame_value(frame, channels, ch));
            let Some(dst) = bytes.next() else {
                return frames * channels as usize * width;
            };
            match format {
                SampleFormat::U8 => dst[0] = ((x >> (MIX_BITS - 7)) + 128) as u8,
                SampleFormat::S16 => dst.copy_from_slice(&((x >> (MIX_BITS - 15)) as i16).to_le_bytes()),
                SampleFormat::S24 => dst.copy_from_slice(&x.to_le_bytes()[..3]),
                SampleFormat::S32 => dst.copy_from_slice(&(x << (31 - MIX_BITS)).to_le_bytes()),
                SampleFormat::F32 => dst.copy_from_slice(&to_f32(x).to_le_bytes()),
            }
        }
    }
    frames * channels as usize * width
}

/// Write `mix` as interleaved `f32` in -1.0..1.0. Returns frames written.
pub fn write_f32(mix: &[i32], channels: u16, out: &mut [f32]) -> usize {
    let frames = frames_for(mix, channels, out.len(), 1);
    let mut dst = out.iter_mut();
    for frame in mix.chunks_exact(2).take(frames) {
        for ch in 0..channels as usize {
            if let Some(d) = dst.next() {
                *d = to_f32(clip(frame_value(frame, channels, ch)));
            }
        }
    }
    frames
}

#[inline(always)]
fn to_f32(x: i32) -> f32 {
    x as f32 * (1.0 / (1u32 << MIX_BITS) as f32)
}

fn write_s16_stereo(mix: &[i32], out: &mut [u8]) {
    #[cfg(all(feature = "std", target_arch = "x86_64"))]
    {
        if std::arch::is_x86_feature_detected!("sse2") {
            // SAFETY: sse2 support was just detected
            unsafe { sse2::write_s16(mix, out) };
            return;
        }
    }
    write_s16_scalar(mix, out);
}

fn write_s16_scalar(mix: &[i32], out: &mut [u8]) {
    for (x, dst) in mix.iter().zip(out.chunks_exact_mut(2)) {
        let v = (clip(*x) >> (MIX_BITS - 15)) as i16;
        dst.copy_from_slice(&v.to_le_bytes());
    }
}

#[cfg(all(feature = "std", target_arch = "x86_64"))]
mod sse2 {
    use core::arch::x86_64::{
        __m128i, _mm_loadu_si128, _mm_packs_epi32, _mm_srai_epi32, _mm_storeu_si128,
    };

    use crate::mixer::MIX_BITS;

    /// Shift and saturate 8 values at a time. `packs` saturates exactly like
    /// the scalar clip followed by the shift.
    #[target_feature(enable = "sse2")]
    pub unsafe fn write_s16(mix: &[i32], out: &mut [u8]) {
        let blocks = mix.len() / 8;
        for b in 0..blocks {
            // SAFETY: b * 8 + 7 < mix.len()
            let packed = unsafe {
                let src = mix.as_ptr().add(b * 8);
                let lo = _mm_srai_epi32(_mm_loadu_si128(src as *const __m128i), (MIX_BITS - 15) as i32);
                let hi = _mm_srai_epi32(_mm_loadu_si128(src.add(4) as *const __m128i), (MIX_BITS - 15) as i32);
                _mm_packs_epi32(lo, hi)
            };
            let mut lanes = [0i16; 8];
            // SAFETY: lanes holds exactly 128 bits
            unsafe { _mm_storeu_si128(lanes.as_mut_ptr() as *mut __m128i, packed) };
            for (k, v) in lanes.iter().enumerate() {
                let at = (b * 8 + k) * 2;
                out[at..at + 2].copy_from_slice(&v.to_le_bytes());
            }
        }
        super::write_s16_scalar(&mix[blocks * 8..], &mut out[blocks * 16..]);
    }
}
