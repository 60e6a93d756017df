//! How far a voice can play before it meets a loop or sample boundary.
//!
//! Positions are wrapped or reflected here, once per chunk, so the mixing
//! loops never test for boundaries.

use tm_ir::{LoopKind, LoopSlot, Sample, SampleLoop};

use super::MIX_BUFFER_SIZE;
use crate::channel::ChannelState;
use crate::fixed::{SamplePosition, FRAC_BITS, FRAC_ONE};
use crate::resampler::{POST, PRE};

/// Which buffer a chunk reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Region {
    /// The padded sample data.
    Main,
    /// The window around the loop end.
    LoopEnd,
    /// The window around the loop start (ping-pong loops only).
    LoopStart,
}

/// A run of output frames that can be mixed from one region without
/// crossing a boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub frames: usize,
    pub region: Region,
    pub slot: LoopSlot,
}

impl Chunk {
    /// The voice has played past the end of its sample.
    pub const END: Self = Self {
        frames: 0,
        region: Region::Main,
        slot: LoopSlot::Normal,
    };

    pub fn is_end(&self) -> bool {
        self.frames == 0
    }
}

/// The loop that applies to the voice right now, unless it was cleared.
pub fn active_loop(voice: &ChannelState, sample: &Sample) -> Option<(LoopSlot, SampleLoop)> {
    if voice.loop_cleared {
        return None;
    }
    let slot = voice.loop_slot(sample);
    Some((slot, sample.loop_for(slot)?))
}

/// A loop no longer than one step plus a frame would be crossed within a
/// single output frame.
fn loop_too_short(lp: SampleLoop, increment: i32) -> bool {
    (increment.unsigned_abs() >> FRAC_BITS) as u64 + 1 >= lp.len() as u64
}

/// Frames until `distance` (raw units) is covered at `step` per frame.
fn frames_until(distance: i64, step: i64) -> i64 {
    if step <= 0 {
        return i64::MAX;
    }
    (distance + step - 1) / step
}

/// Frames while a backwards-moving position stays at or above `limit`.
fn frames_down_to(pos: i64, limit: i64, step: i64) -> i64 {
    if step <= 0 {
        return i64::MAX;
    }
    (pos - limit) / step + 1
}

/// Move the position back into the loop: forward loops wrap, ping-pong loops
/// reflect and flip the increment.
fn wrap_into_loop(voice: &mut ChannelState, lp: SampleLoop) {
    let start = (lp.start as i64) << FRAC_BITS;
    let end = (lp.end as i64) << FRAC_BITS;
    let len = end - start;
    let mut pos = voice.position.raw();

    match lp.kind {
        LoopKind::Forward => {
            if voice.increment < 0 {
                voice.increment = -voice.increment;
            }
            if pos >= end {
                pos = start + (pos - end) % len;
            }
        }
        LoopKind::PingPong => {
            if voice.increment < 0 && pos < start {
                pos = 2 * start - pos;
                voice.increment = -voice.increment;
            }
            if pos >= end {
                let off = (pos - start).rem_euclid(2 * len);
                if off < len {
                    pos = start + off;
                    voice.increment = voice.increment.abs();
                } else {
                    pos = (start + 2 * len - FRAC_ONE - off).max(start);
                    voice.increment = -voice.increment.abs();
                }
            }
        }
    }
    voice.position = SamplePosition::from_raw(pos);
}

/// Frames the voice can advance before the next boundary, at most
/// `max_frames` and `MIX_BUFFER_SIZE`. Wraps forward loops, reflects
/// ping-pong loops and picks the region the chunk reads from, so every
/// position the chunk visits stays addressable by the widest kernel.
///
/// Returns [`Chunk::END`] once a voice without a loop runs off its sample.
pub fn sample_count(voice: &mut ChannelState, sample: &Sample, max_frames: usize) -> Chunk {
    let max = max_frames.min(MIX_BUFFER_SIZE) as i64;
    let len = sample.len() as i64;
    if max == 0 || len == 0 {
        return Chunk::END;
    }

    if let Some((_, lp)) = active_loop(voice, sample) {
        if loop_too_short(lp, voice.increment) {
            voice.loop_cleared = true;
        }
    }
    let Some((slot, lp)) = active_loop(voice, sample) else {
        let pos = voice.position.raw();
        let step = voice.increment as i64;
        let frames = if step >= 0 {
            let end = len << FRAC_BITS;
            if pos >= end {
                return Chunk::END;
            }
            frames_until(end - pos, step)
        } else {
            if pos < 0 {
                return Chunk::END;
            }
            frames_down_to(pos, 0, -step)
        };
        return Chunk {
            frames: frames.clamp(1, max) as usize,
            region: Region::Main,
            slot: voice.loop_slot(sample),
        };
    };

    wrap_into_loop(voice, lp);
    let pos = voice.position.raw();
    let frame = voice.position.frame();
    let step = voice.increment as i64;
    let (start, end) = (lp.start as i64, lp.end as i64);
    let has_start_window = lp.kind == LoopKind::PingPong;
    let end_zone = end - POST as i64;
    let start_zone = start + PRE as i64;

    let (region, frames) = if step >= 0 {
        if frame >= end_zone {
            (Region::LoopEnd, frames_until((end << FRAC_BITS) - pos, step))
        } else if has_start_window && frame >= start && frame < start_zone {
            let limit = start_zone.min(end_zone) << FRAC_BITS;
            (Region::LoopStart, frames_until(limit - pos, step))
        } else {
            (Region::Main, frames_until((end_zone << FRAC_BITS) - pos, step))
        }
    } else if frame < start_zone {
        (Region::LoopStart, frames_down_to(pos, start << FRAC_BITS, -step))
    } else if frame >= end_zone {
        (Region::LoopEnd, frames_down_to(pos, end_zone << FRAC_BITS, -step))
    } else {
        (Region::Main, frames_down_to(pos, start_zone << FRAC_BITS, -step))
    };

    Chunk {
        frames: frames.clamp(1, max) as usize,
        region,
        slot,
    }
}
