//! Pick the mixing routine for a chunk.
//!
//! Sample format, region, kernel, ramp and filter are matched here once per
//! chunk; each arm calls a separately monomorphized [`mix_chunk`].

use tm_ir::{LoopSlot, PcmBuffer, PcmFrame, Sample, SampleData, LOOKAHEAD};

use super::kernel::{mix_chunk, Source};
use super::sample_count::{Chunk, Region};
use crate::channel::ChannelState;
use crate::resampler::{Interpolate, Linear, Nearest, Polyphase, Resampler, Spline};
use crate::settings::InterpolationKind;

/// Mix one chunk of `voice` into `out` (interleaved stereo, `chunk.frames`
/// frames long).
pub fn mix_voice_chunk(
    voice: &mut ChannelState,
    sample: &Sample,
    chunk: Chunk,
    resampler: &Resampler,
    out: &mut [i32],
) {
    match sample.data() {
        SampleData::Mono8(buf) => with_source(buf, sample, chunk, resampler, voice, out),
        SampleData::Mono16(buf) => with_source(buf, sample, chunk, resampler, voice, out),
        SampleData::Stereo8(buf) => with_source(buf, sample, chunk, resampler, voice, out),
        SampleData::Stereo16(buf) => with_source(buf, sample, chunk, resampler, voice, out),
    }
}

fn with_source<F: PcmFrame>(
    buf: &PcmBuffer<F>,
    sample: &Sample,
    chunk: Chunk,
    resampler: &Resampler,
    voice: &mut ChannelState,
    out: &mut [i32],
) {
    let main = Source {
        frames: buf.padded(),
        base: -(LOOKAHEAD as i64),
    };
    let window = match chunk.region {
        Region::Main => Some(main),
        Region::LoopEnd => window_source(buf, sample, chunk.slot, false),
        Region::LoopStart => window_source(buf, sample, chunk.slot, true),
    };
    match window {
        Some(src) => with_kernel(src, resampler, voice, out),
        // Missing window: the main buffer is only safe for the current frame
        None => with_flags(main, Nearest, voice, out),
    }
}

fn window_source<'a, F: PcmFrame>(
    buf: &'a PcmBuffer<F>,
    sample: &Sample,
    slot: LoopSlot,
    start: bool,
) -> Option<Source<'a, F>> {
    let lp = sample.loop_for(slot)?;
    let windows = buf.windows(slot)?;
    let (frames, edge) = if start {
        (windows.start.as_ref()?, lp.start)
    } else {
        (&windows.end, lp.end)
    };
    Some(Source {
        frames: &frames[..],
        base: edge as i64 - LOOKAHEAD as i64,
    })
}

fn with_kernel<F: PcmFrame>(
    src: Source<'_, F>,
    resampler: &Resampler,
    voice: &mut ChannelState,
    out: &mut [i32],
) {
    match resampler.kind() {
        InterpolationKind::Nearest => with_flags(src, Nearest, voice, out),
        InterpolationKind::Linear => with_flags(src, Linear, voice, out),
        InterpolationKind::CubicSpline => with_flags(src, Spline(resampler.spline()), voice, out),
        InterpolationKind::Sinc | InterpolationKind::Fir => {
            let table = resampler.polyphase_for(voice.increment);
            with_flags(src, Polyphase(table), voice, out)
        }
    }
}

fn with_flags<F: PcmFrame, I: Interpolate>(
    src: Source<'_, F>,
    interp: I,
    voice: &mut ChannelState,
    out: &mut [i32],
) {
    let ramp = voice.mix.ramp.is_ramping();
    let filter = voice.filter_coefs.is_some();
    match (ramp, filter) {
        (false, false) => mix_chunk::<F, I, false, false>(src, interp, voice, out),
        (false, true) => mix_chunk::<F, I, false, true>(src, interp, voice, out),
        (true, false) => mix_chunk::<F, I, true, false>(src, interp, voice, out),
        (true, true) => mix_chunk::<F, I, true, true>(src, interp, voice, out),
    }
}
