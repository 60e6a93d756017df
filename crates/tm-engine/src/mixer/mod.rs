//! Sample mixing core.
//!
//! Once per tick [`Mixer::begin_tick`] ranks the voices against the channel
//! budget and points every volume ramp at its new target. [`Mixer::mix`] then
//! renders up to [`MIX_BUFFER_SIZE`] frames into a fixed `i32` stereo
//! accumulator, chunk by chunk, as [`sample_count`] allows.
//!
//! Mix domain: a full-scale 16-bit source at unity volume accumulates to
//! about `1 << 23`.

mod dispatch;
mod kernel;
mod sample_count;

pub use kernel::{mix_chunk, mix_tail, Source};
pub use sample_count::{active_loop, sample_count, Chunk, Region};

use tm_ir::Song;

use crate::channel::{ChannelState, PAN_CENTER, PAN_MAX};
use crate::resampler::Resampler;
use crate::settings::{MixerSettings, SEPARATION_NORMAL};
use crate::voice_pool::VoicePool;
use dispatch::mix_voice_chunk;

/// Largest number of frames mixed in one pass.
pub const MIX_BUFFER_SIZE: usize = 512;

/// Bits dropped from `sample * volume` (16-bit sample, 12-bit volume).
pub const MIX_SHIFT: u32 = 4;

/// Bits of a full-scale value in the mix domain, sign excluded.
pub const MIX_BITS: u32 = 23;

/// Left and right volume for a voice, 0..=4096 each. Centre pan plays both
/// sides at full volume; a surround voice has its right side inverted.
pub fn stereo_volume(volume: i32, pan: i32, separation: u32, surround: bool) -> [i32; 2] {
    let offset = (pan - PAN_CENTER) * separation as i32 / SEPARATION_NORMAL as i32;
    let pan = (PAN_CENTER + offset).clamp(0, PAN_MAX);
    let left = volume * (PAN_MAX - pan).min(PAN_CENTER) / PAN_CENTER;
    let right = volume * pan.min(PAN_CENTER) / PAN_CENTER;
    if surround {
        [left, -right]
    } else {
        [left, right]
    }
}

pub struct Mixer {
    buffer: [i32; MIX_BUFFER_SIZE * 2],
    resampler: Resampler,
    ramp_up: u32,
    ramp_down: u32,
    separation: u32,
    max_voices: usize,
    declick: bool,
}

impl Mixer {
    pub fn new(settings: &MixerSettings) -> Self {
        Self {
            buffer: [0; MIX_BUFFER_SIZE * 2],
            resampler: Resampler::new(settings),
            ramp_up: settings.ramp_up_samples,
            ramp_down: settings.ramp_down_samples,
            separation: settings.stereo_separation,
            max_voices: settings.max_mix_channels,
            declick: settings.declick_sample_end,
        }
    }

    /// Choose this tick's voices and start their volume ramps.
    pub fn begin_tick(&mut self, voices: &mut VoicePool) {
        voices.rank(self.max_voices);
        for i in 0..voices.mix_list().len() {
            let id = voices.mix_list()[i] as usize;
            let voice = &mut voices.voices_mut()[id];
            let target = if voice.fast_cut {
                [0, 0]
            } else {
                stereo_volume(voice.real_volume, voice.real_pan, self.separation, voice.surround)
            };
            voice.mix.ramp.set_target(target, self.ramp_up, self.ramp_down);
        }
        // Voices over budget fade out, so they come back from silence
        for id in 0..voices.voices().len() {
            if voices.voices()[id].active && !voices.is_mixed(id) {
                voices.voices_mut()[id].mix.ramp.set_target([0, 0], self.ramp_up, self.ramp_down);
            }
        }
    }

    /// Render `frames` frames (at most `MIX_BUFFER_SIZE`) of every ranked
    /// voice and every decaying tail. Returns the interleaved stereo mix.
    pub fn mix(&mut self, song: &Song, voices: &mut VoicePool, frames: usize) -> &mut [i32] {
        let frames = frames.min(MIX_BUFFER_SIZE);
        let out = &mut self.buffer[..frames * 2];
        out.fill(0);

        for i in 0..voices.mix_list().len() {
            let id = voices.mix_list()[i] as usize;
            let voice = &mut voices.voices_mut()[id];
            mix_voice(voice, song, &self.resampler, self.declick, out);
        }
        for id in 0..voices.voices().len() {
            if voices.voices()[id].active && !voices.is_mixed(id) {
                voices.voices_mut()[id].mix.ramp.skip(frames as u32);
            }
        }
        for voice in voices.voices_mut() {
            if voice.mix.tail != [0, 0] {
                mix_tail(&mut voice.mix.tail, out);
            }
        }
        out
    }

}

/// Mix one voice into `out`, following it across loop boundaries and
/// retiring it at its sample end or when a fast cut has faded out.
fn mix_voice(
    voice: &mut ChannelState,
    song: &Song,
    resampler: &Resampler,
    declick: bool,
    out: &mut [i32],
) {
    let frames = out.len() / 2;
    let mut done = 0;
    while done < frames && voice.active {
        if voice.fast_cut && !voice.mix.ramp.is_ramping() && voice.mix.ramp.volume() == [0, 0] {
            voice.stop();
            break;
        }
        let Some(sample) = voice.sample.and_then(|s| song.samples.get(s)) else {
            voice.stop();
            break;
        };

        let chunk = sample_count(voice, sample, frames - done);
        if chunk.is_end() {
            if declick {
                voice.mix.tail[0] = voice.mix.tail[0].saturating_add(voice.mix.last[0]);
                voice.mix.tail[1] = voice.mix.tail[1].saturating_add(voice.mix.last[1]);
            }
            voice.mix.last = [0, 0];
            voice.stop();
            break;
        }

        let mut n = chunk.frames;
        if voice.mix.ramp.is_ramping() {
            n = n.min(voice.mix.ramp.remaining() as usize);
        }
        let chunk = Chunk { frames: n, ..chunk };
        mix_voice_chunk(voice, sample, chunk, resampler, &mut out[done * 2..(done + n) * 2]);
        done += n;
    }
    if voice.active && voice.fast_cut && voice.mix.ramp.volume() == [0, 0] && !voice.mix.ramp.is_ramping() {
        voice.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_ir::{LoopKind, SampleData, SampleLoop};

    use crate::filter::FilterCoefs;
    use crate::fixed::SamplePosition;
    use crate::settings::InterpolationKind;
    use tm_ir::FilterMode;

    fn song_with(data: SampleData) -> Song {
        let mut song = Song::with_channels("mix", 1);
        song.samples.push(tm_ir::Sample::with_data("s", data));
        song
    }

    fn playing(pool: &mut VoicePool, volume: i32) {
        let v = &mut pool.voices_mut()[0];
        v.active = true;
        v.sample = Some(0);
        v.increment = 0x10000;
        v.real_volume = volume;
        v.mix.ramp.snap(stereo_volume(volume, PAN_CENTER, SEPARATION_NORMAL, false));
    }

    fn playing_at(pool: &mut VoicePool, id: usize, volume: i32) {
        let v = &mut pool.voices_mut()[id];
        v.active = true;
        v.sample = Some(0);
        v.increment = 0x10000;
        v.real_volume = volume;
        v.mix.ramp.snap(stereo_volume(volume, PAN_CENTER, SEPARATION_NORMAL, false));
    }

    fn nearest() -> MixerSettings {
        MixerSettings::default().with_interpolation(InterpolationKind::Nearest)
    }

    #[test]
    fn centre_pan_is_full_on_both_sides() {
        assert_eq!(stereo_volume(4096, PAN_CENTER, SEPARATION_NORMAL, false), [4096, 4096]);
        assert_eq!(stereo_volume(4096, 0, SEPARATION_NORMAL, false), [4096, 0]);
        assert_eq!(stereo_volume(4096, PAN_MAX, SEPARATION_NORMAL, false), [0, 4096]);
        assert_eq!(stereo_volume(4096, 0, 0, false), [4096, 4096]);
        assert_eq!(stereo_volume(4096, PAN_CENTER, SEPARATION_NORMAL, true), [4096, -4096]);
    }

    #[test]
    fn one_to_one_nearest_reproduces_pcm() {
        let pcm: Vec<i16> = (0..300).map(|i| ((i * 97) % 2000 - 1000) as i16).collect();
        let song = song_with(SampleData::mono16(&pcm));
        let mut pool = VoicePool::new(&song);
        playing(&mut pool, 4096);
        let mut mixer = Mixer::new(&nearest());
        mixer.begin_tick(&mut pool);
        let out = mixer.mix(&song, &mut pool, 200).to_vec();
        for (i, frame) in out.chunks(2).enumerate() {
            assert_eq!(frame[0], (pcm[i] as i32) << (12 - MIX_SHIFT));
        }
    }

    #[test]
    fn voice_stops_at_sample_end() {
        let song = song_with(SampleData::mono8(&[64; 100]));
        let mut pool = VoicePool::new(&song);
        playing(&mut pool, 4096);
        let mut mixer = Mixer::new(&nearest());
        mixer.begin_tick(&mut pool);
        let out = mixer.mix(&song, &mut pool, 300).to_vec();
        let audible = out.chunks(2).filter(|f| f[0] != 0).count();
        assert_eq!(audible, 100);
        assert!(!pool.voices()[0].active);
    }

    #[test]
    fn declick_leaves_a_decaying_tail() {
        let song = song_with(SampleData::mono8(&[64; 100]));
        let mut pool = VoicePool::new(&song);
        playing(&mut pool, 4096);
        let mut mixer = Mixer::new(&nearest().with_declick(true));
        mixer.begin_tick(&mut pool);
        let out = mixer.mix(&song, &mut pool, 300).to_vec();
        assert_eq!(out[200], out[198]);
        assert!(out[202] > 0 && out[202] < out[200]);
    }

    #[test]
    fn looped_sample_keeps_playing_across_chunks() {
        let pcm: Vec<i16> = (0..64).map(|i| i as i16 * 100).collect();
        let mut song = song_with(SampleData::mono16(&pcm));
        song.samples[0].set_loop(Some(SampleLoop::new(16, 64, LoopKind::Forward)));
        let mut pool = VoicePool::new(&song);
        playing(&mut pool, 4096);
        let mut mixer = Mixer::new(&nearest());
        mixer.begin_tick(&mut pool);
        let out = mixer.mix(&song, &mut pool, 200).to_vec();
        assert!(pool.voices()[0].active);
        // Frame 64 wraps to 16
        assert_eq!(out[64 * 2], 1600 << 8);
        assert_eq!(out[63 * 2], 6300 << 8);
    }

    #[test]
    fn ping_pong_loop_plays_mirror_image() {
        let pcm: Vec<i16> = (0..32).map(|i| i as i16 * 100).collect();
        let mut song = song_with(SampleData::mono16(&pcm));
        song.samples[0].set_loop(Some(SampleLoop::new(8, 32, LoopKind::PingPong)));
        let mut pool = VoicePool::new(&song);
        playing(&mut pool, 4096);
        let mut mixer = Mixer::new(&nearest());
        mixer.begin_tick(&mut pool);
        let out = mixer.mix(&song, &mut pool, 40).to_vec();
        let left: Vec<i32> = out.chunks(2).map(|f| f[0] >> 8).collect();
        assert_eq!(&left[30..35], &[3000, 3100, 3100, 3000, 2900]);
    }

    #[test]
    fn fast_cut_ramps_out_then_stops() {
        let song = song_with(SampleData::mono16(&[1000; 10_000]));
        let mut pool = VoicePool::new(&song);
        playing(&mut pool, 4096);
        pool.voices_mut()[0].fast_cut = true;
        let mut mixer = Mixer::new(&nearest());
        mixer.begin_tick(&mut pool);
        let out = mixer.mix(&song, &mut pool, 100).to_vec();
        assert!(out[0] > 0);
        assert_eq!(out[60 * 2], 0);
        assert!(!pool.voices()[0].active);
    }

    #[test]
    fn full_budget_of_resonant_voices_stays_in_range() {
        let square: Vec<i16> = (0..4096).map(|i| if (i / 64) % 2 == 0 { 32767 } else { -32767 }).collect();
        let song = song_with(SampleData::mono16(&square));
        let mut pool = VoicePool::new(&song);
        let settings = nearest();
        for id in 0..settings.max_mix_channels {
            let v = &mut pool.voices_mut()[id];
            v.active = true;
            v.sample = Some(0);
            v.increment = 0x10000;
            v.real_volume = 4096;
            v.filter_coefs = FilterCoefs::compute(60, 127, 0, FilterMode::LowPass, 44100);
            v.mix.ramp.snap(stereo_volume(4096, PAN_CENTER, SEPARATION_NORMAL, false));
        }
        let mut mixer = Mixer::new(&settings);
        mixer.begin_tick(&mut pool);
        assert_eq!(pool.mix_list().len(), settings.max_mix_channels);
        let out = mixer.mix(&song, &mut pool, MIX_BUFFER_SIZE).to_vec();
        assert!(out.iter().any(|&x| x > 3 << 28));
        assert!(out.iter().any(|&x| x < -(3 << 28)));
    }

    #[test]
    fn budget_mixes_only_the_loudest() {
        let mut song = song_with(SampleData::mono16(&[1000; 1000]));
        song.channels.push(tm_ir::ChannelSettings::default());
        let mut pool = VoicePool::new(&song);
        for (id, volume) in [(0, 1000), (1, 4000)] {
            let v = &mut pool.voices_mut()[id];
            v.active = true;
            v.sample = Some(0);
            v.increment = 0x10000;
            v.real_volume = volume;
        }
        let mut mixer = Mixer::new(&nearest().with_max_mix_channels(1).with_ramping(0, 0));
        mixer.begin_tick(&mut pool);
        assert_eq!(pool.mix_list(), &[1]);
        mixer.mix(&song, &mut pool, 10);
        assert_eq!(pool.voices()[0].position, SamplePosition::ZERO);
        assert_eq!(pool.voices()[1].position.frame(), 10);
    }

    #[test]
    fn voice_over_budget_ramps_down_while_skipped() {
        let mut song = song_with(SampleData::mono16(&[1000; 1000]));
        song.channels.push(tm_ir::ChannelSettings::default());
        let mut pool = VoicePool::new(&song);
        for (id, volume) in [(0, 1000), (1, 4000)] {
            playing_at(&mut pool, id, volume);
        }
        let mut mixer = Mixer::new(&nearest().with_max_mix_channels(1).with_ramping(16, 16));
        mixer.begin_tick(&mut pool);
        assert_eq!(pool.mix_list(), &[1]);
        assert!(pool.voices()[0].mix.ramp.is_ramping());

        mixer.mix(&song, &mut pool, 8);
        let halfway = pool.voices()[0].mix.ramp.volume();
        assert!(halfway[0] > 0 && halfway[0] < 1000, "{:?}", halfway);
        mixer.mix(&song, &mut pool, 8);
        assert_eq!(pool.voices()[0].mix.ramp.volume(), [0, 0]);
        assert!(pool.voices()[0].active);
        assert_eq!(pool.voices()[0].position, SamplePosition::ZERO);
    }
}
