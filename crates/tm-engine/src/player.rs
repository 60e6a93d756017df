//! Player: owns a song and renders it tick by tick.
//!
//! Every output call pulls from the current tick's frame budget; when the
//! budget runs out [`Player::read_note`] sequences the next tick, runs the
//! effects and restarts the volume ramps.

use alloc::boxed::Box;

use log::{debug, warn};
use rand::SeedableRng;
use rand_pcg::Pcg32;
use tm_ir::{check_integrity, OrderEntry, Song};

use crate::effects::EffectProcessor;
use crate::error::EngineError;
use crate::mixer::{Mixer, MIX_BUFFER_SIZE};
use crate::post::{convert, MixHook, PostProcessor};
use crate::sequencer::{Advance, PlayState};
use crate::settings::MixerSettings;
use crate::voice_pool::VoicePool;

pub struct Player {
    song: Song,
    settings: MixerSettings,
    play: PlayState,
    voices: VoicePool,
    rng: Pcg32,
    mixer: Mixer,
    post: PostProcessor,
}

impl Player {
    /// Build a player for `song`. Settings are sanitized; integrity problems
    /// in the song are logged and playback degrades around them.
    pub fn new(song: Song, settings: MixerSettings) -> Self {
        let settings = settings.sanitized();
        for issue in check_integrity(&song) {
            warn!("{}", issue);
        }
        let mut post = PostProcessor::new(&settings);
        post.reset(song.initial_global_volume as u32);
        Self {
            play: PlayState::new(&song, &settings),
            voices: VoicePool::new(&song),
            rng: Pcg32::seed_from_u64(settings.seed),
            mixer: Mixer::new(&settings),
            post,
            settings,
            song,
        }
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    /// Edit the song in place. The played-row bookkeeping is rebuilt
    /// afterwards so order list changes are picked up.
    pub fn edit_song<R>(&mut self, edit: impl FnOnce(&mut Song) -> R) -> R {
        let result = edit(&mut self.song);
        self.play.rebuild_visited(&self.song);
        result
    }

    pub fn settings(&self) -> &MixerSettings {
        &self.settings
    }

    pub fn play_state(&self) -> &PlayState {
        &self.play
    }

    pub fn voices(&self) -> &VoicePool {
        &self.voices
    }

    pub fn is_ended(&self) -> bool {
        self.play.ended
    }

    /// Install a DSP stage on the dry mix.
    pub fn add_hook(&mut self, hook: Box<dyn MixHook>) {
        self.post.add_hook(hook);
    }

    /// Rewind to the song start with every channel, the effect RNG and the
    /// post-processing state back to their initial values.
    pub fn restart(&mut self) {
        debug!("restart");
        self.play.reset(&self.song, &self.settings);
        self.voices.reset(&self.song);
        self.rng = Pcg32::seed_from_u64(self.settings.seed);
        self.post.reset(self.song.initial_global_volume as u32);
    }

    /// Continue playback from `order`/`row`. Voices keep sounding.
    pub fn set_position(&mut self, order: usize, row: u16) -> Result<(), EngineError> {
        match self.song.order.get(order) {
            Some(OrderEntry::Pattern(_)) | Some(OrderEntry::Skip) => {}
            _ => return Err(EngineError::DataIntegrity { what: "order", index: order }),
        }
        if let Some(pattern) = self.song.pattern_at_order(order) {
            if row >= pattern.rows {
                return Err(EngineError::DataIntegrity { what: "row", index: row as usize });
            }
        }
        debug!("seek to order {} row {}", order, row);
        self.play.jump_to(order, row);
        Ok(())
    }

    /// Fade the output to silence over `ms` milliseconds, then end playback.
    pub fn fade_out(&mut self, ms: u32) {
        let frames = (ms as u64 * self.settings.sample_rate as u64 / 1000) as u32;
        self.post.start_fade(frames);
    }

    /// Advance one tick. Returns false once the song has ended.
    pub fn read_note(&mut self) -> bool {
        let advance = self.play.advance(&self.song);
        if advance == Advance::Ended {
            return false;
        }
        let mut fx = EffectProcessor {
            song: &self.song,
            play: &mut self.play,
            voices: &mut self.voices,
            rng: &mut self.rng,
            settings: &self.settings,
        };
        fx.process_tick(advance);
        fx.update_voices();

        self.play.start_tick(&self.song);
        self.mixer.begin_tick(&mut self.voices);
        self.post.set_global_volume(self.play.global_volume);
        true
    }

    /// Render into `out` in the configured sample format. Returns bytes
    /// written, always whole frames.
    ///
    /// 0 means the song has ended, or that `out` is shorter than one frame;
    /// in the second case nothing is rendered and [`Player::is_ended`]
    /// stays false.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let frame_bytes = self.settings.frame_bytes();
        let channels = self.settings.channels;
        let format = self.settings.sample_format;
        let frames = out.len() / frame_bytes.max(1);
        let mut written = 0;
        self.render(frames, |mix, _| {
            written += convert::write_bytes(mix, channels, format, &mut out[written..]);
        });
        written
    }

    /// Render `frames` frames of interleaved `f32` into `samples`. Returns
    /// frames rendered; fewer than asked means the song has ended.
    pub fn fill_buffer(&mut self, samples: &mut [f32], frames: usize) -> usize {
        let channels = self.settings.channels as usize;
        let frames = frames.min(samples.len() / channels.max(1));
        self.render(frames, |mix, at| {
            convert::write_f32(mix, channels as u16, &mut samples[at * channels..]);
        })
    }

    /// Mix up to `frames` frames, handing each post-processed chunk and its
    /// frame offset to `emit`.
    fn render(&mut self, frames: usize, emit: impl FnMut(&[i32], usize)) -> usize {
        #[cfg(feature = "alloc_check")]
        let done = assert_no_alloc::assert_no_alloc(|| self.render_chunks(frames, emit));
        #[cfg(not(feature = "alloc_check"))]
        let done = self.render_chunks(frames, emit);
        done
    }

    fn render_chunks(&mut self, frames: usize, mut emit: impl FnMut(&[i32], usize)) -> usize {
        let mut done = 0;
        while done < frames {
            if self.play.ended {
                break;
            }
            if self.play.frames_left_in_tick == 0 && !self.read_note() {
                break;
            }
            let mut n = (self.play.frames_left_in_tick as usize)
                .min(frames - done)
                .min(MIX_BUFFER_SIZE);
            if let Some(left) = self.post.fade_left() {
                n = n.min(left as usize);
            }
            if n == 0 {
                break;
            }
            let mix = self.mixer.mix(&self.song, &mut self.voices, n);
            self.post.process(mix, self.settings.sample_format);
            emit(mix, done);
            self.play.frames_left_in_tick -= n as u32;
            done += n;

            if self.post.fade_finished() {
                debug!("fade out complete");
                self.play.ended = true;
            }
        }
        done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_ir::{Effect, Note, Sample, SampleData};

    use crate::settings::{InterpolationKind, SampleFormat};

    fn song(rows: u16) -> Song {
        let mut song = Song::with_channels("player", 1);
        let mut s = Sample::with_data("s", SampleData::mono16(&vec![8000; 20_000]));
        s.c5_speed = 44100;
        song.samples.push(s);
        if let Some(cell) = song.push_pattern(rows).cell_mut(0, 0) {
            cell.note = Note::On(60);
            cell.instrument = 1;
        }
        song
    }

    fn player(song: Song) -> Player {
        Player::new(song, MixerSettings::default().with_interpolation(InterpolationKind::Linear))
    }

    fn render_all(p: &mut Player) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 1000];
        loop {
            let n = p.read(&mut buf);
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        out
    }

    #[test]
    fn renders_whole_ticks_then_ends() {
        let mut p = player(song(2));
        let bytes = render_all(&mut p);
        // 12 ticks of 882 frames, 4 bytes each
        assert_eq!(bytes.len(), 12 * 882 * 4);
        assert!(p.is_ended());
        assert!(!p.read_note());
    }

    #[test]
    fn fill_buffer_writes_float_frames() {
        let mut p = player(song(1));
        let mut buf = vec![0f32; 300 * 2];
        assert_eq!(p.fill_buffer(&mut buf, 300), 300);
        assert!(buf[200..].iter().all(|&x| x > 0.2 && x < 0.3));
    }

    #[test]
    fn restart_renders_identical_output() {
        let mut p = player(song(4));
        let first = render_all(&mut p);
        p.restart();
        let second = render_all(&mut p);
        assert_eq!(first, second);
    }

    #[test]
    fn seek_rejects_missing_orders() {
        let mut p = player(song(4));
        assert_eq!(
            p.set_position(3, 0),
            Err(EngineError::DataIntegrity { what: "order", index: 3 })
        );
        assert!(p.set_position(0, 9).is_err());
        assert!(p.set_position(0, 2).is_ok());
        assert!(p.read_note());
        assert_eq!(p.play_state().row, 2);
    }

    #[test]
    fn fade_out_ends_playback() {
        let mut s = song(64);
        if let Some(cell) = s.patterns[0].cell_mut(63, 0) {
            cell.effect = Effect::PositionJump(0);
        }
        let mut p = Player::new(s, MixerSettings::default().with_repeat_count(-1));
        p.fade_out(10);
        let bytes = render_all(&mut p);
        assert_eq!(bytes.len(), 441 * 4);
        assert!(p.is_ended());
    }

    #[test]
    fn mono_u8_output() {
        let settings = MixerSettings::default()
            .with_channels(1)
            .with_sample_format(SampleFormat::U8);
        let mut p = Player::new(song(1), settings);
        let mut buf = [0u8; 100];
        assert_eq!(p.read(&mut buf), 100);
    }

    #[test]
    fn buffer_shorter_than_a_frame_renders_nothing() {
        let mut p = player(song(1));
        let mut short = [0u8; 3];
        assert_eq!(p.read(&mut short), 0);
        assert!(!p.is_ended());
        let mut buf = [0u8; 8];
        assert_eq!(p.read(&mut buf), 8);

        // The bytes that fit nothing do not shift the output
        let mut fresh = player(song(1));
        let mut first = [0u8; 8];
        fresh.read(&mut first);
        assert_eq!(buf, first);
    }
}
