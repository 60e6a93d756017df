//! Oscillators, envelopes and the final per-voice values.

use tm_ir::{ENVELOPE_FRACTION, ENVELOPE_MAX};

use super::EffectProcessor;
use crate::channel::{PAN_CENTER, PAN_MAX, VOLUME_MAX};
use crate::filter::{FilterCoefs, FILTER_ENV_RANGE};
use crate::frequency::{
    frequency_to_increment, period_to_frequency, shift_by_units, PERIOD_MAX, PERIOD_MIN,
    UNITS_PER_SEMITONE,
};
use crate::voice_pool::VoiceId;
use crate::waveform::{lfo_value, LfoTable};

/// Volume envelope value at full level.
const ENVELOPE_FULL: i32 = ENVELOPE_MAX as i32 * ENVELOPE_FRACTION;

/// Envelope value per unit of pitch (1/768 octave); the full range is 16 semitones.
const PITCH_ENVELOPE_DIVISOR: i32 = 8;

/// Envelope value per unit of filter modulation.
const FILTER_ENVELOPE_DIVISOR: i32 = (32 * ENVELOPE_FRACTION) / FILTER_ENV_RANGE;

/// `volume * envelope * fade * channel * sample * instrument` is scaled down
/// by this many bits to give 0..=4096.
const VOLUME_SHIFT: u32 = 44;

impl EffectProcessor<'_> {
    pub(super) fn set_vibrato(&mut self, ch: usize, speed: u8, depth: u8, fine: bool) {
        let voice = self.voice(ch);
        if speed > 0 {
            voice.vibrato.speed = speed;
        }
        if depth > 0 {
            voice.vibrato.depth = depth;
        }
        voice.fine_vibrato = fine;
    }

    pub(super) fn vibrato(&mut self, ch: usize) {
        let dialect = self.song.dialect;
        let table = LfoTable::for_dialect(&dialect);
        let voice = &mut self.voices.voices_mut()[ch];
        let value = lfo_value(voice.vibrato.waveform, table, voice.vibrato.position, self.rng);
        let shift = if dialect.old_effects { 4 } else { 5 } + if voice.fine_vibrato { 2 } else { 0 };
        let delta = (value * voice.vibrato.depth as i32) >> shift;
        if dialect.linear_slides {
            voice.tick.pitch_units -= delta;
        } else {
            voice.tick.period += delta;
        }
        voice.vibrato.advance();
    }

    pub(super) fn tremolo(&mut self, ch: usize) {
        let table = LfoTable::for_dialect(&self.song.dialect);
        let voice = &mut self.voices.voices_mut()[ch];
        let value = lfo_value(voice.tremolo.waveform, table, voice.tremolo.position, self.rng);
        voice.tick.volume += (value * voice.tremolo.depth as i32) >> 3;
        voice.tremolo.advance();
    }

    pub(super) fn panbrello(&mut self, ch: usize) {
        let table = LfoTable::for_dialect(&self.song.dialect);
        let voice = &mut self.voices.voices_mut()[ch];
        let value = lfo_value(voice.panbrello.waveform, table, voice.panbrello.position, self.rng);
        voice.tick.pan += (value * voice.panbrello.depth as i32) >> 4;
        voice.panbrello.advance();
    }

    /// Count through the on and off phases; silences the voice while off.
    pub(super) fn tremor(&mut self, ch: usize) {
        let dialect = self.song.dialect;
        let voice = self.voice(ch);
        let (on, off) = voice.memory.tremor;
        let phase = |len: u8| {
            let len = if dialect.tremor_zero_is_one { len.max(1) } else { len };
            len.saturating_add(dialect.tremor_counts_ticks_plus_one as u8)
        };
        let len = if voice.tremor_off { phase(off) } else { phase(on) };
        if voice.tremor_count >= len {
            voice.tremor_off = !voice.tremor_off;
            voice.tremor_count = 0;
        }
        voice.tremor_count = voice.tremor_count.saturating_add(1);
        voice.tick.silenced = voice.tremor_off;
    }

    pub(super) fn remember_arpeggio(&mut self, ch: usize, x: u8, y: u8) {
        let memory = &mut self.voice(ch).memory;
        if x != 0 || y != 0 {
            memory.arpeggio = (x, y);
        }
    }

    pub(super) fn arpeggio(&mut self, ch: usize) {
        let tick = self.play.row_tick();
        let speed = self.play.speed.max(1);
        let step = if self.song.dialect.ft2_arpeggio {
            (speed - tick % speed) % 3
        } else {
            tick % 3
        };
        let voice = self.voice(ch);
        let (x, y) = voice.memory.arpeggio;
        let semitones = match step {
            1 => x,
            2 => y,
            _ => 0,
        };
        voice.tick.pitch_units += semitones as i32 * UNITS_PER_SEMITONE;
    }

    /// Fold this tick's effects, envelopes and fade into every active voice.
    pub fn update_voices(&mut self) {
        for id in 0..self.voices.voices().len() {
            if self.voices.voices()[id].active {
                self.update_voice(id);
            }
        }
    }

    fn update_voice(&mut self, id: VoiceId) {
        let song = self.song;
        let dialect = song.dialect;
        let rate = self.settings.sample_rate;
        let voice = &mut self.voices.voices_mut()[id];
        let Some(sample) = voice.sample.and_then(|s| song.samples.get(s)) else {
            voice.stop();
            return;
        };
        let inst = voice.instrument.and_then(|i| song.instruments.get(i));
        let ft2_sustain = dialect.ft2_envelope_sustain;

        // Volume
        let mut volume = (voice.volume + voice.volume_swing + voice.tick.volume).clamp(0, VOLUME_MAX);
        let envelope = match inst.and_then(|i| i.volume_envelope.as_ref()).filter(|_| voice.volume_env.enabled) {
            Some(env) => {
                let value = voice.volume_env.value(env).clamp(0, ENVELOPE_FULL);
                let finished = voice.volume_env.is_finished(env, voice.key_released);
                voice.volume_env.advance(env, voice.key_released, ft2_sustain);
                if finished && value == 0 {
                    voice.fast_cut = true;
                }
                value
            }
            None => ENVELOPE_FULL,
        };
        if voice.fading {
            let fadeout = inst.map_or(0, |i| i.fadeout.min(FADE_STEP_MAX) as i32);
            voice.fade_volume = (voice.fade_volume - fadeout).max(0);
            if voice.fade_volume == 0 {
                voice.fast_cut = true;
            }
        }
        if voice.tick.silenced || voice.muted || voice.fast_cut {
            volume = 0;
        }
        let sample_volume = sample.global_volume.min(64) as i64;
        let inst_volume = inst.map_or(64, |i| i.global_volume.min(64) as i64);
        let real = volume as i64
            * envelope as i64
            * voice.fade_volume as i64
            * voice.channel_volume.clamp(0, 64) as i64
            * sample_volume
            * inst_volume;
        voice.real_volume = (real >> VOLUME_SHIFT) as i32;

        // Panning
        let mut pan = (voice.pan + voice.pan_swing + voice.tick.pan).clamp(0, PAN_MAX);
        if let Some(env) = inst.and_then(|i| i.panning_envelope.as_ref()).filter(|_| voice.pan_env.enabled) {
            let value = voice.pan_env.value(env);
            voice.pan_env.advance(env, voice.key_released, ft2_sustain);
            let room = PAN_CENTER - (pan - PAN_CENTER).abs();
            pan += value * room / (32 * ENVELOPE_FRACTION);
        }
        voice.real_pan = pan.clamp(0, PAN_MAX);

        // Pitch and filter envelope
        let mut units = voice.tick.pitch_units;
        let mut filter_mod = 0;
        if let Some(inst) = inst {
            if let Some(env) = inst.pitch_envelope.as_ref().filter(|_| voice.pitch_env.enabled) {
                let value = voice.pitch_env.value(env);
                voice.pitch_env.advance(env, voice.key_released, ft2_sustain);
                if inst.pitch_envelope_is_filter {
                    filter_mod = value / FILTER_ENVELOPE_DIVISOR;
                } else {
                    units += value / PITCH_ENVELOPE_DIVISOR;
                }
            }
        }

        // Auto-vibrato
        if let Some(av) = sample.vibrato.filter(|av| av.depth > 0) {
            let depth = if dialect.it_auto_vibrato_sweep {
                let full = (av.depth as i32) << 8;
                voice.auto_vibrato_depth = if av.sweep == 0 {
                    full
                } else {
                    (voice.auto_vibrato_depth + av.sweep as i32).min(full)
                };
                voice.auto_vibrato_depth >> 8
            } else {
                voice.auto_vibrato_ticks = voice.auto_vibrato_ticks.saturating_add(1);
                if av.sweep == 0 || voice.auto_vibrato_ticks >= av.sweep as u32 {
                    av.depth as i32
                } else {
                    av.depth as i32 * voice.auto_vibrato_ticks as i32 / av.sweep as i32
                }
            };
            let table = LfoTable::for_dialect(&dialect);
            let value = lfo_value(av.waveform.into(), table, voice.auto_vibrato_position, self.rng);
            units -= (value * depth) >> 7;
            voice.auto_vibrato_position = (voice.auto_vibrato_position + av.rate as u32) & 255;
        }

        let freq = if dialect.linear_slides {
            voice.period as i64
        } else {
            period_to_frequency((voice.period + voice.tick.period).clamp(PERIOD_MIN, PERIOD_MAX))
        };
        let increment = frequency_to_increment(shift_by_units(freq, units), rate);
        voice.increment = if voice.increment < 0 { -increment } else { increment };

        voice.filter_coefs = FilterCoefs::compute(
            voice.filter_cutoff,
            voice.filter_resonance,
            filter_mod,
            voice.filter_mode,
            rate,
        );
    }
}

/// Largest fade-out step per tick.
const FADE_STEP_MAX: u32 = 65536;

#[cfg(test)]
mod tests {
    use super::super::tests::{song, Rig};
    use tm_ir::{AutoVibrato, Effect, Envelope, Instrument, Note, PlaybackDialect, VibratoWave};

    use crate::channel::PAN_CENTER;

    fn play_instrument(inst: Instrument, effect: Effect) -> Rig {
        let mut s = song(PlaybackDialect::impulse_tracker());
        s.instruments.push(inst);
        if let Some(cell) = s.patterns[0].cell_mut(0, 0) {
            cell.note = Note::On(60);
            cell.instrument = 1;
            cell.effect = effect;
        }
        Rig::new(s)
    }

    fn instrument() -> Instrument {
        let mut inst = Instrument::new("i");
        inst.set_single_sample(1);
        inst
    }

    #[test]
    fn global_volumes_scale_real_volume() {
        let mut inst = instrument();
        inst.global_volume = 32;
        let mut rig = play_instrument(inst, Effect::ChannelVolume(32));
        rig.tick();
        assert_eq!(rig.ch(0).real_volume, 1024);
    }

    #[test]
    fn pan_envelope_swings_within_range() {
        let mut inst = instrument();
        let mut env = Envelope::new();
        env.add_point(0, 32);
        env.add_point(10, -32);
        inst.panning_envelope = Some(env);
        let mut rig = play_instrument(inst, Effect::None);
        rig.tick();
        assert_eq!(rig.ch(0).real_pan, 256);
        // Halfway between +32 and -32
        rig.ticks(5);
        assert_eq!(rig.ch(0).real_pan, PAN_CENTER);
    }

    #[test]
    fn pitch_envelope_bends_up() {
        let mut inst = instrument();
        let mut env = Envelope::new();
        env.add_point(0, 32);
        inst.pitch_envelope = Some(env);
        let mut rig = play_instrument(inst, Effect::None);
        rig.tick();
        // +32 is 16 semitones
        let expected = crate::frequency::frequency_to_increment(
            crate::frequency::shift_by_units(44100, 16 * 64),
            44100,
        );
        assert_eq!(rig.ch(0).increment, expected);
    }

    #[test]
    fn envelope_position_moves_every_envelope() {
        let mut inst = instrument();
        let mut pitch = Envelope::new();
        pitch.add_point(0, 0);
        pitch.add_point(10, 32);
        inst.pitch_envelope = Some(pitch);
        let mut pan = Envelope::new();
        pan.add_point(0, 0);
        pan.add_point(10, 32);
        inst.panning_envelope = Some(pan);
        let mut rig = play_instrument(inst, Effect::SetEnvelopePosition(10));
        rig.tick();
        assert_eq!(rig.ch(0).pitch_env.position, 10);
        assert_eq!(rig.ch(0).real_pan, 256);
        let expected = crate::frequency::frequency_to_increment(
            crate::frequency::shift_by_units(44100, 16 * 64),
            44100,
        );
        assert_eq!(rig.ch(0).increment, expected);
    }

    #[test]
    fn filter_envelope_drives_cutoff() {
        let mut inst = instrument();
        let mut env = Envelope::new();
        env.add_point(0, -32);
        inst.pitch_envelope = Some(env);
        inst.pitch_envelope_is_filter = true;
        let mut rig = play_instrument(inst, Effect::None);
        rig.tick();
        assert!(rig.ch(0).filter_coefs.is_some());
        assert_eq!(rig.ch(0).increment, 0x10000);
    }

    #[test]
    fn auto_vibrato_sweeps_in() {
        let mut s = song(PlaybackDialect::impulse_tracker());
        s.samples[0].vibrato = Some(AutoVibrato {
            rate: 64,
            depth: 32,
            sweep: 0,
            waveform: VibratoWave::Square,
        });
        if let Some(cell) = s.patterns[0].cell_mut(0, 0) {
            cell.note = Note::On(60);
            cell.instrument = 1;
        }
        let mut rig = Rig::new(s);
        rig.tick();
        let first = rig.ch(0).increment;
        assert!(first < 0x10000);
        rig.ticks(2);
        assert!(rig.ch(0).increment > 0x10000);
    }

    #[test]
    fn tremolo_changes_volume_only_while_active() {
        let mut s = song(PlaybackDialect::impulse_tracker());
        s.samples[0].default_volume = 32;
        if let Some(cell) = s.patterns[0].cell_mut(0, 0) {
            cell.note = Note::On(60);
            cell.instrument = 1;
            cell.effect = Effect::Tremolo { speed: 16, depth: 8 };
        }
        let mut rig = Rig::new(s);
        rig.ticks(3);
        assert_ne!(rig.ch(0).real_volume, 2048);
        rig.ticks(4);
        assert_eq!(rig.ch(0).real_volume, 2048);
    }

    #[test]
    fn muted_channel_is_silent() {
        let mut rig = play_instrument(instrument(), Effect::None);
        if let Some(voice) = rig.voices.get_mut(0) {
            voice.muted = true;
        }
        rig.tick();
        assert_eq!(rig.ch(0).real_volume, 0);
    }
}
