//! Note triggering, key release and new note actions.

use rand::RngCore;
use tm_ir::{
    Cell, DuplicateCheck, Effect, Instrument, NewNoteAction, Note, NoteAction, Sample,
    VolumeCommand,
};

use super::EffectProcessor;
use crate::channel::{FADE_MAX, PAN_MAX};
use crate::fixed::SamplePosition;
use crate::frequency::{frequency_to_period, note_to_frequency, note_to_period, tuned_frequency};
use crate::voice_pool::{VoiceId, MAX_VOICES};

/// A note after the instrument keyboard has been applied.
#[derive(Clone, Copy, Debug)]
struct Resolved {
    instrument: Option<usize>,
    sample: usize,
    note: u8,
}

/// Default volume of a sample in the 0..=256 scale.
fn default_volume(sample: &Sample) -> i32 {
    sample.default_volume.min(64) as i32 * 4
}

impl EffectProcessor<'_> {
    /// Handle the note and instrument columns of a cell.
    pub(super) fn trigger_cell(&mut self, ch: usize, cell: &Cell) {
        let instrument = (cell.instrument > 0).then(|| cell.instrument as usize - 1);
        let porta = cell.effect.is_tone_porta() || matches!(cell.volume, VolumeCommand::TonePorta(_));

        match cell.note {
            Note::On(note) => self.note_on(ch, note, instrument, porta, cell.effect),
            Note::Off => self.key_off(ch),
            Note::Cut => self.cut(ch),
            Note::Fade => self.voice(ch).fading = true,
            Note::None => {
                if let Some(instrument) = instrument {
                    self.instrument_only(ch, instrument);
                }
            }
        }
    }

    /// Map a pattern note through the instrument keyboard. Without
    /// instruments the instrument column selects a sample directly.
    fn resolve(&self, ch: usize, note: u8, instrument: Option<usize>) -> Option<Resolved> {
        let voice = &self.voices.voices()[ch];
        if self.song.instruments.is_empty() {
            let sample = instrument.or(voice.sample)?;
            return Some(Resolved { instrument: None, sample, note });
        }
        let index = instrument.or(voice.instrument)?;
        let key = self.song.instruments.get(index)?.key(note)?;
        let sample = (key.sample as usize).checked_sub(1)?;
        Some(Resolved { instrument: Some(index), sample, note: key.note })
    }

    /// Period (or frequency with linear slides) a note starts at.
    fn base_pitch(&self, note: u8, c5_speed: u32, finetune: i8, instrument: Option<&Instrument>) -> i32 {
        let linear = self.song.dialect.linear_slides;
        match instrument.and_then(|i| i.tuning.as_ref()) {
            Some(tuning) => {
                let freq = tuned_frequency(c5_speed, tuning.ratio(note));
                if linear {
                    freq
                } else {
                    frequency_to_period(freq as i64)
                }
            }
            None if linear => note_to_frequency(note, c5_speed, finetune),
            None => note_to_period(note, c5_speed, finetune),
        }
    }

    fn note_on(&mut self, ch: usize, note: u8, instrument: Option<usize>, porta: bool, effect: Effect) {
        let song = self.song;
        let Some(resolved) = self.resolve(ch, note, instrument) else {
            self.cut(ch);
            return;
        };
        let Some(sample) = song.samples.get(resolved.sample).filter(|s| !s.is_empty()) else {
            self.cut(ch);
            return;
        };
        let inst = resolved.instrument.and_then(|i| song.instruments.get(i));
        let finetune = match effect {
            Effect::SetFinetune(f) => f,
            _ if instrument.is_some() => 0,
            _ => self.voices.voices()[ch].finetune,
        };
        let pitch = self.base_pitch(resolved.note, sample.c5_speed, finetune, inst);

        if porta && self.voices.voices()[ch].active {
            let voice = self.voice(ch);
            voice.porta_target = pitch;
            if instrument.is_some() {
                voice.volume = default_volume(sample);
            }
            return;
        }

        self.new_note_action(ch, &resolved);

        let dialect = song.dialect;
        let voice = &mut self.voices.voices_mut()[ch];
        voice.active = true;
        voice.sample = Some(resolved.sample);
        voice.instrument = resolved.instrument;
        voice.note = resolved.note;
        voice.pattern_note = note;
        voice.is_background = false;
        voice.master_channel = ch;
        voice.fast_cut = false;

        voice.c5_speed = sample.c5_speed;
        voice.finetune = finetune;
        voice.period = pitch;
        voice.porta_target = pitch;
        voice.position = SamplePosition::ZERO;
        voice.increment = 0;

        voice.key_released = false;
        voice.fading = false;
        voice.fade_volume = FADE_MAX;
        if instrument.is_some() {
            voice.volume = default_volume(sample);
            if let Some(pan) = inst.and_then(|i| i.default_pan).or(sample.default_pan) {
                voice.pan = (pan as i32).min(PAN_MAX);
            }
        }

        voice.volume_env.trigger(inst.and_then(|i| i.volume_envelope.as_ref()), true);
        voice.pan_env.trigger(inst.and_then(|i| i.panning_envelope.as_ref()), true);
        voice.pitch_env.trigger(inst.and_then(|i| i.pitch_envelope.as_ref()), true);

        voice.auto_vibrato_position = 0;
        voice.auto_vibrato_depth = 0;
        voice.auto_vibrato_ticks = 0;
        if dialect.vibrato_resets_on_new_note {
            voice.vibrato.retrigger();
            voice.tremolo.retrigger();
            voice.panbrello.retrigger();
        }
        voice.tremor_count = 0;
        voice.tremor_off = false;
        voice.retrigger_count = 0;

        voice.volume_swing = 0;
        voice.pan_swing = 0;
        if let Some(inst) = inst {
            if inst.pitch_pan_separation != 0 {
                let offset = (resolved.note as i32 - inst.pitch_pan_center as i32) * inst.pitch_pan_separation as i32 / 2;
                voice.pan = (voice.pan + offset).clamp(0, PAN_MAX);
            }
            if inst.volume_swing > 0 {
                let swing = inst.volume_swing.min(100) as i32;
                let r = (self.rng.next_u32() % (2 * swing as u32 + 1)) as i32 - swing;
                voice.volume_swing = voice.volume * r / 100;
            }
            if inst.pan_swing > 0 {
                let swing = inst.pan_swing.min(64) as i32;
                let r = (self.rng.next_u32() % (2 * swing as u32 + 1)) as i32 - swing;
                voice.pan_swing = r * 4;
            }
            voice.new_note_action = inst.new_note_action;
            if let Some(cutoff) = inst.filter_cutoff {
                voice.filter_cutoff = cutoff.min(127);
            }
            if let Some(resonance) = inst.filter_resonance {
                voice.filter_resonance = resonance.min(127);
            }
            voice.filter_mode = inst.filter_mode;
        }
        voice.loop_cleared = false;
        voice.mix.restart();

        if let Effect::SampleOffset(param) = effect {
            if param != 0 {
                voice.memory.sample_offset = param;
            }
            let frames = voice.memory.sample_offset as u64 * 256;
            if frames < sample.len() as u64 {
                voice.position = SamplePosition::from_frames(frames as i64);
            } else if let Some(lp) = sample.normal_loop() {
                voice.position = SamplePosition::from_frames(lp.start as i64);
            } else {
                voice.stop();
            }
        }
    }

    /// Instrument number without a note.
    fn instrument_only(&mut self, ch: usize, instrument: usize) {
        if !self.song.dialect.instrument_without_note_resets_volume {
            return;
        }
        let note = self.voices.voices()[ch].pattern_note;
        let Some(resolved) = self.resolve(ch, note, Some(instrument)) else {
            return;
        };
        if let Some(sample) = self.song.samples.get(resolved.sample) {
            self.voice(ch).volume = default_volume(sample);
        }
    }

    /// Move a playing channel voice into the background before a new note
    /// replaces it.
    fn new_note_action(&mut self, ch: usize, next: &Resolved) {
        if !self.voices.voices()[ch].active {
            return;
        }
        let song = self.song;
        let nna_enabled = song.dialect.new_note_actions;
        if !nna_enabled && self.settings.ramp_down_samples == 0 {
            return;
        }

        if nna_enabled {
            if let Some(inst) = next.instrument.and_then(|i| song.instruments.get(i)) {
                if inst.duplicate_check != DuplicateCheck::Off {
                    self.duplicate_check(ch, next, inst.duplicate_check, inst.duplicate_action);
                }
            }
        }

        let action = if nna_enabled {
            self.voices.voices()[ch].new_note_action
        } else {
            NewNoteAction::Cut
        };
        let Some(background) = self.voices.allocate_background() else {
            return;
        };
        self.voices.clone_into_background(ch, background);
        match action {
            NewNoteAction::Cut => self.note_action(background, NoteAction::Cut),
            NewNoteAction::Continue => {}
            NewNoteAction::Off => self.note_action(background, NoteAction::Off),
            NewNoteAction::Fade => self.note_action(background, NoteAction::Fade),
        }
    }

    fn duplicate_check(&mut self, ch: usize, next: &Resolved, check: DuplicateCheck, action: NoteAction) {
        for id in self.voices.channels()..MAX_VOICES {
            let voice = &self.voices.voices()[id];
            if !voice.active || voice.master_channel != ch {
                continue;
            }
            let duplicate = match check {
                DuplicateCheck::Off => false,
                DuplicateCheck::Note => voice.note == next.note && voice.instrument == next.instrument,
                DuplicateCheck::Sample => voice.sample == Some(next.sample),
                DuplicateCheck::Instrument => voice.instrument == next.instrument,
            };
            if duplicate {
                self.note_action(id, action);
            }
        }
    }

    /// Apply an action to every background voice owned by `ch`.
    pub(super) fn past_note_action(&mut self, ch: usize, action: NoteAction) {
        for id in self.voices.channels()..MAX_VOICES {
            let voice = &self.voices.voices()[id];
            if voice.active && voice.master_channel == ch {
                self.note_action(id, action);
            }
        }
    }

    fn note_action(&mut self, id: VoiceId, action: NoteAction) {
        match action {
            NoteAction::Cut => self.cut(id),
            NoteAction::Off => self.key_off(id),
            NoteAction::Fade => self.voice(id).fading = true,
        }
    }

    /// Fade the voice out over the ramp, then free it.
    pub(super) fn cut(&mut self, id: VoiceId) {
        let voice = self.voice(id);
        if voice.active {
            voice.fast_cut = true;
        }
    }

    /// Release the key: leave sustain, start fading or silence the note,
    /// depending on the envelopes and the dialect.
    pub(super) fn key_off(&mut self, id: VoiceId) {
        let song = self.song;
        let dialect = song.dialect;
        let voice = self.voice(id);
        voice.key_released = true;
        // Leaving the sustain loop arms the normal loop again
        voice.loop_cleared = false;

        let inst = voice.instrument.and_then(|i| song.instruments.get(i));
        if let Some(inst) = inst {
            if let Some(env) = &inst.panning_envelope {
                voice.pan_env.release(env);
            }
            if let Some(env) = &inst.pitch_envelope {
                voice.pitch_env.release(env);
            }
        }

        let volume_env = inst
            .and_then(|i| i.volume_envelope.as_ref())
            .filter(|_| voice.volume_env.enabled);
        match volume_env {
            Some(env) => {
                voice.volume_env.release(env);
                voice.fading = true;
            }
            None if dialect.key_off_without_envelope_cuts => voice.volume = 0,
            None if dialect.fade_without_volume_envelope && inst.is_some() => voice.fading = true,
            None if inst.is_none() => voice.volume = 0,
            None => {}
        }
    }
}
