//! Effect and volume column commands.

use tm_ir::{nibbles, Effect, VolumeCommand, MAX_GLOBAL_VOLUME};

use super::EffectProcessor;
use crate::channel::{PAN_MAX, VOLUME_MAX};
use crate::filter::FILTER_MAX;
use crate::fixed::SamplePosition;
use crate::frequency::{shift_by_units, FREQUENCY_MAX, FREQUENCY_MIN, PERIOD_MAX, PERIOD_MIN};
use crate::waveform::Waveform;

/// Tone portamento speeds of the volume column's `Gx` command.
const VOLUME_COLUMN_PORTA: [u8; 10] = [0, 1, 4, 8, 16, 32, 64, 96, 128, 255];

/// Store a non-zero parameter, or recall the last one.
fn remember(slot: &mut u8, param: u8) -> u8 {
    if param != 0 {
        *slot = param;
    }
    *slot
}

/// Split a packed slide parameter into (amount per tick, amount on the first tick).
///
/// `x0` slides up, `0y` down, `xF` is a fine slide up and `Fy` a fine slide down.
fn slide_amounts(param: u8) -> (i32, i32) {
    match nibbles(param) {
        (0xF, y) if y > 0 => (0, -(y as i32)),
        (x, 0xF) if x > 0 => (0, x as i32),
        (0, y) => (-(y as i32), 0),
        (x, _) => (x as i32, 0),
    }
}

/// Volume change of the retrigger effect, in the 0..=256 scale.
fn retrigger_volume(volume: i32, change: u8) -> i32 {
    let volume = match change {
        1..=5 => volume - (4 << (change - 1)),
        6 => volume * 2 / 3,
        7 => volume / 2,
        9..=13 => volume + (4 << (change - 9)),
        14 => volume * 3 / 2,
        15 => volume * 2,
        _ => volume,
    };
    volume.clamp(0, VOLUME_MAX)
}

impl EffectProcessor<'_> {
    /// First tick of a row. `first_pass` is false when a pattern delay
    /// repeats the row; navigation is only queued once.
    pub(super) fn row_effect(&mut self, ch: usize, effect: Effect, first_pass: bool) {
        let song = self.song;
        match effect {
            Effect::None | Effect::SampleOffset(_) | Effect::NoteDelay(_) => {}

            Effect::Arpeggio { x, y } => {
                self.remember_arpeggio(ch, x, y);
                self.arpeggio(ch);
            }
            Effect::PortaUp(p) => {
                self.porta_param(ch, p, true);
            }
            Effect::PortaDown(p) => {
                self.porta_param(ch, p, false);
            }
            Effect::FinePortaUp(p) => {
                let p = remember(&mut self.voice(ch).memory.fine_porta_up, p);
                self.porta(ch, p as i32 * 4);
            }
            Effect::FinePortaDown(p) => {
                let p = remember(&mut self.voice(ch).memory.fine_porta_down, p);
                self.porta(ch, -(p as i32 * 4));
            }
            Effect::ExtraFinePortaUp(p) => self.porta(ch, p as i32),
            Effect::ExtraFinePortaDown(p) => self.porta(ch, -(p as i32)),
            Effect::TonePorta(p) => {
                remember(&mut self.voice(ch).memory.tone_porta, p);
            }
            Effect::Vibrato { speed, depth } => {
                self.set_vibrato(ch, speed, depth, false);
                if song.dialect.vibrato_on_first_tick {
                    self.vibrato(ch);
                }
            }
            Effect::FineVibrato { speed, depth } => {
                self.set_vibrato(ch, speed, depth, true);
                if song.dialect.vibrato_on_first_tick {
                    self.vibrato(ch);
                }
            }
            Effect::TonePortaVolSlide(p) => self.volume_slide_row(ch, p),
            Effect::VibratoVolSlide(p) => {
                self.volume_slide_row(ch, p);
                if song.dialect.vibrato_on_first_tick {
                    self.vibrato(ch);
                }
            }

            Effect::Tremolo { speed, depth } => {
                let lfo = &mut self.voice(ch).tremolo;
                remember(&mut lfo.speed, speed);
                remember(&mut lfo.depth, depth);
            }
            Effect::Tremor { on, off } => {
                let voice = self.voice(ch);
                if on != 0 || off != 0 {
                    voice.memory.tremor = (on, off);
                }
                self.tremor(ch);
            }
            Effect::Panbrello { speed, depth } => {
                let lfo = &mut self.voice(ch).panbrello;
                remember(&mut lfo.speed, speed);
                remember(&mut lfo.depth, depth);
            }
            Effect::SetPan(p) => {
                let voice = self.voice(ch);
                voice.pan = p as i32 * PAN_MAX / 255;
                voice.surround = false;
            }
            Effect::PanningSlide(p) => {
                let voice = self.voice(ch);
                let (_, fine) = slide_amounts(remember(&mut voice.memory.panning_slide, p));
                voice.pan = (voice.pan + fine * 4).clamp(0, PAN_MAX);
            }
            Effect::VolumeSlide(p) => self.volume_slide_row(ch, p),
            Effect::FineVolumeSlideUp(p) => {
                let voice = self.voice(ch);
                voice.volume = (voice.volume + p as i32 * 4).min(VOLUME_MAX);
            }
            Effect::FineVolumeSlideDown(p) => {
                let voice = self.voice(ch);
                voice.volume = (voice.volume - p as i32 * 4).max(0);
            }
            Effect::SetVolume(v) => self.voice(ch).volume = v.min(64) as i32 * 4,
            Effect::ChannelVolume(v) => self.voice(ch).channel_volume = v.min(64) as i32,
            Effect::ChannelVolumeSlide(p) => {
                let voice = self.voice(ch);
                let (_, fine) = slide_amounts(remember(&mut voice.memory.channel_volume_slide, p));
                voice.channel_volume = (voice.channel_volume + fine).clamp(0, 64);
            }
            Effect::SetGlobalVolume(v) => {
                self.play.global_volume = v.min(MAX_GLOBAL_VOLUME) as u32;
            }
            Effect::GlobalVolumeSlide(p) => {
                let p = remember(&mut self.voice(ch).memory.global_volume_slide, p);
                let (_, fine) = slide_amounts(p);
                self.slide_global_volume(fine);
            }
            Effect::SetSurround(on) => self.voice(ch).surround = on,

            Effect::PositionJump(order) if first_pass => self.play.position_jump = Some(order as usize),
            Effect::PatternBreak(row) if first_pass => self.play.pattern_break = Some(row as u16),
            Effect::PatternLoop(count) if first_pass => self.pattern_loop(ch, count),
            Effect::PatternDelay(rows) if first_pass => {
                if self.play.pattern_delay == 0 {
                    self.play.pattern_delay = rows as u32;
                }
            }
            Effect::FinePatternDelay(ticks) if first_pass => self.play.frame_delay += ticks as u32,
            Effect::PositionJump(_)
            | Effect::PatternBreak(_)
            | Effect::PatternLoop(_)
            | Effect::PatternDelay(_)
            | Effect::FinePatternDelay(_) => {}

            Effect::SetSpeed(speed) => self.play.set_speed(speed as u32),
            Effect::SetTempo(tempo) => self.play.set_tempo(tempo as u32),
            Effect::TempoSlideDown(p) | Effect::TempoSlideUp(p) => {
                remember(&mut self.voice(ch).memory.tempo_slide, p);
            }

            Effect::Retrigger { interval, volume_change } => {
                if interval > 0 {
                    self.voice(ch).memory.retrigger = (interval, volume_change);
                }
            }
            Effect::NoteCut(0) => self.voice(ch).volume = 0,
            Effect::NoteCut(tick) => self.voice(ch).note_cut_tick = Some(tick),
            Effect::KeyOff(0) => self.key_off(ch),
            Effect::KeyOff(tick) => self.voice(ch).key_off_tick = Some(tick),

            Effect::SetEnvelopePosition(pos) => {
                let voice = self.voice(ch);
                voice.volume_env.position = pos as u16;
                voice.pan_env.position = pos as u16;
                voice.pitch_env.position = pos as u16;
            }
            Effect::SetVibratoWaveform(p) => {
                let voice = self.voice(ch);
                (voice.vibrato.waveform, voice.vibrato.keep_phase) = Waveform::from_param(p);
            }
            Effect::SetTremoloWaveform(p) => {
                let voice = self.voice(ch);
                (voice.tremolo.waveform, voice.tremolo.keep_phase) = Waveform::from_param(p);
            }
            Effect::SetPanbrelloWaveform(p) => {
                let voice = self.voice(ch);
                (voice.panbrello.waveform, voice.panbrello.keep_phase) = Waveform::from_param(p);
            }
            Effect::SetFinetune(f) => self.voice(ch).finetune = f,
            Effect::PastNoteAction(action) => self.past_note_action(ch, action),
            Effect::SetNewNoteAction(action) => self.voice(ch).new_note_action = action,
            Effect::VolumeEnvelope(on) => {
                let voice = self.voice(ch);
                let inst = voice.instrument.and_then(|i| song.instruments.get(i));
                let present = inst.is_some_and(|i| i.volume_envelope.as_ref().is_some_and(|e| !e.points.is_empty()));
                voice.volume_env.enabled = on && present;
            }
            Effect::PanningEnvelope(on) => {
                let voice = self.voice(ch);
                let inst = voice.instrument.and_then(|i| song.instruments.get(i));
                let present = inst.is_some_and(|i| i.panning_envelope.as_ref().is_some_and(|e| !e.points.is_empty()));
                voice.pan_env.enabled = on && present;
            }
            Effect::PitchEnvelope(on) => {
                let voice = self.voice(ch);
                let inst = voice.instrument.and_then(|i| song.instruments.get(i));
                let present = inst.is_some_and(|i| i.pitch_envelope.as_ref().is_some_and(|e| !e.points.is_empty()));
                voice.pitch_env.enabled = on && present;
            }
            Effect::SetFilterCutoff(c) => self.voice(ch).filter_cutoff = c.min(FILTER_MAX),
            Effect::SetFilterResonance(r) => self.voice(ch).filter_resonance = r.min(FILTER_MAX),
        }
    }

    /// Ticks after the first.
    pub(super) fn tick_effect(&mut self, ch: usize, effect: Effect) {
        match effect {
            Effect::Arpeggio { .. } => self.arpeggio(ch),
            Effect::PortaUp(p) => {
                let p = self.porta_param(ch, p, true);
                self.porta(ch, p as i32 * 4);
            }
            Effect::PortaDown(p) => {
                let p = self.porta_param(ch, p, false);
                self.porta(ch, -(p as i32 * 4));
            }
            Effect::TonePorta(_) => self.tone_porta(ch),
            Effect::Vibrato { .. } | Effect::FineVibrato { .. } => self.vibrato(ch),
            Effect::TonePortaVolSlide(_) => {
                self.tone_porta(ch);
                self.volume_slide_tick(ch);
            }
            Effect::VibratoVolSlide(_) => {
                self.vibrato(ch);
                self.volume_slide_tick(ch);
            }
            Effect::Tremolo { .. } => self.tremolo(ch),
            Effect::Tremor { .. } => self.tremor(ch),
            Effect::Panbrello { .. } => self.panbrello(ch),
            Effect::PanningSlide(_) => {
                let voice = self.voice(ch);
                let (step, _) = slide_amounts(voice.memory.panning_slide);
                voice.pan = (voice.pan + step * 4).clamp(0, PAN_MAX);
            }
            Effect::VolumeSlide(_) => self.volume_slide_tick(ch),
            Effect::ChannelVolumeSlide(_) => {
                let voice = self.voice(ch);
                let (step, _) = slide_amounts(voice.memory.channel_volume_slide);
                voice.channel_volume = (voice.channel_volume + step).clamp(0, 64);
            }
            Effect::GlobalVolumeSlide(_) => {
                let (step, _) = slide_amounts(self.voice(ch).memory.global_volume_slide);
                self.slide_global_volume(step);
            }
            Effect::TempoSlideDown(_) => {
                let step = self.voice(ch).memory.tempo_slide as u32;
                self.play.set_tempo(self.play.tempo.saturating_sub(step));
            }
            Effect::TempoSlideUp(_) => {
                let step = self.voice(ch).memory.tempo_slide as u32;
                self.play.set_tempo(self.play.tempo + step);
            }
            Effect::Retrigger { .. } => self.retrigger(ch),
            _ => {}
        }
    }

    /// Volume column on the first tick of a row.
    pub(super) fn volume_row(&mut self, ch: usize, cmd: VolumeCommand) {
        let voice = self.voice(ch);
        match cmd {
            VolumeCommand::Volume(v) => voice.volume = v.min(64) as i32 * 4,
            VolumeCommand::Panning(p) => {
                voice.pan = p.min(64) as i32 * 4;
                voice.surround = false;
            }
            VolumeCommand::FineVolumeUp(x) => voice.volume = (voice.volume + x as i32 * 4).min(VOLUME_MAX),
            VolumeCommand::FineVolumeDown(x) => voice.volume = (voice.volume - x as i32 * 4).max(0),
            VolumeCommand::TonePorta(x) => {
                let speed = VOLUME_COLUMN_PORTA[(x as usize).min(VOLUME_COLUMN_PORTA.len() - 1)];
                remember(&mut voice.memory.tone_porta, speed);
            }
            VolumeCommand::VibratoSpeed(x) => {
                remember(&mut voice.vibrato.speed, x);
            }
            VolumeCommand::VibratoDepth(x) => {
                remember(&mut voice.vibrato.depth, x);
            }
            _ => {}
        }
    }

    /// Volume column on the ticks after the first.
    pub(super) fn volume_tick(&mut self, ch: usize, cmd: VolumeCommand) {
        match cmd {
            VolumeCommand::VolumeSlideUp(x) => {
                let voice = self.voice(ch);
                voice.volume = (voice.volume + x as i32 * 4).min(VOLUME_MAX);
            }
            VolumeCommand::VolumeSlideDown(x) => {
                let voice = self.voice(ch);
                voice.volume = (voice.volume - x as i32 * 4).max(0);
            }
            VolumeCommand::PortaUp(x) => self.porta(ch, x as i32 * 16),
            VolumeCommand::PortaDown(x) => self.porta(ch, -(x as i32 * 16)),
            VolumeCommand::TonePorta(_) => self.tone_porta(ch),
            VolumeCommand::VibratoSpeed(_) | VolumeCommand::VibratoDepth(_) => self.vibrato(ch),
            VolumeCommand::PanSlideLeft(x) => {
                let voice = self.voice(ch);
                voice.pan = (voice.pan - x as i32 * 4).max(0);
            }
            VolumeCommand::PanSlideRight(x) => {
                let voice = self.voice(ch);
                voice.pan = (voice.pan + x as i32 * 4).min(PAN_MAX);
            }
            _ => {}
        }
    }

    fn volume_slide_row(&mut self, ch: usize, param: u8) {
        let voice = self.voice(ch);
        let (_, fine) = slide_amounts(remember(&mut voice.memory.volume_slide, param));
        voice.volume = (voice.volume + fine * 4).clamp(0, VOLUME_MAX);
    }

    fn volume_slide_tick(&mut self, ch: usize) {
        let voice = self.voice(ch);
        let (step, _) = slide_amounts(voice.memory.volume_slide);
        voice.volume = (voice.volume + step * 4).clamp(0, VOLUME_MAX);
    }

    fn slide_global_volume(&mut self, delta: i32) {
        let volume = self.play.global_volume as i32 + delta;
        self.play.global_volume = volume.clamp(0, MAX_GLOBAL_VOLUME as i32) as u32;
    }

    /// Porta parameter with memory. The old effect rules share one slot
    /// between both directions.
    fn porta_param(&mut self, ch: usize, param: u8, up: bool) -> u8 {
        let shared = self.song.dialect.old_effects;
        let memory = &mut self.voice(ch).memory;
        let slot = match (shared, up) {
            (true, _) => &mut memory.porta,
            (false, true) => &mut memory.porta_up,
            (false, false) => &mut memory.porta_down,
        };
        remember(slot, param)
    }

    /// Raise the pitch by `units` (1/768 octave with linear slides, period
    /// steps otherwise). Negative lowers it.
    pub(super) fn porta(&mut self, ch: usize, units: i32) {
        let linear = self.song.dialect.linear_slides;
        let voice = self.voice(ch);
        voice.period = if linear {
            shift_by_units(voice.period as i64, units).clamp(FREQUENCY_MIN as i64, FREQUENCY_MAX as i64) as i32
        } else {
            (voice.period - units).clamp(PERIOD_MIN, PERIOD_MAX)
        };
    }

    fn tone_porta(&mut self, ch: usize) {
        let linear = self.song.dialect.linear_slides;
        let voice = self.voice(ch);
        let speed = voice.memory.tone_porta as i32 * 4;
        let target = voice.porta_target;
        if speed == 0 || !voice.active || voice.period == target {
            return;
        }
        voice.period = match (linear, voice.period < target) {
            (true, true) => (shift_by_units(voice.period as i64, speed) as i32).min(target),
            (true, false) => (shift_by_units(voice.period as i64, -speed) as i32).max(target),
            (false, true) => (voice.period + speed).min(target),
            (false, false) => (voice.period - speed).max(target),
        };
    }

    fn pattern_loop(&mut self, ch: usize, count: u8) {
        let row = self.play.row;
        let (start, counter) = if self.song.dialect.global_pattern_loop {
            (&mut self.play.global_loop_row, &mut self.play.global_loop_count)
        } else {
            let voice = &mut self.voices.voices_mut()[ch];
            (&mut voice.pattern_loop_row, &mut voice.pattern_loop_count)
        };

        if count == 0 {
            *start = row;
            return;
        }
        let jump = if *counter == 0 {
            *counter = count;
            true
        } else {
            *counter -= 1;
            *counter > 0
        };
        if jump {
            let target = *start;
            self.play.loop_jump = Some(target);
        } else {
            *start = row + 1;
        }
    }

    fn retrigger(&mut self, ch: usize) {
        let voice = self.voice(ch);
        let (interval, change) = voice.memory.retrigger;
        if interval == 0 || !voice.active {
            return;
        }
        voice.retrigger_count += 1;
        if voice.retrigger_count >= interval {
            voice.retrigger_count = 0;
            voice.position = SamplePosition::ZERO;
            voice.increment = voice.increment.abs();
            voice.volume = retrigger_volume(voice.volume, change);
            voice.loop_cleared = false;
            voice.mix.restart();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slide_parameter_decoding() {
        assert_eq!(slide_amounts(0x40), (4, 0));
        assert_eq!(slide_amounts(0x04), (-4, 0));
        assert_eq!(slide_amounts(0xF3), (0, -3));
        assert_eq!(slide_amounts(0x3F), (0, 3));
        assert_eq!(slide_amounts(0x0F), (-15, 0));
        assert_eq!(slide_amounts(0x00), (0, 0));
    }

    #[test]
    fn retrigger_volume_table() {
        assert_eq!(retrigger_volume(128, 0), 128);
        assert_eq!(retrigger_volume(128, 1), 124);
        assert_eq!(retrigger_volume(128, 5), 64);
        assert_eq!(retrigger_volume(128, 6), 85);
        assert_eq!(retrigger_volume(128, 7), 64);
        assert_eq!(retrigger_volume(128, 13), 192);
        assert_eq!(retrigger_volume(200, 15), VOLUME_MAX);
        assert_eq!(retrigger_volume(8, 4), 0);
    }

    #[test]
    fn memory_recalls_last_parameter() {
        let mut slot = 0;
        assert_eq!(remember(&mut slot, 0), 0);
        assert_eq!(remember(&mut slot, 5), 5);
        assert_eq!(remember(&mut slot, 0), 5);
    }
}
