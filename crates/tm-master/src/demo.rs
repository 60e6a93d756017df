//! A short song built in memory, so the CLI has something to play without
//! a file loader.

use std::f32::consts::TAU;

use tm_ir::{
    Effect, Envelope, Instrument, LoopKind, Note, Pattern, PlaybackDialect, Sample, SampleData,
    SampleLoop, Song, VolumeCommand,
};

const CYCLE: usize = 64;

fn sine_cycle() -> Vec<i16> {
    (0..CYCLE)
        .map(|i| ((i as f32 / CYCLE as f32 * TAU).sin() * 24000.0) as i16)
        .collect()
}

fn square_cycle() -> Vec<i8> {
    (0..CYCLE).map(|i| if i < CYCLE / 2 { 80 } else { -80 }).collect()
}

/// A decaying high buzz for the hi-hat.
fn hat() -> Vec<i8> {
    (0..2000)
        .map(|i| {
            let level = 100 - (i * 100 / 2000) as i32;
            let sign = if (i * 7919) % 13 < 6 { 1 } else { -1 };
            (sign * level) as i8
        })
        .collect()
}

fn looped(name: &str, data: SampleData, c5_speed: u32) -> Sample {
    let len = data.len() as u32;
    let mut sample = Sample::with_data(name, data);
    sample.c5_speed = c5_speed;
    sample.set_loop(Some(SampleLoop::new(0, len, LoopKind::Forward)));
    sample
}

fn instrument(name: &str, sample: u16, fadeout: u32) -> Instrument {
    let mut inst = Instrument::new(name);
    inst.set_single_sample(sample);
    inst.fadeout = fadeout;
    inst
}

fn put(p: &mut Pattern, row: u16, ch: u8, note: Note, instrument: u8, effect: Effect) {
    if let Some(cell) = p.cell_mut(row, ch) {
        cell.note = note;
        cell.instrument = instrument;
        cell.effect = effect;
    }
}

fn set_volume(p: &mut Pattern, row: u16, ch: u8, volume: u8) {
    if let Some(cell) = p.cell_mut(row, ch) {
        cell.volume = VolumeCommand::Volume(volume);
    }
}

/// Two patterns of bass, arpeggiated chords, a lead with vibrato and a
/// hi-hat, in IT dialect.
pub fn demo_song() -> Song {
    let mut song = Song::with_channels("trackmix demo", 4).with_amiga_panning();
    song.dialect = PlaybackDialect::impulse_tracker();
    song.initial_speed = 6;
    song.initial_tempo = 125;

    // One 64-frame cycle per period: c5_speed puts C-5 at about 261 Hz
    let cycle_rate = 261 * CYCLE as u32;
    song.samples.push(looped("sine", SampleData::mono16(&sine_cycle()), cycle_rate));
    song.samples.push(looped("square", SampleData::mono8(&square_cycle()), cycle_rate));
    let mut hat = Sample::with_data("hat", SampleData::mono8(&hat()));
    hat.c5_speed = 22050;
    hat.default_volume = 40;
    song.samples.push(hat);

    let mut lead = instrument("lead", 1, 512);
    let mut env = Envelope::new();
    env.add_point(0, 64);
    env.add_point(4, 48);
    env.add_point(40, 32);
    env.sustain = Some((1, 1));
    lead.volume_envelope = Some(env);
    song.instruments.push(lead);
    song.instruments.push(instrument("bass", 2, 1024));
    song.instruments.push(instrument("hat", 3, 0));

    let bass = [36, 36, 43, 41];
    for part in 0..2u16 {
        let p = song.push_pattern(32);
        for bar in 0..4u16 {
            let row = bar * 8;
            let root = bass[bar as usize];
            put(p, row, 1, Note::On(root), 2, Effect::None);
            put(p, row + 4, 1, Note::On(root + 12), 2, Effect::VolumeSlide(0x02));
            put(p, row, 2, Note::On(root + 24), 1, Effect::Arpeggio { x: 4, y: 7 });
            set_volume(p, row, 2, 24);
            for step in (0..8).step_by(2) {
                put(p, row + step, 3, Note::On(72), 3, Effect::None);
            }
        }
        let melody: [(u16, u8); 4] = if part == 0 {
            [(0, 72), (8, 76), (16, 79), (24, 77)]
        } else {
            [(0, 79), (8, 77), (16, 76), (24, 72)]
        };
        for (row, note) in melody {
            put(p, row, 0, Note::On(note), 1, Effect::None);
            put(p, row + 2, 0, Note::None, 0, Effect::Vibrato { speed: 6, depth: 4 });
            put(p, row + 6, 0, Note::Off, 0, Effect::None);
        }
    }
    song
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_ir::check_integrity;

    #[test]
    fn demo_song_is_consistent() {
        let song = demo_song();
        assert!(check_integrity(&song).is_empty(), "{:?}", check_integrity(&song));
        assert_eq!(song.order.len(), 2);
        assert_eq!(song.samples.len(), 3);
    }
}
