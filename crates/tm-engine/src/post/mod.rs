//! Everything between the voice mix and the output bytes.
//!
//! [`PostProcessor::process`] runs, in order: mix hooks, global volume,
//! fade-out, AGC and dither. [`convert`] then reduces the mix to the output
//! format.

mod agc;
pub mod convert;
mod dither;
mod hooks;

pub use agc::{Agc, AGC_UNITY};
pub use dither::Dither;
pub use hooks::{AmigaLowPass, MixHook};

use alloc::boxed::Box;
use alloc::vec::Vec;

use tm_ir::MAX_GLOBAL_VOLUME;

use crate::ramp::{VolumeRamp, RAMP_PRECISION, UNITY_VOLUME};
use crate::settings::{MixerSettings, SampleFormat};

/// Global volume 0..=128 to mix gain 0..=4096.
fn global_gain(global_volume: u32) -> i32 {
    let gv = global_volume.min(MAX_GLOBAL_VOLUME as u32) as i32;
    gv * UNITY_VOLUME / MAX_GLOBAL_VOLUME as i32
}

#[derive(Clone, Copy, Debug)]
struct Fade {
    total: u32,
    left: u32,
}

pub struct PostProcessor {
    hooks: Vec<Box<dyn MixHook>>,
    global: VolumeRamp,
    ramp_up: u32,
    ramp_down: u32,
    agc: Option<Agc>,
    dither: Dither,
    fade: Option<Fade>,
    sample_rate: u32,
    seed: u64,
}

impl PostProcessor {
    pub fn new(settings: &MixerSettings) -> Self {
        Self {
            hooks: Vec::new(),
            global: VolumeRamp::default(),
            ramp_up: settings.ramp_up_samples,
            ramp_down: settings.ramp_down_samples,
            agc: settings.agc.then(|| Agc::new(settings.sample_rate)),
            dither: Dither::new(settings.dither, settings.seed),
            fade: None,
            sample_rate: settings.sample_rate,
            seed: settings.seed,
        }
    }

    /// Back to the state at song start, with `global_volume` applied at once.
    pub fn reset(&mut self, global_volume: u32) {
        let gain = global_gain(global_volume);
        self.global.snap([gain, gain]);
        if let Some(agc) = &mut self.agc {
            agc.reset();
        }
        self.dither.reset(self.seed);
        self.fade = None;
        for hook in &mut self.hooks {
            hook.reset();
        }
    }

    /// Ramp the mix towards a new song global volume (0..=128).
    pub fn set_global_volume(&mut self, global_volume: u32) {
        let gain = global_gain(global_volume);
        self.global.set_target([gain, gain], self.ramp_up, self.ramp_down);
    }

    pub fn add_hook(&mut self, mut hook: Box<dyn MixHook>) {
        hook.init(self.sample_rate);
        self.hooks.push(hook);
    }

    /// Fade the output to silence over `frames` frames.
    pub fn start_fade(&mut self, frames: u32) {
        let frames = frames.max(1);
        self.fade = Some(Fade {
            total: frames,
            left: frames,
        });
    }

    /// Frames until a running fade reaches silence.
    pub fn fade_left(&self) -> Option<u32> {
        self.fade.map(|f| f.left)
    }

    /// A fade was started and has reached silence.
    pub fn fade_finished(&self) -> bool {
        matches!(self.fade, Some(Fade { left: 0, .. }))
    }

    pub fn process(&mut self, mix: &mut [i32], format: SampleFormat) {
        for hook in &mut self.hooks {
            hook.process(mix);
        }
        self.apply_global(mix);
        if let Some(fade) = &mut self.fade {
            apply_fade(fade, mix);
        }
        if let Some(agc) = &mut self.agc {
            agc.process(mix);
        }
        if !format.is_float() {
            self.dither.apply(mix, format.bits());
        }
    }

    fn apply_global(&mut self, mix: &mut [i32]) {
        let (mut current, step) = self.global.raw();
        let ramped = (self.global.remaining() as usize).min(mix.len() / 2);
        let (head, tail) = mix.split_at_mut(ramped * 2);
        for frame in head.chunks_exact_mut(2) {
            current[0] += step[0];
            current[1] += step[1];
            let gain = (current[0] >> RAMP_PRECISION) as i64;
            scale(frame, gain);
        }
        if ramped > 0 {
            self.global.commit(current, ramped as u32);
        }
        let gain = self.global.volume()[0] as i64;
        if gain != UNITY_VOLUME as i64 {
            for frame in tail.chunks_exact_mut(2) {
                scale(frame, gain);
            }
        }
    }
}

#[inline(always)]
fn scale(frame: &mut [i32], gain: i64) {
    for x in frame.iter_mut() {
        *x = ((*x as i64 * gain) >> 12) as i32;
    }
}

fn apply_fade(fade: &mut Fade, mix: &mut [i32]) {
    for frame in mix.chunks_exact_mut(2) {
        let gain = fade.left as i64;
        for x in frame.iter_mut() {
            *x = (*x as i64 * gain / fade.total as i64) as i32;
        }
        fade.left = fade.left.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::DitherMode;

    fn post(settings: MixerSettings, global_volume: u32) -> PostProcessor {
        let mut p = PostProcessor::new(&settings);
        p.reset(global_volume);
        p
    }

    struct Invert;

    impl MixHook for Invert {
        fn process(&mut self, mix: &mut [i32]) {
            mix.iter_mut().for_each(|x| *x = -*x);
        }
    }

    #[test]
    fn full_global_volume_is_transparent() {
        let mut p = post(MixerSettings::default(), 128);
        let mut mix = vec![12345; 64];
        p.process(&mut mix, SampleFormat::S16);
        assert!(mix.iter().all(|&x| x == 12345));
    }

    #[test]
    fn global_volume_scales_and_ramps() {
        let mut p = post(MixerSettings::default().with_ramping(16, 16), 128);
        p.set_global_volume(64);
        let mut mix = vec![1 << 16; 64 * 2];
        p.process(&mut mix, SampleFormat::F32);
        assert!(mix[0] < 1 << 16 && mix[0] > 1 << 15);
        assert_eq!(mix[16 * 2], 1 << 15);
        assert_eq!(mix[63 * 2], 1 << 15);
    }

    #[test]
    fn hooks_run_before_global_volume() {
        let mut p = post(MixerSettings::default(), 64);
        p.add_hook(Box::new(Invert));
        let mut mix = vec![1000; 4];
        p.process(&mut mix, SampleFormat::F32);
        assert_eq!(mix, [-500; 4]);
    }

    #[test]
    fn fade_reaches_silence_and_reports_it() {
        let mut p = post(MixerSettings::default(), 128);
        p.start_fade(10);
        let mut mix = vec![1 << 16; 20 * 2];
        p.process(&mut mix, SampleFormat::S16);
        assert_eq!(mix[0], 1 << 16);
        assert!(mix[5 * 2] < 1 << 16);
        assert!(mix[10 * 2..].iter().all(|&x| x == 0));
        assert!(p.fade_finished());
    }

    #[test]
    fn agc_and_dither_follow_settings() {
        let settings = MixerSettings::default().with_agc(true).with_dither(DitherMode::Rectangular);
        let mut p = post(settings, 128);
        let mut mix = vec![1 << 25; 8];
        p.process(&mut mix, SampleFormat::S16);
        assert!(mix.iter().all(|&x| x.abs() < (1 << 23) + 128));
    }

    #[test]
    fn reset_restarts_dither_sequence() {
        let mut p = post(MixerSettings::default().with_dither(DitherMode::ModPlug), 128);
        let mut a = vec![777; 32];
        p.process(&mut a, SampleFormat::S16);
        p.reset(128);
        let mut b = vec![777; 32];
        p.process(&mut b, SampleFormat::S16);
        assert_eq!(a, b);
    }
}
