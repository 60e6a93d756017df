//! Sample data types.
//!
//! PCM is stored with `LOOKAHEAD` frames of silence on both sides, and every
//! loop keeps small precomputed windows of the data as it sounds when playback
//! crosses a loop boundary. Together they let an interpolator read a few
//! frames either side of any reachable position without bounds checks.

use alloc::vec;
use alloc::vec::Vec;
use arrayvec::ArrayString;

/// Frames of zero padding before and after the PCM data. Also the half-width
/// of a loop lookahead window.
pub const LOOKAHEAD: usize = 16;

/// Length of a lookahead window: `LOOKAHEAD` frames before and after a loop
/// boundary.
pub const WINDOW_LEN: usize = LOOKAHEAD * 2;

/// A single PCM frame as stored in a sample.
///
/// Values are widened into the 16-bit domain (8-bit data is shifted up).
pub trait PcmFrame: Copy + Default + Send + Sync + 'static {
    /// 1 for mono, 2 for interleaved stereo.
    const CHANNELS: usize;

    /// Left (or only) channel in the 16-bit domain.
    fn left(self) -> i32;

    /// Right channel in the 16-bit domain; the left channel for mono.
    fn right(self) -> i32;
}

impl PcmFrame for i8 {
    const CHANNELS: usize = 1;

    #[inline(always)]
    fn left(self) -> i32 {
        (self as i32) << 8
    }

    #[inline(always)]
    fn right(self) -> i32 {
        (self as i32) << 8
    }
}

impl PcmFrame for i16 {
    const CHANNELS: usize = 1;

    #[inline(always)]
    fn left(self) -> i32 {
        self as i32
    }

    #[inline(always)]
    fn right(self) -> i32 {
        self as i32
    }
}

impl PcmFrame for [i8; 2] {
    const CHANNELS: usize = 2;

    #[inline(always)]
    fn left(self) -> i32 {
        (self[0] as i32) << 8
    }

    #[inline(always)]
    fn right(self) -> i32 {
        (self[1] as i32) << 8
    }
}

impl PcmFrame for [i16; 2] {
    const CHANNELS: usize = 2;

    #[inline(always)]
    fn left(self) -> i32 {
        self[0] as i32
    }

    #[inline(always)]
    fn right(self) -> i32 {
        self[1] as i32
    }
}

/// How a loop repeats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopKind {
    /// Jump back to the loop start.
    #[default]
    Forward,
    /// Reverse direction at each boundary.
    PingPong,
}

/// A loop region `[start, end)` in frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SampleLoop {
    pub start: u32,
    pub end: u32,
    pub kind: LoopKind,
}

impl SampleLoop {
    pub const fn new(start: u32, end: u32, kind: LoopKind) -> Self {
        Self { start, end, kind }
    }

    /// Loop length in frames.
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// A loop with `start >= end` never loops.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Which of the sample's loops a window belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopSlot {
    Normal,
    Sustain,
}

/// Precomputed boundary windows for one loop.
///
/// `end` covers virtual positions `[loop.end - LOOKAHEAD, loop.end + LOOKAHEAD)`;
/// `start` (ping-pong only) covers `[loop.start - LOOKAHEAD, loop.start + LOOKAHEAD)`.
#[derive(Clone, Debug)]
pub struct LoopWindows<T> {
    pub end: [T; WINDOW_LEN],
    pub start: Option<[T; WINDOW_LEN]>,
}

/// PCM storage for one sample format.
#[derive(Clone, Debug)]
pub struct PcmBuffer<T: PcmFrame> {
    padded: Vec<T>,
    len: usize,
    normal_windows: Option<LoopWindows<T>>,
    sustain_windows: Option<LoopWindows<T>>,
}

impl<T: PcmFrame> PcmBuffer<T> {
    /// Build a buffer from raw frames, adding the silence padding.
    pub fn new(frames: &[T]) -> Self {
        let mut padded = vec![T::default(); frames.len() + LOOKAHEAD * 2];
        padded[LOOKAHEAD..LOOKAHEAD + frames.len()].copy_from_slice(frames);
        Self {
            padded,
            len: frames.len(),
            normal_windows: None,
            sustain_windows: None,
        }
    }

    /// Number of frames, excluding padding.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The data including padding; frame `i` lives at index `i + LOOKAHEAD`.
    pub fn padded(&self) -> &[T] {
        &self.padded
    }

    /// The data without padding.
    pub fn frames(&self) -> &[T] {
        &self.padded[LOOKAHEAD..LOOKAHEAD + self.len]
    }

    /// Frame at virtual index `i`, zero outside the data.
    pub fn frame_at(&self, i: i64) -> T {
        if i < 0 || i as usize >= self.len {
            T::default()
        } else {
            self.padded[i as usize + LOOKAHEAD]
        }
    }

    /// Windows for a loop slot, if that loop exists.
    pub fn windows(&self, slot: LoopSlot) -> Option<&LoopWindows<T>> {
        match slot {
            LoopSlot::Normal => self.normal_windows.as_ref(),
            LoopSlot::Sustain => self.sustain_windows.as_ref(),
        }
    }

    fn rebuild_windows(&mut self, normal: Option<SampleLoop>, sustain: Option<SampleLoop>) {
        self.normal_windows = normal.map(|l| self.build_windows(l));
        self.sustain_windows = sustain.map(|l| self.build_windows(l));
    }

    fn build_windows(&self, lp: SampleLoop) -> LoopWindows<T> {
        let (s, e) = (lp.start as i64, lp.end as i64);
        let w = LOOKAHEAD as i64;
        let mut end = [T::default(); WINDOW_LEN];
        for (k, slot) in end.iter_mut().enumerate() {
            let v = e - w + k as i64;
            let idx = if v < e {
                v
            } else {
                match lp.kind {
                    LoopKind::Forward => s + (v - e) % (e - s),
                    LoopKind::PingPong => mirror_index(v, s, e),
                }
            };
            *slot = self.frame_at(idx);
        }

        let start = (lp.kind == LoopKind::PingPong).then(|| {
            let mut start = [T::default(); WINDOW_LEN];
            for (k, slot) in start.iter_mut().enumerate() {
                let v = s - w + k as i64;
                *slot = self.frame_at(mirror_index(v, s, e));
            }
            start
        });

        LoopWindows { end, start }
    }
}

/// Fold a virtual index into `[s, e)` as a ping-pong loop plays it, mirroring
/// around `s - 0.5` and `e - 0.5`.
fn mirror_index(v: i64, s: i64, e: i64) -> i64 {
    let len = e - s;
    let off = (v - s).rem_euclid(2 * len);
    if off < len {
        s + off
    } else {
        s + 2 * len - 1 - off
    }
}

/// Sample audio data in one of the four supported formats.
#[derive(Clone, Debug)]
pub enum SampleData {
    Mono8(PcmBuffer<i8>),
    Mono16(PcmBuffer<i16>),
    Stereo8(PcmBuffer<[i8; 2]>),
    Stereo16(PcmBuffer<[i16; 2]>),
}

impl Default for SampleData {
    fn default() -> Self {
        SampleData::Mono16(PcmBuffer::new(&[]))
    }
}

impl SampleData {
    pub fn mono8(frames: &[i8]) -> Self {
        SampleData::Mono8(PcmBuffer::new(frames))
    }

    pub fn mono16(frames: &[i16]) -> Self {
        SampleData::Mono16(PcmBuffer::new(frames))
    }

    pub fn stereo8(frames: &[[i8; 2]]) -> Self {
        SampleData::Stereo8(PcmBuffer::new(frames))
    }

    pub fn stereo16(frames: &[[i16; 2]]) -> Self {
        SampleData::Stereo16(PcmBuffer::new(frames))
    }

    /// Number of sample frames.
    pub fn len(&self) -> usize {
        match self {
            SampleData::Mono8(b) => b.len(),
            SampleData::Mono16(b) => b.len(),
            SampleData::Stereo8(b) => b.len(),
            SampleData::Stereo16(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of channels in the sample data.
    pub fn num_channels(&self) -> u16 {
        match self {
            SampleData::Mono8(_) | SampleData::Mono16(_) => 1,
            SampleData::Stereo8(_) | SampleData::Stereo16(_) => 2,
        }
    }

    fn rebuild_windows(&mut self, normal: Option<SampleLoop>, sustain: Option<SampleLoop>) {
        match self {
            SampleData::Mono8(b) => b.rebuild_windows(normal, sustain),
            SampleData::Mono16(b) => b.rebuild_windows(normal, sustain),
            SampleData::Stereo8(b) => b.rebuild_windows(normal, sustain),
            SampleData::Stereo16(b) => b.rebuild_windows(normal, sustain),
        }
    }
}

/// Auto-vibrato waveform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VibratoWave {
    #[default]
    Sine,
    RampDown,
    Square,
    Random,
}

/// Auto-vibrato settings for a sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AutoVibrato {
    /// Phase advance per tick (0-255, 256 = full cycle)
    pub rate: u8,
    /// Depth in 1/64 semitone
    pub depth: u8,
    /// Ticks (FT2) or depth increment (IT) for the depth to build up
    pub sweep: u8,
    pub waveform: VibratoWave,
}

/// A sample definition.
#[derive(Clone, Debug)]
pub struct Sample {
    pub name: ArrayString<32>,
    data: SampleData,
    normal_loop: Option<SampleLoop>,
    sustain_loop: Option<SampleLoop>,
    /// Playback frequency of C-5 in Hz
    pub c5_speed: u32,
    /// Default volume (0-64)
    pub default_volume: u8,
    /// Sample global volume (0-64)
    pub global_volume: u8,
    /// Default panning (0-256), applied when set
    pub default_pan: Option<u16>,
    pub vibrato: Option<AutoVibrato>,
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            name: ArrayString::new(),
            data: SampleData::default(),
            normal_loop: None,
            sustain_loop: None,
            c5_speed: 8363,
            default_volume: 64,
            global_volume: 64,
            default_pan: None,
            vibrato: None,
        }
    }
}

impl Sample {
    /// Create a new empty sample.
    pub fn new(name: &str) -> Self {
        let mut sample = Self::default();
        let _ = sample.name.try_push_str(name);
        sample
    }

    /// Create a sample around existing PCM data.
    pub fn with_data(name: &str, data: SampleData) -> Self {
        let mut sample = Self::new(name);
        sample.data = data;
        sample
    }

    pub fn data(&self) -> &SampleData {
        &self.data
    }

    /// Replace the PCM data. Loops are clamped to the new length.
    pub fn set_data(&mut self, data: SampleData) {
        self.data = data;
        let (normal, sustain) = (self.normal_loop, self.sustain_loop);
        self.set_loops(normal, sustain);
    }

    /// Get the length of the sample in frames.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the sample has no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn normal_loop(&self) -> Option<SampleLoop> {
        self.normal_loop
    }

    pub fn sustain_loop(&self) -> Option<SampleLoop> {
        self.sustain_loop
    }

    pub fn loop_for(&self, slot: LoopSlot) -> Option<SampleLoop> {
        match slot {
            LoopSlot::Normal => self.normal_loop,
            LoopSlot::Sustain => self.sustain_loop,
        }
    }

    /// Set the normal loop. Empty loops are dropped.
    pub fn set_loop(&mut self, lp: Option<SampleLoop>) {
        self.set_loops(lp, self.sustain_loop);
    }

    /// Set the sustain loop. Empty loops are dropped.
    pub fn set_sustain_loop(&mut self, lp: Option<SampleLoop>) {
        self.set_loops(self.normal_loop, lp);
    }

    /// Set both loops and rebuild the lookahead windows.
    ///
    /// Loop ends past the data are clamped; loops that end up empty are
    /// removed.
    pub fn set_loops(&mut self, normal: Option<SampleLoop>, sustain: Option<SampleLoop>) {
        let len = self.data.len() as u32;
        let fit = |lp: Option<SampleLoop>| {
            lp.map(|l| SampleLoop::new(l.start.min(len), l.end.min(len), l.kind))
                .filter(|l| !l.is_empty())
        };
        self.normal_loop = fit(normal);
        self.sustain_loop = fit(sustain);
        self.data.rebuild_windows(self.normal_loop, self.sustain_loop);
    }

    /// Returns true if the sample has a normal loop.
    pub fn has_loop(&self) -> bool {
        self.normal_loop.is_some()
    }
}
