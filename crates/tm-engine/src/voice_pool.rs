//! VoicePool: fixed set of voices and the per-tick mixing budget.
//!
//! Slots `0..channels` belong to the pattern channels; the rest hold
//! background voices left behind by new note actions.

use alloc::vec::Vec;
use core::cmp::Reverse;

use heapless::Vec as FixedVec;
use tm_ir::Song;

use crate::channel::ChannelState;

/// Maximum number of simultaneous voices, pattern channels included.
pub const MAX_VOICES: usize = 256;

/// Identifier for a voice slot in the pool.
pub type VoiceId = usize;

/// Voices selected for mixing this tick, in slot order.
pub type MixList = FixedVec<u16, MAX_VOICES>;

pub struct VoicePool {
    voices: Vec<ChannelState>,
    channels: usize,
    mix_list: MixList,
}

impl VoicePool {
    pub fn new(song: &Song) -> Self {
        let mut pool = Self {
            voices: (0..MAX_VOICES).map(|_| ChannelState::new()).collect(),
            channels: 0,
            mix_list: MixList::new(),
        };
        pool.reset(song);
        pool
    }

    /// Silence everything and reload the channel settings from `song`.
    pub fn reset(&mut self, song: &Song) {
        self.channels = song.channels.len().min(MAX_VOICES);
        for (i, voice) in self.voices.iter_mut().enumerate() {
            *voice = match song.channels.get(i) {
                Some(s) => ChannelState::with_settings(s.initial_pan, s.initial_volume, s.surround, s.muted),
                None => ChannelState::new(),
            };
            voice.master_channel = i;
        }
        self.mix_list.clear();
    }

    /// Number of pattern channels.
    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn get(&self, id: VoiceId) -> Option<&ChannelState> {
        self.voices.get(id)
    }

    pub fn get_mut(&mut self, id: VoiceId) -> Option<&mut ChannelState> {
        self.voices.get_mut(id)
    }

    pub fn voices(&self) -> &[ChannelState] {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut [ChannelState] {
        &mut self.voices
    }

    /// Background voices currently owned by pattern channel `master`.
    pub fn background_of(&self, master: usize) -> impl Iterator<Item = VoiceId> + '_ {
        self.voices
            .iter()
            .enumerate()
            .skip(self.channels)
            .filter(move |(_, v)| v.active && v.master_channel == master)
            .map(|(i, _)| i)
    }

    /// Find a slot for a background voice, stealing the quietest one when
    /// all are busy.
    pub fn allocate_background(&mut self) -> Option<VoiceId> {
        let background = self.voices.iter().enumerate().skip(self.channels);
        if let Some((id, _)) = background.clone().find(|(_, v)| v.is_free()) {
            return Some(id);
        }
        let (id, _) = background.min_by_key(|(i, v)| (v.loudness(), Reverse(*i)))?;
        let voice = &mut self.voices[id];
        voice.stop();
        voice.mix.tail = [0, 0];
        Some(id)
    }

    /// Copy the state of `from` into background slot `to`.
    pub fn clone_into_background(&mut self, from: VoiceId, to: VoiceId) {
        if from == to || from >= self.voices.len() || to >= self.voices.len() {
            return;
        }
        let mut voice = self.voices[from].clone();
        voice.is_background = true;
        voice.master_channel = from;
        self.voices[to] = voice;
    }

    /// Pick the voices mixed this tick: the `max` loudest active voices.
    /// Background voices that don't make the cut are freed.
    pub fn rank(&mut self, max: usize) {
        self.mix_list.clear();
        for (i, voice) in self.voices.iter().enumerate() {
            if voice.active {
                // Capacity equals the slot count
                let _ = self.mix_list.push(i as u16);
            }
        }
        if self.mix_list.len() <= max {
            return;
        }

        let voices = &self.voices;
        self.mix_list
            .sort_unstable_by_key(|&i| (Reverse(voices[i as usize].loudness()), i));
        for &dropped in &self.mix_list[max..] {
            let voice = &mut self.voices[dropped as usize];
            if voice.is_background {
                voice.stop();
                voice.mix.tail = [0, 0];
            }
        }
        self.mix_list.truncate(max);
        self.mix_list.sort_unstable();
    }

    pub fn mix_list(&self) -> &[u16] {
        &self.mix_list
    }

    /// Voice `id` made this tick's mixing budget.
    pub fn is_mixed(&self, id: VoiceId) -> bool {
        self.mix_list.binary_search(&(id as u16)).is_ok()
    }
}
