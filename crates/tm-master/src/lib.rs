//! Headless controller for trackmix.
//!
//! Provides a unified API for playback on the sound device and offline
//! rendering that the CLI (and any other front end) can share.

pub mod demo;
mod error;
mod wav;

use std::io::{Seek, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};
use parking_lot::{Mutex, MutexGuard};
use ringbuf::traits::Consumer;
use ringbuf::HeapCons;
use tm_audio::{AudioOutput, CpalOutput, DeviceEvent, DeviceInfo};

// Re-export common types so callers don't need tm-ir/tm-engine directly.
pub use error::MasterError;
pub use tm_engine::{MixerSettings, Player, SampleFormat};
pub use tm_ir::Song;
pub use wav::{to_wav, write_header, WavSpec, WavWriter, HEADER_LEN};

/// Bytes rendered per step when writing to a file.
const RENDER_CHUNK_BYTES: usize = 16 * 1024;

/// A player shared between editors and the audio callback.
///
/// Editors take the lock to mutate; the audio thread only ever tries the
/// lock and renders silence while an editor holds it.
#[derive(Clone)]
pub struct SharedPlayer(Arc<Mutex<Player>>);

impl SharedPlayer {
    pub fn new(player: Player) -> Self {
        Self(Arc::new(Mutex::new(player)))
    }

    pub fn lock(&self) -> MutexGuard<'_, Player> {
        self.0.lock()
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, Player>> {
        self.0.try_lock()
    }
}

/// Requests from the controller to the audio thread, polled between buffers.
#[derive(Default)]
struct Flags {
    restart: AtomicBool,
    silence: AtomicBool,
    finished: AtomicBool,
}

/// Fill one device buffer. Never blocks: a locked player or a raised
/// silence flag yields silence.
fn render_callback(player: &SharedPlayer, flags: &Flags, out: &mut [f32], channels: usize) {
    if flags.silence.load(Ordering::Acquire) {
        out.fill(0.0);
        return;
    }
    let Some(mut player) = player.try_lock() else {
        out.fill(0.0);
        return;
    };
    if flags.restart.swap(false, Ordering::AcqRel) {
        player.restart();
        flags.finished.store(false, Ordering::Release);
    }
    let frames = out.len() / channels.max(1);
    let done = player.fill_buffer(out, frames);
    out[done * channels..].fill(0.0);
    if done < frames {
        flags.finished.store(true, Ordering::Release);
    }
}

/// Headless controller: owns the shared player and the device stream.
pub struct Controller {
    player: SharedPlayer,
    flags: Arc<Flags>,
    output: Option<CpalOutput>,
    events: Option<HeapCons<DeviceEvent>>,
}

impl Controller {
    pub fn new(song: Song, settings: MixerSettings) -> Self {
        Self {
            player: SharedPlayer::new(Player::new(song, settings)),
            flags: Arc::new(Flags::default()),
            output: None,
            events: None,
        }
    }

    pub fn player(&self) -> &SharedPlayer {
        &self.player
    }

    /// Run `edit` with the player locked. The audio thread plays silence
    /// for any buffer requested meanwhile.
    pub fn with_player<R>(&self, edit: impl FnOnce(&mut Player) -> R) -> R {
        edit(&mut self.player.lock())
    }

    // --- Real-time playback ---

    /// Open the default device and start playing from the song start. The
    /// player is rebuilt for the device's rate and channel count.
    pub fn play(&mut self) -> Result<DeviceInfo, MasterError> {
        self.stop()?;

        let player = self.player.clone();
        let flags = self.flags.clone();
        let (mut output, events) = CpalOutput::open(move |out: &mut [f32], channels: usize| {
            render_callback(&player, &flags, out, channels);
        })?;

        let info = output.info().clone();
        {
            let mut player = self.player.lock();
            let settings = player
                .settings()
                .clone()
                .with_sample_rate(info.sample_rate)
                .with_channels(info.channels);
            if settings != *player.settings() {
                debug!("rebuilding player for {} Hz", info.sample_rate);
                *player = Player::new(player.song().clone(), settings);
            } else {
                player.restart();
            }
        }
        self.flags.restart.store(false, Ordering::Release);
        self.flags.finished.store(false, Ordering::Release);
        self.flags.silence.store(false, Ordering::Release);

        output.start()?;
        info!("playback started on {}", info.name);
        self.output = Some(output);
        self.events = Some(events);
        Ok(info)
    }

    pub fn stop(&mut self) -> Result<(), MasterError> {
        if let Some(mut output) = self.output.take() {
            output.stop()?;
            info!("playback stopped");
        }
        Ok(())
    }

    /// Ask the audio thread to rewind before its next buffer.
    pub fn request_restart(&self) {
        self.flags.restart.store(true, Ordering::Release);
    }

    /// Keep the stream running but output silence.
    pub fn set_silence(&self, on: bool) {
        self.flags.silence.store(on, Ordering::Release);
    }

    pub fn is_playing(&self) -> bool {
        self.output.is_some() && !self.is_finished()
    }

    /// The song ran out during real-time playback.
    pub fn is_finished(&self) -> bool {
        self.flags.finished.load(Ordering::Acquire)
    }

    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.output.as_ref().map(|o| o.info())
    }

    /// Hand every pending device event to `callback`.
    pub fn poll_events(&mut self, mut callback: impl FnMut(DeviceEvent)) {
        if let Some(events) = &mut self.events {
            while let Some(event) = events.try_pop() {
                callback(event);
            }
        }
    }

    // --- Offline rendering ---

    /// A fresh player for the current song, independent of real-time playback.
    fn offline_player(&self, settings: Option<MixerSettings>) -> Player {
        let player = self.player.lock();
        let settings = settings.unwrap_or_else(|| player.settings().clone());
        Player::new(player.song().clone(), settings)
    }

    /// Render the song to a WAV file in memory, stopping after
    /// `max_seconds`.
    pub fn render_to_wav(&self, settings: Option<MixerSettings>, max_seconds: u32) -> Vec<u8> {
        let mut player = self.offline_player(settings);
        let spec = wav_spec(player.settings());
        let data = render_bytes(&mut player, max_seconds);
        to_wav(&spec, &data)
    }

    /// Stream the song as a WAV file into `writer`. Returns the number of
    /// frames written.
    pub fn render_to_writer<W: Write + Seek>(
        &self,
        writer: W,
        settings: Option<MixerSettings>,
        max_seconds: u32,
    ) -> Result<u64, MasterError> {
        let mut player = self.offline_player(settings);
        let spec = wav_spec(player.settings());
        let limit = max_bytes(player.settings(), max_seconds);
        let mut wav = WavWriter::new(writer, spec)?;
        let mut buf = vec![0u8; RENDER_CHUNK_BYTES - RENDER_CHUNK_BYTES % spec.block_align() as usize];
        while (wav.data_len() as usize) < limit {
            let want = buf.len().min(limit - wav.data_len() as usize);
            let n = player.read(&mut buf[..want]);
            if n == 0 {
                break;
            }
            wav.write_samples(&buf[..n])?;
        }
        let frames = wav.data_len() as u64 / spec.block_align() as u64;
        wav.finish()?;
        info!("rendered {} frames", frames);
        Ok(frames)
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn wav_spec(settings: &MixerSettings) -> WavSpec {
    WavSpec {
        sample_rate: settings.sample_rate,
        channels: settings.channels,
        format: settings.sample_format,
    }
}

fn max_bytes(settings: &MixerSettings, max_seconds: u32) -> usize {
    settings.sample_rate as usize * max_seconds as usize * settings.frame_bytes()
}

fn render_bytes(player: &mut Player, max_seconds: u32) -> Vec<u8> {
    let limit = max_bytes(player.settings(), max_seconds);
    let mut data = vec![0u8; limit];
    let mut len = 0;
    while len < limit {
        let n = player.read(&mut data[len..(len + RENDER_CHUNK_BYTES).min(limit)]);
        if n == 0 {
            break;
        }
        len += n;
    }
    data.truncate(len);
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn controller() -> Controller {
        Controller::new(demo::demo_song(), MixerSettings::default())
    }

    #[test]
    fn render_to_wav_matches_song_length() {
        let c = controller();
        let wav = c.render_to_wav(None, 60);
        // 2 patterns x 32 rows x 6 ticks x 882 frames x 4 bytes
        assert_eq!(wav.len(), HEADER_LEN + 2 * 32 * 6 * 882 * 4);
        assert!(wav[HEADER_LEN..].iter().any(|&b| b != 0));
    }

    #[test]
    fn render_stops_at_the_time_limit() {
        let c = controller();
        let wav = c.render_to_wav(Some(MixerSettings::default().with_sample_rate(8000)), 1);
        assert_eq!(wav.len(), HEADER_LEN + 8000 * 4);
    }

    #[test]
    fn streamed_render_equals_in_memory_render() {
        let c = controller();
        let settings = MixerSettings::default().with_sample_format(SampleFormat::S24);
        let memory = c.render_to_wav(Some(settings.clone()), 2);
        let frames = c
            .render_to_writer(Cursor::new(Vec::new()), Some(settings.clone()), 2)
            .unwrap();
        assert_eq!(frames, 2 * 44100);
        let mut cursor = Cursor::new(Vec::new());
        c.render_to_writer(&mut cursor, Some(settings), 2).unwrap();
        assert_eq!(cursor.into_inner(), memory);
    }

    #[test]
    fn callback_renders_silence_while_locked() {
        let c = controller();
        let mut out = vec![1.0f32; 512];
        let guard = c.player().lock();
        render_callback(c.player(), &c.flags, &mut out, 2);
        drop(guard);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn callback_honours_restart_and_silence() {
        let c = controller();
        let mut first = vec![0f32; 4096];
        render_callback(c.player(), &c.flags, &mut first, 2);
        let mut second = vec![0f32; 4096];
        c.request_restart();
        render_callback(c.player(), &c.flags, &mut second, 2);
        assert_eq!(first, second);

        c.set_silence(true);
        render_callback(c.player(), &c.flags, &mut second, 2);
        assert!(second.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn callback_flags_song_end() {
        let c = controller();
        c.with_player(|p| p.fade_out(1));
        let mut out = vec![0f32; 1024];
        render_callback(c.player(), &c.flags, &mut out, 2);
        assert!(c.is_finished());
    }
}
