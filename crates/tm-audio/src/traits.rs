//! Audio output trait and error types.

use thiserror::Error;

/// Error type for audio operations.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio device available")]
    NoDevice,
    #[error("device init error: {0}")]
    DeviceInit(String),
    #[error("stream create error: {0}")]
    StreamCreate(String),
    #[error("playback error: {0}")]
    Playback(String),
}

/// Something that fills device buffers, called from the audio thread.
///
/// `out` is interleaved `f32` with `channels` samples per frame. Whatever is
/// not written must be left silent by the implementation.
pub trait AudioCallback: Send + 'static {
    fn render(&mut self, out: &mut [f32], channels: usize);
}

impl<F> AudioCallback for F
where
    F: FnMut(&mut [f32], usize) + Send + 'static,
{
    fn render(&mut self, out: &mut [f32], channels: usize) {
        self(out, channels)
    }
}

/// Device parameters, for display only.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceInfo {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per callback, when the backend reports a fixed size
    pub buffer_frames: Option<u32>,
    /// Estimated output latency
    pub latency_ms: f32,
}

/// Things the device reports asynchronously.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceEvent {
    Started,
    Stopped,
    /// The backend reported a stream error; playback may have stopped.
    StreamError(String),
}

/// Trait for audio output backends.
pub trait AudioOutput {
    fn info(&self) -> &DeviceInfo;

    fn sample_rate(&self) -> u32 {
        self.info().sample_rate
    }

    fn start(&mut self) -> Result<(), AudioError>;

    fn stop(&mut self) -> Result<(), AudioError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_callbacks() {
        let mut calls = 0;
        let mut cb = move |out: &mut [f32], channels: usize| {
            calls += 1;
            out.iter_mut().for_each(|s| *s = channels as f32 * calls as f32);
        };
        let mut buf = [0.0; 4];
        AudioCallback::render(&mut cb, &mut buf, 2);
        AudioCallback::render(&mut cb, &mut buf, 2);
        assert_eq!(buf, [4.0; 4]);
    }

    #[test]
    fn errors_display() {
        assert_eq!(AudioError::NoDevice.to_string(), "no audio device available");
        assert_eq!(
            AudioError::StreamCreate("busy".into()).to_string(),
            "stream create error: busy"
        );
    }
}
