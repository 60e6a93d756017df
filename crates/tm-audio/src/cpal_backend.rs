//! CPAL-based audio output backend.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, Stream, StreamConfig, SupportedBufferSize};
use log::{error, info};
use ringbuf::traits::{Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::traits::{AudioCallback, AudioError, AudioOutput, DeviceEvent, DeviceInfo};

/// Capacity of the device event queue.
const EVENT_QUEUE_LEN: usize = 64;

/// Output channels the callback is asked to fill.
const OUTPUT_CHANNELS: u16 = 2;

/// CPAL-based audio output. The callback pulls audio directly on the device
/// thread; nothing is buffered in between.
pub struct CpalOutput {
    stream: Stream,
    info: DeviceInfo,
    running: Arc<AtomicBool>,
    events: Arc<Mutex<HeapProd<DeviceEvent>>>,
}

impl CpalOutput {
    /// Open the default output device and build a paused stream that calls
    /// `callback` for every buffer. Device events are delivered through the
    /// returned queue.
    pub fn open(
        callback: impl AudioCallback,
    ) -> Result<(Self, HeapCons<DeviceEvent>), AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;
        let buffer_frames = match supported.buffer_size() {
            SupportedBufferSize::Range { min, max } if min == max => Some(*min),
            _ => None,
        };

        let mut config: StreamConfig = supported.into();
        // The callback renders interleaved stereo
        config.channels = OUTPUT_CHANNELS;
        config.buffer_size = BufferSize::Default;

        let info = device_info(&device, &config, buffer_frames);
        info!(
            "audio device {}: {} Hz, {} channels",
            info.name, info.sample_rate, info.channels
        );

        let (producer, consumer) = HeapRb::<DeviceEvent>::new(EVENT_QUEUE_LEN).split();
        let events = Arc::new(Mutex::new(producer));
        let running = Arc::new(AtomicBool::new(false));
        let stream = build_stream(&device, &config, callback, running.clone(), events.clone())?;

        Ok((
            Self {
                stream,
                info,
                running,
                events,
            },
            consumer,
        ))
    }

    fn push_event(&self, event: DeviceEvent) {
        let _ = self.events.lock().try_push(event);
    }
}

fn device_info(device: &Device, config: &StreamConfig, buffer_frames: Option<u32>) -> DeviceInfo {
    let sample_rate = config.sample_rate.0;
    let latency_ms = buffer_frames.map_or(0.0, |frames| frames as f32 * 1000.0 / sample_rate as f32);
    DeviceInfo {
        name: device.name().unwrap_or_else(|_| "unknown".to_string()),
        sample_rate,
        channels: config.channels,
        buffer_frames,
        latency_ms,
    }
}

fn build_stream(
    device: &Device,
    config: &StreamConfig,
    mut callback: impl AudioCallback,
    running: Arc<AtomicBool>,
    events: Arc<Mutex<HeapProd<DeviceEvent>>>,
) -> Result<Stream, AudioError> {
    let channels = config.channels as usize;
    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if !running.load(Ordering::Relaxed) {
                    data.fill(0.0);
                    return;
                }
                callback.render(data, channels);
            },
            move |err| {
                error!("audio stream error: {}", err);
                let _ = events.lock().try_push(DeviceEvent::StreamError(err.to_string()));
            },
            None,
        )
        .map_err(|e| AudioError::StreamCreate(e.to_string()))
}

impl AudioOutput for CpalOutput {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        self.stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        self.push_event(DeviceEvent::Started);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        self.stream.pause().map_err(|e| AudioError::Playback(e.to_string()))?;
        self.push_event(DeviceEvent::Stopped);
        Ok(())
    }
}
