//! CPAL input device capture source.
//!
//! `cpal::Stream` is not `Send`, so the stream is built and kept alive on a
//! small holder thread. The encoder only ever sees the ring buffer consumer.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig as CpalStreamConfig};
use parking_lot::Mutex;
use ringbuf::traits::{Producer, Split};
use ringbuf::HeapRb;

use crate::format::f32_to_i16;
use crate::source::CaptureSource;
use crate::StreamError;

/// Lists all available input devices.
///
/// # Errors
///
/// Returns an error if the audio host cannot be accessed.
pub fn list_input_devices() -> Result<Vec<String>, StreamError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| StreamError::BackendError(e.to_string()))?;

    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Gets the name of the default input device, if any.
pub fn default_input_device_name() -> Option<String> {
    cpal::default_host()
        .default_input_device()
        .and_then(|d| d.name().ok())
}

#[derive(Debug, Clone)]
enum DeviceSelection {
    SystemDefault,
    ByName(String),
}

impl DeviceSelection {
    fn open(&self) -> Result<Device, StreamError> {
        let host = cpal::default_host();
        match self {
            Self::SystemDefault => host
                .default_input_device()
                .ok_or(StreamError::NoDefaultDevice),
            Self::ByName(name) => {
                let devices = host
                    .input_devices()
                    .map_err(|e| StreamError::BackendError(e.to_string()))?;
                for device in devices {
                    if device.name().is_ok_and(|n| n == *name) {
                        return Ok(device);
                    }
                }
                Err(StreamError::DeviceNotFound { name: name.clone() })
            }
        }
    }
}

struct HolderThread {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Captures from a CPAL input device.
///
/// Stream errors reported by the backend (device unplugged, driver reset)
/// surface from [`CaptureSource::health`] on the next cycle, which ends the
/// run and lets the worker's recovery policy reopen the device.
pub struct DeviceSource {
    selection: DeviceSelection,
    name: String,
    holder: Option<HolderThread>,
    stream_error: Arc<Mutex<Option<String>>>,
}

impl DeviceSource {
    /// Captures from the system's default input device.
    pub fn default_device() -> Self {
        Self::with_selection(DeviceSelection::SystemDefault, "default")
    }

    /// Captures from the input device with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::with_selection(DeviceSelection::ByName(name.clone()), &name)
    }

    fn with_selection(selection: DeviceSelection, name: &str) -> Self {
        Self {
            selection,
            name: format!("device:{name}"),
            holder: None,
            stream_error: Arc::new(Mutex::new(None)),
        }
    }
}

fn build_stream(
    device: &Device,
    mut producer: ringbuf::HeapProd<i16>,
    stream_error: Arc<Mutex<Option<String>>>,
) -> Result<Stream, StreamError> {
    let supported = device
        .default_input_config()
        .map_err(|e| StreamError::BackendError(e.to_string()))?;
    let sample_format = supported.sample_format();
    let config: CpalStreamConfig = supported.into();

    let on_error = move |err: cpal::StreamError| {
        tracing::error!("Audio stream error: {}", err);
        *stream_error.lock() = Some(err.to_string());
    };

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                // Never blocks; drops samples when the buffer is full
                let _ = producer.push_slice(data);
            },
            on_error,
            None,
        ),
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                for &sample in data {
                    let _ = producer.try_push(f32_to_i16(sample));
                }
            },
            on_error,
            None,
        ),
        format => {
            return Err(StreamError::configuration(format!(
                "unsupported sample format: {format:?}"
            )));
        }
    }
    .map_err(|e| StreamError::BackendError(e.to_string()))?;

    stream
        .play()
        .map_err(|e| StreamError::BackendError(e.to_string()))?;
    Ok(stream)
}

impl CaptureSource for DeviceSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn native_format(&self) -> Result<(u32, u16), StreamError> {
        let config = self
            .selection
            .open()?
            .default_input_config()
            .map_err(|e| StreamError::BackendError(e.to_string()))?;
        Ok((config.sample_rate().0, config.channels()))
    }

    fn start(&mut self, capacity: usize) -> Result<ringbuf::HeapCons<i16>, StreamError> {
        self.stop()?;
        *self.stream_error.lock() = None;

        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let selection = self.selection.clone();
        let stream_error = Arc::clone(&self.stream_error);

        let handle = thread::Builder::new()
            .name(format!("{}-capture", self.name))
            .spawn(move || {
                let (producer, consumer) = HeapRb::<i16>::new(capacity.max(1)).split();
                let stream = match selection
                    .open()
                    .and_then(|device| build_stream(&device, producer, stream_error))
                {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(consumer));
                // Returns on stop() or when the source is dropped
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(StreamError::ThreadSpawn)?;

        let consumer = ready_rx
            .recv()
            .map_err(|_| StreamError::capture("capture thread exited during setup"))??;

        tracing::info!(source = %self.name, "device capture started");
        self.holder = Some(HolderThread { stop_tx, handle });
        Ok(consumer)
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        if let Some(holder) = self.holder.take() {
            let _ = holder.stop_tx.send(());
            holder
                .handle
                .join()
                .map_err(|_| StreamError::capture("capture thread panicked"))?;
            tracing::info!(source = %self.name, "device capture stopped");
        }
        Ok(())
    }

    fn health(&mut self) -> Result<(), StreamError> {
        match self.stream_error.lock().take() {
            Some(reason) => Err(StreamError::BackendError(reason)),
            None => Ok(()),
        }
    }
}

impl Drop for DeviceSource {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
