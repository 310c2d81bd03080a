//! CPAL input device discovery and capture stream creation.
//!
//! This module provides [`CpalInput`] for opening hardware input as a
//! [`CaptureNode`].
//!
//! # Example: Monitor the Default Input
//!
//! ```no_run
//! use polyphon::{CpalInput, Graph, GraphConfig, NodeRegistry};
//! use polyphon::nodes::CaptureConfig;
//!
//! let input = CpalInput::default_input().unwrap();
//! let mut graph = Graph::new(GraphConfig::new(input.sample_rate()), &NodeRegistry::standard());
//! let mic = graph.add(input.open(CaptureConfig::default()).unwrap());
//! ```

use std::sync::mpsc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SupportedStreamConfig};
use tracing::{error, info};

use crate::nodes::{CaptureConfig, CaptureError, CaptureFeed, CaptureNode, StreamGuard};
use crate::queue::ChunkQueue;

/// A discovered audio input device.
pub struct CpalInput {
    device: cpal::Device,
    config: SupportedStreamConfig,

    name: String,
    sample_rate: u32,
    channels: u16,
}

impl CpalInput {
    /// Get the system's default input device.
    pub fn default_input() -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;
        Self::from_device(device)
    }

    /// List all available audio input devices.
    ///
    /// Returns an empty list if no devices are found or if enumeration fails.
    pub fn list_inputs() -> Vec<Self> {
        let host = cpal::default_host();
        host.input_devices()
            .map(|devices| devices.filter_map(|device| Self::from_device(device).ok()).collect())
            .unwrap_or_default()
    }

    fn from_device(device: cpal::Device) -> Result<Self, CaptureError> {
        let config = device
            .default_input_config()
            .map_err(|e| CaptureError::Config(e.to_string()))?;
        let name = device.name().unwrap_or_else(|_| "Unknown".into());

        Ok(Self {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            name,
            device,
            config,
        })
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the device's sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the number of input channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Open the input stream and return a node reading from it.
    ///
    /// The stream lives on its own thread, since it isn't `Send` on every
    /// host. Build and start failures are reported here rather than on the
    /// stream thread. Dropping the node stops the stream.
    pub fn open(&self, config: CaptureConfig) -> Result<CaptureNode, CaptureError> {
        let (producer, consumer) = ChunkQueue::new(config.queue_chunks);
        let feed = CaptureFeed::new(producer, self.channels as usize);

        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), CaptureError>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let device = self.device.clone();
        let sample_format = self.config.sample_format();
        let stream_config = self.config.config();

        let thread = std::thread::Builder::new()
            .name("polyphon-capture".into())
            .spawn(move || {
                let stream = match build_stream(&device, sample_format, &stream_config, feed) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(CaptureError::Play(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Stream lives until the guard signals or is dropped
                let _ = shutdown_rx.recv();
                drop(stream);
            })
            .map_err(|e| CaptureError::Thread(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(CaptureError::ThreadExited);
            }
        }

        info!(
            device = %self.name,
            rate = self.sample_rate,
            channels = self.channels,
            "capture stream opened"
        );
        Ok(CaptureNode::new(consumer, StreamGuard::new(shutdown_tx, thread), config))
    }
}

fn build_stream(
    device: &cpal::Device,
    sample_format: SampleFormat,
    stream_config: &cpal::StreamConfig,
    mut feed: CaptureFeed,
) -> Result<cpal::Stream, CaptureError> {
    let on_error = |err: cpal::StreamError| error!(%err, "capture stream error");

    let stream = match sample_format {
        SampleFormat::F32 => {
            device.build_input_stream(stream_config, move |data: &[f32], _| feed.write(data), on_error, None)
        }
        SampleFormat::I16 => {
            device.build_input_stream(stream_config, move |data: &[i16], _| feed.write_i16(data), on_error, None)
        }
        SampleFormat::U16 => {
            device.build_input_stream(stream_config, move |data: &[u16], _| feed.write_u16(data), on_error, None)
        }
        other => return Err(CaptureError::UnsupportedFormat(format!("{other:?}"))),
    };

    stream.map_err(|e| CaptureError::Build(e.to_string()))
}
