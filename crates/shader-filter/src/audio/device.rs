use std::sync::Arc;

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Stream;

use super::{AudioSink, MAX_AUDIO_PLANES};

/// Live capture from the default input device, delivered as planar packets
/// to a sink on cpal's callback thread.
pub struct InputDevice {
    _stream: Stream,
    pub sample_rate: u32,
    pub channels: usize,
    pub device_name: String,
}

impl InputDevice {
    pub fn open(sink: Arc<dyn AudioSink>) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("No audio input device found"))?;

        let device_name = device
            .description()
            .map(|d| d.name().to_string())
            .unwrap_or_else(|_| "Unknown".into());
        log::info!("Audio input device: {device_name}");

        let config = device.default_input_config()?;
        let sample_rate = config.sample_rate();
        let channels = config.channels() as usize;
        log::info!("Audio config: {sample_rate}Hz, {channels}ch, {:?}", config.sample_format());

        let planes = channels.clamp(1, MAX_AUDIO_PLANES);
        let mut scratch: Vec<Vec<f32>> = vec![Vec::new(); planes];

        let stream = device.build_input_stream(
            &config.into(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let frames = data.len() / channels.max(1);
                for (ch, plane) in scratch.iter_mut().enumerate() {
                    plane.clear();
                    plane.extend(data.chunks_exact(channels.max(1)).map(|frame| frame[ch]));
                }
                let refs: Vec<&[f32]> = scratch.iter().map(Vec::as_slice).collect();
                sink.capture(&refs, frames, false);
            },
            |err| {
                log::error!("Audio stream error: {err}");
            },
            None,
        )?;

        stream.play()?;
        log::info!("Audio capture started");

        Ok(Self {
            _stream: stream,
            sample_rate,
            channels,
            device_name,
        })
    }

    pub fn list_devices() -> Vec<String> {
        let host = cpal::default_host();
        host.input_devices()
            .map(|devices| {
                devices
                    .filter_map(|d| d.description().ok().map(|desc| desc.name().to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }
}
