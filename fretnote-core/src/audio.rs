//! # Audio Capture Module
//!
//! A [`FrameSource`] backed by the default input device through CPAL.
//!
//! The stream callback downmixes to mono and pushes chunks over a channel.
//! Each tick the source drains that channel into a rolling window holding
//! the most recent `buffer_size` samples, so consecutive frames overlap the
//! way an analyser node's do when the tick rate outpaces the window length.

use std::collections::VecDeque;

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{Receiver, Sender};
use log::{info, warn};

use crate::fft::SpectrumAnalyzer;
use crate::source::{AudioFrame, FrameSource, SessionInfo};

/// Samples per analysis window.
pub const BUFFER_SIZE: usize = 4096;

/// Sample rate requested from the device.
pub const TARGET_SAMPLE_RATE: u32 = 44100;

/// Chunks buffered between the audio callback and the tick loop.
const CHANNEL_CAPACITY: usize = 64;

struct Capture {
    stream: cpal::Stream,
    receiver: Receiver<Vec<f32>>,
    sample_rate: u32,
}

/// Microphone input for the detector.
pub struct MicrophoneSource {
    buffer_size: usize,
    capture: Option<Capture>,
    window: VecDeque<f32>,
    analyzer: SpectrumAnalyzer,
}

impl MicrophoneSource {
    pub fn new() -> Self {
        Self::with_buffer_size(BUFFER_SIZE)
    }

    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            capture: None,
            window: VecDeque::with_capacity(buffer_size),
            analyzer: SpectrumAnalyzer::new(buffer_size),
        }
    }
}

impl Default for MicrophoneSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for MicrophoneSource {
    fn open(&mut self) -> Result<SessionInfo> {
        if self.capture.is_some() {
            return Err(anyhow!("Microphone is already open"));
        }
        let (sender, receiver) = crossbeam_channel::bounded(CHANNEL_CAPACITY);
        let (stream, sample_rate) = start_audio_capture(sender)?;
        self.window.clear();
        self.capture = Some(Capture {
            stream,
            receiver,
            sample_rate,
        });
        Ok(SessionInfo {
            sample_rate,
            buffer_size: self.buffer_size,
        })
    }

    fn next_frame(&mut self) -> Option<AudioFrame> {
        let capture = self.capture.as_ref()?;
        for chunk in capture.receiver.try_iter() {
            self.window.extend(chunk);
        }
        let excess = self.window.len().saturating_sub(self.buffer_size);
        self.window.drain(..excess);

        if self.window.len() < self.buffer_size {
            return None;
        }
        let samples: Vec<f32> = self.window.iter().copied().collect();
        let magnitudes = self.analyzer.normalized_magnitudes(&samples);
        Some(AudioFrame::new(samples, magnitudes, capture.sample_rate))
    }

    fn close(&mut self) {
        if let Some(capture) = self.capture.take() {
            if let Err(e) = capture.stream.pause() {
                warn!("[AUDIO] Error pausing stream: {}", e);
            }
            drop(capture.stream);
            info!("[AUDIO] Microphone closed");
        }
        self.window.clear();
    }
}

/// Starts audio capture from the default input device.
///
/// # Returns
/// * `Ok((stream, sample_rate))` - playing stream and its sample rate
/// * `Err(e)` - no device, no f32 format, or the stream failed to start
fn start_audio_capture(sender: Sender<Vec<f32>>) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    info!("[AUDIO] Using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let rate = TARGET_SAMPLE_RATE
        .clamp(supported_config.min_sample_rate().0, supported_config.max_sample_rate().0);
    let config = supported_config.with_sample_rate(cpal::SampleRate(rate));

    let sample_rate_val = config.sample_rate().0;
    let channels = config.channels().max(1) as usize;
    let config: cpal::StreamConfig = config.into();

    info!(
        "[AUDIO] Selected sample rate: {} Hz, {} channel(s)",
        sample_rate_val, channels
    );

    let err_fn = |err| warn!("[AUDIO] An error occurred on the audio stream: {}", err);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            // Send the chunk, ignoring errors if the channel is full.
            let _ = sender.try_send(downmix(data, channels));
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, sample_rate_val))
}

/// Averages interleaved channels into a mono signal.
fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Picks the f32 input configuration whose rate range lies closest to
/// `target_rate`, preferring fewer channels on ties.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min = c.min_sample_rate().0;
            let max = c.max_sample_rate().0;
            let distance = if target_rate < min {
                min - target_rate
            } else {
                target_rate.saturating_sub(max)
            };
            (distance, c.channels())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_interleaved_channels() {
        assert_eq!(downmix(&[0.25, 0.75, -1.0, 1.0], 2), vec![0.5, 0.0]);
        assert_eq!(downmix(&[0.5, -0.5], 1), vec![0.5, -0.5]);
    }

    #[test]
    fn closed_source_yields_no_frames() {
        let mut source = MicrophoneSource::with_buffer_size(1024);
        assert!(source.next_frame().is_none());
        source.close();
        source.close();
        assert!(source.next_frame().is_none());
    }
}
