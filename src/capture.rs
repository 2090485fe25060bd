use anyhow::{Context, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat};
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer as _, Observer as _, Producer as _, Split as _};
use std::collections::VecDeque;
use std::io::{self, Write};

use crate::audio::SampleWindows;
use crate::config::AudioSource;

pub fn list_input_devices() -> anyhow::Result<()> {
    let host = cpal::default_host();
    let devices = host.input_devices().context("enumerate input devices")?;

    let mut out = io::stdout();
    writeln!(out, "Input devices:")?;
    for dev in devices {
        let name = dev.name().unwrap_or_else(|_| "<unknown>".to_string());
        writeln!(out, "  - {}", name)?;
    }
    Ok(())
}

/// Live stereo input. The device callback pushes interleaved L/R pairs into a
/// ring buffer; the render thread drains it once per frame via [`Self::windows`].
pub struct AudioCapture {
    _stream: cpal::Stream,
    cons: ringbuf::HeapCons<f32>,
    left: VecDeque<f32>,
    right: VecDeque<f32>,
    pending: Option<f32>,
    pub sample_rate_hz: u32,
}

impl AudioCapture {
    /// Opens the requested source. `Ok(None)` for [`AudioSource::Silence`].
    pub fn open(source: AudioSource, device_query: Option<&str>) -> anyhow::Result<Option<Self>> {
        match source {
            AudioSource::Silence => Ok(None),
            AudioSource::Mic => Self::new_mic(device_query).map(Some),
        }
    }

    fn new_mic(device_query: Option<&str>) -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = select_input_device(&host, device_query)?;
        let supported = device
            .default_input_config()
            .context("get default input config")?;
        let sample_rate_hz = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let config: cpal::StreamConfig = supported.clone().into();

        let rb_capacity = (sample_rate_hz as usize).saturating_mul(2);
        let rb = HeapRb::<f32>::new(rb_capacity);
        let (mut prod, cons) = rb.split();

        let err_fn = |err| log::warn!("audio stream error: {err}");

        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _| push_stereo(data, channels, &mut prod),
                err_fn,
                None,
            )?,
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _| push_stereo(data, channels, &mut prod),
                err_fn,
                None,
            )?,
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _| push_stereo(data, channels, &mut prod),
                err_fn,
                None,
            )?,
            fmt => return Err(anyhow!("unsupported sample format: {fmt:?}")),
        };

        stream.play().context("start input stream")?;
        log::info!("capturing {channels} channel(s) at {sample_rate_hz} Hz");

        Ok(Self {
            _stream: stream,
            cons,
            left: VecDeque::new(),
            right: VecDeque::new(),
            pending: None,
            sample_rate_hz,
        })
    }

    /// Drains pending input and returns the most recent `len` frames,
    /// zero-padded at the front until enough audio has arrived.
    pub fn windows(&mut self, len: usize) -> SampleWindows {
        while let Some(s) = self.cons.try_pop() {
            match self.pending.take() {
                None => self.pending = Some(s),
                Some(l) => {
                    self.left.push_back(l);
                    self.right.push_back(s);
                }
            }
        }
        while self.left.len() > len {
            self.left.pop_front();
            self.right.pop_front();
        }
        let pad = len - self.left.len();
        let mut left = vec![0.0; pad];
        let mut right = vec![0.0; pad];
        left.extend(self.left.iter().copied());
        right.extend(self.right.iter().copied());
        SampleWindows::stereo(left, right)
    }
}

fn select_input_device(
    host: &cpal::Host,
    device_query: Option<&str>,
) -> anyhow::Result<cpal::Device> {
    let devices = host
        .input_devices()
        .context("enumerate input devices")?
        .collect::<Vec<_>>();

    let want = device_query.map(|s| s.to_lowercase());
    if let Some(want) = want.as_deref() {
        if let Some(dev) = devices.iter().find(|d| {
            d.name()
                .map(|n| n.to_lowercase().contains(want))
                .unwrap_or(false)
        }) {
            return Ok(dev.clone());
        }
        return Err(anyhow!("no input device matching: {want}"));
    }

    host.default_input_device()
        .ok_or_else(|| anyhow!("no default input device found"))
}

/// Pushes one L/R pair per input frame. Mono inputs are duplicated; extra
/// channels beyond the first two are ignored.
fn push_stereo<T: Sample<Float = f32> + Copy>(
    data: &[T],
    channels: usize,
    prod: &mut ringbuf::HeapProd<f32>,
) {
    let channels = channels.max(1);
    for frame in data.chunks(channels) {
        let l = frame.first().map(|s| (*s).to_float_sample()).unwrap_or(0.0);
        let r = frame.get(1).map(|s| (*s).to_float_sample()).unwrap_or(l);
        if prod.vacant_len() < 2 {
            return;
        }
        let _ = prod.try_push(l);
        let _ = prod.try_push(r);
    }
}
