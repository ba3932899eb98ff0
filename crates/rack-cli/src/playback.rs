//! Live monitoring through the default output device

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rack_core::{ChainOrder, ParameterState, format_time};
use rack_engine::{LiveConfig, LiveProcessor, live_engine};
use rack_offline::load_source;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Play `input` through the chain until the source ends
pub fn play(input: &Path, order: ChainOrder, params: ParameterState) -> Result<()> {
    let source = load_source(input).with_context(|| format!("Failed to load source {}", input.display()))?;

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("no output device available"))?;
    let supported = device
        .default_output_config()
        .context("failed to query output config")?;
    log::info!(
        "output device: {} ({:?}, {} ch)",
        device.name().unwrap_or_else(|_| "unknown".into()),
        supported.sample_format(),
        supported.channels()
    );

    // The engine runs at the source rate; the device is asked to follow.
    let config = cpal::StreamConfig {
        channels: supported.channels(),
        sample_rate: cpal::SampleRate(source.sample_rate()),
        buffer_size: cpal::BufferSize::Default,
    };

    let (mut chain, processor) = live_engine(
        LiveConfig::default().with_sample_rate(source.sample_rate()),
        order.clone(),
        params,
    )?;
    chain.load(source)?;

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, processor)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, processor)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, processor)?,
        format => bail!("unsupported sample format {format:?}"),
    };
    stream.play().context("failed to start output stream")?;
    chain.play()?;

    println!(
        "Playing {} ({}) through {order}",
        input.display(),
        format_time(chain.duration_seconds())
    );
    while !chain.has_ended() {
        std::thread::sleep(POLL_INTERVAL);
        let analysis = chain.analysis();
        print!(
            "\r{} / {}  {:>6.1} dB",
            format_time(chain.position_seconds()),
            format_time(chain.duration_seconds()),
            analysis.level_db
        );
        let _ = std::io::stdout().flush();
    }
    println!();
    Ok(())
}

fn build_stream<T>(device: &cpal::Device, config: &cpal::StreamConfig, mut processor: LiveProcessor) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            if scratch.len() < data.len() {
                scratch.resize(data.len(), 0.0);
            }
            let block = &mut scratch[..data.len()];
            processor.fill_interleaved(block, channels);
            for (out, &sample) in data.iter_mut().zip(block.iter()) {
                *out = T::from_sample(sample);
            }
        },
        |err| log::error!("audio stream error: {err}"),
        None,
    )?;

    Ok(stream)
}
