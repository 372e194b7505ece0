//! WAV recording example.
//!
//! Records five seconds of a synthetic tone to a WAV file. With the
//! `device` feature, records from the default input device instead.
//!
//! Run with: cargo run --example record_wav [--features device]

use std::time::Duration;
use stream_channel::{FormatPreset, Stream, StreamBuilder, StreamEvent};

#[cfg(feature = "device")]
fn with_source(builder: StreamBuilder) -> StreamBuilder {
    builder.capture_from(stream_channel::DeviceSource::default_device())
}

#[cfg(not(feature = "device"))]
fn with_source(builder: StreamBuilder) -> StreamBuilder {
    let mut source = stream_channel::MockSource::broadcast();
    source.generate_sine(440.0, 6_000);
    builder.capture_from(source)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt::init();

    println!("Recording to recording.wav for 5 seconds...");

    let stream = with_source(Stream::builder().name("recorder"))
        .format(FormatPreset::Transcription) // 16kHz mono
        .wav_file("recording.wav")
        .retry(Duration::from_secs(1), 3)
        .on_event(|event| match event {
            StreamEvent::PipelineError { .. } if event.is_fatal() => {
                tracing::error!(?event, "recording failed");
            }
            other => tracing::info!(event = ?other, "stream event"),
        })
        .build()?;

    stream.start()?;
    std::thread::sleep(Duration::from_secs(5));

    // Stop and finalize the WAV file
    stream.stop()?;

    println!("Recording saved to recording.wav");
    println!("Stats: {:?}", stream.stats());

    Ok(())
}
