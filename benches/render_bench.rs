//! Render path benchmarks
//!
//! Measures the per-block cost of mixing voice + background through gain
//! automation, and the offline mixdown of a full track.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use manifest_mixer::audio::{GainStage, MediaElement, MemoryLoader, OutputContext, PcmBuffer};
use manifest_mixer::mixdown::{mix, MixdownSettings};

const SAMPLE_RATE: u32 = 48000;

fn tone(seconds: f64, channels: u16) -> PcmBuffer {
    let frames = (seconds * SAMPLE_RATE as f64) as usize;
    let mut samples = Vec::with_capacity(frames * channels as usize);
    for i in 0..frames {
        let v = (i as f32 * 0.05).sin() * 0.5;
        for _ in 0..channels {
            samples.push(v);
        }
    }
    PcmBuffer::new(samples, channels, SAMPLE_RATE)
}

fn bench_context_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("context_render");

    let loader = MemoryLoader::new();
    loader.insert("voice", tone(30.0, 1));
    loader.insert("background", tone(10.0, 2));

    for block in [128usize, 256, 1024] {
        let context = OutputContext::headless(SAMPLE_RATE, 2);
        let voice = MediaElement::new("voice");
        let background = MediaElement::new("background");
        voice.load(Some("voice"), &loader).unwrap();
        background.load(Some("background"), &loader).unwrap();
        background.set_looping(true);
        voice.set_looping(true);

        let voice_gain = GainStage::new(1.0);
        let background_gain = GainStage::new(0.0);
        background_gain.ramp_to(0.08, 0.0, 1.0);
        context.connect(voice.clone(), voice_gain).unwrap();
        context.connect(background.clone(), background_gain).unwrap();
        context.resume().unwrap();
        voice.play().unwrap();
        background.play().unwrap();

        let mut out = vec![0.0f32; block * 2];
        group.bench_function(BenchmarkId::from_parameter(block), |b| {
            b.iter(|| {
                context.render(black_box(&mut out));
            });
        });
    }

    group.finish();
}

fn bench_mixdown(c: &mut Criterion) {
    let voice = tone(60.0, 2);
    let background = tone(7.0, 2);
    let settings = MixdownSettings {
        voice_volume: 90,
        background_volume: 20,
    };

    c.bench_function("mixdown_60s", |b| {
        b.iter(|| black_box(mix(&voice, Some(&background), settings)));
    });
}

criterion_group!(benches, bench_context_render, bench_mixdown);
criterion_main!(benches);
