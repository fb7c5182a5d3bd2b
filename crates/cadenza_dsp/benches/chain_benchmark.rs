//! Performance benchmarks for the DSP module
//!
//! Run with: cargo bench -p cadenza_dsp

use cadenza_dsp::{
    AudioBuffer, Delay, Filter, FilterType, Limiter, ProcessingChain, Reverb, WaveShaper,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

const SAMPLE_RATE: f32 = 48000.0;

fn test_signal(size: usize) -> AudioBuffer {
    let mut buffer = AudioBuffer::new(2, size).expect("valid buffer");
    for c in 0..2 {
        for (i, s) in buffer.channel_mut(c).iter_mut().enumerate() {
            *s = (i as f32 * 0.001 * (c + 1) as f32).sin();
        }
    }
    buffer
}

fn build_chain() -> ProcessingChain {
    let mut chain = ProcessingChain::new();
    chain.add(Filter::new(FilterType::LowPass, 6000.0, SAMPLE_RATE).expect("valid filter"));
    chain.add(WaveShaper::new(0.3, 0.9));
    chain.add(Delay::new(250.0, 1000.0, 0.3, 0.4, 2, SAMPLE_RATE));
    chain.add(Reverb::new(0.6, 0.5, 0.3, 0.5));
    chain.add(Limiter::new(SAMPLE_RATE));
    chain
}

fn benchmark_chain_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("processing_chain");

    // Common buffer sizes in audio applications
    let buffer_sizes = [64, 128, 256, 512, 1024, 2048];

    for size in buffer_sizes {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("stereo_{}_frames", size), |b| {
            let mut chain = build_chain();
            let source = test_signal(size);
            let mut buffer = source.clone();

            b.iter(|| {
                buffer.silence_buffers();
                buffer.merge_buffers(&source, 0, 0, 1.0);
                chain.process(black_box(&mut buffer), false);
            });
        });

        group.bench_function(format!("mono_source_{}_frames", size), |b| {
            let mut chain = build_chain();
            let source = test_signal(size);
            let mut buffer = source.clone();

            b.iter(|| {
                buffer.silence_buffers();
                buffer.merge_buffers(&source, 0, 0, 1.0);
                chain.process(black_box(&mut buffer), true);
            });
        });
    }

    group.finish();
}

fn benchmark_limiter(c: &mut Criterion) {
    c.bench_function("limiter_512_frames", |b| {
        let mut chain = ProcessingChain::new();
        chain.add(Limiter::new(SAMPLE_RATE));
        let mut buffer = test_signal(512);

        b.iter(|| {
            buffer.adjust_buffer_volumes(black_box(1.5));
            chain.process(&mut buffer, false);
        });
    });
}

criterion_group!(benches, benchmark_chain_processing, benchmark_limiter);

criterion_main!(benches);
