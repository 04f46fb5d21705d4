//! Benchmarks for the decoding strategies.
//!
//! Measures the cost of a single decode for each strategy position in the list:
//! - Direct hit (strategy 1)
//! - Keyed XOR hit after strategies 1-4 miss
//! - Full miss through every default strategy
//! - Full miss with exhaustive XOR enabled
//! - A whole engine run over a module with many call sites

extern crate stringscope;

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use stringscope::{
    deobfuscation::{EncodedBlob, Population, StrategyEngine},
    prelude::*,
};

/// Builds a blob of `count` length-prefixed records, returning it with the offsets.
fn build_blob(count: usize) -> (Vec<u8>, Vec<i32>) {
    let mut blob = Vec::new();
    let mut offsets = Vec::with_capacity(count);
    for i in 0..count {
        offsets.push(i32::try_from(blob.len()).unwrap());
        let text = format!("benchmark string {i}");
        blob.extend_from_slice(&u32::try_from(text.len()).unwrap().to_le_bytes());
        blob.extend_from_slice(text.as_bytes());
    }
    (blob, offsets)
}

/// Benchmark a constant that resolves on the first strategy.
fn bench_direct_hit(c: &mut Criterion) {
    let (bytes, offsets) = build_blob(512);
    let blob = EncodedBlob::from_bytes(bytes);
    let config = EngineConfig::default();
    let engine = StrategyEngine::new(&blob, &config);
    let constant = offsets[256];

    c.bench_function("strategy_direct_hit", |b| {
        b.iter(|| black_box(engine.decode(black_box(constant), None, Population::Full)));
    });
}

/// Benchmark a constant masked with the last default XOR key.
fn bench_keyed_xor_hit(c: &mut Criterion) {
    let (bytes, offsets) = build_blob(512);
    let blob = EncodedBlob::from_bytes(bytes);
    let config = EngineConfig::default();
    let engine = StrategyEngine::new(&blob, &config);
    let constant = offsets[256] ^ 0x5555_5555;

    c.bench_function("strategy_keyed_xor_hit", |b| {
        b.iter(|| black_box(engine.decode(black_box(constant), None, Population::Full)));
    });
}

/// Benchmark a constant that no default strategy resolves.
fn bench_full_miss(c: &mut Criterion) {
    let (bytes, _) = build_blob(512);
    let blob = EncodedBlob::from_bytes(bytes);
    let config = EngineConfig::default();
    let engine = StrategyEngine::new(&blob, &config);

    c.bench_function("strategy_full_miss", |b| {
        b.iter(|| black_box(engine.decode(black_box(0x7FFF_0000), None, Population::Full)));
    });
}

/// Benchmark a miss that also walks all 256 single-byte keys.
fn bench_exhaustive_miss(c: &mut Criterion) {
    let (bytes, _) = build_blob(512);
    let blob = EncodedBlob::from_bytes(bytes);
    let config = EngineConfig::aggressive();
    let engine = StrategyEngine::new(&blob, &config);

    c.bench_function("strategy_exhaustive_miss", |b| {
        b.iter(|| black_box(engine.decode(black_box(0x7FFF_0000), None, Population::Full)));
    });
}

/// Benchmark a complete run over 1000 routines with one call site each.
fn bench_engine_run(c: &mut Criterion) {
    let (bytes, offsets) = build_blob(1000);
    let decoder = Token::new(0x0600_0001);

    let mut builder = ModuleBuilder::new()
        .data_slot(DataSlot::global(Token::new(0x0400_0001), "data", bytes))
        .routine(Routine::new(decoder, "a").with_signature(RoutineSignature::decoder()));
    for (row, offset) in (0x10u32..).zip(&offsets) {
        builder = builder.routine(
            Routine::new(Token::new(0x0600_0000 | row), "m").with_body(vec![
                Instruction::load_int(*offset),
                Instruction::call(decoder),
                Instruction::ret(),
            ]),
        );
    }
    let module = builder.build();
    let engine = StringDecryptionEngine::new(EngineConfig::default());

    c.bench_function("engine_run_1000_routines", |b| {
        b.iter(|| {
            let mut module = module.clone();
            let report = engine.run(&mut module).unwrap();
            black_box(report.recovered())
        });
    });
}

criterion_group!(
    benches,
    bench_direct_hit,
    bench_keyed_xor_hit,
    bench_full_miss,
    bench_exhaustive_miss,
    bench_engine_run,
);
criterion_main!(benches);
