//! CABAC coder benchmarks.
//!
//! Measures raw bin throughput for context-coded and bypass bins, and the
//! binarizations at a few value ranges.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use transcode_cabac::{
    BinDecoder, BinEncoder, CabacDecoder, CabacEncoder, ContextArray, EncoderConfig, StateTable, SYMBOL_CONTEXTS,
};

const BINS: usize = 100_000;

/// Skewed bit pattern so contexts settle into non-trivial states.
fn test_bits(n: usize) -> Vec<bool> {
    (0..n).map(|i| (i * 2_654_435_761) % 100 < 15).collect()
}

fn encode_bins(bits: &[bool], contexts: &mut ContextArray) -> Vec<u8> {
    let mut enc = CabacEncoder::with_config(StateTable::h264(), &EncoderConfig::default());
    let ctx = contexts.as_mut_slice();
    for (i, &bit) in bits.iter().enumerate() {
        enc.encode_context_bit(&mut ctx[i & 7], bit).unwrap();
    }
    enc.encode_terminate(true).unwrap();
    enc.into_sink().into_vec()
}

// ============================================================================
// Arithmetic core
// ============================================================================

fn bench_core(c: &mut Criterion) {
    let mut group = c.benchmark_group("cabac_core");
    group.throughput(Throughput::Elements(BINS as u64));

    let bits = test_bits(BINS);
    let encoded = encode_bins(&bits, &mut ContextArray::new(8));

    group.bench_function("encode_context", |b| {
        b.iter(|| {
            let mut contexts = ContextArray::new(8);
            black_box(encode_bins(black_box(&bits), &mut contexts))
        })
    });

    group.bench_function("decode_context", |b| {
        b.iter(|| {
            let mut contexts = ContextArray::new(8);
            let ctx = contexts.as_mut_slice();
            let mut dec = CabacDecoder::new(StateTable::h264(), black_box(&encoded)).unwrap();
            for i in 0..BINS {
                black_box(dec.decode_context_bit(&mut ctx[i & 7]).unwrap());
            }
        })
    });

    group.bench_function("encode_bypass", |b| {
        b.iter(|| {
            let mut enc = CabacEncoder::with_config(StateTable::h264(), &EncoderConfig::default());
            for &bit in &bits {
                enc.encode_bypass(black_box(bit)).unwrap();
            }
            enc.encode_terminate(true).unwrap()
        })
    });

    group.finish();
}

// ============================================================================
// Binarizations
// ============================================================================

fn bench_binarization(c: &mut Criterion) {
    let mut group = c.benchmark_group("cabac_binarization");
    let count = 10_000;

    for magnitude in [16i32, 1 << 10, 1 << 20] {
        let values: Vec<i32> = (0..count).map(|i| (i * 7919) % (2 * magnitude) - magnitude).collect();
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("ueg_roundtrip", magnitude), &values, |b, values| {
            b.iter(|| {
                let mut contexts = ContextArray::new(9);
                let mut enc = CabacEncoder::with_config(StateTable::h264(), &EncoderConfig::default());
                for &v in values {
                    enc.encode_ueg(contexts.as_mut_slice(), v, 14, true, 0, 8).unwrap();
                }
                enc.encode_terminate(true).unwrap();
                let data = enc.into_sink().into_vec();

                contexts.reset();
                let mut dec = CabacDecoder::new(StateTable::h264(), &data).unwrap();
                for _ in values {
                    black_box(dec.decode_ueg(contexts.as_mut_slice(), 14, true, 0, 8).unwrap());
                }
            })
        });

        group.bench_with_input(BenchmarkId::new("symbol_roundtrip", magnitude), &values, |b, values| {
            b.iter(|| {
                let mut contexts = ContextArray::new(SYMBOL_CONTEXTS);
                let mut enc = CabacEncoder::with_config(StateTable::h264(), &EncoderConfig::default());
                for &v in values {
                    enc.encode_symbol(contexts.as_mut_slice(), v, true).unwrap();
                }
                enc.encode_terminate(true).unwrap();
                let data = enc.into_sink().into_vec();

                contexts.reset();
                let mut dec = CabacDecoder::new(StateTable::h264(), &data).unwrap();
                for _ in values {
                    black_box(dec.decode_symbol(contexts.as_mut_slice(), true).unwrap());
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_core, bench_binarization);
criterion_main!(benches);
