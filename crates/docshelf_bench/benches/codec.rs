//! Record codec, key encoding and full-text benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use docshelf_bench::user_record;
use docshelf_codec::{from_cbor, to_cbor, Value};
use docshelf_core::{build_full_text, decode_key, encode_key, Key};

/// Create a nested record `depth` levels deep with `width` fields each.
fn nested_record(depth: usize, width: usize) -> Value {
    if depth == 0 {
        Value::Text("leaf".into())
    } else {
        Value::map((0..width).map(|i| (format!("key_{i}"), nested_record(depth - 1, width))))
    }
}

/// Benchmark record encoding and decoding.
fn bench_record_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("record");

    for bio_words in [4, 64, 512].iter() {
        let record = user_record(1, *bio_words);
        let encoded = to_cbor(&record).unwrap();
        group.throughput(Throughput::Bytes(encoded.len() as u64));

        group.bench_with_input(BenchmarkId::new("encode", bio_words), &record, |b, record| {
            b.iter(|| black_box(to_cbor(black_box(record)).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("decode", bio_words), &encoded, |b, bytes| {
            b.iter(|| black_box(from_cbor(black_box(bytes)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark order-preserving key encoding.
fn bench_keys(c: &mut Criterion) {
    let mut group = c.benchmark_group("key");

    let keys = [
        ("number", Key::from(123_456)),
        ("text", Key::from("user00001234@example.com")),
        (
            "array",
            Key::Array(vec![Key::from("lima"), Key::from(42), Key::from("x")]),
        ),
    ];
    for (name, key) in &keys {
        let encoded = encode_key(key);
        group.bench_function(BenchmarkId::new("encode", name), |b| {
            b.iter(|| black_box(encode_key(black_box(key))));
        });
        group.bench_function(BenchmarkId::new("decode", name), |b| {
            b.iter(|| black_box(decode_key(black_box(&encoded)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark building the full-text blob.
fn bench_full_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_text");

    group.bench_function("user", |b| {
        let record = user_record(1, 32);
        b.iter(|| black_box(build_full_text(black_box(&record), Some("id"))));
    });

    group.bench_function("nested_depth3_width5", |b| {
        let record = nested_record(3, 5);
        b.iter(|| black_box(build_full_text(black_box(&record), None)));
    });

    group.finish();
}

criterion_group!(benches, bench_record_codec, bench_keys, bench_full_text);

criterion_main!(benches);
