//! Criterion benchmarks for the event pipeline

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use taglog::core::{
    encode_fields, get_event, put_event, AppenderRef, AsyncLogger, BaseLogger, BufferFullPolicy,
    JsonEncoder, JsonLayout, Layout, LevelRange, Logger, SyncLogger, TextLayout,
};
use taglog::{msg, Field, INFO};

fn sample_fields() -> Vec<Field> {
    vec![
        msg("request processed"),
        Field::string("method", "GET"),
        Field::int("status", 200),
        Field::float("elapsed_ms", 1.25),
        Field::bool("cache_hit", true),
    ]
}

fn sample_event() -> Box<taglog::Event> {
    let mut e = get_event();
    e.level = INFO;
    e.file = "benches/log_benchmarks.rs";
    e.line = 1;
    e.tag = "_app_bench";
    e.fields = sample_fields();
    e
}

fn bench_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoding");
    group.throughput(Throughput::Elements(1));

    group.bench_function("json_fields", |b| {
        let fields = sample_fields();
        b.iter(|| {
            let mut enc = JsonEncoder::new();
            enc.append_encoder_begin();
            encode_fields(&mut enc, &fields);
            enc.append_encoder_end();
            black_box(enc.into_string())
        });
    });

    group.finish();
}

fn bench_layouts(c: &mut Criterion) {
    let mut group = c.benchmark_group("layouts");
    group.throughput(Throughput::Elements(1));

    let e = sample_event();
    let text = TextLayout::default();
    let json = JsonLayout::default();

    group.bench_function("text", |b| b.iter(|| black_box(text.to_bytes(&e))));
    group.bench_function("json", |b| b.iter(|| black_box(json.to_bytes(&e))));

    group.finish();
}

fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");
    group.throughput(Throughput::Elements(1));

    group.bench_function("sync_discard_sink", |b| {
        let logger = SyncLogger::new(BaseLogger::new(
            "bench",
            LevelRange::default(),
            "",
            vec![AppenderRef::new("null", LevelRange::default())],
            None,
        ));
        b.iter(|| logger.publish(sample_event()));
    });

    group.bench_function("async_block", |b| {
        let logger = AsyncLogger::new(
            BaseLogger::new(
                "bench",
                LevelRange::default(),
                "",
                vec![AppenderRef::new("null", LevelRange::default())],
                None,
            ),
            10_000,
            BufferFullPolicy::Block,
        );
        logger.start().unwrap();
        b.iter(|| logger.publish(sample_event()));
        logger.stop();
    });

    group.bench_function("event_pool_round_trip", |b| {
        b.iter(|| {
            let e = get_event();
            put_event(black_box(e));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_encoding, bench_layouts, bench_publish);
criterion_main!(benches);
