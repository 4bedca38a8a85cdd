// Handoff benchmarks.
//
// The camera hands over decoded frames at video rate, so decoding and
// rejecting a repeated frame is the hot path. Covers the codec, the engine's
// accept and reject paths, and dispatcher submission with duplicates.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use offpay_protocol::handoff::{decode, sniff};
use offpay_protocol::{
    Identity, MemoryWallet, Money, ProtocolEngine, ProtocolMessage, ScanDispatcher, Session,
    TransactionId,
};

const INIT: &str = r#"{"type":"INIT","tx_id":"0b7d0f4e-5c0c-4c4e-9d0a-3f1b6a1c2d3e","from":"alice","to":"bob","amount":40}"#;
const REQUEST: &str = r#"{"type":"REQUEST","to":"bob"}"#;

fn bench_codec(c: &mut Criterion) {
    c.bench_function("codec/sniff_init", |b| {
        b.iter(|| sniff(INIT));
    });

    c.bench_function("codec/decode_init", |b| {
        b.iter(|| decode(INIT));
    });

    let msg = ProtocolMessage::init(
        TransactionId::new("0b7d0f4e-5c0c-4c4e-9d0a-3f1b6a1c2d3e"),
        Identity::new("alice"),
        Identity::new("bob"),
        Money::from_minor(4000),
    );
    c.bench_function("codec/encode_init", |b| {
        b.iter(|| msg.encode());
    });

    c.bench_function("codec/decode_garbage", |b| {
        b.iter(|| decode("https://example.com/not-a-payment"));
    });
}

fn bench_engine(c: &mut Criterion) {
    let wallet = MemoryWallet::new(Identity::new("alice"), Money::from_minor(10_000));
    let engine = ProtocolEngine::new(Identity::new("alice"));
    let fresh = Session::begin_sender(Money::from_minor(4000)).unwrap();

    c.bench_function("engine/sender_accepts_request", |b| {
        b.iter(|| engine.apply_text(&fresh, REQUEST, &wallet));
    });

    c.bench_function("engine/receiver_rejects_wrong_role", |b| {
        let receiver = Session::begin_receiver(&Identity::new("alice"));
        b.iter(|| engine.apply_text(&receiver, REQUEST, &wallet));
    });
}

fn bench_duplicate_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatcher/duplicates");

    for &repeats in &[1usize, 10, 60] {
        group.throughput(Throughput::Elements(repeats as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(repeats),
            &repeats,
            |b, &repeats| {
                b.iter(|| {
                    let wallet = Arc::new(MemoryWallet::new(
                        Identity::new("alice"),
                        Money::from_minor(10_000),
                    ));
                    let dispatcher =
                        ScanDispatcher::new(ProtocolEngine::new(Identity::new("alice")), wallet);
                    let _ = dispatcher.begin_sender(Money::from_minor(4000));
                    for _ in 0..repeats {
                        dispatcher.submit(REQUEST);
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_codec, bench_engine, bench_duplicate_frames);
criterion_main!(benches);
