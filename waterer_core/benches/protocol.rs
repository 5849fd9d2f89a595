use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use waterer_core::protocol::{DispenseRequest, DispenseStatus, decode_command, encode_status};
use waterer_core::{CommandHandler, Payloads};

fn bench_encode(c: &mut Criterion) {
    let payloads = Payloads::default();
    let running = DispenseStatus {
        is_on: true,
        target_volume_ml: 250.0,
        current_volume_ml: Some(137.42),
    };
    let idle = DispenseStatus {
        is_on: false,
        target_volume_ml: 250.0,
        current_volume_ml: None,
    };

    c.bench_function("encode_status_running", |b| {
        b.iter(|| encode_status(black_box(&running), &payloads))
    });
    c.bench_function("encode_status_idle", |b| {
        b.iter(|| encode_status(black_box(&idle), &payloads))
    });
}

fn bench_decode(c: &mut Criterion) {
    let payloads = Payloads::default();
    let full = br#"{"state":"ON","volume":120}"#;
    let partial = br#"{"volume":80.5}"#;
    let noisy = br#"{"state":"OFF","volume":10,"brightness":255,"color":{"r":1,"g":2,"b":3}}"#;
    let garbage = br#"{"state":"ON","volume":"#;

    c.bench_function("decode_command_full", |b| {
        b.iter(|| decode_command(black_box(full), &payloads))
    });
    c.bench_function("decode_command_partial", |b| {
        b.iter(|| decode_command(black_box(partial), &payloads))
    });
    c.bench_function("decode_command_unknown_fields", |b| {
        b.iter(|| decode_command(black_box(noisy), &payloads))
    });
    c.bench_function("decode_command_truncated", |b| {
        b.iter(|| decode_command(black_box(garbage), &payloads))
    });
}

fn bench_handle(c: &mut Criterion) {
    let handler = CommandHandler::new(Payloads::default());
    c.bench_function("handle_apply_command", |b| {
        b.iter_batched(
            DispenseRequest::default,
            |mut req| {
                let _ = handler.handle(black_box(br#"{"state":"ON","volume":120}"#), &mut req);
                req
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_handle);
criterion_main!(benches);
