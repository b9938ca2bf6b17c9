use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use simonctr_core::{FRAME_HEADER_SIZE, Frame, FrameBuilder, FrameType};
use simonctr_core::{Initiator, KeyRing, Responder};
use std::sync::Arc;

const SERVER_KEYPAIR: &str = include_str!("../../../tests/fixtures/server_keypair.toml");

fn bench_frame_parse(c: &mut Criterion) {
    let frame_data = FrameBuilder::new()
        .frame_type(FrameType::Request)
        .payload(&vec![b'7'; 1200])
        .build()
        .unwrap();

    let mut group = c.benchmark_group("frame_parse");
    group.throughput(Throughput::Bytes(frame_data.len() as u64));

    group.bench_function("parse_1209_bytes", |b| {
        b.iter(|| Frame::parse(black_box(&frame_data)))
    });

    group.finish();
}

fn bench_frame_build_sizes(c: &mut Criterion) {
    let sizes: Vec<(usize, &str)> = vec![
        (64, "64_bytes"),
        (512, "512_bytes"),
        (4096, "4096_bytes"),
        (32000, "32000_bytes"),
    ];

    let mut group = c.benchmark_group("frame_build_by_size");

    for (size, name) in sizes {
        let payload = vec![b'1'; size.saturating_sub(FRAME_HEADER_SIZE)];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(name, |b| {
            b.iter(|| {
                FrameBuilder::new()
                    .frame_type(FrameType::Response)
                    .payload(black_box(&payload))
                    .build()
            })
        });
    }

    group.finish();
}

fn bench_handshake(c: &mut Criterion) {
    let keys = Arc::new(KeyRing::single(toml::from_str(SERVER_KEYPAIR).unwrap()));

    c.bench_function("handshake_request_response", |b| {
        b.iter(|| {
            let mut initiator = Initiator::new(Arc::clone(&keys));
            let mut responder = Responder::new(Arc::clone(&keys));
            let request = initiator.build_request().unwrap();
            let response = responder.handle_request(&request).unwrap();
            initiator.finish(&response).unwrap().to_biguint().bits()
        })
    });
}

criterion_group!(
    benches,
    bench_frame_parse,
    bench_frame_build_sizes,
    bench_handshake
);
criterion_main!(benches);
