//! Benchmarks for descriptor walking
//!
//! Measures walking and grouping performance for:
//! - A boot keyboard (single HID interface)
//! - A composite CDC-ACM + HID device with interface associations
//! - A large vendor configuration with many endpoints

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use descriptor::{DescriptorWalker, RawConfiguration};

const KEYBOARD: [u8; 34] = [
    0x09, 0x02, 0x22, 0x00, 0x01, 0x01, 0x00, 0xa0, 0x32, 0x09, 0x04, 0x00, 0x00, 0x01, 0x03,
    0x01, 0x01, 0x00, 0x09, 0x21, 0x11, 0x01, 0x00, 0x01, 0x22, 0x3f, 0x00, 0x07, 0x05, 0x81,
    0x03, 0x08, 0x00, 0x0a,
];

fn composite() -> Vec<u8> {
    let body: Vec<u8> = [
        &[0x08, 0x0b, 0x00, 0x02, 0x02, 0x02, 0x01, 0x00][..],
        &[0x09, 0x04, 0x00, 0x00, 0x01, 0x02, 0x02, 0x01, 0x00],
        &[0x05, 0x24, 0x00, 0x10, 0x01],
        &[0x05, 0x24, 0x01, 0x00, 0x01],
        &[0x04, 0x24, 0x02, 0x02],
        &[0x05, 0x24, 0x06, 0x00, 0x01],
        &[0x07, 0x05, 0x83, 0x03, 0x08, 0x00, 0x10],
        &[0x09, 0x04, 0x01, 0x00, 0x02, 0x0a, 0x00, 0x00, 0x00],
        &[0x07, 0x05, 0x01, 0x02, 0x40, 0x00, 0x00],
        &[0x07, 0x05, 0x82, 0x02, 0x40, 0x00, 0x00],
        &[0x09, 0x04, 0x02, 0x00, 0x01, 0x03, 0x00, 0x00, 0x00],
        &[0x09, 0x21, 0x11, 0x01, 0x00, 0x01, 0x22, 0x22, 0x00],
        &[0x07, 0x05, 0x84, 0x03, 0x40, 0x00, 0x01],
    ]
    .concat();

    let total = (9 + body.len()) as u16;
    let mut buf = vec![0x09, 0x02, total as u8, (total >> 8) as u8, 0x03, 0x01, 0x00, 0x80, 0xfa];
    buf.extend_from_slice(&body);
    buf
}

fn vendor(endpoints: u8) -> Vec<u8> {
    let mut body = vec![0x09, 0x04, 0x00, 0x00, endpoints, 0xff, 0x00, 0x00, 0x00];
    for i in 0..endpoints {
        body.extend_from_slice(&[0x07, 0x05, 0x80 | (i & 0x0f), 0x02, 0x00, 0x02, 0x00]);
    }

    let total = (9 + body.len()) as u16;
    let mut buf = vec![0x09, 0x02, total as u8, (total >> 8) as u8, 0x01, 0x01, 0x00, 0x80, 0xfa];
    buf.extend_from_slice(&body);
    buf
}

fn benchmark_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("walk");

    let inputs = [
        ("keyboard", KEYBOARD.to_vec()),
        ("composite", composite()),
        ("vendor_30", vendor(30)),
    ];

    for (name, buf) in &inputs {
        group.throughput(Throughput::Bytes(buf.len() as u64));
        group.bench_with_input(BenchmarkId::new("walker", name), buf, |b, buf| {
            b.iter(|| DescriptorWalker::new(black_box(buf)).count())
        });
        group.bench_with_input(BenchmarkId::new("parse", name), buf, |b, buf| {
            b.iter(|| {
                RawConfiguration::new(black_box(buf))
                    .and_then(|raw| raw.parse())
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_walk);
criterion_main!(benches);
