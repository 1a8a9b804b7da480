//! Benchmark: decode a mix of protocol lines against the sample catalogue, plus the
//! catalogue build itself.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use packetline::{Catalogue, Decoder, DecoderConfig};

const SAMPLE: &str = include_str!("../catalogues/sample.pkt");

const LINES: &[&str] = &[
    "12345 rest 2 1 5 1 4",
    "#fins^1^2",
    "dlg #fins^1^2 #fins^2^2 do you accept?",
    "gidx 0 1 2 familyname customrank 3 1|1|1|0",
    "st 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16",
    "finfo 2.1 3.0 4.1 5.0",
    "c_scalc 11 1012 -1 99 10",
    "/ 0Lucifer0 this is a long message",
    "unres 123",
    "m_shop 0 0 20 1 2400 0 21 1 10692 2 0 8 2500 2 3 2 480 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 admin Stand",
];

fn bench_decode(c: &mut Criterion) {
    let catalogue = Catalogue::from_dsl(SAMPLE).expect("sample catalogue");
    let decoder = Decoder::new(&catalogue);
    let bytes: usize = LINES.iter().map(|l| l.len()).sum();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(bytes as u64));
    group.bench_function("mixed_lines", |b| {
        b.iter(|| {
            for line in LINES {
                black_box(decoder.decode(black_box(line)));
            }
        })
    });
    let no_keep_alive = Decoder::with_config(&catalogue, DecoderConfig::default().detect_keep_alive(false));
    group.bench_function("mixed_lines_no_keep_alive", |b| {
        b.iter(|| {
            for line in LINES {
                black_box(no_keep_alive.decode(black_box(line)));
            }
        })
    });
    group.finish();
}

fn bench_build(c: &mut Criterion) {
    c.bench_function("catalogue_from_dsl", |b| {
        b.iter(|| Catalogue::from_dsl(black_box(SAMPLE)).expect("build"))
    });
}

criterion_group!(benches, bench_decode, bench_build);
criterion_main!(benches);
