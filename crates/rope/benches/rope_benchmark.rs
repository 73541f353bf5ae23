use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rope::Rope;
use std::hint::black_box;

// Lines of varying width so leaf splits land on newlines.
fn sample_text(size: usize) -> String {
    let mut text = String::with_capacity(size + 64);
    let mut line = 0usize;
    while text.len() < size {
        text.push_str(&"word ".repeat(line % 13 + 1));
        text.push('\n');
        line += 1;
    }
    text.truncate(size);
    text
}

fn bench_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("creation");

    for size in [1_000, 10_000, 100_000, 1_000_000] {
        let text = sample_text(size);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("rope", size), &text, |b, text| {
            b.iter(|| black_box(Rope::from_text(black_box(text.as_bytes())).unwrap()))
        });

        group.bench_with_input(BenchmarkId::new("ropey", size), &text, |b, text| {
            b.iter(|| black_box(ropey::Rope::from_str(black_box(text))))
        });
    }
    group.finish();
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    let insert_text = "INSERTED";

    for size in [10_000, 100_000, 1_000_000] {
        let text = sample_text(size);
        group.throughput(Throughput::Elements(1));

        for (name, pos) in [("beginning", 0), ("middle", size / 2), ("end", size)] {
            group.bench_with_input(BenchmarkId::new(format!("rope_{name}"), size), &pos, |b, &pos| {
                b.iter_batched(
                    || Rope::from_text(text.as_bytes()).unwrap(),
                    |mut rope| {
                        rope.insert(black_box(pos), black_box(insert_text.as_bytes())).unwrap();
                        rope
                    },
                    BatchSize::SmallInput,
                )
            });

            group.bench_with_input(BenchmarkId::new(format!("ropey_{name}"), size), &pos, |b, &pos| {
                b.iter_batched(
                    || ropey::Rope::from_str(&text),
                    |mut ropey| {
                        ropey.insert(black_box(pos), black_box(insert_text));
                        ropey
                    },
                    BatchSize::SmallInput,
                )
            });
        }
    }
    group.finish();
}

fn bench_typing(c: &mut Criterion) {
    let mut group = c.benchmark_group("typing");
    let text = sample_text(100_000);

    // a thousand single-byte inserts walking forward from the middle
    group.throughput(Throughput::Elements(1_000));
    group.bench_function("rope", |b| {
        b.iter_batched(
            || Rope::from_text(text.as_bytes()).unwrap(),
            |mut rope| {
                for i in 0..1_000 {
                    rope.insert(50_000 + i, b"x").unwrap();
                }
                rope
            },
            BatchSize::SmallInput,
        )
    });
    group.bench_function("rope_rebalanced", |b| {
        b.iter_batched(
            || Rope::from_text(text.as_bytes()).unwrap(),
            |mut rope| {
                for i in 0..1_000 {
                    rope.insert(50_000 + i, b"x").unwrap();
                    if i % 100 == 99 {
                        rope.rebalance().unwrap();
                    }
                }
                rope
            },
            BatchSize::SmallInput,
        )
    });
    group.bench_function("ropey", |b| {
        b.iter_batched(
            || ropey::Rope::from_str(&text),
            |mut ropey| {
                for i in 0..1_000 {
                    ropey.insert(50_000 + i, "x");
                }
                ropey
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_erase(c: &mut Criterion) {
    let mut group = c.benchmark_group("erase");

    for size in [10_000, 100_000, 1_000_000] {
        let text = sample_text(size);
        let erase_len = size / 10;
        let start = size / 2 - erase_len / 2;
        group.throughput(Throughput::Bytes(erase_len as u64));

        group.bench_with_input(BenchmarkId::new("rope_middle", size), &start, |b, &start| {
            b.iter_batched(
                || Rope::from_text(text.as_bytes()).unwrap(),
                |mut rope| {
                    rope.erase(black_box(start), black_box(erase_len)).unwrap();
                    rope
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_with_input(BenchmarkId::new("ropey_middle", size), &start, |b, &start| {
            b.iter_batched(
                || ropey::Rope::from_str(&text),
                |mut ropey| {
                    ropey.remove(black_box(start..start + erase_len));
                    ropey
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("queries");
    let text = sample_text(1_000_000);
    let rope = Rope::from_text(text.as_bytes()).unwrap();
    let ropey = ropey::Rope::from_str(&text);
    let middle_line = rope.line_count() / 2;

    group.bench_function("rope_line", |b| {
        b.iter(|| black_box(rope.line(black_box(middle_line)).unwrap()))
    });
    group.bench_function("ropey_line", |b| {
        b.iter(|| black_box(ropey.line(black_box(middle_line)).to_string()))
    });
    group.bench_function("rope_text_range", |b| {
        b.iter(|| black_box(rope.text_range(black_box(250_000), 500_000).unwrap()))
    });
    group.bench_function("ropey_slice", |b| {
        b.iter(|| black_box(ropey.slice(black_box(250_000..750_000)).to_string()))
    });

    // pattern absent, so the whole text is scanned
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("rope_find_missing", |b| {
        b.iter(|| black_box(rope.find(black_box(b"word word word word word word word word word word word word word word"))))
    });
    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    let rope = Rope::from_text(sample_text(1_000_000).as_bytes()).unwrap();
    let bytes = rope::encode(&rope).unwrap();
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("encode", |b| b.iter(|| black_box(rope::encode(&rope).unwrap())));
    group.bench_function("decode", |b| {
        b.iter(|| black_box(rope::decode(black_box(&bytes)).unwrap()))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_creation,
    bench_insert,
    bench_typing,
    bench_erase,
    bench_queries,
    bench_codec
);
criterion_main!(benches);
