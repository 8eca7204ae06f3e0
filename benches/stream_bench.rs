use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use s_zstream::{
    CompressionMethod, CompressionParameters, Compressor, DecompressionParameters, Decompressor,
    ReaderOptions, WriterOptions,
};

#[path = "../tests/common/mod.rs"]
mod common;

use common::{log_lines, noise};

fn bench_stream_writer(c: &mut Criterion) {
    let sizes = vec![
        10 * 1024,        // 10KB
        1024 * 1024,      // 1MB
        10 * 1024 * 1024, // 10MB
    ];

    for size in sizes {
        let mut group = c.benchmark_group(format!("stream_write_{}", format_size(size)));
        group.throughput(Throughput::Bytes(size as u64));

        let data = log_lines(size);

        for (name, params) in [
            ("deflate_level_6", CompressionParameters::deflate(6)),
            ("zstd_level_3", CompressionParameters::zstd(3)),
            ("zstd_level_10", CompressionParameters::zstd(10)),
        ] {
            let compressor = Compressor::new(params);
            group.bench_with_input(BenchmarkId::new(name, size), &data, |b, data| {
                b.iter(|| {
                    let mut writer = compressor
                        .stream_writer(Vec::new(), WriterOptions::for_compression())
                        .unwrap();
                    writer
                        .scope(|w| {
                            for chunk in data.chunks(64 * 1024) {
                                w.write(black_box(chunk))?;
                            }
                            Ok(())
                        })
                        .unwrap();
                    writer.into_inner().unwrap()
                });
            });
        }

        group.finish();
    }
}

fn bench_stream_reader(c: &mut Criterion) {
    let sizes = vec![100 * 1024, 1024 * 1024]; // 100KB, 1MB

    for size in sizes {
        let mut group = c.benchmark_group(format!("stream_read_{}", format_size(size)));
        group.throughput(Throughput::Bytes(size as u64));

        let data = noise(size);
        for method in [CompressionMethod::Deflate, CompressionMethod::Zstd] {
            let compressed = Compressor::new(CompressionParameters::new(method))
                .compress(&data)
                .unwrap();
            let decompressor = Decompressor::new(DecompressionParameters::new(method));

            for read_size in [4096usize, 65_536] {
                let id = BenchmarkId::new(format!("{:?}_read_{}", method, read_size), size);
                group.bench_with_input(id, &compressed, |b, compressed| {
                    b.iter(|| {
                        let mut reader = decompressor
                            .stream_reader(&compressed[..], ReaderOptions::for_decompression())
                            .unwrap();
                        let mut total = 0;
                        loop {
                            let chunk = reader.read(read_size).unwrap();
                            if chunk.is_empty() {
                                break;
                            }
                            total += chunk.len();
                        }
                        black_box(total)
                    });
                });
            }
        }

        group.finish();
    }
}

fn bench_one_shot(c: &mut Criterion) {
    let mut group = c.benchmark_group("one_shot");
    let data = log_lines(4 * 1024 * 1024);
    group.throughput(Throughput::Bytes(data.len() as u64));

    let compressor = Compressor::default();
    let compressed = compressor.compress(&data).unwrap();
    let decompressor = Decompressor::default();

    group.bench_function("compress_4MB", |b| {
        b.iter(|| compressor.compress(black_box(&data)).unwrap())
    });
    group.bench_function("decompress_4MB", |b| {
        b.iter(|| decompressor.decompress(black_box(&compressed), None).unwrap())
    });

    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch");

    let entry_count = 100;
    let entry_size = 10 * 1024; // 10KB per item
    group.throughput(Throughput::Bytes((entry_count * entry_size) as u64));

    let items: Vec<Vec<u8>> = (0..entry_count)
        .map(|_| log_lines(entry_size))
        .collect();
    let compressor = Compressor::default();
    let frames = compressor.multi_compress_to_buffer(&items).unwrap();
    let decompressor = Decompressor::default();

    group.bench_function("multi_compress_100_items", |b| {
        b.iter(|| compressor.multi_compress_to_buffer(black_box(&items)).unwrap())
    });
    group.bench_function("multi_decompress_100_items", |b| {
        b.iter(|| decompressor.multi_decompress_to_buffer(frames.iter()).unwrap())
    });

    group.finish();
}

fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{}B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{}KB", bytes / 1024)
    } else {
        format!("{}MB", bytes / (1024 * 1024))
    }
}

criterion_group!(
    benches,
    bench_stream_writer,
    bench_stream_reader,
    bench_one_shot,
    bench_batch
);
criterion_main!(benches);
