use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use finder::{ScanEngine, ScanRequest};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

fn create_test_files(root: &Path, file_count: usize, lines_per_file: usize) -> std::io::Result<()> {
    for i in 0..file_count {
        let dir = root.join(format!("dir_{}", i % 16));
        fs::create_dir_all(&dir)?;
        let mut file = File::create(dir.join(format!("test_{}.txt", i)))?;
        for j in 0..lines_per_file {
            writeln!(file, "Line {} of file {}: nothing interesting here", j, i)?;
        }
        if i % 10 == 0 {
            writeln!(file, "<Reference Include=\"Log4Net\" />")?;
        }
    }
    Ok(())
}

fn bench_parallelism(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    create_test_files(dir.path(), 500, 200).unwrap();
    let engine = ScanEngine::new();

    let mut group = c.benchmark_group("Parallelism");
    for workers in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            b.iter(|| {
                let request = ScanRequest::new(dir.path(), "*.txt", "log4net", workers);
                black_box(engine.start_scan(request).unwrap().wait())
            });
        });
    }
    group.finish();
}

fn bench_file_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("File Scaling");
    group.sample_size(20);

    for count in [100, 1000, 5000] {
        let dir = tempdir().unwrap();
        create_test_files(dir.path(), count, 20).unwrap();
        let engine = ScanEngine::new();

        group.bench_function(format!("files_{}", count), |b| {
            b.iter(|| {
                let request = ScanRequest::new(dir.path(), "*", "log4net", 4);
                black_box(engine.start_scan(request).unwrap().wait())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parallelism, bench_file_scaling);
criterion_main!(benches);
