use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use covid_data_public::common_csv::{read_source_csv, write_csv_string};
use covid_data_public::events::CaptureSink;
use covid_data_public::index::DuplicatePolicy;
use covid_data_public::normalize::{NormalizeOptions, normalize_source};
use covid_data_public::sources::BuiltinSource;
use encoding_rs::UTF_8;
use tempfile::TempDir;

fn generate_cmdc(rows: usize) -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let csv_path = temp_dir.path().join("cmdc.csv");
    let mut file = File::create(&csv_path).expect("create csv");
    writeln!(file, "location,dt,cases_total,deaths_total,icu_beds_in_use_any").expect("header");
    for i in 0..rows {
        // Newest dates first so the writer has real sorting to do.
        let location = 1000 + (i / 120) * 2;
        let day = 120 - (i % 120);
        let date = chrono::NaiveDate::from_ymd_opt(2020, 3, 1).expect("date")
            + chrono::Days::new(day as u64);
        writeln!(
            file,
            "{location},{date},{},{},{}",
            i * 3,
            i / 10,
            (i % 7) as f64 * 1.5
        )
        .expect("row");
    }
    (temp_dir, csv_path)
}

fn bench_normalize(c: &mut Criterion) {
    let (temp_dir, csv_path) = generate_cmdc(50_000);
    let config = BuiltinSource::CovidCountyData.config();
    let raw = read_source_csv(&csv_path, b',', UTF_8, &config.text_columns).expect("read source");

    let mut group = c.benchmark_group("normalize");

    group.bench_function("read_source", |b| {
        b.iter(|| read_source_csv(&csv_path, b',', UTF_8, &config.text_columns).expect("read"));
    });

    group.bench_function("normalize_and_write", |b| {
        b.iter_batched(
            || raw.clone(),
            |table| {
                let mut sink = CaptureSink::new();
                let options = NormalizeOptions {
                    duplicates: Some(DuplicatePolicy::Fail),
                    ..Default::default()
                };
                let table = normalize_source(table, &config, options, &mut sink).expect("normalize");
                write_csv_string(table, &mut sink).expect("write")
            },
            BatchSize::LargeInput,
        );
    });

    drop(temp_dir);
    group.finish();
}

criterion_group!(benches, bench_normalize);
criterion_main!(benches);
