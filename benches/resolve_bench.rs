//! Map-pass throughput: filtering and color resolution over a synthetic
//! branch table.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use geodash::config::AppConfig;
use geodash::data::ingest::{locate, ColumnSelection, GeoTable};
use geodash::data::table::{Schema, Table};
use geodash::data::value::Scalar;
use geodash::map::{build_map, Selections};
use geodash::resolve::{ColorAssignment, FilterSet};
use geodash::settings::DisplaySettings;

const BRANCHES: [&str; 8] = [
    "Jakarta", "Bandung", "Surabaya", "Medan", "Semarang", "Makassar", "Denpasar", "Palembang",
];

fn branch_table(rows: usize) -> GeoTable {
    let records = (0..rows)
        .map(|i| {
            vec![
                Scalar::Number(-6.0 - (i % 100) as f64 * 0.01),
                Scalar::Number(106.0 + (i % 250) as f64 * 0.01),
                Scalar::Text(format!("KCP {i}")),
                Scalar::Text(BRANCHES[i % BRANCHES.len()].to_string()),
                if i % 3 == 0 { Scalar::Text("red".into()) } else { Scalar::Missing },
            ]
        })
        .collect();
    let table = Table::new(Schema::new(["Lat", "Lon", "Nama", "Cabang", "Warna"]), records);
    locate(&table, &ColumnSelection::new("Lat", "Lon", "Nama")).expect("columns exist")
}

fn bench_map_pass(c: &mut Criterion) {
    let config = AppConfig::default();
    let colors: ColorAssignment = [("Jakarta", "green"), ("Medan", "purple"), ("Denpasar", "orange")]
        .into_iter()
        .collect();
    let mut filters = FilterSet::new();
    filters.allow(
        "Cabang",
        ["Jakarta", "Medan", "Bandung", "Denpasar"].map(Scalar::from),
    );
    let display = DisplaySettings {
        show_circle: true,
        ..DisplaySettings::default()
    };

    let mut group = c.benchmark_group("map_pass");
    for rows in [1_000usize, 10_000] {
        let table = branch_table(rows);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_function(format!("filtered_{rows}"), |b| {
            b.iter(|| {
                let view = build_map(
                    black_box(&table),
                    Selections {
                        filters: &filters,
                        colors: &colors,
                        reference_column: Some("Cabang"),
                        display: &display,
                    },
                    config.marker_style(),
                );
                black_box(view.markers.len())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_map_pass);
criterion_main!(benches);
