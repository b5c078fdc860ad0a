//! Benchmarks for version parsing, range parsing and range containment.
//!
//! Resolution evaluates every sibling range against every available version
//! of a package, so containment is the hot path for packages with hundreds
//! of published versions.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use nuget_resolver::{Version, VersionRange};
use std::hint::black_box;

const RANGES: &[&str] = &[
    "13.0.1",
    "[1.0.0]",
    "[1.0.0,2.0.0)",
    "(4.1.3,)",
    "(,5.0.0-preview.7]",
    "[2.1.0-beta.3, 2.1.0-beta.3]",
];

/// Release versions 0.0.0 through 9.9.9, plus a prerelease of each minor.
fn published_versions() -> Vec<Version> {
    let mut versions = Vec::new();
    for major in 0..10 {
        for minor in 0..10 {
            for patch in 0..10 {
                if let Ok(version) = Version::parse(&format!("{}.{}.{}", major, minor, patch)) {
                    versions.push(version);
                }
            }
            if let Ok(version) = Version::parse(&format!("{}.{}.0-rc.1", major, minor)) {
                versions.push(version);
            }
        }
    }
    versions.sort();
    versions
}

fn bench_version_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("version_parsing");

    group.bench_function("release", |b| {
        b.iter(|| Version::parse(black_box("13.0.1")));
    });

    group.bench_function("prerelease_with_metadata", |b| {
        b.iter(|| Version::parse(black_box("6.0.0-preview.7.21377.19+sha.4f2e1a")));
    });

    group.bench_function("four_components", |b| {
        b.iter(|| Version::parse(black_box("4.0.30319.17929")));
    });

    group.finish();
}

fn bench_range_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("range_parsing");

    for range in RANGES {
        group.bench_with_input(BenchmarkId::from_parameter(range), range, |b, range| {
            b.iter(|| VersionRange::parse(black_box(range)));
        });
    }

    group.finish();
}

fn bench_lowest_satisfying(c: &mut Criterion) {
    let mut group = c.benchmark_group("lowest_satisfying");
    let versions = published_versions();

    let siblings: Vec<VersionRange> = ["[1.0.0,8.0.0)", "[3.2.0,)", "(,7.5.5]"]
        .iter()
        .filter_map(|range| VersionRange::parse(range).ok())
        .collect();

    group.bench_function("three_siblings_1100_versions", |b| {
        b.iter(|| {
            versions
                .iter()
                .find(|version| siblings.iter().all(|range| range.contains(black_box(version))))
        });
    });

    let pinned = VersionRange::parse("9.9.9").ok();
    group.bench_function("pinned_last_version", |b| {
        b.iter(|| {
            versions
                .iter()
                .find(|version| pinned.as_ref().is_some_and(|range| range.contains(black_box(version))))
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_version_parsing,
    bench_range_parsing,
    bench_lowest_satisfying
);
criterion_main!(benches);
