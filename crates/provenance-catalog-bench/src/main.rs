//! Benchmark for history mutation and truncation.
//!
//! Builds synthetic linear and merge-heavy histories on an in-memory
//! catalog, truncates them, then times snapshot encoding of the result.
//!
//! Usage: `bench-history [versions] [levels] [report.json]`

use std::fs;
use std::time::{Duration, Instant};

use provenance_catalog::{
    Catalog, CatalogConfig, Id, ItemBuilder, ItemKind, LogConfig, MemoryStore, VersionBuilder,
    encode_snapshot, encode_snapshot_compressed, init_logging,
};
use serde::Serialize;

const DEFAULT_VERSIONS: usize = 10_000;
const DEFAULT_LEVELS: usize = 16;
/// Every n-th version of the merge workload joins the two open branches.
const MERGE_EVERY: usize = 4;

// =============================================================================
// REPORT
// =============================================================================

#[derive(Debug, Serialize)]
struct WorkloadReport {
    name: &'static str,
    versions: usize,
    edges: usize,
    build_ms: f64,
    versions_per_sec: f64,
    leaves_ms: f64,
    truncate_ms: f64,
    kept: usize,
    reattached: usize,
    deleted: usize,
}

#[derive(Debug, Serialize)]
struct SnapshotReport {
    uncompressed_bytes: usize,
    uncompressed_ms: f64,
    compressed_bytes: usize,
    compressed_ms: f64,
}

#[derive(Debug, Serialize)]
struct Report {
    crate_version: &'static str,
    versions: usize,
    levels: usize,
    workloads: Vec<WorkloadReport>,
    snapshot: SnapshotReport,
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

// =============================================================================
// WORKLOADS
// =============================================================================

/// One parent per version.
fn build_linear(catalog: &Catalog<MemoryStore>, item_id: Id, versions: usize) {
    let mut parent: Option<Id> = None;
    for i in 0..versions {
        let v = catalog
            .create_version(
                item_id,
                VersionBuilder::node().tag("seq", i as i64).build(),
                parent.as_slice(),
            )
            .expect("Failed to create version");
        parent = Some(v.id);
    }
}

/// Two branches growing side by side, merged every `MERGE_EVERY` versions.
fn build_merges(catalog: &Catalog<MemoryStore>, item_id: Id, versions: usize) {
    let root = catalog
        .create_version(item_id, VersionBuilder::node().build(), &[])
        .expect("Failed to create root version");
    let mut heads = [root.id, root.id];
    for i in 1..versions {
        let builder = VersionBuilder::node().tag("seq", i as i64);
        if i % MERGE_EVERY == 0 && heads[0] != heads[1] {
            let merged = catalog
                .create_version(item_id, builder.flag("merge").build(), &heads)
                .expect("Failed to create merge version");
            heads = [merged.id, merged.id];
        } else {
            let branch = i % 2;
            let v = catalog
                .create_version(item_id, builder.build(), &[heads[branch]])
                .expect("Failed to create branch version");
            heads[branch] = v.id;
        }
    }
}

fn run_workload(
    catalog: &Catalog<MemoryStore>,
    name: &'static str,
    versions: usize,
    levels: usize,
    build: fn(&Catalog<MemoryStore>, Id, usize),
) -> WorkloadReport {
    let item = catalog
        .create_item(ItemBuilder::new(ItemKind::Node, name).build())
        .expect("Failed to create item");

    let build_start = Instant::now();
    build(catalog, item.id, versions);
    let build_time = build_start.elapsed();
    let edges = catalog.history(item.id).expect("Failed to load history").len();

    let leaves_start = Instant::now();
    let leaves = catalog.leaves(item.id).expect("Failed to compute leaves");
    let leaves_time = leaves_start.elapsed();

    let truncate_start = Instant::now();
    let report = catalog.truncate(item.id, levels).expect("Failed to truncate");
    let truncate_time = truncate_start.elapsed();

    println!("\n=== {} ===", name);
    println!("Built {} versions ({} edges) in {:?}", versions, edges, build_time);
    println!(
        "  Throughput: {:.0} versions/s",
        versions as f64 / build_time.as_secs_f64()
    );
    println!("Leaves: {} in {:?}", leaves.len(), leaves_time);
    println!(
        "Truncated to {} levels in {:?}: kept {}, reattached {}, deleted {}",
        levels,
        truncate_time,
        report.kept.len(),
        report.reattached.len(),
        report.deleted.len()
    );

    WorkloadReport {
        name,
        versions,
        edges,
        build_ms: ms(build_time),
        versions_per_sec: versions as f64 / build_time.as_secs_f64(),
        leaves_ms: ms(leaves_time),
        truncate_ms: ms(truncate_time),
        kept: report.kept.len(),
        reattached: report.reattached.len(),
        deleted: report.deleted.len(),
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let versions = args
        .get(1)
        .map(|s| s.parse().expect("versions must be a positive integer"))
        .unwrap_or(DEFAULT_VERSIONS);
    let levels = args
        .get(2)
        .map(|s| s.parse().expect("levels must be a positive integer"))
        .unwrap_or(DEFAULT_LEVELS);
    let output = args.get(3);

    init_logging(&LogConfig::production()).expect("Failed to initialize logging");

    let catalog = Catalog::in_memory(&CatalogConfig::default()).expect("Failed to create catalog");
    println!("Versions per workload: {}, levels kept: {}", versions, levels);

    let workloads = vec![
        run_workload(&catalog, "linear", versions, levels, build_linear),
        run_workload(&catalog, "merges", versions, levels, build_merges),
    ];

    let state = catalog.store().snapshot();
    let encode_start = Instant::now();
    let encoded = encode_snapshot(&state).expect("Failed to encode snapshot");
    let encode_time = encode_start.elapsed();
    let compress_start = Instant::now();
    let compressed = encode_snapshot_compressed(&state, 3).expect("Failed to compress snapshot");
    let compress_time = compress_start.elapsed();

    println!("\n=== Snapshot ===");
    println!("Uncompressed: {} bytes in {:?}", encoded.len(), encode_time);
    println!(
        "Compressed:   {} bytes in {:?} ({:.1}%)",
        compressed.len(),
        compress_time,
        100.0 * compressed.len() as f64 / encoded.len() as f64
    );

    let report = Report {
        crate_version: provenance_catalog::VERSION,
        versions,
        levels,
        workloads,
        snapshot: SnapshotReport {
            uncompressed_bytes: encoded.len(),
            uncompressed_ms: ms(encode_time),
            compressed_bytes: compressed.len(),
            compressed_ms: ms(compress_time),
        },
    };
    let json = serde_json::to_string_pretty(&report).expect("Failed to serialize report");
    match output {
        Some(path) => {
            fs::write(path, &json).expect("Failed to write report");
            println!("\nReport written to {}", path);
        }
        None => println!("\n{}", json),
    }
}
