//! Simple inspector for catalog snapshot files.
//!
//! Usage: `inspect_snapshot [path] [item-id]`. The item id may be decimal or
//! `0x`-prefixed hex; when given, only that item is listed.

use std::fs;

use provenance_catalog::limits::MAGIC_COMPRESSED;
use provenance_catalog::{VersionHistoryDag, decode_snapshot, format_id, parse_id};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let path = args.get(1).cloned().unwrap_or_else(|| "catalog.pcat".to_string());
    let only = args
        .get(2)
        .map(|s| parse_id(s).expect("item id must be decimal or 0x-prefixed hex"));

    println!("Reading: {}", path);

    let data = fs::read(&path).expect("Failed to read file");
    println!("File size: {} bytes", data.len());
    let compressed = data.starts_with(MAGIC_COMPRESSED);
    println!("Compressed: {}", if compressed { "yes (zstd)" } else { "no" });

    let state = decode_snapshot(&data).expect("Failed to decode");
    let stats = state.stats();

    println!("\n=== Relations ===");
    println!("Items:              {}", stats.items);
    println!("Tag owners:         {}", stats.tag_owners);
    println!("Versions:           {}", stats.versions);
    println!("Rich versions:      {}", stats.rich_versions);
    println!("Structure versions: {}", stats.structure_versions);
    println!("Successor edges:    {}", stats.successors);

    println!("\n=== Items ({}) ===", state.items.len());
    let items: Vec<_> = state
        .items
        .iter()
        .filter(|(id, _)| only.is_none_or(|wanted| **id == wanted))
        .collect();
    for (id, row) in items.iter().take(50) {
        let edges = state
            .history_edge_ids(**id)
            .into_iter()
            .filter_map(|edge_id| state.successors.get(&edge_id).copied());
        let dag = VersionHistoryDag::from_edges(**id, edges);
        let leaves: Vec<String> = dag.leaves().into_iter().map(format_id).collect();
        println!(
            "  {} {:<14} {:<40} versions={:<6} leaves=[{}]",
            format_id(**id),
            row.kind,
            row.source_key,
            dag.versions().len(),
            leaves.join(", ")
        );
    }
    if items.len() > 50 {
        println!("  ... and {} more", items.len() - 50);
    }
}
