//! Inspect binary tile maps or write a demo map.
//!
//! Run with: cargo run --bin map-inspect -- inspect world.map --json

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use gamemap::map::{
    compute_cell_id, compute_cell_pos, AreaAssociation, CellRecord, DecodeStats, GameMap,
    MapWriter, TerrainAssociation, ZoneAssociation, MAX_MAP_SIZE,
};

#[derive(Parser)]
#[command(name = "map-inspect")]
#[command(about = "Inspect and generate binary tile map files")]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a map and print what it contains
    Inspect {
        path: PathBuf,
        #[arg(long)]
        json: bool,
        /// How many textured cells to list
        #[arg(long, default_value_t = 10)]
        cells: usize,
    },
    /// Write a small demo map
    Sample {
        output: PathBuf,
        #[arg(long, default_value_t = 8)]
        size: i32,
    },
}

#[derive(Serialize)]
struct LayerSummary {
    layer: usize,
    texture: String,
    scale: f32,
}

#[derive(Serialize)]
struct CellSummary {
    id: i32,
    x: i32,
    y: i32,
    flags: u8,
    walkable: bool,
    layers: Vec<LayerSummary>,
}

#[derive(Serialize)]
struct MapSummary {
    path: PathBuf,
    width: i32,
    height: i32,
    blocked_cells: usize,
    stats: DecodeStats,
    terrains: Vec<TerrainAssociation>,
    zones: Vec<ZoneAssociation>,
    areas: Vec<AreaAssociation>,
    cells: Vec<CellSummary>,
}

fn summarize(path: PathBuf, map: &GameMap, stats: DecodeStats, max_cells: usize) -> MapSummary {
    let (cells, blocked_cells) = match map.store() {
        Some(store) => {
            let cells = store
                .iter()
                .filter(|(_, cell)| cell.has_texture() || !cell.is_walkable())
                .take(max_cells)
                .map(|(id, cell)| {
                    let (x, y) = compute_cell_pos(id, store.width());
                    CellSummary {
                        id,
                        x,
                        y,
                        flags: cell.flags.bits(),
                        walkable: cell.is_walkable(),
                        layers: cell
                            .layers
                            .iter()
                            .enumerate()
                            .filter_map(|(layer, entry)| {
                                entry.as_ref().map(|e| LayerSummary {
                                    layer,
                                    texture: e.name().to_string(),
                                    scale: e.scale,
                                })
                            })
                            .collect(),
                    }
                })
                .collect();
            (cells, store.blocked_count())
        }
        None => (Vec::new(), 0),
    };

    MapSummary {
        path,
        width: map.width(),
        height: map.height(),
        blocked_cells,
        stats,
        terrains: map.terrain_associations(),
        zones: map.zone_associations(),
        areas: map.area_associations(),
        cells,
    }
}

fn print_summary(summary: &MapSummary) {
    let stats = &summary.stats;
    println!("{}", summary.path.display());
    println!("  size:              {}x{}", summary.width, summary.height);
    println!("  textures:          {}", stats.textures);
    println!("  cells loaded:      {} ({} blocked)", stats.cells_loaded, summary.blocked_cells);
    println!("  terrain textures:  {}", stats.terrain_textures);
    println!("  terrain records:   {}", stats.terrain_records);
    println!(
        "  zones:             {}{}",
        stats.zones,
        if stats.has_zone_section { "" } else { " (no section)" }
    );
    println!(
        "  areas:             {}{}",
        stats.areas,
        if stats.has_area_section { "" } else { " (no section)" }
    );
    if stats.anomalies() > 0 {
        println!("  skipped records:");
        println!("    cells:           {}", stats.dropped_cells);
        println!("    layer textures:  {}", stats.dropped_layer_textures);
        println!("    terrains:        {}", stats.dropped_terrain_records);
        println!("    bad strings:     {}", stats.malformed_strings);
        println!("    negative counts: {}", stats.negative_counts);
        println!("    truncated:       {}", stats.truncated_records);
    }
    if stats.trailing_bytes > 0 {
        println!("  trailing bytes:    {}", stats.trailing_bytes);
    }

    for cell in &summary.cells {
        print!("  cell {} ({}, {}) flags={:#04x}", cell.id, cell.x, cell.y, cell.flags);
        for layer in &cell.layers {
            print!(" L{}={}x{}", layer.layer, layer.texture, layer.scale);
        }
        println!();
    }
}

fn write_sample(output: &Path, size: i32) -> gamemap::Result<()> {
    let invalid = gamemap::Error::InvalidMapSize { size, max: MAX_MAP_SIZE };
    if size <= 0 || size > MAX_MAP_SIZE {
        return Err(invalid);
    }
    let mut writer = MapWriter::new(size);
    let grass = writer.texture("grass");
    let dirt = writer.texture("dirt");
    let rock = writer.texture("rock");

    for y in 0..size {
        for x in 0..size {
            let Some(id) = compute_cell_id(x, y, size) else {
                return Err(invalid);
            };
            let border = x == 0 || y == 0 || x == size - 1 || y == size - 1;
            let base = if (x + y) % 2 == 0 { grass } else { dirt };
            let flags = if border { 0x01 } else { 0x00 };
            let mut record = CellRecord::new(id, flags).with_layer(0, base, 1.0);
            if border {
                record = record.with_layer(1, rock, 0.5);
            }
            writer.cell(record);
        }
    }

    let meadow = writer.terrain_texture("meadow");
    let cliffs = writer.terrain_texture("cliffs");
    writer.terrain(1, meadow).terrain(2, cliffs);
    writer.zone(1, 100).zone(2, 101);
    writer.area(1, 10).area(2, 11);

    writer.write_file(output)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    match cli.command {
        Commands::Inspect { path, json, cells } => {
            let mut map = GameMap::new();
            let stats = map.load(&path)?;
            let summary = summarize(path, &map, stats, cells);
            if json {
                let text = serde_json::to_string_pretty(&summary).map_err(gamemap::Error::from)?;
                println!("{text}");
            } else {
                print_summary(&summary);
            }
        }
        Commands::Sample { output, size } => {
            write_sample(&output, size)?;
            println!("Wrote {}x{} map to {}", size, size, output.display());
        }
    }

    Ok(())
}
