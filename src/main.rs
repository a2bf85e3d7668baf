use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use retin_io::read_tin;
use retin_refine::{refine_raster, RefineParams};

const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
const GIT_SHA: &str = env!("GIT_SHA");

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Maximum log verbosity.
    #[arg(long, default_value = "info")]
    log_level: Level,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Refine an arc-ascii elevation raster into a TIN file.
    Refine {
        /// Input raster.
        grid: PathBuf,
        /// Output TIN file.
        tin: PathBuf,
        /// Vertical error tolerance, in percent of the elevation range.
        #[arg(long, default_value_t = 1.0)]
        epsilon: f64,
        /// Memory budget in MB, controls the tile size.
        #[arg(long = "memory-mb", default_value_t = 250.0)]
        memory_mb: f64,
        /// Keep nodata cells, remapped below the minimum elevation.
        #[arg(long)]
        use_nodata: bool,
        /// Skip the Delaunay edge flips after each insertion.
        #[arg(long)]
        no_delaunay: bool,
    },
    /// Print the header and per-tile statistics of an existing TIN file.
    Info {
        /// TIN file to inspect.
        tin: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber).unwrap();
    info!(
        "Starting retin {{ \"Version\": \"{}\", \"GitSha\": \"{}\" }}",
        CARGO_PKG_VERSION, GIT_SHA
    );

    match cli.command {
        Command::Refine {
            grid,
            tin,
            epsilon,
            memory_mb,
            use_nodata,
            no_delaunay,
        } => {
            let params = RefineParams {
                epsilon_percent: epsilon,
                memory_limit_mb: memory_mb,
                use_nodata,
                delaunay: !no_delaunay,
            };
            let summary = refine_raster(&grid, &tin, &params)
                .with_context(|| format!("refinement of {} failed", grid.display()))?;
            println!(
                "err={:.2}% absErr={:.2} mem={:.2}MB tiles={}",
                params.epsilon_percent,
                summary.epsilon_absolute,
                params.memory_limit_mb,
                summary.tiles
            );
            println!("raster: {} points", summary.raster_cells);
            println!(
                "TIN: triangles={} points={}",
                summary.triangles, summary.points
            );
            println!("total time: {:.3}s", summary.elapsed.as_secs_f64());
        }
        Command::Info { tin } => {
            let loaded = read_tin(&tin)
                .with_context(|| format!("could not read TIN file {}", tin.display()))?;
            let h = &loaded.header;
            println!(
                "{} x {} raster, corner ({}, {}), cellsize {}",
                h.nrows, h.ncols, h.xllcorner, h.yllcorner, h.cellsize
            );
            println!(
                "elevation {}..={} (nodata {}), tile side {}",
                h.min, h.max, h.nodata, h.tile_len
            );
            println!(
                "{} tiles, {} triangles, {} points",
                h.num_tiles, h.num_triangles, h.num_points
            );
            for (i, tile) in loaded.tiles.iter().enumerate() {
                println!(
                    "tile {i}: offset ({}, {}), {} x {}, {} triangles, {} points",
                    tile.i_offset,
                    tile.j_offset,
                    tile.nrows,
                    tile.ncols,
                    tile.triangles.len(),
                    tile.num_points
                );
            }
        }
    }
    Ok(())
}
