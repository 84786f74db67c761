#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command line entry point for tile feature fetching.
//!
//! Loads a JSON dataset, builds the per-layer tile indexes for one tile
//! pyramid, then either prints the rows of a single tile or runs the
//! worker loop over `z/x/y` coordinates read from stdin. Rows are written
//! to stdout as JSON lines.

mod dataset;
mod processor;

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use osm_tiles_fetch::DataFetcher;
use osm_tiles_layers::{all_layers, load_layers};
use osm_tiles_tile::{TileCoord, TilePyramid};
use osm_tiles_worker::{LineQueue, Worker};

use crate::processor::{FetchProcessor, write_rows};

#[derive(Parser)]
#[command(name = "osm_tiles", about = "Tile feature data from OSM datasets")]
struct Cli {
    /// JSON dataset of nodes, ways and relations
    #[arg(long)]
    data: PathBuf,

    /// Directory of layer TOML files, instead of the built-in layers
    #[arg(long)]
    layers: Option<PathBuf>,

    /// Zoom of the index's root tile
    #[arg(long, default_value_t = 0)]
    zoom: u8,

    /// Column of the index's root tile
    #[arg(long, default_value_t = 0)]
    x: u32,

    /// Row of the index's root tile
    #[arg(long, default_value_t = 0)]
    y: u32,

    /// Deepest zoom the index serves
    #[arg(long, default_value_t = 16)]
    max_zoom: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the rows of one tile
    Fetch {
        /// Tile as `z/x/y`
        tile: TileCoord,
    },
    /// Process `z/x/y` coordinates read from stdin, one per line
    Worker {
        /// Coordinates to read per batch
        #[arg(long, default_value_t = 1)]
        max_to_read: usize,

        /// Keep reading batches until stdin is closed
        #[arg(long)]
        daemonized: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let layers = match &cli.layers {
        Some(dir) => load_layers(dir)?,
        None => all_layers(),
    };
    let pyramid = TilePyramid::new(cli.zoom, cli.x, cli.y, cli.max_zoom)
        .ok_or("invalid pyramid: need --zoom <= --max-zoom <= 30 and x/y inside the grid")?;

    let (source, graph) = dataset::load(&cli.data)?;
    let fetcher = DataFetcher::new(&layers, &source, pyramid, graph);

    match cli.command {
        Commands::Fetch { tile } => {
            let rows = fetcher.fetch(tile.z, tile.bounds())?;
            log::info!("{tile}: {} rows", rows.len());
            write_rows(&mut io::stdout().lock(), &rows)?;
        }
        Commands::Worker {
            max_to_read,
            daemonized,
        } => {
            let queue = LineQueue::new(io::stdin().lock());
            let processor = FetchProcessor::new(&fetcher, io::stdout().lock());
            let stats = Worker::new(queue, processor)
                .daemonized(daemonized)
                .process(max_to_read)?;
            if stats.failed > 0 {
                return Err(format!("{} coordinates failed", stats.failed).into());
            }
        }
    }

    Ok(())
}
