use anyhow::Result;
use clap::Parser;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use coastline::pipeline::{merge_country, process_tile};
use coastline::{io, CleanParams, MarchingSquares, PipelineConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input raster tile ({country}_{gridlabel}.tif) or a directory of tiles
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Reference boundary vector file (per-country containment polygons)
    #[arg(short, long, value_name = "FILE")]
    boundary: PathBuf,

    /// Acquisition year, used in the output name and UID
    #[arg(short, long)]
    year: u16,

    /// Only process tiles of this country code
    #[arg(long)]
    country: Option<String>,

    /// Number of worker threads (default: CPU cores)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Overwrite existing outputs
    #[arg(long)]
    overwrite: bool,

    /// Output format extension (gpkg, shp or geojson)
    #[arg(long, default_value = "gpkg")]
    format: String,

    /// Cells at or below this reflectance value are background
    #[arg(long, default_value_t = 1.0)]
    extract_threshold: f32,

    /// Odd side length of the local-maximum denoise window
    #[arg(long, default_value_t = 31)]
    denoise_window: usize,

    /// Cells whose window maximum stays below this are noise
    #[arg(long, default_value_t = 5.0)]
    denoise_threshold: f32,

    /// Clusters smaller than this many cells are removed
    #[arg(long, default_value_t = 4)]
    min_cluster_size: usize,

    /// Value written into filled holes
    #[arg(long, default_value_t = 50.0)]
    hole_fill_value: f32,

    /// Enclosed holes larger than this many cells stay open water
    #[arg(long, default_value_t = 500)]
    max_hole_cells: usize,

    /// Clusters with a member-value median below this are removed
    #[arg(long, default_value_t = 5.0)]
    median_threshold: f32,

    /// Scalar level the coastline is traced at
    #[arg(long, default_value_t = 25.0)]
    iso_level: f32,

    /// Outward repair buffer distance, in CRS units
    #[arg(long, default_value_t = 40.0)]
    positive_buffer: f64,

    /// Inward repair buffer distance, in CRS units
    #[arg(long, default_value_t = 35.0)]
    negative_buffer: f64,

    /// Accept candidates that merely intersect the boundary instead of
    /// requiring their center inside it
    #[arg(long)]
    intersect_only: bool,

    /// Smoothing window span in CRS units (0 disables smoothing)
    #[arg(long, default_value_t = 0.0)]
    smoothing_tolerance: f64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let start_time = std::time::Instant::now();

    // fatal at startup: a bad configuration invalidates the whole run
    let config = build_config(&args);
    config.validate()?;

    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .expect("Failed to build thread pool");
    }

    fs::create_dir_all(&args.output)?;

    // the reference boundary store is read once and shared by all tiles
    let boundary = io::read_boundary(&args.boundary)?;

    let tiles = if args.input.is_file() {
        match tile_identity(&args.input) {
            Some(identity) => vec![(identity, args.input.clone())],
            None => {
                error!("Invalid tile name: {:?}", args.input);
                anyhow::bail!("Input file must be named {{country}}_{{gridlabel}}.tif")
            }
        }
    } else if args.input.is_dir() {
        info!("Scanning directory: {:?}", args.input);
        collect_tiles(&args.input)?
    } else {
        error!("Invalid input path: {:?}", args.input);
        anyhow::bail!("Input path must be a file or directory");
    };

    // group tiles per country; the merge is the fan-in barrier per unit
    let mut countries: BTreeMap<String, Vec<(String, PathBuf)>> = BTreeMap::new();
    for ((country, tile_id), path) in tiles {
        if let Some(only) = &args.country {
            if &country != only {
                continue;
            }
        }
        countries.entry(country).or_default().push((tile_id, path));
    }
    if countries.is_empty() {
        anyhow::bail!("No input tiles found under {:?}", args.input);
    }
    info!(
        "Found {} tile(s) across {} country unit(s)",
        countries.values().map(Vec::len).sum::<usize>(),
        countries.len()
    );

    let mut succeeded = 0usize;
    let mut failed = 0usize;

    for (country, tiles) in countries {
        let uid = format!("{}_{}", country, args.year);

        let results: Vec<(String, Result<Vec<coastline::Region>>)> = tiles
            .par_iter()
            .map(|(tile_id, path)| {
                let outcome = io::read_grid(path).map(|grid| {
                    process_tile(&grid, &boundary, &config, &MarchingSquares, tile_id)
                });
                (tile_id.clone(), outcome)
            })
            .collect();

        // per-unit failures are logged and skipped, never fatal for the batch
        let mut regions = Vec::new();
        for (tile_id, outcome) in results {
            match outcome {
                Ok(tile_regions) => {
                    succeeded += 1;
                    regions.extend(tile_regions);
                }
                Err(e) => {
                    failed += 1;
                    error!("Tile {} failed: {:#}", tile_id, e);
                }
            }
        }

        let coastline = merge_country(&uid, &regions, &config);
        if coastline.is_empty() {
            warn!("{}: no coastline detected, skipping output", uid);
            continue;
        }

        let output_path = args.output.join(format!("{}.{}", uid, args.format));
        match io::write_coastline(&output_path, &coastline, args.overwrite) {
            Ok(()) => info!("Written coastline: {:?}", output_path),
            Err(e) => {
                failed += 1;
                error!("Output for {} failed: {:#}", uid, e);
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        "Done: {} tile(s) succeeded, {} unit(s) failed, took {:?}",
        succeeded, failed, elapsed
    );

    Ok(())
}

fn build_config(args: &Args) -> PipelineConfig {
    PipelineConfig {
        clean: CleanParams {
            extract_threshold: args.extract_threshold,
            denoise_window: args.denoise_window,
            denoise_threshold: args.denoise_threshold,
            min_cluster_size: args.min_cluster_size,
            hole_fill_value: args.hole_fill_value,
            max_hole_cells: args.max_hole_cells,
            median_threshold: args.median_threshold,
        },
        iso_level: args.iso_level,
        positive_buffer: args.positive_buffer,
        negative_buffer: args.negative_buffer,
        center_point_required: !args.intersect_only,
        smoothing_tolerance: args.smoothing_tolerance,
    }
}

/// Splits `{country}_{gridlabel}.tif` into (country, tile id).
fn tile_identity(path: &Path) -> Option<(String, String)> {
    if path.extension().and_then(|s| s.to_str()) != Some("tif") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (country, _gridlabel) = stem.split_once('_')?;
    Some((country.to_string(), stem.to_string()))
}

fn collect_tiles(dir: &Path) -> Result<Vec<((String, String), PathBuf)>> {
    let mut tiles = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            tiles.extend(collect_tiles(&path)?);
        } else if let Some(identity) = tile_identity(&path) {
            tiles.push((identity, path));
        }
    }
    Ok(tiles)
}
