use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use hashbrown::HashMap;
use strata_blocks::{Category, TomlDefinitions};
use strata_chunk::{BlockGrid, ChunkKey};
use strata_runtime::{MeshBuildingMode, Pipeline, PipelineConfig};

mod batch_report;
mod grid_file;
mod watch;

use grid_file::GridFile;

const IDLE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Parser, Debug)]
#[command(name = "strata", about = "Build chunked render meshes from a block grid")]
struct Cli {
    /// Grid file (TOML with [[blocks]] and [[fill]])
    #[arg(long, default_value = "assets/demo_grid.toml")]
    grid: PathBuf,
    /// Block definitions file
    #[arg(long, default_value = "assets/blocks.toml")]
    defs: PathBuf,
    /// Pipeline config; `strata.toml` is used when present
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides mesh_building_mode: immediate, incremental or instanced
    #[arg(long)]
    mode: Option<MeshBuildingMode>,
    /// Overrides chunk_side_length (1..=64)
    #[arg(long)]
    side: Option<i64>,
    /// Overrides worker count; 0 builds inline
    #[arg(long)]
    workers: Option<usize>,
    /// Reload definitions whenever the defs file changes
    #[arg(long, default_value_t = false)]
    watch: bool,
    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Remove the block at x,y,z after the initial build (repeatable)
    #[arg(long, value_parser = parse_pos, allow_hyphen_values = true)]
    edit: Vec<(i32, i32, i32)>,
    /// Also merge every chunk into per-category batches and print their totals
    #[arg(long, default_value_t = false)]
    batch: bool,
}

fn parse_pos(s: &str) -> Result<(i32, i32, i32), String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y, z] = parts.as_slice() else {
        return Err(format!("expected x,y,z, got '{s}'"));
    };
    let n = |v: &str| v.parse::<i32>().map_err(|e| format!("'{v}': {e}"));
    Ok((n(x)?, n(y)?, n(z)?))
}

fn init_logging(log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    match log_file {
        None => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        }
        Some(path) => {
            use simplelog::{
                ColorChoice, CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode,
                WriteLogger,
            };
            CombinedLogger::init(vec![
                TermLogger::new(
                    LevelFilter::Info,
                    Config::default(),
                    TerminalMode::Mixed,
                    ColorChoice::Auto,
                ),
                WriteLogger::new(LevelFilter::Debug, Config::default(), File::create(path)?),
            ])?;
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<PipelineConfig, Box<dyn Error>> {
    let mut cfg = match &cli.config {
        Some(path) => PipelineConfig::load_from_path(path)?,
        None if Path::new("strata.toml").exists() => PipelineConfig::load_from_path("strata.toml")?,
        None => PipelineConfig::default(),
    };
    if let Some(mode) = cli.mode {
        cfg.mesh_building_mode = mode;
    }
    if let Some(side) = cli.side {
        cfg.chunk_side_length = side;
    }
    if cli.workers.is_some() {
        cfg.workers = cli.workers;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn print_summary(pipeline: &Pipeline) {
    let mut keys: Vec<ChunkKey> = pipeline.known_chunks().collect();
    keys.sort_unstable();
    let mut totals: HashMap<Category, (usize, usize)> = HashMap::new();
    let mut bytes = 0usize;
    for key in keys {
        let Some(m) = pipeline.mesh(key) else {
            println!("chunk {key}: not built");
            continue;
        };
        let parts: Vec<String> = Category::ALL
            .iter()
            .filter_map(|&c| {
                let mesh = m.get(c)?;
                let t = totals.entry(c).or_default();
                t.0 += mesh.vertex_count();
                t.1 += mesh.triangle_count();
                Some(format!("{c}: {}v/{}t", mesh.vertex_count(), mesh.triangle_count()))
            })
            .collect();
        bytes += m.byte_len();
        if parts.is_empty() {
            println!("chunk {key}: empty");
        } else {
            println!("chunk {key}: {}", parts.join(", "));
        }
    }
    println!("-- totals --");
    for c in Category::ALL {
        if let Some((v, t)) = totals.get(&c) {
            println!("{:>12}: {v} vertices, {t} triangles", c.as_str());
        }
    }
    let s = pipeline.stats();
    println!(
        "{} chunks meshed, {} palette entries, {} materials, {} KiB, {} instance hits",
        s.meshed_chunks,
        s.palette_entries,
        s.materials,
        bytes / 1024,
        s.instance_hits
    );
}

fn print_batches(pipeline: &Pipeline) -> Result<(), Box<dyn Error>> {
    let mut keys: Vec<ChunkKey> = pipeline.known_chunks().collect();
    keys.sort_unstable();
    let meshes: Vec<_> = keys.into_iter().filter_map(|k| pipeline.mesh(k)).collect();
    let t0 = Instant::now();
    let report = batch_report::merge(meshes.iter().map(|m| m.as_ref()))?;
    log::info!(target: "perf", "ms={} batch_merge chunks={} batches={}", t0.elapsed().as_millis(), report.chunks, report.batches);
    batch_report::print(&report);
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    let cfg = load_config(&cli)?;
    let defs = Arc::new(TomlDefinitions::from_path(&cli.defs)?);
    log::info!("loaded {} block definitions from {}", defs.len(), cli.defs.display());
    let mut grid: BlockGrid = GridFile::load(&cli.grid)?.into_grid()?;
    log::info!("grid '{}' has {} blocks", grid.schematic_id, grid.len());

    let mut pipeline = Pipeline::new(cfg, defs)?;
    let t0 = Instant::now();
    pipeline.load(&grid);
    pipeline.run_until_idle(&grid, IDLE_TIMEOUT);
    log::info!(target: "perf", "ms={} initial_build mode={}", t0.elapsed().as_millis(), pipeline.mode());
    print_summary(&pipeline);
    if cli.batch {
        print_batches(&pipeline)?;
    }

    if !cli.edit.is_empty() {
        for &(x, y, z) in &cli.edit {
            match grid.remove(x, y, z) {
                Some(b) => log::info!(target: "edit", "removed {} at ({},{},{})", b.state_key, x, y, z),
                None => log::info!(target: "edit", "({},{},{}) already empty", x, y, z),
            }
            pipeline.notify_block_changed(x, y, z);
        }
        let t0 = Instant::now();
        let updates = pipeline.run_until_idle(&grid, IDLE_TIMEOUT);
        let mut rebuilt: Vec<ChunkKey> = updates.iter().map(|u| u.key).collect();
        rebuilt.sort_unstable();
        rebuilt.dedup();
        log::info!(target: "perf", "ms={} edit_rebuild chunks={}", t0.elapsed().as_millis(), rebuilt.len());
        let list: Vec<String> = rebuilt.iter().map(ToString::to_string).collect();
        println!("rebuilt after edit: {}", list.join(" "));
        print_summary(&pipeline);
        if cli.batch {
            print_batches(&pipeline)?;
        }
    }

    if cli.watch {
        let (_watcher, rx) = watch::watch_file(&cli.defs)?;
        while rx.recv().is_ok() {
            watch::settle(&rx, Duration::from_millis(200));
            match TomlDefinitions::from_path(&cli.defs) {
                Ok(defs) => {
                    pipeline.reload_definitions(Arc::new(defs), &grid);
                    pipeline.run_until_idle(&grid, IDLE_TIMEOUT);
                    print_summary(&pipeline);
                }
                Err(e) => log::warn!("keeping previous definitions: {}", e),
            }
        }
    }

    pipeline.dispose();
    Ok(())
}
