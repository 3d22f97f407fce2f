//! Command-line interface for vicinity collections.
//!
//! Drives the engine exclusively through the Collection API: `create` a
//! directory-backed collection, `load` vectors from CSV, `build` the HNSW
//! index, `search` with a single query or a query CSV, and `stats`.

mod csv;

use clap::{ArgAction, Parser, Subcommand};
use csv::{CsvOptions, CsvRow};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vicinity_core::storage::persistence::MANIFEST_FILE;
use vicinity_core::{config, metadata};
use vicinity_core::{Collection, CollectionOptions, Error, HnswParams, MetadataFilter, Metric};

#[derive(Parser)]
#[command(name = "vicinity", version, about = "Directory-backed vector search collections")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new collection (writes the manifest and an empty store)
    Create {
        /// Collection directory (e.g. data/mycol)
        #[arg(long)]
        dir: PathBuf,
        /// Vector dimension
        #[arg(long)]
        dim: usize,
        /// Distance metric: l2 | cosine
        #[arg(long, default_value = "l2")]
        metric: String,
        /// HNSW max degree above layer 0
        #[arg(long, default_value_t = config::HNSW_DEFAULT_M)]
        m: usize,
        /// HNSW max degree at layer 0
        #[arg(long, default_value_t = config::HNSW_DEFAULT_M0)]
        m0: usize,
        /// HNSW construction beam width
        #[arg(long, default_value_t = config::HNSW_DEFAULT_EF_CONSTRUCTION)]
        ef_construction: usize,
        /// Neighbor diversity heuristic
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        diversity: bool,
        /// Layer RNG seed
        #[arg(long, default_value_t = config::HNSW_DEFAULT_SEED)]
        seed: u32,
        /// Layer multiplier
        #[arg(long, default_value_t = config::HNSW_DEFAULT_LEVEL_MULT)]
        level_mult: f32,
    },
    /// Load vectors from CSV (`id,f1,...,f_dim[,metadata]`) into a collection
    Load {
        #[arg(long)]
        dir: PathBuf,
        /// Vectors CSV path
        #[arg(long)]
        csv: PathBuf,
        /// CSV has a header row
        #[arg(long)]
        header: bool,
        /// CSV has a trailing metadata column (`key=value;key2=value2`)
        #[arg(long)]
        meta: bool,
        /// Build the index after loading
        #[arg(long)]
        build: bool,
    },
    /// Build the HNSW index and persist it
    Build {
        #[arg(long)]
        dir: PathBuf,
        /// Override the metric before building
        #[arg(long)]
        metric: Option<String>,
        #[arg(long)]
        m: Option<usize>,
        #[arg(long)]
        m0: Option<usize>,
        #[arg(long)]
        ef_construction: Option<usize>,
        #[arg(long, action = ArgAction::Set)]
        diversity: Option<bool>,
        #[arg(long)]
        seed: Option<u32>,
        #[arg(long)]
        level_mult: Option<f32>,
    },
    /// Search a collection with a query line or a query CSV
    Search {
        #[arg(long)]
        dir: PathBuf,
        /// Single query line: `f1,f2,...,f_dim`
        #[arg(long)]
        query: Option<String>,
        /// Query CSV file (multiple queries)
        #[arg(long)]
        query_csv: Option<PathBuf>,
        /// Number of results
        #[arg(long, default_value_t = config::DEFAULT_K)]
        k: usize,
        /// Search beam width
        #[arg(long, default_value_t = config::HNSW_DEFAULT_EF_SEARCH)]
        ef: usize,
        /// Limit the number of queries taken from the CSV
        #[arg(long)]
        limit: Option<usize>,
        /// Metadata filter, exact match: `key=value`
        #[arg(long)]
        filter: Option<String>,
        /// Query CSV has a header row
        #[arg(long)]
        header: bool,
        /// First CSV column is an id (even when numeric)
        #[arg(long)]
        has_id: bool,
    },
    /// Print collection info
    Stats {
        #[arg(long)]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Create {
            dir,
            dim,
            metric,
            m,
            m0,
            ef_construction,
            diversity,
            seed,
            level_mult,
        } => cmd_create(
            &dir,
            dim,
            &metric,
            HnswParams {
                m,
                m0,
                ef_construction,
                use_diversity: diversity,
                seed,
                level_mult,
            },
        ),
        Command::Load {
            dir,
            csv,
            header,
            meta,
            build,
        } => cmd_load(&dir, &csv, header, meta, build),
        Command::Build {
            dir,
            metric,
            m,
            m0,
            ef_construction,
            diversity,
            seed,
            level_mult,
        } => cmd_build(
            &dir,
            metric.as_deref(),
            m,
            m0,
            ef_construction,
            diversity,
            seed,
            level_mult,
        ),
        Command::Search {
            dir,
            query,
            query_csv,
            k,
            ef,
            limit,
            filter,
            header,
            has_id,
        } => cmd_search(
            &dir, query, query_csv, k, ef, limit, filter, header, has_id,
        ),
        Command::Stats { dir } => cmd_stats(&dir),
    }
}

fn manifest_exists(dir: &Path) -> bool {
    dir.join(MANIFEST_FILE).is_file()
}

fn format_vec(v: &[f32]) -> String {
    const MAX_ELEMS: usize = 8;
    let mut out = String::from("[");
    for (i, x) in v.iter().take(MAX_ELEMS).enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format!("{x:.6}"));
    }
    if v.len() > MAX_ELEMS {
        out.push_str(", ...");
    }
    out.push(']');
    out
}

fn print_results(collection: &Collection, results: &[vicinity_core::SearchResult]) {
    println!("Top{}:", results.len());
    for r in results {
        println!(
            "  index={} id={} dist={:.6}",
            r.index,
            collection.id_at(r.index).unwrap_or_default(),
            r.distance
        );
    }
}

fn cmd_create(
    dir: &Path,
    dim: usize,
    metric: &str,
    hnsw: HnswParams,
) -> Result<(), Box<dyn std::error::Error>> {
    if manifest_exists(dir) {
        return Err(format!("create: manifest already exists in dir: {}", dir.display()).into());
    }

    let opts = CollectionOptions {
        dim,
        metric: metric.parse::<Metric>()?,
        hnsw,
    };
    let collection = Collection::create(dir, opts)?;
    println!(
        "Created collection at: {} dim={} metric={}",
        collection.dir().display(),
        collection.dim(),
        collection.metric()
    );
    Ok(())
}

fn cmd_load(
    dir: &Path,
    csv_path: &Path,
    header: bool,
    meta: bool,
    build: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !manifest_exists(dir) {
        return Err(format!(
            "load: collection not found ({MANIFEST_FILE} missing): {}",
            dir.display()
        )
        .into());
    }

    let collection = Collection::open(dir)?;
    let opts = CsvOptions {
        has_header: header,
        has_id: true,
        infer_id: false,
        allow_metadata: meta,
    };

    let mut inserted = 0usize;
    csv::for_each_row(csv_path, collection.dim(), &opts, |row: CsvRow| {
        let id = row.id.filter(|id| !id.is_empty()).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                "vectors csv must contain id as first column: id,f1,...,f_dim",
            )
        })?;

        let record = if meta {
            let raw = row.metadata_raw.ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    "--meta enabled but row has no metadata column",
                )
            })?;
            metadata::decode(&raw)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?
        } else {
            metadata::Metadata::new()
        };

        collection
            .upsert(&id, &row.vec, record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        inserted += 1;
        Ok(true)
    })?;

    // loading invalidated any index; save drops the stale graph artifact too
    collection.save()?;
    println!("Loaded vectors: {inserted} into {}", dir.display());

    if build {
        collection.build_index();
        collection.save()?;
        println!("Index built and saved.");
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_build(
    dir: &Path,
    metric: Option<&str>,
    m: Option<usize>,
    m0: Option<usize>,
    ef_construction: Option<usize>,
    diversity: Option<bool>,
    seed: Option<u32>,
    level_mult: Option<f32>,
) -> Result<(), Box<dyn std::error::Error>> {
    if !manifest_exists(dir) {
        return Err(format!(
            "build: collection not found ({MANIFEST_FILE} missing): {}",
            dir.display()
        )
        .into());
    }

    let collection = Collection::open(dir)?;

    if let Some(metric) = metric {
        collection.set_metric(metric.parse::<Metric>()?);
    }

    let has_any_param = m.is_some()
        || m0.is_some()
        || ef_construction.is_some()
        || diversity.is_some()
        || seed.is_some()
        || level_mult.is_some();
    if has_any_param {
        collection.set_hnsw_params(HnswParams {
            m: m.unwrap_or(config::HNSW_DEFAULT_M),
            m0: m0.unwrap_or(config::HNSW_DEFAULT_M0),
            ef_construction: ef_construction.unwrap_or(config::HNSW_DEFAULT_EF_CONSTRUCTION),
            use_diversity: diversity.unwrap_or(true),
            seed: seed.unwrap_or(config::HNSW_DEFAULT_SEED),
            level_mult: level_mult.unwrap_or(config::HNSW_DEFAULT_LEVEL_MULT),
        });
    }

    println!(
        "Building index for dir={} (alive={})",
        dir.display(),
        collection.alive_count()
    );
    collection.build_index();
    collection.save()?;
    println!("Index built and saved.");
    Ok(())
}

fn parse_filter(spec: Option<&str>) -> Result<MetadataFilter, Error> {
    let Some(spec) = spec else {
        return Ok(MetadataFilter::default());
    };
    match spec.split_once('=') {
        Some((key, value)) if !key.is_empty() && !value.is_empty() => {
            Ok(MetadataFilter::new(key, value))
        }
        _ => Err(Error::InvalidFilter(
            "filter must be in form key=value".to_string(),
        )),
    }
}

fn parse_query_line(line: &str, dim: usize, force_id: bool) -> io::Result<Vec<f32>> {
    let opts = CsvOptions {
        has_id: force_id,
        infer_id: !force_id,
        ..CsvOptions::default()
    };
    // an id column in --query is parsed and ignored
    let row = csv::parse_line(line, dim, &opts)?;
    Ok(row.vec)
}

#[allow(clippy::too_many_arguments)]
fn cmd_search(
    dir: &Path,
    query: Option<String>,
    query_csv: Option<PathBuf>,
    k: usize,
    ef: usize,
    limit: Option<usize>,
    filter: Option<String>,
    header: bool,
    has_id: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !manifest_exists(dir) {
        return Err(format!(
            "search: collection not found ({MANIFEST_FILE} missing): {}",
            dir.display()
        )
        .into());
    }

    let filter = parse_filter(filter.as_deref())?;
    let collection = Collection::open(dir)?;
    if !collection.has_index() && filter.is_empty() {
        return Err(format!(
            "search: index not found. Run: vicinity build --dir {}",
            dir.display()
        )
        .into());
    }

    if let Some(line) = query {
        let q = parse_query_line(&line, collection.dim(), has_id)?;
        let results = collection.search_filtered(&q, k, ef, &filter)?;
        println!("Query={}", format_vec(&q));
        print_results(&collection, &results);
        return Ok(());
    }

    let Some(csv_path) = query_csv else {
        return Err("search: missing --query or --query-csv".into());
    };

    let opts = CsvOptions {
        has_header: header,
        has_id,
        infer_id: !has_id,
        ..CsvOptions::default()
    };
    let mut count = 0usize;
    csv::for_each_row(&csv_path, collection.dim(), &opts, |row| {
        if limit.is_some_and(|limit| count >= limit) {
            return Ok(false);
        }

        let results = collection
            .search_filtered(&row.vec, k, ef, &filter)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

        print!("\nQuery#{count}");
        if let Some(id) = &row.id {
            print!(" id={id}");
        }
        println!(" q={}", format_vec(&row.vec));
        print_results(&collection, &results);

        count += 1;
        Ok(true)
    })?;

    Ok(())
}

fn cmd_stats(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !manifest_exists(dir) {
        return Err(format!(
            "stats: collection not found ({MANIFEST_FILE} missing): {}",
            dir.display()
        )
        .into());
    }

    let collection = Collection::open(dir)?;
    println!("Collection dir: {}", collection.dir().display());
    println!("dim: {}", collection.dim());
    println!("metric: {}", collection.metric());
    println!("size(slots): {}", collection.len());
    println!("alive: {}", collection.alive_count());
    println!("has_index: {}", collection.has_index());
    Ok(())
}
