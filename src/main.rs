//! CLI entry point for simdex.
//!
//! Provides commands for generating and inspecting hash banks, training
//! codebooks from vector files, aggregating local features, hashing single
//! vectors and running ad-hoc hash or metric-space searches.

use anyhow::Result;
use clap::{
    Parser, Subcommand, ValueEnum,
    builder::styling::{AnsiColor, Effects, Styles},
};
use simdex::aggregate::{AggregatedFeature, Aggregator, Bovw, histogram_tokens};
use simdex::clustering::{
    Clusterer, Codebook, KMeans, ParallelKMeans, codebook_file_name, iterate,
};
use simdex::error::ErrorContext;
use simdex::features::{ExtractorRegistry, TextLinesExtractor, parse_vector};
use simdex::hashing::{BitSamplingBank, HashBank, HashSearcher, LshBank, hash_tokens};
use simdex::metric::{MetricIndexError, MetricSpacesIndex};
use simdex::{IndexError, IndexResult, MemoryItemStore, SearchHit, Settings, logging};
use std::path::{Path, PathBuf};
use std::time::Instant;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Similarity indexing toolkit
#[derive(Parser)]
#[command(
    name = "simdex",
    version = env!("CARGO_PKG_VERSION"),
    about = "Vocabulary building, feature hashing and metric-space search",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Set up .simdex directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    #[command(about = "Display active settings")]
    Config,

    #[command(about = "Generate or inspect hash banks")]
    Bank {
        #[command(subcommand)]
        action: BankAction,
    },

    #[command(about = "Train or inspect k-means codebooks")]
    Codebook {
        #[command(subcommand)]
        action: CodebookAction,
    },

    #[command(about = "Hash one vector with a stored bank")]
    Hash {
        /// Bank file written by `bank generate`
        #[arg(long)]
        bank: PathBuf,

        #[arg(long, value_enum)]
        kind: BankKind,

        /// Comma or whitespace separated components
        #[arg(long, allow_hyphen_values = true)]
        vector: String,
    },

    #[command(about = "Aggregate a file of local features against a codebook")]
    Aggregate {
        /// Codebook file written by `codebook train`
        #[arg(long)]
        codebook: PathBuf,

        /// One local feature per line
        #[arg(long)]
        input: PathBuf,

        /// Print the BOVW histogram as `v<index>` tokens
        #[arg(long)]
        tokens: bool,
    },

    #[command(about = "Search a vector file with a metric-space or hash index")]
    Search {
        /// One vector per line
        #[arg(long)]
        input: PathBuf,

        /// Comma or whitespace separated components
        #[arg(long, allow_hyphen_values = true)]
        query: String,

        /// Search by hash collisions with this bank instead of rank lists
        #[arg(long, requires = "kind")]
        bank: Option<PathBuf>,

        #[arg(long, value_enum)]
        kind: Option<BankKind>,

        /// Override metric_spaces.num_reference_objects
        #[arg(long)]
        references: Option<usize>,

        /// Override metric_spaces.num_reference_objects_used
        #[arg(long)]
        used: Option<usize>,

        /// Number of hits to print
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum BankAction {
    /// Draw a new bank from the configured parameters
    Generate {
        #[arg(long, value_enum)]
        kind: BankKind,

        #[arg(long)]
        out: PathBuf,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the header of a bank file
    Inspect {
        path: PathBuf,

        #[arg(long, value_enum)]
        kind: BankKind,
    },
}

#[derive(Subcommand)]
enum CodebookAction {
    /// Cluster the vectors of a text file into a codebook
    Train {
        /// One vector per line
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        clusters: usize,

        /// Output file, or directory for `codebook-<k>.dat`
        #[arg(long)]
        out: PathBuf,

        /// Use the worker-pool engine
        #[arg(long)]
        parallel: bool,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the header and means of a codebook file
    Inspect {
        path: PathBuf,

        /// Also print every mean
        #[arg(long)]
        means: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BankKind {
    BitSampling,
    Lsh,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Settings::load_from(path).map_err(|e| {
            anyhow::anyhow!("Configuration error loading from {}: {e}", path.display())
        })?,
        None => Settings::load().unwrap_or_else(|e| {
            eprintln!("Configuration error: {e}");
            eprintln!("Using default configuration.");
            Settings::default()
        }),
    };
    logging::init(&config.logging);
    if config.debug {
        eprintln!(
            "DEBUG: workspace root {:?}, data dir {}",
            config.workspace_root,
            config.resolved_data_dir().display()
        );
    }

    if let Err(e) = run(&config, cli.command) {
        eprintln!("Error [{}]: {e}", e.status_code());

        // Display recovery suggestions
        let suggestions = e.recovery_suggestions();
        if !suggestions.is_empty() {
            eprintln!("\nSuggestions:");
            for suggestion in suggestions {
                eprintln!("  • {suggestion}");
            }
        }

        std::process::exit(1);
    }

    Ok(())
}

fn run(config: &Settings, command: Commands) -> IndexResult<()> {
    match command {
        Commands::Init { force } => {
            let path = Settings::init_config_file(force).map_err(|e| IndexError::ConfigError {
                reason: e.to_string(),
            })?;
            println!("Edit {} to customize your settings.", path.display());
        }
        Commands::Config => {
            println!("Current Configuration:");
            println!("{}", "=".repeat(50));
            println!(
                "{}",
                toml::to_string_pretty(config).context("Failed to render settings")?
            );
        }
        Commands::Bank { action } => match action {
            BankAction::Generate { kind, out, seed } => generate_bank(config, kind, &out, seed)?,
            BankAction::Inspect { path, kind } => {
                let bank = load_bank(config, kind, &path)?;
                println!("Bank:       {}", path.display());
                println!("Family:     {}", bank.name());
                println!("Dimensions: {}", bank.dimensions());
                println!("Bundles:    {}", bank.num_function_bundles());
            }
        },
        Commands::Codebook { action } => match action {
            CodebookAction::Train {
                input,
                clusters,
                out,
                parallel,
                seed,
            } => train_codebook(config, &input, clusters, &out, parallel, seed)?,
            CodebookAction::Inspect { path, means } => {
                let codebook = Codebook::read_clusters(&path)?;
                println!("Codebook:   {}", path.display());
                println!("Clusters:   {}", codebook.len());
                println!("Dimension:  {}", codebook.dimension());
                if means {
                    for (index, mean) in codebook.means().enumerate() {
                        println!("{index:>5}: {mean:?}");
                    }
                }
            }
        },
        Commands::Aggregate {
            codebook,
            input,
            tokens,
        } => aggregate(config, &codebook, &input, tokens)?,
        Commands::Hash { bank, kind, vector } => {
            let bank = load_bank(config, kind, &bank)?;
            let vector = parse_vector(&vector)?;
            let codes = bank.hash(&vector)?;
            println!("{}", hash_tokens(&codes).join(" "));
        }
        Commands::Search {
            input,
            query,
            bank,
            kind,
            references,
            used,
            limit,
        } => {
            let store = MemoryItemStore::new();
            for vector in read_vectors(&input)? {
                store.add_global(vector);
            }
            let query = parse_vector(&query)?;
            let hits = match (bank, kind) {
                (Some(bank), Some(kind)) => hash_search(config, &store, &bank, kind, &query)?,
                _ => metric_search(config, &store, &query, references, used)?,
            };
            for hit in hits.into_iter().take(limit) {
                println!("{:>8}  {:.3}", hit.item, hit.score);
            }
        }
    }
    Ok(())
}

fn generate_bank(
    config: &Settings,
    kind: BankKind,
    out: &Path,
    seed: Option<u64>,
) -> IndexResult<()> {
    match kind {
        BankKind::BitSampling => {
            let bank = BitSamplingBank::generate(&config.bit_sampling.params(), seed)?;
            bank.write(out)?;
        }
        BankKind::Lsh => {
            let bank = LshBank::generate(&config.lsh.params(), seed)?;
            bank.write(out)?;
        }
    }
    println!("Wrote bank to {}", out.display());
    Ok(())
}

fn load_bank(config: &Settings, kind: BankKind, path: &Path) -> IndexResult<Box<dyn HashBank>> {
    let bank: Box<dyn HashBank> = match kind {
        BankKind::BitSampling => Box::new(BitSamplingBank::read(path)?),
        BankKind::Lsh => Box::new(LshBank::read(path, config.lsh.bin_length)?),
    };
    Ok(bank)
}

fn read_vectors(path: &Path) -> IndexResult<Vec<Vec<f64>>> {
    ExtractorRegistry::with_builtins().extract_local_file(TextLinesExtractor::KIND.as_str(), path)
}

fn train_codebook(
    config: &Settings,
    input: &Path,
    clusters: usize,
    out: &Path,
    parallel: bool,
    seed: Option<u64>,
) -> IndexResult<()> {
    let vectors = read_vectors(input)?;
    let mut options = config.clustering.kmeans_options(clusters);
    if seed.is_some() {
        options.seed = seed;
    }

    let mut engine: Box<dyn Clusterer> = if parallel {
        Box::new(ParallelKMeans::with_options(
            options,
            config.clustering.parallel_options(),
        ))
    } else {
        Box::new(KMeans::with_options(options))
    };
    for vector in vectors {
        engine.add_feature(vector)?;
    }

    let policy = config.clustering.convergence_policy();
    if config.debug {
        eprintln!(
            "DEBUG: {} vectors, convergence threshold {:.3}, at most {} iterations",
            engine.feature_count(),
            policy.threshold(engine.feature_count()),
            policy.max_iterations
        );
    }

    let start = Instant::now();
    engine.init()?;
    let report = iterate(engine.as_mut(), &policy)?;
    let codebook = Codebook::from_means(
        engine
            .clusters()
            .iter()
            .map(|cluster| cluster.mean().to_vec())
            .collect(),
    )?;

    let path = if out.is_dir() {
        out.join(codebook_file_name(clusters))
    } else {
        out.to_path_buf()
    };
    codebook.write_clusters(&path)?;

    println!(
        "Trained {clusters} clusters from {} vectors in {} iterations ({:.2?}, converged: {})",
        engine.feature_count(),
        report.iterations,
        start.elapsed(),
        report.converged
    );
    println!("Wrote codebook to {}", path.display());
    Ok(())
}

fn aggregate(config: &Settings, codebook: &Path, input: &Path, tokens: bool) -> IndexResult<()> {
    let codebook = Codebook::read_clusters(codebook)?;
    let features = read_vectors(input)?;
    let vlad = config.aggregation.vlad();

    match Bovw.aggregate(&codebook, &features)? {
        AggregatedFeature::Histogram(bins) if tokens => {
            println!("BOVW: {}", histogram_tokens(&bins).join(" "));
        }
        AggregatedFeature::Histogram(bins) => println!("BOVW: {bins:?}"),
        AggregatedFeature::Vector(values) => println!("BOVW: {values:?}"),
    }
    match vlad.aggregate(&codebook, &features)? {
        AggregatedFeature::Vector(values) => {
            println!("VLAD ({} levels): {values:?}", vlad.quantization_levels())
        }
        AggregatedFeature::Histogram(bins) => println!("VLAD: {bins:?}"),
    }
    Ok(())
}

fn hash_search(
    config: &Settings,
    store: &MemoryItemStore,
    bank: &Path,
    kind: BankKind,
    query: &[f64],
) -> IndexResult<Vec<SearchHit>> {
    let bank = load_bank(config, kind, bank)?;
    let searcher = HashSearcher::new(&*bank, "cli", config.hash_search_options());
    let indexed = searcher.index_all(store)?;
    if config.debug {
        eprintln!("DEBUG: hashed {indexed} vectors into '{}'", searcher.field());
    }
    Ok(searcher.search(store, query)?)
}

fn metric_search(
    config: &Settings,
    store: &MemoryItemStore,
    query: &[f64],
    references: Option<usize>,
    used: Option<usize>,
) -> IndexResult<Vec<SearchHit>> {
    let mut options = config.metric_spaces_options();
    if let Some(references) = references {
        options.num_reference_objects = references;
    }
    if let Some(used) = used {
        options.num_reference_objects_used = used;
    }
    if options.num_reference_objects > store.len() {
        return Err(MetricIndexError::CorpusTooSmall {
            items: store.len(),
            required: options.num_reference_objects,
        }
        .into());
    }

    let dir = config.resolved_data_dir().join("metric");
    let mut index = MetricSpacesIndex::new(dir, options);
    index.create_index(store)?;
    Ok(index.search(query)?)
}
