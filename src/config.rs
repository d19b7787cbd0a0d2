//! Configuration module for simdex.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`.simdex/settings.toml`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `SIMDEX_` and use double
//! underscores to separate nested levels:
//! - `SIMDEX_CLUSTERING__NUM_THREADS=8` sets `clustering.num_threads`
//! - `SIMDEX_LSH__BIN_LENGTH=4.0` sets `lsh.bin_length`
//! - `SIMDEX_LOGGING__LEVEL=debug` sets `logging.level`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::aggregate::{DEFAULT_QUANTIZATION_LEVELS, Vlad};
use crate::clustering::{
    ConvergencePolicy, DEFAULT_MAX_ITERATIONS, DEFAULT_NUM_THREADS, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_SAMPLE_DOCUMENTS, DEFAULT_STRESS_FLOOR, DEFAULT_STRESS_SCALE, KMeansOptions,
    ParallelOptions, VocabularyOptions,
};
use crate::hashing::{BitSamplingParams, HashSearchOptions, LshParams};
use crate::metric::MetricSpacesOptions;

/// Name of the per-workspace configuration directory.
pub const CONFIG_DIR: &str = ".simdex";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory holding banks, codebooks and metric indexes
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Workspace root directory (where .simdex is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub aggregation: AggregationConfig,

    #[serde(default)]
    pub bit_sampling: BitSamplingConfig,

    #[serde(default)]
    pub lsh: LshConfig,

    #[serde(default)]
    pub metric_spaces: MetricSpacesConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default level filter: trace, debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClusteringConfig {
    /// Vocabulary sizes; one codebook is trained per entry
    #[serde(default = "default_num_clusters")]
    pub num_clusters: Vec<usize>,

    /// Worker threads of the parallel engine
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,

    /// Bounded work queue capacity of the parallel engine
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Lower bound of the convergence threshold
    #[serde(default = "default_stress_floor")]
    pub stress_floor: f64,

    /// Features per unit of convergence threshold
    #[serde(default = "default_stress_scale")]
    pub stress_scale: f64,

    /// Items sampled from the corpus for vocabulary training
    #[serde(default = "default_sample_documents")]
    pub sample_documents: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AggregationConfig {
    /// VLAD quantization levels; 0 disables quantization
    #[serde(default = "default_vlad_quantization_levels")]
    pub vlad_quantization_levels: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BitSamplingConfig {
    #[serde(default = "default_bits")]
    pub bits: usize,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_bit_sampling_bundles")]
    pub num_function_bundles: usize,

    /// Width of the hyperplane component range
    #[serde(default = "default_w")]
    pub w: f64,

    /// Candidates kept after hash collision counting
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LshConfig {
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_lsh_bundles")]
    pub num_function_bundles: usize,

    #[serde(default = "default_bin_length")]
    pub bin_length: f64,

    #[serde(default = "default_dilation")]
    pub dilation: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MetricSpacesConfig {
    #[serde(default = "default_num_reference_objects")]
    pub num_reference_objects: usize,

    #[serde(default = "default_num_reference_objects_used")]
    pub num_reference_objects_used: usize,

    #[serde(default = "default_num_hits")]
    pub num_hits: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// Number of parallel threads for rank-list construction
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(".simdex/data")
}
fn default_false() -> bool {
    false
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_num_clusters() -> Vec<usize> {
    vec![512]
}
fn default_num_threads() -> usize {
    DEFAULT_NUM_THREADS
}
fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}
fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}
fn default_stress_floor() -> f64 {
    DEFAULT_STRESS_FLOOR
}
fn default_stress_scale() -> f64 {
    DEFAULT_STRESS_SCALE
}
fn default_sample_documents() -> usize {
    DEFAULT_SAMPLE_DOCUMENTS
}
fn default_vlad_quantization_levels() -> u32 {
    DEFAULT_QUANTIZATION_LEVELS
}
fn default_bits() -> usize {
    12
}
fn default_dimensions() -> usize {
    640
}
fn default_bit_sampling_bundles() -> usize {
    150
}
fn default_w() -> f64 {
    4.0
}
fn default_max_candidates() -> usize {
    500
}
fn default_lsh_bundles() -> usize {
    80
}
fn default_bin_length() -> f64 {
    10.0
}
fn default_dilation() -> f64 {
    1.0
}
fn default_num_reference_objects() -> usize {
    500
}
fn default_num_reference_objects_used() -> usize {
    50
}
fn default_num_hits() -> usize {
    100
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            data_dir: default_data_dir(),
            workspace_root: None,
            debug: false,
            logging: LoggingConfig::default(),
            clustering: ClusteringConfig::default(),
            aggregation: AggregationConfig::default(),
            bit_sampling: BitSamplingConfig::default(),
            lsh: LshConfig::default(),
            metric_spaces: MetricSpacesConfig::default(),
            indexing: IndexingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            num_clusters: default_num_clusters(),
            num_threads: default_num_threads(),
            queue_capacity: default_queue_capacity(),
            max_iterations: default_max_iterations(),
            stress_floor: default_stress_floor(),
            stress_scale: default_stress_scale(),
            sample_documents: default_sample_documents(),
            seed: None,
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            vlad_quantization_levels: default_vlad_quantization_levels(),
        }
    }
}

impl Default for BitSamplingConfig {
    fn default() -> Self {
        Self {
            bits: default_bits(),
            dimensions: default_dimensions(),
            num_function_bundles: default_bit_sampling_bundles(),
            w: default_w(),
            max_candidates: default_max_candidates(),
        }
    }
}

impl Default for LshConfig {
    fn default() -> Self {
        Self {
            dimensions: default_dimensions(),
            num_function_bundles: default_lsh_bundles(),
            bin_length: default_bin_length(),
            dilation: default_dilation(),
        }
    }
}

impl Default for MetricSpacesConfig {
    fn default() -> Self {
        Self {
            num_reference_objects: default_num_reference_objects(),
            num_reference_objects_used: default_num_reference_objects_used(),
            num_hits: default_num_hits(),
            seed: None,
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
        }
    }
}

impl ClusteringConfig {
    pub fn kmeans_options(&self, num_clusters: usize) -> KMeansOptions {
        KMeansOptions {
            num_clusters,
            seed: self.seed,
        }
    }

    pub fn parallel_options(&self) -> ParallelOptions {
        ParallelOptions {
            num_threads: self.num_threads,
            queue_capacity: self.queue_capacity,
        }
    }

    pub fn convergence_policy(&self) -> ConvergencePolicy {
        ConvergencePolicy {
            stress_floor: self.stress_floor,
            stress_scale: self.stress_scale,
            max_iterations: self.max_iterations,
        }
    }

    pub fn vocabulary_options(&self) -> VocabularyOptions {
        VocabularyOptions {
            num_clusters: self.num_clusters.clone(),
            sample_documents: self.sample_documents,
            policy: self.convergence_policy(),
            pool: self.parallel_options(),
            seed: self.seed,
        }
    }
}

impl AggregationConfig {
    pub fn vlad(&self) -> Vlad {
        Vlad::new(self.vlad_quantization_levels)
    }
}

impl BitSamplingConfig {
    pub fn params(&self) -> BitSamplingParams {
        BitSamplingParams {
            bits: self.bits,
            dimensions: self.dimensions,
            num_function_bundles: self.num_function_bundles,
            w: self.w,
        }
    }
}

impl LshConfig {
    pub fn params(&self) -> LshParams {
        LshParams {
            dimensions: self.dimensions,
            num_function_bundles: self.num_function_bundles,
            bin_length: self.bin_length,
            dilation: self.dilation,
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));

        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            // SIMDEX_A__B maps to a.b; single underscores stay inside field names
            .merge(Env::prefixed("SIMDEX_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::workspace_root();
                }
                settings
            })
    }

    /// Find the settings file by looking for a .simdex directory from the
    /// current directory up to the filesystem root
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join("settings.toml"))
    }

    /// Get the workspace root directory (where .simdex is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Load configuration from a specific file, without environment overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(Box::new)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Data directory resolved against the workspace root when relative
    pub fn resolved_data_dir(&self) -> PathBuf {
        match &self.workspace_root {
            Some(root) if self.data_dir.is_relative() => root.join(&self.data_dir),
            _ => self.data_dir.clone(),
        }
    }

    pub fn metric_spaces_options(&self) -> MetricSpacesOptions {
        MetricSpacesOptions {
            num_reference_objects: self.metric_spaces.num_reference_objects,
            num_reference_objects_used: self.metric_spaces.num_reference_objects_used,
            num_hits: self.metric_spaces.num_hits,
            parallel_threads: self.indexing.parallel_threads,
            seed: self.metric_spaces.seed,
        }
    }

    pub fn hash_search_options(&self) -> HashSearchOptions {
        HashSearchOptions {
            max_candidates: self.bit_sampling.max_candidates,
            num_hits: self.metric_spaces.num_hits,
        }
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        Self::init_config_file_in(Path::new("."), force)
    }

    /// Same as [`Settings::init_config_file`], rooted at `root`
    pub fn init_config_file_in(
        root: &Path,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = root.join(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = format!(
            r#"# simdex configuration file

# Version of the configuration schema
version = 1

# Directory for banks, codebooks and metric indexes (relative to workspace root)
data_dir = ".simdex/data"

# Global debug mode
debug = false

[logging]
# trace, debug, info, warn or error
level = "info"

[clustering]
# Vocabulary sizes, one codebook per entry
num_clusters = [512]

# Worker threads and bounded queue of the parallel k-means engine
num_threads = {DEFAULT_NUM_THREADS}
queue_capacity = {DEFAULT_QUEUE_CAPACITY}

# Training stops when the stress change drops below
# max(stress_floor, features / stress_scale) or after max_iterations
max_iterations = {DEFAULT_MAX_ITERATIONS}
stress_floor = 20.0
stress_scale = 1000.0

# Items sampled from the corpus for vocabulary training
sample_documents = {DEFAULT_SAMPLE_DOCUMENTS}

# Fixed seed for reproducible training
# seed = 42

[aggregation]
# Quantization levels of VLAD vectors (0 disables quantization)
vlad_quantization_levels = {DEFAULT_QUANTIZATION_LEVELS}

[bit_sampling]
bits = 12
dimensions = 640
num_function_bundles = 150
w = 4.0
# Candidates re-ranked exactly after collision counting
max_candidates = 500

[lsh]
dimensions = 640
num_function_bundles = 80
bin_length = 10.0
dilation = 1.0

[metric_spaces]
num_reference_objects = 500
num_reference_objects_used = 50
num_hits = 100

[indexing]
# Threads used for rank-list construction (defaults to CPU count)
# parallel_threads = {}
"#,
            num_cpus::get()
        );

        std::fs::write(&config_path, template)?;

        if force {
            println!("Overwrote configuration at: {}", config_path.display());
        } else {
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
        }

        Ok(config_path)
    }
}
