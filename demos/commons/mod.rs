#![allow(dead_code)]

use clap::Parser;
use faer::Mat;
use kd_cluster_rs::synthetic::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rustc_hash::FxHashMap;

////////////
// Consts //
////////////

pub const DEFAULT_N_CELLS: usize = 50_000;
pub const DEFAULT_DIM: usize = 3;
pub const DEFAULT_N_CLUSTERS: usize = 12;
pub const DEFAULT_MIN_PTS: usize = 8;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_DATA: &str = "blobs";
pub const DEFAULT_NOISE_FRACTION: f64 = 0.02;

////////////
// Parser //
////////////

/// Parsing structure
///
/// ### Fields
///
/// * `n_cells` - Number of cells/samples
/// * `dim` - Number of dimensions to use
/// * `n_clusters` - Number of clusters in the data
/// * `min_pts` - Minimum number of neighbours of a core point
/// * `seed` - Random seed for reproducibility
/// * `data` - The data to use. One of `"blobs"` or `"uniform"`.
/// * `noise_fraction` - Fraction of uniformly scattered background points
#[derive(Parser)]
pub struct Cli {
    #[arg(long, default_value_t = DEFAULT_N_CELLS)]
    pub n_cells: usize,

    #[arg(long, default_value_t = DEFAULT_DIM)]
    pub dim: usize,

    #[arg(long, default_value_t = DEFAULT_N_CLUSTERS)]
    pub n_clusters: usize,

    #[arg(long, default_value_t = DEFAULT_MIN_PTS)]
    pub min_pts: usize,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    #[arg(long, default_value = DEFAULT_DATA)]
    pub data: String,

    #[arg(long, default_value_t = DEFAULT_NOISE_FRACTION)]
    pub noise_fraction: f64,
}

//////////
// Data //
//////////

#[derive(Default)]
pub enum SyntheticData {
    #[default]
    Blobs,
    Uniform,
}

/// Helper function to parse the data type
///
/// ### Params
///
/// * `s` - The string to parse
///
/// ### Returns
///
/// `Option<SyntheticData>`
pub fn parse_data(s: &str) -> Option<SyntheticData> {
    match s.to_lowercase().as_str() {
        "blobs" => Some(SyntheticData::Blobs),
        "uniform" => Some(SyntheticData::Uniform),
        _ => None,
    }
}

/// Generate the benchmark data
///
/// Blobs sit on a grid with unit spacing scaled by 10 and a jitter of 1.0.
/// Background noise is scattered uniformly over the bounding box and gets the
/// label `usize::MAX`.
///
/// ### Params
///
/// * `cli` - The parsed command line
///
/// ### Returns
///
/// Tuple of `(data, ground truth labels)`
pub fn generate_data(cli: &Cli) -> (Mat<f32>, Vec<usize>) {
    let data_type = parse_data(&cli.data).unwrap_or_default();
    let n_noise = (cli.n_cells as f64 * cli.noise_fraction) as usize;
    let n_clustered = cli.n_cells.saturating_sub(n_noise);

    match data_type {
        SyntheticData::Uniform => {
            let data = generate_clustered_data(cli.n_cells, cli.dim, 1, 10.0, cli.seed);
            (data, vec![0; cli.n_cells])
        }
        SyntheticData::Blobs => {
            let mut rng = StdRng::seed_from_u64(cli.seed);
            let n_clusters = cli.n_clusters.max(1);
            let centres: Vec<Vec<f64>> = (0..n_clusters)
                .map(|_| {
                    (0..cli.dim)
                        .map(|_| rng.random_range(0..n_clusters) as f64 * 10.0)
                        .collect()
                })
                .collect();

            let per_blob = n_clustered / n_clusters;
            let (blobs, mut labels): (Mat<f32>, Vec<usize>) =
                generate_blobs(&centres, per_blob, 1.0, cli.seed + 1);

            let extent = n_clusters as f64 * 10.0;
            let n_total = blobs.nrows() + n_noise;
            let noise: Vec<f32> = (0..n_noise * cli.dim)
                .map(|_| rng.random_range(-5.0..extent) as f32)
                .collect();
            labels.extend(std::iter::repeat_n(usize::MAX, n_noise));

            let data = Mat::from_fn(n_total, cli.dim, |i, j| {
                if i < blobs.nrows() {
                    blobs[(i, j)]
                } else {
                    noise[(i - blobs.nrows()) * cli.dim + j]
                }
            });

            (data, labels)
        }
    }
}

////////////////
// Structures //
////////////////

/// BenchmarkResult
///
/// ### Fields
///
/// * `method` - Name of the method and its parameters
/// * `cluster_time_ms` - Time of the clustering run in ms
/// * `n_clusters` - Number of clusters found
/// * `noise_fraction` - Fraction of points labelled noise
/// * `purity` - Fraction of clustered points sharing the majority label of
///   their cluster
pub struct BenchmarkResult {
    pub method: String,
    pub cluster_time_ms: f64,
    pub n_clusters: usize,
    pub noise_fraction: f64,
    pub purity: f64,
}

/////////////
// Helpers //
/////////////

/// Calculate the cluster purity
///
/// ### Params
///
/// * `clusters` - Point indices per found cluster
/// * `labels` - Ground truth label per point
///
/// ### Returns
///
/// Fraction of clustered points that carry their cluster's majority label
pub fn calculate_cluster_purity(clusters: &[Vec<usize>], labels: &[usize]) -> f64 {
    let mut majority_total = 0;
    let mut total = 0;

    for cluster in clusters {
        let mut counts: FxHashMap<usize, usize> = FxHashMap::default();
        for &idx in cluster {
            *counts.entry(labels[idx]).or_default() += 1;
        }
        majority_total += counts.values().copied().max().unwrap_or(0);
        total += cluster.len();
    }

    if total == 0 {
        return 0.0;
    }
    majority_total as f64 / total as f64
}

////////////
// Prints //
////////////

/// Helper to print results to console
///
/// ### Params
///
/// * `config` - Benchmark configuration
/// * `results` - Benchmark results to print
pub fn print_results(config: &str, results: &[BenchmarkResult]) {
    println!("\n{:=>97}", "");
    println!("Benchmark: {}", config);
    println!("{:=>97}", "");
    println!(
        "{:<45} {:>12} {:>12} {:>12} {:>12}",
        "Method", "Time (ms)", "Clusters", "Noise", "Purity"
    );
    println!("{:->97}", "");
    for result in results {
        println!(
            "{:<45} {:>12.2} {:>12} {:>12.4} {:>12.4}",
            result.method,
            result.cluster_time_ms,
            result.n_clusters,
            result.noise_fraction,
            result.purity
        );
    }
    println!("{:->97}\n", "");
}
