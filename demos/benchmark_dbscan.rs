mod commons;
use clap::Parser;
use commons::*;
use kd_cluster_rs::*;
use std::time::Instant;
use thousands::*;

fn main() {
    let cli = Cli::parse();

    println!("-----------------------------");
    println!(
        "Generating synthetic data: {} cells, {} dimensions, {} clusters, {} data.",
        cli.n_cells.separate_with_underscores(),
        cli.dim,
        cli.n_clusters,
        cli.data
    );
    println!("-----------------------------");

    let (data, labels) = generate_data(&cli);
    let n = data.nrows();
    let mut results = Vec::new();

    println!("Building KD-tree...");
    let start = Instant::now();
    let tree = build_kd_tree(data.as_ref()).expect("Valid benchmark data");
    println!(
        "  {} nodes, height {} in {:.2?}.",
        tree.len().separate_with_underscores(),
        tree.height(),
        start.elapsed()
    );

    println!("-----------------------------");

    for eps in [0.25_f32, 0.5, 1.0, 2.0] {
        println!("Running DBSCAN with eps {}...", eps);
        let start = Instant::now();
        let result = dbscan(data.as_ref(), "points", eps, cli.min_pts, false)
            .expect("Valid DBSCAN parameters");
        let cluster_time = start.elapsed().as_secs_f64() * 1000.0;

        results.push(BenchmarkResult {
            method: format!("DBSCAN-eps:{}-min:{}", eps, cli.min_pts),
            cluster_time_ms: cluster_time,
            n_clusters: result.clusters.len(),
            noise_fraction: result.noise.len() as f64 / n as f64,
            purity: calculate_cluster_purity(&result.clusters, &labels),
        });
    }

    print_results(
        &format!(
            "{}k cells, {}D, {} clusters",
            n / 1000,
            cli.dim,
            cli.n_clusters
        ),
        &results,
    );
}
