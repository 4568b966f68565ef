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

    let configs: [(f32, Option<usize>); 4] = [
        (0.5, None),
        (1.0, None),
        (2.0, None),
        (4.0, Some(cli.n_clusters)),
    ];

    for (eps, amount_clusters) in configs {
        println!(
            "Running OPTICS with eps {} and target {:?}...",
            eps, amount_clusters
        );
        let start = Instant::now();
        let result = optics(
            data.as_ref(),
            "points",
            eps,
            cli.min_pts,
            amount_clusters,
            false,
        )
        .expect("Valid OPTICS parameters");
        let cluster_time = start.elapsed().as_secs_f64() * 1000.0;

        let method = match amount_clusters {
            Some(k) => format!("OPTICS-eps:{}-k:{}-r:{:.3}", eps, k, result.radius),
            None => format!("OPTICS-eps:{}-min:{}", eps, cli.min_pts),
        };

        results.push(BenchmarkResult {
            method,
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
