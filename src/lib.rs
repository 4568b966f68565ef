#![allow(clippy::needless_range_loop)] // I want these loops!

pub mod dbscan;
pub mod error;
pub mod kd_searcher;
pub mod kd_tree;
pub mod neighbourhood;
pub mod optics;
pub mod ordering;
pub mod synthetic;
pub mod thread_pool;
pub mod utils;

use faer::MatRef;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub use crate::dbscan::{Dbscan, DbscanResult};
pub use crate::error::{ClusterError, Result};
pub use crate::kd_searcher::KdSearcher;
pub use crate::kd_tree::{KdNode, KdTree, NodeId};
pub use crate::neighbourhood::{parse_data_kind, DataKind};
pub use crate::optics::{Optics, OpticsDescriptor, OpticsResult};
pub use crate::ordering::OrderingAnalyser;
pub use crate::thread_pool::{parallel_for, parallel_map, TaskId, ThreadPool};

use crate::utils::*;

/////////////
// KD-tree //
/////////////

/// Build a balanced KD-tree
///
/// ### Params
///
/// * `mat` - The data matrix. Rows represent the samples, columns represent
///   the dimensions
///
/// ### Return
///
/// The `KdTree` with the row index as payload
pub fn build_kd_tree<T>(mat: MatRef<T>) -> Result<KdTree<T, usize>>
where
    T: KdFloat,
{
    let (vectors_flat, n, dim) = matrix_to_flat(mat);
    KdTree::balanced(&vectors_flat, dim, (0..n).collect())
}

/// Build a balanced KD-tree with caller-supplied payloads
///
/// ### Params
///
/// * `mat` - The data matrix. Rows represent the samples, columns represent
///   the dimensions
/// * `payloads` - One payload per row
///
/// ### Return
///
/// The `KdTree`
pub fn build_kd_tree_with_payloads<T, P>(mat: MatRef<T>, payloads: Vec<P>) -> Result<KdTree<T, P>>
where
    T: KdFloat,
{
    let (vectors_flat, _, dim) = matrix_to_flat(mat);
    KdTree::balanced(&vectors_flat, dim, payloads)
}

/// All payloads within `radius` of a point
///
/// ### Params
///
/// * `tree` - The tree to search
/// * `point` - Query point
/// * `radius` - Search radius (inclusive)
///
/// ### Returns
///
/// Payloads sorted by ascending distance
pub fn neighbours_within<T>(tree: &KdTree<T, usize>, point: &[T], radius: T) -> Result<Vec<usize>>
where
    T: KdFloat,
{
    let (distances, nodes) = KdSearcher::new(tree, point, radius)?.find_nearest_nodes();

    let mut hits: Vec<(OrderedFloat<T>, usize)> = distances
        .into_iter()
        .zip(nodes)
        .filter_map(|(dist, node)| tree.payload(node).map(|&p| (OrderedFloat(dist), p)))
        .collect();
    hits.sort_unstable();

    Ok(hits.into_iter().map(|(_, p)| p).collect())
}

/// Payload of the closest point
///
/// ### Params
///
/// * `tree` - The tree to search
/// * `point` - Query point
///
/// ### Returns
///
/// The payload, `None` for an empty tree
pub fn nearest<T>(tree: &KdTree<T, usize>, point: &[T]) -> Result<Option<usize>>
where
    T: KdFloat,
{
    Ok(KdSearcher::unbounded(tree, point)?
        .find_nearest_node()
        .and_then(|(node, _)| tree.payload(node).copied()))
}

/// Helper function to run radius queries for a batch of points
///
/// ### Params
///
/// * `query_mat` - The query matrix containing the samples x features
/// * `tree` - The tree to search
/// * `radius` - Search radius (inclusive)
/// * `return_dist` - Shall the distances between the different points be
///   returned
/// * `verbose` - Print progress information
///
/// ### Returns
///
/// A tuple of `(indices, optional distances)`, per query sorted by ascending
/// distance
pub fn query_kd_tree_radius<T>(
    query_mat: MatRef<T>,
    tree: &KdTree<T, usize>,
    radius: T,
    return_dist: bool,
    verbose: bool,
) -> Result<(Vec<Vec<usize>>, Option<Vec<Vec<T>>>)>
where
    T: KdFloat,
{
    validate_radius("radius", radius)?;

    let n_samples = query_mat.nrows();
    let counter = Arc::new(AtomicUsize::new(0));

    let results: Vec<(Vec<usize>, Vec<T>)> = (0..n_samples)
        .into_par_iter()
        .map(|i| -> Result<(Vec<usize>, Vec<T>)> {
            let query_vec: Vec<T> = query_mat.row(i).iter().copied().collect();
            let (distances, nodes) = KdSearcher::new(tree, &query_vec, radius)?.find_nearest_nodes();

            let mut hits: Vec<(OrderedFloat<T>, usize)> = distances
                .into_iter()
                .zip(nodes)
                .filter_map(|(dist, node)| tree.payload(node).map(|&p| (OrderedFloat(dist), p)))
                .collect();
            hits.sort_unstable();

            if verbose {
                let count = counter.fetch_add(1, Ordering::Relaxed) + 1;
                if count.is_multiple_of(100_000) {
                    println!("  Processed {} / {} queries.", count, n_samples);
                }
            }

            Ok(hits.into_iter().map(|(d, p)| (p, d.0)).unzip())
        })
        .collect::<Result<Vec<_>>>()?;

    let (indices, distances): (Vec<Vec<usize>>, Vec<Vec<T>>) = results.into_iter().unzip();

    Ok((indices, return_dist.then_some(distances)))
}

////////////////
// Clustering //
////////////////

/// Run DBSCAN
///
/// ### Params
///
/// * `mat` - The data matrix. Either samples x features or a square distance
///   matrix
/// * `data_kind` - How to read `mat`. One of `"points"` or
///   `"distance_matrix"`.
/// * `eps` - Neighbourhood radius
/// * `min_pts` - Minimum number of neighbours (the point itself excluded) of
///   a core point
/// * `verbose` - Print progress information
///
/// ### Returns
///
/// The `DbscanResult`
pub fn dbscan<T>(
    mat: MatRef<T>,
    data_kind: &str,
    eps: T,
    min_pts: usize,
    verbose: bool,
) -> Result<DbscanResult>
where
    T: KdFloat,
{
    let kind = parse_kind(data_kind)?;
    let (data, n, ncols) = matrix_to_flat(mat);

    if verbose {
        println!("Running DBSCAN on {} samples.", n);
    }
    let start = Instant::now();

    let result = Dbscan::new(&data, ncols, kind, eps, min_pts).process()?;

    if verbose {
        println!(
            "  Found {} clusters and {} noise points in {:.2?}.",
            result.clusters.len(),
            result.noise.len(),
            start.elapsed()
        );
    }

    Ok(result)
}

/// Run OPTICS
///
/// ### Params
///
/// * `mat` - The data matrix. Either samples x features or a square distance
///   matrix
/// * `data_kind` - How to read `mat`. One of `"points"` or
///   `"distance_matrix"`.
/// * `eps` - Neighbourhood radius
/// * `min_pts` - Minimum number of neighbours (the point itself excluded) of
///   a core point
/// * `amount_clusters` - Optional number of clusters to extract instead of
///   extracting at `eps`
/// * `verbose` - Print progress information
///
/// ### Returns
///
/// The `OpticsResult`
pub fn optics<T>(
    mat: MatRef<T>,
    data_kind: &str,
    eps: T,
    min_pts: usize,
    amount_clusters: Option<usize>,
    verbose: bool,
) -> Result<OpticsResult<T>>
where
    T: KdFloat,
{
    let kind = parse_kind(data_kind)?;
    let (data, n, ncols) = matrix_to_flat(mat);

    if verbose {
        println!("Running OPTICS on {} samples.", n);
    }
    let start = Instant::now();

    let mut optics = Optics::new(&data, ncols, kind, eps, min_pts);
    if let Some(amount) = amount_clusters {
        optics = optics.with_amount_clusters(amount);
    }
    let result = optics.process()?;

    if verbose {
        println!(
            "  Found {} clusters and {} noise points at radius {:?} in {:.2?}.",
            result.clusters.len(),
            result.noise.len(),
            result.radius,
            start.elapsed()
        );
    }

    Ok(result)
}

fn parse_kind(data_kind: &str) -> Result<DataKind> {
    parse_data_kind(data_kind).ok_or_else(|| ClusterError::InvalidParameter {
        name: "data_kind",
        reason: format!("unknown data kind '{}'", data_kind),
    })
}

///////////
// Tests //
///////////
