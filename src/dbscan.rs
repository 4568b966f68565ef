use log::debug;

use crate::error::Result;
use crate::neighbourhood::{DataKind, NeighbourSource};
use crate::thread_pool::DEFAULT_PARALLEL_TRIGGER;
use crate::utils::*;

////////////
// Result //
////////////

/// Outcome of a DBSCAN run
///
/// ### Fields
///
/// * `clusters` - Point indices per cluster, in discovery order
/// * `noise` - Points that ended up in no cluster, ascending
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DbscanResult {
    pub clusters: Vec<Vec<usize>>,
    pub noise: Vec<usize>,
}

impl DbscanResult {
    /// Per-point cluster label
    ///
    /// ### Params
    ///
    /// * `n_points` - Number of points the run was performed on
    ///
    /// ### Returns
    ///
    /// `Some(cluster)` for clustered points, `None` for noise
    pub fn labels(&self, n_points: usize) -> Vec<Option<usize>> {
        let mut labels = vec![None; n_points];
        for (label, cluster) in self.clusters.iter().enumerate() {
            for &idx in cluster {
                labels[idx] = Some(label);
            }
        }
        labels
    }
}

////////////
// DBSCAN //
////////////

/// Density-based clustering with noise
///
/// Every point runs through `unvisited -> visited` once; a visited point is
/// core (at least `min_pts` other points within `eps`), border (reached from
/// a core point) or noise (neither, at the end of the run).
///
/// ### Fields
///
/// * `data` - Flat, row-major input
/// * `ncols` - Columns of the input
/// * `kind` - Points or distance matrix
/// * `eps` - Neighbourhood radius
/// * `min_pts` - Neighbours (the point itself excluded) needed for a core
///   point
/// * `parallel_trigger` - Minimum number of points before neighbourhoods are
///   collected on several threads
#[derive(Clone, Debug)]
pub struct Dbscan<'a, T> {
    data: &'a [T],
    ncols: usize,
    kind: DataKind,
    eps: T,
    min_pts: usize,
    parallel_trigger: usize,
}

impl<'a, T> Dbscan<'a, T>
where
    T: KdFloat,
{
    /// Generate a new DBSCAN run
    ///
    /// ### Params
    ///
    /// * `data` - Flat, row-major input (points or distance matrix)
    /// * `ncols` - Number of columns of the input
    /// * `kind` - How to read the input
    /// * `eps` - Neighbourhood radius
    /// * `min_pts` - Minimum number of neighbours of a core point
    pub fn new(data: &'a [T], ncols: usize, kind: DataKind, eps: T, min_pts: usize) -> Self {
        Self {
            data,
            ncols,
            kind,
            eps,
            min_pts,
            parallel_trigger: DEFAULT_PARALLEL_TRIGGER,
        }
    }

    /// Override the minimum input size for parallel neighbourhood collection
    pub fn with_parallel_trigger(mut self, trigger: usize) -> Self {
        self.parallel_trigger = trigger;
        self
    }

    /// Run the clustering
    ///
    /// Neighbourhoods are collected up front (in parallel for large inputs,
    /// the tree is only read); the visitation state machine itself runs
    /// sequentially in index order.
    ///
    /// ### Returns
    ///
    /// The clusters and the noise; empty input yields an empty result
    pub fn process(&self) -> Result<DbscanResult> {
        validate_radius("eps", self.eps)?;
        if self.data.is_empty() {
            return Ok(DbscanResult::default());
        }

        let source = NeighbourSource::new(self.data, self.ncols, self.kind)?;
        let neighbourhoods = source.collect_all(self.eps, self.parallel_trigger)?;
        let n = neighbourhoods.len();

        let mut visited = vec![false; n];
        let mut assigned = vec![false; n];
        let mut queued = vec![false; n];
        let mut clusters = Vec::new();

        for p in 0..n {
            if visited[p] {
                continue;
            }
            visited[p] = true;

            if neighbourhoods[p].len() < self.min_pts {
                continue;
            }

            let mut cluster = vec![p];
            assigned[p] = true;
            queued[p] = true;

            let mut frontier: Vec<usize> = Vec::new();
            for &(q, _) in &neighbourhoods[p] {
                if !assigned[q] && !queued[q] {
                    queued[q] = true;
                    frontier.push(q);
                }
            }

            let mut cursor = 0;
            while cursor < frontier.len() {
                let q = frontier[cursor];
                cursor += 1;

                if !visited[q] {
                    visited[q] = true;
                    if neighbourhoods[q].len() >= self.min_pts {
                        for &(r, _) in &neighbourhoods[q] {
                            if !assigned[r] && !queued[r] {
                                queued[r] = true;
                                frontier.push(r);
                            }
                        }
                    }
                }

                if !assigned[q] {
                    assigned[q] = true;
                    cluster.push(q);
                }
            }

            clusters.push(cluster);
        }

        let noise: Vec<usize> = (0..n).filter(|&i| !assigned[i]).collect();

        debug!(
            "DBSCAN finished: {} points, {} clusters, {} noise",
            n,
            clusters.len(),
            noise.len()
        );

        Ok(DbscanResult { clusters, noise })
    }
}

///////////
// Tests //
///////////
