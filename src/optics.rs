use log::{debug, warn};
use std::collections::BinaryHeap;

use crate::error::{ClusterError, Result};
use crate::neighbourhood::{DataKind, NeighbourSource};
use crate::ordering::OrderingAnalyser;
use crate::thread_pool::DEFAULT_PARALLEL_TRIGGER;
use crate::utils::*;

/// Bisection steps when resolving the radius for a requested cluster count
pub const MAX_RADIUS_ITERATIONS: usize = 100;

/////////////////
// Descriptors //
/////////////////

/// Per-point OPTICS state
///
/// ### Fields
///
/// * `index` - Index of the point
/// * `core_distance` - Distance to the `min_pts`-th nearest neighbour within
///   `eps`; `None` if the point is no core point
/// * `reachability_distance` - Smallest reachability from an already ordered
///   core point; `None` for points that start an expansion
/// * `processed` - Has the point been written to the ordering
#[derive(Clone, Debug, PartialEq)]
pub struct OpticsDescriptor<T> {
    pub index: usize,
    pub core_distance: Option<T>,
    pub reachability_distance: Option<T>,
    pub processed: bool,
}

impl<T> OpticsDescriptor<T> {
    fn new(index: usize) -> Self {
        Self {
            index,
            core_distance: None,
            reachability_distance: None,
            processed: false,
        }
    }
}

/// Outcome of an OPTICS run
///
/// ### Fields
///
/// * `clusters` - Point indices per cluster, in ordering order
/// * `noise` - Points in no cluster, in ordering order
/// * `ordering` - The cluster ordering, a permutation of all points
/// * `reachability` - Reachability distance per ordering position
/// * `core_distances` - Core distance per point index
/// * `radius` - Connectivity radius the clusters were extracted with
#[derive(Clone, Debug, PartialEq)]
pub struct OpticsResult<T> {
    pub clusters: Vec<Vec<usize>>,
    pub noise: Vec<usize>,
    pub ordering: Vec<usize>,
    pub reachability: Vec<Option<T>>,
    pub core_distances: Vec<Option<T>>,
    pub radius: T,
}

impl<T> OpticsResult<T>
where
    T: KdFloat,
{
    fn empty(radius: T) -> Self {
        Self {
            clusters: Vec::new(),
            noise: Vec::new(),
            ordering: Vec::new(),
            reachability: Vec::new(),
            core_distances: Vec::new(),
            radius,
        }
    }

    /// Analyser over the defined reachability distances of the ordering
    pub fn ordering_analyser(&self) -> OrderingAnalyser<T> {
        OrderingAnalyser::new(self.reachability.iter().flatten().copied().collect())
    }
}

////////////
// Optics //
////////////

/// Density-based cluster ordering
///
/// Builds the cluster ordering of the input once, then extracts flat
/// clusters from it at a connectivity radius: either `eps` or the radius that
/// yields a requested number of clusters.
///
/// ### Fields
///
/// * `data` - Flat, row-major input
/// * `ncols` - Columns of the input
/// * `kind` - Points or distance matrix
/// * `eps` - Neighbourhood radius
/// * `min_pts` - Neighbours (the point itself excluded) needed for a core
///   point
/// * `amount_clusters` - Optional requested number of clusters
/// * `parallel_trigger` - Minimum number of points before neighbourhoods are
///   collected on several threads
#[derive(Clone, Debug)]
pub struct Optics<'a, T> {
    data: &'a [T],
    ncols: usize,
    kind: DataKind,
    eps: T,
    min_pts: usize,
    amount_clusters: Option<usize>,
    parallel_trigger: usize,
}

impl<'a, T> Optics<'a, T>
where
    T: KdFloat,
{
    /// Generate a new OPTICS run
    ///
    /// ### Params
    ///
    /// * `data` - Flat, row-major input (points or distance matrix)
    /// * `ncols` - Number of columns of the input
    /// * `kind` - How to read the input
    /// * `eps` - Neighbourhood radius
    /// * `min_pts` - Minimum number of neighbours of a core point; at least 1
    pub fn new(data: &'a [T], ncols: usize, kind: DataKind, eps: T, min_pts: usize) -> Self {
        Self {
            data,
            ncols,
            kind,
            eps,
            min_pts,
            amount_clusters: None,
            parallel_trigger: DEFAULT_PARALLEL_TRIGGER,
        }
    }

    /// Request a number of clusters instead of extracting at `eps`
    pub fn with_amount_clusters(mut self, amount: usize) -> Self {
        self.amount_clusters = Some(amount);
        self
    }

    /// Override the minimum input size for parallel neighbourhood collection
    pub fn with_parallel_trigger(mut self, trigger: usize) -> Self {
        self.parallel_trigger = trigger;
        self
    }

    /// Run the ordering and the cluster extraction
    ///
    /// ### Returns
    ///
    /// The `OpticsResult`. With a requested cluster count, the extraction at
    /// `eps` is kept when it already has that many clusters; otherwise a
    /// connectivity radius is searched. If no radius yields the count, the
    /// clusters extracted at `eps` are returned.
    pub fn process(&self) -> Result<OpticsResult<T>> {
        validate_radius("eps", self.eps)?;
        if self.min_pts == 0 {
            return Err(ClusterError::InvalidParameter {
                name: "min_pts",
                reason: "must be at least 1".into(),
            });
        }

        let n = if self.data.is_empty() {
            0
        } else {
            validate_flat(self.data, self.ncols)?
        };

        if let Some(amount) = self.amount_clusters {
            if amount == 0 {
                return Err(ClusterError::InvalidParameter {
                    name: "amount_clusters",
                    reason: "must be at least 1".into(),
                });
            }
            if amount > n {
                return Err(ClusterError::UnreachableClusterCount {
                    requested: amount,
                    available: n,
                });
            }
        }

        if n == 0 {
            return Ok(OpticsResult::empty(self.eps));
        }

        let source = NeighbourSource::new(self.data, self.ncols, self.kind)?;
        let neighbourhoods = source.collect_all(self.eps, self.parallel_trigger)?;

        let (descriptors, ordering) = self.calculate_ordering(&neighbourhoods);

        let mut result = OpticsResult {
            clusters: Vec::new(),
            noise: Vec::new(),
            reachability: ordering
                .iter()
                .map(|&i| descriptors[i].reachability_distance)
                .collect(),
            core_distances: descriptors.iter().map(|d| d.core_distance).collect(),
            ordering,
            radius: self.eps,
        };

        let (mut clusters, mut noise) = extract_clusters(&descriptors, &result.ordering, self.eps);

        if let Some(amount) = self.amount_clusters.filter(|&a| a != clusters.len()) {
            let resolved = result
                .ordering_analyser()
                .calculate_connectivity_radius(amount, MAX_RADIUS_ITERATIONS)
                .map(|radius| {
                    let (c, n) = extract_clusters(&descriptors, &result.ordering, radius);
                    (radius, c, n)
                })
                .filter(|(_, c, _)| c.len() == amount);

            match resolved {
                Some((radius, c, n)) => {
                    result.radius = radius;
                    clusters = c;
                    noise = n;
                }
                None => warn!(
                    "No connectivity radius yields {} clusters; extracting at eps = {:?}",
                    amount, self.eps
                ),
            }
        }

        result.clusters = clusters;
        result.noise = noise;

        debug!(
            "OPTICS finished: {} points, {} clusters, {} noise, radius {:?}",
            n,
            result.clusters.len(),
            result.noise.len(),
            result.radius
        );

        Ok(result)
    }

    /// Calculate the cluster ordering
    ///
    /// Unprocessed points are expanded in index order; within an expansion
    /// the seed with the smallest reachability goes next.
    ///
    /// ### Params
    ///
    /// * `neighbourhoods` - Neighbours within `eps` per point
    ///
    /// ### Returns
    ///
    /// Tuple of `(descriptors by point index, ordering)`
    fn calculate_ordering(
        &self,
        neighbourhoods: &[Vec<(usize, T)>],
    ) -> (Vec<OpticsDescriptor<T>>, Vec<usize>) {
        let n = neighbourhoods.len();
        let mut state = OrderingState {
            descriptors: (0..n).map(OpticsDescriptor::new).collect(),
            ordering: Vec::with_capacity(n),
            seeds: BinaryHeap::new(),
            neighbourhoods,
            min_pts: self.min_pts,
        };

        for p in 0..n {
            if !state.descriptors[p].processed {
                state.expand(p);
            }
        }

        (state.descriptors, state.ordering)
    }
}

////////////////////
// Ordering state //
////////////////////

struct OrderingState<'n, T> {
    descriptors: Vec<OpticsDescriptor<T>>,
    ordering: Vec<usize>,
    seeds: BinaryHeap<SeedEntry<T>>,
    neighbourhoods: &'n [Vec<(usize, T)>],
    min_pts: usize,
}

impl<T> OrderingState<'_, T>
where
    T: KdFloat,
{
    fn expand(&mut self, start: usize) {
        self.process_point(start);

        while let Some(SeedEntry {
            reachability,
            index,
        }) = self.seeds.pop()
        {
            let descriptor = &self.descriptors[index];
            // superseded by a smaller reachability pushed later
            if descriptor.processed || descriptor.reachability_distance != Some(reachability) {
                continue;
            }
            self.process_point(index);
        }
    }

    fn process_point(&mut self, p: usize) {
        self.descriptors[p].processed = true;
        self.ordering.push(p);

        let Some(core) = core_distance(&self.neighbourhoods[p], self.min_pts) else {
            return;
        };
        self.descriptors[p].core_distance = Some(core);

        for &(q, dist) in &self.neighbourhoods[p] {
            let descriptor = &mut self.descriptors[q];
            if descriptor.processed {
                continue;
            }

            let candidate = core.max(dist);
            let improves = descriptor
                .reachability_distance
                .is_none_or(|current| candidate < current);
            if improves {
                descriptor.reachability_distance = Some(candidate);
                self.seeds.push(SeedEntry {
                    reachability: candidate,
                    index: q,
                });
            }
        }
    }
}

/////////////
// Helpers //
/////////////

/// Distance to the `min_pts`-th nearest neighbour
///
/// ### Params
///
/// * `neighbours` - Neighbours within `eps`, the point itself excluded
/// * `min_pts` - At least 1
///
/// ### Returns
///
/// The core distance, `None` if there are fewer than `min_pts` neighbours
fn core_distance<T>(neighbours: &[(usize, T)], min_pts: usize) -> Option<T>
where
    T: KdFloat,
{
    if neighbours.len() < min_pts {
        return None;
    }

    let mut distances: Vec<OrderedFloat<T>> =
        neighbours.iter().map(|&(_, d)| OrderedFloat(d)).collect();
    let (_, kth, _) = distances.select_nth_unstable(min_pts - 1);

    Some(kth.0)
}

/// Threshold scan of the ordering at a connectivity radius
///
/// ### Params
///
/// * `descriptors` - Descriptors by point index
/// * `ordering` - The cluster ordering
/// * `radius` - Connectivity radius
///
/// ### Returns
///
/// Tuple of `(clusters, noise)`
fn extract_clusters<T>(
    descriptors: &[OpticsDescriptor<T>],
    ordering: &[usize],
    radius: T,
) -> (Vec<Vec<usize>>, Vec<usize>)
where
    T: KdFloat,
{
    let mut clusters: Vec<Vec<usize>> = Vec::new();
    let mut noise = Vec::new();
    // index into `clusters`; `None` while in a noise run
    let mut current: Option<usize> = None;

    for &idx in ordering {
        let descriptor = &descriptors[idx];
        let separated = descriptor
            .reachability_distance
            .is_none_or(|reach| reach > radius);

        if separated {
            if descriptor.core_distance.is_some_and(|core| core <= radius) {
                clusters.push(vec![idx]);
                current = Some(clusters.len() - 1);
            } else {
                noise.push(idx);
                current = None;
            }
        } else {
            match current {
                Some(c) => clusters[c].push(idx),
                None => noise.push(idx),
            }
        }
    }

    (clusters, noise)
}

///////////
// Tests //
///////////
