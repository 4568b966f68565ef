use log::debug;

use crate::error::{ClusterError, Result};
use crate::kd_searcher::KdSearcher;
use crate::kd_tree::KdTree;
use crate::thread_pool::parallel_map;
use crate::utils::*;

//////////////
// DataKind //
//////////////

/// How the input of a density clustering run is to be read
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataKind {
    /// Rows are points, columns are dimensions; queries go through a KD-tree
    Points,
    /// Square matrix of pairwise distances; no tree is built
    DistanceMatrix,
}

/// Parsing the input data kind
///
/// ### Params
///
/// * `s` - One of `"points"` or `"distance_matrix"` (case-insensitive)
///
/// ### Results
///
/// The `DataKind`, `None` for anything else
pub fn parse_data_kind(s: &str) -> Option<DataKind> {
    match s.to_lowercase().as_str() {
        "points" => Some(DataKind::Points),
        "distance_matrix" => Some(DataKind::DistanceMatrix),
        _ => None,
    }
}

/////////////////////
// NeighbourSource //
/////////////////////

/// Answers "which other points lie within `eps` of point `i`"
///
/// The tree (points mode) is built once and only read afterwards, so
/// neighbourhoods can be collected from several threads at once.
#[derive(Debug)]
pub enum NeighbourSource<'a, T> {
    /// Balanced KD-tree with the row index as payload
    Tree {
        tree: KdTree<T, usize>,
        data: &'a [T],
        dim: usize,
    },
    /// Row-major `n x n` distance matrix
    Matrix { data: &'a [T], n: usize },
}

impl<'a, T> NeighbourSource<'a, T>
where
    T: KdFloat,
{
    /// Generate a new neighbour source
    ///
    /// ### Params
    ///
    /// * `data` - Flat, row-major input
    /// * `ncols` - Number of columns of the input (dimensionality for points,
    ///   `n` for a distance matrix)
    /// * `kind` - How to read `data`
    ///
    /// ### Returns
    ///
    /// The source; builds the KD-tree in points mode
    pub fn new(data: &'a [T], ncols: usize, kind: DataKind) -> Result<Self> {
        let rows = validate_flat(data, ncols)?;

        match kind {
            DataKind::Points => {
                let tree = KdTree::balanced(data, ncols, (0..rows).collect())?;
                Ok(Self::Tree {
                    tree,
                    data,
                    dim: ncols,
                })
            }
            DataKind::DistanceMatrix => {
                if rows != ncols {
                    return Err(ClusterError::NonSquareDistanceMatrix { rows, cols: ncols });
                }
                if data.iter().any(|d| *d < T::zero()) {
                    return Err(ClusterError::InvalidParameter {
                        name: "distance_matrix",
                        reason: "distances must be non-negative".into(),
                    });
                }
                Ok(Self::Matrix { data, n: rows })
            }
        }
    }

    /// Number of points
    pub fn len(&self) -> usize {
        match self {
            Self::Tree { tree, .. } => tree.len(),
            Self::Matrix { n, .. } => *n,
        }
    }

    /// Is the source empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Neighbours of a single point
    ///
    /// ### Params
    ///
    /// * `index` - The point
    /// * `eps` - Neighbourhood radius (inclusive)
    ///
    /// ### Returns
    ///
    /// `(neighbour, distance)` pairs; the point itself is never included
    pub fn neighbours(&self, index: usize, eps: T) -> Result<Vec<(usize, T)>> {
        if index >= self.len() {
            return Err(ClusterError::InvalidParameter {
                name: "index",
                reason: format!("point {} out of range for {} points", index, self.len()),
            });
        }

        match self {
            Self::Tree { tree, data, dim } => {
                let point = &data[index * dim..(index + 1) * dim];
                let mut neighbours = Vec::new();
                KdSearcher::new(tree, point, eps)?.find_with_visitor(|node, dist| {
                    if let Some(&other) = tree.payload(node) {
                        if other != index {
                            neighbours.push((other, dist));
                        }
                    }
                });
                Ok(neighbours)
            }
            Self::Matrix { data, n } => {
                let row = &data[index * n..(index + 1) * n];
                Ok(row
                    .iter()
                    .enumerate()
                    .filter(|&(j, &d)| j != index && d <= eps)
                    .map(|(j, &d)| (j, d))
                    .collect())
            }
        }
    }

    /// Neighbourhoods of every point
    ///
    /// ### Params
    ///
    /// * `eps` - Neighbourhood radius
    /// * `trigger` - Minimum number of points before fanning out over threads
    ///
    /// ### Returns
    ///
    /// One neighbour list per point, in point order
    pub fn collect_all(&self, eps: T, trigger: usize) -> Result<Vec<Vec<(usize, T)>>> {
        validate_radius("eps", eps)?;

        let neighbourhoods = parallel_map(0..self.len(), trigger, |i| self.neighbours(i, eps))
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Collected {} neighbourhoods ({} neighbour entries)",
            neighbourhoods.len(),
            neighbourhoods.iter().map(Vec::len).sum::<usize>()
        );

        Ok(neighbourhoods)
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_data_kind() {
        assert_eq!(parse_data_kind("points"), Some(DataKind::Points));
        assert_eq!(parse_data_kind("POINTS"), Some(DataKind::Points));
        assert_eq!(
            parse_data_kind("distance_matrix"),
            Some(DataKind::DistanceMatrix)
        );
        assert_eq!(parse_data_kind("matrix"), None);
    }

    #[test]
    fn test_tree_and_matrix_agree() {
        let points = [0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 5.0, 5.0];
        let n = 4;
        let matrix: Vec<f64> = (0..n * n)
            .map(|k| {
                let (i, j) = (k / n, k % n);
                euclidean_norm_distance(&points[i * 2..i * 2 + 2], &points[j * 2..j * 2 + 2])
            })
            .collect();

        let tree_source = NeighbourSource::new(&points, 2, DataKind::Points).unwrap();
        let matrix_source = NeighbourSource::new(&matrix, n, DataKind::DistanceMatrix).unwrap();
        assert_eq!(tree_source.len(), 4);
        assert_eq!(matrix_source.len(), 4);

        for eps in [0.5, 1.0, 1.5, 10.0] {
            let from_tree = tree_source.collect_all(eps, 1).unwrap();
            let from_matrix = matrix_source.collect_all(eps, 1).unwrap();

            for (mut a, mut b) in from_tree.into_iter().zip(from_matrix) {
                a.sort_by_key(|&(j, _)| j);
                b.sort_by_key(|&(j, _)| j);
                assert_eq!(a.len(), b.len());
                for ((ia, da), (ib, db)) in a.iter().zip(b.iter()) {
                    assert_eq!(ia, ib);
                    assert_relative_eq!(*da, *db, epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_self_excluded() {
        let points = [1.0, 1.0, 1.0, 1.0];
        let source = NeighbourSource::new(&points, 2, DataKind::Points).unwrap();

        // the duplicate is a neighbour, the point itself is not
        assert_eq!(source.neighbours(0, 0.0).unwrap(), vec![(1, 0.0)]);
        assert_eq!(source.neighbours(1, 0.0).unwrap(), vec![(0, 0.0)]);
    }

    #[test]
    fn test_out_of_range_index() {
        let points = [0.0, 0.0, 1.0, 1.0];
        let matrix = [0.0, 1.0, 1.0, 0.0];

        let tree_source = NeighbourSource::new(&points, 2, DataKind::Points).unwrap();
        let matrix_source = NeighbourSource::new(&matrix, 2, DataKind::DistanceMatrix).unwrap();

        for source in [&tree_source, &matrix_source] {
            assert!(matches!(
                source.neighbours(2, 1.0),
                Err(ClusterError::InvalidParameter { name: "index", .. })
            ));
        }
    }

    #[test]
    fn test_matrix_validation() {
        let err = NeighbourSource::new(&[0.0, 1.0, 1.0, 0.0, 2.0, 2.0], 2, DataKind::DistanceMatrix)
            .unwrap_err();
        assert_eq!(err, ClusterError::NonSquareDistanceMatrix { rows: 3, cols: 2 });

        assert!(NeighbourSource::new(&[0.0, -1.0, -1.0, 0.0], 2, DataKind::DistanceMatrix).is_err());
    }

    #[test]
    fn test_invalid_eps() {
        let source = NeighbourSource::new(&[0.0_f32, 1.0], 1, DataKind::Points).unwrap();
        assert!(source.collect_all(-0.5, 1).is_err());
    }
}
