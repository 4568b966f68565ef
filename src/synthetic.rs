use faer::Mat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::utils::KdFloat;

/// Generate synthetic data with cluster structure
///
/// Cluster centres are drawn uniformly from `[-1, 1]^dim`; samples are
/// assigned round-robin (`i % n_clusters`) and jittered uniformly.
///
/// ### Params
///
/// * `n_samples` - Number of samples
/// * `dim` - Dimensionality
/// * `n_clusters` - Number of distinct clusters
/// * `cluster_std` - Half-width of the jitter around a centre
/// * `seed` - Random seed for reproducibility
///
/// ### Returns
///
/// Matrix of shape (n_samples, dim)
pub fn generate_clustered_data<T>(
    n_samples: usize,
    dim: usize,
    n_clusters: usize,
    cluster_std: f64,
    seed: u64,
) -> Mat<T>
where
    T: KdFloat,
{
    let mut rng = StdRng::seed_from_u64(seed);

    let centres: Vec<Vec<f64>> = (0..n_clusters.max(1))
        .map(|_| (0..dim).map(|_| rng.random_range(-1.0..1.0)).collect())
        .collect();

    let mut values = Vec::with_capacity(n_samples * dim);
    for i in 0..n_samples {
        let centre = &centres[i % centres.len()];
        for &c in centre {
            let noise = if cluster_std > 0.0 {
                rng.random_range(-cluster_std..cluster_std)
            } else {
                0.0
            };
            values.push(T::from_f64(c + noise).unwrap_or_else(T::zero));
        }
    }

    Mat::from_fn(n_samples, dim, |i, j| values[i * dim + j])
}

/// Generate blobs around fixed centres
///
/// Samples are laid out blob by blob: rows `[b * per_blob, (b + 1) *
/// per_blob)` belong to blob `b`.
///
/// ### Params
///
/// * `centres` - One centre per blob; all of the same dimensionality
/// * `per_blob` - Samples per blob
/// * `spread` - Half-width of the uniform jitter around a centre
/// * `seed` - Random seed for reproducibility
///
/// ### Returns
///
/// Tuple of `(matrix of shape (centres.len() * per_blob, dim), blob label
/// per row)`
pub fn generate_blobs<T>(
    centres: &[Vec<f64>],
    per_blob: usize,
    spread: f64,
    seed: u64,
) -> (Mat<T>, Vec<usize>)
where
    T: KdFloat,
{
    let mut rng = StdRng::seed_from_u64(seed);
    let dim = centres.first().map_or(0, Vec::len);
    let n_samples = centres.len() * per_blob;

    let mut values = Vec::with_capacity(n_samples * dim);
    let mut labels = Vec::with_capacity(n_samples);
    for (label, centre) in centres.iter().enumerate() {
        assert_eq!(centre.len(), dim, "All centres need the same dimensionality");
        for _ in 0..per_blob {
            for &c in centre {
                let noise = if spread > 0.0 {
                    rng.random_range(-spread..spread)
                } else {
                    0.0
                };
                values.push(T::from_f64(c + noise).unwrap_or_else(T::zero));
            }
            labels.push(label);
        }
    }

    (Mat::from_fn(n_samples, dim, |i, j| values[i * dim + j]), labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_clustered_data_shape_and_seed() {
        let a = generate_clustered_data::<f64>(50, 3, 4, 0.1, 42);
        let b = generate_clustered_data::<f64>(50, 3, 4, 0.1, 42);

        assert_eq!(a.nrows(), 50);
        assert_eq!(a.ncols(), 3);
        for i in 0..50 {
            for j in 0..3 {
                assert_eq!(a[(i, j)], b[(i, j)]);
            }
        }
    }

    #[test]
    fn test_generate_blobs() {
        let centres = vec![vec![0.0, 0.0], vec![5.0, 5.0]];
        let (mat, labels) = generate_blobs::<f32>(&centres, 10, 0.25, 1);

        assert_eq!(mat.nrows(), 20);
        assert_eq!(labels.len(), 20);
        for i in 0..20 {
            let centre = &centres[labels[i]];
            for j in 0..2 {
                assert!((mat[(i, j)] as f64 - centre[j]).abs() <= 0.25);
            }
        }
    }
}
