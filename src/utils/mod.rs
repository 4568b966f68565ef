pub mod dist;
pub mod heap_structs;
pub mod traits;

use faer::MatRef;
use num_traits::Float;

pub use crate::utils::dist::*;
pub use crate::utils::heap_structs::*;
pub use crate::utils::traits::*;

use crate::error::{ClusterError, Result};

/////////////
// Helpers //
/////////////

/// Flatten a matrix into a row-major vector
///
/// ### Params
///
/// * `data` - The data matrix. Rows represent the samples, columns represent
///   the dimensions
///
/// ### Returns
///
/// Tuple of `(vectors_flat, n_samples, dim)`
pub fn matrix_to_flat<T>(data: MatRef<T>) -> (Vec<T>, usize, usize)
where
    T: Float,
{
    let n = data.nrows();
    let dim = data.ncols();

    let mut vectors_flat = Vec::with_capacity(n * dim);
    for i in 0..n {
        vectors_flat.extend(data.row(i).iter().cloned());
    }

    (vectors_flat, n, dim)
}

////////////////
// Validation //
////////////////

/// Check that a flat buffer splits into finite rows of `dim`
///
/// ### Params
///
/// * `data` - Flat, row-major coordinates
/// * `dim` - Dimensionality of a single point
///
/// ### Returns
///
/// The number of points in the buffer
pub fn validate_flat<T>(data: &[T], dim: usize) -> Result<usize>
where
    T: Float,
{
    if dim == 0 {
        return Err(ClusterError::InvalidDimension);
    }
    if data.len() % dim != 0 {
        return Err(ClusterError::RaggedInput {
            len: data.len(),
            dim,
        });
    }

    for (pos, value) in data.iter().enumerate() {
        if !value.is_finite() {
            return Err(ClusterError::NonFiniteCoordinate {
                point: pos / dim,
                dim: pos % dim,
            });
        }
    }

    Ok(data.len() / dim)
}

/// Check that a point has the expected dimensionality
pub fn validate_point<T>(point: &[T], dim: usize) -> Result<()> {
    if point.len() != dim {
        return Err(ClusterError::DimensionMismatch {
            expected: dim,
            found: point.len(),
        });
    }
    Ok(())
}

/// Check that a radius-like parameter is finite and non-negative
///
/// ### Params
///
/// * `name` - Name of the parameter, used in the error
/// * `value` - The value to check
pub fn validate_radius<T>(name: &'static str, value: T) -> Result<()>
where
    T: Float,
{
    if !value.is_finite() || value < T::zero() {
        return Err(ClusterError::InvalidParameter {
            name,
            reason: "must be finite and non-negative".into(),
        });
    }
    Ok(())
}

///////////
// Tests //
///////////
