use num_traits::Float;

////////////////////
// VectorDistance //
////////////////////

/// Trait for computing distances between vectors stored in a flat buffer
pub trait VectorDistance<T>
where
    T: Float,
{
    /// Get the internal flat vector representation
    fn vectors_flat(&self) -> &[T];

    /// Get the internal dimensions
    fn dim(&self) -> usize;

    /// Slice of the vector stored at slot `i`
    #[inline(always)]
    fn vector(&self, i: usize) -> &[T] {
        let start = i * self.dim();
        &self.vectors_flat()[start..start + self.dim()]
    }

    /// Euclidean distance between query vector and internal vector (squared)
    ///
    /// ### Params
    ///
    /// * `internal_idx` - Slot index of the internal vector
    /// * `query` - Query vector slice
    ///
    /// ### Returns
    ///
    /// The squared Euclidean distance
    #[inline(always)]
    fn euclidean_distance_to_query(&self, internal_idx: usize, query: &[T]) -> T {
        euclidean_distance_static(self.vector(internal_idx), query)
    }
}

/////////////
// Statics //
/////////////

/// Static Euclidean distance between two arbitrary vectors (squared)
///
/// ### Params
///
/// * `a` - Slice of vector one
/// * `b` - Slice of vector two
///
/// ### Returns
///
/// Squared euclidean distance
#[inline(always)]
pub fn euclidean_distance_static<T>(a: &[T], b: &[T]) -> T
where
    T: Float,
{
    assert!(a.len() == b.len(), "Vectors a and b need to have same len!");

    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let diff = x - y;
            diff * diff
        })
        .fold(T::zero(), |acc, x| acc + x)
}

/// Static Euclidean distance between two arbitrary vectors
///
/// Same as [`euclidean_distance_static`], followed by the square root.
#[inline(always)]
pub fn euclidean_norm_distance<T>(a: &[T], b: &[T]) -> T
where
    T: Float,
{
    euclidean_distance_static(a, b).sqrt()
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct TestVectors {
        data: Vec<f32>,
        dim: usize,
    }

    impl VectorDistance<f32> for TestVectors {
        fn vectors_flat(&self) -> &[f32] {
            &self.data
        }

        fn dim(&self) -> usize {
            self.dim
        }
    }

    #[test]
    fn test_euclidean_distance_basic() {
        let vecs = TestVectors {
            data: vec![0.0, 0.0, 3.0, 4.0, 1.0, 1.0],
            dim: 2,
        };

        assert_relative_eq!(vecs.euclidean_distance_to_query(0, &[3.0, 4.0]), 25.0);
        assert_relative_eq!(vecs.euclidean_distance_to_query(2, &[0.0, 0.0]), 2.0);
        assert_relative_eq!(vecs.euclidean_distance_to_query(1, &[3.0, 4.0]), 0.0);
        assert_eq!(vecs.vector(1), &[3.0, 4.0]);
    }

    #[test]
    fn test_euclidean_distance_symmetry() {
        let a = [1.5_f32, -2.0, 7.0];
        let b = [0.25_f32, 3.0, 9.0];

        assert_relative_eq!(euclidean_distance_static(&a, &b), euclidean_distance_static(&b, &a));
    }

    #[test]
    fn test_distance_to_query() {
        let vecs = TestVectors {
            data: vec![1.0, 2.0, 3.0],
            dim: 3,
        };

        assert_relative_eq!(vecs.euclidean_distance_to_query(0, &[1.0, 2.0, 5.0]), 4.0);
    }

    #[test]
    fn test_norm_distance() {
        assert_relative_eq!(euclidean_norm_distance(&[0.0_f64, 0.0], &[3.0, 4.0]), 5.0);
    }

    #[test]
    #[should_panic(expected = "same len")]
    fn test_mismatched_lengths_panic() {
        euclidean_distance_static(&[1.0_f64, 2.0], &[1.0]);
    }
}
