use num_traits::{Float, FromPrimitive, ToPrimitive};
use std::fmt::Debug;
use std::iter::Sum;

/// Trait for floating-point types used by the tree and the clustering
/// algorithms. Has all of the common floating-point operations and traits.
pub trait KdFloat: Float + FromPrimitive + ToPrimitive + Send + Sync + Sum + Debug {}

impl<T> KdFloat for T where T: Float + FromPrimitive + ToPrimitive + Send + Sync + Sum + Debug {}
