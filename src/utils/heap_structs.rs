use num_traits::Float;
use std::cmp::Ordering;

///////////////////
// Float on heap //
///////////////////

/// Wrapper for floats that implements Ord for use in BinaryHeap
///
/// NaN compares equal to everything; inputs are validated to be finite before
/// they ever reach a heap.
#[derive(Clone, Copy, Debug)]
pub struct OrderedFloat<T>(pub T);

impl<T: Float> PartialEq for OrderedFloat<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: Float> Eq for OrderedFloat<T> {}

impl<T: Float> PartialOrd for OrderedFloat<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Float> Ord for OrderedFloat<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

///////////////
// Seed list //
///////////////

/// Entry of the OPTICS seed list
///
/// Ordered so that a max-heap (`BinaryHeap`) pops the smallest reachability
/// first; equal reachabilities pop the smaller point index first.
///
/// ### Fields
///
/// * `reachability` - Reachability distance at the time of insertion
/// * `index` - Index of the point
#[derive(Clone, Copy, Debug)]
pub struct SeedEntry<T> {
    pub reachability: T,
    pub index: usize,
}

impl<T: Float> PartialEq for SeedEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Float> Eq for SeedEntry<T> {}

impl<T: Float> PartialOrd for SeedEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Float> Ord for SeedEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        OrderedFloat(other.reachability)
            .cmp(&OrderedFloat(self.reachability))
            .then_with(|| other.index.cmp(&self.index))
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Reverse;
    use std::collections::BinaryHeap;

    #[test]
    fn test_ordered_float_min_heap() {
        let mut heap = BinaryHeap::new();
        for v in [3.0_f64, 1.0, 2.0] {
            heap.push(Reverse(OrderedFloat(v)));
        }

        assert_eq!(heap.pop().unwrap().0 .0, 1.0);
        assert_eq!(heap.pop().unwrap().0 .0, 2.0);
        assert_eq!(heap.pop().unwrap().0 .0, 3.0);
    }

    #[test]
    fn test_seed_entry_pops_smallest_reachability() {
        let mut heap = BinaryHeap::new();
        heap.push(SeedEntry {
            reachability: 0.5_f64,
            index: 4,
        });
        heap.push(SeedEntry {
            reachability: 0.1,
            index: 9,
        });
        heap.push(SeedEntry {
            reachability: 0.5,
            index: 2,
        });

        let order: Vec<usize> = std::iter::from_fn(|| heap.pop().map(|e| e.index)).collect();
        assert_eq!(order, vec![9, 2, 4]);
    }
}
