use num_traits::Float;

///////////////////////
// Ordering analyser //
///////////////////////

/// Analyses the reachability profile of an OPTICS cluster ordering
///
/// The profile holds the defined reachability distances along the ordering;
/// points that start a new expansion (undefined reachability) are left out.
/// Valleys of the profile are clusters, peaks above a radius separate them.
///
/// ### Fields
///
/// * `ordering` - Reachability distances in cluster-ordering order
#[derive(Clone, Debug)]
pub struct OrderingAnalyser<T> {
    ordering: Vec<T>,
}

impl<T> OrderingAnalyser<T>
where
    T: Float,
{
    /// Generate a new analyser
    ///
    /// ### Params
    ///
    /// * `ordering` - Defined reachability distances along the ordering
    pub fn new(ordering: Vec<T>) -> Self {
        Self { ordering }
    }

    /// Number of clusters a threshold scan at `radius` would separate
    ///
    /// Every run of values at or above the radius opens a new cluster. Inside
    /// such a run, a descent followed by another rise counts as a further
    /// separator. A profile of identical values entirely above the radius
    /// yields zero.
    ///
    /// ### Params
    ///
    /// * `radius` - Connectivity radius
    ///
    /// ### Returns
    ///
    /// Estimated number of clusters
    pub fn extract_cluster_amount(&self, radius: T) -> usize {
        if self.ordering.is_empty() {
            return 0;
        }

        let mut amount = 1;
        let mut in_peak = false;
        let mut descending = false;
        let mut all_equal = true;
        let mut previous_peak: Option<T> = None;
        let mut previous: Option<T> = None;

        for &distance in &self.ordering {
            if distance >= radius {
                if !in_peak {
                    in_peak = true;
                    amount += 1;
                } else if let Some(peak) = previous_peak {
                    if distance < peak && !descending {
                        descending = true;
                    } else if distance > peak && descending {
                        descending = false;
                        amount += 1;
                    }
                }
                previous_peak = Some(distance);
            } else {
                in_peak = false;
                descending = false;
            }

            if previous.is_some_and(|prev| prev != distance) {
                all_equal = false;
            }
            previous = Some(distance);
        }

        if all_equal && previous.is_some_and(|last| last > radius) {
            amount = 0;
        }

        amount
    }

    /// Search the radius that separates exactly `amount` clusters
    ///
    /// Bisection over `[0, max reachability]`. Best effort: profiles without
    /// enough distinct peaks have no such radius.
    ///
    /// ### Params
    ///
    /// * `amount` - Requested number of clusters
    /// * `max_iterations` - Bisection steps before giving up
    ///
    /// ### Returns
    ///
    /// The radius, `None` if none was found
    pub fn calculate_connectivity_radius(&self, amount: usize, max_iterations: usize) -> Option<T> {
        let maximum = self.ordering.iter().copied().reduce(T::max)?;

        if self.extract_cluster_amount(maximum) > amount {
            return None;
        }

        let two = T::one() + T::one();
        let mut lower = T::zero();
        let mut upper = maximum;

        for _ in 0..max_iterations {
            let radius = (lower + upper) / two;
            let found = self.extract_cluster_amount(radius);

            if found == amount {
                return Some(radius);
            }
            if found == 0 {
                break;
            }
            if found > amount {
                lower = radius;
            } else {
                upper = radius;
            }
        }

        None
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;

    fn two_valleys() -> OrderingAnalyser<f64> {
        OrderingAnalyser::new(vec![0.5, 0.4, 0.6, 5.0, 0.5, 0.3])
    }

    #[test]
    fn test_extract_cluster_amount() {
        let analyser = two_valleys();
        assert_eq!(analyser.extract_cluster_amount(1.0), 2);
        assert_eq!(analyser.extract_cluster_amount(6.0), 1);
    }

    #[test]
    fn test_three_valleys() {
        let analyser = OrderingAnalyser::new(vec![0.2, 0.3, 4.0, 0.2, 0.25, 7.0, 0.3]);
        assert_eq!(analyser.extract_cluster_amount(1.0), 3);
        assert_eq!(analyser.extract_cluster_amount(5.0), 2);
    }

    #[test]
    fn test_flat_profile() {
        let analyser = OrderingAnalyser::new(vec![1.0, 1.0, 1.0]);
        assert_eq!(analyser.extract_cluster_amount(0.5), 0);
        assert_eq!(analyser.extract_cluster_amount(2.0), 1);
    }

    #[test]
    fn test_empty_profile() {
        let analyser: OrderingAnalyser<f64> = OrderingAnalyser::new(Vec::new());
        assert_eq!(analyser.extract_cluster_amount(1.0), 0);
        assert_eq!(analyser.calculate_connectivity_radius(1, 100), None);
    }

    #[test]
    fn test_connectivity_radius() {
        let analyser = OrderingAnalyser::new(vec![0.2, 0.3, 4.0, 0.2, 0.25, 7.0, 0.3]);

        let radius = analyser.calculate_connectivity_radius(3, 100).unwrap();
        assert_eq!(analyser.extract_cluster_amount(radius), 3);
        assert!(radius > 0.3 && radius <= 4.0);

        let radius = analyser.calculate_connectivity_radius(2, 100).unwrap();
        assert_eq!(analyser.extract_cluster_amount(radius), 2);
        assert!(radius > 4.0 && radius <= 7.0);
    }

    #[test]
    fn test_connectivity_radius_unreachable() {
        let analyser = two_valleys();
        assert_eq!(analyser.calculate_connectivity_radius(5, 100), None);

        let flat = OrderingAnalyser::new(vec![1.0, 1.0, 1.0, 1.0]);
        assert_eq!(flat.calculate_connectivity_radius(3, 100), None);
    }
}
