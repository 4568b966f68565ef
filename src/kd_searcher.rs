use crate::error::Result;
use crate::kd_tree::{KdTree, NodeId};
use crate::utils::*;

//////////////
// Visitors //
//////////////

/// What to do with a node that lies within the current search bound
///
/// All three searches share one descent; they differ only in how qualifying
/// nodes are accumulated and whether the bound shrinks while searching.
trait NodeVisitor<T> {
    /// Current squared search radius
    fn bound(&self) -> T;

    /// Record a node at squared distance `sqr_dist <= bound()`
    fn visit(&mut self, node: NodeId, sqr_dist: T);
}

/// Collects every node within the radius
struct CollectAll<T> {
    sqr_radius: T,
    distances: Vec<T>,
    nodes: Vec<NodeId>,
}

impl<T: KdFloat> NodeVisitor<T> for CollectAll<T> {
    fn bound(&self) -> T {
        self.sqr_radius
    }

    fn visit(&mut self, node: NodeId, sqr_dist: T) {
        self.distances.push(sqr_dist.sqrt());
        self.nodes.push(node);
    }
}

/// Keeps the single closest node and tightens the bound to it
struct NearestOnly<T> {
    sqr_radius: T,
    best: Option<(NodeId, T)>,
}

impl<T: KdFloat> NodeVisitor<T> for NearestOnly<T> {
    fn bound(&self) -> T {
        match self.best {
            Some((_, best)) => best,
            None => self.sqr_radius,
        }
    }

    fn visit(&mut self, node: NodeId, sqr_dist: T) {
        match self.best {
            Some((_, best)) if sqr_dist >= best => {}
            _ => self.best = Some((node, sqr_dist)),
        }
    }
}

/// Forwards every node within the radius to a caller-supplied closure
struct Callback<T, F> {
    sqr_radius: T,
    f: F,
}

impl<T, F> NodeVisitor<T> for Callback<T, F>
where
    T: KdFloat,
    F: FnMut(NodeId, T),
{
    fn bound(&self) -> T {
        self.sqr_radius
    }

    fn visit(&mut self, node: NodeId, sqr_dist: T) {
        (self.f)(node, sqr_dist.sqrt())
    }
}

//////////////
// Searcher //
//////////////

/// Radius / nearest-neighbour query against a [`KdTree`]
///
/// Holds no ownership over tree nodes; any number of searchers can borrow the
/// same tree concurrently.
///
/// ### Fields
///
/// * `tree` - The tree to search
/// * `point` - Query point
/// * `sqr_radius` - Squared search radius
/// * `start` - Node the descent starts from (root by default)
#[derive(Debug)]
pub struct KdSearcher<'t, T, P> {
    tree: &'t KdTree<T, P>,
    point: Vec<T>,
    sqr_radius: T,
    start: Option<NodeId>,
}

impl<'t, T, P> KdSearcher<'t, T, P>
where
    T: KdFloat,
{
    /// Generate a new searcher
    ///
    /// ### Params
    ///
    /// * `tree` - Tree to search
    /// * `point` - Query point, must have the tree's dimensionality
    /// * `radius` - Search radius, finite and non-negative
    ///
    /// ### Returns
    ///
    /// Initialised searcher starting at the root
    pub fn new(tree: &'t KdTree<T, P>, point: &[T], radius: T) -> Result<Self> {
        validate_point(point, tree.dim())?;
        validate_radius("radius", radius)?;

        Ok(Self {
            tree,
            point: point.to_vec(),
            sqr_radius: radius * radius,
            start: tree.root(),
        })
    }

    /// Generate a searcher without radius cutoff (for nearest-neighbour
    /// queries)
    pub fn unbounded(tree: &'t KdTree<T, P>, point: &[T]) -> Result<Self> {
        validate_point(point, tree.dim())?;

        Ok(Self {
            tree,
            point: point.to_vec(),
            sqr_radius: T::infinity(),
            start: tree.root(),
        })
    }

    /// Restrict the search to the subtree rooted at `node`
    pub fn starting_at(mut self, node: NodeId) -> Self {
        self.start = Some(node);
        self
    }

    /// Find all nodes within the radius
    ///
    /// ### Returns
    ///
    /// Tuple of `(distances, nodes)`; distances are Euclidean, not squared
    pub fn find_nearest_nodes(&self) -> (Vec<T>, Vec<NodeId>) {
        let mut visitor = CollectAll {
            sqr_radius: self.sqr_radius,
            distances: Vec::new(),
            nodes: Vec::new(),
        };
        self.search(&mut visitor);

        (visitor.distances, visitor.nodes)
    }

    /// Find the single closest node within the radius
    ///
    /// ### Returns
    ///
    /// `(node, distance)` of the closest node, `None` if nothing lies within
    /// the radius. Among equidistant nodes the first one reached wins.
    pub fn find_nearest_node(&self) -> Option<(NodeId, T)> {
        let mut visitor = NearestOnly {
            sqr_radius: self.sqr_radius,
            best: None,
        };
        self.search(&mut visitor);

        visitor.best.map(|(node, sqr_dist)| (node, sqr_dist.sqrt()))
    }

    /// Call `f(node, distance)` for every node within the radius
    ///
    /// Lets callers filter during the query, e.g. skipping the query point
    /// itself, instead of post-processing a buffer.
    pub fn find_with_visitor<F>(&self, f: F)
    where
        F: FnMut(NodeId, T),
    {
        let mut visitor = Callback {
            sqr_radius: self.sqr_radius,
            f,
        };
        self.search(&mut visitor);
    }

    fn search<V: NodeVisitor<T>>(&self, visitor: &mut V) {
        if let Some(start) = self.start {
            self.descend(start, visitor);
        }
    }

    /// Pruned recursive descent
    ///
    /// Children are handled before the node itself, so pruning only ever
    /// depends on the split plane.
    fn descend<V: NodeVisitor<T>>(&self, id: NodeId, visitor: &mut V) {
        let node = self.tree.node(id);
        let d = node.discriminator();
        let split = self.tree.vector(id.index())[d];

        if let Some(right) = node.right() {
            if self.point[d] >= split - visitor.bound().sqrt() {
                self.descend(right, visitor);
            }
        }

        if let Some(left) = node.left() {
            if self.point[d] < split + visitor.bound().sqrt() {
                self.descend(left, visitor);
            }
        }

        let sqr_dist = self.tree.euclidean_distance_to_query(id.index(), &self.point);
        if sqr_dist <= visitor.bound() {
            visitor.visit(id, sqr_dist);
        }
    }
}

///////////
// Tests //
///////////
