use log::debug;

use crate::error::{ClusterError, Result};
use crate::utils::*;

////////////////
// Main types //
////////////////

/// Index of a node inside the tree arena
///
/// Ids stay stable for the lifetime of the node; a removed node's slot is
/// recycled by later insertions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Slot of the node in the arena (and in the flat coordinate buffer)
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A single point of the tree
///
/// Coordinates are not stored on the node itself but in the flat buffer of
/// the owning [`KdTree`] at slot `id * dim`.
///
/// ### Fields
///
/// * `payload` - User data attached to the point
/// * `left` - Subtree with coordinate `discriminator` strictly smaller
/// * `right` - Subtree with coordinate `discriminator` greater or equal
/// * `parent` - Back-reference, only used for upward traversal
/// * `discriminator` - Axis this node splits on
#[derive(Clone, Debug)]
pub struct KdNode<P> {
    payload: P,
    left: Option<NodeId>,
    right: Option<NodeId>,
    parent: Option<NodeId>,
    discriminator: usize,
}

impl<P> KdNode<P> {
    fn new(payload: P, parent: Option<NodeId>, discriminator: usize) -> Self {
        Self {
            payload,
            left: None,
            right: None,
            parent,
            discriminator,
        }
    }

    /// User payload
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Left child
    pub fn left(&self) -> Option<NodeId> {
        self.left
    }

    /// Right child
    pub fn right(&self) -> Option<NodeId> {
        self.right
    }

    /// Parent node, `None` for the root
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Splitting axis
    pub fn discriminator(&self) -> usize {
        self.discriminator
    }

    /// Does the node have no children
    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// KD-tree over `dim`-dimensional points with a payload per point
///
/// Nodes live in an arena addressed by [`NodeId`]; the tree owns every node
/// and parent links are plain indices.
///
/// ### Fields
///
/// * `vectors_flat` - Coordinates of all slots, flattened for cache locality
/// * `nodes` - Arena of nodes; `None` marks a free slot
/// * `free` - Free slots available for reuse
/// * `root` - Root node, `None` for an empty tree
/// * `dim` - Dimensionality of every point in the tree
/// * `size` - Number of live nodes
#[derive(Clone, Debug)]
pub struct KdTree<T, P = usize> {
    vectors_flat: Vec<T>,
    nodes: Vec<Option<KdNode<P>>>,
    free: Vec<NodeId>,
    root: Option<NodeId>,
    dim: usize,
    size: usize,
}

////////////////////
// VectorDistance //
////////////////////

impl<T, P> VectorDistance<T> for KdTree<T, P>
where
    T: KdFloat,
{
    fn vectors_flat(&self) -> &[T] {
        &self.vectors_flat
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

impl<T, P> KdTree<T, P>
where
    T: KdFloat,
{
    //////////////////
    // Construction //
    //////////////////

    /// Generate an empty tree
    ///
    /// ### Params
    ///
    /// * `dim` - Dimensionality of the points that will be inserted
    ///
    /// ### Returns
    ///
    /// Empty tree, or an error if `dim == 0`
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(ClusterError::InvalidDimension);
        }

        Ok(Self {
            vectors_flat: Vec::new(),
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            dim,
            size: 0,
        })
    }

    /// Build a depth-balanced tree from a static dataset
    ///
    /// Each level partitions its index range around the median along the
    /// current discriminator (selection, not a full sort). Points equal to the
    /// median go to the right, so the strict-left invariant holds. The node of
    /// row `i` gets `NodeId` slot `i`.
    ///
    /// ### Params
    ///
    /// * `data` - Flat, row-major coordinates
    /// * `dim` - Dimensionality of the points
    /// * `payloads` - One payload per row
    ///
    /// ### Returns
    ///
    /// The balanced tree
    pub fn balanced(data: &[T], dim: usize, payloads: Vec<P>) -> Result<Self> {
        let n = validate_flat(data, dim)?;
        if payloads.len() != n {
            return Err(ClusterError::PayloadMismatch {
                points: n,
                payloads: payloads.len(),
            });
        }

        let nodes = payloads
            .into_iter()
            .map(|payload| Some(KdNode::new(payload, None, 0)))
            .collect();

        let mut tree = Self {
            vectors_flat: data.to_vec(),
            nodes,
            free: Vec::new(),
            root: None,
            dim,
            size: n,
        };

        let mut indices: Vec<usize> = (0..n).collect();
        tree.root = tree.build_balanced(&mut indices, 0, None);

        debug!(
            "Built balanced kd-tree: {} points, {} dims, height {}",
            n,
            dim,
            tree.height()
        );

        Ok(tree)
    }

    /// Recursive median partitioning for the balanced build
    ///
    /// ### Params
    ///
    /// * `indices` - Rows that belong into this subtree (reordered in place)
    /// * `discriminator` - Axis of the subtree root
    /// * `parent` - Parent of the subtree root
    ///
    /// ### Returns
    ///
    /// The root of the subtree
    fn build_balanced(
        &mut self,
        indices: &mut [usize],
        discriminator: usize,
        parent: Option<NodeId>,
    ) -> Option<NodeId> {
        if indices.is_empty() {
            return None;
        }

        let median = {
            let dim = self.dim;
            let coords = &self.vectors_flat;
            let key = |i: usize| coords[i * dim + discriminator];

            let mid = indices.len() / 2;
            indices.select_nth_unstable_by(mid, |&a, &b| {
                OrderedFloat(key(a)).cmp(&OrderedFloat(key(b)))
            });
            let pivot = key(indices[mid]);

            // pull everything equal to the pivot to the right of the median
            let mut lower = 0;
            for i in 0..mid {
                if key(indices[i]) < pivot {
                    indices.swap(i, lower);
                    lower += 1;
                }
            }
            indices.swap(lower, mid);
            lower
        };

        let id = NodeId(indices[median]);
        let next = (discriminator + 1) % self.dim;
        let (left_part, rest) = indices.split_at_mut(median);

        let left = self.build_balanced(left_part, next, Some(id));
        let right = self.build_balanced(&mut rest[1..], next, Some(id));

        let node = self.node_mut(id);
        node.left = left;
        node.right = right;
        node.parent = parent;
        node.discriminator = discriminator;

        Some(id)
    }

    ///////////////
    // Accessors //
    ///////////////

    /// Number of points in the tree
    pub fn len(&self) -> usize {
        self.size
    }

    /// Is the tree empty
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Root node
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Node stored under `id`, `None` if the slot is free or out of range
    pub fn get(&self, id: NodeId) -> Option<&KdNode<P>> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    /// Coordinates of a live node
    pub fn point(&self, id: NodeId) -> Option<&[T]> {
        self.get(id).map(|_| self.vector(id.0))
    }

    /// Payload of a live node
    pub fn payload(&self, id: NodeId) -> Option<&P> {
        self.get(id).map(|node| &node.payload)
    }

    /// Number of levels on the longest root-to-leaf path (0 for empty trees)
    pub fn height(&self) -> usize {
        let mut max_depth = 0;
        let mut stack: Vec<(NodeId, usize)> = self.root.iter().map(|&r| (r, 1)).collect();

        while let Some((id, depth)) = stack.pop() {
            let node = self.node(id);
            if node.is_leaf() {
                max_depth = max_depth.max(depth);
            }
            for child in [node.left, node.right].into_iter().flatten() {
                stack.push((child, depth + 1));
            }
        }

        max_depth
    }

    /// Pre-order traversal over all live node ids
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            let node = self.node(id);
            stack.extend(node.right);
            stack.extend(node.left);
            Some(id)
        })
    }

    #[inline]
    pub(crate) fn node(&self, id: NodeId) -> &KdNode<P> {
        match self.nodes.get(id.0) {
            Some(Some(node)) => node,
            _ => panic!("kd-tree node {} is not alive", id.0),
        }
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut KdNode<P> {
        match self.nodes.get_mut(id.0) {
            Some(Some(node)) => node,
            _ => panic!("kd-tree node {} is not alive", id.0),
        }
    }

    ///////////////
    // Insertion //
    ///////////////

    /// Insert a point
    ///
    /// Descends from the root, going left when `point[d]` is smaller than the
    /// node's coordinate and right otherwise. No rebalancing.
    ///
    /// ### Params
    ///
    /// * `point` - Coordinates of the new point
    /// * `payload` - Payload to attach
    ///
    /// ### Returns
    ///
    /// Id of the new node
    pub fn insert(&mut self, point: &[T], payload: P) -> Result<NodeId> {
        validate_point(point, self.dim)?;
        validate_flat(point, self.dim)?;

        let Some(mut current) = self.root else {
            let id = self.allocate(point, KdNode::new(payload, None, 0));
            self.root = Some(id);
            self.size += 1;
            return Ok(id);
        };

        loop {
            let node = self.node(current);
            let d = node.discriminator;
            let go_left = point[d] < self.vector(current.0)[d];
            let next = if go_left { node.left } else { node.right };

            match next {
                Some(child) => current = child,
                None => {
                    let child = KdNode::new(payload, Some(current), (d + 1) % self.dim);
                    let id = self.allocate(point, child);
                    let parent = self.node_mut(current);
                    if go_left {
                        parent.left = Some(id);
                    } else {
                        parent.right = Some(id);
                    }
                    self.size += 1;
                    return Ok(id);
                }
            }
        }
    }

    /// Store a node in a free slot or at the end of the arena
    fn allocate(&mut self, point: &[T], node: KdNode<P>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                let start = id.0 * self.dim;
                self.vectors_flat[start..start + self.dim].copy_from_slice(point);
                self.nodes[id.0] = Some(node);
                id
            }
            None => {
                self.vectors_flat.extend_from_slice(point);
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    ////////////
    // Lookup //
    ////////////

    /// Find a node with exactly these coordinates
    ///
    /// ### Params
    ///
    /// * `point` - Coordinates to look for
    ///
    /// ### Returns
    ///
    /// The first matching node on the descent path, if any
    pub fn find(&self, point: &[T]) -> Result<Option<NodeId>> {
        self.find_by(point, |_| true)
    }

    /// Descend towards `point` and return the first exact match accepted by
    /// `accept`
    fn find_by<F>(&self, point: &[T], accept: F) -> Result<Option<NodeId>>
    where
        F: Fn(&P) -> bool,
    {
        validate_point(point, self.dim)?;

        let mut current = self.root;
        while let Some(id) = current {
            let node = self.node(id);
            let coords = self.vector(id.0);
            if coords == point && accept(&node.payload) {
                return Ok(Some(id));
            }
            let d = node.discriminator;
            current = if point[d] < coords[d] {
                node.left
            } else {
                node.right
            };
        }

        Ok(None)
    }

    /// Find the node with the smallest coordinate along `discriminator` in the
    /// subtree rooted at `start`
    ///
    /// At levels splitting on `discriminator` only the left child can hold a
    /// smaller value; at every other level both children are searched.
    /// Duplicate-heavy subtrees degrade this to a full scan.
    ///
    /// ### Params
    ///
    /// * `start` - Root of the subtree
    /// * `discriminator` - Axis to minimise
    ///
    /// ### Returns
    ///
    /// Node holding the minimum, `None` if `start` is not alive or
    /// `discriminator` is out of range
    pub fn find_minimal_node(&self, start: NodeId, discriminator: usize) -> Option<NodeId> {
        if discriminator >= self.dim {
            return None;
        }
        let mut minimal = self.get(start).map(|_| start)?;
        let mut minimal_value = self.vector(start.0)[discriminator];
        let mut stack = vec![start];

        while let Some(id) = stack.pop() {
            let value = self.vector(id.0)[discriminator];
            if value < minimal_value {
                minimal = id;
                minimal_value = value;
            }

            let node = self.node(id);
            stack.extend(node.left);
            if node.discriminator != discriminator {
                stack.extend(node.right);
            }
        }

        Some(minimal)
    }

    /////////////
    // Removal //
    /////////////

    /// Remove one point with exactly these coordinates
    ///
    /// ### Returns
    ///
    /// `true` if a node was removed, `false` if the point was absent
    pub fn remove(&mut self, point: &[T]) -> Result<bool> {
        match self.find(point)? {
            Some(id) => Ok(self.remove_node(id).is_some()),
            None => Ok(false),
        }
    }

    /// Remove a node by id
    ///
    /// Leaves are detached. Inner nodes are replaced by the minimum along their
    /// discriminator taken from the right subtree (the left subtree is moved
    /// to the right first if there is no right one); the replacement is
    /// removed recursively from its old position.
    ///
    /// ### Returns
    ///
    /// The payload of the removed node, `None` if `id` is not alive
    pub fn remove_node(&mut self, id: NodeId) -> Option<P> {
        let parent = self.get(id)?.parent;
        let replacement = self.detach(id);

        match parent {
            None => self.root = replacement,
            Some(parent) => {
                let parent = self.node_mut(parent);
                if parent.left == Some(id) {
                    parent.left = replacement;
                } else {
                    parent.right = replacement;
                }
            }
        }

        self.size -= 1;
        self.free.push(id);
        self.nodes[id.0].take().map(|node| node.payload)
    }

    /// Unlink `id` from its subtree and return the node promoted into its
    /// position
    ///
    /// The caller relinks the parent; the promoted node already points at
    /// the parent of `id`.
    fn detach(&mut self, id: NodeId) -> Option<NodeId> {
        let (left, right, discriminator) = {
            let node = self.node(id);
            (node.left, node.right, node.discriminator)
        };

        let right = match (left, right) {
            (None, None) => return None,
            (Some(left), None) => {
                let node = self.node_mut(id);
                node.left = None;
                node.right = Some(left);
                left
            }
            (_, Some(right)) => right,
        };

        let Some(minimal) = self.find_minimal_node(right, discriminator) else {
            unreachable!("kd-tree structure is corrupted: dead child link")
        };
        let Some(minimal_parent) = self.node(minimal).parent else {
            unreachable!("kd-tree structure is corrupted: subtree node without parent")
        };

        let replacement = self.detach(minimal);
        let parent = self.node_mut(minimal_parent);
        if parent.left == Some(minimal) {
            parent.left = replacement;
        } else if parent.right == Some(minimal) {
            parent.right = replacement;
        } else {
            unreachable!("kd-tree structure is corrupted: node is not a child of its parent")
        }

        let (left, right, parent) = {
            let node = self.node(id);
            (node.left, node.right, node.parent)
        };

        let promoted = self.node_mut(minimal);
        promoted.left = left;
        promoted.right = right;
        promoted.parent = parent;
        promoted.discriminator = discriminator;

        for child in [left, right].into_iter().flatten() {
            self.node_mut(child).parent = Some(minimal);
        }

        Some(minimal)
    }
}

impl<T, P> KdTree<T, P>
where
    T: KdFloat,
    P: PartialEq,
{
    /// Find a node matching both coordinates and payload
    ///
    /// Disambiguates between points with identical coordinates.
    pub fn find_with_payload(&self, point: &[T], payload: &P) -> Result<Option<NodeId>> {
        self.find_by(point, |candidate| candidate == payload)
    }

    /// Remove the node matching both coordinates and payload
    ///
    /// ### Returns
    ///
    /// `true` if a node was removed, `false` if no such node exists
    pub fn remove_with_payload(&mut self, point: &[T], payload: &P) -> Result<bool> {
        match self.find_with_payload(point, payload)? {
            Some(id) => Ok(self.remove_node(id).is_some()),
            None => Ok(false),
        }
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    /// Walk the whole tree and check ordering, discriminator and parent links
    fn assert_invariants<P>(tree: &KdTree<f64, P>) {
        let mut count = 0;
        for id in tree.iter() {
            count += 1;
            let node = tree.node(id);
            let d = node.discriminator();
            let split = tree.point(id).unwrap()[d];

            for (child, is_left) in [(node.left(), true), (node.right(), false)] {
                let Some(child) = child else { continue };
                assert_eq!(tree.node(child).parent(), Some(id), "Broken parent link");
                assert_eq!(
                    tree.node(child).discriminator(),
                    (d + 1) % tree.dim(),
                    "Wrong child discriminator"
                );

                let mut stack = vec![child];
                while let Some(sub) = stack.pop() {
                    let value = tree.point(sub).unwrap()[d];
                    if is_left {
                        assert!(value < split, "Left subtree value {value} >= {split}");
                    } else {
                        assert!(value >= split, "Right subtree value {value} < {split}");
                    }
                    let sub_node = tree.node(sub);
                    stack.extend(sub_node.left());
                    stack.extend(sub_node.right());
                }
            }
        }
        assert_eq!(count, tree.len(), "Size does not match the live nodes");
        if let Some(root) = tree.root() {
            assert_eq!(tree.node(root).parent(), None);
            assert_eq!(tree.node(root).discriminator(), 0);
        }
    }

    fn random_points(n: usize, dim: usize, grid: bool, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n * dim)
            .map(|_| {
                if grid {
                    rng.random_range(0..6) as f64
                } else {
                    rng.random_range(-10.0..10.0)
                }
            })
            .collect()
    }

    #[test]
    fn test_new_rejects_zero_dim() {
        assert_eq!(
            KdTree::<f64>::new(0).unwrap_err(),
            ClusterError::InvalidDimension
        );
    }

    #[test]
    fn test_insert_links_and_discriminators() {
        let mut tree = KdTree::new(2).unwrap();
        let root = tree.insert(&[5.0, 5.0], 0).unwrap();
        let a = tree.insert(&[3.0, 8.0], 1).unwrap();
        let b = tree.insert(&[7.0, 1.0], 2).unwrap();
        let c = tree.insert(&[2.0, 9.0], 3).unwrap();

        assert_eq!(tree.root(), Some(root));
        assert_eq!(tree.node(root).left(), Some(a));
        assert_eq!(tree.node(root).right(), Some(b));
        // (2, 9) vs (3, 8) on axis 1: 9 >= 8 goes right
        assert_eq!(tree.node(a).right(), Some(c));
        assert_eq!(tree.node(c).parent(), Some(a));
        assert_eq!(tree.node(c).discriminator(), 0);
        assert_eq!(tree.len(), 4);
        assert_invariants(&tree);
    }

    #[test]
    fn test_insert_dimension_mismatch() {
        let mut tree = KdTree::new(2).unwrap();
        let err = tree.insert(&[1.0, 2.0, 3.0], 0).unwrap_err();
        assert_eq!(
            err,
            ClusterError::DimensionMismatch {
                expected: 2,
                found: 3
            }
        );
        assert!(tree.insert(&[f64::NAN, 1.0], 0).is_err());
        assert!(tree.find(&[1.0]).is_err());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_insert_find_round_trip() {
        let data = random_points(300, 3, false, 42);
        let mut tree = KdTree::new(3).unwrap();
        let ids: Vec<NodeId> = data
            .chunks(3)
            .enumerate()
            .map(|(i, p)| tree.insert(p, i).unwrap())
            .collect();

        assert_eq!(tree.len(), 300);
        for (i, p) in data.chunks(3).enumerate() {
            let found = tree.find(p).unwrap().expect("Inserted point not found");
            assert_eq!(tree.point(found).unwrap(), p);
            assert_eq!(found, ids[i]);
        }
        assert_eq!(tree.find(&[100.0, 100.0, 100.0]).unwrap(), None);
        assert_invariants(&tree);
    }

    #[test]
    fn test_find_with_payload_duplicates() {
        let mut tree = KdTree::new(2).unwrap();
        for payload in 0..5 {
            tree.insert(&[1.0, 1.0], payload).unwrap();
        }
        tree.insert(&[0.0, 3.0], 10).unwrap();

        for payload in 0..5 {
            let id = tree
                .find_with_payload(&[1.0, 1.0], &payload)
                .unwrap()
                .unwrap();
            assert_eq!(tree.payload(id), Some(&payload));
        }
        assert_eq!(tree.find_with_payload(&[1.0, 1.0], &10).unwrap(), None);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut tree: KdTree<f64> = KdTree::new(2).unwrap();
        assert!(!tree.remove(&[1.0, 1.0]).unwrap());

        tree.insert(&[1.0, 1.0], 0).unwrap();
        assert!(!tree.remove(&[2.0, 1.0]).unwrap());
        assert!(!tree.remove_with_payload(&[1.0, 1.0], &3).unwrap());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_remove_leaf_and_root() {
        let mut tree = KdTree::new(2).unwrap();
        tree.insert(&[5.0, 5.0], 0).unwrap();
        let leaf = tree.insert(&[7.0, 1.0], 1).unwrap();

        assert_eq!(tree.remove_node(leaf), Some(1));
        assert_eq!(tree.node(tree.root().unwrap()).right(), None);

        assert!(tree.remove(&[5.0, 5.0]).unwrap());
        assert!(tree.is_empty());
        assert_eq!(tree.root(), None);
        assert_eq!(tree.height(), 0);
    }

    #[test]
    fn test_remove_root_with_left_only() {
        let mut tree = KdTree::new(2).unwrap();
        tree.insert(&[5.0, 5.0], 0).unwrap();
        tree.insert(&[3.0, 2.0], 1).unwrap();
        tree.insert(&[1.0, 7.0], 2).unwrap();
        tree.insert(&[4.0, 1.0], 3).unwrap();

        assert!(tree.remove(&[5.0, 5.0]).unwrap());
        let root = tree.root().unwrap();
        // minimum along axis 0 of the former left subtree
        assert_eq!(tree.point(root).unwrap(), &[1.0, 7.0]);
        assert_eq!(tree.node(root).left(), None);
        assert_invariants(&tree);

        for p in [[3.0, 2.0], [1.0, 7.0], [4.0, 1.0]] {
            assert!(tree.find(&p).unwrap().is_some());
        }
    }

    #[test]
    fn test_freed_slots_are_reused() {
        let mut tree = KdTree::new(1).unwrap();
        tree.insert(&[1.0], 0).unwrap();
        let b = tree.insert(&[2.0], 1).unwrap();
        tree.remove_node(b);
        assert_eq!(tree.get(b).map(|n| *n.payload()), None);

        let c = tree.insert(&[3.0], 2).unwrap();
        assert_eq!(c, b);
        assert_eq!(tree.point(c).unwrap(), &[3.0]);
        assert_eq!(tree.remove_node(b), Some(2));
        assert_eq!(tree.remove_node(b), None);
    }

    #[test]
    fn test_random_removal_keeps_invariants() {
        for (seed, grid) in [(1, false), (2, true), (3, true)] {
            let data = random_points(150, 2, grid, seed);
            let mut tree = KdTree::new(2).unwrap();
            for (i, p) in data.chunks(2).enumerate() {
                tree.insert(p, i).unwrap();
            }

            let mut order: Vec<usize> = (0..150).collect();
            order.shuffle(&mut StdRng::seed_from_u64(seed + 100));

            for (step, &i) in order.iter().enumerate() {
                let point = &data[i * 2..i * 2 + 2];
                assert!(tree.remove_with_payload(point, &i).unwrap());
                assert_eq!(tree.len(), 150 - step - 1);
                assert_invariants(&tree);

                for &j in &order[step + 1..] {
                    let p = &data[j * 2..j * 2 + 2];
                    assert!(
                        tree.find_with_payload(p, &j).unwrap().is_some(),
                        "Point {j} lost after removing {i}"
                    );
                }
            }
            assert!(tree.is_empty());
        }
    }

    #[test]
    fn test_balanced_height_bound() {
        let data = random_points(1023, 2, false, 7);
        let tree = KdTree::balanced(&data, 2, (0..1023).collect()).unwrap();

        assert_eq!(tree.len(), 1023);
        assert!(tree.height() <= 12, "Height {} too large", tree.height());
        assert_invariants(&tree);

        for (i, p) in data.chunks(2).enumerate() {
            let id = tree.find_with_payload(p, &i).unwrap().unwrap();
            assert_eq!(id.index(), i);
        }
    }

    #[test]
    fn test_balanced_with_duplicates() {
        let data = random_points(400, 3, true, 11);
        let tree = KdTree::balanced(&data, 3, (0..400).collect()).unwrap();
        assert_invariants(&tree);

        for (i, p) in data.chunks(3).enumerate() {
            assert!(tree.find_with_payload(p, &i).unwrap().is_some());
        }
    }

    #[test]
    fn test_balanced_then_mutate() {
        let data = random_points(64, 2, false, 5);
        let mut tree = KdTree::balanced(&data, 2, (0..64).collect()).unwrap();

        for i in (0..64).step_by(3) {
            assert!(tree.remove_with_payload(&data[i * 2..i * 2 + 2], &i).unwrap());
        }
        tree.insert(&[0.5, 0.5], 1000).unwrap();
        assert_invariants(&tree);
        assert_eq!(tree.len(), 64 - 22 + 1);
    }

    #[test]
    fn test_balanced_input_validation() {
        assert_eq!(
            KdTree::balanced(&[1.0, 2.0, 3.0], 2, vec![0]).unwrap_err(),
            ClusterError::RaggedInput { len: 3, dim: 2 }
        );
        assert_eq!(
            KdTree::balanced(&[1.0, 2.0], 2, vec![0, 1]).unwrap_err(),
            ClusterError::PayloadMismatch {
                points: 1,
                payloads: 2
            }
        );

        let empty = KdTree::<f64>::balanced(&[], 4, Vec::new()).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.root(), None);
    }

    #[test]
    fn test_find_minimal_node() {
        let data = random_points(200, 3, true, 9);
        let tree = KdTree::balanced(&data, 3, (0..200).collect()).unwrap();
        let root = tree.root().unwrap();

        for d in 0..3 {
            let minimal = tree.find_minimal_node(root, d).unwrap();
            let expected = data
                .chunks(3)
                .map(|p| p[d])
                .fold(f64::INFINITY, f64::min);
            assert_eq!(tree.point(minimal).unwrap()[d], expected);
        }
    }

    #[test]
    fn test_find_minimal_node_rejects_dead_start() {
        let data = random_points(20, 2, false, 4);
        let mut tree = KdTree::balanced(&data, 2, (0..20).collect()).unwrap();
        let root = tree.root().unwrap();

        assert!(tree.find_minimal_node(root, 2).is_none());

        let leaf = tree.iter().find(|&id| tree.get(id).unwrap().is_leaf()).unwrap();
        assert!(tree.remove_node(leaf).is_some());
        assert_eq!(tree.find_minimal_node(leaf, 0), None);
    }

    #[test]
    fn test_iter_visits_every_node_once() {
        let data = random_points(50, 2, false, 3);
        let tree = KdTree::balanced(&data, 2, (0..50).collect()).unwrap();
        let mut seen: Vec<usize> = tree.iter().map(|id| *tree.payload(id).unwrap()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }
}
