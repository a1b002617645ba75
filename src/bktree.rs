/*!
A write-once BK-tree (Burkhard-Keller tree) for finding every indexed string within an edit distance of a query.

Children of a node are keyed by their exact distance to that node.
A query at distance `d` from a node only needs to descend into children keyed in `[d - k, d + k]`, which follows from the triangle inequality.
The answer set never depends on insertion order, only the shape of the tree does.

# Example usage
```rust
use seqfam::bktree::BkTree;
use seqfam::sequence_alignment::edit_distance;

let tree = BkTree::from_values(
    [b"CAT".to_vec(), b"CAR".to_vec(), b"DOG".to_vec()],
    edit_distance
);
let found = tree.find(b"CAT", 1);
assert_eq!(found, vec![b"CAR".as_slice(), b"CAT".as_slice()]);
```
*/

use std::collections::BTreeMap;

use crate::sequence_alignment::edit_distance;

/// Default distance function used by the dimension indices
pub type DistanceFn = fn(&[u8], &[u8]) -> usize;

/// A node in the arena; children are indices into the same arena
#[derive(Clone, Debug)]
struct BkNode {
    value: Vec<u8>,
    children: BTreeMap<usize, usize>
}

/// Arena-backed BK-tree over byte strings.
#[derive(Clone, Debug)]
pub struct BkTree<D = DistanceFn> {
    /// All nodes, the root is always at index 0
    nodes: Vec<BkNode>,
    /// The metric used for routing and querying
    distance: D
}

impl Default for BkTree<DistanceFn> {
    fn default() -> Self {
        BkTree::new(edit_distance as DistanceFn)
    }
}

impl<D> BkTree<D>
where
    D: Fn(&[u8], &[u8]) -> usize
{
    /// Creates an empty tree with a distance function.
    /// # Arguments
    /// * `distance` - a metric over byte strings, typically `edit_distance`
    pub fn new(distance: D) -> BkTree<D> {
        BkTree {
            nodes: vec![],
            distance
        }
    }

    /// Creates a tree with an explicit root followed by the remaining values.
    /// # Arguments
    /// * `root` - the value placed at the root
    /// * `values` - the other values to index, duplicates are ignored
    /// * `distance` - a metric over byte strings
    pub fn with_root<I>(root: Vec<u8>, values: I, distance: D) -> BkTree<D>
    where
        I: IntoIterator<Item = Vec<u8>>
    {
        let mut tree = BkTree::new(distance);
        tree.insert(root);
        for value in values {
            tree.insert(value);
        }
        tree
    }

    /// Creates a tree from a set of values, the first one becomes the root.
    /// # Arguments
    /// * `values` - the values to index, duplicates are ignored
    /// * `distance` - a metric over byte strings
    pub fn from_values<I>(values: I, distance: D) -> BkTree<D>
    where
        I: IntoIterator<Item = Vec<u8>>
    {
        let mut tree = BkTree::new(distance);
        for value in values {
            tree.insert(value);
        }
        tree
    }

    /// Adds a value to the tree, returns false if it was already present.
    /// # Arguments
    /// * `value` - the value to index
    pub fn insert(&mut self, value: Vec<u8>) -> bool {
        if self.nodes.is_empty() {
            self.nodes.push(BkNode { value, children: BTreeMap::new() });
            return true;
        }

        let mut current = 0;
        loop {
            let d = (self.distance)(self.nodes[current].value.as_slice(), value.as_slice());
            if d == 0 {
                return false;
            }

            match self.nodes[current].children.get(&d) {
                Some(&child) => current = child,
                None => {
                    let new_index = self.nodes.len();
                    self.nodes.push(BkNode { value, children: BTreeMap::new() });
                    self.nodes[current].children.insert(d, new_index);
                    return true;
                }
            }
        }
    }

    /// Returns every indexed value within `max_distance` of `query`, sorted and without duplicates.
    /// The query itself is included if it was indexed.
    /// # Arguments
    /// * `query` - the value to search for
    /// * `max_distance` - the largest distance (inclusive) a match may have
    pub fn find(&self, query: &[u8], max_distance: usize) -> Vec<&[u8]> {
        let mut found = vec![];
        if self.nodes.is_empty() {
            return found;
        }

        let mut worklist = vec![0];
        while let Some(index) = worklist.pop() {
            let node = &self.nodes[index];
            let d = (self.distance)(node.value.as_slice(), query);
            if d <= max_distance {
                found.push(node.value.as_slice());
            }

            let lower = d.saturating_sub(max_distance);
            let upper = d + max_distance;
            worklist.extend(node.children.range(lower..=upper).map(|(_, &child)| child));
        }

        found.sort_unstable();
        found
    }

    /// Number of distinct values in the tree
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The root value, if any
    pub fn root(&self) -> Option<&[u8]> {
        self.nodes.first().map(|n| n.value.as_slice())
    }
}
