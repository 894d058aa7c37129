use crate::types::{FeatureVector, FEATURE_COUNT};
use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered at each split, drawn without replacement.
    pub max_features: usize,
}

/// A node in the classification tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Internal split node: `features[feature] <= threshold` goes left.
    Split {
        feature: u8,
        threshold: f32,
        left: u32,
        right: u32,
    },
    /// Leaf node holding the class distribution of its training samples.
    Leaf { distribution: Vec<f64> },
}

/// A single CART classification tree with Gini splits.
///
/// Node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
    pub classes: usize,
}

impl DecisionTree {
    /// Grow a tree on the rows named by `sample` (indices may repeat).
    pub fn fit(
        rows: &[FeatureVector],
        labels: &[usize],
        sample: &mut [usize],
        classes: usize,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut builder = Builder {
            rows,
            labels,
            classes,
            params,
            nodes: Vec::new(),
        };
        builder.grow(sample, 0, rng);
        Self {
            nodes: builder.nodes,
            classes,
        }
    }

    /// Traverse the tree and return the reached leaf's class distribution.
    pub fn predict(&self, features: &FeatureVector) -> &[f64] {
        let mut node_idx = 0usize;

        loop {
            match &self.nodes[node_idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node_idx = if features[*feature as usize] <= *threshold {
                        *left as usize
                    } else {
                        *right as usize
                    };
                }
                TreeNode::Leaf { distribution } => return distribution,
            }
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Depth counted in edges; a single leaf has depth 0.
    pub fn depth(&self) -> usize {
        self.depth_from(0)
    }

    fn depth_from(&self, node_idx: usize) -> usize {
        match &self.nodes[node_idx] {
            TreeNode::Split { left, right, .. } => {
                1 + self
                    .depth_from(*left as usize)
                    .max(self.depth_from(*right as usize))
            }
            TreeNode::Leaf { .. } => 0,
        }
    }

    /// Structural check used before installing a deserialized model.
    pub fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature as usize >= FEATURE_COUNT {
                        return Err(format!("node {i}: feature {feature} out of range"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {i}: non-finite threshold"));
                    }
                    // Children always come after their parent, which rules out cycles.
                    for child in [*left as usize, *right as usize] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(format!("node {i}: bad child index {child}"));
                        }
                    }
                }
                TreeNode::Leaf { distribution } => {
                    if distribution.len() != self.classes {
                        return Err(format!(
                            "node {i}: leaf has {} classes, expected {}",
                            distribution.len(),
                            self.classes
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

struct Builder<'a> {
    rows: &'a [FeatureVector],
    labels: &'a [usize],
    classes: usize,
    params: &'a TreeParams,
    nodes: Vec<TreeNode>,
}

impl Builder<'_> {
    fn grow(&mut self, indices: &mut [usize], depth: usize, rng: &mut StdRng) -> u32 {
        let node_idx = self.nodes.len() as u32;
        let counts = self.class_counts(indices);
        let n = indices.len();
        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;

        let stop = pure
            || depth >= self.params.max_depth
            || n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf;

        let split = if stop {
            None
        } else {
            self.best_split(indices, &counts, rng)
        };

        let Some((feature, threshold)) = split else {
            self.nodes.push(leaf(&counts, n));
            return node_idx;
        };

        // Reserve the slot; children are pushed after it.
        self.nodes.push(TreeNode::Leaf {
            distribution: Vec::new(),
        });

        let mid = partition(indices, |i| self.rows[i][feature] <= threshold);
        let (left_rows, right_rows) = indices.split_at_mut(mid);
        let left = self.grow(left_rows, depth + 1, rng);
        let right = self.grow(right_rows, depth + 1, rng);

        self.nodes[node_idx as usize] = TreeNode::Split {
            feature: feature as u8,
            threshold,
            left,
            right,
        };
        node_idx
    }

    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.classes];
        for &i in indices {
            counts[self.labels[i]] += 1;
        }
        counts
    }

    /// Lowest weighted-Gini split over a random feature subset, if any
    /// split improves on the parent.
    fn best_split(
        &self,
        indices: &[usize],
        parent: &[usize],
        rng: &mut StdRng,
    ) -> Option<(usize, f32)> {
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let k = self.params.max_features.clamp(1, FEATURE_COUNT);

        let mut best: Option<(f64, usize, f32)> = None;
        let mut sorted: Vec<(f32, usize)> = Vec::with_capacity(n);

        for feature in index::sample(rng, FEATURE_COUNT, k).iter() {
            sorted.clear();
            sorted.extend(indices.iter().map(|&i| (self.rows[i][feature], self.labels[i])));
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = vec![0usize; self.classes];
            let mut right = parent.to_vec();

            for pos in 0..n - 1 {
                let (value, label) = sorted[pos];
                left[label] += 1;
                right[label] -= 1;

                let next = sorted[pos + 1].0;
                if next <= value {
                    continue;
                }
                let n_left = pos + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let score = n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini(&right, n_right);
                if best.map_or(true, |(s, _, _)| score < s) {
                    let mid = value + (next - value) / 2.0;
                    let threshold = if mid < next { mid } else { value };
                    best = Some((score, feature, threshold));
                }
            }
        }

        let parent_score = n as f64 * gini(parent, n);
        best.filter(|(score, _, _)| *score < parent_score - 1e-12)
            .map(|(_, feature, threshold)| (feature, threshold))
    }
}

fn leaf(counts: &[usize], n: usize) -> TreeNode {
    let total = n.max(1) as f64;
    TreeNode::Leaf {
        distribution: counts.iter().map(|&c| c as f64 / total).collect(),
    }
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

/// Move indices satisfying `pred` to the front; returns how many did.
fn partition(indices: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut mid = 0;
    for i in 0..indices.len() {
        if pred(indices[i]) {
            indices.swap(i, mid);
            mid += 1;
        }
    }
    mid
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn row(first: f32) -> FeatureVector {
        let mut values = [0.5f32; FEATURE_COUNT];
        values[0] = first;
        FeatureVector::from_array(values).unwrap()
    }

    fn params() -> TreeParams {
        TreeParams {
            max_depth: 5,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: FEATURE_COUNT,
        }
    }

    #[test]
    fn test_gini() {
        assert_eq!(gini(&[4, 0], 4), 0.0);
        assert!((gini(&[2, 2], 4) - 0.5).abs() < 1e-12);
        assert_eq!(gini(&[0, 0], 0), 0.0);
    }

    #[test]
    fn test_partition() {
        let mut idx = vec![5, 1, 4, 2, 3];
        let mid = partition(&mut idx, |i| i <= 2);
        assert_eq!(mid, 2);
        assert!(idx[..mid].iter().all(|&i| i <= 2));
        assert!(idx[mid..].iter().all(|&i| i > 2));
    }

    #[test]
    fn test_separable_split() {
        let rows: Vec<FeatureVector> = [0.1, 0.2, 0.3, 0.7, 0.8, 0.9].map(row).to_vec();
        let labels = vec![0, 0, 0, 1, 1, 1];
        let mut sample: Vec<usize> = (0..rows.len()).collect();
        let mut rng = StdRng::seed_from_u64(1);

        let tree = DecisionTree::fit(&rows, &labels, &mut sample, 2, &params(), &mut rng);

        assert_eq!(tree.num_nodes(), 3);
        assert_eq!(tree.depth(), 1);
        match &tree.nodes[0] {
            TreeNode::Split { feature, threshold, .. } => {
                assert_eq!(*feature, 0);
                assert!((threshold - 0.5).abs() < 1e-6, "threshold {threshold}");
            }
            other => panic!("expected split at root, got {other:?}"),
        }
        assert_eq!(tree.predict(&row(0.0)), &[1.0, 0.0]);
        assert_eq!(tree.predict(&row(1.0)), &[0.0, 1.0]);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_pure_node_is_leaf() {
        let rows: Vec<FeatureVector> = [0.1, 0.5, 0.9].map(row).to_vec();
        let labels = vec![2, 2, 2];
        let mut sample = vec![0, 1, 2];
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::fit(&rows, &labels, &mut sample, 3, &params(), &mut rng);
        assert_eq!(tree.num_nodes(), 1);
        assert_eq!(tree.predict(&row(0.3)), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_max_depth_respected() {
        // Alternating labels need many splits; depth caps them.
        let rows: Vec<FeatureVector> = (0..32).map(|i| row(i as f32 / 32.0)).collect();
        let labels: Vec<usize> = (0..32).map(|i| i % 2).collect();
        let mut sample: Vec<usize> = (0..32).collect();
        let mut rng = StdRng::seed_from_u64(1);
        let limited = TreeParams {
            max_depth: 3,
            ..params()
        };
        let tree = DecisionTree::fit(&rows, &labels, &mut sample, 2, &limited, &mut rng);
        assert!(tree.depth() <= 3);
    }

    #[test]
    fn test_constant_feature_makes_leaf() {
        let rows: Vec<FeatureVector> = vec![row(0.5); 4];
        let labels = vec![0, 1, 0, 1];
        let mut sample = vec![0, 1, 2, 3];
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::fit(&rows, &labels, &mut sample, 2, &params(), &mut rng);
        assert_eq!(tree.num_nodes(), 1);
        assert_eq!(tree.predict(&row(0.5)), &[0.5, 0.5]);
    }

    #[test]
    fn test_validate_rejects_bad_child() {
        let tree = DecisionTree {
            nodes: vec![TreeNode::Split {
                feature: 0,
                threshold: 0.5,
                left: 0,
                right: 7,
            }],
            classes: 2,
        };
        assert!(tree.validate().is_err());
    }
}
