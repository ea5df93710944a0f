//! Bagged regression trees.
//!
//! Each tree is grown on a bootstrap sample by exhaustive variance-reduction
//! splits; the forest predicts the mean of its trees.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 5,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    /// Rows with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    sse: f64,
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    max_depth: usize,
    min_samples_split: usize,
    nodes: Vec<TreeNode>,
}

impl TreeBuilder<'_> {
    fn build(&mut self, indices: &mut [usize], depth: usize) -> usize {
        let node_id = self.nodes.len();
        let n = indices.len() as f64;
        let sum: f64 = indices.iter().map(|&i| self.y[i]).sum();
        let sum_sq: f64 = indices.iter().map(|&i| self.y[i] * self.y[i]).sum();
        let mean = sum / n;
        self.nodes.push(TreeNode::Leaf { value: mean });

        let parent_sse = sum_sq - sum * sum / n;
        if depth >= self.max_depth
            || indices.len() < self.min_samples_split
            || parent_sse <= 1e-12 * n.max(1.0)
        {
            return node_id;
        }

        let Some(best) = self.best_split(indices) else {
            return node_id;
        };
        if best.sse >= parent_sse {
            return node_id;
        }

        let (feature, threshold) = (best.feature, best.threshold);
        let split_at = partition(indices, |i| self.x[i][feature] <= threshold);
        let (left_rows, right_rows) = indices.split_at_mut(split_at);
        let left = self.build(left_rows, depth + 1);
        let right = self.build(right_rows, depth + 1);

        self.nodes[node_id] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        node_id
    }

    fn best_split(&self, indices: &[usize]) -> Option<BestSplit> {
        let n_features = self.x.first().map_or(0, Vec::len);
        let total = indices.len();
        let mut best: Option<BestSplit> = None;
        let mut sorted = indices.to_vec();

        for feature in 0..n_features {
            sorted.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let total_sum: f64 = sorted.iter().map(|&i| self.y[i]).sum();
            let total_sq: f64 = sorted.iter().map(|&i| self.y[i] * self.y[i]).sum();
            let (mut left_sum, mut left_sq) = (0.0, 0.0);

            for k in 1..total {
                let prev = sorted[k - 1];
                left_sum += self.y[prev];
                left_sq += self.y[prev] * self.y[prev];

                let (lo, hi) = (self.x[prev][feature], self.x[sorted[k]][feature]);
                if lo >= hi {
                    continue;
                }

                let left_n = k as f64;
                let right_n = (total - k) as f64;
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / left_n)
                    + (right_sq - right_sum * right_sum / right_n);

                if best.as_ref().map_or(true, |b| sse < b.sse) {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    // midpoint can round up to `hi` for adjacent floats
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        sse,
                    });
                }
            }
        }

        best
    }
}

/// Reorders `indices` so rows satisfying `pred` come first; returns their count.
fn partition(indices: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut boundary = 0;
    for idx in 0..indices.len() {
        if pred(indices[idx]) {
            indices.swap(boundary, idx);
            boundary += 1;
        }
    }
    boundary
}

impl RegressionTree {
    pub fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        sample: &[usize],
        max_depth: usize,
        min_samples_split: usize,
    ) -> Result<Self> {
        if sample.is_empty() {
            return Err(PipelineError::Computation(
                "cannot grow a tree from zero samples".to_string(),
            ));
        }
        let mut builder = TreeBuilder {
            x,
            y,
            max_depth,
            min_samples_split,
            nodes: Vec::new(),
        };
        let mut indices = sample.to_vec();
        builder.build(&mut indices, 0);
        Ok(Self {
            nodes: builder.nodes,
        })
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut node = 0;
        loop {
            match self.nodes.get(node) {
                Some(TreeNode::Leaf { value }) => return *value,
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = row.get(*feature).copied().unwrap_or(f64::NAN);
                    node = if value <= *threshold { *left } else { *right };
                }
                None => return f64::NAN,
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], node: usize) -> usize {
            match nodes.get(node) {
                Some(TreeNode::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub params: ForestParams,
    pub n_features: usize,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: ForestParams) -> Result<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(PipelineError::Computation(format!(
                "forest needs matching non-empty inputs, got {} rows and {} targets",
                x.len(),
                y.len()
            )));
        }
        if params.n_trees == 0 || params.max_depth == 0 {
            return Err(PipelineError::Config(
                "forest needs at least one tree and a positive depth".to_string(),
            ));
        }
        let n_features = x[0].len();
        if x.iter().any(|row| row.len() != n_features) {
            return Err(PipelineError::SchemaMismatch(
                "feature rows have differing widths".to_string(),
            ));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::Computation(
                "training targets must be finite".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let n = x.len();
        let mut trees = Vec::with_capacity(params.n_trees);
        for _ in 0..params.n_trees {
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            trees.push(RegressionTree::fit(
                x,
                y,
                &sample,
                params.max_depth,
                params.min_samples_split,
            )?);
        }

        Ok(Self {
            params,
            n_features,
            trees,
        })
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|tree| tree.predict_row(row)).sum();
        total / self.trees.len() as f64
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter()
            .map(|row| {
                if row.len() != self.n_features {
                    return Err(PipelineError::SchemaMismatch(format!(
                        "forest expects {} features, got {}",
                        self.n_features,
                        row.len()
                    )));
                }
                Ok(self.predict_row(row))
            })
            .collect()
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}
