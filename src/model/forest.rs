//! Random forest of CART classification trees.
//!
//! Each tree is grown on a bootstrap sample with Gini impurity splits over a
//! random subset of features per node. A tree stores the positive-class
//! fraction at every node; the forest probability is the mean of the leaf
//! fractions reached by a row.

use crate::error::{ChurnError, Result};
use crate::model::{check_training_data, check_width, Estimator, Fitted, Predictor, Unfitted};
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::marker::PhantomData;

/// Number of features examined at each split.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// `sqrt(n_features)`, rounded down, at least 1.
    Sqrt,
    /// `log2(n_features)`, rounded down, at least 1.
    Log2,
    /// Every feature.
    All,
}

impl MaxFeatures {
    fn resolve(&self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::All => n_features,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Hyperparameters for [`RandomForest`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomForestConfig {
    pub n_estimators: usize,
    /// `None` grows trees until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for RandomForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 150,
            max_depth: Some(10),
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl RandomForestConfig {
    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(ChurnError::InvalidParameter(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.max_depth == Some(0) {
            return Err(ChurnError::InvalidParameter(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.min_samples_split < 2 || self.min_samples_leaf == 0 {
            return Err(ChurnError::InvalidParameter(format!(
                "min_samples_split must be >= 2 and min_samples_leaf >= 1, got {} and {}",
                self.min_samples_split, self.min_samples_leaf
            )));
        }
        Ok(())
    }

    pub(crate) fn hyperparameters(&self) -> BTreeMap<String, String> {
        let max_depth = self
            .max_depth
            .map_or_else(|| "none".to_string(), |d| d.to_string());
        BTreeMap::from([
            ("n_estimators".to_string(), self.n_estimators.to_string()),
            ("max_depth".to_string(), max_depth),
            ("min_samples_split".to_string(), self.min_samples_split.to_string()),
            ("min_samples_leaf".to_string(), self.min_samples_leaf.to_string()),
            ("max_features".to_string(), format!("{:?}", self.max_features).to_lowercase()),
            ("bootstrap".to_string(), self.bootstrap.to_string()),
            ("seed".to_string(), self.seed.to_string()),
        ])
    }
}

/// One classification tree in structure-of-arrays layout.
///
/// Node 0 is the root. For a split node, rows with
/// `x[split_feature] <= threshold` go left. `value` holds the positive-class
/// fraction of the training rows that reached the node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    split_features: Vec<u32>,
    thresholds: Vec<f64>,
    left_children: Vec<u32>,
    right_children: Vec<u32>,
    is_leaf: Vec<bool>,
    values: Vec<f64>,
}

impl DecisionTree {
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.is_leaf.iter().filter(|&&leaf| leaf).count()
    }

    /// Depth of the deepest leaf (a lone root has depth 0).
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if !self.is_leaf[node] {
                stack.push((self.left_children[node] as usize, depth + 1));
                stack.push((self.right_children[node] as usize, depth + 1));
            }
        }
        max_depth
    }

    /// Positive-class fraction of the leaf `row` falls into.
    #[inline]
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = 0usize;
        while !self.is_leaf[node] {
            let feature = self.split_features[node] as usize;
            node = if row[feature] <= self.thresholds[node] {
                self.left_children[node] as usize
            } else {
                self.right_children[node] as usize
            };
        }
        self.values[node]
    }

    fn push_node(&mut self, value: f64) -> usize {
        self.split_features.push(0);
        self.thresholds.push(0.0);
        self.left_children.push(0);
        self.right_children.push(0);
        self.is_leaf.push(true);
        self.values.push(value);
        self.is_leaf.len() - 1
    }

    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        let n = self.n_nodes();
        let lengths = [
            self.split_features.len(),
            self.thresholds.len(),
            self.left_children.len(),
            self.right_children.len(),
            self.values.len(),
        ];
        if n == 0 || lengths.iter().any(|&len| len != n) {
            return Err("tree arrays are empty or of unequal length".to_string());
        }
        for node in 0..n {
            if !(0.0..=1.0).contains(&self.values[node]) {
                return Err(format!("node {} has value {} outside [0, 1]", node, self.values[node]));
            }
            if self.is_leaf[node] {
                continue;
            }
            let (left, right) = (
                self.left_children[node] as usize,
                self.right_children[node] as usize,
            );
            // Children are always allocated after their parent, which also
            // rules out cycles.
            if left <= node || right <= node || left >= n || right >= n {
                return Err(format!("node {} has invalid children", node));
            }
            if self.split_features[node] as usize >= n_features {
                return Err(format!(
                    "node {} splits on feature {} of {}",
                    node, self.split_features[node], n_features
                ));
            }
        }
        Ok(())
    }
}

/// Stopping rules shared by every tree of a forest.
struct GrowthLimits {
    max_depth: usize,
    min_samples_split: usize,
    min_samples_leaf: usize,
    max_features: usize,
}

struct Split {
    feature: usize,
    threshold: f64,
    impurity_decrease: f64,
}

fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

/// Best Gini split of `rows` among a random subset of features.
fn best_split(
    x: &Array2<f64>,
    y: &[u8],
    rows: &[usize],
    limits: &GrowthLimits,
    rng: &mut StdRng,
) -> Option<Split> {
    let n = rows.len();
    let total_pos = rows.iter().filter(|&&r| y[r] == 1).count();
    let parent = gini(total_pos, n);

    let candidates = rand::seq::index::sample(rng, x.ncols(), limits.max_features);
    let mut best: Option<Split> = None;
    let mut pairs: Vec<(f64, u8)> = Vec::with_capacity(n);

    for feature in candidates.iter() {
        pairs.clear();
        pairs.extend(rows.iter().map(|&r| (x[[r, feature]], y[r])));
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_pos = 0;
        for i in 0..n - 1 {
            left_pos += usize::from(pairs[i].1);
            let n_left = i + 1;
            if pairs[i].0 == pairs[i + 1].0 {
                continue;
            }
            if n_left < limits.min_samples_leaf || n - n_left < limits.min_samples_leaf {
                continue;
            }
            let weighted = (n_left as f64 * gini(left_pos, n_left)
                + (n - n_left) as f64 * gini(total_pos - left_pos, n - n_left))
                / n as f64;
            let decrease = parent - weighted;
            if decrease > 1e-12 && best.as_ref().map_or(true, |b| decrease > b.impurity_decrease) {
                best = Some(Split {
                    feature,
                    threshold: (pairs[i].0 + pairs[i + 1].0) / 2.0,
                    impurity_decrease: decrease,
                });
            }
        }
    }
    best
}

fn grow_tree(
    x: &Array2<f64>,
    y: &[u8],
    rows: Vec<usize>,
    limits: &GrowthLimits,
    rng: &mut StdRng,
) -> DecisionTree {
    let mut tree = DecisionTree {
        split_features: Vec::new(),
        thresholds: Vec::new(),
        left_children: Vec::new(),
        right_children: Vec::new(),
        is_leaf: Vec::new(),
        values: Vec::new(),
    };

    let positive_fraction =
        |rows: &[usize]| rows.iter().filter(|&&r| y[r] == 1).count() as f64 / rows.len() as f64;

    let root = tree.push_node(positive_fraction(&rows));
    let mut stack = vec![(root, rows, 0usize)];

    while let Some((node, rows, depth)) = stack.pop() {
        let value = tree.values[node];
        let pure = value == 0.0 || value == 1.0;
        if pure || depth >= limits.max_depth || rows.len() < limits.min_samples_split {
            continue;
        }
        let Some(split) = best_split(x, y, &rows, limits, rng) else {
            continue;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&r| x[[r, split.feature]] <= split.threshold);

        let left = tree.push_node(positive_fraction(&left_rows));
        let right = tree.push_node(positive_fraction(&right_rows));
        tree.split_features[node] = split.feature as u32;
        tree.thresholds[node] = split.threshold;
        tree.left_children[node] = left as u32;
        tree.right_children[node] = right as u32;
        tree.is_leaf[node] = false;

        stack.push((right, right_rows, depth + 1));
        stack.push((left, left_rows, depth + 1));
    }
    tree
}

/// Bagged ensemble of [`DecisionTree`]s.
///
/// # Example
/// ```ignore
/// use churn_predictor::model::{Estimator, Predictor, RandomForest, RandomForestConfig};
///
/// let forest = RandomForest::new(RandomForestConfig::default()).fit(&x_train, &y_train)?;
/// let proba = forest.predict_proba(&x_test)?;
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RandomForest<S = Fitted> {
    config: RandomForestConfig,
    trees: Vec<DecisionTree>,
    n_features: usize,
    #[serde(skip)]
    _state: PhantomData<S>,
}

impl RandomForest<Unfitted> {
    pub fn new(config: RandomForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            n_features: 0,
            _state: PhantomData,
        }
    }
}

impl Default for RandomForest<Unfitted> {
    fn default() -> Self {
        Self::new(RandomForestConfig::default())
    }
}

impl Estimator for RandomForest<Unfitted> {
    type Fitted = RandomForest<Fitted>;

    /// Fit every tree in parallel.
    ///
    /// Per-tree seeds are drawn sequentially from `config.seed` before the
    /// parallel section, so the forest does not depend on thread scheduling.
    fn fit(&self, x: &Array2<f64>, y: &[u8]) -> Result<RandomForest<Fitted>> {
        self.config.validate()?;
        check_training_data(x, y)?;

        let (n_samples, n_features) = x.dim();
        let limits = GrowthLimits {
            max_depth: self.config.max_depth.unwrap_or(usize::MAX),
            min_samples_split: self.config.min_samples_split,
            min_samples_leaf: self.config.min_samples_leaf,
            max_features: self.config.max_features.resolve(n_features),
        };

        let mut seeder = StdRng::seed_from_u64(self.config.seed);
        let tree_seeds: Vec<u64> = (0..self.config.n_estimators).map(|_| seeder.gen()).collect();

        let bootstrap = self.config.bootstrap;
        let trees: Vec<DecisionTree> = tree_seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let rows: Vec<usize> = if bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                grow_tree(x, y, rows, &limits, &mut rng)
            })
            .collect();

        let mean_depth =
            trees.iter().map(DecisionTree::depth).sum::<usize>() as f64 / trees.len() as f64;
        log::debug!(
            "Grew {} trees on {} rows x {} features (mean depth {:.1})",
            trees.len(),
            n_samples,
            n_features,
            mean_depth
        );

        Ok(RandomForest {
            config: self.config.clone(),
            trees,
            n_features,
            _state: PhantomData,
        })
    }
}

impl RandomForest<Fitted> {
    pub fn config(&self) -> &RandomForestConfig {
        &self.config
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        if self.trees.is_empty() {
            return Err("random forest has no trees".to_string());
        }
        if self.n_features == 0 {
            return Err("random forest expects zero features".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|e| format!("tree {}: {}", i, e))?;
        }
        Ok(())
    }
}

impl Predictor for RandomForest<Fitted> {
    fn n_features_in(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_width(self.n_features, x)?;
        let n_trees = self.trees.len() as f64;
        Ok(x
            .outer_iter()
            .map(|row| self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees)
            .collect())
    }
}
