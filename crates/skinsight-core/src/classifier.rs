//! Bagged decision-tree ensemble over [`FeatureVector`]s.
//!
//! A [`Classifier`] starts untrained. `train` builds a new [`Forest`] off to
//! the side and swaps it in; concurrent `predict` calls see either the old
//! or the new forest, never a mix.

use crate::synthetic::{self, SyntheticDataGenerator, SyntheticLabel};
use crate::tree::{DecisionTree, TreeParams};
use crate::types::{
    ClassProbabilities, FeatureVector, Label, Prediction, SkinCondition, SkinType, FEATURE_COUNT,
};
use arc_swap::ArcSwapOption;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;

// --- Named constants ---
const DEFAULT_TREES: usize = 40;
const DEFAULT_MAX_DEPTH: usize = 7;
const CONDITION_TREES: usize = 50;
const CONDITION_MAX_DEPTH: usize = 8;
const DEFAULT_SEED: u64 = 42;
const DEFAULT_VALIDATION_FRACTION: f64 = 0.2;
const MIN_SAMPLES_PER_CLASS: usize = 20;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("model not trained")]
    ModelNotTrained,
    #[error("invalid feature vector: {0}")]
    InvalidFeatureVector(String),
    #[error("insufficient training data for {label}: {found} samples, need {required}")]
    InsufficientData {
        label: String,
        found: usize,
        required: usize,
    },
    #[error("{features} feature vectors but {labels} labels")]
    LabelMismatch { features: usize, labels: usize },
    #[error("invalid model: {0}")]
    InvalidModel(String),
}

/// Ensemble and split parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features tried per split; `None` means `sqrt(FEATURE_COUNT)`.
    pub max_features: Option<usize>,
    /// `None` seeds from entropy, making training non-reproducible.
    pub seed: Option<u64>,
    pub validation_fraction: f64,
    pub min_samples_per_class: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            trees: DEFAULT_TREES,
            max_depth: DEFAULT_MAX_DEPTH,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: Some(DEFAULT_SEED),
            validation_fraction: DEFAULT_VALIDATION_FRACTION,
            min_samples_per_class: MIN_SAMPLES_PER_CLASS,
        }
    }
}

impl ForestParams {
    /// Defaults for the skin-condition model: more and deeper trees.
    pub fn condition() -> Self {
        Self {
            trees: CONDITION_TREES,
            max_depth: CONDITION_MAX_DEPTH,
            ..Self::default()
        }
    }

    fn tree_params(&self) -> TreeParams {
        let sqrt = (FEATURE_COUNT as f64).sqrt() as usize;
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features.unwrap_or(sqrt),
        }
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// A trained ensemble. Serializable so it can be saved and installed later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forest {
    pub classes: usize,
    pub trees: Vec<DecisionTree>,
}

impl Forest {
    /// Fit `params.trees` trees, each on a bootstrap resample of `train`.
    fn fit(
        rows: &[FeatureVector],
        labels: &[usize],
        train: &[usize],
        classes: usize,
        params: &ForestParams,
        rng: &mut StdRng,
    ) -> Self {
        let tree_params = params.tree_params();
        let n = train.len();

        let trees = (0..params.trees)
            .map(|_| {
                let mut sample: Vec<usize> =
                    (0..n).map(|_| train[rng.gen_range(0..n)]).collect();
                DecisionTree::fit(rows, labels, &mut sample, classes, &tree_params, rng)
            })
            .collect();

        Self { classes, trees }
    }

    /// Mean of the leaf distributions across all trees.
    pub fn predict_proba(&self, features: &FeatureVector) -> Vec<f64> {
        let mut sum = vec![0.0f64; self.classes];
        for tree in &self.trees {
            for (acc, p) in sum.iter_mut().zip(tree.predict(features)) {
                *acc += p;
            }
        }
        let n = self.trees.len().max(1) as f64;
        sum.iter_mut().for_each(|v| *v /= n);
        sum
    }

    fn validate(&self, expected_classes: usize) -> Result<(), ClassifierError> {
        if self.classes != expected_classes {
            return Err(ClassifierError::InvalidModel(format!(
                "forest has {} classes, expected {expected_classes}",
                self.classes
            )));
        }
        if self.trees.is_empty() {
            return Err(ClassifierError::InvalidModel("forest has no trees".into()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            if tree.classes != self.classes {
                return Err(ClassifierError::InvalidModel(format!(
                    "tree {i} has {} classes",
                    tree.classes
                )));
            }
            tree.validate()
                .map_err(|e| ClassifierError::InvalidModel(format!("tree {i}: {e}")))?;
        }
        Ok(())
    }
}

/// Outcome of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrainingReport {
    /// Accuracy on the held-out stratified split.
    pub accuracy: f64,
    pub train_samples: usize,
    pub validation_samples: usize,
    pub trees: usize,
}

/// Random-forest classifier over one label set, with an atomically
/// swappable trained state.
pub struct Classifier<L: Label> {
    params: ForestParams,
    model: ArcSwapOption<Forest>,
    _label: PhantomData<fn() -> L>,
}

pub type SkinTypeClassifier = Classifier<SkinType>;
pub type ConditionClassifier = Classifier<SkinCondition>;

impl<L: Label> Classifier<L> {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            model: ArcSwapOption::empty(),
            _label: PhantomData,
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn is_trained(&self) -> bool {
        self.model.load().is_some()
    }

    /// Train on parallel feature and label sequences and swap the new
    /// forest in.
    pub fn train(
        &self,
        features: &[FeatureVector],
        labels: &[L],
    ) -> Result<TrainingReport, ClassifierError> {
        let (forest, report) = self.fit(features, labels)?;
        self.store(forest);
        Ok(report)
    }

    /// Train on `(features, label)` pairs.
    pub fn train_dataset(
        &self,
        dataset: &[(FeatureVector, L)],
    ) -> Result<TrainingReport, ClassifierError> {
        let (forest, report) = self.fit_dataset(dataset)?;
        self.store(forest);
        Ok(report)
    }

    /// Grow a forest without installing it. The current model is untouched.
    pub fn fit(
        &self,
        features: &[FeatureVector],
        labels: &[L],
    ) -> Result<(Forest, TrainingReport), ClassifierError> {
        if features.len() != labels.len() {
            return Err(ClassifierError::LabelMismatch {
                features: features.len(),
                labels: labels.len(),
            });
        }

        let codes: Vec<usize> = labels.iter().map(|l| l.code()).collect();
        let classes = L::ALL.len();

        let mut counts = vec![0usize; classes];
        for &c in &codes {
            counts[c] += 1;
        }
        let required = self.params.min_samples_per_class.max(1);
        for (label, &found) in L::ALL.iter().zip(&counts) {
            if found < required {
                return Err(ClassifierError::InsufficientData {
                    label: label.to_string(),
                    found,
                    required,
                });
            }
        }

        let mut rng = self.params.rng();
        let (train_idx, validation_idx) =
            stratified_split(&codes, classes, self.params.validation_fraction, &mut rng);

        let forest = Forest::fit(
            features,
            &codes,
            &train_idx,
            classes,
            &self.params,
            &mut rng,
        );

        // Fall back to training accuracy when nothing was held out.
        let scored = if validation_idx.is_empty() {
            &train_idx
        } else {
            &validation_idx
        };
        let correct = scored
            .iter()
            .filter(|&&i| {
                let weights = forest.predict_proba(&features[i]);
                ClassProbabilities::<L>::from_weights(&weights).argmax().code() == codes[i]
            })
            .count();
        let accuracy = correct as f64 / scored.len().max(1) as f64;

        let report = TrainingReport {
            accuracy,
            train_samples: train_idx.len(),
            validation_samples: validation_idx.len(),
            trees: forest.trees.len(),
        };

        tracing::info!(
            label = std::any::type_name::<L>(),
            accuracy = report.accuracy,
            train = report.train_samples,
            validation = report.validation_samples,
            trees = report.trees,
            "classifier trained"
        );

        Ok((forest, report))
    }

    pub fn fit_dataset(
        &self,
        dataset: &[(FeatureVector, L)],
    ) -> Result<(Forest, TrainingReport), ClassifierError> {
        let (features, labels): (Vec<FeatureVector>, Vec<L>) = dataset.iter().copied().unzip();
        self.fit(&features, &labels)
    }

    /// Swap in a forest grown by [`Classifier::fit`] for this label set.
    pub(crate) fn store(&self, forest: Forest) {
        self.model.store(Some(Arc::new(forest)));
    }

    /// Predict from a raw slice. Fails if untrained, if the length is not
    /// [`FEATURE_COUNT`], or if any value is non-finite.
    pub fn predict(&self, features: &[f32]) -> Result<Prediction<L>, ClassifierError> {
        let forest = self
            .model
            .load_full()
            .ok_or(ClassifierError::ModelNotTrained)?;

        if features.len() != FEATURE_COUNT {
            return Err(ClassifierError::InvalidFeatureVector(format!(
                "expected {FEATURE_COUNT} values, got {}",
                features.len()
            )));
        }
        let vector = FeatureVector::from_slice(features).ok_or_else(|| {
            ClassifierError::InvalidFeatureVector("non-finite value".to_string())
        })?;

        let probabilities = ClassProbabilities::from_weights(&forest.predict_proba(&vector));
        Ok(Prediction::from_probabilities(probabilities))
    }

    /// Predict from an already validated vector.
    pub fn predict_vector(
        &self,
        features: &FeatureVector,
    ) -> Result<Prediction<L>, ClassifierError> {
        self.predict(features.as_slice())
    }

    /// The currently installed forest, if any.
    pub fn snapshot(&self) -> Option<Arc<Forest>> {
        self.model.load_full()
    }

    /// Validate and swap in a previously trained forest.
    pub fn install(&self, forest: Forest) -> Result<(), ClassifierError> {
        self.check(&forest)?;
        let trees = forest.trees.len();
        self.store(forest);
        tracing::info!(
            label = std::any::type_name::<L>(),
            trees,
            "classifier model installed"
        );
        Ok(())
    }

    /// Validate a forest against this label set without installing it.
    pub fn check(&self, forest: &Forest) -> Result<(), ClassifierError> {
        forest.validate(L::ALL.len())
    }
}

impl<L: SyntheticLabel> Classifier<L> {
    /// Train on [`synthetic::DEFAULT_SAMPLE_COUNT`] synthetic samples.
    pub fn auto_train(&self) -> Result<TrainingReport, ClassifierError> {
        self.auto_train_with(synthetic::DEFAULT_SAMPLE_COUNT, self.params.seed)
    }

    pub fn auto_train_with(
        &self,
        samples: usize,
        seed: Option<u64>,
    ) -> Result<TrainingReport, ClassifierError> {
        let generated = SyntheticDataGenerator::default().generate(samples, seed);
        self.train_dataset(&synthetic::labeled::<L>(&generated))
    }
}

impl Default for Classifier<SkinType> {
    fn default() -> Self {
        Self::new(ForestParams::default())
    }
}

impl Default for Classifier<SkinCondition> {
    fn default() -> Self {
        Self::new(ForestParams::condition())
    }
}

/// Shuffle each class's indices and hold out `fraction` of them, keeping
/// at least one training sample per class.
fn stratified_split(
    codes: &[usize],
    classes: usize,
    fraction: f64,
    rng: &mut StdRng,
) -> (Vec<usize>, Vec<usize>) {
    let mut train = Vec::with_capacity(codes.len());
    let mut validation = Vec::new();

    for class in 0..classes {
        let mut members: Vec<usize> = (0..codes.len()).filter(|&i| codes[i] == class).collect();
        members.shuffle(rng);
        let held = ((members.len() as f64 * fraction).round() as usize)
            .min(members.len().saturating_sub(1));
        validation.extend_from_slice(&members[..held]);
        train.extend_from_slice(&members[held..]);
    }

    train.sort_unstable();
    validation.sort_unstable();
    (train, validation)
}
