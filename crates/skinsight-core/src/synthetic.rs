//! Synthetic labeled feature vectors for training the forest classifiers.
//!
//! Each skin type has a per-feature Gaussian template; each skin condition
//! shifts a handful of texture features. Samples are clipped to the
//! feature's valid range after drawing.

use crate::types::{FeatureIndex, FeatureVector, Label, SkinCondition, SkinType, FEATURE_COUNT};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use serde::Serialize;
use thiserror::Error;

/// Sample count used by `auto_train`.
pub const DEFAULT_SAMPLE_COUNT: usize = 1000;

// Geometry does not depend on skin type; all classes share these.
const GEOMETRY_MEAN: [f32; 10] = [0.92, 0.90, 0.90, 0.88, 0.80, 0.38, 0.56, 0.74, 0.42, 0.36];
const GEOMETRY_SPREAD: [f32; 10] = [0.03, 0.04, 0.04, 0.04, 0.05, 0.03, 0.03, 0.03, 0.03, 0.04];

// Texture means: smoothness, contrast, brightness, variance, laplacian,
// dark spots, shine, complexity.
const DRY_TEXTURE: [f32; 8] = [0.55, 0.22, 0.42, 0.05, 0.45, 0.18, 0.02, 0.20];
const OILY_TEXTURE: [f32; 8] = [0.80, 0.28, 0.62, 0.08, 0.20, 0.10, 0.22, 0.10];
const COMBINATION_TEXTURE: [f32; 8] = [0.68, 0.30, 0.52, 0.09, 0.32, 0.14, 0.12, 0.15];
const SENSITIVE_TEXTURE: [f32; 8] = [0.60, 0.36, 0.48, 0.13, 0.38, 0.24, 0.05, 0.18];
const VARIANCE_SPREAD: f32 = 0.02;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeneratorError {
    #[error("template for {class} has invalid spread {spread} at {feature}")]
    InvalidSpread {
        class: String,
        feature: FeatureIndex,
        spread: f32,
    },
    #[error("template for {class} has non-finite mean at {feature}")]
    NonFiniteMean { class: String, feature: FeatureIndex },
}

/// Mean and standard deviation for every feature position of one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassTemplate {
    pub mean: [f32; FEATURE_COUNT],
    pub spread: [f32; FEATURE_COUNT],
}

impl ClassTemplate {
    fn from_texture(texture: [f32; 8], texture_spread: f32) -> Self {
        let mut mean = [0.0; FEATURE_COUNT];
        let mut spread = [texture_spread; FEATURE_COUNT];
        mean[..10].copy_from_slice(&GEOMETRY_MEAN);
        spread[..10].copy_from_slice(&GEOMETRY_SPREAD);
        mean[10..].copy_from_slice(&texture);
        spread[FeatureIndex::Variance.index()] = VARIANCE_SPREAD;
        Self { mean, spread }
    }

    /// Built-in template for a skin type.
    pub fn for_skin_type(skin_type: SkinType) -> Self {
        match skin_type {
            SkinType::Dry => Self::from_texture(DRY_TEXTURE, 0.05),
            SkinType::Oily => Self::from_texture(OILY_TEXTURE, 0.05),
            SkinType::Combination => Self::from_texture(COMBINATION_TEXTURE, 0.07),
            SkinType::Sensitive => Self::from_texture(SENSITIVE_TEXTURE, 0.06),
        }
    }
}

/// Additive per-feature shift for a skin condition.
pub fn condition_offset(condition: SkinCondition) -> [f32; FEATURE_COUNT] {
    let mut offset = [0.0; FEATURE_COUNT];
    let mut set = |idx: FeatureIndex, v: f32| offset[idx.index()] = v;
    match condition {
        SkinCondition::Normal => {}
        SkinCondition::Acne => {
            set(FeatureIndex::DarkSpotRatio, 0.10);
            set(FeatureIndex::TextureComplexity, 0.04);
            set(FeatureIndex::Smoothness, -0.05);
        }
        SkinCondition::Pigmentation => {
            set(FeatureIndex::Contrast, 0.08);
            set(FeatureIndex::DarkSpotRatio, 0.06);
            set(FeatureIndex::Variance, 0.04);
        }
        SkinCondition::LargePores => {
            set(FeatureIndex::TextureComplexity, 0.08);
            set(FeatureIndex::LaplacianEnergy, 0.12);
            set(FeatureIndex::Smoothness, -0.08);
        }
    }
    offset
}

/// One generated sample, carrying both labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntheticSample {
    pub features: FeatureVector,
    pub skin_type: SkinType,
    pub condition: SkinCondition,
}

/// Labels that can be read off a synthetic sample.
pub trait SyntheticLabel: Label {
    fn from_sample(sample: &SyntheticSample) -> Self;
}

impl SyntheticLabel for SkinType {
    fn from_sample(sample: &SyntheticSample) -> Self {
        sample.skin_type
    }
}

impl SyntheticLabel for SkinCondition {
    fn from_sample(sample: &SyntheticSample) -> Self {
        sample.condition
    }
}

/// Built-in templates in skin-type code order.
pub fn builtin_templates() -> [ClassTemplate; 4] {
    [
        SkinType::Dry,
        SkinType::Oily,
        SkinType::Combination,
        SkinType::Sensitive,
    ]
    .map(ClassTemplate::for_skin_type)
}

/// Gaussian sampler over validated per-skin-type templates.
pub struct SyntheticDataGenerator {
    templates: [ClassTemplate; 4],
    offsets: Vec<[f32; FEATURE_COUNT]>,
}

impl SyntheticDataGenerator {
    /// Build from explicit templates, one per skin type in code order.
    pub fn new(templates: [ClassTemplate; 4]) -> Result<Self, GeneratorError> {
        for (template, skin_type) in templates.iter().zip(SkinType::ALL) {
            for feature in FeatureIndex::ALL {
                let i = feature.index();
                if !template.mean[i].is_finite() {
                    return Err(GeneratorError::NonFiniteMean {
                        class: skin_type.to_string(),
                        feature,
                    });
                }
                let spread = template.spread[i];
                if !spread.is_finite() || spread < 0.0 {
                    return Err(GeneratorError::InvalidSpread {
                        class: skin_type.to_string(),
                        feature,
                        spread,
                    });
                }
            }
        }

        Ok(Self {
            templates,
            offsets: SkinCondition::ALL.iter().map(|&c| condition_offset(c)).collect(),
        })
    }

    /// Generate `n` samples, `n / 4` per skin type with the remainder going
    /// to the lowest codes. Conditions rotate within each skin type.
    ///
    /// With a seed the output is fully reproducible.
    pub fn generate(&self, n: usize, seed: Option<u64>) -> Vec<SyntheticSample> {
        let mut rng: StdRng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let classes = SkinType::ALL.len();
        let mut samples = Vec::with_capacity(n);

        for (&skin_type, template) in SkinType::ALL.iter().zip(&self.templates) {
            let count = n / classes + usize::from(skin_type.code() < n % classes);

            for j in 0..count {
                let condition = SkinCondition::ALL[j % SkinCondition::ALL.len()];
                let offset = &self.offsets[condition.code()];

                let mut values = [0.0f32; FEATURE_COUNT];
                for feature in FeatureIndex::ALL {
                    let i = feature.index();
                    let (lo, hi) = feature.valid_range();
                    let z: f32 = StandardNormal.sample(&mut rng);
                    let value = template.mean[i] + template.spread[i] * z + offset[i];
                    values[i] = value.clamp(lo, hi);
                }

                // Clamped draws from finite templates are always finite.
                if let Some(features) = FeatureVector::from_array(values) {
                    samples.push(SyntheticSample {
                        features,
                        skin_type,
                        condition,
                    });
                }
            }
        }

        tracing::debug!(samples = samples.len(), ?seed, "generated synthetic dataset");
        samples
    }
}

impl Default for SyntheticDataGenerator {
    fn default() -> Self {
        Self {
            templates: builtin_templates(),
            offsets: SkinCondition::ALL.iter().map(|&c| condition_offset(c)).collect(),
        }
    }
}

/// Generate `n` labeled samples from the built-in skin-type templates.
pub fn generate_synthetic_dataset(n: usize, seed: Option<u64>) -> Vec<(FeatureVector, SkinType)> {
    SyntheticDataGenerator::default()
        .generate(n, seed)
        .into_iter()
        .map(|s| (s.features, s.skin_type))
        .collect()
}

/// Project samples onto one label set.
pub fn labeled<L: SyntheticLabel>(samples: &[SyntheticSample]) -> Vec<(FeatureVector, L)> {
    samples
        .iter()
        .map(|s| (s.features, L::from_sample(s)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_identical() {
        let a = generate_synthetic_dataset(200, Some(7));
        let b = generate_synthetic_dataset(200, Some(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seed_differs() {
        let a = generate_synthetic_dataset(40, Some(1));
        let b = generate_synthetic_dataset(40, Some(2));
        assert_ne!(a, b);
    }

    #[test]
    fn test_balanced_with_remainder_to_first_classes() {
        let data = generate_synthetic_dataset(10, Some(0));
        let count = |t: SkinType| data.iter().filter(|(_, l)| *l == t).count();
        assert_eq!(count(SkinType::Dry), 3);
        assert_eq!(count(SkinType::Oily), 3);
        assert_eq!(count(SkinType::Combination), 2);
        assert_eq!(count(SkinType::Sensitive), 2);
    }

    #[test]
    fn test_zero_samples() {
        assert!(generate_synthetic_dataset(0, Some(0)).is_empty());
    }

    #[test]
    fn test_values_within_valid_range() {
        for (features, _) in generate_synthetic_dataset(400, Some(3)) {
            for (idx, v) in features.named() {
                let (lo, hi) = idx.valid_range();
                assert!(v.is_finite());
                assert!(v >= lo && v <= hi, "{idx} = {v} outside [{lo}, {hi}]");
            }
        }
    }

    #[test]
    fn test_conditions_rotate_within_skin_type() {
        let samples = SyntheticDataGenerator::default().generate(16, Some(5));
        let dry: Vec<SkinCondition> = samples
            .iter()
            .filter(|s| s.skin_type == SkinType::Dry)
            .map(|s| s.condition)
            .collect();
        assert_eq!(dry, SkinCondition::ALL.to_vec());
    }

    #[test]
    fn test_class_means_follow_templates() {
        let data = generate_synthetic_dataset(4000, Some(11));
        let shine: Vec<f32> = data
            .iter()
            .filter(|(_, l)| *l == SkinType::Oily)
            .map(|(f, _)| f.get(FeatureIndex::ShineRatio))
            .collect();
        let mean = shine.iter().sum::<f32>() / shine.len() as f32;
        assert!((mean - 0.22).abs() < 0.02, "oily shine mean {mean}");
    }

    #[test]
    fn test_rejects_negative_spread() {
        let mut templates = builtin_templates();
        templates[2].spread[4] = -1.0;
        let err = SyntheticDataGenerator::new(templates).err();
        assert!(matches!(
            err,
            Some(GeneratorError::InvalidSpread {
                feature: FeatureIndex::AspectRatio,
                ..
            })
        ));
    }

    #[test]
    fn test_explicit_templates_match_default() {
        let custom = SyntheticDataGenerator::new(builtin_templates())
            .unwrap()
            .generate(50, Some(9));
        let default = SyntheticDataGenerator::default().generate(50, Some(9));
        assert_eq!(custom, default);
    }
}
