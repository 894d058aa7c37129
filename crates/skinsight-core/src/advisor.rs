//! End-to-end analysis: face features, skin-type and condition prediction,
//! product ranking, and routine.

use crate::catalog::{Catalog, CatalogError, Product, ProductCategory};
use crate::classifier::{
    ClassifierError, ConditionClassifier, Forest, SkinTypeClassifier, TrainingReport,
};
use crate::config::{ConfigError, EngineConfig, SyntheticConfig};
use crate::features::{extract_features, FeatureError};
use crate::profile::{Concern, ProfileError, UserProfile};
use crate::recommender::{ProductRecommender, Recommendations};
use crate::routine::{build_routine, Routine};
use crate::synthetic::{self, SyntheticDataGenerator};
use crate::types::{
    FaceRegion, FeatureGroup, FeatureIndex, FeatureVector, Prediction, SkinCondition, SkinType,
};
use chrono::{DateTime, Utc};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("feature extraction: {0}")]
    Feature(#[from] FeatureError),
    #[error("classifier: {0}")]
    Classifier(#[from] ClassifierError),
    #[error("profile: {0}")]
    Profile(#[from] ProfileError),
    #[error("catalog: {0}")]
    Catalog(#[from] CatalogError),
    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

/// One feature value with its name and group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NamedFeature {
    pub feature: FeatureIndex,
    pub group: FeatureGroup,
    pub value: f32,
}

/// Serializable result of a full analysis.
#[derive(Debug, Clone, Serialize)]
pub struct SkinReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub face_count: usize,
    pub features: Vec<NamedFeature>,
    pub skin_type: Prediction<SkinType>,
    pub description: &'static str,
    pub care_tips: &'static [&'static str],
    /// Absent when the condition model is not trained.
    pub condition: Option<Prediction<SkinCondition>>,
    /// The user's concerns plus any implied by the detected condition.
    pub concerns: BTreeSet<Concern>,
    pub recommendations: Recommendations<'a>,
    pub routine: Routine<'a>,
    /// Other suitable products for each category's top pick.
    pub alternatives: BTreeMap<ProductCategory, Vec<&'a Product>>,
    pub estimated_cost: f64,
    pub explanation: String,
}

/// Held-out accuracies of both models after a synthetic training run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrainingSummary {
    pub skin_type: TrainingReport,
    pub condition: TrainingReport,
}

/// Trained forests of both models, for saving and restoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub created_at: DateTime<Utc>,
    pub skin_type: Forest,
    #[serde(default)]
    pub condition: Option<Forest>,
}

/// Owns both classifiers and the recommender. The models start untrained;
/// call [`SkinAdvisor::auto_train`] or [`SkinAdvisor::install_bundle`].
pub struct SkinAdvisor {
    skin_type_model: SkinTypeClassifier,
    condition_model: ConditionClassifier,
    recommender: ProductRecommender,
    synthetic: SyntheticConfig,
}

impl SkinAdvisor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            skin_type_model: SkinTypeClassifier::new(config.skin_type_model),
            condition_model: ConditionClassifier::new(config.condition_model),
            recommender: ProductRecommender::new(config.recommender),
            synthetic: config.synthetic,
        }
    }

    pub fn skin_type_model(&self) -> &SkinTypeClassifier {
        &self.skin_type_model
    }

    pub fn condition_model(&self) -> &ConditionClassifier {
        &self.condition_model
    }

    pub fn recommender(&self) -> &ProductRecommender {
        &self.recommender
    }

    /// Train both models on one synthetic dataset. Neither model changes
    /// unless both train successfully.
    pub fn auto_train(&self) -> Result<TrainingSummary, AnalysisError> {
        let samples = SyntheticDataGenerator::default()
            .generate(self.synthetic.samples, self.synthetic.seed);

        let (skin_type_forest, skin_type) = self
            .skin_type_model
            .fit_dataset(&synthetic::labeled::<SkinType>(&samples))?;
        let (condition_forest, condition) = self
            .condition_model
            .fit_dataset(&synthetic::labeled::<SkinCondition>(&samples))?;

        self.skin_type_model.store(skin_type_forest);
        self.condition_model.store(condition_forest);

        Ok(TrainingSummary {
            skin_type,
            condition,
        })
    }

    /// Snapshot of the trained models, or `None` if the skin-type model is
    /// untrained.
    pub fn bundle(&self) -> Option<ModelBundle> {
        let skin_type = self.skin_type_model.snapshot()?;
        Some(ModelBundle {
            created_at: Utc::now(),
            skin_type: Forest::clone(&skin_type),
            condition: self.condition_model.snapshot().map(|f| Forest::clone(&f)),
        })
    }

    /// Install both forests, or neither if either fails validation.
    pub fn install_bundle(&self, bundle: ModelBundle) -> Result<(), AnalysisError> {
        if let Some(condition) = &bundle.condition {
            self.condition_model.check(condition)?;
        }
        self.skin_type_model.install(bundle.skin_type)?;
        if let Some(condition) = bundle.condition {
            self.condition_model.install(condition)?;
        }
        Ok(())
    }

    /// Features only, for inspection.
    pub fn features(
        &self,
        image: &GrayImage,
        region: &FaceRegion,
    ) -> Result<FeatureVector, AnalysisError> {
        Ok(extract_features(image, region)?)
    }

    /// Run the whole pipeline for one face.
    pub fn analyze<'a>(
        &self,
        image: &GrayImage,
        region: &FaceRegion,
        profile: &UserProfile,
        catalog: &'a Catalog,
    ) -> Result<SkinReport<'a>, AnalysisError> {
        let features = extract_features(image, region)?;
        let skin_type = self.skin_type_model.predict_vector(&features)?;

        let condition = match self.condition_model.predict_vector(&features) {
            Ok(prediction) => Some(prediction),
            Err(ClassifierError::ModelNotTrained) => {
                tracing::warn!("condition model not trained; skipping condition");
                None
            }
            Err(e) => return Err(e.into()),
        };

        let implied = condition.as_ref().and_then(|c| Concern::implied_by(c.label));
        let effective = match implied {
            Some(concern) => profile.with_concern(concern),
            None => profile.clone(),
        };

        let recommendations = self.recommender.recommend(skin_type.label, &effective, catalog);
        let routine = build_routine(&recommendations);

        let alternatives = ProductCategory::ALL
            .iter()
            .filter_map(|&category| {
                let top = recommendations.top(category)?;
                let others = catalog.alternatives(skin_type.label, category, &top.name);
                (!others.is_empty()).then_some((category, others))
            })
            .collect();

        let estimated_cost = recommendations.estimated_cost();
        let explanation = explain(&skin_type, condition.as_ref(), &effective, &recommendations);

        tracing::info!(
            skin_type = %skin_type.label,
            confidence = skin_type.confidence,
            condition = ?condition.as_ref().map(|c| c.label),
            steps = routine.morning.len() + routine.evening.len(),
            "analysis complete"
        );

        Ok(SkinReport {
            generated_at: Utc::now(),
            face_count: region.face_count,
            features: features
                .named()
                .map(|(feature, value)| NamedFeature {
                    feature,
                    group: feature.group(),
                    value,
                })
                .collect(),
            description: skin_type.label.description(),
            care_tips: skin_type.label.care_tips(),
            skin_type,
            condition,
            concerns: effective.concerns().clone(),
            recommendations,
            routine,
            alternatives,
            estimated_cost,
            explanation,
        })
    }
}

impl Default for SkinAdvisor {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

fn explain(
    skin_type: &Prediction<SkinType>,
    condition: Option<&Prediction<SkinCondition>>,
    profile: &UserProfile,
    recommendations: &Recommendations<'_>,
) -> String {
    let mut text = format!(
        "Your skin looks {} ({:.0}% confidence). ",
        skin_type.label.to_string().to_lowercase(),
        skin_type.confidence * 100.0
    );

    if let Some(c) = condition.filter(|c| c.label != SkinCondition::Normal) {
        let _ = write!(text, "Signs of {} were detected. ", c.label.to_string().to_lowercase());
    }

    if !profile.concerns().is_empty() {
        let concerns: Vec<&str> = profile.concerns().iter().map(|c| c.as_str()).collect();
        let _ = write!(
            text,
            "Products were ranked against your concerns: {}. ",
            concerns.join(", ")
        );
    }

    let budget = profile.budget();
    let _ = write!(
        text,
        "At age {} with a budget of {:.2} to {:.2} per product, ",
        profile.age(),
        budget.min(),
        budget.max()
    );

    let filled = ProductCategory::ALL
        .iter()
        .filter(|&&c| recommendations.top(c).is_some())
        .count();
    if filled == 0 {
        text.push_str("no catalog products suit this skin type.");
    } else {
        let _ = write!(
            text,
            "the top picks across {filled} categories come to about {:.2}.",
            recommendations.estimated_cost()
        );
    }
    text
}
