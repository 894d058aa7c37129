//! skinsight-core — Skin-type inference and skincare recommendation engine.
//!
//! Extracts geometry and texture features from a detected face, classifies
//! skin type (and visible condition) with random-forest models trained on
//! synthetic data, then ranks catalog products and arranges them into a
//! morning and evening routine.

pub mod advisor;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod features;
pub mod profile;
pub mod recommender;
pub mod routine;
pub mod synthetic;
pub mod tree;
pub mod types;

pub use advisor::{AnalysisError, ModelBundle, SkinAdvisor, SkinReport};
pub use catalog::{Catalog, Product, ProductCategory};
pub use classifier::{ConditionClassifier, ForestParams, SkinTypeClassifier};
pub use config::EngineConfig;
pub use features::extract_features;
pub use profile::{BudgetRange, Concern, UserProfile};
pub use recommender::{ProductRecommender, Recommendations};
pub use routine::{build_routine, Routine, RoutineStep, TimeOfDay};
pub use synthetic::generate_synthetic_dataset;
pub use types::{
    BoundingBox, FaceRegion, FeatureIndex, FeatureVector, Prediction, SkinCondition, SkinType,
};
