//! User profile: age, skin concerns, and budget.

use crate::catalog::Product;
use crate::types::SkinCondition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MIN_AGE: u32 = 1;
const MAX_AGE: u32 = 120;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProfileError {
    #[error("age {0} outside {MIN_AGE}..={MAX_AGE}")]
    InvalidAge(u32),
    #[error("invalid budget range {min}..{max}: bounds must be finite, non-negative, and min <= max")]
    InvalidBudget { min: f64, max: f64 },
}

/// Fixed vocabulary of skin concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concern {
    Acne,
    Aging,
    Dryness,
    Sensitivity,
    Oiliness,
    Pigmentation,
    LargePores,
}

impl Concern {
    pub const ALL: [Concern; 7] = [
        Self::Acne,
        Self::Aging,
        Self::Dryness,
        Self::Sensitivity,
        Self::Oiliness,
        Self::Pigmentation,
        Self::LargePores,
    ];

    /// Lowercase fragments that mark a product benefit or ingredient as
    /// addressing this concern.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Acne => &["acne", "blemish", "breakout", "blackhead", "salicylic"],
            Self::Aging => &["anti-aging", "wrinkle", "fine line", "retinol", "firming"],
            Self::Dryness => &["hydrat", "dryness", "hyaluronic", "ceramide", "barrier"],
            Self::Sensitivity => &["soothing", "calming", "sensitiv", "redness", "centella"],
            Self::Oiliness => &["oil control", "oil-free", "mattif", "sebum", "niacinamide"],
            Self::Pigmentation => &["pigment", "dark spot", "brighten", "vitamin c", "azelaic"],
            Self::LargePores => &["pore", "exfoliat", "bha"],
        }
    }

    /// Whether any of the product's benefits or ingredients mention this concern.
    pub fn addressed_by(self, product: &Product) -> bool {
        product
            .benefits
            .iter()
            .chain(&product.ingredients)
            .map(|s| s.to_lowercase())
            .any(|s| self.keywords().iter().any(|k| s.contains(k)))
    }

    /// Concern implied by a detected skin condition.
    pub fn implied_by(condition: SkinCondition) -> Option<Concern> {
        match condition {
            SkinCondition::Normal => None,
            SkinCondition::Acne => Some(Self::Acne),
            SkinCondition::Pigmentation => Some(Self::Pigmentation),
            SkinCondition::LargePores => Some(Self::LargePores),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Acne => "acne",
            Self::Aging => "aging",
            Self::Dryness => "dryness",
            Self::Sensitivity => "sensitivity",
            Self::Oiliness => "oiliness",
            Self::Pigmentation => "pigmentation",
            Self::LargePores => "large pores",
        }
    }
}

impl fmt::Display for Concern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Concern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-'], " ").as_str() {
            "acne" => Ok(Self::Acne),
            "aging" | "ageing" | "wrinkles" => Ok(Self::Aging),
            "dryness" | "dry" => Ok(Self::Dryness),
            "sensitivity" | "sensitive" | "redness" => Ok(Self::Sensitivity),
            "oiliness" | "oily" | "oil" => Ok(Self::Oiliness),
            "pigmentation" | "dark spots" | "melasma" => Ok(Self::Pigmentation),
            "large pores" | "pores" => Ok(Self::LargePores),
            other => Err(format!("unknown concern: {other}")),
        }
    }
}

/// Inclusive price range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetRange {
    min: f64,
    max: f64,
}

impl BudgetRange {
    pub fn new(min: f64, max: f64) -> Result<Self, ProfileError> {
        if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max {
            return Err(ProfileError::InvalidBudget { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn contains(&self, price: f64) -> bool {
        (self.min..=self.max).contains(&price)
    }
}

/// Validated per-request user profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    age: u8,
    concerns: BTreeSet<Concern>,
    budget: BudgetRange,
}

impl UserProfile {
    pub fn new(
        age: u32,
        concerns: impl IntoIterator<Item = Concern>,
        budget: BudgetRange,
    ) -> Result<Self, ProfileError> {
        if !(MIN_AGE..=MAX_AGE).contains(&age) {
            return Err(ProfileError::InvalidAge(age));
        }
        Ok(Self {
            // Bounded by MAX_AGE above.
            age: age as u8,
            concerns: concerns.into_iter().collect(),
            budget,
        })
    }

    pub fn age(&self) -> u8 {
        self.age
    }

    pub fn concerns(&self) -> &BTreeSet<Concern> {
        &self.concerns
    }

    pub fn budget(&self) -> &BudgetRange {
        &self.budget
    }

    /// Copy of the profile with one more concern.
    pub fn with_concern(&self, concern: Concern) -> Self {
        let mut profile = self.clone();
        profile.concerns.insert(concern);
        profile
    }
}
