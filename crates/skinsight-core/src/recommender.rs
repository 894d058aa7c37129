//! Multi-criteria product ranking.
//!
//! Products are filtered by exact skin-type suitability, scored as a weighted
//! sum of concern overlap, budget fit, age suitability, and rating, then
//! ranked per category and truncated to the top K. A restrictive budget
//! only down-ranks; it never empties a category on its own.

use crate::catalog::{Catalog, Product, ProductCategory};
use crate::profile::{BudgetRange, UserProfile};
use crate::types::SkinType;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

// --- Named constants ---
const CONCERN_WEIGHT: f64 = 0.4;
const BUDGET_WEIGHT: f64 = 0.3;
const AGE_WEIGHT: f64 = 0.1;
const RATING_WEIGHT: f64 = 0.2;
const DEFAULT_BUDGET_TOLERANCE: f64 = 0.2;
const DEFAULT_TOP_K: usize = 3;
const MAX_RATING: f64 = 5.0;
/// Score given when there is nothing to match against.
const NEUTRAL: f64 = 0.5;
/// Years outside a product's age range at which suitability reaches 0.
const AGE_FALLOFF_YEARS: f64 = 10.0;

/// Relative weight of each scoring criterion. Sums to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub concern: f64,
    pub budget: f64,
    pub age: f64,
    pub rating: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            concern: CONCERN_WEIGHT,
            budget: BUDGET_WEIGHT,
            age: AGE_WEIGHT,
            rating: RATING_WEIGHT,
        }
    }
}

impl ScoreWeights {
    pub fn total(&self) -> f64 {
        self.concern + self.budget + self.age + self.rating
    }
}

/// Scoring and truncation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    pub weights: ScoreWeights,
    /// Width of the linear decay band beyond the budget, as a fraction of
    /// the nearer bound.
    pub budget_tolerance: f64,
    pub top_k: usize,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            budget_tolerance: DEFAULT_BUDGET_TOLERANCE,
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// Per-criterion scores, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub concern: f64,
    pub budget: f64,
    pub age: f64,
    pub rating: f64,
}

/// A product with its weighted score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredProduct<'a> {
    pub product: &'a Product,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Ranked products per category, best first. Every category has an entry,
/// possibly empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendations<'a> {
    pub skin_type: SkinType,
    pub by_category: BTreeMap<ProductCategory, Vec<ScoredProduct<'a>>>,
}

impl<'a> Recommendations<'a> {
    pub fn get(&self, category: ProductCategory) -> &[ScoredProduct<'a>] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Best-ranked product in a category.
    pub fn top(&self, category: ProductCategory) -> Option<&'a Product> {
        self.get(category).first().map(|s| s.product)
    }

    /// Sum of the top pick's price in every non-empty category.
    pub fn estimated_cost(&self) -> f64 {
        ProductCategory::ALL
            .iter()
            .filter_map(|&c| self.top(c))
            .map(|p| p.price)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_category.values().all(Vec::is_empty)
    }
}

/// Stateless scorer over a [`RecommenderConfig`].
#[derive(Debug, Clone, Default)]
pub struct ProductRecommender {
    config: RecommenderConfig,
}

impl ProductRecommender {
    pub fn new(config: RecommenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    /// Rank every suitable catalog product for `skin_type` and `profile`.
    pub fn recommend<'a>(
        &self,
        skin_type: SkinType,
        profile: &UserProfile,
        catalog: &'a Catalog,
    ) -> Recommendations<'a> {
        let mut by_category: BTreeMap<ProductCategory, Vec<ScoredProduct<'a>>> =
            ProductCategory::ALL.iter().map(|&c| (c, Vec::new())).collect();

        for product in catalog.products().iter().filter(|p| p.suits(skin_type)) {
            let scored = self.score(product, profile);
            by_category.entry(product.category).or_default().push(scored);
        }

        for (category, ranked) in by_category.iter_mut() {
            ranked.sort_by(compare_ranked);
            ranked.truncate(self.config.top_k);
            if ranked.is_empty() {
                tracing::debug!(%category, %skin_type, "no suitable products");
            }
        }

        Recommendations {
            skin_type,
            by_category,
        }
    }

    /// Weighted score for one product.
    pub fn score<'a>(&self, product: &'a Product, profile: &UserProfile) -> ScoredProduct<'a> {
        let breakdown = ScoreBreakdown {
            concern: concern_overlap(product, profile),
            budget: budget_fit(product.price, profile.budget(), self.config.budget_tolerance),
            age: age_suitability(product, profile.age()),
            rating: (f64::from(product.rating) / MAX_RATING).clamp(0.0, 1.0),
        };
        let w = &self.config.weights;
        let score = w.concern * breakdown.concern
            + w.budget * breakdown.budget
            + w.age * breakdown.age
            + w.rating * breakdown.rating;

        ScoredProduct {
            product,
            score,
            breakdown,
        }
    }
}

/// Score desc, then rating desc, then name asc.
fn compare_ranked(a: &ScoredProduct<'_>, b: &ScoredProduct<'_>) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.product.rating.total_cmp(&a.product.rating))
        .then_with(|| a.product.name.cmp(&b.product.name))
}

/// Fraction of the user's concerns the product addresses.
fn concern_overlap(product: &Product, profile: &UserProfile) -> f64 {
    let concerns = profile.concerns();
    if concerns.is_empty() {
        return NEUTRAL;
    }
    let matched = concerns.iter().filter(|c| c.addressed_by(product)).count();
    matched as f64 / concerns.len() as f64
}

/// 1 inside the budget, linear decay to 0 across the tolerance band on
/// either side, 0 beyond.
fn budget_fit(price: f64, budget: &BudgetRange, tolerance: f64) -> f64 {
    if budget.contains(price) {
        return 1.0;
    }
    let (gap, bound) = if price > budget.max() {
        (price - budget.max(), budget.max())
    } else {
        (budget.min() - price, budget.min())
    };
    let band = bound * tolerance;
    if band <= 0.0 {
        return 0.0;
    }
    (1.0 - gap / band).max(0.0)
}

fn age_suitability(product: &Product, age: u8) -> f64 {
    match product.age_range {
        None => NEUTRAL,
        Some(range) => (1.0 - f64::from(range.distance(age)) / AGE_FALLOFF_YEARS).max(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AgeRange;
    use crate::profile::Concern;

    fn product(
        name: &str,
        category: ProductCategory,
        price: f64,
        rating: f32,
        types: &[SkinType],
    ) -> Product {
        Product {
            name: name.into(),
            brand: "Brand".into(),
            category,
            price,
            rating,
            skin_types: types.iter().copied().collect(),
            ingredients: Vec::new(),
            benefits: Vec::new(),
            age_range: None,
        }
    }

    fn profile(concerns: &[Concern], min: f64, max: f64) -> UserProfile {
        UserProfile::new(30, concerns.iter().copied(), BudgetRange::new(min, max).unwrap()).unwrap()
    }

    #[test]
    fn test_budget_fit_decay() {
        let budget = BudgetRange::new(10.0, 100.0).unwrap();
        assert_eq!(budget_fit(50.0, &budget, 0.2), 1.0);
        assert_eq!(budget_fit(100.0, &budget, 0.2), 1.0);
        assert!((budget_fit(110.0, &budget, 0.2) - 0.5).abs() < 1e-9);
        assert_eq!(budget_fit(120.0, &budget, 0.2), 0.0);
        assert_eq!(budget_fit(500.0, &budget, 0.2), 0.0);
        assert!((budget_fit(9.0, &budget, 0.2) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_budget_fit_zero_bound() {
        let budget = BudgetRange::new(0.0, 0.0).unwrap();
        assert_eq!(budget_fit(0.0, &budget, 0.2), 1.0);
        assert_eq!(budget_fit(5.0, &budget, 0.2), 0.0);
    }

    #[test]
    fn test_age_suitability() {
        let mut p = product("A", ProductCategory::Serum, 10.0, 4.0, &[SkinType::Dry]);
        assert_eq!(age_suitability(&p, 30), NEUTRAL);
        p.age_range = Some(AgeRange { min: 18, max: 25 });
        assert_eq!(age_suitability(&p, 20), 1.0);
        assert!((age_suitability(&p, 30) - 0.5).abs() < 1e-9);
        assert_eq!(age_suitability(&p, 60), 0.0);
    }

    #[test]
    fn test_concern_overlap() {
        let mut p = product("A", ProductCategory::Serum, 10.0, 4.0, &[SkinType::Dry]);
        p.benefits = vec!["hydration".into()];
        assert_eq!(concern_overlap(&p, &profile(&[], 0.0, 50.0)), NEUTRAL);
        assert_eq!(concern_overlap(&p, &profile(&[Concern::Dryness], 0.0, 50.0)), 1.0);
        assert_eq!(
            concern_overlap(&p, &profile(&[Concern::Dryness, Concern::Acne], 0.0, 50.0)),
            0.5
        );
    }

    #[test]
    fn test_skin_type_filter_exact() {
        let catalog = Catalog::new(vec![
            product("Oily Wash", ProductCategory::Cleanser, 10.0, 4.5, &[SkinType::Oily]),
            product("Dry Cream", ProductCategory::Moisturizer, 10.0, 4.5, &[SkinType::Dry]),
        ])
        .unwrap();
        let recs = ProductRecommender::default().recommend(
            SkinType::Dry,
            &profile(&[], 0.0, 50.0),
            &catalog,
        );

        assert!(recs.get(ProductCategory::Cleanser).is_empty());
        assert_eq!(
            recs.top(ProductCategory::Moisturizer).map(|p| p.name.as_str()),
            Some("Dry Cream")
        );
        assert_eq!(recs.by_category.len(), ProductCategory::ALL.len());
        for ranked in recs.by_category.values() {
            assert!(ranked.iter().all(|s| s.product.suits(SkinType::Dry)));
        }
    }

    #[test]
    fn test_ordering_score_then_rating_then_name() {
        // Same price and no concerns: scores differ only through rating.
        let catalog = Catalog::new(vec![
            product("Beta", ProductCategory::Serum, 20.0, 4.0, &[SkinType::Oily]),
            product("Alpha", ProductCategory::Serum, 20.0, 4.0, &[SkinType::Oily]),
            product("Gamma", ProductCategory::Serum, 20.0, 4.8, &[SkinType::Oily]),
            product("Delta", ProductCategory::Serum, 200.0, 5.0, &[SkinType::Oily]),
        ])
        .unwrap();
        let config = RecommenderConfig {
            top_k: 10,
            ..RecommenderConfig::default()
        };
        let recs = ProductRecommender::new(config).recommend(
            SkinType::Oily,
            &profile(&[], 0.0, 50.0),
            &catalog,
        );
        let names: Vec<&str> = recs
            .get(ProductCategory::Serum)
            .iter()
            .map(|s| s.product.name.as_str())
            .collect();
        assert_eq!(names, ["Gamma", "Alpha", "Beta", "Delta"]);

        let ranked = recs.get(ProductCategory::Serum);
        for pair in ranked.windows(2) {
            assert!(compare_ranked(&pair[0], &pair[1]) != Ordering::Greater);
        }
    }

    #[test]
    fn test_restrictive_budget_down_ranks_only() {
        let catalog = Catalog::new(vec![
            product("Pricey", ProductCategory::Sunscreen, 80.0, 4.9, &[SkinType::Dry]),
            product("Luxury", ProductCategory::Sunscreen, 120.0, 4.9, &[SkinType::Dry]),
        ])
        .unwrap();
        let recs = ProductRecommender::default().recommend(
            SkinType::Dry,
            &profile(&[], 0.0, 5.0),
            &catalog,
        );
        let ranked = recs.get(ProductCategory::Sunscreen);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].breakdown.budget, 0.0);
        assert_eq!(ranked[0].product.name, "Luxury");
    }

    #[test]
    fn test_top_k_truncation_and_cost() {
        let combination = &[SkinType::Combination];
        let catalog = Catalog::new(
            (0..5)
                .map(|i| {
                    let name = format!("Cleanser {i}");
                    product(&name, ProductCategory::Cleanser, 10.0, 4.0, combination)
                })
                .chain([product(
                    "Cream",
                    ProductCategory::Moisturizer,
                    25.0,
                    4.0,
                    combination,
                )])
                .collect(),
        )
        .unwrap();
        let recs = ProductRecommender::default().recommend(
            SkinType::Combination,
            &profile(&[], 0.0, 50.0),
            &catalog,
        );
        assert_eq!(recs.get(ProductCategory::Cleanser).len(), DEFAULT_TOP_K);
        assert!((recs.estimated_cost() - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_uses_weights() {
        let mut p = product("A", ProductCategory::Serum, 10.0, 5.0, &[SkinType::Dry]);
        p.benefits = vec!["hydration".into()];
        p.age_range = Some(AgeRange { min: 20, max: 40 });
        let scored =
            ProductRecommender::default().score(&p, &profile(&[Concern::Dryness], 0.0, 50.0));
        assert!((scored.score - 1.0).abs() < 1e-9, "score {}", scored.score);
    }
}
