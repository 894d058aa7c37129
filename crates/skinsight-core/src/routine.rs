//! Morning and evening routine scheduling.
//!
//! Each time of day has a fixed taxonomy of slots. A slot is filled by the
//! top-ranked product of the first of its categories that has a
//! recommendation; empty slots are skipped. A step's position is its slot's
//! 1-based index in the taxonomy, so positions can have gaps.

use crate::catalog::{Product, ProductCategory};
use crate::recommender::Recommendations;
use serde::{Deserialize, Serialize};
use std::fmt;

use ProductCategory::{Cleanser, Moisturizer, Serum, Sunscreen, Toner, Treatment};

const MORNING_SLOTS: &[&[ProductCategory]] = &[
    &[Cleanser],
    &[Toner],
    &[Serum],
    &[Moisturizer],
    &[Sunscreen],
];
const EVENING_SLOTS: &[&[ProductCategory]] =
    &[&[Cleanser], &[Toner], &[Treatment, Serum], &[Moisturizer]];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Evening,
}

impl TimeOfDay {
    /// Slot taxonomy; each slot lists acceptable categories in preference order.
    pub fn slots(self) -> &'static [&'static [ProductCategory]] {
        match self {
            Self::Morning => MORNING_SLOTS,
            Self::Evening => EVENING_SLOTS,
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Morning => "Morning",
            Self::Evening => "Evening",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutineStep<'a> {
    pub time: TimeOfDay,
    /// 1-based taxonomy position.
    pub position: usize,
    pub category: ProductCategory,
    pub product: &'a Product,
    pub usage: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Routine<'a> {
    pub morning: Vec<RoutineStep<'a>>,
    pub evening: Vec<RoutineStep<'a>>,
}

impl<'a> Routine<'a> {
    pub fn steps(&self) -> impl Iterator<Item = &RoutineStep<'a>> {
        self.morning.iter().chain(&self.evening)
    }

    pub fn is_empty(&self) -> bool {
        self.morning.is_empty() && self.evening.is_empty()
    }
}

/// Arrange the top product of each recommended category into morning and
/// evening steps.
pub fn build_routine<'a>(recommendations: &Recommendations<'a>) -> Routine<'a> {
    Routine {
        morning: schedule(TimeOfDay::Morning, recommendations),
        evening: schedule(TimeOfDay::Evening, recommendations),
    }
}

fn schedule<'a>(time: TimeOfDay, recommendations: &Recommendations<'a>) -> Vec<RoutineStep<'a>> {
    time.slots()
        .iter()
        .enumerate()
        .filter_map(|(i, slot)| {
            slot.iter().find_map(|&category| {
                recommendations.top(category).map(|product| RoutineStep {
                    time,
                    position: i + 1,
                    category,
                    product,
                    usage: category.usage(),
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::profile::{BudgetRange, UserProfile};
    use crate::recommender::ProductRecommender;
    use crate::types::SkinType;

    fn product(name: &str, category: ProductCategory, types: &[SkinType]) -> Product {
        Product {
            name: name.into(),
            brand: "Brand".into(),
            category,
            price: 10.0,
            rating: 4.0,
            skin_types: types.iter().copied().collect(),
            ingredients: Vec::new(),
            benefits: Vec::new(),
            age_range: None,
        }
    }

    fn profile() -> UserProfile {
        UserProfile::new(28, [], BudgetRange::new(0.0, 100.0).unwrap()).unwrap()
    }

    fn full_catalog() -> Catalog {
        Catalog::new(
            ProductCategory::ALL
                .iter()
                .map(|&c| product(&format!("{c} pick"), c, &[SkinType::Dry]))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_full_routine_positions() {
        let catalog = full_catalog();
        let recs = ProductRecommender::default().recommend(SkinType::Dry, &profile(), &catalog);
        let routine = build_routine(&recs);

        let morning: Vec<(usize, ProductCategory)> =
            routine.morning.iter().map(|s| (s.position, s.category)).collect();
        assert_eq!(
            morning,
            [(1, Cleanser), (2, Toner), (3, Serum), (4, Moisturizer), (5, Sunscreen)]
        );

        let evening: Vec<(usize, ProductCategory)> =
            routine.evening.iter().map(|s| (s.position, s.category)).collect();
        assert_eq!(evening, [(1, Cleanser), (2, Toner), (3, Treatment), (4, Moisturizer)]);
        assert!(routine.steps().all(|s| s.usage == s.category.usage()));
    }

    #[test]
    fn test_evening_serum_fills_treatment_slot() {
        let catalog = Catalog::new(vec![product("Serum", Serum, &[SkinType::Dry])]).unwrap();
        let recs = ProductRecommender::default().recommend(SkinType::Dry, &profile(), &catalog);
        let routine = build_routine(&recs);
        assert_eq!(routine.evening.len(), 1);
        assert_eq!(routine.evening[0].position, 3);
        assert_eq!(routine.evening[0].category, Serum);
    }

    #[test]
    fn test_oily_only_cleanser_not_scheduled_for_dry() {
        let catalog = Catalog::new(vec![
            product("Oily Wash", Cleanser, &[SkinType::Oily]),
            product("Dry Cream", Moisturizer, &[SkinType::Dry]),
        ])
        .unwrap();
        let recs = ProductRecommender::default().recommend(SkinType::Dry, &profile(), &catalog);
        let routine = build_routine(&recs);

        assert!(routine.steps().all(|s| s.category != Cleanser));
        assert_eq!(routine.morning.len(), 1);
        assert_eq!(routine.morning[0].position, 4);
        assert_eq!(routine.evening[0].position, 4);
    }

    #[test]
    fn test_steps_come_from_recommendations() {
        let catalog = full_catalog();
        let recs = ProductRecommender::default().recommend(SkinType::Dry, &profile(), &catalog);
        let routine = build_routine(&recs);
        for step in routine.steps() {
            assert_eq!(recs.top(step.category).map(|p| &p.name), Some(&step.product.name));
            assert!(step.time.slots()[step.position - 1].contains(&step.category));
        }
    }

    #[test]
    fn test_empty_recommendations_empty_routine() {
        let catalog = Catalog::default();
        let recs = ProductRecommender::default().recommend(SkinType::Oily, &profile(), &catalog);
        assert!(build_routine(&recs).is_empty());
    }
}
