//! In-memory product catalog.
//!
//! Products are fixed-schema records loaded from TOML (`[[product]]` tables).
//! A default catalog is embedded at compile time from
//! `contrib/catalog/products.toml`.

use crate::types::SkinType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

const BUILTIN_CATALOG: &str = include_str!("../../../contrib/catalog/products.toml");

static BUILTIN: OnceLock<Catalog> = OnceLock::new();

const MAX_RATING: f32 = 5.0;
const MAX_ALTERNATIVES: usize = 3;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("catalog TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid product {name:?}: {reason}")]
    InvalidProduct { name: String, reason: String },
    #[error("duplicate product name {0:?}")]
    DuplicateProduct(String),
}

/// Closed set of product categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Cleanser,
    Toner,
    Serum,
    Treatment,
    Moisturizer,
    Sunscreen,
}

impl ProductCategory {
    pub const ALL: [ProductCategory; 6] = [
        Self::Cleanser,
        Self::Toner,
        Self::Serum,
        Self::Treatment,
        Self::Moisturizer,
        Self::Sunscreen,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cleanser => "cleanser",
            Self::Toner => "toner",
            Self::Serum => "serum",
            Self::Treatment => "treatment",
            Self::Moisturizer => "moisturizer",
            Self::Sunscreen => "sunscreen",
        }
    }

    /// How a product of this category is applied.
    pub fn usage(self) -> &'static str {
        match self {
            Self::Cleanser => {
                "Massage onto damp skin for 30-60 seconds, then rinse; morning and evening"
            }
            Self::Toner => "Pat onto clean skin with the hands or a cotton pad",
            Self::Serum => "Apply a few drops after toning, before moisturizer",
            Self::Treatment => "Apply a thin layer to affected areas in the evening only",
            Self::Moisturizer => "Apply after serum, morning and evening",
            Self::Sunscreen => {
                "Apply generously as the last morning step; reapply every 2-3 hours outdoors"
            }
        }
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown product category: {s}"))
    }
}

/// Inclusive age range a product is formulated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRange {
    pub min: u8,
    pub max: u8,
}

impl AgeRange {
    pub fn contains(&self, age: u8) -> bool {
        (self.min..=self.max).contains(&age)
    }

    /// Years outside the range; 0 when inside.
    pub fn distance(&self, age: u8) -> u8 {
        if age < self.min {
            self.min - age
        } else {
            age.saturating_sub(self.max)
        }
    }
}

/// A skincare product. Immutable once loaded into a [`Catalog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub brand: String,
    pub category: ProductCategory,
    pub price: f64,
    /// 0.0 to 5.0.
    pub rating: f32,
    pub skin_types: BTreeSet<SkinType>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub age_range: Option<AgeRange>,
}

impl Product {
    pub fn suits(&self, skin_type: SkinType) -> bool {
        self.skin_types.contains(&skin_type)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let invalid = |reason: &str| CatalogError::InvalidProduct {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("empty name"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(invalid("price must be a non-negative number"));
        }
        if !self.rating.is_finite() || !(0.0..=MAX_RATING).contains(&self.rating) {
            return Err(invalid("rating must be within 0.0..=5.0"));
        }
        if self.skin_types.is_empty() {
            return Err(invalid("no suitable skin types"));
        }
        if let Some(range) = self.age_range {
            if range.min > range.max {
                return Err(invalid("age range min exceeds max"));
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(rename = "product", default)]
    products: Vec<Product>,
}

/// Validated, immutable product list.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    /// Validate every product; names must be unique.
    pub fn new(products: Vec<Product>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for product in &products {
            product.validate()?;
            if !seen.insert(product.name.as_str()) {
                return Err(CatalogError::DuplicateProduct(product.name.clone()));
            }
        }
        Ok(Self { products })
    }

    pub fn from_toml_str(src: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(src)?;
        Self::new(file.products)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let src = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_toml_str(&src)?;
        tracing::info!(path = %path.display(), products = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    /// The catalog embedded at compile time, parsed on first use.
    pub fn builtin() -> &'static Catalog {
        BUILTIN.get_or_init(|| match Self::from_toml_str(BUILTIN_CATALOG) {
            Ok(catalog) => {
                tracing::debug!(products = catalog.len(), "builtin catalog parsed");
                catalog
            }
            Err(e) => {
                tracing::error!(error = %e, "bad builtin catalog; using an empty one");
                Self::default()
            }
        })
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.name == name)
    }

    /// Products of `category` suitable for `skin_type`, in catalog order.
    pub fn suitable(
        &self,
        skin_type: SkinType,
        category: ProductCategory,
    ) -> impl Iterator<Item = &Product> + '_ {
        self.products
            .iter()
            .filter(move |p| p.category == category && p.suits(skin_type))
    }

    /// Up to three other suitable products in the same category, best rated
    /// first (ties by name).
    pub fn alternatives(
        &self,
        skin_type: SkinType,
        category: ProductCategory,
        exclude: &str,
    ) -> Vec<&Product> {
        let mut found: Vec<&Product> = self
            .suitable(skin_type, category)
            .filter(|p| p.name != exclude)
            .collect();
        found.sort_by(|a, b| b.rating.total_cmp(&a.rating).then_with(|| a.name.cmp(&b.name)));
        found.truncate(MAX_ALTERNATIVES);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[product]]
name = "Foam A"
brand = "Brand"
category = "cleanser"
price = 12.0
rating = 4.1
skin_types = ["oily", "combination"]
ingredients = ["salicylic acid"]

[[product]]
name = "Foam B"
brand = "Brand"
category = "cleanser"
price = 9.5
rating = 4.6
skin_types = ["oily"]
age_range = { min = 18, max = 35 }

[[product]]
name = "Cream C"
brand = "Other"
category = "moisturizer"
price = 30.0
rating = 4.4
skin_types = ["dry"]
"#;

    #[test]
    fn test_parse_catalog() {
        let catalog = Catalog::from_toml_str(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 3);
        let foam_b = catalog.get("Foam B").unwrap();
        assert_eq!(foam_b.category, ProductCategory::Cleanser);
        assert_eq!(foam_b.age_range, Some(AgeRange { min: 18, max: 35 }));
        assert!(foam_b.suits(SkinType::Oily));
        assert!(!foam_b.suits(SkinType::Dry));
        assert!(catalog.get("Cream C").unwrap().ingredients.is_empty());
    }

    #[test]
    fn test_rejects_bad_rating() {
        let src = SAMPLE.replace("rating = 4.4", "rating = 5.5");
        assert!(matches!(
            Catalog::from_toml_str(&src),
            Err(CatalogError::InvalidProduct { .. })
        ));
    }

    #[test]
    fn test_rejects_duplicate_name() {
        let src = SAMPLE.replace("name = \"Foam B\"", "name = \"Foam A\"");
        assert!(matches!(
            Catalog::from_toml_str(&src),
            Err(CatalogError::DuplicateProduct(name)) if name == "Foam A"
        ));
    }

    #[test]
    fn test_rejects_unknown_category() {
        let src = SAMPLE.replace("category = \"moisturizer\"", "category = \"perfume\"");
        assert!(matches!(Catalog::from_toml_str(&src), Err(CatalogError::Parse(_))));
    }

    #[test]
    fn test_alternatives_by_rating() {
        let catalog = Catalog::from_toml_str(SAMPLE).unwrap();
        let alts = catalog.alternatives(SkinType::Oily, ProductCategory::Cleanser, "Foam B");
        assert_eq!(alts.len(), 1);
        assert_eq!(alts[0].name, "Foam A");
        assert!(catalog
            .alternatives(SkinType::Dry, ProductCategory::Cleanser, "")
            .is_empty());
    }

    #[test]
    fn test_age_range_distance() {
        let range = AgeRange { min: 20, max: 30 };
        assert_eq!(range.distance(25), 0);
        assert_eq!(range.distance(15), 5);
        assert_eq!(range.distance(42), 12);
        assert!(range.contains(20) && range.contains(30));
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("Serum".parse::<ProductCategory>(), Ok(ProductCategory::Serum));
        assert!("lipstick".parse::<ProductCategory>().is_err());
    }

    #[test]
    fn test_builtin_catalog_covers_every_skin_type() {
        let catalog = Catalog::builtin();
        assert!(!catalog.is_empty());
        for &skin_type in <SkinType as crate::types::Label>::ALL {
            for category in [
                ProductCategory::Cleanser,
                ProductCategory::Moisturizer,
                ProductCategory::Sunscreen,
            ] {
                assert!(
                    catalog.suitable(skin_type, category).next().is_some(),
                    "no {category} for {skin_type}"
                );
            }
        }
    }
}
