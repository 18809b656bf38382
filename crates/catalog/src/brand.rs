use serde::{Deserialize, Serialize};

use quoteforge_core::{DomainError, DomainResult, ValueObject};

/// A resolved brand tag: the slug of a catalog entry.
///
/// Tags are only minted by [`BrandCatalog::resolve`], which is how the
/// closed-set rule is enforced at the editing boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrandTag(String);

impl BrandTag {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for BrandTag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl ValueObject for BrandTag {}

/// A catalog entry: stable slug + operator-facing label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub slug: String,
    pub label: String,
}

impl Brand {
    pub fn new(slug: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            label: label.into(),
        }
    }
}

/// The closed set of brands available to line items.
///
/// Deployments extend the set through configuration (see
/// [`BrandCatalog::from_json`]); unknown slugs never enter a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrandCatalog {
    brands: Vec<Brand>,
}

impl Default for BrandCatalog {
    fn default() -> Self {
        Self {
            brands: vec![
                Brand::new("caveste", "Caveste"),
                Brand::new("total-sports", "Total Sports"),
            ],
        }
    }
}

impl BrandCatalog {
    /// Build a catalog from explicit entries.
    ///
    /// Slugs must be non-empty and unique; the catalog itself must not be
    /// empty.
    pub fn new(brands: Vec<Brand>) -> DomainResult<Self> {
        if brands.is_empty() {
            return Err(DomainError::validation("brand catalog must not be empty"));
        }
        for (pos, brand) in brands.iter().enumerate() {
            if brand.slug.trim().is_empty() {
                return Err(DomainError::validation("brand slug must not be empty"));
            }
            if brands[..pos].iter().any(|other| other.slug == brand.slug) {
                return Err(DomainError::validation(format!(
                    "duplicate brand slug: {}",
                    brand.slug
                )));
            }
        }
        Ok(Self { brands })
    }

    /// Load a catalog from its JSON configuration form:
    /// `[{"slug": "...", "label": "..."}, ...]`.
    pub fn from_json(raw: &str) -> DomainResult<Self> {
        let brands: Vec<Brand> = serde_json::from_str(raw)
            .map_err(|e| DomainError::validation(format!("brand catalog config: {e}")))?;
        Self::new(brands)
    }

    pub fn brands(&self) -> &[Brand] {
        &self.brands
    }

    /// Resolve a raw slug to its tag. Unknown slugs are a validation error.
    pub fn resolve(&self, raw: &str) -> DomainResult<BrandTag> {
        let slug = raw.trim();
        self.brands
            .iter()
            .find(|brand| brand.slug == slug)
            .map(|brand| BrandTag(brand.slug.clone()))
            .ok_or_else(|| DomainError::validation(format!("unknown brand: {raw:?}")))
    }

    pub fn contains(&self, tag: &BrandTag) -> bool {
        self.brands.iter().any(|brand| brand.slug == tag.0)
    }

    /// Operator-facing label for a tag, if the tag is in the catalog.
    pub fn label_of(&self, tag: &BrandTag) -> Option<&str> {
        self.brands
            .iter()
            .find(|brand| brand.slug == tag.0)
            .map(|brand| brand.label.as_str())
    }
}
