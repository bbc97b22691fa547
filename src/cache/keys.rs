//! Cache key derivation.
//!
//! A [`CacheKey`] is the canonical serialization of a validated [`RecipeRequest`]. The
//! request already holds its ingredient and allergy lists in sorted order, so two requests
//! that differ only in list ordering serialize to the same string.

use std::fmt;

use serde_json::json;
use sha2::{Digest, Sha256};

use crate::domain::recipes::RecipeRequest;

/// Bumped whenever the canonical layout or the cached payload shape changes.
const KEY_VERSION: &str = "recipes:v1:";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(request: &RecipeRequest) -> Self {
        let canonical = json!({
            "ingredients": request.ingredients(),
            "allergies": request.allergies(),
            "cuisine": request.cuisines(),
            "mealType": request.meal_types(),
            "diet": request.diet(),
        });
        Self(format!("{KEY_VERSION}{canonical}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fixed-length hex digest of the canonical key, used where key length matters.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recipes::RecipeRequestDraft;

    fn request(ingredients: &[&str], allergies: &[&str], diet: &str) -> RecipeRequest {
        RecipeRequestDraft {
            ingredients: Some(ingredients.iter().map(|s| s.to_string()).collect()),
            allergies: Some(allergies.iter().map(|s| s.to_string()).collect()),
            cuisines: Some(vec!["Indian".to_string()]),
            meal_types: Some(vec!["Breakfast".to_string()]),
            diet: Some(diet.to_string()),
        }
        .validate()
        .expect("valid request")
    }

    #[test]
    fn ingredient_order_does_not_change_key() {
        let first = CacheKey::derive(&request(&["egg", "rice"], &[], "veg"));
        let second = CacheKey::derive(&request(&["rice", "egg"], &[], "veg"));
        assert_eq!(first, second);
        assert_eq!(first.as_str(), second.as_str());
    }

    #[test]
    fn allergy_order_does_not_change_key() {
        let first = CacheKey::derive(&request(&["tofu"], &["soy", "gluten", "peanut"], "vegan"));
        let second = CacheKey::derive(&request(&["tofu"], &["peanut", "soy", "gluten"], "vegan"));
        assert_eq!(first, second);
    }

    #[test]
    fn diet_changes_key() {
        let veg = CacheKey::derive(&request(&["egg"], &[], "veg"));
        let keto = CacheKey::derive(&request(&["egg"], &[], "keto"));
        assert_ne!(veg, keto);
    }

    #[test]
    fn allergies_are_not_confused_with_ingredients() {
        let as_ingredient = CacheKey::derive(&request(&["egg", "milk"], &[], "Any"));
        let as_allergy = CacheKey::derive(&request(&["egg"], &["milk"], "Any"));
        assert_ne!(as_ingredient, as_allergy);
    }

    #[test]
    fn key_is_versioned_and_digest_is_stable() {
        let key = CacheKey::derive(&request(&["egg", "rice"], &[], "veg"));
        assert!(key.as_str().starts_with(KEY_VERSION));
        assert_eq!(key.digest(), key.clone().digest());
        assert_eq!(key.digest().len(), 64);
    }
}
