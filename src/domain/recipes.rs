//! Recipe requests as the gateway sees them: validated, trimmed and put in canonical order.

use larder_api_types::GenerateRequest;
pub use larder_api_types::RecipeResult;

use super::error::ValidationError;

/// Diet label used when the caller expresses no preference.
pub const ANY_DIET: &str = "Any";

/// Unvalidated request fields, straight from the wire or the command line.
#[derive(Debug, Clone, Default)]
pub struct RecipeRequestDraft {
    pub ingredients: Option<Vec<String>>,
    pub allergies: Option<Vec<String>>,
    pub cuisines: Option<Vec<String>>,
    pub meal_types: Option<Vec<String>>,
    pub diet: Option<String>,
}

impl RecipeRequestDraft {
    /// Validate required fields and normalize every list.
    ///
    /// Ingredients and allergies are sorted and de-duplicated so that requests differing
    /// only in list order describe the same recipe set. Cuisines and meal types keep the
    /// caller's order. A blank or missing diet means "no preference".
    pub fn validate(self) -> Result<RecipeRequest, ValidationError> {
        let ingredients = sorted_set(self.ingredients.unwrap_or_default());
        if ingredients.is_empty() {
            return Err(ValidationError::missing("ingredients"));
        }

        let cuisines = cleaned(self.cuisines.unwrap_or_default());
        if cuisines.is_empty() {
            return Err(ValidationError::missing("cuisine"));
        }

        let meal_types = cleaned(self.meal_types.unwrap_or_default());
        if meal_types.is_empty() {
            return Err(ValidationError::missing("mealType"));
        }

        Ok(RecipeRequest {
            ingredients,
            allergies: sorted_set(self.allergies.unwrap_or_default()),
            cuisines,
            meal_types,
            diet: normalize_diet(self.diet.as_deref()),
        })
    }
}

impl From<GenerateRequest> for RecipeRequestDraft {
    fn from(body: GenerateRequest) -> Self {
        Self {
            ingredients: body.ingredients,
            allergies: body.allergies,
            cuisines: body.cuisine.map(|value| value.into_vec()),
            meal_types: body.meal_type.map(|value| value.into_vec()),
            diet: body.diet,
        }
    }
}

/// A validated recipe request. Constructed only through [`RecipeRequestDraft::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeRequest {
    ingredients: Vec<String>,
    allergies: Vec<String>,
    cuisines: Vec<String>,
    meal_types: Vec<String>,
    diet: String,
}

impl RecipeRequest {
    pub fn ingredients(&self) -> &[String] {
        &self.ingredients
    }

    pub fn allergies(&self) -> &[String] {
        &self.allergies
    }

    pub fn cuisines(&self) -> &[String] {
        &self.cuisines
    }

    pub fn meal_types(&self) -> &[String] {
        &self.meal_types
    }

    pub fn diet(&self) -> &str {
        &self.diet
    }
}

fn cleaned(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

fn sorted_set(values: Vec<String>) -> Vec<String> {
    let mut values = cleaned(values);
    values.sort();
    values.dedup();
    values
}

fn normalize_diet(diet: Option<&str>) -> String {
    match diet.map(str::trim) {
        None | Some("") => ANY_DIET.to_string(),
        Some(value) if value.eq_ignore_ascii_case(ANY_DIET) => ANY_DIET.to_string(),
        Some(value) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn draft() -> RecipeRequestDraft {
        RecipeRequestDraft {
            ingredients: Some(strings(&["rice", "egg"])),
            allergies: Some(strings(&["peanut"])),
            cuisines: Some(strings(&["Indian"])),
            meal_types: Some(strings(&["Breakfast"])),
            diet: Some("veg".into()),
        }
    }

    #[test]
    fn ingredients_are_required() {
        let missing = RecipeRequestDraft {
            ingredients: None,
            ..draft()
        };
        assert_eq!(
            missing.validate(),
            Err(ValidationError::missing("ingredients"))
        );

        let blank = RecipeRequestDraft {
            ingredients: Some(strings(&["", "   "])),
            ..draft()
        };
        assert_eq!(blank.validate(), Err(ValidationError::missing("ingredients")));
    }

    #[test]
    fn cuisine_and_meal_type_are_required() {
        let no_cuisine = RecipeRequestDraft {
            cuisines: Some(Vec::new()),
            ..draft()
        };
        assert_eq!(no_cuisine.validate().unwrap_err().field(), "cuisine");

        let no_meal = RecipeRequestDraft {
            meal_types: None,
            ..draft()
        };
        assert_eq!(no_meal.validate().unwrap_err().field(), "mealType");
    }

    #[test]
    fn lists_are_trimmed_sorted_and_deduplicated() {
        let request = RecipeRequestDraft {
            ingredients: Some(strings(&[" rice", "egg ", "rice"])),
            allergies: Some(strings(&["soy", "", "gluten"])),
            cuisines: Some(strings(&["Thai", " Indian "])),
            ..draft()
        }
        .validate()
        .expect("valid request");

        assert_eq!(request.ingredients(), strings(&["egg", "rice"]).as_slice());
        assert_eq!(request.allergies(), strings(&["gluten", "soy"]).as_slice());
        assert_eq!(request.cuisines(), strings(&["Thai", "Indian"]).as_slice());
    }

    #[test]
    fn missing_allergies_mean_no_exclusions() {
        let request = RecipeRequestDraft {
            allergies: None,
            ..draft()
        }
        .validate()
        .expect("valid request");
        assert!(request.allergies().is_empty());
    }

    #[test]
    fn wire_body_single_strings_become_lists() {
        let body: GenerateRequest = serde_json::from_str(
            r#"{"ingredients":["egg"],"cuisine":"Indian","mealType":"Breakfast"}"#,
        )
        .expect("valid body");
        let request = RecipeRequestDraft::from(body)
            .validate()
            .expect("valid request");

        assert_eq!(request.cuisines(), strings(&["Indian"]).as_slice());
        assert_eq!(request.meal_types(), strings(&["Breakfast"]).as_slice());
        assert_eq!(request.diet(), ANY_DIET);
    }

    #[test]
    fn blank_or_any_diet_normalizes_to_any() {
        for diet in [None, Some(""), Some("  "), Some("any"), Some("ANY")] {
            let request = RecipeRequestDraft {
                diet: diet.map(str::to_string),
                ..draft()
            }
            .validate()
            .expect("valid request");
            assert_eq!(request.diet(), ANY_DIET);
        }
    }
}
