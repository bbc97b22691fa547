//! Prompt construction for recipe generation.

use crate::domain::recipes::RecipeRequest;
use crate::infra::upstream::GenerationPrompt;

const EXPECTED_FORMAT: &str = r#"[{"name": "string", "recipe": ["string"], "calories": number}]"#;

/// Build the structured-output prompt for `count` recipes.
pub fn build_prompt(request: &RecipeRequest, count: u8) -> GenerationPrompt {
    let exclusions = if request.allergies().is_empty() {
        "None".to_string()
    } else {
        request.allergies().join(", ")
    };

    let text = format!(
        "Generate {count} recipes as a JSON array.\n\
         Diet: {diet}\n\
         Meal Types: {meal_types}\n\
         Cuisines: {cuisines}\n\
         Ingredients: {ingredients}\n\
         Exclude: {exclusions}\n\
         Use only the listed ingredients. Basic salt, oil and spices may be assumed.\n\
         Format: {EXPECTED_FORMAT}",
        diet = request.diet(),
        meal_types = request.meal_types().join(", "),
        cuisines = request.cuisines().join(", "),
        ingredients = request.ingredients().join(", "),
    );

    GenerationPrompt {
        text,
        json_output: true,
    }
}
