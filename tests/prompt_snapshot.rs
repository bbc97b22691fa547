use larder::application::recipes::build_prompt;
use larder::domain::recipes::RecipeRequestDraft;

#[test]
fn breakfast_prompt_snapshot() {
    let request = RecipeRequestDraft {
        ingredients: Some(vec!["spinach".into(), " paneer ".into(), "rice".into()]),
        allergies: Some(vec!["peanut".into(), "dairy".into()]),
        cuisines: Some(vec!["Indian".into()]),
        meal_types: Some(vec!["Breakfast".into(), "Brunch".into()]),
        diet: Some("Vegetarian".into()),
    }
    .validate()
    .expect("valid request");

    let prompt = build_prompt(&request, 3);

    assert!(prompt.json_output);
    insta::assert_snapshot!(prompt.text, @r#"
    Generate 3 recipes as a JSON array.
    Diet: Vegetarian
    Meal Types: Breakfast, Brunch
    Cuisines: Indian
    Ingredients: paneer, rice, spinach
    Exclude: dairy, peanut
    Use only the listed ingredients. Basic salt, oil and spices may be assumed.
    Format: [{"name": "string", "recipe": ["string"], "calories": number}]
    "#);
}
