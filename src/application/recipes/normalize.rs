//! Turns raw upstream text into a list of [`RecipeResult`]s.
//!
//! Models are told the exact output format and still answer with fenced blocks, wrapper
//! objects, alternative field names and free-text step lists. Every known shape is a
//! variant of a serde untagged enum; anything else becomes placeholder values so one bad
//! item never sinks the whole response.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::domain::recipes::RecipeResult;

pub const UNTITLED_RECIPE: &str = "Untitled Recipe";
pub const UNKNOWN_CALORIES: &str = "0";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("upstream returned empty text")]
    Empty,
    #[error("upstream text contains no JSON document")]
    NoJson,
    #[error("upstream JSON is not a recipe list: {0}")]
    InvalidJson(String),
}

/// Outer document shapes. `{recipes, totalRecipes}` ignores the count.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope {
    List(Vec<Value>),
    Items { items: Vec<Value> },
    Recipes { recipes: Vec<Value> },
    Single(serde_json::Map<String, Value>),
}

impl Envelope {
    fn into_items(self) -> Vec<Value> {
        match self {
            Envelope::List(items) | Envelope::Items { items } => items,
            Envelope::Recipes { recipes } => recipes,
            Envelope::Single(object) => vec![Value::Object(object)],
        }
    }
}

/// Per-item shapes, tried in order.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecipeShape {
    Complete {
        #[serde(alias = "recipeName", alias = "title")]
        name: String,
        #[serde(alias = "steps", alias = "instructions")]
        recipe: Steps,
        calories: Option<Value>,
    },
    Nameless {
        #[serde(alias = "recipe", alias = "instructions")]
        steps: Steps,
        calories: Option<Value>,
    },
    NameOnly {
        #[serde(alias = "recipeName", alias = "title")]
        name: String,
        calories: Option<Value>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Steps {
    List(Vec<Value>),
    Text(String),
    Other(Value),
}

/// Parse and normalize upstream text.
pub fn normalize_response(raw: &str) -> Result<Vec<RecipeResult>, NormalizeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NormalizeError::Empty);
    }

    let envelope = first_envelope(strip_fences(trimmed))?;

    Ok(envelope
        .into_items()
        .into_iter()
        .map(normalize_item)
        .collect())
}

fn normalize_item(value: Value) -> RecipeResult {
    match serde_json::from_value::<RecipeShape>(value) {
        Ok(RecipeShape::Complete {
            name,
            recipe,
            calories,
        }) => build(Some(name), recipe.into_lines(), calories),
        Ok(RecipeShape::Nameless { steps, calories }) => build(None, steps.into_lines(), calories),
        Ok(RecipeShape::NameOnly { name, calories }) => build(Some(name), Vec::new(), calories),
        Err(err) => {
            debug!(
                target = "larder::recipes::normalize",
                error = %err,
                "unrecognized recipe item, using placeholders"
            );
            build(None, Vec::new(), None)
        }
    }
}

fn build(name: Option<String>, recipe: Vec<String>, calories: Option<Value>) -> RecipeResult {
    let name = name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNTITLED_RECIPE.to_string());

    RecipeResult {
        name,
        recipe,
        calories: render_calories(calories.as_ref()),
    }
}

impl Steps {
    fn into_lines(self) -> Vec<String> {
        match self {
            Steps::List(values) => values.iter().filter_map(step_text).collect(),
            Steps::Text(text) => text
                .lines()
                .map(strip_numbering)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            Steps::Other(_) => Vec::new(),
        }
    }
}

fn step_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => strip_numbering(text).to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Object(object) => ["step", "text", "instruction", "description"]
            .iter()
            .find_map(|field| object.get(*field).and_then(Value::as_str))?
            .trim()
            .to_string(),
        Value::Null | Value::Array(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Drop `1.` / `2)` / `-` / `*` prefixes from a free-text step line.
fn strip_numbering(line: &str) -> &str {
    let line = line.trim();
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    let rest = &line[digits..];
    if digits > 0 {
        if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))
            && (stripped.is_empty() || stripped.starts_with(char::is_whitespace))
        {
            return stripped.trim_start();
        }
        return line;
    }
    line.strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .map(str::trim_start)
        .unwrap_or(line)
}

fn render_calories(value: Option<&Value>) -> String {
    let rendered = match value {
        Some(Value::Number(number)) => match number.as_f64() {
            Some(float) if number.is_f64() && float.fract() == 0.0 => format!("{float:.0}"),
            _ => number.to_string(),
        },
        Some(Value::String(text)) => text.trim().to_string(),
        _ => String::new(),
    };
    if rendered.is_empty() {
        UNKNOWN_CALORIES.to_string()
    } else {
        rendered
    }
}

/// Content of the first markdown code fence, or the input when there is none.
fn strip_fences(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text;
    };
    let after_open = &text[open + 3..];
    // A bare word right after the fence is a language tag; anything else is content.
    let tag_len = after_open
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+')))
        .unwrap_or(after_open.len());
    let body = &after_open[tag_len..];
    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// First document that parses when starting at some `[` or `{`, ignoring whatever
/// commentary precedes or follows it.
fn first_envelope(text: &str) -> Result<Envelope, NormalizeError> {
    let mut first_error = None;
    for (start, _) in text.match_indices(['[', '{']) {
        let mut stream =
            serde_json::Deserializer::from_str(&text[start..]).into_iter::<Envelope>();
        match stream.next() {
            Some(Ok(envelope)) => return Ok(envelope),
            Some(Err(err)) => {
                first_error.get_or_insert(err);
            }
            None => {}
        }
    }
    Err(first_error
        .map(|err| NormalizeError::InvalidJson(err.to_string()))
        .unwrap_or(NormalizeError::NoJson))
}
