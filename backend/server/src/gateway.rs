//! # Generation Gateway
//!
//! Wraps the Gemini `generateContent` REST endpoint.
//!
//! The provider is asked for JSON only. Whatever comes back is cut down to the outermost `{...}`
//! block, parsed, and every field is validated. Anything short of a fully valid recipe (no key,
//! network error, timeout, bad status, empty answer, bad JSON, missing or invalid field) is logged
//! and replaced by the templated fallback recipe, so the caller always gets something to show.
//!
//! There are no retries. The user can simply ask again.
use std::time::Duration;

use bank::foods::Difficulty;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, warn};

use crate::{config::Config, matcher::names_match};

const GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("no API key configured")]
    Disabled,

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider answered {0}")]
    Status(StatusCode),

    #[error("empty answer")]
    EmptyAnswer,

    #[error("no JSON object in answer")]
    NoJson,

    #[error("unparsable answer: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid field {0}")]
    Invalid(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Constraints {
    pub time_minutes: u32,
    pub difficulty: Difficulty,
    pub portions: u32,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            time_minutes: 30,
            difficulty: Difficulty::Medium,
            portions: 4,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct GenerationRequest {
    pub items: Vec<String>,
    pub preference: Option<String>,
    pub constraints: Constraints,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedRecipe {
    pub title: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub time_minutes: u32,
    pub difficulty: &'static str,
    pub portions: u32,

    #[serde(rename = "isAIGenerated")]
    pub is_ai_generated: bool,

    /// Set when the recipe came from the template instead of the provider.
    pub fallback: bool,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl GeminiResponse {
    fn text(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect();

        (!text.trim().is_empty()).then_some(text)
    }
}

#[derive(Deserialize)]
struct RawRecipe {
    title: Option<String>,
    description: Option<String>,
    ingredients: Option<Vec<String>>,
    steps: Option<Vec<String>>,

    #[serde(alias = "timeMinutes")]
    time: Option<Value>,

    difficulty: Option<String>,
    portions: Option<Value>,
}

pub struct Gateway {
    client: Client,
    api_key: Option<String>,
    model: String,
}

impl Gateway {
    pub fn new(config: &Config) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.gemini_timeout_secs))
            .build()?;

        if config.gemini_key.is_some() {
            info!("Gemini API initialized with model {}", config.gemini_model);
        } else {
            info!("GEMINI_API_KEY not found, AI recipes run in demo mode");
        }

        Ok(Self {
            client,
            api_key: config.gemini_key.clone(),
            model: config.gemini_model.clone(),
        })
    }

    /// Never fails, see the module docs.
    pub async fn generate(&self, request: &GenerationRequest) -> GeneratedRecipe {
        match self.try_generate(request).await {
            Ok(recipe) => recipe,
            Err(GenerationError::Disabled) => fallback_recipe(request),
            Err(e) => {
                warn!("Gemini generation failed, using fallback: {e}");
                fallback_recipe(request)
            }
        }
    }

    async fn try_generate(&self, request: &GenerationRequest) -> Result<GeneratedRecipe, GenerationError> {
        let api_key = self.api_key.as_deref().ok_or(GenerationError::Disabled)?;

        let body = json!({
            "contents": [{ "parts": [{ "text": build_prompt(request) }] }],
            "generationConfig": { "responseMimeType": "application/json" },
        });

        let response = self
            .client
            .post(format!("{GEMINI_URL}/{}:generateContent", self.model))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenerationError::Status(response.status()));
        }

        let answer: GeminiResponse = response.json().await?;
        let text = answer.text().ok_or(GenerationError::EmptyAnswer)?;

        #[cfg(feature = "verbose")]
        info!("Gemini answer: {text}");

        parse_recipe(&text, request)
    }
}

pub fn build_prompt(request: &GenerationRequest) -> String {
    let constraints = &request.constraints;
    let mut prompt = format!(
        "Создай рецепт на русском языке используя только эти продукты: {}\n\n\
         Требования:\n\
         - Время приготовления: {} минут\n\
         - Сложность: {}\n\
         - Количество порций: {}\n",
        request.items.join(", "),
        constraints.time_minutes,
        constraints.difficulty.label(),
        constraints.portions,
    );

    if let Some(preference) = request.preference.as_deref().filter(|p| !p.trim().is_empty()) {
        prompt.push_str(&format!("- Пожелания: {}\n", preference.trim()));
    }

    prompt.push_str(
        "- Каждый ингредиент должен содержать название одного из продуктов без изменений\n\
         - Верни только JSON без пояснений:\n\
         {\"title\": \"Название\", \"description\": \"Описание\", \
         \"ingredients\": [\"продукт — количество\"], \"steps\": [\"шаг 1\", \"шаг 2\"], \
         \"time\": 30, \"difficulty\": \"easy|medium|hard\", \"portions\": 4}",
    );

    prompt
}

fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;

    (start < end).then(|| &text[start..=end])
}

/// Accepts `30`, `"30"` and `"30 минут"`.
pub fn leading_number(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => {
            let digits: String = text
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();

            digits.parse().ok()
        }
        _ => None,
    }
}

pub fn parse_recipe(text: &str, request: &GenerationRequest) -> Result<GeneratedRecipe, GenerationError> {
    let raw: RawRecipe = serde_json::from_str(extract_json(text).ok_or(GenerationError::NoJson)?)?;

    let title = raw
        .title
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .ok_or(GenerationError::Invalid("title"))?;

    let items: Vec<String> = request.items.iter().map(|item| item.to_lowercase()).collect();
    let ingredients = raw
        .ingredients
        .filter(|ingredients| !ingredients.is_empty())
        .ok_or(GenerationError::Invalid("ingredients"))?;

    let all_known = ingredients.iter().all(|ingredient| {
        let ingredient = ingredient.trim().to_lowercase();
        !ingredient.is_empty() && items.iter().any(|item| names_match(&ingredient, item))
    });
    if !all_known {
        return Err(GenerationError::Invalid("ingredients"));
    }

    let steps = raw
        .steps
        .filter(|steps| !steps.is_empty() && steps.iter().all(|step| !step.trim().is_empty()))
        .ok_or(GenerationError::Invalid("steps"))?;

    let time_minutes = raw
        .time
        .as_ref()
        .and_then(leading_number)
        .filter(|minutes| *minutes > 0)
        .ok_or(GenerationError::Invalid("time"))?;

    let portions = raw
        .portions
        .as_ref()
        .and_then(leading_number)
        .filter(|portions| *portions > 0)
        .ok_or(GenerationError::Invalid("portions"))?;

    let difficulty = raw
        .difficulty
        .as_deref()
        .and_then(Difficulty::parse)
        .ok_or(GenerationError::Invalid("difficulty"))?;

    Ok(GeneratedRecipe {
        title,
        description: raw.description.unwrap_or_default(),
        ingredients,
        steps,
        time_minutes,
        difficulty: difficulty.label(),
        portions,
        is_ai_generated: true,
        fallback: false,
    })
}

fn ingredient_word(count: usize) -> &'static str {
    if count % 10 == 1 && count % 100 != 11 {
        "ингредиента"
    } else {
        "ингредиентов"
    }
}

/// Wash, chop, cook, season, serve.
pub fn fallback_recipe(request: &GenerationRequest) -> GeneratedRecipe {
    let ingredients: Vec<String> = request
        .items
        .iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();
    let constraints = &request.constraints;

    let wash = if ingredients.is_empty() {
        "Промойте и подготовьте продукты".to_string()
    } else {
        format!("Промойте и подготовьте продукты: {}", ingredients.join(", "))
    };

    GeneratedRecipe {
        title: format!(
            "Блюдо из {} {}",
            ingredients.len(),
            ingredient_word(ingredients.len())
        ),
        description: "Простой рецепт из выбранных продуктов".to_string(),
        steps: vec![
            wash,
            "Нарежьте ингредиенты небольшими кусочками".to_string(),
            format!(
                "Готовьте на среднем огне около {} минут",
                constraints.time_minutes
            ),
            "Приправьте солью и специями по вкусу".to_string(),
            "Подавайте горячим".to_string(),
        ],
        ingredients,
        time_minutes: constraints.time_minutes,
        difficulty: constraints.difficulty.label(),
        portions: constraints.portions,
        is_ai_generated: true,
        fallback: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(items: &[&str]) -> GenerationRequest {
        GenerationRequest {
            items: items.iter().map(|s| s.to_string()).collect(),
            preference: None,
            constraints: Constraints::default(),
        }
    }

    const ANSWER: &str = r#"Конечно! Вот рецепт:
    ```json
    {
        "title": "Картофель с курицей",
        "description": "Сытный ужин",
        "ingredients": ["Картофель — 500 г", "курица — 300 г"],
        "steps": ["Нарежьте картофель", "Запеките с курицей 40 минут"],
        "time": "45 минут",
        "difficulty": "средняя",
        "portions": 4
    }
    ```"#;

    #[test]
    fn test_parse_valid_answer() {
        let recipe = parse_recipe(ANSWER, &request(&["картофель", "курица"])).unwrap();

        assert_eq!(recipe.title, "Картофель с курицей");
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.steps.len(), 2);
        assert_eq!(recipe.time_minutes, 45);
        assert_eq!(recipe.difficulty, "medium");
        assert_eq!(recipe.portions, 4);
        assert!(recipe.is_ai_generated);
        assert!(!recipe.fallback);
    }

    #[test]
    fn test_unknown_ingredient_is_invalid() {
        let result = parse_recipe(ANSWER, &request(&["картофель"]));

        assert!(matches!(result, Err(GenerationError::Invalid("ingredients"))));
    }

    #[test]
    fn test_missing_fields_are_invalid() {
        let text = r#"{"title": "Суп", "ingredients": ["лук"], "time": 20, "difficulty": "easy", "portions": 2}"#;
        assert!(matches!(
            parse_recipe(text, &request(&["лук"])),
            Err(GenerationError::Invalid("steps"))
        ));

        let text = r#"{"title": " ", "ingredients": ["лук"], "steps": ["a"], "time": 20, "difficulty": "easy", "portions": 2}"#;
        assert!(matches!(
            parse_recipe(text, &request(&["лук"])),
            Err(GenerationError::Invalid("title"))
        ));

        let text = r#"{"title": "Суп", "ingredients": ["лук"], "steps": ["a"], "time": "долго", "difficulty": "easy", "portions": 2}"#;
        assert!(matches!(
            parse_recipe(text, &request(&["лук"])),
            Err(GenerationError::Invalid("time"))
        ));
    }

    #[test]
    fn test_garbage_answers() {
        assert!(matches!(
            parse_recipe("Извините, не могу", &request(&["лук"])),
            Err(GenerationError::NoJson)
        ));
        assert!(matches!(
            parse_recipe("{ title: oops }", &request(&["лук"])),
            Err(GenerationError::Json(_))
        ));
    }

    #[test]
    fn test_fallback_uses_only_input_items() {
        let input = request(&["яйца", " сыр ", ""]);
        let recipe = fallback_recipe(&input);

        assert_eq!(recipe.ingredients, vec!["яйца", "сыр"]);
        assert_eq!(recipe.title, "Блюдо из 2 ингредиентов");
        assert_eq!(recipe.steps.len(), 5);
        assert!(recipe.steps.iter().all(|step| !step.is_empty()));
        assert_eq!(recipe.portions, 4);
        assert!(recipe.fallback);
    }

    #[test]
    fn test_fallback_without_items_still_has_steps() {
        let recipe = fallback_recipe(&request(&[]));

        assert!(recipe.ingredients.is_empty());
        assert!(!recipe.steps.is_empty());
        assert_eq!(recipe.title, "Блюдо из 0 ингредиентов");
    }

    #[test]
    fn test_ingredient_word() {
        assert_eq!(ingredient_word(1), "ингредиента");
        assert_eq!(ingredient_word(11), "ингредиентов");
        assert_eq!(ingredient_word(21), "ингредиента");
        assert_eq!(ingredient_word(5), "ингредиентов");
    }

    #[test]
    fn test_prompt_mentions_everything() {
        let mut input = request(&["рис", "курица"]);
        input.preference = Some("без острого".to_string());

        let prompt = build_prompt(&input);
        assert!(prompt.contains("рис, курица"));
        assert!(prompt.contains("без острого"));
        assert!(prompt.contains("30 минут"));
    }

    #[test]
    fn test_gemini_text() {
        let answer: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(answer.text().as_deref(), Some("{\"a\":1}"));

        let answer: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert_eq!(answer.text(), None);
    }

    #[tokio::test]
    async fn test_demo_mode_falls_back() {
        let gateway = Gateway::new(&Config::default()).unwrap();
        let recipe = gateway.generate(&request(&["рис", "курица"])).await;

        assert!(recipe.fallback);
        assert_eq!(recipe.ingredients, vec!["рис", "курица"]);
    }
}
