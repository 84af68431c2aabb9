use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{Inputs, Projection, format_compact, format_currency};

pub const FALLBACK_ADVICE: &str = "A personalised summary is unavailable right now. \
Review the gap between your projected savings and the required corpus, increase \
contributions while you are still earning, and revisit the plan at least once a year.";

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub enum AdviceError {
    MissingKey,
    Network(String),
    Api { status: u16, message: String },
    InvalidResponse(String),
}

impl std::fmt::Display for AdviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdviceError::MissingKey => write!(f, "API key not configured"),
            AdviceError::Network(msg) => write!(f, "Network error: {msg}"),
            AdviceError::Api { status, message } => write!(f, "API error ({status}): {message}"),
            AdviceError::InvalidResponse(msg) => write!(f, "Invalid response: {msg}"),
        }
    }
}

impl std::error::Error for AdviceError {}

pub trait AdviceProvider {
    fn summarize(&self, prompt: &str) -> impl Future<Output = Result<String, AdviceError>> + Send;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdviceSource {
    Model,
    Fallback,
}

pub async fn advice_or_fallback<P: AdviceProvider>(
    provider: &P,
    prompt: &str,
) -> (String, AdviceSource) {
    match provider.summarize(prompt).await {
        Ok(text) => (text, AdviceSource::Model),
        Err(e) => {
            eprintln!("Advice request failed: {e}");
            (FALLBACK_ADVICE.to_string(), AdviceSource::Fallback)
        }
    }
}

pub fn build_advice_prompt(inputs: &Inputs, projection: &Projection) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a retirement-planning assistant. Write a short, practical summary of \
this plan in plain text (no markdown, at most 120 words). Be encouraging but honest \
about any shortfall.\n\nPLAN:\n",
    );
    prompt.push_str(&format!(
        "Current age {}, retiring at {}, planning to {}.\n",
        inputs.current_age, inputs.retirement_age, inputs.life_expectancy
    ));
    prompt.push_str(&format!(
        "Monthly expenses today: {} (lifestyle factor {:.2}).\n",
        format_currency(inputs.current_monthly_expenses),
        inputs.lifestyle_factor
    ));
    prompt.push_str(&format!(
        "Monthly expenses at retirement: {}.\n",
        format_currency(projection.monthly_expense_at_retirement)
    ));
    prompt.push_str(&format!(
        "Required corpus: {}. Projected savings at retirement: {}.\n",
        format_compact(projection.required_corpus),
        format_compact(projection.projected_existing_savings)
    ));
    if projection.gap > 0.0 {
        prompt.push_str(&format!("Shortfall: {}.\n", format_compact(projection.gap)));
    } else {
        let surplus = projection.projected_existing_savings - projection.required_corpus;
        prompt.push_str(&format!("Surplus: {}.\n", format_compact(surplus)));
    }

    let goals = inputs.specific_goals.trim();
    if !goals.is_empty() {
        prompt.push_str("\nGOALS:\n");
        prompt.push_str(goals);
        prompt.push('\n');
    }

    prompt
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: Option<String>,
    model: String,
}

impl GeminiClient {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
            model: std::env::var("GEMINI_MODEL")
                .ok()
                .filter(|model| !model.is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<Part>>,
}

impl AdviceProvider for GeminiClient {
    async fn summarize(&self, prompt: &str) -> Result<String, AdviceError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(AdviceError::MissingKey);
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AdviceError::Network(e.to_string()))?;

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.4,
                max_output_tokens: 512,
            },
        };

        let url = format!("{GEMINI_ENDPOINT}/{}:generateContent", self.model);
        let response = client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| AdviceError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AdviceError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(AdviceError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        parse_generate_response(&body)
    }
}

fn parse_generate_response(body: &str) -> Result<String, AdviceError> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|e| AdviceError::InvalidResponse(e.to_string()))?;

    let text = response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts.unwrap_or_default())
        .map(|part| part.text)
        .collect::<Vec<_>>()
        .join("");

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(AdviceError::InvalidResponse(
            "no text in candidates".to_string(),
        ));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::project;

    fn sample_inputs() -> Inputs {
        Inputs {
            current_age: 45,
            retirement_age: 55,
            life_expectancy: 85,
            current_monthly_expenses: 100_000.0,
            lifestyle_factor: 1.0,
            existing_savings: 5_000_000.0,
            assumed_inflation: 6.0,
            post_retirement_roi: 0.08,
            specific_goals: "Travel every year and fund two weddings".to_string(),
        }
    }

    struct StubProvider {
        response: Result<String, AdviceError>,
    }

    impl AdviceProvider for StubProvider {
        fn summarize(
            &self,
            _prompt: &str,
        ) -> impl Future<Output = Result<String, AdviceError>> + Send {
            let response = self.response.clone();
            async move { response }
        }
    }

    #[test]
    fn parse_extracts_and_joins_candidate_parts() {
        let body = r#"{
          "candidates": [
            {"content": {"parts": [{"text": "Stay "}, {"text": "the course."}]}}
          ]
        }"#;
        assert_eq!(parse_generate_response(body).unwrap(), "Stay the course.");
    }

    #[test]
    fn parse_rejects_empty_candidates() {
        let body = r#"{"candidates": []}"#;
        assert!(matches!(
            parse_generate_response(body),
            Err(AdviceError::InvalidResponse(_))
        ));
    }

    #[test]
    fn parse_rejects_non_json_body() {
        assert!(matches!(
            parse_generate_response("service unavailable"),
            Err(AdviceError::InvalidResponse(_))
        ));
    }

    #[test]
    fn prompt_includes_metrics_and_goals() {
        let inputs = sample_inputs();
        let projection = project(&inputs);
        let prompt = build_advice_prompt(&inputs, &projection);

        assert!(prompt.contains("Current age 45, retiring at 55, planning to 85."));
        assert!(prompt.contains(&format_compact(projection.required_corpus)));
        assert!(prompt.contains("Shortfall:"));
        assert!(prompt.contains("Travel every year and fund two weddings"));
    }

    #[test]
    fn prompt_omits_goals_section_when_empty() {
        let mut inputs = sample_inputs();
        inputs.specific_goals = "   ".to_string();
        let projection = project(&inputs);
        let prompt = build_advice_prompt(&inputs, &projection);
        assert!(!prompt.contains("GOALS:"));
    }

    #[test]
    fn prompt_reports_surplus_when_savings_cover_corpus() {
        let mut inputs = sample_inputs();
        inputs.existing_savings = 100_000_000.0;
        let projection = project(&inputs);
        let prompt = build_advice_prompt(&inputs, &projection);
        assert!(prompt.contains("Surplus:"));
        assert!(!prompt.contains("Shortfall:"));
    }

    #[tokio::test]
    async fn advice_falls_back_when_provider_fails() {
        let provider = StubProvider {
            response: Err(AdviceError::Network("connection refused".to_string())),
        };
        let (text, source) = advice_or_fallback(&provider, "prompt").await;
        assert_eq!(text, FALLBACK_ADVICE);
        assert_eq!(source, AdviceSource::Fallback);
    }

    #[tokio::test]
    async fn advice_passes_through_model_text() {
        let provider = StubProvider {
            response: Ok("You are on track.".to_string()),
        };
        let (text, source) = advice_or_fallback(&provider, "prompt").await;
        assert_eq!(text, "You are on track.");
        assert_eq!(source, AdviceSource::Model);
    }

    #[tokio::test]
    async fn gemini_client_without_key_reports_missing_key() {
        let client = GeminiClient {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
        };
        assert!(matches!(
            client.summarize("prompt").await,
            Err(AdviceError::MissingKey)
        ));
    }
}
