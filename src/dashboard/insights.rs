// The call to the language model that comments on the uploaded data.

use crate::dashboard::*;

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum InsightError {
    #[snafu(display("Request failed: {source}"))]
    Http { source: reqwest::Error },
    #[snafu(display("API error ({status}): {body}"))]
    Status { status: u16, body: String },
    #[snafu(display("Invalid response format"))]
    InvalidResponse {},
    #[snafu(display("The model returned an empty answer"))]
    EmptyResponse {},
}

/// Something that turns the raw CSV text into prose about it.
pub trait InsightClient: Send + Sync {
    fn generate(&self, csv_text: &str) -> Result<String, InsightError>;
}

/// The instructions sent along with the data.
pub fn build_prompt(csv_text: &str) -> String {
    format!(
        "You are an expert political analyst.\n\
         You will analyze voter turnout data to identify precincts with unexpectedly high or low turnout.\n\
         Provide insights and potential reasons for these anomalies.\n\
         Data: {}",
        csv_text
    )
}

/// Rejects answers with nothing in them.
pub fn check_answer(text: String) -> Result<String, InsightError> {
    if text.trim().is_empty() {
        EmptyResponseSnafu {}.fail()
    } else {
        Ok(text)
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Client for the Gemini `generateContent` API.
pub struct GeminiClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(endpoint: &str, model: &str, api_key: &str, timeout: Duration) -> DashboardResult<GeminiClient> {
        let client = match reqwest::blocking::Client::builder().timeout(timeout).build() {
            Ok(c) => c,
            Err(e) => whatever!("Could not build the HTTP client: {}", e),
        };
        Ok(GeminiClient {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.trim().to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Builds the client, reading the API key from the environment.
    pub fn from_settings(settings: &InsightSettings) -> DashboardResult<GeminiClient> {
        let env = settings.api_key_env();
        let api_key = match std::env::var(&env) {
            Ok(k) if !k.trim().is_empty() => k,
            _ => return MissingApiKeySnafu { env }.fail(),
        };
        GeminiClient::new(
            &settings.endpoint(),
            &settings.model(),
            &api_key,
            Duration::from_secs(settings.timeout_secs()),
        )
    }

    // The API key is sent as a header, never in the URL.
    fn url(&self) -> String {
        format!("{}/{}:generateContent", self.endpoint, self.model)
    }
}

impl InsightClient for GeminiClient {
    fn generate(&self, csv_text: &str) -> Result<String, InsightError> {
        info!(
            "GeminiClient::generate: sending {} bytes of data to model {}",
            csv_text.len(),
            self.model
        );
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: build_prompt(csv_text),
                }],
            }],
        };

        let response = self
            .client
            .post(self.url())
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&body)
            .send()
            .map_err(|e| e.without_url())
            .context(HttpSnafu {})?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return StatusSnafu {
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        let parsed: GeminiResponse = response
            .json()
            .map_err(|e| e.without_url())
            .context(HttpSnafu {})?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .context(InvalidResponseSnafu {})?;
        debug!("GeminiClient::generate: received {} bytes", text.len());
        check_answer(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_contains_data() {
        let p = build_prompt("precinct_id,votes_cast\nP1,3");
        assert!(p.starts_with("You are an expert political analyst."));
        assert!(p.ends_with("Data: precinct_id,votes_cast\nP1,3"));
    }

    #[test]
    fn empty_answers_are_errors() {
        assert!(matches!(
            check_answer("  \n".to_string()),
            Err(InsightError::EmptyResponse {})
        ));
        assert_eq!(check_answer("ok".to_string()).unwrap(), "ok");
    }

    #[test]
    fn response_shape() {
        let r: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Turnout is high in P3."}],"role":"model"}}]}"#,
        )
        .unwrap();
        assert_eq!(r.candidates[0].content.parts[0].text, "Turnout is high in P3.");
    }

    #[test]
    fn missing_key() {
        let settings = InsightSettings {
            api_key_env: Some("TURNOUT_VISION_TEST_UNSET_KEY".to_string()),
            ..InsightSettings::default()
        };
        assert!(matches!(
            GeminiClient::from_settings(&settings),
            Err(DashboardError::MissingApiKey { .. })
        ));
    }

    #[test]
    fn url_layout() {
        let c = GeminiClient::new("https://example.test/models/", " m1 ", "k", Duration::from_secs(1)).unwrap();
        assert_eq!(c.url(), "https://example.test/models/m1:generateContent");
    }

    #[test]
    fn key_stays_out_of_errors() {
        // Nothing listens on the discard port.
        let c = GeminiClient::new(
            "http://127.0.0.1:9/models",
            "m",
            "SUPERSECRETKEY",
            Duration::from_secs(2),
        )
        .unwrap();
        let err = c.generate("precinct_id\nP1").unwrap_err();
        assert!(matches!(err, InsightError::Http { .. }));
        let text = format!("{} {:?}", err, err);
        assert!(!text.contains("SUPERSECRETKEY"), "{}", text);
    }
}
