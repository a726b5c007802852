//! Clause analysis through the Gemini `generateContent` REST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::analysis::finding::Finding;
use crate::analysis::response::parse_findings;
use crate::analysis::Analyzer;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::sanitize::sanitize_for_prompt;

/// Maximum length for error bodies kept in errors and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

fn sanitize_error_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY_LENGTH {
        let cut: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated)", cut)
    } else {
        body.to_string()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let text: String = candidate
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        Some(text)
    }
}

fn analysis_prompt(document_text: &str, document_type: &str) -> String {
    format!(
        r#"You are an expert legal analyst specializing in contract review and risk assessment.
Analyze the following {document_type} and provide detailed analysis for each important clause.

DOCUMENT TEXT:
```
{text}
```

ANALYSIS REQUIREMENTS:
1. Identify ALL important clauses in the document
2. For each clause, provide risk assessment (High/Medium/Low)
3. Explain the legal implications and original law basis
4. Provide detailed summary with potential impact

OUTPUT FORMAT (JSON):
Return a JSON array where each object represents a clause analysis:

[
  {{
    "clause": "Full text of the identified clause",
    "risk": "High|Medium|Low",
    "laws": "Relevant legal principles, statutes, or common law that applies to this clause",
    "summary": "What this clause means in plain language, its risks or benefits, impact on the parties and recommendations"
  }}
]

FOCUS AREAS:
- Payment terms and penalties
- Liability and indemnification clauses
- Termination conditions
- Intellectual property rights
- Confidentiality agreements
- Force majeure provisions
- Dispute resolution mechanisms
- Warranties and representations
- Limitation of liability
- Governing law and jurisdiction

RISK ASSESSMENT CRITERIA:
- High Risk: Could result in significant financial loss, legal liability, or operational disruption
- Medium Risk: Moderate impact on business operations or legal exposure
- Low Risk: Minor implications with limited impact

IMPORTANT: Return ONLY the JSON array, no additional text or formatting.
"#,
        document_type = document_type,
        text = sanitize_for_prompt(document_text),
    )
}

/// [`Analyzer`] backed by Google's Gemini models.
pub struct GeminiAnalyzer {
    client: Client,
    api_key: SecretString,
    endpoint: String,
    generation: GenerationConfig,
    max_findings: usize,
}

impl GeminiAnalyzer {
    pub fn new(config: &AnalysisConfig, api_key: SecretString) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AnalysisError::ClientBuild(e.to_string()))?;

        let endpoint = format!(
            "{}/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );

        Ok(Self {
            client,
            api_key,
            endpoint,
            generation: GenerationConfig {
                temperature: config.temperature,
                top_p: config.top_p,
                top_k: config.top_k,
                max_output_tokens: config.max_output_tokens,
            },
            max_findings: config.max_findings,
        })
    }

    /// Builds an analyzer when an API key is configured.
    pub fn from_config(config: &AnalysisConfig) -> Result<Option<Self>, AnalysisError> {
        match &config.api_key {
            Some(key) if !key.expose_secret().trim().is_empty() => {
                Self::new(config, key.clone()).map(Some)
            }
            _ => Ok(None),
        }
    }

    async fn generate(&self, prompt: String) -> Result<String, AnalysisError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: self.generation,
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold: "BLOCK_MEDIUM_AND_ABOVE",
                })
                .collect(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body: sanitize_error_body(&body),
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ResponseParse(e.to_string()))?;

        if let Some(reason) = body
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            warn!("Analysis prompt was blocked: {}", reason);
        }
        if let Some(reason) = body
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
        {
            debug!("Analysis finished with reason {}", reason);
        }

        body.text()
            .filter(|t| !t.trim().is_empty())
            .ok_or(AnalysisError::EmptyResponse)
    }
}

#[async_trait]
impl Analyzer for GeminiAnalyzer {
    async fn analyze(&self, text: &str, label: &str) -> Result<Vec<Finding>, AnalysisError> {
        let prompt = analysis_prompt(text, label);
        debug!("Sending {} chars of {} for analysis", text.len(), label);

        let answer = self.generate(prompt).await?;
        let findings = parse_findings(&answer, self.max_findings, Utc::now())?;
        debug!("Analysis returned {} findings", findings.len());
        Ok(findings)
    }
}
