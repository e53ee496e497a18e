// src/enrich.rs

use crate::assemble::{Assembler, DetectedOrder, OrderOutput};
use crate::config::{LlmBackend, LlmSection};
use crate::detect::{CoreType, CoverMaterial, CoverType, DetectedAttributes, Firmness};
use crate::normalize::normalize;
use crate::order::Article;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// The prompt template that instructs the model to classify one order line.
const SYSTEM_PROMPT: &str = r#"You classify mattress order lines written in French.
Given one order line, return ONLY valid JSON matching this schema exactly:
{
  "core_type": one of "NATURAL_LATEX", "MIXED_LATEX_7ZONE", "GROOVED_FOAM_7ZONE",
               "REINFORCED_LATEX", "SELECT_43", "VISCO_FOAM", "UNKNOWN",
  "firmness": one of "FIRM", "MEDIUM", "COMFORT", "UNKNOWN",
  "cover_type": one of "QUILTED", "SIMPLE", "UNKNOWN",
  "cover_material": "string or null (e.g. TENCEL LUXE 3D, POLYESTER)"
}

Notes:
- "ferme" is FIRM, "confort" is COMFORT, "housse matelassée" is QUILTED.
- Use UNKNOWN or null when the line does not say.
- Return ONLY the JSON object, no markdown fences, no commentary."#;

/// Longest description sent to the model.
const MAX_CHARS: usize = 2_000;

#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("empty response from LLM")]
    EmptyResponse,

    #[error("no JSON object in LLM response")]
    NoJson,

    #[error("failed to parse LLM response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM_API_KEY env var required for remote backend")]
    MissingApiKey,

    #[error("heuristics backend selected, no model configured")]
    Disabled,

    #[error("Ollama is not running at {0}. Start it with: ollama serve")]
    Unreachable(String),
}

/// The model's guess for one article. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AttributeGuess {
    #[serde(default)]
    pub core_type: Option<CoreType>,
    #[serde(default)]
    pub firmness: Option<Firmness>,
    #[serde(default)]
    pub cover_type: Option<CoverType>,
    #[serde(default)]
    pub cover_material: Option<String>,
}

/// External oracle consulted for attributes pattern matching left UNKNOWN.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn guess(&self, description: &str) -> Result<AttributeGuess, EnrichError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Resolved endpoint configuration ready to make API calls.
#[derive(Debug, Clone)]
struct ResolvedEndpoint {
    base_url: String,
    model: String,
    api_key: String,
}

fn resolve_endpoint(llm: &LlmSection) -> Result<ResolvedEndpoint, EnrichError> {
    match llm.backend {
        LlmBackend::Ollama => Ok(ResolvedEndpoint {
            base_url: llm.ollama.base_url.clone(),
            model: llm.ollama.model.clone(),
            api_key: "ollama".to_string(), // required by API but ignored
        }),
        LlmBackend::Remote => {
            let api_key = std::env::var("LLM_API_KEY").map_err(|_| EnrichError::MissingApiKey)?;
            Ok(ResolvedEndpoint {
                base_url: llm.remote.base_url.clone(),
                model: llm.remote.model.clone(),
                api_key,
            })
        }
        LlmBackend::Heuristics => Err(EnrichError::Disabled),
    }
}

/// Check if the Ollama server is reachable.
async fn check_ollama_health(client: &Client, base_url: &str) -> bool {
    // Ollama's health endpoint is at the root (not under /v1)
    let health_url = base_url.trim_end_matches('/').trim_end_matches("/v1");

    match client
        .get(health_url)
        .timeout(Duration::from_secs(3))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => true,
        Ok(resp) => {
            warn!(status = %resp.status(), "Ollama server returned non-OK status");
            false
        }
        Err(e) => {
            warn!(error = %e, "Ollama server not reachable");
            false
        }
    }
}

/// Chat-completions client for Ollama or a remote OpenAI-compatible API.
pub struct LlmEnricher {
    client: Client,
    endpoint: ResolvedEndpoint,
}

impl LlmEnricher {
    pub async fn connect(llm: &LlmSection) -> Result<Self, EnrichError> {
        let endpoint = resolve_endpoint(llm)?;
        let client = Client::new();

        if llm.backend == LlmBackend::Ollama
            && !check_ollama_health(&client, &endpoint.base_url).await
        {
            return Err(EnrichError::Unreachable(endpoint.base_url));
        }

        info!(
            backend = ?llm.backend,
            url = %endpoint.base_url,
            model = %endpoint.model,
            "LLM enrichment enabled"
        );
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Enricher for LlmEnricher {
    async fn guess(&self, description: &str) -> Result<AttributeGuess, EnrichError> {
        let text: String = description.chars().take(MAX_CHARS).collect();

        let request = ChatRequest {
            model: self.endpoint.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!("Order line:\n\n{text}"),
                },
            ],
            temperature: 0.0,
        };

        let url = format!("{}/chat/completions", self.endpoint.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.endpoint.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichError::Api { status, body });
        }

        let chat_response: ChatResponse = response.json().await?;
        let content = chat_response
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or(EnrichError::EmptyResponse)?;

        parse_guess(content)
    }
}

/// Parse the model's reply, tolerating fences and reasoning text around the JSON.
pub fn parse_guess(content: &str) -> Result<AttributeGuess, EnrichError> {
    let json_str = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let json_str = extract_json_object(json_str)?;
    Ok(serde_json::from_str(json_str)?)
}

/// Extract the outermost JSON object from a string that may contain
/// surrounding text (e.g. thinking tokens from qwen3).
fn extract_json_object(s: &str) -> Result<&str, EnrichError> {
    let start = s.find('{').ok_or(EnrichError::NoJson)?;
    let end = s.rfind('}').ok_or(EnrichError::NoJson)?;
    if end <= start {
        return Err(EnrichError::NoJson);
    }
    Ok(&s[start..=end])
}

/// Fill UNKNOWN slots from the guess. Pattern results are never overridden.
/// Returns the names of the filled attributes.
pub fn apply_guess(attrs: &mut DetectedAttributes, guess: AttributeGuess) -> Vec<String> {
    let mut filled = Vec::new();

    if let Some(core) = guess.core_type.filter(|c| c.is_known()) {
        if !attrs.core_type.is_known() {
            attrs.core_type = core;
            filled.push("core_type".to_string());
        }
    }
    if let Some(firmness) = guess.firmness.filter(|f| f.is_known()) {
        if !attrs.firmness.is_known() {
            attrs.firmness = firmness;
            filled.push("firmness".to_string());
        }
    }
    if let Some(cover) = guess.cover_type.filter(|c| c.is_known()) {
        if !attrs.cover_type.is_known() {
            attrs.cover_type = cover;
            filled.push("cover_type".to_string());
        }
    }
    if let Some(material) = guess.cover_material.map(|m| normalize(m.trim())) {
        if !material.is_empty() && !attrs.cover_material.is_known() {
            attrs.cover_material = CoverMaterial::Named(material);
            filled.push("cover_material".to_string());
        }
    }

    filled
}

/// Ask the enricher about every article that still has UNKNOWN attributes.
/// Failures and timeouts keep the pattern-only result.
pub async fn enrich_order(
    detected: &mut DetectedOrder<'_>,
    enricher: &dyn Enricher,
    timeout: Duration,
) {
    for item in detected.articles.iter_mut() {
        if !item.attributes.has_unknowns() {
            continue;
        }
        let position = item.position;
        match tokio::time::timeout(timeout, enricher.guess(&item.article.description)).await {
            Ok(Ok(guess)) => {
                let filled = apply_guess(&mut item.attributes, guess);
                info!(position, filled = ?filled, "LLM enrichment result");
                item.enriched = filled;
            }
            Ok(Err(e)) => {
                warn!(position, error = %e, "LLM enrichment failed, keeping pattern results");
            }
            Err(_) => {
                warn!(
                    position,
                    timeout_ms = timeout.as_millis() as u64,
                    "LLM enrichment timed out, keeping pattern results"
                );
            }
        }
    }
}

/// Pattern detection, then enrichment of UNKNOWN slots, then derivation.
pub async fn assemble_enriched(
    assembler: &Assembler<'_>,
    articles: &[Article],
    enricher: &dyn Enricher,
    timeout: Duration,
) -> OrderOutput {
    let mut detected = assembler.detect(articles);
    enrich_order(&mut detected, enricher, timeout).await;
    assembler.finish(detected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceTables;

    struct FixedGuess(AttributeGuess);

    #[async_trait]
    impl Enricher for FixedGuess {
        async fn guess(&self, _description: &str) -> Result<AttributeGuess, EnrichError> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl Enricher for Failing {
        async fn guess(&self, _description: &str) -> Result<AttributeGuess, EnrichError> {
            Err(EnrichError::EmptyResponse)
        }
    }

    struct Slow;

    #[async_trait]
    impl Enricher for Slow {
        async fn guess(&self, _description: &str) -> Result<AttributeGuess, EnrichError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(AttributeGuess {
                core_type: Some(CoreType::ViscoFoam),
                ..Default::default()
            })
        }
    }

    fn empty_tables() -> (tempfile::TempDir, ReferenceTables) {
        let dir = tempfile::tempdir().unwrap();
        let tables = ReferenceTables::load(dir.path());
        (dir, tables)
    }

    #[test]
    fn test_parse_guess_with_fences_and_thinking() {
        let reply = "<think>hmm</think>\n```json\n{\"core_type\": \"SELECT_43\", \"firmness\": \"MEDIUM\", \"cover_type\": \"UNKNOWN\", \"cover_material\": null}\n```";
        let guess = parse_guess(reply).unwrap();
        assert_eq!(guess.core_type, Some(CoreType::Select43));
        assert_eq!(guess.firmness, Some(Firmness::Medium));
        assert_eq!(guess.cover_type, Some(CoverType::Unknown));
        assert_eq!(guess.cover_material, None);
    }

    #[test]
    fn test_parse_guess_rejects_non_json() {
        assert!(matches!(parse_guess("no idea"), Err(EnrichError::NoJson)));
        assert!(matches!(parse_guess("{not json}"), Err(EnrichError::Parse(_))));
    }

    #[test]
    fn test_apply_guess_only_fills_unknowns() {
        let mut attrs = DetectedAttributes::detect("MATELAS LATEX NATUREL");
        let filled = apply_guess(
            &mut attrs,
            AttributeGuess {
                core_type: Some(CoreType::ViscoFoam),
                firmness: Some(Firmness::Comfort),
                cover_type: Some(CoverType::Unknown),
                cover_material: Some("polyester".into()),
            },
        );
        assert_eq!(attrs.core_type, CoreType::NaturalLatex);
        assert_eq!(attrs.firmness, Firmness::Comfort);
        assert_eq!(attrs.cover_type, CoverType::Unknown);
        assert_eq!(attrs.cover_material, CoverMaterial::Named("POLYESTER".into()));
        assert_eq!(filled, vec!["firmness", "cover_material"]);
    }

    #[test]
    fn test_heuristics_backend_is_disabled() {
        let llm = LlmSection::default();
        assert!(matches!(resolve_endpoint(&llm), Err(EnrichError::Disabled)));
    }

    #[tokio::test]
    async fn test_enrichment_fills_record() {
        let (_dir, tables) = empty_tables();
        let assembler = Assembler::new(&tables, &[]);
        let enricher = FixedGuess(AttributeGuess {
            core_type: Some(CoreType::Select43),
            firmness: Some(Firmness::Firm),
            ..Default::default()
        });
        let articles = [
            Article::new("MATELAS MAISON 140x190", 1),
            Article::new("PROTEGE MATELAS", 1),
        ];
        let out = assemble_enriched(&assembler, &articles, &enricher, Duration::from_secs(1)).await;
        assert_eq!(out.records.len(), 1);
        let r = &out.records[0];
        assert_eq!(r.core_type, CoreType::Select43);
        assert_eq!(r.firmness, Firmness::Firm);
        assert_eq!(r.enriched, vec!["core_type", "firmness"]);
        assert!(r.cut.unwrap().corrected);
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_patterns() {
        let (_dir, tables) = empty_tables();
        let assembler = Assembler::new(&tables, &[]);
        let articles = [Article::new("MATELAS MAISON FERME", 1)];
        let out = assemble_enriched(&assembler, &articles, &Failing, Duration::from_secs(1)).await;
        assert_eq!(out, assembler.assemble(&articles));
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_patterns() {
        let (_dir, tables) = empty_tables();
        let assembler = Assembler::new(&tables, &[]);
        let articles = [Article::new("MATELAS MAISON", 1)];
        let out = assemble_enriched(&assembler, &articles, &Slow, Duration::from_millis(100)).await;
        assert_eq!(out.records[0].core_type, CoreType::Unknown);
        assert!(out.records[0].enriched.is_empty());
    }
}
