//! Answer generation capability.
//!
//! The retrieval core hands a question and its reranked passages to an
//! [`AnswerProvider`]; everything model-side is opaque. An empty passage
//! set never reaches the model — it short-circuits to a fixed
//! no-knowledge reply, which keeps "the corpus has nothing relevant"
//! distinct from a model-side "I don't know".

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::AnswerConfig;
use crate::retrieve::Passage;

/// Reply used when retrieval produced no context at all.
pub const NO_KNOWLEDGE_REPLY: &str =
    "No knowledge available: the corpus has no indexed content relevant to this question. \
     Run `lore ingest` and `lore index`, then try again.";

/// Opaque `generate(question, contextPassages) -> answerText` capability.
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    async fn generate(&self, question: &str, passages: &[Passage]) -> Result<String>;
}

/// Generate an answer, or the fixed no-knowledge reply for empty context.
pub async fn answer_question(
    provider: &dyn AnswerProvider,
    question: &str,
    passages: &[Passage],
) -> Result<String> {
    if passages.is_empty() {
        return Ok(NO_KNOWLEDGE_REPLY.to_string());
    }
    provider.generate(question, passages).await
}

/// Render passages into the context block the model sees, newest first,
/// each attributed to its origin.
pub fn format_context(passages: &[Passage]) -> String {
    passages
        .iter()
        .map(|p| {
            format!(
                "[{} | {}]\n{}",
                p.source_date.format("%Y-%m-%d"),
                p.source_url,
                p.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

const SYSTEM_PROMPT: &str = "You are a strategic advisor answering from a curated knowledge base \
about a game under active development. Base answers strictly on the provided context passages. \
Prioritize the most recent passages when they conflict — newer patches supersede older \
documentation. If the context does not contain the answer, say that the knowledge base lacks \
information on the topic rather than guessing.";

/// Answer provider backed by the OpenAI chat completions endpoint.
///
/// Requires `OPENAI_API_KEY` in the environment.
pub struct OpenAiAnswerer {
    model: String,
    timeout: Duration,
}

impl OpenAiAnswerer {
    pub fn new(config: &AnswerConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("answer.model required for OpenAI provider"))?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        Ok(Self {
            model,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

#[async_trait]
impl AnswerProvider for OpenAiAnswerer {
    async fn generate(&self, question: &str, passages: &[Passage]) -> Result<String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        let user_message = format!(
            "Context passages:\n\n{}\n\nQuestion: {}",
            format_context(passages),
            question
        );

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_message},
            ],
        });

        let response = client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing message content"))
    }
}

/// Instantiate the answer provider named by the configuration.
pub fn create_answer_provider(config: &AnswerConfig) -> Result<Box<dyn AnswerProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiAnswerer::new(config)?)),
        "disabled" => bail!("Answer provider is disabled. Set [answer] provider in config."),
        other => bail!("Unknown answer provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    struct EchoProvider;

    #[async_trait]
    impl AnswerProvider for EchoProvider {
        async fn generate(&self, question: &str, passages: &[Passage]) -> Result<String> {
            Ok(format!("{} ({} passages)", question, passages.len()))
        }
    }

    fn passage(key: &str, date: &str) -> Passage {
        Passage {
            record_key: key.to_string(),
            source_url: format!("https://x/{}", key),
            source_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            text: format!("body of {}", key),
            similarity: 0.5,
        }
    }

    #[tokio::test]
    async fn empty_context_short_circuits_to_fixed_reply() {
        let reply = answer_question(&EchoProvider, "anything?", &[])
            .await
            .unwrap();
        assert_eq!(reply, NO_KNOWLEDGE_REPLY);
    }

    #[tokio::test]
    async fn nonempty_context_reaches_the_provider() {
        let passages = vec![passage("a", "2025-01-01")];
        let reply = answer_question(&EchoProvider, "how?", &passages)
            .await
            .unwrap();
        assert_eq!(reply, "how? (1 passages)");
    }

    #[test]
    fn context_block_carries_attribution() {
        let passages = vec![passage("a", "2025-06-01"), passage("b", "2025-01-01")];
        let block = format_context(&passages);
        assert!(block.contains("[2025-06-01 | https://x/a]"));
        assert!(block.contains("body of b"));
        assert!(block.contains("---"));
    }
}
