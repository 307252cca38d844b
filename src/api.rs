//! LLM-backed summaries.
//!
//! [`LlmSummarizer`] adapts anything implementing [`AskAsync`] to the
//! [`ExternalSummarizer`] capability. Calls are single-attempt: a failed or
//! empty answer is reported as "no summary" and the summarizer truncates
//! instead, so there is nothing to gain from retrying here.
//!
//! The concrete client wraps `awful_aj` and only exists with the `llm`
//! feature. Without it [`load_llm_summarizer`] returns `None` and the rest of
//! the application calls it unconditionally.

use async_trait::async_trait;
use std::error::Error;
use std::time::Instant;
use tracing::{instrument, warn};

use crate::models::Language;
use crate::summarizer::ExternalSummarizer;

/// Send text to a language model and receive its answer.
pub trait AskAsync {
    async fn ask(&self, text: &str) -> Result<String, Box<dyn Error>>;
}

/// Asks a model for a short summary in the article's language.
pub struct LlmSummarizer<T> {
    inner: T,
}

impl<T: AskAsync> LlmSummarizer<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

/// Prefix the article with the language the summary must be written in.
fn prompt(content: &str, language: Language) -> String {
    let instruction = match language {
        Language::ZhTw => "請用繁體中文摘要以下新聞內容：",
        Language::EnUs => "Summarize the following news article in English:",
    };
    format!("{instruction}\n\n{content}")
}

#[async_trait(?Send)]
impl<T: AskAsync> ExternalSummarizer for LlmSummarizer<T> {
    #[instrument(level = "info", skip_all, fields(%language))]
    async fn summarize(&self, content: &str, language: Language) -> Option<String> {
        let t0 = Instant::now();
        match self.inner.ask(&prompt(content, language)).await {
            Ok(answer) => {
                let answer = answer.trim();
                (!answer.is_empty()).then(|| answer.to_string())
            }
            Err(e) => {
                warn!(
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    error = %e,
                    "LLM summary failed"
                );
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

#[cfg(feature = "llm")]
mod backend {
    use super::*;
    use awful_aj::api::ask;
    use awful_aj::{config, config::AwfulJadeConfig, config_dir, template, template::ChatTemplate};
    use tracing::info;

    /// Wrapper around `awful_aj::api::ask` that implements [`AskAsync`].
    pub struct AskFnWrapper {
        pub config: AwfulJadeConfig,
        pub template: ChatTemplate,
    }

    impl AskAsync for AskFnWrapper {
        async fn ask(&self, text: &str) -> Result<String, Box<dyn Error>> {
            ask(&self.config, text.to_string(), &self.template, None, None).await
        }
    }

    /// Load the `awful_aj` configuration and the named chat template.
    pub async fn load(template_name: &str) -> Result<LlmSummarizer<AskFnWrapper>, Box<dyn Error>> {
        let template = template::load_template(template_name).await?;
        let conf_file = config_dir()?.join("config.yaml");
        let config_path = conf_file
            .to_str()
            .ok_or("awful_aj config path is not valid UTF-8")?;
        let config = config::load_config(config_path)?;
        info!(template_name, config_path, "Loaded LLM configuration");
        Ok(LlmSummarizer::new(AskFnWrapper { config, template }))
    }
}

/// Build the LLM summarizer, or `None` when it is unavailable.
#[cfg(feature = "llm")]
pub async fn load_llm_summarizer(template_name: &str) -> Option<Box<dyn ExternalSummarizer>> {
    match backend::load(template_name).await {
        Ok(summarizer) => Some(Box::new(summarizer)),
        Err(e) => {
            warn!(error = %e, "LLM summarizer unavailable");
            None
        }
    }
}

/// Build the LLM summarizer, or `None` when it is unavailable.
#[cfg(not(feature = "llm"))]
pub async fn load_llm_summarizer(_template_name: &str) -> Option<Box<dyn ExternalSummarizer>> {
    warn!("Built without the `llm` feature; external summaries are unavailable");
    None
}
