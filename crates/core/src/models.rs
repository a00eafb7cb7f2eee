//! # Model Selection
//!
//! The model a client selects in `start_conversation{selectedModel}`.
//! The core never talks to a provider itself; it only carries the selection
//! through to specialists so they can pick the right LLM backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported LLM providers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Anthropic,
    #[serde(rename = "openai")]
    OpenAI,
    Gemini,
    OpenRouter,
    Grok,
    DeepSeek,
}

impl LlmProvider {
    /// Model used when a client names the provider but no model
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "claude-sonnet-4-20250514",
            LlmProvider::OpenAI => "gpt-4o",
            LlmProvider::Gemini => "gemini-2.0-flash-exp",
            LlmProvider::OpenRouter => "anthropic/claude-3.5-sonnet",
            LlmProvider::Grok => "grok-2",
            LlmProvider::DeepSeek => "deepseek-chat",
        }
    }

    /// Guess the provider from a bare model name
    fn infer(model: &str) -> Self {
        let model = model.to_lowercase();
        if model.starts_with("gpt") || model.starts_with("o1") || model.starts_with("o3") {
            LlmProvider::OpenAI
        } else if model.starts_with("gemini") {
            LlmProvider::Gemini
        } else if model.starts_with("grok") {
            LlmProvider::Grok
        } else if model.starts_with("deepseek") {
            LlmProvider::DeepSeek
        } else {
            LlmProvider::Anthropic
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::OpenAI => "openai",
            LlmProvider::Gemini => "gemini",
            LlmProvider::OpenRouter => "openrouter",
            LlmProvider::Grok => "grok",
            LlmProvider::DeepSeek => "deepseek",
        };
        f.write_str(s)
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(LlmProvider::Anthropic),
            "openai" => Ok(LlmProvider::OpenAI),
            "gemini" | "google" => Ok(LlmProvider::Gemini),
            "openrouter" => Ok(LlmProvider::OpenRouter),
            "grok" | "xai" => Ok(LlmProvider::Grok),
            "deepseek" => Ok(LlmProvider::DeepSeek),
            other => Err(format!("Unknown LLM provider: '{}'", other)),
        }
    }
}

/// Model selected for a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelConfig {
    /// LLM provider to use
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model name (e.g., "claude-sonnet-4-20250514", "gpt-4o")
    pub model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::with_provider(LlmProvider::Anthropic, LlmProvider::Anthropic.default_model())
    }
}

impl ModelConfig {
    /// Create config for a specific provider
    pub fn with_provider(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Parse a client's `selectedModel` string.
    ///
    /// Accepts `"provider/model"`, a bare provider name, or a bare model name.
    /// A prefix that is not a known provider is treated as an OpenRouter
    /// model slug (e.g. `"meta-llama/llama-3-70b"`).
    pub fn parse(selected: &str) -> Option<Self> {
        let selected = selected.trim();
        if selected.is_empty() {
            return None;
        }

        if let Some((prefix, model)) = selected.split_once('/') {
            return Some(match prefix.parse::<LlmProvider>() {
                Ok(provider) if !model.is_empty() => Self::with_provider(provider, model),
                Ok(provider) => Self::with_provider(provider, provider.default_model()),
                Err(_) => Self::with_provider(LlmProvider::OpenRouter, selected),
            });
        }

        if let Ok(provider) = selected.parse::<LlmProvider>() {
            return Some(Self::with_provider(provider, provider.default_model()));
        }

        Some(Self::with_provider(LlmProvider::infer(selected), selected))
    }
}
