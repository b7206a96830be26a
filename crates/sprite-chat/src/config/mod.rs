//! Provider configuration - request shapes, per-provider settings, catalog

mod store;

pub use store::{ConfigStore, JsonFileStore, MemoryStore, Settings};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

/// Provider request/response schema variant.
///
/// Selected once per request; determines how history is serialized into the
/// request body, how authentication is attached, and how streamed chunks are
/// decoded into text deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestShape {
    /// Chat-completions body with a `messages` array and bearer auth.
    /// Covers OpenAI itself plus the compatible endpoints (Qwen, ChatGLM).
    OpenAi,
    /// Single flattened user message, `x-api-key` auth.
    Anthropic,
    /// Nested `{model, input, parameters}` body with an SSE-enable header.
    DashScope,
    /// Flattened single-message body, whole-JSON response, no streaming.
    Generic,
}

impl RequestShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::DashScope => "dashscope",
            Self::Generic => "generic",
        }
    }

    /// Whether responses for this shape arrive as an SSE delta stream.
    ///
    /// `Generic` providers answer with a single JSON document instead; the
    /// session short-circuits the decoder for them.
    pub fn supports_streaming(&self) -> bool {
        !matches!(self, Self::Generic)
    }
}

/// Everything needed to address one provider: endpoint, model, auth and
/// generation parameters.
///
/// A plain value passed into the session at construction; persistence happens
/// through [`ConfigStore`], never inside the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub shape: RequestShape,
    pub api_url: String,
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    /// Additional static headers (e.g. `anthropic-version`).
    #[serde(default)]
    pub extra_headers: Vec<(String, String)>,
    /// Optional proxy endpoint for the OpenAi shape. Proxied requests target
    /// this URL and omit the authorization header.
    #[serde(default)]
    pub proxy_url: Option<String>,
}

impl ProviderConfig {
    pub fn new(
        name: impl Into<String>,
        shape: RequestShape,
        api_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            shape,
            api_url: api_url.into(),
            model: model.into(),
            api_key: String::new(),
            max_tokens: 1500,
            temperature: 0.7,
            top_p: 0.8,
            extra_headers: Vec::new(),
            proxy_url: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    pub fn with_proxy_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_url = Some(url.into());
        self
    }
}

/// Named collection of provider configurations.
pub struct ProviderCatalog {
    entries: HashMap<String, ProviderConfig>,
}

impl ProviderCatalog {
    /// Catalog with the built-in provider entries. API keys are empty; callers
    /// attach keys via [`Settings`] or [`ProviderConfig::with_api_key`].
    pub fn builtin() -> Self {
        let mut catalog = Self {
            entries: HashMap::new(),
        };

        catalog.insert(ProviderConfig::new(
            "qwen",
            RequestShape::OpenAi,
            "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions",
            "qwen3-coder-plus",
        ));
        catalog.insert(ProviderConfig::new(
            "openai",
            RequestShape::OpenAi,
            "https://api.openai.com/v1/chat/completions",
            "gpt-3.5-turbo",
        ));
        catalog.insert(
            ProviderConfig::new(
                "anthropic",
                RequestShape::Anthropic,
                "https://api.anthropic.com/v1/messages",
                "claude-3-sonnet-20240229",
            )
            .with_header("anthropic-version", "2023-06-01"),
        );
        catalog.insert(ProviderConfig::new(
            "chatglm",
            RequestShape::OpenAi,
            "https://open.bigmodel.cn/api/paas/v4/chat/completions",
            "glm-4",
        ));
        catalog.insert(ProviderConfig::new(
            "dashscope",
            RequestShape::DashScope,
            "https://dashscope.aliyuncs.com/api/v1/services/aigc/text-generation/generation",
            "qwen-max",
        ));
        catalog.insert(ProviderConfig::new(
            "wenxin",
            RequestShape::Generic,
            "https://aip.baidubce.com/rpc/2.0/ai_custom/v1/wenxinworkshop/chat/completions",
            "ernie-bot-4",
        ));

        catalog
    }

    /// Empty catalog.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register or replace a provider entry.
    pub fn insert(&mut self, config: ProviderConfig) {
        self.entries.insert(normalize_name(&config.name), config);
    }

    /// Look up a provider by name.
    pub fn get(&self, name: &str) -> Result<ProviderConfig> {
        self.entries
            .get(&normalize_name(name))
            .cloned()
            .ok_or_else(|| ChatError::Build(format!("Unknown provider '{name}'")))
    }

    /// Sorted provider names.
    pub fn available(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.values().map(|c| c.name.clone()).collect();
        names.sort();
        names
    }
}

impl Default for ProviderCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_resolves_known_providers() {
        let catalog = ProviderCatalog::builtin();
        let qwen = catalog.get("qwen").unwrap();
        assert_eq!(qwen.shape, RequestShape::OpenAi);
        assert_eq!(qwen.max_tokens, 1500);

        let anthropic = catalog.get("anthropic").unwrap();
        assert!(
            anthropic
                .extra_headers
                .iter()
                .any(|(name, _)| name == "anthropic-version")
        );
    }

    #[test]
    fn unknown_provider_is_a_build_error() {
        let catalog = ProviderCatalog::builtin();
        let err = catalog.get("no-such-provider").unwrap_err();
        assert!(matches!(err, ChatError::Build(_)));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let catalog = ProviderCatalog::builtin();
        assert!(catalog.get(" Qwen ").is_ok());
    }

    #[test]
    fn generic_shape_does_not_stream() {
        assert!(RequestShape::OpenAi.supports_streaming());
        assert!(RequestShape::Anthropic.supports_streaming());
        assert!(RequestShape::DashScope.supports_streaming());
        assert!(!RequestShape::Generic.supports_streaming());
    }

    #[test]
    fn shape_serializes_lowercase() {
        let json = serde_json::to_string(&RequestShape::DashScope).unwrap();
        assert_eq!(json, "\"dashscope\"");
        let back: RequestShape = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(back, RequestShape::OpenAi);
    }
}
