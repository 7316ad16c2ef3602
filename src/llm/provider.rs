//! Provider-specific configuration and detection.
//!
//! This module handles differences between OpenAI-compatible API providers:
//! URL patterns and how the API key is presented.

/// Default API version for Azure `OpenAI` deployments.
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-08-01-preview";

/// Supported LLM providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// `OpenAI` (api.openai.com)
    OpenAI,
    /// Azure `OpenAI` Service
    AzureOpenAI {
        /// Deployment name (required for Azure)
        deployment_name: String,
        /// API version (e.g., "2024-08-01-preview")
        api_version: String,
    },
    /// `OpenRouter` (openrouter.ai)
    OpenRouter,
    /// Together AI (together.ai, together.xyz)
    TogetherAI,
    /// Groq (groq.com)
    Groq,
    /// Generic OpenAI-compatible provider
    Generic,
}

/// How the API key is attached to requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `api-key: <key>` (Azure)
    ApiKeyHeader,
}

impl Provider {
    /// Detect provider from base URL.
    ///
    /// ```rust
    /// use thread_chat::llm::Provider;
    ///
    /// let provider = Provider::detect_from_url("https://api.openai.com");
    /// assert_eq!(provider, Provider::OpenAI);
    /// ```
    #[must_use]
    pub fn detect_from_url(base_url: &str) -> Self {
        let lower = base_url.to_lowercase();

        if lower.contains("azure.com") {
            Self::AzureOpenAI {
                deployment_name: String::new(),
                api_version: DEFAULT_AZURE_API_VERSION.to_string(),
            }
        } else if lower.contains("openrouter.ai") {
            Self::OpenRouter
        } else if lower.contains("together.ai") || lower.contains("together.xyz") {
            Self::TogetherAI
        } else if lower.contains("groq.com") {
            Self::Groq
        } else if lower.contains("openai.com") {
            Self::OpenAI
        } else {
            Self::Generic
        }
    }

    /// Header style used to present the API key.
    #[must_use]
    pub fn auth_style(&self) -> AuthStyle {
        match self {
            Self::AzureOpenAI { .. } => AuthStyle::ApiKeyHeader,
            _ => AuthStyle::Bearer,
        }
    }

    /// Build the chat completions URL for this provider.
    ///
    /// Azure routes by deployment name rather than by model.
    #[must_use]
    pub fn build_chat_url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');

        match self {
            Self::AzureOpenAI {
                deployment_name,
                api_version,
            } => {
                format!(
                    "{base}/openai/deployments/{deployment_name}/chat/completions?api-version={api_version}"
                )
            }
            _ => format!("{base}/v1/chat/completions"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_openai() {
        let provider = Provider::detect_from_url("https://api.openai.com");
        assert_eq!(provider, Provider::OpenAI);
        assert_eq!(provider.auth_style(), AuthStyle::Bearer);
    }

    #[test]
    fn test_detect_azure() {
        let provider = Provider::detect_from_url("https://my-resource.openai.azure.com");
        assert!(matches!(provider, Provider::AzureOpenAI { .. }));
        assert_eq!(provider.auth_style(), AuthStyle::ApiKeyHeader);
    }

    #[test]
    fn test_detect_generic() {
        let provider = Provider::detect_from_url("http://localhost:11434");
        assert_eq!(provider, Provider::Generic);
    }

    #[test]
    fn test_build_url_openai() {
        let url = Provider::OpenAI.build_chat_url("https://api.openai.com/");
        assert_eq!(url, "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_detect_openrouter() {
        let provider = Provider::detect_from_url("https://openrouter.ai/api");
        assert_eq!(provider, Provider::OpenRouter);
        assert_eq!(
            provider.build_chat_url("https://openrouter.ai/api"),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn test_build_url_azure() {
        let provider = Provider::AzureOpenAI {
            deployment_name: "gpt-35".to_string(),
            api_version: DEFAULT_AZURE_API_VERSION.to_string(),
        };
        let url = provider.build_chat_url("https://my-resource.openai.azure.com");
        assert_eq!(
            url,
            "https://my-resource.openai.azure.com/openai/deployments/gpt-35/chat/completions?api-version=2024-08-01-preview"
        );
    }
}
