//! Configuration for the Cosmos client core.

use crate::diagnostics::DiagnosticsContext;
use crate::errors::ConfigurationError;
use crate::pagination::PageIteratorOptions;
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};

/// Environment variable appended to the default user agent.
pub const USER_AGENT_SUFFIX_ENV: &str = "COSMOS_USER_AGENT_SUFFIX";

/// Environment variable that turns diagnostics capture off.
pub const DISABLE_DIAGNOSTICS_ENV: &str = "COSMOS_DISABLE_DIAGNOSTICS";

/// Wire format requested for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContentSerializationFormat {
    /// JSON text.
    #[default]
    JsonText,
    /// Binary encoding.
    CosmosBinary,
    /// Hybrid row encoding.
    HybridRow,
}

impl ContentSerializationFormat {
    /// Header value for this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentSerializationFormat::JsonText => "JsonText",
            ContentSerializationFormat::CosmosBinary => "CosmosBinary",
            ContentSerializationFormat::HybridRow => "HybridRow",
        }
    }
}

/// Serialization options tagged onto every successful page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializationOptions {
    /// Requested content format.
    pub content_serialization_format: ContentSerializationFormat,
}

/// Configuration for the client core.
#[derive(Debug, Clone)]
pub struct CosmosConfig {
    /// User agent recorded in every diagnostics context.
    pub user_agent: String,

    /// Whether diagnostics are captured.
    pub diagnostics_enabled: bool,

    /// Serialization options for query results.
    pub serialization: SerializationOptions,
}

impl CosmosConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CosmosConfigBuilder {
        CosmosConfigBuilder::new()
    }

    /// Builds a configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let mut builder = Self::builder();

        if let Ok(suffix) = std::env::var(USER_AGENT_SUFFIX_ENV) {
            if !suffix.trim().is_empty() {
                builder = builder.user_agent(format!("{} {}", default_user_agent(), suffix.trim()));
            }
        }

        if let Ok(value) = std::env::var(DISABLE_DIAGNOSTICS_ENV) {
            let disabled = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "" | "0" | "false" | "no" => false,
                other => {
                    return Err(ConfigurationError::InvalidConfiguration(format!(
                        "{DISABLE_DIAGNOSTICS_ENV} must be a boolean, got '{other}'"
                    )));
                }
            };
            builder = builder.diagnostics_enabled(!disabled);
        }

        builder.build()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.user_agent.trim().is_empty() {
            return Err(ConfigurationError::InvalidUserAgent(
                "User agent must not be empty".to_string(),
            ));
        }

        HeaderValue::from_str(&self.user_agent)
            .map_err(|e| ConfigurationError::InvalidUserAgent(e.to_string()))?;

        Ok(())
    }

    /// Creates a diagnostics context for one logical operation.
    pub fn new_diagnostics_context(&self) -> DiagnosticsContext {
        let context = DiagnosticsContext::create(!self.diagnostics_enabled);
        context.set_user_agent(self.user_agent.clone());
        context
    }

    /// Options for a page iterator running the named operation.
    pub fn page_iterator_options(&self, operation_name: impl Into<String>) -> PageIteratorOptions {
        PageIteratorOptions {
            operation_name: operation_name.into(),
            serialization: self.serialization,
            diagnostics_enabled: self.diagnostics_enabled,
            user_agent: Some(self.user_agent.clone()),
        }
    }
}

/// Builder for CosmosConfig.
pub struct CosmosConfigBuilder {
    user_agent: Option<String>,
    diagnostics_enabled: bool,
    serialization: SerializationOptions,
}

impl CosmosConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            user_agent: None,
            diagnostics_enabled: true,
            serialization: SerializationOptions::default(),
        }
    }

    /// Sets the user agent string.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Turns diagnostics capture on or off.
    pub fn diagnostics_enabled(mut self, enabled: bool) -> Self {
        self.diagnostics_enabled = enabled;
        self
    }

    /// Sets the serialization options.
    pub fn serialization(mut self, serialization: SerializationOptions) -> Self {
        self.serialization = serialization;
        self
    }

    /// Sets the content serialization format.
    pub fn content_serialization_format(mut self, format: ContentSerializationFormat) -> Self {
        self.serialization.content_serialization_format = format;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> Result<CosmosConfig, ConfigurationError> {
        let config = CosmosConfig {
            user_agent: self.user_agent.unwrap_or_else(default_user_agent),
            diagnostics_enabled: self.diagnostics_enabled,
            serialization: self.serialization,
        };

        config.validate()?;

        Ok(config)
    }
}

impl Default for CosmosConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_user_agent() -> String {
    format!("integrations-cosmos/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CosmosConfig::builder().build().unwrap();

        assert!(config.user_agent.starts_with("integrations-cosmos/"));
        assert!(config.diagnostics_enabled);
        assert_eq!(
            config.serialization.content_serialization_format,
            ContentSerializationFormat::JsonText
        );
    }

    #[test]
    fn test_custom_config() {
        let config = CosmosConfig::builder()
            .user_agent("test-agent/1.0")
            .diagnostics_enabled(false)
            .content_serialization_format(ContentSerializationFormat::CosmosBinary)
            .build()
            .unwrap();

        assert_eq!(config.user_agent, "test-agent/1.0");
        assert!(!config.diagnostics_enabled);
        assert_eq!(config.serialization.content_serialization_format.as_str(), "CosmosBinary");
    }

    #[test]
    fn test_invalid_user_agent() {
        assert!(CosmosConfig::builder().user_agent("  ").build().is_err());
        assert!(CosmosConfig::builder().user_agent("bad\nagent").build().is_err());
    }

    #[test]
    fn test_diagnostics_context_follows_config() {
        let enabled = CosmosConfig::builder().user_agent("ua").build().unwrap();
        let context = enabled.new_diagnostics_context();
        assert!(!context.is_disabled());
        assert_eq!(context.user_agent().as_deref(), Some("ua"));

        let disabled = CosmosConfig::builder().diagnostics_enabled(false).build().unwrap();
        assert!(disabled.new_diagnostics_context().is_disabled());
    }

    #[test]
    fn test_from_env() {
        std::env::set_var(USER_AGENT_SUFFIX_ENV, "my-app/2.0");
        std::env::set_var(DISABLE_DIAGNOSTICS_ENV, "true");
        let config = CosmosConfig::from_env().unwrap();
        assert!(config.user_agent.ends_with(" my-app/2.0"));
        assert!(!config.diagnostics_enabled);

        std::env::set_var(DISABLE_DIAGNOSTICS_ENV, "sometimes");
        assert!(matches!(
            CosmosConfig::from_env(),
            Err(ConfigurationError::InvalidConfiguration(_))
        ));

        std::env::remove_var(USER_AGENT_SUFFIX_ENV);
        std::env::remove_var(DISABLE_DIAGNOSTICS_ENV);
    }

    #[test]
    fn test_serialization_options_from_json() {
        let options: SerializationOptions =
            serde_json::from_str(r#"{"contentSerializationFormat":"HybridRow"}"#).unwrap();
        assert_eq!(options.content_serialization_format, ContentSerializationFormat::HybridRow);
    }
}
