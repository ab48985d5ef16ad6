use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Top-level chat client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub api: ApiConfig,
    pub feature: FeatureSelection,
    /// Sent with the session-creating request only
    pub subject_id: Option<String>,
    pub topic_id: Option<String>,
    pub log_level: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            feature: FeatureSelection::default(),
            subject_id: None,
            topic_id: None,
            log_level: "info".to_string(),
        }
    }
}

impl ChatConfig {
    /// Parse a (possibly partial) JSON config; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ChatError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).map_err(|e| ChatError::Config(e.to_string()))
    }

    pub fn create_feature(&self) -> String {
        self.feature.feature_name()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Empty means same-origin
    pub base_url: String,
    /// Send cookies with chat requests
    pub include_credentials: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            include_credentials: true,
        }
    }
}

impl ApiConfig {
    pub fn build_url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}

/// Which assistant feature a new session is created for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSelection {
    pub tool_id: String,
    pub subject: SubjectFilter,
}

impl Default for FeatureSelection {
    fn default() -> Self {
        Self {
            tool_id: DEFAULT_TOOL_ID.to_string(),
            subject: SubjectFilter::All,
        }
    }
}

impl FeatureSelection {
    /// Subject-scoped sessions use the retrieval-augmented variant of the tool.
    pub fn feature_name(&self) -> String {
        match self.subject {
            SubjectFilter::All => self.tool_id.clone(),
            SubjectFilter::Subject(_) => format!("{}_rag", self.tool_id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectFilter {
    #[default]
    All,
    Subject(String),
}

pub const DEFAULT_TOOL_ID: &str = "routing_disabled";
