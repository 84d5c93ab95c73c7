use serde::{Deserialize, Serialize};

/// Connection details for one listing provider. Each adapter owns its own
/// copy; nothing is shared across adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the provider site
    pub base_url: String,
    /// Path of the offer search page, appended to `base_url`
    pub search_path: String,
}

impl SourceConfig {
    /// Defaults for the SAGA Hamburg offer search.
    pub fn saga() -> Self {
        Self {
            base_url: "https://www.saga.hamburg".to_string(),
            search_path: "/immobiliensuche?Kategorie=APARTMENT".to_string(),
        }
    }
}
