//! Sync settings model

use serde::{Deserialize, Serialize};

use super::Collection;

/// Persisted synchronization configuration (singleton row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Base URL of the remote API (e.g. `https://plant.example.com/api`)
    pub server_url: Option<String>,
    /// Bearer credential for remote calls
    pub auth_token: Option<String>,
    /// Run a full sync on a timer
    pub auto_sync: bool,
    /// Timer interval in minutes
    pub sync_interval_minutes: u32,
    /// Run a full sync when the client starts
    pub sync_on_startup: bool,
    /// Per-collection enablement
    pub tension_enabled: bool,
    pub stock_take_enabled: bool,
    pub finish_earlier_enabled: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            server_url: None,
            auth_token: None,
            auto_sync: false,
            sync_interval_minutes: 15,
            sync_on_startup: false,
            tension_enabled: true,
            stock_take_enabled: true,
            finish_earlier_enabled: true,
        }
    }
}

impl SyncSettings {
    /// Whether both the URL and the credential are present.
    pub fn is_configured(&self) -> bool {
        self.server_url.as_deref().is_some_and(|url| !url.is_empty())
            && self
                .auth_token
                .as_deref()
                .is_some_and(|token| !token.is_empty())
    }

    /// Whether the given collection participates in sync runs.
    pub const fn collection_enabled(&self, collection: Collection) -> bool {
        match collection {
            Collection::Tension => self.tension_enabled,
            Collection::StockTake => self.stock_take_enabled,
            Collection::FinishEarlier => self.finish_earlier_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_not_configured() {
        let settings = SyncSettings::default();
        assert!(!settings.is_configured());
        assert_eq!(settings.sync_interval_minutes, 15);
        assert!(settings.collection_enabled(Collection::Tension));
    }

    #[test]
    fn test_configured_requires_both_fields() {
        let mut settings = SyncSettings {
            server_url: Some("https://plant.example.com/api".to_string()),
            ..SyncSettings::default()
        };
        assert!(!settings.is_configured());

        settings.auth_token = Some("token".to_string());
        assert!(settings.is_configured());

        settings.auth_token = Some(String::new());
        assert!(!settings.is_configured());
    }
}
