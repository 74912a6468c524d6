//! Sync settings store implementation

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::SyncSettings;

/// Trait for settings storage operations
pub trait SettingsStore {
    /// Load the settings singleton
    fn load(&self) -> Result<SyncSettings>;

    /// Persist the settings singleton
    fn save(&self, settings: &SyncSettings) -> Result<()>;
}

/// SQLite implementation of `SettingsStore`
pub struct SqliteSettingsStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSettingsStore<'a> {
    /// Create a new store with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SettingsStore for SqliteSettingsStore<'_> {
    fn load(&self) -> Result<SyncSettings> {
        let result = self.conn.query_row(
            "SELECT server_url, auth_token, auto_sync, sync_interval_minutes,
                    sync_on_startup, tension_enabled, stock_take_enabled,
                    finish_earlier_enabled
             FROM sync_settings WHERE id = 1",
            [],
            |row| {
                Ok(SyncSettings {
                    server_url: row.get(0)?,
                    auth_token: row.get(1)?,
                    auto_sync: row.get::<_, i32>(2)? != 0,
                    sync_interval_minutes: row.get(3)?,
                    sync_on_startup: row.get::<_, i32>(4)? != 0,
                    tension_enabled: row.get::<_, i32>(5)? != 0,
                    stock_take_enabled: row.get::<_, i32>(6)? != 0,
                    finish_earlier_enabled: row.get::<_, i32>(7)? != 0,
                })
            },
        );

        match result {
            Ok(settings) => Ok(settings),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(SyncSettings::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, settings: &SyncSettings) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO sync_settings (
                 id, server_url, auth_token, auto_sync, sync_interval_minutes,
                 sync_on_startup, tension_enabled, stock_take_enabled,
                 finish_earlier_enabled
             ) VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                settings.server_url,
                settings.auth_token,
                i32::from(settings.auto_sync),
                settings.sync_interval_minutes,
                i32::from(settings.sync_on_startup),
                i32::from(settings.tension_enabled),
                i32::from(settings.stock_take_enabled),
                i32::from(settings.finish_earlier_enabled),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_load_default_settings() {
        let db = setup();
        let repo = SqliteSettingsStore::new(db.connection());

        let settings = repo.load().unwrap();
        assert_eq!(settings, SyncSettings::default());
        assert!(!settings.is_configured());
    }

    #[test]
    fn test_save_and_load_settings() {
        let db = setup();
        let repo = SqliteSettingsStore::new(db.connection());

        let settings = SyncSettings {
            server_url: Some("https://plant.example.com/api".to_string()),
            auth_token: Some("secret-token".to_string()),
            auto_sync: true,
            sync_interval_minutes: 5,
            sync_on_startup: true,
            stock_take_enabled: false,
            ..SyncSettings::default()
        };

        repo.save(&settings).unwrap();

        let loaded = repo.load().unwrap();
        assert_eq!(loaded, settings);
        assert!(loaded.is_configured());
    }

    #[test]
    fn test_save_overwrites_previous_values() {
        let db = setup();
        let repo = SqliteSettingsStore::new(db.connection());

        let mut settings = SyncSettings {
            server_url: Some("https://one.example.com".to_string()),
            ..SyncSettings::default()
        };
        repo.save(&settings).unwrap();

        settings.server_url = Some("https://two.example.com".to_string());
        repo.save(&settings).unwrap();

        let loaded = repo.load().unwrap();
        assert_eq!(
            loaded.server_url.as_deref(),
            Some("https://two.example.com")
        );
    }
}
