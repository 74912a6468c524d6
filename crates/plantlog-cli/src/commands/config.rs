use std::path::Path;

use plantlog_core::db::{SettingsStore, SqliteSettingsStore};
use plantlog_core::models::SyncSettings;
use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::commands::common::open_database;
use crate::error::CliError;

pub fn run(command: ConfigCommands, db_path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show { json } => run_show(json, db_path),
        ConfigCommands::Set {
            server_url,
            auth_token,
            auto_sync,
            interval,
            sync_on_startup,
            tension,
            stock_take,
            finish_earlier,
        } => run_set(
            &SettingsUpdate {
                server_url,
                auth_token,
                auto_sync,
                interval,
                sync_on_startup,
                tension,
                stock_take,
                finish_earlier,
            },
            db_path,
        ),
    }
}

pub struct SettingsUpdate {
    pub server_url: Option<String>,
    pub auth_token: Option<String>,
    pub auto_sync: Option<bool>,
    pub interval: Option<u32>,
    pub sync_on_startup: Option<bool>,
    pub tension: Option<bool>,
    pub stock_take: Option<bool>,
    pub finish_earlier: Option<bool>,
}

/// Settings view with the credential masked.
#[derive(Debug, Serialize)]
struct SettingsView {
    server_url: Option<String>,
    auth_token_set: bool,
    auto_sync: bool,
    sync_interval_minutes: u32,
    sync_on_startup: bool,
    tension_enabled: bool,
    stock_take_enabled: bool,
    finish_earlier_enabled: bool,
}

impl From<&SyncSettings> for SettingsView {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            server_url: settings.server_url.clone(),
            auth_token_set: settings
                .auth_token
                .as_deref()
                .is_some_and(|token| !token.is_empty()),
            auto_sync: settings.auto_sync,
            sync_interval_minutes: settings.sync_interval_minutes,
            sync_on_startup: settings.sync_on_startup,
            tension_enabled: settings.tension_enabled,
            stock_take_enabled: settings.stock_take_enabled,
            finish_earlier_enabled: settings.finish_earlier_enabled,
        }
    }
}

fn run_show(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let guard = db.lock().unwrap();
    let settings = SqliteSettingsStore::new(guard.connection()).load()?;
    let view = SettingsView::from(&settings);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!(
        "server URL:       {}",
        view.server_url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "auth token:       {}",
        if view.auth_token_set { "[set]" } else { "(not set)" }
    );
    println!("auto-sync:        {}", view.auto_sync);
    println!("interval:         {} minutes", view.sync_interval_minutes);
    println!("sync on startup:  {}", view.sync_on_startup);
    println!("tension:          {}", view.tension_enabled);
    println!("stock-take:       {}", view.stock_take_enabled);
    println!("finish-earlier:   {}", view.finish_earlier_enabled);
    Ok(())
}

fn run_set(update: &SettingsUpdate, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let guard = db.lock().unwrap();
    let store = SqliteSettingsStore::new(guard.connection());

    let mut settings = store.load()?;
    if let Some(url) = &update.server_url {
        settings.server_url = Some(url.trim().to_string()).filter(|u| !u.is_empty());
    }
    if let Some(token) = &update.auth_token {
        settings.auth_token = Some(token.trim().to_string()).filter(|t| !t.is_empty());
    }
    if let Some(auto_sync) = update.auto_sync {
        settings.auto_sync = auto_sync;
    }
    if let Some(interval) = update.interval {
        settings.sync_interval_minutes = interval.max(1);
    }
    if let Some(sync_on_startup) = update.sync_on_startup {
        settings.sync_on_startup = sync_on_startup;
    }
    if let Some(tension) = update.tension {
        settings.tension_enabled = tension;
    }
    if let Some(stock_take) = update.stock_take {
        settings.stock_take_enabled = stock_take;
    }
    if let Some(finish_earlier) = update.finish_earlier {
        settings.finish_earlier_enabled = finish_earlier;
    }

    store.save(&settings)?;
    println!("Settings updated");
    Ok(())
}
