//! CLI subcommand implementations.

pub mod config;
pub mod run;
pub mod scan;

use chromesweep_core::{CleanupConfig, ConfigStore};

/// Load persisted defaults, falling back to built-ins when the store is
/// missing or unreadable.
pub(crate) async fn load_config() -> CleanupConfig {
    let store = match ConfigStore::new() {
        Ok(store) => store,
        Err(_) => return CleanupConfig::default(),
    };

    match store.load().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("chromesweep: ignoring unreadable config: {}", e);
            CleanupConfig::default()
        }
    }
}

/// Truncate a string for table display, keeping char boundaries intact.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}
