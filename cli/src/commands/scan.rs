//! Scan command - list matching processes without killing anything.

use anyhow::Result;
use chromesweep_core::{ProcessIdentifier, SystemPlatform};

use super::truncate;

pub async fn run(json: bool) -> Result<()> {
    let config = super::load_config().await;
    let identifier = ProcessIdentifier::new(config.criteria);
    let platform = SystemPlatform::new();

    let matches = identifier.scan(&platform).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }

    if matches.is_empty() {
        println!("No matching processes found.");
        return Ok(());
    }

    // Table header
    println!(
        "{:<8} {:<8} {:<20} {:<10} COMMAND",
        "PID", "PPID", "NAME", "REASON"
    );
    println!("{}", "-".repeat(80));

    for record in &matches {
        let ppid = record
            .parent_pid
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let reason = record
            .matched
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<8} {:<8} {:<20} {:<10} {}",
            record.pid,
            ppid,
            truncate(&record.name, 20),
            reason,
            truncate(&record.cmdline, 40)
        );
    }

    println!("\nTotal: {} processes", matches.len());
    Ok(())
}
