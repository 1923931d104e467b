//! Config command - show the effective persisted configuration.

use anyhow::Result;

pub async fn show(json: bool) -> Result<()> {
    let config = super::load_config().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("Timeout budget:     {}s", config.timeout_secs);
    println!("Stage backoff:      {}ms", config.backoff_ms);
    println!("Graceful wait:      {}ms", config.graceful_wait_ms);

    let ports: Vec<String> = config.tracked_ports.iter().map(|p| p.to_string()).collect();
    println!("Tracked ports:      {}", ports.join(", "));

    match config.scan_range {
        Some(range) => println!("Scan range:         {}-{}", range.start, range.end),
        None => println!("Scan range:         none"),
    }

    println!(
        "Name heuristics:    {}",
        config.criteria.name_substrings.join(", ")
    );
    println!(
        "Cmdline heuristics: {}",
        config.criteria.cmdline_markers.join(", ")
    );

    Ok(())
}
