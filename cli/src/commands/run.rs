//! Run command - execute one cleanup session and print its report.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Result;
use chromesweep_core::{run_cleanup, CleanupReport, PortRange};
use chrono::Local;
use clap::Args;

#[derive(Args, Default)]
pub struct RunArgs {
    /// Overall timeout budget in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Track an extra control port (repeatable)
    #[arg(short = 'p', long = "port")]
    pub ports: Vec<u16>,

    /// Also sweep a port range, e.g. 9000-9100
    #[arg(long, value_parser = parse_port_range)]
    pub scan_range: Option<PortRange>,

    /// Register a working directory for removal (repeatable)
    #[arg(long = "data-dir")]
    pub data_dirs: Vec<PathBuf>,

    /// Register a known root PID (repeatable)
    #[arg(long = "root-pid")]
    pub root_pids: Vec<u32>,

    /// Add a name substring to the heuristics (repeatable)
    #[arg(long = "name")]
    pub names: Vec<String>,

    /// Add a command-line marker to the heuristics (repeatable)
    #[arg(long = "marker")]
    pub markers: Vec<String>,
}

fn parse_port_range(s: &str) -> std::result::Result<PortRange, String> {
    let (start, end) = s
        .split_once('-')
        .ok_or_else(|| "expected START-END".to_string())?;

    let start: u16 = start
        .trim()
        .parse()
        .map_err(|_| format!("invalid start port: {}", start))?;
    let end: u16 = end
        .trim()
        .parse()
        .map_err(|_| format!("invalid end port: {}", end))?;

    if end < start {
        return Err(format!("range end {} before start {}", end, start));
    }

    Ok(PortRange { start, end })
}

pub async fn run(args: RunArgs, json: bool) -> Result<()> {
    let mut config = super::load_config().await;

    if let Some(timeout) = args.timeout_secs {
        config.timeout_secs = timeout;
    }
    config.tracked_ports.extend(args.ports);
    if args.scan_range.is_some() {
        config.scan_range = args.scan_range;
    }
    config.data_dirs.extend(args.data_dirs);
    config.root_pids.extend(args.root_pids);
    config.criteria.name_substrings.extend(args.names);
    config.criteria.cmdline_markers.extend(args.markers);

    let report = run_cleanup(config).await;

    // Machine consumers (pipes, cron mails) get JSON without asking.
    if json || !atty::is(atty::Stream::Stdout) {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&report);
    Ok(())
}

fn print_report(report: &CleanupReport) {
    println!("Cleanup session {}", report.session_id);
    println!("Finished {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!();

    if report.stages_executed.is_empty() {
        println!("No stages executed; nothing tracked was alive.");
    } else {
        println!("{:<12} RESIDUAL", "STAGE");
        println!("{}", "-".repeat(24));
        for record in &report.stages_executed {
            println!("{:<12} {}", record.stage.to_string(), record.residual_after);
        }
    }
    println!();

    if report.killed_pids.is_empty() {
        println!("Killed: none");
    } else {
        let pids: Vec<String> = report.killed_pids.iter().map(|p| p.to_string()).collect();
        println!("Killed: {} ({})", report.killed_pids.len(), pids.join(", "));
    }

    if report.residual_pids.is_empty() {
        println!("Residual: none");
    } else {
        println!("Residual: {}", report.residual_pids.len());
        let detailed: HashSet<u32> = report.residual_processes.iter().map(|r| r.pid).collect();
        for record in &report.residual_processes {
            println!("  {}", record);
        }
        for pid in &report.residual_pids {
            if !detailed.contains(pid) {
                println!("  {} (no details)", pid);
            }
        }
    }

    if report.timed_out {
        println!("Timed out before verification.");
    }

    println!(
        "\nElapsed: {:.1}s  Success: {}",
        report.elapsed_ms as f64 / 1000.0,
        report.success
    );
}
