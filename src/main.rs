use anyhow::{bail, Context, Result};
use memory_probe::config::{load_config, Config};
use memory_probe::{ProcessManager, RegionFilter};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: memory-probe <pid|process-name> [pattern]";

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let config = load_config().context("failed to load memory-probe.toml")?;
    init_logging(&config);

    let mut args = std::env::args().skip(1);
    let Some(target) = args.next() else {
        bail!(USAGE);
    };
    let pattern = args.next();

    info!("memory-probe v{} ({})", memory_probe::VERSION, std::env::consts::ARCH);
    let manager = ProcessManager::new(config);
    run(&manager, &target, pattern.as_deref())
}

#[cfg(windows)]
fn run(manager: &ProcessManager, target: &str, pattern: Option<&str>) -> Result<()> {
    use memory_probe::utils::{bytes_to_hex, format_address, BytePattern};
    use memory_probe::ScanOptions;

    let attached = match target.parse::<u32>() {
        Ok(pid) => manager.attach(pid),
        Err(_) => manager.attach_by_name(target),
    };
    attached.with_context(|| format!("failed to attach to {}", target))?;

    let regions = manager.regions(&RegionFilter::all())?;
    let total: u64 = regions.iter().map(|r| r.size).sum();
    println!(
        "{} (PID {}): {} committed regions, {} bytes",
        manager.process_name().unwrap_or_default(),
        manager.process_id().unwrap_or_default(),
        regions.len(),
        total
    );

    if let Some(text) = pattern {
        let pattern = BytePattern::parse(text)?;
        let outcome = manager.scanner()?.scan_pattern(&pattern, &ScanOptions::new())?;
        for hit in &outcome.matches {
            println!("{}  {}", format_address(hit.address, true), bytes_to_hex(&hit.bytes));
        }
        println!(
            "{} matches in {} regions ({} unreadable){}",
            outcome.len(),
            outcome.regions_scanned,
            outcome.regions_skipped,
            if outcome.cap_reached { ", result cap reached" } else { "" }
        );
    }

    manager.detach();
    Ok(())
}

#[cfg(not(windows))]
fn run(_manager: &ProcessManager, target: &str, _pattern: Option<&str>) -> Result<()> {
    bail!(
        "cannot attach to {}: live process attachment is only supported on Windows",
        target
    )
}
