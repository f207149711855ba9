use anyhow::{Context, Result};
use log::error;

use relayd_install::cli::Cli;
use relayd_install::config::InstallConfig;
use relayd_install::host::SystemHost;
use relayd_install::orchestrator::InstallOrchestrator;

fn main() {
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("FATAL: failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(real_main()) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn real_main() -> Result<()> {
    let _cli = Cli::parse_args();
    let config = InstallConfig::from_env().context("failed to resolve configuration")?;

    let host = SystemHost;
    let mut orchestrator = InstallOrchestrator::new(config, &host);
    orchestrator.run().await.context("installation failed")?;

    let config = orchestrator.config();
    println!("{} installed as a systemd service.", config.service_name);
    println!("  start:   systemctl start {}", config.service_name);
    println!("  status:  systemctl status {}", config.service_name);
    println!("  logs:    journalctl -u {} -f", config.service_name);
    Ok(())
}
