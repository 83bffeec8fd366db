mod collectors;
mod config;
mod report;

use clap::Parser;
use collectors::system::SysinfoProbe;
use collectors::{Capabilities, SystemInfoCollector};
use config::Config;
use sysinfo::{System, SystemExt};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hostsnap")]
#[command(version)]
struct Cli {
    #[arg(long)]
    config: Option<String>,
    #[arg(long)]
    print_default_config: bool,
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match cli.config.as_deref() {
        Some(path) => match Config::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                error!(error = %err, "не удалось загрузить конфигурацию");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    let sample_interval = match cfg.sample_interval() {
        Ok(interval) => interval,
        Err(err) => {
            error!(error = %err, "не удалось загрузить конфигурацию");
            std::process::exit(1);
        }
    };

    if !System::IS_SUPPORTED {
        warn!(os = std::env::consts::OS, "сбор метрик хоста не поддерживается на этой платформе");
    }

    let probe = SysinfoProbe::new();
    let capabilities = Capabilities::detect(&cfg, &probe);
    info!(
        sample_interval = %humantime::format_duration(sample_interval),
        thermal = capabilities.thermal,
        gpu = capabilities.gpu.is_some(),
        "сбор снимка состояния хоста"
    );

    let mut collector = SystemInfoCollector::new(probe, capabilities, sample_interval);
    let report = collector.collect();
    debug!(
        disks = report.disks.len(),
        thermal = report.thermal.is_available(),
        gpu = report.gpu.is_available(),
        "снимок состояния собран"
    );

    match serde_json::to_string_pretty(&report.to_record()) {
        Ok(text) => println!("{text}"),
        Err(err) => {
            error!(error = %err, "не удалось сформировать отчёт");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
