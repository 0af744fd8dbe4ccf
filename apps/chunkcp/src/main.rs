//! chunkcp: parallel chunked file copy over scp.

mod cli;
mod config;
mod console;
mod logging;
mod size;

use std::process::ExitCode;

use chunkcp_pipeline::{TransferOrchestrator, TransferReport, TransferSession};
use chunkcp_remote::{LocalTransport, ScpConfig, ScpTransport, Transport};
use clap::Parser;
use tracing::{error, info};

use crate::cli::Cli;
use crate::config::{FileConfig, Settings};
use crate::console::ConsoleProgress;
use crate::size::{format_duration, format_rate, format_size};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("chunkcp: {e:#}");
        return ExitCode::FAILURE;
    }
    info!(version = env!("CARGO_PKG_VERSION"), "chunkcp starting");

    match run(&cli) {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "transfer failed");
            eprintln!("chunkcp: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<TransferReport> {
    let file = FileConfig::load(cli.config.as_deref())?;
    let settings = Settings::resolve(cli, &file)?;
    let mut session = TransferSession::new(settings.transfer.clone())?;

    let transport: Box<dyn Transport> = if settings.local {
        info!(dest = %settings.transfer.dest_dir, "local destination, ssh not used");
        Box::new(LocalTransport::new("."))
    } else {
        let scp = ScpConfig {
            cipher: settings.cipher.clone(),
            port: settings.port,
            identity_file: settings.identity.clone(),
            timeout: settings.timeout,
            ..ScpConfig::new(settings.transfer.remote.clone())
        };
        Box::new(ScpTransport::new(scp)?)
    };

    let total_bytes = std::fs::metadata(&settings.transfer.source)?.len();
    let progress = ConsoleProgress::new(total_bytes);
    let result = TransferOrchestrator::new(&*transport, &progress).run(&mut session);
    progress.finish();
    Ok(result?)
}

fn print_summary(report: &TransferReport) {
    println!("PASSED checksums match ({})", report.checksum);
    println!(
        "{} -> {}: {} in {} chunk(s)",
        report.file_name,
        report.remote_file,
        format_size(report.total_bytes),
        report.chunks
    );
    if let Some(transfer) = report.timings.transfer {
        println!(
            "transfer {} at {}",
            format_duration(transfer),
            format_rate(report.total_bytes, transfer)
        );
    }
    println!("total {}", format_duration(report.timings.total()));
    for failure in &report.cleanup.failures {
        let side = if failure.remote { "remote" } else { "local" };
        eprintln!(
            "warning: could not remove {side} chunk {}: {}",
            failure.path, failure.error
        );
    }
}
