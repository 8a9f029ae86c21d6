//! Config validation CLI tool
//!
//! Validates an attendod configuration file and reports any errors.

use attendo_api::RecordKind;
use attendo_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates an attendod configuration file.");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match attendo_config::load_config(&config_path) {
        Ok(policy) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", attendo_config::CURRENT_CONFIG_VERSION);
            println!("  Socket: {}", policy.service.socket_path.display());
            println!("  Data dir: {}", policy.service.data_dir.display());
            println!("  Catch-up on start: {}", policy.service.catch_up_on_start);
            println!();
            println!("Schedule:");
            for kind in RecordKind::ALL {
                let schedule = policy.schedule(*kind);
                println!(
                    "  - {}: window {}, sweep at {}",
                    kind, schedule.window, schedule.sweep_at
                );
            }
            println!("  Face-to-face evidence at: {:?}", policy.evidence_timing());

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                attendo_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                attendo_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                attendo_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                attendo_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        attendo_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
