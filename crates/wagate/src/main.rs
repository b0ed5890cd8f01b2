// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wagate - a multi-tenant messaging protocol gateway.
//!
//! This is the binary entry point for the Wagate server.

use clap::{Parser, Subcommand};

mod driver;
mod serve;
mod shutdown;

/// Wagate - a multi-tenant messaging protocol gateway.
#[derive(Parser, Debug)]
#[command(name = "wagate", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Wagate gateway server.
    Serve,
    /// Print the resolved configuration and exit.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup
    let config = match wagate_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            wagate_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(error) = serve::run_serve(config).await {
                eprintln!("wagate serve failed: {error}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => match toml::to_string_pretty(&config) {
            Ok(rendered) => println!("{rendered}"),
            Err(error) => {
                eprintln!("failed to render configuration: {error}");
                std::process::exit(1);
            }
        },
        None => {
            println!("wagate: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn binary_loads_config_defaults() {
        // Verify config loads with defaults (no config file needed)
        let config =
            wagate_config::load_and_validate().expect("default config should be valid");
        assert_eq!(config.service.name, "wagate");
    }
}
