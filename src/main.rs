// Copyright (c) 2025 vcload contributors
// SPDX-License-Identifier: MIT

//! Command-line entry point
//!
//! Parses the single address argument, brackets the resolution flow in the
//! activation runtime, and reports the resulting handle on stdout.
//! Diagnostics go to stderr; resolution failures exit non-zero.

use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use vcload_rs::address::PluginAddress;
use vcload_rs::module::NativeLoader;
use vcload_rs::resolver::Resolver;
use vcload_rs::runtime::ActivationRuntime;

/// Load a virtual channel plugin and print its instance handle
#[derive(Parser, Debug)]
#[command(name = "vcload", version, about)]
struct Cli {
    /// Plugin address: {CLSID}, a library path, or library:{CLSID}
    address: String,

    /// Raise log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = match ActivationRuntime::initialize() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(category = err.category(), "{err}");
            return ExitCode::from(1);
        }
    };

    let address = PluginAddress::parse(&cli.address);
    debug!(address = %address, "classified plugin address");

    let resolver = Resolver::for_plugins(NativeLoader, runtime.registry());
    match resolver.resolve(&address) {
        Ok(handle) => {
            println!("plugin handle {handle}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(category = err.category(), "{err}");
            ExitCode::from(1)
        }
    }
    // The runtime guard drops last, tearing the activation subsystem down
    // after the result has been reported.
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_requires_exactly_one_address() {
        assert!(Cli::try_parse_from(["vcload"]).is_err());
        assert!(Cli::try_parse_from(["vcload", "plugin.so", "extra.so"]).is_err());

        let cli = Cli::try_parse_from(["vcload", "plugin.so"]).unwrap();
        assert_eq!(cli.address, "plugin.so");
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_cli_verbosity_counts() {
        let cli = Cli::try_parse_from(["vcload", "-vv", "plugin.so"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
