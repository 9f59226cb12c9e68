//! # Grinvoke CLI Entry Point
//!
//! The main executable for the Grinvoke tool. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Parses command-line arguments using [`cli::Cli`] and loads the [`Config`].
//! 2. **Registration**: Registers every configured endpoint, resolving its services via reflection.
//! 3. **Execution**: Delegates the command to the [`Workbench`].
//! 4. **Presentation**: Formats and prints the resulting data or error to standard output/error.

mod cli;
mod config;
mod formatter;

use clap::Parser;
use cli::{Cli, Commands};
use formatter::{Catalogs, Endpoints, FormattedString};
use grinvoke_core::{
    Config, InvokeRequest, Workbench, config::EndpointConfig, manager::RegisterError,
};
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();

    let config = match config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => exit_with(err),
    };

    let workbench = Workbench::new(&config);
    register_all(&workbench, &config, args.endpoints).await;

    match args.command {
        Commands::List => {
            let catalogs = workbench.list_catalogs().await;
            println!("{}", FormattedString::from(Catalogs(catalogs)));
        }
        Commands::Endpoints => {
            let endpoints = workbench.list_endpoints().await;
            println!("{}", FormattedString::from(Endpoints(endpoints)));
        }
        Commands::Schema {
            method: (service, method),
        } => match workbench.get_schema(&service, &method).await {
            Ok(schema) => println!("{}", FormattedString::from(schema)),
            Err(err) => exit_with(err),
        },
        Commands::Call {
            method: (service, method),
            body,
            headers,
            timeout,
        } => {
            let request = InvokeRequest {
                service,
                method,
                payload: body,
                headers,
                deadline: timeout,
            };

            match workbench.invoke(request).await {
                Ok(result) => println!("{}", FormattedString::from(result)),
                Err(err) => exit_with(err),
            }
        }
    }
}

/// Registers the endpoints of the config file followed by the ones given on the command line.
async fn register_all(workbench: &Workbench, config: &Config, extra: Vec<cli::EndpointArg>) {
    let endpoints = config
        .endpoints
        .iter()
        .cloned()
        .chain(extra.into_iter().map(|e| EndpointConfig {
            name: e.name,
            host: e.host,
            port: e.port,
        }));

    for endpoint in endpoints {
        match workbench
            .register(&endpoint.name, &endpoint.host, endpoint.port)
            .await
        {
            Ok(_) => {}
            // The same address listed twice, e.g. in the config and on the command line
            Err(RegisterError::DuplicateRegistration(_)) => {}
            Err(err) => exit_with(err),
        }
    }
}

fn exit_with(err: impl Into<FormattedString>) -> ! {
    eprintln!("{}", err.into());
    process::exit(1);
}
