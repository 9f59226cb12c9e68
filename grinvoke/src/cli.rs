//! # CLI
//!
//! This module defines the command-line interface of `grinvoke` using `clap`.
//!
//! It is responsible for parsing user input and performing validation (e.g., ensuring headers are `key:value`).
use clap::{Parser, Subcommand};
use std::{path::PathBuf, time::Duration};

#[derive(Parser)]
#[command(name = "grinvoke", version, about = "Dynamic gRPC invocation through server reflection")]
pub struct Cli {
    /// Path to a JSON config file. Defaults to the platform config directory.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Endpoint to register, as `host:port` or `name=host:port`. Can be repeated.
    #[arg(short, long = "endpoint", global = true, value_parser = parse_endpoint)]
    pub endpoints: Vec<EndpointArg>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the unary methods of every registered endpoint
    List,

    /// List the registered endpoints
    Endpoints,

    /// Print the input and output schemas of a method
    Schema {
        /// Method (package.Service/Method)
        #[arg(value_parser = parse_method)]
        method: (String, String),
    },

    /// Invoke a unary method
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// grinvoke -e localhost:50051 call helloworld.Greeter/SayHello --body '{"name": "world"}'
    /// ```
    Call {
        /// Method (package.Service/Method)
        #[arg(value_parser = parse_method)]
        method: (String, String),

        /// JSON body of the request
        #[arg(long, default_value = "{}")]
        body: String,

        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Call deadline in milliseconds. Overrides the configured default.
        #[arg(short, long, value_parser = parse_millis)]
        timeout: Option<Duration>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointArg {
    pub name: String,
    pub host: String,
    pub port: u16,
}

fn parse_endpoint(value: &str) -> Result<EndpointArg, String> {
    let (name, address) = match value.split_once('=') {
        Some((name, address)) => (Some(name.trim()), address.trim()),
        None => (None, value.trim()),
    };

    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| format!("Invalid endpoint: '{value}'. Expected 'host:port'"))?;

    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err("Host cannot be empty".to_string());
    }

    let port = port
        .parse()
        .map_err(|_| format!("Invalid port in endpoint: '{value}'"))?;

    let name = match name {
        Some("") => return Err("Endpoint name cannot be empty".to_string()),
        Some(name) => name.to_string(),
        None => address.to_string(),
    };

    Ok(EndpointArg {
        name,
        host: host.to_string(),
        port,
    })
}

fn parse_method(value: &str) -> Result<(String, String), String> {
    let (service, method) = value.split_once('/').ok_or_else(|| {
        format!("Invalid method format: '{value}'. Expected 'package.Service/Method'",)
    })?;

    if service.trim().is_empty() || method.trim().is_empty() {
        return Err("Service and Method names cannot be empty".to_string());
    }

    Ok((service.to_string(), method.to_string()))
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| "Format must be 'key:value'".to_string())
}

fn parse_millis(value: &str) -> Result<Duration, String> {
    value
        .parse()
        .map(Duration::from_millis)
        .map_err(|_| format!("Invalid timeout: '{value}'. Expected milliseconds"))
}
