//! Purpose: `ediwire` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Serve configuration merges flags over explicit env overrides.
use std::io::{self, IsTerminal, Read};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{
    Args, CommandFactory, Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};

mod command_dispatch;
mod serve;

use ediwire::api::{Document, Error, ErrorKind, RemoteClient, to_exit_code};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Run `ediwire --help` for usage."));
            }
        },
    };

    command_dispatch::dispatch_command(cli.command)
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    rendered
        .lines()
        .next()
        .unwrap_or("invalid arguments")
        .trim_start_matches("error: ")
        .to_string()
}

#[derive(Parser)]
#[command(
    name = "ediwire",
    version,
    about = "Convert raw EDI X12 documents into structured JSON",
    after_help = r#"EXAMPLES
  $ ediwire parse purchase-order.x12
  $ cat purchase-order.x12 | ediwire parse
  $ ediwire serve --bind 127.0.0.1:8080 --api-key-file ./secret
  $ ediwire convert http://127.0.0.1:8080 purchase-order.x12"#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Parse X12 text from a file or stdin and print JSON",
        long_about = r#"Parse X12 text and print the structured document as JSON.

Parsing is total: schema-invalid content is converted best-effort, never rejected."#,
        after_help = r#"EXAMPLES
  $ ediwire parse purchase-order.x12
  $ cat purchase-order.x12 | ediwire parse
  $ ediwire parse order.x12 | jq '.segments[].id'"#
    )]
    Parse {
        #[arg(help = "Input file (use - or omit for stdin)", value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
    },
    #[command(
        about = "Serve the conversion endpoint over HTTP (loopback default)",
        after_help = r#"EXAMPLES
  $ ediwire serve
  $ ediwire serve --bind 127.0.0.1:9800 --api-key devkey
  $ ediwire serve --bind 0.0.0.0:8080 --allow-non-loopback --api-key-file ./secret

NOTES
  - POST raw X12 text to /convert; the response is the JSON document
  - When a key is configured, clients must send it in the X-API-Key header
  - PORT and API_SECRET environment variables apply when flags are absent
  - Loopback is the default; non-loopback binds require --allow-non-loopback and a key"#
    )]
    Serve {
        #[command(flatten)]
        run: ServeRunArgs,
    },
    #[command(
        arg_required_else_help = true,
        about = "Convert X12 text through a running server",
        after_help = r#"EXAMPLES
  $ ediwire convert http://127.0.0.1:8080 purchase-order.x12
  $ cat order.x12 | ediwire convert http://127.0.0.1:8080 --api-key-file ./secret"#
    )]
    Convert {
        #[arg(help = "Server base URL, e.g. http://127.0.0.1:8080")]
        url: String,
        #[arg(help = "Input file (use - or omit for stdin)", value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
        #[arg(
            long,
            help = "API key for the server (dev-only; prefer --api-key-file)",
            help_heading = "Auth"
        )]
        api_key: Option<String>,
        #[arg(
            long,
            value_name = "PATH",
            help = "Read the API key from a file",
            value_hint = ValueHint::FilePath,
            conflicts_with = "api_key",
            help_heading = "Auth"
        )]
        api_key_file: Option<PathBuf>,
    },
    #[command(about = "Print version info as JSON")]
    Version,
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        long_about = r#"Generate shell completion scripts.

Prints a completion script for the given shell to stdout."#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(Args)]
struct ServeRunArgs {
    #[arg(
        long,
        help = "Bind address (default: 127.0.0.1 on PORT env or 8080)",
        help_heading = "Connection"
    )]
    bind: Option<String>,
    #[arg(
        long,
        help = "API key clients must send in X-API-Key (dev-only; prefer --api-key-file)",
        help_heading = "Authentication"
    )]
    api_key: Option<String>,
    #[arg(
        long,
        value_name = "PATH",
        help = "Read the API key from a file",
        value_hint = ValueHint::FilePath,
        conflicts_with = "api_key",
        help_heading = "Authentication"
    )]
    api_key_file: Option<PathBuf>,
    #[arg(
        long,
        help = "Allow non-loopback binds (requires an API key)",
        help_heading = "Safety"
    )]
    allow_non_loopback: bool,
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_BODY_BYTES,
        help = "Max request body size in bytes",
        help_heading = "Safety"
    )]
    max_body_bytes: u64,
}

const DEFAULT_PORT: &str = "8080";
const DEFAULT_MAX_BODY_BYTES: u64 = 1024 * 1024;

/// Process environment read once at startup and passed down explicitly;
/// nothing below `main` touches `std::env` for configuration.
#[derive(Clone, Debug, Default)]
struct EnvOverrides {
    port: Option<String>,
    api_secret: Option<String>,
}

impl EnvOverrides {
    fn from_process_env() -> Self {
        Self {
            port: std::env::var("PORT").ok(),
            api_secret: std::env::var("API_SECRET").ok(),
        }
    }
}

fn serve_config_from_run_args(
    args: ServeRunArgs,
    env: &EnvOverrides,
) -> Result<serve::ServeConfig, Error> {
    let bind = args.bind.unwrap_or_else(|| {
        let port = env.port.as_deref().unwrap_or(DEFAULT_PORT);
        format!("127.0.0.1:{port}")
    });
    let bind: SocketAddr = bind.parse().map_err(|_| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid bind address")
            .with_hint("Use a host:port value like 127.0.0.1:8080.")
    })?;

    let api_key = match resolve_api_key(args.api_key, args.api_key_file.as_deref())? {
        Some(key) => Some(key),
        None => env
            .api_secret
            .clone()
            .filter(|secret| !secret.is_empty()),
    };

    Ok(serve::ServeConfig {
        bind,
        api_key,
        allow_non_loopback: args.allow_non_loopback,
        max_body_bytes: args.max_body_bytes,
    })
}

fn resolve_api_key(
    flag: Option<String>,
    file: Option<&Path>,
) -> Result<Option<String>, Error> {
    if let Some(key) = flag {
        return Ok(Some(key));
    }
    let Some(path) = file else {
        return Ok(None);
    };
    let content = std::fs::read_to_string(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read API key file")
            .with_path(path)
            .with_source(err)
    })?;
    let key = content.trim();
    if key.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("API key file is empty")
            .with_path(path));
    }
    Ok(Some(key.to_string()))
}

fn read_input(file: Option<&Path>) -> Result<String, Error> {
    let bytes = match file {
        Some(path) if path.as_os_str() != "-" => std::fs::read(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read input file")
                .with_path(path)
                .with_source(err)
        })?,
        _ => {
            let mut bytes = Vec::new();
            io::stdin().read_to_end(&mut bytes).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to read stdin")
                    .with_source(err)
            })?;
            bytes
        }
    };
    // Lossy decode: conversion is total, encoding negotiation is a non-goal.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn emit_document(document: &Document) -> Result<(), Error> {
    let rendered = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(document)
    } else {
        serde_json::to_string(document)
    }
    .map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode document")
            .with_source(err)
    })?;
    println!("{rendered}");
    Ok(())
}

fn emit_json(value: Value) {
    println!("{value}");
}

fn emit_error(err: &Error) {
    let mut body = Map::new();
    body.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    body.insert(
        "message".to_string(),
        json!(err.message().unwrap_or("error")),
    );
    if let Some(hint) = err.hint() {
        body.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        body.insert("path".to_string(), json!(path.display().to_string()));
    }
    let mut envelope = Map::new();
    envelope.insert("error".to_string(), Value::Object(body));
    eprintln!("{}", Value::Object(envelope));
}
