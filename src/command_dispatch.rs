//! Purpose: Hold top-level CLI command dispatch for `ediwire`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Command output envelopes and exit code semantics stay unchanged.
//! Invariants: Helpers in `main.rs` remain the source of command business logic.

use super::*;

pub(super) fn dispatch_command(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "ediwire", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_json(json!({
                "name": "ediwire",
                "version": env!("CARGO_PKG_VERSION"),
            }));
            Ok(RunOutcome::ok())
        }
        Command::Parse { file } => {
            let content = read_input(file.as_deref())?;
            let document = ediwire::api::parse(&content);
            emit_document(&document)?;
            Ok(RunOutcome::ok())
        }
        Command::Convert {
            url,
            file,
            api_key,
            api_key_file,
        } => {
            let api_key = resolve_api_key(api_key, api_key_file.as_deref())?;
            let content = read_input(file.as_deref())?;
            let mut client = RemoteClient::new(&url)?;
            if let Some(api_key) = api_key {
                client = client.with_api_key(api_key);
            }
            let document = client.convert(&content)?;
            emit_document(&document)?;
            Ok(RunOutcome::ok())
        }
        Command::Serve { run } => {
            let config = serve_config_from_run_args(run, &EnvOverrides::from_process_env())?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start async runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))?;
            Ok(RunOutcome::ok())
        }
    }
}
