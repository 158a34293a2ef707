//! Purpose: Hold top-level CLI command dispatch for `channel-search`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: `serve` runs on a single-threaded runtime.

use std::net::SocketAddr;

use channel_search::api::{ChannelScope, ServeConfig, build_dispatch_uri, normalize_query, serve};

use super::*;

pub(super) fn dispatch_command(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Version => {
            emit_version_output();
            Ok(RunOutcome::ok())
        }
        Command::DispatchUri(args) => {
            let scope = args
                .channel
                .map(ChannelScope::Channel)
                .unwrap_or(ChannelScope::Global);
            let uri = build_dispatch_uri(
                &args.scheme,
                &scope,
                args.item.as_deref(),
                &normalize_query(&args.terms),
            )?;
            if io::stdout().is_terminal() {
                println!("{uri}");
            } else {
                emit_json(json!({ "uri": uri }));
            }
            Ok(RunOutcome::ok())
        }
        Command::Serve(args) => {
            let config = serve_config_from_args(args)?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve(config))?;
            Ok(RunOutcome::ok())
        }
    }
}

fn serve_config_from_args(args: ServeArgs) -> Result<ServeConfig, Error> {
    let bind: SocketAddr = args.bind.parse().map_err(|_| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid bind address")
            .with_hint("Use a host:port value like 127.0.0.1:9710.")
    })?;
    Ok(ServeConfig {
        bind,
        catalog_url: args.catalog_url,
        catalog_token: args.catalog_token,
        base_path: args.base_path,
        scheme: args.scheme,
        launcher: args.launcher,
        inactivity_timeout_ms: args.inactivity_timeout_ms,
        allow_non_loopback: args.allow_non_loopback,
        max_body_bytes: args.max_body_bytes,
    })
}
