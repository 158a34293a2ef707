//! Purpose: Turn a channel/item/query triple into a dispatch URI and launch it.
//! Exports: `build_dispatch_uri`, `LaunchDispatcher`, `Launcher`, `CommandLauncher`.
//! Role: Backs `LaunchSearch` and `ActivateResult`.
//! Invariants: An item from another channel is rejected with `WrongChannel` before launching.
//! Invariants: URIs look like `<scheme>://<channel>[/<node_path>]?search=<query>`.
//! Invariants: Launcher failures surface as `ErrorKind::Launch`.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::core::error::{Error, ErrorKind};
use crate::core::item_id;
use crate::core::scope::ChannelScope;

pub const DEFAULT_SCHEME: &str = "x-channel-dispatch";
pub const DEFAULT_LAUNCHER: &str = "gio open";

pub fn build_dispatch_uri(
    scheme: &str,
    scope: &ChannelScope,
    item_id: Option<&str>,
    query: &str,
) -> Result<String, Error> {
    let item = item_id::decode(item_id)?;

    if let (Some(item), Some(channel_id)) = (&item, scope.channel_id()) {
        if item.origin_channel != channel_id {
            return Err(Error::new(ErrorKind::WrongChannel)
                .with_message("item id does not belong in this channel")
                .with_item_id(item_id.unwrap_or_default())
                .with_channel(channel_id));
        }
    }

    let host = scope.channel_id().unwrap_or_default();
    let path = item
        .map(|item| format!("/{}", item.node_path))
        .unwrap_or_default();
    let search: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    Ok(format!("{scheme}://{host}{path}?search={search}"))
}

#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch_uri(&self, uri: &str) -> Result<(), Error>;
}

/// Opens URIs by running an external program with the URI as its last argument.
#[derive(Clone, Debug)]
pub struct CommandLauncher {
    program: String,
    args: Vec<String>,
}

impl CommandLauncher {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Splits a whitespace-separated command line such as `gio open`.
    pub fn from_command_line(command_line: &str) -> Result<Self, Error> {
        let mut words = command_line.split_whitespace().map(str::to_string);
        let program = words.next().ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message("launcher command must not be empty")
                .with_hint("Use a command like `gio open` or `xdg-open`.")
        })?;
        Ok(Self::new(program, words.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl Launcher for CommandLauncher {
    async fn launch_uri(&self, uri: &str) -> Result<(), Error> {
        let status = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(uri)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|err| {
                Error::new(ErrorKind::Launch)
                    .with_message(format!("failed to run launcher `{}`", self.program))
                    .with_source(err)
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::Launch)
                .with_message(format!("launcher `{}` exited with {status}", self.program)))
        }
    }
}

pub struct LaunchDispatcher {
    scheme: String,
    launcher: Arc<dyn Launcher>,
}

impl LaunchDispatcher {
    pub fn new(scheme: impl Into<String>, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            scheme: scheme.into(),
            launcher,
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Builds the dispatch URI and hands it to the launcher. Returns the URI launched.
    pub async fn dispatch(
        &self,
        scope: &ChannelScope,
        item_id: Option<&str>,
        query: &str,
    ) -> Result<String, Error> {
        let uri = build_dispatch_uri(&self.scheme, scope, item_id, query)?;
        match self.launcher.launch_uri(&uri).await {
            Ok(()) => {
                info!(%uri, "launched");
                Ok(uri)
            }
            Err(err) => {
                warn!(%uri, error = %err, "launch failed");
                Err(err)
            }
        }
    }
}
