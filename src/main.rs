//! Purpose: `channel-search` CLI entry point.
//! Role: Binary crate root; parses args, runs commands, reports errors.
//! Invariants: Errors go to stderr as text on a TTY and JSON otherwise.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::error::Error as StdError;
use std::ffi::OsString;
use std::io::{self, IsTerminal};

use clap::{Args, Parser, Subcommand, ValueEnum, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};

mod command_dispatch;

use channel_search::api::{
    DEFAULT_BASE_PATH, DEFAULT_BIND, DEFAULT_LAUNCHER, DEFAULT_MAX_BODY_BYTES, DEFAULT_SCHEME,
    Error, ErrorKind, to_exit_code,
};

const DEFAULT_INACTIVITY_TIMEOUT_MS: u64 = 20_000;

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
    let exit_code = match run(std::env::args_os()) {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run<I>(args: I) -> Result<RunOutcome, (Error, ColorMode)>
where
    I: IntoIterator<Item = OsString>,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
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
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Try `channel-search --help`."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    command_dispatch::dispatch_command(cli.command).map_err(|err| (err, color_mode))
}

#[derive(Parser)]
#[command(
    name = "channel-search",
    version,
    about = "Channel-scoped search provider for desktop shell search",
    long_about = r#"Serve desktop shell search requests against a content catalog.

One provider object lives at the base path and answers for every channel;
calls on `<base>/channel_<id>` only see results from that channel."#,
    after_help = r#"EXAMPLES
  $ channel-search serve --catalog-url http://127.0.0.1:8080
  $ channel-search dispatch-uri --channel sci --item video/42?sci newton
  $ channel-search version"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Run the search provider until signaled or idle")]
    Serve(ServeArgs),
    #[command(
        about = "Print the URI that activating a result would launch",
        after_help = r#"EXAMPLES
  $ channel-search dispatch-uri --channel sci newton
  $ channel-search dispatch-uri --channel sci --item video/42?sci isaac newton"#
    )]
    DispatchUri(DispatchUriArgs),
    #[command(about = "Print version information")]
    Version,
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, default_value = DEFAULT_BIND, help = "Bind address", help_heading = "Connection")]
    bind: String,
    #[arg(
        long,
        value_name = "URL",
        help = "Content catalog base URL",
        help_heading = "Catalog"
    )]
    catalog_url: String,
    #[arg(
        long,
        value_name = "TOKEN",
        help = "Bearer token sent to the catalog",
        help_heading = "Catalog"
    )]
    catalog_token: Option<String>,
    #[arg(
        long,
        default_value = DEFAULT_BASE_PATH,
        help = "Object path of the global provider",
        help_heading = "Provider"
    )]
    base_path: String,
    #[arg(
        long,
        default_value = DEFAULT_SCHEME,
        help = "URI scheme used for launch dispatch",
        help_heading = "Provider"
    )]
    scheme: String,
    #[arg(
        long,
        default_value = DEFAULT_LAUNCHER,
        help = "Command that opens dispatch URIs",
        help_heading = "Provider"
    )]
    launcher: String,
    #[arg(
        long,
        default_value_t = DEFAULT_INACTIVITY_TIMEOUT_MS,
        help = "Exit after this many milliseconds without calls",
        help_heading = "Provider"
    )]
    inactivity_timeout_ms: u64,
    #[arg(
        long,
        help = "Allow non-loopback binds",
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

#[derive(Args)]
struct DispatchUriArgs {
    #[arg(long, value_name = "ID", help = "Channel scope (omit for global)")]
    channel: Option<String>,
    #[arg(long, value_name = "ITEM_ID", help = "Item id to activate")]
    item: Option<String>,
    #[arg(long, default_value = DEFAULT_SCHEME, help = "URI scheme")]
    scheme: String,
    #[arg(value_name = "TERMS", help = "Search terms")]
    terms: Vec<String>,
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_version_output() {
    if io::stdout().is_terminal() {
        println!("channel-search {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(json!({
            "name": "channel-search",
            "version": env!("CARGO_PKG_VERSION"),
        }));
    }
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\x1b[1;{code}m{label}\x1b[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error",
        ErrorKind::Usage => "usage error",
        ErrorKind::InvalidItemId => "invalid item id",
        ErrorKind::InvalidNodePath => "invalid node path",
        ErrorKind::WrongChannel => "item does not belong in this channel",
        ErrorKind::Upstream => "catalog request failed",
        ErrorKind::Canceled => "request canceled",
        ErrorKind::Launch => "launch failed",
        ErrorKind::UnknownObject => "unknown object",
        ErrorKind::UnknownMethod => "unknown method",
        ErrorKind::InvalidArgs => "invalid arguments",
        ErrorKind::Io => "i/o error",
    }
    .to_string()
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(item_id) = err.item_id() {
        inner.insert("item_id".to_string(), json!(item_id));
    }
    if let Some(channel_id) = err.channel_id() {
        inner.insert("channel_id".to_string(), json!(channel_id));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    )];
    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(item_id) = err.item_id() {
        lines.push(format!(
            "{} {item_id}",
            colorize_label("item:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(channel_id) = err.channel_id() {
        lines.push(format!(
            "{} {channel_id}",
            colorize_label("channel:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
