use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    InvalidItemId,
    InvalidNodePath,
    WrongChannel,
    Upstream,
    Canceled,
    Launch,
    UnknownObject,
    UnknownMethod,
    InvalidArgs,
    Io,
}

/// Error carried through every call path.
///
/// Cloning is cheap: the optional source is shared behind an `Arc`, so a
/// multiplexer can hand each subscriber its own copy of one upstream failure.
#[derive(Clone, Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    item_id: Option<String>,
    channel_id: Option<String>,
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            item_id: None,
            channel_id: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.channel_id.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_item_id(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(item_id) = &self.item_id {
            write!(f, " (item: {item_id})")?;
        }
        if let Some(channel_id) = &self.channel_id {
            write!(f, " (channel: {channel_id})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::InvalidItemId => 3,
        ErrorKind::InvalidNodePath => 4,
        ErrorKind::WrongChannel => 5,
        ErrorKind::Upstream => 6,
        ErrorKind::Canceled => 7,
        ErrorKind::Launch => 8,
        ErrorKind::UnknownObject => 9,
        ErrorKind::UnknownMethod => 10,
        ErrorKind::InvalidArgs => 11,
        ErrorKind::Io => 12,
    }
}

/// Dotted error name reported to bus callers.
pub fn bus_error_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Internal => "org.channelsearch.Error.Internal",
        ErrorKind::Usage => "org.channelsearch.Error.Usage",
        ErrorKind::InvalidItemId => "org.channelsearch.Error.InvalidItemId",
        ErrorKind::InvalidNodePath => "org.channelsearch.Error.InvalidNodePath",
        ErrorKind::WrongChannel => "org.channelsearch.Error.WrongChannel",
        ErrorKind::Upstream => "org.channelsearch.Error.Upstream",
        ErrorKind::Canceled => "org.channelsearch.Error.Canceled",
        ErrorKind::Launch => "org.channelsearch.Error.Launch",
        ErrorKind::UnknownObject => "org.freedesktop.DBus.Error.UnknownObject",
        ErrorKind::UnknownMethod => "org.freedesktop.DBus.Error.UnknownMethod",
        ErrorKind::InvalidArgs => "org.freedesktop.DBus.Error.InvalidArgs",
        ErrorKind::Io => "org.channelsearch.Error.Io",
    }
}
