//! Purpose: Route bus-style method calls to the search provider.
//! Exports: `BusDispatcher`, `BusCall`, `BusReply`, `BusError`, interface names.
//! Role: Transport-agnostic core used by the HTTP call endpoint.
//! Invariants: The object path alone selects the channel scope.
//! Invariants: Unknown paths map to `UnknownObject`, unknown methods to `UnknownMethod`.
//! Invariants: `Introspect` answers on any path; unresolved paths export nothing.
//! Invariants: Arguments are positional and type-checked; mismatches map to `InvalidArgs`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::core::error::{Error, ErrorKind, bus_error_name};
use crate::core::scope::ChannelScope;
use crate::provider::SearchProvider;
use crate::router::ObjectRouter;

pub const SEARCH_PROVIDER_INTERFACE: &str = "org.gnome.Shell.SearchProvider2";
pub const INTROSPECTABLE_INTERFACE: &str = "org.freedesktop.DBus.Introspectable";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusCall {
    pub path: String,
    pub interface: String,
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl BusCall {
    pub fn new(
        path: impl Into<String>,
        interface: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            path: path.into(),
            interface: interface.into(),
            method: method.into(),
            args,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusError {
    pub name: String,
    pub message: String,
}

impl From<&Error> for BusError {
    fn from(err: &Error) -> Self {
        Self {
            name: bus_error_name(err.kind()).to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BusError>,
}

impl BusReply {
    fn success(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    fn failure(err: &Error) -> Self {
        Self {
            result: None,
            error: Some(BusError::from(err)),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

pub struct BusDispatcher {
    router: ObjectRouter,
    provider: SearchProvider,
}

impl BusDispatcher {
    pub fn new(router: ObjectRouter, provider: SearchProvider) -> Self {
        Self { router, provider }
    }

    pub fn router(&self) -> &ObjectRouter {
        &self.router
    }

    pub fn provider(&self) -> &SearchProvider {
        &self.provider
    }

    pub async fn dispatch_value(&self, value: Value) -> BusReply {
        match serde_json::from_value::<BusCall>(value) {
            Ok(call) => self.dispatch(call).await,
            Err(err) => BusReply::failure(
                &Error::new(ErrorKind::InvalidArgs)
                    .with_message("malformed call envelope")
                    .with_source(err),
            ),
        }
    }

    pub async fn dispatch(&self, call: BusCall) -> BusReply {
        match self.route(&call).await {
            Ok(result) => BusReply::success(result),
            Err(err) => {
                debug!(path = %call.path, method = %call.method, error = %err, "call failed");
                BusReply::failure(&err)
            }
        }
    }

    async fn route(&self, call: &BusCall) -> Result<Value, Error> {
        if call.interface == INTROSPECTABLE_INTERFACE && call.method == "Introspect" {
            expect_arity(call, 0)?;
            return Ok(json!({
                "interfaces": self.router.introspect(&call.path, SEARCH_PROVIDER_INTERFACE),
                "children": self.router.enumerate(&call.path),
            }));
        }

        let scope = self.router.resolve(&call.path).ok_or_else(|| {
            Error::new(ErrorKind::UnknownObject)
                .with_message(format!("no object at path {}", call.path))
        })?;

        match call.interface.as_str() {
            SEARCH_PROVIDER_INTERFACE => self.route_search(&call.method, scope, call).await,
            _ => Err(unknown_method(call)),
        }
    }

    async fn route_search(
        &self,
        method: &str,
        scope: ChannelScope,
        call: &BusCall,
    ) -> Result<Value, Error> {
        let args = call.args.as_slice();
        match method {
            "GetInitialResultSet" => {
                expect_arity(call, 1)?;
                let terms = string_array(&args[0], "terms")?;
                let ids = self.provider.get_initial_result_set(scope, &terms).await?;
                Ok(json!(ids))
            }
            "GetSubsearchResultSet" => {
                expect_arity(call, 2)?;
                let previous = string_array(&args[0], "previous_results")?;
                let terms = string_array(&args[1], "terms")?;
                let ids = self
                    .provider
                    .get_subsearch_result_set(scope, &previous, &terms)
                    .await?;
                Ok(json!(ids))
            }
            "GetResultMetas" => {
                expect_arity(call, 1)?;
                let item_ids = string_array(&args[0], "item_ids")?;
                let metas = self.provider.get_result_metas(&item_ids).await?;
                serde_json::to_value(metas).map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to encode result metas")
                        .with_source(err)
                })
            }
            "LaunchSearch" => {
                expect_arity(call, 2)?;
                let terms = string_array(&args[0], "terms")?;
                let timestamp = uint32(&args[1], "timestamp")?;
                self.provider.launch_search(scope, &terms, timestamp).await?;
                Ok(Value::Null)
            }
            "ActivateResult" => {
                expect_arity(call, 3)?;
                let item_id = string(&args[0], "item_id")?;
                let terms = string_array(&args[1], "terms")?;
                let timestamp = uint32(&args[2], "timestamp")?;
                self.provider
                    .activate_result(scope, item_id, &terms, timestamp)
                    .await?;
                Ok(Value::Null)
            }
            _ => Err(unknown_method(call)),
        }
    }
}

fn unknown_method(call: &BusCall) -> Error {
    Error::new(ErrorKind::UnknownMethod).with_message(format!(
        "no method {} on interface {}",
        call.method, call.interface
    ))
}

fn expect_arity(call: &BusCall, expected: usize) -> Result<(), Error> {
    if call.args.len() == expected {
        return Ok(());
    }
    Err(Error::new(ErrorKind::InvalidArgs).with_message(format!(
        "{} expects {expected} argument(s), got {}",
        call.method,
        call.args.len()
    )))
}

fn invalid_arg(name: &str, expected: &str) -> Error {
    Error::new(ErrorKind::InvalidArgs).with_message(format!("`{name}` must be {expected}"))
}

fn string<'a>(value: &'a Value, name: &str) -> Result<&'a str, Error> {
    value.as_str().ok_or_else(|| invalid_arg(name, "a string"))
}

fn string_array(value: &Value, name: &str) -> Result<Vec<String>, Error> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid_arg(name, "an array of strings"))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid_arg(name, "an array of strings"))
        })
        .collect()
}

fn uint32(value: &Value, name: &str) -> Result<u32, Error> {
    value
        .as_u64()
        .and_then(|number| u32::try_from(number).ok())
        .ok_or_else(|| invalid_arg(name, "an unsigned 32-bit integer"))
}
