//! The RPC surface the adapter talks through.
//!
//! `RpcClient` is the transport abstraction: typed request/response plus an
//! event stream handed out at connect time. `Cdp` wraps a client with one
//! method per protocol command so callers never touch raw JSON.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::types::*;

/// CDP client errors.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("target returned error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("connection closed")]
    Closed,

    #[error("unexpected response shape: {0}")]
    Shape(#[from] serde_json::Error),
}

/// A notification pushed by the target.
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
}

/// Transport-level request/response. Implementations route responses back by
/// command id and deliver notifications through the receiver returned from
/// the connector.
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError>;

    /// Tear the connection down. Default is a no-op for transports that close
    /// when dropped.
    async fn close(&self) {}
}

/// An established connection: the typed client plus the notification stream.
pub struct CdpConnection {
    pub cdp: Cdp,
    pub events: mpsc::UnboundedReceiver<CdpEvent>,
}

/// Opens CDP connections. The adapter calls this from `attach`/`launch`.
#[async_trait]
pub trait CdpConnector: Send + Sync {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        target_url: Option<&str>,
    ) -> Result<CdpConnection, RpcError>;
}

/// Typed command wrappers over an [`RpcClient`].
#[derive(Clone)]
pub struct Cdp {
    inner: Arc<dyn RpcClient>,
}

impl Cdp {
    pub fn new(inner: Arc<dyn RpcClient>) -> Self {
        Self { inner }
    }

    pub async fn close(&self) {
        self.inner.close().await;
    }

    async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, RpcError> {
        let raw = self.inner.call(method, serde_json::to_value(params)?).await?;
        Ok(serde_json::from_value(raw)?)
    }

    async fn call_void<P: Serialize>(&self, method: &str, params: P) -> Result<(), RpcError> {
        self.inner.call(method, serde_json::to_value(params)?).await?;
        Ok(())
    }

    pub async fn enable_debugger(&self) -> Result<(), RpcError> {
        self.call_void("Debugger.enable", Value::Object(Default::default())).await
    }

    pub async fn enable_runtime(&self) -> Result<(), RpcError> {
        self.call_void("Runtime.enable", Value::Object(Default::default())).await
    }

    pub async fn set_breakpoint_by_url(
        &self,
        params: SetBreakpointByUrlParams,
    ) -> Result<SetBreakpointByUrlResult, RpcError> {
        self.call("Debugger.setBreakpointByUrl", params).await
    }

    pub async fn set_breakpoint(
        &self,
        params: SetBreakpointParams,
    ) -> Result<SetBreakpointResult, RpcError> {
        self.call("Debugger.setBreakpoint", params).await
    }

    pub async fn remove_breakpoint(&self, breakpoint_id: &str) -> Result<(), RpcError> {
        self.call_void(
            "Debugger.removeBreakpoint",
            RemoveBreakpointParams {
                breakpoint_id: breakpoint_id.to_string(),
            },
        )
        .await
    }

    pub async fn set_pause_on_exceptions(&self, state: &str) -> Result<(), RpcError> {
        self.call_void(
            "Debugger.setPauseOnExceptions",
            SetPauseOnExceptionsParams {
                state: state.to_string(),
            },
        )
        .await
    }

    pub async fn resume(&self) -> Result<(), RpcError> {
        self.call_void("Debugger.resume", Value::Object(Default::default())).await
    }

    pub async fn step_over(&self) -> Result<(), RpcError> {
        self.call_void("Debugger.stepOver", Value::Object(Default::default())).await
    }

    pub async fn step_into(&self) -> Result<(), RpcError> {
        self.call_void("Debugger.stepInto", Value::Object(Default::default())).await
    }

    pub async fn step_out(&self) -> Result<(), RpcError> {
        self.call_void("Debugger.stepOut", Value::Object(Default::default())).await
    }

    pub async fn pause(&self) -> Result<(), RpcError> {
        self.call_void("Debugger.pause", Value::Object(Default::default())).await
    }

    pub async fn get_script_source(&self, script_id: &str) -> Result<String, RpcError> {
        let result: GetScriptSourceResult = self
            .call(
                "Debugger.getScriptSource",
                GetScriptSourceParams {
                    script_id: script_id.to_string(),
                },
            )
            .await?;
        Ok(result.script_source)
    }

    pub async fn evaluate_on_call_frame(
        &self,
        params: EvaluateOnCallFrameParams,
    ) -> Result<EvaluateResult, RpcError> {
        self.call("Debugger.evaluateOnCallFrame", params).await
    }

    pub async fn evaluate(&self, params: EvaluateParams) -> Result<EvaluateResult, RpcError> {
        self.call("Runtime.evaluate", params).await
    }

    pub async fn get_properties(
        &self,
        params: GetPropertiesParams,
    ) -> Result<GetPropertiesResult, RpcError> {
        self.call("Runtime.getProperties", params).await
    }

    pub async fn call_function_on(
        &self,
        params: CallFunctionOnParams,
    ) -> Result<CallFunctionOnResult, RpcError> {
        self.call("Runtime.callFunctionOn", params).await
    }

    pub async fn set_variable_value(
        &self,
        params: SetVariableValueParams,
    ) -> Result<(), RpcError> {
        self.call_void("Debugger.setVariableValue", params).await
    }

    pub async fn configure_overlay(&self, message: Option<String>) -> Result<(), RpcError> {
        self.call_void("Page.configureOverlay", ConfigureOverlayParams { message })
            .await
    }
}
