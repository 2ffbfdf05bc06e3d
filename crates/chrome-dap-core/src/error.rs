//! Adapter errors
//!
//! Per-breakpoint and per-variable failures never surface here; they become
//! unverified breakpoints or error-valued variables. These variants are the
//! request-level rejections.

use chrome_cdp::RpcError;
use thiserror::Error;

/// Adapter result type
pub type Result<T> = std::result::Result<T, Error>;

/// Adapter errors
#[derive(Debug, Error)]
pub enum Error {
    #[error("the debug adapter only supports native paths")]
    PathFormat,

    #[error("attach requires a port")]
    PortRequired,

    #[error("stack frame not valid")]
    StackFrameNotValid,

    #[error("stack frame for completions not valid")]
    CompletionsStackFrameNotValid,

    #[error("source request has illegal handle")]
    IllegalSourceHandle,

    #[error("setting value not supported for this container")]
    SetValueNotSupported,

    #[error("error from evaluate: {0}")]
    Evaluate(String),

    #[error("request timed out")]
    Timeout,

    #[error("not implemented")]
    NotImplemented,

    #[error("no connection to the target")]
    NotConnected,

    #[error(transparent)]
    Rpc(#[from] RpcError),
}
