//! chrome-dap core
//!
//! Bridges the editor-facing Debug Adapter Protocol to the browser-facing
//! Chrome DevTools Protocol: session state machine, breakpoint
//! reconciliation, handle lending, variable inspection, step coordination
//! and the path/source-map/line-column transformer pipeline.

pub mod adapter;
pub mod breakpoints;
pub mod console;
pub mod error;
pub mod handles;
pub mod session;
pub mod step;
pub mod transformers;
pub mod variables;

pub use adapter::{ChromeDebugAdapter, HandledRequest, THREAD_ID};
pub use error::{Error, Result};
