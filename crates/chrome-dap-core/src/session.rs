//! Session state owned by the adapter.
//!
//! One `Session` lives behind one mutex for the lifetime of the debug
//! session. Scripts and committed breakpoints are target-scoped (dropped on
//! navigation); pending breakpoints and the breakpoint-id registry are
//! session-scoped.

use std::collections::HashMap;

use chrome_cdp::types::{CallFrame, RemoteObject};
use dap::requests::SetBreakpointsArguments;
use tokio::sync::oneshot;

use crate::handles::{BreakpointIdRegistry, HandleRegistry};
use crate::transformers::TransformerPipeline;

/// A script reported by `Debugger.scriptParsed`.
#[derive(Debug, Clone)]
pub struct Script {
    pub script_id: String,
    pub url: String,
    pub source_map_url: Option<String>,
}

/// What the next pause should be reported as, when it was locally induced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedStop {
    Step,
    UserRequest,
}

/// The last `setBreakpoints` request for a source whose script has not been
/// parsed yet, plus the editor-facing ids already handed out for it.
#[derive(Debug, Clone)]
pub struct PendingBreakpoints {
    pub args: SetBreakpointsArguments,
    pub ids: Vec<u32>,
}

/// Scope slot addressed by `Debugger.setVariableValue`.
#[derive(Debug, Clone)]
pub struct ScopeBinding {
    pub call_frame_id: String,
    pub scope_number: i64,
}

/// What a variables-reference handle points at.
#[derive(Debug, Clone)]
pub enum VariableContainer {
    /// A remote object's property container. Scope containers additionally
    /// carry their frame binding and the frame's `this`/return value.
    Object {
        object_id: String,
        scope: Option<ScopeBinding>,
        this_obj: Option<RemoteObject>,
        return_value: Option<RemoteObject>,
    },
    /// The active exception when it has no object to expand.
    Exception(RemoteObject),
}

impl VariableContainer {
    pub fn object(object_id: impl Into<String>) -> Self {
        VariableContainer::Object {
            object_id: object_id.into(),
            scope: None,
            this_obj: None,
            return_value: None,
        }
    }
}

pub struct Session {
    pub attach_mode: bool,
    pub client_attached: bool,
    pub has_terminated: bool,
    pub in_shutdown: bool,

    /// Suppresses the next `Continued` event when a resume was locally
    /// initiated.
    pub expecting_resumed_event: bool,
    pub expecting_stop_reason: Option<ExpectedStop>,

    pub smart_step: bool,
    pub smart_step_count: u64,

    /// Completion token of the last resume-inducing request; gates the next
    /// `Stopped` emission.
    pub current_step: Option<oneshot::Receiver<()>>,

    pub scripts_by_id: HashMap<String, Script>,
    pub scripts_by_url: HashMap<String, String>,

    /// For each URL, every CDP breakpoint id currently bound on it.
    pub committed_breakpoints_by_url: HashMap<String, Vec<String>>,
    /// Keyed by client source path; at most one record per path.
    pub pending_breakpoints_by_path: HashMap<String, PendingBreakpoints>,

    /// `None` entries are dummy frames minted for call frames the runtime
    /// reported in a shape we could not parse.
    pub frame_handles: HandleRegistry<Option<CallFrame>>,
    pub variable_handles: HandleRegistry<VariableContainer>,
    pub source_handles: HandleRegistry<String>,
    pub breakpoint_ids: BreakpointIdRegistry,

    /// Empty unless paused. `None` entries are call frames the runtime
    /// reported in a shape we could not parse.
    pub current_frames: Vec<Option<CallFrame>>,
    pub exception: Option<RemoteObject>,

    pub transformers: TransformerPipeline,
}

impl Session {
    pub fn new(transformers: TransformerPipeline) -> Self {
        Self {
            attach_mode: false,
            client_attached: false,
            has_terminated: false,
            in_shutdown: false,
            expecting_resumed_event: false,
            expecting_stop_reason: None,
            smart_step: false,
            smart_step_count: 0,
            current_step: None,
            scripts_by_id: HashMap::new(),
            scripts_by_url: HashMap::new(),
            committed_breakpoints_by_url: HashMap::new(),
            pending_breakpoints_by_path: HashMap::new(),
            frame_handles: HandleRegistry::new(),
            variable_handles: HandleRegistry::new(),
            source_handles: HandleRegistry::new(),
            breakpoint_ids: BreakpointIdRegistry::new(),
            current_frames: Vec::new(),
            exception: None,
            transformers,
        }
    }

    pub fn is_paused(&self) -> bool {
        !self.current_frames.is_empty()
    }

    /// Per-pause reset: every frame, variable and source handle from the
    /// previous stop becomes invalid. Breakpoint ids survive.
    pub fn reset_pause_state(&mut self) {
        self.frame_handles.reset();
        self.variable_handles.reset();
        self.source_handles.reset();
        self.exception = None;
    }

    /// Navigation reset: the runtime discarded its global object, so every
    /// script and committed breakpoint is gone. Pending records and the
    /// breakpoint-id registry are deliberately untouched.
    pub fn clear_target_context(&mut self) {
        self.scripts_by_id.clear();
        self.scripts_by_url.clear();
        self.committed_breakpoints_by_url.clear();
        self.transformers.clear_target_context();
    }

    pub fn add_script(&mut self, script: Script) {
        self.scripts_by_url
            .insert(script.url.clone(), script.script_id.clone());
        self.scripts_by_id.insert(script.script_id.clone(), script);
    }

    pub fn script_by_url(&self, url: &str) -> Option<&Script> {
        self.scripts_by_url
            .get(url)
            .and_then(|id| self.scripts_by_id.get(id))
    }

    /// The URL the runtime knows this client path as.
    pub fn target_url_for_client_path(&self, path: &str) -> String {
        self.transformers
            .get_target_path_from_client_path(path)
            .unwrap_or_else(|| path.to_string())
    }

    /// The path the client knows this runtime URL as.
    pub fn client_path_for_target_url(&self, url: &str) -> String {
        self.transformers
            .get_client_path_from_target_path(url)
            .unwrap_or_else(|| url.to_string())
    }

    pub fn frame_by_id(&self, frame_id: u32) -> Option<&CallFrame> {
        self.frame_handles.lookup(frame_id).and_then(Option::as_ref)
    }

    /// The top call frame, when paused with a well-formed stack.
    pub fn top_frame(&self) -> Option<&CallFrame> {
        self.current_frames.first().and_then(Option::as_ref)
    }
}
