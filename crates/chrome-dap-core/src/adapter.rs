//! The session state machine.
//!
//! One adapter mediates between the editor's DAP requests and the target's
//! CDP notifications. Requests arrive through [`ChromeDebugAdapter::handle_request`];
//! CDP notifications through [`ChromeDebugAdapter::dispatch_cdp_event`]. DAP
//! events leave through the channel given at construction, exactly one
//! virtual thread is ever reported, and `Stopped` is held back until the
//! response to the request that induced the pause has been written.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrome_cdp::types::{
    BreakpointResolvedEvent, CallFrame, ConsoleApiCalledEvent, PausedEvent, RemoteObject,
    ScriptParsedEvent,
};
use chrome_cdp::{Cdp, CdpConnector, CdpEvent};
use dap::events::{
    BreakpointEventBody, ContinuedEventBody, Event, OutputEventBody, StoppedEventBody,
};
use dap::prelude::*;
use dap::requests::{
    AttachRequestArguments, CompletionsArguments, EvaluateArguments, InitializeArguments,
    LaunchRequestArguments, PathFormat, ScopesArguments, SetBreakpointsArguments,
    SetExceptionBreakpointsArguments, SetVariableArguments, SourceArguments, StackTraceArguments,
    VariablesArguments,
};
use dap::responses::{
    CompletionsResponse, ContinueResponse, EvaluateResponse, ScopesResponse,
    SetExceptionBreakpointsResponse, SetVariableResponse, SourceResponse, StackTraceResponse,
    ThreadsResponse, VariablesResponse,
};
use dap::types::{
    Breakpoint, Capabilities, ExceptionBreakpointsFilter, Message, Source, StackFrame,
    StoppedEventReason, Thread,
};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, warn};

use crate::breakpoints::{BreakpointEngine, PLACEHOLDER_SCHEME};
use crate::console::{format_console_call, OutputChannel};
use crate::error::{Error, Result};
use crate::session::{ExpectedStop, Script, Session};
use crate::step::{StepController, StepKind};
use crate::transformers::{fix_drive_letter_and_slashes, Transformer, TransformerPipeline};
use crate::variables::VariableEngine;

/// The single virtual thread exposed to the editor.
pub const THREAD_ID: i64 = 1;

const THREAD_NAME: &str = "Thread 1";

const PAUSE_OVERLAY_MESSAGE: &str = "Paused in Visual Studio Code";

/// How long a pending step response may delay the `Stopped` event.
const STOPPED_AFTER_RESPONSE_TIMEOUT: Duration = Duration::from_millis(300);

/// Overlay updates are debounced so rapid pause/resume does not flicker.
const OVERLAY_DEBOUNCE: Duration = Duration::from_millis(200);

const DEFAULT_PORT: u16 = 9222;
const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// A handled request plus, for resume-inducing commands, the token the
/// server fires once the response bytes are flushed.
pub struct HandledRequest {
    pub response: Response,
    pub ack: Option<oneshot::Sender<()>>,
}

enum StopNotification {
    Breakpoint,
    Exception,
    Step,
    Pause,
    Debugger,
}

pub struct ChromeDebugAdapter {
    state: Arc<Mutex<Session>>,
    connection: Mutex<Option<Cdp>>,
    connector: Arc<dyn CdpConnector>,
    event_tx: mpsc::Sender<Event>,
    breakpoints: BreakpointEngine,
    variables: VariableEngine,
    stepper: StepController,
    overlay_generation: Arc<AtomicU64>,
}

impl ChromeDebugAdapter {
    pub fn new(
        connector: Arc<dyn CdpConnector>,
        event_tx: mpsc::Sender<Event>,
        source_map: Box<dyn Transformer>,
        path: Box<dyn Transformer>,
    ) -> Arc<Self> {
        let state = Arc::new(Mutex::new(Session::new(TransformerPipeline::new(
            source_map, path,
        ))));
        Arc::new(Self {
            breakpoints: BreakpointEngine::new(Arc::clone(&state)),
            variables: VariableEngine::new(Arc::clone(&state)),
            stepper: StepController::new(Arc::clone(&state)),
            state,
            connection: Mutex::new(None),
            connector,
            event_tx,
            overlay_generation: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Shared session state, exposed for the server wiring and tests.
    pub fn state(&self) -> &Arc<Mutex<Session>> {
        &self.state
    }

    async fn send_event(&self, event: Event) {
        if let Err(e) = self.event_tx.send(event).await {
            debug!(error = %e, "DAP event receiver gone");
        }
    }

    async fn cdp(&self) -> Result<Cdp> {
        self.connection.lock().await.clone().ok_or(Error::NotConnected)
    }

    pub async fn handle_request(self: &Arc<Self>, request: Request) -> HandledRequest {
        info!(command = ?request.command, seq = request.seq, "handling request");
        let seq = request.seq;
        let mut ack = None;

        let result: Result<ResponseBody> = match &request.command {
            Command::Initialize(args) => self.initialize(args).await,
            Command::Launch(args) => self.launch(args).await,
            Command::Attach(args) => self.attach(args).await,
            Command::Disconnect(_) => self.disconnect().await,
            Command::ConfigurationDone => Ok(ResponseBody::ConfigurationDone),
            Command::SetBreakpoints(args) => self.set_breakpoints(args, seq).await,
            Command::SetExceptionBreakpoints(args) => self.set_exception_breakpoints(args).await,
            Command::Continue(_) => self
                .issue_step(StepKind::Continue, &mut ack)
                .await
                .map(|_| {
                    ResponseBody::Continue(ContinueResponse {
                        all_threads_continued: Some(true),
                    })
                }),
            Command::Next(_) => self
                .issue_step(StepKind::Next, &mut ack)
                .await
                .map(|_| ResponseBody::Next),
            Command::StepIn(_) => self
                .issue_step(StepKind::StepIn, &mut ack)
                .await
                .map(|_| ResponseBody::StepIn),
            Command::StepOut(_) => self
                .issue_step(StepKind::StepOut, &mut ack)
                .await
                .map(|_| ResponseBody::StepOut),
            Command::Pause(_) => self
                .issue_step(StepKind::Pause, &mut ack)
                .await
                .map(|_| ResponseBody::Pause),
            Command::StackTrace(args) => self.stack_trace(args).await,
            Command::Scopes(args) => self.scopes(args).await,
            Command::Variables(args) => self.variables(args).await,
            Command::SetVariable(args) => self.set_variable(args).await,
            Command::Source(args) => self.source(args).await,
            Command::Threads => Ok(ResponseBody::Threads(ThreadsResponse {
                threads: vec![Thread {
                    id: THREAD_ID,
                    name: THREAD_NAME.to_string(),
                }],
            })),
            Command::Evaluate(args) => self.evaluate(args).await,
            Command::Completions(args) => self.completions(args).await,
            _ => Err(Error::NotImplemented),
        };

        match result {
            Ok(body) => HandledRequest {
                response: Response {
                    request_seq: seq,
                    success: true,
                    message: None,
                    body: Some(body),
                    error: None,
                },
                ack,
            },
            Err(e) => {
                warn!(seq, error = %e, "request failed");
                HandledRequest {
                    response: self.make_error_response(seq, e.to_string()),
                    ack: None,
                }
            }
        }
    }

    fn make_error_response(&self, request_seq: i64, message: String) -> Response {
        Response {
            request_seq,
            success: false,
            message: Some(dap::responses::ResponseMessage::Error(message.clone())),
            body: None,
            error: Some(Message {
                id: 0,
                format: message,
                variables: HashMap::new(),
                send_telemetry: None,
                show_user: None,
                url: None,
                url_label: None,
            }),
        }
    }

    async fn initialize(&self, args: &InitializeArguments) -> Result<ResponseBody> {
        if matches!(args.path_format, Some(PathFormat::Uri)) {
            return Err(Error::PathFormat);
        }

        {
            let mut session = self.state.lock().await;
            session.transformers.line_col.configure(
                args.lines_start_at1.unwrap_or(true),
                args.columns_start_at1.unwrap_or(true),
            );
            session.client_attached = true;
        }

        Ok(ResponseBody::Initialize(Capabilities {
            supports_configuration_done_request: Some(true),
            supports_set_variable: Some(true),
            supports_conditional_breakpoints: Some(true),
            supports_completions_request: Some(true),
            exception_breakpoint_filters: Some(vec![
                ExceptionBreakpointsFilter {
                    filter: "all".to_string(),
                    label: "All Exceptions".to_string(),
                    description: None,
                    default: Some(false),
                    supports_condition: None,
                    condition_description: None,
                },
                ExceptionBreakpointsFilter {
                    filter: "uncaught".to_string(),
                    label: "Uncaught Exceptions".to_string(),
                    description: None,
                    default: Some(true),
                    supports_condition: None,
                    condition_description: None,
                },
            ]),
            ..Default::default()
        }))
    }

    async fn launch(self: &Arc<Self>, args: &LaunchRequestArguments) -> Result<ResponseBody> {
        let extra = args.additional_data.clone().unwrap_or(Value::Null);
        {
            let mut session = self.state.lock().await;
            session.attach_mode = false;
            session.smart_step = extra["smartStep"].as_bool().unwrap_or(false);
            session.transformers.launch(&extra);
        }

        // Launching the browser itself belongs to the host; we attach to the
        // port it exposes, defaulting to the conventional one.
        let port = extra["port"].as_u64().map(|p| p as u16).unwrap_or(DEFAULT_PORT);
        self.connect(&extra, port).await?;
        Ok(ResponseBody::Launch)
    }

    async fn attach(self: &Arc<Self>, args: &AttachRequestArguments) -> Result<ResponseBody> {
        let extra = args.additional_data.clone().unwrap_or(Value::Null);
        {
            let mut session = self.state.lock().await;
            session.attach_mode = true;
            session.smart_step = extra["smartStep"].as_bool().unwrap_or(false);
            session.transformers.attach(&extra);
        }

        let port = extra["port"]
            .as_u64()
            .map(|p| p as u16)
            .ok_or(Error::PortRequired)?;
        self.connect(&extra, port).await?;
        Ok(ResponseBody::Attach)
    }

    async fn connect(self: &Arc<Self>, extra: &Value, port: u16) -> Result<()> {
        let address = extra["address"].as_str().unwrap_or(DEFAULT_ADDRESS);
        let target_url = extra["targetUrl"].as_str();

        info!(address, port, ?target_url, "attaching to target");
        let connection = self.connector.connect(address, port, target_url).await?;
        {
            *self.connection.lock().await = Some(connection.cdp.clone());
        }

        let pump = Arc::clone(self);
        tokio::spawn(async move { pump.pump_events(connection.events).await });

        connection.cdp.enable_debugger().await?;
        connection.cdp.enable_runtime().await?;

        self.send_event(Event::Initialized).await;
        Ok(())
    }

    async fn disconnect(&self) -> Result<ResponseBody> {
        {
            let mut session = self.state.lock().await;
            session.in_shutdown = true;
        }
        self.set_overlay(None).await;
        self.terminate_session("client requested disconnect").await;
        Ok(ResponseBody::Disconnect)
    }

    async fn set_breakpoints(
        &self,
        args: &SetBreakpointsArguments,
        request_seq: i64,
    ) -> Result<ResponseBody> {
        let cdp = self.cdp().await?;
        let response = self
            .breakpoints
            .set_breakpoints(&cdp, args.clone(), request_seq)
            .await?;
        Ok(ResponseBody::SetBreakpoints(response))
    }

    async fn set_exception_breakpoints(
        &self,
        args: &SetExceptionBreakpointsArguments,
    ) -> Result<ResponseBody> {
        let state = if args.filters.iter().any(|f| f == "all") {
            "all"
        } else if args.filters.iter().any(|f| f == "uncaught") {
            "uncaught"
        } else {
            "none"
        };
        let cdp = self.cdp().await?;
        cdp.set_pause_on_exceptions(state).await?;
        Ok(ResponseBody::SetExceptionBreakpoints(
            SetExceptionBreakpointsResponse { breakpoints: None },
        ))
    }

    async fn issue_step(
        &self,
        kind: StepKind,
        ack: &mut Option<oneshot::Sender<()>>,
    ) -> Result<()> {
        let cdp = self.cdp().await?;
        let token = self.stepper.run(&cdp, kind).await?;
        *ack = Some(token);
        Ok(())
    }

    async fn stack_trace(&self, args: &StackTraceArguments) -> Result<ResponseBody> {
        let mut session = self.state.lock().await;
        let frames = session.current_frames.clone();

        let mut stack_frames = Vec::with_capacity(frames.len());
        for maybe_frame in &frames {
            match maybe_frame {
                Some(frame) => {
                    let stack_frame = Self::call_frame_to_stack_frame(&mut session, frame);
                    stack_frames.push(stack_frame);
                }
                None => {
                    // Nonsense call frame from a non-standard runtime: lend a
                    // dummy frame; scopes on it will fail.
                    let handle = session.frame_handles.create(None);
                    stack_frames.push(StackFrame {
                        id: handle as i64,
                        name: "(unknown)".to_string(),
                        line: 0,
                        column: 0,
                        ..Default::default()
                    });
                }
            }
        }

        let total = stack_frames.len() as i64;
        let start = args.start_frame.unwrap_or(0).max(0) as usize;
        let mut sliced: Vec<StackFrame> = stack_frames.into_iter().skip(start).collect();
        if let Some(levels) = args.levels.filter(|l| *l > 0) {
            sliced.truncate(levels as usize);
        }

        let mut body = StackTraceResponse {
            stack_frames: sliced,
            total_frames: Some(total),
        };
        session.transformers.stack_trace_response(&mut body);
        Ok(ResponseBody::StackTrace(body))
    }

    fn call_frame_to_stack_frame(session: &mut Session, frame: &CallFrame) -> StackFrame {
        let handle = session.frame_handles.create(Some(frame.clone()));

        let source = session
            .scripts_by_id
            .get(&frame.location.script_id)
            .cloned()
            .map(|script| {
                match session
                    .transformers
                    .get_client_path_from_target_path(&script.url)
                {
                    Some(path) => Source {
                        name: path.rsplit('/').next().map(str::to_string),
                        path: Some(path),
                        ..Default::default()
                    },
                    None => {
                        let reference = session.source_handles.create(script.script_id.clone());
                        Source {
                            name: Some(script.url.clone()),
                            source_reference: Some(reference as i32),
                            ..Default::default()
                        }
                    }
                }
            });

        let name = if frame.function_name.is_empty() {
            "(anonymous function)".to_string()
        } else {
            frame.function_name.clone()
        };

        StackFrame {
            id: handle as i64,
            name,
            source,
            line: frame.location.line_number,
            column: frame.location.column_number.unwrap_or(0),
            ..Default::default()
        }
    }

    async fn scopes(&self, args: &ScopesArguments) -> Result<ResponseBody> {
        let frame = {
            let session = self.state.lock().await;
            session.frame_handles.lookup(args.frame_id as u32).cloned()
        };
        match frame {
            Some(Some(frame)) => {
                let scopes = self.variables.scopes(&frame).await;
                Ok(ResponseBody::Scopes(ScopesResponse { scopes }))
            }
            // Dummy frames have no scope chain to offer.
            Some(None) | None => Err(Error::StackFrameNotValid),
        }
    }

    async fn variables(&self, args: &VariablesArguments) -> Result<ResponseBody> {
        let cdp = self.cdp().await?;
        let variables = self
            .variables
            .expand(
                &cdp,
                args.variables_reference as u32,
                args.filter.as_ref(),
                args.start,
                args.count,
            )
            .await?;
        Ok(ResponseBody::Variables(VariablesResponse { variables }))
    }

    async fn set_variable(&self, args: &SetVariableArguments) -> Result<ResponseBody> {
        let cdp = self.cdp().await?;
        let variable = self.variables.set_variable(&cdp, args).await?;
        Ok(ResponseBody::SetVariable(SetVariableResponse {
            value: variable.value,
            type_field: None,
            variables_reference: Some(variable.variables_reference),
            named_variables: variable.named_variables.map(|v| v as i32),
            indexed_variables: variable.indexed_variables.map(|v| v as i32),
        }))
    }

    async fn source(&self, args: &SourceArguments) -> Result<ResponseBody> {
        let reference = if args.source_reference > 0 {
            args.source_reference
        } else {
            args.source
                .as_ref()
                .and_then(|s| s.source_reference)
                .map(i64::from)
                .unwrap_or(0)
        };
        if reference <= 0 {
            return Err(Error::IllegalSourceHandle);
        }

        let script_id = {
            let session = self.state.lock().await;
            session
                .source_handles
                .lookup(reference as u32)
                .cloned()
                .ok_or(Error::IllegalSourceHandle)?
        };

        let cdp = self.cdp().await?;
        let content = cdp.get_script_source(&script_id).await?;
        Ok(ResponseBody::Source(SourceResponse {
            content,
            mime_type: None,
        }))
    }

    async fn evaluate(&self, args: &EvaluateArguments) -> Result<ResponseBody> {
        let cdp = self.cdp().await?;
        let variable = self.variables.evaluate(&cdp, args).await?;
        Ok(ResponseBody::Evaluate(EvaluateResponse {
            result: variable.value,
            type_field: None,
            presentation_hint: None,
            variables_reference: variable.variables_reference,
            named_variables: variable.named_variables,
            indexed_variables: variable.indexed_variables,
            memory_reference: None,
        }))
    }

    async fn completions(&self, args: &CompletionsArguments) -> Result<ResponseBody> {
        let cdp = self.cdp().await?;
        let targets = self.variables.completions(&cdp, args).await?;
        Ok(ResponseBody::Completions(CompletionsResponse { targets }))
    }

    // CDP event handling

    pub async fn pump_events(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<CdpEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch_cdp_event(event).await;
        }
        self.terminate_session("connection to the target closed").await;
    }

    pub async fn dispatch_cdp_event(&self, event: CdpEvent) {
        debug!(method = %event.method, "<- CDP event");
        match event.method.as_str() {
            "Debugger.paused" => match serde_json::from_value(event.params) {
                Ok(paused) => self.on_paused(paused).await,
                Err(e) => warn!(error = %e, "malformed Debugger.paused"),
            },
            "Debugger.resumed" => self.on_resumed().await,
            "Debugger.scriptParsed" => match serde_json::from_value(event.params) {
                Ok(parsed) => self.on_script_parsed(parsed).await,
                Err(e) => warn!(error = %e, "malformed Debugger.scriptParsed"),
            },
            "Debugger.globalObjectCleared" => self.on_global_object_cleared().await,
            "Debugger.breakpointResolved" => match serde_json::from_value(event.params) {
                Ok(resolved) => self.on_breakpoint_resolved(resolved).await,
                Err(e) => warn!(error = %e, "malformed Debugger.breakpointResolved"),
            },
            "Runtime.consoleAPICalled" => match serde_json::from_value(event.params) {
                Ok(called) => self.on_console_api_called(called).await,
                Err(e) => warn!(error = %e, "malformed Runtime.consoleAPICalled"),
            },
            "Inspector.detached" => self.terminate_session("inspector detached").await,
            other => debug!(method = other, "unhandled CDP event"),
        }
    }

    async fn on_paused(&self, event: PausedEvent) {
        let frames: Vec<Option<CallFrame>> = event
            .call_frames
            .into_iter()
            .map(|raw| match serde_json::from_value::<CallFrame>(raw) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    warn!(error = %e, "unparseable call frame");
                    None
                }
            })
            .collect();

        let (notification, hit_ids, text, step_token) = {
            let mut session = self.state.lock().await;
            session.reset_pause_state();
            session.current_frames = frames;

            let expected = session.expecting_stop_reason.take();
            let notification = if event.reason == "exception" {
                session.exception = event
                    .data
                    .and_then(|data| serde_json::from_value::<RemoteObject>(data).ok());
                StopNotification::Exception
            } else if event
                .hit_breakpoints
                .as_ref()
                .is_some_and(|hits| !hits.is_empty())
            {
                StopNotification::Breakpoint
            } else {
                match expected {
                    Some(ExpectedStop::Step) => StopNotification::Step,
                    Some(ExpectedStop::UserRequest) => StopNotification::Pause,
                    None => StopNotification::Debugger,
                }
            };

            // Smart-step: a step that landed in a frame with no authored
            // mapping is silently stepped through.
            let smart_step_target = if session.smart_step
                && matches!(notification, StopNotification::Step)
            {
                session.top_frame().map(|frame| {
                    let url = session
                        .scripts_by_id
                        .get(&frame.location.script_id)
                        .map(|script| script.url.clone())
                        .unwrap_or_default();
                    (
                        session.client_path_for_target_url(&url),
                        frame.location.line_number,
                        frame.location.column_number.unwrap_or(0),
                    )
                })
            } else {
                None
            };

            if let Some((path, line, column)) = &smart_step_target {
                if session
                    .transformers
                    .map_to_authored(path, *line, *column)
                    .is_none()
                {
                    session.smart_step_count += 1;
                    session.expecting_resumed_event = true;
                    session.expecting_stop_reason = Some(ExpectedStop::Step);
                    drop(session);
                    debug!(path = %path, line = *line, "no authored mapping; smart-stepping");
                    match self.cdp().await {
                        Ok(cdp) => {
                            if let Err(e) = cdp.step_into().await {
                                warn!(error = %e, "smart-step stepIn failed");
                            }
                        }
                        Err(e) => warn!(error = %e, "smart-step without connection"),
                    }
                    return;
                }
            }

            if session.smart_step_count > 0 {
                info!(skipped = session.smart_step_count, "smart-step finished");
                session.smart_step_count = 0;
            }

            let hit_ids: Option<Vec<i64>> = event.hit_breakpoints.as_ref().map(|hits| {
                hits.iter()
                    .filter_map(|cdp_id| session.breakpoint_ids.lookup_id(cdp_id))
                    .map(|id| id as i64)
                    .collect()
            });

            let text = session
                .exception
                .as_ref()
                .and_then(|exception| exception.description.clone());

            (notification, hit_ids, text, session.current_step.take())
        };

        // The editor must see the response to the request that induced this
        // pause first; bounded so a lost response cannot wedge the session.
        if let Some(token) = step_token {
            let _ = tokio::time::timeout(STOPPED_AFTER_RESPONSE_TIMEOUT, token).await;
        }

        self.set_overlay(Some(PAUSE_OVERLAY_MESSAGE)).await;

        let reason = match notification {
            StopNotification::Breakpoint => StoppedEventReason::Breakpoint,
            StopNotification::Exception => StoppedEventReason::Exception,
            StopNotification::Step => StoppedEventReason::Step,
            StopNotification::Pause => StoppedEventReason::Pause,
            StopNotification::Debugger => StoppedEventReason::String("debugger".to_string()),
        };

        self.send_event(Event::Stopped(StoppedEventBody {
            reason,
            description: None,
            thread_id: Some(THREAD_ID),
            preserve_focus_hint: None,
            text,
            all_threads_stopped: Some(true),
            hit_breakpoint_ids: hit_ids,
        }))
        .await;
    }

    async fn on_resumed(&self) {
        let suppressed = {
            let mut session = self.state.lock().await;
            session.current_frames.clear();
            std::mem::take(&mut session.expecting_resumed_event)
        };

        self.set_overlay(None).await;

        if !suppressed {
            self.send_event(Event::Continued(ContinuedEventBody {
                thread_id: THREAD_ID,
                all_threads_continued: Some(true),
            }))
            .await;
        }
    }

    async fn on_script_parsed(&self, event: ScriptParsedEvent) {
        if event.url.starts_with("extensions::") || event.url.starts_with("chrome-extension://") {
            return;
        }

        let url = if event.url.is_empty() {
            format!("{PLACEHOLDER_SCHEME}{}", event.script_id)
        } else {
            fix_drive_letter_and_slashes(&event.url)
        };
        debug!(script_id = %event.script_id, %url, "script parsed");

        let paths_to_resolve = {
            let mut session = self.state.lock().await;
            session.add_script(Script {
                script_id: event.script_id.clone(),
                url: url.clone(),
                source_map_url: event.source_map_url.clone(),
            });

            let mut paths = session
                .transformers
                .script_parsed(&url, event.source_map_url.as_deref());
            let own_path = session.client_path_for_target_url(&url);
            if !paths.contains(&own_path) {
                paths.push(own_path);
            }
            paths.retain(|path| session.pending_breakpoints_by_path.contains_key(path));
            paths
        };

        if paths_to_resolve.is_empty() {
            return;
        }
        let Ok(cdp) = self.cdp().await else { return };

        for path in paths_to_resolve {
            match self.breakpoints.resolve_pending(&cdp, &path).await {
                Ok(Some(breakpoints)) => {
                    for breakpoint in breakpoints {
                        self.send_event(Event::Breakpoint(BreakpointEventBody {
                            reason: dap::types::BreakpointEventReason::String("new".to_string()),
                            breakpoint,
                        }))
                        .await;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(path = %path, error = %e, "pending breakpoint resolution failed"),
            }
        }
    }

    async fn on_global_object_cleared(&self) {
        info!("global object cleared; dropping target context");
        let mut session = self.state.lock().await;
        session.clear_target_context();
    }

    async fn on_breakpoint_resolved(&self, event: BreakpointResolvedEvent) {
        let breakpoint = {
            let mut session = self.state.lock().await;
            let Some(script) = session.scripts_by_id.get(&event.location.script_id).cloned()
            else {
                debug!(script_id = %event.location.script_id, "resolved on unknown script");
                return;
            };

            session
                .committed_breakpoints_by_url
                .entry(script.url.clone())
                .or_default()
                .push(event.breakpoint_id.clone());

            let id = session.breakpoint_ids.create(&event.breakpoint_id);
            let mut breakpoint = Breakpoint {
                id: Some(id as i64),
                verified: true,
                message: None,
                source: None,
                line: Some(event.location.line_number),
                column: event.location.column_number.or(Some(0)),
                end_line: None,
                end_column: None,
                instruction_reference: None,
                offset: None,
            };

            let client_path = session.client_path_for_target_url(&script.url);
            session
                .transformers
                .breakpoint_resolved(&mut breakpoint, &client_path);
            breakpoint
        };

        self.send_event(Event::Breakpoint(BreakpointEventBody {
            reason: dap::types::BreakpointEventReason::String("new".to_string()),
            breakpoint,
        }))
        .await;
    }

    async fn on_console_api_called(&self, event: ConsoleApiCalledEvent) {
        let Some((output, channel)) = format_console_call(&event) else {
            return;
        };
        let category = match channel {
            OutputChannel::Stdout => dap::types::OutputEventCategory::Stdout,
            OutputChannel::Stderr => dap::types::OutputEventCategory::Stderr,
        };
        self.send_event(Event::Output(OutputEventBody {
            category: Some(category),
            output,
            group: None,
            variables_reference: None,
            source: None,
            line: None,
            column: None,
            data: None,
        }))
        .await;
    }

    /// Emits `Terminated` exactly once and drops the connection. Later
    /// transport errors are absorbed by the latch.
    pub async fn terminate_session(&self, reason: &str) {
        let already_terminated = {
            let mut session = self.state.lock().await;
            std::mem::replace(&mut session.has_terminated, true)
        };
        if already_terminated {
            return;
        }

        error!(reason, "terminating session");
        self.send_event(Event::Terminated(None)).await;

        if let Some(cdp) = self.connection.lock().await.take() {
            cdp.close().await;
        }
    }

    /// Debounced overlay update; rapid pause/resume cycles collapse to the
    /// final state.
    async fn set_overlay(&self, message: Option<&str>) {
        let generation = self.overlay_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let Some(cdp) = self.connection.lock().await.clone() else {
            return;
        };
        let generation_counter = Arc::clone(&self.overlay_generation);
        let message = message.map(str::to_string);
        tokio::spawn(async move {
            tokio::time::sleep(OVERLAY_DEBOUNCE).await;
            if generation_counter.load(Ordering::SeqCst) != generation {
                return;
            }
            if let Err(e) = cdp.configure_overlay(message).await {
                // Not every target implements the overlay domain.
                debug!(error = %e, "overlay update failed");
            }
        });
    }
}
