//! Breakpoint reconciliation.
//!
//! All CDP breakpoint traffic funnels through one queue so at most one
//! set/clear exchange is in flight per session. Requests against scripts the
//! runtime has not announced yet become pending records that are replayed
//! when the script parses; the editor-facing ids minted for them survive the
//! replay, and page navigations.

use std::sync::Arc;
use std::time::Duration;

use chrome_cdp::types::{Location, SetBreakpointByUrlParams, SetBreakpointParams};
use chrome_cdp::Cdp;
use dap::requests::SetBreakpointsArguments;
use dap::responses::SetBreakpointsResponse;
use dap::types::{Breakpoint, SourceBreakpoint};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::session::{PendingBreakpoints, Session};

/// Upper bound on one `setBreakpoints` call, queue wait included.
const SET_BREAKPOINTS_TIMEOUT: Duration = Duration::from_millis(3000);

/// Scheme given to scripts the runtime reported without a URL. Breakpoints
/// on these use explicit script locations instead of URL matching.
pub const PLACEHOLDER_SCHEME: &str = "placeholder://";

struct ResolvedTarget {
    url: String,
    script_id: String,
}

pub struct BreakpointEngine {
    state: Arc<Mutex<Session>>,
    queue: Mutex<()>,
}

impl BreakpointEngine {
    pub fn new(state: Arc<Mutex<Session>>) -> Self {
        Self {
            state,
            queue: Mutex::new(()),
        }
    }

    /// Replaces the breakpoint set for one source. Runs the transformer legs
    /// around the exchange; bounded by [`SET_BREAKPOINTS_TIMEOUT`].
    pub async fn set_breakpoints(
        &self,
        cdp: &Cdp,
        args: SetBreakpointsArguments,
        request_seq: i64,
    ) -> Result<SetBreakpointsResponse> {
        let original_args = args.clone();
        let client_path = args.source.path.clone();

        let mut args = args;
        {
            let mut session = self.state.lock().await;
            session.transformers.set_breakpoints(&mut args, request_seq);
        }

        let work = self.exchange(cdp, &args, &original_args, client_path.as_deref());
        let mut response = match timeout(SET_BREAKPOINTS_TIMEOUT, work).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(path = ?client_path, "setBreakpoints timed out");
                return Err(Error::Timeout);
            }
        };

        {
            let mut session = self.state.lock().await;
            session
                .transformers
                .set_breakpoints_response(&mut response, request_seq);
        }
        Ok(response)
    }

    /// The serialized part: at most one of these runs at a time.
    async fn exchange(
        &self,
        cdp: &Cdp,
        args: &SetBreakpointsArguments,
        original_args: &SetBreakpointsArguments,
        client_path: Option<&str>,
    ) -> Result<SetBreakpointsResponse> {
        let _guard = self.queue.lock().await;

        let requested = args.breakpoints.clone().unwrap_or_default();
        let resolved = self.resolve_target(args, client_path).await;

        let Some(target) = resolved else {
            return Ok(self.defer(original_args, client_path, &requested).await);
        };

        // Remove strictly one at a time: bulk removal of five or more leaves
        // the runtime unable to re-add on the same lines.
        let committed = {
            let mut session = self.state.lock().await;
            session
                .committed_breakpoints_by_url
                .remove(&target.url)
                .unwrap_or_default()
        };
        for breakpoint_id in &committed {
            if let Err(e) = cdp.remove_breakpoint(breakpoint_id).await {
                warn!(breakpoint_id = %breakpoint_id, error = %e, "failed to remove breakpoint");
            }
        }

        // A navigation may have cleared the target while we were suspended.
        let still_known = {
            let session = self.state.lock().await;
            session.scripts_by_id.contains_key(&target.script_id)
        };
        if !still_known {
            debug!(url = %target.url, "script vanished mid-request; deferring");
            return Ok(self.defer(original_args, client_path, &requested).await);
        }

        let mut outcomes: Vec<Option<(String, Option<Location>)>> =
            Vec::with_capacity(requested.len());
        for bp in &requested {
            outcomes.push(self.add_one(cdp, &target, bp).await);
        }

        let mut session = self.state.lock().await;
        let mut committed_ids = Vec::new();
        let breakpoints = requested
            .iter()
            .zip(outcomes)
            .map(|(request, outcome)| match outcome {
                None => unverified_breakpoint(None, Some(request.line), request.column, None),
                Some((breakpoint_id, None)) => {
                    committed_ids.push(breakpoint_id.clone());
                    let id = session.breakpoint_ids.create(&breakpoint_id);
                    unverified_breakpoint(Some(id), Some(request.line), request.column, None)
                }
                Some((breakpoint_id, Some(location))) => {
                    committed_ids.push(breakpoint_id.clone());
                    let id = session.breakpoint_ids.create(&breakpoint_id);
                    verified_breakpoint(id, location.line_number, location.column_number)
                }
            })
            .collect();
        session
            .committed_breakpoints_by_url
            .insert(target.url.clone(), committed_ids);

        Ok(SetBreakpointsResponse { breakpoints })
    }

    async fn resolve_target(
        &self,
        args: &SetBreakpointsArguments,
        client_path: Option<&str>,
    ) -> Option<ResolvedTarget> {
        let session = self.state.lock().await;

        if let Some(reference) = args.source.source_reference.filter(|r| *r > 0) {
            let script_id = session.source_handles.lookup(reference as u32)?;
            let script = session.scripts_by_id.get(script_id)?;
            return Some(ResolvedTarget {
                url: script.url.clone(),
                script_id: script.script_id.clone(),
            });
        }

        let path = args.source.path.as_deref().or(client_path)?;
        let mapped = session.target_url_for_client_path(path);
        for url in [mapped.as_str(), path] {
            if let Some(script) = session.script_by_url(url) {
                return Some(ResolvedTarget {
                    url: url.to_string(),
                    script_id: script.script_id.clone(),
                });
            }
        }
        None
    }

    /// Script unknown: hand out freshly minted, unverified ids and remember
    /// the request so a later `scriptParsed` can replay it.
    async fn defer(
        &self,
        original_args: &SetBreakpointsArguments,
        client_path: Option<&str>,
        requested: &[SourceBreakpoint],
    ) -> SetBreakpointsResponse {
        let mut session = self.state.lock().await;
        let mut ids = Vec::with_capacity(requested.len());
        let breakpoints = requested
            .iter()
            .map(|bp| {
                let id = session.breakpoint_ids.create_unbound();
                ids.push(id);
                unverified_breakpoint(Some(id), Some(bp.line), bp.column, None)
            })
            .collect();

        if let Some(path) = client_path {
            debug!(path, "script not yet parsed; breakpoints pending");
            session.pending_breakpoints_by_path.insert(
                path.to_string(),
                PendingBreakpoints {
                    args: original_args.clone(),
                    ids,
                },
            );
        }

        SetBreakpointsResponse { breakpoints }
    }

    async fn add_one(
        &self,
        cdp: &Cdp,
        target: &ResolvedTarget,
        bp: &SourceBreakpoint,
    ) -> Option<(String, Option<Location>)> {
        let outcome = if target.url.starts_with(PLACEHOLDER_SCHEME) {
            cdp.set_breakpoint(SetBreakpointParams {
                location: Location {
                    script_id: target.script_id.clone(),
                    line_number: bp.line,
                    column_number: bp.column,
                },
                condition: bp.condition.clone(),
            })
            .await
            .map(|r| (r.breakpoint_id, Some(r.actual_location)))
        } else {
            // URL regex so the runtime rebinds the breakpoint on reload.
            cdp.set_breakpoint_by_url(SetBreakpointByUrlParams {
                line_number: bp.line,
                url: None,
                url_regex: Some(url_to_regex(&target.url)),
                column_number: bp.column,
                condition: bp.condition.clone(),
            })
            .await
            .map(|r| (r.breakpoint_id, r.locations.into_iter().next()))
        };

        match outcome {
            Ok(result) => Some(result),
            Err(e) => {
                // One refused breakpoint must not fail the batch.
                warn!(url = %target.url, line = bp.line, error = %e, "breakpoint add failed");
                None
            }
        }
    }

    /// Replays the pending request for a freshly parsed source. The response
    /// ids are rewritten to the ids the editor already holds; the caller
    /// announces each breakpoint with a `Breakpoint('new')` event.
    pub async fn resolve_pending(
        &self,
        cdp: &Cdp,
        path: &str,
    ) -> Result<Option<Vec<Breakpoint>>> {
        let pending = {
            let mut session = self.state.lock().await;
            session.pending_breakpoints_by_path.remove(path)
        };
        let Some(pending) = pending else {
            return Ok(None);
        };
        info!(path, count = pending.ids.len(), "resolving pending breakpoints");

        let response = self.set_breakpoints(cdp, pending.args, 0).await?;

        let mut session = self.state.lock().await;
        let mut breakpoints = Vec::with_capacity(response.breakpoints.len());
        for (mut bp, &external_id) in response.breakpoints.into_iter().zip(&pending.ids) {
            if let Some(fresh_id) = bp.id {
                // The replay minted a throwaway id for this CDP breakpoint;
                // move the binding onto the id the editor already holds.
                session
                    .breakpoint_ids
                    .rebind_and_discard(fresh_id as u32, external_id);
            }
            bp.id = Some(external_id as i64);
            breakpoints.push(bp);
        }
        Ok(Some(breakpoints))
    }
}

fn unverified_breakpoint(
    id: Option<u32>,
    line: Option<i64>,
    column: Option<i64>,
    message: Option<String>,
) -> Breakpoint {
    Breakpoint {
        id: id.map(|id| id as i64),
        verified: false,
        message,
        source: None,
        line,
        column,
        end_line: None,
        end_column: None,
        instruction_reference: None,
        offset: None,
    }
}

fn verified_breakpoint(id: u32, line: i64, column: Option<i64>) -> Breakpoint {
    Breakpoint {
        id: Some(id as i64),
        verified: true,
        message: None,
        source: None,
        line: Some(line),
        column: column.or(Some(0)),
        end_line: None,
        end_column: None,
        instruction_reference: None,
        offset: None,
    }
}

/// Escapes a URL into the regex `setBreakpointByUrl` matches against, with a
/// case-insensitive drive letter for file URLs.
pub fn url_to_regex(url: &str) -> String {
    const SPECIAL: &[char] = &[
        '-', '[', ']', '{', '}', '(', ')', '*', '+', '?', '.', ',', '\\', '^', '$', '|', '#',
    ];
    let mut escaped = String::with_capacity(url.len() * 2);
    for c in url.chars() {
        if SPECIAL.contains(&c) || c.is_whitespace() {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    // file:///c:/… must also match file:///C:/…
    if let Some(rest) = escaped.strip_prefix("file:///") {
        let bytes = rest.as_bytes();
        if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
            let drive = bytes[0] as char;
            let class = format!(
                "[{}{}]",
                drive.to_ascii_uppercase(),
                drive.to_ascii_lowercase()
            );
            let start = "file:///".len();
            let mut with_class = escaped.clone();
            with_class.replace_range(start..start + 1, &class);
            return with_class;
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_to_regex_escapes_metacharacters() {
        assert_eq!(
            url_to_regex("http://localhost:8080/a+b(1).js"),
            "http://localhost:8080/a\\+b\\(1\\)\\.js"
        );
    }

    #[test]
    fn test_url_to_regex_drive_letter_class() {
        assert_eq!(
            url_to_regex("file:///c:/code/app.js"),
            "file:///[Cc]:/code/app\\.js"
        );
    }

    #[test]
    fn test_url_to_regex_plain_posix_path() {
        assert_eq!(url_to_regex("file:///x/foo.js"), "file:///x/foo\\.js");
    }
}
