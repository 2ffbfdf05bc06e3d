//! Translation pipeline between editor coordinates and runtime coordinates.
//!
//! Three collaborators share one hook set: the concrete line/column
//! transformer (client 0/1-based against CDP's 0-based wire), a source-map
//! transformer and a path transformer. The adapter applies them in fixed
//! order: line-column, source-map, path on the request leg, and the inverse
//! order on the response leg.

use dap::requests::SetBreakpointsArguments;
use dap::responses::{SetBreakpointsResponse, StackTraceResponse};
use dap::types::Breakpoint;
use serde_json::Value;

/// An authored location produced by mapping a generated location back
/// through a source map.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedLocation {
    pub path: String,
    pub line: i64,
    pub column: i64,
}

/// Hook set shared by every pipeline stage. All hooks default to no-ops so a
/// collaborator only implements the legs it participates in.
pub trait Transformer: Send {
    fn launch(&mut self, _args: &Value) {}

    fn attach(&mut self, _args: &Value) {}

    fn set_breakpoints(&mut self, _args: &mut SetBreakpointsArguments, _request_seq: i64) {}

    fn set_breakpoints_response(&mut self, _body: &mut SetBreakpointsResponse, _request_seq: i64) {}

    fn breakpoint_resolved(&mut self, _bp: &mut Breakpoint, _target_path: &str) {}

    fn stack_trace_response(&mut self, _body: &mut StackTraceResponse) {}

    /// Reports a newly parsed script; returns the client paths of any
    /// authored sources the script was generated from.
    fn script_parsed(&mut self, _url: &str, _source_map_url: Option<&str>) -> Vec<String> {
        Vec::new()
    }

    fn get_generated_path_from_authored_path(&self, _path: &str) -> Option<String> {
        None
    }

    fn get_target_path_from_client_path(&self, _path: &str) -> Option<String> {
        None
    }

    fn get_client_path_from_target_path(&self, _path: &str) -> Option<String> {
        None
    }

    fn map_to_authored(&self, _path: &str, _line: i64, _column: i64) -> Option<MappedLocation> {
        None
    }

    fn clear_target_context(&mut self) {}
}

/// Source-map stage that maps nothing. Stands in when no source-map
/// collaborator is wired up.
pub struct DisabledSourceMaps;

impl Transformer for DisabledSourceMaps {}

/// Path stage that treats client paths and `file://` target URLs as two
/// spellings of the same filesystem location.
pub struct DirectPathTransformer;

impl Transformer for DirectPathTransformer {
    fn get_target_path_from_client_path(&self, path: &str) -> Option<String> {
        if path.starts_with('/') {
            Some(format!("file://{path}"))
        } else if has_drive_prefix(path) {
            Some(format!("file:///{}", fix_drive_letter_and_slashes(path)))
        } else {
            Some(path.to_string())
        }
    }

    fn get_client_path_from_target_path(&self, path: &str) -> Option<String> {
        let rest = path.strip_prefix("file://")?;
        let rest = rest.strip_prefix('/').map_or(rest, |stripped| {
            if has_drive_prefix(stripped) { stripped } else { rest }
        });
        Some(fix_drive_letter_and_slashes(rest))
    }
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Normalizes backslashes and lowercases a leading drive letter, so two
/// spellings of one Windows path compare equal.
pub fn fix_drive_letter_and_slashes(path: &str) -> String {
    let mut fixed = path.replace('\\', "/");
    if has_drive_prefix(&fixed) {
        let drive = fixed.as_bytes()[0].to_ascii_lowercase() as char;
        fixed.replace_range(0..1, &drive.to_string());
    }
    // file URLs carry the drive two characters in
    if let Some(rest) = fixed.strip_prefix("file:///") {
        if has_drive_prefix(rest) {
            let drive = rest.as_bytes()[0].to_ascii_lowercase() as char;
            let start = "file:///".len();
            fixed.replace_range(start..start + 1, &drive.to_string());
        }
    }
    fixed
}

/// Reconciles the client's line/column base with CDP's 0-based wire format.
pub struct LineColTransformer {
    lines_start_at1: bool,
    columns_start_at1: bool,
}

impl Default for LineColTransformer {
    fn default() -> Self {
        Self {
            lines_start_at1: true,
            columns_start_at1: true,
        }
    }
}

impl LineColTransformer {
    pub fn configure(&mut self, lines_start_at1: bool, columns_start_at1: bool) {
        self.lines_start_at1 = lines_start_at1;
        self.columns_start_at1 = columns_start_at1;
    }

    pub fn line_to_target(&self, line: i64) -> i64 {
        if self.lines_start_at1 { line - 1 } else { line }
    }

    pub fn line_to_client(&self, line: i64) -> i64 {
        if self.lines_start_at1 { line + 1 } else { line }
    }

    pub fn column_to_target(&self, column: i64) -> i64 {
        if self.columns_start_at1 { column - 1 } else { column }
    }

    pub fn column_to_client(&self, column: i64) -> i64 {
        if self.columns_start_at1 { column + 1 } else { column }
    }
}

impl Transformer for LineColTransformer {
    fn set_breakpoints(&mut self, args: &mut SetBreakpointsArguments, _request_seq: i64) {
        if let Some(breakpoints) = args.breakpoints.as_mut() {
            for bp in breakpoints {
                bp.line = self.line_to_target(bp.line);
            }
        }
    }

    fn set_breakpoints_response(&mut self, body: &mut SetBreakpointsResponse, _request_seq: i64) {
        for bp in &mut body.breakpoints {
            self.breakpoint_to_client(bp);
        }
    }

    fn breakpoint_resolved(&mut self, bp: &mut Breakpoint, _target_path: &str) {
        self.breakpoint_to_client(bp);
    }

    fn stack_trace_response(&mut self, body: &mut StackTraceResponse) {
        for frame in &mut body.stack_frames {
            frame.line = self.line_to_client(frame.line);
            frame.column = self.column_to_client(frame.column);
        }
    }
}

impl LineColTransformer {
    // Breakpoint columns stay on the runtime's 0-based wire; only lines are
    // reconciled with the client's base.
    fn breakpoint_to_client(&self, bp: &mut Breakpoint) {
        if let Some(line) = bp.line {
            bp.line = Some(self.line_to_client(line));
        }
    }
}

/// The fixed-order pipeline the adapter drives.
pub struct TransformerPipeline {
    pub line_col: LineColTransformer,
    pub source_map: Box<dyn Transformer>,
    pub path: Box<dyn Transformer>,
}

impl TransformerPipeline {
    pub fn new(source_map: Box<dyn Transformer>, path: Box<dyn Transformer>) -> Self {
        Self {
            line_col: LineColTransformer::default(),
            source_map,
            path,
        }
    }

    pub fn launch(&mut self, args: &Value) {
        self.line_col.launch(args);
        self.source_map.launch(args);
        self.path.launch(args);
    }

    pub fn attach(&mut self, args: &Value) {
        self.line_col.attach(args);
        self.source_map.attach(args);
        self.path.attach(args);
    }

    pub fn set_breakpoints(&mut self, args: &mut SetBreakpointsArguments, request_seq: i64) {
        self.line_col.set_breakpoints(args, request_seq);
        self.source_map.set_breakpoints(args, request_seq);
        self.path.set_breakpoints(args, request_seq);
    }

    pub fn set_breakpoints_response(&mut self, body: &mut SetBreakpointsResponse, request_seq: i64) {
        self.path.set_breakpoints_response(body, request_seq);
        self.source_map.set_breakpoints_response(body, request_seq);
        self.line_col.set_breakpoints_response(body, request_seq);
    }

    pub fn breakpoint_resolved(&mut self, bp: &mut Breakpoint, target_path: &str) {
        self.path.breakpoint_resolved(bp, target_path);
        self.source_map.breakpoint_resolved(bp, target_path);
        self.line_col.breakpoint_resolved(bp, target_path);
    }

    pub fn stack_trace_response(&mut self, body: &mut StackTraceResponse) {
        self.path.stack_trace_response(body);
        self.source_map.stack_trace_response(body);
        self.line_col.stack_trace_response(body);
    }

    pub fn script_parsed(&mut self, url: &str, source_map_url: Option<&str>) -> Vec<String> {
        self.source_map.script_parsed(url, source_map_url)
    }

    pub fn get_target_path_from_client_path(&self, path: &str) -> Option<String> {
        self.path.get_target_path_from_client_path(path)
    }

    pub fn get_client_path_from_target_path(&self, path: &str) -> Option<String> {
        self.path.get_client_path_from_target_path(path)
    }

    pub fn get_generated_path_from_authored_path(&self, path: &str) -> Option<String> {
        self.source_map.get_generated_path_from_authored_path(path)
    }

    pub fn map_to_authored(&self, path: &str, line: i64, column: i64) -> Option<MappedLocation> {
        self.source_map.map_to_authored(path, line, column)
    }

    pub fn clear_target_context(&mut self) {
        self.line_col.clear_target_context();
        self.source_map.clear_target_context();
        self.path.clear_target_context();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dap::types::SourceBreakpoint;

    fn args_with_line(line: i64) -> SetBreakpointsArguments {
        SetBreakpointsArguments {
            source: dap::types::Source {
                path: Some("/x/foo.js".into()),
                ..Default::default()
            },
            breakpoints: Some(vec![SourceBreakpoint {
                line,
                column: Some(5),
                condition: None,
                hit_condition: None,
                log_message: None,
            }]),
            lines: None,
            source_modified: None,
        }
    }

    #[test]
    fn test_line_col_request_leg_converts_to_zero_based() {
        let mut transformer = LineColTransformer::default();
        let mut args = args_with_line(10);
        transformer.set_breakpoints(&mut args, 1);
        let bp = &args.breakpoints.as_ref().unwrap()[0];
        assert_eq!(bp.line, 9);
        assert_eq!(bp.column, Some(5));
    }

    #[test]
    fn test_line_col_zero_based_client_passes_through() {
        let mut transformer = LineColTransformer::default();
        transformer.configure(false, false);
        let mut args = args_with_line(10);
        transformer.set_breakpoints(&mut args, 1);
        assert_eq!(args.breakpoints.as_ref().unwrap()[0].line, 10);
    }

    #[test]
    fn test_line_col_legs_are_inverse() {
        let mut transformer = LineColTransformer::default();
        let mut body = SetBreakpointsResponse {
            breakpoints: vec![Breakpoint {
                id: Some(1),
                verified: true,
                message: None,
                source: None,
                line: Some(9),
                column: Some(4),
                end_line: None,
                end_column: None,
                instruction_reference: None,
                offset: None,
            }],
        };
        transformer.set_breakpoints_response(&mut body, 1);
        assert_eq!(body.breakpoints[0].line, Some(10));
        assert_eq!(body.breakpoints[0].column, Some(4));
    }

    #[test]
    fn test_fix_drive_letter_and_slashes() {
        assert_eq!(fix_drive_letter_and_slashes("C:\\code\\app.js"), "c:/code/app.js");
        assert_eq!(
            fix_drive_letter_and_slashes("file:///C:/code/app.js"),
            "file:///c:/code/app.js"
        );
        assert_eq!(fix_drive_letter_and_slashes("/already/fine.js"), "/already/fine.js");
    }

    #[test]
    fn test_direct_path_round_trip() {
        let transformer = DirectPathTransformer;
        let target = transformer.get_target_path_from_client_path("/x/foo.js").unwrap();
        assert_eq!(target, "file:///x/foo.js");
        let client = transformer.get_client_path_from_target_path(&target).unwrap();
        assert_eq!(client, "/x/foo.js");
    }

    #[test]
    fn test_direct_path_windows_target() {
        let transformer = DirectPathTransformer;
        let client = transformer
            .get_client_path_from_target_path("file:///C:/code/app.js")
            .unwrap();
        assert_eq!(client, "c:/code/app.js");
    }
}
