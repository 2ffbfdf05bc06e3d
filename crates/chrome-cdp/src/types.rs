//! Wire types for the CDP subset the adapter uses.
//!
//! Mirrors the `Debugger`, `Runtime` and `Page` domain shapes. Field names
//! follow the protocol's camelCase on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A source location inside a parsed script.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub script_id: String,
    pub line_number: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_number: Option<i64>,
}

/// One entry of a paused frame's scope chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub object: RemoteObject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A call frame reported by `Debugger.paused`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    pub call_frame_id: String,
    pub function_name: String,
    pub location: Location,
    #[serde(default)]
    pub url: Option<String>,
    pub scope_chain: Vec<ScopeEntry>,
    #[serde(default)]
    pub this: Option<RemoteObject>,
    #[serde(default)]
    pub return_value: Option<RemoteObject>,
}

/// `Debugger.paused` notification.
///
/// Call frames stay raw JSON here; the adapter parses them one by one so a
/// single malformed frame from a non-standard runtime degrades to a dummy
/// frame instead of discarding the whole notification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedEvent {
    pub call_frames: Vec<Value>,
    pub reason: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub hit_breakpoints: Option<Vec<String>>,
}

/// `Debugger.scriptParsed` notification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptParsedEvent {
    pub script_id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source_map_url: Option<String>,
}

/// `Debugger.breakpointResolved` notification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointResolvedEvent {
    pub breakpoint_id: String,
    pub location: Location,
}

/// `Runtime.consoleAPICalled` notification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleApiCalledEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub args: Vec<RemoteObject>,
}

/// Coarse classification of a `RemoteObject`, used to drive variable
/// rendering. `Null` is the `object`/`null` subtype pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    Null,
    Undefined,
    Bool,
    Number,
    Str,
    Function,
    Object,
    Other,
}

/// A value mirrored out of the target runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unserializable_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<ObjectPreview>,
}

impl RemoteObject {
    pub fn classify(&self) -> ObjectClass {
        match self.kind.as_str() {
            "undefined" => ObjectClass::Undefined,
            "boolean" => ObjectClass::Bool,
            "number" => ObjectClass::Number,
            "string" => ObjectClass::Str,
            "function" => ObjectClass::Function,
            "object" => match self.subtype.as_deref() {
                Some("null") => ObjectClass::Null,
                _ => ObjectClass::Object,
            },
            _ => ObjectClass::Other,
        }
    }

    pub fn description_or_empty(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

/// Abbreviated preview shipped alongside some remote objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPreview {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub overflow: bool,
    #[serde(default)]
    pub properties: Vec<PropertyPreview>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<EntryPreview>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyPreview {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPreview {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<ObjectPreview>,
    pub value: ObjectPreview,
}

/// An own, inherited or accessor property of a remote object.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    pub name: String,
    #[serde(default)]
    pub value: Option<RemoteObject>,
    #[serde(default)]
    pub get: Option<RemoteObject>,
    #[serde(default)]
    pub set: Option<RemoteObject>,
    #[serde(default)]
    pub writable: Option<bool>,
    #[serde(default)]
    pub configurable: Option<bool>,
    #[serde(default)]
    pub enumerable: Option<bool>,
    #[serde(default)]
    pub was_thrown: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalPropertyDescriptor {
    pub name: String,
    #[serde(default)]
    pub value: Option<RemoteObject>,
}

/// Details of an exception thrown while evaluating in the target.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub exception: Option<RemoteObject>,
    #[serde(default)]
    pub line_number: Option<i64>,
    #[serde(default)]
    pub column_number: Option<i64>,
}

impl ExceptionDetails {
    /// Best human-readable message: the thrown value's description when
    /// present, the bare text otherwise.
    pub fn message(&self) -> String {
        self.exception
            .as_ref()
            .and_then(|e| e.description.clone())
            .unwrap_or_else(|| self.text.clone())
    }
}

/// Argument passed to `Runtime.callFunctionOn`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallArgument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unserializable_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

impl CallArgument {
    /// Builds the argument that re-references an evaluated remote object.
    pub fn from_remote(obj: &RemoteObject) -> Self {
        if let Some(id) = &obj.object_id {
            Self {
                object_id: Some(id.clone()),
                ..Default::default()
            }
        } else if let Some(unserializable) = &obj.unserializable_value {
            Self {
                unserializable_value: Some(unserializable.clone()),
                ..Default::default()
            }
        } else {
            Self {
                value: obj.value.clone(),
                ..Default::default()
            }
        }
    }
}

// Command parameter / result shapes.

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointByUrlParams {
    pub line_number: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointByUrlResult {
    pub breakpoint_id: String,
    #[serde(default)]
    pub locations: Vec<Location>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointParams {
    pub location: Location,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointResult {
    pub breakpoint_id: String,
    pub actual_location: Location,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveBreakpointParams {
    pub breakpoint_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPauseOnExceptionsParams {
    pub state: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetScriptSourceParams {
    pub script_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetScriptSourceResult {
    pub script_source: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateOnCallFrameParams {
    pub call_frame_id: String,
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_command_line_api: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_by_value: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate_preview: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateParams {
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_command_line_api: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_by_value: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate_preview: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResult {
    pub result: RemoteObject,
    #[serde(default)]
    pub exception_details: Option<ExceptionDetails>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPropertiesParams {
    pub object_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub own_properties: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessor_properties_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate_preview: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPropertiesResult {
    #[serde(default)]
    pub result: Vec<PropertyDescriptor>,
    #[serde(default)]
    pub internal_properties: Option<Vec<InternalPropertyDescriptor>>,
    #[serde(default)]
    pub exception_details: Option<ExceptionDetails>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFunctionOnParams {
    pub object_id: String,
    pub function_declaration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<CallArgument>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_by_value: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate_preview: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFunctionOnResult {
    pub result: RemoteObject,
    #[serde(default)]
    pub exception_details: Option<ExceptionDetails>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetVariableValueParams {
    pub scope_number: i64,
    pub variable_name: String,
    pub new_value: CallArgument,
    pub call_frame_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureOverlayParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_paused_event_deserializes_with_raw_frames() {
        let event: PausedEvent = serde_json::from_value(json!({
            "callFrames": [{"callFrameId": "f1"}, 42],
            "reason": "other",
            "hitBreakpoints": ["bp1"]
        }))
        .unwrap();
        assert_eq!(event.call_frames.len(), 2);
        assert_eq!(event.reason, "other");
        assert_eq!(event.hit_breakpoints.as_deref(), Some(&["bp1".to_string()][..]));
    }

    #[test]
    fn test_remote_object_classification() {
        let null_obj: RemoteObject =
            serde_json::from_value(json!({"type": "object", "subtype": "null"})).unwrap();
        assert_eq!(null_obj.classify(), ObjectClass::Null);

        let undef: RemoteObject = serde_json::from_value(json!({"type": "undefined"})).unwrap();
        assert_eq!(undef.classify(), ObjectClass::Undefined);

        let arr: RemoteObject =
            serde_json::from_value(json!({"type": "object", "subtype": "array", "objectId": "7"}))
                .unwrap();
        assert_eq!(arr.classify(), ObjectClass::Object);

        let func: RemoteObject = serde_json::from_value(
            json!({"type": "function", "description": "function foo(a) { return a; }"}),
        )
        .unwrap();
        assert_eq!(func.classify(), ObjectClass::Function);
    }

    #[test]
    fn test_set_breakpoint_by_url_params_skip_none() {
        let params = SetBreakpointByUrlParams {
            line_number: 3,
            url: None,
            url_regex: Some("file:///a\\.js".into()),
            column_number: None,
            condition: None,
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value, json!({"lineNumber": 3, "urlRegex": "file:///a\\.js"}));
    }

    #[test]
    fn test_call_argument_prefers_object_id() {
        let obj: RemoteObject = serde_json::from_value(
            json!({"type": "object", "objectId": "9", "value": {"x": 1}}),
        )
        .unwrap();
        let arg = CallArgument::from_remote(&obj);
        assert_eq!(arg.object_id.as_deref(), Some("9"));
        assert!(arg.value.is_none());
    }
}
