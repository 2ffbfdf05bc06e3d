//! Console message formatting for `Runtime.consoleAPICalled`.

use chrome_cdp::types::{ConsoleApiCalledEvent, ObjectClass, RemoteObject};

/// Where the formatted message belongs in the editor's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputChannel {
    Stdout,
    Stderr,
}

/// Renders one console call as a line of editor output. Returns `None` for
/// calls with nothing printable (e.g. `console.group()`).
pub fn format_console_call(event: &ConsoleApiCalledEvent) -> Option<(String, OutputChannel)> {
    if event.args.is_empty() {
        return None;
    }

    let channel = match event.kind.as_str() {
        "error" | "assert" => OutputChannel::Stderr,
        _ => OutputChannel::Stdout,
    };

    let mut parts: Vec<String> = event.args.iter().map(render_arg).collect();
    if event.kind == "assert" {
        parts.insert(0, "Assertion failed:".to_string());
    }

    let mut text = parts.join(" ");
    text.push('\n');
    Some((text, channel))
}

fn render_arg(arg: &RemoteObject) -> String {
    match arg.classify() {
        ObjectClass::Str => arg
            .value
            .as_ref()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| arg.description_or_empty().to_string()),
        ObjectClass::Undefined => "undefined".to_string(),
        ObjectClass::Null => "null".to_string(),
        _ => {
            if let Some(description) = &arg.description {
                description.clone()
            } else if let Some(value) = &arg.value {
                value.to_string()
            } else {
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(kind: &str, args: serde_json::Value) -> ConsoleApiCalledEvent {
        serde_json::from_value(json!({"type": kind, "args": args})).unwrap()
    }

    #[test]
    fn test_log_joins_args_to_stdout() {
        let event = event(
            "log",
            json!([
                {"type": "string", "value": "hello"},
                {"type": "number", "description": "42", "value": 42}
            ]),
        );
        let (text, channel) = format_console_call(&event).unwrap();
        assert_eq!(text, "hello 42\n");
        assert_eq!(channel, OutputChannel::Stdout);
    }

    #[test]
    fn test_error_goes_to_stderr() {
        let event = event("error", json!([{"type": "string", "value": "boom"}]));
        let (text, channel) = format_console_call(&event).unwrap();
        assert_eq!(text, "boom\n");
        assert_eq!(channel, OutputChannel::Stderr);
    }

    #[test]
    fn test_assert_prefixes_message() {
        let event = event("assert", json!([{"type": "string", "value": "x > 0"}]));
        let (text, channel) = format_console_call(&event).unwrap();
        assert_eq!(text, "Assertion failed: x > 0\n");
        assert_eq!(channel, OutputChannel::Stderr);
    }

    #[test]
    fn test_empty_call_produces_nothing() {
        let event = event("group", json!([]));
        assert!(format_console_call(&event).is_none());
    }
}
