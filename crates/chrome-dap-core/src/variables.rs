//! Remote object inspection.
//!
//! Translates CDP `RemoteObject`s into the lazily-expandable DAP variable
//! tree: value rendering, property containers with indexed/named counts,
//! getter invocation, paging, scopes, evaluate, set-variable and completions.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrome_cdp::types::{
    CallArgument, CallFrame, CallFunctionOnParams, EvaluateOnCallFrameParams, EvaluateParams,
    EvaluateResult, GetPropertiesParams, ObjectClass, PropertyDescriptor, RemoteObject,
};
use chrome_cdp::Cdp;
use dap::requests::{CompletionsArguments, EvaluateArguments, SetVariableArguments};
use dap::types::{
    CompletionItem, CompletionItemType, EvaluateArgumentsContext, Scope, Variable,
    VariablesArgumentsFilter,
};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::session::{ScopeBinding, Session, VariableContainer};

/// Shown instead of a `ReferenceError` when hover/watch evaluation touches a
/// name that is not in scope.
const NOT_AVAILABLE_MSG: &str = "not available";

const GRAB_GETTER_VALUE: &str = "function remoteFunction(propName) { return this[propName]; }";

const SET_PROPERTY_VALUE: &str = "function(a, b) { this[a] = b; }";

const GET_ARRAY_NUM_PROPS: &str =
    "function() { return [this.length, Object.keys(this).length - this.length]; }";

const GET_COLLECTION_NUM_PROPS: &str =
    "function() { return [0, Object.keys(this).length + 1]; }";

const GET_INDEXED_VARIABLES: &str = "function getIndexedVariables(start, count) { var result = []; for (var i = start; i < (start + count); i++) result[i] = this[i]; return result; }";

const GET_NAMED_VARIABLES: &str = "function getNamedVariablesFn(start, count) { var result = []; var ownProps = Object.getOwnPropertyNames(this); for (var i = start; i < (start + count) && i < ownProps.length; i++) result[i] = ownProps[i]; return result; }";

/// True for names that address an element slot: decimal integers with no
/// leading zeros (except `"0"` itself).
pub fn is_indexed_name(name: &str) -> bool {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    name == "0" || !name.starts_with('0')
}

/// Indexed names first in numeric order, everything else lexicographically.
pub fn compare_variable_names(a: &str, b: &str) -> Ordering {
    match (is_indexed_name(a), is_indexed_name(b)) {
        (true, true) => {
            let left: u64 = a.parse().unwrap_or(u64::MAX);
            let right: u64 = b.parse().unwrap_or(u64::MAX);
            left.cmp(&right)
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.cmp(b),
    }
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

pub struct VariableEngine {
    state: Arc<Mutex<Session>>,
}

impl VariableEngine {
    pub fn new(state: Arc<Mutex<Session>>) -> Self {
        Self { state }
    }

    /// Translates a remote object into one DAP variable, lending a container
    /// handle when the value can be expanded. `stringify` quotes string
    /// primitives; evaluate results opt out.
    pub async fn to_variable(
        &self,
        cdp: &Cdp,
        name: &str,
        obj: &RemoteObject,
        stringify: bool,
    ) -> Variable {
        match obj.classify() {
            ObjectClass::Null => leaf_variable(name, "null"),
            ObjectClass::Undefined => leaf_variable(name, "undefined"),
            ObjectClass::Number => leaf_variable(
                name,
                obj.description
                    .clone()
                    .or_else(|| obj.value.as_ref().map(Value::to_string))
                    .unwrap_or_default(),
            ),
            ObjectClass::Function => self.function_variable(name, obj).await,
            ObjectClass::Object => {
                if obj.subtype.as_deref() == Some("internal#location") {
                    leaf_variable(name, "internal#location")
                } else {
                    self.object_variable(cdp, name, obj).await
                }
            }
            ObjectClass::Bool | ObjectClass::Str | ObjectClass::Other => {
                leaf_variable(name, render_primitive(obj, stringify))
            }
        }
    }

    async fn function_variable(&self, name: &str, obj: &RemoteObject) -> Variable {
        let description = obj.description_or_empty();
        let value = if let Some(brace) = description.find('{') {
            format!("{} {{ … }}", description[..brace].trim_end())
        } else if let Some(arrow) = description.find("=>") {
            format!("{} …", &description[..arrow + 2])
        } else {
            description.to_string()
        };

        let reference = match &obj.object_id {
            Some(object_id) => {
                let mut session = self.state.lock().await;
                session
                    .variable_handles
                    .create(VariableContainer::object(object_id.clone()))
            }
            None => 0,
        };

        Variable {
            name: name.to_string(),
            value,
            variables_reference: reference as i64,
            ..Default::default()
        }
    }

    async fn object_variable(&self, cdp: &Cdp, name: &str, obj: &RemoteObject) -> Variable {
        let value = object_description(obj);
        let (indexed, named) = self.container_counts(cdp, obj).await;

        let reference = match &obj.object_id {
            Some(object_id) => {
                let mut session = self.state.lock().await;
                session
                    .variable_handles
                    .create(VariableContainer::object(object_id.clone()))
            }
            None => 0,
        };

        Variable {
            name: name.to_string(),
            value,
            variables_reference: reference as i64,
            indexed_variables: indexed,
            named_variables: named,
            ..Default::default()
        }
    }

    /// Indexed/named child counts for containers whose size matters to the
    /// editor's paging. Falls back to evaluating on the target when no usable
    /// preview was shipped; count failures degrade to no counts.
    async fn container_counts(
        &self,
        cdp: &Cdp,
        obj: &RemoteObject,
    ) -> (Option<i64>, Option<i64>) {
        let subtype = obj.subtype.as_deref();
        match subtype {
            Some("array") | Some("typedarray") => {
                if let Some(preview) = obj.preview.as_ref().filter(|p| !p.overflow) {
                    let indexed = preview
                        .properties
                        .iter()
                        .filter(|p| is_indexed_name(&p.name))
                        .count() as i64;
                    let named = preview.properties.len() as i64 - indexed;
                    (Some(indexed), Some(named))
                } else {
                    self.eval_counts(cdp, obj, GET_ARRAY_NUM_PROPS).await
                }
            }
            Some("set") | Some("map") => {
                if let Some(preview) = obj.preview.as_ref().filter(|p| !p.overflow) {
                    let entries = preview
                        .entries
                        .as_ref()
                        .map(Vec::len)
                        .unwrap_or(preview.properties.len());
                    // one extra for [[Entries]]
                    (Some(0), Some(entries as i64 + 1))
                } else {
                    self.eval_counts(cdp, obj, GET_COLLECTION_NUM_PROPS).await
                }
            }
            _ => (None, None),
        }
    }

    async fn eval_counts(
        &self,
        cdp: &Cdp,
        obj: &RemoteObject,
        declaration: &str,
    ) -> (Option<i64>, Option<i64>) {
        let Some(object_id) = obj.object_id.clone() else {
            return (None, None);
        };
        let response = cdp
            .call_function_on(CallFunctionOnParams {
                object_id,
                function_declaration: declaration.to_string(),
                silent: Some(true),
                return_by_value: Some(true),
                ..Default::default()
            })
            .await;
        match response {
            Ok(result) => {
                let counts: Option<Vec<i64>> = result
                    .result
                    .value
                    .and_then(|v| serde_json::from_value(v).ok());
                match counts.as_deref() {
                    Some([indexed, named, ..]) => (Some(*indexed), Some(*named)),
                    _ => (None, None),
                }
            }
            Err(e) => {
                debug!(error = %e, "container count evaluation failed");
                (None, None)
            }
        }
    }

    /// Expands a variables-reference handle into its children.
    pub async fn expand(
        &self,
        cdp: &Cdp,
        reference: u32,
        filter: Option<&VariablesArgumentsFilter>,
        start: Option<i64>,
        count: Option<i64>,
    ) -> Result<Vec<Variable>> {
        let container = {
            let session = self.state.lock().await;
            session.variable_handles.lookup(reference).cloned()
        };
        let Some(container) = container else {
            return Ok(Vec::new());
        };

        match container {
            VariableContainer::Exception(exception) => {
                Ok(vec![self.to_variable(cdp, "exception", &exception, true).await])
            }
            VariableContainer::Object {
                object_id,
                scope,
                this_obj,
                return_value,
            } => {
                if let (Some(start), Some(count)) = (start, count) {
                    if let Some(filter) = filter {
                        return self
                            .expand_paged(cdp, &object_id, filter, start, count)
                            .await;
                    }
                }
                self.expand_object(cdp, &object_id, scope.as_ref(), this_obj, return_value)
                    .await
            }
        }
    }

    async fn expand_object(
        &self,
        cdp: &Cdp,
        object_id: &str,
        scope: Option<&ScopeBinding>,
        this_obj: Option<RemoteObject>,
        return_value: Option<RemoteObject>,
    ) -> Result<Vec<Variable>> {
        let accessors = cdp
            .get_properties(GetPropertiesParams {
                object_id: object_id.to_string(),
                own_properties: Some(false),
                accessor_properties_only: Some(true),
                generate_preview: Some(true),
            })
            .await?;
        let own = cdp
            .get_properties(GetPropertiesParams {
                object_id: object_id.to_string(),
                own_properties: Some(true),
                accessor_properties_only: Some(false),
                generate_preview: Some(true),
            })
            .await?;

        // Merge by name; own properties win over accessor-only entries.
        let mut merged: HashMap<String, PropertyDescriptor> = HashMap::new();
        for descriptor in accessors.result.into_iter().chain(own.result) {
            merged.insert(descriptor.name.clone(), descriptor);
        }

        let mut variables = Vec::with_capacity(merged.len());
        for descriptor in merged.into_values() {
            variables.push(
                self.property_to_variable(cdp, object_id, &descriptor)
                    .await,
            );
        }

        for internal in own.internal_properties.unwrap_or_default() {
            if let Some(value) = &internal.value {
                variables.push(self.to_variable(cdp, &internal.name, value, true).await);
            }
        }

        if scope.is_some() {
            if let Some(this_obj) = &this_obj {
                variables.push(self.to_variable(cdp, "this", this_obj, true).await);
            }
            if let Some(return_value) = &return_value {
                variables.push(self.to_variable(cdp, "Return value", return_value, true).await);
            }
        }

        variables.sort_by(|a, b| compare_variable_names(&a.name, &b.name));
        Ok(variables)
    }

    async fn property_to_variable(
        &self,
        cdp: &Cdp,
        owning_object_id: &str,
        descriptor: &PropertyDescriptor,
    ) -> Variable {
        let has_getter = descriptor
            .get
            .as_ref()
            .is_some_and(|get| get.kind == "function");

        if has_getter {
            let invoked = cdp
                .call_function_on(CallFunctionOnParams {
                    object_id: owning_object_id.to_string(),
                    function_declaration: GRAB_GETTER_VALUE.to_string(),
                    arguments: Some(vec![CallArgument {
                        value: Some(Value::String(descriptor.name.clone())),
                        ..Default::default()
                    }]),
                    silent: Some(true),
                    generate_preview: Some(true),
                    ..Default::default()
                })
                .await;
            return match invoked {
                Ok(result) => {
                    if let Some(details) = result.exception_details {
                        // A throwing getter is data, not a failure.
                        leaf_variable(&descriptor.name, details.message())
                    } else {
                        self.to_variable(cdp, &descriptor.name, &result.result, true)
                            .await
                    }
                }
                Err(e) => leaf_variable(&descriptor.name, e.to_string()),
            };
        }

        if descriptor.set.is_some() && descriptor.value.is_none() {
            return leaf_variable(&descriptor.name, "setter");
        }

        match &descriptor.value {
            Some(value) => self.to_variable(cdp, &descriptor.name, value, true).await,
            None => leaf_variable(&descriptor.name, "undefined"),
        }
    }

    /// Paged retrieval: a helper evaluated on the target slices the index or
    /// name list, and the helper's result array is expanded, keeping only
    /// indexed entries.
    async fn expand_paged(
        &self,
        cdp: &Cdp,
        object_id: &str,
        filter: &VariablesArgumentsFilter,
        start: i64,
        count: i64,
    ) -> Result<Vec<Variable>> {
        let declaration = match filter {
            VariablesArgumentsFilter::Indexed => GET_INDEXED_VARIABLES,
            VariablesArgumentsFilter::Named => GET_NAMED_VARIABLES,
        };

        let sliced = cdp
            .call_function_on(CallFunctionOnParams {
                object_id: object_id.to_string(),
                function_declaration: declaration.to_string(),
                arguments: Some(vec![
                    CallArgument {
                        value: Some(json!(start)),
                        ..Default::default()
                    },
                    CallArgument {
                        value: Some(json!(count)),
                        ..Default::default()
                    },
                ]),
                silent: Some(true),
                ..Default::default()
            })
            .await?;
        if let Some(details) = sliced.exception_details {
            return Err(Error::Evaluate(details.message()));
        }
        let Some(slice_id) = sliced.result.object_id else {
            return Ok(Vec::new());
        };

        let mut variables = self.expand_object(cdp, &slice_id, None, None, None).await?;
        variables.retain(|v| is_indexed_name(&v.name));
        Ok(variables)
    }

    /// Builds the DAP scopes for one paused frame. The first scope carries
    /// the frame's `this` and return value; an active exception contributes a
    /// synthetic scope at the front.
    pub async fn scopes(&self, frame: &CallFrame) -> Vec<Scope> {
        let mut session = self.state.lock().await;
        let mut scopes = Vec::with_capacity(frame.scope_chain.len() + 1);

        for (index, entry) in frame.scope_chain.iter().enumerate() {
            let reference = match &entry.object.object_id {
                Some(object_id) => session.variable_handles.create(VariableContainer::Object {
                    object_id: object_id.clone(),
                    scope: Some(ScopeBinding {
                        call_frame_id: frame.call_frame_id.clone(),
                        scope_number: index as i64,
                    }),
                    this_obj: (index == 0).then(|| frame.this.clone()).flatten(),
                    return_value: (index == 0).then(|| frame.return_value.clone()).flatten(),
                }),
                None => 0,
            };
            scopes.push(Scope {
                name: capitalize_first(&entry.kind),
                variables_reference: reference as i64,
                expensive: entry.kind == "global",
                ..Default::default()
            });
        }

        if let Some(exception) = session.exception.clone() {
            let container = match &exception.object_id {
                Some(object_id) => VariableContainer::object(object_id.clone()),
                None => VariableContainer::Exception(exception),
            };
            let reference = session.variable_handles.create(container);
            scopes.insert(
                0,
                Scope {
                    name: "Exception".to_string(),
                    variables_reference: reference as i64,
                    expensive: false,
                    ..Default::default()
                },
            );
        }

        scopes
    }

    /// Evaluates an expression in a frame or, absent one, in the page's
    /// default context.
    pub async fn evaluate(&self, cdp: &Cdp, args: &EvaluateArguments) -> Result<Variable> {
        let frame = match args.frame_id {
            Some(frame_id) => {
                let session = self.state.lock().await;
                session.frame_by_id(frame_id as u32).cloned()
            }
            None => None,
        };

        let response = match frame {
            Some(frame) => {
                cdp.evaluate_on_call_frame(EvaluateOnCallFrameParams {
                    call_frame_id: frame.call_frame_id,
                    expression: args.expression.clone(),
                    object_group: Some("console".to_string()),
                    include_command_line_api: Some(true),
                    generate_preview: Some(true),
                    ..Default::default()
                })
                .await?
            }
            None => {
                cdp.evaluate(EvaluateParams {
                    expression: args.expression.clone(),
                    context_id: Some(1),
                    generate_preview: Some(true),
                    ..Default::default()
                })
                .await?
            }
        };

        if let Some(details) = response.exception_details {
            return Err(Error::Evaluate(details.message()));
        }

        let mut variable = self.to_variable(cdp, "", &response.result, false).await;

        let in_repl = matches!(args.context, Some(EvaluateArgumentsContext::Repl));
        if !in_repl && variable.value.starts_with("ReferenceError: ") {
            variable.value = NOT_AVAILABLE_MSG.to_string();
            variable.variables_reference = 0;
        }

        Ok(variable)
    }

    /// Sets a scope variable or an object property to the value an
    /// expression evaluates to, returning the new display string.
    pub async fn set_variable(&self, cdp: &Cdp, args: &SetVariableArguments) -> Result<Variable> {
        let container = {
            let session = self.state.lock().await;
            session
                .variable_handles
                .lookup(args.variables_reference as u32)
                .cloned()
        };
        let Some(VariableContainer::Object {
            object_id, scope, ..
        }) = container
        else {
            return Err(Error::SetValueNotSupported);
        };

        let evaluated = self.evaluate_silently(cdp, &args.value).await?;

        match scope {
            Some(binding) => {
                cdp.set_variable_value(chrome_cdp::types::SetVariableValueParams {
                    scope_number: binding.scope_number,
                    variable_name: args.name.clone(),
                    new_value: CallArgument::from_remote(&evaluated),
                    call_frame_id: binding.call_frame_id,
                })
                .await?;
            }
            None => {
                let applied = cdp
                    .call_function_on(CallFunctionOnParams {
                        object_id,
                        function_declaration: SET_PROPERTY_VALUE.to_string(),
                        arguments: Some(vec![
                            CallArgument {
                                value: Some(Value::String(args.name.clone())),
                                ..Default::default()
                            },
                            CallArgument::from_remote(&evaluated),
                        ]),
                        silent: Some(true),
                        ..Default::default()
                    })
                    .await?;
                if let Some(details) = applied.exception_details {
                    return Err(Error::Evaluate(details.message()));
                }
            }
        }

        Ok(self.to_variable(cdp, &args.name, &evaluated, true).await)
    }

    async fn evaluate_silently(&self, cdp: &Cdp, expression: &str) -> Result<RemoteObject> {
        let top_frame = {
            let session = self.state.lock().await;
            session.top_frame().cloned()
        };

        let response: EvaluateResult = match top_frame {
            Some(frame) => {
                cdp.evaluate_on_call_frame(EvaluateOnCallFrameParams {
                    call_frame_id: frame.call_frame_id,
                    expression: expression.to_string(),
                    object_group: Some("console".to_string()),
                    silent: Some(true),
                    ..Default::default()
                })
                .await?
            }
            None => {
                cdp.evaluate(EvaluateParams {
                    expression: expression.to_string(),
                    silent: Some(true),
                    ..Default::default()
                })
                .await?
            }
        };

        if let Some(details) = response.exception_details {
            return Err(Error::Evaluate(details.message()));
        }
        Ok(response.result)
    }

    /// Completion targets for a partially typed expression.
    pub async fn completions(
        &self,
        cdp: &Cdp,
        args: &CompletionsArguments,
    ) -> Result<Vec<CompletionItem>> {
        let prefix = prefix_at_column(&args.text, args.column);

        if let Some(dot) = prefix.rfind('.') {
            let receiver = &prefix[..dot];
            let expression = format!(
                "(function(x){{var a=[];for(var o=x;o;o=o.__proto__)a.push(Object.getOwnPropertyNames(o));return a}})({receiver})"
            );
            let names = self
                .evaluate_name_lists(cdp, args.frame_id, &expression)
                .await?;
            return Ok(completion_items(names, CompletionItemType::Property));
        }

        match args.frame_id {
            Some(frame_id) => {
                let frame = {
                    let session = self.state.lock().await;
                    session.frame_by_id(frame_id as u32).cloned()
                };
                let frame = frame.ok_or(Error::CompletionsStackFrameNotValid)?;

                let mut names = Vec::new();
                for entry in &frame.scope_chain {
                    let Some(object_id) = entry.object.object_id.clone() else {
                        continue;
                    };
                    let properties = cdp
                        .get_properties(GetPropertiesParams {
                            object_id,
                            own_properties: Some(true),
                            ..Default::default()
                        })
                        .await?;
                    names.extend(properties.result.into_iter().map(|p| p.name));
                }
                Ok(completion_items(names, CompletionItemType::Property))
            }
            None => {
                let expression = "(function(x){var a=[];for(var o=x;o;o=o.__proto__)a.push(Object.getOwnPropertyNames(o));return a})(this)".to_string();
                let names = self.evaluate_name_lists(cdp, None, &expression).await?;
                Ok(completion_items(names, CompletionItemType::Property))
            }
        }
    }

    async fn evaluate_name_lists(
        &self,
        cdp: &Cdp,
        frame_id: Option<i64>,
        expression: &str,
    ) -> Result<Vec<String>> {
        let frame = match frame_id {
            Some(frame_id) => {
                let session = self.state.lock().await;
                session.frame_by_id(frame_id as u32).cloned()
            }
            None => None,
        };

        let response = match frame {
            Some(frame) => {
                cdp.evaluate_on_call_frame(EvaluateOnCallFrameParams {
                    call_frame_id: frame.call_frame_id,
                    expression: expression.to_string(),
                    silent: Some(true),
                    return_by_value: Some(true),
                    ..Default::default()
                })
                .await?
            }
            None => {
                cdp.evaluate(EvaluateParams {
                    expression: expression.to_string(),
                    silent: Some(true),
                    return_by_value: Some(true),
                    ..Default::default()
                })
                .await?
            }
        };

        if let Some(details) = response.exception_details {
            return Err(Error::Evaluate(details.message()));
        }

        let lists: Vec<Vec<String>> = response
            .result
            .value
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        Ok(lists.into_iter().flatten().collect())
    }
}

fn leaf_variable(name: &str, value: impl Into<String>) -> Variable {
    Variable {
        name: name.to_string(),
        value: value.into(),
        variables_reference: 0,
        ..Default::default()
    }
}

fn render_primitive(obj: &RemoteObject, stringify: bool) -> String {
    match &obj.value {
        Some(Value::String(s)) if !stringify => s.clone(),
        Some(value) => value.to_string(),
        None => obj.description_or_empty().to_string(),
    }
}

fn object_description(obj: &RemoteObject) -> String {
    let description = obj.description_or_empty();
    match obj.subtype.as_deref() {
        Some("error") => description
            .split('\n')
            .next()
            .unwrap_or(description)
            .to_string(),
        Some("promise") | Some("generator") => {
            let status = obj.preview.as_ref().and_then(|preview| {
                preview
                    .properties
                    .iter()
                    .find(|p| {
                        matches!(
                            p.name.as_str(),
                            "[[PromiseState]]" | "[[PromiseStatus]]" | "[[GeneratorStatus]]"
                        )
                    })
                    .and_then(|p| p.value.clone())
            });
            match status {
                Some(status) => format!("{description} {{ {status} }}"),
                None => description.to_string(),
            }
        }
        _ => description.to_string(),
    }
}

/// De-duplicates preserving first occurrence, drops indexed names and wraps
/// the survivors as completion items.
fn completion_items(names: Vec<String>, kind: CompletionItemType) -> Vec<CompletionItem> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter(|name| !is_indexed_name(name) && seen.insert(name.clone()))
        .map(|label| CompletionItem {
            label,
            type_field: Some(kind.clone()),
            ..Default::default()
        })
        .collect()
}

/// The typed prefix: everything left of the (1-based) cursor column.
fn prefix_at_column(text: &str, column: i64) -> &str {
    if column <= 0 {
        return text;
    }
    let mut end = (column as usize - 1).min(text.len());
    while end < text.len() && !text.is_char_boundary(end) {
        end += 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformers::{DirectPathTransformer, DisabledSourceMaps, TransformerPipeline};
    use async_trait::async_trait;
    use chrome_cdp::{RpcClient, RpcError};

    struct UnreachableClient;

    #[async_trait]
    impl RpcClient for UnreachableClient {
        async fn call(&self, method: &str, _params: Value) -> std::result::Result<Value, RpcError> {
            panic!("unexpected CDP call: {method}");
        }
    }

    fn engine() -> (VariableEngine, Cdp) {
        let pipeline =
            TransformerPipeline::new(Box::new(DisabledSourceMaps), Box::new(DirectPathTransformer));
        let state = Arc::new(Mutex::new(Session::new(pipeline)));
        (
            VariableEngine::new(state),
            Cdp::new(Arc::new(UnreachableClient)),
        )
    }

    fn obj(value: Value) -> RemoteObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_is_indexed_name() {
        assert!(is_indexed_name("0"));
        assert!(is_indexed_name("7"));
        assert!(is_indexed_name("123"));
        assert!(!is_indexed_name("007"));
        assert!(!is_indexed_name(""));
        assert!(!is_indexed_name("x1"));
        assert!(!is_indexed_name("1x"));
        assert!(!is_indexed_name("-1"));
    }

    #[test]
    fn test_comparator_orders_indexed_before_named() {
        let mut names = vec!["b", "10", "a", "2", "length"];
        names.sort_by(|a, b| compare_variable_names(a, b));
        assert_eq!(names, vec!["2", "10", "a", "b", "length"]);
    }

    #[tokio::test]
    async fn test_primitive_round_trips() {
        let (engine, cdp) = engine();

        let infinity = engine
            .to_variable(
                &cdp,
                "n",
                &obj(json!({"type": "number", "description": "Infinity", "unserializableValue": "Infinity"})),
                true,
            )
            .await;
        assert_eq!(infinity.value, "Infinity");

        let undefined = engine
            .to_variable(&cdp, "u", &obj(json!({"type": "undefined"})), true)
            .await;
        assert_eq!(undefined.value, "undefined");

        let null = engine
            .to_variable(&cdp, "z", &obj(json!({"type": "object", "subtype": "null"})), true)
            .await;
        assert_eq!(null.value, "null");
        assert_eq!(null.variables_reference, 0);
    }

    #[tokio::test]
    async fn test_string_stringification_is_optional() {
        let (engine, cdp) = engine();
        let quoted = engine
            .to_variable(&cdp, "s", &obj(json!({"type": "string", "value": "hi"})), true)
            .await;
        assert_eq!(quoted.value, "\"hi\"");

        let raw = engine
            .to_variable(&cdp, "s", &obj(json!({"type": "string", "value": "hi"})), false)
            .await;
        assert_eq!(raw.value, "hi");
    }

    #[tokio::test]
    async fn test_function_description_truncation() {
        let (engine, cdp) = engine();

        let block = engine
            .to_variable(
                &cdp,
                "f",
                &obj(json!({
                    "type": "function",
                    "objectId": "1",
                    "description": "function add(a, b) { return a + b; }"
                })),
                true,
            )
            .await;
        assert_eq!(block.value, "function add(a, b) { … }");
        assert!(block.variables_reference > 0);

        let arrow = engine
            .to_variable(
                &cdp,
                "f",
                &obj(json!({
                    "type": "function",
                    "description": "(a, b) => a + b"
                })),
                true,
            )
            .await;
        assert_eq!(arrow.value, "(a, b) => …");
    }

    #[tokio::test]
    async fn test_internal_location_is_a_leaf() {
        let (engine, cdp) = engine();
        let loc = engine
            .to_variable(
                &cdp,
                "l",
                &obj(json!({"type": "object", "subtype": "internal#location", "objectId": "4"})),
                true,
            )
            .await;
        assert_eq!(loc.value, "internal#location");
        assert_eq!(loc.variables_reference, 0);
    }

    #[tokio::test]
    async fn test_array_counts_from_preview() {
        let (engine, cdp) = engine();
        let array = engine
            .to_variable(
                &cdp,
                "a",
                &obj(json!({
                    "type": "object",
                    "subtype": "array",
                    "objectId": "2",
                    "description": "Array(3)",
                    "preview": {
                        "overflow": false,
                        "properties": [
                            {"name": "0", "type": "number", "value": "1"},
                            {"name": "1", "type": "number", "value": "2"},
                            {"name": "2", "type": "number", "value": "3"},
                            {"name": "extra", "type": "string", "value": "x"}
                        ]
                    }
                })),
                true,
            )
            .await;
        assert_eq!(array.indexed_variables, Some(3));
        assert_eq!(array.named_variables, Some(1));
        assert!(array.variables_reference > 0);
    }

    #[tokio::test]
    async fn test_map_counts_include_entries_slot() {
        let (engine, cdp) = engine();
        let map = engine
            .to_variable(
                &cdp,
                "m",
                &obj(json!({
                    "type": "object",
                    "subtype": "map",
                    "objectId": "3",
                    "description": "Map(2)",
                    "preview": {
                        "overflow": false,
                        "properties": [],
                        "entries": [
                            {"value": {"overflow": false, "properties": []}},
                            {"value": {"overflow": false, "properties": []}}
                        ]
                    }
                })),
                true,
            )
            .await;
        assert_eq!(map.indexed_variables, Some(0));
        assert_eq!(map.named_variables, Some(3));
    }

    #[tokio::test]
    async fn test_error_description_truncated_at_newline() {
        let (engine, cdp) = engine();
        let error = engine
            .to_variable(
                &cdp,
                "e",
                &obj(json!({
                    "type": "object",
                    "subtype": "error",
                    "objectId": "5",
                    "description": "Error: boom\n    at foo (a.js:1:1)"
                })),
                true,
            )
            .await;
        assert_eq!(error.value, "Error: boom");
    }

    #[tokio::test]
    async fn test_promise_status_suffix() {
        let (engine, cdp) = engine();
        let promise = engine
            .to_variable(
                &cdp,
                "p",
                &obj(json!({
                    "type": "object",
                    "subtype": "promise",
                    "objectId": "6",
                    "description": "Promise",
                    "preview": {
                        "overflow": false,
                        "properties": [
                            {"name": "[[PromiseState]]", "type": "string", "value": "pending"}
                        ]
                    }
                })),
                true,
            )
            .await;
        assert_eq!(promise.value, "Promise { pending }");
    }

    #[test]
    fn test_prefix_at_column() {
        assert_eq!(prefix_at_column("foo.ba", 7), "foo.ba");
        assert_eq!(prefix_at_column("foo.ba", 5), "foo.");
        assert_eq!(prefix_at_column("foo", 1), "");
    }

    #[test]
    fn test_completion_items_dedupe_and_drop_indexed() {
        let items = completion_items(
            vec!["a".into(), "0".into(), "b".into(), "a".into()],
            CompletionItemType::Property,
        );
        let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "b"]);
    }
}
