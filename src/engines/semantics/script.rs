//! Assembly of the tracing script sent to the evaluation service.

use serde_json::Value;
use std::collections::BTreeMap;

/// Rewrites every `name = ...` line of `settings` to `name_setting = ...`.
pub fn rename_settings(settings: &str) -> String {
    settings
        .lines()
        .map(|line| match line.find('=') {
            Some(pos) => format!("{}_setting ={}", line[..pos].trim_end(), &line[pos + 1..]),
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wraps an already indented `body` so each variable is traced once per input case.
///
/// `body` is expected to be indented by four spaces, as produced by
/// `format_program(.., "    ")`.
pub fn build_trace_script(helper_code: &str, variables: &[String], settings: &str, body: &str) -> String {
    let quoted: Vec<String> = variables.iter().map(|v| format!("'{}'", v)).collect();
    let setting_names: Vec<String> = variables.iter().map(|v| format!("{}_setting", v)).collect();
    // `for a, in zip(..)` unpacks the 1-tuples zip yields for a single variable
    let targets = if variables.len() == 1 {
        format!("{},", variables[0])
    } else {
        variables.join(",")
    };

    let mut script = String::new();
    script.push_str(helper_code);
    script.push('\n');
    script.push_str(&format!("variables = [{}]\n", quoted.join(",")));
    script.push_str(&rename_settings(settings));
    script.push_str("\n\ntrace = {}\nfor v in variables:\n    trace[v] = []\n\n");
    script.push_str(&format!("for {} in zip({}):\n", targets, setting_names.join(",")));
    script.push_str(body);
    if !body.ends_with('\n') {
        script.push('\n');
    }
    script.push_str("    for v in variables:\n        trace[v].append(locals()[v])\n\n");
    script.push_str("for v in variables:\n    locals()[v] = trace[v]\n");
    script
}

/// Python literal for a JSON value.
pub fn to_python_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => Value::String(s.clone()).to_string(),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(to_python_literal).collect::<Vec<_>>().join(", ")
        ),
        Value::Object(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(k, v)| format!("{}: {}", Value::String(k.clone()), to_python_literal(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Variable settings binding each variable to its per-case input list.
pub fn settings_from_values(values: &BTreeMap<String, Vec<Value>>) -> String {
    values
        .iter()
        .map(|(name, cases)| format!("{} = {}\n", name, to_python_literal(&Value::Array(cases.clone()))))
        .collect()
}
