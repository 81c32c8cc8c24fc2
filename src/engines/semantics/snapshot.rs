use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Declared type of a traced variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VariableType {
    Bool,
    Char,
    Int,
    Float,
    String,
    #[serde(alias = "List_Bool")]
    ListBool,
    #[serde(alias = "List_Int")]
    ListInt,
    #[serde(alias = "List_Float")]
    ListFloat,
    #[serde(alias = "List_String")]
    ListString,
}

impl VariableType {
    pub fn is_list(self) -> bool {
        matches!(
            self,
            VariableType::ListBool | VariableType::ListInt | VariableType::ListFloat | VariableType::ListString
        )
    }

    /// Element type of a list type; scalars map to themselves.
    pub fn element(self) -> VariableType {
        match self {
            VariableType::ListBool => VariableType::Bool,
            VariableType::ListInt => VariableType::Int,
            VariableType::ListFloat => VariableType::Float,
            VariableType::ListString => VariableType::String,
            other => other,
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VariableType::Bool => "Bool",
            VariableType::Char => "Char",
            VariableType::Int => "Int",
            VariableType::Float => "Float",
            VariableType::String => "String",
            VariableType::ListBool => "List_Bool",
            VariableType::ListInt => "List_Int",
            VariableType::ListFloat => "List_Float",
            VariableType::ListString => "List_String",
        };
        f.write_str(name)
    }
}

/// Per-case input values for each variable, keyed by name.
pub type VariableValues = BTreeMap<String, Vec<Value>>;

/// Per-variable value sequences observed over all evaluated cases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticSnapshot {
    values: BTreeMap<String, Vec<Value>>,
}

impl SemanticSnapshot {
    pub fn new(values: BTreeMap<String, Vec<Value>>) -> Self {
        Self { values }
    }

    pub fn get(&self, variable: &str) -> Option<&[Value]> {
        self.values.get(variable).map(Vec::as_slice)
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Numbers compare by value, so `1` and `1.0` agree.
    pub fn differs_on(&self, other: &SemanticSnapshot, variable: &str) -> bool {
        match (self.get(variable), other.get(variable)) {
            (Some(a), Some(b)) => !sequences_equal(a, b),
            (a, b) => a.is_some() || b.is_some(),
        }
    }

    /// Identical on every listed variable.
    pub fn same_on(&self, other: &SemanticSnapshot, variables: &[String]) -> bool {
        variables.iter().all(|v| !self.differs_on(other, v))
    }
}

fn sequences_equal(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => sequences_equal(x, y),
        _ => a == b,
    }
}

impl FromIterator<(String, Vec<Value>)> for SemanticSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Value>)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
