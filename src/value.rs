use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableType {
    Int,
    Float,
    String,
    Bool,
    /// No inferred type. Never the declared type of a variable.
    Unknown,
}

impl VariableType {
    /// Maps a declaration keyword onto its type.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "int" => Some(VariableType::Int),
            "float" => Some(VariableType::Float),
            "string" => Some(VariableType::String),
            "bool" => Some(VariableType::Bool),
            _ => None,
        }
    }
}

impl Display for VariableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VariableType::Int => "int",
            VariableType::Float => "float",
            VariableType::String => "string",
            VariableType::Bool => "bool",
            VariableType::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    Bool(bool),
    String(String),
}

impl Value {
    /// The value a fresh variable of `ty` starts out with.
    pub fn default_for(ty: VariableType) -> Option<Self> {
        match ty {
            VariableType::Int => Some(Value::Int(0)),
            VariableType::Float => Some(Value::Float(0.0)),
            VariableType::String => Some(Value::String(String::new())),
            VariableType::Bool => Some(Value::Bool(false)),
            VariableType::Unknown => None,
        }
    }

    pub fn ty(&self) -> VariableType {
        match self {
            Value::Int(_) => VariableType::Int,
            Value::Float(_) => VariableType::Float,
            Value::Bool(_) => VariableType::Bool,
            Value::String(_) => VariableType::String,
        }
    }

    /// Converts `self` so it can be stored in a variable of type `target`.
    ///
    /// Int into Float is the only implicit conversion; every other pairing
    /// must already match.
    pub fn coerce_to(self, target: VariableType) -> Result<Value, Value> {
        match (self, target) {
            (Value::Int(i), VariableType::Float) => Ok(Value::Float(i as f32)),
            (value, target) if value.ty() == target => Ok(value),
            (value, _) => Err(value),
        }
    }

    /// Numeric view of the value, widening Int to Float.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Int(i) => Some(*i as f32),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:.6}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}
