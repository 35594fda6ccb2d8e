use chrono::SecondsFormat;
use model::core::{
    utils::{encode_bytea, escape_csv_string},
    value::Value,
};

/// Null marker matching the `NULL '\N'` clause of the COPY directive.
pub const NULL_MARKER: &str = "\\N";

/// Encodes one value into its COPY CSV field representation. Structured
/// values are rendered as compact JSON text; null becomes the protocol
/// null marker, never an empty string.
pub struct PgValueEncoder;

impl PgValueEncoder {
    pub fn new() -> Self {
        Self
    }

    pub fn encode_value(&self, value: &Value) -> String {
        match value {
            Value::Null => self.encode_null(),
            Value::String(s) => escape_csv_string(s),
            Value::Json(v) => escape_csv_string(&v.to_string()),
            Value::StringArray(values) => {
                let literal = self.encode_array_literal(values);
                escape_csv_string(&literal)
            }
            Value::Bytes(bytes) => {
                let hex = encode_bytea(bytes);
                escape_csv_string(&hex)
            }
            Value::Boolean(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Uint(v) => v.to_string(),
            Value::Float(v) => ryu::Buffer::new().format(*v).to_string(),
            Value::Uuid(v) => v.to_string(),
            Value::Date(d) => d.to_string(),
            Value::Timestamp(ts) => ts.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }

    pub fn encode_null(&self) -> String {
        NULL_MARKER.to_string()
    }

    fn encode_array_literal(&self, values: &[String]) -> String {
        let mut literal = String::from('{');
        for (idx, value) in values.iter().enumerate() {
            if idx > 0 {
                literal.push(',');
            }
            literal.push_str(&Self::quote_array_item(value));
        }
        literal.push('}');
        literal
    }

    fn quote_array_item(value: &str) -> String {
        let mut quoted = String::from('"');
        for ch in value.chars() {
            match ch {
                '"' => quoted.push_str("\\\""),
                '\\' => quoted.push_str("\\\\"),
                _ => quoted.push(ch),
            }
        }
        quoted.push('"');
        quoted
    }
}

impl Default for PgValueEncoder {
    fn default() -> Self {
        Self::new()
    }
}
