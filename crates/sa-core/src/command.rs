//! Command results: human-readable markdown plus keyed context outputs.

use serde::{Deserialize, Serialize};

/// Result of one adapter command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Markdown shown to the analyst.
    pub readable_output: String,
    /// Context path the outputs are stored under (e.g. `CiscoEmailSecurity.Messages`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs_prefix: Option<String>,
    /// Field that identifies an output entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs_key_field: Option<String>,
    #[serde(default)]
    pub outputs: serde_json::Value,
    /// Unmodified vendor response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<serde_json::Value>,
}

impl CommandResult {
    /// A result with readable text only.
    pub fn readable(readable_output: impl Into<String>) -> Self {
        Self {
            readable_output: readable_output.into(),
            outputs_prefix: None,
            outputs_key_field: None,
            outputs: serde_json::Value::Null,
            raw_response: None,
        }
    }

    pub fn with_outputs(mut self, prefix: &str, outputs: serde_json::Value) -> Self {
        self.outputs_prefix = Some(prefix.to_string());
        self.outputs = outputs;
        self
    }

    /// Outputs without a context prefix.
    pub fn with_bare_outputs(mut self, outputs: serde_json::Value) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_key_field(mut self, key_field: &str) -> Self {
        self.outputs_key_field = Some(key_field.to_string());
        self
    }

    pub fn with_raw_response(mut self, raw: serde_json::Value) -> Self {
        self.raw_response = Some(raw);
        self
    }
}

/// A markdown table with a title.
#[derive(Debug, Clone, Default)]
pub struct MarkdownTable {
    title: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl MarkdownTable {
    pub fn new(title: &str, headers: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    /// Adds one row per object, reading each header as a key.
    pub fn push_objects(&mut self, objects: &[serde_json::Value]) {
        for object in objects {
            let cells = self
                .headers
                .iter()
                .map(|h| object.get(h.as_str()).map(cell).unwrap_or_default())
                .collect();
            self.rows.push(cells);
        }
    }

    pub fn render(&self) -> String {
        let mut out = format!("### {}\n", self.title);
        if self.rows.is_empty() {
            out.push_str("**No entries.**\n");
            return out;
        }

        out.push('|');
        for header in &self.headers {
            out.push_str(&escape(header));
            out.push('|');
        }
        out.push_str("\n|");
        for _ in &self.headers {
            out.push_str("---|");
        }
        out.push('\n');

        for row in &self.rows {
            out.push('|');
            for i in 0..self.headers.len() {
                let value = row.get(i).map(String::as_str).unwrap_or("");
                out.push_str(&format!(" {} |", escape(value)));
            }
            out.push('\n');
        }
        out
    }
}

/// Renders a JSON value for a table cell.
pub fn cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items.iter().map(cell).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

fn escape(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', "<br>")
}
