//! Subcommand implementations.

pub mod cisco;
pub mod connection;
pub mod fetch;
pub mod xmatters;

use anyhow::Result;
use sa_core::CommandResult;

/// Output format selected with `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

/// Renders a command result: the readable markdown, or the whole result as
/// JSON.
pub fn render_result(result: &CommandResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(result.readable_output.clone()),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
    }
}

pub fn print_result(result: &CommandResult, format: OutputFormat) -> Result<()> {
    println!("{}", render_result(result, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_render_result() {
        let result = CommandResult::readable("### Events\n**No entries.**\n")
            .with_outputs("xMatters.GetEvents", json!({"Events": []}));

        assert_eq!(
            render_result(&result, OutputFormat::Text).unwrap(),
            "### Events\n**No entries.**\n"
        );

        let rendered: serde_json::Value =
            serde_json::from_str(&render_result(&result, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(rendered["outputs_prefix"], "xMatters.GetEvents");
        assert_eq!(rendered["outputs"], json!({"Events": []}));
    }
}
