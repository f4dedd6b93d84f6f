use anyhow::Result;
use clap::ValueEnum;
use peer_flow::report::print_table;
use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

/// Output format shared by the read-only commands
#[derive(Debug, Clone, Copy, Default, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    #[value(name = "table")]
    Table,
    #[value(name = "json")]
    Json,
    #[value(name = "json-pretty")]
    JsonPretty,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
            Self::JsonPretty => write!(f, "json-pretty"),
        }
    }
}

/// Types the CLI can print in any [`OutputFormat`]
pub trait Exportable {
    fn export(&self, format: OutputFormat) -> Result<String>;
}

pub fn to_json_string<T: Serialize>(data: &T, pretty: bool) -> Result<String> {
    if pretty {
        Ok(serde_json::to_string_pretty(data)?)
    } else {
        Ok(serde_json::to_string(data)?)
    }
}

/// Titled table sections, or the whole value as JSON
pub fn export_sections<T, R>(data: &T, sections: &[(&str, &[R])], format: OutputFormat) -> Result<String>
where
    T: Serialize,
    R: Tabled + Clone,
{
    match format {
        OutputFormat::Table => {
            let blocks: Vec<String> = sections
                .iter()
                .map(|(title, rows)| {
                    format!("{title} ({})\n{}", rows.len(), print_table(rows.iter().cloned()))
                })
                .collect();
            Ok(blocks.join("\n\n"))
        }
        OutputFormat::Json => to_json_string(data, false),
        OutputFormat::JsonPretty => to_json_string(data, true),
    }
}
