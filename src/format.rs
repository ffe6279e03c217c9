use anyhow::{Context as _, Result, bail};
use serde::Serialize;
use std::str::FromStr;

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Pretty-printed JSON, the stored record shapes
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => bail!("Invalid format '{s}'. Use: text or json"),
        }
    }
}

impl OutputFormat {
    /// Render `data` as JSON, or with `text` for the text format.
    pub fn render<T: Serialize>(self, data: &T, text: impl FnOnce(&T) -> String) -> Result<String> {
        match self {
            Self::Json => serde_json::to_string_pretty(data).context("JSON serialization failed"),
            Self::Text => Ok(text(data)),
        }
    }

    /// Render and print to stdout.
    pub fn print<T: Serialize>(self, data: &T, text: impl FnOnce(&T) -> String) -> Result<()> {
        println!("{}", self.render(data, text)?);
        Ok(())
    }
}
