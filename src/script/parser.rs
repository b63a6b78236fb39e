//! Script parsers, selected by format name or file extension.

use crate::script::ScriptError;
use crate::script::model::TaskScript;
use std::path::Path;

pub trait ScriptParser: Send + Sync {
    fn parse(&self, content: &str) -> Result<TaskScript, ScriptError>;

    /// Whether this parser handles `format` (case-insensitive extension)
    fn supports(&self, format: &str) -> bool;

    fn format_name(&self) -> &'static str;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonScriptParser;

impl ScriptParser for JsonScriptParser {
    fn parse(&self, content: &str) -> Result<TaskScript, ScriptError> {
        serde_json::from_str(content).map_err(|e| ScriptError::parse("JSON", e))
    }

    fn supports(&self, format: &str) -> bool {
        format.eq_ignore_ascii_case("json")
    }

    fn format_name(&self) -> &'static str {
        "JSON"
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct YamlScriptParser;

impl ScriptParser for YamlScriptParser {
    fn parse(&self, content: &str) -> Result<TaskScript, ScriptError> {
        serde_yaml_bw::from_str(content).map_err(|e| ScriptError::parse("YAML", e))
    }

    fn supports(&self, format: &str) -> bool {
        format.eq_ignore_ascii_case("yaml") || format.eq_ignore_ascii_case("yml")
    }

    fn format_name(&self) -> &'static str {
        "YAML"
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TomlScriptParser;

impl ScriptParser for TomlScriptParser {
    fn parse(&self, content: &str) -> Result<TaskScript, ScriptError> {
        toml::from_str(content).map_err(|e| ScriptError::parse("TOML", e))
    }

    fn supports(&self, format: &str) -> bool {
        format.eq_ignore_ascii_case("toml")
    }

    fn format_name(&self) -> &'static str {
        "TOML"
    }
}

pub struct ScriptParserFactory;

impl ScriptParserFactory {
    fn parsers() -> [&'static dyn ScriptParser; 3] {
        [&JsonScriptParser, &YamlScriptParser, &TomlScriptParser]
    }

    pub fn for_format(format: &str) -> Result<&'static dyn ScriptParser, ScriptError> {
        Self::parsers()
            .into_iter()
            .find(|parser| parser.supports(format))
            .ok_or_else(|| ScriptError::UnsupportedFormat(format.to_string()))
    }

    /// Pick a parser from the text after the last `.` in the file name
    pub fn for_file(path: impl AsRef<Path>) -> Result<&'static dyn ScriptParser, ScriptError> {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        Self::for_format(extension)
    }
}
