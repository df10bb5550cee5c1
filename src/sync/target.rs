//! Config targets and their format-specific field locators.

use crate::error::{ReleaseError, Result};
use regex::Regex;
use serde::Deserialize;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// One config file that carries a copy of the version.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ConfigTarget {
    /// Display name used in reports
    pub name: String,
    /// File location
    pub path: PathBuf,
    /// How to find the version inside the file
    pub format: TargetFormat,
}

/// Format-specific locator for the version field.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TargetFormat {
    /// JSON document, dot-separated key path (`package.version`)
    Json {
        /// Dot-separated key path
        key_path: String,
    },
    /// TOML document, dot-separated key path, edited in place with `toml_edit`
    Toml {
        /// Dot-separated key path
        key_path: String,
    },
    /// Any text; the first capture group of the first match is the field
    Text {
        /// Regular expression with one capture group
        pattern: String,
    },
}

impl ConfigTarget {
    /// Creates a target.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, format: TargetFormat) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            format,
        }
    }

    /// Human-readable locator (key path or pattern).
    pub fn field(&self) -> &str {
        match &self.format {
            TargetFormat::Json { key_path } | TargetFormat::Toml { key_path } => key_path,
            TargetFormat::Text { pattern } => pattern,
        }
    }

    /// Reads the current value of the field.
    ///
    /// # Errors
    ///
    /// `MissingField` if the locator matches nothing; IO and format errors
    /// if the file cannot be read or parsed.
    pub fn read_value(&self) -> Result<String> {
        let content = std::fs::read_to_string(&self.path)?;
        self.format
            .read(&content)?
            .ok_or_else(|| self.missing_field())
    }

    /// Writes `value` into the field, leaving the rest of the file as-is.
    ///
    /// Returns the previous value.
    pub fn write_value(&self, value: &str) -> Result<String> {
        let content = std::fs::read_to_string(&self.path)?;
        let (previous, updated) = self
            .format
            .replace(&content, value)?
            .ok_or_else(|| self.missing_field())?;

        if updated != content {
            std::fs::write(&self.path, updated)?;
        }
        Ok(previous)
    }

    fn missing_field(&self) -> ReleaseError {
        ReleaseError::MissingField {
            path: self.path.clone(),
            field: self.field().to_string(),
        }
    }

    /// Path of the target file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TargetFormat {
    /// Locates the field in `content`; `None` when absent.
    pub fn read(&self, content: &str) -> Result<Option<String>> {
        match self {
            TargetFormat::Json { key_path } => {
                let doc: serde_json::Value = serde_json::from_str(content)?;
                Ok(json_lookup(&doc, key_path)
                    .and_then(|v| v.as_str())
                    .map(String::from))
            }
            TargetFormat::Toml { key_path } => {
                let doc = toml_edit::DocumentMut::from_str(content)?;
                Ok(toml_lookup(doc.as_item(), key_path)
                    .and_then(|item| item.as_str())
                    .map(String::from))
            }
            TargetFormat::Text { pattern } => {
                let re = Regex::new(pattern)?;
                Ok(re
                    .captures(content)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string()))
            }
        }
    }

    /// Replaces the field with `value`; `None` when the field is absent.
    ///
    /// Returns `(previous, updated_content)`.
    pub fn replace(&self, content: &str, value: &str) -> Result<Option<(String, String)>> {
        match self {
            TargetFormat::Json { key_path } => {
                let doc: serde_json::Value = serde_json::from_str(content)?;
                let Some(previous) = json_lookup(&doc, key_path)
                    .and_then(|v| v.as_str())
                    .map(String::from)
                else {
                    return Ok(None);
                };

                let keys: Vec<&str> = key_path.split('.').collect();
                let Some(span) = JsonScanner::new(content).find_string(&keys) else {
                    return Ok(None);
                };

                let literal = serde_json::to_string(value)?;
                let mut updated = String::with_capacity(content.len() + literal.len());
                updated.push_str(&content[..span.start]);
                updated.push_str(&literal);
                updated.push_str(&content[span.end..]);
                Ok(Some((previous, updated)))
            }
            TargetFormat::Toml { key_path } => {
                let mut doc = toml_edit::DocumentMut::from_str(content)?;
                let Some(item) = toml_lookup_mut(doc.as_item_mut(), key_path) else {
                    return Ok(None);
                };
                let Some(slot) = item.as_value_mut() else {
                    return Ok(None);
                };
                let Some(previous) = slot.as_str().map(String::from) else {
                    return Ok(None);
                };

                let decor = slot.decor().clone();
                *slot = toml_edit::Value::from(value);
                *slot.decor_mut() = decor;
                Ok(Some((previous, doc.to_string())))
            }
            TargetFormat::Text { pattern } => {
                let re = Regex::new(pattern)?;
                let Some(span) = re.captures(content).and_then(|caps| caps.get(1)) else {
                    return Ok(None);
                };

                let mut updated = String::with_capacity(content.len());
                updated.push_str(&content[..span.start()]);
                updated.push_str(value);
                updated.push_str(&content[span.end()..]);
                Ok(Some((span.as_str().to_string(), updated)))
            }
        }
    }
}

fn json_lookup<'a>(doc: &'a serde_json::Value, key_path: &str) -> Option<&'a serde_json::Value> {
    key_path
        .split('.')
        .try_fold(doc, |node, key| node.as_object()?.get(key))
}

/// Byte-level walk over an already-validated JSON document.
///
/// Only locates spans; the caller has parsed `content` with `serde_json`
/// first, so malformed input just yields `None`.
struct JsonScanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> JsonScanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Option<()> {
        self.skip_ws();
        (self.peek() == Some(byte)).then(|| self.pos += 1)
    }

    /// Span of the string token at the cursor, quotes included.
    fn string(&mut self) -> Option<Range<usize>> {
        self.skip_ws();
        let start = self.pos;
        if self.peek() != Some(b'"') {
            return None;
        }
        self.pos += 1;
        loop {
            match self.peek()? {
                b'\\' => self.pos += 2,
                b'"' => {
                    self.pos += 1;
                    return Some(start..self.pos);
                }
                _ => self.pos += 1,
            }
        }
    }

    fn skip_value(&mut self) -> Option<()> {
        self.skip_ws();
        match self.peek()? {
            b'"' => self.string().map(drop),
            b'{' | b'[' => {
                let mut depth = 0usize;
                loop {
                    match self.peek()? {
                        b'"' => {
                            self.string()?;
                            continue;
                        }
                        b'{' | b'[' => depth += 1,
                        b'}' | b']' => {
                            depth -= 1;
                            if depth == 0 {
                                self.pos += 1;
                                return Some(());
                            }
                        }
                        _ => {}
                    }
                    self.pos += 1;
                }
            }
            _ => {
                while !matches!(
                    self.peek(),
                    None | Some(b',' | b'}' | b']' | b' ' | b'\t' | b'\n' | b'\r')
                ) {
                    self.pos += 1;
                }
                Some(())
            }
        }
    }

    /// Span of the string value at `keys`, searched from the cursor.
    ///
    /// With duplicate keys the last one wins, matching `serde_json`.
    fn find_string(&mut self, keys: &[&str]) -> Option<Range<usize>> {
        let (first, rest) = keys.split_first()?;
        self.expect(b'{')?;
        self.skip_ws();
        if self.peek() == Some(b'}') {
            return None;
        }

        let mut found = None;
        loop {
            let key_span = self.string()?;
            let key: String = serde_json::from_str(&self.text[key_span]).ok()?;
            self.expect(b':')?;
            self.skip_ws();

            if key == *first {
                let value_start = self.pos;
                found = match (rest.is_empty(), self.peek()) {
                    (true, Some(b'"')) => self.string(),
                    (false, Some(b'{')) => self.find_string(rest),
                    _ => None,
                };
                self.pos = value_start;
            }
            self.skip_value()?;

            self.skip_ws();
            match self.peek()? {
                b',' => self.pos += 1,
                b'}' => {
                    self.pos += 1;
                    return found;
                }
                _ => return None,
            }
        }
    }
}

fn toml_lookup<'a>(root: &'a toml_edit::Item, key_path: &str) -> Option<&'a toml_edit::Item> {
    key_path.split('.').try_fold(root, |node, key| node.get(key))
}

fn toml_lookup_mut<'a>(
    root: &'a mut toml_edit::Item,
    key_path: &str,
) -> Option<&'a mut toml_edit::Item> {
    key_path.split('.').try_fold(root, |node, key| node.get_mut(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_nested_path_is_replaced_without_reordering() {
        let content = "{\n  \"build\": {\n    \"beforeBuildCommand\": \"npm run build\"\n  },\n  \"package\": {\n    \"productName\": \"font-viewer\",\n    \"version\": \"1.0.1\"\n  }\n}\n";
        let format = TargetFormat::Json {
            key_path: "package.version".into(),
        };

        let (previous, updated) = format.replace(content, "1.0.2").unwrap().unwrap();
        assert_eq!(previous, "1.0.1");
        assert_eq!(updated, content.replace("1.0.1", "1.0.2"));
    }

    #[test]
    fn json_write_touches_only_the_version_literal() {
        let content = "{\n    \"name\": \"caf\\u00e9-viewer\",\n    \"version\": \"1.0.1\",\n    \"files\": [\"dist\", \"src\"],\n    \"private\":true\n}";
        let format = TargetFormat::Json {
            key_path: "version".into(),
        };

        let (previous, updated) = format.replace(content, "1.0.2").unwrap().unwrap();
        assert_eq!(previous, "1.0.1");
        assert_eq!(updated, content.replace("1.0.1", "1.0.2"));
        assert_eq!(format.read(&updated).unwrap().as_deref(), Some("1.0.2"));
    }

    #[test]
    fn json_key_path_ignores_same_named_keys_elsewhere() {
        let content = r#"{"dependencies": {"version": "9.9.9", "list": [{"version": "8"}]}, "package": {"note": "a \"version\" here", "version": "1.0.1"}}"#;
        let format = TargetFormat::Json {
            key_path: "package.version".into(),
        };

        let (_, updated) = format.replace(content, "1.0.2").unwrap().unwrap();
        assert_eq!(updated, content.replace("1.0.1", "1.0.2"));
        assert!(updated.contains("\"9.9.9\""));
    }

    #[test]
    fn json_missing_or_non_string_field_is_absent() {
        let format = TargetFormat::Json {
            key_path: "package.version".into(),
        };
        assert_eq!(format.read("{\"version\": \"1.0.0\"}").unwrap(), None);
        assert_eq!(format.read("{\"package\": {\"version\": 3}}").unwrap(), None);
        assert!(format.replace("{\"package\": {}}", "1.0.0").unwrap().is_none());
    }

    #[test]
    fn toml_edit_preserves_comments_and_layout() {
        let content = "[package]\nname = \"font-viewer\"\nversion = \"1.0.1\" # bumped by release\nedition = \"2021\"\n\n[dependencies]\nserde = { version = \"1\" }\n";
        let format = TargetFormat::Toml {
            key_path: "package.version".into(),
        };

        let (previous, updated) = format.replace(content, "1.0.2").unwrap().unwrap();
        assert_eq!(previous, "1.0.1");
        assert_eq!(
            updated,
            content.replacen("\"1.0.1\"", "\"1.0.2\"", 1),
            "only the version literal may change"
        );
    }

    #[test]
    fn text_pattern_replaces_first_match_only() {
        let content = "[package]\nversion = \"1.0.1\"\n\n[dependencies]\ntauri = { version = \"1.5\" }\n";
        let format = TargetFormat::Text {
            pattern: r#"version\s*=\s*["'](.+?)["']"#.into(),
        };

        assert_eq!(format.read(content).unwrap().as_deref(), Some("1.0.1"));
        let (_, updated) = format.replace(content, "1.0.2").unwrap().unwrap();
        assert!(updated.contains("version = \"1.0.2\""));
        assert!(updated.contains("tauri = { version = \"1.5\" }"));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let format = TargetFormat::Text {
            pattern: "version = (".into(),
        };
        assert!(matches!(format.read("x"), Err(ReleaseError::Regex(_))));
    }
}
