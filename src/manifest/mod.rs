//! Update manifest model and signature injection.
//!
//! The manifest is kept as the JSON document it was read from so fields this
//! crate does not know about survive a rewrite in their original order. Typed
//! access goes through [`UpdateManifest::version`] and
//! [`UpdateManifest::platforms`].

mod store;

pub use store::ManifestStore;

use crate::error::{ReleaseError, Result};
use crate::signing::Signature;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

/// How an artifact filename is matched against a platform entry's url.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// The url contains the filename anywhere
    #[default]
    Substring,
    /// The last path segment of the url equals the filename
    Basename,
}

impl MatchMode {
    /// Whether `url` refers to `filename` under this mode.
    pub fn matches(self, url: &str, filename: &str) -> bool {
        if filename.is_empty() {
            return false;
        }
        match self {
            Self::Substring => url.contains(filename),
            Self::Basename => url_basename(url).is_some_and(|name| name == filename),
        }
    }
}

/// Last path segment of a url, ignoring query and fragment.
///
/// Falls back to splitting on `/` when the url does not parse.
pub fn url_basename(url: &str) -> Option<String> {
    let name = match url::Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string)),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .map(str::to_string),
    };
    name.filter(|n| !n.is_empty())
}

/// Snapshot of one platform entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformEntry {
    /// Platform identifier, e.g. `windows-x86_64`
    pub id: String,
    /// Download url, empty when the entry has none
    pub url: String,
    /// Current signature, empty when unsigned
    pub signature: String,
}

impl PlatformEntry {
    /// Whether the entry carries a download url.
    pub fn has_url(&self) -> bool {
        !self.url.is_empty()
    }
}

/// Update manifest document.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateManifest {
    document: Map<String, Value>,
}

impl UpdateManifest {
    /// Parses manifest text; `origin` names the source in errors.
    ///
    /// # Errors
    ///
    /// `ReleaseError::Manifest` if the text is not JSON, the root is not an
    /// object, or `platforms` is missing or not an object.
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| ReleaseError::Manifest {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_value(value).map_err(|reason| ReleaseError::Manifest {
            path: origin.to_path_buf(),
            reason,
        })
    }

    /// Wraps an already parsed document.
    pub fn from_value(value: Value) -> std::result::Result<Self, String> {
        let Value::Object(document) = value else {
            return Err("manifest root must be an object".into());
        };
        match document.get("platforms") {
            Some(Value::Object(_)) => Ok(Self { document }),
            Some(_) => Err("'platforms' must be an object".into()),
            None => Err("missing 'platforms'".into()),
        }
    }

    /// Top-level `version`, if present.
    pub fn version(&self) -> Option<&str> {
        self.document.get("version").and_then(Value::as_str)
    }

    /// Top-level `notes`, if present.
    pub fn notes(&self) -> Option<&str> {
        self.document.get("notes").and_then(Value::as_str)
    }

    /// Top-level `pub_date`, if present.
    pub fn pub_date(&self) -> Option<&str> {
        self.document.get("pub_date").and_then(Value::as_str)
    }

    /// Platform entries in document order.
    ///
    /// Entries that are not objects are reported with empty url and signature.
    pub fn platforms(&self) -> Vec<PlatformEntry> {
        self.platform_map()
            .map(|platforms| {
                platforms
                    .iter()
                    .map(|(id, entry)| PlatformEntry {
                        id: id.clone(),
                        url: string_field(entry, "url"),
                        signature: string_field(entry, "signature"),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Overwrites the signature of every entry whose url names `filename`.
    ///
    /// Returns the number of entries updated. With zero matches nothing is
    /// modified and a mismatch warning is logged.
    pub fn inject_signature(
        &mut self,
        filename: &str,
        signature: &Signature,
        mode: MatchMode,
    ) -> usize {
        let mut matched = 0;

        if let Some(Value::Object(platforms)) = self.document.get_mut("platforms") {
            for (id, entry) in platforms.iter_mut() {
                let Value::Object(fields) = entry else {
                    continue;
                };
                let qualifies = fields
                    .get("url")
                    .and_then(Value::as_str)
                    .is_some_and(|url| mode.matches(url, filename));
                if qualifies {
                    fields.insert(
                        "signature".to_string(),
                        Value::String(signature.as_str().to_string()),
                    );
                    log::info!("Updated signature for platform {}", id);
                    matched += 1;
                }
            }
        }

        if matched == 0 {
            log::warn!(
                "{}",
                ReleaseError::ManifestMismatch {
                    filename: filename.to_string()
                }
            );
        }
        matched
    }

    /// Pretty JSON with 2-space indentation.
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.document)?)
    }

    /// The underlying document.
    pub fn as_value(&self) -> Value {
        Value::Object(self.document.clone())
    }

    fn platform_map(&self) -> Option<&Map<String, Value>> {
        self.document.get("platforms").and_then(Value::as_object)
    }
}

fn string_field(entry: &Value, field: &str) -> String {
    entry
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
