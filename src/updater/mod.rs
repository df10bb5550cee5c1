//! Client-side update checks.
//!
//! [`UpdateOrchestrator`] drives one state machine per process:
//!
//! ```text
//! Idle → Checking → NoUpdate
//!                 → Notified → Downloading → Installing → RestartPending
//!                 → Error          (check failure)
//!                                  Installing → Error (install failure)
//! ```
//!
//! Checks run only when an [`UpdateSignal`] arrives. The manifest source,
//! the installer and the notification surface are collaborators behind
//! traits so the host application decides how each is done.

mod orchestrator;
mod source;

pub use orchestrator::UpdateOrchestrator;
pub use source::ManifestSource;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Whether the process runs as a shipped build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeMode {
    /// Shipped build; checks run and failures are shown to the user
    #[default]
    Production,
    /// Local build; every check short-circuits to idle
    Development,
}

/// Result of asking a source whether an update exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePayload {
    /// Source's own "update available" verdict
    pub has_update: bool,
    /// Version offered by the manifest
    pub version: String,
    /// Version the source believes is running
    pub current_version: String,
    /// Release notes, markdown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Inbound request to check for updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSignal {
    /// Pre-fetched check result; `None` triggers a fresh check
    #[serde(default)]
    pub payload: Option<UpdatePayload>,
}

impl UpdateSignal {
    /// Signal asking for a fresh check.
    pub fn check() -> Self {
        Self::default()
    }

    /// Signal carrying a result obtained elsewhere.
    pub fn with_payload(payload: UpdatePayload) -> Self {
        Self {
            payload: Some(payload),
        }
    }
}

/// Broadcast to presentation layers when an update is announced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAnnouncement {
    /// Version being offered
    pub new_version: String,
    /// Version currently running
    pub current_version: String,
    /// Release notes, markdown
    pub notes: Option<String>,
    /// Source's verdict, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_update: Option<bool>,
}

/// Where the state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePhase {
    /// No check has run yet, or checks are disabled
    #[default]
    Idle,
    /// A check is in flight
    Checking,
    /// The last check found nothing newer
    NoUpdate,
    /// The user was told about an update
    Notified,
    /// Fetching the update
    Downloading,
    /// Applying the update
    Installing,
    /// Waiting to relaunch
    RestartPending,
    /// The last check or install failed
    Error,
}

/// How one signal was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Another check was in flight
    Dropped,
    /// Not running in production mode
    Skipped,
    /// Nothing newer than the running version
    NoUpdate,
    /// An update was found but the user was already notified this session
    Suppressed,
    /// Installed; relaunch requested
    RestartScheduled,
    /// The check or the install failed
    Failed(String),
}

/// Answers "is there an update?".
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Fetches the manifest and reports what it offers.
    async fn check(&self) -> anyhow::Result<UpdatePayload>;
}

/// Applies an update and restarts the application.
#[async_trait]
pub trait UpdateInstaller: Send + Sync {
    /// Downloads the offered version.
    async fn download(&self, update: &UpdatePayload) -> anyhow::Result<()>;

    /// Installs what [`download`](Self::download) fetched.
    async fn install(&self, update: &UpdatePayload) -> anyhow::Result<()>;

    /// Restarts the application.
    async fn relaunch(&self) -> anyhow::Result<()>;
}

/// User-visible notification surface.
pub trait Notifier: Send + Sync {
    /// Shows one notification.
    fn notify(&self, title: &str, body: &str);
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        log::info!("[notification] {}: {}", title, body.replace('\n', " | "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_camel_case_on_the_wire() {
        let signal: UpdateSignal = serde_json::from_str(
            r#"{"payload":{"hasUpdate":true,"version":"1.0.3","currentVersion":"1.0.2"}}"#,
        )
        .unwrap();
        let payload = signal.payload.unwrap();
        assert!(payload.has_update);
        assert_eq!(payload.current_version, "1.0.2");
        assert_eq!(payload.notes, None);

        let bare: UpdateSignal = serde_json::from_str("{}").unwrap();
        assert_eq!(bare, UpdateSignal::check());
    }

    #[test]
    fn announcement_omits_unknown_verdict() {
        let json = serde_json::to_value(UpdateAnnouncement {
            new_version: "1.0.3".into(),
            current_version: "1.0.2".into(),
            notes: None,
            has_update: None,
        })
        .unwrap();
        assert_eq!(json["newVersion"], "1.0.3");
        assert!(json.get("hasUpdate").is_none());
    }
}
