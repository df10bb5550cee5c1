//! The update state machine.

use super::{
    CheckOutcome, Notifier, RuntimeMode, UpdateAnnouncement, UpdateInstaller, UpdatePayload,
    UpdatePhase, UpdateSignal, UpdateSource,
};
use crate::changelog::summarize_notes;
use crate::version::Version;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;

/// Default pause between the "update complete" notification and relaunch.
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(2);

const NOTES_PREVIEW_LINES: usize = 3;

/// Per-process update state. Only the orchestrator touches it.
#[derive(Debug, Default)]
struct ClientUpdateState {
    is_checking: bool,
    has_notified: bool,
    phase: UpdatePhase,
}

/// Clears `is_checking` when a check ends, however it ends.
struct CheckGuard<'a> {
    state: &'a Mutex<ClientUpdateState>,
}

impl Drop for CheckGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).is_checking = false;
    }
}

fn lock(state: &Mutex<ClientUpdateState>) -> MutexGuard<'_, ClientUpdateState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Drives update checks for a running application.
///
/// Share it behind an `Arc`; [`handle_signal`](Self::handle_signal) takes
/// `&self` so overlapping signals can be dropped instead of queued.
pub struct UpdateOrchestrator {
    mode: RuntimeMode,
    running: Version,
    source: Arc<dyn UpdateSource>,
    installer: Arc<dyn UpdateInstaller>,
    notifier: Arc<dyn Notifier>,
    restart_delay: Duration,
    state: Mutex<ClientUpdateState>,
    announcements: broadcast::Sender<UpdateAnnouncement>,
}

impl UpdateOrchestrator {
    /// Orchestrator for an application running `running`.
    pub fn new(
        mode: RuntimeMode,
        running: Version,
        source: Arc<dyn UpdateSource>,
        installer: Arc<dyn UpdateInstaller>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (announcements, _) = broadcast::channel(16);
        Self {
            mode,
            running,
            source,
            installer,
            notifier,
            restart_delay: DEFAULT_RESTART_DELAY,
            state: Mutex::new(ClientUpdateState::default()),
            announcements,
        }
    }

    /// Overrides the pause before relaunch.
    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Receives an [`UpdateAnnouncement`] per genuine detection.
    pub fn subscribe(&self) -> broadcast::Receiver<UpdateAnnouncement> {
        self.announcements.subscribe()
    }

    /// Current phase.
    pub fn phase(&self) -> UpdatePhase {
        lock(&self.state).phase
    }

    /// Whether the user was already told about an update this session.
    pub fn has_notified(&self) -> bool {
        lock(&self.state).has_notified
    }

    /// Handles one inbound signal through to its end state.
    pub async fn handle_signal(&self, signal: UpdateSignal) -> CheckOutcome {
        if self.mode != RuntimeMode::Production {
            log::debug!("Update checks are disabled outside production");
            self.set_phase(UpdatePhase::Idle);
            return CheckOutcome::Skipped;
        }

        let Some(_guard) = self.begin_check() else {
            log::debug!("Update check already in flight, dropping signal");
            return CheckOutcome::Dropped;
        };

        let checked = match signal.payload {
            Some(payload) => Ok(payload),
            None => {
                log::info!("Checking for updates");
                self.source.check().await
            }
        };

        let payload = match checked {
            Ok(payload) => payload,
            Err(e) => return self.check_failed(e),
        };

        if !self.is_genuine_update(&payload) {
            self.set_phase(UpdatePhase::NoUpdate);
            return CheckOutcome::NoUpdate;
        }

        if !self.mark_notified() {
            log::info!("Update {} already announced this session", payload.version);
            return CheckOutcome::Suppressed;
        }

        self.announce(&payload);
        self.install(&payload).await
    }

    fn begin_check(&self) -> Option<CheckGuard<'_>> {
        let mut state = lock(&self.state);
        if state.is_checking {
            return None;
        }
        state.is_checking = true;
        state.phase = UpdatePhase::Checking;
        Some(CheckGuard { state: &self.state })
    }

    /// The source's flag and a strictly greater version tuple must agree.
    fn is_genuine_update(&self, payload: &UpdatePayload) -> bool {
        if !payload.has_update {
            log::info!("No update available");
            return false;
        }

        match Version::parse_lenient(&payload.version) {
            Ok(offered) if offered > self.running => true,
            Ok(offered) => {
                log::info!(
                    "Offered version {} is not newer than running {}, ignoring",
                    offered,
                    self.running
                );
                false
            }
            Err(e) => {
                log::warn!("Unparseable offered version '{}': {}", payload.version, e);
                false
            }
        }
    }

    /// Sets the sticky flag; false if it was already set.
    fn mark_notified(&self) -> bool {
        let mut state = lock(&self.state);
        if state.has_notified {
            return false;
        }
        state.has_notified = true;
        state.phase = UpdatePhase::Notified;
        true
    }

    fn announce(&self, payload: &UpdatePayload) {
        log::info!(
            "Found update {} (running {})",
            payload.version,
            self.running.normalized()
        );

        let summary = summarize_notes(payload.notes.as_deref().unwrap_or_default(), NOTES_PREVIEW_LINES);
        self.notifier.notify(
            &format!("New version {} available", payload.version),
            &format!(
                "Current version: {}\n{}\n\nThe update will download now...",
                self.running.normalized(),
                summary
            ),
        );

        let _ = self.announcements.send(UpdateAnnouncement {
            new_version: payload.version.clone(),
            current_version: self.running.normalized(),
            notes: payload.notes.clone(),
            has_update: Some(true),
        });
    }

    async fn install(&self, payload: &UpdatePayload) -> CheckOutcome {
        self.set_phase(UpdatePhase::Downloading);
        if let Err(e) = self.installer.download(payload).await {
            return self.install_failed(e);
        }

        self.set_phase(UpdatePhase::Installing);
        if let Err(e) = self.installer.install(payload).await {
            return self.install_failed(e);
        }

        self.set_phase(UpdatePhase::RestartPending);
        self.notifier.notify(
            "Update complete",
            "The update has been installed. The application will restart to apply it.",
        );
        tokio::time::sleep(self.restart_delay).await;

        if let Err(e) = self.installer.relaunch().await {
            log::error!("Relaunch failed: {:#}", e);
        }
        CheckOutcome::RestartScheduled
    }

    fn check_failed(&self, error: anyhow::Error) -> CheckOutcome {
        log::error!("Update check failed: {:#}", error);
        self.set_phase(UpdatePhase::Error);
        if self.mode == RuntimeMode::Production {
            self.notifier.notify(
                "Update check failed",
                "An error occurred while checking for updates. It will be retried later.",
            );
        }
        CheckOutcome::Failed(format!("{:#}", error))
    }

    fn install_failed(&self, error: anyhow::Error) -> CheckOutcome {
        log::error!("Update install failed: {:#}", error);
        {
            let mut state = lock(&self.state);
            state.phase = UpdatePhase::Error;
            state.has_notified = false;
        }
        self.notifier.notify(
            "Update failed",
            "The update could not be installed. It will be offered again on the next check.",
        );
        CheckOutcome::Failed(format!("{:#}", error))
    }

    fn set_phase(&self, phase: UpdatePhase) {
        lock(&self.state).phase = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn payload(version: &str, has_update: bool) -> UpdatePayload {
        UpdatePayload {
            has_update,
            version: version.into(),
            current_version: "1.0.2".into(),
            notes: Some("## v1.0.3\n- [fix] crash\n- [feature] search\n- [fix] a\n- [fix] b".into()),
        }
    }

    struct StaticSource(anyhow::Result<UpdatePayload>);

    #[async_trait]
    impl UpdateSource for StaticSource {
        async fn check(&self) -> anyhow::Result<UpdatePayload> {
            match &self.0 {
                Ok(p) => Ok(p.clone()),
                Err(e) => Err(anyhow::anyhow!("{}", e)),
            }
        }
    }

    /// Parks inside `check` until released.
    struct GatedSource {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl UpdateSource for GatedSource {
        async fn check(&self) -> anyhow::Result<UpdatePayload> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(payload("1.0.1", false))
        }
    }

    #[derive(Default)]
    struct CountingInstaller {
        fail_install: AtomicBool,
        installs: AtomicUsize,
        relaunches: AtomicUsize,
    }

    #[async_trait]
    impl UpdateInstaller for CountingInstaller {
        async fn download(&self, _update: &UpdatePayload) -> anyhow::Result<()> {
            Ok(())
        }

        async fn install(&self, _update: &UpdatePayload) -> anyhow::Result<()> {
            self.installs.fetch_add(1, Ordering::SeqCst);
            if self.fail_install.load(Ordering::SeqCst) {
                anyhow::bail!("disk full");
            }
            Ok(())
        }

        async fn relaunch(&self) -> anyhow::Result<()> {
            self.relaunches.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier(Mutex<Vec<(String, String)>>);

    impl Notifier for RecordingNotifier {
        fn notify(&self, title: &str, body: &str) {
            self.0.lock().unwrap().push((title.into(), body.into()));
        }
    }

    impl RecordingNotifier {
        fn titles(&self) -> Vec<String> {
            self.0.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
        }
    }

    struct Harness {
        orchestrator: Arc<UpdateOrchestrator>,
        installer: Arc<CountingInstaller>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness(mode: RuntimeMode, source: Arc<dyn UpdateSource>) -> Harness {
        let installer = Arc::new(CountingInstaller::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let orchestrator = UpdateOrchestrator::new(
            mode,
            Version::new(1, 0, 2),
            source,
            installer.clone(),
            notifier.clone(),
        )
        .with_restart_delay(Duration::ZERO);
        Harness {
            orchestrator: Arc::new(orchestrator),
            installer,
            notifier,
        }
    }

    fn static_source(result: anyhow::Result<UpdatePayload>) -> Arc<dyn UpdateSource> {
        Arc::new(StaticSource(result))
    }

    #[tokio::test]
    async fn older_manifest_is_no_update_even_when_flagged() {
        let h = harness(RuntimeMode::Production, static_source(Ok(payload("1.0.1", true))));
        assert_eq!(h.orchestrator.handle_signal(UpdateSignal::check()).await, CheckOutcome::NoUpdate);
        assert_eq!(h.orchestrator.phase(), UpdatePhase::NoUpdate);
        assert!(!h.orchestrator.has_notified());
        assert!(h.notifier.titles().is_empty());
    }

    #[tokio::test]
    async fn newer_version_without_flag_is_no_update() {
        let h = harness(RuntimeMode::Production, static_source(Ok(payload("1.0.3", false))));
        assert_eq!(h.orchestrator.handle_signal(UpdateSignal::check()).await, CheckOutcome::NoUpdate);
    }

    #[tokio::test]
    async fn genuine_update_installs_and_relaunches() {
        let h = harness(RuntimeMode::Production, static_source(Ok(payload("1.0.3", true))));
        let mut announcements = h.orchestrator.subscribe();

        let outcome = h.orchestrator.handle_signal(UpdateSignal::check()).await;
        assert_eq!(outcome, CheckOutcome::RestartScheduled);
        assert_eq!(h.orchestrator.phase(), UpdatePhase::RestartPending);
        assert_eq!(h.installer.relaunches.load(Ordering::SeqCst), 1);

        let titles = h.notifier.titles();
        assert_eq!(titles, vec!["New version 1.0.3 available", "Update complete"]);
        let body = &h.notifier.0.lock().unwrap()[0].1;
        assert!(body.contains("Current version: 1.0.2"));
        assert!(body.contains("...(more changes)"));

        let announced = announcements.try_recv().unwrap();
        assert_eq!(announced.new_version, "1.0.3");
        assert_eq!(announced.has_update, Some(true));
    }

    #[tokio::test]
    async fn second_detection_is_suppressed() {
        let h = harness(RuntimeMode::Production, static_source(Ok(payload("1.0.3", true))));
        h.orchestrator.handle_signal(UpdateSignal::check()).await;

        let outcome = h
            .orchestrator
            .handle_signal(UpdateSignal::with_payload(payload("1.0.4", true)))
            .await;
        assert_eq!(outcome, CheckOutcome::Suppressed);
        assert_eq!(h.installer.installs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn install_failure_clears_sticky_flag() {
        let h = harness(RuntimeMode::Production, static_source(Ok(payload("1.0.3", true))));
        h.installer.fail_install.store(true, Ordering::SeqCst);

        let outcome = h.orchestrator.handle_signal(UpdateSignal::check()).await;
        assert!(matches!(outcome, CheckOutcome::Failed(ref m) if m.contains("disk full")));
        assert_eq!(h.orchestrator.phase(), UpdatePhase::Error);
        assert!(!h.orchestrator.has_notified());
        assert_eq!(h.notifier.titles().last().map(String::as_str), Some("Update failed"));

        h.installer.fail_install.store(false, Ordering::SeqCst);
        assert_eq!(
            h.orchestrator.handle_signal(UpdateSignal::check()).await,
            CheckOutcome::RestartScheduled
        );
        assert_eq!(h.installer.installs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn check_failure_notifies_in_production() {
        let h = harness(
            RuntimeMode::Production,
            static_source(Err(anyhow::anyhow!("network down"))),
        );
        let outcome = h.orchestrator.handle_signal(UpdateSignal::check()).await;
        assert!(matches!(outcome, CheckOutcome::Failed(_)));
        assert_eq!(h.orchestrator.phase(), UpdatePhase::Error);
        assert_eq!(h.notifier.titles(), vec!["Update check failed"]);
    }

    #[tokio::test]
    async fn development_mode_short_circuits() {
        let h = harness(RuntimeMode::Development, static_source(Ok(payload("9.0.0", true))));
        assert_eq!(h.orchestrator.handle_signal(UpdateSignal::check()).await, CheckOutcome::Skipped);
        assert_eq!(h.orchestrator.phase(), UpdatePhase::Idle);
        assert_eq!(h.installer.installs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_check_is_dropped() {
        let source = Arc::new(GatedSource {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let h = harness(RuntimeMode::Production, source.clone());

        let first = {
            let orchestrator = h.orchestrator.clone();
            tokio::spawn(async move { orchestrator.handle_signal(UpdateSignal::check()).await })
        };
        source.entered.notified().await;

        assert_eq!(
            h.orchestrator.handle_signal(UpdateSignal::check()).await,
            CheckOutcome::Dropped
        );

        source.release.notify_one();
        assert_eq!(first.await.unwrap(), CheckOutcome::NoUpdate);

        // The flag is released once the first check ends.
        assert_eq!(
            h.orchestrator
                .handle_signal(UpdateSignal::with_payload(payload("1.0.0", true)))
                .await,
            CheckOutcome::NoUpdate
        );
    }
}
