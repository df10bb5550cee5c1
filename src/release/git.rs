//! Git operations for the release flow.
//!
//! Status, staging, commits and pushes go through `kodegen_tools_git`; the
//! commit log and annotated tags use `gix` directly. Nothing shells out to
//! the `git` binary.
//!
//! ## Authentication Requirements
//!
//! Pushing uses whatever credentials the repository is configured with:
//! an SSH agent (`ssh-add ~/.ssh/id_ed25519`) or an HTTPS credential helper.

use crate::error::{CliError, ReleaseError, Result};
use kodegen_tools_git::{AddOpts, CommitOpts, PushOpts};
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// Push timeout handed to the git helper.
const PUSH_TIMEOUT_SECS: u64 = 300;

/// Git access for one working tree.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    /// Adapter for the repository at `workdir`.
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// No uncommitted changes in the working tree or the index.
    pub async fn is_clean(&self) -> Result<bool> {
        let repo = kodegen_tools_git::open_repo(&self.workdir)
            .await
            .map_err(not_a_repo)?
            .map_err(not_a_repo)?;

        kodegen_tools_git::is_clean(&repo)
            .await
            .map_err(|e| failed("is_clean", format!("Failed to check git status: {}", e)))
    }

    /// Subject lines of the latest commits as `- subject (hash)`.
    pub async fn recent_commits(&self, limit: usize) -> Result<Vec<String>> {
        let workdir = self.workdir.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let repo = gix::open(&workdir).map_err(not_a_repo)?;
            let head = repo.head_commit().map_err(|e| failed("git log", e))?;
            let walk = head.ancestors().all().map_err(|e| failed("git log", e))?;

            let mut lines = Vec::new();
            for info in walk.take(limit) {
                let info = info.map_err(|e| failed("git log", e))?;
                let commit = info.object().map_err(|e| failed("git log", e))?;
                let message = commit.message().map_err(|e| failed("git log", e))?;
                lines.push(format!(
                    "- {} ({})",
                    message.summary(),
                    info.id.to_hex_with_len(7)
                ));
            }
            Ok(lines)
        })
        .await
        .map_err(|e| failed("git log", e))?
    }

    /// Stages `paths`, given absolute or relative to the working tree.
    pub async fn add(&self, paths: &[&Path]) -> Result<()> {
        let repo = kodegen_tools_git::open_repo(&self.workdir)
            .await
            .map_err(not_a_repo)?
            .map_err(not_a_repo)?;

        let paths = paths
            .iter()
            .map(|p| p.strip_prefix(&self.workdir).unwrap_or(*p).to_path_buf())
            .collect();
        kodegen_tools_git::add(
            repo,
            AddOpts {
                paths,
                update_only: false,
                force: false,
            },
        )
        .await
        .map_err(|e| failed("git add", format!("Failed to stage changes: {}", e)))?;
        Ok(())
    }

    /// Commits the index with `message`, authored by the configured user.
    pub async fn commit(&self, message: &str) -> Result<()> {
        let repo = kodegen_tools_git::open_repo(&self.workdir)
            .await
            .map_err(not_a_repo)?
            .map_err(not_a_repo)?;

        kodegen_tools_git::commit(
            repo,
            CommitOpts {
                message: message.to_string(),
                amend: false,
                all: false,
                author: None,
                committer: None,
            },
        )
        .await
        .map_err(|e| failed("git commit", format!("Failed to commit changes: {}", e)))?;
        Ok(())
    }

    /// Creates an annotated tag on `HEAD`; an existing tag of that name is an error.
    pub async fn tag(&self, name: &str, message: &str) -> Result<()> {
        let workdir = self.workdir.clone();
        let (name, message) = (name.to_string(), message.to_string());
        tokio::task::spawn_blocking(move || -> Result<()> {
            let repo = gix::open(&workdir).map_err(not_a_repo)?;
            let target = repo
                .head_id()
                .map_err(|e| failed("git tag", e))?
                .detach();
            let tagger = repo
                .committer()
                .transpose()
                .map_err(|e| failed("git tag", e))?;

            repo.tag(
                &name,
                target,
                gix::object::Kind::Commit,
                tagger,
                &message,
                gix::refs::transaction::PreviousValue::MustNotExist,
            )
            .map_err(|e| failed("git tag", format!("Failed to create tag {}: {}", name, e)))?;
            Ok(())
        })
        .await
        .map_err(|e| failed("git tag", e))?
    }

    /// Pushes the current branch to `origin`.
    pub async fn push(&self) -> Result<()> {
        self.push_refspecs(Vec::new()).await
    }

    /// Pushes one tag to `origin`.
    pub async fn push_tag(&self, name: &str) -> Result<()> {
        self.push_refspecs(vec![format!("refs/tags/{}", name)]).await
    }

    async fn push_refspecs(&self, refspecs: Vec<String>) -> Result<()> {
        let repo = kodegen_tools_git::open_repo(&self.workdir)
            .await
            .map_err(not_a_repo)?
            .map_err(not_a_repo)?;

        let result = kodegen_tools_git::push(
            &repo,
            PushOpts {
                remote: "origin".to_string(),
                refspecs,
                force: false,
                tags: false,
                timeout_secs: Some(PUSH_TIMEOUT_SECS),
            },
        )
        .await
        .map_err(|e| {
            failed(
                "git push",
                format!(
                    "Failed to push to origin. Ensure git authentication is configured \
                     (ssh-agent or a credential helper): {}",
                    e
                ),
            )
        })?;

        log::debug!("Pushed {} commit(s) to origin", result.commits_pushed);
        Ok(())
    }
}

fn not_a_repo(e: impl Display) -> ReleaseError {
    failed("open_repo", format!("Not a git repository: {}", e))
}

fn failed(command: &str, reason: impl Display) -> ReleaseError {
    ReleaseError::Cli(CliError::ExecutionFailed {
        command: command.to_string(),
        reason: reason.to_string(),
    })
}
