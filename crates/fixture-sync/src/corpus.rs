//! Синхронизация корпуса тестовых скриптов (git-сабмодуль).

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::{
    config::SyncConfig,
    error::{SyncError, SyncResult},
    runner::{CommandRunner, Invocation},
    staging::Backup,
};

/// Локальный снимок корпуса после синхронизации.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusSnapshot {
    /// Корень рабочего дерева сабмодуля.
    pub root: PathBuf,
    pub branch: String,
    /// `git rev-parse HEAD`; `None`, если git ничего не вывел.
    pub revision: Option<String>,
}

/// Пересоздаёт рабочее дерево корпуса и подтягивает последнюю ревизию ветки.
///
/// Последовательность команд:
///
/// 1. `git submodule update --init -- <dir>` в корне репозитория;
/// 2. `git checkout <branch>` в корне корпуса;
/// 3. `git pull` (или `git fetch origin` + `git checkout <revision>` при заданной ревизии);
/// 4. `git rev-parse HEAD`.
///
/// Первая же ошибка прерывает синхронизацию; прежнее дерево при этом возвращается
/// на место.
pub struct CorpusSynchronizer<'a, R: CommandRunner> {
    config: &'a SyncConfig,
    runner: &'a R,
}

impl<'a, R: CommandRunner> CorpusSynchronizer<'a, R> {
    pub fn new(config: &'a SyncConfig, runner: &'a R) -> Self {
        Self { config, runner }
    }

    pub fn sync(&self) -> SyncResult<CorpusSnapshot> {
        let root = self.config.corpus_root();
        let previous = Backup::take(&root)?;
        if !previous.is_empty() {
            info!(path = %root.display(), "removed previous corpus checkout");
        }

        match self.fetch(&root) {
            Ok(snapshot) => {
                previous.discard();
                Ok(snapshot)
            }
            Err(err) => {
                if let Err(restore_err) = previous.restore() {
                    warn!(
                        path = %root.display(),
                        %restore_err,
                        "failed to restore previous corpus"
                    );
                }
                Err(err)
            }
        }
    }

    fn fetch(&self, root: &Path) -> SyncResult<CorpusSnapshot> {
        let corpus = &self.config.corpus;
        let repo_root = &self.config.repo_root;

        let submodule = Invocation::new("git", repo_root)
            .args(["submodule", "update", "--init", "--"])
            .arg(&corpus.dir);
        self.step("submodule", &submodule)?;

        self.step("checkout", &git(root).args(["checkout", corpus.branch.as_str()]))?;

        match &corpus.revision {
            Some(revision) => {
                self.step("fetch", &git(root).args(["fetch", "origin"]))?;
                self.step("checkout-revision", &git(root).args(["checkout", revision.as_str()]))?;
            }
            None => self.step("pull", &git(root).arg("pull"))?,
        }

        let revision = self
            .runner
            .read(&git(root).args(["rev-parse", "HEAD"]))
            .map_err(|source| SyncError::Corpus { step: "rev-parse", source })?;
        let revision = (!revision.is_empty()).then_some(revision);

        info!(
            path = %root.display(),
            branch = %corpus.branch,
            revision = revision.as_deref().unwrap_or("unknown"),
            "corpus synchronized"
        );

        Ok(CorpusSnapshot { root: root.to_path_buf(), branch: corpus.branch.clone(), revision })
    }

    fn step(&self, step: &'static str, invocation: &Invocation) -> SyncResult<()> {
        info!(step, command = %invocation, "corpus sync");
        self.runner.run(invocation).map_err(|source| SyncError::Corpus { step, source })
    }
}

fn git(cwd: &Path) -> Invocation {
    Invocation::new("git", cwd)
}
