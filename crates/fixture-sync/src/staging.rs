//! Пересборка каталогов «с нуля» без окна, в котором каталог пуст.
//!
//! - [`StagedDir`] — новый каталог собирается рядом с целевым и подменяет его
//!   переименованием;
//! - [`Backup`] — текущий каталог откладывается в сторону и либо удаляется,
//!   либо возвращается на место.
//!
//! Временные каталоги создаются в том же родительском каталоге, что и цель, чтобы
//! `rename` не пересекал границу файловой системы.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};

const STAGING_PREFIX: &str = ".fixture-sync-staging-";
const BACKUP_PREFIX: &str = ".fixture-sync-backup-";

/// Каталог, который собирается во временном месте и публикуется на место `target`.
///
/// Если [`publish()`](StagedDir::publish) не вызван, временный каталог удаляется при
/// drop, а `target` остаётся нетронутым.
///
/// # Примеры
///
/// ```
/// use std::fs;
///
/// use fixture_sync::staging::StagedDir;
///
/// let root = tempfile::tempdir()?;
/// let target = root.path().join("fixtures");
/// fs::create_dir(&target)?;
/// fs::write(target.join("stale.json"), "{}")?;
///
/// let staged = StagedDir::new(&target)?;
/// fs::write(staged.path().join("add.json"), "{}")?;
/// staged.publish()?;
///
/// assert!(target.join("add.json").exists());
/// assert!(!target.join("stale.json").exists());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct StagedDir {
    _scratch: TempDir,
    dir: PathBuf,
    target: PathBuf,
}

impl StagedDir {
    /// Создаёт пустой каталог для сборки будущего содержимого `target`.
    pub fn new(target: &Path) -> SyncResult<Self> {
        let parent = parent_dir(target);
        fs::create_dir_all(&parent).map_err(SyncError::io(&parent))?;

        let scratch = scratch_dir(&parent, STAGING_PREFIX)?;
        let dir = scratch.path().join(file_name(target)?);
        fs::create_dir(&dir).map_err(SyncError::io(&dir))?;
        debug!(staging = %dir.display(), path = %target.display(), "staging directory created");

        Ok(Self { _scratch: scratch, dir, target: target.to_path_buf() })
    }

    /// Каталог, в который нужно записывать новое содержимое.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Подменяет `target` собранным каталогом; прежнее содержимое удаляется.
    ///
    /// Если переименование не удалось, прежний каталог возвращается на место.
    pub fn publish(self) -> SyncResult<()> {
        let previous = Backup::take(&self.target)?;

        if let Err(source) = fs::rename(&self.dir, &self.target) {
            if let Err(restore_err) = previous.restore() {
                warn!(
                    path = %self.target.display(),
                    %restore_err,
                    "failed to restore previous directory"
                );
            }
            return Err(SyncError::Io { path: self.target, source });
        }

        debug!(path = %self.target.display(), "staging directory published");
        previous.discard();
        Ok(())
    }
}

/// Отложенная в сторону копия пути.
///
/// Пока значение живо, прежнее содержимое лежит во временном каталоге рядом с целью.
/// Drop (или [`discard()`](Backup::discard)) удаляет его окончательно.
#[derive(Debug)]
pub struct Backup {
    scratch: Option<TempDir>,
    saved: Option<PathBuf>,
    target: PathBuf,
}

impl Backup {
    /// Переносит `target` во временный каталог; отсутствующий путь не ошибка.
    pub fn take(target: &Path) -> SyncResult<Self> {
        if !exists(target) {
            return Ok(Self { scratch: None, saved: None, target: target.to_path_buf() });
        }

        let scratch = scratch_dir(&parent_dir(target), BACKUP_PREFIX)?;
        let saved = scratch.path().join(file_name(target)?);
        fs::rename(target, &saved).map_err(SyncError::io(target))?;
        debug!(path = %target.display(), backup = %saved.display(), "moved aside");

        Ok(Self { scratch: Some(scratch), saved: Some(saved), target: target.to_path_buf() })
    }

    /// Было ли что откладывать.
    pub fn is_empty(&self) -> bool {
        self.saved.is_none()
    }

    /// Удаляет всё, что сейчас лежит в `target`, и возвращает сохранённую копию.
    pub fn restore(mut self) -> SyncResult<()> {
        remove_path(&self.target)?;
        if let Some(saved) = self.saved.take() {
            fs::rename(&saved, &self.target).map_err(SyncError::io(&self.target))?;
            debug!(path = %self.target.display(), "restored from backup");
        }
        Ok(())
    }

    /// Окончательно удаляет сохранённую копию.
    pub fn discard(self) {
        drop(self);
    }
}

impl Drop for Backup {
    fn drop(&mut self) {
        if let Some(scratch) = self.scratch.take()
            && let Err(e) = scratch.close()
        {
            warn!(path = %self.target.display(), %e, "failed to remove backup");
        }
    }
}

/// Удаляет файл, симлинк или каталог целиком; отсутствующий путь не ошибка.
pub fn remove_path(path: &Path) -> SyncResult<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(SyncError::Io { path: path.to_path_buf(), source: e }),
    };

    let result =
        if metadata.is_dir() { fs::remove_dir_all(path) } else { fs::remove_file(path) };
    result.map_err(SyncError::io(path))
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn scratch_dir(parent: &Path, prefix: &str) -> SyncResult<TempDir> {
    tempfile::Builder::new().prefix(prefix).tempdir_in(parent).map_err(SyncError::io(parent))
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn file_name(path: &Path) -> SyncResult<&std::ffi::OsStr> {
    path.file_name().ok_or_else(|| SyncError::Io {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "path has no final component"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn publish_creates_missing_target() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("tests/fixtures");

        let staged = StagedDir::new(&target).unwrap();
        fs::write(staged.path().join("add.json"), "{}").unwrap();
        staged.publish().unwrap();

        assert_eq!(entries(&target), vec!["add.json"]);
        // Временные каталоги убраны
        assert_eq!(entries(&root.path().join("tests")), vec!["fixtures"]);
    }

    #[test]
    fn publish_replaces_previous_contents() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("fixtures");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("stale.json"), "old").unwrap();
        fs::write(target.join("add.json"), "old").unwrap();

        let staged = StagedDir::new(&target).unwrap();
        fs::write(staged.path().join("add.json"), "new").unwrap();
        staged.publish().unwrap();

        assert_eq!(entries(&target), vec!["add.json"]);
        assert_eq!(fs::read_to_string(target.join("add.json")).unwrap(), "new");
        assert_eq!(entries(root.path()), vec!["fixtures"]);
    }

    #[test]
    fn dropped_staging_leaves_target_untouched() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("fixtures");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("add.json"), "old").unwrap();

        {
            let staged = StagedDir::new(&target).unwrap();
            fs::write(staged.path().join("loop.json"), "new").unwrap();
        }

        assert_eq!(entries(&target), vec!["add.json"]);
        assert_eq!(entries(root.path()), vec!["fixtures"]);
    }

    #[test]
    fn backup_restore_brings_back_previous_tree() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("spec");
        fs::create_dir_all(target.join("test/core")).unwrap();
        fs::write(target.join("test/core/add.wast"), "(module)").unwrap();

        let backup = Backup::take(&target).unwrap();
        assert!(!backup.is_empty());
        assert!(!target.exists());

        // Частично созданный каталог заменяется копией
        fs::create_dir(&target).unwrap();
        fs::write(target.join("partial"), "").unwrap();
        backup.restore().unwrap();

        assert_eq!(entries(&target), vec!["test"]);
        assert!(target.join("test/core/add.wast").exists());
        assert_eq!(entries(root.path()), vec!["spec"]);
    }

    #[test]
    fn backup_discard_removes_saved_copy() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("spec");
        fs::create_dir(&target).unwrap();

        let backup = Backup::take(&target).unwrap();
        backup.discard();

        assert!(entries(root.path()).is_empty());
    }

    #[test]
    fn backup_of_missing_path_is_empty() {
        let root = tempfile::tempdir().unwrap();
        let backup = Backup::take(&root.path().join("absent")).unwrap();
        assert!(backup.is_empty());
        backup.restore().unwrap();
        assert!(entries(root.path()).is_empty());
    }

    #[test]
    fn remove_path_handles_files_dirs_and_missing() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("file");
        let dir = root.path().join("dir/nested");
        fs::write(&file, "x").unwrap();
        fs::create_dir_all(&dir).unwrap();

        remove_path(&file).unwrap();
        remove_path(&root.path().join("dir")).unwrap();
        remove_path(&root.path().join("missing")).unwrap();

        assert!(entries(root.path()).is_empty());
    }
}
