//! Пакетная конвертация тестовых скриптов в фикстуры.
//!
//! Новый набор фикстур собирается в [`StagedDir`] и подменяет прежний только после
//! обработки всех скриптов. Ошибка конвертации одного файла не прерывает пакет: она
//! попадает в [`BuildReport`] и в лог.

use std::{
    collections::HashMap,
    ffi::{OsStr, OsString},
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::{
    config::{FixtureConfig, OutputLayout},
    error::{SyncError, SyncResult},
    report::{BuildReport, ConversionOutcome, ConversionRecord},
    runner::CommandRunner,
    staging::{StagedDir, remove_path},
    tool::ConverterTool,
};

/// Один тестовый скрипт корпуса.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestScript {
    /// Полный путь к файлу.
    pub path: PathBuf,
    /// Путь относительно каталога тестов.
    pub relative: PathBuf,
}

/// Скрипт и путь его фикстуры относительно выходного каталога.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFixture {
    pub script: TestScript,
    pub fixture: PathBuf,
}

/// Находит все файлы с расширением `extension` в `test_dir`.
///
/// Без `recursive` смотрит только верхний уровень. Результат отсортирован по
/// относительному пути, поэтому порядок конвертации не зависит от файловой системы.
pub fn discover(test_dir: &Path, extension: &str, recursive: bool) -> SyncResult<Vec<TestScript>> {
    let mut scripts = Vec::new();
    collect(test_dir, Path::new(""), OsStr::new(extension), recursive, &mut scripts)?;
    scripts.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(scripts)
}

fn collect(
    dir: &Path,
    relative: &Path,
    extension: &OsStr,
    recursive: bool,
    scripts: &mut Vec<TestScript>,
) -> SyncResult<()> {
    for entry in fs::read_dir(dir).map_err(SyncError::io(dir))? {
        let entry = entry.map_err(SyncError::io(dir))?;
        let path = entry.path();
        let relative = relative.join(entry.file_name());

        if path.is_dir() {
            if recursive {
                collect(&path, &relative, extension, recursive, scripts)?;
            }
        } else if path.is_file() && path.extension() == Some(extension) {
            scripts.push(TestScript { path, relative });
        }
    }
    Ok(())
}

/// Имя фикстуры: имя скрипта с заменённым расширением (`add.wast` → `add.json`).
///
/// # Примеры
///
/// ```
/// use std::path::Path;
///
/// use fixture_sync::builder::fixture_name;
///
/// assert_eq!(fixture_name(Path::new("simd/add.wast"), "json"), Path::new("add.json"));
/// assert_eq!(fixture_name(Path::new("names.v2.wast"), "json"), Path::new("names.v2.json"));
/// ```
pub fn fixture_name(script: &Path, fixture_extension: &str) -> PathBuf {
    let mut name: OsString = script.file_stem().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(fixture_extension);
    PathBuf::from(name)
}

/// Сопоставляет каждому скрипту путь фикстуры.
///
/// # Ошибки
///
/// [`SyncError::FixtureCollision`], если два скрипта дают один и тот же путь
/// (возможно только в раскладке [`OutputLayout::Flat`] при рекурсивном поиске).
pub fn plan(
    scripts: Vec<TestScript>,
    layout: OutputLayout,
    fixture_extension: &str,
) -> SyncResult<Vec<PlannedFixture>> {
    let mut seen: HashMap<PathBuf, PathBuf> = HashMap::new();
    let mut planned = Vec::with_capacity(scripts.len());

    for script in scripts {
        let name = fixture_name(&script.relative, fixture_extension);
        let fixture = match (layout, script.relative.parent()) {
            (OutputLayout::Mirror, Some(parent)) => parent.join(name),
            _ => name,
        };

        if let Some(first) = seen.insert(fixture.clone(), script.relative.clone()) {
            return Err(SyncError::FixtureCollision {
                fixture,
                first,
                second: script.relative,
            });
        }
        planned.push(PlannedFixture { script, fixture });
    }

    Ok(planned)
}

/// Собирает набор фикстур из скриптов корпуса.
pub struct FixtureBuilder<'a, R: CommandRunner> {
    config: &'a FixtureConfig,
    runner: &'a R,
}

impl<'a, R: CommandRunner> FixtureBuilder<'a, R> {
    pub fn new(config: &'a FixtureConfig, runner: &'a R) -> Self {
        Self { config, runner }
    }

    /// Конвертирует все скрипты из `test_dir` и публикует результат в `fixture_root`.
    ///
    /// Прежнее содержимое `fixture_root` полностью заменяется. При структурной ошибке
    /// (нет каталога тестов, совпадение имён, ошибка файловой системы) `fixture_root`
    /// остаётся нетронутым.
    pub fn build(
        &self,
        test_dir: &Path,
        tool: &ConverterTool,
        fixture_root: &Path,
    ) -> SyncResult<BuildReport> {
        if !test_dir.is_dir() {
            return Err(SyncError::MissingTestDir(test_dir.to_path_buf()));
        }
        // Конвертер запускается из каталога фикстур, входные пути должны быть абсолютными
        let test_dir = std::path::absolute(test_dir).map_err(SyncError::io(test_dir))?;

        let scripts =
            discover(&test_dir, &self.config.script_extension, self.config.recursive)?;
        let planned = plan(scripts, self.config.layout, &self.config.fixture_extension)?;
        info!(count = planned.len(), dir = %test_dir.display(), "converting test scripts");

        let staged = StagedDir::new(fixture_root)?;
        let mut report = BuildReport::default();
        for item in &planned {
            report.push(self.convert(tool, item, staged.path())?);
        }
        staged.publish()?;

        let summary = report.summary();
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            path = %fixture_root.display(),
            "fixtures published"
        );
        Ok(report)
    }

    fn convert(
        &self,
        tool: &ConverterTool,
        item: &PlannedFixture,
        staging: &Path,
    ) -> SyncResult<ConversionRecord> {
        let output = staging.join(&item.fixture);
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(SyncError::io(parent))?;
        }

        let invocation = tool.invocation(&item.script.path, &output);
        let outcome = match self.runner.output(&invocation) {
            Ok(result) if result.success && output.is_file() => ConversionOutcome::Success,
            Ok(result) if result.success => ConversionOutcome::Failed {
                reason: "converter exited successfully but wrote no fixture".to_string(),
            },
            Ok(result) => ConversionOutcome::Failed { reason: result.failure_detail() },
            Err(e) => ConversionOutcome::Failed { reason: e.detail },
        };

        let script = item.script.relative.display().to_string();
        match &outcome {
            ConversionOutcome::Success => debug!(%script, "converted"),
            ConversionOutcome::Failed { reason } => {
                warn!(%script, %reason, "conversion failed");
                remove_partial_output(&output)?;
            }
        }

        Ok(ConversionRecord { script, fixture: item.fixture.display().to_string(), outcome })
    }
}

/// Удаляет фикстуру неудачной конвертации вместе с модулями `<stem>.<N>.<ext>`,
/// которые конвертер пишет рядом с ней.
fn remove_partial_output(output: &Path) -> SyncResult<()> {
    remove_path(output)?;

    let (Some(dir), Some(stem)) = (output.parent(), output.file_stem()) else {
        return Ok(());
    };
    let stem = stem.to_string_lossy();
    for entry in fs::read_dir(dir).map_err(SyncError::io(dir))? {
        let entry = entry.map_err(SyncError::io(dir))?;
        if is_companion(&entry.file_name().to_string_lossy(), &stem) {
            remove_path(&entry.path())?;
        }
    }
    Ok(())
}

/// `add.0.wasm` — модуль фикстуры `add`, а `add.v2.json` — отдельная фикстура.
fn is_companion(name: &str, stem: &str) -> bool {
    name.strip_prefix(stem)
        .and_then(|rest| rest.strip_prefix('.'))
        .and_then(|rest| rest.split_once('.'))
        .is_some_and(|(index, _)| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
}
