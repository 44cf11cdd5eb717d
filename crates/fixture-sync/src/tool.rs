//! Подготовка внешнего конвертера (`wast2json` из wabt).
//!
//! Конвертер собирается один раз и переиспользуется между запусками. Рядом с ним
//! хранится файл с ревизией исходников: если задана ожидаемая ревизия и она не
//! совпадает с записанной, установка пересобирается.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{info, warn};

use crate::{
    config::ConverterConfig,
    error::{SyncError, SyncResult},
    runner::{CommandError, CommandRunner, Invocation},
    staging::remove_path,
};

/// Имя файла с ревизией исходников внутри каталога установки.
pub const REVISION_STAMP: &str = ".fixture-sync-revision";

/// Готовый к работе конвертер.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterTool {
    pub install_dir: PathBuf,
    pub executable: PathBuf,
    /// Ревизия из файла-метки, если он есть.
    pub revision: Option<String>,
}

impl ConverterTool {
    /// Вызов конвертации одного скрипта: `wast2json <input> -o <output>`.
    ///
    /// # Примеры
    ///
    /// ```
    /// use std::path::{Path, PathBuf};
    ///
    /// use fixture_sync::tool::ConverterTool;
    ///
    /// let tool = ConverterTool {
    ///     install_dir: PathBuf::from("/tmp/wabt"),
    ///     executable: PathBuf::from("/tmp/wabt/bin/wast2json"),
    ///     revision: None,
    /// };
    /// let inv = tool.invocation(Path::new("spec/test/core/add.wast"), Path::new("out/add.json"));
    /// assert_eq!(
    ///     inv.argv(),
    ///     vec!["/tmp/wabt/bin/wast2json", "spec/test/core/add.wast", "-o", "out/add.json"]
    /// );
    /// ```
    pub fn invocation(&self, input: &Path, output: &Path) -> Invocation {
        let cwd = output.parent().unwrap_or(Path::new(".")).to_path_buf();
        Invocation::new(&self.executable, cwd).arg(input).arg("-o").arg(output)
    }
}

/// Как был получен конвертер в этом запуске.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    /// Установка уже была на месте, клонирования и сборки не было.
    Cached,
    /// Конвертер клонирован и собран в этом запуске.
    Built,
}

/// Проверяет наличие конвертера и при необходимости клонирует и собирает его.
pub struct ToolBootstrap<'a, R: CommandRunner> {
    config: &'a ConverterConfig,
    runner: &'a R,
}

impl<'a, R: CommandRunner> ToolBootstrap<'a, R> {
    pub fn new(config: &'a ConverterConfig, runner: &'a R) -> Self {
        Self { config, runner }
    }

    /// Гарантирует, что конвертер установлен.
    ///
    /// - каталог установки есть и ревизия совпадает (или не задана) — ничего не делает;
    /// - иначе удаляет остатки, клонирует `--recursive` и собирает.
    ///
    /// Если клонирование или сборка упали, частичная установка удаляется, чтобы
    /// следующий запуск начал заново.
    ///
    /// # Ошибки
    ///
    /// [`SyncError::Converter`] при ошибке git или сборки и
    /// [`SyncError::MissingConverter`], если исполняемого файла нет на месте.
    pub fn ensure(&self) -> SyncResult<(ConverterTool, ToolStatus)> {
        let install_dir = &self.config.install_dir;

        let status = if install_dir.is_dir() && !self.revision_drifted()? {
            info!(path = %install_dir.display(), "converter already installed");
            ToolStatus::Cached
        } else {
            if let Err(err) = self.install() {
                if let Err(cleanup_err) = remove_path(install_dir) {
                    warn!(
                        path = %install_dir.display(),
                        %cleanup_err,
                        "failed to remove partial install"
                    );
                }
                return Err(err);
            }
            ToolStatus::Built
        };

        let executable = self.config.executable_path();
        if !executable.is_file() {
            return Err(SyncError::MissingConverter(executable));
        }
        // Конвертер запускается из каталога фикстур, относительный путь там не найдётся
        let executable = std::path::absolute(&executable).map_err(SyncError::io(&executable))?;

        let tool = ConverterTool {
            install_dir: install_dir.clone(),
            executable,
            revision: read_stamp(install_dir)?,
        };
        Ok((tool, status))
    }

    /// Задана ожидаемая ревизия, и она отличается от записанной.
    fn revision_drifted(&self) -> SyncResult<bool> {
        let Some(expected) = &self.config.revision else {
            return Ok(false);
        };

        let installed = read_stamp(&self.config.install_dir)?;
        if installed.as_deref() == Some(expected.as_str()) {
            return Ok(false);
        }

        info!(
            expected = %expected,
            installed = installed.as_deref().unwrap_or("unknown"),
            "converter revision changed, rebuilding"
        );
        Ok(true)
    }

    fn install(&self) -> SyncResult<()> {
        let config = self.config;
        let install_dir = &config.install_dir;

        remove_path(install_dir)?;
        let parent = match install_dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(SyncError::io(parent))?;
        let name = install_dir.file_name().ok_or_else(|| SyncError::Io {
            path: install_dir.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "install dir has no final component",
            ),
        })?;

        info!(remote = %config.remote, path = %install_dir.display(), "cloning converter");
        // git запускается в `parent`, поэтому цель клонирования задаётся только именем
        let clone = Invocation::new("git", parent)
            .args(["clone", "--recursive", config.remote.as_str()])
            .arg(name);
        self.step("clone", &clone)?;

        if let Some(revision) = &config.revision {
            self.step("checkout", &git(install_dir).args(["checkout", revision.as_str()]))?;
            let submodules =
                git(install_dir).args(["submodule", "update", "--init", "--recursive"]);
            self.step("submodules", &submodules)?;
        }

        let (program, args) = config.build_command.split_first().ok_or_else(|| {
            let source =
                CommandError::new(&Invocation::new("<build>", install_dir), "empty build command");
            SyncError::Converter { step: "build", source }
        })?;
        info!(command = %config.build_command.join(" "), "building converter");
        self.step("build", &Invocation::new(program, install_dir).args(args))?;

        let executable = config.executable_path();
        if !executable.is_file() {
            return Err(SyncError::MissingConverter(executable));
        }

        let revision = match &config.revision {
            Some(revision) => revision.clone(),
            None => self
                .runner
                .read(&git(install_dir).args(["rev-parse", "HEAD"]))
                .map_err(|source| SyncError::Converter { step: "rev-parse", source })?,
        };
        let stamp = install_dir.join(REVISION_STAMP);
        fs::write(&stamp, format!("{revision}\n")).map_err(SyncError::io(&stamp))?;

        info!(revision = %revision, "converter built");
        Ok(())
    }

    fn step(&self, step: &'static str, invocation: &Invocation) -> SyncResult<()> {
        self.runner.run(invocation).map_err(|source| SyncError::Converter { step, source })
    }
}

/// Ревизия из файла-метки; пустой или отсутствующий файл — `None`.
fn read_stamp(install_dir: &Path) -> SyncResult<Option<String>> {
    let stamp = install_dir.join(REVISION_STAMP);
    match fs::read_to_string(&stamp) {
        Ok(content) => {
            let revision = content.trim();
            Ok((!revision.is_empty()).then(|| revision.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SyncError::Io { path: stamp, source: e }),
    }
}

fn git(cwd: &Path) -> Invocation {
    Invocation::new("git", cwd)
}
