//! Структурные ошибки конвейера.
//!
//! Любая из них делает набор фикстур недостоверным и прерывает запуск. Ошибки
//! конвертации отдельных файлов сюда не входят: они записываются в
//! [`BuildReport`](crate::report::BuildReport).

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::runner::CommandError;

/// Структурная ошибка, прерывающая конвейер.
#[derive(Debug, Error)]
pub enum SyncError {
    // === Внешние команды ===
    /// Не удалось получить или обновить корпус.
    #[error("corpus sync failed at step '{step}'")]
    Corpus {
        /// Шаг синхронизации (`submodule`, `checkout`, `pull`, ...).
        step: &'static str,
        #[source]
        source: CommandError,
    },

    /// Не удалось клонировать или собрать конвертер.
    #[error("converter bootstrap failed at step '{step}'")]
    Converter {
        /// Шаг подготовки (`clone`, `build`, ...).
        step: &'static str,
        #[source]
        source: CommandError,
    },

    // === Раскладка на диске ===
    /// После подготовки исполняемый файл конвертера отсутствует.
    #[error("converter executable not found at {0}")]
    MissingConverter(PathBuf),

    /// В корпусе нет каталога с тестовыми скриптами.
    #[error("test directory not found: {0}")]
    MissingTestDir(PathBuf),

    /// Два скрипта отображаются в одну и ту же фикстуру.
    #[error("scripts {first} and {second} both map to fixture {fixture}")]
    FixtureCollision {
        /// Путь фикстуры относительно выходного каталога.
        fixture: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    // === I/O ===
    /// Ошибка файловой системы.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Удобный alias для Result с SyncError.
pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    /// Обёртка для `map_err`, привязывающая I/O ошибку к пути.
    ///
    /// # Примеры
    ///
    /// ```
    /// use std::fs;
    ///
    /// use fixture_sync::error::SyncError;
    ///
    /// let path = "/definitely/missing/file";
    /// let err = fs::read(path).map_err(SyncError::io(path)).unwrap_err();
    /// assert!(err.to_string().starts_with("I/O error at /definitely/missing/file"));
    /// ```
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> SyncError {
        let path = path.into();
        move |source| SyncError::Io { path, source }
    }
}
