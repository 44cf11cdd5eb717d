//! Конфигурация конвейера: пути, ветки, ревизии и политики.
//!
//! Все значения по умолчанию совпадают с фиксированной раскладкой репозитория:
//! корпус в `spec/`, скрипты в `spec/test/core/*.wast`, фикстуры в `tests/fixtures/`,
//! конвертер в `/tmp/wabt/bin/wast2json`.

use std::path::PathBuf;

// ──────────────────────────────────────────────
// Значения по умолчанию
// ──────────────────────────────────────────────

/// Каталог сабмодуля с корпусом относительно корня репозитория.
pub const DEFAULT_CORPUS_DIR: &str = "spec";

/// Отслеживаемая ветка корпуса.
pub const DEFAULT_CORPUS_BRANCH: &str = "master";

/// Каталог с тестовыми скриптами внутри корпуса.
pub const DEFAULT_TEST_SUBDIR: &str = "test/core";

/// Каталог фикстур относительно корня репозитория.
pub const DEFAULT_FIXTURE_DIR: &str = "tests/fixtures";

/// Репозиторий с исходниками конвертера.
pub const DEFAULT_CONVERTER_REMOTE: &str = "git@github.com:WebAssembly/wabt.git";

/// Каталог установки конвертера (вне репозитория, переживает запуски).
pub const DEFAULT_CONVERTER_DIR: &str = "/tmp/wabt";

/// Путь к исполняемому файлу конвертера внутри каталога установки.
pub const DEFAULT_CONVERTER_EXECUTABLE: &str = "bin/wast2json";

/// Команда сборки конвертера.
pub const DEFAULT_BUILD_COMMAND: &[&str] = &["make"];

/// Расширение тестовых скриптов.
pub const SCRIPT_EXTENSION: &str = "wast";

/// Расширение фикстур.
pub const FIXTURE_EXTENSION: &str = "json";

// ──────────────────────────────────────────────
// Политики
// ──────────────────────────────────────────────

/// Раскладка фикстур в выходном каталоге.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputLayout {
    /// Все фикстуры в корне; совпадение имён — структурная ошибка.
    #[default]
    Flat,
    /// Повторяет вложенные каталоги корпуса.
    Mirror,
}

/// Как ошибки конвертации отдельных файлов влияют на код выхода.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Ошибки попадают в отчёт, запуск считается успешным.
    #[default]
    Tolerant,
    /// Любая ошибка конвертации делает запуск неуспешным.
    Strict,
}

// ──────────────────────────────────────────────
// Секции конфигурации
// ──────────────────────────────────────────────

/// Настройки корпуса (git-сабмодуль).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusConfig {
    /// Каталог сабмодуля относительно корня репозитория.
    pub dir: PathBuf,
    /// Отслеживаемая ветка.
    pub branch: String,
    /// Зафиксированная ревизия; `None` — всегда последняя ревизия ветки.
    pub revision: Option<String>,
    /// Каталог скриптов внутри корпуса.
    pub test_subdir: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_CORPUS_DIR),
            branch: DEFAULT_CORPUS_BRANCH.to_string(),
            revision: None,
            test_subdir: PathBuf::from(DEFAULT_TEST_SUBDIR),
        }
    }
}

/// Настройки внешнего конвертера.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterConfig {
    pub remote: String,
    pub install_dir: PathBuf,
    /// Путь к исполняемому файлу относительно `install_dir`.
    pub executable: PathBuf,
    /// Ожидаемая ревизия исходников; при расхождении конвертер пересобирается.
    pub revision: Option<String>,
    /// Программа и аргументы сборки, запускаются в `install_dir`.
    pub build_command: Vec<String>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            remote: DEFAULT_CONVERTER_REMOTE.to_string(),
            install_dir: PathBuf::from(DEFAULT_CONVERTER_DIR),
            executable: PathBuf::from(DEFAULT_CONVERTER_EXECUTABLE),
            revision: None,
            build_command: DEFAULT_BUILD_COMMAND.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ConverterConfig {
    /// Полный путь к исполняемому файлу конвертера.
    pub fn executable_path(&self) -> PathBuf {
        self.install_dir.join(&self.executable)
    }
}

/// Настройки генерации фикстур.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureConfig {
    /// Выходной каталог относительно корня репозитория.
    pub dir: PathBuf,
    pub script_extension: String,
    pub fixture_extension: String,
    /// Искать скрипты во вложенных каталогах.
    pub recursive: bool,
    pub layout: OutputLayout,
    pub failure_policy: FailurePolicy,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_FIXTURE_DIR),
            script_extension: SCRIPT_EXTENSION.to_string(),
            fixture_extension: FIXTURE_EXTENSION.to_string(),
            recursive: false,
            layout: OutputLayout::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Полная конфигурация одного запуска.
///
/// # Примеры
///
/// ```
/// use std::path::Path;
///
/// use fixture_sync::config::SyncConfig;
///
/// let config = SyncConfig::new("/repo");
/// assert_eq!(config.corpus_root(), Path::new("/repo/spec"));
/// assert_eq!(config.test_dir(), Path::new("/repo/spec/test/core"));
/// assert_eq!(config.fixture_root(), Path::new("/repo/tests/fixtures"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Корень репозитория, относительно которого заданы пути корпуса и фикстур.
    pub repo_root: PathBuf,
    pub corpus: CorpusConfig,
    pub converter: ConverterConfig,
    pub fixtures: FixtureConfig,
}

impl SyncConfig {
    /// Конфигурация по умолчанию для репозитория в `repo_root`.
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            corpus: CorpusConfig::default(),
            converter: ConverterConfig::default(),
            fixtures: FixtureConfig::default(),
        }
    }

    pub fn corpus_root(&self) -> PathBuf {
        self.repo_root.join(&self.corpus.dir)
    }

    pub fn test_dir(&self) -> PathBuf {
        self.corpus_root().join(&self.corpus.test_subdir)
    }

    pub fn fixture_root(&self) -> PathBuf {
        self.repo_root.join(&self.fixtures.dir)
    }
}
