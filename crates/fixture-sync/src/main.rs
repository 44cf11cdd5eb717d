//! fixture-sync — обновляет корпус тестовых скриптов и пересобирает из него JSON-фикстуры.
//!
//! # Запуск
//!
//! ```bash
//! RUST_LOG=info cargo run -p fixture-sync -- --report target/fixtures-report.json
//! ```
//!
//! Коды выхода: `0` — фикстуры опубликованы, `1` — структурная ошибка,
//! `2` — с `--strict` хотя бы один скрипт не сконвертировался.

use std::{env, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use fixture_sync::{
    config::{FailurePolicy, OutputLayout, SyncConfig},
    pipeline::Pipeline,
    runner::{CommandRunner, Invocation, ShellRunner},
    tool::ToolStatus,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Синхронизация тестового корпуса и сборка фикстур.
///
/// Подтягивает сабмодуль с `.wast`-скриптами, при необходимости собирает `wast2json`
/// и конвертирует каждый скрипт в JSON-фикстуру.
#[derive(Parser, Debug)]
#[command(name = "fixture-sync")]
#[command(version, about)]
struct Args {
    /// Корень репозитория (по умолчанию `git rev-parse --show-toplevel`).
    #[arg(long)]
    root: Option<PathBuf>,

    /// Каталог сабмодуля с корпусом относительно корня.
    #[arg(long, default_value = fixture_sync::config::DEFAULT_CORPUS_DIR)]
    corpus_dir: PathBuf,

    /// Ветка корпуса.
    #[arg(long, default_value = fixture_sync::config::DEFAULT_CORPUS_BRANCH)]
    branch: String,

    /// Зафиксировать корпус на ревизии вместо `git pull`.
    #[arg(long)]
    corpus_revision: Option<String>,

    /// Каталог скриптов внутри корпуса.
    #[arg(long, default_value = fixture_sync::config::DEFAULT_TEST_SUBDIR)]
    test_subdir: PathBuf,

    /// Выходной каталог фикстур относительно корня.
    #[arg(long, default_value = fixture_sync::config::DEFAULT_FIXTURE_DIR)]
    fixture_dir: PathBuf,

    /// Каталог установки конвертера.
    #[arg(long, default_value = fixture_sync::config::DEFAULT_CONVERTER_DIR)]
    converter_dir: PathBuf,

    /// Git-адрес исходников конвертера.
    #[arg(long, default_value = fixture_sync::config::DEFAULT_CONVERTER_REMOTE)]
    converter_remote: String,

    /// Ожидаемая ревизия конвертера; при расхождении установка пересобирается.
    #[arg(long)]
    converter_revision: Option<String>,

    /// Искать скрипты и во вложенных каталогах.
    #[arg(long)]
    recursive: bool,

    /// Раскладка выходного каталога.
    #[arg(long, value_enum, default_value_t = Layout::Flat)]
    layout: Layout,

    /// Завершаться с кодом 2, если хотя бы один скрипт не сконвертировался.
    #[arg(long)]
    strict: bool,

    /// Записать JSON-отчёт о конвертации.
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Layout {
    /// Все фикстуры в одном каталоге.
    Flat,
    /// Повторять структуру каталогов корпуса.
    Mirror,
}

impl From<Layout> for OutputLayout {
    fn from(layout: Layout) -> Self {
        match layout {
            Layout::Flat => OutputLayout::Flat,
            Layout::Mirror => OutputLayout::Mirror,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = Args::parse();
    let runner = ShellRunner;

    let root = match args.root {
        Some(root) => std::path::absolute(&root)
            .with_context(|| format!("resolve repository root {}", root.display()))?,
        None => repository_root(&runner)?,
    };
    info!(root = %root.display(), "repository root");

    let mut config = SyncConfig::new(root);
    config.corpus.dir = args.corpus_dir;
    config.corpus.branch = args.branch;
    config.corpus.revision = args.corpus_revision;
    config.corpus.test_subdir = args.test_subdir;
    config.fixtures.dir = args.fixture_dir;
    config.fixtures.recursive = args.recursive;
    config.fixtures.layout = args.layout.into();
    config.fixtures.failure_policy =
        if args.strict { FailurePolicy::Strict } else { FailurePolicy::Tolerant };
    config.converter.install_dir = args.converter_dir;
    config.converter.remote = args.converter_remote;
    config.converter.revision = args.converter_revision;

    let outcome = Pipeline::new(&config, &runner).run()?;

    if let Some(path) = &args.report {
        outcome
            .report
            .write_json(path, outcome.corpus.revision.as_deref())
            .with_context(|| format!("write report {}", path.display()))?;
        info!(path = %path.display(), "report written");
    }

    for record in outcome.report.failed() {
        warn!(script = %record.script, "no fixture produced");
    }

    let summary = outcome.report.summary();
    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        converter = match outcome.tool_status {
            ToolStatus::Cached => "cached",
            ToolStatus::Built => "built",
        },
        fixtures = %config.fixture_root().display(),
        "done"
    );

    if outcome.report.is_acceptable(config.fixtures.failure_policy) {
        Ok(ExitCode::SUCCESS)
    } else {
        error!(failed = summary.failed, "conversion failures in strict mode");
        Ok(ExitCode::from(2))
    }
}

fn repository_root(runner: &impl CommandRunner) -> Result<PathBuf> {
    let cwd = env::current_dir().context("get current directory")?;
    let toplevel = runner
        .read(&Invocation::new("git", &cwd).args(["rev-parse", "--show-toplevel"]))
        .context("locate repository root (pass --root outside a git checkout)")?;
    Ok(PathBuf::from(toplevel))
}
