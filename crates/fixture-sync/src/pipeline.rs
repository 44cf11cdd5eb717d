//! Конвейер целиком: синхронизация корпуса → подготовка конвертера → сборка фикстур.

use std::fmt;

use tracing::info;

use crate::{
    builder::FixtureBuilder,
    config::SyncConfig,
    corpus::{CorpusSnapshot, CorpusSynchronizer},
    error::SyncResult,
    report::BuildReport,
    runner::CommandRunner,
    tool::{ConverterTool, ToolBootstrap, ToolStatus},
};

/// Этап конвейера.
///
/// Переходы строго линейные:
///
/// ```text
/// Start → Syncing → Synced → ToolCheck → ToolReady → Converting → Done
/// ```
///
/// Из `Syncing`, `ToolCheck` и `Converting` можно попасть в `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Syncing,
    Synced,
    ToolCheck,
    ToolReady,
    Converting,
    Done,
    Aborted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::Syncing => "syncing",
            Stage::Synced => "synced",
            Stage::ToolCheck => "tool-check",
            Stage::ToolReady => "tool-ready",
            Stage::Converting => "converting",
            Stage::Done => "done",
            Stage::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Итог успешного прогона.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub corpus: CorpusSnapshot,
    pub tool: ConverterTool,
    pub tool_status: ToolStatus,
    pub report: BuildReport,
}

/// Один прогон конвейера.
///
/// Значение одноразовое: повторный [`run`](Pipeline::run) начинается заново с `Start`.
pub struct Pipeline<'a, R: CommandRunner> {
    config: &'a SyncConfig,
    runner: &'a R,
    stage: Stage,
    history: Vec<Stage>,
}

impl<'a, R: CommandRunner> Pipeline<'a, R> {
    pub fn new(config: &'a SyncConfig, runner: &'a R) -> Self {
        Self { config, runner, stage: Stage::Start, history: vec![Stage::Start] }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Все пройденные этапы, включая текущий.
    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    /// Выполняет все этапы по порядку.
    ///
    /// Ошибки конвертации отдельных файлов не прерывают прогон, они есть в
    /// [`PipelineOutcome::report`]. Любая другая ошибка переводит конвейер в
    /// [`Stage::Aborted`] и возвращается как есть.
    pub fn run(&mut self) -> SyncResult<PipelineOutcome> {
        self.stage = Stage::Start;
        self.history = vec![Stage::Start];

        match self.stages() {
            Ok(outcome) => {
                self.advance(Stage::Done);
                Ok(outcome)
            }
            Err(err) => {
                // Саму ошибку логирует вызывающий код
                self.advance(Stage::Aborted);
                Err(err)
            }
        }
    }

    fn stages(&mut self) -> SyncResult<PipelineOutcome> {
        let config = self.config;
        let runner = self.runner;

        self.advance(Stage::Syncing);
        let corpus = CorpusSynchronizer::new(config, runner).sync()?;
        self.advance(Stage::Synced);

        self.advance(Stage::ToolCheck);
        let (tool, tool_status) = ToolBootstrap::new(&config.converter, runner).ensure()?;
        self.advance(Stage::ToolReady);

        self.advance(Stage::Converting);
        let report = FixtureBuilder::new(&config.fixtures, runner).build(
            &config.test_dir(),
            &tool,
            &config.fixture_root(),
        )?;

        Ok(PipelineOutcome { corpus, tool, tool_status, report })
    }

    fn advance(&mut self, next: Stage) {
        info!(from = %self.stage, to = %next, "stage");
        self.stage = next;
        self.history.push(next);
    }
}
