//! Синхронизация тестовых фикстур из корпуса спецификации WebAssembly.
//!
//! Конвейер состоит из двух строго последовательных шагов:
//!
//! - [`corpus::CorpusSynchronizer`] — обновляет git-сабмодуль с корпусом `.wast` скриптов;
//! - [`builder::FixtureBuilder`] — при необходимости собирает конвертер
//!   ([`tool::ToolBootstrap`]) и переводит каждый скрипт в `.json` фикстуру.
//!
//! Оба шага собраны в [`pipeline::Pipeline`], который ведёт конечный автомат стадий и
//! возвращает [`report::BuildReport`] с результатом по каждому файлу.
//!
//! # Быстрый старт
//!
//! ```no_run
//! use fixture_sync::{config::SyncConfig, pipeline::Pipeline, runner::ShellRunner};
//!
//! let config = SyncConfig::new("/path/to/repo");
//! let runner = ShellRunner;
//! let outcome = Pipeline::new(&config, &runner).run()?;
//! println!("converted {} script(s)", outcome.report.summary().succeeded);
//! # Ok::<(), fixture_sync::error::SyncError>(())
//! ```

pub mod builder;
pub mod config;
pub mod corpus;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod staging;
pub mod tool;
