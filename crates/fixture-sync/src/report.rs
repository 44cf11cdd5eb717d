//! Отчёт о пакетной конвертации: результат по каждому скрипту.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    config::FailurePolicy,
    error::{SyncError, SyncResult},
};

/// Результат конвертации одного скрипта.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionOutcome {
    Success,
    Failed { reason: String },
}

/// Запись отчёта для одного скрипта.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRecord {
    /// Путь скрипта относительно каталога тестов, например `add.wast`.
    pub script: String,
    /// Путь фикстуры относительно выходного каталога, например `add.json`.
    pub fixture: String,
    #[serde(flatten)]
    pub outcome: ConversionOutcome,
}

impl ConversionRecord {
    pub fn is_success(&self) -> bool {
        self.outcome == ConversionOutcome::Success
    }
}

/// Сводка по отчёту.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Отчёт, возвращаемый [`FixtureBuilder::build`](crate::builder::FixtureBuilder::build).
///
/// Записи идут в том же детерминированном порядке, в котором обрабатывались скрипты.
///
/// # Примеры
///
/// ```
/// use fixture_sync::{
///     config::FailurePolicy,
///     report::{BuildReport, ConversionOutcome, ConversionRecord},
/// };
///
/// let mut report = BuildReport::default();
/// report.push(ConversionRecord {
///     script: "add.wast".into(),
///     fixture: "add.json".into(),
///     outcome: ConversionOutcome::Success,
/// });
/// report.push(ConversionRecord {
///     script: "loop.wast".into(),
///     fixture: "loop.json".into(),
///     outcome: ConversionOutcome::Failed { reason: "exit code 1".into() },
/// });
///
/// assert_eq!(report.summary().failed, 1);
/// assert!(report.is_acceptable(FailurePolicy::Tolerant));
/// assert!(!report.is_acceptable(FailurePolicy::Strict));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub records: Vec<ConversionRecord>,
}

impl BuildReport {
    pub fn push(&mut self, record: ConversionRecord) {
        self.records.push(record);
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &ConversionRecord> {
        self.records.iter().filter(|r| r.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ConversionRecord> {
        self.records.iter().filter(|r| !r.is_success())
    }

    pub fn summary(&self) -> ReportSummary {
        let succeeded = self.succeeded().count();
        ReportSummary {
            total: self.records.len(),
            succeeded,
            failed: self.records.len() - succeeded,
        }
    }

    /// Не было ни одной ошибки конвертации.
    pub fn is_clean(&self) -> bool {
        self.failed().next().is_none()
    }

    /// Допустим ли такой результат при заданной политике.
    pub fn is_acceptable(&self, policy: FailurePolicy) -> bool {
        match policy {
            FailurePolicy::Tolerant => true,
            FailurePolicy::Strict => self.is_clean(),
        }
    }

    /// Записывает отчёт в JSON-файл вместе со временем генерации и ревизией корпуса.
    pub fn write_json(&self, path: &Path, corpus_revision: Option<&str>) -> SyncResult<()> {
        let document = ReportDocument {
            generated_at: jiff::Timestamp::now().to_string(),
            corpus_revision,
            summary: self.summary(),
            records: &self.records,
        };

        let file = File::create(path).map_err(SyncError::io(path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &document)
            .map_err(|e| SyncError::Io { path: path.to_path_buf(), source: e.into() })?;
        writer.flush().map_err(SyncError::io(path))
    }
}

/// Представление отчёта на диске.
#[derive(Serialize)]
struct ReportDocument<'a> {
    generated_at: String,
    corpus_revision: Option<&'a str>,
    summary: ReportSummary,
    records: &'a [ConversionRecord],
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn record(script: &str, outcome: ConversionOutcome) -> ConversionRecord {
        ConversionRecord {
            script: script.to_string(),
            fixture: script.replace(".wast", ".json"),
            outcome,
        }
    }

    fn failed(reason: &str) -> ConversionOutcome {
        ConversionOutcome::Failed { reason: reason.to_string() }
    }

    #[test]
    fn summary_counts_outcomes() {
        let report = BuildReport {
            records: vec![
                record("add.wast", ConversionOutcome::Success),
                record("loop.wast", failed("exit code 1")),
                record("br.wast", ConversionOutcome::Success),
            ],
        };

        assert_eq!(report.summary(), ReportSummary { total: 3, succeeded: 2, failed: 1 });
        assert!(!report.is_clean());
        let failed: Vec<_> = report.failed().map(|r| r.script.as_str()).collect();
        assert_eq!(failed, vec!["loop.wast"]);
    }

    #[test]
    fn empty_report_is_clean_under_any_policy() {
        let report = BuildReport::default();
        assert!(report.is_clean());
        assert!(report.is_acceptable(FailurePolicy::Strict));
        assert_eq!(report.summary(), ReportSummary::default());
    }

    #[test]
    fn record_serializes_with_flat_status() {
        let json = serde_json::to_value(record("loop.wast", failed("bad token"))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "script": "loop.wast",
                "fixture": "loop.json",
                "status": "failed",
                "reason": "bad token",
            })
        );

        let json = serde_json::to_value(record("add.wast", ConversionOutcome::Success)).unwrap();
        assert_eq!(json["status"], "success");
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn write_json_includes_summary_and_revision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = BuildReport {
            records: vec![
                record("add.wast", ConversionOutcome::Success),
                record("loop.wast", failed("exit code 1")),
            ],
        };

        report.write_json(&path, Some("abc123")).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["corpus_revision"], "abc123");
        assert_eq!(json["summary"]["total"], 2);
        assert_eq!(json["summary"]["failed"], 1);
        assert_eq!(json["records"][1]["script"], "loop.wast");
        assert!(json["generated_at"].as_str().unwrap().ends_with('Z'));
    }
}
