//! Запуск внешних процессов (git, make, конвертер).
//!
//! Весь конвейер обращается к процессам только через трейт [`CommandRunner`], поэтому
//! в тестах реальный [`ShellRunner`] подменяется записывающей заглушкой.

use std::{
    ffi::{OsStr, OsString},
    fmt,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::debug;
use xshell::{Cmd, Shell};

/// Один вызов внешней программы: что запустить, с какими аргументами и где.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: OsString,
    pub args: Vec<OsString>,
    /// Рабочий каталог процесса.
    pub cwd: PathBuf,
}

impl Invocation {
    pub fn new(program: impl AsRef<OsStr>, cwd: impl Into<PathBuf>) -> Self {
        Self { program: program.as_ref().to_os_string(), args: Vec::new(), cwd: cwd.into() }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Программа и аргументы в виде строк (с потерями для не-UTF-8).
    ///
    /// # Примеры
    ///
    /// ```
    /// use fixture_sync::runner::Invocation;
    ///
    /// let inv = Invocation::new("git", "/repo").args(["checkout", "master"]);
    /// assert_eq!(inv.argv(), vec!["git", "checkout", "master"]);
    /// ```
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|s| s.to_string_lossy().into_owned())
            .collect()
    }

    /// Имя программы без каталога (`/tmp/wabt/bin/wast2json` → `wast2json`).
    pub fn program_name(&self) -> String {
        Path::new(&self.program)
            .file_name()
            .unwrap_or(&self.program)
            .to_string_lossy()
            .into_owned()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv().join(" "))
    }
}

/// Захваченный вывод завершившегося процесса.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Успешный вывод с заданным stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self { success: true, code: Some(0), stdout: stdout.into(), stderr: String::new() }
    }

    /// Неуспешный вывод с кодом и stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self { success: false, code: Some(code), stdout: String::new(), stderr: stderr.into() }
    }

    /// Краткое описание причины неуспеха: код выхода и первая непустая строка stderr.
    pub fn failure_detail(&self) -> String {
        let status = match self.code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        };
        match self.stderr.lines().map(str::trim).find(|l| !l.is_empty()) {
            Some(line) => format!("{status}: {line}"),
            None => status,
        }
    }
}

/// Неудачный запуск внешней команды.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{command}` failed: {detail}")]
pub struct CommandError {
    /// Командная строка целиком.
    pub command: String,
    pub detail: String,
}

impl CommandError {
    pub fn new(invocation: &Invocation, detail: impl Into<String>) -> Self {
        Self { command: invocation.to_string(), detail: detail.into() }
    }
}

/// Исполнитель внешних команд.
pub trait CommandRunner {
    /// Запускает команду с унаследованными stdout/stderr; ненулевой код — ошибка.
    fn run(&self, invocation: &Invocation) -> Result<(), CommandError>;

    /// Запускает команду и захватывает вывод; ненулевой код ошибкой не считается.
    ///
    /// `Err` означает, что процесс вообще не удалось запустить.
    fn output(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError>;

    /// Запускает команду и возвращает её stdout без пробельных символов по краям.
    fn read(&self, invocation: &Invocation) -> Result<String, CommandError> {
        let output = self.output(invocation)?;
        if output.success {
            Ok(output.stdout.trim().to_string())
        } else {
            Err(CommandError::new(invocation, output.failure_detail()))
        }
    }
}

/// Реальный исполнитель поверх [`xshell`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl ShellRunner {
    fn shell(invocation: &Invocation) -> Result<Shell, CommandError> {
        let sh = Shell::new().map_err(|e| CommandError::new(invocation, e.to_string()))?;
        sh.change_dir(&invocation.cwd);
        Ok(sh)
    }

    fn command<'a>(sh: &'a Shell, invocation: &Invocation) -> Cmd<'a> {
        sh.cmd(&invocation.program).args(&invocation.args).quiet()
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, invocation: &Invocation) -> Result<(), CommandError> {
        debug!(command = %invocation, cwd = %invocation.cwd.display(), "running");
        let sh = Self::shell(invocation)?;
        Self::command(&sh, invocation)
            .run()
            .map_err(|e| CommandError::new(invocation, e.to_string()))
    }

    fn output(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        debug!(command = %invocation, cwd = %invocation.cwd.display(), "running (captured)");
        let sh = Self::shell(invocation)?;
        let output = Self::command(&sh, invocation)
            .ignore_status()
            .output()
            .map_err(|e| CommandError::new(invocation, e.to_string()))?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Записывающая заглушка для модульных тестов.
#[cfg(test)]
pub(crate) mod fake {
    use std::cell::RefCell;

    use super::*;

    type Handler = Box<dyn Fn(&Invocation) -> Result<CommandOutput, CommandError>>;

    /// Запоминает все вызовы и отвечает через заданный обработчик.
    pub(crate) struct FakeRunner {
        calls: RefCell<Vec<Invocation>>,
        handler: Handler,
    }

    impl FakeRunner {
        /// Каждая команда успешна и ничего не печатает.
        pub(crate) fn new() -> Self {
            Self::with(|_| Ok(CommandOutput::ok("")))
        }

        pub(crate) fn with(
            handler: impl Fn(&Invocation) -> Result<CommandOutput, CommandError> + 'static,
        ) -> Self {
            Self { calls: RefCell::new(Vec::new()), handler: Box::new(handler) }
        }

        pub(crate) fn calls(&self) -> Vec<Invocation> {
            self.calls.borrow().clone()
        }

        /// Командные строки всех вызовов, например `git pull`.
        pub(crate) fn command_lines(&self) -> Vec<String> {
            self.calls.borrow().iter().map(|c| c.argv().join(" ")).collect()
        }

        pub(crate) fn count(&self, program_name: &str) -> usize {
            self.calls.borrow().iter().filter(|c| c.program_name() == program_name).count()
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, invocation: &Invocation) -> Result<(), CommandError> {
            let output = self.output(invocation)?;
            if output.success {
                Ok(())
            } else {
                Err(CommandError::new(invocation, output.failure_detail()))
            }
        }

        fn output(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
            self.calls.borrow_mut().push(invocation.clone());
            (self.handler)(invocation)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_display_joins_argv() {
        let inv = Invocation::new("git", "/repo").args(["submodule", "update", "--init"]);
        assert_eq!(inv.to_string(), "git submodule update --init");
        assert_eq!(inv.cwd, PathBuf::from("/repo"));
    }

    #[test]
    fn program_name_strips_directories() {
        let inv = Invocation::new("/tmp/wabt/bin/wast2json", "/");
        assert_eq!(inv.program_name(), "wast2json");
        assert_eq!(Invocation::new("git", "/").program_name(), "git");
    }

    #[test]
    fn failure_detail_uses_first_stderr_line() {
        let output = CommandOutput::failed(1, "\n  add.wast:3: unexpected token\nmore\n");
        assert_eq!(output.failure_detail(), "exit code 1: add.wast:3: unexpected token");

        let silent = CommandOutput { success: false, code: None, ..Default::default() };
        assert_eq!(silent.failure_detail(), "terminated by signal");
    }

    #[cfg(unix)]
    #[test]
    fn shell_runner_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let inv = Invocation::new("sh", dir.path()).args(["-c", "printf ' hello '"]);

        let output = ShellRunner.output(&inv).unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, " hello ");
        assert_eq!(ShellRunner.read(&inv).unwrap(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn shell_runner_reports_non_zero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let inv = Invocation::new("sh", dir.path()).args(["-c", "echo broken >&2; exit 3"]);

        let output = ShellRunner.output(&inv).unwrap();
        assert!(!output.success);
        assert_eq!(output.code, Some(3));
        assert_eq!(output.failure_detail(), "exit code 3: broken");

        let err = ShellRunner.run(&inv).unwrap_err();
        assert!(err.command.starts_with("sh -c"));
    }

    #[test]
    fn shell_runner_fails_on_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let inv = Invocation::new("definitely-not-a-real-program-4821", dir.path());

        assert!(ShellRunner.output(&inv).is_err());
        assert!(ShellRunner.run(&inv).is_err());
    }
}
