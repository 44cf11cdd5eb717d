//! # xtask - Автоматизация сборки проекта
//!
//! Этот крейт предоставляет команды автоматизации сборки для воркспейса.
//!
//! См. [`HELP_TEXT`] для полного списка доступных команд и информации по использованию.
use anyhow::{Context, Result, bail};
use xshell::{Shell, cmd};

/// Текст справки для команды xtask.
///
/// Эта константа содержит полное сообщение справки, которое отображается
/// при запуске `cargo run -p xtask -- help`.
pub const HELP_TEXT: &str = r#"xtask

Использование:
  cargo run -p xtask -- <команда> [аргументы]

Команды:
  help         Показать это сообщение
  fmt          Запустить rustfmt
  fmt-check    Проверить форматирование (CI)
  clippy       Запустить clippy (воркспейс)
  test         Запустить тесты через nextest (воркспейс)
  ci           Запустить fmt-check + clippy + test (профиль CI)
  fixtures     Обновить корпус и пересобрать tests/fixtures
               (аргументы передаются в fixture-sync, например --strict)

Примечание:
  cargo-nextest устанавливается автоматически при первом запуске тестов
"#;

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let cmd = args.next().unwrap_or_else(|| "help".to_string());

    let sh = Shell::new()?;
    sh.change_dir(project_root()?);

    match cmd.as_str() {
        "help" | "-h" | "--help" => help(),
        "fmt" => Ok(cmd!(sh, "cargo +nightly fmt --all").run()?),
        "fmt-check" => Ok(cmd!(sh, "cargo +nightly fmt --all -- --check").run()?),
        "clippy" => Ok(cmd!(sh, "cargo +nightly clippy --workspace -- -D warnings").run()?),
        "test" => {
            ensure_nextest(&sh)?;
            cmd!(sh, "cargo nextest run --workspace").run()?;
            // Doc-тесты отдельно (nextest их не поддерживает)
            cmd!(sh, "cargo +nightly test --workspace --doc").run()?;
            Ok(())
        }
        "ci" => {
            ensure_nextest(&sh)?;
            cmd!(sh, "cargo +nightly fmt --all -- --check").run()?;
            cmd!(sh, "cargo +nightly clippy --workspace -- -D warnings").run()?;
            cmd!(sh, "cargo nextest run --workspace --no-fail-fast").run()?;
            // Doc-тесты отдельно (nextest их не поддерживает)
            cmd!(sh, "cargo +nightly test --workspace --doc").run()?;
            Ok(())
        }
        "fixtures" => fixtures(&sh, args.collect()),
        other => bail!("Неизвестная команда: {other}\n\nЗапустите: cargo run -p xtask -- help"),
    }
}

/// Показать сообщение справки.
fn help() -> Result<()> {
    println!("{}", HELP_TEXT);
    Ok(())
}

/// Пересобрать фикстуры из корпуса.
///
/// Запускает `fixture-sync` из корня воркспейса, поэтому `--root` по умолчанию
/// указывает на этот репозиторий. Код выхода `2` (ошибки конвертации в режиме
/// `--strict`) тоже считается ошибкой.
fn fixtures(sh: &Shell, args: Vec<String>) -> Result<()> {
    let root = project_root()?;
    cmd!(sh, "cargo run --release -p fixture-sync -- --root {root} {args...}")
        .run()
        .context("fixture-sync завершился с ошибкой")?;
    Ok(())
}

/// Получить корневую директорию проекта.
///
/// Эта функция определяет корень проекта, находя родительскую директорию
/// директории манифеста текущего крейта.
///
/// # Ошибки
///
/// Возвращает ошибку, если:
/// - Переменная окружения CARGO_MANIFEST_DIR не установлена
/// - Директория манифеста не имеет родительской директории
fn project_root() -> Result<std::path::PathBuf> {
    Ok(std::env::var("CARGO_MANIFEST_DIR")
        .map(std::path::PathBuf::from)?
        .parent()
        .context("CARGO_MANIFEST_DIR не имеет родительской директории")?
        .to_path_buf())
}

/// Проверить наличие cargo-nextest и установить при необходимости.
///
/// Без `ignore_status()`: если `cargo nextest --version` завершится с ошибкой,
/// `run()` вернёт `Err`, и nextest будет установлен через `cargo install`.
fn ensure_nextest(sh: &Shell) -> Result<()> {
    if cmd!(sh, "cargo nextest --version").quiet().run().is_ok() {
        return Ok(());
    }

    eprintln!("cargo-nextest не найден, устанавливаю...");
    cmd!(sh, "cargo install cargo-nextest --locked").run()?;
    eprintln!("cargo-nextest успешно установлен");
    Ok(())
}
