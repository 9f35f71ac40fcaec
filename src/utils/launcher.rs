use crate::error::{Result, WwError};
use std::process::{Command, Stdio};
use tracing::info;

/// Запускает резервную команду через `sh -c` и не ждёт её завершения
pub fn spawn_detached(command: &str) -> Result<u32> {
    if command.trim().is_empty() {
        return WwError::user_input("пустая команда для запуска");
    }

    let child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .spawn()?;

    info!("Запущена команда '{}' (pid {})", command, child.id());
    Ok(child.id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_detached_returns_pid() {
        let pid = spawn_detached("true").unwrap();
        assert!(pid > 0);
    }

    #[test]
    fn test_empty_command_is_rejected() {
        assert!(matches!(spawn_detached("  "), Err(WwError::UserInput(_))));
    }
}
