use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::window::{DesktopMembership, WindowRecord, WindowSnapshot};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub host: HostConfig,
    pub reply: ReplyConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    pub dry_run: DryRunConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostConfig {
    /// Имя сервиса KWin на сессионной шине
    pub service: String,
    /// Минимальная мажорная версия KWin для --info-active
    pub min_info_major: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplyConfig {
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub script_dir: Option<PathBuf>,
    #[serde(default)]
    pub version_file: Option<PathBuf>,
}

/// Окна, которые видит эмулятор KWin в режиме --dry-run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DryRunConfig {
    pub kwin_version: String,
    #[serde(default)]
    pub current_desktop: Option<String>,
    #[serde(default)]
    pub windows: Vec<WindowRecord>,
}

impl DryRunConfig {
    pub fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            windows: self.windows.clone(),
            current_desktop: self.current_desktop.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let desktop = |id: &str| DesktopMembership::Desktops(vec![id.to_string()]);
        Self {
            logging: LoggingConfig {
                level: "warn".to_string(),
                format: "compact".to_string(),
            },
            host: HostConfig {
                service: "org.kde.KWin".to_string(),
                min_info_major: 6,
            },
            reply: ReplyConfig { timeout_ms: 5000 },
            cache: CacheConfig::default(),
            dry_run: DryRunConfig {
                kwin_version: "6.2.4".to_string(),
                current_desktop: Some("Desktop 1".to_string()),
                windows: vec![
                    WindowRecord::new("konsole", "~ : zsh - dry_run")
                        .with_id("dry-1")
                        .with_stacking_order(1)
                        .with_desktops(desktop("Desktop 1")),
                    WindowRecord::new("firefox", "Browser - dry_run")
                        .with_id("dry-2")
                        .with_stacking_order(2)
                        .with_desktops(DesktopMembership::All),
                    WindowRecord::new("org.kde.kate", "Editor - dry_run")
                        .with_id("dry-3")
                        .with_stacking_order(3)
                        .with_desktops(desktop("Desktop 2"))
                        .active(),
                ],
            },
        }
    }
}

impl Config {
    /// `$XDG_CONFIG_HOME/ww/ww.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ww")
            .join("ww.toml")
    }

    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        // Отсутствующий файл не ошибка: остаются значения по умолчанию
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("WW_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "compact" | "full" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        if self.host.service.is_empty() {
            anyhow::bail!("host.service не может быть пустым");
        }

        if self.reply.timeout_ms == 0 {
            anyhow::bail!("reply.timeout_ms должно быть больше 0");
        }

        Ok(())
    }

    pub fn script_dir(&self) -> PathBuf {
        self.cache
            .script_dir
            .clone()
            .unwrap_or_else(crate::script::ScriptCache::default_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reply.timeout_ms, 5000);
        assert_eq!(config.host.min_info_major, 6);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.host.service, "org.kde.KWin");
        assert_eq!(config.dry_run.windows.len(), 3);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ww.toml");
        std::fs::write(
            &path,
            r#"
[reply]
timeout_ms = 250

[cache]
script_dir = "/tmp/ww-test-scripts"

[[dry_run.windows]]
class = "kitty"
caption = "shell"
stacking_order = 4
is_active = true
desktops = "all"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.reply.timeout_ms, 250);
        assert_eq!(config.script_dir(), PathBuf::from("/tmp/ww-test-scripts"));
        assert_eq!(config.dry_run.windows.len(), 1);
        assert_eq!(config.dry_run.windows[0].desktops, DesktopMembership::All);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let mut config = Config::default();
        config.reply.timeout_ms = 0;
        assert!(config.validate().is_err());
    }
}
