use crate::error::Result;
use crate::window::WindowFilter;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};

use super::template::render;
use super::ScriptRequest;

/// Скрипт действия, лежащий в кэше на диске
#[derive(Debug, Clone)]
pub struct CachedPayload {
    pub path: PathBuf,
    pub request: ScriptRequest,
    /// true, если файл был создан при этом обращении
    pub created: bool,
}

/// Кэш скриптов с адресацией по содержимому фильтра.
/// Файлы никогда не удаляются и не перезаписываются, если уже существуют.
pub struct ScriptCache {
    dir: PathBuf,
}

impl ScriptCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `$XDG_CONFIG_HOME/.wwscripts`, либо `~/.wwscripts`
    pub fn default_dir() -> PathBuf {
        Self::dir_under(std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from), dirs::home_dir())
    }

    fn dir_under(config_home: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
        config_home
            .filter(|dir| !dir.as_os_str().is_empty())
            .or(home)
            .unwrap_or_else(std::env::temp_dir)
            .join(".wwscripts")
    }

    /// Ключ кэша: первые 32 hex-символа SHA-256 от склеенных полей
    pub fn digest(filter: &WindowFilter, toggle: bool) -> String {
        let info = format!(
            "{}{}{}{}{}",
            filter.class_exact, filter.caption_pattern, filter.class_pattern, filter.current_desktop_only, toggle
        );

        let mut hasher = Sha256::new();
        hasher.update(info.as_bytes());
        let digest = hasher.finalize();
        let mut output = String::with_capacity(digest.len() * 2);
        for byte in digest {
            output.push_str(&format!("{byte:02x}"));
        }
        output.truncate(32);
        output
    }

    pub fn path_for(&self, filter: &WindowFilter, toggle: bool) -> PathBuf {
        self.dir.join(Self::digest(filter, toggle))
    }

    /// Возвращает скрипт действия, генерируя и сохраняя его при первом обращении
    pub fn resolve(&self, filter: &WindowFilter, toggle: bool) -> Result<CachedPayload> {
        let request = ScriptRequest::activate(filter.clone(), toggle);
        let path = self.path_for(filter, toggle);

        if path.exists() {
            debug!("Скрипт найден в кэше: {:?}", path);
            return Ok(CachedPayload {
                path,
                request,
                created: false,
            });
        }

        let payload = render(&request)?;
        fs::create_dir_all(&self.dir)?;

        // Запись через временный файл и rename: при гонке побеждает последний, содержимое одинаковое
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(payload.text.as_bytes())?;
        tmp.persist(&path).map_err(|e| e.error)?;

        info!("Скрипт сохранён в кэш: {:?}", path);
        Ok(CachedPayload {
            path,
            request,
            created: true,
        })
    }
}
