use crate::error::{Result, WwError};
use crate::services::host::ScriptHost;
use std::fs;
use std::io::Write;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Проверка мажорной версии KWin с кэшированием во временном файле
pub struct VersionGate {
    host: Arc<dyn ScriptHost>,
    /// `None` - версия запрашивается у KWin при каждом запуске
    cache_file: Option<PathBuf>,
}

impl VersionGate {
    pub fn new(host: Arc<dyn ScriptHost>, cache_file: Option<PathBuf>) -> Self {
        Self { host, cache_file }
    }

    /// `<tmp>/ww-kwin-version-<uid>`; без uid кэша нет
    pub fn default_cache_file() -> Option<PathBuf> {
        let uid = current_uid()?;
        Some(std::env::temp_dir().join(format!("ww-kwin-version-{}", uid)))
    }

    pub async fn major_version(&self) -> Result<u32> {
        if let Some(major) = self.cache_file.as_deref().and_then(read_cached) {
            debug!("Версия KWin из кэша {:?}: {}", self.cache_file, major);
            return Ok(major);
        }

        let info = self.host.support_information().await?;
        let major = parse_major(&info).ok_or_else(|| {
            WwError::EnvironmentUnavailable("KWin не сообщил номер версии в supportInformation".to_string())
        })?;
        info!("Обнаружена версия KWin: {}", major);

        if let Some(path) = &self.cache_file {
            if let Err(e) = write_cached(path, major) {
                warn!("Не удалось сохранить версию KWin в {:?}: {}", path, e);
            }
        }
        Ok(major)
    }

    pub async fn require(&self, required: u32) -> Result<()> {
        let found = self.major_version().await?;
        if found < required {
            return Err(WwError::VersionUnsupported { found, required });
        }
        Ok(())
    }
}

/// Мажорная версия из строки вида `KWin version: 6.2.4`
pub fn parse_major(info: &str) -> Option<u32> {
    info.lines()
        .find_map(|line| line.trim().strip_prefix("KWin version:"))
        .and_then(|version| version.trim().split('.').next())
        .and_then(|major| major.trim().parse().ok())
}

fn current_uid() -> Option<u32> {
    fs::metadata("/proc/self").map(|m| m.uid()).ok()
}

/// Символические ссылки и чужие файлы в кэше не читаются
fn read_cached(path: &Path) -> Option<u32> {
    let meta = fs::symlink_metadata(path).ok()?;
    if !meta.file_type().is_file() || current_uid().is_some_and(|uid| uid != meta.uid()) {
        warn!("Кэш версии {:?} игнорируется: не обычный файл текущего пользователя", path);
        return None;
    }
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Через временный файл и rename: ссылка на месте кэша заменяется, а не перезаписывается цель
fn write_cached(path: &Path, major: u32) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(major.to_string().as_bytes())?;
    tmp.as_file().set_permissions(fs::Permissions::from_mode(0o644))?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
