use crate::config::Config;
use crate::error::Result;
use crate::script::{ReplyMember, ScriptRequest};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Скрипт, загруженный в KWin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptId {
    pub number: i32,
    pub plugin_name: String,
}

impl ScriptId {
    pub fn object_path(&self) -> String {
        format!("/Scripting/Script{}", self.number)
    }
}

/// Одноразовая точка приёма ответа от скрипта
#[async_trait::async_trait]
pub trait ReplyChannel: Send {
    /// Адрес, который скрипт передаёт в callDBus
    fn address(&self) -> &str;

    /// Ждёт первое сообщение с именем `member`. `Ok(None)` означает таймаут.
    async fn await_reply(&mut self, member: ReplyMember, timeout: Duration) -> Result<Option<String>>;

    async fn close(self: Box<Self>);
}

/// Управляющая поверхность скриптов KWin
#[async_trait::async_trait]
pub trait ScriptHost: Send + Sync {
    /// Открывается до отправки скрипта, иначе ответ может прийти раньше слушателя
    async fn open_reply_channel(&self) -> Result<Box<dyn ReplyChannel>>;

    async fn load_script(&self, path: &Path, request: &ScriptRequest) -> Result<ScriptId>;

    async fn run_script(&self, script: &ScriptId) -> Result<()>;

    async fn stop_script(&self, script: &ScriptId) -> Result<()>;

    /// Остановка без ожидания, переживает завершение процесса
    fn stop_detached(&self, script: &ScriptId);

    async fn support_information(&self) -> Result<String>;
}

/// Factory function to create an appropriate script host based on the dry_run flag
pub async fn create_script_host(config: Arc<Config>, dry_run: bool) -> Result<Arc<dyn ScriptHost>> {
    if dry_run {
        Ok(Arc::new(super::DryRunHost::from_config(&config.dry_run)))
    } else {
        Ok(Arc::new(super::KwinHost::connect(&config.host.service).await?))
    }
}
