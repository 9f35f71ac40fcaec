use crate::error::{Result, WwError};
use crate::script::ScriptRequest;
use crate::utils::session_env;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};
use zbus::{proxy, Connection};

use super::r#trait::{ReplyChannel, ScriptHost, ScriptId};
use super::reply::KwinReplyChannel;

#[proxy(
    interface = "org.kde.kwin.Scripting",
    default_service = "org.kde.KWin",
    default_path = "/Scripting"
)]
trait Scripting {
    #[zbus(name = "loadScript")]
    fn load_script(&self, file_path: &str, plugin_name: &str) -> zbus::Result<i32>;

    #[zbus(name = "unloadScript")]
    fn unload_script(&self, plugin_name: &str) -> zbus::Result<bool>;
}

#[proxy(interface = "org.kde.kwin.Script", default_service = "org.kde.KWin")]
trait Script {
    #[zbus(name = "run")]
    fn run(&self) -> zbus::Result<()>;

    #[zbus(name = "stop")]
    fn stop(&self) -> zbus::Result<()>;
}

#[proxy(interface = "org.kde.KWin", default_service = "org.kde.KWin", default_path = "/KWin")]
trait KWin {
    #[zbus(name = "supportInformation")]
    fn support_information(&self) -> zbus::Result<String>;
}

pub struct KwinHost {
    connection: Connection,
    service: String,
}

impl KwinHost {
    pub async fn connect(service: &str) -> Result<Self> {
        info!("Подключение к KWin через D-Bus ({})", service);

        let connection = match session_env::session_bus_address() {
            Some(address) => {
                debug!("Используем адрес сессионной шины пользователя: {}", address);
                zbus::connection::Builder::address(address.as_str())
                    .map_err(|e| WwError::unavailable("адрес сессионной шины", e))?
                    .build()
                    .await
            }
            None => Connection::session().await,
        }
        .map_err(|e| WwError::unavailable("подключение к сессионной шине", e))?;

        Ok(Self {
            connection,
            service: service.to_string(),
        })
    }

    async fn scripting(&self) -> Result<ScriptingProxy<'_>> {
        ScriptingProxy::builder(&self.connection)
            .destination(self.service.as_str())?
            .build()
            .await
            .map_err(|e| WwError::unavailable("org.kde.kwin.Scripting", e))
    }

    async fn script(&self, script: &ScriptId) -> Result<ScriptProxy<'_>> {
        ScriptProxy::builder(&self.connection)
            .destination(self.service.as_str())?
            .path(script.object_path())?
            .build()
            .await
            .map_err(|e| WwError::unavailable("org.kde.kwin.Script", e))
    }

    fn plugin_name(path: &Path) -> String {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("script");
        format!("ww-{}-{}", stem, std::process::id())
    }
}

#[async_trait::async_trait]
impl ScriptHost for KwinHost {
    async fn open_reply_channel(&self) -> Result<Box<dyn ReplyChannel>> {
        Ok(Box::new(KwinReplyChannel::open(&self.connection)?))
    }

    async fn load_script(&self, path: &Path, request: &ScriptRequest) -> Result<ScriptId> {
        let path_str = path
            .to_str()
            .ok_or_else(|| WwError::Internal(format!("Путь к скрипту не UTF-8: {:?}", path)))?;
        let plugin_name = Self::plugin_name(path);
        let scripting = self.scripting().await?;

        debug!("loadScript({}, {}) для режима {}", path_str, plugin_name, request.mode.as_str());
        let mut number = scripting
            .load_script(path_str, &plugin_name)
            .await
            .map_err(|e| WwError::unavailable("loadScript", e))?;

        // KWin возвращает -1, если скрипт с таким именем ещё загружен
        if number < 0 {
            debug!("Скрипт {} уже загружен, выгружаем и повторяем", plugin_name);
            let _ = scripting.unload_script(&plugin_name).await;
            number = scripting
                .load_script(path_str, &plugin_name)
                .await
                .map_err(|e| WwError::unavailable("loadScript", e))?;
        }

        if number < 0 {
            return Err(WwError::EnvironmentUnavailable(format!(
                "KWin отказался загрузить скрипт {:?}",
                path
            )));
        }

        Ok(ScriptId { number, plugin_name })
    }

    async fn run_script(&self, script: &ScriptId) -> Result<()> {
        self.script(script)
            .await?
            .run()
            .await
            .map_err(|e| WwError::unavailable("org.kde.kwin.Script.run", e))
    }

    async fn stop_script(&self, script: &ScriptId) -> Result<()> {
        self.script(script).await?.stop().await?;
        self.scripting().await?.unload_script(&script.plugin_name).await?;
        Ok(())
    }

    fn stop_detached(&self, script: &ScriptId) {
        let spawned = Command::new("dbus-send")
            .args([
                "--session",
                &format!("--dest={}", self.service),
                "--print-reply=literal",
                &script.object_path(),
                "org.kde.kwin.Script.stop",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        if let Err(e) = spawned {
            warn!("Не удалось запустить dbus-send для остановки {}: {}", script.object_path(), e);
        }
    }

    async fn support_information(&self) -> Result<String> {
        KWinProxy::builder(&self.connection)
            .destination(self.service.as_str())?
            .build()
            .await
            .map_err(|e| WwError::unavailable("org.kde.KWin", e))?
            .support_information()
            .await
            .map_err(|e| WwError::unavailable("supportInformation", e))
    }
}
