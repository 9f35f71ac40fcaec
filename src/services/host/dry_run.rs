use crate::config::DryRunConfig;
use crate::error::{Result, WwError};
use crate::script::{RenderMode, ReplyMember, ScriptRequest};
use crate::window::{match_windows, Matcher, WindowAction, WindowSnapshot, NO_ACTIVE_WINDOW};
use crate::ww_error;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::r#trait::{ReplyChannel, ScriptHost, ScriptId};

type Inbox = mpsc::UnboundedSender<(String, String)>;

/// Эмулятор KWin: выполняет тот же алгоритм выбора на снимке из памяти
pub struct DryRunHost {
    snapshot: Mutex<WindowSnapshot>,
    version: String,
    scripts: Mutex<HashMap<i32, ScriptRequest>>,
    inboxes: Arc<Mutex<HashMap<String, Inbox>>>,
    next_script: AtomicI32,
    next_address: AtomicU32,
    silent: bool,
    stopped: Mutex<Vec<i32>>,
}

impl DryRunHost {
    pub fn new(snapshot: WindowSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            version: "6.2.4".to_string(),
            scripts: Mutex::new(HashMap::new()),
            inboxes: Arc::new(Mutex::new(HashMap::new())),
            next_script: AtomicI32::new(0),
            next_address: AtomicU32::new(1),
            silent: false,
            stopped: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(config: &DryRunConfig) -> Self {
        info!("Dry-run режим - KWin эмулируется, окон в снимке: {}", config.windows.len());
        Self::new(config.snapshot()).with_version(config.kwin_version.clone())
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Скрипты выполняются, но ответы никогда не отправляются
    #[allow(dead_code)]
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    #[allow(dead_code)]
    pub fn snapshot(&self) -> WindowSnapshot {
        self.snapshot.lock().clone()
    }

    #[allow(dead_code)]
    pub fn stopped_scripts(&self) -> Vec<i32> {
        self.stopped.lock().clone()
    }

    #[allow(dead_code)]
    pub fn open_channels(&self) -> usize {
        self.inboxes.lock().len()
    }

    /// Доставить сообщение на адрес, как это делает callDBus
    pub fn post(&self, address: &str, member: &str, value: impl Into<String>) -> bool {
        match self.inboxes.lock().get(address) {
            Some(inbox) => inbox.send((member.to_string(), value.into())).is_ok(),
            None => false,
        }
    }

    fn execute(&self, request: &ScriptRequest) -> Result<()> {
        match request.mode {
            RenderMode::Activate => self.apply_activation(request),
            RenderMode::WindowInfo => {
                let info = self
                    .snapshot
                    .lock()
                    .active_window()
                    .map(|w| w.describe())
                    .unwrap_or_else(|| NO_ACTIVE_WINDOW.to_string());
                self.reply(request, ReplyMember::WindowInfo, info);
                Ok(())
            }
            RenderMode::CountOnly => {
                let count = Matcher::new(&request.filter)?.candidates(&self.snapshot.lock()).len();
                self.reply(request, ReplyMember::MatchCount, count.to_string());
                Ok(())
            }
            RenderMode::DetectOnly => {
                let found = !Matcher::new(&request.filter)?.candidates(&self.snapshot.lock()).is_empty();
                self.reply(request, ReplyMember::HasMatches, found.to_string());
                Ok(())
            }
        }
    }

    fn reply(&self, request: &ScriptRequest, member: ReplyMember, value: String) {
        if self.silent {
            debug!("Dry-run: ответ {} подавлен", member);
            return;
        }
        if !self.post(&request.reply_address, member.as_str(), value) {
            debug!("Dry-run: адрес {} не слушает", request.reply_address);
        }
    }

    fn apply_activation(&self, request: &ScriptRequest) -> Result<()> {
        let mut snapshot = self.snapshot.lock();
        let outcome = match_windows(&snapshot, &request.filter, request.toggle)?;
        debug!("Dry-run: кандидатов {}, действие {:?}", outcome.candidates.len(), outcome.action);
        let Some(winner) = outcome.winner else {
            return Ok(());
        };

        let top = snapshot.windows.iter().map(|w| w.stacking_order).max().unwrap_or(0);
        let same = |id: &str, class: &str, order: i64| {
            id == winner.id && class == winner.class && order == winner.stacking_order
        };

        match outcome.action {
            WindowAction::Activate => {
                for window in snapshot.windows.iter_mut() {
                    if same(&window.id, &window.class, window.stacking_order) {
                        window.is_active = true;
                        window.minimized = false;
                        window.stacking_order = top + 1;
                    } else {
                        window.is_active = false;
                    }
                }
                info!("Dry-run: активировано окно {}", winner);
            }
            WindowAction::ToggleMinimize => {
                if let Some(window) = snapshot
                    .windows
                    .iter_mut()
                    .find(|w| same(&w.id, &w.class, w.stacking_order))
                {
                    window.minimized = !window.minimized;
                    // Свёрнутое окно теряет фокус, как в KWin
                    window.is_active = !window.minimized;
                    info!("Dry-run: minimized={} для окна {}", window.minimized, winner);
                }
            }
            WindowAction::None => debug!("Dry-run: окно {} уже активно", winner),
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ScriptHost for DryRunHost {
    async fn open_reply_channel(&self) -> Result<Box<dyn ReplyChannel>> {
        let address = format!(":dry.{}", self.next_address.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.inboxes.lock().insert(address.clone(), tx);

        Ok(Box::new(DryRunReplyChannel {
            address,
            inbox: rx,
            registry: self.inboxes.clone(),
        }))
    }

    async fn load_script(&self, path: &Path, request: &ScriptRequest) -> Result<ScriptId> {
        if !path.is_file() {
            return Err(ww_error!(unavailable, "скрипт {:?} не найден", path));
        }

        let number = self.next_script.fetch_add(1, Ordering::Relaxed);
        self.scripts.lock().insert(number, request.clone());
        debug!("Dry-run: загружен скрипт {} ({})", number, request.mode.as_str());

        Ok(ScriptId {
            number,
            plugin_name: format!("ww-dry-{}", number),
        })
    }

    async fn run_script(&self, script: &ScriptId) -> Result<()> {
        let request = self
            .scripts
            .lock()
            .get(&script.number)
            .cloned()
            .ok_or_else(|| WwError::EnvironmentUnavailable(format!("скрипт {} не загружен", script.number)))?;
        self.execute(&request)
    }

    async fn stop_script(&self, script: &ScriptId) -> Result<()> {
        self.scripts.lock().remove(&script.number);
        self.stopped.lock().push(script.number);
        Ok(())
    }

    fn stop_detached(&self, script: &ScriptId) {
        self.scripts.lock().remove(&script.number);
        self.stopped.lock().push(script.number);
    }

    async fn support_information(&self) -> Result<String> {
        Ok(format!(
            "KWin Support Information:\n\nVersion\n=======\nKWin version: {}\nQt Version: 6.7.2\n",
            self.version
        ))
    }
}

struct DryRunReplyChannel {
    address: String,
    inbox: mpsc::UnboundedReceiver<(String, String)>,
    registry: Arc<Mutex<HashMap<String, Inbox>>>,
}

#[async_trait::async_trait]
impl ReplyChannel for DryRunReplyChannel {
    fn address(&self) -> &str {
        &self.address
    }

    async fn await_reply(&mut self, member: ReplyMember, timeout: Duration) -> Result<Option<String>> {
        let inbox = &mut self.inbox;
        let wait = async {
            while let Some((name, value)) = inbox.recv().await {
                if name == member.as_str() {
                    return Some(value);
                }
                debug!("Dry-run: пропускаем постороннее сообщение {}", name);
            }
            None
        };

        Ok(tokio::time::timeout(timeout, wait).await.unwrap_or(None))
    }

    async fn close(self: Box<Self>) {}
}

impl Drop for DryRunReplyChannel {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.address);
    }
}
