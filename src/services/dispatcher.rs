use crate::error::{Result, WwError};
use crate::script::{render, CachedPayload, RenderMode, ReplyMember, ScriptCache, ScriptRequest};
use crate::services::host::{ReplyChannel, ScriptHost, ScriptId};
use crate::trace_if_enabled;
use crate::window::{Matcher, WindowFilter, NO_ACTIVE_WINDOW};
use crate::ww_error;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Результат запроса к скрипту
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Done(String),
    /// Ответа не было, это не ошибка
    TimedOut,
}

/// Что сделала связка «найти или запустить»
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaiseOutcome {
    Launched,
    Activated,
}

/// Один круг общения с KWin: запрос с ожиданием ответа или действие без ожидания
pub struct Dispatcher {
    host: Arc<dyn ScriptHost>,
    cache: ScriptCache,
    reply_timeout: Duration,
}

/// zbus-ошибки на границе с KWin означают, что KWin недоступен
fn host_error(err: WwError) -> WwError {
    match err {
        WwError::DBus(e) => WwError::unavailable("D-Bus", e),
        other => other,
    }
}

/// Регулярные выражения проверяются до отправки: внутри KWin ошибка не дала бы ответа
fn check_patterns(filter: &WindowFilter) -> Result<()> {
    Matcher::new(filter).map(|_| ())
}

impl Dispatcher {
    pub fn new(host: Arc<dyn ScriptHost>, cache: ScriptCache, reply_timeout: Duration) -> Self {
        Self {
            host,
            cache,
            reply_timeout,
        }
    }

    /// Query flow: открыть канал, отправить скрипт, дождаться ответа, остановить скрипт
    pub async fn query(&self, filter: &WindowFilter, mode: RenderMode) -> Result<QueryOutcome> {
        let member = mode
            .reply_member()
            .ok_or_else(|| ww_error!(internal, "режим {} не отвечает", mode.as_str()))?;
        check_patterns(filter)?;

        let mut channel = self.host.open_reply_channel().await.map_err(host_error)?;
        let outcome = self.round_trip(channel.as_mut(), filter, mode, member).await;
        channel.close().await;
        outcome.map_err(host_error)
    }

    async fn round_trip(
        &self,
        channel: &mut dyn ReplyChannel,
        filter: &WindowFilter,
        mode: RenderMode,
        member: ReplyMember,
    ) -> Result<QueryOutcome> {
        let request = ScriptRequest::query(filter.clone(), mode, channel.address());
        let payload = render(&request)?;
        trace_if_enabled!("Скрипт запроса:\n{}", payload.text);

        // Временный файл удаляется при выходе из функции, уже после остановки скрипта
        let mut file = tempfile::Builder::new().prefix("ww-").suffix(".js").tempfile()?;
        file.write_all(payload.text.as_bytes())?;
        file.flush()?;

        let script = self.host.load_script(file.path(), &payload.request).await?;
        if let Err(e) = self.host.run_script(&script).await {
            self.stop_quietly(&script).await;
            return Err(e);
        }

        debug!("Ожидание ответа {} на {}", member, channel.address());
        let reply = channel.await_reply(member, self.reply_timeout).await;
        self.stop_quietly(&script).await;

        Ok(match reply? {
            Some(value) => QueryOutcome::Done(value),
            None => QueryOutcome::TimedOut,
        })
    }

    async fn stop_quietly(&self, script: &ScriptId) {
        if let Err(e) = self.host.stop_script(script).await {
            warn!("Не удалось остановить скрипт {}: {}", script.object_path(), e);
        }
    }

    pub async fn count_matches(&self, filter: &WindowFilter) -> Result<usize> {
        match self.query(filter, RenderMode::CountOnly).await? {
            QueryOutcome::Done(value) => Ok(value.trim().parse().unwrap_or_else(|_| {
                warn!("Некорректный ответ matchCount: {:?}", value);
                0
            })),
            QueryOutcome::TimedOut => Ok(0),
        }
    }

    pub async fn has_matches(&self, filter: &WindowFilter) -> Result<bool> {
        match self.query(filter, RenderMode::DetectOnly).await? {
            QueryOutcome::Done(value) => Ok(value.trim().eq_ignore_ascii_case("true")),
            QueryOutcome::TimedOut => Ok(false),
        }
    }

    /// Описание активного окна; `None`, если KWin не ответил
    pub async fn active_window_info(&self) -> Result<Option<String>> {
        match self.query(&WindowFilter::default(), RenderMode::WindowInfo).await? {
            QueryOutcome::Done(value) => {
                if value == NO_ACTIVE_WINDOW {
                    debug!("Активного окна нет");
                }
                Ok(Some(value))
            }
            QueryOutcome::TimedOut => Ok(None),
        }
    }

    /// Action flow: скрипт из кэша, запуск и остановка без ожидания
    pub async fn activate(&self, filter: &WindowFilter, toggle: bool) -> Result<CachedPayload> {
        check_patterns(filter)?;
        let cached = self.cache.resolve(filter, toggle)?;
        debug!("Скрипт действия {:?} (создан сейчас: {})", cached.path, cached.created);
        let script = self
            .host
            .load_script(&cached.path, &cached.request)
            .await
            .map_err(host_error)?;
        self.host.run_script(&script).await.map_err(host_error)?;
        self.host.stop_detached(&script);

        info!("Скрипт действия {} выполнен для фильтра {}", script.object_path(), filter);
        Ok(cached)
    }

    /// Активировать окно, а если подходящих нет, запустить команду
    pub async fn raise_or_launch<F>(&self, filter: &WindowFilter, toggle: bool, command: &str, launch: F) -> Result<RaiseOutcome>
    where
        F: FnOnce(&str) -> Result<()>,
    {
        if !self.has_matches(filter).await? {
            info!("Подходящих окон нет, запускаем команду: {}", command);
            launch(command)?;
            return Ok(RaiseOutcome::Launched);
        }

        self.activate(filter, toggle).await?;
        Ok(RaiseOutcome::Activated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::host::DryRunHost;
    use crate::window::{WindowRecord, WindowSnapshot};
    use tempfile::TempDir;

    fn window(class: &str, id: &str, order: i64) -> WindowRecord {
        WindowRecord::new(class, format!("{} window", class))
            .with_id(id)
            .with_stacking_order(order)
    }

    fn setup(host: Arc<DryRunHost>) -> (Dispatcher, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(host, ScriptCache::new(dir.path()), Duration::from_millis(5000));
        (dispatcher, dir)
    }

    fn active_id(host: &DryRunHost) -> Option<String> {
        host.snapshot().active_window().map(|w| w.id.clone())
    }

    #[tokio::test]
    async fn test_count_matches_reports_candidates() {
        let host = Arc::new(DryRunHost::new(WindowSnapshot::new(vec![
            window("konsole", "k1", 1),
            window("konsole", "k2", 2),
            window("kate", "e1", 3),
        ])));
        let (dispatcher, _dir) = setup(host.clone());

        assert_eq!(dispatcher.count_matches(&WindowFilter::by_class("konsole")).await.unwrap(), 2);
        assert!(dispatcher.has_matches(&WindowFilter::by_class("kate")).await.unwrap());
        assert!(!dispatcher.has_matches(&WindowFilter::by_class("gimp")).await.unwrap());
        assert_eq!(host.open_channels(), 0);
        assert_eq!(host.stopped_scripts().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_host_times_out_and_launches_fallback() {
        let host = Arc::new(DryRunHost::new(WindowSnapshot::new(vec![window("konsole", "k1", 1)])).silent());
        let (dispatcher, _dir) = setup(host.clone());

        let started = tokio::time::Instant::now();
        assert_eq!(dispatcher.count_matches(&WindowFilter::by_class("konsole")).await.unwrap(), 0);
        assert!(started.elapsed() >= Duration::from_millis(5000));

        let mut launched = Vec::new();
        let outcome = dispatcher
            .raise_or_launch(&WindowFilter::by_class("konsole"), false, "konsole", |cmd| {
                launched.push(cmd.to_string());
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(outcome, RaiseOutcome::Launched);
        assert_eq!(launched, vec!["konsole".to_string()]);
        assert_eq!(host.open_channels(), 0);
    }

    #[tokio::test]
    async fn test_existing_window_is_raised_instead_of_launching() {
        let host = Arc::new(DryRunHost::new(WindowSnapshot::new(vec![
            window("firefox", "f1", 1),
            window("kate", "e1", 2).active(),
        ])));
        let (dispatcher, _dir) = setup(host.clone());

        let outcome = dispatcher
            .raise_or_launch(&WindowFilter::by_class("firefox"), false, "firefox", |_| {
                panic!("команда не должна запускаться")
            })
            .await
            .unwrap();

        assert_eq!(outcome, RaiseOutcome::Activated);
        assert_eq!(active_id(&host).as_deref(), Some("f1"));
    }

    #[tokio::test]
    async fn test_second_activation_is_a_no_op() {
        let host = Arc::new(DryRunHost::new(WindowSnapshot::new(vec![
            window("dolphin", "d1", 1),
            window("kate", "e1", 2).active(),
        ])));
        let (dispatcher, _dir) = setup(host.clone());
        let filter = WindowFilter::by_class("dolphin");

        let first = dispatcher.activate(&filter, false).await.unwrap();
        assert!(first.created);
        let after_first = host.snapshot();
        assert_eq!(active_id(&host).as_deref(), Some("d1"));

        let second = dispatcher.activate(&filter, false).await.unwrap();
        assert!(!second.created);
        assert_eq!(host.snapshot(), after_first);
        assert_eq!(host.stopped_scripts().len(), 2);
    }

    #[tokio::test]
    async fn test_toggle_alternates_minimized() {
        let host = Arc::new(DryRunHost::new(WindowSnapshot::new(vec![window("konsole", "k1", 1).active()])));
        let (dispatcher, _dir) = setup(host.clone());
        let filter = WindowFilter::by_class("konsole");

        let mut states = Vec::new();
        for _ in 0..4 {
            dispatcher.activate(&filter, true).await.unwrap();
            states.push(host.snapshot().windows[0].minimized);
        }
        assert_eq!(states, vec![true, false, true, false]);
    }

    #[tokio::test]
    async fn test_repeated_activation_cycles_sibling_windows() {
        let host = Arc::new(DryRunHost::new(WindowSnapshot::new(vec![
            window("konsole", "a", 2).active(),
            window("konsole", "b", 5),
            window("konsole", "c", 1),
        ])));
        let (dispatcher, _dir) = setup(host.clone());
        let filter = WindowFilter::by_class("konsole");

        let mut visited = Vec::new();
        for _ in 0..3 {
            dispatcher.activate(&filter, false).await.unwrap();
            visited.push(active_id(&host).unwrap());
        }
        assert_eq!(visited, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_active_window_info() {
        let host = Arc::new(DryRunHost::new(WindowSnapshot::new(vec![window("kate", "e1", 2).active()])));
        let (dispatcher, _dir) = setup(host.clone());

        let info = dispatcher.active_window_info().await.unwrap().unwrap();
        assert!(info.starts_with("class: kate\ncaption: kate window\nid: e1"));

        let empty = Arc::new(DryRunHost::new(WindowSnapshot::new(vec![window("kate", "e1", 2)])));
        let (dispatcher, _dir) = setup(empty);
        assert_eq!(dispatcher.active_window_info().await.unwrap().as_deref(), Some(NO_ACTIVE_WINDOW));
    }

    #[tokio::test]
    async fn test_unsafe_filter_fails_before_loading() {
        let host = Arc::new(DryRunHost::new(WindowSnapshot::default()));
        let (dispatcher, _dir) = setup(host.clone());

        let err = dispatcher.activate(&WindowFilter::by_caption("don't"), false).await;
        assert!(matches!(err, Err(WwError::UserInput(_))));
        assert!(host.stopped_scripts().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_regex_fails_without_launch() {
        let host = Arc::new(DryRunHost::new(WindowSnapshot::new(vec![window("konsole", "k1", 1)])));
        let (dispatcher, dir) = setup(host.clone());

        let filter = WindowFilter::by_class_pattern("(konsole");
        let outcome = dispatcher
            .raise_or_launch(&filter, false, "konsole", |_| panic!("команда не должна запускаться"))
            .await;
        assert!(matches!(outcome, Err(WwError::Regex(_))));

        let err = dispatcher.activate(&WindowFilter::by_caption("[vim"), false).await;
        assert!(matches!(err, Err(WwError::Regex(_))));
        assert_eq!(host.open_channels(), 0);
        assert!(host.stopped_scripts().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
