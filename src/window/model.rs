use serde::{Deserialize, Serialize};
use std::fmt;

/// Маркер, который скрипт KWin возвращает, если активного окна нет
pub const NO_ACTIVE_WINDOW: &str = "no active window";

/// Принадлежность окна виртуальным рабочим столам
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DesktopMembership {
    All,
    Desktops(Vec<String>),
    /// KWin не сообщил рабочие столы (несовпадение API)
    #[default]
    Unknown,
}

impl DesktopMembership {
    /// Окна без информации о рабочих столах считаются находящимися на текущем
    pub fn includes(&self, desktop: Option<&str>) -> bool {
        match (self, desktop) {
            (DesktopMembership::All, _) => true,
            (DesktopMembership::Unknown, _) => true,
            (DesktopMembership::Desktops(_), None) => true,
            (DesktopMembership::Desktops(ids), Some(current)) => ids.iter().any(|id| id == current),
        }
    }
}

/// Информация об окне, как её видит KWin в момент запроса
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowRecord {
    #[serde(default)]
    pub id: String,
    pub class: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub desktops: DesktopMembership,
    #[serde(default)]
    pub stacking_order: i64,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub minimized: bool,
    #[serde(default)]
    pub fullscreen: bool,
}

impl WindowRecord {
    pub fn new(class: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            class: class.into(),
            caption: caption.into(),
            desktops: DesktopMembership::Unknown,
            stacking_order: 0,
            is_active: false,
            minimized: false,
            fullscreen: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_stacking_order(mut self, order: i64) -> Self {
        self.stacking_order = order;
        self
    }

    pub fn with_desktops(mut self, desktops: DesktopMembership) -> Self {
        self.desktops = desktops;
        self
    }

    pub fn active(mut self) -> Self {
        self.is_active = true;
        self
    }

    /// Текст в том же формате, что и ответ windowInfo из скрипта KWin
    pub fn describe(&self) -> String {
        let (desktops, on_all) = match &self.desktops {
            DesktopMembership::All => (String::new(), true),
            DesktopMembership::Desktops(ids) => (ids.join(", "), false),
            DesktopMembership::Unknown => (String::new(), false),
        };

        [
            format!("class: {}", self.class),
            format!("caption: {}", self.caption),
            format!("id: {}", self.id),
            format!("desktops: {}", desktops),
            format!("onAllDesktops: {}", on_all),
            format!("minimized: {}", self.minimized),
            format!("fullscreen: {}", self.fullscreen),
        ]
        .join("\n")
    }
}

impl fmt::Display for WindowRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" ({}, #{})", self.caption, self.class, self.stacking_order)
    }
}

/// Снимок окон, полученный заново при каждом запросе
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub windows: Vec<WindowRecord>,
    pub current_desktop: Option<String>,
}

#[allow(dead_code)]
impl WindowSnapshot {
    pub fn new(windows: Vec<WindowRecord>) -> Self {
        Self {
            windows,
            current_desktop: None,
        }
    }

    pub fn on_desktop(mut self, desktop: impl Into<String>) -> Self {
        self.current_desktop = Some(desktop.into());
        self
    }
}

impl WindowSnapshot {
    pub fn active_window(&self) -> Option<&WindowRecord> {
        self.windows.iter().find(|w| w.is_active)
    }
}

/// Критерии поиска окна.
///
/// Пустая строка означает «не задано». Приоритет: `class_exact`, затем
/// `class_pattern`, и только если оба пусты, `caption_pattern`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowFilter {
    pub class_exact: String,
    pub caption_pattern: String,
    pub class_pattern: String,
    pub current_desktop_only: bool,
}

#[allow(dead_code)]
impl WindowFilter {
    pub fn by_class(class: impl Into<String>) -> Self {
        Self {
            class_exact: class.into(),
            ..Self::default()
        }
    }

    pub fn by_caption(pattern: impl Into<String>) -> Self {
        Self {
            caption_pattern: pattern.into(),
            ..Self::default()
        }
    }

    pub fn by_class_pattern(pattern: impl Into<String>) -> Self {
        Self {
            class_pattern: pattern.into(),
            ..Self::default()
        }
    }

    pub fn on_current_desktop(mut self) -> Self {
        self.current_desktop_only = true;
        self
    }
}

impl WindowFilter {
    pub fn is_empty(&self) -> bool {
        self.class_exact.is_empty() && self.caption_pattern.is_empty() && self.class_pattern.is_empty()
    }
}

impl fmt::Display for WindowFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "class='{}' caption='{}' regex='{}' current_desktop={}",
            self.class_exact, self.caption_pattern, self.class_pattern, self.current_desktop_only
        )
    }
}

/// Действие, которое нужно применить к выбранному окну
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowAction {
    Activate,
    ToggleMinimize,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub candidates: Vec<WindowRecord>,
    pub winner: Option<WindowRecord>,
    pub action: WindowAction,
}
