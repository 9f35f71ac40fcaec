//! Скрипты KWin: генерация текста программы и кэш готовых скриптов.
//!
//! Модуль ничего не знает о D-Bus. Он только превращает фильтр и режим в текст
//! программы на JavaScript, которую затем загружает и выполняет KWin.

pub mod cache;
pub mod template;

pub use cache::{CachedPayload, ScriptCache};
pub use template::render;

use crate::window::WindowFilter;
use std::fmt;

/// Режим работы сгенерированного скрипта
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// Выбрать окно и сразу применить действие, ответа нет
    Activate,
    /// Сообщить количество кандидатов (`matchCount`)
    CountOnly,
    /// Сообщить, есть ли кандидаты вообще (`hasMatches`)
    DetectOnly,
    /// Описать активное окно, фильтр игнорируется (`windowInfo`)
    WindowInfo,
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Activate => "activate",
            RenderMode::CountOnly => "countOnly",
            RenderMode::DetectOnly => "detectOnly",
            RenderMode::WindowInfo => "windowInfo",
        }
    }

    /// Имя метода, которым скрипт отвечает через callDBus
    pub fn reply_member(&self) -> Option<ReplyMember> {
        match self {
            RenderMode::Activate => None,
            RenderMode::CountOnly => Some(ReplyMember::MatchCount),
            RenderMode::DetectOnly => Some(ReplyMember::HasMatches),
            RenderMode::WindowInfo => Some(ReplyMember::WindowInfo),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyMember {
    MatchCount,
    HasMatches,
    WindowInfo,
}

impl ReplyMember {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyMember::MatchCount => "matchCount",
            ReplyMember::HasMatches => "hasMatches",
            ReplyMember::WindowInfo => "windowInfo",
        }
    }
}

impl fmt::Display for ReplyMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Всё, из чего строится один скрипт
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRequest {
    pub filter: WindowFilter,
    pub toggle: bool,
    pub mode: RenderMode,
    /// Уникальное имя процесса на шине; пусто для режима Activate
    pub reply_address: String,
}

impl ScriptRequest {
    pub fn activate(filter: WindowFilter, toggle: bool) -> Self {
        Self {
            filter,
            toggle,
            mode: RenderMode::Activate,
            reply_address: String::new(),
        }
    }

    pub fn query(filter: WindowFilter, mode: RenderMode, reply_address: impl Into<String>) -> Self {
        Self {
            filter,
            toggle: false,
            mode,
            reply_address: reply_address.into(),
        }
    }
}

/// Готовый текст программы для KWin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub request: ScriptRequest,
    pub text: String,
}
