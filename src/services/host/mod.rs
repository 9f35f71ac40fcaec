//! ScriptHost: граница с KWin
//!
//! Этот модуль отвечает ТОЛЬКО за доставку скриптов в KWin (загрузка, запуск,
//! остановка) и за приём ответов через сессионную шину. Решение о том, какое
//! окно выбрать, принимает `window::Matcher` или его копия внутри скрипта.

mod dry_run;
mod kwin;
mod reply;
mod r#trait;

pub use self::dry_run::DryRunHost;
pub use self::kwin::KwinHost;
pub use self::r#trait::{create_script_host, ReplyChannel, ScriptHost, ScriptId};
