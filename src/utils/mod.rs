pub mod launcher;
pub mod session_env;

// ✅ Макрос условного логирования: не форматируем длинные строки без надобности
#[macro_export]
macro_rules! trace_if_enabled {
    ($($arg:tt)*) => {
        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!($($arg)*);
        }
    };
}
