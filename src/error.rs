use thiserror::Error;

#[derive(Error, Debug)]
pub enum WwError {
    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка D-Bus: {0}")]
    DBus(#[from] zbus::Error),

    #[error("Некорректное регулярное выражение: {0}")]
    Regex(#[from] regex::Error),

    #[error("KWin недоступен: {0}")]
    EnvironmentUnavailable(String),

    #[error("Некорректный ввод: {0}")]
    UserInput(String),

    #[error("Версия KWin {found} не поддерживается, требуется как минимум {required}")]
    VersionUnsupported { found: u32, required: u32 },

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl WwError {
    pub fn user_input<T>(msg: impl Into<String>) -> Result<T> {
        Err(WwError::UserInput(msg.into()))
    }

    /// Ошибки D-Bus на границе с KWin сводятся к EnvironmentUnavailable
    pub fn unavailable(context: &str, err: impl std::fmt::Display) -> Self {
        WwError::EnvironmentUnavailable(format!("{}: {}", context, err))
    }
}

pub type Result<T> = std::result::Result<T, WwError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! ww_error {
    (unavailable, $($arg:tt)*) => {
        $crate::error::WwError::EnvironmentUnavailable(format!($($arg)*))
    };
    (user_input, $($arg:tt)*) => {
        $crate::error::WwError::UserInput(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::WwError::Internal(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_keeps_context() {
        let err = WwError::unavailable("loadScript", "connection refused");
        assert!(matches!(err, WwError::EnvironmentUnavailable(ref m) if m == "loadScript: connection refused"));
    }

    #[test]
    fn test_macro_builds_variants() {
        let err = ww_error!(user_input, "фильтр {} пуст", "-f");
        assert!(matches!(err, WwError::UserInput(ref m) if m.contains("-f")));
        let version = WwError::VersionUnsupported { found: 5, required: 6 };
        assert!(version.to_string().contains('5'));
    }
}
