use std::process::Command;
use tracing::debug;

/// Адрес сессионной шины настоящего пользователя, если процесс запущен через sudo.
///
/// Без sudo возвращает `None`, и используется обычный `DBUS_SESSION_BUS_ADDRESS`.
pub fn session_bus_address() -> Option<String> {
    if std::env::var("USER").unwrap_or_default() != "root" {
        return None;
    }

    let sudo_user = std::env::var("SUDO_USER").ok()?;
    let output = Command::new("id").args(["-u", &sudo_user]).output().ok()?;
    if !output.status.success() {
        return None;
    }

    let uid = String::from_utf8(output.stdout).ok()?;
    let address = bus_address_for_uid(uid.trim());
    debug!("Подставляем сессионную шину пользователя {}: {}", sudo_user, address);
    Some(address)
}

fn bus_address_for_uid(uid: &str) -> String {
    format!("unix:path=/run/user/{}/bus", uid)
}
