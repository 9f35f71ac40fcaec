use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
mod config;
mod error;
mod script;
mod services;
mod utils;
mod window;

use config::Config;
use error::WwError;
use script::ScriptCache;
use services::{create_script_host, Dispatcher, RaiseOutcome, VersionGate};
use utils::launcher;
use window::WindowFilter;

#[derive(Parser, Debug)]
#[command(name = "ww", version)]
#[command(about = "ww - поднять окно приложения в KDE или переключиться на него")]
struct Args {
    /// Фильтр по классу окна (точное совпадение)
    #[arg(short = 'f', long = "filter", default_value = "")]
    filter: String,

    /// Фильтр по заголовку окна (регулярное выражение без учёта регистра)
    #[arg(short = 'a', long = "filter-alternative", visible_alias = "fa", default_value = "")]
    filter_alternative: String,

    /// Фильтр по классу окна (регулярное выражение)
    #[arg(short = 'r', long = "filter-regex", visible_alias = "fr", default_value = "")]
    filter_regex: String,

    /// Только окна на текущем виртуальном рабочем столе
    #[arg(short = 'd', long)]
    current_desktop: bool,

    /// Свернуть окно, если оно уже активно
    #[arg(short = 't', long)]
    toggle: bool,

    /// Команда, которая запускается, если подходящих окон нет
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Вывести сведения об активном окне (KWin 6+)
    #[arg(short = 'i', long)]
    info_active: bool,

    /// Вывести количество подходящих окон
    #[arg(long)]
    count: bool,

    /// Путь к файлу конфигурации
    #[arg(long)]
    config: Option<PathBuf>,

    /// Режим сухого запуска (KWin эмулируется)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn window_filter(&self) -> WindowFilter {
        WindowFilter {
            class_exact: self.filter.clone(),
            caption_pattern: self.filter_alternative.clone(),
            class_pattern: self.filter_regex.clone(),
            current_desktop_only: self.current_desktop,
        }
    }
}

/// Без `-i` нужен хотя бы один фильтр; проверяется до подключения к KWin
fn validate(args: &Args) -> error::Result<WindowFilter> {
    let filter = args.window_filter();
    if !args.info_active && filter.is_empty() {
        return WwError::user_input(
            "нужно указать фильтр окна: по классу (-f), по заголовку (-a) или по регулярному выражению (-r)",
        );
    }
    Ok(filter)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let config = Arc::new(Config::load(&config_path)?);

    // Инициализация системы логирования
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(level, &config.logging.format)?;
    debug!("Конфигурация загружена из: {:?}", config_path);

    let filter = validate(&args)?;

    if args.dry_run {
        warn!("Режим сухого запуска - KWin не используется");
    }

    let host = create_script_host(config.clone(), args.dry_run).await?;
    let dispatcher = Dispatcher::new(
        host.clone(),
        ScriptCache::new(config.script_dir()),
        Duration::from_millis(config.reply.timeout_ms),
    );

    if args.info_active {
        let version_file = config
            .cache
            .version_file
            .clone()
            .or_else(VersionGate::default_cache_file);
        VersionGate::new(host, version_file)
            .require(config.host.min_info_major)
            .await?;

        match dispatcher.active_window_info().await? {
            Some(info) => println!("{}", info),
            None => warn!("KWin не прислал сведения об активном окне"),
        }
        return Ok(());
    }

    if args.count {
        println!("{}", dispatcher.count_matches(&filter).await?);
        return Ok(());
    }

    match args.command.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(command) => {
            let outcome = dispatcher
                .raise_or_launch(&filter, args.toggle, command, |cmd| {
                    launcher::spawn_detached(cmd).map(|_| ())
                })
                .await?;
            if outcome == RaiseOutcome::Launched {
                info!("Окно не найдено, команда запущена");
            }
        }
        None => {
            dispatcher.activate(&filter, args.toggle).await?;
        }
    }

    Ok(())
}

fn init_tracing(level: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))?;

    // stdout занят выводом команды, логи идут в stderr
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        "full" => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        _ => registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_flags_build_filter() {
        let args = Args::try_parse_from(["ww", "-f", "firefox", "-d", "-t", "-c", "firefox"]).unwrap();
        let filter = args.window_filter();
        assert_eq!(filter.class_exact, "firefox");
        assert!(filter.current_desktop_only);
        assert!(args.toggle);
        assert_eq!(args.command.as_deref(), Some("firefox"));
    }

    #[test]
    fn test_legacy_long_aliases() {
        let args = Args::try_parse_from(["ww", "--fa", "Telegram", "--fr", "^org\\.kde"]).unwrap();
        let filter = args.window_filter();
        assert_eq!(filter.caption_pattern, "Telegram");
        assert_eq!(filter.class_pattern, "^org\\.kde");
    }

    #[test]
    fn test_no_filter_is_user_error() {
        let args = Args::try_parse_from(["ww", "-d", "-t"]).unwrap();
        assert!(matches!(validate(&args), Err(WwError::UserInput(_))));
    }

    #[test]
    fn test_info_needs_no_filter() {
        let args = Args::try_parse_from(["ww", "-i"]).unwrap();
        assert!(validate(&args).unwrap().is_empty());

        let args = Args::try_parse_from(["ww", "-a", "Telegram"]).unwrap();
        assert_eq!(validate(&args).unwrap().caption_pattern, "Telegram");
    }
}
