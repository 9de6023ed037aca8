use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

mod config;
mod db;
mod enrich;
mod error;
mod models;
mod notify;
mod pipeline;
mod runtime;
mod services;

use config::Config;
use db::Store;
use enrich::Translator;
use error::AppError;
use notify::TelegramSink;
use pipeline::{Delivery, Ingest, Pipeline};
use runtime::{InstanceLock, Scheduler};
use services::{ContentFetcher, FrontPage};

// Exit codes are distinguishable on purpose: supervisors treat a held lock
// differently from a broken network.
const EXIT_CONFIG: i32 = 1;
const EXIT_LOCK_HELD: i32 = 2;
const EXIT_PREFLIGHT: i32 = 3;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let run_once = args.iter().any(|a| a == "--once");
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|pos| args.get(pos + 1))
        .map(PathBuf::from);

    let code = run(run_once, config_path).await;
    std::process::exit(code);
}

async fn run(run_once: bool, config_path: Option<PathBuf>) -> i32 {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return EXIT_CONFIG;
        }
    };

    let (bot_token, chat_id) = match config.telegram_credentials() {
        Ok(credentials) => credentials,
        Err(e) => {
            tracing::error!(error = %e, "telegram credentials missing");
            return EXIT_CONFIG;
        }
    };

    // single-instance guard comes before anything touches the store
    let _lock = match InstanceLock::acquire(Path::new(&config.lock_path)) {
        Ok(lock) => lock,
        Err(AppError::LockHeld(path)) => {
            tracing::error!(path = %path.display(), "another instance is already running");
            return EXIT_LOCK_HELD;
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to acquire instance lock");
            return EXIT_CONFIG;
        }
    };

    let sink = Arc::new(TelegramSink::new(
        bot_token,
        chat_id,
        Duration::from_secs(config.telegram_timeout_secs),
    ));
    let front_page = Arc::new(FrontPage::new(
        config.base_url.clone(),
        Duration::from_secs(config.request_timeout_secs),
        config.user_agent.clone(),
    ));

    // fail fast on a known-broken network or credentials instead of spinning
    let probe = Duration::from_secs(config.connect_test_timeout_secs);
    if let Err(e) = front_page.check_reachable(probe).await {
        tracing::error!(url = %config.base_url, error = %e, "source unreachable");
        return EXIT_PREFLIGHT;
    }
    match sink.check_connection(probe).await {
        Ok(bot) => tracing::info!(bot, "telegram connection verified"),
        Err(e) => {
            tracing::error!(error = %e, "telegram unreachable");
            return EXIT_PREFLIGHT;
        }
    }

    let day = chrono::Local::now().format("%Y-%m-%d").to_string();
    let store = match Store::open(&config.db_path, &day).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(db_path = %config.db_path, error = %e, "failed to open item store");
            return EXIT_CONFIG;
        }
    };
    tracing::info!(db_path = %config.db_path, day, "item store ready");

    let translator = Arc::new(Translator::new(
        config.target_lang.clone(),
        Duration::from_secs(config.translation_timeout_secs),
        config.max_translation_chars,
        config.max_retries,
        config.user_agent.clone(),
        config.enable_translation,
    ));
    let content = Arc::new(ContentFetcher::new(
        config.base_url.clone(),
        Duration::from_secs(config.request_timeout_secs),
        config.user_agent.clone(),
    ));

    let ingest = Ingest::new(
        store.clone(),
        front_page,
        content,
        translator,
        config.enable_content_summary,
        Duration::from_millis(config.request_interval_ms),
    );
    let delivery = Delivery::new(
        store,
        sink,
        config.message_max_retries,
        Duration::from_millis(config.message_send_interval_ms),
        Duration::from_millis(config.message_retry_interval_ms),
        Duration::from_millis(config.bulk_message_interval_ms),
        config.max_summary_chars,
        config.check_interval_minutes,
    );
    let pipeline = Arc::new(Pipeline::new(ingest, delivery));

    if run_once {
        tracing::info!("running a single cycle");
        pipeline.run_cycle().await;
        return 0;
    }

    let shutdown = Arc::new(Notify::new());
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("stop signal received");
                shutdown.notify_one();
            }
        });
    }

    let scheduler = Scheduler::new(Duration::from_secs(config.check_interval_minutes * 60));
    tracing::info!(
        interval_minutes = config.check_interval_minutes,
        "entering scheduling loop"
    );
    scheduler
        .run(
            move || {
                let pipeline = pipeline.clone();
                async move {
                    pipeline.run_cycle().await;
                }
            },
            shutdown,
        )
        .await;

    tracing::info!("shutdown complete");
    0
}

fn load_config(path: Option<PathBuf>) -> error::Result<Config> {
    match path {
        Some(path) => Config::load_from(&path),
        None => Config::load(),
    }
}
