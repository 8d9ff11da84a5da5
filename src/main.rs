// src/main.rs
mod action;
mod app;
mod artnet;
mod broadcaster;
mod config;
mod device;
mod device_manager;
mod engine;
mod error;
mod merge_buffer;
mod priority;
mod scheduler;
mod sink;
mod universe;
mod util;

use crate::app::Application;
use crate::config::AppConfig;
use crate::util::BarrierFlag;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    let cfg_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    // Load config before the logger so the JSON-format choice is known up front.
    let cfg = AppConfig::load(&cfg_path)?;

    if cfg.general.json_logs {
        let mut b =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
        b.format(|buf, record| {
            use std::io::Write;
            let ts = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
            writeln!(
                buf,
                "{{\"ts\":\"{}\",\"level\":\"{}\",\"target\":\"{}\",\"msg\":\"{}\"}}",
                ts,
                record.level(),
                record.target(),
                record.args().to_string().replace('"', "'")
            )
        })
        .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    info!("loaded config: {:?}", cfg);

    let shutdown = Arc::new(BarrierFlag::default());
    {
        let s = shutdown.clone();
        ctrlc::set_handler(move || {
            s.raise();
        })?;
    }

    let mut app = Application::new(&cfg)?;
    app.start()?;

    while !shutdown.is_raised() {
        std::thread::sleep(Duration::from_millis(100));
    }

    app.stop();
    Ok(())
}
