use anyhow::{Context, Result};
use chrono::Local;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use traytemp_core::Config;
use traytemp_tray::{
    run_command_loop, run_refresh_loop, run_render_loop, wall_clock, CommandContext,
    FileIconSink, RefreshScheduler, TrayPresenter, WeatherErrorExt,
};
use traytemp_weather::{ForecastClient, GeoCache, ZipGeocoder};

const COMMAND_QUEUE: usize = 8;

/// How long shutdown waits for a pending stdin read
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> Result<()> {
    // Initialize logging
    traytemp_core::init()?;

    let config = Config::load_validated()?.0;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let result = runtime.block_on(run(config));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run(config: Config) -> Result<()> {
    // The cache holds the geocoding API key, so the applet cannot start without it
    let geocache_path = config.geocache_path();
    let geocache = GeoCache::load(&geocache_path)
        .map_err(|e| e.into_app_error())
        .with_context(|| format!("Cannot load geocoding cache {}", geocache_path.display()))?;

    let geocoder = ZipGeocoder::new(&config.weather.geocode_base_url)?;
    let forecast =
        ForecastClient::new(&config.weather.forecast_base_url, &config.weather.user_agent)?;

    let today = Local::now().date_naive();
    let (scheduler, snapshots) = RefreshScheduler::new(
        config.weather.zip_code.clone(),
        geocache,
        geocoder,
        forecast,
        today,
    );

    tracing::info!(
        "traytemp started for {} (config in {})",
        config.weather.zip_code,
        config.config_dir.display()
    );

    let shutdown = CancellationToken::new();
    let (refresh_tx, refresh_rx) = mpsc::channel(COMMAND_QUEUE);

    let refresh_task = tokio::spawn(run_refresh_loop(
        scheduler,
        refresh_rx,
        Duration::from_secs(u64::from(config.weather.refresh_minutes) * 60),
        wall_clock,
        shutdown.clone(),
    ));

    let presenter = TrayPresenter::new(FileIconSink::new(config.icon_path()));
    let render_task = tokio::spawn(run_render_loop(
        presenter,
        snapshots.clone(),
        Duration::from_secs(config.ui.icon_refresh_seconds),
        wall_clock,
        shutdown.clone(),
    ));

    let ctx = CommandContext {
        refresh: refresh_tx,
        snapshots,
        chart_file: Some(config.config_dir.join("chart.png")),
        chart_size: (config.ui.chart_width, config.ui.chart_height),
        clock: wall_clock,
        shutdown: shutdown.clone(),
    };
    let command_task = tokio::spawn(async move {
        let input = BufReader::new(tokio::io::stdin());
        let mut output = tokio::io::stdout();
        if let Err(e) = run_command_loop(input, &mut output, ctx).await {
            tracing::warn!("Command input failed: {}", e);
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
        _ = shutdown.cancelled() => tracing::info!("Quit requested"),
    }

    // Graceful shutdown
    shutdown.cancel();
    let _ = tokio::join!(refresh_task, render_task);
    command_task.abort();

    tracing::info!("traytemp stopped");
    Ok(())
}
