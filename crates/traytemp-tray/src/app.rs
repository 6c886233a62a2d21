//! The applet's long-running tasks.
//!
//! Three loops share one runtime:
//! - the refresh loop owns the [`RefreshScheduler`] and fetches on its
//!   interval or on request
//! - the render loop redraws the tray icon from the latest snapshot
//! - the command loop reads [`TrayCommand`]s and drives the popup chart
//!
//! All of them stop when the shared `CancellationToken` is cancelled.

use chrono::{Local, NaiveDateTime};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use traytemp_weather::series::HOURS_PER_DAY;

use crate::chart::{hour_label, ChartView};
use crate::commands::TrayCommand;
use crate::icon;
use crate::plot;
use crate::presenter::{IconSink, TrayPresenter};
use crate::service::{RefreshScheduler, Snapshot, SnapshotReceiver};

/// Source of local wall-clock time.
pub type Clock = fn() -> NaiveDateTime;

pub fn wall_clock() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Ask the refresh loop to fetch now.
#[derive(Debug)]
pub struct RefreshRequest {
    /// Receives the snapshot published after the attempt, fresh or not
    pub reply: Option<oneshot::Sender<Arc<Snapshot>>>,
}

/// Fetch on every `period` (starting immediately) and on request.
pub async fn run_refresh_loop(
    mut scheduler: RefreshScheduler,
    mut requests: mpsc::Receiver<RefreshRequest>,
    period: Duration,
    clock: Clock,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut requests_open = true;

    tracing::info!("Refresh loop started, every {:?}", period);

    loop {
        let reply = tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => None,
            request = requests.recv(), if requests_open => match request {
                Some(request) => request.reply,
                None => {
                    requests_open = false;
                    continue;
                }
            },
        };

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = scheduler.tick(clock()) => {}
        }

        if let Some(reply) = reply {
            let _ = reply.send(scheduler.snapshot());
        }
    }

    tracing::info!("Refresh loop stopped");
}

/// Redraw the icon on every `period` and whenever a new snapshot arrives.
pub async fn run_render_loop<S: IconSink>(
    mut presenter: TrayPresenter<S>,
    mut snapshots: SnapshotReceiver,
    period: Duration,
    clock: Clock,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
            changed = snapshots.changed() => {
                if changed.is_err() {
                    tracing::debug!("Snapshot publisher gone, stopping render loop");
                    break;
                }
            }
        }

        let snapshot = snapshots.borrow_and_update().clone();
        if !snapshot.has_data() {
            continue;
        }

        if let Err(e) = presenter.render(&snapshot, clock()) {
            tracing::warn!("Tray icon not updated: {}", e);
        }
    }
}

/// Everything the command loop talks to.
pub struct CommandContext {
    pub refresh: mpsc::Sender<RefreshRequest>,
    pub snapshots: SnapshotReceiver,
    /// Where the popup chart is drawn, if anywhere
    pub chart_file: Option<PathBuf>,
    pub chart_size: (u32, u32),
    pub clock: Clock,
    pub shutdown: CancellationToken,
}

impl CommandContext {
    async fn request_refresh(&self) -> Arc<Snapshot> {
        let (tx, rx) = oneshot::channel();
        let request = RefreshRequest { reply: Some(tx) };

        if self.refresh.send(request).await.is_err() {
            tracing::warn!("Refresh loop is not running");
            return self.snapshots.borrow().clone();
        }

        match rx.await {
            Ok(snapshot) => snapshot,
            Err(_) => self.snapshots.borrow().clone(),
        }
    }

    fn save_chart(&self, chart: &ChartView) {
        let Some(path) = &self.chart_file else {
            return;
        };
        let (width, height) = self.chart_size;
        let result = plot::render_chart(chart, width, height)
            .map_err(anyhow::Error::from)
            .and_then(|image| icon::encode_png(&image).map_err(anyhow::Error::from))
            .and_then(|bytes| std::fs::write(path, bytes).map_err(anyhow::Error::from));
        match result {
            Ok(()) => tracing::debug!("Chart written to {}", path.display()),
            Err(e) => tracing::warn!("Failed to write chart {}: {}", path.display(), e),
        }
    }
}

/// Read commands line by line from `input` and answer on `output` until EOF,
/// `quit`, or shutdown. `quit` cancels the shutdown token.
pub async fn run_command_loop<R, W>(
    input: R,
    output: &mut W,
    ctx: CommandContext,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut chart: Option<ChartView> = None;

    loop {
        let line = tokio::select! {
            _ = ctx.shutdown.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            tracing::debug!("Command input closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<TrayCommand>() {
            Ok(command) => command,
            Err(e) => {
                output.write_all(format!("{}\n", e).as_bytes()).await?;
                continue;
            }
        };
        tracing::debug!("Command: {:?}", command);

        let reply = match command {
            TrayCommand::Quit => {
                ctx.shutdown.cancel();
                break;
            }
            TrayCommand::Refresh => {
                let snapshot = ctx.request_refresh().await;
                refresh_status(&snapshot)
            }
            TrayCommand::Open => {
                let snapshot = ctx.request_refresh().await;
                let view = ChartView::new(snapshot, (ctx.clock)());
                ctx.save_chart(&view);
                let text = describe(&view);
                chart = Some(view);
                text
            }
            TrayCommand::Day(day) => {
                let view = open_chart(&mut chart, &ctx);
                view.choose_day(day);
                ctx.save_chart(view);
                describe(view)
            }
            TrayCommand::Click(x) => {
                let view = open_chart(&mut chart, &ctx);
                let text = match view.click(x) {
                    Ok(Some(marker)) => format!(
                        "{}°F at {}\n",
                        marker.label.text,
                        position_label(marker.point.x)
                    ),
                    Ok(None) => "Read-out hidden\n".to_string(),
                    Err(e) => format!("No forecast there: {}\n", e),
                };
                ctx.save_chart(view);
                text
            }
        };

        output.write_all(reply.as_bytes()).await?;
        output.flush().await?;
    }

    Ok(())
}

/// The open chart brought up to date, or a new one from the latest snapshot.
fn open_chart<'a>(chart: &'a mut Option<ChartView>, ctx: &CommandContext) -> &'a mut ChartView {
    let snapshot = ctx.snapshots.borrow().clone();
    let now = (ctx.clock)();
    let view = chart.get_or_insert_with(|| ChartView::new(snapshot.clone(), now));
    view.update(snapshot, now);
    view
}

fn refresh_status(snapshot: &Snapshot) -> String {
    match snapshot.fetched_at {
        Some(at) => format!(
            "Forecast has {} hours, fetched {}\n",
            snapshot.series.len(),
            at.format("%Y-%m-%d %H:%M")
        ),
        None => "No forecast yet\n".to_string(),
    }
}

/// `Fri 3pm` style name for a chart x position.
fn position_label(x: f64) -> String {
    let hour = x.floor() as i64;
    let day = hour.div_euclid(HOURS_PER_DAY);
    let minute = ((x - x.floor()) * 60.0).round() as i64;
    format!("day {} {} +{}m", day, hour_label(hour), minute)
}

/// Text rendering of the visible day for the console.
pub fn describe(chart: &ChartView) -> String {
    let snapshot = chart.snapshot();
    let (start, end) = chart.visible_range();
    let mut out = String::new();

    let weekday = snapshot.weekdays.get(chart.day()).copied().unwrap_or_default();
    let _ = writeln!(out, "{} (day {})", weekday, chart.day());

    if let Some(marker) = chart.current_marker() {
        if marker.point.x >= start && marker.point.x < end {
            let _ = writeln!(out, "  now: {}°F", marker.label.text);
        }
    }

    let mut row = String::new();
    for (x, label) in chart.x_ticks() {
        if x < start || x >= end {
            continue;
        }
        let value = snapshot
            .series
            .get(x as i64)
            .map(|s| icon::temperature_label(s.temperature))
            .unwrap_or_else(|| "--".to_string());
        let _ = write!(row, " {:>4}:{:>3}", label, value);
    }
    let _ = writeln!(out, " {}", row);

    if let Some(marker) = chart.readout() {
        let _ = writeln!(
            out,
            "  read-out: {}°F at {}",
            marker.label.text,
            position_label(marker.point.x)
        );
    }

    out
}
