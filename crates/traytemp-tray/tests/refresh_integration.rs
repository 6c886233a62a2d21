//! End-to-end refresh tests against mock geocoding and forecast servers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use traytemp_tray::{
    run_command_loop, run_refresh_loop, CommandContext, RefreshRequest, RefreshScheduler, Snapshot,
};
use traytemp_weather::{
    weekday_labels, ForecastClient, GeoCache, HourSample, RetryConfig, TimeSeriesStore,
    ZipGeocoder,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
}

fn at(d: u32, hour: u32, minute: u32) -> NaiveDateTime {
    day(d).and_hms_opt(hour, minute, 0).unwrap()
}

fn fixed_clock() -> NaiveDateTime {
    at(16, 10, 30)
}

fn write_cache(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("geocache.json");
    let body = serde_json::json!({
        "zipApiKey": "KEY",
        "60193": { "lat": 42.0123, "lng": -88.0934 }
    });
    std::fs::write(&path, body.to_string()).unwrap();
    path
}

/// Hourly periods from `start_hour` on `date`, one per temperature.
fn hourly_body(date: &str, start_hour: u32, temps: &[i64]) -> serde_json::Value {
    let periods: Vec<serde_json::Value> = temps
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let hour = start_hour + i as u32;
            let (date, hour) = if hour >= 24 {
                // Good enough for the fixtures: only ever spills into the 17th
                ("2026-10-17", hour - 24)
            } else {
                (date, hour)
            };
            serde_json::json!({
                "startTime": format!("{}T{:02}:00:00-05:00", date, hour),
                "temperature": t,
                "isDaytime": (7..19).contains(&hour),
                "probabilityOfPrecipitation": { "value": 10 }
            })
        })
        .collect();
    serde_json::json!({ "properties": { "periods": periods } })
}

async fn mount_forecast(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/points/42.0123,-88.0934"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "properties": { "forecastHourly": format!("{}/hourly", server.uri()) }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/hourly"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn scheduler(
    server: &MockServer,
    dir: &Path,
    today: NaiveDate,
) -> (RefreshScheduler, watch::Receiver<Arc<Snapshot>>) {
    let cache = GeoCache::load(write_cache(dir)).unwrap();
    let geocoder = ZipGeocoder::new(&server.uri()).unwrap();
    let forecast = ForecastClient::new(&server.uri(), "traytemp-tests")
        .unwrap()
        .with_retry(RetryConfig::none());
    RefreshScheduler::new("60193", cache, geocoder, forecast, today)
}

#[tokio::test]
async fn test_refresh_publishes_snapshot() {
    let server = MockServer::start().await;
    mount_forecast(&server, hourly_body("2026-10-16", 10, &[40, 44, 46])).await;
    let dir = tempfile::tempdir().unwrap();

    let (mut scheduler, mut rx) = scheduler(&server, dir.path(), day(16));
    assert!(!rx.borrow().has_data());

    let snapshot = scheduler.refresh(at(16, 10, 30)).await.unwrap();

    assert!(rx.has_changed().unwrap());
    let published = rx.borrow_and_update().clone();
    assert!(Arc::ptr_eq(&snapshot, &published));
    assert_eq!(published.series.first_hour_index(), Some(10));
    assert_eq!(published.weekdays, weekday_labels(day(16)));
    assert_eq!(published.current_temperature(at(16, 10, 30)).unwrap(), 42.0);
    assert_eq!(scheduler.last_refresh_date(), Some(day(16)));
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_snapshot() {
    let server = MockServer::start().await;
    mount_forecast(&server, hourly_body("2026-10-16", 10, &[40, 44, 46])).await;
    let dir = tempfile::tempdir().unwrap();

    let (mut scheduler, _rx) = scheduler(&server, dir.path(), day(16));
    scheduler.refresh(at(16, 10, 0)).await.unwrap();
    let before = scheduler.snapshot();

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(scheduler.tick(at(17, 9, 0)).await.is_none());
    assert!(Arc::ptr_eq(&before, &scheduler.snapshot()));
    assert_eq!(scheduler.last_refresh_date(), Some(day(16)));
}

#[tokio::test]
async fn test_refresh_across_midnight_advances_window() {
    let server = MockServer::start().await;
    // 22:00 on the 16th through 03:00 on the 17th
    mount_forecast(&server, hourly_body("2026-10-16", 22, &[50, 49, 48, 47, 46, 45])).await;
    let dir = tempfile::tempdir().unwrap();

    let (mut scheduler, _rx) = scheduler(&server, dir.path(), day(16));
    scheduler.refresh(at(16, 22, 10)).await.unwrap();

    server.reset().await;
    mount_forecast(&server, hourly_body("2026-10-17", 1, &[60, 61, 62, 63])).await;

    let snapshot = scheduler.refresh(at(17, 1, 15)).await.unwrap();

    // Yesterday's 22:00 and 23:00 are gone, midnight survives from the first fetch
    assert_eq!(snapshot.date, day(17));
    assert_eq!(snapshot.series.first_hour_index(), Some(0));
    assert_eq!(snapshot.series.last_hour_index(), Some(4));
    assert_eq!(snapshot.series.get(0).unwrap().temperature, 48.0);
    assert_eq!(snapshot.series.get(1).unwrap().temperature, 60.0);
    assert_eq!(snapshot.weekdays[0], "Sat");
    assert_eq!(scheduler.last_refresh_date(), Some(day(17)));
}

#[tokio::test]
async fn test_misaligned_fetch_replaces_window() {
    let server = MockServer::start().await;
    mount_forecast(&server, hourly_body("2026-10-16", 10, &[40, 41, 42])).await;
    let dir = tempfile::tempdir().unwrap();

    let (mut scheduler, _rx) = scheduler(&server, dir.path(), day(16));
    scheduler.refresh(at(16, 10, 0)).await.unwrap();

    server.reset().await;
    mount_forecast(&server, hourly_body("2026-10-16", 20, &[30, 31, 32])).await;

    let snapshot = scheduler.refresh(at(16, 20, 0)).await.unwrap();

    assert_eq!(snapshot.series.first_hour_index(), Some(20));
    assert_eq!(snapshot.series.len(), 3);
}

#[tokio::test]
async fn test_refresh_loop_fetches_immediately_and_stops_on_cancel() {
    let server = MockServer::start().await;
    mount_forecast(&server, hourly_body("2026-10-16", 10, &[40, 44, 46])).await;
    let dir = tempfile::tempdir().unwrap();

    let (scheduler, mut rx) = scheduler(&server, dir.path(), day(16));
    let (_tx, requests) = mpsc::channel::<RefreshRequest>(4);
    let shutdown = CancellationToken::new();

    let handle = tokio::spawn(run_refresh_loop(
        scheduler,
        requests,
        Duration::from_secs(3600),
        fixed_clock,
        shutdown.clone(),
    ));

    tokio::time::timeout(Duration::from_secs(5), rx.changed())
        .await
        .expect("no snapshot published")
        .unwrap();
    assert!(rx.borrow().has_data());

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("refresh loop did not stop")
        .unwrap();
}

fn canned_snapshot() -> Arc<Snapshot> {
    let samples: Vec<HourSample> = (0..48)
        .map(|h| HourSample::new(h, 40.0 + (h % 24) as f64))
        .collect();
    Arc::new(Snapshot {
        series: TimeSeriesStore::from_samples(&samples).unwrap(),
        weekdays: weekday_labels(day(16)),
        date: day(16),
        fetched_at: Some(at(16, 10, 0)),
    })
}

#[tokio::test]
async fn test_command_loop_drives_chart() {
    let (_publisher, snapshots) = watch::channel(canned_snapshot());
    let (refresh, mut requests) = mpsc::channel::<RefreshRequest>(4);
    let shutdown = CancellationToken::new();

    // Stand-in refresh loop answering with the canned data
    tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            if let Some(reply) = request.reply {
                let _ = reply.send(canned_snapshot());
            }
        }
    });

    let dir = tempfile::tempdir().unwrap();
    let chart_file = dir.path().join("chart.png");
    let ctx = CommandContext {
        refresh,
        snapshots,
        chart_file: Some(chart_file.clone()),
        chart_size: (320, 160),
        clock: fixed_clock,
        shutdown: shutdown.clone(),
    };

    let input: &[u8] = b"window\nday 1\nclick 1.5\nclick 1.75\nclick 1e20\nbogus\nquit\nupdate\n";
    let mut output = Vec::new();
    run_command_loop(input, &mut output, ctx).await.unwrap();

    let text = String::from_utf8(output).unwrap();
    assert!(text.contains("Fri (day 0)"), "{}", text);
    // 10:30 between 50 and 51 degrees
    assert!(text.contains("now: 51°F"), "{}", text);
    assert!(text.contains("Sat (day 1)"), "{}", text);
    assert!(text.contains("42°F at day 0 1am +30m"), "{}", text);
    assert!(text.contains("Read-out hidden"), "{}", text);
    // A click far past the window is answered, not fatal
    assert!(text.contains("No forecast there"), "{}", text);
    assert!(text.contains("unknown command: bogus"), "{}", text);
    // Nothing after quit is handled
    assert!(!text.contains("Forecast has"), "{}", text);

    assert!(shutdown.is_cancelled());
    assert!(chart_file.exists());
}
