use std::fs;
use std::path::PathBuf;

use chrono::{Duration, TimeZone, Utc};

use swingline::{
    AggregationTimeframe, BarSeries, DataError, SwingConfig, SwingConfigLoader, SwingEngine,
    SwingPolicy, load_bars_csv, signals_dataframe, signals_to_json,
};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("swingline_{name}_{}", std::process::id()));
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

fn write_csv(name: &str, body: &str) -> PathBuf {
    let path = scratch_dir(name).join("bars.csv");
    fs::write(&path, body).expect("write csv");
    path
}

fn sample_csv(rows: usize) -> String {
    let mut out = String::from("datetime,open,high,low,close,volume\n");
    let start = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
    for i in 0..rows {
        let x = i as f64;
        let mid = 100.0 + (x / 6.0).sin() * 4.0;
        let ts = start + Duration::minutes(i as i64);
        out.push_str(&format!(
            "{},{:.2},{:.2},{:.2},{:.2},{}\n",
            ts.format("%Y-%m-%d %H:%M:%S"),
            mid,
            mid + 1.0,
            mid - 1.0,
            mid + 0.5,
            10 + i % 7
        ));
    }
    out
}

#[test]
fn csv_bars_get_end_time_from_next_start() {
    let path = write_csv(
        "end_time",
        "datetime,open,high,low,close,volume\n\
         2025-03-03 09:00:00,10,11,9,10.5,100\n\
         2025-03-03 09:01:00,10.5,12,10,11,80\n\
         2025-03-03 09:02:00,11,11.5,10.2,10.8,90\n",
    );
    let bars = load_bars_csv(&path).expect("load csv");

    assert_eq!(bars.len(), 3);
    assert_eq!(bars[0].end_time, bars[1].start_time);
    assert_eq!(bars[2].end_time - bars[2].start_time, Duration::minutes(1));
    assert_eq!(bars[1].volume, 80.0);
}

#[test]
fn csv_with_explicit_end_and_long_headers() {
    let path = write_csv(
        "explicit_end",
        "datetime,end_datetime,open_price,high_price,low_price,close_price\n\
         2025-03-03T09:00:00Z,2025-03-03T09:05:00Z,10,11,9,10.5\n",
    );
    let bars = load_bars_csv(&path).expect("load csv");
    assert_eq!(bars[0].end_time - bars[0].start_time, Duration::minutes(5));
    assert_eq!(bars[0].volume, 0.0);
}

#[test]
fn csv_rejects_inverted_bar() {
    let path = write_csv(
        "inverted",
        "datetime,open,high,low,close\n\
         2025-03-03 09:00:00,10,11,9,10\n\
         2025-03-03 09:01:00,10,9,11,10\n",
    );
    let err = load_bars_csv(&path).unwrap_err();
    assert!(matches!(err, DataError::InvalidBar { index: 1, .. }), "got {err}");
}

#[test]
fn csv_rejects_unknown_datetime() {
    let path = write_csv(
        "bad_datetime",
        "datetime,open,high,low,close\nyesterday,10,11,9,10\n",
    );
    let err = load_bars_csv(&path).unwrap_err();
    assert!(matches!(err, DataError::InvalidDatetime(_)));
}

#[test]
fn csv_replay_produces_levels_and_exports() {
    let path = write_csv("replay", &sample_csv(240));
    let bars = load_bars_csv(&path).expect("load csv");
    let series = BarSeries::from_bars(bars);

    let mut engine = SwingEngine::new(SwingConfig {
        swing_period: 3,
        lookback_period: 200,
        timeframe: AggregationTimeframe::M5,
        policy: SwingPolicy::Independent,
        ..SwingConfig::default()
    })
    .expect("valid config");
    engine.run(&series);

    let signals = engine.active_signals(None);
    assert!(!signals.is_empty());
    let df = signals_dataframe(&signals).expect("dataframe");
    assert_eq!(df.height(), signals.len());

    let json = signals_to_json(&signals).expect("json");
    assert!(json.contains("\"kind\""));

    let out = scratch_dir("replay_out");
    engine.write_parquet_snapshot(&out).expect("parquet snapshot");
    assert!(out.join("signals.parquet").exists());
    assert!(out.join("periods.parquet").exists());
}

#[test]
fn config_loader_reads_yaml_and_json_files() {
    let dir = scratch_dir("config");
    let yaml = dir.join("swing.yaml");
    fs::write(&yaml, "swing_period: 4\nlookback_period: 250\ntimeframe: 1h\n").expect("write yaml");
    let config = SwingConfigLoader::load(&yaml).expect("yaml config");
    assert_eq!(config.swing_period, 4);
    assert_eq!(config.lookback_period, 250);
    assert_eq!(config.timeframe, AggregationTimeframe::H1);

    let json = dir.join("swing.json");
    fs::write(&json, r#"{"policy": "high_priority", "hide_closed": true}"#).expect("write json");
    let config = SwingConfigLoader::load(&json).expect("json config");
    assert_eq!(config.policy, SwingPolicy::HighPriority);
    assert!(config.hide_closed);
    assert_eq!(config.swing_period, 2);

    let toml = dir.join("swing.toml");
    fs::write(&toml, "swing_period = 3\n").expect("write toml");
    assert!(matches!(
        SwingConfigLoader::load(&toml),
        Err(DataError::UnsupportedFormat(_))
    ));
}
