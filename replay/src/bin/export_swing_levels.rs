use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use swingline::{
    AggregationTimeframe, BarSeries, SignalRecord, SwingConfig, SwingConfigLoader, SwingEngine,
    init_logging, load_bars_csv,
};
use tracing::info;

#[derive(Debug, Serialize)]
struct ExportPayload {
    timeframe: String,
    swing_period: usize,
    lookback_period: usize,
    candles: Vec<CandlePoint>,
    periods: Vec<PeriodBox>,
    levels: Vec<LevelSegment>,
}

#[derive(Debug, Serialize)]
struct CandlePoint {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

#[derive(Debug, Serialize)]
struct PeriodBox {
    t0: i64,
    t1: i64,
    high: f64,
    low: f64,
    volume: f64,
}

#[derive(Debug, Serialize)]
struct LevelSegment {
    #[serde(flatten)]
    record: SignalRecord,
    t0: i64,
    t1: i64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!(
            "usage: cargo run -q -p replay --bin export_swing_levels -- <csv_path> <output_dir> [timeframe:chart|1m|5m|15m|30m|1h|4h|1d] [swing_period] [lookback_period] [config.yaml|config.json]"
        );
        std::process::exit(2);
    }

    let csv_path = PathBuf::from(&args[1]);
    let output_dir = PathBuf::from(&args[2]);

    let mut config = match args.get(6) {
        Some(path) => SwingConfigLoader::load(path)?,
        None => SwingConfig::default(),
    };
    if let Some(raw) = args.get(3) {
        config.timeframe = AggregationTimeframe::parse(raw)?;
    }
    if let Some(raw) = args.get(4) {
        config.swing_period = raw.parse::<usize>()?;
    }
    if let Some(raw) = args.get(5) {
        config.lookback_period = raw.parse::<usize>()?;
    }

    let series = BarSeries::from_bars(load_bars_csv(&csv_path)?);
    let mut engine = SwingEngine::new(config)?;
    engine.run(&series);

    fs::create_dir_all(&output_dir)?;
    engine.write_parquet_snapshot(&output_dir)?;

    let bars = series.bars();
    let last_time = bars.last().map(|x| x.end_time.timestamp()).unwrap_or_default();
    let signals = engine.active_signals(None);
    let levels = signals
        .iter()
        .map(|x| LevelSegment {
            record: SignalRecord::from(x),
            t0: bars
                .get(x.start_bar())
                .map(|b| b.start_time.timestamp())
                .unwrap_or_default(),
            t1: x
                .end_bar()
                .and_then(|i| bars.get(i))
                .map(|b| b.start_time.timestamp())
                .unwrap_or(last_time),
        })
        .collect::<Vec<_>>();

    let payload = ExportPayload {
        timeframe: engine.config().timeframe.as_str().to_string(),
        swing_period: engine.config().swing_period,
        lookback_period: engine.config().lookback_period,
        candles: bars
            .iter()
            .map(|x| CandlePoint {
                time: x.start_time.timestamp(),
                open: x.open_price,
                high: x.high_price,
                low: x.low_price,
                close: x.close_price,
            })
            .collect(),
        periods: engine
            .periods()
            .iter()
            .map(|x| PeriodBox {
                t0: x.start_time().timestamp(),
                t1: x.end_time().timestamp(),
                high: x.high_price(),
                low: x.low_price(),
                volume: x.volume(),
            })
            .collect(),
        levels,
    };

    let json_path = output_dir.join("swing_levels.json");
    fs::write(&json_path, serde_json::to_string_pretty(&payload)?)?;

    info!(
        bars = bars.len(),
        levels = signals.len(),
        open_levels = signals.iter().filter(|x| x.is_open()).count(),
        output = %json_path.display(),
        "swing levels exported"
    );
    println!(
        "EXPORT done: bars={} levels={} periods={} -> {}",
        bars.len(),
        signals.len(),
        engine.periods().len(),
        output_dir.display()
    );
    Ok(())
}
