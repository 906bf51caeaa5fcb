use std::path::PathBuf;

use swingline::{
    AggregationTimeframe, Bar, BarSeries, LevelAging, Signal, SwingConfig, SwingEngine, SwingKind,
    init_logging_with_level, load_bars_csv,
};
use tracing::Level;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|x| x == "--verbose");
    args.retain(|x| x != "--verbose");
    if args.len() < 2 {
        eprintln!(
            "usage: cargo run -q -p replay --bin audit_swing_levels -- <csv_path> [timeframe:chart|1m|5m|15m|30m|1h|4h|1d] [swing_period] [lookback_period] [--verbose]"
        );
        std::process::exit(2);
    }
    init_logging_with_level(if verbose { Level::DEBUG } else { Level::INFO });

    let csv_path = PathBuf::from(&args[1]);
    let mut config = SwingConfig::default();
    if let Some(raw) = args.get(2) {
        config.timeframe = AggregationTimeframe::parse(raw)?;
    }
    if let Some(raw) = args.get(3) {
        config.swing_period = raw.parse::<usize>()?;
    }
    if let Some(raw) = args.get(4) {
        config.lookback_period = raw.parse::<usize>()?;
    }

    let series = BarSeries::from_bars(load_bars_csv(&csv_path)?);
    let bars = series.bars();

    let mut batch = SwingEngine::new(config.clone())?;
    batch.run(&series);

    let mut violations = Vec::<String>::new();

    // 第二遍回放必须得到完全相同的结果
    let mut again = SwingEngine::new(config.clone())?;
    again.run(&series);
    if again.chart_signals() != batch.chart_signals()
        || again.period_signals() != batch.period_signals()
        || again.periods() != batch.periods()
    {
        violations.push("REPLAY not deterministic across two runs".to_string());
    }

    // 模拟实时推送：每根先以半成品形态推送两次，再以最终形态推送一次
    let mut live_series = BarSeries::new();
    let mut live = SwingEngine::new(config.clone())?;
    for (index, full) in bars.iter().enumerate() {
        live_series.push(forming(full));
        live.step(index, &live_series);
        live.step(index, &live_series);
        live_series.update_last(full.clone());
        live.step(index, &live_series);
    }
    if live.chart_signals() != batch.chart_signals() {
        violations.push("LIVE chart levels differ from batch replay".to_string());
    }
    if live.period_signals() != batch.period_signals() {
        violations.push("LIVE period levels differ from batch replay".to_string());
    }

    audit_periods(&batch, bars, &mut violations);
    if let Some(manager) = live.period_manager() {
        let raw_total = bars.iter().map(|x| x.volume).sum::<f64>();
        if (manager.total_volume() - raw_total).abs() > 1e-6 * raw_total.max(1.0) {
            violations.push(format!(
                "VOLUME live drift: periods={} bars={}",
                manager.total_volume(),
                raw_total
            ));
        }
    }

    let last_bar = bars.len().saturating_sub(1);
    audit_levels(
        "CHART",
        &batch.chart_signals(),
        bars,
        &config,
        last_bar,
        LevelAging::FromStart,
        &mut violations,
    );
    audit_levels(
        "PERIOD",
        &batch.period_signals(),
        bars,
        &config,
        last_bar,
        LevelAging::FromConfirmation,
        &mut violations,
    );

    let signals = batch.active_signals(None);
    println!(
        "AUDIT summary: bars={} periods={} levels={} open={} highs={} lows={}",
        bars.len(),
        batch.periods().len(),
        signals.len(),
        signals.iter().filter(|x| x.is_open()).count(),
        signals.iter().filter(|x| x.kind() == SwingKind::High).count(),
        signals.iter().filter(|x| x.kind() == SwingKind::Low).count(),
    );

    if violations.is_empty() {
        println!("AUDIT result: PASS (no violations found)");
        return Ok(());
    }

    println!("AUDIT result: FAIL violations={}", violations.len());
    for item in violations.iter().take(30) {
        println!("- {item}");
    }
    if violations.len() > 30 {
        println!("- ... {} more", violations.len() - 30);
    }
    std::process::exit(1);
}

fn forming(full: &Bar) -> Bar {
    let mid = (full.high_price + full.low_price) / 2.0;
    Bar {
        high_price: mid.max(full.open_price),
        low_price: mid.min(full.open_price),
        close_price: mid,
        volume: full.volume / 2.0,
        ..full.clone()
    }
}

fn audit_periods(engine: &SwingEngine, bars: &[Bar], violations: &mut Vec<String>) {
    let periods = engine.periods();
    for period in periods {
        if period.high_price() < period.open_price().max(period.close_price())
            || period.low_price() > period.open_price().min(period.close_price())
        {
            violations.push(format!(
                "PERIOD ohlc inconsistent start_bar={}",
                period.start_bar()
            ));
        }
        let span = period.start_bar()..=period.end_bar();
        if !span.contains(&period.high_bar()) || !span.contains(&period.low_bar()) {
            violations.push(format!(
                "PERIOD extreme bar outside span start_bar={} high_bar={} low_bar={}",
                period.start_bar(),
                period.high_bar(),
                period.low_bar()
            ));
        }
        let high_matches = bars
            .get(period.high_bar())
            .is_some_and(|x| x.high_price == period.high_price());
        let low_matches = bars
            .get(period.low_bar())
            .is_some_and(|x| x.low_price == period.low_price());
        if !high_matches || !low_matches {
            violations.push(format!(
                "PERIOD extreme price does not match its bar start_bar={}",
                period.start_bar()
            ));
        }
    }

    for pair in periods.windows(2) {
        if pair[1].start_bar() != pair[0].end_bar() + 1 {
            violations.push(format!(
                "PERIOD gap between {} and {}",
                pair[0].end_bar(),
                pair[1].start_bar()
            ));
        }
        if !pair[0].is_sealed() || pair[0].buffered_volume() != 0.0 {
            violations.push(format!(
                "PERIOD closed but not sealed start_bar={}",
                pair[0].start_bar()
            ));
        }
    }

    if let Some(manager) = engine.period_manager() {
        let raw_total = bars.iter().map(|x| x.volume).sum::<f64>();
        if (manager.total_volume() - raw_total).abs() > 1e-6 * raw_total.max(1.0) {
            violations.push(format!(
                "VOLUME drift: periods={} bars={}",
                manager.total_volume(),
                raw_total
            ));
        }
    }
}

fn audit_levels(
    label: &str,
    signals: &[Signal],
    bars: &[Bar],
    config: &SwingConfig,
    last_bar: usize,
    aging: LevelAging,
    violations: &mut Vec<String>,
) {
    for signal in signals {
        let start = signal.start_bar();
        let confirmed = signal.confirmed_bar();
        let age = aging.age(signal, last_bar);
        if age > config.lookback_period {
            violations.push(format!(
                "{label} level outlived lookback start_bar={start} age={age}"
            ));
        }
        if confirmed < start + config.swing_period {
            violations.push(format!(
                "{label} level confirmed before its right flank closed start_bar={start} confirmed_bar={confirmed}"
            ));
        }

        let Some(origin) = bars.get(start) else {
            violations.push(format!("{label} level points past data start_bar={start}"));
            continue;
        };
        if signal.price() != level_price(signal.kind(), origin) {
            violations.push(format!(
                "{label} level price mismatch start_bar={start} price={}",
                signal.price()
            ));
        }

        // 突破检测从确认 bar 开始，两条路径一致
        let first_breach = (confirmed..=last_bar).find(|i| {
            bars.get(*i)
                .is_some_and(|x| breaches(signal.kind(), signal.price(), x))
        });
        match (signal.end_bar(), first_breach) {
            (Some(end), Some(index)) if end == index => {}
            (Some(end), _) => violations.push(format!(
                "{label} level closed at wrong bar start_bar={start} end_bar={end} first_breach={first_breach:?}"
            )),
            (None, Some(index)) => violations.push(format!(
                "{label} level still open after breach start_bar={start} breach_bar={index}"
            )),
            (None, None) => {}
        }
    }
}

fn level_price(kind: SwingKind, bar: &Bar) -> f64 {
    match kind {
        SwingKind::High => bar.high_price,
        SwingKind::Low => bar.low_price,
    }
}

fn breaches(kind: SwingKind, price: f64, bar: &Bar) -> bool {
    match kind {
        SwingKind::High => bar.high_price >= price,
        SwingKind::Low => bar.low_price <= price,
    }
}
