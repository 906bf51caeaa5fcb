use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};

use swingline::{
    AggregationTimeframe, Bar, BarSeries, CandleSource, PeriodManager, SwingConfig, SwingEngine,
    SwingKind, SwingPolicy,
};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap()
}

fn bar_at(start: DateTime<Utc>, span: Duration, high: f64, low: f64, volume: f64) -> Bar {
    Bar {
        start_time: start,
        end_time: start + span,
        open_price: low,
        high_price: high,
        low_price: low,
        close_price: high,
        volume,
    }
}

fn minute_bar(index: usize, high: f64, low: f64, volume: f64) -> Bar {
    bar_at(
        base_time() + Duration::minutes(index as i64),
        Duration::minutes(1),
        high,
        low,
        volume,
    )
}

fn hour_bar(index: usize) -> Bar {
    bar_at(
        base_time() + Duration::hours(index as i64),
        Duration::hours(1),
        10.0 + (index % 5) as f64,
        9.0,
        1.0,
    )
}

fn spike_minutes(count: usize, spike_at: usize) -> BarSeries {
    BarSeries::from_bars(
        (0..count)
            .map(|i| {
                let high = if i == spike_at { 5.0 } else { 1.0 };
                minute_bar(i, high, 0.5, 2.0)
            })
            .collect(),
    )
}

fn aggregated_engine(timeframe: AggregationTimeframe, swing_period: usize) -> SwingEngine {
    SwingEngine::new(SwingConfig {
        swing_period,
        lookback_period: 500,
        timeframe,
        policy: SwingPolicy::HighPriority,
        ..SwingConfig::default()
    })
    .expect("valid config")
}

/// 一分钟 bar，每小时内的最高价取 `hour_highs[h]`，最低价恒为 0.5。
fn hourly_minutes(hour_highs: &[f64]) -> Vec<Bar> {
    (0..hour_highs.len() * 60)
        .map(|i| minute_bar(i, hour_highs[i / 60], 0.5, 1.0))
        .collect()
}

fn hourly_engine() -> SwingEngine {
    SwingEngine::new(SwingConfig {
        timeframe: AggregationTimeframe::H1,
        ..SwingConfig::default()
    })
    .expect("valid config")
}

fn period_highs(engine: &SwingEngine) -> Vec<(usize, usize, Option<usize>)> {
    engine
        .active_signals(Some(SwingKind::High))
        .iter()
        .map(|x| (x.start_bar(), x.confirmed_bar(), x.end_bar()))
        .collect()
}

#[test]
fn single_bar_period_is_flat_copy_of_bar() {
    let series = BarSeries::from_bars(vec![minute_bar(0, 3.0, 1.0, 7.0)]);
    let mut manager = PeriodManager::new(AggregationTimeframe::M5, 16);
    assert!(manager.ingest(0, &series));

    let period = manager.current().expect("period opened");
    assert_eq!(period.high_price(), 3.0);
    assert_eq!(period.low_price(), 1.0);
    assert_eq!(period.open_price(), 1.0);
    assert_eq!(period.close_price(), 3.0);
    assert_eq!(period.high_bar(), 0);
    assert_eq!(period.volume(), 7.0);
    assert_eq!(period.committed_volume(), 0.0);
}

#[test]
fn period_tracks_bar_of_high_and_low() {
    let bars = vec![
        minute_bar(0, 3.0, 2.0, 1.0),
        minute_bar(1, 4.0, 2.5, 1.0),
        minute_bar(2, 3.5, 1.0, 1.0),
        minute_bar(3, 3.0, 2.0, 1.0),
    ];
    let series = BarSeries::from_bars(bars);
    let mut manager = PeriodManager::new(AggregationTimeframe::M5, 16);
    for i in 0..4 {
        manager.ingest(i, &series);
    }

    let period = manager.current().expect("period");
    assert_eq!(manager.row_count(), 1);
    assert_eq!((period.high_bar(), period.high_price()), (1, 4.0));
    assert_eq!((period.low_bar(), period.low_price()), (2, 1.0));
    assert!(period.high_price() >= period.open_price().max(period.close_price()));
    assert!(period.low_price() <= period.open_price().min(period.close_price()));
}

#[test]
fn volume_is_conserved_across_partial_updates() {
    let mut series = BarSeries::new();
    let mut manager = PeriodManager::new(AggregationTimeframe::M5, 1000);
    let mut raw_total = 0.0;

    for i in 0..23 {
        let volume = 1.0 + (i % 4) as f64;
        series.push(minute_bar(i, 2.0, 1.0, volume / 2.0));
        manager.ingest(i, &series);
        series.update_last(minute_bar(i, 2.0, 1.0, volume));
        manager.ingest(i, &series);
        raw_total += volume;

        let closed = manager
            .closed()
            .iter()
            .map(|x| x.committed_volume())
            .sum::<f64>();
        let current = manager.current().expect("open period");
        let accounted = closed + current.committed_volume() + current.buffered_volume();
        assert!(
            (accounted - raw_total).abs() < 1e-9,
            "volume drift at bar {i}: {accounted} vs {raw_total}"
        );
        assert!(manager.closed().iter().all(|x| x.buffered_volume() == 0.0));
    }
    assert_eq!(manager.row_count(), 5);
}

#[test]
fn re_ingesting_forming_bar_updates_one_period() {
    let mut series = BarSeries::from_bars(vec![
        minute_bar(0, 2.0, 1.0, 1.0),
        minute_bar(1, 2.0, 1.0, 1.0),
    ]);
    let mut manager = PeriodManager::new(AggregationTimeframe::M5, 16);
    manager.ingest(0, &series);
    manager.ingest(1, &series);

    series.update_last(minute_bar(1, 2.5, 0.8, 4.0));
    assert!(!manager.ingest(1, &series));

    assert_eq!(manager.row_count(), 1);
    let period = manager.current().expect("period");
    assert_eq!(period.end_bar(), 1);
    assert_eq!(period.committed_volume(), 1.0);
    assert_eq!(period.buffered_volume(), 4.0);
    assert_eq!(period.high_price(), 2.5);
    assert_eq!(period.low_price(), 0.8);
}

#[test]
fn re_ingesting_the_opening_bar_does_not_open_twice() {
    let series = BarSeries::from_bars((0..6).map(|i| minute_bar(i, 2.0, 1.0, 1.0)).collect());
    let mut manager = PeriodManager::new(AggregationTimeframe::M5, 16);
    for i in 0..6 {
        manager.ingest(i, &series);
    }
    assert!(!manager.ingest(5, &series));
    assert_eq!(manager.row_count(), 2);
    assert_eq!(manager.current().map(|x| x.start_bar()), Some(5));
}

#[test]
fn daily_periods_follow_calendar_sessions() {
    let series = BarSeries::from_bars((0..72).map(hour_bar).collect());
    let mut manager = PeriodManager::new(AggregationTimeframe::Daily, 16);
    let opened = (0..72)
        .filter(|&i| manager.ingest(i, &series))
        .collect::<Vec<_>>();
    assert_eq!(opened, vec![0, 24, 48]);
}

struct EveningSessions {
    bars: BarSeries,
}

impl CandleSource for EveningSessions {
    fn bar(&self, index: usize) -> Option<&Bar> {
        self.bars.bar(index)
    }

    fn len(&self) -> usize {
        self.bars.len()
    }

    fn is_new_session(&self, index: usize) -> bool {
        index == 0 || self.bar(index).is_some_and(|x| x.start_time.hour() == 18)
    }
}

#[test]
fn daily_periods_use_source_session_signal() {
    let source = EveningSessions {
        bars: BarSeries::from_bars((0..72).map(hour_bar).collect()),
    };
    let mut manager = PeriodManager::new(AggregationTimeframe::Daily, 16);
    let opened = (0..72)
        .filter(|&i| manager.ingest(i, &source))
        .collect::<Vec<_>>();
    assert_eq!(opened, vec![0, 18, 42, 66]);
}

#[test]
fn aggregated_swing_waits_for_closed_flank_periods() {
    let series = spike_minutes(30, 12);
    let mut engine = aggregated_engine(AggregationTimeframe::M5, 1);

    for i in 0..20 {
        engine.step(i, &series);
    }
    assert!(engine.active_signals(Some(SwingKind::High)).is_empty());

    engine.step(20, &series);
    let highs = engine
        .active_signals(Some(SwingKind::High))
        .iter()
        .map(|x| (x.start_bar(), x.price(), x.is_open()))
        .collect::<Vec<_>>();
    assert_eq!(highs, vec![(12, 5.0, true)]);

    // 原始 K 线路径独立运行
    assert!(
        engine
            .chart_signals()
            .iter()
            .any(|x| x.kind() == SwingKind::High && x.start_bar() == 12)
    );
}

#[test]
fn aggregated_replay_is_deterministic() {
    let series = BarSeries::from_bars(
        (0..600)
            .map(|i| {
                let x = i as f64;
                let mid = 50.0 + (x / 40.0).sin() * 5.0 + (x / 9.0).cos();
                minute_bar(i, mid + 0.4, mid - 0.4, 1.0 + (i % 3) as f64)
            })
            .collect(),
    );

    let mut a = aggregated_engine(AggregationTimeframe::M15, 2);
    a.run(&series);
    let mut b = aggregated_engine(AggregationTimeframe::M15, 2);
    b.run(&series);

    assert!(!a.period_signals().is_empty());
    assert_eq!(a.period_signals(), b.period_signals());
    assert_eq!(a.periods(), b.periods());

    let manager = a.period_manager().expect("aggregation active");
    let raw_total = series.bars().iter().map(|x| x.volume).sum::<f64>();
    assert!((manager.total_volume() - raw_total).abs() < 1e-6);
    assert!(manager.row_count() <= 2 * 2 + 2 + swingline::Const::PERIOD_MARGIN);
}

#[test]
fn coarse_chart_disables_aggregation_path() {
    let series = spike_minutes(60, 12);
    let mut engine = SwingEngine::new(SwingConfig {
        swing_period: 1,
        timeframe: AggregationTimeframe::M5,
        chart_interval_secs: Some(900),
        ..SwingConfig::default()
    })
    .expect("valid config");
    engine.run(&series);

    assert!(engine.period_manager().is_none());
    assert!(engine.periods().is_empty());
    assert!(engine.active_signals(None).is_empty());
    assert!(!engine.chart_signals().is_empty());
}

#[test]
fn switching_timeframe_rebuilds_periods() {
    let series = spike_minutes(30, 12);
    let mut engine = aggregated_engine(AggregationTimeframe::Chart, 1);
    engine.run(&series);
    assert!(engine.periods().is_empty());

    engine
        .set_timeframe(AggregationTimeframe::M5)
        .expect("valid timeframe");
    assert!(engine.periods().is_empty());
    engine.run(&series);
    assert_eq!(engine.periods().len(), 6);
    assert_eq!(
        engine
            .active_signals(Some(SwingKind::High))
            .iter()
            .map(|x| x.start_bar())
            .collect::<Vec<_>>(),
        vec![12]
    );
}

#[test]
fn hourly_level_survives_default_lookback() {
    let series = BarSeries::from_bars(hourly_minutes(&[1.0, 2.0, 5.0, 2.0, 1.0, 1.0, 1.0, 1.0]));
    let mut engine = hourly_engine();
    assert_eq!(engine.config().lookback_period, 100);

    for i in 0..300 {
        engine.step(i, &series);
    }
    assert!(period_highs(&engine).is_empty());

    // 第 5 个小时开启时确认，起点是中心小时最高价所在的第 120 根
    engine.step(300, &series);
    assert_eq!(period_highs(&engine), vec![(120, 300, None)]);
    assert_eq!(engine.visible_signals(0, 300).len(), engine.active_signals(None).len());

    for i in 301..=400 {
        engine.step(i, &series);
    }
    assert_eq!(period_highs(&engine), vec![(120, 300, None)]);

    engine.step(401, &series);
    assert!(period_highs(&engine).is_empty());
}

#[test]
fn later_raw_bar_breaches_hourly_level() {
    let mut bars = hourly_minutes(&[1.0, 2.0, 5.0, 2.0, 1.0, 1.0, 1.0, 1.0]);
    bars[330] = minute_bar(330, 5.0, 0.5, 1.0);
    let series = BarSeries::from_bars(bars);
    let mut engine = hourly_engine();

    for i in 0..330 {
        engine.step(i, &series);
    }
    assert_eq!(period_highs(&engine), vec![(120, 300, None)]);

    engine.step(330, &series);
    let level = engine
        .active_signals(Some(SwingKind::High))
        .into_iter()
        .find(|x| x.start_bar() == 120)
        .expect("level still tracked");
    assert_eq!(level.end_bar(), Some(330));
    assert_eq!(level.state(), swingline::SignalState::Closed);

    for i in 331..=400 {
        engine.step(i, &series);
    }
    assert!(period_highs(&engine).contains(&(120, 300, Some(330))));
    engine.step(401, &series);
    assert!(period_highs(&engine).iter().all(|x| x.0 != 120));
}

#[test]
fn flank_ties_do_not_close_hourly_level() {
    // 右翼小时内出现与中心相等的最高价，属于确认窗口
    let mut bars = hourly_minutes(&[1.0, 2.0, 5.0, 2.0, 1.0, 1.0, 1.0, 1.0]);
    bars[200] = minute_bar(200, 5.0, 0.5, 1.0);
    let series = BarSeries::from_bars(bars);
    let mut engine = hourly_engine();

    for i in 0..=300 {
        engine.step(i, &series);
    }
    assert_eq!(period_highs(&engine), vec![(120, 300, None)]);

    for i in 301..=360 {
        engine.step(i, &series);
    }
    assert_eq!(
        period_highs(&engine),
        vec![(120, 300, None), (200, 360, None)]
    );
}
