//! 摆动高低点引擎对外入口。
//!
//! 每根 bar 的处理顺序：
//! 1. 聚合周期启用时推送到 `PeriodManager`，开启新周期则扫描已封闭周期；
//! 2. 原始 K 线路径按 `bar - 1 - period` 为中心扫描；
//! 3. 两组价位分别做突破检测与超龄淘汰；聚合路径的价位从确认 bar 起算年龄。
//!
//! 参数（周期、回看长度、聚合周期、判定策略）变化时丢弃全部派生状态，
//! 由调用方从第 0 根重新推送。

use std::fs::create_dir_all;
use std::path::Path;

use tracing::{info, warn};

use crate::bar::AggregatedPeriod;
use crate::config::SwingConfig;
use crate::constant::{
    AggregationTimeframe, ConfigError, Const, DataError, EventType, SwingKind, SwingPolicy,
};
use crate::events::{EventPayload, Observable, Subscriber};
use crate::export::{periods_dataframe, signals_dataframe, write_parquet};
use crate::period_manager::PeriodManager;
use crate::signal::{LevelAging, LevelTracker, LevelUpdate, Signal};
use crate::source::CandleSource;
use crate::swing::{SwingDetector, SwingPoint};

pub struct SwingEngine {
    config: SwingConfig,
    detector: SwingDetector,
    periods: Option<PeriodManager>,
    chart_levels: LevelTracker,
    period_levels: LevelTracker,
    last_bar: Option<usize>,
    observable: Observable,
}

impl SwingEngine {
    pub fn new(config: SwingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut engine = Self {
            detector: SwingDetector::new(config.swing_period, config.policy),
            periods: None,
            chart_levels: LevelTracker::new(config.lookback_period),
            period_levels: period_tracker(config.lookback_period),
            last_bar: None,
            observable: Observable::default(),
            config,
        };
        engine.rebuild_state();
        Ok(engine)
    }

    pub fn config(&self) -> &SwingConfig {
        &self.config
    }

    pub fn subscribe(&mut self, event_type: Option<EventType>, subscriber: Subscriber) {
        self.observable.subscribe(event_type, subscriber);
    }

    /// 处理第 `bar_index` 根 bar。
    ///
    /// index 必须从 0 开始连续递增；允许对最后一根（仍在形成中的）bar 重复调用，
    /// 重复调用不会产生重复信号。
    pub fn step<S>(&mut self, bar_index: usize, source: &S)
    where
        S: CandleSource + ?Sized,
    {
        let Some(bar) = source.bar(bar_index) else {
            debug_assert!(false, "bar {bar_index} missing from source");
            return;
        };
        match self.last_bar {
            Some(last) => debug_assert!(
                bar_index == last || bar_index == last + 1,
                "bar index must advance by one: last={last}, got={bar_index}"
            ),
            None => debug_assert!(bar_index == 0, "first bar must be index 0, got={bar_index}"),
        }
        let is_new_bar = self.last_bar != Some(bar_index);
        self.last_bar = Some(bar_index);

        if let Some(periods) = self.periods.as_mut() {
            if periods.ingest(bar_index, source) {
                self.observable
                    .notify(EventType::PeriodOpened, EventPayload::at_bar(bar_index));
                let points = self.detector.scan_periods(periods.closed());
                open_signals(&mut self.period_levels, &self.observable, bar_index, points);
            }
            let update = self.period_levels.on_bar(bar_index, bar);
            notify_update(&self.observable, bar_index, update);
        }

        if is_new_bar {
            let points = self.detector.scan_chart(bar_index, source);
            open_signals(&mut self.chart_levels, &self.observable, bar_index, points);
        }
        let update = self.chart_levels.on_bar(bar_index, bar);
        notify_update(&self.observable, bar_index, update);
    }

    /// 从上次处理位置之后继续推送，直到数据源末尾；新引擎从第 0 根开始。
    pub fn run<S>(&mut self, source: &S)
    where
        S: CandleSource + ?Sized,
    {
        let start = self.last_bar.map_or(0, |x| x + 1);
        for bar_index in start..source.len() {
            self.step(bar_index, source);
        }
    }

    /// 丢弃所有派生状态，等待调用方从头推送。
    pub fn recalculate(&mut self) {
        self.rebuild_state();
        info!(
            swing_period = self.config.swing_period,
            lookback_period = self.config.lookback_period,
            timeframe = self.config.timeframe.as_str(),
            "swing engine recalculated"
        );
        self.observable.notify(EventType::Recalculated, EventPayload::default());
    }

    fn rebuild_state(&mut self) {
        self.detector = SwingDetector::new(self.config.swing_period, self.config.policy);
        self.chart_levels = LevelTracker::new(self.config.lookback_period);
        self.period_levels = period_tracker(self.config.lookback_period);
        self.last_bar = None;
        self.periods = if self.config.aggregation_enabled() {
            let max_rows = 2 * self.config.swing_period + 2 + Const::PERIOD_MARGIN;
            Some(PeriodManager::new(self.config.timeframe, max_rows))
        } else {
            if self.config.timeframe.is_aggregated() {
                warn!(
                    timeframe = self.config.timeframe.as_str(),
                    chart_interval_secs = ?self.config.chart_interval_secs,
                    "chart interval is coarser than aggregation timeframe, aggregation disabled"
                );
            }
            None
        };
    }

    pub fn set_swing_period(&mut self, swing_period: usize) -> Result<(), ConfigError> {
        self.reconfigure(SwingConfig {
            swing_period,
            ..self.config.clone()
        })
    }

    pub fn set_lookback_period(&mut self, lookback_period: usize) -> Result<(), ConfigError> {
        self.reconfigure(SwingConfig {
            lookback_period,
            ..self.config.clone()
        })
    }

    pub fn set_timeframe(&mut self, timeframe: AggregationTimeframe) -> Result<(), ConfigError> {
        self.reconfigure(SwingConfig {
            timeframe,
            ..self.config.clone()
        })
    }

    pub fn set_policy(&mut self, policy: SwingPolicy) -> Result<(), ConfigError> {
        self.reconfigure(SwingConfig {
            policy,
            ..self.config.clone()
        })
    }

    /// 只影响读取视图，不触发重算。
    pub fn set_hide_closed(&mut self, hide_closed: bool) {
        self.config.hide_closed = hide_closed;
    }

    fn reconfigure(&mut self, config: SwingConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = config;
        self.recalculate();
        Ok(())
    }

    fn display_levels(&self) -> &LevelTracker {
        if self.config.timeframe.is_aggregated() {
            &self.period_levels
        } else {
            &self.chart_levels
        }
    }

    /// 当前聚合周期对应的信号快照，按起点升序。
    pub fn active_signals(&self, kind: Option<SwingKind>) -> Vec<Signal> {
        self.display_levels().signals(kind)
    }

    pub fn visible_signals(&self, first_bar: usize, last_bar: usize) -> Vec<Signal> {
        self.display_levels()
            .visible(first_bar, last_bar, self.config.hide_closed)
    }

    pub fn chart_signals(&self) -> Vec<Signal> {
        self.chart_levels.signals(None)
    }

    pub fn period_signals(&self) -> Vec<Signal> {
        self.period_levels.signals(None)
    }

    pub fn periods(&self) -> &[AggregatedPeriod] {
        self.periods.as_ref().map(|x| x.rows()).unwrap_or_default()
    }

    pub fn period_manager(&self) -> Option<&PeriodManager> {
        self.periods.as_ref()
    }

    pub fn last_bar(&self) -> Option<usize> {
        self.last_bar
    }

    pub fn write_parquet_snapshot(&self, output_dir: impl AsRef<Path>) -> Result<(), DataError> {
        let output_dir = output_dir.as_ref();
        create_dir_all(output_dir)?;

        let mut signal_df = signals_dataframe(&self.active_signals(None))?;
        write_parquet(&mut signal_df, output_dir.join("signals.parquet"))?;

        if let Some(periods) = self.periods.as_ref() {
            let mut period_df = periods_dataframe(periods.rows())?;
            write_parquet(&mut period_df, output_dir.join("periods.parquet"))?;
        }
        Ok(())
    }
}

/// 聚合路径的极值 bar 比确认早至少 `period + 1` 个大周期，按确认 bar 计算年龄。
fn period_tracker(lookback_period: usize) -> LevelTracker {
    LevelTracker::with_aging(lookback_period, LevelAging::FromConfirmation)
}

fn open_signals(
    levels: &mut LevelTracker,
    observable: &Observable,
    bar_index: usize,
    points: Vec<SwingPoint>,
) {
    for point in points {
        let signal = levels.open(point, bar_index);
        observable.notify(
            EventType::SignalCreated,
            EventPayload::for_signal(bar_index, signal),
        );
    }
}

fn notify_update(observable: &Observable, bar_index: usize, update: LevelUpdate) {
    observable.notify_signals(EventType::SignalClosed, bar_index, &update.closed);
    observable.notify_signals(EventType::SignalEvicted, bar_index, &update.evicted);
}
