//! 大周期合成管理器。
//!
//! 职责：
//! - 按聚合周期把原始 bar 增量合成为 `AggregatedPeriod`；
//! - 同一 bar index 的重复推送只更新当前周期，不重复累计成交量；
//! - 报告本次推送是否开启了新周期，供摆动检测决定是否扫描。

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::bar::{AggregatedPeriod, Bar};
use crate::constant::AggregationTimeframe;
use crate::source::CandleSource;

pub struct PeriodManager {
    timeframe: AggregationTimeframe,
    rows: Vec<AggregatedPeriod>,
    max_rows: usize,
    retired_volume: f64,
    is_new_period: bool,
    last_bar: Option<usize>,
}

impl PeriodManager {
    /// `max_rows` 限制保留的周期数量，超出部分从最旧的开始丢弃。
    pub fn new(timeframe: AggregationTimeframe, max_rows: usize) -> Self {
        assert!(max_rows >= 2, "max_rows must keep at least two periods");
        Self {
            timeframe,
            rows: Vec::new(),
            max_rows,
            retired_volume: 0.0,
            is_new_period: false,
            last_bar: None,
        }
    }

    /// 推送一根原始 bar。index 必须连续递增，允许重复推送最后一根。
    pub fn ingest<S>(&mut self, bar_index: usize, source: &S) -> bool
    where
        S: CandleSource + ?Sized,
    {
        self.is_new_period = false;
        let Some(bar) = source.bar(bar_index) else {
            debug_assert!(false, "bar {bar_index} missing from source");
            return false;
        };
        if let Some(last) = self.last_bar {
            debug_assert!(
                bar_index == last || bar_index == last + 1,
                "bar index must advance by one: last={last}, got={bar_index}"
            );
        }
        self.last_bar = Some(bar_index);

        let Some(current) = self.rows.last() else {
            self.open_period(bar_index, bar);
            return true;
        };

        let crosses_boundary = if self.timeframe.is_session() {
            source.is_new_session(bar_index)
        } else {
            period_begin(bar.start_time, self.timeframe) >= current.end_time()
        };

        if crosses_boundary && current.start_bar() != bar_index {
            self.open_period(bar_index, bar);
        } else if let Some(current) = self.rows.last_mut() {
            current.fold(bar_index, bar);
        }
        self.is_new_period
    }

    fn open_period(&mut self, bar_index: usize, bar: &Bar) {
        if let Some(previous) = self.rows.last_mut() {
            previous.seal();
        }
        self.rows.push(AggregatedPeriod::open(bar_index, bar));
        self.is_new_period = true;

        if self.rows.len() > self.max_rows {
            let excess = self.rows.len() - self.max_rows;
            self.retired_volume += self
                .rows
                .drain(..excess)
                .map(|x| x.volume())
                .sum::<f64>();
        }
        debug!(
            timeframe = self.timeframe.as_str(),
            bar_index,
            start = %bar.start_time,
            "aggregated period opened"
        );
    }

    pub fn timeframe(&self) -> AggregationTimeframe {
        self.timeframe
    }

    pub fn is_new_period(&self) -> bool {
        self.is_new_period
    }

    pub fn rows(&self) -> &[AggregatedPeriod] {
        &self.rows
    }

    /// 已经封闭的周期（不含正在形成的最后一个）。
    pub fn closed(&self) -> &[AggregatedPeriod] {
        match self.rows.len() {
            0 => &[],
            n => &self.rows[..n - 1],
        }
    }

    pub fn current(&self) -> Option<&AggregatedPeriod> {
        self.rows.last()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// 所有已推送 bar 的成交量合计，包含因容量限制被丢弃的周期。
    pub fn total_volume(&self) -> f64 {
        self.retired_volume + self.rows.iter().map(|x| x.volume()).sum::<f64>()
    }
}

/// 计算 `time` 所属聚合周期的起始时间：先截断到整分钟，再按周期分钟数对齐到 Unix 纪元。
pub(crate) fn period_begin(time: DateTime<Utc>, timeframe: AggregationTimeframe) -> DateTime<Utc> {
    let minutes = i64::from(timeframe.minutes().max(1));
    let epoch_minutes = time.timestamp().div_euclid(60);
    let aligned = epoch_minutes - epoch_minutes.rem_euclid(minutes);
    DateTime::<Utc>::from_timestamp(aligned * 60, 0).unwrap_or(time)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::source::BarSeries;

    fn minute_bar(minute: i64, high: f64, low: f64, volume: f64) -> Bar {
        let start = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap() + chrono::Duration::minutes(minute);
        Bar {
            start_time: start,
            end_time: start + chrono::Duration::minutes(1),
            open_price: low,
            high_price: high,
            low_price: low,
            close_price: high,
            volume,
        }
    }

    #[test]
    fn period_begin_truncates_and_aligns() {
        let t = Utc.with_ymd_and_hms(2025, 3, 3, 9, 7, 42).unwrap();
        assert_eq!(
            period_begin(t, AggregationTimeframe::M5),
            Utc.with_ymd_and_hms(2025, 3, 3, 9, 5, 0).unwrap()
        );
        assert_eq!(
            period_begin(t, AggregationTimeframe::H4),
            Utc.with_ymd_and_hms(2025, 3, 3, 8, 0, 0).unwrap()
        );
        assert_eq!(
            period_begin(t, AggregationTimeframe::M1),
            Utc.with_ymd_and_hms(2025, 3, 3, 9, 7, 0).unwrap()
        );
    }

    #[test]
    fn five_minute_periods_open_on_boundaries() {
        let series = BarSeries::from_bars((0..12).map(|m| minute_bar(m, 10.0, 9.0, 1.0)).collect());
        let mut manager = PeriodManager::new(AggregationTimeframe::M5, 64);

        let opened = (0..12)
            .filter(|&i| manager.ingest(i, &series))
            .collect::<Vec<_>>();

        assert_eq!(opened, vec![0, 5, 10]);
        assert_eq!(manager.row_count(), 3);
        assert_eq!(manager.rows()[0].bar_count(), 5);
        assert!(manager.rows()[0].is_sealed());
        assert!(!manager.rows()[2].is_sealed());
    }

    #[test]
    fn pruned_periods_still_count_towards_total_volume() {
        let series = BarSeries::from_bars((0..30).map(|m| minute_bar(m, 10.0, 9.0, 2.0)).collect());
        let mut manager = PeriodManager::new(AggregationTimeframe::M5, 2);
        for i in 0..30 {
            manager.ingest(i, &series);
        }
        assert_eq!(manager.row_count(), 2);
        assert!((manager.total_volume() - 60.0).abs() < 1e-9);
    }
}
