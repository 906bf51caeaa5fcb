use chrono::{DateTime, Utc};

use crate::constant::DataError;

/// 数据源提供的原始 K 线，引擎只读不写。
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
    pub volume: f64,
}

impl Bar {
    pub fn validate(&self, index: usize) -> Result<(), DataError> {
        let invalid = |reason: &str| DataError::InvalidBar {
            index,
            reason: reason.to_string(),
        };
        if self.high_price < self.low_price {
            return Err(invalid("high below low"));
        }
        if self.open_price > self.high_price || self.open_price < self.low_price {
            return Err(invalid("open outside high/low range"));
        }
        if self.close_price > self.high_price || self.close_price < self.low_price {
            return Err(invalid("close outside high/low range"));
        }
        if self.end_time < self.start_time {
            return Err(invalid("end time before start time"));
        }
        if self.volume < 0.0 {
            return Err(invalid("negative volume"));
        }
        Ok(())
    }
}

/// 由多根原始 K 线合成的大周期 K 线。
///
/// 当前原始 bar 的成交量单独缓存在 `buffered_volume` 中，直到出现新的
/// bar index 才并入 `committed_volume`，这样同一根未完成的 bar 反复
/// 更新时不会重复累计。
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedPeriod {
    start_bar: usize,
    end_bar: usize,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    open_price: f64,
    high_price: f64,
    low_price: f64,
    close_price: f64,
    committed_volume: f64,
    buffered_volume: f64,
    high_bar: usize,
    low_bar: usize,
    sealed: bool,
}

impl AggregatedPeriod {
    pub(crate) fn open(bar_index: usize, bar: &Bar) -> Self {
        Self {
            start_bar: bar_index,
            end_bar: bar_index,
            start_time: bar.start_time,
            end_time: bar.end_time,
            open_price: bar.open_price,
            high_price: bar.high_price,
            low_price: bar.low_price,
            close_price: bar.close_price,
            committed_volume: 0.0,
            buffered_volume: bar.volume,
            high_bar: bar_index,
            low_bar: bar_index,
            sealed: false,
        }
    }

    pub(crate) fn fold(&mut self, bar_index: usize, bar: &Bar) {
        debug_assert!(!self.sealed, "cannot fold into a sealed period");
        debug_assert!(bar_index >= self.end_bar, "bar index rewound inside period");

        if bar.high_price > self.high_price {
            self.high_price = bar.high_price;
            self.high_bar = bar_index;
        }
        if bar.low_price < self.low_price {
            self.low_price = bar.low_price;
            self.low_bar = bar_index;
        }
        self.close_price = bar.close_price;

        if bar_index != self.end_bar {
            self.committed_volume += self.buffered_volume;
        }
        self.buffered_volume = bar.volume;
        self.end_bar = bar_index;
        self.end_time = bar.end_time;

        assert!(
            self.high_price >= self.low_price,
            "period starting at bar {} has high {} below low {}",
            self.start_bar,
            self.high_price,
            self.low_price
        );
    }

    /// 新周期开启时冻结旧周期，缓存的成交量一并提交。
    pub(crate) fn seal(&mut self) {
        self.committed_volume += self.buffered_volume;
        self.buffered_volume = 0.0;
        self.sealed = true;
    }

    pub fn start_bar(&self) -> usize {
        self.start_bar
    }

    pub fn end_bar(&self) -> usize {
        self.end_bar
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn open_price(&self) -> f64 {
        self.open_price
    }

    pub fn high_price(&self) -> f64 {
        self.high_price
    }

    pub fn low_price(&self) -> f64 {
        self.low_price
    }

    pub fn close_price(&self) -> f64 {
        self.close_price
    }

    pub fn high_bar(&self) -> usize {
        self.high_bar
    }

    pub fn low_bar(&self) -> usize {
        self.low_bar
    }

    pub fn committed_volume(&self) -> f64 {
        self.committed_volume
    }

    pub fn buffered_volume(&self) -> f64 {
        self.buffered_volume
    }

    pub fn volume(&self) -> f64 {
        self.committed_volume + self.buffered_volume
    }

    pub fn bar_count(&self) -> usize {
        self.end_bar - self.start_bar + 1
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }
}
