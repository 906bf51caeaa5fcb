//! 摆动高低点检测。
//!
//! 以中心位置为轴，左右各取 `period` 根 bar，中心的最高价不低于两侧所有最高价
//! 即为摆动高点，最低价不高于两侧所有最低价即为摆动低点。相等不算失败。

use crate::bar::{AggregatedPeriod, Bar};
use crate::constant::{SwingKind, SwingPolicy};
use crate::source::CandleSource;

pub trait PriceExtremes {
    fn high(&self) -> f64;
    fn low(&self) -> f64;
}

impl PriceExtremes for Bar {
    fn high(&self) -> f64 {
        self.high_price
    }

    fn low(&self) -> f64 {
        self.low_price
    }
}

impl PriceExtremes for AggregatedPeriod {
    fn high(&self) -> f64 {
        self.high_price()
    }

    fn low(&self) -> f64 {
        self.low_price()
    }
}

impl<T: PriceExtremes + ?Sized> PriceExtremes for &T {
    fn high(&self) -> f64 {
        (**self).high()
    }

    fn low(&self) -> f64 {
        (**self).low()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwingClass {
    pub is_high: bool,
    pub is_low: bool,
}

impl SwingClass {
    pub fn is_none(&self) -> bool {
        !self.is_high && !self.is_low
    }
}

/// 检测得到的极值点，`bar_index` 为原始 bar 序列中的位置。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwingPoint {
    pub kind: SwingKind,
    pub bar_index: usize,
    pub price: f64,
}

/// 判定 `window[center]` 是否为摆动高点/低点。
///
/// 调用方保证 `center >= period` 且 `center + period < window.len()`。
pub fn classify<T: PriceExtremes>(
    window: &[T],
    center: usize,
    period: usize,
    policy: SwingPolicy,
) -> SwingClass {
    debug_assert!(center >= period && center + period < window.len());

    let pivot = &window[center];
    let mut is_high = true;
    let mut is_low = true;

    for i in 1..=period {
        let prev = &window[center - i];
        let next = &window[center + i];

        if pivot.high() < prev.high() || pivot.high() < next.high() {
            is_high = false;
        }
        if pivot.low() > prev.low() || pivot.low() > next.low() {
            is_low = false;
        }
        if !is_high && !is_low {
            break;
        }
    }

    match policy {
        SwingPolicy::Independent => SwingClass { is_high, is_low },
        SwingPolicy::HighPriority => SwingClass {
            is_high,
            is_low: is_low && !is_high,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwingDetector {
    period: usize,
    policy: SwingPolicy,
}

impl SwingDetector {
    pub fn new(period: usize, policy: SwingPolicy) -> Self {
        assert!(period > 0, "swing period must be > 0");
        Self { period, policy }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn policy(&self) -> SwingPolicy {
        self.policy
    }

    /// 原始 K 线路径：当前 bar 视为未完成，中心取 `bar_index - 1 - period`。
    pub fn scan_chart<S>(&self, bar_index: usize, source: &S) -> Vec<SwingPoint>
    where
        S: CandleSource + ?Sized,
    {
        if bar_index <= 2 * self.period {
            return Vec::new();
        }
        let center = bar_index - 1 - self.period;
        let Some(window) = (center - self.period..=center + self.period)
            .map(|i| source.bar(i))
            .collect::<Option<Vec<&Bar>>>()
        else {
            return Vec::new();
        };

        let class = classify(&window, self.period, self.period, self.policy);
        let pivot = window[self.period];
        let mut points = Vec::new();
        if class.is_high {
            points.push(SwingPoint {
                kind: SwingKind::High,
                bar_index: center,
                price: pivot.high_price,
            });
        }
        if class.is_low {
            points.push(SwingPoint {
                kind: SwingKind::Low,
                bar_index: center,
                price: pivot.low_price,
            });
        }
        points
    }

    /// 聚合路径：在最近 `2 * period + 1` 个已封闭周期上扫描，中心为倒数第 `period + 1` 个。
    ///
    /// 信号起点落在中心周期内实际产生极值的那根原始 bar 上。
    pub fn scan_periods(&self, closed: &[AggregatedPeriod]) -> Vec<SwingPoint> {
        let span = 2 * self.period + 1;
        if closed.len() < span {
            return Vec::new();
        }
        let window = &closed[closed.len() - span..];
        let class = classify(window, self.period, self.period, self.policy);
        let pivot = &window[self.period];
        let mut points = Vec::new();
        if class.is_high {
            points.push(SwingPoint {
                kind: SwingKind::High,
                bar_index: pivot.high_bar(),
                price: pivot.high_price(),
            });
        }
        if class.is_low {
            points.push(SwingPoint {
                kind: SwingKind::Low,
                bar_index: pivot.low_bar(),
                price: pivot.low_price(),
            });
        }
        points
    }
}
