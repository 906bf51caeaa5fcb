//! K 线数据源接口。
//!
//! 引擎只通过 `CandleSource` 按 index 随机读取 bar；index 从 0 开始连续递增，
//! 时间单调不减。

use crate::bar::Bar;

pub trait CandleSource {
    fn bar(&self, index: usize) -> Option<&Bar>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 默认按自然日切换判断新交易时段，第 0 根总是新时段。
    fn is_new_session(&self, index: usize) -> bool {
        if index == 0 {
            return true;
        }
        match (self.bar(index - 1), self.bar(index)) {
            (Some(prev), Some(curr)) => prev.start_time.date_naive() != curr.start_time.date_naive(),
            _ => false,
        }
    }
}

/// 内存中的 bar 序列，支持追加与更新最后一根未完成的 bar。
#[derive(Debug, Clone, Default)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bars(bars: Vec<Bar>) -> Self {
        Self { bars }
    }

    /// 追加新 bar，返回其 index。
    pub fn push(&mut self, bar: Bar) -> usize {
        if let Some(last) = self.bars.last() {
            debug_assert!(
                bar.start_time >= last.start_time,
                "bar time must not go backwards"
            );
        }
        self.bars.push(bar);
        self.bars.len() - 1
    }

    /// 替换最后一根 bar（仍在形成中的 bar），返回其 index。
    pub fn update_last(&mut self, bar: Bar) -> Option<usize> {
        let last = self.bars.last_mut()?;
        *last = bar;
        Some(self.bars.len() - 1)
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }
}

impl CandleSource for BarSeries {
    fn bar(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    fn len(&self) -> usize {
        self.bars.len()
    }
}

impl CandleSource for [Bar] {
    fn bar(&self, index: usize) -> Option<&Bar> {
        self.get(index)
    }

    fn len(&self) -> usize {
        <[Bar]>::len(self)
    }
}
