//! 价位信号的生命周期管理。
//!
//! 状态流转：`Open --突破--> Closed --超龄--> 移除`，`Open --超龄--> 移除`。
//! 已关闭的信号不会重新打开。
//!
//! 信号在确认 bar（检测扫描所在的 bar）才进入集合，突破检测从确认 bar 开始；
//! 极值 bar 与确认 bar 之间属于确认窗口，不参与突破检测。

use serde::Serialize;
use tracing::debug;

use crate::bar::Bar;
use crate::constant::SwingKind;
use crate::swing::SwingPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    Open,
    Closed,
}

/// 超龄淘汰的起算点。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LevelAging {
    /// 从极值所在 bar 起算。
    #[default]
    FromStart,
    /// 从确认 bar 起算。聚合路径的极值可能比确认早好几个大周期。
    FromConfirmation,
}

impl LevelAging {
    pub fn age(self, signal: &Signal, bar_index: usize) -> usize {
        match self {
            Self::FromStart => signal.age(bar_index),
            Self::FromConfirmation => bar_index.saturating_sub(signal.confirmed_bar),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    start_bar: usize,
    confirmed_bar: usize,
    end_bar: Option<usize>,
    price: f64,
    kind: SwingKind,
}

impl Signal {
    pub fn new(kind: SwingKind, start_bar: usize, confirmed_bar: usize, price: f64) -> Self {
        debug_assert!(
            confirmed_bar >= start_bar,
            "signal confirmed at {confirmed_bar} before its start {start_bar}"
        );
        Self {
            start_bar,
            confirmed_bar,
            end_bar: None,
            price,
            kind,
        }
    }

    pub fn start_bar(&self) -> usize {
        self.start_bar
    }

    pub fn confirmed_bar(&self) -> usize {
        self.confirmed_bar
    }

    /// `None` 表示价位仍然有效，向右无限延伸。
    pub fn end_bar(&self) -> Option<usize> {
        self.end_bar
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn kind(&self) -> SwingKind {
        self.kind
    }

    pub fn state(&self) -> SignalState {
        match self.end_bar {
            None => SignalState::Open,
            Some(_) => SignalState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_bar.is_none()
    }

    pub fn age(&self, bar_index: usize) -> usize {
        bar_index.saturating_sub(self.start_bar)
    }

    fn is_breached_by(&self, bar: &Bar) -> bool {
        match self.kind {
            SwingKind::High => bar.high_price >= self.price,
            SwingKind::Low => bar.low_price <= self.price,
        }
    }
}

/// 一次推进中被关闭和被淘汰的信号。
#[derive(Debug, Clone, Default)]
pub struct LevelUpdate {
    pub closed: Vec<Signal>,
    pub evicted: Vec<Signal>,
}

pub struct LevelTracker {
    rows: Vec<Signal>,
    lookback_period: usize,
    aging: LevelAging,
}

impl LevelTracker {
    pub fn new(lookback_period: usize) -> Self {
        Self::with_aging(lookback_period, LevelAging::FromStart)
    }

    pub fn with_aging(lookback_period: usize, aging: LevelAging) -> Self {
        assert!(lookback_period > 0, "lookback period must be > 0");
        Self {
            rows: Vec::new(),
            lookback_period,
            aging,
        }
    }

    pub fn lookback_period(&self) -> usize {
        self.lookback_period
    }

    /// 在确认 bar `confirmed_bar` 收录一个新检测到的极值点。
    pub fn open(&mut self, point: SwingPoint, confirmed_bar: usize) -> &Signal {
        debug!(
            kind = point.kind.as_str(),
            start_bar = point.bar_index,
            confirmed_bar,
            price = point.price,
            "signal created"
        );
        self.rows.push(Signal::new(
            point.kind,
            point.bar_index,
            confirmed_bar,
            point.price,
        ));
        let last = self.rows.len() - 1;
        &self.rows[last]
    }

    /// 先做突破检测，再按年龄淘汰。同一 bar 重复调用结果不变。
    pub fn on_bar(&mut self, bar_index: usize, bar: &Bar) -> LevelUpdate {
        let mut update = LevelUpdate::default();

        for signal in self.rows.iter_mut().filter(|x| x.is_open()) {
            if signal.is_breached_by(bar) {
                signal.end_bar = Some(bar_index);
                debug!(
                    kind = signal.kind.as_str(),
                    start_bar = signal.start_bar,
                    end_bar = bar_index,
                    price = signal.price,
                    "signal closed"
                );
                update.closed.push(signal.clone());
            }
        }

        let (aging, lookback) = (self.aging, self.lookback_period);
        let (kept, evicted): (Vec<_>, Vec<_>) = std::mem::take(&mut self.rows)
            .into_iter()
            .partition(|x| aging.age(x, bar_index) <= lookback);
        self.rows = kept;
        if !evicted.is_empty() {
            debug!(bar_index, count = evicted.len(), "signals evicted");
        }
        update.evicted = evicted;
        update
    }

    /// 按起点升序返回信号快照，`kind` 为空时返回全部。
    pub fn signals(&self, kind: Option<SwingKind>) -> Vec<Signal> {
        let mut out = self
            .rows
            .iter()
            .filter(|x| kind.is_none_or(|k| x.kind == k))
            .cloned()
            .collect::<Vec<_>>();
        out.sort_by_key(|x| x.start_bar);
        out
    }

    /// 与可见区间 `[first_bar, last_bar]` 相交的信号。
    ///
    /// 未关闭的信号只要起点不晚于 `last_bar` 就可见；已关闭的信号要求终点不早于 `first_bar`。
    pub fn visible(&self, first_bar: usize, last_bar: usize, hide_closed: bool) -> Vec<Signal> {
        self.signals(None)
            .into_iter()
            .filter(|x| match x.end_bar {
                None => x.start_bar <= last_bar,
                Some(end) => !hide_closed && end >= first_bar && x.start_bar <= last_bar,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
