//! 引擎事件通知：周期开启、信号创建/关闭/淘汰、参数重算。

use std::collections::HashMap;
use std::sync::Arc;

use crate::constant::{EventType, SwingKind};
use crate::signal::Signal;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPayload {
    pub bar_index: usize,
    pub kind: Option<SwingKind>,
    pub price: Option<f64>,
    /// 信号起点，仅信号类事件有值。
    pub start_bar: Option<usize>,
}

impl EventPayload {
    pub fn at_bar(bar_index: usize) -> Self {
        Self {
            bar_index,
            ..Self::default()
        }
    }

    pub fn for_signal(bar_index: usize, signal: &Signal) -> Self {
        Self {
            bar_index,
            kind: Some(signal.kind()),
            price: Some(signal.price()),
            start_bar: Some(signal.start_bar()),
        }
    }
}

pub type Subscriber = Arc<dyn Fn(EventType, &EventPayload) + Send + Sync>;

#[derive(Default)]
pub struct Observable {
    by_type: HashMap<EventType, Vec<Subscriber>>,
    catch_all: Vec<Subscriber>,
}

impl Observable {
    /// `event_type` 为空时订阅全部事件。
    pub fn subscribe(&mut self, event_type: Option<EventType>, subscriber: Subscriber) {
        match event_type {
            Some(event_type) => self.by_type.entry(event_type).or_default().push(subscriber),
            None => self.catch_all.push(subscriber),
        }
    }

    pub fn notify(&self, event_type: EventType, payload: EventPayload) {
        let targeted = self.by_type.get(&event_type).into_iter().flatten();
        for subscriber in targeted.chain(&self.catch_all) {
            subscriber(event_type, &payload);
        }
    }

    pub fn notify_signals<'a>(
        &self,
        event_type: EventType,
        bar_index: usize,
        signals: impl IntoIterator<Item = &'a Signal>,
    ) {
        if self.is_empty() {
            return;
        }
        for signal in signals {
            self.notify(event_type, EventPayload::for_signal(bar_index, signal));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty() && self.catch_all.is_empty()
    }
}
