use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwingKind {
    High,
    Low,
}

impl SwingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Low => "low",
        }
    }
}

/// 同一根 bar 同时满足高点与低点条件时的处理方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwingPolicy {
    /// 高点、低点各自独立判定，可同时产生两条信号。
    #[default]
    Independent,
    /// 高点优先，只有高点不成立时才判定低点。
    HighPriority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AggregationTimeframe {
    /// 不做聚合，直接在原始 K 线上检测。
    #[default]
    Chart,
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    Daily,
}

impl AggregationTimeframe {
    pub fn minutes(self) -> u32 {
        match self {
            Self::Chart => 0,
            Self::M1 => 1,
            Self::M5 => 5,
            Self::M15 => 15,
            Self::M30 => 30,
            Self::H1 => 60,
            Self::H4 => 240,
            Self::Daily => 1440,
        }
    }

    pub fn seconds(self) -> u32 {
        self.minutes() * 60
    }

    pub fn is_aggregated(self) -> bool {
        self != Self::Chart
    }

    /// 日线按交易时段切分，而不是按时钟对齐。
    pub fn is_session(self) -> bool {
        self == Self::Daily
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chart => "chart",
            Self::M1 => "1m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1h",
            Self::H4 => "4h",
            Self::Daily => "1d",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DataError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "chart" | "none" | "raw" => Ok(Self::Chart),
            "1m" | "m1" => Ok(Self::M1),
            "5m" | "m5" => Ok(Self::M5),
            "15m" | "m15" => Ok(Self::M15),
            "30m" | "m30" => Ok(Self::M30),
            "1h" | "h1" => Ok(Self::H1),
            "4h" | "h4" => Ok(Self::H4),
            "1d" | "d1" | "daily" => Ok(Self::Daily),
            _ => Err(DataError::InvalidTimeframe(value.to_string())),
        }
    }
}

pub struct Const;

impl Const {
    /// 聚合周期在扫描窗口之外额外保留的数量。
    pub const PERIOD_MARGIN: usize = 8;
    /// 摆动周期与回看长度的上限。
    pub const MAX_PERIOD: usize = 100_000;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    PeriodOpened,
    SignalCreated,
    SignalClosed,
    SignalEvicted,
    Recalculated,
}

#[derive(Debug)]
pub enum DataError {
    InvalidTimeframe(String),
    InvalidDatetime(String),
    InvalidBar { index: usize, reason: String },
    UnsupportedFormat(String),
    InvalidConfig(ConfigError),
    Io(std::io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
    Yaml(serde_yaml::Error),
    Polars(polars::error::PolarsError),
}

impl Display for DataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTimeframe(v) => write!(f, "invalid timeframe: {v}"),
            Self::InvalidDatetime(v) => write!(f, "invalid datetime: {v}"),
            Self::InvalidBar { index, reason } => write!(f, "invalid bar at {index}: {reason}"),
            Self::UnsupportedFormat(v) => write!(f, "unsupported file format: {v}"),
            Self::InvalidConfig(e) => write!(f, "invalid config: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Csv(e) => write!(f, "csv error: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
            Self::Yaml(e) => write!(f, "yaml error: {e}"),
            Self::Polars(e) => write!(f, "polars error: {e}"),
        }
    }
}

impl std::error::Error for DataError {}

impl From<ConfigError> for DataError {
    fn from(value: ConfigError) -> Self {
        Self::InvalidConfig(value)
    }
}

impl From<std::io::Error> for DataError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<csv::Error> for DataError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

impl From<serde_json::Error> for DataError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<serde_yaml::Error> for DataError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Yaml(value)
    }
}

impl From<polars::error::PolarsError> for DataError {
    fn from(value: polars::error::PolarsError) -> Self {
        Self::Polars(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    NonPositiveSwingPeriod(i64),
    NonPositiveLookback(i64),
    SwingPeriodTooLarge(usize),
    LookbackTooLarge(usize),
    InvalidChartInterval(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositiveSwingPeriod(v) => write!(f, "swing period must be positive, got {v}"),
            Self::NonPositiveLookback(v) => write!(f, "lookback period must be positive, got {v}"),
            Self::SwingPeriodTooLarge(v) => {
                write!(f, "swing period must not exceed {}, got {v}", Const::MAX_PERIOD)
            }
            Self::LookbackTooLarge(v) => {
                write!(f, "lookback period must not exceed {}, got {v}", Const::MAX_PERIOD)
            }
            Self::InvalidChartInterval(v) => write!(f, "invalid chart interval: {v}"),
        }
    }
}

impl std::error::Error for ConfigError {}
