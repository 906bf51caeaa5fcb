//! 摆动高低点指标的参数配置。
//!
//! - `SwingConfig`：引擎实际使用的完整参数；
//! - `SwingConfigPatch`：可部分覆盖默认值的配置文件格式；
//! - `chart_interval_secs`：根据宿主图表描述推断单根 K 线的秒数。

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::constant::{AggregationTimeframe, ConfigError, Const, DataError, SwingPolicy};

#[derive(Debug, Clone, PartialEq)]
pub struct SwingConfig {
    pub swing_period: usize,
    pub lookback_period: usize,
    pub timeframe: AggregationTimeframe,
    pub policy: SwingPolicy,
    pub hide_closed: bool,
    /// 宿主图表单根 K 线的秒数，`None` 表示非时间图表或未知。
    pub chart_interval_secs: Option<u32>,
}

impl Default for SwingConfig {
    fn default() -> Self {
        Self {
            swing_period: 2,
            lookback_period: 100,
            timeframe: AggregationTimeframe::Chart,
            policy: SwingPolicy::Independent,
            hide_closed: false,
            chart_interval_secs: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SwingConfigPatch {
    pub swing_period: Option<i64>,
    pub lookback_period: Option<i64>,
    pub timeframe: Option<String>,
    pub policy: Option<SwingPolicy>,
    pub hide_closed: Option<bool>,
    pub chart_interval_secs: Option<u32>,
}

impl SwingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.swing_period == 0 {
            return Err(ConfigError::NonPositiveSwingPeriod(0));
        }
        if self.swing_period > Const::MAX_PERIOD {
            return Err(ConfigError::SwingPeriodTooLarge(self.swing_period));
        }
        if self.lookback_period == 0 {
            return Err(ConfigError::NonPositiveLookback(0));
        }
        if self.lookback_period > Const::MAX_PERIOD {
            return Err(ConfigError::LookbackTooLarge(self.lookback_period));
        }
        if self.chart_interval_secs == Some(0) {
            return Err(ConfigError::InvalidChartInterval("0".to_string()));
        }
        Ok(())
    }

    /// 图表周期比聚合周期还粗时，聚合没有意义。
    pub fn aggregation_enabled(&self) -> bool {
        if !self.timeframe.is_aggregated() {
            return false;
        }
        match self.chart_interval_secs {
            Some(secs) => secs <= self.timeframe.seconds(),
            None => true,
        }
    }

    pub fn apply_patch(mut self, patch: SwingConfigPatch) -> Result<Self, DataError> {
        if let Some(v) = patch.swing_period {
            self.swing_period = positive(v, ConfigError::NonPositiveSwingPeriod)?;
        }
        if let Some(v) = patch.lookback_period {
            self.lookback_period = positive(v, ConfigError::NonPositiveLookback)?;
        }
        if let Some(v) = patch.timeframe {
            self.timeframe = AggregationTimeframe::parse(&v)?;
        }
        if let Some(v) = patch.policy {
            self.policy = v;
        }
        if let Some(v) = patch.hide_closed {
            self.hide_closed = v;
        }
        if let Some(v) = patch.chart_interval_secs {
            self.chart_interval_secs = Some(v);
        }
        Ok(self)
    }
}

fn positive(value: i64, err: fn(i64) -> ConfigError) -> Result<usize, DataError> {
    if value <= 0 {
        return Err(DataError::InvalidConfig(err(value)));
    }
    Ok(value as usize)
}

pub struct SwingConfigLoader;

impl SwingConfigLoader {
    pub fn from_yaml_str(yaml: &str) -> Result<SwingConfig, DataError> {
        let patch: SwingConfigPatch = serde_yaml::from_str(yaml)?;
        SwingConfig::default().apply_patch(patch)
    }

    pub fn from_json_str(json: &str) -> Result<SwingConfig, DataError> {
        let patch: SwingConfigPatch = serde_json::from_str(json)?;
        SwingConfig::default().apply_patch(patch)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<SwingConfig, DataError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config = match path.extension().and_then(|x| x.to_str()) {
            Some("json") => Self::from_json_str(&text)?,
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text)?,
            _ => return Err(DataError::UnsupportedFormat(path.display().to_string())),
        };
        config.validate()?;
        Ok(config)
    }
}

/// 由宿主图表类型与周期标签推断单根 K 线秒数。
///
/// `chart_type` 取 `"TimeFrame"` 或 `"Seconds"`，其他类型（tick、range 等）返回 `None`。
pub fn chart_interval_secs(chart_type: &str, label: &str) -> Option<u32> {
    let label = label.trim();
    match chart_type {
        "Seconds" => match label {
            "5" => Some(5),
            "10" => Some(10),
            "15" => Some(15),
            "30" => Some(30),
            _ => trailing_number(label),
        },
        "TimeFrame" => {
            let fixed = match label {
                "M1" => Some(AggregationTimeframe::M1),
                "M5" => Some(AggregationTimeframe::M5),
                "M15" => Some(AggregationTimeframe::M15),
                "M30" => Some(AggregationTimeframe::M30),
                "H1" => Some(AggregationTimeframe::H1),
                "H4" => Some(AggregationTimeframe::H4),
                "Daily" => Some(AggregationTimeframe::Daily),
                _ => None,
            };
            if let Some(tf) = fixed {
                return Some(tf.seconds());
            }
            let count = trailing_number(label)?;
            if label.contains('M') {
                Some(60 * count)
            } else if label.contains('H') {
                Some(3600 * count)
            } else if label.contains('D') {
                Some(86_400 * count)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn trailing_number(label: &str) -> Option<u32> {
    let start = label
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    label[start..].parse::<u32>().ok().filter(|v| *v > 0)
}
