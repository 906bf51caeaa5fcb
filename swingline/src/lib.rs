pub mod bar;
pub mod config;
pub mod constant;
pub mod engine;
pub mod events;
pub mod export;
pub mod logging;
pub mod period_manager;
pub mod receiver;
pub mod signal;
pub mod source;
pub mod swing;

pub use bar::{AggregatedPeriod, Bar};
pub use config::{SwingConfig, SwingConfigLoader, SwingConfigPatch, chart_interval_secs};
pub use constant::{
	AggregationTimeframe, ConfigError, Const, DataError, EventType, SwingKind, SwingPolicy,
};
pub use engine::SwingEngine;
pub use events::{EventPayload, Observable, Subscriber};
pub use export::{
	SignalRecord, periods_dataframe, signals_dataframe, signals_to_json, write_parquet,
};
pub use logging::{init_logging, init_logging_with_level};
pub use period_manager::PeriodManager;
pub use receiver::{load_bars_csv, parse_datetime};
pub use signal::{LevelAging, LevelTracker, LevelUpdate, Signal, SignalState};
pub use source::{BarSeries, CandleSource};
pub use swing::{PriceExtremes, SwingClass, SwingDetector, SwingPoint, classify};
