//! 聚合周期与信号的列式快照导出。

use std::fs::File;
use std::path::Path;

use polars::df;
use polars::prelude::{DataFrame, ParquetWriter};
use serde::Serialize;

use crate::bar::AggregatedPeriod;
use crate::constant::{DataError, SwingKind};
use crate::signal::Signal;

pub fn periods_dataframe(rows: &[AggregatedPeriod]) -> Result<DataFrame, DataError> {
    let df = df!(
        "start_bar" => rows.iter().map(|x| x.start_bar() as u64).collect::<Vec<_>>(),
        "end_bar" => rows.iter().map(|x| x.end_bar() as u64).collect::<Vec<_>>(),
        "start_time" => rows.iter().map(|x| x.start_time().timestamp_millis()).collect::<Vec<_>>(),
        "end_time" => rows.iter().map(|x| x.end_time().timestamp_millis()).collect::<Vec<_>>(),
        "open_price" => rows.iter().map(|x| x.open_price()).collect::<Vec<_>>(),
        "high_price" => rows.iter().map(|x| x.high_price()).collect::<Vec<_>>(),
        "low_price" => rows.iter().map(|x| x.low_price()).collect::<Vec<_>>(),
        "close_price" => rows.iter().map(|x| x.close_price()).collect::<Vec<_>>(),
        "volume" => rows.iter().map(|x| x.volume()).collect::<Vec<_>>(),
        "high_bar" => rows.iter().map(|x| x.high_bar() as u64).collect::<Vec<_>>(),
        "low_bar" => rows.iter().map(|x| x.low_bar() as u64).collect::<Vec<_>>(),
        "sealed" => rows.iter().map(|x| x.is_sealed()).collect::<Vec<_>>()
    )?;
    Ok(df)
}

pub fn signals_dataframe(rows: &[Signal]) -> Result<DataFrame, DataError> {
    let df = df!(
        "kind" => rows.iter().map(|x| x.kind().as_str()).collect::<Vec<_>>(),
        "start_bar" => rows.iter().map(|x| x.start_bar() as u64).collect::<Vec<_>>(),
        "confirmed_bar" => rows.iter().map(|x| x.confirmed_bar() as u64).collect::<Vec<_>>(),
        "end_bar" => rows.iter().map(|x| x.end_bar().map(|v| v as u64)).collect::<Vec<_>>(),
        "price" => rows.iter().map(|x| x.price()).collect::<Vec<_>>()
    )?;
    Ok(df)
}

pub fn write_parquet(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<(), DataError> {
    let mut file = File::create(path)?;
    ParquetWriter::new(&mut file).finish(df)?;
    Ok(())
}

/// JSON 输出用的信号记录。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalRecord {
    pub kind: SwingKind,
    pub start_bar: usize,
    pub confirmed_bar: usize,
    pub end_bar: Option<usize>,
    pub price: f64,
    pub open: bool,
}

impl From<&Signal> for SignalRecord {
    fn from(value: &Signal) -> Self {
        Self {
            kind: value.kind(),
            start_bar: value.start_bar(),
            confirmed_bar: value.confirmed_bar(),
            end_bar: value.end_bar(),
            price: value.price(),
            open: value.is_open(),
        }
    }
}

pub fn signals_to_json(rows: &[Signal]) -> Result<String, DataError> {
    let records = rows.iter().map(SignalRecord::from).collect::<Vec<_>>();
    Ok(serde_json::to_string_pretty(&records)?)
}
