use std::path::Path;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::bar::Bar;
use crate::constant::DataError;

#[derive(Debug, Deserialize)]
struct CsvBarRow {
    datetime: String,
    #[serde(default)]
    end_datetime: Option<String>,
    #[serde(alias = "open")]
    open_price: f64,
    #[serde(alias = "high")]
    high_price: f64,
    #[serde(alias = "low")]
    low_price: f64,
    #[serde(alias = "close")]
    close_price: f64,
    #[serde(default)]
    volume: f64,
}

/// 从 CSV 读取 bar 序列并逐根校验。
///
/// 没有 `end_datetime` 列时，结束时间取下一根的开始时间；最后一根按中位间隔推算。
pub fn load_bars_csv(file_path: impl AsRef<Path>) -> Result<Vec<Bar>, DataError> {
    let mut reader = csv::Reader::from_path(file_path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize::<CsvBarRow>() {
        let row = row?;
        let start = parse_datetime(&row.datetime)?;
        let end = row
            .end_datetime
            .as_deref()
            .filter(|x| !x.trim().is_empty())
            .map(parse_datetime)
            .transpose()?;
        rows.push((start, end, row));
    }

    let starts = rows.iter().map(|(start, _, _)| *start).collect::<Vec<_>>();
    let fallback = median_spacing(&starts).unwrap_or_else(|| Duration::seconds(60));

    let mut bars = Vec::with_capacity(rows.len());
    for (index, (start, end, row)) in rows.into_iter().enumerate() {
        let end_time = end
            .or_else(|| starts.get(index + 1).copied())
            .unwrap_or(start + fallback);
        let bar = Bar {
            start_time: start,
            end_time,
            open_price: row.open_price,
            high_price: row.high_price,
            low_price: row.low_price,
            close_price: row.close_price,
            volume: row.volume,
        };
        bar.validate(index)?;
        bars.push(bar);
    }
    Ok(bars)
}

fn median_spacing(starts: &[DateTime<Utc>]) -> Option<Duration> {
    let mut gaps = starts
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .filter(|gap| *gap > Duration::zero())
        .collect::<Vec<_>>();
    if gaps.is_empty() {
        return None;
    }
    gaps.sort();
    Some(gaps[gaps.len() / 2])
}

pub fn parse_datetime(value: &str) -> Result<DateTime<Utc>, DataError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    let patterns = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y/%m/%d %H:%M:%S%.f",
        "%Y%m%d%H%M%S%.f",
    ];

    for pattern in patterns {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, pattern) {
            return Ok(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
        }
    }

    Err(DataError::InvalidDatetime(value.to_string()))
}
