use analysis_core::{AnalysisError, PriceBar};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::indicators::{bollinger_bands, ema, macd, obv, rsi, sma};

pub const SMA_SHORT_PERIOD: usize = 5;
pub const SMA_LONG_PERIOD: usize = 20;
pub const EMA_PERIOD: usize = 20;
pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_STD_DEV: f64 = 2.0;
pub const VOLUME_MA_PERIOD: usize = 20;

/// Rows needed before every indicator column is defined
pub const WARMUP_ROWS: usize = SMA_LONG_PERIOD;

/// What to do with rows whose lookback window is not yet full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillPolicy {
    /// Remove the row
    #[default]
    Drop,
    /// Keep the row with 0.0 in the undefined columns
    Zero,
}

impl std::str::FromStr for FillPolicy {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(FillPolicy::Drop),
            "zero" | "fill" => Ok(FillPolicy::Zero),
            other => Err(AnalysisError::Configuration(format!(
                "unknown indicator fill policy '{}', expected drop or zero",
                other
            ))),
        }
    }
}

/// Price bar extended with derived indicator columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub sma_5: f64,
    pub sma_20: f64,
    pub ema_20: f64,
    pub rsi_14: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    pub volume_ma_20: f64,
    pub obv: f64,
}

impl IndicatorRow {
    /// Indicator columns used as extra model features, in a fixed order
    pub fn feature_columns(&self) -> [f64; 9] {
        [
            self.sma_5,
            self.sma_20,
            self.rsi_14,
            self.macd,
            self.macd_signal,
            self.bb_middle,
            self.bb_upper,
            self.bb_lower,
            self.volume_ma_20,
        ]
    }
}

/// Left-pad a trailing-window series so index `i` lines up with bar `i`.
fn align(values: Vec<f64>, len: usize) -> Vec<Option<f64>> {
    let pad = len.saturating_sub(values.len());
    std::iter::repeat(None)
        .take(pad)
        .chain(values.into_iter().map(|v| v.is_finite().then_some(v)))
        .collect()
}

/// Derive every indicator column for an ordered bar history.
///
/// Moving-window columns are undefined for the first `W - 1` rows of a window of
/// size `W` (RSI for the first 14). Those rows are dropped or zero-filled per
/// `policy`, and so is any row where an indicator came out non-finite. Empty input
/// gives empty output.
pub fn compute_indicators(bars: &[PriceBar], policy: FillPolicy) -> Vec<IndicatorRow> {
    let len = bars.len();
    if len == 0 {
        return vec![];
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    let sma_5 = align(sma(&closes, SMA_SHORT_PERIOD), len);
    let sma_20 = align(sma(&closes, SMA_LONG_PERIOD), len);
    let ema_20 = align(ema(&closes, EMA_PERIOD), len);
    let rsi_14 = align(rsi(&closes, RSI_PERIOD), len);
    let macd_result = macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
    let macd_line = align(macd_result.macd_line, len);
    let signal_line = align(macd_result.signal_line, len);
    let bands = bollinger_bands(&closes, BOLLINGER_PERIOD, BOLLINGER_STD_DEV);
    let bb_upper = align(bands.upper, len);
    let bb_middle = align(bands.middle, len);
    let bb_lower = align(bands.lower, len);
    let volume_ma = align(sma(&volumes, VOLUME_MA_PERIOD), len);
    let obv_values = align(obv(bars), len);

    let mut rows = Vec::with_capacity(len);

    for (i, bar) in bars.iter().enumerate() {
        let columns = [
            sma_5[i],
            sma_20[i],
            ema_20[i],
            rsi_14[i],
            macd_line[i],
            signal_line[i],
            bb_upper[i],
            bb_middle[i],
            bb_lower[i],
            volume_ma[i],
            obv_values[i],
        ];

        if policy == FillPolicy::Drop && columns.iter().any(Option::is_none) {
            continue;
        }

        let [sma_5, sma_20, ema_20, rsi_14, macd, macd_signal, bb_upper, bb_middle, bb_lower, volume_ma_20, obv] =
            columns.map(|c| c.unwrap_or(0.0));

        rows.push(IndicatorRow {
            date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            sma_5,
            sma_20,
            ema_20,
            rsi_14,
            macd,
            macd_signal,
            bb_upper,
            bb_middle,
            bb_lower,
            volume_ma_20,
            obv,
        });
    }

    rows
}

/// Most recent fully-derived row, if the history is long enough to have one
pub fn latest_indicators(bars: &[PriceBar]) -> Option<IndicatorRow> {
    compute_indicators(bars, FillPolicy::Drop).pop()
}
