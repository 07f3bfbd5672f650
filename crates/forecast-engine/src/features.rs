use analysis_core::PriceBar;
use chrono::NaiveDate;
use technical_analysis::{compute_indicators, FillPolicy};

use crate::config::FeatureSet;

const BASIC_COLUMNS: [&str; 6] = ["open", "high", "low", "close", "volume", "sentiment"];
const INDICATOR_COLUMNS: [&str; 9] = [
    "sma_5", "sma_20", "rsi_14", "macd", "macd_signal", "bb_middle", "bb_upper", "bb_lower", "volume_ma_20",
];

/// Model inputs, one row per date, oldest first
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    pub dates: Vec<NaiveDate>,
    pub closes: Vec<f64>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureFrame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub fn feature_names(set: FeatureSet) -> Vec<&'static str> {
    match set {
        FeatureSet::Basic => BASIC_COLUMNS.to_vec(),
        FeatureSet::WithIndicators => BASIC_COLUMNS.iter().chain(INDICATOR_COLUMNS.iter()).copied().collect(),
    }
}

/// Replace non-finite fields with the last finite value of the same field.
///
/// Leading bars with a field that has nothing to carry forward are dropped.
pub fn forward_fill(bars: &[PriceBar]) -> Vec<PriceBar> {
    let mut last: [Option<f64>; 5] = [None; 5];
    let mut filled = Vec::with_capacity(bars.len());

    for bar in bars {
        if bar.is_finite() {
            last = [bar.open, bar.high, bar.low, bar.close, bar.volume].map(Some);
            filled.push(bar.clone());
            continue;
        }

        let mut fields = [bar.open, bar.high, bar.low, bar.close, bar.volume];
        for (value, carried) in fields.iter_mut().zip(last.iter_mut()) {
            if value.is_finite() {
                *carried = Some(*value);
            } else if let Some(prev) = *carried {
                *value = prev;
            }
        }

        if fields.iter().all(|v| v.is_finite()) {
            let [open, high, low, close, volume] = fields;
            filled.push(PriceBar { date: bar.date, open, high, low, close, volume });
        }
    }

    filled
}

/// Build one feature row per bar with the sentiment scalar broadcast into every row.
///
/// With indicator columns, rows whose lookback is incomplete follow `policy`,
/// so the frame can be shorter than the input.
pub fn build_features(bars: &[PriceBar], sentiment: f64, set: FeatureSet, policy: FillPolicy) -> FeatureFrame {
    match set {
        FeatureSet::Basic => FeatureFrame {
            dates: bars.iter().map(|b| b.date).collect(),
            closes: bars.iter().map(|b| b.close).collect(),
            rows: bars
                .iter()
                .map(|b| vec![b.open, b.high, b.low, b.close, b.volume, sentiment])
                .collect(),
        },
        FeatureSet::WithIndicators => {
            let rows = compute_indicators(bars, policy);
            FeatureFrame {
                dates: rows.iter().map(|r| r.date).collect(),
                closes: rows.iter().map(|r| r.close).collect(),
                rows: rows
                    .iter()
                    .map(|r| {
                        let mut row = vec![r.open, r.high, r.low, r.close, r.volume, sentiment];
                        row.extend_from_slice(&r.feature_columns());
                        row
                    })
                    .collect(),
            }
        }
    }
}

/// `target[t] = close[t + horizon]` for every row that has one
pub fn build_targets(closes: &[f64], horizon: usize) -> Vec<f64> {
    if closes.len() <= horizon {
        return vec![];
    }
    closes[horizon..].to_vec()
}
