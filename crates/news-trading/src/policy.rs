use analysis_core::{round_to, TradeSignal};
use serde::{Deserialize, Serialize};

/// Scale from an aggregate sentiment score to the displayed impact figure
pub const IMPACT_SCALE: f64 = 10.0;

/// Cut-offs used by [`trade_signal`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeThresholds {
    /// Sentiment must exceed this to buy, or be below its negative to sell
    pub sentiment: f64,
    /// No buying at or above this RSI
    pub overbought: f64,
    /// No selling at or below this RSI
    pub oversold: f64,
}

impl Default for TradeThresholds {
    fn default() -> Self {
        Self {
            sentiment: 0.05,
            overbought: 70.0,
            oversold: 30.0,
        }
    }
}

impl TradeThresholds {
    pub fn signal(&self, sentiment: f64, rsi: f64, owned: bool) -> TradeSignal {
        if sentiment > self.sentiment && rsi < self.overbought {
            TradeSignal::Buy
        } else if sentiment < -self.sentiment && rsi > self.oversold {
            if owned {
                TradeSignal::Sell
            } else {
                TradeSignal::Avoid
            }
        } else if owned {
            TradeSignal::Hold
        } else {
            TradeSignal::NoAction
        }
    }
}

/// Map sentiment, momentum and ownership to an action.
///
/// Total over all inputs: a NaN sentiment or RSI fails both entry conditions
/// and lands on Hold or NoAction.
pub fn trade_signal(sentiment: f64, rsi: f64, owned: bool) -> TradeSignal {
    TradeThresholds::default().signal(sentiment, rsi, owned)
}

/// Impact figure shown next to a trade signal: `sentiment * 10`, 2 places
pub fn sentiment_impact(sentiment: f64) -> f64 {
    round_to(sentiment * IMPACT_SCALE, 2)
}
