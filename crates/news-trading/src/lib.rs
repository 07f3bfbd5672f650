pub mod newsdata;
pub mod policy;

pub use newsdata::{NewsDataClient, NEWSDATA_URL};
pub use policy::{sentiment_impact, trade_signal, TradeThresholds};
