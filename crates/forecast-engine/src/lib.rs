pub mod config;
pub mod features;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod scaler;
pub mod split;

pub use config::*;
pub use metrics::EvaluationMetrics;
pub use model::KernelRidge;
pub use pipeline::{ForecastEngine, ForecastResult, PriceDirection, PriceSummary};
pub use scaler::StandardScaler;
pub use split::{ChronologicalSplit, Partition, RandomSplit, SplitIndices, SplitStrategy};
