//! Feature pipeline: per-stock stages followed by aggregation

pub mod aggregate;
pub mod engine;
pub mod factors_drawdown;
pub mod factors_momentum;
pub mod factors_returns;
pub mod factors_risk;
pub mod factors_technical;
pub mod factors_volatility;
pub mod factors_volume;
pub mod rolling;

pub use aggregate::Aggregator;
pub use engine::{group_records, Pipeline, PipelineOutput, RunSummary, Stage, StageOutput};
pub use factors_drawdown::{DaysFromPeak, Drawdown, DrawdownStage};
pub use factors_momentum::MomentumStage;
pub use factors_returns::{DailyReturns, LogReturns, ReturnsStage};
pub use factors_risk::RiskStage;
pub use factors_technical::{TechnicalStage, MACD, RSI};
pub use factors_volatility::VolatilityStage;
pub use factors_volume::{AmihudIlliquidity, LiquidityStage};

/// The standard stages, returns first
pub fn default_stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(ReturnsStage),
        Box::new(VolatilityStage),
        Box::new(RiskStage),
        Box::new(TechnicalStage),
        Box::new(LiquidityStage),
        Box::new(MomentumStage),
        Box::new(DrawdownStage),
    ]
}
