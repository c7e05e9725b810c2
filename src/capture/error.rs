use std::fmt;

use super::Strategy;

/// 图片提取失败。
///
/// 单个策略失败只是链中的一环，会继续尝试下一个策略；
/// 全部策略失败时汇总为 `AllStrategiesFailed`。
#[derive(Debug, thiserror::Error)]
pub enum ExtractionFailure {
    #[error("策略 {strategy} 失败: {reason}")]
    StrategyFailed { strategy: Strategy, reason: String },

    #[error("所有提取策略均失败 ({})", AttemptList(.0))]
    AllStrategiesFailed(Vec<ExtractionFailure>),
}

impl ExtractionFailure {
    pub fn strategy_failed(strategy: Strategy, reason: impl Into<String>) -> Self {
        Self::StrategyFailed {
            strategy,
            reason: reason.into(),
        }
    }

    /// 失败策略的名称列表，按尝试顺序。
    pub fn failed_strategies(&self) -> Vec<Strategy> {
        match self {
            Self::StrategyFailed { strategy, .. } => vec![*strategy],
            Self::AllStrategiesFailed(attempts) => attempts
                .iter()
                .flat_map(ExtractionFailure::failed_strategies)
                .collect(),
        }
    }
}

struct AttemptList<'a>(&'a [ExtractionFailure]);

impl fmt::Display for AttemptList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("没有可用的策略");
        }
        for (i, attempt) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", attempt)?;
        }
        Ok(())
    }
}
