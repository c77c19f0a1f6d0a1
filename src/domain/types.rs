// ==========================================
// DIRBS 数据保留维护 - 领域类型定义
// ==========================================
// 保留策略: 只保存保留月数，截止日期按运行日期派生，不落库
// ==========================================

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 保留策略非法
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("保留月数必须为非负整数，实际为 {0}")]
pub struct InvalidRetentionPolicy(pub i64);

// ==========================================
// RetentionPolicy - 保留策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    months_retention: u32,
}

impl RetentionPolicy {
    pub fn new(months_retention: u32) -> Self {
        Self { months_retention }
    }

    /// 从配置中的原始整数构造，拒绝负数
    pub fn try_from_months(months: i64) -> Result<Self, InvalidRetentionPolicy> {
        u32::try_from(months)
            .map(Self::new)
            .map_err(|_| InvalidRetentionPolicy(months))
    }

    pub fn months_retention(&self) -> u32 {
        self.months_retention
    }
}
