// ==========================================
// DIRBS 数据保留维护 - 分区领域模型
// ==========================================
// 红线: 一个叶子分区只能包含一个 (年, 月)
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 国家级月度三元组父表
pub const MONTHLY_NETWORK_TRIPLETS_COUNTRY: &str = "monthly_network_triplets_country";

/// 运营商级月度三元组父表（父表 → 运营商子表 → 月度孙表）
pub const MONTHLY_NETWORK_TRIPLETS_PER_MNO: &str = "monthly_network_triplets_per_mno";

// ==========================================
// YearMonth - 分区身份
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// 该月第一天；月份非法时返回 None
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

// ==========================================
// PartitionIdentity - 叶子分区身份
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionIdentity {
    /// 空分区：无法推断月份，无条件可删除
    Empty,
    /// 由行内容推断出的唯一 (年, 月)
    Month(YearMonth),
}

// ==========================================
// LeafPartition - 叶子分区
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafPartition {
    pub table_name: String,
    /// 顶层父表（用于按父表汇总）
    pub root_table: String,
    pub identity: PartitionIdentity,
}

impl LeafPartition {
    pub fn is_empty(&self) -> bool {
        matches!(self.identity, PartitionIdentity::Empty)
    }
}

// ==========================================
// PartitionedTable - 分区父表及嵌套层数
// ==========================================
// levels = 父表到叶子的层数：
// - monthly_network_triplets_country: 1（父表 → 月度分区）
// - monthly_network_triplets_per_mno: 2（父表 → 运营商 → 月度分区）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionedTable {
    pub name: String,
    pub levels: usize,
}

impl PartitionedTable {
    pub fn new(name: &str, levels: usize) -> Self {
        Self {
            name: name.to_string(),
            levels,
        }
    }

    /// 月度三元组的两张父表（按处理顺序）
    pub fn monthly_network_triplets() -> Vec<PartitionedTable> {
        vec![
            Self::new(MONTHLY_NETWORK_TRIPLETS_COUNTRY, 1),
            Self::new(MONTHLY_NETWORK_TRIPLETS_PER_MNO, 2),
        ]
    }
}
