// ==========================================
// DIRBS 数据保留维护 - 分区裁剪
// ==========================================
// 决策规则（纯函数，便于独立测试）:
// - 空分区: 无条件删除，并记录告警
// - 首日早于 cutoff: 删除
// - 其余（含首日等于 cutoff）: 保留
// ==========================================

use crate::db::role_scope::RoleScope;
use crate::domain::partition::{LeafPartition, PartitionIdentity};
use crate::engine::error::PruneResult;
use crate::repository::partition_catalog_repo::PartitionCatalogRepository;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

/// 单个叶子的裁剪决策
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PruneDecision {
    DropEmpty,
    DropExpired,
    Keep,
}

/// 根据身份与 cutoff 决定叶子去留
///
/// # 示例
/// ```
/// use chrono::NaiveDate;
/// use dirbs_prune::domain::{LeafPartition, PartitionIdentity, YearMonth};
/// use dirbs_prune::engine::{decide, PruneDecision};
///
/// let leaf = LeafPartition {
///     table_name: "t_2017_05".to_string(),
///     root_table: "t".to_string(),
///     identity: PartitionIdentity::Month(YearMonth::new(2017, 5)),
/// };
/// let cutoff = NaiveDate::from_ymd_opt(2017, 6, 1).unwrap();
/// assert_eq!(decide(&leaf, cutoff), PruneDecision::DropExpired);
/// ```
pub fn decide(leaf: &LeafPartition, cutoff: NaiveDate) -> PruneDecision {
    match leaf.identity {
        PartitionIdentity::Empty => PruneDecision::DropEmpty,
        PartitionIdentity::Month(ym) => match ym.first_day() {
            Some(first) if first < cutoff => PruneDecision::DropExpired,
            Some(_) => PruneDecision::Keep,
            // 盘点阶段已拒绝非法月份
            None => PruneDecision::Keep,
        },
    }
}

/// 裁剪结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionPruneOutcome {
    /// 已删除的叶子（含空分区）
    pub dropped_partitions: Vec<String>,
    /// 其中的空分区
    pub empty_partitions_dropped: Vec<String>,
    pub kept_partitions: Vec<String>,
    /// 被删除叶子在删除前的行数之和
    pub rows_pruned: u64,
}

pub struct PartitionPruner<'conn> {
    catalog: PartitionCatalogRepository<'conn>,
}

impl<'conn> PartitionPruner<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            catalog: PartitionCatalogRepository::new(conn),
        }
    }

    /// 按决策删除叶子分区
    ///
    /// # 前置条件
    /// - leaves 来自完整的盘点（所有叶子身份均已确认）
    /// - scope 持有具备删除权限的角色
    pub fn prune(
        &self,
        scope: &RoleScope<'_>,
        leaves: &[LeafPartition],
        cutoff: NaiveDate,
    ) -> PruneResult<PartitionPruneOutcome> {
        let mut outcome = PartitionPruneOutcome::default();

        for leaf in leaves {
            match decide(leaf, cutoff) {
                PruneDecision::Keep => {
                    tracing::debug!(table = %leaf.table_name, "分区在保留窗口内");
                    outcome.kept_partitions.push(leaf.table_name.clone());
                }
                PruneDecision::DropEmpty => {
                    tracing::warn!(
                        table = %leaf.table_name,
                        parent = %leaf.root_table,
                        "分区为空，无法推断月份，直接删除"
                    );
                    self.catalog.drop_partition_cascade(scope, &leaf.table_name)?;
                    outcome.empty_partitions_dropped.push(leaf.table_name.clone());
                    outcome.dropped_partitions.push(leaf.table_name.clone());
                }
                PruneDecision::DropExpired => {
                    let rows = self.catalog.count_rows(&leaf.table_name)?;
                    tracing::info!(
                        table = %leaf.table_name,
                        rows,
                        cutoff = %cutoff,
                        "删除过期分区"
                    );
                    self.catalog.drop_partition_cascade(scope, &leaf.table_name)?;
                    outcome.rows_pruned = outcome.rows_pruned.saturating_add(rows);
                    outcome.dropped_partitions.push(leaf.table_name.clone());
                }
            }
        }

        Ok(outcome)
    }
}
