// ==========================================
// DIRBS 数据保留维护 - 分片表重建
// ==========================================
// 保留谓词:
//   (end_date IS NULL OR end_date > cutoff) AND cond_name 以某个启用标签开头
// 诊断计数（重建前，两者可能重叠，不可相加）:
// - end_date < cutoff 的行
// - cond_name 不属于任何启用标签的行
// 红线: 重建前后物理分片数必须一致
// ==========================================

use crate::common::sql_builder::{Identifier, SqlFilter};
use crate::db::role_scope::RoleScope;
use crate::domain::classification::{ActiveConditionSet, ShardCount};
use crate::engine::error::{PruneError, PruneResult};
use crate::repository::classification_state_repo::{ClassificationStateRepository, PhysicalShard};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

const END_DATE_COLUMN: &str = "end_date";
const COND_NAME_COLUMN: &str = "cond_name";

/// 构造保留谓词
///
/// 条件集合为空时谓词恒假，重建后表为空
pub fn retention_filter(
    cutoff: NaiveDate,
    conditions: &ActiveConditionSet,
) -> PruneResult<SqlFilter> {
    let end_date = Identifier::new(END_DATE_COLUMN)?;
    let cond_name = Identifier::new(COND_NAME_COLUMN)?;
    Ok(SqlFilter::null_or_after(&end_date, cutoff)
        .and(SqlFilter::starts_with_any(&cond_name, conditions.labels())))
}

/// 重建前的诊断计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RebuildDiagnostics {
    pub rows_out_of_window: u64,
    pub rows_orphaned_condition: u64,
}

/// 重建结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildOutcome {
    pub shard_count: u32,
    pub diagnostics: RebuildDiagnostics,
    pub shard_tables: Vec<String>,
}

pub struct ShardedTableRebuilder<'conn> {
    repo: ClassificationStateRepository<'conn>,
}

impl<'conn> ShardedTableRebuilder<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            repo: ClassificationStateRepository::new(conn),
        }
    }

    /// 统计将被移除的行（仅用于日志与审计）
    pub fn diagnose(
        &self,
        cutoff: NaiveDate,
        conditions: &ActiveConditionSet,
    ) -> PruneResult<RebuildDiagnostics> {
        let end_date = Identifier::new(END_DATE_COLUMN)?;
        let cond_name = Identifier::new(COND_NAME_COLUMN)?;

        let rows_out_of_window = self
            .repo
            .count_where(Some(SqlFilter::before(&end_date, cutoff)))?;
        let rows_orphaned_condition = self
            .repo
            .count_where(Some(SqlFilter::starts_with_any(&cond_name, conditions.labels()).not()))?;

        tracing::info!(
            rows_out_of_window,
            cutoff = %cutoff,
            "classification_state 中 end_date 早于 cutoff 的行"
        );
        tracing::info!(
            rows_orphaned_condition,
            conditions = ?conditions.labels(),
            "classification_state 中条件已不再启用的行"
        );

        Ok(RebuildDiagnostics {
            rows_out_of_window,
            rows_orphaned_condition,
        })
    }

    /// 按保留谓词重建 classification_state
    ///
    /// # 流程
    /// 1. 读取物理分片数并统计诊断信息
    /// 2. 单事务内复制、切换分片
    /// 3. 重新读取分片数，与重建前比较
    pub fn rebuild(
        &self,
        scope: &RoleScope<'_>,
        cutoff: NaiveDate,
        conditions: &ActiveConditionSet,
    ) -> PruneResult<RebuildOutcome> {
        let before: ShardCount = self.repo.num_physical_shards()?;
        let diagnostics = self.diagnose(cutoff, conditions)?;

        if conditions.is_empty() {
            tracing::warn!("没有启用的条件，classification_state 将被清空");
        }

        let filter = retention_filter(cutoff, conditions)?;
        let shards: Vec<PhysicalShard> = self.repo.repartition_with_filter(scope, before, &filter)?;

        let after = self.repo.num_physical_shards()?;
        let on_disk = self.repo.count_shard_tables()?;
        if after != before || on_disk != before.get() {
            return Err(PruneError::ShardCountMismatch {
                before: before.get(),
                after: if after != before { after.get() } else { on_disk },
            });
        }

        tracing::info!(shards = before.get(), "classification_state 重建完成");
        Ok(RebuildOutcome {
            shard_count: before.get(),
            diagnostics,
            shard_tables: shards.into_iter().map(|s| s.table_name).collect(),
        })
    }
}
