// ==========================================
// DIRBS 数据保留维护 - 裁剪 API
// ==========================================
// 职责: 编排两类裁剪任务并记录运行审计
// 架构: API 层 → Engine 层 → Repository 层
// 流程（两类任务相同）:
// 1. 登记运行 → 计算 cutoff → 裁剪前计数
// 2. 进入角色作用域，执行破坏性操作，退出作用域
// 3. 裁剪后计数 → 写入审计 → 结束运行
// 红线: 任一步失败都要把运行标记为 error，且不掩盖原始错误
// ==========================================

use crate::api::error::ApiResult;
use crate::db::role_scope::{RoleScope, POWER_USER_ROLE};
use crate::domain::classification::ActiveConditionSet;
use crate::domain::job_metadata::JobStatus;
use crate::domain::partition::PartitionedTable;
use crate::domain::types::RetentionPolicy;
use crate::engine::{
    record_row_gauge, verify_conservation, PartitionInventory, PartitionPruneOutcome,
    PartitionPruner, RebuildOutcome, RetentionWindowCalculator, RowCountSnapshot,
    ShardedTableRebuilder, TableRowAccountant,
};
use crate::repository::classification_state_repo::CLASSIFICATION_STATE_TABLE;
use crate::repository::job_metadata_repo::JobMetadataRepository;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};

/// 审计记录中的命令名
pub const COMMAND: &str = "dirbs-prune";
pub const SUBCOMMAND_TRIPLETS: &str = "triplets";
pub const SUBCOMMAND_CLASSIFICATION_STATE: &str = "classification_state";

// ==========================================
// 请求 / 响应
// ==========================================

/// 月度三元组裁剪请求
#[derive(Debug, Clone)]
pub struct TripletPruneRequest {
    /// 运行日期；None 表示当天
    pub curr_date: Option<NaiveDate>,
    pub policy: RetentionPolicy,
    /// 按顺序处理的父表
    pub parents: Vec<PartitionedTable>,
}

impl TripletPruneRequest {
    /// 针对两张月度三元组父表的标准请求
    pub fn monthly_network_triplets(curr_date: Option<NaiveDate>, policy: RetentionPolicy) -> Self {
        Self {
            curr_date,
            policy,
            parents: PartitionedTable::monthly_network_triplets(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TripletPruneReport {
    pub run_id: String,
    pub cutoff: NaiveDate,
    pub rows_before: RowCountSnapshot,
    pub rows_after: RowCountSnapshot,
    pub outcome: PartitionPruneOutcome,
}

/// classification_state 裁剪请求
#[derive(Debug, Clone)]
pub struct ClassificationPruneRequest {
    pub curr_date: Option<NaiveDate>,
    pub policy: RetentionPolicy,
    pub active_conditions: ActiveConditionSet,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationPruneReport {
    pub run_id: String,
    pub cutoff: NaiveDate,
    pub rows_before: u64,
    pub rows_after: u64,
    pub rows_pruned: u64,
    pub rebuild: RebuildOutcome,
}

// ==========================================
// PruneApi - 裁剪 API
// ==========================================
pub struct PruneApi<'conn> {
    conn: &'conn Connection,
    /// 执行破坏性操作时切换到的角色
    role: String,
    /// 本次运行所用配置，写入审计的 config 键
    config_snapshot: Option<JsonValue>,
}

impl<'conn> PruneApi<'conn> {
    /// 使用默认的 power user 角色
    pub fn new(conn: &'conn Connection) -> Self {
        Self::with_role(conn, POWER_USER_ROLE)
    }

    pub fn with_role(conn: &'conn Connection, role: &str) -> Self {
        Self {
            conn,
            role: role.to_string(),
            config_snapshot: None,
        }
    }

    /// 附带配置快照，每次运行登记后写入审计
    pub fn with_config_snapshot(mut self, snapshot: JsonValue) -> Self {
        self.config_snapshot = Some(snapshot);
        self
    }

    /// 删除保留窗口之外的月度三元组分区
    ///
    /// # 参数
    /// - request: 运行日期、保留策略与待处理父表
    ///
    /// # 返回
    /// - Ok(TripletPruneReport): 裁剪前后计数及删除明细
    /// - Err(ApiError): 任一步骤失败；审计记录已标记为 error
    ///
    /// # 说明
    /// 所有叶子在任何删除之前完成盘点，一旦发现跨月分区即整体中止
    pub fn prune_historical_partitions(
        &self,
        request: &TripletPruneRequest,
    ) -> ApiResult<TripletPruneReport> {
        let jobs = JobMetadataRepository::new(self.conn);
        let run_id = jobs.start(COMMAND, Some(SUBCOMMAND_TRIPLETS))?;
        tracing::info!(run_id = %run_id, "开始裁剪月度三元组分区");

        let result = self
            .record_config(&jobs, &run_id)
            .and_then(|_| self.run_triplet_prune(&jobs, &run_id, request));
        finish_job(&jobs, &run_id, result)
    }

    /// 按保留窗口与启用条件重建 classification_state
    ///
    /// # 参数
    /// - request: 运行日期、保留策略与启用条件
    ///
    /// # 返回
    /// - Ok(ClassificationPruneReport): 裁剪前后计数、诊断计数与分片表
    /// - Err(ApiError): 任一步骤失败；审计记录已标记为 error
    pub fn prune_stale_classification_state(
        &self,
        request: &ClassificationPruneRequest,
    ) -> ApiResult<ClassificationPruneReport> {
        let jobs = JobMetadataRepository::new(self.conn);
        let run_id = jobs.start(COMMAND, Some(SUBCOMMAND_CLASSIFICATION_STATE))?;
        tracing::info!(run_id = %run_id, "开始裁剪 classification_state");

        let result = self
            .record_config(&jobs, &run_id)
            .and_then(|_| self.run_classification_prune(&jobs, &run_id, request));
        finish_job(&jobs, &run_id, result)
    }

    // ==========================================
    // 内部流程
    // ==========================================

    fn record_config(&self, jobs: &JobMetadataRepository<'_>, run_id: &str) -> ApiResult<()> {
        if let Some(snapshot) = &self.config_snapshot {
            jobs.add_optional_metadata(run_id, json!({ "config": snapshot }))?;
        }
        Ok(())
    }

    fn run_triplet_prune(
        &self,
        jobs: &JobMetadataRepository<'_>,
        run_id: &str,
        request: &TripletPruneRequest,
    ) -> ApiResult<TripletPruneReport> {
        let cutoff = RetentionWindowCalculator::cutoff(request.curr_date, request.policy)?;
        let parent_names: Vec<&str> = request.parents.iter().map(|p| p.name.as_str()).collect();
        jobs.add_optional_metadata(
            run_id,
            json!({
                "curr_date": request.curr_date.map(|d| d.to_string()),
                "retention_months": request.policy.months_retention(),
                "cutoff": cutoff.to_string(),
                "parents": parent_names,
            }),
        )?;
        tracing::info!(
            cutoff = %cutoff,
            retention_months = request.policy.months_retention(),
            "保留窗口"
        );

        let accountant = TableRowAccountant::new(self.conn);
        let rows_before = accountant.snapshot_partitioned(&request.parents, "rows_before")?;

        let leaves = PartitionInventory::new(self.conn).take_inventory(&request.parents)?;

        let scope = RoleScope::enter(self.conn, &self.role)?;
        let outcome = PartitionPruner::new(self.conn).prune(&scope, &leaves, cutoff)?;
        scope.exit()?;

        let rows_after = accountant.snapshot_partitioned(&request.parents, "rows_after")?;

        jobs.add_optional_metadata(
            run_id,
            json!({
                "rows_before": rows_before.counts,
                "rows_after": rows_after.counts,
                "rows_pruned": outcome.rows_pruned,
                "dropped_partitions": outcome.dropped_partitions,
                "empty_partitions_dropped": outcome.empty_partitions_dropped,
            }),
        )?;

        verify_conservation(rows_before.total(), rows_after.total(), outcome.rows_pruned)?;

        for parent in &request.parents {
            let before = rows_before.get(&parent.name).unwrap_or(0);
            let after = rows_after.get(&parent.name).unwrap_or(0);
            record_row_gauge("rows_pruned", &parent.name, before.saturating_sub(after));
            tracing::info!(
                table = %parent.name,
                rows_pruned = before.saturating_sub(after),
                rows_remaining = after,
                "父表裁剪完成"
            );
        }

        Ok(TripletPruneReport {
            run_id: run_id.to_string(),
            cutoff,
            rows_before,
            rows_after,
            outcome,
        })
    }

    fn run_classification_prune(
        &self,
        jobs: &JobMetadataRepository<'_>,
        run_id: &str,
        request: &ClassificationPruneRequest,
    ) -> ApiResult<ClassificationPruneReport> {
        let cutoff = RetentionWindowCalculator::cutoff(request.curr_date, request.policy)?;
        jobs.add_optional_metadata(
            run_id,
            json!({
                "curr_date": request.curr_date.map(|d| d.to_string()),
                "retention_months": request.policy.months_retention(),
                "cutoff": cutoff.to_string(),
                "active_conditions": request.active_conditions.labels(),
            }),
        )?;

        let accountant = TableRowAccountant::new(self.conn);
        let rows_before = accountant.snapshot_classification_state("rows_before")?.total();

        let scope = RoleScope::enter(self.conn, &self.role)?;
        let rebuild = ShardedTableRebuilder::new(self.conn).rebuild(
            &scope,
            cutoff,
            &request.active_conditions,
        )?;
        scope.exit()?;

        let rows_after = accountant.snapshot_classification_state("rows_after")?.total();
        let rows_pruned = rows_before.saturating_sub(rows_after);
        record_row_gauge("rows_pruned", CLASSIFICATION_STATE_TABLE, rows_pruned);
        tracing::info!(rows_pruned, rows_after, "classification_state 裁剪完成");

        jobs.add_optional_metadata(
            run_id,
            json!({
                "rows_before": rows_before,
                "rows_after": rows_after,
                "rows_pruned": rows_pruned,
                "rows_out_of_window": rebuild.diagnostics.rows_out_of_window,
                "rows_orphaned_condition": rebuild.diagnostics.rows_orphaned_condition,
                "phys_shards": rebuild.shard_count,
            }),
        )?;

        Ok(ClassificationPruneReport {
            run_id: run_id.to_string(),
            cutoff,
            rows_before,
            rows_after,
            rows_pruned,
            rebuild,
        })
    }
}

/// 结束运行并返回结果
///
/// 失败路径上审计写入本身出错时只记日志，返回原始错误
fn finish_job<T>(
    jobs: &JobMetadataRepository<'_>,
    run_id: &str,
    result: ApiResult<T>,
) -> ApiResult<T> {
    match result {
        Ok(value) => {
            jobs.finish(run_id, JobStatus::Success, None)?;
            tracing::info!(run_id, "运行成功");
            Ok(value)
        }
        Err(err) => {
            let message = err.to_string();
            tracing::error!(run_id, error = %message, "运行失败");
            if let Err(audit_err) = jobs.finish(run_id, JobStatus::Error, Some(&message)) {
                tracing::error!(run_id, error = %audit_err, "运行失败状态写入失败");
            }
            Err(err)
        }
    }
}
