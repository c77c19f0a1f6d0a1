// ==========================================
// DIRBS 数据保留维护 - 引擎层
// ==========================================
// 职责: 保留窗口计算、分区盘点、裁剪决策、行数核对、分片重建
// 红线: Engine 不拼 SQL 文本，只通过仓储与 SqlFilter 访问数据
// ==========================================

pub mod error;
pub mod partition_inventory;
pub mod partition_pruner;
pub mod retention_window;
pub mod row_accountant;
pub mod sharded_rebuilder;

// 重导出核心引擎
pub use error::{PruneError, PruneResult};
pub use partition_inventory::PartitionInventory;
pub use partition_pruner::{decide, PartitionPruneOutcome, PartitionPruner, PruneDecision};
pub use retention_window::{compute_cutoff, first_of_month, RetentionWindowCalculator};
pub use row_accountant::{
    record_row_gauge, verify_conservation, RowCountSnapshot, TableRowAccountant,
};
pub use sharded_rebuilder::{
    retention_filter, RebuildDiagnostics, RebuildOutcome, ShardedTableRebuilder,
};
