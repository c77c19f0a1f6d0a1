// ==========================================
// DIRBS 数据保留维护 - 行数核对
// ==========================================
// 职责:
// - 裁剪前后对每个逻辑表计数并以 gauge 上报（标签 table）
// - 校验 before - after == pruned
// 说明: 父表计数为其全部物理后代之和
// 指标: dirbs.prune.rows_before / rows_after / rows_pruned
// ==========================================

use crate::domain::partition::PartitionedTable;
use crate::engine::error::{PruneError, PruneResult};
use crate::repository::classification_state_repo::{
    ClassificationStateRepository, CLASSIFICATION_STATE_TABLE,
};
use crate::repository::partition_catalog_repo::PartitionCatalogRepository;
use metrics::gauge;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

/// 一次计数快照（表名 → 行数）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowCountSnapshot {
    pub counts: BTreeMap<String, u64>,
}

impl RowCountSnapshot {
    pub fn total(&self) -> u64 {
        self.counts.values().fold(0u64, |acc, n| acc.saturating_add(*n))
    }

    pub fn get(&self, table: &str) -> Option<u64> {
        self.counts.get(table).copied()
    }
}

/// 指标名前缀
pub const METRIC_PREFIX: &str = "dirbs.prune";

/// 上报单表行数，指标名为 `dirbs.prune.<phase>`
pub fn record_row_gauge(phase: &str, table: &str, rows: u64) {
    gauge!(format!("{}.{}", METRIC_PREFIX, phase), "table" => table.to_string()).set(rows as f64);
}

pub struct TableRowAccountant<'conn> {
    conn: &'conn Connection,
}

impl<'conn> TableRowAccountant<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// 对分区父表计数
    ///
    /// phase 用于指标命名，如 `dirbs.prune.rows_before{table=<parent>}`
    pub fn snapshot_partitioned(
        &self,
        parents: &[PartitionedTable],
        phase: &str,
    ) -> PruneResult<RowCountSnapshot> {
        let catalog = PartitionCatalogRepository::new(self.conn);
        let mut snapshot = RowCountSnapshot::default();

        for parent in parents {
            let rows = catalog.count_rows_recursive(&parent.name)?;
            record_row_gauge(phase, &parent.name, rows);
            snapshot.counts.insert(parent.name.clone(), rows);
        }

        tracing::info!(phase, total = snapshot.total(), "三元组行数快照");
        Ok(snapshot)
    }

    /// 对 classification_state 逻辑表计数
    pub fn snapshot_classification_state(&self, phase: &str) -> PruneResult<RowCountSnapshot> {
        let rows = ClassificationStateRepository::new(self.conn).count_rows()?;
        record_row_gauge(phase, CLASSIFICATION_STATE_TABLE, rows);

        let mut snapshot = RowCountSnapshot::default();
        snapshot.counts.insert(CLASSIFICATION_STATE_TABLE.to_string(), rows);
        tracing::info!(phase, rows, "classification_state 行数快照");
        Ok(snapshot)
    }
}

/// 校验行数守恒: before - after == pruned
///
/// # 示例
/// ```
/// use dirbs_prune::engine::row_accountant::verify_conservation;
///
/// assert!(verify_conservation(300, 100, 200).is_ok());
/// assert!(verify_conservation(300, 100, 150).is_err());
/// ```
pub fn verify_conservation(rows_before: u64, rows_after: u64, rows_pruned: u64) -> PruneResult<()> {
    if rows_before.checked_sub(rows_after) == Some(rows_pruned) {
        Ok(())
    } else {
        Err(PruneError::RowConservationViolation {
            rows_before,
            rows_after,
            rows_pruned,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ensure_maintenance_schema;
    use crate::domain::classification::ShardCount;
    use crate::domain::triplet::TripletObservation;
    use metrics::{
        Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use std::sync::{Arc, Mutex};

    type Recorded = Arc<Mutex<Vec<(String, String, f64)>>>;

    /// 记录 gauge 写入值的测试用 recorder
    #[derive(Default)]
    struct CapturingRecorder {
        gauges: Recorded,
    }

    struct CapturedGauge {
        name: String,
        table: String,
        sink: Recorded,
    }

    impl GaugeFn for CapturedGauge {
        fn increment(&self, _value: f64) {}

        fn decrement(&self, _value: f64) {}

        fn set(&self, value: f64) {
            self.sink
                .lock()
                .unwrap()
                .push((self.name.clone(), self.table.clone(), value));
        }
    }

    impl Recorder for CapturingRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
            let table = key
                .labels()
                .find(|label| label.key() == "table")
                .map(|label| label.value().to_string())
                .unwrap_or_default();
            Gauge::from_arc(Arc::new(CapturedGauge {
                name: key.name().to_string(),
                table,
                sink: Arc::clone(&self.gauges),
            }))
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn test_snapshot_partitioned_sums_descendants() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        ensure_maintenance_schema(&conn).unwrap();
        let catalog = PartitionCatalogRepository::new(&conn);
        catalog.create_triplet_partition("country", "country_2017_05").unwrap();
        catalog.register_child("mno", "mno_op1").unwrap();
        catalog.create_triplet_partition("mno_op1", "mno_op1_2017_05").unwrap();
        let obs = TripletObservation::in_month(2017, 5, "35123456789012").unwrap();
        catalog.insert_triplets("country_2017_05", &[obs.clone(), obs.clone()]).unwrap();
        catalog.insert_triplets("mno_op1_2017_05", &[obs]).unwrap();

        let snapshot = TableRowAccountant::new(&conn)
            .snapshot_partitioned(
                &[PartitionedTable::new("country", 1), PartitionedTable::new("mno", 2)],
                "rows_before",
            )
            .unwrap();

        assert_eq!(snapshot.get("country"), Some(2));
        assert_eq!(snapshot.get("mno"), Some(1));
        assert_eq!(snapshot.total(), 3);
    }

    #[test]
    fn test_snapshot_classification_state() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        ensure_maintenance_schema(&conn).unwrap();
        ClassificationStateRepository::new(&conn)
            .install(ShardCount::new(2).unwrap())
            .unwrap();

        let snapshot = TableRowAccountant::new(&conn)
            .snapshot_classification_state("rows_before")
            .unwrap();
        assert_eq!(snapshot.get(CLASSIFICATION_STATE_TABLE), Some(0));
    }

    #[test]
    fn test_snapshot_reports_table_gauges() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        ensure_maintenance_schema(&conn).unwrap();
        let catalog = PartitionCatalogRepository::new(&conn);
        catalog.create_triplet_partition("country", "country_2017_05").unwrap();
        let obs = TripletObservation::in_month(2017, 5, "35123456789012").unwrap();
        catalog.insert_triplets("country_2017_05", &[obs.clone(), obs]).unwrap();
        ClassificationStateRepository::new(&conn)
            .install(ShardCount::new(1).unwrap())
            .unwrap();

        let recorder = CapturingRecorder::default();
        metrics::with_local_recorder(&recorder, || {
            let accountant = TableRowAccountant::new(&conn);
            accountant
                .snapshot_partitioned(&[PartitionedTable::new("country", 1)], "rows_before")
                .unwrap();
            accountant.snapshot_classification_state("rows_after").unwrap();
        });

        let gauges = recorder.gauges.lock().unwrap().clone();
        assert_eq!(
            gauges,
            vec![
                ("dirbs.prune.rows_before".to_string(), "country".to_string(), 2.0),
                (
                    "dirbs.prune.rows_after".to_string(),
                    CLASSIFICATION_STATE_TABLE.to_string(),
                    0.0
                ),
            ]
        );
    }

    #[test]
    fn test_verify_conservation() {
        assert!(verify_conservation(10, 10, 0).is_ok());
        assert!(matches!(
            verify_conservation(10, 12, 0),
            Err(PruneError::RowConservationViolation { .. })
        ));
    }
}
