// ==========================================
// 月度三元组分区裁剪集成测试
// ==========================================
// 测试目标: 端到端验证保留窗口、空分区、跨月中止、幂等与行数守恒
// ==========================================


use dirbs_prune::api::{ApiError, PruneApi, TripletPruneRequest};
use dirbs_prune::db::current_role;
use dirbs_prune::domain::{JobStatus, RetentionPolicy};
use dirbs_prune::repository::{JobMetadataRepository, PartitionCatalogRepository};
use test_helpers::{
    add_country_partition, add_mno_partition, append_rows, create_test_db, date,
    list_leaf_tables, open_test_connection, revoke_power_user,
};

fn request(curr: chrono::NaiveDate, months: u32) -> TripletPruneRequest {
    TripletPruneRequest::monthly_network_triplets(Some(curr), RetentionPolicy::new(months))
}

#[test]
fn test_drops_partitions_before_cutoff() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).expect("Failed to open db");

    add_country_partition(&conn, 2017, 5, 10).unwrap();
    add_country_partition(&conn, 2017, 6, 20).unwrap();
    add_mno_partition(&conn, "op1", 2017, 5, 3).unwrap();
    add_mno_partition(&conn, "op1", 2017, 6, 4).unwrap();
    add_mno_partition(&conn, "op2", 2017, 5, 5).unwrap();

    let report = PruneApi::new(&conn)
        .prune_historical_partitions(&request(date(2018, 6, 15), 12))
        .expect("prune should succeed");

    assert_eq!(report.cutoff, date(2017, 6, 1));
    assert_eq!(report.outcome.rows_pruned, 18);
    assert_eq!(report.rows_before.total(), 42);
    assert_eq!(report.rows_after.total(), 24);
    assert_eq!(
        list_leaf_tables(&conn).unwrap(),
        vec![
            "monthly_network_triplets_country_2017_06".to_string(),
            "monthly_network_triplets_per_mno_op1_2017_06".to_string(),
        ]
    );
    // 运营商中间层保留
    let catalog = PartitionCatalogRepository::new(&conn);
    assert!(catalog
        .child_table_names("monthly_network_triplets_per_mno")
        .unwrap()
        .contains(&"monthly_network_triplets_per_mno_op2".to_string()));
}

#[test]
fn test_empty_partition_dropped_regardless_of_cutoff() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).expect("Failed to open db");

    // 远在窗口内的空分区
    let empty = add_country_partition(&conn, 2030, 1, 0).unwrap();
    add_country_partition(&conn, 2018, 6, 5).unwrap();

    let report = PruneApi::new(&conn)
        .prune_historical_partitions(&request(date(2018, 6, 15), 12))
        .unwrap();

    assert_eq!(report.outcome.empty_partitions_dropped, vec![empty.clone()]);
    assert_eq!(report.outcome.rows_pruned, 0);
    assert!(!list_leaf_tables(&conn).unwrap().contains(&empty));
}

#[test]
fn test_mixed_month_partition_aborts_without_drops() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).expect("Failed to open db");

    add_country_partition(&conn, 2016, 1, 5).unwrap();
    add_country_partition(&conn, 2016, 2, 0).unwrap();
    let mixed = add_mno_partition(&conn, "op1", 2016, 3, 2).unwrap();
    append_rows(&conn, &mixed, 2016, 4, 1).unwrap();
    let before = list_leaf_tables(&conn).unwrap();

    let err = PruneApi::new(&conn)
        .prune_historical_partitions(&request(date(2018, 6, 15), 12))
        .unwrap_err();

    match err {
        ApiError::PartitionInvariantViolation { table, identities } => {
            assert_eq!(table, mixed);
            assert_eq!(identities.len(), 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(list_leaf_tables(&conn).unwrap(), before);

    let status: String = conn
        .query_row("SELECT status FROM job_metadata", [], |row| row.get(0))
        .unwrap();
    assert_eq!(status, "error");
}

#[test]
fn test_rerun_is_idempotent() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).expect("Failed to open db");

    add_country_partition(&conn, 2017, 1, 4).unwrap();
    add_country_partition(&conn, 2017, 12, 4).unwrap();
    add_mno_partition(&conn, "op1", 2017, 1, 2).unwrap();

    let api = PruneApi::new(&conn);
    let first = api
        .prune_historical_partitions(&request(date(2018, 6, 15), 6))
        .unwrap();
    assert_eq!(first.outcome.dropped_partitions.len(), 2);

    let second = api
        .prune_historical_partitions(&request(date(2018, 6, 15), 6))
        .unwrap();
    assert!(second.outcome.dropped_partitions.is_empty());
    assert_eq!(second.outcome.rows_pruned, 0);
    assert_eq!(second.rows_before, first.rows_after);
    assert_eq!(second.rows_after, first.rows_after);
}

#[test]
fn test_row_conservation_across_parents() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).expect("Failed to open db");

    for month in 1..=12 {
        add_country_partition(&conn, 2017, month, month as usize).unwrap();
        add_mno_partition(&conn, "op1", 2017, month, 1).unwrap();
        add_mno_partition(&conn, "op2", 2017, month, 2).unwrap();
    }

    let report = PruneApi::new(&conn)
        .prune_historical_partitions(&request(date(2017, 12, 31), 3))
        .unwrap();

    assert_eq!(report.cutoff, date(2017, 9, 1));
    assert_eq!(
        report.rows_before.total() - report.rows_after.total(),
        report.outcome.rows_pruned
    );
    // 1..=8 月: 国家级 36 行 + 运营商级 8 * 3 行
    assert_eq!(report.outcome.rows_pruned, 36 + 24);
}

#[test]
fn test_audit_record_and_role_restored() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).expect("Failed to open db");
    add_country_partition(&conn, 2017, 5, 1).unwrap();

    let report = PruneApi::new(&conn)
        .prune_historical_partitions(&request(date(2018, 6, 15), 12))
        .unwrap();

    let job = JobMetadataRepository::new(&conn)
        .find_by_run_id(&report.run_id)
        .unwrap()
        .expect("audit record");
    assert_eq!(job.command, "dirbs-prune");
    assert_eq!(job.subcommand.as_deref(), Some("triplets"));
    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.extra_metadata["retention_months"], 12);
    assert_eq!(job.extra_metadata["curr_date"], "2018-06-15");
    assert_eq!(
        job.extra_metadata["rows_before"]["monthly_network_triplets_country"],
        1
    );
    assert_eq!(current_role(&conn).unwrap(), None);
}

#[test]
fn test_missing_grant_fails_before_any_drop() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).expect("Failed to open db");
    add_country_partition(&conn, 2017, 5, 1).unwrap();
    revoke_power_user(&conn).unwrap();

    let err = PruneApi::new(&conn)
        .prune_historical_partitions(&request(date(2018, 6, 15), 12))
        .unwrap_err();
    assert!(matches!(err, ApiError::PermissionDenied(_)));
    assert_eq!(list_leaf_tables(&conn).unwrap().len(), 1);
    assert_eq!(current_role(&conn).unwrap(), None);
}
