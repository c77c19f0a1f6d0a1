// ==========================================
// classification_state 重建集成测试
// ==========================================
// 测试目标: 验证保留谓词、分片数保持、原子切换与审计
// ==========================================


use dirbs_prune::api::{ApiError, ClassificationPruneRequest, PruneApi};
use dirbs_prune::db::current_role;
use dirbs_prune::domain::{ActiveConditionSet, JobStatus, RetentionPolicy};
use dirbs_prune::repository::{ClassificationStateRepository, JobMetadataRepository};
use test_helpers::{
    classification_rows, create_test_db, date, install_classification_state,
    open_test_connection, revoke_power_user,
};

fn gsma_only() -> ActiveConditionSet {
    ActiveConditionSet::new(vec!["gsma_not_found".to_string()])
}

#[test]
fn test_rebuild_keeps_1300_of_1800_rows() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).expect("Failed to open db");
    install_classification_state(&conn, 4).unwrap();

    let repo = ClassificationStateRepository::new(&conn);
    repo.insert_records(&classification_rows(0, 1000, "gsma_not_found", None))
        .unwrap();
    repo.insert_records(&classification_rows(
        10_000,
        500,
        "gsma_not_found",
        Some(date(2016, 1, 1)),
    ))
    .unwrap();
    repo.insert_records(&classification_rows(
        20_000,
        300,
        "gsma_not_found",
        Some(date(2018, 1, 1)),
    ))
    .unwrap();

    // curr_date 2017-06-15, 0 个月 → cutoff 2017-06-01
    let request = ClassificationPruneRequest {
        curr_date: Some(date(2017, 6, 15)),
        policy: RetentionPolicy::new(0),
        active_conditions: gsma_only(),
    };
    let report = PruneApi::new(&conn)
        .prune_stale_classification_state(&request)
        .expect("rebuild should succeed");

    assert_eq!(report.cutoff, date(2017, 6, 1));
    assert_eq!(report.rows_before, 1800);
    assert_eq!(report.rows_after, 1300);
    assert_eq!(report.rows_pruned, 500);
    assert_eq!(report.rebuild.shard_count, 4);
    assert_eq!(report.rebuild.diagnostics.rows_out_of_window, 500);
    assert_eq!(report.rebuild.diagnostics.rows_orphaned_condition, 0);
    assert_eq!(repo.num_physical_shards().unwrap().get(), 4);
    assert_eq!(repo.count_shard_tables().unwrap(), 4);
    assert_eq!(repo.count_rows().unwrap(), 1300);
}

#[test]
fn test_retained_rows_match_predicate() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).expect("Failed to open db");
    install_classification_state(&conn, 7).unwrap();

    let repo = ClassificationStateRepository::new(&conn);
    let cutoff = date(2017, 6, 1);
    let mut all = Vec::new();
    all.extend(classification_rows(0, 20, "gsma_not_found", None));
    all.extend(classification_rows(100, 20, "gsma_not_found", Some(cutoff)));
    all.extend(classification_rows(200, 20, "gsma_not_found", Some(date(2017, 6, 2))));
    all.extend(classification_rows(300, 20, "local_stolen", None));
    all.extend(classification_rows(400, 20, "local_stolen", Some(date(2016, 1, 1))));
    repo.insert_records(&all).unwrap();

    let request = ClassificationPruneRequest {
        curr_date: Some(date(2017, 6, 30)),
        policy: RetentionPolicy::new(0),
        active_conditions: gsma_only(),
    };
    let report = PruneApi::new(&conn)
        .prune_stale_classification_state(&request)
        .unwrap();

    let expected: Vec<_> = all
        .iter()
        .filter(|r| r.is_retained(cutoff, &gsma_only()))
        .cloned()
        .collect();
    let mut remaining = repo.list_all().unwrap();
    let mut expected_sorted = expected.clone();
    remaining.sort_by(|a, b| (&a.imei_norm, &a.cond_name).cmp(&(&b.imei_norm, &b.cond_name)));
    expected_sorted.sort_by(|a, b| (&a.imei_norm, &a.cond_name).cmp(&(&b.imei_norm, &b.cond_name)));
    assert_eq!(remaining, expected_sorted);
    assert_eq!(remaining.len(), 40);

    // 两个诊断计数有重叠（local_stolen 且过期的 20 行）
    assert_eq!(report.rebuild.diagnostics.rows_out_of_window, 20);
    assert_eq!(report.rebuild.diagnostics.rows_orphaned_condition, 40);
    assert_eq!(report.rows_pruned, 60);
}

#[test]
fn test_permission_denied_leaves_table_intact() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).expect("Failed to open db");
    install_classification_state(&conn, 2).unwrap();
    let repo = ClassificationStateRepository::new(&conn);
    repo.insert_records(&classification_rows(0, 5, "stolen", Some(date(2010, 1, 1))))
        .unwrap();
    revoke_power_user(&conn).unwrap();

    let request = ClassificationPruneRequest {
        curr_date: Some(date(2017, 6, 15)),
        policy: RetentionPolicy::new(6),
        active_conditions: gsma_only(),
    };
    let err = PruneApi::new(&conn)
        .prune_stale_classification_state(&request)
        .unwrap_err();

    assert!(matches!(err, ApiError::PermissionDenied(_)));
    assert_eq!(repo.count_rows().unwrap(), 5);
    assert_eq!(current_role(&conn).unwrap(), None);
}

#[test]
fn test_missing_shard_is_reported_and_audited() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).expect("Failed to open db");
    install_classification_state(&conn, 2).unwrap();
    conn.execute("UPDATE schema_metadata SET phys_shards = 3 WHERE id = 1", [])
        .unwrap();

    let request = ClassificationPruneRequest {
        curr_date: Some(date(2017, 6, 15)),
        policy: RetentionPolicy::new(6),
        active_conditions: gsma_only(),
    };
    let err = PruneApi::new(&conn)
        .prune_stale_classification_state(&request)
        .unwrap_err();
    assert!(matches!(err, ApiError::LayoutMismatch(_)));

    let (status, info): (String, Option<String>) = conn
        .query_row(
            "SELECT status, exception_info FROM job_metadata",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(status, "error");
    assert!(info.unwrap_or_default().contains("classification_state"));
    assert_eq!(current_role(&conn).unwrap(), None);
}

#[test]
fn test_audit_metadata_for_rebuild() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).expect("Failed to open db");
    install_classification_state(&conn, 3).unwrap();
    ClassificationStateRepository::new(&conn)
        .insert_records(&classification_rows(0, 3, "gsma_not_found", None))
        .unwrap();

    let request = ClassificationPruneRequest {
        curr_date: Some(date(2018, 1, 10)),
        policy: RetentionPolicy::new(6),
        active_conditions: gsma_only(),
    };
    let report = PruneApi::new(&conn)
        .prune_stale_classification_state(&request)
        .unwrap();

    let job = JobMetadataRepository::new(&conn)
        .find_by_run_id(&report.run_id)
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.subcommand.as_deref(), Some("classification_state"));
    assert_eq!(job.extra_metadata["cutoff"], "2017-07-01");
    assert_eq!(job.extra_metadata["rows_after"], 3);
    assert_eq!(job.extra_metadata["phys_shards"], 3);
    assert_eq!(job.extra_metadata["active_conditions"][0], "gsma_not_found");
}
