// ==========================================
// DIRBS 数据保留维护 - 运行审计仓储
// ==========================================
// 对齐: job_metadata 表
// 红线: 每次运行必须留下输入与结果记录（成功或失败）
// ==========================================

use crate::domain::job_metadata::{JobMetadata, JobStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value as JsonValue};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// JobMetadataRepository - 运行审计仓储
// ==========================================
pub struct JobMetadataRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> JobMetadataRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// 登记一次运行，返回 run_id
    pub fn start(&self, command: &str, subcommand: Option<&str>) -> RepositoryResult<String> {
        let run_id = uuid::Uuid::new_v4().to_string();
        self.conn.execute(
            r#"
            INSERT INTO job_metadata (run_id, command, subcommand, start_time, status, extra_metadata)
            VALUES (?1, ?2, ?3, ?4, ?5, '{}')
            "#,
            params![
                run_id,
                command,
                subcommand,
                Utc::now().naive_utc().format(TS_FORMAT).to_string(),
                JobStatus::Running.to_string(),
            ],
        )?;
        Ok(run_id)
    }

    /// 合并附加元数据（顶层键覆盖）
    pub fn add_optional_metadata(&self, run_id: &str, metadata: JsonValue) -> RepositoryResult<()> {
        let incoming = match metadata {
            JsonValue::Object(map) => map,
            other => {
                return Err(RepositoryError::FieldValueError {
                    field: "extra_metadata".to_string(),
                    message: format!("附加元数据必须是 JSON 对象: {}", other),
                })
            }
        };

        let current: String = self
            .conn
            .query_row(
                "SELECT extra_metadata FROM job_metadata WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "job_metadata".to_string(),
                id: run_id.to_string(),
            })?;

        let mut merged: Map<String, JsonValue> = match serde_json::from_str::<JsonValue>(&current)? {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        };
        merged.extend(incoming);

        self.conn.execute(
            "UPDATE job_metadata SET extra_metadata = ?1 WHERE run_id = ?2",
            params![JsonValue::Object(merged).to_string(), run_id],
        )?;
        Ok(())
    }

    /// 结束运行
    pub fn finish(
        &self,
        run_id: &str,
        status: JobStatus,
        exception_info: Option<&str>,
    ) -> RepositoryResult<()> {
        let rows = self.conn.execute(
            "UPDATE job_metadata SET end_time = ?1, status = ?2, exception_info = ?3 WHERE run_id = ?4",
            params![
                Utc::now().naive_utc().format(TS_FORMAT).to_string(),
                status.to_string(),
                exception_info,
                run_id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "job_metadata".to_string(),
                id: run_id.to_string(),
            });
        }
        Ok(())
    }

    /// 按 run_id 查询
    pub fn find_by_run_id(&self, run_id: &str) -> RepositoryResult<Option<JobMetadata>> {
        let raw = self
            .conn
            .query_row(
                r#"
                SELECT run_id, command, subcommand, start_time, end_time, status,
                       exception_info, extra_metadata
                  FROM job_metadata
                 WHERE run_id = ?1
                "#,
                params![run_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()?;

        let Some((run_id, command, subcommand, start, end, status, exception_info, extra)) = raw
        else {
            return Ok(None);
        };

        Ok(Some(JobMetadata {
            run_id,
            command,
            subcommand,
            start_time: parse_ts(&start)?,
            end_time: end.as_deref().map(parse_ts).transpose()?,
            status: status.parse::<JobStatus>().map_err(|message| RepositoryError::FieldValueError {
                field: "status".to_string(),
                message,
            })?,
            exception_info,
            extra_metadata: serde_json::from_str(&extra)?,
        }))
    }
}

fn parse_ts(raw: &str) -> RepositoryResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TS_FORMAT).map_err(|e| RepositoryError::FieldValueError {
        field: "timestamp".to_string(),
        message: format!("{}: {}", raw, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ensure_maintenance_schema;
    use serde_json::json;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        ensure_maintenance_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_start_merge_and_finish() {
        let conn = setup();
        let repo = JobMetadataRepository::new(&conn);

        let run_id = repo.start("dirbs-prune", Some("triplets")).unwrap();
        repo.add_optional_metadata(&run_id, json!({"retention_months": 12, "curr_date": null}))
            .unwrap();
        repo.add_optional_metadata(&run_id, json!({"rows_before": {"t": 10}, "curr_date": "2018-06-15"}))
            .unwrap();
        repo.finish(&run_id, JobStatus::Success, None).unwrap();

        let job = repo.find_by_run_id(&run_id).unwrap().unwrap();
        assert_eq!(job.command, "dirbs-prune");
        assert_eq!(job.subcommand.as_deref(), Some("triplets"));
        assert_eq!(job.status, JobStatus::Success);
        assert!(job.end_time.is_some());
        assert_eq!(job.extra_metadata["retention_months"], 12);
        assert_eq!(job.extra_metadata["curr_date"], "2018-06-15");
        assert_eq!(job.extra_metadata["rows_before"]["t"], 10);
    }

    #[test]
    fn test_add_metadata_rejects_non_object() {
        let conn = setup();
        let repo = JobMetadataRepository::new(&conn);
        let run_id = repo.start("dirbs-prune", None).unwrap();

        assert!(repo.add_optional_metadata(&run_id, json!([1, 2])).is_err());
    }

    #[test]
    fn test_unknown_run_id() {
        let conn = setup();
        let repo = JobMetadataRepository::new(&conn);

        assert!(repo.find_by_run_id("missing").unwrap().is_none());
        assert!(matches!(
            repo.finish("missing", JobStatus::Error, Some("x")),
            Err(RepositoryError::NotFound { .. })
        ));
    }
}
