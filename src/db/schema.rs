// ==========================================
// DIRBS 数据保留维护 - 维护元数据表
// ==========================================
// 职责: 建立维护引擎依赖的目录/元数据表（幂等）
// 说明: 业务表（分区叶子表、分类状态分片）由各自仓储负责创建
// ==========================================

use rusqlite::Connection;

/// 当前维护元数据的代码版本
pub const MAINTENANCE_SCHEMA_VERSION: i64 = 1;

/// 确保维护元数据表存在
///
/// # 包含
/// - schema_metadata: 物理分片数等布局信息（单行）
/// - partition_catalog: 分区父子关系目录
/// - db_role_grant: 当前会话可切换的角色
/// - job_metadata: 运行审计记录
/// - config_scope / config_kv: 配置存储
pub fn ensure_maintenance_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_metadata (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            code_version INTEGER NOT NULL,
            phys_shards INTEGER NOT NULL CHECK (phys_shards > 0)
        );

        CREATE TABLE IF NOT EXISTS partition_catalog (
            parent_table TEXT NOT NULL,
            child_table TEXT NOT NULL PRIMARY KEY,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_partition_catalog_parent
            ON partition_catalog(parent_table);

        CREATE TABLE IF NOT EXISTS db_role_grant (
            role_name TEXT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS job_metadata (
            run_id TEXT PRIMARY KEY,
            command TEXT NOT NULL,
            subcommand TEXT,
            start_time TEXT NOT NULL,
            end_time TEXT,
            status TEXT NOT NULL,
            exception_info TEXT,
            extra_metadata TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );
        "#,
    )
}

/// 检查表是否存在（仅限普通表）
pub fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}
