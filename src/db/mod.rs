// ==========================================
// DIRBS 数据保留维护 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，DDL 依赖数据库自身锁排除并发写入
// - 关闭双引号字符串回退，未知列名直接报错
// - 将 SQL 执行轨迹接入 tracing（TRACE 级别）
// ==========================================

pub mod role_scope;
pub mod schema;

pub use role_scope::{current_role, RoleScope, POWER_USER_ROLE};
pub use schema::ensure_maintenance_schema;

use rusqlite::config::DbConfig;
use rusqlite::Connection;
use std::path::PathBuf;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 默认数据库文件名
pub const DEFAULT_DB_FILE_NAME: &str = "dirbs.db";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
/// - 双引号只表示标识符；引用不存在的列不会退化为字符串字面量
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    conn.set_db_config(DbConfig::SQLITE_DBCONFIG_DQS_DML, false)?;
    conn.set_db_config(DbConfig::SQLITE_DBCONFIG_DQS_DDL, false)?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let mut conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    conn.trace(Some(trace_sql));
    Ok(conn)
}

fn trace_sql(sql: &str) {
    tracing::trace!(target: "dirbs_prune::sql", "{}", sql);
}

/// 解析默认数据库路径
///
/// 优先级：
/// 1. 环境变量 DIRBS_PRUNE_DB_PATH
/// 2. 用户数据目录下的 dirbs/dirbs.db
/// 3. 当前目录 ./dirbs.db
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var("DIRBS_PRUNE_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from(".").join(DEFAULT_DB_FILE_NAME);

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("dirbs");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join(DEFAULT_DB_FILE_NAME);
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_configure_enables_foreign_keys() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();

        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_configure_rejects_unknown_quoted_column() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        conn.execute_batch("CREATE TABLE t (end_date TEXT); INSERT INTO t VALUES ('2010-01-01');")
            .unwrap();

        let result: rusqlite::Result<i64> = conn.query_row(
            "SELECT COUNT(*) FROM t WHERE \"end_dat\" < '2017-06-01'",
            [],
            |row| row.get(0),
        );
        assert!(result.is_err());
    }
}
