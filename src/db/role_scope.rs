// ==========================================
// DIRBS 数据保留维护 - 角色提升作用域
// ==========================================
// 职责: 在破坏性操作期间持有提升后的角色
// 约束: 无论成功、失败还是 panic 展开，离开作用域时都恢复原角色
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};

/// 执行分区删除/分片重建所需的角色
pub const POWER_USER_ROLE: &str = "dirbs_core_power_user";

/// 读取当前会话角色（未设置时返回 None）
pub fn current_role(conn: &Connection) -> RepositoryResult<Option<String>> {
    ensure_session_table(conn)?;
    let role = conn
        .query_row(
            "SELECT role_name FROM temp.session_role WHERE slot = 1",
            [],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?
        .flatten();
    Ok(role)
}

fn ensure_session_table(conn: &Connection) -> RepositoryResult<()> {
    conn.execute_batch(
        "CREATE TEMP TABLE IF NOT EXISTS session_role (
            slot INTEGER PRIMARY KEY CHECK (slot = 1),
            role_name TEXT
        );",
    )?;
    Ok(())
}

fn set_role(conn: &Connection, role: Option<&str>) -> RepositoryResult<()> {
    conn.execute(
        "INSERT INTO temp.session_role (slot, role_name) VALUES (1, ?1)
         ON CONFLICT(slot) DO UPDATE SET role_name = excluded.role_name",
        params![role],
    )?;
    Ok(())
}

// ==========================================
// RoleScope - 角色提升守卫
// ==========================================
// 破坏性仓储方法以 &RoleScope 作为参数，持有即代表已提升权限
pub struct RoleScope<'conn> {
    conn: &'conn Connection,
    role: String,
    prior_role: Option<String>,
    restored: bool,
}

impl<'conn> RoleScope<'conn> {
    /// 进入角色提升作用域
    ///
    /// # 错误
    /// - PermissionDenied: 角色未授予当前会话
    pub fn enter(conn: &'conn Connection, role: &str) -> RepositoryResult<Self> {
        let granted: bool = conn
            .query_row(
                "SELECT 1 FROM db_role_grant WHERE role_name = ?1",
                params![role],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);

        if !granted {
            return Err(RepositoryError::PermissionDenied {
                role: role.to_string(),
            });
        }

        let prior_role = current_role(conn)?;
        set_role(conn, Some(role))?;
        tracing::debug!(role, prior_role = ?prior_role, "已切换会话角色");

        Ok(Self {
            conn,
            role: role.to_string(),
            prior_role,
            restored: false,
        })
    }

    /// 当前持有的角色
    pub fn role(&self) -> &str {
        &self.role
    }

    /// 显式退出作用域并恢复原角色（可获取恢复错误）
    pub fn exit(mut self) -> RepositoryResult<()> {
        self.restore()
    }

    fn restore(&mut self) -> RepositoryResult<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        set_role(self.conn, self.prior_role.as_deref())?;
        tracing::debug!(role = %self.role, restored_to = ?self.prior_role, "已恢复会话角色");
        Ok(())
    }
}

impl Drop for RoleScope<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::error!(role = %self.role, error = %e, "恢复会话角色失败");
        }
    }
}
