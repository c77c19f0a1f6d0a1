// ==========================================
// DIRBS 数据保留维护 - 分区目录仓储
// ==========================================
// 存储模型:
// - partition_catalog(parent_table, child_table) 记录父子关系
// - 叶子分区为物理表；父表与运营商中间层为目录节点
// - 父表行数 = 其下所有物理表行数之和
// 约束: 表名一律经 Identifier 转义，值一律参数绑定
// ==========================================

use crate::common::sql_builder::{Identifier, SqlQueryBuilder};
use crate::db::role_scope::RoleScope;
use crate::db::schema::table_exists;
use crate::domain::triplet::TripletObservation;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, TransactionBehavior};
use std::collections::HashSet;

/// 叶子分区中标识月份的列
pub const TRIPLET_YEAR_COLUMN: &str = "triplet_year";
pub const TRIPLET_MONTH_COLUMN: &str = "triplet_month";

// ==========================================
// PartitionCatalogRepository - 分区目录仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct PartitionCatalogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> PartitionCatalogRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    // ==========================================
    // 目录维护
    // ==========================================

    /// 登记父子关系（已存在则忽略）
    pub fn register_child(&self, parent: &str, child: &str) -> RepositoryResult<()> {
        Identifier::new(parent)?;
        Identifier::new(child)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO partition_catalog (parent_table, child_table) VALUES (?1, ?2)",
            params![parent, child],
        )?;
        Ok(())
    }

    /// 创建三元组叶子分区物理表并登记到父节点下
    pub fn create_triplet_partition(&self, parent: &str, table: &str) -> RepositoryResult<()> {
        let ident = Identifier::new(table)?;
        let idx = Identifier::new(&format!("{}_imei_norm_idx", table))?;
        let year = Identifier::new(TRIPLET_YEAR_COLUMN)?;
        let month = Identifier::new(TRIPLET_MONTH_COLUMN)?;

        self.conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {ident} (
                {year} INTEGER NOT NULL,
                {month} INTEGER NOT NULL,
                first_seen TEXT NOT NULL,
                last_seen TEXT NOT NULL,
                imei_norm TEXT,
                imsi TEXT,
                msisdn TEXT,
                operator_id TEXT
            );
            CREATE INDEX IF NOT EXISTS {idx} ON {ident}(imei_norm);
            "#
        ))?;
        self.register_child(parent, table)
    }

    /// 批量写入三元组观测
    pub fn insert_triplets(
        &self,
        table: &str,
        rows: &[TripletObservation],
    ) -> RepositoryResult<usize> {
        let ident = Identifier::new(table)?;
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (triplet_year, triplet_month, first_seen, last_seen, \
                 imei_norm, imsi, msisdn, operator_id) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                ident
            ))?;
            for row in rows {
                stmt.execute(params![
                    row.triplet_year,
                    row.triplet_month,
                    row.first_seen,
                    row.last_seen,
                    row.imei_norm,
                    row.imsi,
                    row.msisdn,
                    row.operator_id,
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 直接子节点（按名称排序）
    pub fn child_table_names(&self, parent: &str) -> RepositoryResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT child_table FROM partition_catalog WHERE parent_table = ?1 ORDER BY child_table",
        )?;
        let names = stmt
            .query_map(params![parent], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// 节点是否为物理表
    pub fn is_physical_table(&self, table: &str) -> RepositoryResult<bool> {
        Ok(table_exists(self.conn, table)?)
    }

    /// 叶子表中实际出现的 (年, 月) 去重列表（原始整数，不做合法性判断）
    pub fn distinct_year_months(&self, table: &str) -> RepositoryResult<Vec<(i64, i64)>> {
        let ident = Identifier::new(table)?;
        let year = Identifier::new(TRIPLET_YEAR_COLUMN)?;
        let month = Identifier::new(TRIPLET_MONTH_COLUMN)?;

        let stmt = SqlQueryBuilder::new(format!(
            "SELECT DISTINCT {}, {} FROM {}",
            year, month, ident
        ))
        .order_by(&[&year, &month])
        .build();

        let mut prepared = self.conn.prepare(&stmt.sql)?;
        let pairs = prepared
            .query_map(stmt.bind(), |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pairs)
    }

    /// 单个物理表行数
    pub fn count_rows(&self, table: &str) -> RepositoryResult<u64> {
        let ident = Identifier::new(table)?;
        let stmt = SqlQueryBuilder::new(format!("SELECT COUNT(*) FROM {}", ident)).build();
        let n: i64 = self
            .conn
            .query_row(&stmt.sql, stmt.bind(), |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }

    /// 节点及其全部后代（前序遍历，含自身）
    pub fn subtree(&self, root: &str) -> RepositoryResult<Vec<String>> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![root.to_string()];

        while let Some(node) = stack.pop() {
            if !visited.insert(node.clone()) {
                continue;
            }
            let children = self.child_table_names(&node)?;
            order.push(node);
            // 逆序压栈，保证出栈顺序与名称顺序一致
            for child in children.into_iter().rev() {
                stack.push(child);
            }
        }
        Ok(order)
    }

    /// 父表逻辑行数：其下所有物理表行数之和
    pub fn count_rows_recursive(&self, root: &str) -> RepositoryResult<u64> {
        let mut total = 0u64;
        for node in self.subtree(root)? {
            if self.is_physical_table(&node)? {
                total += self.count_rows(&node)?;
            }
        }
        Ok(total)
    }

    // ==========================================
    // 破坏性操作（需持有角色作用域）
    // ==========================================

    /// 级联删除分区：删除物理表（索引/触发器随表删除）及其目录子树
    ///
    /// 整个删除在单个事务中完成，中断时要么全删要么未动
    pub fn drop_partition_cascade(
        &self,
        scope: &RoleScope<'_>,
        table: &str,
    ) -> RepositoryResult<()> {
        Identifier::new(table)?;
        let subtree = self.subtree(table)?;
        tracing::debug!(table, role = scope.role(), nodes = subtree.len(), "级联删除分区");

        let tx = rusqlite::Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for node in subtree.iter().rev() {
            let ident = Identifier::new(node)?;
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", ident))?;
            tx.execute(
                "DELETE FROM partition_catalog WHERE child_table = ?1 OR parent_table = ?1",
                params![node],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// 目录中登记但物理表缺失的叶子，用于布局校验
    pub fn ensure_physical(&self, table: &str) -> RepositoryResult<()> {
        if self.is_physical_table(table)? {
            Ok(())
        } else {
            Err(RepositoryError::LayoutMismatch(format!(
                "分区 {} 已登记但物理表不存在",
                table
            )))
        }
    }
}
