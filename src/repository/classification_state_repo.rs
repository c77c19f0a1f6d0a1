// ==========================================
// DIRBS 数据保留维护 - 分类状态仓储
// ==========================================
// 存储模型:
// - 物理分片表 classification_state_<lo>_<hi>，按 virt_imei_shard 区间划分
// - 逻辑表 classification_state 为所有分片的 UNION ALL 视图
// - 物理分片数记录在 schema_metadata.phys_shards
// 约束: 重建在单个 IMMEDIATE 事务中完成，提交即切换
// ==========================================

use crate::common::sql_builder::{Identifier, SqlFilter, SqlQueryBuilder};
use crate::db::role_scope::RoleScope;
use crate::db::schema::{table_exists, MAINTENANCE_SCHEMA_VERSION};
use crate::domain::classification::{
    virt_imei_shard_bounds, ClassificationRecord, ShardBounds, ShardCount,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

/// 逻辑表名
pub const CLASSIFICATION_STATE_TABLE: &str = "classification_state";

/// 重建期间新分片的表名前缀
const REBUILD_TABLE_PREFIX: &str = "classification_state_new";

const COLUMNS: &str = "row_id, imei_norm, virt_imei_shard, cond_name, start_date, end_date, block_date";

/// 物理分片及其覆盖区间
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalShard {
    pub bounds: ShardBounds,
    pub table_name: String,
}

/// 按分片数计算物理分片表名
pub fn physical_shards(base: &str, count: ShardCount) -> Vec<PhysicalShard> {
    virt_imei_shard_bounds(count)
        .into_iter()
        .map(|bounds| PhysicalShard {
            table_name: format!("{}{}", base, bounds.suffix()),
            bounds,
        })
        .collect()
}

// ==========================================
// ClassificationStateRepository - 分类状态仓储
// ==========================================
pub struct ClassificationStateRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> ClassificationStateRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    // ==========================================
    // 布局
    // ==========================================

    /// 读取当前物理分片数
    pub fn num_physical_shards(&self) -> RepositoryResult<ShardCount> {
        let raw: Option<i64> = self
            .conn
            .query_row("SELECT phys_shards FROM schema_metadata WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        let raw = raw.ok_or_else(|| {
            RepositoryError::LayoutMismatch("schema_metadata 缺少 phys_shards".to_string())
        })?;

        u32::try_from(raw)
            .ok()
            .and_then(ShardCount::new)
            .ok_or_else(|| RepositoryError::FieldValueError {
                field: "phys_shards".to_string(),
                message: format!("非法的物理分片数: {}", raw),
            })
    }

    /// 当前分片表（校验每个分片物理存在）
    pub fn current_shards(&self, count: ShardCount) -> RepositoryResult<Vec<PhysicalShard>> {
        let shards = physical_shards(CLASSIFICATION_STATE_TABLE, count);
        for shard in &shards {
            if !table_exists(self.conn, &shard.table_name)? {
                return Err(RepositoryError::LayoutMismatch(format!(
                    "phys_shards={} 但分片表 {} 不存在",
                    count.get(),
                    shard.table_name
                )));
            }
        }
        Ok(shards)
    }

    /// 实际存在的分片表数量（按名称前缀统计，不含重建中间表）
    pub fn count_shard_tables(&self) -> RepositoryResult<u32> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master
              WHERE type = 'table'
                AND name GLOB 'classification_state_[0-9]*_[0-9]*'",
            [],
            |row| row.get(0),
        )?;
        Ok(n.max(0) as u32)
    }

    /// 新建分片布局（用于新库初始化）
    pub fn install(&self, count: ShardCount) -> RepositoryResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let shards = physical_shards(CLASSIFICATION_STATE_TABLE, count);
        for shard in &shards {
            create_shard_table(&tx, &shard.table_name, shard.bounds)?;
            create_shard_indexes(&tx, &shard.table_name)?;
        }
        create_view(&tx, &shards)?;
        tx.execute(
            "INSERT INTO schema_metadata (id, code_version, phys_shards) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET phys_shards = excluded.phys_shards",
            params![MAINTENANCE_SCHEMA_VERSION, count.get()],
        )?;
        tx.commit()?;
        Ok(())
    }

    // ==========================================
    // 读写
    // ==========================================

    /// 写入分类状态行（按虚拟分片路由到物理分片）
    pub fn insert_records(&self, records: &[ClassificationRecord]) -> RepositoryResult<usize> {
        let shards = self.current_shards(self.num_physical_shards()?)?;
        let tx = self.conn.unchecked_transaction()?;
        for rec in records {
            let virt = rec.virt_imei_shard();
            let shard = shards
                .iter()
                .find(|s| virt >= s.bounds.lo && virt < s.bounds.hi)
                .ok_or_else(|| {
                    RepositoryError::InternalError(format!("虚拟分片 {} 无对应物理分片", virt))
                })?;
            let ident = Identifier::new(&shard.table_name)?;
            tx.execute(
                &format!(
                    "INSERT INTO {} (imei_norm, virt_imei_shard, cond_name, start_date, end_date, block_date)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    ident
                ),
                params![
                    rec.imei_norm,
                    virt,
                    rec.cond_name,
                    rec.start_date,
                    rec.end_date,
                    rec.block_date,
                ],
            )?;
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// 逻辑表总行数
    pub fn count_rows(&self) -> RepositoryResult<u64> {
        self.count_where(None)
    }

    /// 满足过滤条件的行数
    pub fn count_where(&self, filter: Option<SqlFilter>) -> RepositoryResult<u64> {
        let table = Identifier::new(CLASSIFICATION_STATE_TABLE)?;
        let stmt = SqlQueryBuilder::new(format!("SELECT COUNT(*) FROM {}", table))
            .filter_if(filter)
            .build();
        let n: i64 = self
            .conn
            .query_row(&stmt.sql, stmt.bind(), |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }

    /// 读取全部行（测试与核对用）
    pub fn list_all(&self) -> RepositoryResult<Vec<ClassificationRecord>> {
        let table = Identifier::new(CLASSIFICATION_STATE_TABLE)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT imei_norm, cond_name, start_date, end_date, block_date FROM {} ORDER BY imei_norm, cond_name",
            table
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ClassificationRecord {
                    imei_norm: row.get(0)?,
                    cond_name: row.get(1)?,
                    start_date: row.get(2)?,
                    end_date: row.get(3)?,
                    block_date: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ==========================================
    // 破坏性操作（需持有角色作用域）
    // ==========================================

    /// 按过滤条件重建分片表并原子切换
    ///
    /// # 流程（单个事务内）
    /// 1. 以相同分片数、相同区间新建分片
    /// 2. 每个新分片只从对应旧分片复制满足 filter 的行
    /// 3. 删除视图与旧分片，新分片改名为正式名称，重建索引与视图
    /// 4. 提交即切换；任何一步失败都整体回滚，旧表保持原样
    ///
    /// # 返回
    /// - 重建后的分片表
    pub fn repartition_with_filter(
        &self,
        scope: &RoleScope<'_>,
        count: ShardCount,
        filter: &SqlFilter,
    ) -> RepositoryResult<Vec<PhysicalShard>> {
        let old_shards = self.current_shards(count)?;
        let new_shards = physical_shards(REBUILD_TABLE_PREFIX, count);
        tracing::debug!(
            role = scope.role(),
            shards = count.get(),
            "开始重建 classification_state 分片"
        );

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        for (old, new) in old_shards.iter().zip(new_shards.iter()) {
            let old_ident = Identifier::new(&old.table_name)?;
            let new_ident = Identifier::new(&new.table_name)?;

            tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", new_ident))?;
            create_shard_table(&tx, &new.table_name, new.bounds)?;

            let stmt = SqlQueryBuilder::new(format!(
                "INSERT INTO {new} ({cols}) SELECT {cols} FROM {old}",
                new = new_ident,
                cols = COLUMNS,
                old = old_ident
            ))
            .filter(filter.clone())
            .build();
            let copied = tx.execute(&stmt.sql, stmt.bind())?;
            tracing::debug!(shard = %old.table_name, copied, "分片复制完成");
        }

        let view = Identifier::new(CLASSIFICATION_STATE_TABLE)?;
        tx.execute_batch(&format!("DROP VIEW IF EXISTS {};", view))?;

        for old in &old_shards {
            let old_ident = Identifier::new(&old.table_name)?;
            tx.execute_batch(&format!("DROP TABLE {};", old_ident))?;
        }

        for (old, new) in old_shards.iter().zip(new_shards.iter()) {
            let old_ident = Identifier::new(&old.table_name)?;
            let new_ident = Identifier::new(&new.table_name)?;
            tx.execute_batch(&format!("ALTER TABLE {} RENAME TO {};", new_ident, old_ident))?;
            create_shard_indexes(&tx, &old.table_name)?;
        }

        create_view(&tx, &old_shards)?;

        tx.commit().map_err(|e| {
            RepositoryError::DatabaseTransactionError(format!("分片切换提交失败: {}", e))
        })?;

        Ok(old_shards)
    }
}

// ==========================================
// DDL 辅助函数
// ==========================================

fn create_shard_table(tx: &Transaction, table: &str, bounds: ShardBounds) -> RepositoryResult<()> {
    let ident = Identifier::new(table)?;
    // 区间来自整数计算，可直接内联到 CHECK 约束
    tx.execute_batch(&format!(
        r#"
        CREATE TABLE {ident} (
            row_id INTEGER PRIMARY KEY,
            imei_norm TEXT NOT NULL,
            virt_imei_shard INTEGER NOT NULL CHECK (virt_imei_shard >= {lo} AND virt_imei_shard < {hi}),
            cond_name TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT,
            block_date TEXT
        );
        "#,
        ident = ident,
        lo = bounds.lo,
        hi = bounds.hi
    ))?;
    Ok(())
}

fn create_shard_indexes(tx: &Transaction, table: &str) -> RepositoryResult<()> {
    let ident = Identifier::new(table)?;
    let open_idx = Identifier::new(&format!("{}_imei_norm_cond_name_open_idx", table))?;
    let end_idx = Identifier::new(&format!("{}_end_date_idx", table))?;
    tx.execute_batch(&format!(
        r#"
        CREATE UNIQUE INDEX {open_idx} ON {ident}(imei_norm, cond_name) WHERE end_date IS NULL;
        CREATE INDEX {end_idx} ON {ident}(end_date);
        "#
    ))?;
    Ok(())
}

fn create_view(tx: &Transaction, shards: &[PhysicalShard]) -> RepositoryResult<()> {
    let view = Identifier::new(CLASSIFICATION_STATE_TABLE)?;
    let selects = shards
        .iter()
        .map(|s| Identifier::new(&s.table_name).map(|t| format!("SELECT {} FROM {}", COLUMNS, t)))
        .collect::<RepositoryResult<Vec<_>>>()?;
    tx.execute_batch(&format!(
        "CREATE VIEW {} AS {};",
        view,
        selects.join(" UNION ALL ")
    ))?;
    Ok(())
}
