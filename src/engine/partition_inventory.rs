// ==========================================
// DIRBS 数据保留维护 - 分区盘点
// ==========================================
// 职责:
// - 按父表声明的层数逐层展开目录，得到扁平、去重、有序的叶子列表
// - 按行内容推断每个叶子的 (年, 月) 身份
// 红线: 任一叶子跨月即整体中止，此时尚未修改任何表
// ==========================================

use crate::domain::partition::{LeafPartition, PartitionIdentity, PartitionedTable, YearMonth};
use crate::engine::error::{PruneError, PruneResult};
use crate::repository::partition_catalog_repo::PartitionCatalogRepository;
use rusqlite::Connection;
use std::collections::HashSet;

/// 叶子表名及其顶层父表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafRef {
    pub root_table: String,
    pub table_name: String,
}

pub struct PartitionInventory<'conn> {
    catalog: PartitionCatalogRepository<'conn>,
}

impl<'conn> PartitionInventory<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            catalog: PartitionCatalogRepository::new(conn),
        }
    }

    /// 展开父表到叶子层
    ///
    /// 逐层展开 levels 次；中间层没有子节点时不产生叶子
    pub fn discover_leaves(&self, parents: &[PartitionedTable]) -> PruneResult<Vec<LeafRef>> {
        let mut seen = HashSet::new();
        let mut leaves = Vec::new();

        for parent in parents {
            if parent.levels == 0 {
                return Err(PruneError::Configuration(format!(
                    "父表 {} 的分区层数必须大于 0",
                    parent.name
                )));
            }

            let mut frontier = vec![parent.name.clone()];
            for _ in 0..parent.levels {
                let mut next = Vec::new();
                for node in &frontier {
                    let children = self.catalog.child_table_names(node)?;
                    if children.is_empty() {
                        tracing::debug!(table = %node, "分区节点下没有子分区");
                    }
                    next.extend(children);
                }
                frontier = next;
            }

            for leaf in frontier {
                if seen.insert(leaf.clone()) {
                    leaves.push(LeafRef {
                        root_table: parent.name.clone(),
                        table_name: leaf,
                    });
                }
            }
        }

        Ok(leaves)
    }

    /// 推断单个叶子的身份
    pub fn identify(&self, table: &str) -> PruneResult<PartitionIdentity> {
        self.catalog.ensure_physical(table)?;
        let pairs = self.catalog.distinct_year_months(table)?;

        match pairs.as_slice() {
            [] => Ok(PartitionIdentity::Empty),
            [(year, month)] => {
                let ym = i32::try_from(*year)
                    .ok()
                    .zip(u32::try_from(*month).ok())
                    .map(|(y, m)| YearMonth::new(y, m))
                    .filter(|ym| ym.first_day().is_some());
                ym.map(PartitionIdentity::Month)
                    .ok_or_else(|| PruneError::InvariantViolation {
                        table: table.to_string(),
                        identities: vec![format!("{}-{}", year, month)],
                    })
            }
            many => Err(PruneError::InvariantViolation {
                table: table.to_string(),
                identities: many.iter().map(|(y, m)| format!("{}-{}", y, m)).collect(),
            }),
        }
    }

    /// 完整盘点：展开并识别所有叶子
    ///
    /// 全部叶子识别成功后才返回，供裁剪器在无任何删除的前提下中止
    pub fn take_inventory(&self, parents: &[PartitionedTable]) -> PruneResult<Vec<LeafPartition>> {
        let leaves = self.discover_leaves(parents)?;
        let mut inventory = Vec::with_capacity(leaves.len());

        for leaf in leaves {
            let identity = self.identify(&leaf.table_name)?;
            tracing::debug!(table = %leaf.table_name, identity = ?identity, "已识别分区");
            inventory.push(LeafPartition {
                table_name: leaf.table_name,
                root_table: leaf.root_table,
                identity,
            });
        }

        tracing::info!(partitions = inventory.len(), "分区盘点完成");
        Ok(inventory)
    }
}
