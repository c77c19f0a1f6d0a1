// ==========================================
// DIRBS 数据保留维护 - 分类状态领域模型
// ==========================================
// 分片模型:
// - 每个 IMEI 落在 100 个虚拟分片之一 (virt_imei_shard)
// - 虚拟分片按连续区间划分到 phys_shards 个物理分片
// - 物理分片数由外部维护，本系统只读取并原样复现
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 虚拟分片总数
pub const NUM_VIRTUAL_IMEI_SHARDS: u32 = 100;

// ==========================================
// ShardCount - 物理分片数
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardCount(u32);

impl ShardCount {
    /// 合法范围: 1..=100
    pub fn new(count: u32) -> Option<Self> {
        if (1..=NUM_VIRTUAL_IMEI_SHARDS).contains(&count) {
            Some(Self(count))
        } else {
            None
        }
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// 单个物理分片覆盖的虚拟分片半开区间 [lo, hi)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardBounds {
    pub lo: u32,
    pub hi: u32,
}

impl ShardBounds {
    /// 物理分片表名后缀，如 `_0_49`（闭区间）
    pub fn suffix(&self) -> String {
        format!("_{}_{}", self.lo, self.hi - 1)
    }
}

/// 计算各物理分片的虚拟分片区间
///
/// 余数从前往后均摊，保证区间连续、不重叠且覆盖 0..100
///
/// # 示例
/// ```
/// use dirbs_prune::domain::{virt_imei_shard_bounds, ShardCount};
///
/// let bounds = virt_imei_shard_bounds(ShardCount::new(3).unwrap());
/// let pairs: Vec<(u32, u32)> = bounds.iter().map(|b| (b.lo, b.hi)).collect();
/// assert_eq!(pairs, vec![(0, 34), (34, 67), (67, 100)]);
/// ```
pub fn virt_imei_shard_bounds(count: ShardCount) -> Vec<ShardBounds> {
    let n = count.get();
    let k = NUM_VIRTUAL_IMEI_SHARDS / n;
    let m = NUM_VIRTUAL_IMEI_SHARDS % n;
    (0..n)
        .map(|i| ShardBounds {
            lo: i * k + i.min(m),
            hi: (i + 1) * k + (i + 1).min(m),
        })
        .collect()
}

/// 计算 IMEI 的虚拟分片号（取前 14 位做 FNV-1a 哈希）
pub fn virt_imei_shard_for(imei_norm: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for b in imei_norm.bytes().take(14) {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash % NUM_VIRTUAL_IMEI_SHARDS
}

// ==========================================
// ActiveConditionSet - 当前启用的条件标签
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveConditionSet {
    labels: Vec<String>,
}

impl ActiveConditionSet {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// cond_name 是否由某个启用标签派生（前缀匹配）
    pub fn matches(&self, cond_name: &str) -> bool {
        self.labels.iter().any(|label| cond_name.starts_with(label.as_str()))
    }
}

// ==========================================
// ClassificationRecord - 分类状态行
// ==========================================
// end_date = None 表示仍然生效，永远不会因日期被裁剪
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub imei_norm: String,
    pub cond_name: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub block_date: Option<NaiveDate>,
}

impl ClassificationRecord {
    pub fn virt_imei_shard(&self) -> u32 {
        virt_imei_shard_for(&self.imei_norm)
    }

    /// 重建时是否保留该行
    pub fn is_retained(&self, cutoff: NaiveDate, conditions: &ActiveConditionSet) -> bool {
        let in_window = match self.end_date {
            None => true,
            Some(end) => end > cutoff,
        };
        in_window && conditions.matches(&self.cond_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_count_range() {
        assert!(ShardCount::new(0).is_none());
        assert!(ShardCount::new(101).is_none());
        assert_eq!(ShardCount::new(4).unwrap().get(), 4);
    }

    #[test]
    fn test_bounds_cover_all_virtual_shards() {
        for n in 1..=NUM_VIRTUAL_IMEI_SHARDS {
            let bounds = virt_imei_shard_bounds(ShardCount::new(n).unwrap());
            assert_eq!(bounds.len() as u32, n);
            assert_eq!(bounds[0].lo, 0);
            assert_eq!(bounds[bounds.len() - 1].hi, NUM_VIRTUAL_IMEI_SHARDS);
            for w in bounds.windows(2) {
                assert_eq!(w[0].hi, w[1].lo);
                assert!(w[0].lo < w[0].hi);
            }
        }
    }

    #[test]
    fn test_bounds_suffix() {
        let bounds = virt_imei_shard_bounds(ShardCount::new(2).unwrap());
        assert_eq!(bounds[0].suffix(), "_0_49");
        assert_eq!(bounds[1].suffix(), "_50_99");
    }

    #[test]
    fn test_virt_imei_shard_is_stable_and_in_range() {
        let a = virt_imei_shard_for("35123456789012");
        assert_eq!(a, virt_imei_shard_for("35123456789012"));
        assert!(a < NUM_VIRTUAL_IMEI_SHARDS);
        // 只看前 14 位
        assert_eq!(
            virt_imei_shard_for("351234567890129"),
            virt_imei_shard_for("35123456789012")
        );
    }

    #[test]
    fn test_record_retention_predicate() {
        let cutoff = NaiveDate::from_ymd_opt(2017, 6, 1).unwrap();
        let conditions = ActiveConditionSet::new(vec!["gsma_not_found".to_string()]);
        let mut rec = ClassificationRecord {
            imei_norm: "35123456789012".to_string(),
            cond_name: "gsma_not_found".to_string(),
            start_date: NaiveDate::from_ymd_opt(2016, 1, 1).unwrap(),
            end_date: None,
            block_date: None,
        };
        assert!(rec.is_retained(cutoff, &conditions));

        rec.end_date = Some(cutoff);
        assert!(!rec.is_retained(cutoff, &conditions));

        rec.end_date = NaiveDate::from_ymd_opt(2017, 6, 2);
        assert!(rec.is_retained(cutoff, &conditions));

        rec.cond_name = "stolen".to_string();
        assert!(!rec.is_retained(cutoff, &conditions));
        assert!(!rec.is_retained(cutoff, &ActiveConditionSet::default()));
    }
}
