// ==========================================
// DIRBS 数据保留维护 - 分类条件配置
// ==========================================
// 存储: config_kv.conditions（JSON 数组）
// 只有配置中出现的条件才视为启用
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::config_manager::config_keys;
use crate::domain::classification::ActiveConditionSet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 单个分类条件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub label: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub blocking: bool,
    #[serde(default)]
    pub sticky: bool,
    #[serde(default)]
    pub grace_period_days: u32,
}

/// 解析并校验条件列表
///
/// # 校验
/// - label 非空
/// - label 不重复
///
/// # 示例
/// ```
/// use dirbs_prune::config::condition_config::parse_conditions;
///
/// let conds = parse_conditions(r#"[{"label": "gsma_not_found", "blocking": true}]"#).unwrap();
/// assert_eq!(conds[0].label, "gsma_not_found");
/// assert!(parse_conditions(r#"[{"label": ""}]"#).is_err());
/// ```
pub fn parse_conditions(raw: &str) -> ConfigResult<Vec<ConditionConfig>> {
    let conditions: Vec<ConditionConfig> =
        serde_json::from_str(raw).map_err(|e| ConfigError::Parse {
            key: config_keys::CONDITIONS.to_string(),
            message: e.to_string(),
        })?;

    let mut seen = HashSet::new();
    for cond in &conditions {
        let label = cond.label.trim();
        if label.is_empty() {
            return Err(ConfigError::Invalid {
                key: config_keys::CONDITIONS.to_string(),
                message: "条件 label 不能为空".to_string(),
            });
        }
        if !seen.insert(label.to_string()) {
            return Err(ConfigError::Invalid {
                key: config_keys::CONDITIONS.to_string(),
                message: format!("条件 label 重复: {}", label),
            });
        }
    }

    Ok(conditions)
}

/// 条件列表 → 启用标签集合
pub fn active_condition_set(conditions: &[ConditionConfig]) -> ActiveConditionSet {
    ActiveConditionSet::new(conditions.iter().map(|c| c.label.trim().to_string()).collect())
}
