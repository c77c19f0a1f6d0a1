// ==========================================
// DIRBS 数据保留维护 - 保留配置读取 Trait
// ==========================================
// 职责: 定义裁剪任务所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::condition_config::ConditionConfig;
use crate::config::error::ConfigResult;
use crate::domain::classification::ActiveConditionSet;
use crate::domain::types::RetentionPolicy;
use async_trait::async_trait;

// ==========================================
// RetentionConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait RetentionConfigReader: Send + Sync {
    /// 获取保留策略
    ///
    /// # 默认值
    /// - 6 个月
    ///
    /// # 错误
    /// - 配置为负数或非整数时返回错误，不回落默认值
    async fn get_retention_policy(&self) -> ConfigResult<RetentionPolicy>;

    /// 获取已配置的分类条件
    ///
    /// # 默认值
    /// - 空列表
    async fn get_conditions(&self) -> ConfigResult<Vec<ConditionConfig>>;

    /// 获取启用的条件标签集合
    async fn get_active_conditions(&self) -> ConfigResult<ActiveConditionSet>;
}
