// ==========================================
// DIRBS 数据保留维护 - 核心库
// ==========================================
// 职责: 按保留策略裁剪月度三元组分区与 classification_state
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 裁剪规则
pub mod engine;

// 公共组件（SQL 构建）
pub mod common;

// 配置层 - 保留策略与条件
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/角色作用域）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 裁剪任务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{InvalidRetentionPolicy, RetentionPolicy};

// 领域实体
pub use domain::{
    ActiveConditionSet, ClassificationRecord, JobMetadata, JobStatus, LeafPartition,
    PartitionIdentity, PartitionedTable, ShardCount, TripletObservation, YearMonth,
};

// 引擎
pub use engine::{
    PartitionInventory, PartitionPruner, PruneError, RetentionWindowCalculator,
    ShardedTableRebuilder, TableRowAccountant,
};

// API
pub use api::{ApiError, PruneApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "DIRBS 数据保留维护";
