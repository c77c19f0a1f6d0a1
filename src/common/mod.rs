// ==========================================
// DIRBS 数据保留维护 - 公共工具模块
// ==========================================
// 职责: 提供仓储层公共工具函数
// ==========================================

/// SQL 构建工具（标识符与参数分离）
pub mod sql_builder;

// 重新导出常用类型
pub use sql_builder::{Identifier, SqlFilter, SqlQueryBuilder, SqlStatement};
