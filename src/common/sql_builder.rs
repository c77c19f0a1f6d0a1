// ==========================================
// DIRBS 数据保留维护 - SQL 构建工具模块
// ==========================================
// 职责: 动态 SQL 构建
// 约束:
// - 表名/列名只能通过 Identifier 进入 SQL 文本（双引号转义）
// - 值只能通过绑定参数进入（`?` 占位 + params 列表）
// - 两类内容互不混用
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::types::Value;
use std::fmt;

// ==========================================
// Identifier - SQL 标识符
// ==========================================

/// 已校验的 SQL 标识符（表名、列名、索引名）
///
/// # 示例
/// ```
/// use dirbs_prune::common::sql_builder::Identifier;
///
/// let ident = Identifier::new("monthly_network_triplets_country_2017_05").unwrap();
/// assert_eq!(ident.quoted(), "\"monthly_network_triplets_country_2017_05\"");
///
/// let tricky = Identifier::new("a\"b").unwrap();
/// assert_eq!(tricky.quoted(), "\"a\"\"b\"");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// 校验并创建标识符
    ///
    /// # 错误
    /// - 空字符串 / 含 NUL 字符
    pub fn new(name: &str) -> RepositoryResult<Self> {
        if name.trim().is_empty() || name.contains('\0') {
            return Err(RepositoryError::InvalidIdentifier(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    /// 加引号并转义后的名称，可直接拼入 SQL 文本
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0.replace('"', "\"\""))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.quoted())
    }
}

fn date_value(date: NaiveDate) -> Value {
    Value::Text(date.format("%Y-%m-%d").to_string())
}

// ==========================================
// SqlFilter - 带参数的过滤条件片段
// ==========================================

/// 过滤条件片段：SQL 文本 + 按出现顺序排列的参数
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFilter {
    sql: String,
    params: Vec<Value>,
}

impl SqlFilter {
    /// 恒假条件
    pub fn never() -> Self {
        Self {
            sql: "0".to_string(),
            params: Vec::new(),
        }
    }

    /// `(column IS NULL OR column > ?)`
    pub fn null_or_after(column: &Identifier, date: NaiveDate) -> Self {
        Self {
            sql: format!("({col} IS NULL OR {col} > ?)", col = column),
            params: vec![date_value(date)],
        }
    }

    /// `column < ?`（NULL 不满足）
    pub fn before(column: &Identifier, date: NaiveDate) -> Self {
        Self {
            sql: format!("{} < ?", column),
            params: vec![date_value(date)],
        }
    }

    /// column 以任一前缀开头；前缀列表为空时恒假
    ///
    /// # 示例
    /// ```
    /// use dirbs_prune::common::sql_builder::{Identifier, SqlFilter};
    ///
    /// let col = Identifier::new("cond_name").unwrap();
    /// let f = SqlFilter::starts_with_any(&col, &["gsma".to_string()]);
    /// assert_eq!(f.sql(), "(substr(\"cond_name\", 1, length(?)) = ?)");
    /// assert_eq!(f.params().len(), 2);
    /// ```
    pub fn starts_with_any(column: &Identifier, prefixes: &[String]) -> Self {
        if prefixes.is_empty() {
            return Self::never();
        }

        let mut clauses = Vec::with_capacity(prefixes.len());
        let mut params = Vec::with_capacity(prefixes.len() * 2);
        for prefix in prefixes {
            clauses.push(format!("substr({}, 1, length(?)) = ?", column));
            params.push(Value::Text(prefix.clone()));
            params.push(Value::Text(prefix.clone()));
        }

        Self {
            sql: format!("({})", clauses.join(" OR ")),
            params,
        }
    }

    /// 合取
    pub fn and(mut self, other: SqlFilter) -> Self {
        self.sql = format!("({}) AND ({})", self.sql, other.sql);
        self.params.extend(other.params);
        self
    }

    /// 取反
    pub fn not(mut self) -> Self {
        self.sql = format!("NOT ({})", self.sql);
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

// ==========================================
// SqlStatement - 构建结果
// ==========================================

/// 可直接执行的语句：SQL 文本 + 绑定参数
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl SqlStatement {
    /// 适配 rusqlite 的参数迭代器
    pub fn bind(&self) -> rusqlite::ParamsFromIter<std::slice::Iter<'_, Value>> {
        rusqlite::params_from_iter(self.params.iter())
    }
}

// ==========================================
// SqlQueryBuilder - 流式构建器
// ==========================================

/// SQL 查询构建器（流式 API）
///
/// # 示例
/// ```
/// use dirbs_prune::common::sql_builder::{Identifier, SqlFilter, SqlQueryBuilder};
///
/// let table = Identifier::new("classification_state").unwrap();
/// let end_date = Identifier::new("end_date").unwrap();
/// let cutoff = chrono::NaiveDate::from_ymd_opt(2017, 6, 1).unwrap();
///
/// let stmt = SqlQueryBuilder::new(format!("SELECT COUNT(*) FROM {}", table))
///     .filter(SqlFilter::before(&end_date, cutoff))
///     .build();
///
/// assert_eq!(stmt.sql, "SELECT COUNT(*) FROM \"classification_state\" WHERE \"end_date\" < ?");
/// assert_eq!(stmt.params.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct SqlQueryBuilder {
    select_clause: String,
    filters: Vec<SqlFilter>,
    order_by_clause: Option<String>,
}

impl SqlQueryBuilder {
    /// 创建新的 SQL 查询构建器
    ///
    /// select 中的表名/列名须已通过 Identifier 转义
    pub fn new(select: impl Into<String>) -> Self {
        Self {
            select_clause: select.into(),
            filters: Vec::new(),
            order_by_clause: None,
        }
    }

    /// 添加过滤条件（多个条件以 AND 连接）
    pub fn filter(mut self, filter: SqlFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// 条件添加过滤
    pub fn filter_if(mut self, filter: Option<SqlFilter>) -> Self {
        if let Some(f) = filter {
            self.filters.push(f);
        }
        self
    }

    /// 按列排序
    pub fn order_by(mut self, columns: &[&Identifier]) -> Self {
        if !columns.is_empty() {
            let cols: Vec<String> = columns.iter().map(|c| c.quoted()).collect();
            self.order_by_clause = Some(cols.join(", "));
        }
        self
    }

    /// 构建最终语句
    pub fn build(self) -> SqlStatement {
        let mut sql = self.select_clause;
        let mut params = Vec::new();

        if !self.filters.is_empty() {
            let clauses: Vec<&str> = self.filters.iter().map(|f| f.sql()).collect();
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
            for f in self.filters {
                params.extend(f.params);
            }
        }

        if let Some(order) = self.order_by_clause {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }

        SqlStatement { sql, params }
    }
}

// ==========================================
// 单元测试
// ==========================================
