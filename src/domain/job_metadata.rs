// ==========================================
// DIRBS 数据保留维护 - 运行审计记录
// ==========================================
// 对齐: job_metadata 表
// 用途: 记录每次裁剪运行的输入与结果
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Success,
    Error,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Running => write!(f, "running"),
            JobStatus::Success => write!(f, "success"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(JobStatus::Running),
            "success" => Ok(JobStatus::Success),
            "error" => Ok(JobStatus::Error),
            other => Err(format!("未知的运行状态: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMetadata {
    pub run_id: String,
    pub command: String,
    pub subcommand: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    pub status: JobStatus,
    pub exception_info: Option<String>,
    pub extra_metadata: JsonValue, // 输入参数与结果（JSON 对象，逐步合并）
}
