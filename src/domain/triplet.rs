// ==========================================
// DIRBS 数据保留维护 - 月度三元组观测记录
// ==========================================
// 对齐: 月度分区叶子表结构
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripletObservation {
    pub triplet_year: i32,
    pub triplet_month: u32,
    pub first_seen: NaiveDate,
    pub last_seen: NaiveDate,
    pub imei_norm: Option<String>,
    pub imsi: Option<String>,
    pub msisdn: Option<String>,
    pub operator_id: Option<String>,
}

impl TripletObservation {
    /// 以该月第一天作为首末次出现日期的最小观测
    pub fn in_month(year: i32, month: u32, imei_norm: &str) -> Option<Self> {
        let day = NaiveDate::from_ymd_opt(year, month, 1)?;
        Some(Self {
            triplet_year: year,
            triplet_month: month,
            first_seen: day,
            last_seen: day,
            imei_norm: Some(imei_norm.to_string()),
            imsi: None,
            msisdn: None,
            operator_id: None,
        })
    }
}
