// ==========================================
// DIRBS 数据保留维护 - 保留窗口计算
// ==========================================
// cutoff = 当月第一天 - months_retention 个月
// 两个裁剪命令必须使用同一计算
// ==========================================

use crate::domain::types::RetentionPolicy;
use crate::engine::error::{PruneError, PruneResult};
use chrono::{Datelike, Local, Months, NaiveDate};

/// 所在月份第一天
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    // day=1 对任意合法日期都成立
    date.with_day(1).unwrap_or(date)
}

/// 计算保留截止日期；超出日历可表示范围时返回 None
pub fn compute_cutoff(curr_date: NaiveDate, months_retention: u32) -> Option<NaiveDate> {
    first_of_month(curr_date).checked_sub_months(Months::new(months_retention))
}

pub struct RetentionWindowCalculator;

impl RetentionWindowCalculator {
    /// 计算截止日期
    ///
    /// # 参数
    /// - curr_date: 当前日期；None 时使用系统本地日期
    /// - policy: 保留策略
    ///
    /// # 返回
    /// - 截止日期（含）：早于该日期的月份可被裁剪
    pub fn cutoff(curr_date: Option<NaiveDate>, policy: RetentionPolicy) -> PruneResult<NaiveDate> {
        let curr_date = curr_date.unwrap_or_else(|| Local::now().date_naive());
        compute_cutoff(curr_date, policy.months_retention()).ok_or_else(|| {
            PruneError::Configuration(format!(
                "保留月数 {} 使截止日期超出可表示范围 (curr_date={})",
                policy.months_retention(),
                curr_date
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_cutoff_twelve_months() {
        assert_eq!(compute_cutoff(d(2018, 6, 15), 12), Some(d(2017, 6, 1)));
    }

    #[test]
    fn test_cutoff_zero_months_is_current_month_start() {
        assert_eq!(compute_cutoff(d(2018, 6, 15), 0), Some(d(2018, 6, 1)));
        assert_eq!(compute_cutoff(d(2018, 6, 1), 0), Some(d(2018, 6, 1)));
    }

    #[test]
    fn test_cutoff_crosses_year_boundary() {
        assert_eq!(compute_cutoff(d(2018, 2, 28), 3), Some(d(2017, 11, 1)));
        assert_eq!(compute_cutoff(d(2018, 1, 31), 1), Some(d(2017, 12, 1)));
        assert_eq!(compute_cutoff(d(2020, 3, 31), 25), Some(d(2018, 2, 1)));
    }

    #[test]
    fn test_cutoff_matches_definition_for_range() {
        let curr = d(2018, 6, 15);
        for months in 0..240u32 {
            let cutoff = compute_cutoff(curr, months).unwrap();
            assert_eq!(cutoff.day(), 1);
            let elapsed = (curr.year() - cutoff.year()) * 12 + curr.month() as i32
                - cutoff.month() as i32;
            assert_eq!(elapsed, months as i32);
        }
    }

    #[test]
    fn test_calculator_defaults_to_today() {
        let cutoff = RetentionWindowCalculator::cutoff(None, RetentionPolicy::new(0)).unwrap();
        assert_eq!(cutoff, first_of_month(Local::now().date_naive()));
    }

    #[test]
    fn test_calculator_rejects_unrepresentable_cutoff() {
        let err = RetentionWindowCalculator::cutoff(Some(d(2018, 6, 15)), RetentionPolicy::new(u32::MAX))
            .unwrap_err();
        assert!(matches!(err, PruneError::Configuration(_)));
    }
}
