use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::types::Semester;

/// 学期的近似起止日期（含首尾）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemesterWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SemesterWindow {
    /// 没有固定日期表的学期：从今天起 16 周
    pub const DEFAULT_WEEKS: i64 = 16;

    /// 按固定日期表推算学期范围，年份取 `today` 所在年份
    ///
    /// - Sem1: 9月1日 - 12月20日
    /// - Sem2: 2月1日 - 5月31日
    /// - Summer: 6月1日 - 8月31日
    /// - Other: 今天起 16 周
    pub fn for_semester(semester: Semester, today: NaiveDate) -> Self {
        let year = today.year();
        let fixed = match semester {
            Semester::Sem1 => Self::dates(year, (9, 1), (12, 20)),
            Semester::Sem2 => Self::dates(year, (2, 1), (5, 31)),
            Semester::Summer => Self::dates(year, (6, 1), (8, 31)),
            Semester::Other => None,
        };

        fixed.unwrap_or_else(|| Self {
            start: today,
            end: today + Duration::weeks(Self::DEFAULT_WEEKS),
        })
    }

    fn dates(year: i32, start: (u32, u32), end: (u32, u32)) -> Option<Self> {
        Some(Self {
            start: NaiveDate::from_ymd_opt(year, start.0, start.1)?,
            end: NaiveDate::from_ymd_opt(year, end.0, end.1)?,
        })
    }

    /// 学期开始当天或之后第一个指定星期几
    pub fn first_occurrence(&self, weekday: Weekday) -> NaiveDate {
        let offset = (7 + weekday.num_days_from_monday() - self.start.weekday().num_days_from_monday()) % 7;
        self.start + Duration::days(i64::from(offset))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}
