use std::{collections::BTreeSet, fmt};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// 学期
///
/// 由 CLASS SECTION 的首字符决定。声明顺序即对外展示顺序。
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Semester {
    /// 第一学期（9月-12月）
    #[default]
    Sem1,
    /// 第二学期（2月-5月）
    Sem2,
    /// 暑期学期
    Summer,
    /// 无法识别的学期
    Other,
}

impl Semester {
    /// 全部学期，按固定顺序
    pub const ALL: [Self; 4] = [Self::Sem1, Self::Sem2, Self::Summer, Self::Other];

    /// 从 CLASS SECTION 推断学期：'1' → Sem1，'2' → Sem2，'S' → Summer，其余 → Other
    pub fn from_section(section: &str) -> Self {
        match section.chars().next() {
            Some('1') => Self::Sem1,
            Some('2') => Self::Sem2,
            Some('S') => Self::Summer,
            _ => Self::Other,
        }
    }

    /// 解析查询参数中的学期名称，须与枚举名完全一致；未知名称返回 `None`
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|semester| semester.as_str() == name)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sem1 => "Sem1",
            Self::Sem2 => "Sem2",
            Self::Summer => "Summer",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 星期代码，对应表格中的 MON..SUN 列
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DayCode {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayCode {
    pub const ALL: [Self; 7] = [
        Self::Mon,
        Self::Tue,
        Self::Wed,
        Self::Thu,
        Self::Fri,
        Self::Sat,
        Self::Sun,
    ];

    /// 表格列名，同时也是对外的星期代码
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mon => "MON",
            Self::Tue => "TUE",
            Self::Wed => "WED",
            Self::Thu => "THU",
            Self::Fri => "FRI",
            Self::Sat => "SAT",
            Self::Sun => "SUN",
        }
    }

    pub const fn weekday(self) -> chrono::Weekday {
        match self {
            Self::Mon => chrono::Weekday::Mon,
            Self::Tue => chrono::Weekday::Tue,
            Self::Wed => chrono::Weekday::Wed,
            Self::Thu => chrono::Weekday::Thu,
            Self::Fri => chrono::Weekday::Fri,
            Self::Sat => chrono::Weekday::Sat,
            Self::Sun => chrono::Weekday::Sun,
        }
    }
}

impl fmt::Display for DayCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 解析 "HH:MM:SS" 或 "HH:MM" 格式的时间
pub fn parse_clock(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

/// 每周一次的上课安排
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// 上课星期；网课等异步课程为空
    pub days: BTreeSet<DayCode>,
    /// 开始时间，原样保留表格中的文本
    pub start_time: String,
    /// 结束时间
    pub end_time: String,
    pub venue: String,
    pub instructor: String,
}

impl TimeSlot {
    /// 解析后的起止时间；任一端无法解析时返回 `None`
    pub fn time_range(&self) -> Option<(NaiveTime, NaiveTime)> {
        Some((parse_clock(&self.start_time)?, parse_clock(&self.end_time)?))
    }
}

/// 一个可选的教学班（同一 CLASS NUMBER）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subclass {
    /// 用户选课时使用的标识，取自第一条记录的 CLASS SECTION
    pub label: String,
    pub section: String,
    pub class_number: String,
    /// 第一条记录的教师
    pub instructor: String,
    /// 按星期组合去重后的上课安排，保持输入顺序
    pub time_slots: Vec<TimeSlot>,
}

/// 某门课程在某个学期的开课信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseOffering {
    pub code: String,
    pub title: String,
    pub department: String,
    pub term: String,
    pub career: String,
    pub semester: Semester,
    /// 教学班，按首次出现顺序排列，label 唯一
    pub subclasses: Vec<Subclass>,
}

impl CourseOffering {
    /// 按 label 查找教学班
    pub fn subclass(&self, label: &str) -> Option<&Subclass> {
        self.subclasses.iter().find(|subclass| subclass.label == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semester_from_section() {
        assert_eq!(Semester::from_section("1A"), Semester::Sem1);
        assert_eq!(Semester::from_section("2B01"), Semester::Sem2);
        assert_eq!(Semester::from_section("S1"), Semester::Summer);
        assert_eq!(Semester::from_section("s1"), Semester::Other);
        assert_eq!(Semester::from_section("A"), Semester::Other);
        assert_eq!(Semester::from_section(""), Semester::Other);
    }

    #[test]
    fn test_semester_parse() {
        assert_eq!(Semester::parse("Sem1"), Some(Semester::Sem1));
        assert_eq!(Semester::parse(" Sem2 "), Some(Semester::Sem2));
        assert_eq!(Semester::parse("summer"), None);
        assert_eq!(Semester::parse("SEM2"), None);
        assert_eq!(Semester::parse("Fall"), None);
        assert_eq!(Semester::parse(""), None);
    }

    #[test]
    fn test_parse_clock() {
        assert_eq!(parse_clock("09:30:00"), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(parse_clock("09:30"), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(parse_clock(" 14:05 "), NaiveTime::from_hms_opt(14, 5, 0));
        assert_eq!(parse_clock(""), None);
        assert_eq!(parse_clock("TBA"), None);
        assert_eq!(parse_clock("25:00"), None);
    }

    #[test]
    fn test_day_code_serializes_as_column_name() {
        let json = serde_json::to_string(&DayCode::Wed).unwrap();
        assert_eq!(json, "\"WED\"");
        assert_eq!(DayCode::Sun.weekday(), chrono::Weekday::Sun);
    }
}
