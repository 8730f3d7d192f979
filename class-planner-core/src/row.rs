use std::collections::BTreeSet;

use crate::types::{DayCode, Semester, TimeSlot};

/// 表格中的一行原始记录，任意字段都可能缺失
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub course_code: Option<String>,
    pub course_title: Option<String>,
    pub department: Option<String>,
    pub term: Option<String>,
    pub career: Option<String>,
    pub class_section: Option<String>,
    pub class_number: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub venue: Option<String>,
    pub instructor: Option<String>,
    /// MON..SUN 列是否有值，顺序同 [`DayCode::ALL`]
    pub days: [bool; 7],
}

/// 标准化后的一条排课记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimetableEntry {
    pub course_code: String,
    pub course_title: String,
    pub department: String,
    pub term: String,
    pub career: String,
    pub section: String,
    pub class_number: String,
    pub semester: Semester,
    pub days: BTreeSet<DayCode>,
    pub start_time: String,
    pub end_time: String,
    pub venue: String,
    pub instructor: String,
}

fn text(value: Option<&String>) -> String {
    value.map(|s| s.trim().to_string()).unwrap_or_default()
}

impl TimetableEntry {
    /// 标准化一行记录。缺少课程代码的行返回 `None`。
    ///
    /// 没有任何上课星期的行同样保留，生成的时间段星期集合为空。
    pub fn from_raw(row: &RawRow) -> Option<Self> {
        let course_code = text(row.course_code.as_ref());
        if course_code.is_empty() {
            return None;
        }

        let section = text(row.class_section.as_ref());
        let days = DayCode::ALL
            .into_iter()
            .zip(row.days)
            .filter_map(|(day, present)| present.then_some(day))
            .collect();

        Some(Self {
            course_code,
            course_title: text(row.course_title.as_ref()),
            department: text(row.department.as_ref()),
            term: text(row.term.as_ref()),
            career: text(row.career.as_ref()),
            semester: Semester::from_section(&section),
            section,
            class_number: text(row.class_number.as_ref()),
            days,
            start_time: text(row.start_time.as_ref()),
            end_time: text(row.end_time.as_ref()),
            venue: text(row.venue.as_ref()),
            instructor: text(row.instructor.as_ref()),
        })
    }

    pub fn time_slot(&self) -> TimeSlot {
        TimeSlot {
            days: self.days.clone(),
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
            venue: self.venue.clone(),
            instructor: self.instructor.clone(),
        }
    }
}
