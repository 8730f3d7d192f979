use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::{
    catalog::Catalog,
    types::{DayCode, Semester},
};

/// 选中的课程与教学班
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub course_code: String,
    /// 教学班 label
    pub subclass: String,
}

impl Selection {
    pub fn new(course_code: impl Into<String>, subclass: impl Into<String>) -> Self {
        Self {
            course_code: course_code.into(),
            subclass: subclass.into(),
        }
    }

    /// "CODE (label)"
    pub fn describe(&self) -> String {
        format!("{} ({})", self.course_code, self.subclass)
    }
}

/// 一对时间冲突的教学班
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub first: String,
    pub second: String,
}

struct Interval {
    day: DayCode,
    /// 时间无法解析时为 `None`，与任何区间都不冲突
    range: Option<(NaiveTime, NaiveTime)>,
    description: String,
}

/// 首尾相接（end1 == start2）不算冲突
fn overlaps(a: (NaiveTime, NaiveTime), b: (NaiveTime, NaiveTime)) -> bool {
    !(a.1 <= b.0 || b.1 <= a.0)
}

fn expand(catalog: &Catalog, selections: &[Selection], semester: Semester) -> Vec<Interval> {
    let mut intervals = Vec::new();
    for selection in selections {
        let Some(subclass) = catalog
            .offering(&selection.course_code, semester)
            .and_then(|offering| offering.subclass(&selection.subclass))
        else {
            tracing::debug!("Skipping unknown selection {}", selection.describe());
            continue;
        };

        for slot in &subclass.time_slots {
            let range = slot.time_range();
            for &day in &slot.days {
                intervals.push(Interval {
                    day,
                    range,
                    description: selection.describe(),
                });
            }
        }
    }
    intervals
}

/// 找出所选教学班之间的全部时间冲突
///
/// 每个选择按（时间段，星期）展开为区间后两两比较。
/// 不存在的课程或教学班会被忽略；时间格式错误的区间视为不冲突。
pub fn find_conflicts(
    catalog: &Catalog,
    selections: &[Selection],
    semester: Semester,
) -> Vec<Conflict> {
    let intervals = expand(catalog, selections, semester);

    let mut conflicts = Vec::new();
    for (i, a) in intervals.iter().enumerate() {
        for b in &intervals[i + 1..] {
            if a.day != b.day {
                continue;
            }
            let (Some(ra), Some(rb)) = (a.range, b.range) else {
                continue;
            };
            if overlaps(ra, rb) {
                conflicts.push(Conflict {
                    first: a.description.clone(),
                    second: b.description.clone(),
                });
            }
        }
    }
    conflicts
}
