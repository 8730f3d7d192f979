use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    catalog::Catalog,
    conflict::{Conflict, Selection, find_conflicts},
    types::Semester,
};

/// 课表中的一门课
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub course_code: String,
    pub subclass: String,
    pub course_title: String,
    pub semester: Semester,
}

impl ScheduleItem {
    pub fn selection(&self) -> Selection {
        Selection::new(self.course_code.clone(), self.subclass.clone())
    }
}

/// 某个学期的课表，每门课最多一个教学班
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    semester: Semester,
    items: Vec<ScheduleItem>,
}

impl Schedule {
    pub const fn new(semester: Semester) -> Self {
        Self {
            semester,
            items: Vec::new(),
        }
    }

    pub fn items(&self) -> &[ScheduleItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, course_code: &str) -> bool {
        self.items.iter().any(|item| item.course_code == course_code)
    }

    pub fn selections(&self) -> Vec<Selection> {
        self.items.iter().map(ScheduleItem::selection).collect()
    }

    /// 加入一个教学班
    ///
    /// 依次检查：教学班存在、课程未选、与已有课程无时间冲突。
    /// 任何一项失败都不会修改课表。
    pub fn add(&mut self, catalog: &Catalog, course_code: &str, label: &str) -> Result<&ScheduleItem> {
        let offering = catalog
            .offering(course_code, self.semester)
            .filter(|offering| offering.subclass(label).is_some())
            .ok_or_else(|| Error::InvalidSelection {
                code: course_code.to_string(),
                label: label.to_string(),
            })?;

        if self.contains(course_code) {
            return Err(Error::DuplicateCourse(course_code.to_string()));
        }

        let mut candidate = self.selections();
        candidate.push(Selection::new(course_code, label));
        let conflicts = find_conflicts(catalog, &candidate, self.semester);
        if !conflicts.is_empty() {
            return Err(Error::TimeConflict { conflicts });
        }

        tracing::debug!("Adding {} ({}) to {} schedule", course_code, label, self.semester);
        self.items.push(ScheduleItem {
            course_code: offering.code.clone(),
            subclass: label.to_string(),
            course_title: offering.title.clone(),
            semester: self.semester,
        });
        Ok(&self.items[self.items.len() - 1])
    }

    /// 按课程代码移除，返回是否确实移除了
    pub fn remove(&mut self, course_code: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.course_code != course_code);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// 课表内的全部时间冲突
    pub fn conflicts(&self, catalog: &Catalog) -> Vec<Conflict> {
        find_conflicts(catalog, &self.selections(), self.semester)
    }
}

/// 一个用户在各学期的课表
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleBook {
    schedules: BTreeMap<Semester, Schedule>,
}

impl ScheduleBook {
    pub fn schedule(&self, semester: Semester) -> Option<&Schedule> {
        self.schedules.get(&semester)
    }

    pub fn schedule_mut(&mut self, semester: Semester) -> &mut Schedule {
        self.schedules
            .entry(semester)
            .or_insert_with(|| Schedule::new(semester))
    }

    /// 某学期的选课，没有课表时为空
    pub fn selections(&self, semester: Semester) -> Vec<Selection> {
        self.schedule(semester)
            .map(Schedule::selections)
            .unwrap_or_default()
    }
}
