use std::collections::{BTreeSet, HashMap};

use crate::{
    catalog::Catalog,
    row::{RawRow, TimetableEntry},
    types::{CourseOffering, DayCode, Semester, Subclass, TimeSlot},
};

struct CourseGroup {
    first: TimetableEntry,
    semesters: Vec<(Semester, Vec<TimetableEntry>)>,
}

/// 课表构建器
///
/// 按课程代码、学期、班号逐级分组，同一键以先出现者为准：
///
/// * 课程名称、院系、学年与类别取自该课程代码的第一行，各学期共用
/// * 教学班标识取自其第一行的 CLASS SECTION
/// * 星期组合相同的时间段只保留第一个
/// * 两个班号使用同一标识时，后者替换前者并保留前者的位置
#[derive(Default)]
pub struct TimetableBuilder {
    courses: Vec<CourseGroup>,
    index: HashMap<String, usize>,
    skipped: usize,
}

impl TimetableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入一行原始记录，缺少课程代码的行被跳过
    pub fn push_row(&mut self, row: &RawRow) {
        match TimetableEntry::from_raw(row) {
            Some(entry) => self.push_entry(entry),
            None => self.skipped += 1,
        }
    }

    pub fn push_entry(&mut self, entry: TimetableEntry) {
        let idx = match self.index.get(&entry.course_code) {
            Some(&idx) => idx,
            None => {
                self.index
                    .insert(entry.course_code.clone(), self.courses.len());
                self.courses.push(CourseGroup {
                    first: entry.clone(),
                    semesters: Vec::new(),
                });
                self.courses.len() - 1
            }
        };

        let group = &mut self.courses[idx];
        match group
            .semesters
            .iter_mut()
            .find(|(semester, _)| *semester == entry.semester)
        {
            Some((_, entries)) => entries.push(entry),
            None => group.semesters.push((entry.semester, vec![entry])),
        }
    }

    /// 生成目录
    pub fn finish(self) -> Catalog {
        let mut catalog = Catalog::default();

        for course in self.courses {
            let first = &course.first;
            for (semester, entries) in &course.semesters {
                let subclasses = build_subclasses(entries);
                if subclasses.is_empty() {
                    continue;
                }
                catalog.insert(CourseOffering {
                    code: first.course_code.clone(),
                    title: first.course_title.clone(),
                    department: first.department.clone(),
                    term: first.term.clone(),
                    career: first.career.clone(),
                    semester: *semester,
                    subclasses,
                });
            }
        }

        tracing::info!(
            "Built catalog: {} offerings, {} rows without course code skipped",
            catalog.len(),
            self.skipped
        );
        catalog
    }
}

/// 从原始行构建目录
pub fn build(rows: &[RawRow]) -> Catalog {
    let mut builder = TimetableBuilder::new();
    for row in rows {
        builder.push_row(row);
    }
    builder.finish()
}

fn build_subclasses(entries: &[TimetableEntry]) -> Vec<Subclass> {
    let mut by_class_number: Vec<(&str, Vec<&TimetableEntry>)> = Vec::new();
    for entry in entries {
        match by_class_number
            .iter_mut()
            .find(|(number, _)| *number == entry.class_number)
        {
            Some((_, group)) => group.push(entry),
            None => by_class_number.push((entry.class_number.as_str(), vec![entry])),
        }
    }

    let mut subclasses: Vec<Subclass> = Vec::with_capacity(by_class_number.len());
    for (class_number, group) in by_class_number {
        let Some(first) = group.first() else {
            continue;
        };

        let subclass = Subclass {
            label: first.section.clone(),
            section: first.section.clone(),
            class_number: class_number.to_string(),
            instructor: first.instructor.clone(),
            time_slots: dedup_slots(&group),
        };

        match subclasses.iter_mut().find(|s| s.label == subclass.label) {
            Some(existing) => {
                tracing::debug!(
                    "Class number {} reuses label {} of class number {}",
                    subclass.class_number,
                    subclass.label,
                    existing.class_number
                );
                *existing = subclass;
            }
            None => subclasses.push(subclass),
        }
    }
    subclasses
}

fn dedup_slots(entries: &[&TimetableEntry]) -> Vec<TimeSlot> {
    let mut seen: Vec<&BTreeSet<DayCode>> = Vec::new();
    let mut slots = Vec::new();
    for entry in entries {
        if seen.contains(&&entry.days) {
            continue;
        }
        seen.push(&entry.days);
        slots.push(entry.time_slot());
    }
    slots
}
