use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    Error, Result,
    catalog::Catalog,
    conflict::Conflict,
    ics::{IcsGenerator, IcsOptions},
    schedule::{ScheduleBook, ScheduleItem},
    types::{CourseOffering, Semester},
};

/// 分页结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

impl<T> Page<T> {
    pub const DEFAULT_PER_PAGE: usize = 20;

    /// 对完整结果分页；`page` 与 `per_page` 小于 1 时按 1 处理
    pub fn paginate(all: Vec<T>, page: usize, per_page: usize) -> Self {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let total = all.len();
        let total_pages = total.div_ceil(per_page);

        let items = all
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();

        Self {
            items,
            page,
            per_page,
            total,
            total_pages,
            has_prev: page > 1,
            has_next: page < total_pages,
        }
    }
}

/// 解析学期名称：缺省或空串为 Sem1，未知名称为 `None`
///
/// 未知学期在查询中得到空结果，加入课表返回 [`Error::InvalidSelection`]，
/// 导出返回 [`Error::EmptySchedule`]。
pub fn resolve_semester(name: Option<&str>) -> Option<Semester> {
    match name.map(str::trim) {
        None | Some("") => Some(Semester::default()),
        Some(name) => Semester::parse(name),
    }
}

/// 选课服务
pub struct Planner {
    catalog: Arc<Catalog>,
    ics: IcsGenerator,
}

impl Planner {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_ics_options(catalog, IcsOptions::default())
    }

    pub fn with_ics_options(catalog: Arc<Catalog>, options: IcsOptions) -> Self {
        Self {
            catalog,
            ics: IcsGenerator::new(options),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// 搜索课程并分页
    pub fn search(
        &self,
        query: &str,
        department: &str,
        semester: Option<&str>,
        page: usize,
        per_page: usize,
    ) -> Page<&CourseOffering> {
        let results = resolve_semester(semester)
            .map(|semester| self.catalog.search(query, department, semester))
            .unwrap_or_default();

        tracing::debug!(
            "Search {:?} in {:?} ({:?}): {} results",
            query,
            department,
            semester,
            results.len()
        );
        Page::paginate(results, page, per_page)
    }

    pub fn departments(&self, semester: Option<&str>) -> Vec<String> {
        resolve_semester(semester)
            .map(|semester| self.catalog.departments(semester))
            .unwrap_or_default()
    }

    /// 有开课的学期
    pub fn semesters(&self) -> Vec<Semester> {
        self.catalog.available_semesters()
    }

    pub fn course(&self, code: &str, semester: Option<&str>) -> Option<&CourseOffering> {
        self.catalog.offering(code, resolve_semester(semester)?)
    }

    /// 加入课表，失败时课表保持不变
    pub fn add_to_schedule(
        &self,
        book: &mut ScheduleBook,
        code: &str,
        label: &str,
        semester: Option<&str>,
    ) -> Result<ScheduleItem> {
        let semester = resolve_semester(semester).ok_or_else(|| Error::InvalidSelection {
            code: code.to_string(),
            label: label.to_string(),
        })?;

        let item = book
            .schedule_mut(semester)
            .add(&self.catalog, code, label)?
            .clone();
        tracing::info!("Added {} ({}) to {} schedule", code, label, semester);
        Ok(item)
    }

    /// 从课表移除课程，返回是否确实移除了
    pub fn remove_from_schedule(
        &self,
        book: &mut ScheduleBook,
        code: &str,
        semester: Option<&str>,
    ) -> bool {
        resolve_semester(semester).is_some_and(|semester| book.schedule_mut(semester).remove(code))
    }

    pub fn schedule_items(&self, book: &ScheduleBook, semester: Option<&str>) -> Vec<ScheduleItem> {
        resolve_semester(semester)
            .and_then(|semester| book.schedule(semester))
            .map(|schedule| schedule.items().to_vec())
            .unwrap_or_default()
    }

    pub fn check_conflicts(&self, book: &ScheduleBook, semester: Option<&str>) -> Vec<Conflict> {
        resolve_semester(semester)
            .and_then(|semester| book.schedule(semester))
            .map(|schedule| schedule.conflicts(&self.catalog))
            .unwrap_or_default()
    }

    /// 导出课表为 ICS
    pub fn export_calendar(&self, book: &ScheduleBook, semester: Option<&str>) -> Result<String> {
        let semester = resolve_semester(semester).ok_or(Error::EmptySchedule)?;
        self.ics
            .generate(&self.catalog, &book.selections(semester), semester)
    }

    pub fn export_calendar_at(
        &self,
        book: &ScheduleBook,
        semester: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let semester = resolve_semester(semester).ok_or(Error::EmptySchedule)?;
        self.ics
            .generate_at(&self.catalog, &book.selections(semester), semester, now)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::testing::{catalog_from, row};

    fn planner() -> Planner {
        let rows = (1..=45)
            .map(|n| {
                row(&format!("GEN{n:03}"), "1001", "1", &["FRI"], "08:00", "09:00")
                    .department(if n % 2 == 0 { "Arts" } else { "Science" })
                    .build()
            })
            .chain([
                row("COMP101", "001", "1", &["MON"], "09:00", "10:00")
                    .title("Programming")
                    .build(),
                row("COMP101", "1001", "2", &["MON"], "09:00", "10:00").build(),
                row("COMP102", "1A", "3", &["MON"], "09:30", "10:30").build(),
                row("COMP103", "2001", "4", &["TUE"], "09:30", "10:30").build(),
            ])
            .collect();
        Planner::new(Arc::new(catalog_from(rows)))
    }

    #[test]
    fn test_paginate_bounds() {
        let page = Page::paginate((1..=45).collect::<Vec<i32>>(), 3, 20);
        assert_eq!(page.items, (41..=45).collect::<Vec<_>>());
        assert_eq!(page.total, 45);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_prev);
        assert!(!page.has_next);

        let page = Page::paginate((1..=5).collect::<Vec<i32>>(), 0, 0);
        assert_eq!((page.page, page.per_page), (1, 1));
        assert_eq!(page.items, vec![1]);
        assert!(page.has_next);

        let page = Page::paginate(Vec::<i32>::new(), 1, 20);
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next && !page.has_prev);

        let past_end = Page::paginate((1..=5).collect::<Vec<i32>>(), 9, 20);
        assert!(past_end.items.is_empty());
    }

    #[test]
    fn test_resolve_semester() {
        assert_eq!(resolve_semester(None), Some(Semester::Sem1));
        assert_eq!(resolve_semester(Some(" ")), Some(Semester::Sem1));
        assert_eq!(resolve_semester(Some("Summer\n")), Some(Semester::Summer));
        assert_eq!(resolve_semester(Some("summer")), None);
        assert_eq!(resolve_semester(Some("Winter")), None);
    }

    #[test]
    fn test_search_defaults_to_sem1_and_paginates() {
        let planner = planner();
        let page = planner.search("", "", None, 1, Page::<()>::DEFAULT_PER_PAGE);
        assert_eq!(page.total, 47);
        assert_eq!(page.items.len(), 20);
        assert_eq!(page.items[0].code, "GEN001");

        let arts = planner.search("gen", "arts", Some("Sem1"), 1, 100);
        assert_eq!(arts.total, 22);
    }

    #[test]
    fn test_unknown_semester_gives_empty_results() {
        let planner = planner();
        assert_eq!(planner.search("", "", Some("Fall"), 1, 20).total, 0);
        assert!(planner.departments(Some("Fall")).is_empty());
        assert!(planner.course("COMP101", Some("Fall")).is_none());
    }

    #[test]
    fn test_departments_and_semesters() {
        let planner = planner();
        assert_eq!(planner.departments(None), vec!["Arts", "Science"]);
        assert_eq!(
            planner.semesters(),
            vec![Semester::Sem1, Semester::Sem2, Semester::Other]
        );
        assert_eq!(planner.course("COMP101", None).unwrap().title, "Programming");
        assert!(planner.course("COMP101", Some("Other")).is_some());
    }

    #[test]
    fn test_schedule_workflow() {
        let planner = planner();
        let mut book = ScheduleBook::default();

        planner
            .add_to_schedule(&mut book, "COMP101", "1001", None)
            .unwrap();
        let err = planner
            .add_to_schedule(&mut book, "COMP102", "1A", Some("Sem1"))
            .unwrap_err();
        assert!(matches!(err, Error::TimeConflict { .. }));
        assert!(matches!(
            planner.add_to_schedule(&mut book, "COMP101", "1001", None),
            Err(Error::DuplicateCourse(_))
        ));
        assert!(matches!(
            planner.add_to_schedule(&mut book, "COMP101", "1001", Some("Fall")),
            Err(Error::InvalidSelection { .. })
        ));

        planner
            .add_to_schedule(&mut book, "COMP103", "2001", Some("Sem2"))
            .unwrap();
        assert_eq!(planner.schedule_items(&book, None).len(), 1);
        assert_eq!(planner.schedule_items(&book, Some("Sem2")).len(), 1);
        assert!(planner.check_conflicts(&book, None).is_empty());

        assert!(planner.remove_from_schedule(&mut book, "COMP101", None));
        assert!(!planner.remove_from_schedule(&mut book, "COMP101", None));
        assert!(planner.schedule_items(&book, None).is_empty());
    }

    #[test]
    fn test_export_calendar() {
        let planner = planner();
        let mut book = ScheduleBook::default();
        let now = Utc.with_ymd_and_hms(2025, 10, 16, 0, 0, 0).unwrap();

        assert!(matches!(
            planner.export_calendar_at(&book, None, now),
            Err(Error::EmptySchedule)
        ));
        assert!(matches!(
            planner.export_calendar_at(&book, Some("Fall"), now),
            Err(Error::EmptySchedule)
        ));

        planner
            .add_to_schedule(&mut book, "COMP101", "1001", None)
            .unwrap();
        let ics = planner.export_calendar_at(&book, None, now).unwrap();
        assert!(ics.contains("DTSTART;TZID=Asia/Hong_Kong:20250901T090000"));
        assert!(ics.contains("RRULE:FREQ=WEEKLY;UNTIL=20251220T155959Z"));
    }
}
