use crate::{builder, catalog::Catalog, row::RawRow, source::DAY_COLUMNS};

pub struct RowBuilder {
    row: RawRow,
}

impl RowBuilder {
    pub fn new(code: &str) -> Self {
        Self {
            row: RawRow {
                course_code: Some(code.to_string()),
                class_number: Some("1".to_string()),
                ..RawRow::default()
            },
        }
    }

    pub fn section(mut self, section: &str) -> Self {
        self.row.class_section = Some(section.to_string());
        self
    }

    pub fn class_number(mut self, number: &str) -> Self {
        self.row.class_number = Some(number.to_string());
        self
    }

    pub fn days(mut self, days: &[&str]) -> Self {
        self.row.days = DAY_COLUMNS.map(|column| days.contains(&column));
        self
    }

    pub fn times(mut self, start: &str, end: &str) -> Self {
        self.row.start_time = Some(start.to_string()).filter(|s| !s.is_empty());
        self.row.end_time = Some(end.to_string()).filter(|s| !s.is_empty());
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.row.course_title = Some(title.to_string());
        self
    }

    pub fn department(mut self, department: &str) -> Self {
        self.row.department = Some(department.to_string());
        self
    }

    pub fn venue(mut self, venue: &str) -> Self {
        self.row.venue = Some(venue.to_string());
        self
    }

    pub fn instructor(mut self, instructor: &str) -> Self {
        self.row.instructor = Some(instructor.to_string());
        self
    }

    pub fn build(self) -> RawRow {
        self.row
    }
}

/// 常用写法：课程代码、section、class number、星期、起止时间
pub fn row(
    code: &str,
    section: &str,
    class_number: &str,
    days: &[&str],
    start: &str,
    end: &str,
) -> RowBuilder {
    RowBuilder::new(code)
        .section(section)
        .class_number(class_number)
        .days(days)
        .times(start, end)
}

pub fn catalog_from(rows: Vec<RawRow>) -> Catalog {
    builder::build(&rows)
}
