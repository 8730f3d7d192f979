use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};

use calamine::{Data, ExcelDateTime, Reader, open_workbook_auto};

use crate::{Error, Result, row::RawRow};

pub const COURSE_CODE: &str = "COURSE CODE";
pub const COURSE_TITLE: &str = "COURSE TITLE";
pub const OFFER_DEPT: &str = "OFFER DEPT";
pub const TERM: &str = "TERM";
pub const ACAD_CAREER: &str = "ACAD_CAREER";
pub const CLASS_SECTION: &str = "CLASS SECTION";
pub const CLASS_NUMBER: &str = "CLASS NUMBER";
pub const START_TIME: &str = "START TIME";
pub const END_TIME: &str = "END TIME";
pub const VENUE: &str = "VENUE";
pub const INSTRUCTOR: &str = "INSTRUCTOR";
pub const DAY_COLUMNS: [&str; 7] = ["MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

/// 课表数据来源
pub trait TimetableSource: Send + Sync {
    /// 用于日志的来源描述
    fn describe(&self) -> String;

    /// 来源的最后修改时间，用于判断快照是否过期
    fn modified(&self) -> Result<SystemTime>;

    /// 读取全部原始行。缺少必需列时返回 [`Error::MissingColumns`]。
    fn read_rows(&self) -> Result<Vec<RawRow>>;
}

/// 第一张工作表的表头和数据行
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    /// 已去除首尾空白的列名
    pub headers: Vec<String>,
    /// 每一行的单元格文本，空单元格为 `None`
    pub rows: Vec<Vec<Option<String>>>,
}

struct ColumnIndex {
    course_code: usize,
    course_title: usize,
    department: usize,
    term: usize,
    career: usize,
    class_section: usize,
    class_number: usize,
    start_time: usize,
    end_time: usize,
    venue: usize,
    instructor: usize,
    days: [usize; 7],
}

impl ColumnIndex {
    fn resolve(headers: &[String]) -> Result<Self> {
        let mut missing = Vec::new();
        let mut find = |name: &str| {
            headers.iter().position(|h| h == name).unwrap_or_else(|| {
                missing.push(name.to_string());
                usize::MAX
            })
        };

        let index = Self {
            course_code: find(COURSE_CODE),
            course_title: find(COURSE_TITLE),
            department: find(OFFER_DEPT),
            term: find(TERM),
            career: find(ACAD_CAREER),
            class_section: find(CLASS_SECTION),
            class_number: find(CLASS_NUMBER),
            start_time: find(START_TIME),
            end_time: find(END_TIME),
            venue: find(VENUE),
            instructor: find(INSTRUCTOR),
            days: DAY_COLUMNS.map(&mut find),
        };

        if missing.is_empty() {
            Ok(index)
        } else {
            Err(Error::MissingColumns(missing))
        }
    }
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let headers = headers.into_iter().map(|h| h.trim().to_string()).collect();
        Self { headers, rows }
    }

    /// 按列名映射为 [`RawRow`]
    pub fn into_raw_rows(self) -> Result<Vec<RawRow>> {
        let columns = ColumnIndex::resolve(&self.headers)?;

        let rows = self
            .rows
            .into_iter()
            .map(|cells| {
                let cell = |idx: usize| cells.get(idx).cloned().flatten();
                RawRow {
                    course_code: cell(columns.course_code),
                    course_title: cell(columns.course_title),
                    department: cell(columns.department),
                    term: cell(columns.term),
                    career: cell(columns.career),
                    class_section: cell(columns.class_section),
                    class_number: cell(columns.class_number),
                    start_time: cell(columns.start_time),
                    end_time: cell(columns.end_time),
                    venue: cell(columns.venue),
                    instructor: cell(columns.instructor),
                    days: columns.days.map(|idx| cell(idx).is_some()),
                }
            })
            .collect();

        Ok(rows)
    }
}

/// Excel / ODS 课表文件
#[derive(Debug, Clone)]
pub struct WorkbookSource {
    path: PathBuf,
}

impl WorkbookSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取第一张工作表
    pub fn read_table(&self) -> Result<RawTable> {
        let mut workbook = open_workbook_auto(&self.path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| Error::EmptyWorkbook(self.path.display().to_string()))??;

        let mut rows = range.rows();
        let headers = rows
            .next()
            .map(|header| {
                header
                    .iter()
                    .map(|cell| cell_text(cell).unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default();
        let rows = rows
            .map(|row| row.iter().map(cell_text).collect())
            .collect();

        Ok(RawTable::new(headers, rows))
    }
}

impl TimetableSource for WorkbookSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn modified(&self) -> Result<SystemTime> {
        Ok(std::fs::metadata(&self.path)?.modified()?)
    }

    fn read_rows(&self) -> Result<Vec<RawRow>> {
        let table = self.read_table()?;
        tracing::debug!(
            "Read {} rows with {} columns from {}",
            table.rows.len(),
            table.headers.len(),
            self.path.display()
        );
        table.into_raw_rows()
    }
}

/// 单元格转文本；空白单元格与错误值视为缺失
pub fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(format_number(*f)),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => excel_datetime_text(dt),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

/// 整数值的浮点数按整数输出（CLASS NUMBER 常被存成 1234.0）
#[allow(clippy::cast_possible_truncation)]
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}

/// 纯时间值（序列号小于 1）输出为 HH:MM:SS
fn excel_datetime_text(value: &ExcelDateTime) -> Option<String> {
    let datetime = value.as_datetime()?;
    let text = if value.as_f64() < 1.0 {
        datetime.format("%H:%M:%S").to_string()
    } else {
        datetime.format("%Y-%m-%d %H:%M:%S").to_string()
    };
    Some(text)
}
