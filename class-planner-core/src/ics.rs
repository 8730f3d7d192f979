use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, NaiveTime, Offset, Utc};

use crate::{
    Error, Result,
    catalog::Catalog,
    conflict::Selection,
    semester::SemesterWindow,
    types::Semester,
};

const DATETIME_FORMAT: &str = "%Y%m%dT%H%M%S";
const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const UID_DOMAIN: &str = "course-planner.local";
const MAX_LINE_OCTETS: usize = 75;

/// 固定偏移、无夏令时的民用时区
#[derive(Debug, Clone)]
pub struct CivilTimezone {
    /// TZID，例如 Asia/Hong_Kong
    pub tzid: String,
    /// TZNAME，例如 HKT
    pub abbreviation: String,
    pub offset: FixedOffset,
}

impl Default for CivilTimezone {
    fn default() -> Self {
        Self {
            tzid: "Asia/Hong_Kong".to_string(),
            abbreviation: "HKT".to_string(),
            offset: FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix()),
        }
    }
}

impl CivilTimezone {
    /// +0800 形式的偏移
    fn offset_text(&self) -> String {
        let seconds = self.offset.local_minus_utc();
        let sign = if seconds < 0 { '-' } else { '+' };
        let minutes = seconds.abs() / 60;
        format!("{}{:02}{:02}", sign, minutes / 60, minutes % 60)
    }

    fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        (local - Duration::seconds(i64::from(self.offset.local_minus_utc()))).and_utc()
    }
}

/// ICS 生成选项
#[derive(Debug, Clone)]
pub struct IcsOptions {
    /// 日历名称
    pub calendar_name: Option<String>,
    pub timezone: CivilTimezone,
    /// 是否包含课程描述
    pub include_description: bool,
    /// 描述中是否包含教师
    pub include_instructor: bool,
    /// 课前提醒（分钟）
    pub reminder_minutes: Option<u32>,
}

impl Default for IcsOptions {
    fn default() -> Self {
        Self {
            calendar_name: Some("Class Schedule".to_string()),
            timezone: CivilTimezone::default(),
            include_description: true,
            include_instructor: true,
            reminder_minutes: None,
        }
    }
}

/// 一个每周重复的上课事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub uid: String,
    /// 第一次上课的本地开始时间
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// 重复截止时间（学期最后一天 23:59:59，本地时间）
    pub until: NaiveDateTime,
    pub summary: String,
    pub description: String,
    pub location: String,
}

/// ICS日历生成器
pub struct IcsGenerator {
    options: IcsOptions,
}

impl IcsGenerator {
    pub const fn new(options: IcsOptions) -> Self {
        Self { options }
    }

    /// 以当前时间生成ICS日历内容
    pub fn generate(
        &self,
        catalog: &Catalog,
        selections: &[Selection],
        semester: Semester,
    ) -> Result<String> {
        self.generate_at(catalog, selections, semester, Utc::now())
    }

    /// 生成ICS日历内容
    ///
    /// `now` 决定学期日期表使用的年份以及 DTSTAMP / CREATED / LAST-MODIFIED。
    pub fn generate_at(
        &self,
        catalog: &Catalog,
        selections: &[Selection],
        semester: Semester,
        now: DateTime<Utc>,
    ) -> Result<String> {
        if selections.is_empty() {
            return Err(Error::EmptySchedule);
        }

        let events = self.plan_events(catalog, selections, semester, now);
        let tz = &self.options.timezone;
        let mut ics = String::new();

        // ICS文件头部
        push_line(&mut ics, "BEGIN:VCALENDAR");
        push_line(&mut ics, "VERSION:2.0");
        push_line(&mut ics, "PRODID:-//Course Planner//Course Schedule//EN");
        push_line(&mut ics, "CALSCALE:GREGORIAN");
        push_line(&mut ics, "METHOD:PUBLISH");
        if let Some(ref name) = self.options.calendar_name {
            push_line(&mut ics, &format!("X-WR-CALNAME:{}", escape_text(name)));
        }
        push_line(&mut ics, &format!("X-WR-TIMEZONE:{}", tz.tzid));

        push_line(&mut ics, "BEGIN:VTIMEZONE");
        push_line(&mut ics, &format!("TZID:{}", tz.tzid));
        push_line(&mut ics, "BEGIN:STANDARD");
        push_line(&mut ics, "DTSTART:19700101T000000");
        push_line(&mut ics, &format!("TZOFFSETFROM:{}", tz.offset_text()));
        push_line(&mut ics, &format!("TZOFFSETTO:{}", tz.offset_text()));
        push_line(&mut ics, &format!("TZNAME:{}", tz.abbreviation));
        push_line(&mut ics, "END:STANDARD");
        push_line(&mut ics, "END:VTIMEZONE");

        let stamp = now.format(UTC_FORMAT).to_string();
        for event in &events {
            self.add_event(&mut ics, event, &stamp);
        }

        push_line(&mut ics, "END:VCALENDAR");

        tracing::debug!(
            "Generated calendar for {} with {} events from {} selections",
            semester,
            events.len(),
            selections.len()
        );
        Ok(ics)
    }

    /// 展开为每周重复事件：每个 (教学班, 时间段, 星期) 一个
    ///
    /// 找不到的选课、无法解析的时间、落在学期之外的首次上课都会被跳过。
    pub fn plan_events(
        &self,
        catalog: &Catalog,
        selections: &[Selection],
        semester: Semester,
        now: DateTime<Utc>,
    ) -> Vec<CalendarEvent> {
        let tz = &self.options.timezone;
        let today = now.with_timezone(&tz.offset).date_naive();
        let window = SemesterWindow::for_semester(semester, today);
        let until = window.end.and_time(end_of_day());

        let mut events = Vec::new();
        for selection in selections {
            let Some(offering) = catalog.offering(&selection.course_code, semester) else {
                continue;
            };
            let Some(subclass) = offering.subclass(&selection.subclass) else {
                continue;
            };

            for slot in &subclass.time_slots {
                let Some((start_time, end_time)) = slot.time_range() else {
                    tracing::debug!(
                        "Skipping slot of {} with unparsable time {:?}-{:?}",
                        selection.describe(),
                        slot.start_time,
                        slot.end_time
                    );
                    continue;
                };

                for day in &slot.days {
                    let first = window.first_occurrence(day.weekday());
                    if !window.contains(first) {
                        continue;
                    }
                    let start = first.and_time(start_time);

                    events.push(CalendarEvent {
                        uid: format!(
                            "{}-{}-{}-{}@{}",
                            offering.code,
                            subclass.label,
                            day,
                            start.format(DATETIME_FORMAT),
                            UID_DOMAIN
                        ),
                        start,
                        end: first.and_time(end_time),
                        until,
                        summary: format!("{} - {}", offering.code, offering.title),
                        description: self.build_description(
                            &offering.code,
                            &subclass.label,
                            &slot.instructor,
                        ),
                        location: slot.venue.clone(),
                    });
                }
            }
        }
        events
    }

    /// 构建课程描述信息
    pub fn build_description(&self, code: &str, label: &str, instructor: &str) -> String {
        let mut description = format!("Course: {code}\nClass: {label}");
        if self.options.include_instructor {
            description.push_str(&format!("\nInstructor: {instructor}"));
        }
        description
    }

    /// 添加单个课程事件
    fn add_event(&self, ics: &mut String, event: &CalendarEvent, stamp: &str) {
        let tz = &self.options.timezone;

        push_line(ics, "BEGIN:VEVENT");
        push_line(ics, &format!("UID:{}", event.uid));
        push_line(ics, &format!("DTSTAMP:{stamp}"));
        push_line(
            ics,
            &format!("DTSTART;TZID={}:{}", tz.tzid, event.start.format(DATETIME_FORMAT)),
        );
        push_line(
            ics,
            &format!("DTEND;TZID={}:{}", tz.tzid, event.end.format(DATETIME_FORMAT)),
        );
        // DTSTART 带 TZID 时 UNTIL 必须为 UTC
        push_line(
            ics,
            &format!(
                "RRULE:FREQ=WEEKLY;UNTIL={}",
                tz.to_utc(event.until).format(UTC_FORMAT)
            ),
        );
        push_line(ics, &format!("SUMMARY:{}", escape_text(&event.summary)));

        if self.options.include_description {
            push_line(ics, &format!("DESCRIPTION:{}", escape_text(&event.description)));
        }
        if !event.location.is_empty() {
            push_line(ics, &format!("LOCATION:{}", escape_text(&event.location)));
        }

        push_line(ics, &format!("CREATED:{stamp}"));
        push_line(ics, &format!("LAST-MODIFIED:{stamp}"));

        // 添加提醒
        if let Some(minutes) = self.options.reminder_minutes {
            push_line(ics, "BEGIN:VALARM");
            push_line(ics, "ACTION:DISPLAY");
            push_line(ics, &format!("DESCRIPTION:{}", escape_text(&event.summary)));
            push_line(ics, &format!("TRIGGER:-PT{minutes}M"));
            push_line(ics, "END:VALARM");
        }

        push_line(ics, "END:VEVENT");
    }
}

impl Default for IcsGenerator {
    fn default() -> Self {
        Self::new(IcsOptions::default())
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

/// 转义ICS文本内容
fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\r', "")
        .replace(',', "\\,")
        .replace(';', "\\;")
}

/// 写入一行内容，超过 75 字节时按 RFC 5545 折行（不拆分 UTF-8 字符）
fn push_line(ics: &mut String, line: &str) {
    let mut width = 0;
    for ch in line.chars() {
        let len = ch.len_utf8();
        if width + len > MAX_LINE_OCTETS {
            ics.push_str("\r\n ");
            width = 1;
        }
        ics.push(ch);
        width += len;
    }
    ics.push_str("\r\n");
}
