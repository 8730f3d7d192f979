use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context as _, Result};
use class_planner_core::{Error, prelude::*};

use crate::cache::FileCache;

/// CLI 的课表保存在固定会话下
const SESSION_ID: &str = "cli";
const SESSION_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// 全局参数
pub struct Context {
    pub source: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
    pub semester: String,
}

impl Context {
    fn semester(&self) -> Option<&str> {
        Some(self.semester.as_str())
    }

    fn load_planner(&self, options: IcsOptions) -> Result<Planner> {
        let source = self
            .source
            .as_ref()
            .context("未指定课表文件，请使用 --source 或设置 TIMETABLE_PATH")?;
        let snapshot = self
            .snapshot
            .clone()
            .unwrap_or_else(|| default_snapshot_path(source));

        let catalog = CatalogLoader::new(WorkbookSource::new(source))
            .with_snapshot(snapshot)
            .load()
            .with_context(|| format!("加载课表失败: {}", source.display()))?;

        Ok(Planner::with_ics_options(Arc::new(catalog), options))
    }

    fn planner(&self) -> Result<Planner> {
        self.load_planner(IcsOptions::default())
    }

    fn sessions() -> Result<SessionStore> {
        let cache = FileCache::with_default_dir("class-planner")?;
        Ok(SessionStore::new(Arc::new(cache), SESSION_TTL))
    }

    fn require_semester(&self) -> Result<Semester> {
        resolve_semester(self.semester()).with_context(|| format!("未知的学期: {}", self.semester))
    }
}

/// 导出命令参数
pub struct ExportParams {
    pub output: Option<PathBuf>,
    pub calendar_name: Option<String>,
    pub include_instructor: bool,
    pub reminder_minutes: Option<u32>,
}

fn format_slot(slot: &TimeSlot) -> String {
    let days = if slot.days.is_empty() {
        "-".to_string()
    } else {
        slot.days
            .iter()
            .map(|d| d.as_str())
            .collect::<Vec<_>>()
            .join("/")
    };
    format!(
        "{} {}-{} {} {}",
        days, slot.start_time, slot.end_time, slot.venue, slot.instructor
    )
}

fn print_offering(offering: &CourseOffering) {
    println!("{} - {}", offering.code, offering.title);
    println!("  院系: {}", offering.department);
    println!("  学期: {} ({})", offering.semester, offering.term);
    if !offering.career.is_empty() {
        println!("  类别: {}", offering.career);
    }
    for subclass in &offering.subclasses {
        println!(
            "  [{}] 班号 {} {}",
            subclass.label, subclass.class_number, subclass.instructor
        );
        for slot in &subclass.time_slots {
            println!("      {}", format_slot(slot));
        }
    }
}

/// 搜索课程命令
pub async fn search_command(
    context: &Context,
    query: &str,
    department: &str,
    page: usize,
    per_page: usize,
) -> Result<()> {
    let planner = context.planner()?;
    let results = planner.search(query, department, context.semester(), page, per_page);

    if results.items.is_empty() {
        println!("没有找到匹配的课程");
        return Ok(());
    }

    for offering in &results.items {
        println!(
            "{:<12} {:<40} {} ({} 个教学班)",
            offering.code,
            offering.title,
            offering.department,
            offering.subclasses.len()
        );
    }
    println!(
        "第 {}/{} 页，共 {} 门课程",
        results.page, results.total_pages, results.total
    );

    Ok(())
}

/// 列出院系命令
pub async fn departments_command(context: &Context) -> Result<()> {
    let planner = context.planner()?;
    for department in planner.departments(context.semester()) {
        println!("{department}");
    }
    Ok(())
}

/// 列出学期命令
pub async fn semesters_command(context: &Context) -> Result<()> {
    let planner = context.planner()?;
    for semester in planner.semesters() {
        println!(
            "{} ({} 门课程)",
            semester,
            planner.catalog().offerings(semester).len()
        );
    }
    Ok(())
}

/// 课程详情命令
pub async fn show_command(context: &Context, code: &str) -> Result<()> {
    let planner = context.planner()?;
    let offering = planner
        .course(code, context.semester())
        .with_context(|| format!("{} 学期没有课程 {}", context.semester, code))?;

    print_offering(offering);
    Ok(())
}

/// 加入课表命令
pub async fn schedule_add_command(context: &Context, code: &str, subclass: &str) -> Result<()> {
    let planner = context.planner()?;
    let sessions = Context::sessions()?;
    let mut book = sessions.load(SESSION_ID).await?;

    match planner.add_to_schedule(&mut book, code, subclass, context.semester()) {
        Ok(item) => {
            sessions.save(SESSION_ID, &book).await?;
            println!("✓ 已加入 {} ({}) {}", item.course_code, item.subclass, item.course_title);
            Ok(())
        }
        Err(Error::TimeConflict { conflicts }) => {
            println!("✗ 时间冲突，未加入课表:");
            for conflict in &conflicts {
                println!("  {} <-> {}", conflict.first, conflict.second);
            }
            anyhow::bail!("{} 与已选课程时间冲突", code)
        }
        Err(e) => Err(e.into()),
    }
}

/// 移除课程命令
pub async fn schedule_remove_command(context: &Context, code: &str) -> Result<()> {
    let semester = context.require_semester()?;
    let sessions = Context::sessions()?;
    let mut book = sessions.load(SESSION_ID).await?;

    if book.schedule_mut(semester).remove(code) {
        sessions.save(SESSION_ID, &book).await?;
        println!("✓ 已移除 {code}");
    } else {
        println!("课表中没有 {code}");
    }
    Ok(())
}

/// 列出已选课程命令
pub async fn schedule_list_command(context: &Context) -> Result<()> {
    let semester = context.require_semester()?;
    let book = Context::sessions()?.load(SESSION_ID).await?;
    print_schedule(&book, semester);
    Ok(())
}

fn print_schedule(book: &ScheduleBook, semester: Semester) {
    let items = book.schedule(semester).map(|s| s.items()).unwrap_or_default();
    if items.is_empty() {
        println!("{semester} 课表为空");
        return;
    }

    println!("{semester} 课表:");
    for item in items {
        println!("  {} ({}) {}", item.course_code, item.subclass, item.course_title);
    }
}

/// 检查冲突命令
pub async fn schedule_conflicts_command(context: &Context) -> Result<()> {
    let planner = context.planner()?;
    let book = Context::sessions()?.load(SESSION_ID).await?;
    let conflicts = planner.check_conflicts(&book, context.semester());

    if conflicts.is_empty() {
        println!("✓ 没有时间冲突");
    } else {
        println!("发现 {} 处时间冲突:", conflicts.len());
        for conflict in &conflicts {
            println!("  {} <-> {}", conflict.first, conflict.second);
        }
    }
    Ok(())
}

/// 清空课表命令
pub async fn schedule_clear_command(context: &Context) -> Result<()> {
    let semester = context.require_semester()?;
    let sessions = Context::sessions()?;
    let mut book = sessions.load(SESSION_ID).await?;

    book.schedule_mut(semester).clear();
    sessions.save(SESSION_ID, &book).await?;
    println!("✓ 已清空 {semester} 课表");
    Ok(())
}

/// 导出ICS命令
pub async fn export_command(context: &Context, params: ExportParams) -> Result<()> {
    let semester = context.require_semester()?;
    let mut options = IcsOptions {
        include_instructor: params.include_instructor,
        reminder_minutes: params.reminder_minutes,
        ..IcsOptions::default()
    };
    if params.calendar_name.is_some() {
        options.calendar_name = params.calendar_name;
    }

    let planner = context.load_planner(options)?;
    let book = Context::sessions()?.load(SESSION_ID).await?;

    println!("生成ICS日历文件...");
    let ics_content = planner.export_calendar(&book, context.semester())?;

    // 确定输出文件名
    let output_file = params
        .output
        .unwrap_or_else(|| PathBuf::from(format!("schedule_{semester}.ics")));

    tokio::fs::write(&output_file, ics_content).await?;
    println!("✓ ICS文件已保存到: {}", output_file.display());

    Ok(())
}
