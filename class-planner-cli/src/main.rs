mod cache;
mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "class-planner")]
#[command(about = "课程表查询、选课冲突检查与ICS导出工具")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 课表文件（xlsx / xls / ods）
    #[arg(long, global = true, env = "TIMETABLE_PATH")]
    source: Option<PathBuf>,

    /// 目录快照路径，默认与课表文件同名、扩展名为 .cache
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// 学期 (Sem1, Sem2, Summer, Other)
    #[arg(long, global = true, default_value = "Sem1")]
    semester: String,

    /// 启用详细日志
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 按课程代码或名称搜索
    Search {
        /// 关键字，留空列出全部
        #[arg(default_value = "")]
        query: String,

        /// 开课院系
        #[arg(short, long, default_value = "")]
        department: String,

        #[arg(long, default_value = "1")]
        page: usize,

        #[arg(long, default_value = "20")]
        per_page: usize,
    },

    /// 列出开课院系
    Departments,

    /// 列出有开课的学期
    Semesters,

    /// 显示课程详情
    Show {
        /// 课程代码
        code: String,
    },

    /// 课表相关命令
    Schedule {
        #[command(subcommand)]
        action: ScheduleCommands,
    },

    /// 导出课表为ICS文件
    Export {
        /// 输出文件路径
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 日历名称
        #[arg(long)]
        calendar_name: Option<String>,

        /// 描述中不包含教师
        #[arg(long)]
        no_instructor: bool,

        /// 提醒时间（分钟）
        #[arg(long)]
        reminder_minutes: Option<u32>,
    },
}

#[derive(Subcommand)]
enum ScheduleCommands {
    /// 加入一个教学班
    Add {
        /// 课程代码
        code: String,
        /// 教学班
        subclass: String,
    },

    /// 移除课程
    Remove {
        /// 课程代码
        code: String,
    },

    /// 列出已选课程
    List,

    /// 检查时间冲突
    Conflicts,

    /// 清空课表
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 设置日志级别
    let log_level = if cli.verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("class_planner_cli={log_level},class_planner_core={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let context = commands::Context {
        source: cli.source,
        snapshot: cli.snapshot,
        semester: cli.semester,
    };

    match cli.command {
        Commands::Search {
            query,
            department,
            page,
            per_page,
        } => commands::search_command(&context, &query, &department, page, per_page).await,

        Commands::Departments => commands::departments_command(&context).await,

        Commands::Semesters => commands::semesters_command(&context).await,

        Commands::Show { code } => commands::show_command(&context, &code).await,

        Commands::Schedule { action } => match action {
            ScheduleCommands::Add { code, subclass } => {
                commands::schedule_add_command(&context, &code, &subclass).await
            }
            ScheduleCommands::Remove { code } => {
                commands::schedule_remove_command(&context, &code).await
            }
            ScheduleCommands::List => commands::schedule_list_command(&context).await,
            ScheduleCommands::Conflicts => commands::schedule_conflicts_command(&context).await,
            ScheduleCommands::Clear => commands::schedule_clear_command(&context).await,
        },

        Commands::Export {
            output,
            calendar_name,
            no_instructor,
            reminder_minutes,
        } => {
            commands::export_command(
                &context,
                commands::ExportParams {
                    output,
                    calendar_name,
                    include_instructor: !no_instructor,
                    reminder_minutes,
                },
            )
            .await
        }
    }
}
