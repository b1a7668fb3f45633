//! PACS XA 检查检索与批量下载模拟器
//!
//! 所有检索结果、下载进度与命令均为随机生成，不进行任何真实的网络通信。

mod display;
mod runner;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use display::Display;
use pacs_admin::{init_logging, ConfigManager, LogLevel, OutputFormat, SimConfig};
use pacs_core::DateRange;
use pacs_workflow::{LatencyModel, SearchRequest, Selection, SessionState};
use rand::rngs::StdRng;
use rand::SeedableRng;
use runner::Runner;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// 模拟器命令行参数
#[derive(Parser, Debug)]
#[command(name = "pacs-sim")]
#[command(about = "PACS XA 检查检索与批量下载模拟器（所有数据均为随机生成）")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// PatientID，可重复指定
    #[arg(short = 'p', long = "patient-id")]
    patient_ids: Vec<String>,

    /// 每行一个PatientID的文件
    #[arg(long)]
    patients_file: Option<PathBuf>,

    /// 检查日期范围起始 (YYYY-MM-DD)
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// 检查日期范围结束 (YYYY-MM-DD)
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// 只下载指定的 StudyInstanceUID，可重复指定；默认下载全部结果
    #[arg(long = "select")]
    selected_uids: Vec<String>,

    /// 只检索，不下载
    #[arg(long)]
    search_only: bool,

    /// PACS IP地址
    #[arg(long)]
    pacs_ip: Option<String>,

    /// PACS端口
    #[arg(long)]
    pacs_port: Option<u16>,

    /// PACS AE标题
    #[arg(long)]
    pacs_aet: Option<String>,

    /// 本地AE标题
    #[arg(long)]
    local_aet: Option<String>,

    /// 目标AE标题
    #[arg(long)]
    dest_aet: Option<String>,

    /// 下载目标目录
    #[arg(long)]
    dest_path: Option<String>,

    /// 随机种子，便于复现
    #[arg(long)]
    seed: Option<u64>,

    /// 关闭模拟延迟
    #[arg(long)]
    no_pacing: bool,

    /// 以逐行JSON输出
    #[arg(long)]
    json: bool,

    /// 每个检查下载完成后输出提示音
    #[arg(long)]
    bell: bool,

    /// 日志级别
    #[arg(short, long)]
    log_level: Option<LogLevel>,

    /// 打印合并后的配置并退出
    #[arg(long)]
    dump_config: bool,
}

impl Args {
    /// 命令行参数覆盖配置
    fn apply_overrides(&self, config: &mut SimConfig) {
        let connection = &mut config.connection;
        if let Some(ip) = &self.pacs_ip {
            connection.pacs_ip = ip.clone();
        }
        if let Some(port) = self.pacs_port {
            connection.pacs_port = port;
        }
        if let Some(aet) = &self.pacs_aet {
            connection.pacs_ae_title = aet.clone();
        }
        if let Some(aet) = &self.local_aet {
            connection.local_ae_title = aet.clone();
        }
        if let Some(aet) = &self.dest_aet {
            connection.dest_ae_title = aet.clone();
        }
        if let Some(path) = &self.dest_path {
            connection.dest_path = path.clone();
        }
        if self.no_pacing {
            config.pacing.enabled = false;
        }
        if self.json {
            config.display.format = OutputFormat::Json;
        }
        if self.bell {
            config.display.bell = true;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }

    /// 合并文件与命令行中的PatientID
    fn patient_input(&self) -> Result<String> {
        let mut input = String::new();
        if let Some(path) = &self.patients_file {
            input = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read patients file: {}", path.display()))?;
            if !input.ends_with('\n') {
                input.push('\n');
            }
        }
        for id in &self.patient_ids {
            input.push_str(id);
            input.push('\n');
        }
        Ok(input)
    }

    fn date_range(&self) -> Option<DateRange> {
        match (self.start_date, self.end_date) {
            (None, None) => None,
            (start, end) => {
                let start = start.or(end)?;
                let end = end.unwrap_or(start);
                Some(DateRange::new(start, end))
            }
        }
    }

    fn selection(&self) -> Selection {
        if self.selected_uids.is_empty() {
            Selection::All
        } else {
            Selection::uids(self.selected_uids.iter().cloned())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let manager = ConfigManager::new();
    let mut config = manager.load(args.config.as_deref())?;
    args.apply_overrides(&mut config);

    if args.dump_config {
        print!("{}", ConfigManager::to_toml(&config)?);
        return Ok(());
    }

    init_logging(&config.logging)?;
    match args.config.as_deref() {
        Some(path) => info!("配置已加载: {}", path),
        None => info!("配置来自默认值与环境变量"),
    }
    manager.validator().validate(&config)?;

    info!("启动PACS检索模拟...");
    info!("  PACS: {}", config.connection.remote_address());
    info!("  本地AE: {}", config.connection.local_ae_title);
    info!("  目标AE: {}", config.connection.dest_ae_title);
    info!("  目标目录: {}", config.connection.dest_path);

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut request = SearchRequest::new(args.patient_input()?);
    if let Some(range) = args.date_range() {
        info!("  日期范围: {} ~ {}", range.start, range.end);
        request = request.with_date_range(range);
    }

    let display = Display::stdout(config.display.clone());
    let mut runner = Runner::new(
        config.connection.clone(),
        LatencyModel::new(config.pacing.clone()),
        display,
    );
    let mut session = SessionState::new();

    let outcome = async {
        runner.search(&mut session, &request, &mut rng).await?;
        if !args.search_only {
            session.select(args.selection());
            runner.download(&mut session, &mut rng).await?;
        }
        Ok::<_, pacs_core::PacsError>(())
    }
    .await;

    match outcome {
        Ok(()) => {}
        Err(e) if e.is_warning() => {
            warn!("{}", e);
            runner.display_mut().warning(&e.to_string())?;
        }
        Err(e) => {
            error!("模拟失败: {}", e);
            return Err(e.into());
        }
    }

    runner.show_command_log(&session)?;
    Ok(())
}
