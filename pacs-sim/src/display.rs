//! 终端展示
//!
//! 把检索步骤、下载事件和命令日志渲染为终端文本或逐行JSON

use pacs_admin::{DisplayConfig, OutputFormat};
use pacs_core::{Result, StudyRecord};
use pacs_dicom::CommandLog;
use pacs_workflow::{DownloadEvent, GlobalProgress, SearchStep, StudyProgress};
use serde::Serialize;
use std::io::{self, Write};

const BAR_WIDTH: usize = 20;

const TABLE_HEADERS: [&str; 9] = [
    "PatientID",
    "PatientName",
    "StudyInstanceUID",
    "StudyDate",
    "Modality",
    "NumImages",
    "NumSequences",
    "ImagesMB",
    "SequencesMB",
];

/// JSON输出中的一帧
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Frame<'a> {
    SearchStarted { patients: usize },
    SearchRequest { command: &'a str },
    SearchStep { step: &'a SearchStep },
    SearchFinished { results: &'a [StudyRecord] },
    Download { event: &'a DownloadEvent },
    CommandLog { commands: Vec<&'a str> },
    Warning { message: &'a str },
}

/// 终端展示面
pub struct Display<W: Write> {
    out: W,
    config: DisplayConfig,
}

impl Display<io::Stdout> {
    pub fn stdout(config: DisplayConfig) -> Self {
        Self::new(io::stdout(), config)
    }
}

impl<W: Write> Display<W> {
    pub fn new(out: W, config: DisplayConfig) -> Self {
        Self { out, config }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn is_json(&self) -> bool {
        self.config.format == OutputFormat::Json
    }

    fn emit(&mut self, frame: &Frame<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.out, frame)?;
        writeln!(self.out)?;
        Ok(())
    }

    pub fn search_started(&mut self, patients: usize) -> Result<()> {
        if self.is_json() {
            return self.emit(&Frame::SearchStarted { patients });
        }
        writeln!(self.out, "🔍 正在检索 {} 位患者的XA检查，请稍候...", patients)?;
        Ok(())
    }

    /// 检索请求发出时立即回显命令，早于该患者的结果
    pub fn search_request(&mut self, command: &str) -> Result<()> {
        if self.is_json() {
            return self.emit(&Frame::SearchRequest { command });
        }
        writeln!(self.out, "$ {}", command)?;
        Ok(())
    }

    pub fn search_step(&mut self, step: &SearchStep) -> Result<()> {
        if self.is_json() {
            return self.emit(&Frame::SearchStep { step });
        }

        writeln!(
            self.out,
            "检索 {} {} {}% 完成 (找到 {} 个检查，累计 {} 个)",
            step.patient_id,
            progress_bar(step.progress.percent_complete),
            step.progress.percent_complete,
            step.studies.len(),
            step.results_total
        )?;
        for study in &step.studies {
            writeln!(self.out, "   {}", table_cells(study).join(" | "))?;
        }
        Ok(())
    }

    pub fn search_finished(&mut self, results: &[StudyRecord]) -> Result<()> {
        if self.is_json() {
            return self.emit(&Frame::SearchFinished { results });
        }

        if results.is_empty() {
            writeln!(self.out, "ℹ️  未找到XA检查（模拟）")?;
            return Ok(());
        }
        writeln!(self.out)?;
        self.results_table(results)?;
        writeln!(self.out, "✅ 检索完成。")?;
        Ok(())
    }

    /// 渲染检索结果表
    pub fn results_table(&mut self, results: &[StudyRecord]) -> Result<()> {
        let rows: Vec<Vec<String>> = results.iter().map(table_cells).collect();
        let mut widths: Vec<usize> = TABLE_HEADERS.iter().map(|h| h.chars().count()).collect();
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let header: Vec<String> = TABLE_HEADERS.iter().map(|h| h.to_string()).collect();
        writeln!(self.out, "{}", format_row(&header, &widths))?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(self.out, "{}", format_row(&rule, &widths))?;
        for row in &rows {
            writeln!(self.out, "{}", format_row(row, &widths))?;
        }
        Ok(())
    }

    pub fn download_event(&mut self, event: &DownloadEvent) -> Result<()> {
        // 提示音只用于终端文本，JSON行保持可解析
        if self.is_json() {
            return self.emit(&Frame::Download { event });
        }

        match event {
            DownloadEvent::Started { global } => {
                writeln!(self.out, "\n⬇️  下载进行中（模拟）")?;
                writeln!(self.out, "全局 {}", global_summary(global))?;
            }
            DownloadEvent::StudyStarted {
                index,
                total,
                study,
                command,
                destination,
            } => {
                writeln!(self.out, "$ {}", command)?;
                writeln!(
                    self.out,
                    "({}/{}) 正在下载检查 {} (患者 {}) 到 {}...",
                    index, total, study.study_instance_uid, study.patient_name, destination
                )?;
            }
            DownloadEvent::Chunk { progress } => {
                write!(self.out, "\r{}", study_summary(progress))?;
                if progress.is_last_chunk() {
                    writeln!(self.out)?;
                }
            }
            DownloadEvent::StudyCompleted { study, global } => {
                writeln!(
                    self.out,
                    "✅ 检查 {} 下载成功。({} 幅图像, {} 个序列, 约 {}MB)",
                    study.study_instance_uid,
                    study.num_images,
                    study.num_sequences,
                    study.total_mb() as u64
                )?;
                writeln!(self.out, "全局 {}", global_summary(global))?;
            }
            DownloadEvent::Finished { .. } => {
                writeln!(self.out, "🎉 所有下载已完成。")?;
            }
        }
        self.ring_bell(event)
    }

    pub fn command_log(&mut self, log: &CommandLog) -> Result<()> {
        if self.is_json() {
            let commands = log.entries().iter().map(|e| e.line.as_str()).collect();
            return self.emit(&Frame::CommandLog { commands });
        }

        writeln!(self.out, "\n💻 终端（模拟命令）")?;
        write!(self.out, "{}", log.to_text())?;
        Ok(())
    }

    pub fn warning(&mut self, message: &str) -> Result<()> {
        if self.is_json() {
            return self.emit(&Frame::Warning { message });
        }
        writeln!(self.out, "⚠️  {}", message)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    fn ring_bell(&mut self, event: &DownloadEvent) -> Result<()> {
        if self.config.bell && matches!(event, DownloadEvent::StudyCompleted { .. }) {
            write!(self.out, "\x07")?;
        }
        Ok(())
    }
}

fn table_cells(study: &StudyRecord) -> Vec<String> {
    vec![
        study.patient_id.clone(),
        study.patient_name.clone(),
        study.study_instance_uid.clone(),
        study.study_date.format("%Y-%m-%d").to_string(),
        study.modality.clone(),
        study.num_images.to_string(),
        study.num_sequences.to_string(),
        format!("{:.1}", study.images_mb()),
        format!("{:.0}", study.sequences_mb()),
    ]
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width.saturating_sub(cell.chars().count());
            format!("{}{}", cell, " ".repeat(pad))
        })
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}

fn progress_bar(percent: u8) -> String {
    let filled = usize::from(percent.min(100)) * BAR_WIDTH / 100;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

fn study_summary(progress: &StudyProgress) -> String {
    let images = &progress.images;
    format!(
        "{} {:>3}% 图像: {}/{} ({}/{}MB) 序列: {} ({}MB)",
        progress_bar(images.percent_complete),
        images.percent_complete,
        images.units_completed,
        images.units_total,
        images.bytes_completed as u64,
        images.bytes_total as u64,
        progress.num_sequences,
        progress.sequences_mb as u64
    )
}

fn global_summary(global: &GlobalProgress) -> String {
    format!(
        "{} {:>3}% 检查: {}/{} | 图像: {}/{} ({}/{}MB) | 序列: {}/{} ({}/{}MB)",
        progress_bar(global.percent_complete),
        global.percent_complete,
        global.studies_completed,
        global.studies_total,
        global.images_completed,
        global.images_total,
        global.images_mb_completed as u64,
        global.images_mb_total as u64,
        global.sequences_completed,
        global.sequences_total,
        global.sequences_mb_completed as u64,
        global.sequences_mb_total as u64
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn study() -> StudyRecord {
        StudyRecord {
            patient_id: "123456".to_string(),
            patient_name: "María López".to_string(),
            study_instance_uid: "1.2.840.113619.1234.567890_123456_EstudioXA_1".to_string(),
            study_date: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            modality: "XA".to_string(),
            num_images: 101,
            num_sequences: 3,
        }
    }

    fn text_display() -> Display<Vec<u8>> {
        Display::new(Vec::new(), DisplayConfig::default())
    }

    fn output(display: Display<Vec<u8>>) -> String {
        String::from_utf8(display.into_inner()).unwrap()
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0), format!("[{}]", ".".repeat(20)));
        assert_eq!(progress_bar(50), format!("[{}{}]", "#".repeat(10), ".".repeat(10)));
        assert_eq!(progress_bar(100), format!("[{}]", "#".repeat(20)));
    }

    #[test]
    fn test_results_table_alignment() {
        let mut display = text_display();
        display.results_table(&[study()]).unwrap();
        let text = output(display);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("PatientID | PatientName"));
        assert!(lines[2].contains("2024-02-29"));
        assert!(lines[2].contains("50.5"));
        assert!(lines[2].ends_with("45"));
    }

    #[test]
    fn test_study_completed_notice() {
        let record = study();
        let mut global = GlobalProgress::for_studies(std::slice::from_ref(&record));
        global.complete_study(&record);

        let mut display = Display::new(
            Vec::new(),
            DisplayConfig {
                bell: true,
                ..DisplayConfig::default()
            },
        );
        display
            .download_event(&DownloadEvent::StudyCompleted {
                study: record,
                global,
            })
            .unwrap();
        let text = output(display);

        assert!(text.contains("(101 幅图像, 3 个序列, 约 95MB)"));
        assert!(text.contains("检查: 1/1"));
        assert!(text.ends_with('\x07'));
    }

    #[test]
    fn test_json_frames() {
        let mut display = Display::new(
            Vec::new(),
            DisplayConfig {
                format: OutputFormat::Json,
                ..DisplayConfig::default()
            },
        );
        display.warning("未提供PatientID").unwrap();
        display.search_finished(&[study()]).unwrap();
        let text = output(display);

        let frames: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["kind"], "warning");
        assert_eq!(frames[1]["kind"], "search_finished");
        assert_eq!(frames[1]["results"][0]["patient_id"], "123456");
    }

    #[test]
    fn test_json_download_frames_skip_bell() {
        let record = study();
        let mut global = GlobalProgress::for_studies(std::slice::from_ref(&record));
        global.complete_study(&record);

        let mut display = Display::new(
            Vec::new(),
            DisplayConfig {
                bell: true,
                format: OutputFormat::Json,
            },
        );
        display
            .download_event(&DownloadEvent::StudyCompleted {
                study: record,
                global: global.clone(),
            })
            .unwrap();
        display
            .download_event(&DownloadEvent::Finished { global })
            .unwrap();
        let text = output(display);

        assert!(!text.contains('\x07'));
        let kinds: Vec<String> = text
            .lines()
            .map(|line| {
                let frame: serde_json::Value = serde_json::from_str(line).unwrap();
                frame["event"]["event"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(kinds, vec!["study_completed", "finished"]);
    }
}
