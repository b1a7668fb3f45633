//! 检索与下载模拟演示程序
//!
//! 使用固定随机种子、不带延迟地跑完一次检索和下载，并打印结果表、进度与命令日志

use pacs_dicom::PacsConnection;
use pacs_workflow::{DownloadEvent, SearchRequest, Selection, SessionState, StudyGenerator};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    let connection = PacsConnection::default();
    let generator = StudyGenerator::new();
    let mut rng = StdRng::seed_from_u64(2024);
    let mut session = SessionState::new();

    println!("🔍 PACS XA 检查检索演示\n");

    let request = SearchRequest::new("123456\n789012\n345678");
    for step in session.search(&request, &connection, &generator, &mut rng)? {
        println!(
            "   [{:>3}%] {} -> {} 个检查",
            step.progress.percent_complete,
            step.patient_id,
            step.studies.len()
        );
    }

    println!("\n📋 检索结果:");
    for study in session.results() {
        println!(
            "   {} | {} | {} | {} 幅图像 | {} 个序列 | {:.1}MB",
            study.patient_id,
            study.patient_name,
            study.study_date,
            study.num_images,
            study.num_sequences,
            study.total_mb()
        );
    }

    // 只下载每位患者的第一个检查
    let mut seen = std::collections::HashSet::new();
    let first_per_patient: Vec<String> = session
        .results()
        .iter()
        .filter(|s| seen.insert(s.patient_id.clone()))
        .map(|s| s.study_instance_uid.clone())
        .collect();
    session.select(Selection::uids(first_per_patient));

    println!("\n⬇️  下载:");
    for event in session.download(&connection)? {
        match event {
            DownloadEvent::StudyStarted { index, total, study, .. } => {
                println!("   ({}/{}) {}", index, total, study.study_instance_uid);
            }
            DownloadEvent::StudyCompleted { global, .. } => {
                println!("   ✅ 全局进度 {}%", global.percent_complete);
            }
            DownloadEvent::Finished { global } => {
                println!(
                    "\n📊 完成 {} 个检查, {} 幅图像, {:.0}MB",
                    global.studies_completed,
                    global.images_completed,
                    global.images_mb_completed + global.sequences_mb_completed
                );
            }
            _ => {}
        }
    }

    println!("\n💻 命令日志:\n{}", session.command_log().to_text());
    Ok(())
}
