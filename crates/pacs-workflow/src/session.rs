//! 会话状态
//!
//! 保存当前检索结果、选择与命令日志。检索与下载都以惰性迭代器的形式推进，
//! 每一步产生一个快照，由调用方负责展示和节奏控制。

use crate::generator::StudyGenerator;
use crate::progress::{download_study, GlobalProgress, StudyDownload, StudyProgress};
use pacs_core::utils::parse_patient_ids;
use pacs_core::{DateRange, PacsError, ProgressState, Result, StudyRecord};
use pacs_dicom::{CommandLog, DimseCommand, PacsConnection};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 待下载检查的选择
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    /// 全部检索结果
    All,
    /// 按 StudyInstanceUID 选择，未知的UID被忽略
    Uids(BTreeSet<String>),
}

impl Selection {
    pub fn uids<I, S>(uids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Uids(uids.into_iter().map(Into::into).collect())
    }

    pub fn includes(&self, study: &StudyRecord) -> bool {
        match self {
            Selection::All => true,
            Selection::Uids(uids) => uids.contains(&study.study_instance_uid),
        }
    }
}

impl Default for Selection {
    fn default() -> Self {
        Selection::All
    }
}

/// 检索请求
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// 换行分隔的PatientID列表
    pub patient_ids_input: String,
    pub date_range: Option<DateRange>,
}

impl SearchRequest {
    pub fn new(patient_ids_input: impl Into<String>) -> Self {
        Self {
            patient_ids_input: patient_ids_input.into(),
            date_range: None,
        }
    }

    pub fn with_date_range(mut self, date_range: DateRange) -> Self {
        self.date_range = Some(date_range);
        self
    }
}

/// 一位患者检索完成后的快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchStep {
    pub patient_id: String,
    /// 发送的 findscu 命令
    pub command: String,
    pub studies: Vec<StudyRecord>,
    /// 以患者为单位的检索进度
    pub progress: ProgressState,
    /// 目前累计的结果数
    pub results_total: usize,
}

/// 下载过程中的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DownloadEvent {
    /// 下载开始，给出全局总量
    Started { global: GlobalProgress },
    /// 开始下载某个检查
    StudyStarted {
        index: usize,
        total: usize,
        study: StudyRecord,
        command: String,
        destination: String,
    },
    /// 某个检查完成一个数据块
    Chunk { progress: StudyProgress },
    /// 某个检查下载完成
    StudyCompleted {
        study: StudyRecord,
        global: GlobalProgress,
    },
    /// 全部下载完成
    Finished { global: GlobalProgress },
}

/// 会话状态
#[derive(Debug, Clone)]
pub struct SessionState {
    id: Uuid,
    patient_ids: Vec<String>,
    results: Vec<StudyRecord>,
    selection: Selection,
    command_log: CommandLog,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_ids: Vec::new(),
            results: Vec::new(),
            selection: Selection::All,
            command_log: CommandLog::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn patient_ids(&self) -> &[String] {
        &self.patient_ids
    }

    pub fn results(&self) -> &[StudyRecord] {
        &self.results
    }

    pub fn command_log(&self) -> &CommandLog {
        &self.command_log
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// 设置待下载检查的选择
    pub fn select(&mut self, selection: Selection) {
        self.selection = selection;
    }

    /// 当前选择命中的检查，保持检索结果的顺序
    pub fn selected_studies(&self) -> Vec<StudyRecord> {
        self.results
            .iter()
            .filter(|study| self.selection.includes(study))
            .cloned()
            .collect()
    }

    /// 开始一次检索
    ///
    /// 先清空上一次的结果和选择；未提供任何PatientID时返回 `EmptyInput`，结果保持为空。
    pub fn search<'a, R: Rng + ?Sized>(
        &'a mut self,
        request: &SearchRequest,
        connection: &'a PacsConnection,
        generator: &'a StudyGenerator,
        rng: &'a mut R,
    ) -> Result<SearchPass<'a, R>> {
        self.results.clear();
        self.selection = Selection::All;
        self.patient_ids = parse_patient_ids(&request.patient_ids_input);

        if self.patient_ids.is_empty() {
            warn!("未提供PatientID，检索取消");
            return Err(PacsError::EmptyInput("未提供PatientID".to_string()));
        }

        info!(
            "会话 {} 开始检索 {} 位患者的XA检查",
            self.id,
            self.patient_ids.len()
        );

        let patient_ids = self.patient_ids.clone();
        let progress = ProgressState::new(patient_ids.len() as u32, 0.0);
        Ok(SearchPass {
            session: self,
            connection,
            generator,
            rng,
            date_range: request.date_range,
            patient_ids,
            cursor: 0,
            progress,
        })
    }

    /// 开始下载当前选择的检查
    ///
    /// 没有可下载的检查时返回 `EmptyInput`，会话状态不变。
    pub fn download<'a>(&'a mut self, connection: &'a PacsConnection) -> Result<DownloadPass<'a>> {
        let studies = self.selected_studies();
        if studies.is_empty() {
            warn!("没有选择任何检查，下载取消");
            return Err(PacsError::EmptyInput("未选择要下载的检查".to_string()));
        }

        info!("会话 {} 开始下载 {} 个检查", self.id, studies.len());

        let global = GlobalProgress::for_studies(&studies);
        Ok(DownloadPass {
            command_log: &mut self.command_log,
            connection,
            studies,
            global,
            cursor: 0,
            phase: DownloadPhase::Pending,
        })
    }

    /// 重置会话，包括命令日志
    pub fn reset(&mut self) {
        self.patient_ids.clear();
        self.results.clear();
        self.selection = Selection::All;
        self.command_log.clear();
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// 检索过程，每位患者产生一个 `SearchStep`
pub struct SearchPass<'a, R: Rng + ?Sized> {
    session: &'a mut SessionState,
    connection: &'a PacsConnection,
    generator: &'a StudyGenerator,
    rng: &'a mut R,
    date_range: Option<DateRange>,
    patient_ids: Vec<String>,
    cursor: usize,
    progress: ProgressState,
}

impl<'a, R: Rng + ?Sized> SearchPass<'a, R> {
    /// 本次检索的患者总数
    pub fn total(&self) -> usize {
        self.patient_ids.len()
    }

    /// 供调用方在各步之间抽取延迟等随机量
    pub fn rng(&mut self) -> &mut R {
        &mut *self.rng
    }

    /// 下一步将发出的 findscu 命令，不写入命令日志
    pub fn pending_command(&self) -> Option<String> {
        let patient_id = self.patient_ids.get(self.cursor)?;
        Some(DimseCommand::find(patient_id.as_str()).render(self.connection))
    }
}

impl<'a, R: Rng + ?Sized> Iterator for SearchPass<'a, R> {
    type Item = SearchStep;

    fn next(&mut self) -> Option<Self::Item> {
        let patient_id = self.patient_ids.get(self.cursor)?.clone();
        self.cursor += 1;

        let command = self
            .session
            .command_log
            .record(&DimseCommand::find(patient_id.as_str()), self.connection);
        let studies = self
            .generator
            .generate(&mut *self.rng, &patient_id, self.date_range.as_ref());
        self.session.results.extend(studies.iter().cloned());
        self.progress.advance(1);

        debug!(
            "患者 {} 检索完成: {} 个检查, 进度 {}%",
            patient_id,
            studies.len(),
            self.progress.percent_complete
        );

        if self.progress.is_complete() {
            info!("检索完成，共找到 {} 个检查", self.session.results.len());
        }

        Some(SearchStep {
            patient_id,
            command,
            studies,
            progress: self.progress.clone(),
            results_total: self.session.results.len(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.patient_ids.len() - self.cursor;
        (remaining, Some(remaining))
    }
}

enum DownloadPhase {
    Pending,
    NextStudy,
    Transferring(StudyDownload),
    Exhausted,
}

/// 下载过程，按输入顺序逐个检查产生 `DownloadEvent`
pub struct DownloadPass<'a> {
    command_log: &'a mut CommandLog,
    connection: &'a PacsConnection,
    studies: Vec<StudyRecord>,
    global: GlobalProgress,
    cursor: usize,
    phase: DownloadPhase,
}

impl<'a> Iterator for DownloadPass<'a> {
    type Item = DownloadEvent;

    fn next(&mut self) -> Option<Self::Item> {
        match std::mem::replace(&mut self.phase, DownloadPhase::Exhausted) {
            DownloadPhase::Pending => {
                self.phase = DownloadPhase::NextStudy;
                Some(DownloadEvent::Started {
                    global: self.global.clone(),
                })
            }
            DownloadPhase::NextStudy => {
                let Some(study) = self.studies.get(self.cursor) else {
                    info!(
                        "全部下载完成: {} 个检查, {} 幅图像",
                        self.global.studies_completed, self.global.images_completed
                    );
                    return Some(DownloadEvent::Finished {
                        global: self.global.clone(),
                    });
                };

                let command = self.command_log.record(
                    &DimseCommand::retrieve(study.study_instance_uid.as_str()),
                    self.connection,
                );
                self.phase = DownloadPhase::Transferring(download_study(study));
                Some(DownloadEvent::StudyStarted {
                    index: self.cursor + 1,
                    total: self.studies.len(),
                    study: study.clone(),
                    command,
                    destination: self.connection.dest_path.clone(),
                })
            }
            DownloadPhase::Transferring(mut transfer) => match transfer.next() {
                Some(progress) => {
                    self.phase = DownloadPhase::Transferring(transfer);
                    Some(DownloadEvent::Chunk { progress })
                }
                None => {
                    let study = self.studies[self.cursor].clone();
                    self.cursor += 1;
                    self.global.complete_study(&study);
                    self.phase = DownloadPhase::NextStudy;

                    info!(
                        "检查 {} 下载完成 ({} 幅图像, {} 个序列), 全局进度 {}%",
                        study.study_instance_uid,
                        study.num_images,
                        study.num_sequences,
                        self.global.percent_complete
                    );
                    Some(DownloadEvent::StudyCompleted {
                        study,
                        global: self.global.clone(),
                    })
                }
            },
            DownloadPhase::Exhausted => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::CHUNKS_PER_STUDY;
    use chrono::NaiveDate;
    use pacs_dicom::CommandType;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn generator() -> StudyGenerator {
        StudyGenerator::with_today(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
    }

    fn searched_session(input: &str, seed: u64) -> SessionState {
        let connection = PacsConnection::default();
        let generator = generator();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut session = SessionState::new();

        let pass = session
            .search(&SearchRequest::new(input), &connection, &generator, &mut rng)
            .unwrap();
        let steps: Vec<SearchStep> = pass.collect();
        assert!(!steps.is_empty());
        session
    }

    #[test]
    fn test_empty_search_warns_and_clears() {
        let connection = PacsConnection::default();
        let generator = generator();
        let mut rng = StdRng::seed_from_u64(1);
        let mut session = searched_session("123456", 1);
        assert!(!session.results().is_empty());

        let warned = match session.search(&SearchRequest::new("  \n\n"), &connection, &generator, &mut rng) {
            Err(err) => err.is_warning(),
            Ok(_) => false,
        };
        assert!(warned, "空输入不应开始检索");
        assert!(session.results().is_empty());
    }

    #[test]
    fn test_search_steps_per_patient() {
        let connection = PacsConnection::default();
        let generator = generator();
        let mut rng = StdRng::seed_from_u64(9);
        let mut session = SessionState::new();

        let pass = session
            .search(&SearchRequest::new("A\nB\nC\n"), &connection, &generator, &mut rng)
            .unwrap();
        assert_eq!(pass.total(), 3);
        let steps: Vec<SearchStep> = pass.collect();

        let percents: Vec<u8> = steps.iter().map(|s| s.progress.percent_complete).collect();
        assert_eq!(percents, vec![33, 66, 100]);
        assert_eq!(steps[2].results_total, session.results().len());
        assert!(steps[0].command.contains("PatientID=A"));

        assert_eq!(session.command_log().len(), 3);
        assert!(session
            .command_log()
            .entries()
            .iter()
            .all(|e| e.command_type == CommandType::CFind));
    }

    #[test]
    fn test_pending_command_matches_next_step() {
        let connection = PacsConnection::default();
        let generator = generator();
        let mut rng = StdRng::seed_from_u64(12);
        let mut session = SessionState::new();

        let mut pass = session
            .search(&SearchRequest::new("A\nB"), &connection, &generator, &mut rng)
            .unwrap();
        let pending = pass.pending_command().unwrap();
        assert!(pending.contains("PatientID=A"));

        let step = pass.next().unwrap();
        assert_eq!(step.command, pending);
        assert!(pass.pending_command().unwrap().contains("PatientID=B"));

        pass.next().unwrap();
        assert_eq!(pass.pending_command(), None);
        drop(pass);
        assert_eq!(session.command_log().len(), 2);
    }

    #[test]
    fn test_new_search_overwrites_results() {
        let connection = PacsConnection::default();
        let generator = generator();
        let mut rng = StdRng::seed_from_u64(4);
        let mut session = searched_session("OLD", 2);

        session
            .search(&SearchRequest::new("NEW"), &connection, &generator, &mut rng)
            .unwrap()
            .for_each(drop);

        assert!(session.results().iter().all(|s| s.patient_id == "NEW"));
        // 命令日志在会话内累积
        assert_eq!(session.command_log().len(), 2);
    }

    #[test]
    fn test_download_event_sequence() {
        let connection = PacsConnection::default();
        let mut session = searched_session("123456\n654321", 21);
        let total = session.results().len();

        let events: Vec<DownloadEvent> = session.download(&connection).unwrap().collect();
        assert_eq!(events.len(), 2 + total * (CHUNKS_PER_STUDY + 2));

        assert!(matches!(events.first(), Some(DownloadEvent::Started { .. })));
        match events.last() {
            Some(DownloadEvent::Finished { global }) => {
                assert_eq!(global.percent_complete, 100);
                assert_eq!(global.studies_completed, total);
            }
            other => panic!("unexpected last event: {:?}", other),
        }

        let chunks = events
            .iter()
            .filter(|e| matches!(e, DownloadEvent::Chunk { .. }))
            .count();
        assert_eq!(chunks, total * CHUNKS_PER_STUDY);

        let moves = session
            .command_log()
            .entries()
            .iter()
            .filter(|e| e.command_type == CommandType::CMove)
            .count();
        assert_eq!(moves, total);
    }

    #[test]
    fn test_download_respects_selection() {
        let connection = PacsConnection::default();
        let mut session = searched_session("A\nB\nC\nD", 33);
        let chosen = session.results()[0].study_instance_uid.clone();

        session.select(Selection::uids([chosen.clone(), "unknown".to_string()]));
        assert_eq!(session.selected_studies().len(), 1);

        let started: Vec<String> = session
            .download(&connection)
            .unwrap()
            .filter_map(|e| match e {
                DownloadEvent::StudyStarted { study, .. } => Some(study.study_instance_uid),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec![chosen]);
    }

    #[test]
    fn test_empty_selection_is_warning() {
        let connection = PacsConnection::default();
        let mut session = searched_session("A", 8);
        session.select(Selection::uids(Vec::<String>::new()));

        let log_len = session.command_log().len();
        let warned = match session.download(&connection) {
            Err(err) => err.is_warning(),
            Ok(_) => false,
        };
        assert!(warned, "空选择不应开始下载");
        assert_eq!(session.command_log().len(), log_len);

        let mut fresh = SessionState::new();
        assert!(fresh.download(&connection).is_err());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut session = searched_session("A", 5);
        session.reset();
        assert!(session.results().is_empty());
        assert!(session.patient_ids().is_empty());
        assert!(session.command_log().is_empty());
        assert_eq!(session.selection(), &Selection::All);
    }
}
