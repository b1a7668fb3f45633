//! 检索与下载的执行流程
//!
//! 从会话拉取快照交给终端展示，并按延迟模型在两步之间等待

use crate::display::Display;
use pacs_core::{PacsError, Result};
use pacs_dicom::PacsConnection;
use pacs_workflow::{
    DownloadEvent, GlobalProgress, LatencyModel, SearchRequest, SessionState, StudyGenerator,
};
use rand::Rng;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info};

/// 模拟流程执行器
pub struct Runner<W: Write> {
    connection: PacsConnection,
    latency: LatencyModel,
    generator: StudyGenerator,
    display: Display<W>,
}

impl<W: Write> Runner<W> {
    pub fn new(connection: PacsConnection, latency: LatencyModel, display: Display<W>) -> Self {
        Self {
            connection,
            latency,
            generator: StudyGenerator::new(),
            display,
        }
    }

    pub fn display_mut(&mut self) -> &mut Display<W> {
        &mut self.display
    }

    #[cfg(test)]
    pub fn into_display(self) -> Display<W> {
        self.display
    }

    /// 执行一次检索，返回找到的检查数
    pub async fn search<R: Rng>(
        &mut self,
        session: &mut SessionState,
        request: &SearchRequest,
        rng: &mut R,
    ) -> Result<usize> {
        let mut pass = session.search(request, &self.connection, &self.generator, rng)?;
        let total = pass.total();
        self.display.search_started(total)?;
        self.display.flush()?;
        pause(self.latency.initial_search_delay()).await;

        for _ in 0..total {
            if let Some(command) = pass.pending_command() {
                self.display.search_request(&command)?;
                self.display.flush()?;
            }
            let delay = self.latency.search_delay(pass.rng());
            pause(delay).await;

            if let Some(step) = pass.next() {
                self.display.search_step(&step)?;
                self.display.flush()?;
            }
        }

        drop(pass);
        let results = session.results();
        self.display.search_finished(results)?;
        self.display.flush()?;
        Ok(results.len())
    }

    /// 下载当前选择的检查，返回最终的全局进度
    pub async fn download<R: Rng>(
        &mut self,
        session: &mut SessionState,
        rng: &mut R,
    ) -> Result<GlobalProgress> {
        let mut finished = None;

        for event in session.download(&self.connection)? {
            if let DownloadEvent::Chunk { progress } = &event {
                let delay = self.latency.chunk_delay(rng, progress.chunk_size);
                debug!(
                    "块 {}/{} 传输 {} 幅图像, 等待 {:?}",
                    progress.chunk_index,
                    pacs_workflow::CHUNKS_PER_STUDY,
                    progress.chunk_size,
                    delay
                );
                pause(delay).await;
            }

            self.display.download_event(&event)?;
            self.display.flush()?;

            if let DownloadEvent::Finished { global } = event {
                finished = Some(global);
            }
        }

        let global =
            finished.ok_or_else(|| PacsError::Internal("下载过程未正常结束".to_string()))?;
        info!(
            "下载完成: {}/{} 个检查, 全局进度 {}%",
            global.studies_completed, global.studies_total, global.percent_complete
        );
        Ok(global)
    }

    /// 输出会话的命令日志
    pub fn show_command_log(&mut self, session: &SessionState) -> Result<()> {
        self.display.command_log(session.command_log())?;
        self.display.flush()
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
