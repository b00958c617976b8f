// src/logging/auction_logger.rs

use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::{self, JoinHandle};
use tokio::time::{self, Duration};
use tracing::warn;
use tracing_appender::rolling;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::fmt::MakeWriter;

use crate::logging::pod_log::PodAuctionLog;

pub const AUCTION_LOG_FILE: &str = "adpod_auction.json";

/// **Pod 竞价日志写入器**
/// 日志经 mpsc 发给后台任务，按批量或定时写入按小时滚动的文件。
pub struct AuctionLogger {
    sender: Sender<String>,
    writer: JoinHandle<()>,
}

impl AuctionLogger {
    /// - `log_dir`: 日志文件存放目录
    /// - `buffer_size`: mpsc 通道缓冲区大小
    /// - `batch_size`: 批量写入的日志条数
    /// - `flush_interval`: 定时刷新日志的时间间隔（毫秒）
    pub fn new(log_dir: &str, buffer_size: usize, batch_size: usize, flush_interval: u64) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        let log_file = Arc::new(rolling::hourly(log_dir, AUCTION_LOG_FILE));
        let writer = tokio::spawn(Self::background_log_writer(
            log_file,
            receiver,
            batch_size.max(1),
            flush_interval.max(1),
        ));
        Self { sender, writer }
    }

    pub async fn log(&self, entry: &PodAuctionLog) {
        let line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(e) => {
                warn!(pod_id = %entry.pod_id, "failed to encode auction log: {}", e);
                return;
            }
        };
        if let Err(e) = self.sender.send(line).await {
            warn!("failed to send auction log: {}", e);
        }
    }

    async fn background_log_writer(
        log_file: Arc<RollingFileAppender>,
        mut receiver: Receiver<String>,
        batch_size: usize,
        flush_interval: u64,
    ) {
        let mut buffer = Vec::with_capacity(batch_size);
        let mut interval = time::interval(Duration::from_millis(flush_interval));

        loop {
            tokio::select! {
                received = receiver.recv() => match received {
                    Some(line) => {
                        buffer.push(line);
                        if buffer.len() >= batch_size {
                            Self::write_logs_to_disk(log_file.clone(), &mut buffer).await;
                        }
                    }
                    None => break,
                },
                _ = interval.tick() => {
                    if !buffer.is_empty() {
                        Self::write_logs_to_disk(log_file.clone(), &mut buffer).await;
                    }
                }
            }
        }

        // 发送端全部关闭，写出剩余日志
        if !buffer.is_empty() {
            Self::write_logs_to_disk(log_file, &mut buffer).await;
        }
    }

    async fn write_logs_to_disk(file: Arc<RollingFileAppender>, buffer: &mut Vec<String>) {
        let content = buffer.join("\n") + "\n";
        buffer.clear();

        let written = task::spawn_blocking(move || {
            let mut writer = file.make_writer();
            writer.write_all(content.as_bytes())
        })
        .await;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("failed to write auction logs: {}", e),
            Err(e) => warn!("auction log writer task failed: {}", e),
        }
    }

    /// 关闭通道并等待后台任务把缓冲区写完
    pub async fn shutdown(self) {
        let Self { sender, writer } = self;
        drop(sender);
        if let Err(e) = writer.await {
            warn!("auction log writer did not shut down cleanly: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use uuid::Uuid;

    fn read_logs(dir: &std::path::Path) -> Vec<String> {
        let mut lines = Vec::new();
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            if name.starts_with(AUCTION_LOG_FILE) {
                let content = fs::read_to_string(&path).unwrap();
                lines.extend(content.lines().map(str::to_string));
            }
        }
        lines
    }

    #[tokio::test]
    async fn shutdown_flushes_pending_entries() {
        let dir = std::env::temp_dir().join(format!("adpod-logs-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();

        // 批量和刷新间隔都足够大，只能靠 shutdown 落盘
        let logger = AuctionLogger::new(dir.to_str().unwrap(), 16, 100, 60_000);
        logger.log(&PodAuctionLog::new("req-1", "pod1", "ctv")).await;
        logger.log(&PodAuctionLog::new("req-1", "pod2", "ctv")).await;
        logger.shutdown().await;

        let lines = read_logs(&dir);
        assert_eq!(lines.len(), 2);
        let first: PodAuctionLog = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first.pod_id, "pod1");
        assert_eq!(first.log_type, "adpod_auction");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn full_batch_is_written_without_shutdown() {
        let dir = std::env::temp_dir().join(format!("adpod-logs-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();

        let logger = AuctionLogger::new(dir.to_str().unwrap(), 16, 2, 60_000);
        logger.log(&PodAuctionLog::new("req-2", "pod1", "ctv")).await;
        logger.log(&PodAuctionLog::new("req-2", "pod2", "ctv")).await;

        let mut lines = Vec::new();
        for _ in 0..50 {
            lines = read_logs(&dir);
            if lines.len() == 2 {
                break;
            }
            time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(lines.len(), 2);

        logger.shutdown().await;
        fs::remove_dir_all(&dir).unwrap();
    }
}
