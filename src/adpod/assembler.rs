// src/adpod/assembler.rs

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{self, JoinHandle};
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::adpod::bucket::DurationBuckets;
use crate::adpod::combination::{CombinationGenerator, CombinationStats};
use crate::adpod::exclusion::{evaluate_sequence, AssemblyResult, ExclusionCaps};
use crate::model::bid::{AdPodBid, BidStatus};

/// 默认组装时间预算
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10);
/// 旧版本使用的时间预算
pub const LEGACY_TIMEOUT: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerSettings {
    pub workers: usize,
    pub timeout: Duration,
    pub queue_capacity: usize,
}

impl Default for AssemblerSettings {
    fn default() -> Self {
        Self {
            workers: 2,
            timeout: DEFAULT_TIMEOUT,
            queue_capacity: 64,
        }
    }
}

/// 生产者发给评估 worker 的候选序列，`ordinal` 为生成顺序
struct Candidate {
    ordinal: u64,
    sequence: Vec<i64>,
}

/// **一次组装的结果**
#[derive(Debug, Default)]
pub struct AssemblyOutcome {
    pub best: Option<AssemblyResult>,
    pub statuses: HashMap<String, BidStatus>,
    pub evaluated: usize,
    pub timed_out: bool,
    /// 超时时生产者仍在运行，统计不可用
    pub stats: Option<CombinationStats>,
}

impl AssemblyOutcome {
    pub fn to_adpod_bid(&self, original_imp_id: &str, seat_name: &str) -> Option<AdPodBid> {
        let best = self.best.as_ref()?;
        Some(AdPodBid::new(
            best.bids.clone(),
            best.durations.clone(),
            original_imp_id,
            seat_name,
        ))
    }
}

#[derive(Default)]
struct Aggregator {
    best: Option<(u64, AssemblyResult)>,
    statuses: HashMap<String, BidStatus>,
    evaluated: usize,
}

impl Aggregator {
    fn absorb(&mut self, ordinal: u64, mut result: AssemblyResult) {
        self.evaluated += 1;
        for (bid_id, status) in result.filtered_bids.drain() {
            let current = self.statuses.entry(bid_id).or_insert(BidStatus::Ok);
            *current = current.escalate(status);
        }
        if result.is_empty() {
            return;
        }

        let replace = match &self.best {
            None => true,
            Some((best_ordinal, best)) => {
                result.beats(best)
                    || (!best.beats(&result) && ordinal < *best_ordinal)
            }
        };
        if replace {
            self.best = Some((ordinal, result));
        }
    }

    fn finish(self, timed_out: bool, stats: Option<CombinationStats>) -> AssemblyOutcome {
        AssemblyOutcome {
            best: self.best.map(|(_, result)| result),
            statuses: self.statuses,
            evaluated: self.evaluated,
            timed_out,
            stats,
        }
    }
}

/// **AdPod 组装器**
///
/// 首个序列同步评估；之后由单一生产者持有组合生成器，把序列推入有界队列，
/// 多个 worker 并行评估，结果经结果队列汇总到聚合循环，聚合循环与计时器竞争。
/// 超时后取消生产者和 worker，后台任务负责排空迟到的结果并回收 worker。
pub struct Assembler {
    settings: AssemblerSettings,
}

impl Assembler {
    pub fn new(settings: AssemblerSettings) -> Self {
        Self { settings }
    }

    pub async fn assemble(
        &self,
        buckets: Arc<DurationBuckets>,
        mut generator: CombinationGenerator,
        caps: ExclusionCaps,
    ) -> AssemblyOutcome {
        let mut aggregator = Aggregator::default();

        let first = match generator.next_sequence() {
            Some(sequence) => sequence,
            None => return aggregator.finish(false, Some(generator.stats())),
        };
        aggregator.absorb(0, evaluate_sequence(&buckets, &first, caps));

        let capacity = self.settings.queue_capacity.max(1);
        let cancel = CancellationToken::new();
        let (candidate_tx, candidate_rx) = mpsc::channel::<Candidate>(capacity);
        let (result_tx, mut result_rx) = mpsc::channel::<(u64, AssemblyResult)>(capacity);

        let producer = Self::spawn_producer(generator, candidate_tx, cancel.clone());
        let workers = Self::spawn_workers(
            self.settings.workers.max(1),
            candidate_rx,
            result_tx,
            buckets,
            caps,
            cancel.clone(),
        );

        let deadline = time::sleep(self.settings.timeout);
        tokio::pin!(deadline);
        let mut timed_out = false;
        loop {
            tokio::select! {
                received = result_rx.recv() => match received {
                    Some((ordinal, result)) => aggregator.absorb(ordinal, result),
                    None => break,
                },
                _ = &mut deadline => {
                    timed_out = true;
                    break;
                }
            }
        }
        cancel.cancel();

        if timed_out {
            debug!(evaluated = aggregator.evaluated, "assembly budget exhausted");
            tokio::spawn(async move {
                while result_rx.recv().await.is_some() {}
                Self::join_workers(workers).await;
                if let Err(e) = producer.await {
                    warn!("combination producer failed: {}", e);
                }
            });
            return aggregator.finish(true, None);
        }

        Self::join_workers(workers).await;
        let stats = match producer.await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("combination producer failed: {}", e);
                None
            }
        };
        aggregator.finish(false, stats)
    }

    fn spawn_producer(
        mut generator: CombinationGenerator,
        candidates: mpsc::Sender<Candidate>,
        cancel: CancellationToken,
    ) -> JoinHandle<CombinationStats> {
        task::spawn_blocking(move || {
            let mut ordinal = 1;
            while !cancel.is_cancelled() {
                let sequence = match generator.next_sequence() {
                    Some(sequence) => sequence,
                    None => break,
                };
                if candidates.blocking_send(Candidate { ordinal, sequence }).is_err() {
                    break;
                }
                ordinal += 1;
            }
            generator.stats()
        })
    }

    fn spawn_workers(
        count: usize,
        candidates: mpsc::Receiver<Candidate>,
        results: mpsc::Sender<(u64, AssemblyResult)>,
        buckets: Arc<DurationBuckets>,
        caps: ExclusionCaps,
        cancel: CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        let candidates = Arc::new(Mutex::new(candidates));
        (0..count)
            .map(|_| {
                let candidates = Arc::clone(&candidates);
                let results = results.clone();
                let buckets = Arc::clone(&buckets);
                let cancel = cancel.clone();
                task::spawn_blocking(move || {
                    while !cancel.is_cancelled() {
                        // 只在取下一个候选时持锁，评估过程不持锁
                        let candidate = candidates.blocking_lock().blocking_recv();
                        let Some(candidate) = candidate else { break };
                        let result = evaluate_sequence(&buckets, &candidate.sequence, caps);
                        if results.blocking_send((candidate.ordinal, result)).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect()
    }

    async fn join_workers(workers: Vec<JoinHandle<()>>) {
        for joined in futures::future::join_all(workers).await {
            if let Err(e) = joined {
                warn!("assembly worker failed: {}", e);
            }
        }
    }
}
