// src/adpod/auction.rs

use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adpod::assembler::{Assembler, AssemblerSettings};
use crate::adpod::bucket::{availability, bucket_by_duration};
use crate::adpod::combination::{CombinationGenerator, CombinationStats};
use crate::adpod::duration::DurationResolver;
use crate::adpod::error::PodError;
use crate::adpod::exclusion::ExclusionCaps;
use crate::config::config_manager::ConfigManager;
use crate::model::bid::{AdPodBid, Bid, BidStatus};
use crate::model::pod::{ImpSlotConfig, PodProfile};
use crate::openrtb::request::{PodAuctionRequest, PodRequest};
use crate::planner::plan_impressions;

/// Pod 出价使用的 seat 名称
pub const POD_SEAT: &str = "prebid_ctv";

/// **单个 Pod 的竞价结果**
/// 失败时 `error` 有值，`winner` 为空，其余字段保留已完成阶段的数据用于日志。
#[derive(Debug)]
pub struct PodOutcome {
    pub pod_id: String,
    pub profile: String,
    pub slots: Vec<ImpSlotConfig>,
    pub bids: Vec<Arc<Bid>>,
    pub statuses: HashMap<String, BidStatus>,
    pub winner: Option<AdPodBid>,
    pub error: Option<PodError>,
    pub evaluated: usize,
    pub timed_out: bool,
    pub stats: Option<CombinationStats>,
    pub elapsed_ms: u128,
}

impl PodOutcome {
    fn new(pod_id: &str, profile: &str) -> Self {
        Self {
            pod_id: pod_id.to_string(),
            profile: profile.to_string(),
            slots: Vec::new(),
            bids: Vec::new(),
            statuses: HashMap::new(),
            winner: None,
            error: None,
            evaluated: 0,
            timed_out: false,
            stats: None,
            elapsed_ms: 0,
        }
    }

    fn fail(mut self, error: PodError) -> Self {
        warn!(pod_id = %self.pod_id, profile = %self.profile, "pod auction failed: {}", error);
        self.error = Some(error);
        self
    }

    pub fn status_of(&self, bid_id: &str) -> BidStatus {
        self.statuses.get(bid_id).copied().unwrap_or(BidStatus::Ok)
    }
}

/// **把 seat bid 转为参与组装的出价**
///
/// - 缺少 id 的出价补一个 UUID
/// - 价格非正、id 重复的出价直接丢弃
/// - 只有配置支持 deal 时才认可 deal tier
pub fn ingest_seat_bids(pod: &PodRequest, profile: &PodProfile, slots: &[ImpSlotConfig]) -> Vec<Arc<Bid>> {
    let resolver = DurationResolver::new(profile, slots);
    let mut seen = HashSet::new();
    let mut bids = Vec::with_capacity(pod.seatbid.iter().map(|s| s.bid.len()).sum());

    for seat in &pod.seatbid {
        let seat_name = seat.seat.clone().unwrap_or_default();
        for raw in &seat.bid {
            if raw.price <= 0.0 {
                warn!(pod_id = %pod.id, bid_id = %raw.id, price = raw.price, "dropping bid with non-positive price");
                continue;
            }
            let id = if raw.id.is_empty() {
                Uuid::new_v4().to_string()
            } else {
                raw.id.clone()
            };
            if !seen.insert(id.clone()) {
                warn!(pod_id = %pod.id, bid_id = %id, "dropping duplicate bid id");
                continue;
            }

            let (duration, status) = resolver.resolve(raw.creative_duration(), &raw.impid);
            let mut categories = raw.cat.clone().unwrap_or_default();
            if categories.is_empty() {
                categories.extend(raw.primary_category().map(str::to_string));
            }

            bids.push(Arc::new(Bid {
                id,
                imp_id: raw.impid.clone(),
                price: raw.price,
                duration,
                categories,
                advertiser_domains: raw.adomain.clone().unwrap_or_default(),
                deal_tier_satisfied: profile.spec.deals_supported && raw.deal_tier_satisfied(),
                seat: seat_name.clone(),
                creative: raw.adm.clone(),
                status,
            }));
        }
    }
    bids
}

/// 中标 → Winning；入口阶段已确定的状态保留；其余取组装过程记录的原因
fn final_statuses(
    bids: &[Arc<Bid>],
    assembly: &HashMap<String, BidStatus>,
    winner: Option<&AdPodBid>,
) -> HashMap<String, BidStatus> {
    let winners: HashSet<&str> = winner.map(|w| w.bid_ids().into_iter().collect()).unwrap_or_default();
    bids.iter()
        .map(|bid| {
            let status = if winners.contains(bid.id.as_str()) {
                BidStatus::Winning
            } else {
                let recorded = assembly.get(&bid.id).copied().unwrap_or(BidStatus::Ok);
                bid.status.escalate(recorded)
            };
            (bid.id.clone(), status)
        })
        .collect()
}

/// **单个 Pod 的完整竞价流程**：规划广告位 → 入口过滤 → 分桶 → 组合 → 组装
pub async fn run_pod_auction(pod: &PodRequest, profile: &PodProfile, assembler: &Assembler) -> PodOutcome {
    let start_time = Instant::now();
    let mut outcome = PodOutcome::new(&pod.id, &profile.name);

    outcome.slots = match plan_impressions(&pod.id, profile) {
        Ok(slots) => slots,
        Err(e) => return outcome.fail(e),
    };

    outcome.bids = ingest_seat_bids(pod, profile, &outcome.slots);
    let buckets = bucket_by_duration(&outcome.bids);
    if buckets.is_empty() {
        outcome.statuses = final_statuses(&outcome.bids, &HashMap::new(), None);
        outcome.elapsed_ms = start_time.elapsed().as_millis();
        return outcome.fail(PodError::EmptyBuckets);
    }

    let generator = CombinationGenerator::new(&availability(&buckets), &profile.spec, profile.combination_order);
    debug!(
        pod_id = %pod.id,
        durations = ?generator.durations(),
        expected = ?generator.expected_combinations(),
        "combination space"
    );

    let assembly = assembler
        .assemble(Arc::new(buckets), generator, ExclusionCaps::from_spec(&profile.spec))
        .await;
    let winner = assembly.to_adpod_bid(&pod.id, POD_SEAT);

    outcome.statuses = final_statuses(&outcome.bids, &assembly.statuses, winner.as_ref());
    outcome.evaluated = assembly.evaluated;
    outcome.timed_out = assembly.timed_out;
    outcome.stats = assembly.stats;
    outcome.elapsed_ms = start_time.elapsed().as_millis();

    match winner {
        Some(winner) => {
            info!(
                pod_id = %pod.id,
                bids = ?winner.bid_ids(),
                durations = ?winner.durations,
                price = winner.price,
                deals = winner.deal_bid_count,
                evaluated = outcome.evaluated,
                timed_out = outcome.timed_out,
                "pod filled"
            );
            outcome.winner = Some(winner);
            outcome
        }
        None => outcome.fail(PodError::NoSurvivingAssignment),
    }
}

/// **Pod 竞价入口**
/// 请求内的各个 Pod 相互独立，并发组装，单个 Pod 失败不影响其它 Pod。
pub struct PodAuction {
    config: Arc<ConfigManager>,
    settings: AssemblerSettings,
}

impl PodAuction {
    pub fn new(config: Arc<ConfigManager>, settings: AssemblerSettings) -> Self {
        Self { config, settings }
    }

    pub async fn run(&self, request: &PodAuctionRequest) -> Vec<PodOutcome> {
        info!(request_id = %request.id, pods = request.pods.len(), bids = request.bid_count(), "pod auction started");
        join_all(request.pods.iter().map(|pod| self.run_pod(pod))).await
    }

    async fn run_pod(&self, pod: &PodRequest) -> PodOutcome {
        match self.config.get_profile(&pod.profile) {
            Some(profile) => run_pod_auction(pod, &profile, &Assembler::new(self.settings)).await,
            None => PodOutcome::new(&pod.id, &pod.profile).fail(PodError::UnknownProfile(pod.profile.clone())),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::pod::{spec, DurationMatchingPolicy};
    use crate::openrtb::response::{Bid as RtbBid, SeatBid};
    use tokio::time::Duration;

    pub(crate) fn rtb_bid(id: &str, price: f64, duration: i64) -> RtbBid {
        let mut raw = format!(
            r#"{{"id":"{}","impid":"pod1_1","price":{},"adm":"<VAST version=\"3.0\"><Ad id=\"{}\"><InLine></InLine></Ad></VAST>","ext":{{"prebid":{{"video":{{"duration":{}}}}}}}}}"#,
            id, price, id, duration
        )
        .into_bytes();
        simd_json::serde::from_slice(&mut raw).unwrap()
    }

    pub(crate) fn pod_request(pod_id: &str, profile: &str, bids: Vec<RtbBid>) -> PodRequest {
        PodRequest {
            id: pod_id.to_string(),
            profile: profile.to_string(),
            seatbid: vec![SeatBid {
                bid: bids,
                seat: Some("bidderA".to_string()),
                group: None,
            }],
        }
    }

    pub(crate) fn scenario_request() -> PodRequest {
        let bids = [
            ("A", 5, 2.0),
            ("B", 5, 1.0),
            ("C", 10, 5.0),
            ("D", 10, 4.0),
            ("E", 10, 3.0),
            ("F", 10, 2.0),
            ("G", 15, 6.0),
            ("H", 15, 5.0),
            ("I", 15, 4.0),
        ]
        .iter()
        .map(|(id, d, p)| rtb_bid(id, *p, *d))
        .collect();
        pod_request("pod1", "ctv", bids)
    }

    fn assembler() -> Assembler {
        Assembler::new(AssemblerSettings {
            timeout: Duration::from_secs(10),
            ..AssemblerSettings::default()
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn scenario_pod_is_filled_and_statuses_assigned() {
        let profile = PodProfile::new("ctv", spec(10, 30, 1, 3, 5, 15));
        let outcome = run_pod_auction(&scenario_request(), &profile, &assembler()).await;

        assert!(outcome.error.is_none());
        let winner = outcome.winner.as_ref().unwrap();
        assert_eq!(winner.bid_ids(), vec!["A", "C", "G"]);
        assert_eq!(winner.price, 13.0);
        assert_eq!(winner.original_imp_id, "pod1");
        assert_eq!(winner.seat_name, POD_SEAT);
        assert_eq!(outcome.status_of("A"), BidStatus::Winning);
        assert_eq!(outcome.status_of("G"), BidStatus::Winning);
        assert_eq!(outcome.status_of("B"), BidStatus::Ok);
        assert_eq!(outcome.statuses.len(), 9);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn single_bid_cannot_fill_two_ad_pod() {
        let profile = PodProfile::new("ctv", spec(10, 30, 2, 3, 5, 15));
        let request = pod_request("pod1", "ctv", vec![rtb_bid("solo", 3.0, 10)]);
        let outcome = run_pod_auction(&request, &profile, &assembler()).await;

        assert!(outcome.winner.is_none());
        assert_eq!(outcome.error, Some(PodError::NoSurvivingAssignment));
        assert_eq!(outcome.evaluated, 0);
        assert_eq!(outcome.status_of("solo"), BidStatus::Ok);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn mismatched_durations_empty_the_buckets() {
        let mut profile = PodProfile::new("ctv", spec(10, 30, 1, 3, 5, 15));
        profile.adserver_durations = vec![15];
        profile.duration_matching = Some(DurationMatchingPolicy::Exact);
        let request = pod_request("pod1", "ctv", vec![rtb_bid("a", 3.0, 10), rtb_bid("b", 2.0, 20)]);
        let outcome = run_pod_auction(&request, &profile, &assembler()).await;

        assert_eq!(outcome.error, Some(PodError::EmptyBuckets));
        assert_eq!(outcome.status_of("a"), BidStatus::DurationMismatch);
        assert_eq!(outcome.status_of("b"), BidStatus::DurationMismatch);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn degenerate_profile_fails_planning() {
        let profile = PodProfile::new("ctv", spec(30, 60, 1, 3, 0, 0));
        let outcome = run_pod_auction(&scenario_request(), &profile, &assembler()).await;
        assert_eq!(outcome.error, Some(PodError::NoSlots { pod_id: "pod1".into() }));
        assert!(outcome.bids.is_empty());
    }

    #[test]
    fn ingestion_drops_bad_bids_and_fills_missing_ids() {
        let profile = PodProfile::new("ctv", spec(10, 30, 1, 3, 5, 15));
        let slots = plan_impressions("pod1", &profile).unwrap();
        let request = pod_request(
            "pod1",
            "ctv",
            vec![
                rtb_bid("x", 2.0, 10),
                rtb_bid("x", 9.0, 10),
                rtb_bid("free", 0.0, 10),
                rtb_bid("", 1.0, 15),
            ],
        );

        let bids = ingest_seat_bids(&request, &profile, &slots);
        assert_eq!(bids.len(), 2);
        assert_eq!(bids[0].id, "x");
        assert_eq!(bids[0].price, 2.0);
        assert_eq!(bids[0].seat, "bidderA");
        assert!(Uuid::parse_str(&bids[1].id).is_ok());
        assert_eq!(bids[1].duration, 15);
    }

    #[test]
    fn deal_tier_requires_profile_support() {
        let mut raw = br#"{"id":"d","impid":"pod1_1","price":1.0,
            "ext":{"prebid":{"video":{"duration":10,"primary_category":"IAB1"},"dealtiersatisfied":true}}}"#
            .to_vec();
        let deal: RtbBid = simd_json::serde::from_slice(&mut raw).unwrap();
        let request = pod_request("pod1", "ctv", vec![deal]);

        let mut profile = PodProfile::new("ctv", spec(10, 30, 1, 3, 5, 15));
        let slots = plan_impressions("pod1", &profile).unwrap();
        let bids = ingest_seat_bids(&request, &profile, &slots);
        assert!(!bids[0].deal_tier_satisfied);
        assert_eq!(bids[0].categories, vec!["IAB1"]);

        profile.spec.deals_supported = true;
        let bids = ingest_seat_bids(&request, &profile, &slots);
        assert!(bids[0].deal_tier_satisfied);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unknown_profile_does_not_abort_other_pods() {
        let config = Arc::new(ConfigManager::new());
        config
            .update_profiles(vec![PodProfile::new("ctv", spec(10, 30, 1, 3, 5, 15))])
            .unwrap();
        let auction = PodAuction::new(
            config,
            AssemblerSettings {
                timeout: Duration::from_secs(10),
                ..AssemblerSettings::default()
            },
        );
        let request = PodAuctionRequest {
            id: "req".into(),
            pods: vec![pod_request("lost", "missing", Vec::new()), scenario_request()],
        };

        let outcomes = auction.run(&request).await;
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].error, Some(PodError::UnknownProfile("missing".into())));
        assert_eq!(outcomes[1].winner.as_ref().map(|w| w.price), Some(13.0));
    }
}
