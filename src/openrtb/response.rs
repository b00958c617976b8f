use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use simd_json::OwnedValue;

/// OpenRTB Bid Response
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BidResponse {
    pub id: String,
    #[serde(default)]
    pub seatbid: Vec<SeatBid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cur: Option<String>,
    /// 未出价原因
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbr: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Box<OwnedValue>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SeatBid {
    #[serde(default)]
    pub bid: Vec<Bid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<i32>,
}

/// 单个出价，ext 保留原始 JSON，按需延迟解析
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Bid {
    #[serde(default)]
    pub id: String,
    pub impid: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adm: Option<String>, // VAST XML 或 URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adomain: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cat: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dealid: Option<String>,

    pub ext: Option<Box<OwnedValue>>,
    #[serde(skip)]
    pub ext_detail: OnceCell<Option<BidExtDetail>>,
}

/// bid.ext 中与 Pod 组装相关的字段
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BidExtDetail {
    #[serde(default)]
    pub prebid: Option<PrebidBidExt>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PrebidBidExt {
    #[serde(default)]
    pub video: Option<VideoBidExt>,
    #[serde(default)]
    pub dealtiersatisfied: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct VideoBidExt {
    pub duration: Option<i64>,
    pub primary_category: Option<String>,
}

impl Bid {
    /// 解析失败时视为没有扩展信息
    pub fn get_ext_detail(&self) -> Option<&BidExtDetail> {
        let raw = self.ext.as_ref()?;
        self.ext_detail
            .get_or_init(|| {
                let s = serde_json::to_string(&**raw).ok()?;
                serde_json::from_str(&s).ok()
            })
            .as_ref()
    }

    /// 素材声明的时长（秒），未声明或非正数时返回 None
    pub fn creative_duration(&self) -> Option<i64> {
        self.get_ext_detail()
            .and_then(|ext| ext.prebid.as_ref())
            .and_then(|prebid| prebid.video.as_ref())
            .and_then(|video| video.duration)
            .filter(|d| *d > 0)
    }

    pub fn primary_category(&self) -> Option<&str> {
        self.get_ext_detail()
            .and_then(|ext| ext.prebid.as_ref())
            .and_then(|prebid| prebid.video.as_ref())
            .and_then(|video| video.primary_category.as_deref())
            .filter(|c| !c.is_empty())
    }

    pub fn deal_tier_satisfied(&self) -> bool {
        self.get_ext_detail()
            .and_then(|ext| ext.prebid.as_ref())
            .map(|prebid| prebid.dealtiersatisfied)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_bid(raw: &str) -> Bid {
        let mut bytes = raw.as_bytes().to_vec();
        simd_json::serde::from_slice(&mut bytes).unwrap()
    }

    #[test]
    fn ext_fields_are_parsed_lazily() {
        let bid = parse_bid(
            r#"{"id":"b1","impid":"pod_1","price":2.5,
                "ext":{"prebid":{"video":{"duration":15},"dealtiersatisfied":true}}}"#,
        );
        assert!(bid.ext_detail.get().is_none());
        assert_eq!(bid.creative_duration(), Some(15));
        assert!(bid.deal_tier_satisfied());
        assert!(bid.ext_detail.get().is_some());
    }

    #[test]
    fn missing_or_malformed_ext_is_tolerated() {
        let bid = parse_bid(r#"{"id":"b2","impid":"pod_1","price":1.0}"#);
        assert_eq!(bid.creative_duration(), None);
        assert!(!bid.deal_tier_satisfied());

        let bid = parse_bid(r#"{"id":"b3","impid":"pod_1","price":1.0,"ext":{"prebid":{"video":{"duration":"x"}}}}"#);
        assert_eq!(bid.creative_duration(), None);

        let bid = parse_bid(r#"{"id":"b4","impid":"pod_1","price":1.0,"ext":{"prebid":{"video":{"duration":0}}}}"#);
        assert_eq!(bid.creative_duration(), None);
    }
}
