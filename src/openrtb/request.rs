use serde::{Deserialize, Serialize};

use crate::openrtb::response::SeatBid;

/// Pod 竞价输入：一个请求包含多个 Pod，每个 Pod 绑定配置档及收集到的出价
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PodAuctionRequest {
    pub id: String,
    #[serde(default)]
    pub pods: Vec<PodRequest>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PodRequest {
    pub id: String,
    pub profile: String,
    #[serde(default)]
    pub seatbid: Vec<SeatBid>,
}

impl PodAuctionRequest {
    pub fn from_slice(bytes: &mut [u8]) -> Result<Self, simd_json::Error> {
        simd_json::serde::from_slice(bytes)
    }

    pub fn bid_count(&self) -> usize {
        self.pods
            .iter()
            .flat_map(|pod| pod.seatbid.iter())
            .map(|seat| seat.bid.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pods_and_seat_bids() {
        let mut raw = br#"{
            "id": "req-1",
            "pods": [
                {"id": "pod1", "profile": "ctv", "seatbid": [
                    {"seat": "bidderA", "bid": [
                        {"id": "a", "impid": "pod1_1", "price": 2.0, "adm": "<VAST version=\"3.0\"></VAST>"},
                        {"id": "b", "impid": "pod1_2", "price": 1.5}
                    ]}
                ]},
                {"id": "pod2", "profile": "ctv"}
            ]
        }"#
        .to_vec();
        let request = PodAuctionRequest::from_slice(&mut raw).unwrap();
        assert_eq!(request.pods.len(), 2);
        assert_eq!(request.bid_count(), 2);
        assert_eq!(request.pods[0].seatbid[0].seat.as_deref(), Some("bidderA"));
        assert!(request.pods[1].seatbid.is_empty());
    }
}
