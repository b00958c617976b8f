use thiserror::Error;

/// Pod 级别的失败，只影响当前 Pod，不会中断整个竞价响应
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PodError {
    #[error("unable to generate ad slots for pod {pod_id}")]
    NoSlots { pod_id: String },

    #[error("all bids filtered while matching lineitem duration")]
    EmptyBuckets,

    #[error("unable to generate adpod from bid combinations")]
    NoSurvivingAssignment,

    #[error("unknown pod profile '{0}'")]
    UnknownProfile(String),
}
