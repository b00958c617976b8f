pub mod auction_logger;
pub mod pod_log;
