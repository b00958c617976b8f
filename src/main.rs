// src/main.rs

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::info;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};
use uuid::Uuid;

mod adpod;
mod config;
mod logging;
mod model;
mod openrtb;
mod planner;
mod response;

use adpod::assembler::{AssemblerSettings, LEGACY_TIMEOUT};
use adpod::auction::PodAuction;
use config::config_manager::ConfigManager;
use logging::auction_logger::AuctionLogger;
use logging::pod_log::PodAuctionLog;
use model::adapters::{FileProfileAdapter, ProfileAdapter, StaticProfileAdapter};
use model::demand::synthetic_pod_request;
use openrtb::request::PodAuctionRequest;
use planner::{plan_impressions, select_algorithm};
use response::builder::build_bid_response;

const DEMO_BIDDERS: [&str; 3] = ["alpha", "beta", "gamma"];

#[derive(Parser, Debug)]
#[command(author = "whiteCcinn", version = "1.0", about = "CTV ad pod planner and assembler")]
struct CliArgs {
    /// Pod 配置档文件，未指定时使用内置配置
    #[arg(long)]
    profiles: Option<String>,
    #[arg(long, default_value = "logs")]
    log_dir: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 为配置档规划广告位
    Plan {
        #[arg(long)]
        profile: String,
        #[arg(long, default_value = "pod")]
        pod_id: String,
    },
    /// 对输入的出价运行 Pod 竞价，输出 OpenRTB 响应
    Auction {
        #[arg(long, conflicts_with = "demo")]
        input: Option<String>,
        /// 为每个配置档生成模拟出价
        #[arg(long)]
        demo: bool,
        #[arg(long, default_value_t = 10)]
        timeout_ms: u64,
        /// 使用旧版本的 50ms 组装预算
        #[arg(long, conflicts_with = "timeout_ms")]
        legacy_timeout: bool,
        #[arg(long, default_value_t = 2)]
        workers: usize,
        #[arg(long, default_value_t = 64)]
        queue_capacity: usize,
        /// 在拼接的 VAST 中附带出价状态
        #[arg(long)]
        debug: bool,
    },
}

fn load_profiles(config: &ConfigManager, path: Option<&str>) -> Result<usize> {
    let profiles = match path {
        Some(path) => FileProfileAdapter::new(path).load_profiles()?,
        None => StaticProfileAdapter::builtin().load_profiles()?,
    };
    Ok(config.update_profiles(profiles)?)
}

fn read_request(path: &str) -> Result<PodAuctionRequest> {
    let mut raw = fs::read(path).with_context(|| format!("failed to read auction input {}", path))?;
    PodAuctionRequest::from_slice(&mut raw).with_context(|| format!("failed to parse auction input {}", path))
}

fn demo_request(config: &ConfigManager) -> Result<PodAuctionRequest> {
    let mut pods = Vec::new();
    for (i, name) in config.profile_names().iter().enumerate() {
        let profile = config
            .get_profile(name)
            .ok_or_else(|| anyhow!("profile {} disappeared", name))?;
        let pod_id = format!("pod{}", i + 1);
        let slots = plan_impressions(&pod_id, &profile)?;
        pods.push(synthetic_pod_request(&pod_id, name, &slots, &DEMO_BIDDERS, 2));
    }
    Ok(PodAuctionRequest {
        id: Uuid::new_v4().to_string(),
        pods,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // 初始化全局 tracing 日志
    let log_file = rolling::hourly(&args.log_dir, "adpod_log.json");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);
    let subscriber = Registry::default()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().json().with_writer(non_blocking));
    tracing::subscriber::set_global_default(subscriber).context("unable to set global tracing subscriber")?;

    let config = Arc::new(ConfigManager::new());
    let count = load_profiles(&config, args.profiles.as_deref()).context("failed to load pod profiles")?;
    info!(profiles = count, source = ?args.profiles, "pod profiles loaded");

    match args.command {
        Command::Plan { profile, pod_id } => {
            let profile = config
                .get_profile(&profile)
                .ok_or_else(|| anyhow!("unknown pod profile '{}'", profile))?;
            let slots = plan_impressions(&pod_id, &profile)?;
            info!(pod_id = %pod_id, algorithm = ?select_algorithm(&profile), slots = slots.len(), "plan finished");
            println!("{}", serde_json::to_string_pretty(&slots)?);
        }
        Command::Auction {
            input,
            demo,
            timeout_ms,
            legacy_timeout,
            workers,
            queue_capacity,
            debug,
        } => {
            let request = match (input, demo) {
                (Some(path), _) => read_request(&path)?,
                (None, true) => demo_request(&config)?,
                (None, false) => return Err(anyhow!("either --input or --demo is required")),
            };
            let settings = AssemblerSettings {
                workers,
                timeout: if legacy_timeout {
                    LEGACY_TIMEOUT
                } else {
                    Duration::from_millis(timeout_ms)
                },
                queue_capacity,
            };

            let auction_logger = AuctionLogger::new(&args.log_dir, 1000, 100, 1000);
            let auction = PodAuction::new(config.clone(), settings);
            let outcomes = auction.run(&request).await;
            for outcome in &outcomes {
                auction_logger.log(&PodAuctionLog::from_outcome(&request.id, outcome)).await;
            }

            let response = build_bid_response(&request.id, &outcomes, debug);
            info!(
                request_id = %request.id,
                filled = outcomes.iter().filter(|o| o.winner.is_some()).count(),
                pods = outcomes.len(),
                "pod auction finished"
            );
            println!("{}", serde_json::to_string_pretty(&response)?);
            auction_logger.shutdown().await;
        }
    }
    Ok(())
}
