// 该文件是 Yanmo （掩膜） 项目的一部分。
// src/bin/masking_server.rs - 掩膜服务主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{thread, time::Duration};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use yanmo::{
  FromUrl,
  channel::{CancelToken, DEFAULT_POLL_INTERVAL, FileChannel},
  detector::StubDetector,
  postprocess::PostProcessor,
  server::MaskServer,
};

/// Yanmo 掩膜服务参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 请求通道，如 file:///tmp/yanmo-server.msg
  /// 缺省使用临时目录下的 yanmo-server.msg
  #[arg(long, value_name = "CHANNEL")]
  pub channel: Option<Url>,

  /// 检测引擎
  /// 支持方案:
  /// - stub: 返回空结果
  /// - stub:///path/to/detections.json 回放预置检测结果
  #[arg(long, default_value = "stub:", value_name = "DETECTOR")]
  pub detector: Url,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub iou_threshold: f32,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.05", value_name = "THRESHOLD")]
  pub score_threshold: f32,

  /// 保留检测框数量上限
  #[arg(long, default_value = "100", value_name = "COUNT")]
  pub max_count: usize,

  /// 轮询间隔（毫秒）
  #[arg(long, default_value = "100", value_name = "MILLIS")]
  pub poll_interval: u64,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let cancel = CancelToken::new();
  {
    let cancel = cancel.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      cancel.cancel();
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
  }

  let poll_interval = Duration::from_millis(args.poll_interval);
  let channel = match &args.channel {
    Some(url) => FileChannel::from_url(url)?,
    None => FileChannel::open(std::env::temp_dir().join("yanmo-server.msg"), DEFAULT_POLL_INTERVAL)?,
  }
  .with_poll_interval(poll_interval);

  let detector = StubDetector::from_url(&args.detector)?;

  let postprocessor = PostProcessor {
    iou_threshold: args.iou_threshold,
    score_threshold: args.score_threshold,
    max_count: args.max_count,
  };

  MaskServer::new(postprocessor).run(channel, detector, cancel)
}
