// 该文件是 Yanmo （掩膜） 项目的一部分。
// src/bin/submit_request.rs - 请求提交客户端
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use yanmo::{FromUrl, channel::ClientChannel, message::RequestMessage};

/// Yanmo 请求提交客户端参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 待处理图像的路径
  #[arg(long, value_name = "IMAGE")]
  pub image: PathBuf,

  /// 需要保留的目标类别，逗号分隔，如 "cat,dog"
  #[arg(long, value_name = "LABELS")]
  pub labels: String,

  /// 结果写入路径，缺省时由图像路径派生
  #[arg(long, value_name = "TARGET")]
  pub target: Option<PathBuf>,

  /// 请求通道，缺省使用临时目录下的 yanmo-server.msg
  #[arg(long, value_name = "CHANNEL")]
  pub channel: Option<Url>,

  /// 轮询间隔（毫秒）
  #[arg(long, default_value = "100", value_name = "MILLIS")]
  pub poll_interval: u64,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let poll_interval = Duration::from_millis(args.poll_interval);

  let channel = match &args.channel {
    Some(url) => ClientChannel::from_url(url)?,
    None => ClientChannel::open(std::env::temp_dir().join("yanmo-server.msg"), poll_interval),
  }
  .with_poll_interval(poll_interval);

  let image_path = std::fs::canonicalize(&args.image)?;
  let msg = RequestMessage::new(image_path, &args.labels, args.target);

  info!("提交请求: {}", msg.encode());
  let pending = channel.submit(&msg)?;

  info!("等待结果写入 {} ...", pending.target().display());
  let result_path = pending.wait()?;
  info!("结果已就绪: {}", result_path.display());

  Ok(())
}
