// 该文件是 Yanmo （掩膜） 项目的一部分。
// src/channel.rs - 基于共享文件的消息通道
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{
  fs,
  path::{Path, PathBuf},
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread,
  time::{Duration, SystemTime},
};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  message::{MessageError, RequestMessage},
};

/// 默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 空闲日志间隔，长时间无请求时输出一条诊断
const IDLE_LOG_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum ChannelError {
  #[error("URI 方案不匹配: 期望 '{0}', 实际 '{1}'")]
  SchemeMismatch(&'static str, String),
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("消息格式错误: {0}")]
  Malformed(MessageError),
}

impl From<std::io::Error> for ChannelError {
  fn from(err: std::io::Error) -> Self {
    ChannelError::IoError(err)
  }
}

impl From<MessageError> for ChannelError {
  fn from(err: MessageError) -> Self {
    ChannelError::Malformed(err)
  }
}

/// 取消令牌，由中断处理器置位，仅在等待请求时被检查
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  pub fn new() -> Self {
    CancelToken::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

/// 一次等待的结果
#[derive(Debug)]
pub enum Delivery {
  Request(RequestMessage),
  Cancelled,
}

/// 请求来源
///
/// 服务循环只依赖该接口，轮询文件之外的传输方式（套接字、
/// 文件系统事件通知等）可以在不改动服务循环的情况下替换进来。
pub trait RequestSource {
  type Error;

  /// 阻塞等待下一条请求，或在取消令牌置位后返回 `Delivery::Cancelled`
  fn await_request(&mut self, cancel: &CancelToken) -> Result<Delivery, Self::Error>;
}

/// 共享文件请求通道（服务端角色）
///
/// 以共享文件的修改时间作为版本号：启动时记录当前版本号，按固定
/// 间隔轮询，版本号严格前进时读取并解码文件内容。每次观察到的版本
/// 跃迁至多投递一条消息，同一间隔内的两次写入只有后一次会被投递。
pub struct FileChannel {
  path: PathBuf,
  poll_interval: Duration,
  marker: SystemTime,
}

impl FileChannel {
  /// 打开通道，文件不存在时创建，并记录当前版本号
  pub fn open(path: impl Into<PathBuf>, poll_interval: Duration) -> Result<Self, ChannelError> {
    let path = path.into();
    touch_if_missing(&path)?;
    let marker = version_marker(&path)?;
    info!("使用 {} 进行通信", path.display());
    debug!("当前版本号: {:?}", marker);
    Ok(FileChannel {
      path,
      poll_interval,
      marker,
    })
  }

  pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
    self.poll_interval = poll_interval;
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl FromUrlWithScheme for FileChannel {
  const SCHEME: &'static str = "file";
}

impl FromUrl for FileChannel {
  type Error = ChannelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ChannelError::SchemeMismatch(
        Self::SCHEME,
        url.scheme().to_string(),
      ));
    }
    FileChannel::open(url.path(), DEFAULT_POLL_INTERVAL)
  }
}

impl RequestSource for FileChannel {
  type Error = ChannelError;

  fn await_request(&mut self, cancel: &CancelToken) -> Result<Delivery, ChannelError> {
    let idle_polls = (IDLE_LOG_INTERVAL.as_millis() / self.poll_interval.as_millis().max(1)).max(1);
    let mut polls = 0;

    loop {
      if cancel.is_cancelled() {
        return Ok(Delivery::Cancelled);
      }

      let current = version_marker(&self.path)?;
      if current > self.marker {
        // 先推进版本号再读取，同一次写入不会被重复投递
        self.marker = current;
        debug!("版本号更新为 {:?}", current);
        let raw = fs::read_to_string(&self.path)?;
        let msg = RequestMessage::decode(&raw)?;
        return Ok(Delivery::Request(msg));
      }

      thread::sleep(self.poll_interval);
      polls += 1;
      if polls >= idle_polls {
        debug!("{} 秒内没有收到请求", IDLE_LOG_INTERVAL.as_secs());
        polls = 0;
      }
    }
  }
}

/// 共享文件请求通道（客户端角色）
///
/// 写入请求前先记录目标文件的版本号，随后轮询该版本号直到变化，
/// 变化即表示服务端已写入结果。
pub struct ClientChannel {
  path: PathBuf,
  poll_interval: Duration,
}

impl ClientChannel {
  pub fn open(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
    ClientChannel {
      path: path.into(),
      poll_interval,
    }
  }

  pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
    self.poll_interval = poll_interval;
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// 提交请求并返回等待中的响应
  pub fn submit(&self, msg: &RequestMessage) -> Result<PendingResponse, ChannelError> {
    let target = msg.resolved_target_path();
    touch_if_missing(&target)?;
    let marker = version_marker(&target)?;

    fs::write(&self.path, msg.encode())?;
    info!("请求已写入 {}", self.path.display());

    Ok(PendingResponse {
      target,
      marker,
      poll_interval: self.poll_interval,
    })
  }
}

impl FromUrlWithScheme for ClientChannel {
  const SCHEME: &'static str = "file";
}

impl FromUrl for ClientChannel {
  type Error = ChannelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ChannelError::SchemeMismatch(
        Self::SCHEME,
        url.scheme().to_string(),
      ));
    }
    Ok(ClientChannel::open(url.path(), DEFAULT_POLL_INTERVAL))
  }
}

/// 等待中的响应
pub struct PendingResponse {
  target: PathBuf,
  marker: SystemTime,
  poll_interval: Duration,
}

impl PendingResponse {
  pub fn target(&self) -> &Path {
    &self.target
  }

  /// 阻塞直到目标文件的版本号变化，返回结果路径
  pub fn wait(self) -> Result<PathBuf, ChannelError> {
    loop {
      if version_marker(&self.target)? != self.marker {
        return Ok(self.target);
      }
      thread::sleep(self.poll_interval);
    }
  }
}

fn touch_if_missing(path: &Path) -> Result<(), std::io::Error> {
  if !path.exists() {
    fs::OpenOptions::new()
      .write(true)
      .create(true)
      .truncate(false)
      .open(path)?;
  }
  Ok(())
}

fn version_marker(path: &Path) -> Result<SystemTime, std::io::Error> {
  fs::metadata(path)?.modified()
}
