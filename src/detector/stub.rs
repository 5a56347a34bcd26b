// 该文件是 Yanmo （掩膜） 项目的一部分。
// src/detector/stub.rs - 桩检测引擎
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::convert::Infallible;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  detector::{Detection, Detector},
};

#[derive(Error, Debug)]
pub enum StubDetectorError {
  #[error("URI 方案不匹配: 期望 '{0}', 实际 '{1}'")]
  SchemeMismatch(&'static str, String),
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("检测结果文件解析错误: {0}")]
  JsonError(serde_json::Error),
}

impl From<std::io::Error> for StubDetectorError {
  fn from(err: std::io::Error) -> Self {
    StubDetectorError::IoError(err)
  }
}

impl From<serde_json::Error> for StubDetectorError {
  fn from(err: serde_json::Error) -> Self {
    StubDetectorError::JsonError(err)
  }
}

/// 返回预置检测结果的桩引擎
///
/// `stub:` 返回空结果；`stub:///path/to/detections.json` 回放文件中的
/// 检测结果（JSON 数组）。用于测试与联调，不做任何真实推理。
#[derive(Debug, Clone, Default)]
pub struct StubDetector {
  detections: Vec<Detection>,
}

impl StubDetector {
  pub fn new() -> Self {
    StubDetector::default()
  }

  pub fn with_detections(detections: Vec<Detection>) -> Self {
    StubDetector { detections }
  }
}

impl FromUrlWithScheme for StubDetector {
  const SCHEME: &'static str = "stub";
}

impl FromUrl for StubDetector {
  type Error = StubDetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(StubDetectorError::SchemeMismatch(
        Self::SCHEME,
        url.scheme().to_string(),
      ));
    }

    if url.path().is_empty() {
      info!("使用空结果桩引擎");
      return Ok(StubDetector::new());
    }

    let raw = std::fs::read_to_string(url.path())?;
    let detections: Vec<Detection> = serde_json::from_str(&raw)?;
    info!("从 {} 回放 {} 个检测结果", url.path(), detections.len());
    Ok(StubDetector::with_detections(detections))
  }
}

impl Detector for StubDetector {
  type Error = Infallible;

  fn detect(&self, _image: &RgbImage, labels: &[String]) -> Result<Vec<Detection>, Self::Error> {
    debug!("桩引擎返回 {} 个检测结果，标签: {}", self.detections.len(), labels.join(","));
    Ok(self.detections.clone())
  }
}
