// 该文件是 Yanmo （掩膜） 项目的一部分。
// src/message.rs - 请求消息定义
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

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessageError {
  #[error("JSON 解析错误: {0}")]
  JsonError(serde_json::Error),
  #[error("缺少字段: {0}")]
  MissingField(&'static str),
  #[error("字段为空: {0}")]
  EmptyField(&'static str),
}

impl From<serde_json::Error> for MessageError {
  fn from(err: serde_json::Error) -> Self {
    MessageError::JsonError(err)
  }
}

/// 掩膜请求消息
///
/// `labels` 在线路上是一个逗号分隔的字符串，编码与解码经过一次
/// 逗号拼接/拆分往返，因此标签内部不得包含逗号。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMessage {
  /// 待处理图像的路径
  pub image_path: PathBuf,
  /// 需要保留的目标类别
  pub labels: Vec<String>,
  /// 结果写入路径，缺省时由 `image_path` 派生
  pub target_path: Option<PathBuf>,
}

#[derive(Deserialize)]
struct WireMessage {
  #[serde(default)]
  image_path: Option<String>,
  #[serde(default)]
  labels: Option<String>,
  #[serde(default)]
  target_path: Option<String>,
}

impl RequestMessage {
  pub fn new(
    image_path: impl Into<PathBuf>,
    labels: &str,
    target_path: Option<PathBuf>,
  ) -> Self {
    RequestMessage {
      image_path: image_path.into(),
      labels: split_labels(labels),
      target_path,
    }
  }

  /// 从 JSON 文本解码请求消息
  pub fn decode(raw: &str) -> Result<Self, MessageError> {
    let wire: WireMessage = serde_json::from_str(raw)?;

    let image_path = wire
      .image_path
      .ok_or(MessageError::MissingField("image_path"))?;
    if image_path.trim().is_empty() {
      return Err(MessageError::EmptyField("image_path"));
    }

    let labels = wire.labels.ok_or(MessageError::MissingField("labels"))?;
    if labels.trim().is_empty() {
      return Err(MessageError::EmptyField("labels"));
    }

    Ok(RequestMessage {
      image_path: PathBuf::from(image_path),
      labels: split_labels(&labels),
      target_path: wire.target_path.map(PathBuf::from),
    })
  }

  /// 编码为 JSON 文本，`labels` 总是被拼接为逗号分隔字符串
  pub fn encode(&self) -> String {
    let mut wire = serde_json::json!({
      "image_path": self.image_path.display().to_string(),
      "labels": self.labels.join(","),
    });
    if let Some(target) = &self.target_path {
      wire["target_path"] = serde_json::Value::String(target.display().to_string());
    }
    wire.to_string()
  }

  /// 结果写入路径：显式指定的 `target_path`，否则在扩展名前插入 `.res`
  ///
  /// `foo.jpg` 派生为 `foo.res.jpg`，无扩展名的 `foo` 派生为 `foo.res`。
  pub fn resolved_target_path(&self) -> PathBuf {
    match &self.target_path {
      Some(path) => path.clone(),
      None => {
        let mut derived = self.image_path.clone();
        match self.image_path.extension().and_then(|ext| ext.to_str()) {
          Some(ext) => derived.set_extension(format!("res.{ext}")),
          None => derived.set_extension("res"),
        };
        derived
      }
    }
  }
}

fn split_labels(labels: &str) -> Vec<String> {
  labels.split(',').map(|label| label.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decode_splits_and_trims_labels() {
    let msg = RequestMessage::decode(r#"{"image_path":"/data/a.jpg","labels":"cat, dog"}"#)
      .expect("合法消息");
    assert_eq!(msg.image_path, PathBuf::from("/data/a.jpg"));
    assert_eq!(msg.labels, vec!["cat".to_string(), "dog".to_string()]);
    assert_eq!(msg.target_path, None);
  }

  #[test]
  fn decode_keeps_empty_label_elements() {
    let msg = RequestMessage::decode(r#"{"image_path":"/a.png","labels":" , dog"}"#)
      .expect("合法消息");
    assert_eq!(msg.labels, vec!["".to_string(), "dog".to_string()]);
  }

  #[test]
  fn decode_rejects_missing_fields() {
    assert!(matches!(
      RequestMessage::decode(r#"{"labels":"cat"}"#),
      Err(MessageError::MissingField("image_path"))
    ));
    assert!(matches!(
      RequestMessage::decode(r#"{"image_path":"/a.png"}"#),
      Err(MessageError::MissingField("labels"))
    ));
  }

  #[test]
  fn decode_rejects_empty_fields() {
    assert!(matches!(
      RequestMessage::decode(r#"{"image_path":"  ","labels":"cat"}"#),
      Err(MessageError::EmptyField("image_path"))
    ));
    assert!(matches!(
      RequestMessage::decode(r#"{"image_path":"/a.png","labels":"  "}"#),
      Err(MessageError::EmptyField("labels"))
    ));
  }

  #[test]
  fn decode_rejects_invalid_json() {
    assert!(matches!(
      RequestMessage::decode("not json"),
      Err(MessageError::JsonError(_))
    ));
  }

  #[test]
  fn encode_decode_round_trip() {
    let msg = RequestMessage::new(
      "/data/photo.jpg",
      "cat,dog,bird",
      Some(PathBuf::from("/data/out.jpg")),
    );
    let decoded = RequestMessage::decode(&msg.encode()).expect("往返解码");
    assert_eq!(decoded, msg);

    let msg = RequestMessage::new("/data/photo.jpg", "cat", None);
    let decoded = RequestMessage::decode(&msg.encode()).expect("往返解码");
    assert_eq!(decoded, msg);
  }

  #[test]
  fn target_path_prefers_explicit_value() {
    let msg = RequestMessage::new("/a/b.jpg", "cat", Some(PathBuf::from("/out/c.png")));
    assert_eq!(msg.resolved_target_path(), PathBuf::from("/out/c.png"));
  }

  #[test]
  fn target_path_derives_with_res_infix() {
    let msg = RequestMessage::new("/a/photo.jpg", "cat", None);
    assert_eq!(msg.resolved_target_path(), PathBuf::from("/a/photo.res.jpg"));

    let msg = RequestMessage::new("/a/photo", "cat", None);
    assert_eq!(msg.resolved_target_path(), PathBuf::from("/a/photo.res"));
  }
}
