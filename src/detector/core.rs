// 该文件是 Yanmo （掩膜） 项目的一部分。
// src/detector/core.rs - 检测引擎定义
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// 单个检测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  /// 边界框 [x_min, y_min, x_max, y_max]，图像像素坐标
  pub bbox: [f32; 4],
  /// 置信度 (0.0 - 1.0)
  pub score: f32,
  /// 请求标签列表中的类别索引
  pub label_index: usize,
}

/// 检测引擎
///
/// 引擎返回的是未经过滤的原始检测集合，可能包含重叠、低置信度
/// 或重复的边界框，由后处理流程负责筛选。
pub trait Detector {
  type Error;

  fn detect(&self, image: &RgbImage, labels: &[String]) -> Result<Vec<Detection>, Self::Error>;
}
