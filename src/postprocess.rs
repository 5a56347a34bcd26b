// 该文件是 Yanmo （掩膜） 项目的一部分。
// src/postprocess.rs - 检测结果后处理
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use tracing::info;

use crate::detector::Detection;

const DEFAULT_IOU_THRESHOLD: f32 = 0.5;
const DEFAULT_SCORE_THRESHOLD: f32 = 0.05;
const DEFAULT_MAX_COUNT: usize = 100;

/// 检测结果后处理器
///
/// 将引擎输出的原始检测集合筛选为有界、去重的最终集合：
/// 置信度过滤、按分数稳定降序排序、类别无关的贪心 NMS、截断到上限。
#[derive(Debug, Clone, Copy)]
pub struct PostProcessor {
  /// NMS IOU 阈值，重叠严格大于该值的框被抑制
  pub iou_threshold: f32,
  /// 置信度阈值，分数不大于该值的框被丢弃
  pub score_threshold: f32,
  /// 保留检测框数量上限
  pub max_count: usize,
}

impl Default for PostProcessor {
  fn default() -> Self {
    PostProcessor {
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      score_threshold: DEFAULT_SCORE_THRESHOLD,
      max_count: DEFAULT_MAX_COUNT,
    }
  }
}

impl PostProcessor {
  pub fn filter(&self, detections: Vec<Detection>) -> Vec<Detection> {
    let mut candidates: Vec<Detection> = detections
      .into_iter()
      .filter(|det| det.score > self.score_threshold)
      .collect();

    // 稳定排序，同分保持原始顺序
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept = Vec::new();
    while !candidates.is_empty() {
      let best = candidates.remove(0);
      candidates.retain(|det| iou(&best.bbox, &det.bbox) <= self.iou_threshold);
      kept.push(best);
    }

    if kept.len() > self.max_count {
      info!("检测结果超过 {} 个，保留分数最高的 {} 个", self.max_count, self.max_count);
      kept.truncate(self.max_count);
    }

    kept
  }
}

/// 计算两个边界框的交并比
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]) * (a[3] - a[1]);
  let area_b = (b[2] - b[0]) * (b[3] - b[1]);
  let union = area_a + area_b - intersection;

  if union > 0.0 { intersection / union } else { 0.0 }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn det(bbox: [f32; 4], score: f32) -> Detection {
    Detection {
      bbox,
      score,
      label_index: 0,
    }
  }

  #[test]
  fn iou_of_identical_boxes_is_one() {
    let a = [0.0, 0.0, 10.0, 10.0];
    assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
  }

  #[test]
  fn iou_of_disjoint_boxes_is_zero() {
    let a = [0.0, 0.0, 10.0, 10.0];
    let b = [20.0, 20.0, 30.0, 30.0];
    assert_eq!(iou(&a, &b), 0.0);
  }

  #[test]
  fn iou_of_degenerate_boxes_is_zero() {
    let a = [5.0, 5.0, 5.0, 5.0];
    assert_eq!(iou(&a, &a), 0.0);
  }

  #[test]
  fn nms_suppresses_contained_box() {
    // IoU = 64 / 100 = 0.64 > 0.5，低分框被抑制
    let detections = vec![
      det([0.0, 0.0, 10.0, 10.0], 0.9),
      det([1.0, 1.0, 9.0, 9.0], 0.8),
    ];
    let kept = PostProcessor::default().filter(detections);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].bbox, [0.0, 0.0, 10.0, 10.0]);
  }

  #[test]
  fn nms_is_class_agnostic() {
    let detections = vec![
      Detection {
        bbox: [0.0, 0.0, 10.0, 10.0],
        score: 0.9,
        label_index: 0,
      },
      Detection {
        bbox: [1.0, 1.0, 9.0, 9.0],
        score: 0.8,
        label_index: 1,
      },
    ];
    let kept = PostProcessor::default().filter(detections);
    assert_eq!(kept.len(), 1);
  }

  #[test]
  fn nms_keeps_boxes_at_exact_threshold() {
    // 交 16 / 并 32 = 0.5，恰好等于阈值时两框共存
    let detections = vec![
      det([0.0, 0.0, 4.0, 8.0], 0.9),
      det([0.0, 0.0, 4.0, 4.0], 0.8),
    ];
    let kept = PostProcessor::default().filter(detections);
    assert_eq!(kept.len(), 2);
  }

  #[test]
  fn score_filter_drops_low_and_boundary_scores() {
    let detections = vec![
      det([0.0, 0.0, 10.0, 10.0], 0.01),
      det([20.0, 20.0, 30.0, 30.0], 0.2),
      det([40.0, 40.0, 50.0, 50.0], 0.05),
    ];
    let kept = PostProcessor::default().filter(detections);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].score, 0.2);
  }

  #[test]
  fn output_is_bounded_by_max_count() {
    // 150 个互不重叠的框，保留分数最高的 100 个
    let detections: Vec<Detection> = (0..150)
      .map(|i| {
        let offset = (i * 20) as f32;
        det([offset, 0.0, offset + 10.0, 10.0], (i + 1) as f32 / 151.0)
      })
      .collect();
    let kept = PostProcessor::default().filter(detections);
    assert_eq!(kept.len(), 100);
    let min_kept = kept.iter().map(|d| d.score).fold(f32::MAX, f32::min);
    assert!((min_kept - 51.0 / 151.0).abs() < 1e-6);
    for pair in kept.windows(2) {
      assert!(pair[0].score >= pair[1].score);
    }
  }

  #[test]
  fn empty_input_yields_empty_output() {
    assert!(PostProcessor::default().filter(Vec::new()).is_empty());
  }

  #[test]
  fn ties_keep_original_order() {
    let detections = vec![
      Detection {
        bbox: [0.0, 0.0, 10.0, 10.0],
        score: 0.8,
        label_index: 0,
      },
      Detection {
        bbox: [100.0, 100.0, 110.0, 110.0],
        score: 0.8,
        label_index: 1,
      },
    ];
    let kept = PostProcessor::default().filter(detections);
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].label_index, 0);
    assert_eq!(kept[1].label_index, 1);
  }
}
