// 该文件是 Yanmo （掩膜） 项目的一部分。
// src/server.rs - 掩膜服务循环
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

use anyhow::Result;
use image::{ImageReader, RgbImage};
use tracing::{info, warn};

use crate::{
  channel::{CancelToken, Delivery, RequestSource},
  detector::Detector,
  mask::Mask,
  message::RequestMessage,
  postprocess::PostProcessor,
};

/// 掩膜服务
///
/// 每个周期依次执行：等待请求、推理、后处理、构造掩膜、应用掩膜、
/// 保存结果。取消信号只在等待请求时被观察，已开始的周期总是运行到
/// 完成或整体失败；周期内的错误不被捕获，直接终止服务循环。
pub struct MaskServer {
  postprocessor: PostProcessor,
}

impl MaskServer {
  pub fn new(postprocessor: PostProcessor) -> Self {
    MaskServer { postprocessor }
  }

  pub fn run<C, M, CE, ME>(&self, mut channel: C, detector: M, cancel: CancelToken) -> Result<()>
  where
    CE: std::error::Error + Sync + Send + 'static,
    ME: std::error::Error + Sync + Send + 'static,
    C: RequestSource<Error = CE>,
    M: Detector<Error = ME>,
  {
    info!("掩膜服务启动");
    loop {
      match channel.await_request(&cancel)? {
        Delivery::Cancelled => {
          warn!("收到取消信号，退出服务循环");
          return Ok(());
        }
        Delivery::Request(msg) => self.run_cycle(&detector, msg)?,
      }
    }
  }

  fn run_cycle<M, ME>(&self, detector: &M, msg: RequestMessage) -> Result<()>
  where
    ME: std::error::Error + Sync + Send + 'static,
    M: Detector<Error = ME>,
  {
    let save_path = msg.resolved_target_path();
    info!(
      "开始对 {} 进行推理，标签: {}",
      msg.image_path.display(),
      msg.labels.join(",")
    );

    let image: RgbImage = ImageReader::open(&msg.image_path)?.decode()?.into();
    let (width, height) = image.dimensions();

    let detections = detector.detect(&image, &msg.labels)?;
    let detections = self.postprocessor.filter(detections);
    info!("检测到 {} 个目标", detections.len());

    // 未检出目标时保留整幅图像，而不是把全图掩掉
    let mask = if detections.is_empty() {
      Mask::all_kept(width, height)
    } else {
      let masks: Vec<Mask> = detections
        .iter()
        .map(|det| Mask::from_box(&det.bbox, width, height))
        .collect();
      Mask::combine(&masks)?
    };

    let masked = mask.apply(&image);
    info!("掩膜应用完成");

    masked.save(&save_path)?;
    info!("结果已保存到 {}", save_path.display());

    Ok(())
  }
}
