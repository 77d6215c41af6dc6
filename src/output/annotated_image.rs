// 该文件是 Wenfang （文房四宝） 项目的一部分。
// src/output/annotated_image.rs - 标注图片输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::{Context, Result};

use super::{OutputWriter, Visualizer, annotated_path};
use crate::detector::Detection;
use crate::input::Frame;

/// 标注图片输出
///
/// 输出路径由帧的来源文件推导（`photo.jpg` -> `photo_det.jpg`），
/// 没有来源文件的帧写入固定的后备路径。
pub struct AnnotatedImageWriter {
  visualizer: Visualizer,
  fallback: PathBuf,
  /// 已写入的输出路径
  saved: Vec<PathBuf>,
}

impl AnnotatedImageWriter {
  pub fn new(visualizer: Visualizer) -> Self {
    Self {
      visualizer,
      fallback: PathBuf::from("detections.jpg"),
      saved: Vec::new(),
    }
  }

  pub fn saved_paths(&self) -> &[PathBuf] {
    &self.saved
  }
}

impl OutputWriter for AnnotatedImageWriter {
  fn write_frame(&mut self, frame: &Frame, detections: &[Detection]) -> Result<()> {
    let output_path = match &frame.origin {
      Some(origin) => annotated_path(origin),
      None => self.fallback.clone(),
    };

    let mut annotated = frame.image.clone();
    self.visualizer.draw_detections(&mut annotated, detections);

    annotated
      .save(&output_path)
      .with_context(|| format!("无法保存图片: {}", output_path.display()))?;

    println!("Saved: {}", output_path.display());
    self.saved.push(output_path);

    Ok(())
  }

  fn finish(&mut self) -> Result<()> {
    Ok(())
  }
}
