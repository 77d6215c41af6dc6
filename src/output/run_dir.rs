// 该文件是 Wenfang （文房四宝） 项目的一部分。
// src/output/run_dir.rs - 运行目录输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use super::{OutputWriter, Visualizer};
use crate::detector::Detection;
use crate::input::Frame;

/// 选择不与已有运行冲突的目录：`exp`、`exp2`、`exp3`……
pub fn resolve_run_dir(project: &Path, name: &str) -> PathBuf {
  let candidate = project.join(name);
  if !candidate.exists() {
    return candidate;
  }

  let mut index = 2u32;
  loop {
    let candidate = project.join(format!("{}{}", name, index));
    if !candidate.exists() {
      return candidate;
    }
    index += 1;
  }
}

/// 每帧一条记录行：`类别, 置信度, x1, y1, x2, y2`
fn record_lines(detections: &[Detection]) -> String {
  detections
    .iter()
    .map(|det| {
      format!(
        "{}, {:.4}, {:.1}, {:.1}, {:.1}, {:.1}",
        det.class_name,
        det.confidence,
        det.x,
        det.y,
        det.x_max(),
        det.y_max()
      )
    })
    .collect::<Vec<_>>()
    .join("\n")
}

/// 运行目录输出
///
/// 摄像头/视频等连续来源的标注结果写入运行目录：
/// 每帧一张标注图片和一个同名记录文件，结束时写入 summary.json。
pub struct RunDirWriter {
  dir: PathBuf,
  visualizer: Visualizer,
  frame_count: u64,
  detection_count: usize,
  started_at: DateTime<Utc>,
}

impl RunDirWriter {
  pub fn create(project: &Path, name: &str, visualizer: Visualizer) -> Result<Self> {
    let dir = resolve_run_dir(project, name);
    std::fs::create_dir_all(&dir)
      .with_context(|| format!("无法创建运行目录: {}", dir.display()))?;
    info!("运行目录: {}", dir.display());

    Ok(Self {
      dir,
      visualizer,
      frame_count: 0,
      detection_count: 0,
      started_at: Utc::now(),
    })
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }
}

impl OutputWriter for RunDirWriter {
  fn write_frame(&mut self, frame: &Frame, detections: &[Detection]) -> Result<()> {
    let stem = match &frame.origin {
      // 目录输入保留原文件名
      Some(origin) => origin
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("frame")
        .to_string(),
      None => format!("frame_{:06}", frame.index),
    };

    let image_path = self.dir.join(format!("{}.jpg", stem));
    let mut annotated = frame.image.clone();
    self.visualizer.draw_detections(&mut annotated, detections);
    annotated
      .save(&image_path)
      .with_context(|| format!("无法保存图片: {}", image_path.display()))?;

    if !detections.is_empty() {
      let record_path = self.dir.join(format!("{}.txt", stem));
      std::fs::write(&record_path, record_lines(detections))
        .with_context(|| format!("无法写入记录文件: {}", record_path.display()))?;
    }

    self.frame_count += 1;
    self.detection_count += detections.len();
    Ok(())
  }

  fn finish(&mut self) -> Result<()> {
    let summary = serde_json::json!({
      "frames": self.frame_count,
      "detections": self.detection_count,
      "started_at": self.started_at.to_rfc3339(),
      "finished_at": Utc::now().to_rfc3339(),
    });

    let summary_path = self.dir.join("summary.json");
    std::fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)
      .with_context(|| format!("无法写入 {}", summary_path.display()))?;

    info!(
      "共写入 {} 帧, {} 个检测结果: {}",
      self.frame_count,
      self.detection_count,
      self.dir.display()
    );
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_resolve_run_dir_suffixes_on_collision() {
    let project = std::env::temp_dir().join(format!("wenfang-run-test-{}", std::process::id()));
    std::fs::create_dir_all(project.join("exp")).unwrap();
    std::fs::create_dir_all(project.join("exp2")).unwrap();

    assert_eq!(resolve_run_dir(&project, "exp"), project.join("exp3"));
    assert_eq!(resolve_run_dir(&project, "fresh"), project.join("fresh"));

    std::fs::remove_dir_all(&project).unwrap();
  }

  #[test]
  fn test_record_line_format() {
    let detections = [Detection {
      x: 10.0,
      y: 20.0,
      width: 30.0,
      height: 40.0,
      confidence: 0.8765,
      class_id: 2,
      class_name: "pen".to_string(),
    }];

    assert_eq!(record_lines(&detections), "pen, 0.8765, 10.0, 20.0, 40.0, 60.0");
  }
}
