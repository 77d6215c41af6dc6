// 该文件是 Wenfang （文房四宝） 项目的一部分。
// src/output/mod.rs - 输出模块
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod annotated_image;
#[cfg(feature = "gstreamer_video")]
mod display;
mod run_dir;
mod visualizer;

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::detector::Detection;
use crate::input::Frame;

pub use annotated_image::AnnotatedImageWriter;
#[cfg(feature = "gstreamer_video")]
pub use display::DisplaySink;
pub use run_dir::{RunDirWriter, resolve_run_dir};
pub use visualizer::Visualizer;

/// 输出写入器 trait
pub trait OutputWriter {
  /// 写入一帧及其检测结果
  fn write_frame(&mut self, frame: &Frame, detections: &[Detection]) -> Result<()>;

  /// 完成写入
  fn finish(&mut self) -> Result<()>;
}

/// 由输入文件路径推导标注输出路径：`photo.jpg` -> `photo_det.jpg`
pub fn annotated_path(input: &Path) -> PathBuf {
  let stem = input
    .file_stem()
    .and_then(|stem| stem.to_str())
    .unwrap_or("detections");

  let name = match input.extension().and_then(|ext| ext.to_str()) {
    Some(ext) => format!("{}_det.{}", stem, ext),
    None => format!("{}_det", stem),
  };

  input.with_file_name(name)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_annotated_path_keeps_extension() {
    assert_eq!(
      annotated_path(Path::new("photo.jpg")),
      PathBuf::from("photo_det.jpg")
    );
    assert_eq!(
      annotated_path(Path::new("data/desk.png")),
      PathBuf::from("data/desk_det.png")
    );
  }

  #[test]
  fn test_annotated_path_without_extension() {
    assert_eq!(annotated_path(Path::new("frame")), PathBuf::from("frame_det"));
  }
}
