// 该文件是 Wenfang （文房四宝） 项目的一部分。
// src/input/mod.rs - 输入源模块
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

// mod camera_source; // TEMP diagnostic
mod directory_source;
mod image_source;
#[cfg(feature = "gstreamer_video")]
mod video_source;

use std::path::{Path, PathBuf};

use anyhow::Result;
use image::RgbImage;

// pub use camera_source::CameraSource; // TEMP diagnostic
pub use directory_source::DirectorySource;
pub use image_source::ImageSource;
#[cfg(feature = "gstreamer_video")]
pub use video_source::VideoSource;

/// 支持的图片文件后缀
const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

/// 帧数据
pub struct Frame {
  /// RGB 图像数据
  pub image: RgbImage,
  /// 帧索引
  pub index: u64,
  /// 时间戳（毫秒）
  pub timestamp_ms: u64,
  /// 帧来源文件（摄像头/视频流时为 None）
  pub origin: Option<PathBuf>,
}

/// 输入源类型
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputSourceType {
  /// 单张图片
  Image,
  /// 图片目录
  Directory,
  /// 视频文件
  Video,
  /// V4L2 摄像头
  Camera,
}

impl InputSourceType {
  pub fn describe(&self) -> &'static str {
    match self {
      InputSourceType::Image => "图片",
      InputSourceType::Directory => "图片目录",
      InputSourceType::Video => "视频",
      InputSourceType::Camera => "V4L2 摄像头",
    }
  }
}

/// 输入源 trait
pub trait InputSource: Iterator<Item = Result<Frame>> {
  /// 输入源类型
  fn source_type(&self) -> InputSourceType;

  /// 帧宽度
  fn width(&self) -> u32;

  /// 帧高度
  fn height(&self) -> u32;

  /// 帧率（如果适用）
  fn fps(&self) -> Option<f64>;
}

/// 输入源的解析结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
  /// 摄像头设备序号（纯数字来源字符串）
  CameraIndex(usize),
  /// 摄像头设备路径
  CameraDevice(String),
  /// 单张图片
  Image(PathBuf),
  /// 图片目录
  Directory(PathBuf),
  /// 视频文件
  Video(PathBuf),
}

/// 判断路径后缀是否为图片
fn has_image_extension(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| {
      let ext = ext.to_lowercase();
      IMAGE_EXTENSIONS.iter().any(|known| *known == ext)
    })
    .unwrap_or(false)
}

/// 解析来源字符串
///
/// 纯数字字符串视为摄像头序号，其余视为文件系统路径。
pub fn classify_source(source: &str) -> SourceKind {
  if !source.is_empty() && source.chars().all(|c| c.is_ascii_digit()) {
    // 纯数字来源不可能超出 usize，直接解析
    return SourceKind::CameraIndex(source.parse().unwrap_or(0));
  }

  if let Some(device) = source.strip_prefix("v4l2://") {
    return SourceKind::CameraDevice(device.to_string());
  }
  if source.starts_with("/dev/video") {
    return SourceKind::CameraDevice(source.to_string());
  }

  let path = Path::new(source);
  if path.is_dir() {
    return SourceKind::Directory(path.to_path_buf());
  }
  if has_image_extension(path) {
    return SourceKind::Image(path.to_path_buf());
  }

  SourceKind::Video(path.to_path_buf())
}

/// 根据来源字符串打开输入源
pub fn open_source(source: &str) -> Result<Box<dyn InputSource>> {
  match classify_source(source) {
    SourceKind::CameraIndex(_index) => unimplemented!("TEMP diagnostic"),
    SourceKind::CameraDevice(_device) => unimplemented!("TEMP diagnostic"),
    SourceKind::Image(path) => Ok(Box::new(ImageSource::new(&path)?)),
    SourceKind::Directory(path) => Ok(Box::new(DirectorySource::new(&path)?)),
    #[cfg(feature = "gstreamer_video")]
    SourceKind::Video(path) => Ok(Box::new(VideoSource::new(&path)?)),
    #[cfg(not(feature = "gstreamer_video"))]
    SourceKind::Video(path) => {
      anyhow::bail!(
        "视频输入需要启用 gstreamer_video 特性重新编译: {}",
        path.display()
      )
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_numeric_source_is_camera_index() {
    assert_eq!(classify_source("0"), SourceKind::CameraIndex(0));
    assert_eq!(classify_source("3"), SourceKind::CameraIndex(3));
    assert_eq!(classify_source("12"), SourceKind::CameraIndex(12));
  }

  #[test]
  fn test_device_path_is_camera() {
    assert_eq!(
      classify_source("/dev/video0"),
      SourceKind::CameraDevice("/dev/video0".to_string())
    );
    assert_eq!(
      classify_source("v4l2:///dev/video2"),
      SourceKind::CameraDevice("/dev/video2".to_string())
    );
  }

  #[test]
  fn test_non_numeric_source_is_path() {
    assert_eq!(
      classify_source("photo.jpg"),
      SourceKind::Image(PathBuf::from("photo.jpg"))
    );
    assert_eq!(
      classify_source("desk.PNG"),
      SourceKind::Image(PathBuf::from("desk.PNG"))
    );
    // 数字开头但含非数字字符，仍视为路径
    assert_eq!(
      classify_source("0.mp4"),
      SourceKind::Video(PathBuf::from("0.mp4"))
    );
  }

  #[test]
  fn test_directory_source() {
    let dir = std::env::temp_dir().join(format!("wenfang-input-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    assert_eq!(classify_source(dir.to_str().unwrap()), SourceKind::Directory(dir.clone()));
    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn test_unknown_extension_falls_back_to_video() {
    assert_eq!(
      classify_source("clip.mkv"),
      SourceKind::Video(PathBuf::from("clip.mkv"))
    );
  }
}
