// 该文件是 Wenfang （文房四宝） 项目的一部分。
// src/input/directory_source.rs - 图片目录输入源
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::ImageReader;
use tracing::warn;

use super::{Frame, InputSource, InputSourceType};

/// 图片目录输入源
///
/// 按文件名排序逐张产出目录内的图片，非图片文件被跳过。
/// 各图片尺寸可以不同，width/height 报告首张图片的尺寸。
pub struct DirectorySource {
  files: std::vec::IntoIter<PathBuf>,
  index: u64,
  width: u32,
  height: u32,
}

impl DirectorySource {
  pub fn new(dir: &Path) -> Result<Self> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
      .with_context(|| format!("无法读取目录: {}", dir.display()))?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|path| super::has_image_extension(path))
      .collect();
    files.sort();

    if files.is_empty() {
      anyhow::bail!("目录中没有图片文件: {}", dir.display());
    }

    // 首张图片决定报告的尺寸
    let first = ImageReader::open(&files[0])
      .with_context(|| format!("无法打开图片文件: {}", files[0].display()))?
      .into_dimensions()
      .with_context(|| format!("无法读取图片尺寸: {}", files[0].display()))?;

    Ok(Self {
      files: files.into_iter(),
      index: 0,
      width: first.0,
      height: first.1,
    })
  }
}

impl Iterator for DirectorySource {
  type Item = Result<Frame>;

  fn next(&mut self) -> Option<Self::Item> {
    for path in self.files.by_ref() {
      let decoded = ImageReader::open(&path)
        .map_err(anyhow::Error::from)
        .and_then(|reader| reader.decode().map_err(anyhow::Error::from));

      match decoded {
        Ok(image) => {
          let frame = Frame {
            image: image.to_rgb8(),
            index: self.index,
            timestamp_ms: 0,
            origin: Some(path),
          };
          self.index += 1;
          return Some(Ok(frame));
        }
        Err(e) => {
          // 坏文件跳过而不中断整个目录
          warn!("跳过无法解码的文件 {}: {}", path.display(), e);
          continue;
        }
      }
    }
    None
  }
}

impl InputSource for DirectorySource {
  fn source_type(&self) -> InputSourceType {
    InputSourceType::Directory
  }

  fn width(&self) -> u32 {
    self.width
  }

  fn height(&self) -> u32 {
    self.height
  }

  fn fps(&self) -> Option<f64> {
    None
  }
}
