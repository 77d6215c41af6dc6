// 该文件是 Wenfang （文房四宝） 项目的一部分。
// src/output/visualizer.rs - 检测结果可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::warn;

use crate::detector::Detection;

/// 标签文字的候选字体路径
const FONT_CANDIDATES: [&str; 4] = [
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/local/share/fonts/DejaVuSans.ttf",
];

const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_OFFSET_Y: i32 = 20;

/// 可视化工具
#[derive(Clone)]
pub struct Visualizer {
  /// 标签字体，系统中找不到字体时只画框
  font: Option<FontArc>,
  font_scale: PxScale,
  /// 每个类别一种颜色
  colors: Vec<Rgb<u8>>,
}

impl Visualizer {
  /// 创建可视化工具，`num_classes` 决定调色板大小
  pub fn new(num_classes: usize) -> Self {
    let font = Self::load_system_font();
    if font.is_none() {
      warn!("未找到可用字体，标注图片将只包含边框");
    }

    let palette_size = num_classes.max(1);
    let colors = (0..palette_size)
      .map(|i| {
        let hue = (i as f32 / palette_size as f32) * 360.0;
        Self::hsv_to_rgb(hue, 0.8, 0.9)
      })
      .collect();

    Self {
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      colors,
    }
  }

  fn load_system_font() -> Option<FontArc> {
    for path in FONT_CANDIDATES {
      if let Ok(data) = std::fs::read(path) {
        match FontArc::try_from_vec(data) {
          Ok(font) => return Some(font),
          Err(e) => warn!("无法加载字体 {}: {}", path, e),
        }
      }
    }
    None
  }

  /// HSV 转 RGB
  fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
      (c, x, 0.0)
    } else if h < 120.0 {
      (x, c, 0.0)
    } else if h < 180.0 {
      (0.0, c, x)
    } else if h < 240.0 {
      (0.0, x, c)
    } else if h < 300.0 {
      (x, 0.0, c)
    } else {
      (c, 0.0, x)
    };

    Rgb([
      ((r + m) * 255.0) as u8,
      ((g + m) * 255.0) as u8,
      ((b + m) * 255.0) as u8,
    ])
  }

  /// 在图像上绘制检测结果
  pub fn draw_detections(&self, image: &mut RgbImage, detections: &[Detection]) {
    for detection in detections {
      let color = self.colors[detection.class_id % self.colors.len()];

      let x = detection.x.max(0.0) as i32;
      let y = detection.y.max(0.0) as i32;
      let width = detection.width.min(image.width() as f32 - detection.x) as u32;
      let height = detection.height.min(image.height() as f32 - detection.y) as u32;

      if width > 0 && height > 0 {
        let rect = Rect::at(x, y).of_size(width, height);
        draw_hollow_rect_mut(image, rect, color);

        // 双层边框增加可见度
        if x > 0 && y > 0 {
          let inner =
            Rect::at(x + 1, y + 1).of_size(width.saturating_sub(2), height.saturating_sub(2));
          draw_hollow_rect_mut(image, inner, color);
        }
      }

      if let Some(font) = &self.font {
        let label = format!("{}: {:.2}", detection.class_name, detection.confidence);
        let text_y = (y - LABEL_OFFSET_Y).max(0);
        draw_text_mut(image, color, x, text_y, self.font_scale, font, &label);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_hsv_primary_colors() {
    assert_eq!(Visualizer::hsv_to_rgb(0.0, 1.0, 1.0), Rgb([255, 0, 0]));
    assert_eq!(Visualizer::hsv_to_rgb(120.0, 1.0, 1.0), Rgb([0, 255, 0]));
    assert_eq!(Visualizer::hsv_to_rgb(240.0, 1.0, 1.0), Rgb([0, 0, 255]));
  }

  #[test]
  fn test_palette_distinct_per_class() {
    let visualizer = Visualizer::new(3);
    assert_eq!(visualizer.colors.len(), 3);
    assert_ne!(visualizer.colors[0], visualizer.colors[1]);
    assert_ne!(visualizer.colors[1], visualizer.colors[2]);
  }

  #[test]
  fn test_draw_detections_marks_pixels() {
    let mut image = RgbImage::new(64, 64);
    let visualizer = Visualizer {
      font: None,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      colors: vec![Rgb([255, 0, 0])],
    };

    let detections = [Detection {
      x: 8.0,
      y: 8.0,
      width: 16.0,
      height: 16.0,
      confidence: 0.9,
      class_id: 0,
      class_name: "person".to_string(),
    }];

    visualizer.draw_detections(&mut image, &detections);
    assert_eq!(*image.get_pixel(8, 8), Rgb([255, 0, 0]));
  }
}
