// 该文件是 Wenfang （文房四宝） 项目的一部分。
// src/input/camera_source.rs - V4L2 摄像头输入源
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::pin::Pin;
use std::time::Instant;

use anyhow::{Context, Result};
use image::RgbImage;
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use super::{Frame, InputSource, InputSourceType};

const CAPTURE_WIDTH: u32 = 640;
const CAPTURE_HEIGHT: u32 = 480;
const CAPTURE_BUFFERS: u32 = 4;
const FALLBACK_FPS: f64 = 30.0;

/// V4L2 摄像头输入源
///
/// v4l 库的 Stream 需要引用 Device，这里用 Pin<Box> 保证
/// Device 的内存地址稳定，从而可以安全地创建引用它的 Stream。
pub struct CameraSource {
  /// V4L2 设备（Pin<Box> 固定内存位置）
  device: Pin<Box<Device>>,
  /// 捕获流（生命周期与 device 关联）
  stream: Option<Stream<'static>>,
  frame_index: u64,
  width: u32,
  height: u32,
  fps: f64,
  start_time: Instant,
}

impl CameraSource {
  /// 以设备序号打开摄像头（来源字符串为纯数字时）
  pub fn with_index(index: usize) -> Result<Self> {
    let device =
      Device::new(index).with_context(|| format!("无法打开摄像头设备序号: {}", index))?;
    Self::from_device(device)
  }

  /// 以设备路径打开摄像头
  pub fn with_path(device_path: &str) -> Result<Self> {
    let device = Device::with_path(device_path)
      .with_context(|| format!("无法打开摄像头设备: {}", device_path))?;
    Self::from_device(device)
  }

  fn from_device(device: Device) -> Result<Self> {
    let device = Box::pin(device);

    // 设置捕获格式
    let mut format = device.format()?;
    format.width = CAPTURE_WIDTH;
    format.height = CAPTURE_HEIGHT;
    format.fourcc = FourCC::new(b"YUYV");
    let format = device.set_format(&format)?;

    let width = format.width;
    let height = format.height;

    let fps = device
      .params()
      .ok()
      .and_then(|params| {
        let interval = params.interval;
        if interval.numerator > 0 {
          Some(interval.denominator as f64 / interval.numerator as f64)
        } else {
          None
        }
      })
      .unwrap_or(FALLBACK_FPS);

    let mut source = Self {
      device,
      stream: None,
      frame_index: 0,
      width,
      height,
      fps,
      start_time: Instant::now(),
    };

    // SAFETY: device 被 Pin<Box> 固定，不会移动，引用始终有效：
    // 1. device 固定在堆上
    // 2. stream 与 device 存储在同一个结构体中
    // 3. Drop 顺序：stream (Option::take) -> device
    let device_ref: &Device = &source.device;
    let stream = unsafe {
      let device_static: &'static Device = std::mem::transmute(device_ref);
      Stream::with_buffers(device_static, Type::VideoCapture, CAPTURE_BUFFERS)
        .context("无法创建捕获流")?
    };

    source.stream = Some(stream);
    Ok(source)
  }

  /// YUYV 转 RGB
  fn yuyv_to_rgb(yuyv: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(yuyv.len() / 2 * 3);

    for chunk in yuyv.chunks(4) {
      if chunk.len() < 4 {
        break;
      }

      let y0 = chunk[0] as f32;
      let u = chunk[1] as f32 - 128.0;
      let y1 = chunk[2] as f32;
      let v = chunk[3] as f32 - 128.0;

      for y in [y0, y1] {
        let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
        let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
        let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
        rgb.extend_from_slice(&[r, g, b]);
      }
    }

    rgb
  }
}

impl Drop for CameraSource {
  fn drop(&mut self) {
    // stream 必须先于 device 释放
    self.stream.take();
  }
}

impl Iterator for CameraSource {
  type Item = Result<Frame>;

  fn next(&mut self) -> Option<Self::Item> {
    let stream = self.stream.as_mut()?;

    match stream.next() {
      Ok((buffer, _meta)) => {
        let rgb_data = Self::yuyv_to_rgb(buffer);

        let image = match RgbImage::from_raw(self.width, self.height, rgb_data) {
          Some(img) => img,
          None => {
            return Some(Err(anyhow::anyhow!("摄像头帧数据长度与分辨率不匹配")));
          }
        };

        let frame = Frame {
          image,
          index: self.frame_index,
          timestamp_ms: self.start_time.elapsed().as_millis() as u64,
          origin: None,
        };

        self.frame_index += 1;
        Some(Ok(frame))
      }
      Err(e) => Some(Err(anyhow::anyhow!("无法捕获帧: {}", e))),
    }
  }
}

impl InputSource for CameraSource {
  fn source_type(&self) -> InputSourceType {
    InputSourceType::Camera
  }

  fn width(&self) -> u32 {
    self.width
  }

  fn height(&self) -> u32 {
    self.height
  }

  fn fps(&self) -> Option<f64> {
    Some(self.fps)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_yuyv_to_rgb_length() {
    // 4 字节 YUYV 对应 2 个 RGB 像素
    let yuyv = vec![128u8; 16];
    let rgb = CameraSource::yuyv_to_rgb(&yuyv);
    assert_eq!(rgb.len(), 8 * 3);
  }

  #[test]
  fn test_yuyv_gray_pixel() {
    // U=V=128 为无色差，Y 直接映射为灰度
    let yuyv = [200u8, 128, 100, 128];
    let rgb = CameraSource::yuyv_to_rgb(&yuyv);
    assert_eq!(&rgb[0..3], &[200, 200, 200]);
    assert_eq!(&rgb[3..6], &[100, 100, 100]);
  }
}
