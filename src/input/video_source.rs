// 该文件是 Wenfang （文房四宝） 项目的一部分。
// src/input/video_source.rs - GStreamer 视频文件输入源
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

//! 基于 GStreamer 的视频文件输入。
//!
//! 需要系统安装 GStreamer 开发库：
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```
//!
//! 并在 `Cargo.toml` 中启用 `gstreamer_video` 特性。

use std::path::Path;

use anyhow::{Context, Result};
use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use tracing::debug;

use super::{Frame, InputSource, InputSourceType};

/// 视频文件输入源
pub struct VideoSource {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  /// 在 new() 中预拉取的首帧
  pending: Option<Frame>,
  frame_index: u64,
  width: u32,
  height: u32,
  fps: f64,
  finished: bool,
}

impl VideoSource {
  pub fn new(path: &Path) -> Result<Self> {
    if !path.exists() {
      anyhow::bail!("视频文件不存在: {}", path.display());
    }

    gst::init().context("无法初始化 GStreamer")?;

    let description = format!(
      "filesrc location=\"{}\" ! decodebin ! videoconvert ! video/x-raw,format=RGB ! appsink name=sink sync=false",
      path.display()
    );
    debug!("GStreamer 管道: {}", description);

    let pipeline = gst::parse::launch(&description)
      .with_context(|| format!("无法创建解码管道: {}", path.display()))?
      .downcast::<gst::Pipeline>()
      .map_err(|_| anyhow::anyhow!("管道元素类型错误"))?;

    let appsink = pipeline
      .by_name("sink")
      .context("管道缺少 appsink")?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| anyhow::anyhow!("sink 元素不是 appsink"))?;

    pipeline
      .set_state(gst::State::Playing)
      .context("无法启动解码管道")?;

    let mut source = Self {
      pipeline,
      appsink,
      pending: None,
      frame_index: 0,
      width: 0,
      height: 0,
      fps: 0.0,
      finished: false,
    };

    // 预拉取首帧以确定宽高与帧率
    match source.pull_frame()? {
      Some(frame) => source.pending = Some(frame),
      None => anyhow::bail!("视频中没有可解码的帧: {}", path.display()),
    }

    Ok(source)
  }

  /// 从 appsink 拉取并转换一帧
  fn pull_frame(&mut self) -> Result<Option<Frame>> {
    if self.finished {
      return Ok(None);
    }

    let sample = match self.appsink.pull_sample() {
      Ok(sample) => sample,
      Err(_) => {
        self.finished = true;
        return Ok(None);
      }
    };

    let caps = sample.caps().context("样本缺少 caps")?;
    let info = gst_video::VideoInfo::from_caps(caps).context("无法解析视频信息")?;
    self.width = info.width();
    self.height = info.height();
    let fps = info.fps();
    if fps.denom() > 0 {
      self.fps = fps.numer() as f64 / fps.denom() as f64;
    }

    let buffer = sample.buffer().context("样本缺少缓冲区")?;
    let timestamp_ms = buffer.pts().map(|pts| pts.mseconds()).unwrap_or(0);

    let video_frame = gst_video::VideoFrameRef::from_buffer_ref_readable(buffer, &info)
      .map_err(|_| anyhow::anyhow!("无法映射视频帧"))?;

    let stride = video_frame.plane_stride()[0] as usize;
    let data = video_frame
      .plane_data(0)
      .map_err(|_| anyhow::anyhow!("无法读取视频帧数据"))?;

    // 逐行拷贝，去掉行对齐产生的填充
    let width = self.width as usize;
    let height = self.height as usize;
    let mut image_data = Vec::with_capacity(width * height * 3);
    for row in 0..height {
      let start = row * stride;
      image_data.extend_from_slice(&data[start..start + width * 3]);
    }

    let image = RgbImage::from_raw(self.width, self.height, image_data)
      .context("视频帧数据长度与分辨率不匹配")?;

    let frame = Frame {
      image,
      index: self.frame_index,
      timestamp_ms,
      origin: None,
    };
    self.frame_index += 1;

    Ok(Some(frame))
  }
}

impl Drop for VideoSource {
  fn drop(&mut self) {
    let _ = self.pipeline.set_state(gst::State::Null);
  }
}

impl Iterator for VideoSource {
  type Item = Result<Frame>;

  fn next(&mut self) -> Option<Self::Item> {
    if let Some(frame) = self.pending.take() {
      return Some(Ok(frame));
    }

    match self.pull_frame() {
      Ok(Some(frame)) => Some(Ok(frame)),
      Ok(None) => None,
      Err(e) => {
        self.finished = true;
        Some(Err(e))
      }
    }
  }
}

impl InputSource for VideoSource {
  fn source_type(&self) -> InputSourceType {
    InputSourceType::Video
  }

  fn width(&self) -> u32 {
    self.width
  }

  fn height(&self) -> u32 {
    self.height
  }

  fn fps(&self) -> Option<f64> {
    if self.fps > 0.0 { Some(self.fps) } else { None }
  }
}
