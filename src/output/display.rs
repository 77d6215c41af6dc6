// 该文件是 Wenfang （文房四宝） 项目的一部分。
// src/output/display.rs - GStreamer 窗口显示输出
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

use anyhow::{Context, Result};
use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use tracing::debug;

use super::{OutputWriter, Visualizer};
use crate::detector::Detection;
use crate::input::Frame;

/// 窗口显示输出（appsrc -> videoconvert -> autovideosink）
pub struct DisplaySink {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  visualizer: Visualizer,
}

impl DisplaySink {
  pub fn new(width: u32, height: u32, fps: Option<f64>, visualizer: Visualizer) -> Result<Self> {
    gst::init().context("无法初始化 GStreamer")?;

    let framerate = fps.map(|fps| fps.round() as u32).unwrap_or(30).max(1);
    let description = format!(
      "appsrc name=src is-live=true format=time \
       caps=video/x-raw,format=RGB,width={},height={},framerate={}/1 \
       ! videoconvert ! autovideosink sync=false",
      width, height, framerate
    );
    debug!("GStreamer 显示管道: {}", description);

    let pipeline = gst::parse::launch(&description)
      .context("无法创建显示管道")?
      .downcast::<gst::Pipeline>()
      .map_err(|_| anyhow::anyhow!("管道元素类型错误"))?;

    let appsrc = pipeline
      .by_name("src")
      .context("管道缺少 appsrc")?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| anyhow::anyhow!("src 元素不是 appsrc"))?;

    pipeline
      .set_state(gst::State::Playing)
      .context("无法启动显示管道")?;

    Ok(Self {
      pipeline,
      appsrc,
      visualizer,
    })
  }
}

impl Drop for DisplaySink {
  fn drop(&mut self) {
    let _ = self.pipeline.set_state(gst::State::Null);
  }
}

impl OutputWriter for DisplaySink {
  fn write_frame(&mut self, frame: &Frame, detections: &[Detection]) -> Result<()> {
    let mut annotated = frame.image.clone();
    self.visualizer.draw_detections(&mut annotated, detections);

    let mut buffer = gst::Buffer::from_mut_slice(annotated.into_raw());
    if let Some(buffer) = buffer.get_mut() {
      buffer.set_pts(gst::ClockTime::from_mseconds(frame.timestamp_ms));
    }

    self
      .appsrc
      .push_buffer(buffer)
      .map_err(|e| anyhow::anyhow!("无法推送显示帧: {:?}", e))?;

    Ok(())
  }

  fn finish(&mut self) -> Result<()> {
    let _ = self.appsrc.end_of_stream();
    Ok(())
  }
}
