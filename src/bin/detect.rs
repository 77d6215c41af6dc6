// 该文件是 Wenfang （文房四宝） 项目的一部分。
// src/bin/detect.rs - 推理与标注
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use wenfang::detector::{DESK_CLASSES, YoloDetectorBuilder};
use wenfang::input::{InputSourceType, open_source};
use wenfang::output::{AnnotatedImageWriter, OutputWriter, RunDirWriter, Visualizer};

/// 对 person/mouse/pen 检测模型运行推理
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 微调权重路径（例如 runs/train/people-mouse-pen/weights/best.onnx）
  #[arg(long, value_name = "FILE")]
  pub weights: PathBuf,

  /// 输入来源（图片文件、图片目录或视频文件）
  #[arg(long, value_name = "SOURCE")]
  pub source: String,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.25", value_name = "THRESHOLD")]
  pub conf: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.45", value_name = "THRESHOLD")]
  pub iou: f32,

  /// 显示检测窗口（需要 gstreamer_video 特性）
  #[arg(long)]
  pub show: bool,

  /// 在输入旁保存标注结果
  #[arg(long)]
  pub save: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  // 权重必须在任何模型加载之前检查
  if !args.weights.exists() {
    anyhow::bail!(
      "权重文件不存在: {}",
      args
        .weights
        .canonicalize()
        .unwrap_or_else(|_| args.weights.clone())
        .display()
    );
  }

  info!("权重文件: {}", args.weights.display());
  info!("输入来源: {}", args.source);
  info!("置信度阈值: {}", args.conf);

  let mut detector = YoloDetectorBuilder::new(&args.weights)
    .confidence_threshold(args.conf)
    .iou_threshold(args.iou)
    .class_names(DESK_CLASSES)
    .build()?;

  let mut source = open_source(&args.source)?;
  info!(
    "输入源已打开: {}x{} {}",
    source.width(),
    source.height(),
    source.source_type().describe()
  );

  let mut save_writer: Option<Box<dyn OutputWriter>> = if args.save {
    let visualizer = Visualizer::new(DESK_CLASSES.len());
    match source.source_type() {
      InputSourceType::Image | InputSourceType::Directory => {
        Some(Box::new(AnnotatedImageWriter::new(visualizer)))
      }
      // 连续来源写入运行目录，避免单个文件被反复覆盖
      _ => Some(Box::new(RunDirWriter::create(
        Path::new("runs/detect"),
        "exp",
        visualizer,
      )?)),
    }
  } else {
    None
  };

  let mut show_sink = open_display(&args, source.width(), source.height(), source.fps());

  let mut frame_count = 0u64;
  let mut total_detections = 0usize;

  while let Some(frame) = source.next() {
    let frame = frame?;
    let detections = detector.detect(&frame.image)?;

    match &frame.origin {
      Some(origin) => println!("\n{} 的检测结果:", origin.display()),
      None => println!("\n帧 {} (时间: {}ms) 的检测结果:", frame.index, frame.timestamp_ms),
    }
    for det in &detections {
      println!(
        "  - {} (类别 {}) | 置信度 {:.2}",
        det.class_name, det.class_id, det.confidence
      );
    }

    if let Some(writer) = save_writer.as_mut() {
      writer.write_frame(&frame, &detections)?;
    }
    if let Some(sink) = show_sink.as_mut() {
      sink.write_frame(&frame, &detections)?;
    }

    frame_count += 1;
    total_detections += detections.len();
  }

  if let Some(writer) = save_writer.as_mut() {
    writer.finish()?;
  }
  if let Some(sink) = show_sink.as_mut() {
    sink.finish()?;
  }

  println!();
  println!("处理完成! 总帧数: {}, 总检测数: {}", frame_count, total_detections);

  Ok(())
}

#[cfg(feature = "gstreamer_video")]
fn open_display(
  args: &Args,
  width: u32,
  height: u32,
  fps: Option<f64>,
) -> Option<Box<dyn OutputWriter>> {
  use wenfang::output::DisplaySink;

  if !args.show {
    return None;
  }
  match DisplaySink::new(width, height, fps, Visualizer::new(DESK_CLASSES.len())) {
    Ok(sink) => Some(Box::new(sink)),
    Err(e) => {
      warn!("无法创建显示窗口: {}", e);
      None
    }
  }
}

#[cfg(not(feature = "gstreamer_video"))]
fn open_display(
  args: &Args,
  _width: u32,
  _height: u32,
  _fps: Option<f64>,
) -> Option<Box<dyn OutputWriter>> {
  if args.show {
    warn!("--show 需要启用 gstreamer_video 特性重新编译，已忽略");
  }
  None
}
