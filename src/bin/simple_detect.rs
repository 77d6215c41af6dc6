// 该文件是 Wenfang （文房四宝） 项目的一部分。
// src/bin/simple_detect.rs - 零配置检测演示
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use wenfang::detector::{COCO_CLASSES, YoloDetectorBuilder};
use wenfang::input::open_source;
use wenfang::output::{OutputWriter, RunDirWriter, Visualizer};

/// 使用预训练模型的简单检测演示（无需训练）
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测来源: '0' 表示摄像头，或图片/视频/目录路径
  #[arg(long, default_value = "0", value_name = "SOURCE")]
  pub source: String,

  /// 预训练权重路径（COCO 80 类）
  #[arg(long, default_value = "yolo11n.onnx", value_name = "FILE")]
  pub model: PathBuf,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.25", value_name = "THRESHOLD")]
  pub conf: f32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  if !args.model.exists() {
    anyhow::bail!(
      "模型文件不存在: {}\n请先导出 ONNX 格式的预训练模型（例如 `yolo export model=yolo11n.pt format=onnx`）。",
      args.model.display()
    );
  }

  info!("模型文件: {}", args.model.display());
  info!("检测来源: {}", args.source);

  let mut detector = YoloDetectorBuilder::new(&args.model)
    .confidence_threshold(args.conf)
    .class_names(COCO_CLASSES)
    .build()?;

  let mut source = open_source(&args.source)?;
  info!(
    "输入源已打开: {}x{} {}",
    source.width(),
    source.height(),
    source.source_type().describe()
  );

  let mut writer = RunDirWriter::create(
    Path::new("runs/detect"),
    "exp",
    Visualizer::new(COCO_CLASSES.len()),
  )?;

  let mut display = open_display(source.width(), source.height(), source.fps());

  // 摄像头来源没有自然的结束，Ctrl-C 退出循环
  let (tx, rx) = mpsc::channel();
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(());
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })
  .expect("Error setting Ctrl-C handler");

  while let Some(frame) = source.next() {
    let frame = frame?;
    let detections = detector.detect(&frame.image)?;

    if !detections.is_empty() {
      println!("\n帧 {}: 检测到 {} 个对象", frame.index, detections.len());
      for det in &detections {
        println!("  - {} (类别 {}) | 置信度 {:.2}", det.class_name, det.class_id, det.confidence);
      }
    }

    writer.write_frame(&frame, &detections)?;
    if let Some(sink) = display.as_mut() {
      sink.write_frame(&frame, &detections)?;
    }

    if rx.try_recv().is_ok() {
      warn!("中断信号接收，退出检测循环");
      break;
    }
  }

  writer.finish()?;
  if let Some(sink) = display.as_mut() {
    sink.finish()?;
  }

  println!();
  println!("结果已保存至: {}", writer.dir().display());

  Ok(())
}

#[cfg(feature = "gstreamer_video")]
fn open_display(width: u32, height: u32, fps: Option<f64>) -> Option<Box<dyn OutputWriter>> {
  use wenfang::output::DisplaySink;

  match DisplaySink::new(width, height, fps, Visualizer::new(COCO_CLASSES.len())) {
    Ok(sink) => Some(Box::new(sink)),
    Err(e) => {
      warn!("无法创建显示窗口: {}", e);
      None
    }
  }
}

#[cfg(not(feature = "gstreamer_video"))]
fn open_display(_width: u32, _height: u32, _fps: Option<f64>) -> Option<Box<dyn OutputWriter>> {
  // 默认构建没有窗口输出，结果仍写入运行目录
  None
}
