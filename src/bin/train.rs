// 该文件是 Wenfang （文房四宝） 项目的一部分。
// src/bin/train.rs - person/mouse/pen 检测器微调
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use wenfang::trainer::{self, TrainSettings};

/// 微调 person/mouse/pen 检测器
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 数据集 YAML 路径
  #[arg(long, default_value = "data-people-mouse-pen.yaml", value_name = "FILE")]
  pub data: PathBuf,

  /// 训练产物目录（onnxruntime artifacts: checkpoint 与 training/eval/optimizer 模型）
  #[arg(long, default_value = "yolo11n-artifacts", value_name = "DIR")]
  pub model: PathBuf,

  /// 训练轮数
  #[arg(long, default_value = "50", value_name = "COUNT")]
  pub epochs: usize,

  /// 输入图片边长（像素）
  #[arg(long, default_value = "640", value_name = "SIZE")]
  pub imgsz: u32,

  /// 批次大小
  #[arg(long, default_value = "16", value_name = "SIZE")]
  pub batch: usize,

  /// 学习率
  #[arg(long, default_value = "0.001", value_name = "LR")]
  pub lr: f32,

  /// 训练运行的保存目录
  #[arg(long, default_value = "runs/train", value_name = "DIR")]
  pub project: PathBuf,

  /// 运行名称
  #[arg(long, default_value = "people-mouse-pen", value_name = "NAME")]
  pub name: String,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("数据集: {}", args.data.display());
  info!("训练产物: {}", args.model.display());
  info!("轮数: {}, 图片边长: {}, 批次: {}", args.epochs, args.imgsz, args.batch);

  let settings = TrainSettings {
    data: args.data,
    model: args.model,
    epochs: args.epochs,
    imgsz: args.imgsz,
    batch: args.batch,
    lr: args.lr,
    project: args.project,
    name: args.name,
  };

  let report = trainer::run(&settings)?;

  println!();
  println!("训练完成!");
  if let Some(final_loss) = report.epoch_losses.last() {
    println!("最终平均损失: {:.4}", final_loss);
  }
  println!("权重文件: {}", report.weights.display());
  println!("运行目录: {}", report.run_dir.display());

  Ok(())
}
