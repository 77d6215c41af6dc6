// 该文件是 Wenfang （文房四宝） 项目的一部分。
// src/trainer/mod.rs - 微调训练（onnxruntime on-device training）
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use chrono::Utc;
use ort::inputs;
use ort::memory::Allocator;
use ort::session::Session;
use ort::training::{Checkpoint, Trainer};
use ort::value::TensorRef;
use thiserror::Error;
use tracing::{info, warn};

use crate::dataset::{DatasetConfig, DatasetError, YoloDataset};
use crate::output::resolve_run_dir;

/// 训练产物目录中的固定文件名（由 onnxruntime 的 artifacts 工具生成）
const CHECKPOINT_NAME: &str = "checkpoint";
const TRAINING_MODEL_NAME: &str = "training_model.onnx";
const EVAL_MODEL_NAME: &str = "eval_model.onnx";
const OPTIMIZER_MODEL_NAME: &str = "optimizer_model.onnx";

/// 导出推理模型时的输出名
const EXPORT_OUTPUT_NAME: &str = "output0";

#[derive(Error, Debug)]
pub enum TrainError {
  #[error("数据集 YAML 不存在: {0}\n请先准备数据集并创建对应的 YAML 文件。")]
  DataNotFound(PathBuf),
  #[error("训练产物缺失: {0}")]
  ArtifactMissing(PathBuf),
  #[error(transparent)]
  Dataset(#[from] DatasetError),
  #[error("onnxruntime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("结果序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 训练参数
#[derive(Clone, Debug)]
pub struct TrainSettings {
  /// 数据集 YAML 路径
  pub data: PathBuf,
  /// 训练产物目录（checkpoint 与 training/eval/optimizer 模型）
  pub model: PathBuf,
  pub epochs: usize,
  pub imgsz: u32,
  pub batch: usize,
  pub lr: f32,
  /// 训练运行的保存目录
  pub project: PathBuf,
  /// 运行名称
  pub name: String,
}

/// 训练结果
pub struct TrainReport {
  /// 每轮的平均损失
  pub epoch_losses: Vec<f32>,
  /// 导出的推理权重路径
  pub weights: PathBuf,
  pub run_dir: PathBuf,
}

/// 校验训练产物目录，返回各文件路径
///
/// 必须在任何模型加载之前完成，缺失文件要有明确报错。
fn check_artifacts(model_dir: &Path) -> Result<(PathBuf, PathBuf, PathBuf, PathBuf), TrainError> {
  let checkpoint = model_dir.join(CHECKPOINT_NAME);
  let training = model_dir.join(TRAINING_MODEL_NAME);
  let eval = model_dir.join(EVAL_MODEL_NAME);
  let optimizer = model_dir.join(OPTIMIZER_MODEL_NAME);

  for path in [&checkpoint, &training, &eval, &optimizer] {
    if !path.exists() {
      return Err(TrainError::ArtifactMissing(path.clone()));
    }
  }

  Ok((checkpoint, training, eval, optimizer))
}

/// 运行微调
///
/// 损失函数与优化器都在训练图里，这里只负责喂批次与记录。
pub fn run(settings: &TrainSettings) -> Result<TrainReport, TrainError> {
  if !settings.data.exists() {
    return Err(TrainError::DataNotFound(settings.data.clone()));
  }
  let (checkpoint, training_model, eval_model, optimizer_model) =
    check_artifacts(&settings.model)?;

  let config = DatasetConfig::load(&settings.data)?;
  let yaml_dir = settings.data.parent().unwrap_or(Path::new("."));
  let train_dir = config.train_dir(yaml_dir);
  info!(
    "数据集: {} ({} 个类别: {})",
    settings.data.display(),
    config.num_classes(),
    config.to_names().join(", ")
  );

  let dataset = YoloDataset::open(&train_dir, settings.imgsz)?;
  info!("训练样本数: {}", dataset.len());

  let run_dir = resolve_run_dir(&settings.project, &settings.name);
  let weights_dir = run_dir.join("weights");
  std::fs::create_dir_all(&weights_dir)?;
  info!("运行目录: {}", run_dir.display());

  info!("加载训练产物: {}", settings.model.display());
  let trainer = Trainer::new(
    Session::builder()?,
    Allocator::default(),
    Checkpoint::load(&checkpoint)?,
    &training_model,
    &eval_model,
    &optimizer_model,
  )?;

  let optimizer = trainer.optimizer();
  optimizer.set_lr(settings.lr)?;
  info!("学习率: {}", settings.lr);

  let started_at = Utc::now();
  let mut indices: Vec<usize> = (0..dataset.len()).collect();
  let batch = settings.batch.max(1).min(dataset.len());
  let dropped = dataset.len() % batch;
  if dropped != 0 {
    warn!("每轮丢弃不足一个批次的 {} 个样本", dropped);
  }

  let mut epoch_losses = Vec::with_capacity(settings.epochs);
  for epoch in 0..settings.epochs {
    // 逐轮轮转样本顺序
    indices.rotate_left(epoch % dataset.len().max(1));

    let mut loss_sum = 0.0f32;
    let mut steps = 0usize;
    for chunk in indices.chunks(batch) {
      if chunk.len() < batch {
        break;
      }

      let (images, targets) = dataset.load_batch(chunk)?;
      let outputs = trainer.step(
        inputs![TensorRef::from_array_view(&images)?],
        inputs![TensorRef::from_array_view(&targets)?],
      )?;
      let loss: f32 = outputs[0].try_extract_scalar::<f32>()?;

      optimizer.step()?;
      optimizer.reset_grad()?;

      loss_sum += loss;
      steps += 1;
    }

    let mean_loss = if steps > 0 { loss_sum / steps as f32 } else { 0.0 };
    epoch_losses.push(mean_loss);
    info!(
      "轮次 {}/{} 完成, 平均损失: {:.4}",
      epoch + 1,
      settings.epochs,
      mean_loss
    );
  }

  let weights = weights_dir.join("best.onnx");
  info!("导出推理模型: {}", weights.display());
  trainer.export(&weights, [EXPORT_OUTPUT_NAME])?;

  let results = serde_json::json!({
    "data": settings.data.display().to_string(),
    "model": settings.model.display().to_string(),
    "epochs": settings.epochs,
    "imgsz": settings.imgsz,
    "batch": settings.batch,
    "lr": settings.lr,
    "epoch_losses": epoch_losses,
    "weights": weights.display().to_string(),
    "started_at": started_at.to_rfc3339(),
    "finished_at": Utc::now().to_rfc3339(),
  });
  std::fs::write(run_dir.join("results.json"), serde_json::to_string_pretty(&results)?)?;

  Ok(TrainReport {
    epoch_losses,
    weights,
    run_dir,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_missing_dataset_yaml_fails_before_artifacts() {
    let settings = TrainSettings {
      data: PathBuf::from("/nonexistent/data.yaml"),
      model: PathBuf::from("/nonexistent/artifacts"),
      epochs: 1,
      imgsz: 64,
      batch: 1,
      lr: 1e-3,
      project: std::env::temp_dir(),
      name: "test".to_string(),
    };

    match run(&settings) {
      Err(TrainError::DataNotFound(path)) => {
        assert_eq!(path, PathBuf::from("/nonexistent/data.yaml"));
      }
      other => panic!("预期 DataNotFound, 实际为 {:?}", other.err()),
    }
  }

  #[test]
  fn test_missing_artifacts_detected() {
    let dir = std::env::temp_dir().join(format!("wenfang-train-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    match check_artifacts(&dir) {
      Err(TrainError::ArtifactMissing(path)) => {
        assert!(path.ends_with(CHECKPOINT_NAME));
      }
      other => panic!("预期 ArtifactMissing, 实际为 {:?}", other.err()),
    }

    std::fs::remove_dir_all(&dir).unwrap();
  }
}
