// 该文件是 Wenfang （文房四宝） 项目的一部分。
// src/detector/yolo.rs - YOLO 目标检测器（onnxruntime 后端）
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use image::RgbImage;
use ndarray::{Array4, ArrayViewD};
use ort::inputs;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::TensorRef;
use thiserror::Error;
use tracing::{debug, info};

use super::Detection;
use super::labels::class_name;

const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

/// 边界框坐标数，YOLO 检测头输出为 4 + 类别数
const BOX_CHANNELS: usize = 4;

#[derive(Error, Debug)]
pub enum YoloError {
  #[error("权重文件不存在: {0}")]
  WeightsNotFound(PathBuf),
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("模型输出无效: {0}")]
  OutputInvalid(String),
  #[error("onnxruntime 错误: {0}")]
  OrtError(#[from] ort::Error),
}

/// YOLO 检测器构建器
pub struct YoloDetectorBuilder {
  weights: PathBuf,
  confidence_threshold: f32,
  iou_threshold: f32,
  input_size: u32,
  class_names: Vec<String>,
}

impl YoloDetectorBuilder {
  pub fn new(weights: impl AsRef<Path>) -> Self {
    Self {
      weights: weights.as_ref().to_path_buf(),
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      input_size: DEFAULT_INPUT_SIZE,
      class_names: Vec::new(),
    }
  }

  /// 置信度阈值，原样传入过滤步骤
  pub fn confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  /// NMS IOU 阈值
  pub fn iou_threshold(mut self, threshold: f32) -> Self {
    self.iou_threshold = threshold;
    self
  }

  /// 模型输入边长（正方形输入）
  pub fn input_size(mut self, size: u32) -> Self {
    self.input_size = size;
    self
  }

  /// 类别名称表，缺失的索引以数字字符串代替
  pub fn class_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
    self.class_names = names.into_iter().map(Into::into).collect();
    self
  }

  pub fn build(self) -> Result<YoloDetector, YoloError> {
    if !self.weights.exists() {
      return Err(YoloError::WeightsNotFound(self.weights));
    }

    info!("加载模型文件: {}", self.weights.display());
    let metadata = std::fs::metadata(&self.weights)?;
    debug!(
      "模型文件大小: {:.2} MB",
      metadata.len() as f64 / (1024.0 * 1024.0)
    );

    let session = Session::builder()?
      .with_optimization_level(GraphOptimizationLevel::Level3)?
      .commit_from_file(&self.weights)?;
    info!("模型加载完成");

    if session.inputs.len() != 1 {
      return Err(YoloError::ModelInvalid(format!(
        "预期模型输入数量为 1, 实际为 {}",
        session.inputs.len()
      )));
    }
    if session.outputs.len() != 1 {
      return Err(YoloError::ModelInvalid(format!(
        "预期模型输出数量为 1, 实际为 {}",
        session.outputs.len()
      )));
    }

    let input_name = session.inputs[0].name.clone();
    let output_name = session.outputs[0].name.clone();
    debug!("模型输入: {}", input_name);
    debug!("模型输出: {}", output_name);

    Ok(YoloDetector {
      session,
      input_name,
      output_name,
      input_size: self.input_size,
      confidence_threshold: self.confidence_threshold,
      iou_threshold: self.iou_threshold,
      class_names: self.class_names,
    })
  }
}

/// YOLO 目标检测器
///
/// 推理由 onnxruntime 完成，本结构只负责缩放、解码与 NMS。
pub struct YoloDetector {
  session: Session,
  input_name: String,
  output_name: String,
  input_size: u32,
  confidence_threshold: f32,
  iou_threshold: f32,
  class_names: Vec<String>,
}

impl YoloDetector {
  pub fn input_size(&self) -> u32 {
    self.input_size
  }

  pub fn confidence_threshold(&self) -> f32 {
    self.confidence_threshold
  }

  /// 对单帧 RGB 图像运行推理
  pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, YoloError> {
    let original_width = image.width() as f32;
    let original_height = image.height() as f32;

    let input = self.preprocess(image);

    debug!("执行模型推理");
    let outputs = self
      .session
      .run(inputs![self.input_name.as_str() => TensorRef::from_array_view(&input)?])?;

    let output = outputs[self.output_name.as_str()].try_extract_array::<f32>()?;

    let candidates = decode_output(&output, self.confidence_threshold)?;
    debug!("解码得到 {} 个候选框", candidates.len());

    // 从模型输入坐标映射回原图坐标
    let scale_x = original_width / self.input_size as f32;
    let scale_y = original_height / self.input_size as f32;

    let names: Vec<&str> = self.class_names.iter().map(String::as_str).collect();
    let detections = candidates
      .into_iter()
      .map(|candidate| {
        let [cx, cy, w, h] = candidate.bbox;
        Detection {
          x: (cx - w / 2.0) * scale_x,
          y: (cy - h / 2.0) * scale_y,
          width: w * scale_x,
          height: h * scale_y,
          confidence: candidate.score,
          class_id: candidate.class_id,
          class_name: class_name(&names, candidate.class_id),
        }
      })
      .collect();

    Ok(nms(detections, self.iou_threshold))
  }

  /// 缩放到模型输入尺寸并归一化为 NCHW f32
  fn preprocess(&self, image: &RgbImage) -> Array4<f32> {
    let size = self.input_size;
    let resized = image::imageops::resize(
      image,
      size,
      size,
      image::imageops::FilterType::Triangle,
    );

    let mut input = Array4::<f32>::zeros((1, 3, size as usize, size as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
      let (x, y) = (x as usize, y as usize);
      input[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
      input[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
      input[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
    }
    input
  }
}

/// 解码前的候选框，坐标为模型输入空间的 [cx, cy, w, h]
#[derive(Clone, Debug)]
struct Candidate {
  class_id: usize,
  score: f32,
  bbox: [f32; 4],
}

/// 解码 `[1, 4 + 类别数, N]` 检测头输出
fn decode_output(
  output: &ArrayViewD<'_, f32>,
  confidence_threshold: f32,
) -> Result<Vec<Candidate>, YoloError> {
  let shape = output.shape();
  if shape.len() != 3 || shape[0] != 1 || shape[1] <= BOX_CHANNELS {
    return Err(YoloError::OutputInvalid(format!(
      "预期输出形状为 [1, 4+nc, N], 实际为 {:?}",
      shape
    )));
  }

  let num_classes = shape[1] - BOX_CHANNELS;
  let num_anchors = shape[2];

  let mut candidates = Vec::new();
  for anchor in 0..num_anchors {
    let mut best_score = 0.0f32;
    let mut best_class = 0usize;
    for class in 0..num_classes {
      let score = output[[0, BOX_CHANNELS + class, anchor]];
      if score > best_score {
        best_score = score;
        best_class = class;
      }
    }

    if best_score < confidence_threshold {
      continue;
    }

    candidates.push(Candidate {
      class_id: best_class,
      score: best_score,
      bbox: [
        output[[0, 0, anchor]],
        output[[0, 1, anchor]],
        output[[0, 2, anchor]],
        output[[0, 3, anchor]],
      ],
    });
  }

  Ok(candidates)
}

/// 非极大值抑制（同类别）
fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
  detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

  let mut result = Vec::new();
  while !detections.is_empty() {
    let best = detections.remove(0);

    detections.retain(|det| {
      if det.class_id != best.class_id {
        return true;
      }
      iou(&best, det) < iou_threshold
    });

    result.push(best);
  }

  result
}

/// 计算两个边界框的 IoU
fn iou(a: &Detection, b: &Detection) -> f32 {
  let x1 = a.x.max(b.x);
  let y1 = a.y.max(b.y);
  let x2 = a.x_max().min(b.x_max());
  let y2 = a.y_max().min(b.y_max());

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let union = a.width * a.height + b.width * b.height - intersection;

  if union > 0.0 { intersection / union } else { 0.0 }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::Array3;

  fn detection(x: f32, y: f32, size: f32, confidence: f32, class_id: usize) -> Detection {
    Detection {
      x,
      y,
      width: size,
      height: size,
      confidence,
      class_id,
      class_name: class_id.to_string(),
    }
  }

  #[test]
  fn test_iou_identical_boxes() {
    let a = detection(0.0, 0.0, 10.0, 0.9, 0);
    assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
  }

  #[test]
  fn test_iou_disjoint_boxes() {
    let a = detection(0.0, 0.0, 10.0, 0.9, 0);
    let b = detection(100.0, 100.0, 10.0, 0.9, 0);
    assert_eq!(iou(&a, &b), 0.0);
  }

  #[test]
  fn test_nms_suppresses_overlap_within_class() {
    let detections = vec![
      detection(0.0, 0.0, 10.0, 0.9, 0),
      detection(1.0, 1.0, 10.0, 0.8, 0),
      detection(100.0, 100.0, 10.0, 0.7, 0),
    ];
    let kept = nms(detections, 0.45);
    assert_eq!(kept.len(), 2);
    assert!((kept[0].confidence - 0.9).abs() < 1e-6);
    assert!((kept[1].confidence - 0.7).abs() < 1e-6);
  }

  #[test]
  fn test_nms_keeps_overlap_across_classes() {
    let detections = vec![
      detection(0.0, 0.0, 10.0, 0.9, 0),
      detection(1.0, 1.0, 10.0, 0.8, 1),
    ];
    let kept = nms(detections, 0.45);
    assert_eq!(kept.len(), 2);
  }

  #[test]
  fn test_decode_output_filters_by_confidence() {
    // 2 个类别、3 个候选框的最小检测头
    let mut head = Array3::<f32>::zeros((1, 6, 3));
    // 候选 0: 类别 1, 得分 0.9
    head[[0, 0, 0]] = 320.0;
    head[[0, 1, 0]] = 320.0;
    head[[0, 2, 0]] = 64.0;
    head[[0, 3, 0]] = 64.0;
    head[[0, 5, 0]] = 0.9;
    // 候选 1: 类别 0, 得分 0.1，应当被过滤
    head[[0, 4, 1]] = 0.1;

    let head = head.into_dyn();
    let candidates = decode_output(&head.view(), 0.25).unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].class_id, 1);
    assert!((candidates[0].score - 0.9).abs() < 1e-6);
    assert_eq!(candidates[0].bbox, [320.0, 320.0, 64.0, 64.0]);
  }

  #[test]
  fn test_decode_output_rejects_bad_shape() {
    let head = Array3::<f32>::zeros((1, 4, 3)).into_dyn();
    assert!(decode_output(&head.view(), 0.25).is_err());
  }

  #[test]
  fn test_builder_fails_before_model_load_when_weights_missing() {
    let result = YoloDetectorBuilder::new("/nonexistent/best.onnx").build();
    assert!(matches!(result, Err(YoloError::WeightsNotFound(_))));
  }

  #[test]
  fn test_builder_passes_thresholds_through() {
    let builder = YoloDetectorBuilder::new("best.onnx")
      .confidence_threshold(0.7)
      .iou_threshold(0.3);
    assert_eq!(builder.confidence_threshold, 0.7);
    assert_eq!(builder.iou_threshold, 0.3);
  }
}
