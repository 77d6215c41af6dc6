// 该文件是 Wenfang （文房四宝） 项目的一部分。
// src/dataset/mod.rs - 数据集配置与 YOLO 标注加载
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use ndarray::{Array3, Array4};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// 每张图片的最大标注框数，超出部分被截断
pub const MAX_BOXES: usize = 64;

/// 目标张量中的填充值
pub const TARGET_PAD: f32 = -1.0;

#[derive(Error, Debug)]
pub enum DatasetError {
  #[error("数据集 YAML 不存在: {0}")]
  ConfigNotFound(PathBuf),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("数据集 YAML 解析错误: {0}")]
  YamlError(#[from] serde_yaml::Error),
  #[error("标注文件 {path} 第 {line} 行无效: {message}")]
  LabelError {
    path: PathBuf,
    line: usize,
    message: String,
  },
  #[error("图片目录中没有图片: {0}")]
  EmptyDataset(PathBuf),
  #[error("图片错误: {0}")]
  ImageError(#[from] image::ImageError),
}

/// 类别名称，YAML 中既可以是列表也可以是 id 映射
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Names {
  List(Vec<String>),
  Map(BTreeMap<usize, String>),
}

impl Names {
  /// 展开为按 id 排序的名称列表
  pub fn to_vec(&self) -> Vec<String> {
    match self {
      Names::List(names) => names.clone(),
      Names::Map(names) => names.values().cloned().collect(),
    }
  }
}

/// ultralytics 风格的数据集 YAML
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
  /// 数据集根目录（相对于 YAML 所在目录）
  #[serde(default)]
  pub path: Option<PathBuf>,
  /// 训练集图片目录
  pub train: PathBuf,
  /// 验证集图片目录
  #[serde(default)]
  pub val: Option<PathBuf>,
  /// 类别数，缺省时取 names 的长度
  #[serde(default)]
  pub nc: Option<usize>,
  pub names: Names,
}

impl DatasetConfig {
  pub fn load(path: &Path) -> Result<Self, DatasetError> {
    if !path.exists() {
      return Err(DatasetError::ConfigNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
  }

  pub fn num_classes(&self) -> usize {
    self.nc.unwrap_or_else(|| self.to_names().len())
  }

  pub fn to_names(&self) -> Vec<String> {
    self.names.to_vec()
  }

  /// 训练集目录，相对路径以 YAML 所在目录为基准
  pub fn train_dir(&self, yaml_dir: &Path) -> PathBuf {
    self.resolve(yaml_dir, &self.train)
  }

  pub fn val_dir(&self, yaml_dir: &Path) -> Option<PathBuf> {
    self.val.as_ref().map(|val| self.resolve(yaml_dir, val))
  }

  fn resolve(&self, yaml_dir: &Path, dir: &Path) -> PathBuf {
    if dir.is_absolute() {
      return dir.to_path_buf();
    }
    match &self.path {
      Some(root) if root.is_absolute() => root.join(dir),
      Some(root) => yaml_dir.join(root).join(dir),
      None => yaml_dir.join(dir),
    }
  }
}

/// 一条 YOLO 标注：类别与归一化的中心点坐标、宽高
#[derive(Debug, Clone, PartialEq)]
pub struct LabelBox {
  pub class_id: usize,
  pub cx: f32,
  pub cy: f32,
  pub w: f32,
  pub h: f32,
}

fn parse_label_line(line: &str) -> Result<LabelBox, String> {
  let fields: Vec<&str> = line.split_whitespace().collect();
  if fields.len() != 5 {
    return Err(format!("预期 5 个字段, 实际为 {}", fields.len()));
  }

  let class_id: usize = fields[0]
    .parse()
    .map_err(|_| format!("类别不是整数: {}", fields[0]))?;

  let mut values = [0.0f32; 4];
  for (slot, field) in values.iter_mut().zip(&fields[1..]) {
    let value: f32 = field
      .parse()
      .map_err(|_| format!("坐标不是数字: {}", field))?;
    if !(0.0..=1.0).contains(&value) {
      return Err(format!("坐标未归一化到 [0, 1]: {}", field));
    }
    *slot = value;
  }

  Ok(LabelBox {
    class_id,
    cx: values[0],
    cy: values[1],
    w: values[2],
    h: values[3],
  })
}

/// 解析一个标注文件的全部行，空行跳过
pub fn parse_label_file(path: &Path, content: &str) -> Result<Vec<LabelBox>, DatasetError> {
  let mut boxes = Vec::new();
  for (index, line) in content.lines().enumerate() {
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    let label = parse_label_line(line).map_err(|message| DatasetError::LabelError {
      path: path.to_path_buf(),
      line: index + 1,
      message,
    })?;
    boxes.push(label);
  }
  Ok(boxes)
}

/// 由图片路径推导标注文件路径：`images/` 目录换成 `labels/`，后缀换成 `.txt`
fn label_path_for(image: &Path) -> PathBuf {
  let with_txt = image.with_extension("txt");

  let components: Vec<String> = with_txt
    .components()
    .map(|c| c.as_os_str().to_string_lossy().into_owned())
    .collect();

  if let Some(pos) = components.iter().rposition(|c| c == "images") {
    let mut replaced = components;
    replaced[pos] = "labels".to_string();
    return replaced.iter().collect();
  }

  with_txt
}

/// 一个训练样本：图片路径与对应标注
struct Sample {
  image: PathBuf,
  label: PathBuf,
}

/// YOLO 格式数据集
///
/// 只负责列举与装载，不做增广，训练逻辑在 onnxruntime 的训练图中。
pub struct YoloDataset {
  samples: Vec<Sample>,
  imgsz: u32,
}

impl YoloDataset {
  pub fn open(images_dir: &Path, imgsz: u32) -> Result<Self, DatasetError> {
    let mut images: Vec<PathBuf> = std::fs::read_dir(images_dir)?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|path| {
        path
          .extension()
          .and_then(|ext| ext.to_str())
          .map(|ext| {
            let ext = ext.to_lowercase();
            ext == "jpg" || ext == "jpeg" || ext == "png" || ext == "bmp"
          })
          .unwrap_or(false)
      })
      .collect();
    images.sort();

    if images.is_empty() {
      return Err(DatasetError::EmptyDataset(images_dir.to_path_buf()));
    }

    let samples = images
      .into_iter()
      .map(|image| {
        let label = label_path_for(&image);
        Sample { image, label }
      })
      .collect::<Vec<_>>();

    debug!("数据集样本数: {}", samples.len());
    Ok(Self { samples, imgsz })
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  /// 按样本索引装载一个批次
  ///
  /// 返回图片张量 `[B, 3, S, S]` 与目标张量 `[B, MAX_BOXES, 5]`，
  /// 目标行为 `[类别, cx, cy, w, h]`，不足处以 -1 填充。
  pub fn load_batch(&self, indices: &[usize]) -> Result<(Array4<f32>, Array3<f32>), DatasetError> {
    let size = self.imgsz as usize;
    let mut images = Array4::<f32>::zeros((indices.len(), 3, size, size));
    let mut targets = Array3::<f32>::from_elem((indices.len(), MAX_BOXES, 5), TARGET_PAD);

    for (slot, &index) in indices.iter().enumerate() {
      let sample = &self.samples[index];

      let decoded = image::open(&sample.image)?.to_rgb8();
      let resized =
        image::imageops::resize(&decoded, self.imgsz, self.imgsz, FilterType::Triangle);
      for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        images[[slot, 0, y, x]] = pixel[0] as f32 / 255.0;
        images[[slot, 1, y, x]] = pixel[1] as f32 / 255.0;
        images[[slot, 2, y, x]] = pixel[2] as f32 / 255.0;
      }

      // 没有标注文件的图片视为背景样本
      if sample.label.exists() {
        let content = std::fs::read_to_string(&sample.label)?;
        let boxes = parse_label_file(&sample.label, &content)?;
        for (row, label) in boxes.iter().take(MAX_BOXES).enumerate() {
          targets[[slot, row, 0]] = label.class_id as f32;
          targets[[slot, row, 1]] = label.cx;
          targets[[slot, row, 2]] = label.cy;
          targets[[slot, row, 3]] = label.w;
          targets[[slot, row, 4]] = label.h;
        }
      }
    }

    Ok((images, targets))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_label_line_roundtrip() {
    let label = parse_label_line("1 0.5 0.5 0.25 0.125").unwrap();
    assert_eq!(
      label,
      LabelBox {
        class_id: 1,
        cx: 0.5,
        cy: 0.5,
        w: 0.25,
        h: 0.125
      }
    );
  }

  #[test]
  fn test_parse_label_line_rejects_bad_input() {
    assert!(parse_label_line("1 0.5 0.5").is_err());
    assert!(parse_label_line("x 0.5 0.5 0.2 0.2").is_err());
    assert!(parse_label_line("0 0.5 1.5 0.2 0.2").is_err());
  }

  #[test]
  fn test_parse_label_file_reports_line_number() {
    let content = "0 0.5 0.5 0.2 0.2\n\n2 0.1 0.1 2.0 0.1\n";
    let err = parse_label_file(Path::new("labels/a.txt"), content).unwrap_err();
    match err {
      DatasetError::LabelError { line, .. } => assert_eq!(line, 3),
      other => panic!("预期 LabelError, 实际为 {:?}", other),
    }
  }

  #[test]
  fn test_label_path_replaces_images_dir() {
    assert_eq!(
      label_path_for(Path::new("data/images/train/a.jpg")),
      PathBuf::from("data/labels/train/a.txt")
    );
    assert_eq!(
      label_path_for(Path::new("data/a.jpg")),
      PathBuf::from("data/a.txt")
    );
  }

  #[test]
  fn test_names_as_list_and_map() {
    let list: DatasetConfig =
      serde_yaml::from_str("train: images/train\nnames: [person, mouse, pen]\n").unwrap();
    assert_eq!(list.to_names(), vec!["person", "mouse", "pen"]);
    assert_eq!(list.num_classes(), 3);

    let map: DatasetConfig =
      serde_yaml::from_str("train: images/train\nnc: 3\nnames:\n  0: person\n  1: mouse\n  2: pen\n")
        .unwrap();
    assert_eq!(map.to_names(), vec!["person", "mouse", "pen"]);
    assert_eq!(map.num_classes(), 3);
  }

  #[test]
  fn test_train_dir_resolution() {
    let config: DatasetConfig =
      serde_yaml::from_str("path: desk\ntrain: images/train\nnames: [person]\n").unwrap();
    assert_eq!(
      config.train_dir(Path::new("/data")),
      PathBuf::from("/data/desk/images/train")
    );
  }

  #[test]
  fn test_load_batch_shapes_and_padding() {
    let root = std::env::temp_dir().join(format!("wenfang-dataset-test-{}", std::process::id()));
    let images_dir = root.join("images");
    let labels_dir = root.join("labels");
    std::fs::create_dir_all(&images_dir).unwrap();
    std::fs::create_dir_all(&labels_dir).unwrap();

    image::RgbImage::from_pixel(8, 8, image::Rgb([255, 0, 0]))
      .save(images_dir.join("a.png"))
      .unwrap();
    std::fs::write(labels_dir.join("a.txt"), "2 0.5 0.5 0.25 0.25\n").unwrap();

    let dataset = YoloDataset::open(&images_dir, 32).unwrap();
    assert_eq!(dataset.len(), 1);

    let (images, targets) = dataset.load_batch(&[0]).unwrap();
    assert_eq!(images.shape(), &[1, 3, 32, 32]);
    assert_eq!(targets.shape(), &[1, MAX_BOXES, 5]);
    // 红色图片的 R 通道为 1.0
    assert!((images[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
    assert_eq!(targets[[0, 0, 0]], 2.0);
    assert_eq!(targets[[0, 1, 0]], TARGET_PAD);

    std::fs::remove_dir_all(&root).unwrap();
  }
}
