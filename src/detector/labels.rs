// 该文件是 Wenfang （文房四宝） 项目的一部分。
// src/detector/labels.rs - 类别名称表
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

/// 桌面数据集（person/mouse/pen）类别名称
pub const DESK_CLASSES: [&str; 3] = ["person", "mouse", "pen"];

/// COCO 数据集类别名称（预训练演示模型使用）
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

/// 查询类别名称，超出范围时退回为数字字符串
pub fn class_name(names: &[&str], class_id: usize) -> String {
  names
    .get(class_id)
    .map(|name| name.to_string())
    .unwrap_or_else(|| class_id.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_desk_class_names() {
    assert_eq!(class_name(&DESK_CLASSES, 0), "person");
    assert_eq!(class_name(&DESK_CLASSES, 1), "mouse");
    assert_eq!(class_name(&DESK_CLASSES, 2), "pen");
  }

  #[test]
  fn test_unknown_class_falls_back_to_id() {
    assert_eq!(class_name(&DESK_CLASSES, 7), "7");
    assert_eq!(class_name(&COCO_CLASSES, 80), "80");
  }

  #[test]
  fn test_coco_table_size() {
    assert_eq!(COCO_CLASSES.len(), 80);
    assert_eq!(COCO_CLASSES[0], "person");
    assert_eq!(COCO_CLASSES[64], "mouse");
  }
}
