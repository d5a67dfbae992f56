// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/postprocess/assemble.rs - 组装检测结果
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

use std::collections::BTreeMap;

use serde_json::{Value, json};
use thiserror::Error;

use super::{BBox, Candidate};
use crate::labels::{ClassTable, LabelFilter};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AssembleError {
  #[error("未知类别序号 {class_id}: 类别表只有 {num_classes} 个类别，模型与类别表不匹配")]
  UnknownClass { class_id: usize, num_classes: usize },
}

/// 检测结果
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  /// 原图像素坐标，已裁剪到图像范围内
  pub bbox: BBox,
  /// 置信度
  pub confidence: f32,
  /// 类别索引
  pub class_id: usize,
  /// 类别名称
  pub class_name: String,
}

impl Detection {
  pub fn to_json(&self) -> Value {
    json!({
      "class": self.class_name,
      "class_id": self.class_id,
      "confidence": self.confidence,
      "bbox": [
        self.bbox.x1 as i64,
        self.bbox.y1 as i64,
        self.bbox.x2 as i64,
        self.bbox.y2 as i64,
      ],
    })
  }
}

/// 单次预测的结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Prediction {
  pub detections: Vec<Detection>,
  pub orig_width: u32,
  pub orig_height: u32,
}

impl Prediction {
  pub fn count(&self) -> usize {
    self.detections.len()
  }

  pub fn is_empty(&self) -> bool {
    self.detections.is_empty()
  }

  /// 只保留类别名被过滤器接受的检测，顺序不变
  pub fn filter(&self, filter: &LabelFilter) -> Prediction {
    Prediction {
      detections: self
        .detections
        .iter()
        .filter(|d| filter.matches(&d.class_name))
        .cloned()
        .collect(),
      orig_width: self.orig_width,
      orig_height: self.orig_height,
    }
  }

  pub fn per_class(&self) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for d in &self.detections {
      *counts.entry(d.class_name.clone()).or_insert(0) += 1;
    }
    counts
  }

  /// 平均置信度，无检测时为 0
  pub fn mean_confidence(&self) -> f32 {
    if self.detections.is_empty() {
      return 0.0;
    }
    self.detections.iter().map(|d| d.confidence).sum::<f32>() / self.detections.len() as f32
  }

  pub fn to_json(&self) -> Value {
    json!({
      "detections": self.detections.iter().map(Detection::to_json).collect::<Vec<_>>(),
      "count": self.count(),
    })
  }
}

/// 把保留下来的候选框映射为带类别名的检测结果。
///
/// 任何超出类别表范围的序号都会报错，不会被替换为占位名称。
pub fn assemble(survivors: Vec<Candidate>, classes: &ClassTable) -> Result<Vec<Detection>, AssembleError> {
  survivors
    .into_iter()
    .map(|c| {
      let class_name = classes.name(c.class_id).ok_or(AssembleError::UnknownClass {
        class_id: c.class_id,
        num_classes: classes.len(),
      })?;
      Ok(Detection {
        bbox: c.bbox,
        confidence: c.confidence,
        class_id: c.class_id,
        class_name: class_name.to_string(),
      })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;

  fn candidate(class_id: usize, confidence: f32) -> Candidate {
    Candidate {
      bbox: BBox::new(1.5, 2.5, 10.9, 20.2),
      confidence,
      class_id,
      anchor: 0,
    }
  }

  fn detection(name: &str, confidence: f32) -> Detection {
    Detection {
      bbox: BBox::new(0.0, 0.0, 1.0, 1.0),
      confidence,
      class_id: 0,
      class_name: name.to_string(),
    }
  }

  #[test]
  fn maps_class_ids_to_names() {
    let detections = assemble(vec![candidate(2, 0.9), candidate(7, 0.5)], &ClassTable::coco()).unwrap();
    assert_eq!(detections[0].class_name, "car");
    assert_eq!(detections[1].class_name, "truck");
    assert_eq!(detections[1].class_id, 7);
  }

  #[test]
  fn unknown_class_is_a_named_error() {
    let err = assemble(vec![candidate(1, 0.9), candidate(80, 0.8)], &ClassTable::coco()).unwrap_err();
    assert_eq!(
      err,
      AssembleError::UnknownClass {
        class_id: 80,
        num_classes: 80
      }
    );
  }

  #[test]
  fn empty_survivors_assemble_to_empty_list() {
    assert!(assemble(Vec::new(), &ClassTable::coco()).unwrap().is_empty());
  }

  #[test]
  fn prediction_summaries() {
    let prediction = Prediction {
      detections: vec![
        detection("car", 0.9),
        detection("person", 0.3),
        detection("car", 0.5),
        detection("small-vehicle", 0.4),
      ],
      orig_width: 100,
      orig_height: 100,
    };

    let vehicles = prediction.filter(&LabelFilter::vehicles());
    assert_eq!(vehicles.count(), 3);
    assert_eq!(vehicles.detections[2].class_name, "small-vehicle");

    let per_class = vehicles.per_class();
    assert_eq!(per_class.get("car"), Some(&2));
    assert_eq!(per_class.get("small-vehicle"), Some(&1));
    assert_relative_eq!(vehicles.mean_confidence(), 0.6);

    assert_eq!(Prediction::default().mean_confidence(), 0.0);
  }

  #[test]
  fn json_shape_matches_response_format() {
    let detections = assemble(vec![candidate(2, 0.75)], &ClassTable::coco()).unwrap();
    let prediction = Prediction {
      detections,
      orig_width: 64,
      orig_height: 64,
    };
    let value = prediction.to_json();
    assert_eq!(value["count"], 1);
    assert_eq!(value["detections"][0]["class"], "car");
    assert_eq!(value["detections"][0]["class_id"], 2);
    assert_eq!(value["detections"][0]["bbox"], json!([1, 2, 10, 20]));
    assert_relative_eq!(value["detections"][0]["confidence"].as_f64().unwrap(), 0.75);
  }
}
