// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/labels.rs - 类别表与标签过滤
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// COCO 数据集类别名称
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

/// DOTA v1 航拍数据集类别名称
pub const DOTA_CLASSES: [&str; 15] = [
  "plane",
  "ship",
  "storage-tank",
  "baseball-diamond",
  "tennis-court",
  "basketball-court",
  "ground-track-field",
  "harbor",
  "bridge",
  "large-vehicle",
  "small-vehicle",
  "helicopter",
  "roundabout",
  "soccer-ball-field",
  "swimming-pool",
];

/// 默认的车辆标签词
pub const VEHICLE_TOKENS: [&str; 7] = [
  "vehicle",
  "car",
  "truck",
  "bus",
  "motorcycle",
  "bicycle",
  "train",
];

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("无法读取类别文件 {path}: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("类别文件为空: {0}")]
  Empty(PathBuf),
}

/// 类别序号到名称的固定映射
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassTable {
  names: Vec<String>,
}

impl Default for ClassTable {
  fn default() -> Self {
    Self::coco()
  }
}

impl ClassTable {
  pub fn coco() -> Self {
    Self::from_names(COCO_CLASSES)
  }

  pub fn dota() -> Self {
    Self::from_names(DOTA_CLASSES)
  }

  pub fn from_names<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      names: names.into_iter().map(Into::into).collect(),
    }
  }

  /// 每行一个类别名，空行忽略
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| LabelError::Io {
      path: path.to_path_buf(),
      source,
    })?;

    let names = text
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty())
      .map(String::from)
      .collect::<Vec<_>>();
    if names.is_empty() {
      return Err(LabelError::Empty(path.to_path_buf()));
    }

    debug!("从 {} 加载 {} 个类别", path.display(), names.len());
    Ok(Self { names })
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn name(&self, class_id: usize) -> Option<&str> {
    self.names.get(class_id).map(String::as_str)
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }
}

/// 大小写不敏感的标签子串匹配。
///
/// `small-vehicle`、`cars`、`firetruck` 都会命中车辆关键字。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelFilter {
  tokens: Vec<String>,
}

impl Default for LabelFilter {
  fn default() -> Self {
    Self::vehicles()
  }
}

impl LabelFilter {
  pub fn vehicles() -> Self {
    Self::new(VEHICLE_TOKENS)
  }

  pub fn new<I, S>(tokens: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    Self {
      tokens: tokens
        .into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect(),
    }
  }

  pub fn tokens(&self) -> &[String] {
    &self.tokens
  }

  pub fn matches(&self, name: &str) -> bool {
    let name = name.to_lowercase();
    self.tokens.iter().any(|token| name.contains(token.as_str()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn coco_table_has_80_classes() {
    let table = ClassTable::coco();
    assert_eq!(table.len(), 80);
    assert_eq!(table.name(0), Some("person"));
    assert_eq!(table.name(2), Some("car"));
    assert_eq!(table.name(79), Some("toothbrush"));
    assert_eq!(table.name(80), None);
  }

  #[test]
  fn table_loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "plane\n\n  small-vehicle  \nlarge-vehicle").unwrap();

    let table = ClassTable::from_file(file.path()).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.name(1), Some("small-vehicle"));
  }

  #[test]
  fn empty_or_missing_file_is_an_error() {
    let file = tempfile::NamedTempFile::new().unwrap();
    assert!(matches!(
      ClassTable::from_file(file.path()),
      Err(LabelError::Empty(_))
    ));
    assert!(matches!(
      ClassTable::from_file("/nonexistent/names.txt"),
      Err(LabelError::Io { .. })
    ));
  }

  #[test]
  fn vehicle_filter_matches_expected_labels() {
    let filter = LabelFilter::vehicles();
    for name in [
      "car",
      "Truck",
      "BUS",
      "motorcycle",
      "bicycle",
      "train",
      "small-vehicle",
      "large-vehicle",
      "Vehicle",
      "police car",
      "cars",
      "Trucks",
      "buses",
      "motorcycles",
      "minibus",
      "firetruck",
    ] {
      assert!(filter.matches(name), "{name}");
    }
    for name in ["person", "airplane", "boat", "ship", "traffic light"] {
      assert!(!filter.matches(name), "{name}");
    }
  }

  #[test]
  fn custom_tokens_are_normalised() {
    let filter = LabelFilter::new(["  Ship ", "", "PLANE"]);
    assert_eq!(filter.tokens(), &["ship".to_string(), "plane".to_string()]);
    assert!(filter.matches("ship"));
    assert!(filter.matches("airplane"));
    assert!(filter.matches("Cargo SHIP"));
    assert!(!filter.matches("harbor"));
  }
}
