// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/model.rs - 模型
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

use std::str::FromStr;

use thiserror::Error;

use crate::{
  labels::LabelError,
  postprocess::{AssembleError, DecodeError, NmsError},
  preprocess::{InputTensor, PreprocessError},
};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 推理引擎边界：张量进，张量出。
///
/// 引擎需要支持并发的只读调用；如果底层会话不是线程安全的，
/// 由实现者自行串行化访问。
pub trait InferenceEngine: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn spec(&self) -> &ModelSpec;
  fn run(&self, input: &InputTensor) -> Result<RawOutput, Self::Error>;
}

/// 模型加载后声明的输入输出
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
  pub input_name: String,
  pub input_height: u32,
  pub input_width: u32,
  pub output_names: Vec<String>,
}

/// 引擎原始输出，行优先存储
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
  pub shape: Vec<usize>,
  pub data: Vec<f32>,
}

pub const DEFAULT_CONF_THRESHOLD: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
pub const DEFAULT_IMGSZ: u32 = 640;

/// 检测参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectConfig {
  pub conf_threshold: f32,
  pub iou_threshold: f32,
  /// 为 false 时按类别分组执行 NMS
  pub class_agnostic: bool,
  /// NMS 之后最多保留的检测数
  pub max_detections: Option<usize>,
}

impl Default for DetectConfig {
  fn default() -> Self {
    Self {
      conf_threshold: DEFAULT_CONF_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      class_agnostic: true,
      max_detections: None,
    }
  }
}

impl DetectConfig {
  pub fn with_conf_threshold(mut self, threshold: f32) -> Self {
    self.conf_threshold = threshold;
    self
  }

  pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
    self.iou_threshold = threshold;
    self
  }

  pub fn with_class_agnostic(mut self, agnostic: bool) -> Self {
    self.class_agnostic = agnostic;
    self
  }

  pub fn with_max_detections(mut self, max_detections: Option<usize>) -> Self {
    self.max_detections = max_detections;
    self
  }

  pub fn validate(&self) -> Result<(), DetectError> {
    if !(0.0..=1.0).contains(&self.conf_threshold) {
      return Err(DetectError::InvalidConfig(format!(
        "置信度阈值必须位于 [0, 1]，实际为 {}",
        self.conf_threshold
      )));
    }
    if !(0.0..=1.0).contains(&self.iou_threshold) {
      return Err(DetectError::InvalidConfig(format!(
        "IoU 阈值必须位于 [0, 1]，实际为 {}",
        self.iou_threshold
      )));
    }
    if self.max_detections == Some(0) {
      return Err(DetectError::InvalidConfig("最大检测数不能为 0".to_string()));
    }
    Ok(())
  }
}

/// 检测器类型，在配置阶段确定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectorKind {
  #[default]
  AxisAligned,
  OrientedBox,
}

impl FromStr for DetectorKind {
  type Err = DetectError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "axis" | "detect" => Ok(DetectorKind::AxisAligned),
      "obb" => Ok(DetectorKind::OrientedBox),
      other => Err(DetectError::InvalidConfig(format!("未知检测器类型: {}", other))),
    }
  }
}

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("预处理错误: {0}")]
  Preprocess(#[from] PreprocessError),
  #[error("输出解码错误: {0}")]
  Decode(#[from] DecodeError),
  #[error("NMS 错误: {0}")]
  Nms(#[from] NmsError),
  #[error("结果组装错误: {0}")]
  Assemble(#[from] AssembleError),
  #[error("类别表错误: {0}")]
  Labels(#[from] LabelError),
  #[error("推理引擎错误: {0}")]
  Engine(Box<dyn std::error::Error + Send + Sync>),
  #[error("不支持的操作: {0}")]
  Unsupported(String),
  #[error("配置无效: {0}")]
  InvalidConfig(String),
}

impl DetectError {
  pub fn engine<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    DetectError::Engine(Box::new(err))
  }
}

mod detector;
mod yolo;
pub use self::detector::{Detector, OrientedBoxDetector};
pub use self::yolo::YoloDetector;

#[cfg(test)]
pub(crate) use self::yolo::tests as mock;

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use self::onnx::{DetectorBuilder, OnnxEngine, OnnxEngineError};
