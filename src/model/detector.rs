// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/model/detector.rs - 按能力区分的检测器
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

use tracing::warn;

use crate::{
  frame::Frame,
  model::{DetectError, DetectorKind, InferenceEngine, Model, YoloDetector},
  postprocess::Prediction,
};

/// 旋转框检测器，目前只保留模型路径，推理时报告不支持
#[derive(Debug, Clone)]
pub struct OrientedBoxDetector {
  model_path: PathBuf,
}

impl OrientedBoxDetector {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
    }
  }

  pub fn model_path(&self) -> &Path {
    &self.model_path
  }

  pub fn predict(&self, _frame: &Frame) -> Result<Prediction, DetectError> {
    warn!("旋转框模型 {} 暂不支持推理", self.model_path.display());
    Err(DetectError::Unsupported(format!(
      "旋转框检测 ({})",
      self.model_path.display()
    )))
  }
}

impl Model for OrientedBoxDetector {
  type Input = Frame;
  type Output = Prediction;
  type Error = DetectError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.predict(input)
  }
}

pub enum Detector<E> {
  AxisAligned(YoloDetector<E>),
  OrientedBox(OrientedBoxDetector),
}

impl<E: InferenceEngine> Detector<E> {
  pub fn kind(&self) -> DetectorKind {
    match self {
      Detector::AxisAligned(_) => DetectorKind::AxisAligned,
      Detector::OrientedBox(_) => DetectorKind::OrientedBox,
    }
  }

  pub fn predict(&self, frame: &Frame) -> Result<Prediction, DetectError> {
    match self {
      Detector::AxisAligned(detector) => detector.predict(frame),
      Detector::OrientedBox(detector) => detector.predict(frame),
    }
  }
}

impl<E: InferenceEngine> From<YoloDetector<E>> for Detector<E> {
  fn from(detector: YoloDetector<E>) -> Self {
    Detector::AxisAligned(detector)
  }
}

impl<E: InferenceEngine> Model for Detector<E> {
  type Input = Frame;
  type Output = Prediction;
  type Error = DetectError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.predict(input)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    frame::ChannelOrder,
    model::{
      DetectConfig,
      mock::{MockEngine, raw, three_classes},
    },
  };

  #[test]
  fn variants_share_the_predict_contract() {
    let frame = Frame::filled(32, 32, [0, 0, 0], ChannelOrder::Bgr);
    let output = raw(&[[16.0, 16.0, 8.0, 8.0, 0.0, 0.9, 0.0]]);
    let yolo = YoloDetector::new(MockEngine::new(32, output), three_classes(), DetectConfig::default()).unwrap();

    let axis: Detector<MockEngine> = yolo.into();
    assert_eq!(axis.kind(), DetectorKind::AxisAligned);
    let prediction = axis.infer(&frame).unwrap();
    assert_eq!(prediction.detections[0].class_name, "bicycle");

    let obb: Detector<MockEngine> = Detector::OrientedBox(OrientedBoxDetector::new("/models/dota-obb.onnx"));
    assert_eq!(obb.kind(), DetectorKind::OrientedBox);
    assert!(matches!(obb.infer(&frame), Err(DetectError::Unsupported(_))));
  }
}
