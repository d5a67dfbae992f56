// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/model/yolo.rs - YOLO 目标检测器
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

use tracing::debug;

use crate::{
  frame::Frame,
  labels::ClassTable,
  model::{DetectConfig, DetectError, InferenceEngine, Model},
  postprocess::{
    BBox, Prediction, assemble, batched_nms, decode_output, filter_by_confidence, nms,
    rescale_candidates,
  },
  preprocess::{encode_tensor, letterbox},
};

/// YOLO 目标检测器
///
/// 创建后只读，`predict` 只需要 `&self`，可以在多个线程之间共享。
pub struct YoloDetector<E> {
  engine: E,
  classes: ClassTable,
  config: DetectConfig,
}

impl<E: InferenceEngine> YoloDetector<E> {
  pub fn new(engine: E, classes: ClassTable, config: DetectConfig) -> Result<Self, DetectError> {
    config.validate()?;
    Ok(Self {
      engine,
      classes,
      config,
    })
  }

  pub fn engine(&self) -> &E {
    &self.engine
  }

  pub fn classes(&self) -> &ClassTable {
    &self.classes
  }

  pub fn config(&self) -> &DetectConfig {
    &self.config
  }

  /// 模型输入尺寸 (高, 宽)
  pub fn input_size(&self) -> (u32, u32) {
    let spec = self.engine.spec();
    (spec.input_height, spec.input_width)
  }

  pub fn predict(&self, frame: &Frame) -> Result<Prediction, DetectError> {
    let (input_height, input_width) = self.input_size();
    let boxed = letterbox(frame, input_height, input_width)?;
    let tensor = encode_tensor(&boxed.canvas);

    let raw = self.engine.run(&tensor).map_err(DetectError::engine)?;
    let candidates = decode_output(&raw)?;
    let num_anchors = candidates.len();

    let candidates = filter_by_confidence(candidates, self.config.conf_threshold);
    let candidates = rescale_candidates(candidates, &boxed.geometry);

    let boxes = candidates.iter().map(|c| c.bbox).collect::<Vec<BBox>>();
    let scores = candidates.iter().map(|c| c.confidence).collect::<Vec<_>>();
    let mut keep = if self.config.class_agnostic {
      nms(&boxes, &scores, self.config.iou_threshold)?
    } else {
      let class_ids = candidates.iter().map(|c| c.class_id).collect::<Vec<_>>();
      batched_nms(&boxes, &scores, &class_ids, self.config.iou_threshold)?
    };
    if let Some(max) = self.config.max_detections {
      keep.truncate(max);
    }
    debug!(
      "锚点 {} 个, 置信度过滤后 {} 个, NMS 后 {} 个",
      num_anchors,
      candidates.len(),
      keep.len()
    );

    let survivors = keep.into_iter().map(|i| candidates[i].clone()).collect();
    let detections = assemble(survivors, &self.classes)?;

    Ok(Prediction {
      detections,
      orig_width: frame.width(),
      orig_height: frame.height(),
    })
  }
}

impl<E: InferenceEngine> Model for YoloDetector<E> {
  type Input = Frame;
  type Output = Prediction;
  type Error = DetectError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.predict(input)
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::{
    frame::ChannelOrder,
    model::{ModelSpec, RawOutput},
    postprocess::AssembleError,
    preprocess::{InputTensor, PreprocessError},
  };
  use approx::assert_abs_diff_eq;
  use thiserror::Error;

  #[derive(Error, Debug)]
  pub enum MockError {
    #[error("输入形状错误: {0:?}")]
    Shape(Vec<usize>),
    #[error("引擎故障")]
    Broken,
  }

  /// 返回固定输出的引擎
  pub struct MockEngine {
    spec: ModelSpec,
    output: Option<RawOutput>,
  }

  impl MockEngine {
    pub fn new(size: u32, output: RawOutput) -> Self {
      Self {
        spec: ModelSpec {
          input_name: "images".to_string(),
          input_height: size,
          input_width: size,
          output_names: vec!["output0".to_string()],
        },
        output: Some(output),
      }
    }

    pub fn broken(size: u32) -> Self {
      Self {
        output: None,
        ..Self::new(size, raw(&[]))
      }
    }
  }

  impl InferenceEngine for MockEngine {
    type Error = MockError;

    fn spec(&self) -> &ModelSpec {
      &self.spec
    }

    fn run(&self, input: &InputTensor) -> Result<RawOutput, Self::Error> {
      let expected = [1, 3, self.spec.input_height as usize, self.spec.input_width as usize];
      if input.shape() != expected {
        return Err(MockError::Shape(input.shape().to_vec()));
      }
      self.output.clone().ok_or(MockError::Broken)
    }
  }

  /// 三类模型的输出，每个锚点为 (cx, cy, w, h, s0, s1, s2)
  pub fn raw(anchors: &[[f32; 7]]) -> RawOutput {
    let count = anchors.len();
    let mut data = vec![0.0; 7 * count];
    for (a, column) in anchors.iter().enumerate() {
      for (r, &value) in column.iter().enumerate() {
        data[r * count + a] = value;
      }
    }
    RawOutput {
      shape: vec![1, 7, count],
      data,
    }
  }

  pub fn three_classes() -> ClassTable {
    ClassTable::from_names(["person", "bicycle", "car"])
  }

  fn frame() -> Frame {
    Frame::filled(128, 64, [10, 20, 30], ChannelOrder::Bgr)
  }

  // 128x64 -> 64x64: 比例 0.5, pad_y = 16
  fn overlapping_pair(second_class: usize) -> RawOutput {
    let mut second = [32.0, 33.0, 20.0, 10.0, 0.0, 0.0, 0.0];
    second[4 + second_class] = 0.8;
    raw(&[
      [32.0, 32.0, 20.0, 10.0, 0.05, 0.0, 0.9],
      second,
      [10.0, 20.0, 4.0, 4.0, 0.1, 0.0, 0.0],
    ])
  }

  #[test]
  fn predicts_in_original_coordinates() {
    let detector = YoloDetector::new(
      MockEngine::new(64, overlapping_pair(2)),
      three_classes(),
      DetectConfig::default(),
    )
    .unwrap();

    let prediction = detector.predict(&frame()).unwrap();
    assert_eq!(prediction.count(), 1);
    assert_eq!(prediction.orig_width, 128);
    assert_eq!(prediction.orig_height, 64);

    let det = &prediction.detections[0];
    assert_eq!(det.class_name, "car");
    assert_eq!(det.class_id, 2);
    assert_abs_diff_eq!(det.confidence, 0.9);
    // 画布 (22, 27, 42, 37) -> 原图 (44, 22, 84, 42)
    assert_abs_diff_eq!(det.bbox.x1, 44.0, epsilon = 1e-4);
    assert_abs_diff_eq!(det.bbox.y1, 22.0, epsilon = 1e-4);
    assert_abs_diff_eq!(det.bbox.x2, 84.0, epsilon = 1e-4);
    assert_abs_diff_eq!(det.bbox.y2, 42.0, epsilon = 1e-4);
  }

  #[test]
  fn class_aware_nms_keeps_other_classes() {
    let config = DetectConfig::default().with_class_agnostic(false);
    let detector = YoloDetector::new(MockEngine::new(64, overlapping_pair(1)), three_classes(), config).unwrap();
    let prediction = detector.predict(&frame()).unwrap();
    let names = prediction
      .detections
      .iter()
      .map(|d| d.class_name.as_str())
      .collect::<Vec<_>>();
    assert_eq!(names, vec!["car", "bicycle"]);

    let agnostic =
      YoloDetector::new(MockEngine::new(64, overlapping_pair(1)), three_classes(), DetectConfig::default()).unwrap();
    assert_eq!(agnostic.predict(&frame()).unwrap().count(), 1);
  }

  #[test]
  fn max_detections_caps_output() {
    let output = raw(&[
      [5.0, 20.0, 4.0, 4.0, 0.0, 0.0, 0.5],
      [20.0, 20.0, 4.0, 4.0, 0.0, 0.0, 0.7],
      [40.0, 20.0, 4.0, 4.0, 0.0, 0.0, 0.6],
    ]);
    let config = DetectConfig::default().with_max_detections(Some(2));
    let detector = YoloDetector::new(MockEngine::new(64, output), three_classes(), config).unwrap();
    let prediction = detector.predict(&frame()).unwrap();
    let confidences = prediction.detections.iter().map(|d| d.confidence).collect::<Vec<_>>();
    assert_eq!(confidences, vec![0.7, 0.6]);
  }

  #[test]
  fn nothing_above_threshold_is_empty_prediction() {
    let output = raw(&[[32.0, 32.0, 8.0, 8.0, 0.1, 0.2, 0.25]]);
    let detector = YoloDetector::new(MockEngine::new(64, output), three_classes(), DetectConfig::default()).unwrap();
    let prediction = detector.predict(&frame()).unwrap();
    assert!(prediction.is_empty());
    assert_eq!(prediction.to_json()["count"], 0);
  }

  #[test]
  fn class_outside_table_fails_loudly() {
    let detector = YoloDetector::new(
      MockEngine::new(64, overlapping_pair(2)),
      ClassTable::from_names(["person", "bicycle"]),
      DetectConfig::default(),
    )
    .unwrap();
    assert!(matches!(
      detector.predict(&frame()),
      Err(DetectError::Assemble(AssembleError::UnknownClass {
        class_id: 2,
        num_classes: 2
      }))
    ));
  }

  #[test]
  fn engine_and_input_failures_propagate() {
    let detector = YoloDetector::new(MockEngine::broken(64), three_classes(), DetectConfig::default()).unwrap();
    assert!(matches!(detector.predict(&frame()), Err(DetectError::Engine(_))));

    let empty = Frame::new(Vec::new(), 0, 0, ChannelOrder::Bgr).unwrap();
    assert!(matches!(
      detector.predict(&empty),
      Err(DetectError::Preprocess(PreprocessError::EmptyImage { .. }))
    ));
  }

  #[test]
  fn invalid_config_is_rejected_at_construction() {
    let config = DetectConfig::default().with_iou_threshold(2.0);
    assert!(matches!(
      YoloDetector::new(MockEngine::broken(64), three_classes(), config),
      Err(DetectError::InvalidConfig(_))
    ));
  }

  #[test]
  fn detector_is_shareable_across_threads() {
    let detector = YoloDetector::new(
      MockEngine::new(64, overlapping_pair(2)),
      three_classes(),
      DetectConfig::default(),
    )
    .unwrap();
    let image = frame();
    std::thread::scope(|s| {
      let handles = (0..4)
        .map(|_| s.spawn(|| detector.predict(&image).unwrap()))
        .collect::<Vec<_>>();
      for handle in handles {
        assert_eq!(handle.join().unwrap().count(), 1);
      }
    });
  }
}
