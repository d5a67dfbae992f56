// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 推理引擎
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

use std::{
  path::{Path, PathBuf},
  sync::Mutex,
};

use ort::{
  session::Session,
  value::{Value, ValueType},
};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  labels::ClassTable,
  model::{
    DEFAULT_IMGSZ, DetectConfig, DetectError, Detector, DetectorKind, InferenceEngine, ModelSpec,
    OrientedBoxDetector, RawOutput, YoloDetector,
  },
  preprocess::InputTensor,
};

#[derive(Error, Debug)]
pub enum OnnxEngineError {
  #[error("模型文件不存在: {0}")]
  ModelNotFound(PathBuf),
  #[error("ONNX Runtime 错误: {0}")]
  Runtime(String),
  #[error("模型无效: {0}")]
  InvalidModel(String),
  #[error("模型路径必须使用 {expected} 方案, 实际为 {actual}")]
  SchemeMismatch { expected: String, actual: String },
  #[error("URL 参数 {key} 无效: {value}")]
  InvalidParameter { key: String, value: String },
  #[error("推理会话锁已损坏")]
  Poisoned,
}

fn runtime<E: std::fmt::Display>(err: E) -> OnnxEngineError {
  OnnxEngineError::Runtime(err.to_string())
}

/// ONNX Runtime 会话。`run` 需要可变会话，因此用互斥锁串行化调用。
pub struct OnnxEngine {
  session: Mutex<Session>,
  spec: ModelSpec,
}

impl OnnxEngine {
  /// 加载模型并读取声明的 NCHW 输入尺寸，动态维度回退为 `imgsz`
  pub fn load(path: impl AsRef<Path>, threads: usize, imgsz: u32) -> Result<Self, OnnxEngineError> {
    let path = path.as_ref();
    if !path.is_file() {
      return Err(OnnxEngineError::ModelNotFound(path.to_path_buf()));
    }

    info!("加载模型文件: {}", path.display());
    if let Ok(meta) = std::fs::metadata(path) {
      debug!("模型文件大小: {:.2} MB", meta.len() as f64 / (1024.0 * 1024.0));
    }

    let session = Session::builder()
      .map_err(runtime)?
      .with_intra_threads(threads.max(1))
      .map_err(runtime)?
      .commit_from_file(path)
      .map_err(runtime)?;

    let input = session
      .inputs
      .first()
      .ok_or_else(|| OnnxEngineError::InvalidModel("模型没有输入".to_string()))?;
    let dims = match &input.input_type {
      ValueType::Tensor { shape, .. } => shape.iter().copied().collect::<Vec<i64>>(),
      other => {
        return Err(OnnxEngineError::InvalidModel(format!(
          "输入 {} 不是张量: {:?}",
          input.name, other
        )));
      }
    };
    if dims.len() != 4 {
      return Err(OnnxEngineError::InvalidModel(format!(
        "输入 {} 应为 NCHW 四维张量, 实际为 {:?}",
        input.name, dims
      )));
    }

    let resolve = |dim: i64| {
      if dim > 0 {
        dim as u32
      } else {
        imgsz
      }
    };
    let spec = ModelSpec {
      input_name: input.name.clone(),
      input_height: resolve(dims[2]),
      input_width: resolve(dims[3]),
      output_names: session.outputs.iter().map(|o| o.name.clone()).collect(),
    };
    if spec.output_names.is_empty() {
      return Err(OnnxEngineError::InvalidModel("模型没有输出".to_string()));
    }

    info!(
      "模型加载完成: 输入 {} {:?} -> {}x{}, 输出 {:?}",
      spec.input_name, dims, spec.input_height, spec.input_width, spec.output_names
    );

    Ok(Self {
      session: Mutex::new(session),
      spec,
    })
  }
}

impl InferenceEngine for OnnxEngine {
  type Error = OnnxEngineError;

  fn spec(&self) -> &ModelSpec {
    &self.spec
  }

  fn run(&self, input: &InputTensor) -> Result<RawOutput, Self::Error> {
    let value = Value::from_array(input.as_array().clone()).map_err(runtime)?;

    let mut session = self.session.lock().map_err(|_| OnnxEngineError::Poisoned)?;
    let outputs = session
      .run(ort::inputs![self.spec.input_name.as_str() => value])
      .map_err(runtime)?;
    let array = outputs[0].try_extract_array::<f32>().map_err(runtime)?;

    Ok(RawOutput {
      shape: array.shape().to_vec(),
      data: array.iter().copied().collect(),
    })
  }
}

const ONNX_SCHEME: &str = "onnx";
const ONNX_OBB_SCHEME: &str = "onnx-obb";

/// 由 `onnx:///path/model.onnx?conf=..&iou=..` 形式的地址构建检测器
#[derive(Debug, Clone)]
pub struct DetectorBuilder {
  model_path: PathBuf,
  kind: DetectorKind,
  config: DetectConfig,
  labels: Option<PathBuf>,
  threads: usize,
  imgsz: u32,
}

fn parse_param<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, OnnxEngineError> {
  value.parse().map_err(|_| OnnxEngineError::InvalidParameter {
    key: key.to_string(),
    value: value.to_string(),
  })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, OnnxEngineError> {
  match value.to_ascii_lowercase().as_str() {
    "" | "1" | "true" | "yes" => Ok(true),
    "0" | "false" | "no" => Ok(false),
    _ => Err(OnnxEngineError::InvalidParameter {
      key: key.to_string(),
      value: value.to_string(),
    }),
  }
}

impl FromUrl for DetectorBuilder {
  type Error = OnnxEngineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let mut kind = match url.scheme() {
      ONNX_SCHEME => DetectorKind::AxisAligned,
      ONNX_OBB_SCHEME => DetectorKind::OrientedBox,
      other => {
        return Err(OnnxEngineError::SchemeMismatch {
          expected: ONNX_SCHEME.to_string(),
          actual: other.to_string(),
        });
      }
    };

    let mut config = DetectConfig::default();
    let mut labels = None;
    let mut threads = std::thread::available_parallelism()
      .map(|n| n.get())
      .unwrap_or(1);
    let mut imgsz = DEFAULT_IMGSZ;

    for (key, value) in url.query_pairs() {
      match &*key {
        "conf" => config.conf_threshold = parse_param(&key, &value)?,
        "iou" => config.iou_threshold = parse_param(&key, &value)?,
        "agnostic" => config.class_agnostic = parse_flag(&key, &value)?,
        "max_det" => config.max_detections = Some(parse_param(&key, &value)?),
        "labels" => labels = Some(PathBuf::from(value.into_owned())),
        "threads" => threads = parse_param(&key, &value)?,
        "imgsz" => imgsz = parse_param(&key, &value)?,
        "kind" => {
          kind = value.parse().map_err(|_| OnnxEngineError::InvalidParameter {
            key: key.to_string(),
            value: value.to_string(),
          })?
        }
        other => warn!("忽略未知的模型参数: {}", other),
      }
    }

    Ok(DetectorBuilder {
      model_path: PathBuf::from(url.path()),
      kind,
      config,
      labels,
      threads,
      imgsz,
    })
  }
}

impl FromUrlWithScheme for DetectorBuilder {
  const SCHEME: &'static str = ONNX_SCHEME;
}

impl DetectorBuilder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      kind: DetectorKind::default(),
      config: DetectConfig::default(),
      labels: None,
      threads: 1,
      imgsz: DEFAULT_IMGSZ,
    }
  }

  pub fn model_path(&self) -> &Path {
    &self.model_path
  }

  pub fn kind(&self) -> DetectorKind {
    self.kind
  }

  pub fn config(&self) -> &DetectConfig {
    &self.config
  }

  pub fn with_kind(mut self, kind: DetectorKind) -> Self {
    self.kind = kind;
    self
  }

  pub fn with_config(mut self, config: DetectConfig) -> Self {
    self.config = config;
    self
  }

  pub fn with_labels(mut self, labels: Option<PathBuf>) -> Self {
    self.labels = labels;
    self
  }

  pub fn with_threads(mut self, threads: usize) -> Self {
    self.threads = threads;
    self
  }

  pub fn with_imgsz(mut self, imgsz: u32) -> Self {
    self.imgsz = imgsz;
    self
  }

  pub fn build(self) -> Result<Detector<OnnxEngine>, DetectError> {
    self.config.validate()?;
    if !self.model_path.is_file() {
      return Err(DetectError::engine(OnnxEngineError::ModelNotFound(self.model_path)));
    }

    match self.kind {
      DetectorKind::OrientedBox => {
        warn!("旋转框模型只能加载，推理将报告不支持");
        Ok(Detector::OrientedBox(OrientedBoxDetector::new(self.model_path)))
      }
      DetectorKind::AxisAligned => {
        let classes = match &self.labels {
          Some(path) => ClassTable::from_file(path)?,
          None => ClassTable::coco(),
        };
        let engine = OnnxEngine::load(&self.model_path, self.threads, self.imgsz).map_err(DetectError::engine)?;
        Ok(YoloDetector::new(engine, classes, self.config)?.into())
      }
    }
  }
}
