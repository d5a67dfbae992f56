// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/postprocess.rs - 推理后处理
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

mod assemble;
mod decode;
mod filter;
mod nms;
mod rescale;

pub use self::assemble::{AssembleError, Detection, Prediction, assemble};
pub use self::decode::{DecodeError, decode_output};
pub use self::filter::filter_by_confidence;
pub use self::nms::{NmsError, batched_nms, iou, nms};
pub use self::rescale::{rescale_box, rescale_candidates, scale_to_canvas};

/// 轴对齐边界框，角点形式 [x_min, y_min, x_max, y_max]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
}

impl BBox {
  pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
    Self { x1, y1, x2, y2 }
  }

  /// 由中心点和宽高构造
  pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
    Self {
      x1: cx - w / 2.0,
      y1: cy - h / 2.0,
      x2: cx + w / 2.0,
      y2: cy + h / 2.0,
    }
  }

  pub fn width(&self) -> f32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> f32 {
    self.y2 - self.y1
  }

  /// 面积，退化框为 0
  pub fn area(&self) -> f32 {
    self.width().max(0.0) * self.height().max(0.0)
  }

  pub fn to_array(&self) -> [f32; 4] {
    [self.x1, self.y1, self.x2, self.y2]
  }
}

/// 单个锚点解码得到的候选框（画布坐标）
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
  pub bbox: BBox,
  pub confidence: f32,
  pub class_id: usize,
  /// 锚点序号，用于置信度相同时的稳定排序
  pub anchor: usize,
}
