// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/postprocess/decode.rs - 输出张量解码
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

use ndarray::{ArrayView3, Axis};
use thiserror::Error;
use tracing::debug;

use super::{BBox, Candidate};
use crate::model::RawOutput;

const BOX_ROWS: usize = 4;

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("输出张量维度错误: 期望 (1, 4+C, A), 实际 {0:?}")]
  Rank(Vec<usize>),
  #[error("输出 batch 必须为 1, 实际为 {0}")]
  Batch(usize),
  #[error("输出行数 {0} 不足以包含类别分数")]
  NoClasses(usize),
  #[error("输出数据长度不匹配: 形状 {shape:?}, 数据长度 {actual}")]
  DataLength { shape: Vec<usize>, actual: usize },
}

/// 取最高分类别，分数相同时取序号最小者
fn argmax(scores: impl Iterator<Item = f32>) -> (usize, f32) {
  let mut best = (0usize, f32::NAN);
  for (idx, score) in scores.enumerate() {
    if idx == 0 || score > best.1 {
      best = (idx, score);
    }
  }
  best
}

/// 解码 (1, 4+C, A) 输出，每个锚点得到一个候选框
pub fn decode_output(output: &RawOutput) -> Result<Vec<Candidate>, DecodeError> {
  let (batch, rows, anchors) = match output.shape.as_slice() {
    &[b, r, a] => (b, r, a),
    other => return Err(DecodeError::Rank(other.to_vec())),
  };
  if batch != 1 {
    return Err(DecodeError::Batch(batch));
  }
  if rows <= BOX_ROWS {
    return Err(DecodeError::NoClasses(rows));
  }

  let view = ArrayView3::from_shape((batch, rows, anchors), output.data.as_slice()).map_err(|_| {
    DecodeError::DataLength {
      shape: output.shape.clone(),
      actual: output.data.len(),
    }
  })?;
  let view = view.index_axis(Axis(0), 0);

  // 按列遍历等价于转置为 (A, 4+C)
  let candidates = view
    .axis_iter(Axis(1))
    .enumerate()
    .map(|(anchor, column)| {
      let (cx, cy, w, h) = (column[0], column[1], column[2], column[3]);
      let (class_id, confidence) = argmax(column.iter().skip(BOX_ROWS).copied());
      Candidate {
        bbox: BBox::from_center(cx, cy, w, h),
        confidence,
        class_id,
        anchor,
      }
    })
    .collect::<Vec<_>>();

  debug!(
    "解码输出: {} 个锚点, {} 个类别",
    anchors,
    rows - BOX_ROWS
  );

  Ok(candidates)
}
