// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/postprocess/nms.rs - 非极大值抑制
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

use thiserror::Error;

use super::BBox;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NmsError {
  #[error("输入长度不一致: 边界框 {boxes}, 分数 {scores}")]
  LengthMismatch { boxes: usize, scores: usize },
  #[error("类别数量与边界框不一致: 边界框 {boxes}, 类别 {classes}")]
  ClassMismatch { boxes: usize, classes: usize },
}

/// 计算两个边界框的 IoU，任一框面积为零时返回 0
pub fn iou(a: &BBox, b: &BBox) -> f32 {
  let area_a = a.area();
  let area_b = b.area();
  if area_a <= 0.0 || area_b <= 0.0 {
    return 0.0;
  }

  let x1 = a.x1.max(b.x1);
  let y1 = a.y1.max(b.y1);
  let x2 = a.x2.min(b.x2);
  let y2 = a.y2.min(b.y2);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 按置信度降序排列下标；同分时按原始下标升序
fn ranked(indices: impl Iterator<Item = usize>, scores: &[f32]) -> Vec<usize> {
  let mut order = indices.collect::<Vec<_>>();
  order.sort_by(|&i, &j| scores[j].total_cmp(&scores[i]).then(i.cmp(&j)));
  order
}

fn greedy(order: &[usize], boxes: &[BBox], iou_threshold: f32) -> Vec<usize> {
  let mut suppressed = vec![false; order.len()];
  let mut keep = Vec::new();

  for (pos, &i) in order.iter().enumerate() {
    if suppressed[pos] {
      continue;
    }
    keep.push(i);

    for (later, &j) in order.iter().enumerate().skip(pos + 1) {
      // IoU 恰好等于阈值时保留
      if !suppressed[later] && iou(&boxes[i], &boxes[j]) > iou_threshold {
        suppressed[later] = true;
      }
    }
  }

  keep
}

/// 类别无关的贪心 NMS。
///
/// 返回保留框在输入中的下标，按置信度降序排列，同分按下标升序。
/// 相同输入总是得到相同的结果与顺序。
pub fn nms(boxes: &[BBox], scores: &[f32], iou_threshold: f32) -> Result<Vec<usize>, NmsError> {
  if boxes.len() != scores.len() {
    return Err(NmsError::LengthMismatch {
      boxes: boxes.len(),
      scores: scores.len(),
    });
  }

  let order = ranked(0..boxes.len(), scores);
  Ok(greedy(&order, boxes, iou_threshold))
}

/// 先按类别分组再分别执行 NMS，不同类别之间互不抑制。
/// 结果的排序规则与 [`nms`] 相同。
pub fn batched_nms(
  boxes: &[BBox],
  scores: &[f32],
  class_ids: &[usize],
  iou_threshold: f32,
) -> Result<Vec<usize>, NmsError> {
  if boxes.len() != scores.len() {
    return Err(NmsError::LengthMismatch {
      boxes: boxes.len(),
      scores: scores.len(),
    });
  }
  if boxes.len() != class_ids.len() {
    return Err(NmsError::ClassMismatch {
      boxes: boxes.len(),
      classes: class_ids.len(),
    });
  }

  let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
  for (idx, &class_id) in class_ids.iter().enumerate() {
    groups.entry(class_id).or_default().push(idx);
  }

  let survivors = groups
    .into_values()
    .flat_map(|members| {
      let order = ranked(members.into_iter(), scores);
      greedy(&order, boxes, iou_threshold)
    })
    .collect::<Vec<_>>();

  Ok(ranked(survivors.into_iter(), scores))
}
