// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/postprocess/rescale.rs - 画布坐标映射回原图坐标
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

use super::{BBox, Candidate};
use crate::preprocess::LetterboxGeometry;

/// 先去掉填充再除以比例，最后按轴裁剪到 [0, 原图尺寸]
pub fn rescale_box(bbox: BBox, geometry: &LetterboxGeometry) -> BBox {
  let (pad_x, pad_y) = geometry.padding();
  let ratio = geometry.ratio;
  let max_x = geometry.orig_width as f64;
  let max_y = geometry.orig_height as f64;

  let map_x = |x: f32| ((x as f64 - pad_x) / ratio).clamp(0.0, max_x) as f32;
  let map_y = |y: f32| ((y as f64 - pad_y) / ratio).clamp(0.0, max_y) as f32;

  BBox {
    x1: map_x(bbox.x1),
    y1: map_y(bbox.y1),
    x2: map_x(bbox.x2),
    y2: map_y(bbox.y2),
  }
}

/// 原图坐标 -> 画布坐标，`rescale_box` 的逆映射（不裁剪）
pub fn scale_to_canvas(bbox: BBox, geometry: &LetterboxGeometry) -> BBox {
  let (pad_x, pad_y) = geometry.padding();
  let ratio = geometry.ratio;
  let map_x = |x: f32| (x as f64 * ratio + pad_x) as f32;
  let map_y = |y: f32| (y as f64 * ratio + pad_y) as f32;

  BBox {
    x1: map_x(bbox.x1),
    y1: map_y(bbox.y1),
    x2: map_x(bbox.x2),
    y2: map_y(bbox.y2),
  }
}

pub fn rescale_candidates(candidates: Vec<Candidate>, geometry: &LetterboxGeometry) -> Vec<Candidate> {
  candidates
    .into_iter()
    .map(|c| Candidate {
      bbox: rescale_box(c.bbox, geometry),
      ..c
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_abs_diff_eq;

  fn assert_box_close(a: BBox, b: BBox, tol: f32) {
    assert_abs_diff_eq!(a.x1, b.x1, epsilon = tol);
    assert_abs_diff_eq!(a.y1, b.y1, epsilon = tol);
    assert_abs_diff_eq!(a.x2, b.x2, epsilon = tol);
    assert_abs_diff_eq!(a.y2, b.y2, epsilon = tol);
  }

  #[test]
  fn hd_frame_unpads_vertically() {
    let geometry = LetterboxGeometry::new(1280, 720, 640, 640).unwrap();
    // 画布中 (100, 140) 对应原图 (200, 0)
    let mapped = rescale_box(BBox::new(100.0, 140.0, 300.0, 240.0), &geometry);
    assert_box_close(mapped, BBox::new(200.0, 0.0, 600.0, 200.0), 1e-4);
  }

  #[test]
  fn round_trip_recovers_original_box() {
    let cases = [
      (1280, 720, 640, 640),
      (720, 1280, 640, 640),
      (1000, 333, 640, 640),
      (333, 1001, 320, 320),
      (4000, 3000, 1280, 1280),
      (50, 20, 96, 48),
    ];
    for (w, h, cw, ch) in cases {
      let geometry = LetterboxGeometry::new(w, h, cw, ch).unwrap();
      let original = BBox::new(w as f32 * 0.1, h as f32 * 0.2, w as f32 * 0.7, h as f32 * 0.9);
      let back = rescale_box(scale_to_canvas(original, &geometry), &geometry);
      assert_box_close(back, original, 1.0);
    }
  }

  #[test]
  fn boxes_are_clipped_to_image_bounds() {
    let geometry = LetterboxGeometry::new(1280, 720, 640, 640).unwrap();
    // 落在上下填充区域之外的部分被裁剪
    let mapped = rescale_box(BBox::new(-20.0, 100.0, 700.0, 600.0), &geometry);
    assert_eq!(mapped, BBox::new(0.0, 0.0, 1280.0, 720.0));
  }

  #[test]
  fn unpad_happens_before_unscale() {
    // 100x45 -> 64x64，比例 0.64，pad_y = (64 - 28.8) / 2 = 17.6
    let geometry = LetterboxGeometry::new(100, 45, 64, 64).unwrap();
    let mapped = rescale_box(BBox::new(0.0, 17.6, 64.0, 46.4), &geometry);
    assert_box_close(mapped, BBox::new(0.0, 0.0, 100.0, 45.0), 1e-3);
  }

  #[test]
  fn candidates_keep_scores_and_classes() {
    let geometry = LetterboxGeometry::new(1280, 720, 640, 640).unwrap();
    let candidate = Candidate {
      bbox: BBox::new(10.0, 150.0, 20.0, 160.0),
      confidence: 0.6,
      class_id: 7,
      anchor: 42,
    };
    let out = rescale_candidates(vec![candidate], &geometry);
    assert_eq!(out[0].class_id, 7);
    assert_eq!(out[0].anchor, 42);
    assert_box_close(out[0].bbox, BBox::new(20.0, 20.0, 40.0, 40.0), 1e-4);
  }
}
