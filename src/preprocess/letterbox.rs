// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/preprocess/letterbox.rs - 保持宽高比的缩放与填充
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

use image::{ImageBuffer, Rgb, imageops};
use tracing::debug;

use super::PreprocessError;
use crate::frame::Frame;

/// 填充色（中性灰）
pub const LETTERBOX_FILL: u8 = 114;

/// 原图与画布之间的几何关系。
///
/// 只保存缩放比例和两组尺寸，填充量总是由它们重新计算。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxGeometry {
  pub ratio: f64,
  pub orig_width: u32,
  pub orig_height: u32,
  pub canvas_width: u32,
  pub canvas_height: u32,
}

impl LetterboxGeometry {
  pub fn new(
    orig_width: u32,
    orig_height: u32,
    canvas_width: u32,
    canvas_height: u32,
  ) -> Result<Self, PreprocessError> {
    if orig_width == 0 || orig_height == 0 {
      return Err(PreprocessError::EmptyImage {
        width: orig_width,
        height: orig_height,
      });
    }
    if canvas_width == 0 || canvas_height == 0 {
      return Err(PreprocessError::EmptyCanvas {
        width: canvas_width,
        height: canvas_height,
      });
    }

    let ratio = (canvas_height as f64 / orig_height as f64).min(canvas_width as f64 / orig_width as f64);

    Ok(Self {
      ratio,
      orig_width,
      orig_height,
      canvas_width,
      canvas_height,
    })
  }

  /// (pad_x, pad_y)，即每一侧的平均填充量
  pub fn padding(&self) -> (f64, f64) {
    let pad_x = (self.canvas_width as f64 - self.orig_width as f64 * self.ratio) / 2.0;
    let pad_y = (self.canvas_height as f64 - self.orig_height as f64 * self.ratio) / 2.0;
    (pad_x, pad_y)
  }

  /// 缩放后（未填充）的图像尺寸，不超过画布
  ///
  /// 恰为 .5 时向偶数取整。
  pub fn resized_dims(&self) -> (u32, u32) {
    let w = (self.orig_width as f64 * self.ratio).round_ties_even() as u32;
    let h = (self.orig_height as f64 * self.ratio).round_ties_even() as u32;
    (w.clamp(1, self.canvas_width), h.clamp(1, self.canvas_height))
  }
}

#[derive(Debug, Clone)]
pub struct LetterboxResult {
  pub canvas: Frame,
  pub geometry: LetterboxGeometry,
  pub pad_left: u32,
  pub pad_top: u32,
}

/// 把剩余空间分到两侧，较大的一半放在右/下侧
fn split_padding(total: u32) -> (u32, u32) {
  let half = total as f64 / 2.0;
  let first = (half - 0.1).round() as u32;
  let second = (half + 0.1).round() as u32;
  debug_assert_eq!(first + second, total);
  (first, second)
}

pub fn letterbox(
  frame: &Frame,
  canvas_height: u32,
  canvas_width: u32,
) -> Result<LetterboxResult, PreprocessError> {
  let geometry = LetterboxGeometry::new(frame.width(), frame.height(), canvas_width, canvas_height)?;
  let (new_w, new_h) = geometry.resized_dims();

  let source: ImageBuffer<Rgb<u8>, Vec<u8>> =
    ImageBuffer::from_raw(frame.width(), frame.height(), frame.as_hwc().to_vec()).ok_or_else(|| {
      PreprocessError::InvalidBuffer(format!("{}x{}", frame.width(), frame.height()))
    })?;

  // 通道顺序与插值无关，BGR 数据可以直接按三通道缓冲区处理
  let resized = if (new_w, new_h) != (frame.width(), frame.height()) {
    imageops::resize(&source, new_w, new_h, imageops::FilterType::Triangle)
  } else {
    source
  };

  let (left, right) = split_padding(canvas_width - new_w);
  let (top, bottom) = split_padding(canvas_height - new_h);
  debug!(
    "letterbox: {}x{} -> {}x{}, 比例 {:.4}, 填充 左{} 右{} 上{} 下{}",
    frame.width(),
    frame.height(),
    new_w,
    new_h,
    geometry.ratio,
    left,
    right,
    top,
    bottom
  );

  let mut canvas = ImageBuffer::from_pixel(canvas_width, canvas_height, Rgb([LETTERBOX_FILL; 3]));
  imageops::replace(&mut canvas, &resized, left as i64, top as i64);

  let canvas = Frame::new(canvas.into_raw(), canvas_width, canvas_height, frame.order())?;

  Ok(LetterboxResult {
    canvas,
    geometry,
    pad_left: left,
    pad_top: top,
  })
}
