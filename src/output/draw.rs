// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};
use thiserror::Error;
use tracing::debug;

use crate::{
  frame::Frame,
  postprocess::{Detection, Prediction},
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;
const BOX_COLOR: [u8; 3] = [0, 255, 0]; // 绿色

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法读取字体文件 {path}: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("字体文件无效: {0}")]
  InvalidFont(PathBuf),
}

/// 检测框绘制器。未提供字体时只画框，不画标签。
pub struct Draw {
  font_size: f32,
  label_text_height: i32,
  label_char_width: f32,
  label_text_vertical_padding: i32,
  font: Option<FontVec>,
  color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font_size: LABEL_FONT_SIZE,
      label_text_height: LABEL_TEXT_HEIGHT,
      label_char_width: LABEL_CHAR_WIDTH,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      font: None,
      color: BOX_COLOR,
    }
  }
}

impl Draw {
  pub fn with_font_file(mut self, path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| DrawError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let font = FontVec::try_from_vec(data).map_err(|_| DrawError::InvalidFont(path.to_path_buf()))?;
    debug!("加载标签字体: {}", path.display());
    self.font = Some(font);
    Ok(self)
  }

  pub fn with_color(mut self, color: [u8; 3]) -> Self {
    self.color = color;
    self
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 在帧上绘制检测结果，返回新的 RGB 图像
  pub fn draw_frame(&self, frame: &Frame, prediction: &Prediction) -> RgbImage {
    let mut image = frame.to_rgb_image();
    self.draw_detections(&mut image, prediction);
    image
  }

  pub fn draw_detections(&self, image: &mut RgbImage, prediction: &Prediction) {
    for detection in &prediction.detections {
      self.draw_bbox_with_label(image, detection);
    }
  }

  fn draw_bbox_with_label(&self, image: &mut RgbImage, detection: &Detection) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let bbox = &detection.bbox;
    let x_min = (bbox.x1.floor() as i32).clamp(0, w - 1);
    let y_min = (bbox.y1.floor() as i32).clamp(0, h - 1);
    let x_max = (bbox.x2.ceil() as i32).clamp(0, w - 1);
    let y_max = (bbox.y2.ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    // 边框向内加粗
    for t in 0..BOX_THICKNESS {
      let width = x_max - x_min - 2 * t + 1;
      let height = y_max - y_min - 2 * t + 1;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, Rgb(self.color));
    }

    let Some(font) = &self.font else {
      return;
    };

    let label = format!("{} {:.2}", detection.class_name, detection.confidence);
    let text_width = (label.len() as f32 * self.label_char_width) as i32;

    // 标签放在边框上方
    let label_x = x_min;
    let label_y = (y_min - self.label_text_height).max(0);
    let label_width = text_width.min(w - label_x).max(0) as u32;
    let label_height = self.label_text_height as u32;

    if label_width > 0 {
      let rect = Rect::at(label_x, label_y).of_size(label_width, label_height);
      draw_filled_rect_mut(image, rect, Rgb(self.color));
      draw_text_mut(
        image,
        Rgb([0u8, 0u8, 0u8]),
        label_x,
        label_y + self.label_text_vertical_padding,
        PxScale::from(self.font_size),
        font,
        &label,
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{frame::ChannelOrder, postprocess::BBox};

  fn prediction(bbox: BBox) -> Prediction {
    Prediction {
      detections: vec![Detection {
        bbox,
        confidence: 0.87,
        class_id: 2,
        class_name: "car".to_string(),
      }],
      orig_width: 40,
      orig_height: 30,
    }
  }

  #[test]
  fn draws_two_pixel_green_outline() {
    let frame = Frame::filled(40, 30, [0, 0, 0], ChannelOrder::Bgr);
    let image = Draw::default().draw_frame(&frame, &prediction(BBox::new(5.0, 5.0, 20.0, 15.0)));

    let green = Rgb([0u8, 255, 0]);
    assert_eq!(*image.get_pixel(5, 5), green);
    assert_eq!(*image.get_pixel(6, 10), green);
    assert_eq!(*image.get_pixel(20, 15), green);
    assert_eq!(*image.get_pixel(19, 14), green);
    // 内部与外部不受影响
    assert_eq!(*image.get_pixel(12, 10), Rgb([0, 0, 0]));
    assert_eq!(*image.get_pixel(25, 10), Rgb([0, 0, 0]));
  }

  #[test]
  fn boxes_outside_the_image_are_clipped() {
    let frame = Frame::filled(40, 30, [0, 0, 0], ChannelOrder::Rgb);
    let image = Draw::default().draw_frame(&frame, &prediction(BBox::new(-10.0, -10.0, 100.0, 100.0)));
    assert_eq!(*image.get_pixel(0, 0), Rgb([0, 255, 0]));
    assert_eq!(*image.get_pixel(39, 29), Rgb([0, 255, 0]));

    // 退化框不绘制
    let image = Draw::default().draw_frame(&frame, &prediction(BBox::new(10.0, 10.0, 10.0, 20.0)));
    assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
  }

  #[test]
  fn invalid_font_file_is_rejected() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), b"not a font").unwrap();
    assert!(matches!(
      Draw::default().with_font_file(file.path()),
      Err(DrawError::InvalidFont(_))
    ));
    assert!(matches!(
      Draw::default().with_font_file("/nonexistent/font.ttf"),
      Err(DrawError::Io { .. })
    ));
    assert!(!Draw::default().has_font());
  }
}
