// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/frame.rs - 图像帧定义
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

use image::{ImageBuffer, Rgb, RgbImage};
use thiserror::Error;

pub const RGB_CHANNELS: usize = 3;

/// 像素通道顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
  Bgr,
  Rgb,
}

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 三通道交错（HWC）图像帧。
///
/// 帧在创建后不可变，需要其他通道顺序时总是生成新的缓冲区。
#[derive(Debug, Clone)]
pub struct Frame {
  data: Box<[u8]>,
  width: u32,
  height: u32,
  order: ChannelOrder,
}

impl Frame {
  pub fn new(data: Vec<u8>, width: u32, height: u32, order: ChannelOrder) -> Result<Self, FrameError> {
    let expected = RGB_CHANNELS * width as usize * height as usize;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
      width,
      height,
      order,
    })
  }

  /// 以单一颜色填充的帧
  pub fn filled(width: u32, height: u32, pixel: [u8; 3], order: ChannelOrder) -> Self {
    let data = pixel
      .iter()
      .copied()
      .cycle()
      .take(RGB_CHANNELS * width as usize * height as usize)
      .collect::<Vec<_>>();
    Self {
      data: data.into_boxed_slice(),
      width,
      height,
      order,
    }
  }

  pub fn from_rgb_image(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      data: image.into_raw().into_boxed_slice(),
      width,
      height,
      order: ChannelOrder::Rgb,
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn order(&self) -> ChannelOrder {
    self.order
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }

  pub fn as_hwc(&self) -> &[u8] {
    &self.data
  }

  pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
    let idx = (y as usize * self.width as usize + x as usize) * RGB_CHANNELS;
    [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
  }

  /// 转换到指定通道顺序，顺序相同时仅复制
  pub fn to_order(&self, order: ChannelOrder) -> Frame {
    if order == self.order {
      return self.clone();
    }

    let mut data = self.data.to_vec();
    for px in data.chunks_exact_mut(RGB_CHANNELS) {
      px.swap(0, 2);
    }

    Frame {
      data: data.into_boxed_slice(),
      width: self.width,
      height: self.height,
      order,
    }
  }

  pub fn to_rgb_image(&self) -> RgbImage {
    let rgb = self.to_order(ChannelOrder::Rgb);
    // 长度在构造时已校验
    ImageBuffer::from_fn(rgb.width, rgb.height, |x, y| Rgb(rgb.pixel(x, y)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_rejects_wrong_length() {
    let err = Frame::new(vec![0; 10], 2, 2, ChannelOrder::Bgr).unwrap_err();
    assert!(matches!(
      err,
      FrameError::LengthMismatch {
        expected: 12,
        actual: 10
      }
    ));
  }

  #[test]
  fn to_order_swaps_red_and_blue() {
    let frame = Frame::new(vec![1, 2, 3, 4, 5, 6], 2, 1, ChannelOrder::Bgr).unwrap();
    let rgb = frame.to_order(ChannelOrder::Rgb);
    assert_eq!(rgb.as_hwc(), &[3, 2, 1, 6, 5, 4]);
    assert_eq!(rgb.order(), ChannelOrder::Rgb);
    // 原帧保持不变
    assert_eq!(frame.as_hwc(), &[1, 2, 3, 4, 5, 6]);
  }

  #[test]
  fn rgb_image_round_trip() {
    let image = RgbImage::from_fn(3, 2, |x, y| Rgb([x as u8, y as u8, 7]));
    let frame = Frame::from_rgb_image(image.clone()).to_order(ChannelOrder::Bgr);
    assert_eq!(frame.pixel(2, 1), [7, 1, 2]);
    assert_eq!(frame.to_rgb_image(), image);
  }

  #[test]
  fn filled_frame_has_uniform_pixels() {
    let frame = Frame::filled(4, 3, [114, 114, 114], ChannelOrder::Bgr);
    assert_eq!(frame.as_hwc().len(), 36);
    assert!(frame.as_hwc().iter().all(|&v| v == 114));
  }
}
