// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/preprocess/tensor.rs - 图像与 NCHW 张量之间的转换
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

use ndarray::Array4;

use super::PreprocessError;
use crate::frame::{ChannelOrder, Frame, RGB_CHANNELS};

/// 模型输入张量，形状 (1, 3, H, W)，RGB，取值 [0, 1]
#[derive(Debug, Clone)]
pub struct InputTensor {
  array: Array4<f32>,
}

impl InputTensor {
  pub fn shape(&self) -> &[usize] {
    self.array.shape()
  }

  pub fn height(&self) -> usize {
    self.array.shape()[2]
  }

  pub fn width(&self) -> usize {
    self.array.shape()[3]
  }

  pub fn as_array(&self) -> &Array4<f32> {
    &self.array
  }

  pub fn into_array(self) -> Array4<f32> {
    self.array
  }
}

impl From<Array4<f32>> for InputTensor {
  fn from(array: Array4<f32>) -> Self {
    Self { array }
  }
}

/// HWC 帧 -> NCHW 张量：BGR 转 RGB，除以 255，并加上 batch 维
pub fn encode_tensor(canvas: &Frame) -> InputTensor {
  let (h, w) = (canvas.height() as usize, canvas.width() as usize);
  let data = canvas.as_hwc();
  let order = canvas.order();

  let array = Array4::from_shape_fn((1, RGB_CHANNELS, h, w), |(_, c, y, x)| {
    let src_c = match order {
      ChannelOrder::Bgr => RGB_CHANNELS - 1 - c,
      ChannelOrder::Rgb => c,
    };
    data[(y * w + x) * RGB_CHANNELS + src_c] as f32 / 255.0
  });

  InputTensor { array }
}

/// NCHW 张量 -> RGB 帧。数值被量化回 8 位，因此只有形状是可逆的。
pub fn decode_tensor(tensor: &InputTensor) -> Result<Frame, PreprocessError> {
  let shape = tensor.shape();
  if shape[0] != 1 || shape[1] != RGB_CHANNELS {
    return Err(PreprocessError::InvalidBuffer(format!("张量形状 {:?}", shape)));
  }

  let (h, w) = (tensor.height(), tensor.width());
  let array = tensor.as_array();
  let mut data = vec![0u8; h * w * RGB_CHANNELS];
  for y in 0..h {
    for x in 0..w {
      for c in 0..RGB_CHANNELS {
        let v = array[[0, c, y, x]];
        data[(y * w + x) * RGB_CHANNELS + c] = (v * 255.0).round().clamp(0.0, 255.0) as u8;
      }
    }
  }

  Ok(Frame::new(data, w as u32, h as u32, ChannelOrder::Rgb)?)
}
