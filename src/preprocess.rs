// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/preprocess.rs - 推理前处理
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

use thiserror::Error;

use crate::frame::FrameError;

mod letterbox;
mod tensor;

pub use self::letterbox::{LETTERBOX_FILL, LetterboxGeometry, LetterboxResult, letterbox};
pub use self::tensor::{InputTensor, decode_tensor, encode_tensor};

#[derive(Error, Debug)]
pub enum PreprocessError {
  #[error("图像尺寸为零: {width}x{height}")]
  EmptyImage { width: u32, height: u32 },
  #[error("画布尺寸为零: {width}x{height}")]
  EmptyCanvas { width: u32, height: u32 },
  #[error("图像缓冲区无效: {0}")]
  InvalidBuffer(String),
  #[error("帧错误: {0}")]
  Frame(#[from] FrameError),
}
