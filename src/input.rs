// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/input.rs - 图像输入
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

use image::ImageReader;
use thiserror::Error;

use crate::{
  FromUrl,
  frame::{ChannelOrder, Frame},
};

#[cfg(feature = "read_image_file")]
mod image_folder;
#[cfg(feature = "read_image_file")]
mod read_image_file;

#[cfg(feature = "read_image_file")]
pub use self::image_folder::{IMAGE_EXTENSIONS, ImageFolderInput, ImageFolderInputError};
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("无法打开图像 {path}: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("无法解码图像 {path}: {source}")]
  Decode {
    path: PathBuf,
    source: image::ImageError,
  },
  #[cfg(feature = "read_image_file")]
  #[error("图像文件输入错误: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "read_image_file")]
  #[error("图像目录输入错误: {0}")]
  ImageFolderInputError(#[from] ImageFolderInputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 读取并解码图像文件，得到 BGR 顺序的帧
pub fn load_frame(path: impl AsRef<Path>) -> Result<Frame, InputError> {
  let path = path.as_ref();
  let image = ImageReader::open(path)
    .map_err(|source| InputError::Io {
      path: path.to_path_buf(),
      source,
    })?
    .with_guessed_format()
    .map_err(|source| InputError::Io {
      path: path.to_path_buf(),
      source,
    })?
    .decode()
    .map_err(|source| InputError::Decode {
      path: path.to_path_buf(),
      source,
    })?;

  Ok(Frame::from_rgb_image(image.into_rgb8()).to_order(ChannelOrder::Bgr))
}

pub enum InputWrapper {
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
  #[cfg(feature = "read_image_file")]
  ImageFolder(ImageFolderInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        let input = ImageFileInput::from_url(url)?;
        return Ok(InputWrapper::ReadImageFile(input));
      }
      if url.scheme() == ImageFolderInput::SCHEME {
        let input = ImageFolderInput::from_url(url)?;
        return Ok(InputWrapper::ImageFolder(input));
      }
    }
    Err(InputError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl Iterator for InputWrapper {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.next(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ImageFolder(input) => input.next(),
      // 未启用任何输入特性时没有可用变体
      #[allow(unreachable_patterns)]
      _ => None,
    }
  }
}
