// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{InputError, load_frame},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("图像读取错误: {0}")]
  Load(Box<InputError>),
}

impl From<InputError> for ImageFileInputError {
  fn from(err: InputError) -> Self {
    ImageFileInputError::Load(Box::new(err))
  }
}

const READ_IMAGE_FILE_SCHEME: &str = "image";

/// 单张图像，迭代一次后耗尽
pub struct ImageFileInput {
  path: PathBuf,
  frame: Option<Frame>,
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != READ_IMAGE_FILE_SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        READ_IMAGE_FILE_SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    Self::open(url.path())
  }
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = READ_IMAGE_FILE_SCHEME;
}

impl ImageFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageFileInputError> {
    let path = path.as_ref();
    let frame = load_frame(path)?;
    info!("读取图像 {}: {}x{}", path.display(), frame.width(), frame.height());

    Ok(ImageFileInput {
      path: path.to_path_buf(),
      frame: Some(frame),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Iterator for ImageFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  #[test]
  fn yields_exactly_one_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("one.png");
    RgbImage::from_pixel(5, 4, Rgb([1, 2, 3])).save(&path).unwrap();

    let url = Url::from_file_path(&path).unwrap();
    let url = Url::parse(&url.as_str().replacen("file:", "image:", 1)).unwrap();
    let mut input = ImageFileInput::from_url(&url).unwrap();
    assert_eq!(input.path(), path.as_path());

    let frame = input.next().unwrap();
    assert_eq!((frame.width(), frame.height()), (5, 4));
    assert!(input.next().is_none());
  }

  #[test]
  fn wrong_scheme_and_missing_file() {
    let url = Url::parse("folder:///tmp").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::SchemaMismatch)
    ));
    assert!(matches!(
      ImageFileInput::open("/nonexistent/image.png"),
      Err(ImageFileInputError::Load(_))
    ));
  }
}
