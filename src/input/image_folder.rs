// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/input/image_folder.rs - 图像目录输入
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

use std::{
  collections::VecDeque,
  path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, input::load_frame};

/// 目录中被识别为图像的扩展名（大小写不敏感）
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "tif", "tiff", "bmp"];

#[derive(Error, Debug)]
pub enum ImageFolderInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("无法读取目录 {path}: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
}

const IMAGE_FOLDER_SCHEME: &str = "folder";

/// 按文件名排序依次读取目录中的图像。无法解码的文件记录警告后跳过。
#[derive(Debug)]
pub struct ImageFolderInput {
  root: PathBuf,
  pending: VecDeque<PathBuf>,
}

fn is_image(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
    .unwrap_or(false)
}

impl FromUrl for ImageFolderInput {
  type Error = ImageFolderInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != IMAGE_FOLDER_SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        IMAGE_FOLDER_SCHEME,
        url.scheme()
      );
      return Err(ImageFolderInputError::SchemaMismatch);
    }

    Self::open(url.path())
  }
}

impl FromUrlWithScheme for ImageFolderInput {
  const SCHEME: &'static str = IMAGE_FOLDER_SCHEME;
}

impl ImageFolderInput {
  pub fn open(root: impl AsRef<Path>) -> Result<Self, ImageFolderInputError> {
    let root = root.as_ref();
    let io_err = |source| ImageFolderInputError::Io {
      path: root.to_path_buf(),
      source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(root).map_err(io_err)? {
      let path = entry.map_err(io_err)?.path();
      if path.is_file() && is_image(&path) {
        paths.push(path);
      }
    }
    paths.sort();
    info!("目录 {} 中找到 {} 张图像", root.display(), paths.len());

    Ok(ImageFolderInput {
      root: root.to_path_buf(),
      pending: paths.into(),
    })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// 尚未读取的图像路径
  pub fn paths(&self) -> impl Iterator<Item = &Path> {
    self.pending.iter().map(PathBuf::as_path)
  }

  pub fn into_paths(self) -> Vec<PathBuf> {
    self.pending.into()
  }
}

impl Iterator for ImageFolderInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(path) = self.pending.pop_front() {
      match load_frame(&path) {
        Ok(frame) => return Some(frame),
        Err(e) => warn!("跳过无法读取的图像: {}", e),
      }
    }
    None
  }
}
