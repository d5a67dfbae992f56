// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/tile.rs - 瓦片坐标
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

use std::f64::consts::PI;
use std::fmt;

use thiserror::Error;
use url::Url;

/// Web 墨卡托投影可表示的最大纬度
pub const MAX_LATITUDE: f64 = 85.0511;
pub const MAX_ZOOM: u8 = 30;

#[derive(Error, Debug)]
pub enum TileError {
  #[error("纬度超出范围: {0}")]
  LatitudeOutOfRange(f64),
  #[error("经度超出范围 [-180, 180): {0}")]
  LongitudeOutOfRange(f64),
  #[error("缩放级别过大: {0} (最大 {MAX_ZOOM})")]
  ZoomTooLarge(u8),
  #[error("瓦片 URL 无效: {0}")]
  InvalidUrl(#[from] url::ParseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileCoord {
  pub x: u32,
  pub y: u32,
  pub z: u8,
}

impl TileCoord {
  /// 将 `{z}` `{x}` `{y}` `{api_key}` 替换进模板。
  ///
  /// 没有给出密钥时 `{api_key}` 替换为空串。
  pub fn url(&self, template: &str, api_key: Option<&str>) -> Result<Url, TileError> {
    let url = template
      .replace("{z}", &self.z.to_string())
      .replace("{x}", &self.x.to_string())
      .replace("{y}", &self.y.to_string())
      .replace("{api_key}", api_key.unwrap_or(""));
    Ok(Url::parse(&url)?)
  }
}

impl fmt::Display for TileCoord {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}/{}", self.z, self.x, self.y)
  }
}

/// 经纬度转换为 slippy-map 瓦片坐标，向零截断
pub fn latlon_to_tile(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord, TileError> {
  if !(-MAX_LATITUDE..=MAX_LATITUDE).contains(&lat) {
    return Err(TileError::LatitudeOutOfRange(lat));
  }
  if !(-180.0..180.0).contains(&lon) {
    return Err(TileError::LongitudeOutOfRange(lon));
  }
  if zoom > MAX_ZOOM {
    return Err(TileError::ZoomTooLarge(zoom));
  }

  let n = f64::from(1u32 << zoom);
  let lat_rad = lat.to_radians();
  let x = (lon + 180.0) / 360.0 * n;
  let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n;

  Ok(TileCoord {
    x: x.trunc() as u32,
    y: y.trunc() as u32,
    z: zoom,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn origin_tiles() {
    assert_eq!(latlon_to_tile(0.0, 0.0, 0).unwrap(), TileCoord { x: 0, y: 0, z: 0 });
    assert_eq!(latlon_to_tile(0.0, 0.0, 1).unwrap(), TileCoord { x: 1, y: 1, z: 1 });
    assert_eq!(latlon_to_tile(0.0, -180.0, 2).unwrap(), TileCoord { x: 0, y: 2, z: 2 });
    // 最东侧仍落在网格内
    assert_eq!(latlon_to_tile(0.0, 179.999, 2).unwrap().x, 3);
  }

  #[test]
  fn northern_hemisphere_is_top_half() {
    let tile = latlon_to_tile(47.263, 11.4, 10).unwrap();
    assert_eq!(tile.x, 544);
    assert!(tile.y < 512);

    let south = latlon_to_tile(-47.263, 11.4, 10).unwrap();
    assert!(south.y >= 512);
    assert_eq!(south.x, tile.x);
  }

  #[test]
  fn rejects_out_of_range_input() {
    assert!(matches!(
      latlon_to_tile(86.0, 0.0, 5),
      Err(TileError::LatitudeOutOfRange(_))
    ));
    assert!(matches!(
      latlon_to_tile(f64::NAN, 0.0, 5),
      Err(TileError::LatitudeOutOfRange(_))
    ));
    assert!(matches!(latlon_to_tile(0.0, 0.0, 31), Err(TileError::ZoomTooLarge(31))));
    for lon in [180.0, -180.5, 200.0, f64::NAN] {
      assert!(
        matches!(latlon_to_tile(0.0, lon, 3), Err(TileError::LongitudeOutOfRange(_))),
        "{lon}"
      );
    }
    assert!(latlon_to_tile(0.0, 0.0, 30).is_ok());
  }

  #[test]
  fn url_substitutes_placeholders() {
    let tile = TileCoord { x: 3, y: 5, z: 4 };
    let url = tile
      .url("https://tiles.example.com/{z}/{x}/{y}.png?key={api_key}", Some("abc"))
      .unwrap();
    assert_eq!(url.as_str(), "https://tiles.example.com/4/3/5.png?key=abc");

    let url = tile
      .url("https://tiles.example.com/{z}/{x}/{y}.png?key={api_key}", None)
      .unwrap();
    assert_eq!(url.as_str(), "https://tiles.example.com/4/3/5.png?key=");
    assert_eq!(tile.to_string(), "4/3/5");

    assert!(matches!(tile.url("{z}/{x}/{y}", None), Err(TileError::InvalidUrl(_))));
  }
}
