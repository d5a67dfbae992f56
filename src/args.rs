// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;

/// Gaoshan 目标检测工具
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// 对单张图像执行检测
  Detect(DetectArgs),
  /// 统计一组图像中的车辆数量
  Count(CountArgs),
  /// 计算经纬度所在的地图瓦片
  Tile(TileArgs),
}

#[derive(clap::Args, Debug)]
pub struct DetectArgs {
  /// 模型地址，例如 onnx:///models/yolo11n.onnx?conf=0.25&iou=0.45
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，例如 image:///data/a.png
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，例如 image:///data/a_out.png 或 folder:///data/records
  #[arg(long, value_name = "OUTPUT", default_value = "null:///")]
  pub output: Url,
}

#[derive(clap::Args, Debug)]
pub struct CountArgs {
  /// 模型地址
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 图像路径
  #[arg(long, value_name = "IMAGE", num_args = 1.., required = true)]
  pub images: Vec<PathBuf>,
  /// 与图像一一对应的日期 (YYYY-MM-DD)
  #[arg(long, value_name = "DATE", num_args = 1..)]
  pub dates: Option<Vec<String>>,
  /// 需要统计的标签关键字，缺省为车辆
  #[arg(long, value_name = "TOKEN", value_delimiter = ',')]
  pub labels: Vec<String>,
  /// 工作线程数
  #[arg(long, default_value = "1", value_name = "COUNT")]
  pub workers: usize,
  /// 不保存标注图像
  #[arg(long)]
  pub no_annotate: bool,
  /// 标注所用字体文件
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
  /// 额外的输出
  #[arg(long, value_name = "OUTPUT", default_value = "null:///")]
  pub output: Url,
  /// JSON 报告路径，缺省时输出到标准输出
  #[arg(long, value_name = "FILE")]
  pub report: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct TileArgs {
  #[arg(long, allow_negative_numbers = true)]
  pub lat: f64,
  #[arg(long, allow_negative_numbers = true)]
  pub lon: f64,
  #[arg(long, default_value = "19")]
  pub zoom: u8,
  /// 瓦片地址模板，支持 {z} {x} {y} {api_key}
  #[arg(long, value_name = "TEMPLATE")]
  pub template: Option<String>,
  #[arg(long, value_name = "KEY")]
  pub api_key: Option<String>,
}
