// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/main.rs - 命令行主程序
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

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use gaoshan::{
  FromUrl,
  input::InputWrapper,
  labels::LabelFilter,
  model::DetectorBuilder,
  output::{OutputWrapper, draw::Draw},
  task::{OneShotTask, SeriesItem, Task, TimeSeriesTask},
  tile::latlon_to_tile,
};

use args::{Args, Command, CountArgs, DetectArgs, TileArgs};

fn detect(args: DetectArgs) -> Result<()> {
  info!("模型地址: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = InputWrapper::from_url(&args.input)?;
  let model = DetectorBuilder::from_url(&args.model)?.build()?;
  let output = OutputWrapper::from_url(&args.output)?;

  let prediction = OneShotTask.run_task(input, model, output)?;
  println!("{}", serde_json::to_string_pretty(&prediction.to_json())?);
  Ok(())
}

fn count(args: CountArgs) -> Result<()> {
  info!("模型地址: {}", args.model);

  let items = SeriesItem::zip(args.images, args.dates)?;
  let model = DetectorBuilder::from_url(&args.model)?.build()?;
  let output = OutputWrapper::from_url(&args.output)?;

  let filter = if args.labels.is_empty() {
    LabelFilter::vehicles()
  } else {
    LabelFilter::new(args.labels)
  };
  let draw = if args.no_annotate {
    None
  } else {
    let draw = Draw::default();
    Some(match &args.font {
      Some(font) => draw.with_font_file(font)?,
      None => draw,
    })
  };

  let report = TimeSeriesTask::default()
    .with_filter(filter)
    .with_annotation(draw)
    .with_workers(args.workers)
    .run_task(items, &model, &output)?;

  let json = serde_json::to_string_pretty(&report.to_json())?;
  match &args.report {
    Some(path) => {
      std::fs::write(path, json).with_context(|| format!("无法写入报告: {}", path.display()))?;
      info!("报告已写入 {}", path.display());
    }
    None => println!("{}", json),
  }
  Ok(())
}

fn tile(args: TileArgs) -> Result<()> {
  let tile = latlon_to_tile(args.lat, args.lon, args.zoom)?;
  info!("({}, {}) @ {} -> {}", args.lat, args.lon, args.zoom, tile);
  match &args.template {
    Some(template) => println!("{}", tile.url(template, args.api_key.as_deref())?),
    None => println!("{}", tile),
  }
  Ok(())
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  match Args::parse().command {
    Command::Detect(args) => detect(args),
    Command::Count(args) => count(args),
    Command::Tile(args) => tile(args),
  }
}
