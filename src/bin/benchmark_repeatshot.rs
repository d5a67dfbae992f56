// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/bin/benchmark_repeatshot.rs - 重复推理同一张图像，统计平均耗时
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use gaoshan::{
  FromUrl,
  input::InputWrapper,
  model::DetectorBuilder,
  output::NullOutput,
  task::{RepeatShotTask, Task},
};
use tracing::info;

/// 推理耗时测试
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 推理次数
  #[arg(long, default_value = "1000")]
  pub repeat: usize,
  /// 不计入统计的预热次数
  #[arg(long, default_value = "2")]
  pub warmup: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型地址: {}", args.model);
  info!("输入来源: {}", args.input);

  let input = InputWrapper::from_url(&args.input)?;
  let model = DetectorBuilder::from_url(&args.model)?.build()?;
  let summary = RepeatShotTask::new(args.repeat, args.warmup)?.run_task(input, model, NullOutput)?;

  println!("{} 次推理平均耗时 {:.2?}", summary.runs, summary.mean);
  Ok(())
}
