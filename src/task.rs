// 该文件是 Gaoshan （高山远眺） 项目的一部分。
// src/task.rs - 任务调度
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
  collections::BTreeMap,
  path::{Path, PathBuf},
  time::{Duration, Instant},
};

use anyhow::Context;
use chrono::NaiveDate;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
  frame::Frame,
  input::load_frame,
  labels::LabelFilter,
  model::Model,
  output::{Render, draw::Draw},
  postprocess::{Detection, Prediction},
};

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("图像与日期数量不一致: 图像 {images}, 日期 {dates}")]
  LengthMismatch { images: usize, dates: usize },
  #[error("日期格式无效 (应为 YYYY-MM-DD): {0}")]
  InvalidDate(String),
  #[error("没有输入帧")]
  NoInput,
  #[error("重复次数 {repeat} 必须大于预热次数 {warmup}")]
  InvalidRepeat { repeat: usize, warmup: usize },
}

pub struct OneShotTask;

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Frame>,
  M: Model<Input = Frame, Output = Prediction, Error = ME>,
  O: Render<Frame, Prediction, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Output = Prediction;
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or(TaskError::NoInput)?;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let result = model.infer(&frame)?;
    info!("推理完成，检测到 {} 个目标，耗时: {:.2?}", result.count(), now.elapsed());
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(result)
  }
}

/// 重复推理同一帧，统计平均耗时（不计预热）
#[derive(Debug, Clone, Copy)]
pub struct RepeatShotTask {
  repeat: usize,
  warmup: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self {
      repeat: 1000,
      warmup: 2,
    }
  }
}

impl RepeatShotTask {
  pub fn new(repeat: usize, warmup: usize) -> Result<Self, TaskError> {
    if repeat <= warmup {
      return Err(TaskError::InvalidRepeat { repeat, warmup });
    }
    Ok(Self { repeat, warmup })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchmarkSummary {
  pub runs: usize,
  pub mean: Duration,
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Frame>,
  M: Model<Input = Frame, Output = Prediction, Error = ME>,
  O: Render<Frame, Prediction, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Output = BenchmarkSummary;
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or(TaskError::NoInput)?;
    info!("输入帧获取成功，开始推理...");
    let mut times = Vec::with_capacity(self.repeat);
    for i in 0..self.repeat {
      let now = Instant::now();
      let result = model.infer(&frame)?;
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&frame, &result)?;
      times.push(elapsed);
    }

    let measured = &times[self.warmup..];
    let mean = measured.iter().sum::<Duration>() / measured.len() as u32;
    warn!("平均推理时间: {:.2?}", mean);

    Ok(BenchmarkSummary {
      runs: measured.len(),
      mean,
    })
  }
}

/// 时间序列中的一张图像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesItem {
  pub image: PathBuf,
  pub date: Option<NaiveDate>,
}

impl SeriesItem {
  /// 图像与日期一一对应，数量不一致时在处理任何图像之前报错
  pub fn zip<P, S>(images: Vec<P>, dates: Option<Vec<S>>) -> Result<Vec<SeriesItem>, TaskError>
  where
    P: Into<PathBuf>,
    S: AsRef<str>,
  {
    let Some(dates) = dates else {
      return Ok(
        images
          .into_iter()
          .map(|image| SeriesItem {
            image: image.into(),
            date: None,
          })
          .collect(),
      );
    };

    if images.len() != dates.len() {
      return Err(TaskError::LengthMismatch {
        images: images.len(),
        dates: dates.len(),
      });
    }

    images
      .into_iter()
      .zip(dates)
      .map(|(image, date)| {
        let date = date.as_ref().trim();
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
          .map_err(|_| TaskError::InvalidDate(date.to_string()))?;
        Ok(SeriesItem {
          image: image.into(),
          date: Some(date),
        })
      })
      .collect()
  }
}

/// 单张图像的计数结果
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRecord {
  pub date: Option<NaiveDate>,
  pub image: PathBuf,
  pub annotated_image: Option<PathBuf>,
  pub total: usize,
  pub per_class: BTreeMap<String, usize>,
  pub boxes: Vec<Detection>,
  pub avg_conf: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
  Success(SeriesRecord),
  Failed {
    image: PathBuf,
    date: Option<NaiveDate>,
    error: String,
  },
}

fn date_json(date: Option<NaiveDate>) -> Value {
  date.map_or(Value::Null, |d| json!(d.format("%Y-%m-%d").to_string()))
}

impl ItemOutcome {
  pub fn is_success(&self) -> bool {
    matches!(self, ItemOutcome::Success(_))
  }

  pub fn image(&self) -> &Path {
    match self {
      ItemOutcome::Success(record) => &record.image,
      ItemOutcome::Failed { image, .. } => image,
    }
  }

  pub fn to_json(&self) -> Value {
    match self {
      ItemOutcome::Success(record) => json!({
        "date": date_json(record.date),
        "image": record.image.display().to_string(),
        "annotated_image": record.annotated_image.as_ref().map(|p| p.display().to_string()),
        "total": record.total,
        "per_class": record.per_class,
        "boxes": record.boxes.iter().map(|d| json!({
          "x1": d.bbox.x1,
          "y1": d.bbox.y1,
          "x2": d.bbox.x2,
          "y2": d.bbox.y2,
          "conf": d.confidence,
          "label": d.class_name,
        })).collect::<Vec<_>>(),
        "avg_conf": record.avg_conf,
      }),
      ItemOutcome::Failed { image, date, error } => json!({
        "date": date_json(*date),
        "image": image.display().to_string(),
        "error": error,
      }),
    }
  }
}

/// 整个时间序列的结果，顺序与输入一致
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SeriesReport {
  pub items: Vec<ItemOutcome>,
}

impl SeriesReport {
  pub fn records(&self) -> impl Iterator<Item = &SeriesRecord> {
    self.items.iter().filter_map(|item| match item {
      ItemOutcome::Success(record) => Some(record),
      ItemOutcome::Failed { .. } => None,
    })
  }

  pub fn succeeded(&self) -> usize {
    self.records().count()
  }

  pub fn failed(&self) -> usize {
    self.items.len() - self.succeeded()
  }

  pub fn counts(&self) -> Vec<usize> {
    self.records().map(|r| r.total).collect()
  }

  pub fn total(&self) -> usize {
    self.records().map(|r| r.total).sum()
  }

  pub fn per_class(&self) -> BTreeMap<String, usize> {
    let mut totals = BTreeMap::new();
    for (name, count) in self.records().flat_map(|r| r.per_class.iter()) {
      *totals.entry(name.clone()).or_insert(0) += count;
    }
    totals
  }

  pub fn to_json(&self) -> Value {
    json!({
      "items": self.items.iter().map(ItemOutcome::to_json).collect::<Vec<_>>(),
      "total": self.total(),
      "per_class": self.per_class(),
      "succeeded": self.succeeded(),
      "failed": self.failed(),
    })
  }
}

/// `<stem>_annotated.png`，与源图像位于同一目录
pub fn annotated_path(image: &Path) -> PathBuf {
  let stem = image
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_else(|| "image".to_string());
  image.with_file_name(format!("{}_annotated.png", stem))
}

/// 对一组按时间排列的图像逐张检测并统计标签过滤后的目标。
///
/// 单张图像失败只会记录在结果中，不会中断整批处理。
pub struct TimeSeriesTask {
  filter: LabelFilter,
  draw: Option<Draw>,
  workers: usize,
}

impl Default for TimeSeriesTask {
  fn default() -> Self {
    Self {
      filter: LabelFilter::vehicles(),
      draw: Some(Draw::default()),
      workers: 1,
    }
  }
}

impl TimeSeriesTask {
  pub fn with_filter(mut self, filter: LabelFilter) -> Self {
    self.filter = filter;
    self
  }

  /// 为 `None` 时不保存标注图像
  pub fn with_annotation(mut self, draw: Option<Draw>) -> Self {
    self.draw = draw;
    self
  }

  pub fn with_workers(mut self, workers: usize) -> Self {
    self.workers = workers.max(1);
    self
  }

  fn process_item<M, O>(&self, item: &SeriesItem, model: &M, output: &O) -> anyhow::Result<SeriesRecord>
  where
    M: Model<Input = Frame, Output = Prediction>,
    M::Error: std::error::Error + Send + Sync + 'static,
    O: Render<Frame, Prediction>,
    O::Error: std::error::Error + Send + Sync + 'static,
  {
    let frame = load_frame(&item.image)?;
    let prediction = model
      .infer(&frame)
      .with_context(|| format!("推理失败: {}", item.image.display()))?;
    let matched = prediction.filter(&self.filter);

    let annotated_image = match &self.draw {
      Some(draw) => {
        let path = annotated_path(&item.image);
        draw
          .draw_frame(&frame, &matched)
          .save(&path)
          .with_context(|| format!("无法保存标注图像: {}", path.display()))?;
        Some(path)
      }
      None => None,
    };
    output.render_result(&frame, &matched)?;

    info!("{}: 检测到 {} 个目标", item.image.display(), matched.count());

    Ok(SeriesRecord {
      date: item.date,
      image: item.image.clone(),
      annotated_image,
      total: matched.count(),
      per_class: matched.per_class(),
      avg_conf: matched.mean_confidence(),
      boxes: matched.detections,
    })
  }

  fn outcome<M, O>(&self, item: &SeriesItem, model: &M, output: &O) -> ItemOutcome
  where
    M: Model<Input = Frame, Output = Prediction>,
    M::Error: std::error::Error + Send + Sync + 'static,
    O: Render<Frame, Prediction>,
    O::Error: std::error::Error + Send + Sync + 'static,
  {
    match self.process_item(item, model, output) {
      Ok(record) => ItemOutcome::Success(record),
      Err(e) => {
        warn!("处理 {} 失败: {:#}", item.image.display(), e);
        ItemOutcome::Failed {
          image: item.image.clone(),
          date: item.date,
          error: format!("{:#}", e),
        }
      }
    }
  }
}

impl<M, O> Task<Vec<SeriesItem>, &M, &O> for TimeSeriesTask
where
  M: Model<Input = Frame, Output = Prediction> + Sync,
  M::Error: std::error::Error + Send + Sync + 'static,
  O: Render<Frame, Prediction> + Sync,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Output = SeriesReport;
  type Error = anyhow::Error;

  fn run_task(self, items: Vec<SeriesItem>, model: &M, output: &O) -> Result<Self::Output, Self::Error> {
    let workers = self.workers.min(items.len()).max(1);
    info!("开始处理 {} 张图像，工作线程 {} 个", items.len(), workers);

    let outcomes: Vec<ItemOutcome> = if workers == 1 {
      items
        .iter()
        .map(|item| self.outcome(item, model, output))
        .collect()
    } else {
      // 按下标交错分配，结果按原顺序归位
      let task = &self;
      let items = &items;
      let mut indexed = std::thread::scope(|s| {
        let handles = (0..workers)
          .map(|w| {
            s.spawn(move || {
              items
                .iter()
                .enumerate()
                .skip(w)
                .step_by(workers)
                .map(|(idx, item)| (idx, task.outcome(item, model, output)))
                .collect::<Vec<_>>()
            })
          })
          .collect::<Vec<_>>();

        handles
          .into_iter()
          .map(|h| h.join().map_err(|_| anyhow::anyhow!("工作线程异常退出")))
          .collect::<anyhow::Result<Vec<_>>>()
      })?
      .into_iter()
      .flatten()
      .collect::<Vec<_>>();
      indexed.sort_by_key(|(idx, _)| *idx);
      indexed.into_iter().map(|(_, outcome)| outcome).collect()
    };

    let report = SeriesReport { items: outcomes };
    info!(
      "处理完成: 成功 {}，失败 {}，目标总数 {}",
      report.succeeded(),
      report.failed(),
      report.total()
    );
    Ok(report)
  }
}
