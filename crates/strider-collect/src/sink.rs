//! 数据集落盘
//!
//! 固定模式的追加写 CSV。一条样本记录对应一个完成的周期，写入后
//! 永不改写（append-only）。列顺序固定，缺数据的字段写空（哨兵），
//! 与数值 0 严格区分。
//!
//! 与旧式「重建文件只写表头」的引导脚本不同，这里的引导是幂等的：
//! 文件已存在时拒绝覆盖，不会截断已积累的数据。

use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 数据集表头（精确的字段顺序）
pub const DATASET_HEADER: [&str; 9] = [
    "Episode",
    "Timestamp",
    "Position_Shank",
    "Position_Thigh",
    "Velocity_Shank",
    "Velocity_Thigh",
    "Torque_Shank",
    "Torque_Thigh",
    "Force",
];

/// 数据集错误类型
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Dataset IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dataset CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Dataset already exists, refusing to truncate: {path}")]
    AlreadyExists { path: PathBuf },
}

/// 一条样本记录（持久化单元）
///
/// 字段顺序与 `DATASET_HEADER` 一致。`None` 序列化为空字段，表示
/// 「本周期无数据」。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRecord {
    /// 数据集标签（整次运行不变）
    pub episode: String,
    /// 自回路启动的经过时间（秒，单调不减）
    pub timestamp: f64,
    pub position_shank: Option<f64>,
    pub position_thigh: Option<f64>,
    pub velocity_shank: Option<f64>,
    pub velocity_thigh: Option<f64>,
    pub torque_shank: Option<f64>,
    pub torque_thigh: Option<f64>,
    /// 最近一条力传感器读数（从未收到过则为 `None`）
    pub force: Option<String>,
}

/// 追加写数据集
///
/// 文件句柄由周期编排器独占，每周期严格写一行。
pub struct DatasetSink {
    writer: csv::Writer<std::fs::File>,
    path: PathBuf,
    rows_written: u64,
}

impl DatasetSink {
    /// 打开数据集：文件不存在（或为空）时先写表头，否则纯追加
    ///
    /// 表头只在文件为空时写一次；重复打开既有数据集不会破坏已有行。
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

        if needs_header {
            writer.write_record(DATASET_HEADER)?;
            writer.flush()?;
        }

        Ok(Self {
            writer,
            path,
            rows_written: 0,
        })
    }

    /// 只创建带表头的空数据集（幂等引导）
    ///
    /// # 错误
    /// - `SinkError::AlreadyExists`: 文件已存在——拒绝截断
    pub fn bootstrap(path: impl AsRef<Path>) -> Result<(), SinkError> {
        let path = path.as_ref();
        if path.exists() {
            return Err(SinkError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }

        let file = OpenOptions::new().create_new(true).write(true).open(path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(DATASET_HEADER)?;
        writer.flush()?;
        Ok(())
    }

    /// 追加一条样本记录并落盘
    ///
    /// 写失败是致命的（有丢数据风险），错误向上传播终止运行。
    pub fn append(&mut self, record: &SampleRecord) -> Result<(), SinkError> {
        self.writer.serialize(record)?;
        self.writer.flush()?;
        self.rows_written += 1;
        Ok(())
    }

    /// 本次运行已写入的数据行数（不含表头）
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// 数据集路径
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for DatasetSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetSink")
            .field("path", &self.path)
            .field("rows_written", &self.rows_written)
            .finish()
    }
}
