//! 体素数据加载
//!
//! 比较引擎只依赖"加载数组 + 形状一致"这一抽象能力；生产实现基于DICOM文件，
//! 测试与演示使用内存实现。

use async_trait::async_trait;
use dicom::core::value::{PrimitiveValue, Value};
use dicom::dictionary_std::tags;
use dicom::object::{open_file, DefaultDicomObject};
use mivc_core::{MivcError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 体素数组及其形状
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelVolume {
    pub rows: usize,
    pub columns: usize,
    pub frames: usize,
    pub samples: Vec<f64>,
}

impl VoxelVolume {
    pub fn new(rows: usize, columns: usize, frames: usize, samples: Vec<f64>) -> Self {
        Self {
            rows,
            columns,
            frames,
            samples,
        }
    }

    /// 形状 (行, 列, 帧)
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.rows, self.columns, self.frames)
    }

    /// 元素总数
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// 体素加载协作方
#[async_trait]
pub trait VolumeLoader: Send + Sync {
    /// 从文件加载体素数组；文件不可读或内容损坏时返回可区分的错误
    async fn load_volume(&self, path: &Path) -> Result<VoxelVolume>;
}

/// 基于DICOM文件的体素加载器
#[derive(Debug, Default)]
pub struct DicomVolumeLoader;

impl DicomVolumeLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VolumeLoader for DicomVolumeLoader {
    async fn load_volume(&self, path: &Path) -> Result<VoxelVolume> {
        let obj = open_file(path).map_err(|e| {
            MivcError::ExternalTool(format!("无法解析DICOM文件 {}: {:?}", path.display(), e))
        })?;

        let rows = integer_element(&obj, tags::ROWS).ok_or_else(|| {
            MivcError::Comparison(format!("{} 缺少 Rows 标签", path.display()))
        })? as usize;
        let columns = integer_element(&obj, tags::COLUMNS).ok_or_else(|| {
            MivcError::Comparison(format!("{} 缺少 Columns 标签", path.display()))
        })? as usize;

        let element = obj.element(tags::PIXEL_DATA).map_err(|_| {
            MivcError::Comparison(format!("{} 不包含像素数据", path.display()))
        })?;
        let samples = match element.value() {
            Value::Primitive(value) => primitive_samples(value),
            // 封装像素数据属于压缩传输语法
            _ => None,
        }
        .ok_or_else(|| {
            MivcError::Comparison(format!(
                "{} 的像素数据编码不受支持（压缩传输语法暂不支持）",
                path.display()
            ))
        })?;

        if rows == 0 || columns == 0 || samples.is_empty() || samples.len() % (rows * columns) != 0 {
            return Err(MivcError::Comparison(format!(
                "{} 的像素数据与图像尺寸不一致",
                path.display()
            )));
        }
        let frames = samples.len() / (rows * columns);

        debug!(
            "已加载体素数据: {} ({}x{}x{})",
            path.display(),
            rows,
            columns,
            frames
        );
        Ok(VoxelVolume::new(rows, columns, frames, samples))
    }
}

/// 读取整数标签值
fn integer_element(obj: &DefaultDicomObject, tag: dicom::core::Tag) -> Option<i64> {
    match obj.element(tag) {
        Ok(element) => match element.value() {
            Value::Primitive(PrimitiveValue::U16(v)) => v.iter().next().map(|&x| x as i64),
            Value::Primitive(PrimitiveValue::I16(v)) => v.iter().next().map(|&x| x as i64),
            Value::Primitive(PrimitiveValue::U32(v)) => v.iter().next().map(|&x| x as i64),
            Value::Primitive(PrimitiveValue::I32(v)) => v.iter().next().map(|&x| x as i64),
            _ => None,
        },
        Err(_) => None,
    }
}

/// 将原生像素值展宽为 f64 数组
fn primitive_samples(value: &PrimitiveValue) -> Option<Vec<f64>> {
    match value {
        PrimitiveValue::U8(v) => Some(v.iter().map(|&x| x as f64).collect()),
        PrimitiveValue::U16(v) => Some(v.iter().map(|&x| x as f64).collect()),
        PrimitiveValue::I16(v) => Some(v.iter().map(|&x| x as f64).collect()),
        PrimitiveValue::U32(v) => Some(v.iter().map(|&x| x as f64).collect()),
        PrimitiveValue::I32(v) => Some(v.iter().map(|&x| x as f64).collect()),
        PrimitiveValue::F32(v) => Some(v.iter().map(|&x| x as f64).collect()),
        PrimitiveValue::F64(v) => Some(v.iter().copied().collect()),
        _ => None,
    }
}

/// 内存体素加载器（测试与演示用）
#[derive(Debug, Default)]
pub struct MemoryVolumeLoader {
    volumes: HashMap<PathBuf, VoxelVolume>,
}

impl MemoryVolumeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置一条路径到体素数据的映射
    pub fn insert(&mut self, path: impl Into<PathBuf>, volume: VoxelVolume) {
        self.volumes.insert(path.into(), volume);
    }
}

#[async_trait]
impl VolumeLoader for MemoryVolumeLoader {
    async fn load_volume(&self, path: &Path) -> Result<VoxelVolume> {
        self.volumes.get(path).cloned().ok_or_else(|| {
            MivcError::ExternalTool(format!("无法读取影像文件: {}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voxel_volume_shape_and_len() {
        let volume = VoxelVolume::new(2, 3, 2, vec![0.0; 12]);
        assert_eq!(volume.shape(), (2, 3, 2));
        assert_eq!(volume.len(), 12);
        assert!(!volume.is_empty());
    }

    #[tokio::test]
    async fn test_memory_loader_returns_preset_volume() {
        let mut loader = MemoryVolumeLoader::new();
        loader.insert("a.dcm", VoxelVolume::new(1, 2, 1, vec![1.0, 2.0]));

        let volume = loader.load_volume(Path::new("a.dcm")).await.unwrap();
        assert_eq!(volume.samples, vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_memory_loader_unknown_path_fails() {
        let loader = MemoryVolumeLoader::new();
        assert!(matches!(
            loader.load_volume(Path::new("missing.dcm")).await,
            Err(MivcError::ExternalTool(_))
        ));
    }

    #[tokio::test]
    async fn test_dicom_loader_rejects_non_dicom_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_dicom.dcm");
        tokio::fs::write(&path, b"definitely not dicom").await.unwrap();

        let loader = DicomVolumeLoader::new();
        assert!(matches!(
            loader.load_volume(&path).await,
            Err(MivcError::ExternalTool(_))
        ));
    }
}
