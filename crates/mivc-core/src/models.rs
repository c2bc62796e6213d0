//! 核心数据模型定义
//!
//! 持久化文档沿用旧版JSON键名 (`original_images`、`derivatives`、`patient_data`、
//! `segmentations`、`versions`，条目内的 `file` 与 `hash`)，旧版工具写出的文件可以直接读取。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 当前磁盘文档格式版本
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// 原始影像记录
///
/// 注册后不再变更，后续更新以新实体表达。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginalImage {
    /// 实体ID；持久化时以映射键为准，旧版文件的条目中没有该字段
    #[serde(default)]
    pub id: String,
    #[serde(rename = "file")]
    pub file_path: String,
    pub patient_id: String,
    /// 检查描述（自由文本）
    pub study_info: String,
    pub timestamp: DateTime<Utc>,
    /// 注册时计算一次的内容哈希，之后不再校验
    #[serde(rename = "hash")]
    pub content_hash: String,
}

/// 派生版本记录（如分割结果）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageVersion {
    #[serde(default)]
    pub id: String,
    /// 所属原始影像，创建后不可改挂
    pub original_id: String,
    #[serde(rename = "file")]
    pub file_path: String,
    /// 创建时从原始影像复制
    pub patient_id: String,
    pub description: String,
    #[serde(default)]
    pub method: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "hash")]
    pub content_hash: String,
}

/// 元数据文档（聚合根），每个工作目录一份
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataDocument {
    /// 磁盘格式版本；旧版文件缺省按 1 读取
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub original_images: HashMap<String, OriginalImage>,
    /// 派生索引：原始影像ID -> 按注册顺序排列的版本ID
    #[serde(default)]
    pub derivatives: HashMap<String, Vec<String>>,
    /// 预留字段
    #[serde(default)]
    pub patient_data: HashMap<String, serde_json::Value>,
    /// 预留字段
    #[serde(default)]
    pub segmentations: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub versions: HashMap<String, ImageVersion>,
}

impl Default for MetadataDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataDocument {
    /// 创建空文档
    pub fn new() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            original_images: HashMap::new(),
            derivatives: HashMap::new(),
            patient_data: HashMap::new(),
            segmentations: HashMap::new(),
            versions: HashMap::new(),
        }
    }

    /// 从映射键回填实体ID
    ///
    /// 旧版文件的条目值中不含 `id` 字段，加载后统一以键为准。
    pub fn assign_ids(&mut self) {
        for (id, image) in self.original_images.iter_mut() {
            image.id = id.clone();
        }
        for (id, version) in self.versions.iter_mut() {
            version.id = id.clone();
        }
    }
}
