//! 派生关系图操作
//!
//! 全部操作显式接收文档值，不做任何IO；读取-变更-写回序列由调用方负责，
//! 测试可以直接在内存文档上运行。

use chrono::{DateTime, Utc};
use mivc_core::{utils, ImageVersion, MetadataDocument, MivcError, OriginalImage, Result};
use serde::{Deserialize, Serialize};

/// 待注册的原始影像
#[derive(Debug, Clone)]
pub struct NewOriginal {
    pub file_path: String,
    pub patient_id: String,
    pub study_info: String,
    pub timestamp: DateTime<Utc>,
    pub content_hash: String,
}

/// 待注册的派生版本
#[derive(Debug, Clone)]
pub struct NewDerivative {
    pub file_path: String,
    pub description: String,
    pub method: String,
    pub timestamp: DateTime<Utc>,
    pub content_hash: String,
}

/// 患者版本树节点：原始影像及其按注册顺序排列的派生版本
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientNode {
    pub original: OriginalImage,
    pub derivatives: Vec<ImageVersion>,
}

/// 注册原始影像，返回新ID
pub fn record_original(doc: &mut MetadataDocument, new: NewOriginal) -> Result<String> {
    if new.patient_id.trim().is_empty() {
        return Err(MivcError::Validation("患者ID不能为空".to_string()));
    }

    let id = utils::unique_original_id(doc, &new.patient_id, new.timestamp);
    let image = OriginalImage {
        id: id.clone(),
        file_path: new.file_path,
        patient_id: new.patient_id,
        study_info: new.study_info,
        timestamp: new.timestamp,
        content_hash: new.content_hash,
    };
    doc.original_images.insert(id.clone(), image);
    Ok(id)
}

/// 注册派生版本并追加到派生索引，返回新ID
pub fn record_derivative(
    doc: &mut MetadataDocument,
    original_id: &str,
    new: NewDerivative,
) -> Result<String> {
    // 患者ID始终从父影像复制，不接受外部指定
    let patient_id = doc
        .original_images
        .get(original_id)
        .ok_or_else(|| MivcError::NotFound(format!("原始影像ID {} 不存在", original_id)))?
        .patient_id
        .clone();

    let id = utils::version_id(original_id, doc.versions.len());
    let version = ImageVersion {
        id: id.clone(),
        original_id: original_id.to_string(),
        file_path: new.file_path,
        patient_id,
        description: new.description,
        method: new.method,
        timestamp: new.timestamp,
        content_hash: new.content_hash,
    };

    doc.derivatives
        .entry(original_id.to_string())
        .or_default()
        .push(id.clone());
    doc.versions.insert(id.clone(), version);
    Ok(id)
}

/// 列出某原始影像的全部派生版本（注册顺序）
///
/// 没有记录时返回空序列；原始影像本身未知时返回 NotFound。
pub fn derivatives_of(doc: &MetadataDocument, original_id: &str) -> Result<Vec<ImageVersion>> {
    if !doc.original_images.contains_key(original_id) {
        return Err(MivcError::NotFound(format!("原始影像ID {} 不存在", original_id)));
    }
    let ids = doc.derivatives.get(original_id).cloned().unwrap_or_default();
    ids.iter()
        .map(|vid| {
            doc.versions.get(vid).cloned().ok_or_else(|| {
                MivcError::Validation(format!("派生索引引用了不存在的版本 {}", vid))
            })
        })
        .collect()
}

/// 构建患者版本树：按注册时间排序的原始影像，各自携带派生版本列表
///
/// 未知患者返回空序列，不报错。
pub fn patient_tree(doc: &MetadataDocument, patient_id: &str) -> Vec<PatientNode> {
    let mut originals: Vec<&OriginalImage> = doc
        .original_images
        .values()
        .filter(|image| image.patient_id == patient_id)
        .collect();
    originals.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

    originals
        .into_iter()
        .map(|original| {
            let derivatives = doc
                .derivatives
                .get(&original.id)
                .map(|ids| ids.iter().filter_map(|vid| doc.versions.get(vid).cloned()).collect())
                .unwrap_or_default();
            PatientNode {
                original: original.clone(),
                derivatives,
            }
        })
        .collect()
}

/// 校验文档不变量
pub fn validate(doc: &MetadataDocument) -> Result<()> {
    for (id, version) in &doc.versions {
        let parent = doc.original_images.get(&version.original_id).ok_or_else(|| {
            MivcError::Validation(format!(
                "版本 {} 引用了不存在的原始影像 {}",
                id, version.original_id
            ))
        })?;
        if version.patient_id != parent.patient_id {
            return Err(MivcError::Validation(format!(
                "版本 {} 的患者ID与其原始影像不一致",
                id
            )));
        }
    }
    for (original_id, ids) in &doc.derivatives {
        if !doc.original_images.contains_key(original_id) {
            return Err(MivcError::Validation(format!(
                "派生索引包含不存在的原始影像 {}",
                original_id
            )));
        }
        for vid in ids {
            if !doc.versions.contains_key(vid) {
                return Err(MivcError::Validation(format!(
                    "派生索引引用了不存在的版本 {}",
                    vid
                )));
            }
        }
    }
    Ok(())
}
