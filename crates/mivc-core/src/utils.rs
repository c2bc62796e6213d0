//! 标识符生成工具

use crate::models::MetadataDocument;
use chrono::{DateTime, Utc};

/// 生成原始影像基础ID: `ORIG_<患者ID>_<分钟精度时间戳>`
pub fn original_image_id(patient_id: &str, at: DateTime<Utc>) -> String {
    format!("ORIG_{}_{}", patient_id, at.format("%Y%m%d%H%M"))
}

/// 生成文档内唯一的原始影像ID
///
/// 时间戳精确到分钟，同一患者在同一分钟内重复注册会产生相同的基础ID，
/// 此时追加 `_2`、`_3`…… 序号后缀保证唯一。
pub fn unique_original_id(doc: &MetadataDocument, patient_id: &str, at: DateTime<Utc>) -> String {
    let base = original_image_id(patient_id, at);
    if !doc.original_images.contains_key(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !doc.original_images.contains_key(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// 生成派生版本ID: `SEG_<原始ID>_<序号>`
///
/// 序号为全文档版本总数加一，不是该原始影像名下的版本数（沿用既有编号语义）。
/// 版本从不删除，总数只增，因此序号不会重复。
pub fn version_id(original_id: &str, total_versions: usize) -> String {
    format!("SEG_{}_{}", original_id, total_versions + 1)
}
