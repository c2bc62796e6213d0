//! 版本比较引擎
//!
//! 将两个版本ID解析为体素数组，逐元素统计差异并生成相似度报告。

use crate::volume::{VolumeLoader, VoxelVolume};
use chrono::{DateTime, Utc};
use mivc_core::{ImageVersion, MetadataDocument, MivcError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// 参与比较的版本摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionSummary {
    pub id: String,
    pub patient_id: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&ImageVersion> for VersionSummary {
    fn from(version: &ImageVersion) -> Self {
        Self {
            id: version.id.clone(),
            patient_id: version.patient_id.clone(),
            description: version.description.clone(),
            timestamp: version.timestamp,
        }
    }
}

/// 相似度报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub version1: VersionSummary,
    pub version2: VersionSummary,
    pub differing_voxels: u64,
    pub total_voxels: u64,
    pub similarity: f64,
}

impl ComparisonReport {
    /// 渲染为文本报告
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "版本比较: {} 与 {}\n",
            self.version1.id, self.version2.id
        ));
        out.push_str(&format!("{}\n", "-".repeat(30)));
        out.push_str(&format!(
            "差异体素: {} / {}\n",
            self.differing_voxels, self.total_voxels
        ));
        out.push_str(&format!("相似度: {:.2}%\n", self.similarity * 100.0));
        for summary in [&self.version1, &self.version2] {
            out.push_str(&format!("\n{} 元数据:\n", summary.id));
            out.push_str(&format!("- 患者: {}\n", summary.patient_id));
            out.push_str(&format!("- 描述: {}\n", summary.description));
            out.push_str(&format!("- 日期: {}\n", summary.timestamp.to_rfc3339()));
        }
        out
    }
}

/// 比较引擎
pub struct ComparisonEngine {
    loader: Box<dyn VolumeLoader>,
}

impl ComparisonEngine {
    pub fn new(loader: Box<dyn VolumeLoader>) -> Self {
        Self { loader }
    }

    /// 比较两个版本的体素数据
    pub async fn compare(
        &self,
        doc: &MetadataDocument,
        version1_id: &str,
        version2_id: &str,
    ) -> Result<ComparisonReport> {
        // 两个ID各自独立校验，报错时指明缺失的一方
        let v1 = lookup(doc, version1_id)?;
        let v2 = lookup(doc, version2_id)?;

        let volume1 = self.loader.load_volume(Path::new(&v1.file_path)).await?;
        let volume2 = self.loader.load_volume(Path::new(&v2.file_path)).await?;
        ensure_comparable(version1_id, &volume1, version2_id, &volume2)?;

        let differing = volume1
            .samples
            .iter()
            .zip(volume2.samples.iter())
            .filter(|(a, b)| a != b)
            .count() as u64;
        let total = volume1.len() as u64;
        let similarity = 1.0 - differing as f64 / total as f64;

        info!(
            "版本比较完成: {} vs {} 相似度 {:.4}",
            version1_id, version2_id, similarity
        );

        Ok(ComparisonReport {
            version1: VersionSummary::from(v1),
            version2: VersionSummary::from(v2),
            differing_voxels: differing,
            total_voxels: total,
            similarity,
        })
    }

    /// 比较并将文本报告写入可选输出文件
    ///
    /// 写入失败仅告警，报告仍然返回给调用方。
    pub async fn compare_to_file(
        &self,
        doc: &MetadataDocument,
        version1_id: &str,
        version2_id: &str,
        output: Option<&Path>,
    ) -> Result<ComparisonReport> {
        let report = self.compare(doc, version1_id, version2_id).await?;
        if let Some(path) = output {
            match tokio::fs::write(path, report.render()).await {
                Ok(()) => info!("比较报告已写入 {}", path.display()),
                Err(e) => warn!("比较报告写入 {} 失败: {}", path.display(), e),
            }
        }
        Ok(report)
    }
}

fn lookup<'a>(doc: &'a MetadataDocument, version_id: &str) -> Result<&'a ImageVersion> {
    doc.versions
        .get(version_id)
        .ok_or_else(|| MivcError::NotFound(format!("版本ID {} 不存在", version_id)))
}

fn ensure_comparable(
    id1: &str,
    volume1: &VoxelVolume,
    id2: &str,
    volume2: &VoxelVolume,
) -> Result<()> {
    if volume1.shape() != volume2.shape() {
        return Err(MivcError::Comparison(format!(
            "形状不一致: {} 为 {:?}, {} 为 {:?}",
            id1,
            volume1.shape(),
            id2,
            volume2.shape()
        )));
    }
    if volume1.is_empty() {
        return Err(MivcError::Comparison(format!(
            "{} 与 {} 的像素数据为空",
            id1, id2
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{self, NewDerivative, NewOriginal};
    use crate::volume::MemoryVolumeLoader;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    /// 两个版本 (指向 seg1.dcm / seg2.dcm) 的测试文档
    fn sample_doc() -> (MetadataDocument, String, String) {
        let mut doc = MetadataDocument::new();
        let original_id = graph::record_original(
            &mut doc,
            NewOriginal {
                file_path: "scan.dcm".to_string(),
                patient_id: "P1".to_string(),
                study_info: "CT".to_string(),
                timestamp: at(),
                content_hash: "abc".to_string(),
            },
        )
        .unwrap();
        let v1 = graph::record_derivative(
            &mut doc,
            &original_id,
            NewDerivative {
                file_path: "seg1.dcm".to_string(),
                description: "肝脏分割".to_string(),
                method: "unet".to_string(),
                timestamp: at(),
                content_hash: "d1".to_string(),
            },
        )
        .unwrap();
        let v2 = graph::record_derivative(
            &mut doc,
            &original_id,
            NewDerivative {
                file_path: "seg2.dcm".to_string(),
                description: "肝脏分割(修订)".to_string(),
                method: "manual".to_string(),
                timestamp: at(),
                content_hash: "d2".to_string(),
            },
        )
        .unwrap();
        (doc, v1, v2)
    }

    fn engine_with(volumes: &[(&str, VoxelVolume)]) -> ComparisonEngine {
        let mut loader = MemoryVolumeLoader::new();
        for (path, volume) in volumes {
            loader.insert(*path, volume.clone());
        }
        ComparisonEngine::new(Box::new(loader))
    }

    #[tokio::test]
    async fn test_compare_checks_each_id_independently() {
        let (doc, v1, _) = sample_doc();
        let engine = engine_with(&[]);

        let err = engine.compare(&doc, "SEG_MISSING_1", &v1).await.unwrap_err();
        match err {
            MivcError::NotFound(msg) => assert!(msg.contains("SEG_MISSING_1")),
            other => panic!("意外错误: {:?}", other),
        }

        let err = engine.compare(&doc, &v1, "SEG_MISSING_2").await.unwrap_err();
        match err {
            MivcError::NotFound(msg) => assert!(msg.contains("SEG_MISSING_2")),
            other => panic!("意外错误: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_compare_self_similarity_is_one() {
        let (doc, v1, _) = sample_doc();
        let engine = engine_with(&[("seg1.dcm", VoxelVolume::new(2, 2, 1, vec![0.0, 1.0, 1.0, 0.0]))]);

        let report = engine.compare(&doc, &v1, &v1).await.unwrap();
        assert_eq!(report.differing_voxels, 0);
        assert_eq!(report.total_voxels, 4);
        assert_eq!(report.similarity, 1.0);
    }

    #[tokio::test]
    async fn test_compare_counts_differing_voxels() {
        let (doc, v1, v2) = sample_doc();
        let engine = engine_with(&[
            ("seg1.dcm", VoxelVolume::new(2, 2, 1, vec![0.0, 1.0, 1.0, 0.0])),
            ("seg2.dcm", VoxelVolume::new(2, 2, 1, vec![0.0, 1.0, 0.0, 0.0])),
        ]);

        let report = engine.compare(&doc, &v1, &v2).await.unwrap();
        assert_eq!(report.differing_voxels, 1);
        assert_eq!(report.total_voxels, 4);
        assert!((report.similarity - 0.75).abs() < f64::EPSILON);
        assert_eq!(report.version1.patient_id, "P1");
    }

    #[tokio::test]
    async fn test_compare_shape_mismatch_fails() {
        let (doc, v1, v2) = sample_doc();
        let engine = engine_with(&[
            ("seg1.dcm", VoxelVolume::new(2, 2, 1, vec![0.0; 4])),
            ("seg2.dcm", VoxelVolume::new(2, 3, 1, vec![0.0; 6])),
        ]);

        assert!(matches!(
            engine.compare(&doc, &v1, &v2).await,
            Err(MivcError::Comparison(_))
        ));
    }

    #[tokio::test]
    async fn test_compare_to_file_writes_report() {
        let (doc, v1, v2) = sample_doc();
        let engine = engine_with(&[
            ("seg1.dcm", VoxelVolume::new(2, 2, 1, vec![0.0, 1.0, 1.0, 0.0])),
            ("seg2.dcm", VoxelVolume::new(2, 2, 1, vec![0.0, 1.0, 0.0, 0.0])),
        ]);

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("report.txt");
        let report = engine
            .compare_to_file(&doc, &v1, &v2, Some(&output))
            .await
            .unwrap();

        let written = tokio::fs::read_to_string(&output).await.unwrap();
        assert_eq!(written, report.render());
        assert!(written.contains(&v1));
        assert!(written.contains("相似度"));
    }

    #[tokio::test]
    async fn test_compare_to_file_write_failure_is_not_fatal() {
        let (doc, v1, v2) = sample_doc();
        let engine = engine_with(&[
            ("seg1.dcm", VoxelVolume::new(1, 1, 1, vec![1.0])),
            ("seg2.dcm", VoxelVolume::new(1, 1, 1, vec![1.0])),
        ]);

        // 输出路径指向不存在的目录, 写入失败但比较结果仍然返回
        let output = Path::new("/nonexistent-dir/report.txt");
        let report = engine
            .compare_to_file(&doc, &v1, &v2, Some(output))
            .await
            .unwrap();
        assert_eq!(report.similarity, 1.0);
    }
}
