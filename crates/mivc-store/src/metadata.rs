//! 元数据文档存取
//!
//! 每次操作读入完整文档，变更后整体写回；写入先落临时文件再原子重命名，
//! 不会留下写到一半的文档。

use mivc_core::{MetadataDocument, MivcError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 元数据存储
#[derive(Debug, Clone)]
pub struct MetadataStore {
    work_dir: PathBuf,
    file_name: String,
}

impl MetadataStore {
    pub fn new(work_dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.into(),
            file_name: file_name.into(),
        }
    }

    /// 元数据文件完整路径
    pub fn metadata_path(&self) -> PathBuf {
        self.work_dir.join(&self.file_name)
    }

    /// 工作目录
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// 首次使用工作目录时创建空文档，返回是否发生了初始化
    pub async fn ensure_initialized(&self) -> Result<bool> {
        let path = self.metadata_path();
        if tokio::fs::try_exists(&path).await? {
            return Ok(false);
        }
        self.save(&MetadataDocument::new()).await?;
        info!("已初始化元数据文件: {}", path.display());
        Ok(true)
    }

    /// 读取完整文档；文件不存在时返回 NotFound
    pub async fn load(&self) -> Result<MetadataDocument> {
        let path = self.metadata_path();
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MivcError::NotFound(format!(
                    "元数据文件不存在: {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        let mut doc: MetadataDocument = serde_json::from_slice(&data)?;
        doc.assign_ids();
        debug!(
            "已加载元数据: {} 个原始影像, {} 个版本",
            doc.original_images.len(),
            doc.versions.len()
        );
        Ok(doc)
    }

    /// 整体写回文档
    pub async fn save(&self, doc: &MetadataDocument) -> Result<()> {
        let path = self.metadata_path();
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(doc)?;
        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("已保存元数据: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mivc_core::{ImageVersion, OriginalImage};

    const FILE_NAME: &str = "medical_metadata.json";

    fn sample_doc() -> MetadataDocument {
        let mut doc = MetadataDocument::new();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        doc.original_images.insert(
            "ORIG_P1_202401011200".to_string(),
            OriginalImage {
                id: "ORIG_P1_202401011200".to_string(),
                file_path: "a.dcm".to_string(),
                patient_id: "P1".to_string(),
                study_info: "腹部CT".to_string(),
                timestamp: at,
                content_hash: "abc".to_string(),
            },
        );
        doc.derivatives.insert(
            "ORIG_P1_202401011200".to_string(),
            vec!["SEG_ORIG_P1_202401011200_1".to_string()],
        );
        doc.versions.insert(
            "SEG_ORIG_P1_202401011200_1".to_string(),
            ImageVersion {
                id: "SEG_ORIG_P1_202401011200_1".to_string(),
                original_id: "ORIG_P1_202401011200".to_string(),
                file_path: "a_seg.dcm".to_string(),
                patient_id: "P1".to_string(),
                description: "肝脏分割".to_string(),
                method: "unet".to_string(),
                timestamp: at,
                content_hash: "def".to_string(),
            },
        );
        doc
    }

    #[tokio::test]
    async fn test_ensure_initialized_creates_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path(), FILE_NAME);

        assert!(store.ensure_initialized().await.unwrap());
        // 第二次调用不再初始化
        assert!(!store.ensure_initialized().await.unwrap());

        let raw = tokio::fs::read_to_string(store.metadata_path()).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        for key in ["original_images", "derivatives", "patient_data", "segmentations", "versions"] {
            assert!(value.get(key).is_some(), "缺少键 {}", key);
        }
    }

    #[tokio::test]
    async fn test_load_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path(), FILE_NAME);
        assert!(matches!(store.load().await, Err(MivcError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_save_load_round_trip_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path(), FILE_NAME);

        store.save(&sample_doc()).await.unwrap();
        let first = store.load().await.unwrap();
        store.save(&first).await.unwrap();
        let second = store.load().await.unwrap();

        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path(), FILE_NAME);
        store.save(&sample_doc()).await.unwrap();

        let tmp = store.metadata_path().with_extension("json.tmp");
        assert!(!tokio::fs::try_exists(&tmp).await.unwrap());
        assert!(tokio::fs::try_exists(store.metadata_path()).await.unwrap());
    }

    #[tokio::test]
    async fn test_legacy_document_loads_and_derives_ids() {
        // 旧版文件: 条目值中无 id 字段, 顶层无 schema_version
        let legacy = r#"{
            "original_images": {
                "ORIG_P1_202401011200": {
                    "file": "a.nii",
                    "patient_id": "P1",
                    "study_info": "CT abdomen",
                    "timestamp": "2024-01-01T12:00:00Z",
                    "hash": "abc"
                }
            },
            "derivatives": {},
            "patient_data": {},
            "segmentations": {},
            "versions": {}
        }"#;

        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path(), FILE_NAME);
        tokio::fs::write(store.metadata_path(), legacy).await.unwrap();

        let doc = store.load().await.unwrap();
        assert_eq!(doc.schema_version, 1);
        let image = &doc.original_images["ORIG_P1_202401011200"];
        assert_eq!(image.id, "ORIG_P1_202401011200");
        assert_eq!(image.file_path, "a.nii");
        assert_eq!(image.content_hash, "abc");
    }
}
