//! 注册服务
//!
//! 协调元数据存储与Git协作方：读取-变更-写回，成功保存后请求暂存变更路径。
//! 暂存失败降级为警告，已落盘的元数据不受影响。

use crate::graph::{self, NewDerivative, NewOriginal, PatientNode};
use chrono::Utc;
use mivc_core::{ImageVersion, MivcError, Result};
use mivc_store::{sha256_hex, GitClient, MetadataStore};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 注册服务
#[derive(Debug, Clone)]
pub struct ProvenanceRegistry {
    store: MetadataStore,
    git: GitClient,
}

impl ProvenanceRegistry {
    pub fn new(store: MetadataStore, git: GitClient) -> Self {
        Self { store, git }
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn git(&self) -> &GitClient {
        &self.git
    }

    /// 注册原始影像
    pub async fn register_original(
        &self,
        file_path: &Path,
        patient_id: &str,
        study_info: &str,
    ) -> Result<String> {
        let content_hash = self.fixity_hash(file_path).await?;

        let mut doc = self.store.load().await?;
        let id = graph::record_original(
            &mut doc,
            NewOriginal {
                file_path: file_path.display().to_string(),
                patient_id: patient_id.to_string(),
                study_info: study_info.to_string(),
                timestamp: Utc::now(),
                content_hash,
            },
        )?;
        self.store.save(&doc).await?;
        self.stage_for_history(&[file_path.to_path_buf(), self.store.metadata_path()])
            .await;

        info!("原始影像已注册: {}", id);
        Ok(id)
    }

    /// 注册派生版本
    pub async fn register_derivative(
        &self,
        original_id: &str,
        file_path: &Path,
        description: &str,
        method: &str,
    ) -> Result<String> {
        let content_hash = self.fixity_hash(file_path).await?;

        let mut doc = self.store.load().await?;
        let id = graph::record_derivative(
            &mut doc,
            original_id,
            NewDerivative {
                file_path: file_path.display().to_string(),
                description: description.to_string(),
                method: method.to_string(),
                timestamp: Utc::now(),
                content_hash,
            },
        )?;
        self.store.save(&doc).await?;
        self.stage_for_history(&[file_path.to_path_buf(), self.store.metadata_path()])
            .await;

        info!("派生版本已注册: {} (来源 {})", id, original_id);
        Ok(id)
    }

    /// 列出某原始影像的全部派生版本
    pub async fn list_derivatives(&self, original_id: &str) -> Result<Vec<ImageVersion>> {
        let doc = self.store.load().await?;
        graph::derivatives_of(&doc, original_id)
    }

    /// 构建患者版本树
    pub async fn patient_tree(&self, patient_id: &str) -> Result<Vec<PatientNode>> {
        let doc = self.store.load().await?;
        Ok(graph::patient_tree(&doc, patient_id))
    }

    /// 计算登记用内容哈希
    ///
    /// 文件缺失立即失败；git 不可用时降级为本地 SHA-256 并告警，
    /// 内容哈希只是尽力而为的防篡改标记。
    async fn fixity_hash(&self, path: &Path) -> Result<String> {
        if !tokio::fs::try_exists(path).await? {
            return Err(MivcError::FileNotFound(path.display().to_string()));
        }
        match self.git.content_hash(path).await {
            Ok(hash) => Ok(hash),
            Err(e) => {
                warn!("git hash-object 不可用, 使用本地哈希: {}", e);
                let data = tokio::fs::read(path).await?;
                Ok(sha256_hex(&data))
            }
        }
    }

    /// 保存成功后请求暂存变更路径；失败仅告警
    async fn stage_for_history(&self, paths: &[PathBuf]) {
        if let Err(e) = self.git.stage(paths).await {
            warn!("暂存失败 (元数据已保存): {}", e);
        }
    }
}
