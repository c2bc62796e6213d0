//! Git 协作方客户端
//!
//! 核心只依赖"暂存路径"、"内容哈希"与"提交历史"几类抽象操作。
//! 任何失败以 ExternalTool 错误上抛，由调用方决定降级为警告还是终止。

use mivc_core::{MivcError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// 一条提交历史记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitEntry {
    pub short_id: String,
    pub author: String,
    pub relative_time: String,
    pub subject: String,
}

/// Git 客户端
#[derive(Debug, Clone)]
pub struct GitClient {
    work_dir: PathBuf,
    binary: String,
}

impl GitClient {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self::with_binary(work_dir, "git")
    }

    pub fn with_binary(work_dir: impl Into<PathBuf>, binary: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.into(),
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        debug!("执行 {} {}", self.binary, args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .current_dir(&self.work_dir)
            .output()
            .await
            .map_err(|e| MivcError::ExternalTool(format!("无法执行 {}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(MivcError::ExternalTool(format!(
                "{} {} 失败: {}",
                self.binary,
                args.first().unwrap_or(&""),
                stderr
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// 将路径加入暂存区
    pub async fn stage(&self, paths: &[PathBuf]) -> Result<()> {
        let mut args = vec!["add".to_string()];
        args.extend(paths.iter().map(|p| p.display().to_string()));
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&refs).await?;
        Ok(())
    }

    /// 计算文件内容哈希 (`git hash-object`)
    pub async fn content_hash(&self, path: &Path) -> Result<String> {
        let p = path.display().to_string();
        let out = self.run(&["hash-object", p.as_str()]).await?;
        Ok(out.trim().to_string())
    }

    /// 读取提交历史
    pub async fn commit_history(&self) -> Result<Vec<CommitEntry>> {
        let out = self
            .run(&["log", "--pretty=format:%h%x09%an%x09%ar%x09%s"])
            .await?;
        Ok(out.lines().filter_map(parse_history_line).collect())
    }

    /// 仓库根目录（用于提示符展示）
    pub async fn repo_root(&self) -> Result<String> {
        let out = self.run(&["rev-parse", "--show-toplevel"]).await?;
        Ok(out.trim().to_string())
    }

    /// 当前分支名
    pub async fn current_branch(&self) -> Result<String> {
        let out = self.run(&["branch", "--show-current"]).await?;
        Ok(out.trim().to_string())
    }

    /// 原样透传任意子命令，返回标准输出
    pub async fn passthrough(&self, args: &[String]) -> Result<String> {
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&refs).await
    }
}

fn parse_history_line(line: &str) -> Option<CommitEntry> {
    let mut parts = line.splitn(4, '\t');
    Some(CommitEntry {
        short_id: parts.next()?.to_string(),
        author: parts.next()?.to_string(),
        relative_time: parts.next()?.to_string(),
        subject: parts.next().unwrap_or("").to_string(),
    })
}

/// 本地 SHA-256 哈希（git 不可用时内容哈希的兜底方案）
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
