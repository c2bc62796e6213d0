//! Shell 配置
//!
//! 默认值 + 可选配置文件 + `MIVC_*` 环境变量覆盖。

use anyhow::{Context, Result};
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Shell 运行配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// 元数据文件名
    pub metadata_file: String,
    /// 命令历史文件路径
    pub history_file: String,
    /// git 可执行文件名
    pub git_binary: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            metadata_file: "medical_metadata.json".to_string(),
            history_file: default_history_file(),
            git_binary: "git".to_string(),
        }
    }
}

fn default_history_file() -> String {
    match std::env::var("HOME") {
        Ok(home) => format!("{}/.mivc_history", home),
        Err(_) => ".mivc_history".to_string(),
    }
}

impl ShellConfig {
    /// 加载配置
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("metadata_file", "medical_metadata.json")?
            .set_default("history_file", default_history_file())?
            .set_default("git_binary", "git")?;

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }

        let settings = builder
            .add_source(Environment::with_prefix("MIVC"))
            .build()?;

        settings.try_deserialize().context("配置解析失败")
    }
}
