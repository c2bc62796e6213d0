//! 交互式 Shell
//!
//! 医学影像版本管理的命令行前端：命令分发、历史记录、补全与 git 透传。

use crate::config::ShellConfig;
use colored::Colorize;
use mivc_core::{MivcError, Result as MivcResult};
use mivc_provenance::{graph, ComparisonEngine, DicomVolumeLoader, ProvenanceRegistry};
use mivc_store::{GitClient, MetadataStore};
use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 可补全的命令列表
const COMPLETABLE_COMMANDS: &[&str] = &[
    "init",
    "status",
    "log",
    "diff",
    "commit",
    "add",
    "compare",
    "history",
    "help",
    "register-original",
    "register-derivative",
    "show-derivatives",
    "show-patient-tree",
    "cd",
    "exit",
    "quit",
];

/// rustyline 辅助器：只补全行首的命令名
struct ShellHelper;

impl Completer for ShellHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let prefix = &line[..pos];
        if prefix.contains(char::is_whitespace) {
            return Ok((pos, vec![]));
        }
        let options = COMPLETABLE_COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(prefix))
            .map(|cmd| cmd.to_string())
            .collect();
        Ok((0, options))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}
impl Validator for ShellHelper {}
impl Helper for ShellHelper {}

/// 交互式 Shell
pub struct MedicalShell {
    config: ShellConfig,
    work_dir: PathBuf,
    store: MetadataStore,
    git: GitClient,
    registry: ProvenanceRegistry,
    engine: ComparisonEngine,
}

impl MedicalShell {
    pub fn new(work_dir: PathBuf, config: ShellConfig) -> Self {
        let store = MetadataStore::new(&work_dir, config.metadata_file.as_str());
        let git = GitClient::with_binary(&work_dir, config.git_binary.as_str());
        let registry = ProvenanceRegistry::new(store.clone(), git.clone());
        let engine = ComparisonEngine::new(Box::new(DicomVolumeLoader::new()));
        Self {
            config,
            work_dir,
            store,
            git,
            registry,
            engine,
        }
    }

    /// 首次使用工作目录时初始化元数据文件并暂存
    pub async fn ensure_initialized(&self) -> MivcResult<()> {
        if self.store.ensure_initialized().await? {
            if let Err(e) = self.git.stage(&[self.store.metadata_path()]).await {
                warn!("新建元数据文件暂存失败: {}", e);
            }
        }
        Ok(())
    }

    /// 主循环
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut editor: Editor<ShellHelper, DefaultHistory> = Editor::new()?;
        editor.set_helper(Some(ShellHelper));
        if editor.load_history(&self.config.history_file).is_err() {
            debug!("历史文件不存在, 将在退出时创建");
        }

        println!("医学影像版本管理交互式 Shell");
        println!("输入 'help' 查看可用命令, 'exit' 或 'quit' 退出\n");

        loop {
            let prompt = self.prompt().await;
            match editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = editor.add_history_entry(&line);

                    if matches!(line.to_lowercase().as_str(), "exit" | "quit") {
                        println!("退出医学影像版本管理 Shell...");
                        break;
                    }
                    self.dispatch(&line).await;
                }
                Err(ReadlineError::Interrupted) => {
                    println!("使用 'exit' 或 'quit' 退出");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("退出...");
                    break;
                }
                Err(e) => {
                    println!("{}", format!("读取输入失败: {}", e).red());
                    break;
                }
            }
        }

        if let Err(e) = editor.save_history(&self.config.history_file) {
            warn!("无法保存命令历史: {}", e);
        }
        Ok(())
    }

    /// 绘制提示符：仓库名:分支，不在仓库内时回退展示当前目录
    async fn prompt(&self) -> String {
        match (self.git.repo_root().await, self.git.current_branch().await) {
            (Ok(root), Ok(branch)) => {
                let name = Path::new(&root)
                    .file_name()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| root.clone());
                format!("{}:{} (mivc) $ ", name.green(), branch.blue())
            }
            _ => format!("{} (无仓库) $ ", self.work_dir.display().to_string().red()),
        }
    }

    /// 解析并执行一行命令
    async fn dispatch(&mut self, line: &str) {
        let parts = tokenize(line);
        if parts.is_empty() {
            return;
        }
        let cmd = parts[0].to_lowercase();

        let result = match cmd.as_str() {
            "register-original" => self.cmd_register_original(&parts).await,
            "register-derivative" => self.cmd_register_derivative(&parts).await,
            "compare" => self.cmd_compare(&parts).await,
            "show-derivatives" => self.cmd_show_derivatives(&parts).await,
            "show-patient-tree" => self.cmd_show_patient_tree(&parts).await,
            "history" => self.cmd_history().await,
            "help" => {
                print_help();
                Ok(())
            }
            "cd" => self.cmd_change_directory(&parts).await,
            // 'git <命令>' 前缀形式
            "git" => self.cmd_git(&parts[1..]).await,
            // 未识别命令原样透传给 git
            _ => self.cmd_git(&parts).await,
        };

        if let Err(e) = result {
            println!("{}", format!("错误: {}", e).red());
        }
    }

    async fn cmd_register_original(&self, parts: &[String]) -> MivcResult<()> {
        if parts.len() < 4 {
            println!("用法: register-original <image_file> <patient_id> \"<study_info>\"");
            return Ok(());
        }
        let study_info = parts[3..].join(" ");
        let id = self
            .registry
            .register_original(Path::new(&parts[1]), &parts[2], &study_info)
            .await?;
        println!("{}", format!("原始影像已注册为 {}", id).green());
        Ok(())
    }

    async fn cmd_register_derivative(&self, parts: &[String]) -> MivcResult<()> {
        if parts.len() < 4 {
            println!(
                "用法: register-derivative <original_id> <segmentation_file> \"<description>\" [method]"
            );
            return Ok(());
        }
        let method = parts.get(4).cloned().unwrap_or_default();
        let id = self
            .registry
            .register_derivative(&parts[1], Path::new(&parts[2]), &parts[3], &method)
            .await?;
        println!(
            "{}",
            format!("分割结果已注册为 {}, 派生自 {}", id, parts[1]).green()
        );
        Ok(())
    }

    async fn cmd_compare(&self, parts: &[String]) -> MivcResult<()> {
        if parts.len() < 3 {
            println!("用法: compare <version1> <version2> [output_file]");
            return Ok(());
        }
        let doc = self.store.load().await?;
        let output = parts.get(3).map(Path::new);
        let report = self
            .engine
            .compare_to_file(&doc, &parts[1], &parts[2], output)
            .await?;
        println!("\n{}", report.render());
        Ok(())
    }

    async fn cmd_show_derivatives(&self, parts: &[String]) -> MivcResult<()> {
        if parts.len() < 2 {
            println!("用法: show-derivatives <original_id>");
            return Ok(());
        }
        let doc = self.store.load().await?;
        let original = doc.original_images.get(&parts[1]).ok_or_else(|| {
            MivcError::NotFound(format!("原始影像ID {} 不存在", parts[1]))
        })?;

        println!("\n原始影像: {}", original.id);
        println!("文件: {}", original.file_path);
        println!("患者: {}", original.patient_id);
        println!("派生分割结果:");
        println!("{}", "-".repeat(50));

        let derivatives = graph::derivatives_of(&doc, &parts[1])?;
        if derivatives.is_empty() {
            println!("该影像暂无已注册的分割结果");
            return Ok(());
        }
        for version in derivatives {
            println!("ID: {}", version.id);
            println!("文件: {}", version.file_path);
            println!(
                "方法: {}",
                if version.method.is_empty() { "N/A" } else { version.method.as_str() }
            );
            println!("描述: {}", version.description);
            println!("日期: {}", version.timestamp.to_rfc3339());
            println!("{}", "-".repeat(50));
        }
        Ok(())
    }

    async fn cmd_show_patient_tree(&self, parts: &[String]) -> MivcResult<()> {
        if parts.len() < 2 {
            println!("用法: show-patient-tree <patient_id>");
            return Ok(());
        }
        let doc = self.store.load().await?;

        println!("\n患者 {} 的版本树:", parts[1]);
        println!("{}", "=".repeat(60));

        let tree = graph::patient_tree(&doc, &parts[1]);
        if tree.is_empty() {
            println!("未找到该患者的原始影像");
            return Ok(());
        }
        for node in tree {
            println!("\n原始影像: {}", node.original.id);
            println!("检查: {}", node.original.study_info);
            println!("文件: {}", node.original.file_path);
            println!("日期: {}", node.original.timestamp.to_rfc3339());

            if node.derivatives.is_empty() {
                println!("\n  暂无派生分割结果");
            } else {
                println!("\n  派生分割结果:");
                for version in &node.derivatives {
                    println!("  - {}: {}", version.id, version.description);
                    println!(
                        "    方法: {}",
                        if version.method.is_empty() { "N/A" } else { version.method.as_str() }
                    );
                    println!("    文件: {}", version.file_path);
                }
            }
            println!("{}", "-".repeat(50));
        }
        Ok(())
    }

    async fn cmd_history(&self) -> MivcResult<()> {
        let log = self.git.commit_history().await?;
        println!("\n提交历史:");
        for entry in &log {
            println!(
                "{} - {}, {} : {}",
                entry.short_id, entry.author, entry.relative_time, entry.subject
            );
        }

        let doc = self.store.load().await?;
        println!("\n已注册版本:");
        let mut versions: Vec<_> = doc.versions.values().collect();
        versions.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        for version in versions {
            println!("{}: {} - {}", version.id, version.patient_id, version.description);
        }
        Ok(())
    }

    async fn cmd_change_directory(&mut self, parts: &[String]) -> MivcResult<()> {
        let Some(target) = parts.get(1) else {
            println!("当前目录: {}", self.work_dir.display());
            return Ok(());
        };
        std::env::set_current_dir(target)
            .map_err(|e| MivcError::FileNotFound(format!("{}: {}", target, e)))?;
        self.work_dir = std::env::current_dir()?;
        self.rebind();
        // 新目录首次使用时同样初始化元数据文件
        self.ensure_initialized().await?;
        Ok(())
    }

    async fn cmd_git(&self, args: &[String]) -> MivcResult<()> {
        let out = self.git.passthrough(args).await?;
        let out = out.trim();
        if !out.is_empty() {
            println!("{}", out);
        }
        Ok(())
    }

    /// 切换目录后重建与目录绑定的组件
    fn rebind(&mut self) {
        self.store = MetadataStore::new(&self.work_dir, self.config.metadata_file.as_str());
        self.git = GitClient::with_binary(&self.work_dir, self.config.git_binary.as_str());
        self.registry = ProvenanceRegistry::new(self.store.clone(), self.git.clone());
    }
}

/// 拆分命令行，双引号内的内容作为单个参数
fn tokenize(line: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn print_help() {
    let help_text = "
医学影像版本管理 Shell - 命令一览:

影像注册:
  register-original <image_file> <patient_id> \"<study_info>\"      注册原始医学影像
  register-derivative <original_id> <seg_file> \"<desc>\" [method]  注册派生分割结果

版本管理:
  compare <version1> <version2> [output_file]   比较两个分割结果
  show-derivatives <original_id>                查看原始影像的全部分割结果
  show-patient-tree <patient_id>                查看患者的完整版本树

信息:
  history     查看提交历史与已注册版本
  help        显示本帮助

标准 Git 命令:
  其余命令 (status, commit, push, pull 等) 原样透传给 git
";
    println!("{}", help_text);
}
