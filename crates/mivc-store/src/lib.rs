//! # MIVC 存储模块
//!
//! 负责元数据文档的持久化与 Git 协作方交互。

pub mod git;
pub mod metadata;

pub use git::*;
pub use metadata::*;
