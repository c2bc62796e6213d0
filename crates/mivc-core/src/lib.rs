//! # MIVC Core
//!
//! 医学影像版本管理系统的核心模块，提供基础数据结构、错误定义和标识符工具。

pub mod error;
pub mod models;
pub mod utils;

pub use error::{MivcError, Result};
pub use models::*;
