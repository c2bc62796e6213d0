//! # MIVC 派生关系模块
//!
//! 提供派生关系图操作、注册服务与版本比较引擎。

pub mod compare;
pub mod graph;
pub mod registry;
pub mod volume;

pub use compare::*;
pub use graph::*;
pub use registry::*;
pub use volume::*;
