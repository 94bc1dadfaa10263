//! # LIS Core
//!
//! LIS网关的核心模块，提供基础数据结构、错误定义和遗留编码工具。

pub mod error;
pub mod hexblob;
pub mod models;
pub mod text;

pub use error::{LisError, Result};
pub use models::*;
