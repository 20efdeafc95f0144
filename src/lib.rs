//! stash 代理库
//! 导出公共 API 和类型，供集成测试使用

pub mod cli;
pub mod config;
pub mod consts;
pub mod error;
pub mod http;
pub mod logger;
pub mod utils;
