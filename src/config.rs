use std::{fs, path::Path};

use serde::Deserialize;

use crate::{
    consts::{
        access_log, host_ip, log_folder, log_level, max_body_size, max_header_size, origin_port,
        proxy_port,
    },
    error::{Error, Result},
};

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    /// 监听地址
    #[serde(default = "host_ip")]
    pub ip: String,
    /// 监听端口，可被命令行参数覆盖
    #[serde(default = "proxy_port")]
    pub port: u16,
    /// URL 中未显式指定端口时连接源站使用的端口
    #[serde(default = "origin_port")]
    pub origin_port: u16,
    /// 同时处理的最大连接数，未设置时不限制
    pub max_connections: Option<usize>,
    /// POST 请求体的最大字节数
    #[serde(default = "max_body_size")]
    pub max_body_size: usize,
    /// 请求行加头部的最大字节数
    #[serde(default = "max_header_size")]
    pub max_header_size: usize,
    #[serde(default = "log_level")]
    pub log_level: String,
    /// 诊断日志目录，按天分割
    #[serde(default = "log_folder")]
    pub log_folder: String,
    /// 访问日志文件路径
    #[serde(default = "access_log")]
    pub access_log: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ip: host_ip(),
            port: proxy_port(),
            origin_port: origin_port(),
            max_connections: None,
            max_body_size: max_body_size(),
            max_header_size: max_header_size(),
            log_level: log_level(),
            log_folder: log_folder(),
            access_log: access_log(),
        }
    }
}

impl Settings {
    /// 从 TOML 文件读取配置并校验
    pub fn new(path: &str) -> Result<Self> {
        let file = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&file)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read `path` when it exists, otherwise start from the defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::new(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Socket address string the listener binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    fn validate(&self) -> Result<()> {
        if self.max_connections == Some(0) {
            return Err(Error::InvalidConfig(
                "max_connections must be greater than 0".to_string(),
            ));
        }
        if self.max_body_size == 0 {
            return Err(Error::InvalidConfig(
                "max_body_size must be greater than 0".to_string(),
            ));
        }
        if self.max_header_size == 0 {
            return Err(Error::InvalidConfig(
                "max_header_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
