use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;

use crate::config::Settings;
use crate::consts::{ARCH, COMPILER, NAME, OS, VERSION};

pub mod logging;

pub use logging::*;

/// 初始化日志系统并打印版本信息
pub fn initialize_logger(settings: &Settings) -> Result<WorkerGuard> {
    let guard = init_logger(settings.log_level.as_str(), settings.log_folder.as_str())
        .with_context(|| "Failed to initialize logger")?;
    info!("{} v{}", NAME, VERSION);
    info!("Compiler: {}", COMPILER);
    info!("OS: {} {}", OS, ARCH);
    debug!("Configuration: {:?}", settings);
    Ok(guard)
}
