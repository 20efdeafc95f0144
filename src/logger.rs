use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Local;
use parking_lot::Mutex;
use tracing::error;

/// 访问日志
///
/// 每条记录一行：`<本地时间> - <消息>`，追加到同一个文件中。
/// 所有连接共享一个实例，写入时持锁，保证单条记录不会被其他连接打断。
/// 写入失败只会输出到诊断日志，不影响请求处理。
#[derive(Debug)]
pub struct AccessLog {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl AccessLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line.
    pub fn log(&self, message: &str) {
        let line = format!("{} - {}\n", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"), message);

        let mut file = self.file.lock();
        if file.is_none() {
            match open_append(&self.path) {
                Ok(f) => *file = Some(f),
                Err(err) => {
                    error!("Logging error: {:?} {}", self.path, err);
                    return;
                }
            }
        }
        let Some(target) = file.as_mut() else {
            return;
        };
        if let Err(err) = target.write_all(line.as_bytes()) {
            error!("Logging error: {:?} {}", self.path, err);
            // 下次写入时重新打开文件
            *file = None;
        }
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
