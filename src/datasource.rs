//! 数据源抽象
//!
//! 文件系统加载器的解码阶段通过 `DataSource` 读取原始字节，不关心字节来自
//! 磁盘文件还是内存块。实现必须是 `Send`：数据源会随解码请求被移动到
//! 工作线程。

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::ResourceResult;

/// 抽象字节流
pub trait DataSource: Send {
    /// 读取至多 `buf.len()` 字节，返回实际读取数
    fn read(&mut self, buf: &mut [u8]) -> ResourceResult<usize>;

    /// 定位到绝对偏移
    fn seek(&mut self, pos: u64) -> ResourceResult<()>;

    /// 当前偏移
    fn tell(&self) -> u64;

    /// 总字节数
    fn size(&self) -> u64;

    /// 来源描述，用于日志
    fn path(&self) -> &str;

    /// 从当前偏移读到末尾
    fn read_to_end(&mut self) -> ResourceResult<Vec<u8>> {
        let remaining = self.size().saturating_sub(self.tell()) as usize;
        let mut out = Vec::with_capacity(remaining);
        let mut chunk = [0u8; 8192];
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        Ok(out)
    }
}

/// 磁盘文件数据源
pub struct FileDataSource {
    file: File,
    path: String,
    position: u64,
    size: u64,
}

impl FileDataSource {
    pub fn open(path: impl AsRef<Path>) -> ResourceResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file,
            path: path.to_string_lossy().into_owned(),
            position: 0,
            size,
        })
    }
}

impl DataSource for FileDataSource {
    fn read(&mut self, buf: &mut [u8]) -> ResourceResult<usize> {
        let n = self.file.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> ResourceResult<()> {
        self.file.seek(SeekFrom::Start(pos))?;
        self.position = pos;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn path(&self) -> &str {
        &self.path
    }
}

/// 内存数据源，手动资源和测试用
pub struct MemoryDataSource {
    data: Vec<u8>,
    path: String,
    position: u64,
}

impl MemoryDataSource {
    pub fn new(data: Vec<u8>, path: impl Into<String>) -> Self {
        Self {
            data,
            path: path.into(),
            position: 0,
        }
    }
}

impl DataSource for MemoryDataSource {
    fn read(&mut self, buf: &mut [u8]) -> ResourceResult<usize> {
        let start = self.position.min(self.data.len() as u64) as usize;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> ResourceResult<()> {
        self.position = pos.min(self.data.len() as u64);
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn path(&self) -> &str {
        &self.path
    }
}
