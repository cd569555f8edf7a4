//! 资源标识与路径解析
//!
//! 把原始路径（相对路径、搜索路径下的文件名）解析为规范化的全局唯一标识
//! （GUID）。同一个逻辑文件无论通过哪条搜索路径命中，都得到同一个 GUID，
//! 这是缓存去重的前提。手动资源的 GUID 由调用方合成（如内嵌着色器的
//! `__embed_*` 标识），不经过路径解析。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::datasource::FileDataSource;
use crate::error::{ResourceError, ResourceResult};

/// 资源 GUID
///
/// 进程内有效的规范化标识，不跨运行持久化。空字符串为无效哨兵值。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceGuid(String);

impl ResourceGuid {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// 无效 GUID 哨兵值
    pub fn invalid() -> Self {
        Self(String::new())
    }

    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceGuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceGuid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// 资源文件系统
///
/// 维护搜索路径列表和 raw path → GUID 的解析缓存。解析只接受存在的
/// 非目录文件；失败返回无效 GUID，从不 panic。
#[derive(Default)]
pub struct ResourceFileSystem {
    search_paths: Mutex<Vec<PathBuf>>,
    // 同一个 raw path 反复解析时跳过文件系统调用
    full_paths: Mutex<HashMap<String, ResourceGuid>>,
}

impl ResourceFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加搜索路径，重复添加会被忽略并记录警告
    pub fn add_search_path(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut paths = self.search_paths.lock().unwrap();
        if paths.contains(&path) {
            log::warn!("Search path already registered: {}", path.display());
            return;
        }
        paths.push(path);
    }

    /// 把原始路径解析为 GUID
    ///
    /// 依次尝试原始路径本身和每条搜索路径下的拼接路径，命中第一个存在的
    /// 普通文件后做规范化。目录、不存在的路径都解析失败。
    pub fn resolve(&self, raw_path: &str) -> ResourceGuid {
        if raw_path.is_empty() {
            return ResourceGuid::invalid();
        }

        if let Some(guid) = self.full_paths.lock().unwrap().get(raw_path) {
            return guid.clone();
        }

        let guid = self.resolve_uncached(raw_path);
        if guid.is_valid() {
            self.full_paths
                .lock()
                .unwrap()
                .insert(raw_path.to_string(), guid.clone());
        }
        guid
    }

    fn resolve_uncached(&self, raw_path: &str) -> ResourceGuid {
        if let Some(guid) = canonical_guid(Path::new(raw_path)) {
            return guid;
        }

        let paths = self.search_paths.lock().unwrap();
        for base in paths.iter() {
            if let Some(guid) = canonical_guid(&base.join(raw_path)) {
                return guid;
            }
        }

        ResourceGuid::invalid()
    }

    /// 按已解析的 GUID 打开文件数据源
    pub fn open(&self, guid: &ResourceGuid) -> ResourceResult<FileDataSource> {
        if !guid.is_valid() {
            return Err(ResourceError::NotFound {
                path: String::new(),
            });
        }
        FileDataSource::open(guid.as_str())
    }
}

// 存在且不是目录的文件才有 GUID
fn canonical_guid(path: &Path) -> Option<ResourceGuid> {
    if !path.is_file() {
        return None;
    }
    let canonical = std::fs::canonicalize(path).ok()?;
    Some(ResourceGuid::new(canonical.to_string_lossy().into_owned()))
}
