//! 启动
//!
//! 设置搜索路径、安装嵌入资源导入器，然后导入入口模块。

use std::env;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use tracing::{debug, info};

use crate::config::{BootConfig, MINIMAL_SEARCH_PATH, PATH_SEPARATOR, RESOURCE_PREFIX};
use crate::error::ImportResult;
use crate::host::Host;
use crate::importer;
use crate::resource::ResourceFs;
use crate::vm::Module;

lazy_static! {
    /// `$NAME` 形式的环境变量引用
    static ref ENV_VAR_REF: Regex = Regex::new(r"\$([A-Za-z0-9_]+)").expect("valid pattern");
}

/// 可执行文件所在目录，取不到时用当前目录
pub fn exec_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// 展开 `$NAME` 环境变量引用，未设置的变量展开为空串
pub fn expand_env(dir: &str) -> String {
    ENV_VAR_REF
        .replace_all(dir, |caps: &Captures| env::var(&caps[1]).unwrap_or_default())
        .into_owned()
}

/// 计算完整搜索路径：最小路径在前，配置的目录在后
///
/// 配置的目录展开环境变量；磁盘路径相对 `exec_dir` 转成绝对路径并做词法清理。
/// 展开后为空的条目就是 `exec_dir` 本身。
pub fn build_search_path(config: &BootConfig, exec_dir: &Path) -> Vec<String> {
    let mut search_path: Vec<String> = MINIMAL_SEARCH_PATH.iter().map(|s| s.to_string()).collect();

    for dir in &config.path_dirs {
        let expanded = expand_env(dir);
        let entry = if expanded.starts_with(RESOURCE_PREFIX) {
            clean_resource_path(&expanded)
        } else {
            let path = Path::new(&expanded);
            let absolute = if path.is_absolute() {
                path.to_path_buf()
            } else {
                exec_dir.join(path)
            };
            clean_path(&absolute).to_string_lossy().into_owned()
        };
        debug!(configured = %dir, entry = %entry, "search path entry");
        search_path.push(entry);
    }
    search_path
}

/// 词法清理磁盘路径：去掉 `.`，消解 `..`
fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// 词法清理资源路径：`:/a/./b/../c/` -> `:/a/c`
fn clean_resource_path(path: &str) -> String {
    let rest = path.strip_prefix(RESOURCE_PREFIX).unwrap_or(path);
    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split(PATH_SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("{}{}{}", RESOURCE_PREFIX, PATH_SEPARATOR, segments.join("/"))
}

/// 设置搜索路径并安装导入器的路径钩子
pub fn install(host: &Host, fs: Arc<dyn ResourceFs>, config: &BootConfig, exec_dir: &Path) {
    let search_path = build_search_path(config, exec_dir);
    debug!(?search_path, protocol = ?config.protocol, "installing resource importer");
    host.set_search_path(search_path);
    host.add_path_hook(importer::path_hook(fs, config.protocol));
}

/// 启动：安装导入器并导入入口模块
pub fn boot(host: &Host, fs: Arc<dyn ResourceFs>, config: &BootConfig) -> ImportResult<Arc<Module>> {
    install(host, fs, config, &exec_dir());
    info!(module = %config.main_module, "importing main module");
    host.import(&config.main_module)
}
