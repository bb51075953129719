//! 配置常量模块
//!
//! 资源命名约定、版本号以及导入协议的选择都在这里定义

use std::env;

/// 语言名称
pub const LANG_NAME: &str = "Q";

/// 字节码文件扩展名（不含点号），必须与资源打包工具一致
pub const BYTECODE_EXTENSION: &str = "qlc";

/// 包标记文件的主干名
pub const PACKAGE_INIT: &str = "__init__";

/// 嵌入资源树的路径前缀
pub const RESOURCE_PREFIX: &str = ":";

/// 资源路径分隔符
pub const PATH_SEPARATOR: char = '/';

/// 启动时的最小搜索路径
pub const MINIMAL_SEARCH_PATH: &[&str] = &[":/", ":/stdlib", ":/site-packages"];

/// 默认入口模块
pub const MAIN_MODULE: &str = "__main__";

/// 导入器自身作为内置模块注册时的名称
pub const IMPORTER_MODULE: &str = "qembed";

/// 额外搜索目录的环境变量
pub const PATH_ENV_VAR: &str = "QEMBED_PATH";

/// 导入协议选择的环境变量
pub const PROTOCOL_ENV_VAR: &str = "QEMBED_PROTOCOL";

/// 日志过滤器的环境变量
pub const LOG_ENV_VAR: &str = "QEMBED_LOG";

/// 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 十六进制版本号：0xMMmmpp
pub const HEX_VERSION: u32 = (parse_u32(env!("CARGO_PKG_VERSION_MAJOR")) << 16)
    | (parse_u32(env!("CARGO_PKG_VERSION_MINOR")) << 8)
    | parse_u32(env!("CARGO_PKG_VERSION_PATCH"));

const fn parse_u32(s: &str) -> u32 {
    let bytes = s.as_bytes();
    let mut value = 0u32;
    let mut i = 0;
    while i < bytes.len() {
        value = value * 10 + (bytes[i] - b'0') as u32;
        i += 1;
    }
    value
}

/// 宿主运行时的导入协议形态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    /// 旧式：find_module 返回加载器，load_module 负责内置扩展
    Legacy,
    /// 新式：find_loader 返回（加载器，命名空间片段）
    #[default]
    Modern,
}

impl Protocol {
    /// 从字符串解析协议名
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" | "v2" => Some(Protocol::Legacy),
            "modern" | "v3" => Some(Protocol::Modern),
            _ => None,
        }
    }

    /// 从环境变量读取，未设置或无法识别时返回默认值
    pub fn from_env() -> Self {
        env::var(PROTOCOL_ENV_VAR)
            .ok()
            .and_then(|v| Self::parse(&v))
            .unwrap_or_default()
    }
}

/// 启动配置
#[derive(Debug, Clone)]
pub struct BootConfig {
    /// 追加在最小搜索路径之后的目录（可包含 $NAME 环境变量引用）
    pub path_dirs: Vec<String>,
    /// 入口模块名
    pub main_module: String,
    /// 导入协议
    pub protocol: Protocol,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            path_dirs: Vec::new(),
            main_module: MAIN_MODULE.to_string(),
            protocol: Protocol::default(),
        }
    }
}

impl BootConfig {
    /// 使用默认值并应用环境变量覆盖
    pub fn from_env() -> Self {
        let path_dirs = env::var(PATH_ENV_VAR)
            .map(|v| split_path_list(&v))
            .unwrap_or_default();

        Self {
            path_dirs,
            protocol: Protocol::from_env(),
            ..Self::default()
        }
    }
}

/// 切分路径列表
///
/// 固定使用 `;`，因为 `:` 是嵌入资源路径的前缀
fn split_path_list(list: &str) -> Vec<String> {
    list.split(';')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
