//! qembed 命令行
//!
//! 把磁盘目录快照成嵌入资源树，然后像打包后的程序一样启动

use std::env;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::process;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use qembed::boot;
use qembed::compiler::marshal;
use qembed::config::{BootConfig, Protocol, LANG_NAME, LOG_ENV_VAR, VERSION};
use qembed::{EmbeddedTree, Host, ResourceFs, ResourceImporter, Vfs};

/// 初始化日志，过滤器来自 QEMBED_LOG，默认只输出警告
fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// 格式化错误及其 source 链
fn report(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(&format!("\n  caused by: {}", cause));
        source = cause.source();
    }
    message
}

fn load_bundle(dir: &str) -> Result<Vfs, String> {
    let tree = EmbeddedTree::from_dir(Path::new(dir))
        .map_err(|e| format!("cannot read bundle directory {}: {}", dir, e))?;
    Ok(Vfs::new(tree))
}

/// 启动 bundle 并打印入口模块的公开名字
fn run_bundle(dir: &str, module: Option<&str>, protocol: Option<Protocol>) -> Result<(), String> {
    let fs: Arc<dyn ResourceFs> = Arc::new(load_bundle(dir)?);

    let mut config = BootConfig::from_env();
    if let Some(module) = module {
        config.main_module = module.to_string();
    }
    if let Some(protocol) = protocol {
        config.protocol = protocol;
    }

    let host = Host::new();
    let main = boot::boot(&host, fs, &config).map_err(|e| report(&e))?;

    for key in main.keys() {
        if key.starts_with("__") {
            continue;
        }
        if let Some(value) = main.get(&key) {
            println!("{} = {}", key, value);
        }
    }
    Ok(())
}

/// 打印名字在 bundle 根下的分类结果
fn classify_name(dir: &str, name: &str, root: Option<&str>) -> Result<(), String> {
    let fs: Arc<dyn ResourceFs> = Arc::new(load_bundle(dir)?);
    let importer = ResourceImporter::new(fs, root.unwrap_or(":/")).map_err(|e| report(&e))?;
    println!("{}", importer.classify(name));
    Ok(())
}

/// 列出 bundle 中的资源
fn list_bundle(dir: &str) -> Result<(), String> {
    let vfs = load_bundle(dir)?;
    for path in vfs.embedded().paths() {
        println!("{}", path);
    }
    Ok(())
}

/// 反汇编一个 .qlc 文件
fn disassemble(path: &str) -> Result<(), String> {
    let data = fs::read(path).map_err(|e| format!("cannot read {}: {}", path, e))?;
    let unit = marshal::loads(&data).map_err(|e| report(&e))?;
    print!("{}", unit);
    Ok(())
}

/// 打印帮助信息
fn print_help() {
    println!("{} embedded module importer", LANG_NAME);
    println!();
    println!("Usage: qembed [options] <command>");
    println!();
    println!("Commands:");
    println!("  run <bundle-dir> [module]         Boot a bundle and import its main module");
    println!("  classify <bundle-dir> <name> [root]  Show how a module name resolves");
    println!("  list <bundle-dir>                 List resources in a bundle");
    println!("  dis <file.qlc>                    Disassemble a bytecode file");
    println!("  help                              Show this help message");
    println!("  version                           Show version information");
    println!();
    println!("Options:");
    println!("  --protocol <legacy|modern>  Finder protocol (default: modern)");
    println!();
    println!("Environment:");
    println!("  QEMBED_PATH      extra search path entries, separated by ';'");
    println!("  QEMBED_PROTOCOL  finder protocol");
    println!("  QEMBED_LOG       log filter, e.g. qembed=debug");
}

/// 打印版本信息
fn print_version() {
    println!("qembed {} ({} runtime)", VERSION, LANG_NAME);
}

fn main() {
    init_logging();

    let args: Vec<String> = env::args().collect();

    // 解析选项
    let mut protocol = None;
    let mut i = 1;
    while i < args.len() {
        if args[i] == "--protocol" && i + 1 < args.len() {
            match Protocol::parse(&args[i + 1]) {
                Some(p) => protocol = Some(p),
                None => {
                    eprintln!("unknown protocol: {}", args[i + 1]);
                    process::exit(2);
                }
            }
            i += 2;
        } else {
            break;
        }
    }

    // 剩余参数
    let remaining: Vec<&str> = args[i..].iter().map(|s| s.as_str()).collect();

    let result = match remaining.as_slice() {
        ["help"] | ["--help"] | ["-h"] => {
            print_help();
            Ok(())
        }
        ["version"] | ["--version"] | ["-v"] => {
            print_version();
            Ok(())
        }
        ["run", dir] => run_bundle(dir, None, protocol),
        ["run", dir, module] => run_bundle(dir, Some(*module), protocol),
        ["classify", dir, name] => classify_name(dir, name, None),
        ["classify", dir, name, root] => classify_name(dir, name, Some(*root)),
        ["list", dir] => list_bundle(dir),
        ["dis", path] => disassemble(path),
        _ => {
            print_help();
            process::exit(1);
        }
    };

    if let Err(message) = result {
        eprintln!("error: {}", message);
        process::exit(1);
    }
}
