//! 导入流程集成测试

use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use qembed::compiler::marshal::dumps;
use qembed::compiler::{CodeUnit, OpCode};
use qembed::config::{BootConfig, Protocol};
use qembed::host::{BuiltinTable, FindResult, Loader, ModernFinder, PathEntryFinder};
use qembed::importer::{self, DelegationGuard};
use qembed::resource::ResourceKind;
use qembed::vm::{Module, Value, ATTR_FILE, ATTR_LOADER, ATTR_NAME, ATTR_PATH};
use qembed::{
    boot, Classification, DecodeError, EmbeddedTree, Host, ImportError, ImportResult,
    ModernImporter, ResourceFs, ResourceImporter, RuntimeError, Vfs,
};

fn tree(entries: Vec<(&str, CodeUnit)>) -> EmbeddedTree {
    EmbeddedTree::from_entries(entries.into_iter().map(|(path, unit)| (path, dumps(&unit))))
        .unwrap()
}

fn host_on(fs: Arc<dyn ResourceFs>, search_path: &[&str], protocol: Protocol) -> Host {
    let host = Host::new();
    host.set_search_path(search_path.iter().map(|s| s.to_string()).collect());
    host.add_path_hook(importer::path_hook(fs, protocol));
    host
}

fn write_blob(path: &Path, unit: &CodeUnit) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, dumps(unit)).unwrap();
}

#[test]
fn test_package_example() {
    let init = CodeUnit::new()
        .assign("greeting", "hello")
        .write_named(OpCode::LoadName, ATTR_PATH)
        .write_named(OpCode::StoreName, "path_at_init")
        .finish();
    let fs: Arc<dyn ResourceFs> = Arc::new(tree(vec![(":/app/res/pkgA/__init__.qlc", init)]));

    let core = ResourceImporter::new(Arc::clone(&fs), ":/app/res").unwrap();
    assert_eq!(
        core.classify("pkgA"),
        Classification::Package {
            init_path: ":/app/res/pkgA/__init__.qlc".to_string(),
            dir: ":/app/res/pkgA".to_string(),
        }
    );

    let host = host_on(fs, &[":/app/res"], Protocol::Modern);
    let module = host.import("pkgA").unwrap();

    let expected_path = Value::str_list(vec![":/app/res/pkgA".to_string()]);
    assert_eq!(module.get("path_at_init"), Some(expected_path.clone()));
    assert_eq!(module.get(ATTR_PATH), Some(expected_path));
    assert_eq!(
        module.keys(),
        vec![
            ATTR_FILE.to_string(),
            ATTR_LOADER.to_string(),
            ATTR_NAME.to_string(),
            ATTR_PATH.to_string(),
            "greeting".to_string(),
            "path_at_init".to_string(),
        ]
    );
}

#[test]
fn test_module_precedence_over_directory() {
    let fs: Arc<dyn ResourceFs> = Arc::new(tree(vec![
        (":/both.qlc", CodeUnit::new().assign("kind", "module").finish()),
        (":/both/__init__.qlc", CodeUnit::new().assign("kind", "package").finish()),
    ]));
    let host = host_on(fs, &[":/"], Protocol::Modern);

    let module = host.import("both").unwrap();
    assert_eq!(module.get("kind"), Some(Value::Str("module".to_string())));
    assert!(!module.is_package());
}

#[test]
fn test_namespace_package_across_roots() {
    let fs: Arc<dyn ResourceFs> = Arc::new(tree(vec![
        (":/a/ns/one.qlc", CodeUnit::new().assign("n", 1i64).finish()),
        (":/b/ns/two.qlc", CodeUnit::new().assign("n", 2i64).finish()),
    ]));
    let host = host_on(fs, &[":/a", ":/b"], Protocol::Modern);

    let one = host.import("ns.one").unwrap();
    let two = host.import("ns.two").unwrap();
    assert_eq!(one.get("n"), Some(Value::Int(1)));
    assert_eq!(two.get("n"), Some(Value::Int(2)));

    let ns = host.modules().get("ns").unwrap();
    assert_eq!(
        ns.search_path(),
        Some(vec![":/a/ns".to_string(), ":/b/ns".to_string()])
    );
    assert_eq!(ns.get("two"), Some(Value::Module(two)));
}

#[test]
fn test_nested_imports_from_module_code() {
    let main = CodeUnit::new()
        .import("lib.util", "util")
        .write_named(OpCode::LoadName, "util")
        .write_named(OpCode::LoadAttr, "answer")
        .write_named(OpCode::StoreName, "answer")
        .finish();
    let fs: Arc<dyn ResourceFs> = Arc::new(tree(vec![
        (":/__main__.qlc", main),
        (":/lib/__init__.qlc", CodeUnit::new().finish()),
        (":/lib/util.qlc", CodeUnit::new().assign("answer", 42i64).finish()),
    ]));
    let host = host_on(fs, &[":/"], Protocol::Modern);

    let main = host.import("__main__").unwrap();
    assert_eq!(main.get("answer"), Some(Value::Int(42)));
    assert!(host.modules().contains("lib"));
    assert!(host.modules().contains("lib.util"));
}

#[test]
fn test_truncated_blob_fails_without_registration() {
    let blob = dumps(&CodeUnit::new().assign("x", 1i64).finish());
    let fs: Arc<dyn ResourceFs> = Arc::new(
        EmbeddedTree::from_entries([(":/cut.qlc", blob[..blob.len() / 2].to_vec())]).unwrap(),
    );
    let host = host_on(fs, &[":/"], Protocol::Modern);

    let err = host.import("cut").unwrap_err();
    assert!(matches!(err, ImportError::Deserialize(DecodeError::Truncated { .. })));
    assert!(!host.modules().contains("cut"));
}

#[test]
fn test_failing_child_import_unregisters_parent_module() {
    let main = CodeUnit::new().import("missing.child", "c").finish();
    let fs: Arc<dyn ResourceFs> = Arc::new(tree(vec![(":/app.qlc", main)]));
    let host = host_on(fs, &[":/"], Protocol::Modern);

    let err = host.import("app").unwrap_err();
    match err {
        ImportError::Execution { name, source } => {
            assert_eq!(name, "app");
            assert!(matches!(*source, RuntimeError::Import(ref e) if e.is_not_found()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!host.modules().contains("app"));
}

/// 声称资源存在但无法打开的文件系统
#[derive(Debug)]
struct UnreadableFs;

impl ResourceFs for UnreadableFs {
    fn kind(&self, path: &str) -> Option<ResourceKind> {
        if path.ends_with(".qlc") {
            Some(ResourceKind::Leaf)
        } else {
            Some(ResourceKind::Container)
        }
    }

    fn open(&self, _path: &str) -> io::Result<Box<dyn Read + '_>> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
    }
}

#[test]
fn test_open_failure_reports_module_name() {
    let host = host_on(Arc::new(UnreadableFs), &[":/"], Protocol::Modern);
    let err = host.import("locked").unwrap_err();
    assert_eq!(err.to_string(), "error opening resource for module locked");
    assert!(matches!(err, ImportError::ResourceOpen { ref path, .. } if path == ":/locked.qlc"));
    assert!(!host.modules().contains("locked"));
}

/// 记录默认搜索对它的查询；可以配置成在查询时失败
#[derive(Debug, Default)]
struct QueryRecorder {
    queries: Mutex<Vec<String>>,
    guard_seen: AtomicUsize,
    fail: bool,
}

impl ModernFinder for QueryRecorder {
    fn find_loader(self: Arc<Self>, _host: &Host, name: &str) -> ImportResult<FindResult> {
        self.queries.lock().push(name.to_string());
        if DelegationGuard::is_held() {
            self.guard_seen.fetch_add(1, Ordering::SeqCst);
        }
        if self.fail {
            return Err(ImportError::NotAPackage {
                name: name.to_string(),
                parent: "recorder".to_string(),
            });
        }
        Ok(FindResult::none())
    }
}

fn host_with_recorder(recorder: Arc<QueryRecorder>) -> (Host, Arc<ModernImporter>) {
    let fs: Arc<dyn ResourceFs> = Arc::new(EmbeddedTree::new());
    let host = host_on(Arc::clone(&fs), &[":/", "recorder"], Protocol::Modern);
    host.add_path_hook(Arc::new(move |entry: &str| {
        if entry == "recorder" {
            Ok(PathEntryFinder::Modern(recorder.clone()))
        } else {
            Err(ImportError::Configuration {
                path: entry.to_string(),
            })
        }
    }));
    let importer = Arc::new(ModernImporter::new(ResourceImporter::new(fs, ":/").unwrap()));
    (host, importer)
}

#[test]
fn test_delegation_runs_once_and_reports_empty() {
    let recorder = Arc::new(QueryRecorder::default());
    let (host, importer) = host_with_recorder(Arc::clone(&recorder));

    let found = importer.find_loader(&host, "pkg.x").unwrap();
    assert!(found.loader.is_none());
    assert!(found.portions.is_empty());

    // 默认搜索只跑了一次：嵌套在其中的 `:/` 导入器没有再次委托
    assert_eq!(*recorder.queries.lock(), vec!["pkg.x".to_string()]);
    assert_eq!(recorder.guard_seen.load(Ordering::SeqCst), 1);
    assert!(!DelegationGuard::is_held());
}

#[test]
fn test_delegation_failure_releases_guard() {
    let recorder = Arc::new(QueryRecorder {
        fail: true,
        ..QueryRecorder::default()
    });
    let (host, importer) = host_with_recorder(recorder);

    let err = Arc::clone(&importer).find_loader(&host, "a.b").unwrap_err();
    assert!(matches!(err, ImportError::Delegation { ref name, .. } if name == "a.b"));
    assert!(!DelegationGuard::is_held());

    // 守卫已释放，下一次查询照常委托
    let err = importer.find_loader(&host, "a.c").unwrap_err();
    assert!(matches!(err, ImportError::Delegation { .. }));
}

#[test]
fn test_delegation_finds_top_level_resource() {
    let fs: Arc<dyn ResourceFs> = Arc::new(tree(vec![(
        ":/site/helper.qlc",
        CodeUnit::new().assign("from", "site").finish(),
    )]));
    let host = host_on(Arc::clone(&fs), &[":/site"], Protocol::Modern);
    let importer = Arc::new(ModernImporter::new(ResourceImporter::new(fs, ":/").unwrap()));

    let found = importer.find_loader(&host, "vendor.helper").unwrap();
    let loader: Arc<dyn Loader> = found.loader.unwrap();
    let module = loader.load_module(&host, "vendor.helper").unwrap();
    assert_eq!(module.file(), Some(":/site/helper.qlc".to_string()));
}

fn init_native(_host: &Host, module: &Module) -> Result<(), RuntimeError> {
    module.set("native", Value::Bool(true));
    Ok(())
}

#[test]
fn test_legacy_protocol_initializes_dotted_builtin() {
    let mut builtins = BuiltinTable::new();
    builtins.register("pkg.native", init_native);
    let host = Host::with_builtins(builtins);
    host.set_search_path(vec![":/".to_string()]);
    let fs: Arc<dyn ResourceFs> = Arc::new(tree(vec![
        (":/pkg/__init__.qlc", CodeUnit::new().finish()),
        (":/pkg/plain.qlc", CodeUnit::new().assign("v", 1i64).finish()),
    ]));
    host.add_path_hook(importer::path_hook(fs, Protocol::Legacy));

    let native = host.import("pkg.native").unwrap();
    assert_eq!(native.get("native"), Some(Value::Bool(true)));
    let plain = host.import("pkg.plain").unwrap();
    assert_eq!(plain.get("v"), Some(Value::Int(1)));
    assert!(host.import("pkg.absent").unwrap_err().is_not_found());
}

#[test]
fn test_modern_protocol_delegates_dotted_builtin() {
    let mut builtins = BuiltinTable::new();
    builtins.register("pkg.native", init_native);
    let host = Host::with_builtins(builtins);
    host.set_search_path(vec![":/".to_string()]);
    let fs: Arc<dyn ResourceFs> = Arc::new(tree(vec![(
        ":/pkg/__init__.qlc",
        CodeUnit::new().finish(),
    )]));
    host.add_path_hook(importer::path_hook(fs, Protocol::Modern));

    // `:/pkg` 下没有 native，回退委托找到内置模块
    let native = host.import("pkg.native").unwrap();
    assert_eq!(native.get("native"), Some(Value::Bool(true)));
    assert!(!DelegationGuard::is_held());
    assert!(host.modules().contains("pkg.native"));

    let pkg = host.modules().get("pkg").unwrap();
    assert_eq!(pkg.get("native"), Some(Value::Module(Arc::clone(&native))));
    assert!(host.import("pkg.absent").unwrap_err().is_not_found());
    assert!(!DelegationGuard::is_held());
}

#[test]
fn test_legacy_protocol_has_no_namespace_packages() {
    let fs: Arc<dyn ResourceFs> = Arc::new(tree(vec![(
        ":/ns/leaf.qlc",
        CodeUnit::new().finish(),
    )]));
    let host = host_on(fs, &[":/"], Protocol::Legacy);

    // 旧式查找器认领目录，加载时却没有代码可执行
    assert!(host.import("ns").unwrap_err().is_not_found());
    assert!(!host.modules().contains("ns"));
}

#[test]
fn test_boot_from_snapshot_with_disk_path() {
    let bundle = tempfile::tempdir().unwrap();
    let extra = tempfile::tempdir().unwrap();

    let main = CodeUnit::new()
        .import("tools", "tools")
        .import("qembed", "imp")
        .write_named(OpCode::LoadName, "tools")
        .write_named(OpCode::LoadAttr, "name")
        .write_named(OpCode::StoreName, "tool_name")
        .finish();
    write_blob(&bundle.path().join("__main__.qlc"), &main);
    write_blob(
        &bundle.path().join("stdlib/os.qlc"),
        &CodeUnit::new().assign("sep", "/").finish(),
    );
    write_blob(
        &extra.path().join("tools.qlc"),
        &CodeUnit::new().assign("name", "disk tools").finish(),
    );

    let fs: Arc<dyn ResourceFs> = Arc::new(Vfs::new(EmbeddedTree::from_dir(bundle.path()).unwrap()));
    let config = BootConfig {
        path_dirs: vec![extra.path().to_string_lossy().into_owned()],
        ..BootConfig::default()
    };
    let host = Host::new();
    let main = boot::boot(&host, fs, &config).unwrap();

    assert_eq!(main.get("tool_name"), Some(Value::Str("disk tools".to_string())));
    assert_eq!(main.file(), Some(":/__main__.qlc".to_string()));
    assert!(main.get("imp").and_then(|v| v.as_module().cloned()).is_some());
    assert_eq!(host.import("os").unwrap().get("sep"), Some(Value::Str("/".to_string())));
}
