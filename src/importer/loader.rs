//! 字节码加载

use std::io::Read;
use std::sync::Arc;

use tracing::debug;

use crate::compiler::{marshal, CodeUnit};
use crate::error::{ImportError, ImportResult};
use crate::host::{Host, Loader};
use crate::vm::{Module, Value, ATTR_LOADER, ATTR_PATH};
use super::{Classification, ResourceImporter};

impl ResourceImporter {
    /// 加载已分类的模块或包
    ///
    /// 资源在执行前读完并关闭；失败时不会留下已注册的模块。
    pub(crate) fn load_classified(
        &self,
        host: &Host,
        name: &str,
        found: Classification,
        loader: Arc<dyn Loader>,
    ) -> ImportResult<Arc<Module>> {
        let (path, package_dir) = match found {
            Classification::Module { path } => (path, None),
            Classification::Package { init_path, dir } => (init_path, Some(dir)),
            Classification::NamespacePortion { .. } | Classification::NotFound => {
                return Err(ImportError::NotFound {
                    name: name.to_string(),
                })
            }
        };

        let code = self.read_code(name, &path)?;
        debug!(module = name, %path, package = package_dir.is_some(), "loading bytecode");

        let pending = host.begin_module(name);
        let module = Arc::clone(pending.module());
        module.set(ATTR_LOADER, Value::Loader(loader));
        if let Some(dir) = package_dir {
            module.set(ATTR_PATH, Value::str_list(vec![dir]));
        }
        host.exec_code(&module, &code, &path)?;
        Ok(pending.commit())
    }

    fn read_code(&self, name: &str, path: &str) -> ImportResult<CodeUnit> {
        let mut reader = self.fs.open(path).map_err(|source| ImportError::ResourceOpen {
            name: name.to_string(),
            path: path.to_string(),
            source,
        })?;
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .map_err(|source| ImportError::ResourceRead {
                name: name.to_string(),
                path: path.to_string(),
                source,
            })?;
        drop(reader);

        Ok(marshal::loads(&data)?)
    }
}
