//! 磁盘文件系统视图

use std::fs::{self, File};
use std::io::{self, Read};

use super::{ResourceFs, ResourceKind};

/// 直接映射到 `std::fs` 的资源视图
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskFs;

impl ResourceFs for DiskFs {
    fn kind(&self, path: &str) -> Option<ResourceKind> {
        let meta = fs::metadata(path).ok()?;
        if meta.is_dir() {
            Some(ResourceKind::Container)
        } else if meta.is_file() {
            Some(ResourceKind::Leaf)
        } else {
            None
        }
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(File::open(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disk_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("m.qlc");
        fs::write(&file, b"data").unwrap();

        let disk = DiskFs;
        assert_eq!(disk.kind(dir.path().to_str().unwrap()), Some(ResourceKind::Container));
        assert_eq!(disk.kind(file.to_str().unwrap()), Some(ResourceKind::Leaf));
        assert_eq!(disk.kind(dir.path().join("missing").to_str().unwrap()), None);

        let mut buf = Vec::new();
        disk.open(file.to_str().unwrap()).unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"data");
    }
}
