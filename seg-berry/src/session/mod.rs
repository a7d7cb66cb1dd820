//! 会话工作目录.
//!
//! 每个上传会话持有自己的一组子目录, 以显式句柄的形式传给所有
//! I/O 协作方, 而不是依赖进程级的全局目录. 生命周期同样是显式的:
//! 会话开始时创建, 导出完成或过期后删除.
//!
//! 会话标识由调用方提供; 本层不生成任何标识符.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// 会话内各子目录的名字.
const SUBDIRS: [&str; 5] = ["images", "masks", "labels", "modified", "cleaned"];

/// 一个会话的工作目录句柄.
///
/// 目录布局:
///
/// ```text
/// <root>/<id>/
///     images/     上传的底图
///     masks/      上传的掩膜 (.npy)
///     labels/     编码出的标签 PNG
///     modified/   客户端保存回来的编辑结果
///     cleaned/    橡皮擦页面保存的清理图
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDir {
    base: PathBuf,
    id: String,
}

impl SessionDir {
    /// 在 `root` 下创建标识为 `id` 的会话目录及全部子目录.
    ///
    /// `id` 必须非空且不含路径分隔符, 否则程序 panic
    /// (这是调用方的契约错误, 不是数据错误).
    pub fn create<P: AsRef<Path>>(root: P, id: &str) -> io::Result<Self> {
        assert!(
            !id.is_empty() && !id.contains(['/', '\\']),
            "会话标识不可为空或含路径分隔符: {id:?}"
        );
        let base = root.as_ref().join(id);
        for sub in SUBDIRS {
            fs::create_dir_all(base.join(sub))?;
        }
        Ok(Self {
            base,
            id: id.to_owned(),
        })
    }

    /// 打开一个已存在的会话目录.
    ///
    /// 子目录缺失时返回 `NotFound` 错误, 而不是悄悄补建
    /// (补建意味着会话生命周期被隐式延长).
    pub fn open<P: AsRef<Path>>(root: P, id: &str) -> io::Result<Self> {
        let base = root.as_ref().join(id);
        for sub in SUBDIRS {
            if !base.join(sub).is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("会话 {id} 缺少子目录 {sub}"),
                ));
            }
        }
        Ok(Self {
            base,
            id: id.to_owned(),
        })
    }

    /// 会话标识.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 会话根目录 `<root>/<id>`.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.base
    }

    /// 上传底图目录.
    #[inline]
    pub fn images_dir(&self) -> PathBuf {
        self.base.join("images")
    }

    /// 上传掩膜目录.
    #[inline]
    pub fn masks_dir(&self) -> PathBuf {
        self.base.join("masks")
    }

    /// 标签 PNG 输出目录.
    #[inline]
    pub fn labels_dir(&self) -> PathBuf {
        self.base.join("labels")
    }

    /// 编辑结果保存目录.
    #[inline]
    pub fn modified_dir(&self) -> PathBuf {
        self.base.join("modified")
    }

    /// 清理图保存目录.
    #[inline]
    pub fn cleaned_dir(&self) -> PathBuf {
        self.base.join("cleaned")
    }

    /// `name` 对应的标签 PNG 路径: `labels/<name>_label.png`.
    pub fn label_png_path(&self, name: &str) -> PathBuf {
        self.labels_dir().join(format!("{name}_label.png"))
    }

    /// `name` 对应的编辑后标签数组路径: `modified/<name>.npy`.
    pub fn modified_npy_path(&self, name: &str) -> PathBuf {
        self.modified_dir().join(format!("{name}.npy"))
    }

    /// `name` 对应的编辑后底图路径: `modified/<name>_noisy.png`.
    pub fn modified_image_path(&self, name: &str) -> PathBuf {
        self.modified_dir().join(format!("{name}_noisy.png"))
    }

    /// 删除整个会话目录, 结束会话生命周期.
    pub fn remove(self) -> io::Result<()> {
        fs::remove_dir_all(&self.base)
    }
}

/// 获取 `{用户主目录}/seg-sessions` 目录, 作为默认会话根.
pub fn home_session_root() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("seg-sessions");
    Some(ans)
}

#[cfg(test)]
mod tests {
    use super::SessionDir;

    #[test]
    fn test_session_lifecycle() {
        let root = tempfile::tempdir().unwrap();
        let s = SessionDir::create(root.path(), "t01").unwrap();
        assert_eq!(s.id(), "t01");
        assert!(s.images_dir().is_dir());
        assert!(s.masks_dir().is_dir());
        assert!(s.labels_dir().is_dir());
        assert!(s.modified_dir().is_dir());
        assert!(s.cleaned_dir().is_dir());

        assert!(s.label_png_path("cat").ends_with("labels/cat_label.png"));
        assert!(s.modified_npy_path("cat").ends_with("modified/cat.npy"));

        let reopened = SessionDir::open(root.path(), "t01").unwrap();
        assert_eq!(reopened, s.clone());

        let base = s.path().to_owned();
        s.remove().unwrap();
        assert!(!base.exists());
        assert!(SessionDir::open(root.path(), "t01").is_err());
    }

    #[test]
    #[should_panic]
    fn test_session_id_with_separator_panics() {
        let root = tempfile::tempdir().unwrap();
        let _ = SessionDir::create(root.path(), "a/b");
    }
}
