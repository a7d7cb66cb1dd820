//! 编辑结果的保存与归档导出.
//!
//! 客户端把编辑后的标签作为原始字节缓冲区交回; 这里校验尺寸、落盘
//! 为 `.npy` 与 PNG, 并按需把会话内的产物打包成内存中的 zip 归档.

use crate::data::SizeMismatch;
use crate::session::SessionDir;
use crate::{Idx2d, LabelMap};
use ndarray_npy::{WriteNpyError, WriteNpyExt};
use std::error::Error;
use std::fmt;
use std::fs;
use std::io::{self, Cursor, Write};
use std::path::PathBuf;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// 保存编辑结果的错误.
#[derive(Debug)]
pub enum SaveError {
    /// 标签缓冲区长度与声明的宽高不符.
    Size(SizeMismatch),

    /// 写出 `.npy` 失败.
    Npy(WriteNpyError),

    /// 底层 I/O 错误.
    Io(io::Error),
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Size(e) => write!(f, "{e}"),
            Self::Npy(e) => write!(f, "写出标签 npy 失败: {e}"),
            Self::Io(e) => write!(f, "保存编辑结果失败: {e}"),
        }
    }
}

impl Error for SaveError {}

/// 导出归档的错误.
#[derive(Debug)]
pub enum ExportError {
    /// 目录下没有任何可导出的文件.
    NothingToExport(PathBuf),

    /// 构建 zip 归档失败.
    Zip(ZipError),

    /// 底层 I/O 错误.
    Io(io::Error),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NothingToExport(dir) => {
                write!(f, "{} 下没有可导出的文件", dir.display())
            }
            Self::Zip(e) => write!(f, "构建 zip 归档失败: {e}"),
            Self::Io(e) => write!(f, "导出归档失败: {e}"),
        }
    }
}

impl Error for ExportError {}

/// 一次保存操作落盘的文件.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPair {
    /// 编辑后标签数组的路径.
    pub npy: PathBuf,

    /// 编辑后底图的路径.
    pub image: PathBuf,
}

/// 保存客户端交回的一对编辑结果.
///
/// `label_bytes` 是行主序的标签像素缓冲区, 长度必须等于
/// `shape.0 * shape.1` (不符即 [`SaveError::Size`], 绝不静默重解释).
/// 标签以 u8 二维数组的形式写为 `modified/<name>.npy`
/// (保留标签图本身, 还原逐实例栈交由解码方按需进行);
/// `image_bytes` 按原样写为 `modified/<name>_noisy.png`.
pub fn save_edited(
    session: &SessionDir,
    name: &str,
    label_bytes: &[u8],
    shape: Idx2d,
    image_bytes: &[u8],
) -> Result<SavedPair, SaveError> {
    let labels = LabelMap::from_raw_bytes(label_bytes, shape).map_err(SaveError::Size)?;

    let npy = session.modified_npy_path(name);
    let file = fs::File::create(&npy).map_err(SaveError::Io)?;
    labels.into_inner().write_npy(file).map_err(SaveError::Npy)?;

    let image = session.modified_image_path(name);
    fs::write(&image, image_bytes).map_err(SaveError::Io)?;

    Ok(SavedPair { npy, image })
}

/// 保存橡皮擦页面清理后的一张图像.
///
/// 字节按原样写入 `cleaned/<filename>` (解码 base64 等传输编码是
/// 外层的职责). `filename` 含路径分隔符时程序 panic.
pub fn save_cleaned(session: &SessionDir, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    assert!(
        !filename.is_empty() && !filename.contains(['/', '\\']),
        "清理图文件名不可为空或含路径分隔符: {filename:?}"
    );
    let path = session.cleaned_dir().join(filename);
    fs::write(&path, bytes)?;
    Ok(path)
}

/// 把 `(归档内名字, 磁盘路径)` 列表打成内存中的 deflate zip.
fn zip_files(entries: &[(String, PathBuf)]) -> Result<Vec<u8>, ExportError> {
    let mut cursor = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(&mut cursor);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (arcname, path) in entries {
        let bytes = fs::read(path).map_err(ExportError::Io)?;
        zip.start_file(arcname.as_str(), options)
            .map_err(ExportError::Zip)?;
        zip.write_all(&bytes).map_err(ExportError::Io)?;
    }
    let _ = zip.finish().map_err(ExportError::Zip)?;
    Ok(cursor.into_inner())
}

/// 收集 `dir` 下扩展名符合的普通文件, 按文件名升序.
fn dir_entries(
    dir: PathBuf,
    exts: Option<&[&str]>,
) -> Result<Vec<(String, PathBuf)>, ExportError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(&dir).map_err(ExportError::Io)? {
        let path = entry.map_err(ExportError::Io)?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(exts) = exts {
            let ok = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| exts.iter().any(|want| want.eq_ignore_ascii_case(e)));
            if !ok {
                continue;
            }
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            entries.push((name.to_owned(), path.clone()));
        }
    }
    entries.sort();
    Ok(entries)
}

/// 把 `modified/` 下的全部编辑结果打包成 zip 归档字节.
///
/// 目录为空时返回 [`ExportError::NothingToExport`].
pub fn export_modified(session: &SessionDir) -> Result<Vec<u8>, ExportError> {
    let dir = session.modified_dir();
    let entries = dir_entries(dir.clone(), None)?;
    if entries.is_empty() {
        return Err(ExportError::NothingToExport(dir));
    }
    zip_files(&entries)
}

/// 把 `cleaned/` 下的图像文件打包成 zip 归档字节.
pub fn export_cleaned(session: &SessionDir) -> Result<Vec<u8>, ExportError> {
    let dir = session.cleaned_dir();
    let entries = dir_entries(dir.clone(), Some(&["png", "jpg", "jpeg"]))?;
    if entries.is_empty() {
        return Err(ExportError::NothingToExport(dir));
    }
    zip_files(&entries)
}

/// 把会话内全部标签 PNG 连同各自的原始掩膜 `.npy` (若有) 打包.
///
/// 归档内名字保持 `<name>_label.png` / `<name>.npy`. 没有任何标签
/// PNG 时返回 [`ExportError::NothingToExport`].
pub fn export_labels(session: &SessionDir) -> Result<Vec<u8>, ExportError> {
    let labels_dir = session.labels_dir();
    let mut entries = Vec::new();
    for (filename, path) in dir_entries(labels_dir.clone(), Some(&["png"]))? {
        let Some(base) = filename.strip_suffix("_label.png").map(str::to_owned) else {
            continue;
        };
        let npy = session.masks_dir().join(format!("{base}.npy"));
        entries.push((filename, path));
        if npy.is_file() {
            entries.push((format!("{base}.npy"), npy));
        }
    }
    if entries.is_empty() {
        return Err(ExportError::NothingToExport(labels_dir));
    }
    zip_files(&entries)
}

/// 导出单对产物: `<name>_label.png` 加上 `<name>.npy` (若有).
///
/// `.npy` 优先取上传的原始掩膜, 其次取编辑后保存的版本.
pub fn export_pair(session: &SessionDir, name: &str) -> Result<Vec<u8>, ExportError> {
    let mut entries = Vec::new();
    let label = session.label_png_path(name);
    if label.is_file() {
        entries.push((format!("{name}_label.png"), label));
    }
    let uploaded = session.masks_dir().join(format!("{name}.npy"));
    let npy = if uploaded.is_file() {
        uploaded
    } else {
        session.modified_npy_path(name)
    };
    if npy.is_file() {
        entries.push((format!("{name}.npy"), npy));
    }
    if entries.is_empty() {
        return Err(ExportError::NothingToExport(session.labels_dir()));
    }
    zip_files(&entries)
}

#[cfg(test)]
mod tests {
    use super::{
        export_labels, export_modified, export_pair, save_cleaned, save_edited, ExportError,
        SaveError,
    };
    use crate::session::SessionDir;
    use ndarray::Array2;
    use ndarray_npy::ReadNpyExt;
    use std::fs;
    use std::io::Cursor;

    fn session() -> (tempfile::TempDir, SessionDir) {
        let root = tempfile::tempdir().unwrap();
        let s = SessionDir::create(root.path(), "t").unwrap();
        (root, s)
    }

    #[test]
    fn test_save_edited_round_trip() {
        let (_root, s) = session();
        let saved = save_edited(&s, "cat", &[0, 1, 2, 0, 0, 2], (2, 3), b"png-bytes").unwrap();

        let back = Array2::<u8>::read_npy(fs::File::open(&saved.npy).unwrap()).unwrap();
        assert_eq!(back, Array2::from_shape_vec((2, 3), vec![0, 1, 2, 0, 0, 2]).unwrap());
        assert_eq!(fs::read(&saved.image).unwrap(), b"png-bytes");
    }

    /// 少一个字节也要报错.
    #[test]
    fn test_save_edited_size_mismatch() {
        let (_root, s) = session();
        let e = save_edited(&s, "cat", &[0; 5], (2, 3), b"png").unwrap_err();
        match e {
            SaveError::Size(size) => {
                assert_eq!(size.expected, 6);
                assert_eq!(size.got, 5);
            }
            other => panic!("期望尺寸错误, 实际 {other:?}"),
        }
    }

    #[test]
    fn test_export_modified() {
        let (_root, s) = session();

        let e = export_modified(&s).unwrap_err();
        assert!(matches!(e, ExportError::NothingToExport(_)));

        save_edited(&s, "cat", &[1, 2], (1, 2), b"img").unwrap();
        let bytes = export_modified(&s).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_owned())
            .collect();
        assert_eq!(names, ["cat.npy", "cat_noisy.png"]);
    }

    #[test]
    fn test_export_pair() {
        let (_root, s) = session();
        let e = export_pair(&s, "cat").unwrap_err();
        assert!(matches!(e, ExportError::NothingToExport(_)));

        fs::write(s.label_png_path("cat"), b"label").unwrap();
        save_edited(&s, "cat", &[0], (1, 1), b"img").unwrap();

        let bytes = export_pair(&s, "cat").unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"cat_label.png"));
        assert!(names.contains(&"cat.npy"));
    }

    #[test]
    fn test_export_labels_with_source_npy() {
        let (_root, s) = session();
        fs::write(s.label_png_path("cat"), b"label").unwrap();
        fs::write(s.masks_dir().join("cat.npy"), b"npy").unwrap();
        fs::write(s.label_png_path("dog"), b"label").unwrap();

        let bytes = export_labels(&s).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains(&"cat_label.png"));
        assert!(names.contains(&"cat.npy"));
        assert!(names.contains(&"dog_label.png"));
    }

    #[test]
    fn test_save_cleaned() {
        let (_root, s) = session();
        let p = save_cleaned(&s, "tidy.png", b"bytes").unwrap();
        assert_eq!(fs::read(p).unwrap(), b"bytes");
    }
}
