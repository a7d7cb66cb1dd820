//! 上传内容的读入: 目录扫描、掩膜数组反序列化、归档展开.
//!
//! 掩膜一律经 `ndarray-npy` 读入. 该路径只接受稠密的 npy 数组,
//! 结构上不存在反序列化执行代码的通道 (等价于禁用 pickle),
//! 这是一条硬性的信任边界要求, 不是可选配置.

use ndarray::ArrayD;
use ndarray_npy::{ReadNpyError, ReadNpyExt, ReadableElement};
use num::Zero;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io::{self, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use zip::result::ZipError;
use zip::ZipArchive;

/// 读取掩膜 `.npy` 文件的错误.
#[derive(Debug)]
pub enum MaskLoadError {
    /// 底层 I/O 错误.
    Io(PathBuf, io::Error),

    /// 所有受支持的元素类型都读取失败. 携带最后一次尝试的错误.
    UnsupportedNpy(PathBuf, ReadNpyError),
}

impl fmt::Display for MaskLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(path, e) => write!(f, "读取 {} 失败: {e}", path.display()),
            Self::UnsupportedNpy(path, e) => {
                write!(f, "{} 不是受支持的 npy 掩膜数组: {e}", path.display())
            }
        }
    }
}

impl Error for MaskLoadError {}

/// 列出 `dir` 下扩展名 (不区分大小写) 在 `exts` 中的普通文件.
///
/// 返回 `文件名主干 -> 全路径` 的表. `exts` 不带点, 如 `["png", "npy"]`.
/// 子目录不递归.
pub fn list_files_by_ext<P: AsRef<Path>>(
    dir: P,
    exts: &[&str],
) -> io::Result<HashMap<String, PathBuf>> {
    let mut files = HashMap::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let ext_matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| exts.iter().any(|want| want.eq_ignore_ascii_case(e)));
        if !ext_matches {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            files.insert(stem.to_owned(), path);
        }
    }
    Ok(files)
}

/// 以非零判定把某种元素类型的 npy 数组读成 u8 真值数组.
fn read_as<T: ReadableElement + Zero>(bytes: &[u8]) -> Result<ArrayD<u8>, ReadNpyError> {
    let arr = ArrayD::<T>::read_npy(Cursor::new(bytes))?;
    Ok(arr.map(|v| u8::from(!v.is_zero())))
}

/// 读入一个掩膜 `.npy` 文件, 元素一律按非零判定折算为 u8 真值.
///
/// 依次尝试常见的数组元素类型 (bool, u8/i8, u16/i16, u32/i32,
/// u64/i64, f32/f64), 命中第一个即返回. 形状在这里不做检查,
/// 交由 [`crate::MaskStack::normalize`] 统一处理.
pub fn read_mask_npy<P: AsRef<Path>>(path: P) -> Result<ArrayD<u8>, MaskLoadError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| MaskLoadError::Io(path.to_owned(), e))?;

    // bool 没有数值零, 单独处理.
    let mut last = match ArrayD::<bool>::read_npy(Cursor::new(&bytes)) {
        Ok(arr) => return Ok(arr.map(|&b| u8::from(b))),
        Err(e) => e,
    };

    let attempts: [fn(&[u8]) -> Result<ArrayD<u8>, ReadNpyError>; 10] = [
        read_as::<u8>,
        read_as::<i8>,
        read_as::<u16>,
        read_as::<i16>,
        read_as::<u32>,
        read_as::<i32>,
        read_as::<u64>,
        read_as::<i64>,
        read_as::<f32>,
        read_as::<f64>,
    ];
    for attempt in attempts {
        match attempt(&bytes) {
            Ok(arr) => return Ok(arr),
            Err(e) => last = e,
        }
    }
    Err(MaskLoadError::UnsupportedNpy(path.to_owned(), last))
}

/// 展开 zip 归档时的错误.
#[derive(Debug)]
pub enum ExtractError {
    /// 归档本身损坏或条目读取失败.
    Zip(ZipError),

    /// 写出条目内容失败.
    Io(io::Error),
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zip(e) => write!(f, "读取 zip 归档失败: {e}"),
            Self::Io(e) => write!(f, "展开 zip 条目失败: {e}"),
        }
    }
}

impl Error for ExtractError {}

/// 把 zip 归档平铺展开到 `dest` 目录.
///
/// 条目的目录层级被丢弃, 只保留基础文件名 (生产方打包习惯各异,
/// 平铺后配对逻辑才能统一工作); 目录条目与没有基础名的条目跳过.
/// 返回实际写出的文件个数.
pub fn extract_flat<R: Read + Seek, P: AsRef<Path>>(
    reader: R,
    dest: P,
) -> Result<usize, ExtractError> {
    let mut archive = ZipArchive::new(reader).map_err(ExtractError::Zip)?;
    let mut written = 0usize;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(ExtractError::Zip)?;
        if entry.is_dir() {
            continue;
        }
        let Some(filename) = Path::new(entry.name())
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
        else {
            continue;
        };
        let target = dest.as_ref().join(filename);
        let mut out = fs::File::create(&target).map_err(ExtractError::Io)?;
        io::copy(&mut entry, &mut out).map_err(ExtractError::Io)?;
        written += 1;
    }
    Ok(written)
}
