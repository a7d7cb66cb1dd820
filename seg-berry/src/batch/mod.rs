//! 上传批次的处理流水线.
//!
//! 一个批次 = 一个会话目录下已就位的底图与掩膜文件. 流水线按
//! 配对 -> 读入 -> 规范化 -> 编码 -> 落盘标签 PNG 的顺序处理每一对,
//! 并产出供外层直接序列化返回的预览记录.
//!
//! 任何一对出错都会携带该对的名字中止整个批次, 而不是吞掉错误
//! 继续; 改为跳过坏项的部分成功语义需要产品侧先行确认.

pub mod export;
pub mod ingest;

use crate::consts::MAX_PREVIEW_PAIRS;
use crate::data::codec;
use crate::data::{ImgWriteRaw, ShapeError, TooManyInstances};
use crate::pairing::{pair_by_name, NamedPair, NoMatch};
use crate::session::SessionDir;
use crate::MaskStack;
use ingest::MaskLoadError;
use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 底图扩展名白名单.
pub const IMAGE_EXTS: [&str; 3] = ["png", "jpg", "jpeg"];

/// 掩膜扩展名白名单.
pub const MASK_EXTS: [&str; 1] = ["npy"];

/// 一对图像/掩膜处理完成后的预览记录.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PairPreview {
    /// 归一化后的公共名字.
    pub name: String,

    /// 标签图宽度 (像素).
    pub width: usize,

    /// 标签图高度 (像素).
    pub height: usize,

    /// 最大标签值, 即预览可见的实例个数.
    pub instances: u8,

    /// 底图在会话目录内的路径.
    pub image_path: PathBuf,

    /// 编码出的标签 PNG 路径.
    pub label_path: PathBuf,
}

/// 处理单对时的错误原因.
#[derive(Debug)]
pub enum ItemError {
    /// 掩膜文件读取/反序列化失败.
    Load(MaskLoadError),

    /// 掩膜数组的秩不合法.
    Shape(ShapeError),

    /// 实例个数超出标签图上限.
    TooMany(TooManyInstances),

    /// 标签 PNG 写出失败.
    LabelPng(image::ImageError),
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load(e) => write!(f, "{e}"),
            Self::Shape(e) => write!(f, "{e}"),
            Self::TooMany(e) => write!(f, "{e}"),
            Self::LabelPng(e) => write!(f, "写出标签 PNG 失败: {e}"),
        }
    }
}

/// 批处理错误.
#[derive(Debug)]
pub enum BatchError {
    /// 归一化后没有任何可配对的文件名.
    NoMatch(NoMatch),

    /// 扫描会话目录失败.
    Io(io::Error),

    /// 某一对处理失败. 批次在该项上中止.
    Item {
        /// 出错那一对的归一化名字.
        name: String,
        /// 具体原因.
        source: ItemError,
    },
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatch(e) => write!(f, "{e}"),
            Self::Io(e) => write!(f, "扫描会话目录失败: {e}"),
            Self::Item { name, source } => write!(f, "处理 {name} 失败: {source}"),
        }
    }
}

impl Error for BatchError {}

/// 处理一对: 读入掩膜, 规范化, 编码, 落盘标签 PNG.
fn process_pair(session: &SessionDir, pair: &NamedPair) -> Result<PairPreview, BatchError> {
    let item = |source| BatchError::Item {
        name: pair.name.clone(),
        source,
    };

    let raw = ingest::read_mask_npy(&pair.mask).map_err(|e| item(ItemError::Load(e)))?;
    let stack =
        MaskStack::normalize(raw.view()).map_err(|e| item(ItemError::Shape(e)))?;
    let labels = codec::encode(&stack).map_err(|e| item(ItemError::TooMany(e)))?;

    let label_path = session.label_png_path(&pair.name);
    labels
        .save_raw(&label_path)
        .map_err(|e| item(ItemError::LabelPng(e)))?;

    let (height, width) = labels.shape();
    Ok(PairPreview {
        name: pair.name.clone(),
        width,
        height,
        instances: labels.max_label(),
        image_path: pair.image.clone(),
        label_path,
    })
}

/// 处理一个上传批次.
///
/// 扫描会话的 `images/` 与 `masks/` 目录, 按归一化文件名配对,
/// 至多取前 [`MAX_PREVIEW_PAIRS`] 对 (名字升序), 然后逐对编码并把
/// 标签 PNG 写入 `labels/`. 返回的预览记录与配对顺序一致.
///
/// 启用 `rayon` feature 时逐对工作并行执行; 出错时报告配对顺序中
/// 最靠前的失败项, 与串行路径一致.
pub fn process_batch(session: &SessionDir) -> Result<Vec<PairPreview>, BatchError> {
    let images =
        ingest::list_files_by_ext(session.images_dir(), &IMAGE_EXTS).map_err(BatchError::Io)?;
    let masks =
        ingest::list_files_by_ext(session.masks_dir(), &MASK_EXTS).map_err(BatchError::Io)?;

    let mut pairs = pair_by_name(&images, &masks).map_err(BatchError::NoMatch)?;
    pairs.truncate(MAX_PREVIEW_PAIRS);

    run_pairs(session, &pairs)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        /// 逐对执行, 并行版. 先收齐所有结果再按配对顺序取第一个
        /// 失败项, 保证报告的错误与串行路径一致.
        fn run_pairs(
            session: &SessionDir,
            pairs: &[NamedPair],
        ) -> Result<Vec<PairPreview>, BatchError> {
            use rayon::prelude::*;

            let results: Vec<Result<PairPreview, BatchError>> = pairs
                .par_iter()
                .map(|pair| process_pair(session, pair))
                .collect();
            results.into_iter().collect()
        }
    } else {
        /// 逐对执行, 串行版.
        fn run_pairs(
            session: &SessionDir,
            pairs: &[NamedPair],
        ) -> Result<Vec<PairPreview>, BatchError> {
            pairs.iter().map(|pair| process_pair(session, pair)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{process_batch, BatchError, ItemError};
    use crate::data::read_label_png;
    use crate::session::SessionDir;
    use ndarray::{Array2, Array3};
    use ndarray_npy::WriteNpyExt;
    use std::fs;
    use std::path::Path;

    fn session() -> (tempfile::TempDir, SessionDir) {
        let root = tempfile::tempdir().unwrap();
        let s = SessionDir::create(root.path(), "t").unwrap();
        (root, s)
    }

    fn write_npy_3d(path: &Path, data: Array3<u8>) {
        data.write_npy(fs::File::create(path).unwrap()).unwrap();
    }

    #[test]
    fn test_process_batch_end_to_end() {
        let (_root, s) = session();

        // 底图只要存在即可, 流水线不读其内容.
        fs::write(s.images_dir().join("cat01.png"), b"img").unwrap();
        fs::write(s.images_dir().join("dog.jpeg"), b"img").unwrap();
        fs::write(s.images_dir().join("unpaired.png"), b"img").unwrap();

        let mut cat = Array3::<u8>::zeros((2, 3, 4));
        cat[[0, 0, 0]] = 1;
        cat[[1, 0, 0]] = 1; // 与实例 0 重叠, 后写者获胜
        cat[[1, 2, 3]] = 5; // 非零即真
        write_npy_3d(&s.masks_dir().join("mask_cat01_seg.npy"), cat);

        let mut dog = Array2::<u8>::zeros((5, 5));
        dog[[4, 4]] = 1;
        dog.write_npy(fs::File::create(s.masks_dir().join("dog_mask.npy")).unwrap())
            .unwrap();

        let previews = process_batch(&s).unwrap();
        assert_eq!(previews.len(), 2);

        assert_eq!(previews[0].name, "cat01");
        assert_eq!((previews[0].height, previews[0].width), (3, 4));
        assert_eq!(previews[0].instances, 2);

        assert_eq!(previews[1].name, "dog");
        assert_eq!(previews[1].instances, 1);

        // 落盘的标签 PNG 原样保留标签值.
        let labels = read_label_png(&previews[0].label_path).unwrap();
        assert_eq!(labels.get((0, 0)), Some(2));
        assert_eq!(labels.get((2, 3)), Some(2));
        assert_eq!(labels.get((1, 1)), Some(0));

        let labels = read_label_png(&previews[1].label_path).unwrap();
        assert_eq!(labels.get((4, 4)), Some(1));
    }

    /// 坏掩膜中止批次, 错误点名具体的配对.
    #[test]
    fn test_process_batch_aborts_on_bad_item() {
        let (_root, s) = session();
        fs::write(s.images_dir().join("aaa.png"), b"img").unwrap();
        fs::write(s.images_dir().join("bbb.png"), b"img").unwrap();
        fs::write(s.masks_dir().join("aaa.npy"), b"not an npy").unwrap();
        write_npy_3d(
            &s.masks_dir().join("bbb.npy"),
            Array3::<u8>::zeros((1, 2, 2)),
        );

        let e = process_batch(&s).unwrap_err();
        match e {
            BatchError::Item { name, source } => {
                assert_eq!(name, "aaa");
                assert!(matches!(source, ItemError::Load(_)));
            }
            other => panic!("期望单项错误, 实际 {other:?}"),
        }
    }

    /// 实例个数超限同样按单项错误上报.
    #[test]
    fn test_process_batch_too_many_instances() {
        let (_root, s) = session();
        fs::write(s.images_dir().join("big.png"), b"img").unwrap();
        // 秩 3 且第一轴不超过枢轴的形状不会被启发式换轴; 255 个实例
        // 需要空间轴也大于枢轴才能测到编码侧的上限检查.
        write_npy_3d(
            &s.masks_dir().join("big.npy"),
            Array3::<u8>::zeros((255, 51, 51)),
        );

        let e = process_batch(&s).unwrap_err();
        match e {
            BatchError::Item { name, source } => {
                assert_eq!(name, "big");
                assert!(matches!(source, ItemError::TooMany(_)));
            }
            other => panic!("期望单项错误, 实际 {other:?}"),
        }
    }

    #[test]
    fn test_process_batch_no_match() {
        let (_root, s) = session();
        fs::write(s.images_dir().join("a.png"), b"img").unwrap();
        write_npy_3d(&s.masks_dir().join("z.npy"), Array3::<u8>::zeros((1, 2, 2)));

        let e = process_batch(&s).unwrap_err();
        assert!(matches!(e, BatchError::NoMatch(_)));
    }

    /// 预览对数被截断到上限.
    #[test]
    fn test_process_batch_preview_cap() {
        let (_root, s) = session();
        for i in 0..52 {
            let name = format!("p{i:03}");
            fs::write(s.images_dir().join(format!("{name}.png")), b"img").unwrap();
            Array2::<u8>::ones((1, 1))
                .write_npy(fs::File::create(s.masks_dir().join(format!("{name}.npy"))).unwrap())
                .unwrap();
        }

        let previews = process_batch(&s).unwrap();
        assert_eq!(previews.len(), crate::consts::MAX_PREVIEW_PAIRS);
        // 截断保留名字升序中靠前的部分.
        assert_eq!(previews[0].name, "p000");
        assert_eq!(previews[49].name, "p049");
    }
}
