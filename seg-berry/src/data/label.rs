//! 单通道标签图.

use super::error::SizeMismatch;
use crate::consts::label::BACKGROUND;
use crate::Idx2d;
use ndarray::{Array2, ArrayView2};

/// `(H, W)` 的 8-bit 标签图.
///
/// 像素值语义: `0` 为背景, `k` (1..=254) 表示该像素属于第 `k - 1`
/// 个实例. 标签图是客户端编辑与持久化的基本单元; 序列化时像素值
/// 必须原样保留 (0-254), 不允许缩放或归一化.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    /// 底层数据.
    data: Array2<u8>,
}

impl LabelMap {
    /// 全背景标签图.
    #[inline]
    pub fn background(shape: Idx2d) -> Self {
        Self {
            data: Array2::from_elem(shape, BACKGROUND),
        }
    }

    /// 从现成的二维数组构建.
    #[inline]
    pub fn from_array(data: Array2<u8>) -> Self {
        Self { data }
    }

    /// 从行主序的原始字节缓冲区构建.
    ///
    /// `bytes` 的长度必须恰好等于 `h * w`; 不符时返回携带
    /// 期望/实际字节数的 [`SizeMismatch`], 而不是静默地重解释.
    pub fn from_raw_bytes(bytes: &[u8], (h, w): Idx2d) -> Result<Self, SizeMismatch> {
        let expected = h * w;
        if bytes.len() != expected {
            return Err(SizeMismatch {
                expected,
                got: bytes.len(),
                height: h,
                width: w,
            });
        }
        let data = Array2::from_shape_vec((h, w), bytes.to_vec())
            .expect("长度已与形状核对");
        Ok(Self { data })
    }

    /// 形状 `(H, W)`.
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 最大标签像素值. 至少有一个实例像素时等于栈内非空实例的最高标签.
    #[inline]
    pub fn max_label(&self) -> u8 {
        self.data.iter().copied().max().unwrap_or(BACKGROUND)
    }

    /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<u8> {
        self.data.get(pos).copied()
    }

    /// 获得底层数据的一份轻量级视图.
    #[inline]
    pub fn view(&self) -> ArrayView2<u8> {
        self.data.view()
    }

    /// 取回底层数组所有权.
    #[inline]
    pub fn into_inner(self) -> Array2<u8> {
        self.data
    }
}
