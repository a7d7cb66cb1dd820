//! 掩膜/标签数据层的运行时错误.
//!
//! 错误信息必须携带出错的形状/个数, 以便外层直接面向用户展示.

use std::error::Error;
use std::fmt;

/// 输入数组的秩或维度不符合要求.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// 掩膜数组的秩必须为 2 或 3. 参数为实际形状.
    BadRank(Vec<usize>),

    /// 显式指定的实例轴超出了数组的秩.
    AxisOutOfRange {
        /// 指定的实例轴.
        axis: usize,
        /// 数组实际的秩.
        ndim: usize,
    },
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRank(shape) => {
                write!(f, "掩膜数组的秩必须为 2 或 3, 但实际形状为 {shape:?}")
            }
            Self::AxisOutOfRange { axis, ndim } => {
                write!(f, "实例轴 {axis} 超出数组秩 {ndim}")
            }
        }
    }
}

impl Error for ShapeError {}

/// 掩膜栈的实例个数超出了标签图可编码的上限.
///
/// 参数为实际的实例个数.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TooManyInstances(pub usize);

impl fmt::Display for TooManyInstances {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "掩膜栈包含 {} 个实例, 超出上限 {}",
            self.0,
            crate::consts::MAX_INSTANCES
        )
    }
}

impl Error for TooManyInstances {}

/// 标签字节缓冲区的长度与声明的宽高不符.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeMismatch {
    /// 期望的字节数, 即 `height * width`.
    pub expected: usize,

    /// 实际收到的字节数.
    pub got: usize,

    /// 声明的高.
    pub height: usize,

    /// 声明的宽.
    pub width: usize,
}

impl fmt::Display for SizeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "标签缓冲区长度不符: 声明 ({} x {}) 需要 {} 字节, 实际收到 {} 字节",
            self.height, self.width, self.expected, self.got
        )
    }
}

impl Error for SizeMismatch {}

/// 解码时发现了超出声明实例范围的标签值.
///
/// 这是一个 **可恢复的警告**, 不是错误: 客户端画笔允许用户引入新的
/// 区域编号, 调用方可通过扩大实例个数或钳制像素值来恢复.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InconsistentLabels {
    /// 解码时声明的实例个数.
    pub declared: usize,

    /// 观察到的最大标签像素值.
    pub max_found: u8,

    /// 超出 `1..=declared` 范围的像素个数.
    pub out_of_range: usize,
}

impl fmt::Display for InconsistentLabels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "标签图含有 {} 个超出声明实例数 {} 的像素 (最大标签值 {})",
            self.out_of_range, self.declared, self.max_found
        )
    }
}
