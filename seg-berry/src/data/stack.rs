//! 规范化的多实例二值掩膜栈.

use super::error::ShapeError;
use crate::consts::INSTANCE_AXIS_PIVOT;
use crate::Idx2d;
use ndarray::iter::AxisIter;
use ndarray::{Array3, ArrayView2, ArrayView3, ArrayViewD, Axis, Ix2, Ix3};
use num::Zero;

/// 规范化后的 `(N, H, W)` 二值掩膜栈.
///
/// 像素值只取 `{0, 1}`. 第 0 轴为实例轴. 该结构是只读的:
/// 所有变换都返回新的栈, 而不原地修改.
///
/// 实例个数在构建时 **不做** 上限检查; 编码阶段
/// ([`crate::data::codec::encode`]) 才会拒绝超出
/// [`crate::consts::MAX_INSTANCES`] 的栈.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskStack {
    /// 底层数据, 值域 `{0, 1}`.
    data: Array3<u8>,
}

impl MaskStack {
    /// 把任意秩 2/3 的数值数组规范化为 `(N, H, W)` 掩膜栈.
    ///
    /// 规则:
    ///
    /// 1. 秩 2 的 `(H, W)` 输入视为单实例, 得到 `(1, H, W)`;
    /// 2. 秩 3 的 `(A, B, C)` 输入需要启发式推断实例轴:
    ///    若 `A > 50` 且 `B <= 50 || C <= 50`, 认为生产方把实例轴放在了
    ///    最后, 将最后一轴提前, 得到 `(C, A, B)`; 否则按原序保留.
    ///    启发式依据的是 "实例个数小, 空间尺寸大" 的不对称性, 存在
    ///    误判可能 (如 40x40 图像上的 60 实例掩膜), 对这类生产方应改用
    ///    [`MaskStack::normalize_with_axis`] 显式指定实例轴;
    /// 3. 任意非零元素二值化为 1. 软掩膜/概率掩膜的小数信息在此被丢弃;
    /// 4. 其余秩返回 [`ShapeError::BadRank`].
    ///
    /// 全零实例是合法输入; 1x1 或 Nx1 的退化空间形状同样走一般路径.
    pub fn normalize<A: Zero>(raw: ArrayViewD<'_, A>) -> Result<Self, ShapeError> {
        match raw.ndim() {
            2 => {
                let plane = raw
                    .into_dimensionality::<Ix2>()
                    .expect("秩已检查为 2");
                let data = plane.map(binarize).insert_axis(Axis(0));
                Ok(Self { data })
            }
            3 => {
                let stack = raw
                    .into_dimensionality::<Ix3>()
                    .expect("秩已检查为 3");
                let (a, b, c) = stack.dim();
                let instances_last =
                    a > INSTANCE_AXIS_PIVOT && (b <= INSTANCE_AXIS_PIVOT || c <= INSTANCE_AXIS_PIVOT);
                let stack = if instances_last {
                    // (A, B, C) -> (C, A, B)
                    stack.permuted_axes([2, 0, 1])
                } else {
                    stack
                };
                Ok(Self {
                    data: stack.map(binarize),
                })
            }
            _ => Err(ShapeError::BadRank(raw.shape().to_vec())),
        }
    }

    /// 跳过启发式, 显式指定秩 3 输入的实例轴并规范化.
    ///
    /// `instance_axis` 是输入数组中实例轴的下标, 必须小于 3;
    /// 其余两轴保持原有相对顺序作为 `(H, W)`. 输入秩不为 3 时返回
    /// [`ShapeError::BadRank`].
    pub fn normalize_with_axis<A: Zero>(
        raw: ArrayViewD<'_, A>,
        instance_axis: usize,
    ) -> Result<Self, ShapeError> {
        if raw.ndim() != 3 {
            return Err(ShapeError::BadRank(raw.shape().to_vec()));
        }
        if instance_axis >= 3 {
            return Err(ShapeError::AxisOutOfRange {
                axis: instance_axis,
                ndim: 3,
            });
        }
        let stack = raw
            .into_dimensionality::<Ix3>()
            .expect("秩已检查为 3");
        let perm = match instance_axis {
            0 => [0, 1, 2],
            1 => [1, 0, 2],
            _ => [2, 0, 1],
        };
        Ok(Self {
            data: stack.permuted_axes(perm).map(binarize),
        })
    }

    /// 从已经二值化的 `(N, H, W)` 数组直接构建.
    ///
    /// 非零元素一律视作 1.
    pub fn from_binary(data: Array3<u8>) -> Self {
        Self {
            data: data.map(|&p| u8::from(p != 0)),
        }
    }

    /// 实例个数 `N`.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// 是否不含任何实例.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 空间形状 `(H, W)`.
    #[inline]
    pub fn spatial_shape(&self) -> Idx2d {
        let (_, h, w) = self.data.dim();
        (h, w)
    }

    /// 获得底层数据的一份轻量级视图.
    #[inline]
    pub fn view(&self) -> ArrayView3<u8> {
        self.data.view()
    }

    /// 第 `i` 个实例的二维掩膜视图. 越界时返回 `None`.
    #[inline]
    pub fn instance(&self, i: usize) -> Option<ArrayView2<u8>> {
        (i < self.len()).then(|| self.data.index_axis(Axis(0), i))
    }

    /// 按实例下标升序迭代所有二维掩膜.
    #[inline]
    pub fn instances(&self) -> AxisIter<'_, u8, Ix2> {
        self.data.axis_iter(Axis(0))
    }

    /// 取回底层数组所有权.
    #[inline]
    pub fn into_inner(self) -> Array3<u8> {
        self.data
    }
}

/// 非零判定, 即掩膜的二值化规则.
#[inline]
fn binarize<A: Zero>(v: &A) -> u8 {
    u8::from(!v.is_zero())
}
