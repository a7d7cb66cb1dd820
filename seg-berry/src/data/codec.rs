//! 掩膜栈与标签图之间的编解码.
//!
//! 编码是保序的: 实例按下标升序写入, 重叠像素由 **后写者获胜**.
//! 该规则是刻意选择的简单顺序策略, 而非最大值/优先级合并; 已导出的
//! 标签文件依赖这一确定性先后关系, 实现时必须原样保持.

use super::error::{InconsistentLabels, TooManyInstances};
use super::label::LabelMap;
use super::stack::MaskStack;
use crate::consts::{label, MAX_INSTANCES};
use ndarray::{Array2, Array3, Zip};

/// 解码结果: 还原出的掩膜栈, 以及可能的越界标签警告.
#[derive(Debug, Clone)]
pub struct Decoded {
    /// 还原出的 `(N, H, W)` 掩膜栈.
    pub masks: MaskStack,

    /// 若标签图含有超出声明实例数的像素值, 此处携带警告详情.
    /// 这些像素不属于任何已知实例, 但不视为错误.
    pub warning: Option<InconsistentLabels>,
}

/// 把掩膜栈拍平为单张标签图.
///
/// 实例 `i` 的所有真值像素被赋为标签 `i + 1`, 无条件覆盖之前的
/// 赋值 (下标升序, 后写者获胜). 输出形状等于输入的空间形状;
/// 只要最后一个非空实例为 `k`, 输出的最大像素值即为 `k + 1`.
///
/// 实例个数超过 [`MAX_INSTANCES`] 时返回 [`TooManyInstances`].
pub fn encode(masks: &MaskStack) -> Result<LabelMap, TooManyInstances> {
    let n = masks.len();
    if n > MAX_INSTANCES {
        return Err(TooManyInstances(n));
    }

    let mut labels = Array2::from_elem(masks.spatial_shape(), label::BACKGROUND);
    for (i, inst) in masks.instances().enumerate() {
        let value = label::of_instance(i);
        Zip::from(&mut labels).and(&inst).for_each(|l, &m| {
            if m != 0 {
                *l = value;
            }
        });
    }
    Ok(LabelMap::from_array(labels))
}

/// 把标签图还原为逐实例的掩膜栈.
///
/// 对 `k in 1..=instances`, 第 `k - 1` 个实例即 `labels == k` 的像素
/// 集合; 值为 0 的像素不属于任何实例. 超出 `instances` 的像素值
/// (客户端画笔新增区域时会出现) 不计入任何实例, 并通过
/// [`Decoded::warning`] 以可恢复的方式上报, 而不是直接失败.
///
/// 对于像素值都落在 `{0..=instances}` 内的标签图, 有
/// `encode(&decode(labels, n)?.masks)? == labels` 的往返稳定性;
/// 含越界值的标签图需要调用方先扩大 `instances` 才能获得该保证.
///
/// `instances` 超过 [`MAX_INSTANCES`] 时返回 [`TooManyInstances`]:
/// 这样的栈在编码侧必然被拒绝, 不应在解码侧被制造出来.
pub fn decode(labels: &LabelMap, instances: usize) -> Result<Decoded, TooManyInstances> {
    if instances > MAX_INSTANCES {
        return Err(TooManyInstances(instances));
    }

    let (h, w) = labels.shape();
    let mut stack = Array3::<u8>::zeros((instances, h, w));
    let mut out_of_range = 0usize;
    let mut max_found = label::BACKGROUND;

    for ((r, c), &p) in labels.view().indexed_iter() {
        max_found = max_found.max(p);
        match label::to_instance(p) {
            None => {}
            Some(i) if i < instances => stack[[i, r, c]] = 1,
            Some(_) => out_of_range += 1,
        }
    }

    let warning = (out_of_range > 0).then_some(InconsistentLabels {
        declared: instances,
        max_found,
        out_of_range,
    });
    Ok(Decoded {
        masks: MaskStack::from_binary(stack),
        warning,
    })
}
