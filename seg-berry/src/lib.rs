#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 提供成对噪声图像/多实例分割掩膜的配对、规范化、
//! 标签图编解码与会话内持久化的基础算法.
//!
//! 该 crate 的数据变换层 (掩膜栈/标签图) 是纯同步、无状态的:
//! 所有状态都在参数与返回值的数组里, 调用之间不共享可变数据,
//! 外层服务可以按请求自由并行. I/O 协作层 (会话目录、npy 读入、
//! PNG/zip 落盘) 只通过显式传入的 [`SessionDir`] 句柄触碰文件系统.
//!
//! # 注意
//!
//! 1. 掩膜只接受稠密的 npy 数组, 读入路径结构上无法执行任何
//!   反序列化代码. 这是信任边界, 不是可调开关.
//! 2. 在非期望情况下 (契约级误用), 程序会直接 panic, 而不会导致
//!   内存错误. As what Rust promises.
//!
//! # 功能地图
//!
//! ### 掩膜栈规范化 ✅
//!
//! 任意秩 2/3 的数值数组到 `(N, H, W)` 二值栈的规范化, 含实例轴
//! 启发式推断与显式轴覆盖.
//!
//! 实现位于 `src/data/stack.rs`.
//!
//! ### 标签图编解码 ✅
//!
//! `(N, H, W)` 栈与 `(H, W)` u8 标签图之间的确定性互转:
//! 编码按实例下标升序后写者获胜, 上限 254 个实例; 解码按
//! `labels == k` 还原逐实例掩膜, 越界标签值以可恢复警告上报.
//!
//! 实现位于 `src/data/codec.rs`.
//!
//! ### 文件名归一化与配对 ✅
//!
//! 剥除 `mask_`/`_pred` 等修饰后按完全相等配对, 配不上的文件静默
//! 丢弃, 全部配不上才算错误.
//!
//! 实现位于 `src/pairing.rs`.
//!
//! ### 会话工作目录 ✅
//!
//! 每个上传会话一个显式目录句柄, 创建/删除生命周期由调用方掌握,
//! 标识符也由调用方提供.
//!
//! 实现位于 `src/session`.
//!
//! ### 批处理流水线与导出 ✅
//!
//! 配对 -> 读入 -> 规范化 -> 编码 -> 标签 PNG 落盘的整批处理
//! (坏项点名中止), 编辑结果保存, 以及内存 zip 归档导出.
//!
//! 实现位于 `src/batch`.

/// 二维索引 `(高, 宽)`, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引 `(实例, 高, 宽)`.
pub type Idx3d = (usize, usize, usize);

pub mod consts;

pub mod data;

pub use data::{
    read_label_png, ImgWriteRaw, ImgWriteVis, InconsistentLabels, LabelMap, MaskStack, ShapeError,
    SizeMismatch, TooManyInstances,
};

pub mod batch;
pub mod pairing;
pub mod prelude;
pub mod session;
