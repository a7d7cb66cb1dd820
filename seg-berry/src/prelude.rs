//! 🫐欢迎光临🫐
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::data::codec::{decode, encode, Decoded};
pub use crate::data::{
    ImgWriteRaw, ImgWriteVis, InconsistentLabels, LabelMap, MaskStack, ShapeError, SizeMismatch,
    TooManyInstances,
};

pub use crate::consts::{label::BACKGROUND, INSTANCE_AXIS_PIVOT, MAX_INSTANCES, MAX_PREVIEW_PAIRS};

pub use crate::pairing::{normalize_name, pair_by_name, NamedPair};

pub use crate::batch::{process_batch, PairPreview};
pub use crate::session::{home_session_root, SessionDir};
