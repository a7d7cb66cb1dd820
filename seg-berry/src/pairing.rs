//! 图像与掩膜文件名的归一化与配对.
//!
//! 生产方导出的掩膜文件名往往带有 `mask_`/`_pred` 之类的修饰,
//! 与底图文件名并不严格一致. 配对以归一化后的名字 **完全相等**
//! 为准; 配不上的文件被静默丢弃, 只有整个批次一对都配不上才算错误.

use crate::consts::{KNOWN_PREFIXES, KNOWN_SUFFIXES};
use itertools::Itertools;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// 归一化一个文件名主干.
///
/// 依次执行: 转小写; 按 [`KNOWN_PREFIXES`] 表内顺序剥除 **至多一个**
/// 前缀 (表内较长的 `mask_` 先于 `m_` 被检查); 再按 [`KNOWN_SUFFIXES`]
/// 表内顺序剥除 **至多一个** 后缀.
pub fn normalize_name(name: &str) -> String {
    let mut n = name.to_lowercase();
    for prefix in KNOWN_PREFIXES {
        if let Some(rest) = n.strip_prefix(prefix) {
            n = rest.to_owned();
            break;
        }
    }
    for suffix in KNOWN_SUFFIXES {
        if let Some(rest) = n.strip_suffix(suffix) {
            n = rest.to_owned();
            break;
        }
    }
    n
}

/// 一对按归一化名字配上的底图与掩膜文件.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedPair {
    /// 归一化后的公共名字, 作为这一对在会话内的标识.
    pub name: String,

    /// 底图 (噪声图像) 文件路径.
    pub image: PathBuf,

    /// 掩膜文件路径.
    pub mask: PathBuf,
}

/// 归一化后两侧文件名集合没有任何交集.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoMatch {
    /// 参与配对的图像文件个数.
    pub images: usize,

    /// 参与配对的掩膜文件个数.
    pub masks: usize,
}

impl fmt::Display for NoMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "归一化后没有任何可配对的图像/掩膜文件名 (图像 {} 个, 掩膜 {} 个)",
            self.images, self.masks
        )
    }
}

impl Error for NoMatch {}

/// 把 `文件名主干 -> 路径` 的两张表按归一化名字配对.
///
/// 返回的配对按名字升序排列. 归一化后主干冲突时保留任意一个
/// (与生产方导出同名文件的行为一致, 不视为错误). 配不上的文件被
/// 静默丢弃; 交集为空时返回 [`NoMatch`].
pub fn pair_by_name(
    images: &HashMap<String, PathBuf>,
    masks: &HashMap<String, PathBuf>,
) -> Result<Vec<NamedPair>, NoMatch> {
    let normalized_images: HashMap<String, &PathBuf> = images
        .iter()
        .map(|(k, v)| (normalize_name(k), v))
        .collect();
    let normalized_masks: HashMap<String, &PathBuf> = masks
        .iter()
        .map(|(k, v)| (normalize_name(k), v))
        .collect();

    let pairs: Vec<NamedPair> = normalized_images
        .iter()
        .filter_map(|(name, image)| {
            normalized_masks.get(name).map(|mask| NamedPair {
                name: name.clone(),
                image: (*image).clone(),
                mask: (*mask).clone(),
            })
        })
        .sorted_by(|a, b| a.name.cmp(&b.name))
        .collect();

    if pairs.is_empty() {
        return Err(NoMatch {
            images: images.len(),
            masks: masks.len(),
        });
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::{normalize_name, pair_by_name, NoMatch};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn table<const N: usize>(names: [&str; N]) -> HashMap<String, PathBuf> {
        names
            .iter()
            .map(|n| (n.to_string(), PathBuf::from(format!("{n}.bin"))))
            .collect()
    }

    #[test]
    fn test_normalize_name_basic() {
        assert_eq!(normalize_name("mask_cat01_seg"), "cat01");
        assert_eq!(normalize_name("cat01"), "cat01");
        assert_eq!(normalize_name("pred_dog"), "dog");
        assert_eq!(normalize_name("dog_mask"), "dog");
        assert_eq!(normalize_name("Seg_Fish_OUTPUT"), "fish");
    }

    /// 前缀至多剥除一个, 且较长的 `mask_` 优先于 `m_`.
    #[test]
    fn test_normalize_name_single_strip() {
        // `mask_` 命中后即停, 余下的 `m_` 前缀不再剥除.
        assert_eq!(normalize_name("mask_m_x"), "m_x");
        // `m_` 命中后余下的 `mask_x` 不再剥除.
        assert_eq!(normalize_name("m_mask_x"), "mask_x");
        // 后缀同理.
        assert_eq!(normalize_name("x_mask_seg"), "x_mask");
    }

    #[test]
    fn test_pair_by_name_matches_and_drops() {
        let images = table(["cat01", "dog", "lonely"]);
        let masks = table(["mask_cat01_seg", "dog_mask", "stray_pred"]);

        let pairs = pair_by_name(&images, &masks).unwrap();
        assert_eq!(pairs.len(), 2);
        // 按名字升序.
        assert_eq!(pairs[0].name, "cat01");
        assert_eq!(pairs[1].name, "dog");
        assert_eq!(pairs[0].image, PathBuf::from("cat01.bin"));
        assert_eq!(pairs[0].mask, PathBuf::from("mask_cat01_seg.bin"));
    }

    #[test]
    fn test_pair_by_name_case_folding() {
        let pairs = pair_by_name(&table(["CAT"]), &table(["Mask_cat"])).unwrap();
        assert_eq!(pairs[0].name, "cat");
    }

    /// 交集为空是错误, 且错误携带两侧文件个数.
    #[test]
    fn test_pair_by_name_no_match() {
        let e = pair_by_name(&table(["a", "b"]), &table(["c"])).unwrap_err();
        assert_eq!(e, NoMatch { images: 2, masks: 1 });
        assert!(e.to_string().contains('2'));
    }
}
