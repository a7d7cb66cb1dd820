//! 标签图的持久化存储与读回.

use super::label::LabelMap;
use image::{GrayImage, ImageResult};
use std::path::Path;

/// 表明一个可以通过 **按原样** 模式持久化存储的图像对象.
///
/// 对于标签图, "按原样" 意味着 0-254 的像素值被逐一保留,
/// 不做任何缩放或归一化. 这是与客户端编辑器交换数据的唯一格式:
/// 客户端读到的每个灰度值就是标签值本身.
pub trait ImgWriteRaw {
    /// 按原样将图片保存到 `path` 路径.
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// 标签值 1..=N 在 0-255 灰度区间内被均匀拉开, 便于肉眼检查.
/// 该格式仅用于调试观察, 不可用于数据交换.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

impl LabelMap {
    /// 转换为单通道灰度图, 像素值原样保留.
    pub fn to_gray_image(&self) -> GrayImage {
        let (height, width) = self.shape();
        let mut buf = GrayImage::new(width as u32, height as u32);
        for ((h, w), &pix) in self.view().indexed_iter() {
            buf.put_pixel(w as u32, h as u32, image::Luma([pix]));
        }
        buf
    }

    /// 从解码后的单通道灰度图构建, 像素值原样采纳.
    pub fn from_gray_image(img: &GrayImage) -> Self {
        let (width, height) = img.dimensions();
        let data = ndarray::Array2::from_shape_vec(
            (height as usize, width as usize),
            img.as_raw().clone(),
        )
        .expect("灰度图缓冲区长度与宽高一致");
        Self::from_array(data)
    }
}

impl ImgWriteRaw for LabelMap {
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        self.to_gray_image().save(path)
    }
}

impl ImgWriteVis for LabelMap {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let max = self.max_label();
        let (height, width) = self.shape();
        let mut buf = GrayImage::new(width as u32, height as u32);
        if max > 0 {
            let step = 255.0 / f32::from(max);
            for ((h, w), &pix) in self.view().indexed_iter() {
                let vis = (f32::from(pix) * step).round().min(255.0) as u8;
                buf.put_pixel(w as u32, h as u32, image::Luma([vis]));
            }
        }
        buf.save(path)
    }
}

/// 从 `path` 读入单通道标签 PNG.
///
/// 多通道输入会按亮度折算为单通道; 与客户端交换的文件应当本来就是
/// 单通道灰度 PNG, 折算只是对不规范输入的兜底.
pub fn read_label_png<P: AsRef<Path>>(path: P) -> ImageResult<LabelMap> {
    let img = image::open(path)?.into_luma8();
    Ok(LabelMap::from_gray_image(&img))
}
