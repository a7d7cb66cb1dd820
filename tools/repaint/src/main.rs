//! 批量重编码驱动器.
//!
//! 从环境变量指定的两个目录读入底图与掩膜, 建立一次性会话,
//! 跑完整条配对/编码流水线, 最后把标签产物打包成 zip.
//!
//! 环境变量:
//!
//! - `REPAINT_IMAGES`: 底图目录 (必填).
//! - `REPAINT_MASKS`: 掩膜 `.npy` 目录 (必填).
//! - `REPAINT_ROOT`: 会话根目录, 缺省为 `{用户主目录}/seg-sessions`.
//! - `REPAINT_SESSION`: 会话标识, 缺省由进程号和时钟拼出.

use log::{info, warn};
use seg_berry::batch::{export, process_batch};
use seg_berry::prelude::*;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

fn env_dir(key: &str) -> PathBuf {
    let value = env::var_os(key).unwrap_or_else(|| panic!("缺少环境变量 {key}"));
    let path = PathBuf::from(value);
    assert!(path.is_dir(), "{key} 不是目录: {}", path.display());
    path
}

/// 会话标识由驱动器 (调用方) 生成, 库本身不产生任何标识符.
fn session_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("系统时钟早于 UNIX 纪元")
        .subsec_nanos();
    format!("repaint-{}-{nanos}", std::process::id())
}

/// 把 `src` 下的普通文件拷贝进 `dest`.
fn copy_into(src: &Path, dest: &Path) -> std::io::Result<usize> {
    let mut copied = 0usize;
    for entry in fs::read_dir(src)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name() {
            fs::copy(&path, dest.join(name))?;
            copied += 1;
        }
    }
    Ok(copied)
}

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .expect("日志初始化失败");

    let images = env_dir("REPAINT_IMAGES");
    let masks = env_dir("REPAINT_MASKS");
    let root = env::var_os("REPAINT_ROOT")
        .map(PathBuf::from)
        .or_else(home_session_root)
        .expect("既没有 REPAINT_ROOT 也找不到用户主目录");
    let id = env::var("REPAINT_SESSION").unwrap_or_else(|_| session_id());

    let session = SessionDir::create(&root, &id).expect("创建会话目录失败");
    info!("会话 {} @ {}", session.id(), session.path().display());

    let n = copy_into(&images, &session.images_dir()).expect("拷贝底图失败");
    info!("底图 {n} 个");
    let n = copy_into(&masks, &session.masks_dir()).expect("拷贝掩膜失败");
    info!("掩膜 {n} 个");

    let previews = match process_batch(&session) {
        Ok(previews) => previews,
        Err(e) => {
            // 批次在第一个坏项上中止; 错误自带出错项的名字与原因.
            panic!("批处理失败: {e}");
        }
    };

    for p in &previews {
        info!(
            "{}: {}x{}, {} 个实例 -> {}",
            p.name,
            p.width,
            p.height,
            p.instances,
            p.label_path.display()
        );
        if p.instances == 0 {
            warn!("{}: 掩膜全零, 标签图为纯背景", p.name);
        }
    }

    let archive = export::export_labels(&session).expect("打包标签产物失败");
    let out = session.path().join(format!("session_{id}_masks.zip"));
    fs::write(&out, archive).expect("写出归档失败");
    info!("已导出 {} 对标签到 {}", previews.len(), out.display());
}
