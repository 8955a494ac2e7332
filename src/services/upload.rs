//! 图片上传 - 从文件夹加载待处理的原图

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::models::image_record::ImageData;

/// 一张已读取的上传图片
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// 文件名（不含扩展名）
    pub name: String,
    pub image: ImageData,
}

/// 根据扩展名判断 MIME 类型，不支持的格式返回 `None`
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// 读取单张图片
pub async fn load_image(path: &Path) -> Result<UploadedImage> {
    let mime = mime_for_path(path)
        .with_context(|| format!("不支持的图片格式: {}", path.display()))?;

    let bytes = fs::read(path)
        .await
        .with_context(|| format!("无法读取图片: {}", path.display()))?;

    let name = path
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    Ok(UploadedImage {
        name,
        image: ImageData::new(mime, bytes),
    })
}

/// 从文件夹中加载所有支持格式的图片，按文件名排序
pub async fn load_images_from_folder(folder_path: &str) -> Result<Vec<UploadedImage>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if mime_for_path(&path).is_some() {
            paths.push(path);
        } else if path.is_file() {
            tracing::debug!("跳过非图片文件: {}", path.display());
        }
    }
    paths.sort();

    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        match load_image(&path).await {
            Ok(image) => {
                tracing::info!(
                    "已加载: {} ({} 字节)",
                    path.file_name().unwrap_or_default().to_string_lossy(),
                    image.image.len()
                );
                images.push(image);
            }
            Err(e) => {
                tracing::warn!("加载图片失败 {}: {}", path.display(), e);
            }
        }
    }

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("a/ring.JPG")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("b.webp")), Some("image/webp"));
        assert_eq!(mime_for_path(Path::new("notes.txt")), None);
        assert_eq!(mime_for_path(Path::new("noext")), None);
    }

    #[tokio::test]
    async fn test_load_folder_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b_ring.png"), [1u8, 2, 3]).unwrap();
        std::fs::write(dir.path().join("a_necklace.jpg"), [4u8, 5]).unwrap();
        std::fs::write(dir.path().join("readme.txt"), "hi").unwrap();

        let images = load_images_from_folder(dir.path().to_str().unwrap())
            .await
            .unwrap();

        let names: Vec<_> = images.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a_necklace", "b_ring"]);
        assert_eq!(images[0].image.mime_type, "image/jpeg");
        assert_eq!(images[1].image.bytes.as_ref(), &[1u8, 2, 3]);
    }

    #[tokio::test]
    async fn test_missing_folder_errors() {
        assert!(load_images_from_folder("/definitely/not/here").await.is_err());
    }
}
