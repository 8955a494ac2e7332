//! 批量导出 - 业务能力层
//!
//! 把带结果图的记录打包成一个 zip：`<前缀>.zip`，
//! 包内文件按顺序命名：`<前缀>_<序号>.<扩展名>`。
//! 先写到同目录下的 `.part` 临时文件，成功后再改名，失败时不会留下半个压缩包。

use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{AppError, AppResult, BusinessError};
use crate::models::image_record::{ImageData, ImageRecord};

/// 按图片编码选择扩展名：png / webp，其余一律 jpg
pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

/// 导出记录的图片
///
/// 出错时直接返回，不会修改传入的记录
///
/// # 参数
/// - `records`: 要导出的记录（没有图片的会被跳过）
/// - `dir`: 压缩包所在目录，不存在时自动创建
/// - `prefix`: 压缩包和包内文件名的前缀
///
/// # 返回
/// 返回压缩包路径
pub async fn export_bundle(
    records: &[ImageRecord],
    dir: &Path,
    prefix: &str,
) -> AppResult<PathBuf> {
    let entries: Vec<(String, ImageData)> = records
        .iter()
        .filter_map(|r| r.display_image())
        .enumerate()
        .map(|(index, image)| {
            let name = format!("{}_{}.{}", prefix, index + 1, extension_for(&image.mime_type));
            (name, image.clone())
        })
        .collect();
    if entries.is_empty() {
        return Err(BusinessError::NothingToExport.into());
    }

    fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::file_write_failed(dir.display().to_string(), e))?;

    let archive_path = dir.join(format!("{}.zip", prefix));
    let partial_path = dir.join(format!("{}.zip.part", prefix));
    let count = entries.len();

    let target = archive_path.clone();
    tokio::task::spawn_blocking(move || write_archive(&partial_path, &target, &entries))
        .await
        .map_err(|e| {
            AppError::file_write_failed(
                archive_path.display().to_string(),
                std::io::Error::other(e),
            )
        })??;

    info!("📦 已导出 {} 张图片到 {}", count, archive_path.display());
    Ok(archive_path)
}

/// 写临时文件再改名；任一步失败都删除临时文件
fn write_archive(partial: &Path, target: &Path, entries: &[(String, ImageData)]) -> AppResult<()> {
    let result = assemble(partial, entries).and_then(|()| {
        std::fs::rename(partial, target)
            .map_err(|e| AppError::file_write_failed(target.display().to_string(), e))
    });

    if result.is_err() {
        let _ = std::fs::remove_file(partial);
    }
    result
}

fn assemble(path: &Path, entries: &[(String, ImageData)]) -> AppResult<()> {
    let display = path.display().to_string();
    let file = std::fs::File::create(path)
        .map_err(|e| AppError::file_write_failed(display.clone(), e))?;

    let mut zip = ZipWriter::new(file);
    for (name, image) in entries {
        // 图片本身已压缩，直接存储
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        zip.start_file(name.as_str(), options)
            .map_err(|e| AppError::file_write_failed(display.clone(), e))?;
        zip.write_all(&image.bytes)
            .map_err(|e| AppError::file_write_failed(display.clone(), e))?;
        debug!("已写入: {}", name);
    }

    zip.finish()
        .map_err(|e| AppError::file_write_failed(display, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FileError;
    use std::io::Read;

    fn succeeded(source: &ImageRecord, mime: &str, byte: u8) -> ImageRecord {
        ImageRecord::derive_loading(source, "t", "l", None)
            .succeeded(ImageData::new(mime, vec![byte, byte, byte]))
    }

    fn archive_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
        let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut entry = archive.by_index(i).unwrap();
                let mut bytes = Vec::new();
                entry.read_to_end(&mut bytes).unwrap();
                (entry.name().to_string(), bytes)
            })
            .collect()
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/WEBP"), "webp");
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("application/octet-stream"), "jpg");
    }

    #[tokio::test]
    async fn test_export_names_sequentially() {
        let dir = tempfile::tempdir().unwrap();
        let source = ImageRecord::original(ImageData::new("image/jpeg", vec![1u8]), "ring");
        let failed = ImageRecord::derive_loading(&source, "t", "l", None).failed("boom");
        let records = vec![
            succeeded(&source, "image/png", 7),
            failed,
            succeeded(&source, "image/webp", 8),
            succeeded(&source, "image/jpeg", 9),
        ];

        let out = dir.path().join("bundle");
        let archive = export_bundle(&records, &out, "jewelry").await.unwrap();

        // 只有一个压缩包
        assert_eq!(archive, out.join("jewelry.zip"));
        assert!(archive.is_file());
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 1);

        let entries = archive_entries(&archive);
        let names: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["jewelry_1.png", "jewelry_2.webp", "jewelry_3.jpg"]);
        assert_eq!(entries[0].1, vec![7u8, 7, 7]);
        assert_eq!(entries[2].1, vec![9u8, 9, 9]);
    }

    #[tokio::test]
    async fn test_failed_export_leaves_no_partial_archive() {
        let dir = tempfile::tempdir().unwrap();
        // 目标位置被一个目录占用，改名会失败
        std::fs::create_dir(dir.path().join("jewelry.zip")).unwrap();

        let source = ImageRecord::original(ImageData::new("image/jpeg", vec![1u8]), "ring");
        let records = vec![succeeded(&source, "image/png", 7)];

        let err = export_bundle(&records, dir.path(), "jewelry").await.unwrap_err();
        assert!(matches!(err, AppError::File(FileError::WriteFailed { .. })));
        assert!(!dir.path().join("jewelry.zip.part").exists());
        assert!(dir.path().join("jewelry.zip").is_dir());
        assert_eq!(records[0].status, crate::models::RecordStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_export_nothing_is_business_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = export_bundle(&[], dir.path(), "x").await.unwrap_err();
        assert!(err.is_business(&BusinessError::NothingToExport));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
