//! 拍照服务 - 业务能力层
//!
//! 只负责"打开摄像头并拍一张"能力。
//! 按 后置 → 前置 → 任意 的顺序尝试打开视频流，第一个成功的生效；
//! 设备异常按异常名称归类成用户能看懂的提示，不做自动重试。

use std::fmt;
use tracing::{debug, info, warn};

use crate::models::image_record::ImageData;

/// 摄像头朝向约束
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    /// 后置摄像头
    Environment,
    /// 前置摄像头
    User,
    /// 不限
    Any,
}

/// 打开视频流时依次尝试的约束
pub const CAPTURE_PREFERENCES: [FacingMode; 3] =
    [FacingMode::Environment, FacingMode::User, FacingMode::Any];

/// 摄像头设备信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub label: String,
}

/// 设备层抛出的原始异常（名称 + 描述）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceException {
    pub name: String,
    pub message: String,
}

impl DeviceException {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// 面向用户的拍照失败类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFailureKind {
    PermissionDenied,
    NotFound,
    /// 设备被占用或硬件错误
    InUse,
    Other,
}

impl CaptureFailureKind {
    /// 按异常名称归类
    pub fn classify(exception_name: &str) -> Self {
        match exception_name {
            "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => {
                CaptureFailureKind::PermissionDenied
            }
            "NotFoundError" | "DevicesNotFoundError" | "OverconstrainedError" => {
                CaptureFailureKind::NotFound
            }
            "NotReadableError" | "TrackStartError" | "AbortError" => CaptureFailureKind::InUse,
            _ => CaptureFailureKind::Other,
        }
    }

    /// 提示文案
    pub fn user_message(self) -> &'static str {
        match self {
            CaptureFailureKind::PermissionDenied => "无法访问摄像头：请在系统设置中允许摄像头权限",
            CaptureFailureKind::NotFound => "未找到可用的摄像头",
            CaptureFailureKind::InUse => "摄像头正被其他程序占用或发生硬件错误",
            CaptureFailureKind::Other => "打开摄像头失败",
        }
    }
}

/// 拍照错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureError {
    pub kind: CaptureFailureKind,
    pub exception: DeviceException,
}

impl From<DeviceException> for CaptureError {
    fn from(exception: DeviceException) -> Self {
        Self {
            kind: CaptureFailureKind::classify(&exception.name),
            exception,
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}: {})",
            self.kind.user_message(),
            self.exception.name,
            self.exception.message
        )
    }
}

impl std::error::Error for CaptureError {}

/// 摄像头设备接口
#[allow(async_fn_in_trait)]
pub trait CaptureDevice {
    type Stream;

    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, DeviceException>;

    async fn open_stream(&self, facing: FacingMode) -> Result<Self::Stream, DeviceException>;

    /// 从视频流截取一帧并编码为图片
    async fn capture_still(&self, stream: &Self::Stream) -> Result<ImageData, DeviceException>;
}

/// 按偏好顺序打开视频流
///
/// # 返回
/// 返回 (视频流, 实际生效的约束)
pub async fn open_preferred<D: CaptureDevice>(
    device: &D,
) -> Result<(D::Stream, FacingMode), CaptureError> {
    let devices = device.enumerate_devices().await?;
    if devices.is_empty() {
        warn!("未检测到摄像头设备");
        return Err(DeviceException::new("NotFoundError", "no video input devices").into());
    }
    debug!("检测到 {} 个摄像头设备", devices.len());

    let mut last_error = None;
    for facing in CAPTURE_PREFERENCES {
        match device.open_stream(facing).await {
            Ok(stream) => {
                info!("📷 摄像头已打开 ({:?})", facing);
                return Ok((stream, facing));
            }
            Err(e) => {
                let error = CaptureError::from(e);
                debug!("约束 {:?} 打开失败: {}", facing, error);
                // 权限被拒时换约束也没用
                if error.kind == CaptureFailureKind::PermissionDenied {
                    return Err(error);
                }
                last_error = Some(error);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        DeviceException::new("NotFoundError", "no capture constraint succeeded").into()
    }))
}

/// 打开摄像头并拍一张照片
pub async fn capture_photo<D: CaptureDevice>(device: &D) -> Result<ImageData, CaptureError> {
    let (stream, _) = open_preferred(device).await?;
    let image = device.capture_still(&stream).await?;
    info!("📷 拍照完成，图片大小: {} 字节", image.len());
    Ok(image)
}
