//! 风格选项：背景 / 光线 / 材质 / 角度

use phf::phf_map;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 背景
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Background {
    Velvet,
    Marble,
    Abstract,
    #[default]
    WhiteStudio,
    Gradient,
}

/// 光线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Lighting {
    #[default]
    Soft,
    Dramatic,
    Natural,
    HighKey,
    Shadowed,
}

/// 材质（`Auto` 表示保持原材质）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Material {
    #[default]
    Auto,
    Gold,
    Silver,
    Platinum,
}

/// 拍摄角度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Angle {
    Front,
    Side,
    Top,
    ThreeQuarter,
    CloseUp,
    Back,
}

impl Angle {
    pub const ALL: [Angle; 6] = [
        Angle::Front,
        Angle::Side,
        Angle::Top,
        Angle::ThreeQuarter,
        Angle::CloseUp,
        Angle::Back,
    ];

    /// 展示用名称
    pub fn label(self) -> &'static str {
        match self {
            Angle::Front => "Front",
            Angle::Side => "Side",
            Angle::Top => "Top",
            Angle::ThreeQuarter => "3/4 View",
            Angle::CloseUp => "Close-up",
            Angle::Back => "Back",
        }
    }
}

impl Material {
    pub fn name(self) -> Option<&'static str> {
        match self {
            Material::Auto => None,
            Material::Gold => Some("gold"),
            Material::Silver => Some("silver"),
            Material::Platinum => Some("platinum"),
        }
    }
}

/// 自定义增强的风格配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleOptions {
    pub background: Background,
    pub lighting: Lighting,
    pub material: Material,
}

// ========== 字符串解析 ==========
// 键统一为小写且去掉分隔符，所以 whiteStudio / white_studio / white-studio 都能命中

static BACKGROUNDS: phf::Map<&'static str, Background> = phf_map! {
    "velvet" => Background::Velvet,
    "marble" => Background::Marble,
    "abstract" => Background::Abstract,
    "whitestudio" => Background::WhiteStudio,
    "white" => Background::WhiteStudio,
    "gradient" => Background::Gradient,
};

static LIGHTINGS: phf::Map<&'static str, Lighting> = phf_map! {
    "soft" => Lighting::Soft,
    "dramatic" => Lighting::Dramatic,
    "natural" => Lighting::Natural,
    "highkey" => Lighting::HighKey,
    "shadowed" => Lighting::Shadowed,
};

static MATERIALS: phf::Map<&'static str, Material> = phf_map! {
    "auto" => Material::Auto,
    "gold" => Material::Gold,
    "silver" => Material::Silver,
    "platinum" => Material::Platinum,
};

static ANGLES: phf::Map<&'static str, Angle> = phf_map! {
    "front" => Angle::Front,
    "side" => Angle::Side,
    "top" => Angle::Top,
    "threequarter" => Angle::ThreeQuarter,
    "34" => Angle::ThreeQuarter,
    "closeup" => Angle::CloseUp,
    "back" => Angle::Back,
};

fn normalize_key(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// 选项解析失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOption {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "未知的{}选项: {}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownOption {}

macro_rules! impl_from_str {
    ($ty:ty, $map:ident, $kind:literal) => {
        impl FromStr for $ty {
            type Err = UnknownOption;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $map.get(normalize_key(s).as_str())
                    .copied()
                    .ok_or_else(|| UnknownOption {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

impl_from_str!(Background, BACKGROUNDS, "背景");
impl_from_str!(Lighting, LIGHTINGS, "光线");
impl_from_str!(Material, MATERIALS, "材质");
impl_from_str!(Angle, ANGLES, "角度");

/// 解析逗号分隔的角度列表，去重并保持首次出现的顺序
pub fn parse_angles(s: &str) -> Result<Vec<Angle>, UnknownOption> {
    let mut angles = Vec::new();
    for part in s.split(',').filter(|p| !p.trim().is_empty()) {
        let angle: Angle = part.parse()?;
        if !angles.contains(&angle) {
            angles.push(angle);
        }
    }
    Ok(angles)
}
