//! 提示词构建 - 业务能力层
//!
//! 纯函数：把用户选择的风格选项和角度转换成发送给生成接口的指令文本。
//! 不做任何 I/O。

use crate::models::style::{Angle, Background, Lighting, Material, StyleOptions};

/// 一键增强使用的固定提示词
pub const AUTO_ENHANCE_PROMPT: &str = "Retouch this jewelry product photo for e-commerce. \
Keep the exact same piece, shape, stones and metal color. \
Remove dust, scratches and reflections of the photographer, correct white balance, \
sharpen details and place it on a clean white studio background with soft, even lighting.";

/// 主体分类提示词（只用于生成展示标题）
pub const CLASSIFY_PROMPT: &str = "What type of jewelry is shown in this image? \
Answer with a short noun phrase of one to three words, for example \"Gold Ring\" or \"Pearl Necklace\". \
Answer with the words only.";

/// 构建自定义增强的提示词
///
/// 组成顺序：材质 → 背景 → 光线 → （非正面）视角重建
///
/// # 参数
/// - `style`: 背景 / 光线 / 材质
/// - `angle`: 目标角度
pub fn build_prompt(style: &StyleOptions, angle: Angle) -> String {
    let mut clauses = vec![
        "Professionally retouch this jewelry product photo.".to_string(),
        material_clause(style.material),
        background_clause(style.background).to_string(),
        lighting_clause(style.lighting).to_string(),
    ];

    if let Some(perspective) = perspective_clause(angle) {
        clauses.push(perspective);
    }

    clauses.push("Output a single photorealistic image.".to_string());
    clauses.join(" ")
}

fn material_clause(material: Material) -> String {
    match material.name() {
        None => "Preserve the original material, metal color and gemstones exactly as they appear."
            .to_string(),
        Some(metal) => format!(
            "Transform the metal of the piece into polished {metal}, \
             keeping every gemstone, engraving and the overall design unchanged."
        ),
    }
}

fn background_clause(background: Background) -> &'static str {
    match background {
        Background::Velvet => "Place the piece on a rich dark velvet display surface.",
        Background::Marble => "Place the piece on a polished white marble surface.",
        Background::Abstract => "Use a tasteful abstract background with soft shapes that do not distract from the piece.",
        Background::WhiteStudio => "Use a seamless pure white studio background.",
        Background::Gradient => "Use a smooth neutral gradient background.",
    }
}

fn lighting_clause(lighting: Lighting) -> &'static str {
    match lighting {
        Lighting::Soft => "Light it with soft, diffused studio light and gentle shadows.",
        Lighting::Dramatic => "Light it dramatically with strong contrast and focused highlights on the metal and stones.",
        Lighting::Natural => "Light it with natural daylight for a true-to-life look.",
        Lighting::HighKey => "Use bright high-key lighting with minimal shadows.",
        Lighting::Shadowed => "Use moody low-key lighting with deep, defined shadows.",
    }
}

fn perspective_clause(angle: Angle) -> Option<String> {
    let view = match angle {
        Angle::Front => return None,
        Angle::Side => "a side view (profile)",
        Angle::Top => "a top-down view",
        Angle::ThreeQuarter => "a three-quarter view",
        Angle::CloseUp => "a close-up macro view of the most detailed area",
        Angle::Back => "a view from the back",
    };

    Some(format!(
        "Regenerate the same piece from {view}. \
         Preserve its exact design, proportions, stones and materials. \
         Do not invent new design details, stones or engravings that are not present in the source image."
    ))
}
