use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;

/// 已知品牌缩写 -> 完整品牌名 (仅作用于发票描述，不作用于目录)
static BRAND_ABBREVIATIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("CHX", "CHIMEX"),
        ("SRF", "SAN RAFAEL"),
        ("MDLZ", "MONDELEZ"),
        ("TGM", "TANGAMANGA"),
    ])
});

/// 计量单位变体 -> 规范写法
static UNIT_VARIANTS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("GRS", "G"),
        ("GR", "G"),
        ("KGS", "KG"),
        ("LTS", "LT"),
        ("MLS", "ML"),
        ("PZS", "PZ"),
        ("PZA", "PZ"),
    ])
});

/// 数字紧跟单位，如 "800GRS"
static NUMBER_WITH_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?)(GRS|GR|KGS|LTS|MLS|PZS|PZA)$").expect("valid unit regex")
});

/// 展开品牌缩写并规范计量单位
///
/// 输入应已经过 [`super::normalize`]。按整词替换，嵌在长词里的缩写不受影响；
/// 未知词原样保留。
pub fn expand(normalized: &str) -> String {
    let tokens: Vec<Cow<'_, str>> = normalized
        .split_whitespace()
        .map(|token| {
            if let Some(brand) = BRAND_ABBREVIATIONS.get(token) {
                return Cow::Borrowed(*brand);
            }
            if let Some(unit) = UNIT_VARIANTS.get(token) {
                return Cow::Borrowed(*unit);
            }
            match NUMBER_WITH_UNIT.captures(token) {
                Some(caps) => {
                    let unit = UNIT_VARIANTS.get(&caps[2]).copied().unwrap_or(&caps[2]);
                    Cow::Owned(format!("{}{}", &caps[1], unit))
                }
                None => Cow::Borrowed(token),
            }
        })
        .collect();

    tokens.join(" ")
}
