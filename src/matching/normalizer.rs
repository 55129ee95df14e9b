use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// 规范化文本：大写、去重音、折叠空白、去首尾空白
///
/// 幂等：`normalize(&normalize(x)) == normalize(x)`
pub fn normalize(raw: &str) -> String {
    let upper: String = raw.chars().flat_map(char::to_uppercase).collect();
    let stripped: String = upper
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_uppercase)
        .collect();

    let mut out = String::with_capacity(stripped.len());
    for token in stripped.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(token);
    }
    out
}
