use std::collections::BTreeSet;

/// 最长公共子序列长度 (按字符)
fn lcs_length(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// 基础字符串相似度 [0, 100]：插入/删除距离归一化，即 2·LCS / (|a| + |b|)
pub fn ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 100;
    }
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let common = lcs_length(&a, &b) as f64;
    (200.0 * common / (a.len() + b.len()) as f64).round().clamp(0.0, 100.0) as u8
}

fn sorted_tokens(text: &str) -> String {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// 有序序列相似度：两边的词按字母排序后比较编辑距离
///
/// 任何一侧多出或缺少的词 (包括规格/数量后缀) 都会扣分。
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    let (a, b) = (sorted_tokens(a), sorted_tokens(b));
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    ratio(&a, &b)
}

fn joined<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts.collect::<Vec<_>>().join(" ")
}

fn concat(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => head.to_string(),
        _ => format!("{head} {tail}"),
    }
}

/// 集合重叠相似度：一方的词集完全包含于另一方时得 100
///
/// 比有序序列相似度宽松，更容易同时出现多个高分候选。
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let set_a: BTreeSet<&str> = a.split_whitespace().collect();
    let set_b: BTreeSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0;
    }

    let common = joined(set_a.intersection(&set_b).copied());
    let only_a = joined(set_a.difference(&set_b).copied());
    let only_b = joined(set_b.difference(&set_a).copied());

    if !common.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 100;
    }

    let with_a = concat(&common, &only_a);
    let with_b = concat(&common, &only_b);

    let mut best = ratio(&with_a, &with_b);
    if !common.is_empty() {
        best = best.max(ratio(&common, &with_a)).max(ratio(&common, &with_b));
    }
    best
}
