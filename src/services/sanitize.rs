//! # 입력 정제 유틸리티
//!
//! 클라이언트가 보낸 값을 저장 전에 자르거나 걸러내는 함수들입니다.
//! 여기의 함수들은 실패하지 않습니다. 잘못된 값은 잘리거나 버려질 뿐입니다.

use serde_json::Value;

/// `[A-Za-z0-9._-]` 이외의 문자를 모두 제거합니다.
///
/// 세션 코드와 파일 ID처럼 경로 조각으로 쓰이는 값에 사용합니다.
pub fn safe_basename(raw: &str) -> String {
    raw.chars().filter(|c| is_safe_char(*c)).collect()
}

pub fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// 문자(char) 단위로 최대 `max`개까지 자릅니다.
pub fn truncate_chars(raw: &str, max: usize) -> String {
    match raw.char_indices().nth(max) {
        Some((idx, _)) => raw[..idx].to_string(),
        None => raw.to_string(),
    }
}

/// UTF-8 바이트 기준으로 최대 `max` 바이트까지 자르되, 문자 경계를 지킵니다.
pub fn truncate_bytes(raw: &str, max: usize) -> String {
    if raw.len() <= max {
        return raw.to_string();
    }
    let mut end = max;
    // is_char_boundary: 멀티바이트 문자 중간에서 자르면 패닉하므로 경계까지 물러납니다.
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    raw[..end].to_string()
}

/// 잘라낸 결과가 비어 있으면 `None`을 반환합니다.
pub fn non_empty_truncated(raw: Option<&str>, max: usize) -> Option<String> {
    let value = truncate_chars(raw.unwrap_or_default(), max);
    (!value.is_empty()).then_some(value)
}

/// 6자리 16진수 색상을 `#RRGGBB` 형태로 정규화합니다.
///
/// `#`은 있어도 없어도 됩니다. 형식이 맞지 않으면 `None`.
pub fn normalize_color(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    let hex = raw.strip_prefix('#').unwrap_or(raw);
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(format!("#{hex}"))
    } else {
        None
    }
}

/// `[A-Za-z0-9._-]`에 속하지 않는 문자가 연속된 구간을 `replacement` 하나로 바꿉니다.
pub fn replace_unsafe_runs(raw: &str, replacement: char) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_run = false;
    for c in raw.chars() {
        if is_safe_char(c) {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push(replacement);
            in_run = true;
        }
    }
    out
}

/// JSON 스칼라 값을 셀 텍스트로 바꿉니다.
///
/// `null`, `false`, 빈 문자열은 빈 셀이 됩니다.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(false) => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// 0 이상의 정수를 36진수 소문자 문자열로 바꿉니다.
pub fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(BASE36_DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
