//! # 느슨한 필드 디코더
//!
//! 클라이언트 이벤트의 필드 하나가 잘못된 타입이어도 이벤트 전체를 버리지 않도록,
//! `#[serde(default, deserialize_with = "...")]`로 붙여 쓰는 함수들입니다.
//! 어떤 함수도 에러를 내지 않습니다. 해석할 수 없는 값은 기본값이 됩니다.

use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;

use crate::services::sanitize::value_to_text;

/// 스칼라 값을 문자열로. 배열, 객체, `null`은 빈 문자열입니다.
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_text(&value).unwrap_or_default())
}

/// 스칼라 값을 문자열로. 비어 있거나 해석할 수 없으면 `None`.
pub fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_text(&value))
}

/// 숫자 또는 숫자 문자열
pub fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    })
}

/// 정수 또는 정수 문자열 (표 좌표)
pub fn index<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

/// 구조가 맞지 않으면 `T::default()`
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// 배열의 원소를 하나씩 해석하고, 해석되지 않는 원소만 버립니다.
/// 배열이 아니면 빈 목록입니다.
pub fn each<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Array(_) | Value::Object(_) => None,
        scalar => {
            let text = value_to_text(scalar);
            (!text.is_empty()).then_some(text)
        }
    }
}
