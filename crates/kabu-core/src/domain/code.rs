//! 증권 코드 정규화.
//!
//! 원천 데이터의 코드는 `"13"`, `"1301.0"`, `" 7203 "`처럼 형식이 제각각입니다.
//! 모든 코드는 앞자리 0을 유지한 4자리 숫자 문자열로 정규화됩니다.
//!
//! ```
//! use kabu_core::StockCode;
//!
//! assert_eq!(StockCode::normalize("13").unwrap().to_string(), "0013");
//! assert_eq!(StockCode::normalize("7203.0").unwrap().to_string(), "7203");
//! assert!(StockCode::normalize("abcde").is_none());
//! assert!(StockCode::normalize("13010").is_none());
//! ```

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// 정규화된 코드의 자릿수.
pub const CODE_WIDTH: usize = 4;

const CODE_LIMIT: u16 = 10_000;

/// 4자리 증권 코드.
///
/// 숫자가 아닌 코드 값이므로 항상 0으로 채운 4자리 문자열로 출력됩니다.
/// 정렬 순서는 문자열 순서와 같습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StockCode(u16);

impl StockCode {
    /// 원시 입력을 정규화합니다.
    ///
    /// 공백과 끝의 `.0`(숫자를 문자열로 저장할 때 생기는 흔적)을 제거한 뒤
    /// 부호 없는 정수로 해석합니다. 값이 10,000 이상이면 4자리가 아니므로 거부합니다.
    pub fn normalize(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let digits = trimmed.strip_suffix(".0").unwrap_or(trimmed);

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let significant = digits.trim_start_matches('0');
        if significant.len() > CODE_WIDTH {
            return None;
        }

        let value = if significant.is_empty() {
            0
        } else {
            significant.parse::<u16>().ok()?
        };

        (value < CODE_LIMIT).then_some(Self(value))
    }

    /// 숫자 값 (앞자리 0 없음).
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for StockCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.0, width = CODE_WIDTH)
    }
}

impl FromStr for StockCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s).ok_or_else(|| CoreError::InvalidCode(s.to_string()))
    }
}

impl Serialize for StockCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StockCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CodeVisitor;

        impl Visitor<'_> for CodeVisitor {
            type Value = StockCode;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a 4-digit stock code")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<StockCode, E> {
                StockCode::normalize(v).ok_or_else(|| E::custom(format!("invalid stock code: {v:?}")))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<StockCode, E> {
                self.visit_str(&v.to_string())
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<StockCode, E> {
                self.visit_str(&v.to_string())
            }
        }

        deserializer.deserialize_any(CodeVisitor)
    }
}

/// 일괄 정규화 결과.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    /// 입력 순서를 유지한 유효 코드 (중복 제거)
    pub codes: Vec<StockCode>,
    /// 거부된 원시 입력
    pub rejected: Vec<String>,
    /// 중복으로 제외된 건수
    pub duplicates: usize,
}

impl NormalizeReport {
    /// 거부 건수.
    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }
}

/// 원시 코드 목록을 정규화합니다.
///
/// 거부된 입력은 치명적 오류가 아니며 건수만 기록됩니다.
pub fn normalize_codes<I, S>(raws: I) -> NormalizeReport
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut report = NormalizeReport::default();
    let mut seen = HashSet::new();

    for raw in raws {
        let raw = raw.as_ref();
        match StockCode::normalize(raw) {
            Some(code) if seen.insert(code) => report.codes.push(code),
            Some(_) => report.duplicates += 1,
            None => report.rejected.push(raw.to_string()),
        }
    }

    if !report.rejected.is_empty() {
        let samples: Vec<&str> = report.rejected.iter().take(5).map(String::as_str).collect();
        tracing::warn!(
            rejected = report.rejected.len(),
            accepted = report.codes.len(),
            samples = ?samples,
            "유효하지 않은 코드 제외"
        );
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_pads_and_strips() {
        assert_eq!(StockCode::normalize("1").unwrap().to_string(), "0001");
        assert_eq!(StockCode::normalize("0002").unwrap().to_string(), "0002");
        assert_eq!(StockCode::normalize(" 7203\n").unwrap().to_string(), "7203");
        assert_eq!(StockCode::normalize("1301.0").unwrap().to_string(), "1301");
        assert_eq!(StockCode::normalize("00013").unwrap().to_string(), "0013");
    }

    #[test]
    fn test_normalize_rejects() {
        assert!(StockCode::normalize("").is_none());
        assert!(StockCode::normalize("abcde").is_none());
        assert!(StockCode::normalize("12a4").is_none());
        assert!(StockCode::normalize("-12").is_none());
        assert!(StockCode::normalize("+12").is_none());
        assert!(StockCode::normalize("12.5").is_none());
        assert!(StockCode::normalize("10000").is_none());
        assert!(StockCode::normalize("130100").is_none());
    }

    #[test]
    fn test_normalize_codes_counts() {
        let report = normalize_codes(["001", "0002", "13", "abcde", "1"]);
        let codes: Vec<String> = report.codes.iter().map(|c| c.to_string()).collect();

        assert_eq!(codes, vec!["0001", "0002", "0013"]);
        assert_eq!(report.rejected, vec!["abcde".to_string()]);
        assert_eq!(report.duplicates, 1);
    }

    #[test]
    fn test_ordering_matches_text() {
        let mut codes: Vec<StockCode> = ["9984", "0013", "1301"]
            .iter()
            .filter_map(|s| StockCode::normalize(s))
            .collect();
        codes.sort();

        let text: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        assert_eq!(text, vec!["0013", "1301", "9984"]);
    }

    #[test]
    fn test_serde_roundtrip_keeps_zeros() {
        let code: StockCode = "13".parse().unwrap();
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"0013\"");

        let back: StockCode = serde_json::from_str("13").unwrap();
        assert_eq!(back, code);
    }
}
