//! 종목별 수집 결과.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::code::StockCode;
use crate::error::CoreError;

/// 출력 테이블에 반드시 있어야 하는 컬럼.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "code",
    "name",
    "price",
    "expected_roe",
    "expected_per",
    "expected_dividend_yield",
    "actual_pbr",
];

/// 출력 테이블 전체 컬럼 (기록 순서).
pub const TABLE_COLUMNS: [&str; 12] = [
    "code",
    "name",
    "price",
    "expected_per",
    "expected_dividend_yield",
    "expected_roe",
    "actual_pbr",
    "last_news_text",
    "last_news_url",
    "last_disclosure_text",
    "last_disclosure_url",
    "status",
];

/// 수집 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    /// 핵심 지표를 모두 수집
    Ok,
    /// 일부 필드만 수집
    Partial,
    /// 작업 자체가 실패
    Failed,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ok" => Ok(Self::Ok),
            "partial" => Ok(Self::Partial),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// 상세 페이지에서 추출하는 필드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldSpec {
    /// 종목명
    Name,
    /// 직근 시가 (엔)
    Price,
    /// 예상 PER (배)
    ExpectedPer,
    /// 예상 배당수익률 (%)
    ExpectedDividendYield,
    /// 실적 PBR (배)
    ActualPbr,
    /// 예상 ROE (%)
    ExpectedRoe,
    /// 최신 뉴스 (제목 + 링크)
    LatestNews,
    /// 최신 적시공시 (제목 + 링크)
    LatestDisclosure,
}

impl FieldSpec {
    /// 추출 순서.
    pub const ALL: [FieldSpec; 8] = [
        Self::Name,
        Self::Price,
        Self::ExpectedPer,
        Self::ExpectedDividendYield,
        Self::ActualPbr,
        Self::ExpectedRoe,
        Self::LatestNews,
        Self::LatestDisclosure,
    ];

    /// 상태 판정에 쓰는 수치 지표.
    pub const METRICS: [FieldSpec; 5] = [
        Self::Price,
        Self::ExpectedPer,
        Self::ExpectedDividendYield,
        Self::ActualPbr,
        Self::ExpectedRoe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Price => "price",
            Self::ExpectedPer => "expected_per",
            Self::ExpectedDividendYield => "expected_dividend_yield",
            Self::ActualPbr => "actual_pbr",
            Self::ExpectedRoe => "expected_roe",
            Self::LatestNews => "last_news",
            Self::LatestDisclosure => "last_disclosure",
        }
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 추출된 필드 값.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(Decimal),
    Link { text: String, url: Option<String> },
}

/// 한 종목의 수집 결과.
///
/// 수집 작업이 생성하고 이후에는 변경하지 않습니다.
/// 얻지 못한 필드는 전체 상태와 무관하게 `None`입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub code: StockCode,
    pub name: String,
    pub price: Option<Decimal>,
    pub expected_per: Option<Decimal>,
    pub expected_dividend_yield: Option<Decimal>,
    pub expected_roe: Option<Decimal>,
    pub actual_pbr: Option<Decimal>,
    pub last_news_text: Option<String>,
    pub last_news_url: Option<String>,
    pub last_disclosure_text: Option<String>,
    pub last_disclosure_url: Option<String>,
    pub status: FetchStatus,
}

impl FetchResult {
    /// 이름을 얻지 못했을 때 사용하는 대체 종목명.
    pub fn placeholder_name(code: &StockCode) -> String {
        format!("銘柄コード{}", code)
    }

    /// 필드가 비어 있는 결과 (필드 추출 전 초기값).
    pub fn empty(code: StockCode) -> Self {
        Self {
            code,
            name: Self::placeholder_name(&code),
            price: None,
            expected_per: None,
            expected_dividend_yield: None,
            expected_roe: None,
            actual_pbr: None,
            last_news_text: None,
            last_news_url: None,
            last_disclosure_text: None,
            last_disclosure_url: None,
            status: FetchStatus::Partial,
        }
    }

    /// 작업 실패 결과. 행이 누락되지 않도록 코드와 대체 이름만 채웁니다.
    pub fn failed(code: StockCode) -> Self {
        Self {
            status: FetchStatus::Failed,
            ..Self::empty(code)
        }
    }

    /// 추출된 값을 해당 필드에 반영합니다.
    ///
    /// 필드와 값의 종류가 맞지 않으면 `false`를 반환하고 아무것도 바꾸지 않습니다.
    pub fn apply(&mut self, field: FieldSpec, value: FieldValue) -> bool {
        match (field, value) {
            (FieldSpec::Name, FieldValue::Text(name)) if !name.trim().is_empty() => {
                self.name = name.trim().to_string();
            }
            (FieldSpec::Price, FieldValue::Number(v)) => self.price = Some(v),
            (FieldSpec::ExpectedPer, FieldValue::Number(v)) => self.expected_per = Some(v),
            (FieldSpec::ExpectedDividendYield, FieldValue::Number(v)) => {
                self.expected_dividend_yield = Some(v)
            }
            (FieldSpec::ActualPbr, FieldValue::Number(v)) => self.actual_pbr = Some(v),
            (FieldSpec::ExpectedRoe, FieldValue::Number(v)) => self.expected_roe = Some(v),
            (FieldSpec::LatestNews, FieldValue::Link { text, url }) => {
                self.last_news_text = Some(text);
                self.last_news_url = url;
            }
            (FieldSpec::LatestDisclosure, FieldValue::Link { text, url }) => {
                self.last_disclosure_text = Some(text);
                self.last_disclosure_url = url;
            }
            _ => return false,
        }
        true
    }

    /// 수치 지표 조회.
    pub fn metric(&self, field: FieldSpec) -> Option<Decimal> {
        match field {
            FieldSpec::Price => self.price,
            FieldSpec::ExpectedPer => self.expected_per,
            FieldSpec::ExpectedDividendYield => self.expected_dividend_yield,
            FieldSpec::ActualPbr => self.actual_pbr,
            FieldSpec::ExpectedRoe => self.expected_roe,
            _ => None,
        }
    }

    /// 수치 지표 수집 현황으로 상태를 판정합니다.
    ///
    /// 모든 수치 지표가 있으면 `Ok`, 아니면 `Partial`. 뉴스/공시는 없는 종목이
    /// 많아 판정에 포함하지 않습니다.
    pub fn infer_status(&self) -> FetchStatus {
        let present = FieldSpec::METRICS
            .iter()
            .filter(|f| self.metric(**f).is_some())
            .count();

        if present == FieldSpec::METRICS.len() {
            FetchStatus::Ok
        } else {
            FetchStatus::Partial
        }
    }

    /// 선택 필드가 모두 비어 있는지 여부.
    pub fn is_blank(&self) -> bool {
        FieldSpec::METRICS.iter().all(|f| self.metric(*f).is_none())
            && self.last_news_text.is_none()
            && self.last_news_url.is_none()
            && self.last_disclosure_text.is_none()
            && self.last_disclosure_url.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn code(s: &str) -> StockCode {
        s.parse().unwrap()
    }

    #[test]
    fn test_failed_result_is_blank() {
        let result = FetchResult::failed(code("13"));

        assert_eq!(result.status, FetchStatus::Failed);
        assert_eq!(result.name, "銘柄コード0013");
        assert!(result.is_blank());
    }

    #[test]
    fn test_apply_and_infer_status() {
        let mut result = FetchResult::empty(code("7203"));
        assert!(result.apply(FieldSpec::Name, FieldValue::Text("トヨタ自動車".into())));
        assert!(result.apply(FieldSpec::Price, FieldValue::Number(dec!(2850.5))));
        assert!(result.apply(FieldSpec::ExpectedPer, FieldValue::Number(dec!(9.8))));
        assert_eq!(result.infer_status(), FetchStatus::Partial);

        result.apply(FieldSpec::ExpectedDividendYield, FieldValue::Number(dec!(2.8)));
        result.apply(FieldSpec::ActualPbr, FieldValue::Number(dec!(1.1)));
        result.apply(FieldSpec::ExpectedRoe, FieldValue::Number(dec!(11.2)));
        assert_eq!(result.infer_status(), FetchStatus::Ok);
        assert_eq!(result.name, "トヨタ自動車");
    }

    #[test]
    fn test_apply_rejects_mismatched_value() {
        let mut result = FetchResult::empty(code("7203"));
        assert!(!result.apply(FieldSpec::Price, FieldValue::Text("abc".into())));
        assert!(!result.apply(FieldSpec::Name, FieldValue::Text("   ".into())));
        assert!(result.price.is_none());
        assert_eq!(result.name, "銘柄コード7203");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("OK".parse::<FetchStatus>().unwrap(), FetchStatus::Ok);
        assert_eq!("failed".parse::<FetchStatus>().unwrap(), FetchStatus::Failed);
        assert!("done".parse::<FetchStatus>().is_err());
    }
}
