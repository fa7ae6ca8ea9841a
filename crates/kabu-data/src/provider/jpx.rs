//! JPX 공개 페이지 종목 Provider.
//!
//! 인증 없이 가져올 수 있는 상장 종목 목록 페이지에서 표 셀의 4자리 코드를 추출합니다.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};

use super::universe::UniverseProvider;
use crate::error::{DataError, Result};

/// JPX 상장 종목 페이지 기본 URL.
pub const DEFAULT_LISTING_URL: &str = "https://www.jpx.co.jp/listing/stocks/new/index.html";

/// JPX 상장 종목 Provider.
pub struct JpxListingProvider {
    client: Client,
    url: String,
}

impl JpxListingProvider {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

/// 표 셀 중 4자리 숫자 코드를 문서 순서대로 추출합니다 (중복 제외).
fn extract_listing_codes(html: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let cell = Selector::parse("td")
        .map_err(|e| DataError::ParseError(format!("셀렉터 오류: {:?}", e)))?;

    let mut seen = HashSet::new();
    let codes = document
        .select(&cell)
        .map(|td| td.text().collect::<String>())
        .map(|text| text.trim().to_string())
        .filter(|text| text.len() == 4 && text.bytes().all(|b| b.is_ascii_digit()))
        .filter(|text| seen.insert(text.clone()))
        .collect();

    Ok(codes)
}

#[async_trait]
impl UniverseProvider for JpxListingProvider {
    fn name(&self) -> &str {
        "jpx"
    }

    async fn fetch_universe(&self) -> Result<Vec<String>> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DataError::FetchError(format!(
                "JPX 페이지 요청 실패: HTTP {}",
                status
            )));
        }

        let body = response.text().await?;
        extract_listing_codes(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_listing_codes() {
        let html = r#"
            <table>
              <tr><th>コード</th><th>銘柄名</th></tr>
              <tr><td> 1301 </td><td>極洋</td></tr>
              <tr><td>7203</td><td>トヨタ自動車</td></tr>
              <tr><td>1301</td><td>極洋</td></tr>
              <tr><td>25935</td><td>伊藤園 優先株</td></tr>
              <tr><td>2024</td><td>2024/01/05</td></tr>
            </table>
        "#;

        let codes = extract_listing_codes(html).unwrap();
        assert_eq!(codes, vec!["1301", "7203", "2024"]);
    }
}
