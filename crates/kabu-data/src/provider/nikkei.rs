//! 닛케이 종목 페이지 크롤러.
//!
//! `https://www.nikkei.com/nkd/company/?scode={code}` 페이지에서
//! 종목명, 직근 시가, 예상 PER/배당수익률/ROE, 실적 PBR, 최신 뉴스/공시를 추출합니다.
//!
//! ## 페이지 구조
//! - 종목명: `<title>` (`【종목명】...` 형식)
//! - 시가: `.m-stockPriceElm_value` 첫 번째 요소 (`2,850.5 円`)
//! - 지표: `.m-stockInfo_detail_value` 4=PER, 5=배당수익률, 6=PBR, 7=ROE
//! - 뉴스/공시: `#JSID_cwCompanyNews`, `#JSID_cwCompanyInfo` 목록의 첫 항목

use async_trait::async_trait;
use kabu_core::{FieldSpec, FieldValue, StockCode};
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};

use super::session::{DetailSession, DetailSource, ExtractError, SessionError};

/// 닛케이 종목 페이지 기본 URL.
pub const DEFAULT_BASE_URL: &str = "https://www.nikkei.com/nkd/company/";

const PRICE_CLASS: &str = ".m-stockPriceElm_value";
const DETAIL_CLASS: &str = ".m-stockInfo_detail_value";
const NEWS_SELECTORS: [&str; 2] = ["#JSID_cwCompanyNews .m-listItem_text_text", ".m-articleList_item"];
const DISCLOSURE_SELECTORS: [&str; 2] = [
    "#JSID_cwCompanyInfo .m-listItem_text_text",
    ".m-disclosureList_item",
];

/// 닛케이 상세 페이지 소스.
pub struct NikkeiSource {
    client: Client,
    base_url: String,
}

impl NikkeiSource {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn page_url(&self, code: &StockCode) -> String {
        format!("{}?scode={}", self.base_url, code)
    }
}

#[async_trait]
impl DetailSource for NikkeiSource {
    fn name(&self) -> &str {
        "nikkei"
    }

    async fn open(&self, code: StockCode) -> Result<Box<dyn DetailSession>, SessionError> {
        let url = self.page_url(&code);
        let navigation = |reason: String| SessionError::Navigation { code, reason };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| navigation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(navigation(format!("HTTP {}", status)));
        }

        let body = response.text().await.map_err(|e| navigation(e.to_string()))?;
        let base = Url::parse(&url).map_err(|e| SessionError::Open(e.to_string()))?;
        let page = NikkeiPage::parse(&body, &base);

        tracing::debug!(code = %code, "닛케이 페이지 로드 완료");
        Ok(Box::new(NikkeiSession { code, page }))
    }
}

/// 한 종목의 페이지 스냅샷.
struct NikkeiSession {
    code: StockCode,
    page: NikkeiPage,
}

#[async_trait]
impl DetailSession for NikkeiSession {
    async fn extract(&mut self, field: FieldSpec) -> Result<FieldValue, ExtractError> {
        self.page.field(field)
    }

    async fn close(self: Box<Self>) {
        tracing::trace!(code = %self.code, "닛케이 세션 종료");
    }
}

/// 페이지에서 추출한 원시 텍스트.
///
/// `Html`은 `Send`가 아니므로 파싱 직후 필요한 텍스트만 남깁니다.
#[derive(Debug, Default)]
struct NikkeiPage {
    title: Option<String>,
    price: Option<String>,
    details: Vec<String>,
    news: Option<(String, Option<String>)>,
    disclosure: Option<(String, Option<String>)>,
}

impl NikkeiPage {
    fn parse(html: &str, base: &Url) -> Self {
        let document = Html::parse_document(html);

        Self {
            title: select_texts(&document, "title").into_iter().next(),
            price: select_texts(&document, PRICE_CLASS).into_iter().next(),
            details: select_texts(&document, DETAIL_CLASS),
            news: first_link(&document, &NEWS_SELECTORS, base),
            disclosure: first_link(&document, &DISCLOSURE_SELECTORS, base),
        }
    }

    fn field(&self, field: FieldSpec) -> Result<FieldValue, ExtractError> {
        match field {
            FieldSpec::Name => self
                .title
                .as_deref()
                .and_then(name_from_title)
                .map(FieldValue::Text)
                .ok_or(ExtractError::Missing(field)),
            FieldSpec::Price => number(field, self.price.as_deref()),
            FieldSpec::ExpectedPer => number(field, self.detail(4)),
            FieldSpec::ExpectedDividendYield => number(field, self.detail(5)),
            FieldSpec::ActualPbr => number(field, self.detail(6)),
            FieldSpec::ExpectedRoe => number(field, self.detail(7)),
            FieldSpec::LatestNews => link(field, &self.news),
            FieldSpec::LatestDisclosure => link(field, &self.disclosure),
        }
    }

    fn detail(&self, index: usize) -> Option<&str> {
        self.details.get(index).map(String::as_str)
    }
}

fn number(field: FieldSpec, raw: Option<&str>) -> Result<FieldValue, ExtractError> {
    let raw = raw.ok_or(ExtractError::Missing(field))?;
    parse_number(raw)
        .map(FieldValue::Number)
        .ok_or_else(|| ExtractError::Parse {
            field,
            raw: raw.to_string(),
        })
}

fn link(
    field: FieldSpec,
    item: &Option<(String, Option<String>)>,
) -> Result<FieldValue, ExtractError> {
    item.as_ref()
        .map(|(text, url)| FieldValue::Link {
            text: text.clone(),
            url: url.clone(),
        })
        .ok_or(ExtractError::Missing(field))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn select_texts(document: &Html, selector: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .collect()
}

fn href_of(element: &ElementRef<'_>) -> Option<String> {
    if let Some(href) = element.value().attr("href") {
        return Some(href.to_string());
    }

    let anchor = Selector::parse("a[href]").ok()?;
    element
        .select(&anchor)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string)
}

fn first_link(document: &Html, selectors: &[&str], base: &Url) -> Option<(String, Option<String>)> {
    for selector in selectors {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };

        if let Some(element) = document.select(&selector).next() {
            let text = collapse_whitespace(&element.text().collect::<String>());
            if text.is_empty() {
                continue;
            }

            let url = href_of(&element)
                .and_then(|href| base.join(&href).ok())
                .map(|url| url.to_string());
            return Some((text, url));
        }
    }

    None
}

/// `<title>`에서 종목명을 추출합니다.
///
/// `【トヨタ自動車】...` 또는 `トヨタ自動車【7203】...` 형식을 모두 처리합니다.
fn name_from_title(title: &str) -> Option<String> {
    let title = title.trim();

    let name = match title.strip_prefix('【') {
        Some(rest) => rest.split('】').next().unwrap_or_default(),
        None => title.split(['【', '：', ':']).next().unwrap_or_default(),
    };

    let name = name.trim();
    if name.is_empty() || name.bytes().all(|b| b.is_ascii_digit()) {
        None
    } else {
        Some(name.to_string())
    }
}

/// 단위(円, 倍, ％)와 천 단위 구분자가 포함된 숫자를 파싱합니다.
///
/// "2,850.5 円" → 2850.5, "--" → None
fn parse_number(text: &str) -> Option<Decimal> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != ',')
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const PAGE: &str = r#"
        <html><head><title>【トヨタ自動車】株価・株式情報 - 日本経済新聞</title></head>
        <body>
          <dd class="m-stockPriceElm_value now">2,850.5 <span>円</span></dd>
          <ul>
            <li><span class="m-stockInfo_detail_value">1</span></li>
            <li><span class="m-stockInfo_detail_value">2</span></li>
            <li><span class="m-stockInfo_detail_value">3</span></li>
            <li><span class="m-stockInfo_detail_value">4</span></li>
            <li><span class="m-stockInfo_detail_value">9.81 倍</span></li>
            <li><span class="m-stockInfo_detail_value">--</span></li>
            <li><span class="m-stockInfo_detail_value">1.12 倍</span></li>
            <li><span class="m-stockInfo_detail_value">11.4 ％</span></li>
          </ul>
          <div id="JSID_cwCompanyNews">
            <div class="m-listItem_text_text"><a href="/nkd/company/news/?n_cid=1">  トヨタ、新型車を発表 </a></div>
            <div class="m-listItem_text_text"><a href="/nkd/company/news/?n_cid=2">古いニュース</a></div>
          </div>
        </body></html>
    "#;

    fn page() -> NikkeiPage {
        let base = Url::parse("https://www.nikkei.com/nkd/company/?scode=7203").unwrap();
        NikkeiPage::parse(PAGE, &base)
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("2,850.5 円"), Some(dec!(2850.5)));
        assert_eq!(parse_number("9.81 倍"), Some(dec!(9.81)));
        assert_eq!(parse_number("11.4 ％"), Some(dec!(11.4)));
        assert_eq!(parse_number("-3.2%"), Some(dec!(-3.2)));
        assert_eq!(parse_number("--"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_name_from_title() {
        assert_eq!(
            name_from_title("【トヨタ自動車】株価・株式情報").as_deref(),
            Some("トヨタ自動車")
        );
        assert_eq!(
            name_from_title("極洋【1301】：株価").as_deref(),
            Some("極洋")
        );
        assert_eq!(name_from_title("【7203】"), None);
    }

    #[test]
    fn test_page_fields() {
        let page = page();

        assert_eq!(
            page.field(FieldSpec::Name).unwrap(),
            FieldValue::Text("トヨタ自動車".into())
        );
        assert_eq!(
            page.field(FieldSpec::Price).unwrap(),
            FieldValue::Number(dec!(2850.5))
        );
        assert_eq!(
            page.field(FieldSpec::ExpectedPer).unwrap(),
            FieldValue::Number(dec!(9.81))
        );
        assert_eq!(
            page.field(FieldSpec::ActualPbr).unwrap(),
            FieldValue::Number(dec!(1.12))
        );
        assert_eq!(
            page.field(FieldSpec::ExpectedRoe).unwrap(),
            FieldValue::Number(dec!(11.4))
        );
        assert_eq!(
            page.field(FieldSpec::LatestNews).unwrap(),
            FieldValue::Link {
                text: "トヨタ、新型車を発表".into(),
                url: Some("https://www.nikkei.com/nkd/company/news/?n_cid=1".into()),
            }
        );
    }

    #[test]
    fn test_page_field_failures() {
        let page = page();

        assert!(matches!(
            page.field(FieldSpec::ExpectedDividendYield),
            Err(ExtractError::Parse { .. })
        ));
        assert!(matches!(
            page.field(FieldSpec::LatestDisclosure),
            Err(ExtractError::Missing(FieldSpec::LatestDisclosure))
        ));
    }
}
