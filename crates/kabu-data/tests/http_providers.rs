//! HTTP Provider 통합 테스트 (mockito)

use std::time::Duration;

use kabu_core::{FieldSpec, FieldValue, StockCode};
use kabu_data::{
    build_http_client, AcquireMethod, DataError, DetailSource, JQuantsProvider,
    JpxListingProvider, LocalFileProvider, NikkeiSource, SessionError, UniverseChain,
    UniverseProvider,
};
use mockito::Matcher;
use rust_decimal_macros::dec;
use secrecy::SecretString;

fn client() -> reqwest::Client {
    build_http_client(Duration::from_secs(5)).unwrap()
}

const LISTED_INFO: &str = r#"{
    "info": [
        {"Code": "13010", "CompanyName": "極洋", "MarketCodeName": "プライム"},
        {"Code": "72030", "CompanyName": "トヨタ自動車", "MarketCodeName": "プライム"},
        {"Code": "25935", "CompanyName": "伊藤園（優先株式）", "MarketCodeName": "プライム"},
        {"Code": "37760", "CompanyName": "ブロードバンドタワー", "MarketCodeName": "スタンダード"}
    ]
}"#;

#[tokio::test]
async fn jquants_filters_prime_and_caches_token() {
    let mut server = mockito::Server::new_async().await;

    let auth = server
        .mock("POST", "/token/auth_refresh")
        .match_query(Matcher::UrlEncoded("refreshtoken".into(), "refresh-abc".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"idToken":"id-123"}"#)
        .expect(1)
        .create_async()
        .await;

    let listed = server
        .mock("GET", "/listed/info")
        .match_header("authorization", "Bearer id-123")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(LISTED_INFO)
        .expect(2)
        .create_async()
        .await;

    let provider = JQuantsProvider::new(
        client(),
        server.url(),
        Some(SecretString::from("refresh-abc".to_string())),
    );

    let codes = provider.fetch_universe().await.unwrap();
    assert_eq!(codes, vec!["1301", "7203", "25935"]);

    // 두 번째 호출은 캐시된 ID 토큰을 사용
    provider.fetch_universe().await.unwrap();

    auth.assert_async().await;
    listed.assert_async().await;
}

#[tokio::test]
async fn jquants_without_token_is_auth_error() {
    let server = mockito::Server::new_async().await;
    let provider = JQuantsProvider::new(client(), server.url(), None);

    let err = provider.fetch_universe().await.unwrap_err();
    assert!(matches!(err, DataError::AuthError(_)));
}

#[tokio::test]
async fn jquants_rejected_refresh_token() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/token/auth_refresh")
        .with_status(400)
        .create_async()
        .await;

    let provider = JQuantsProvider::new(
        client(),
        server.url(),
        Some(SecretString::from("expired".to_string())),
    );

    let err = provider.fetch_universe().await.unwrap_err();
    assert!(matches!(err, DataError::AuthError(_)));
}

#[tokio::test]
async fn chain_falls_back_from_jquants_to_jpx() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/token/auth_refresh")
        .with_status(500)
        .create_async()
        .await;
    server
        .mock("GET", "/listing")
        .with_status(200)
        .with_body("<table><tr><td>1301</td><td>極洋</td></tr><tr><td>9984</td></tr></table>")
        .create_async()
        .await;

    let chain = UniverseChain::new()
        .with_provider(JQuantsProvider::new(
            client(),
            server.url(),
            Some(SecretString::from("refresh".to_string())),
        ))
        .with_provider(JpxListingProvider::new(client(), format!("{}/listing", server.url())))
        .with_provider(LocalFileProvider::new("/nonexistent/codes.csv"));

    let codes = chain.acquire(&AcquireMethod::Auto).await;
    assert_eq!(codes, vec!["1301", "9984"]);
}

#[tokio::test]
async fn nikkei_session_extracts_fields() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/nkd/company/")
        .match_query(Matcher::UrlEncoded("scode".into(), "0013".into()))
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(
            r#"<html><head><title>【テスト水産】株価</title></head><body>
               <span class="m-stockPriceElm_value">1,234 円</span>
               </body></html>"#,
        )
        .create_async()
        .await;

    let source = NikkeiSource::new(client(), format!("{}/nkd/company/", server.url()));
    let code: StockCode = "13".parse().unwrap();
    let mut session = source.open(code).await.unwrap();

    assert_eq!(
        session.extract(FieldSpec::Name).await.unwrap(),
        FieldValue::Text("テスト水産".into())
    );
    assert_eq!(
        session.extract(FieldSpec::Price).await.unwrap(),
        FieldValue::Number(dec!(1234))
    );
    assert!(session.extract(FieldSpec::ExpectedPer).await.is_err());
    session.close().await;
}

#[tokio::test]
async fn nikkei_http_error_is_navigation_failure() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/nkd/company/")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let source = NikkeiSource::new(client(), format!("{}/nkd/company/", server.url()));
    let result = source.open("7203".parse().unwrap()).await;

    assert!(matches!(result, Err(SessionError::Navigation { .. })));
}
