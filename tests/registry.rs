//! `TokenRegistry` loading, lookups and HTTP refresh.

mod support;

use breeze_rs::error::LoadError;
use breeze_rs::instruments::codec;
use breeze_rs::types::{Exchange, InstrumentKey};
use breeze_rs::{BreezeClient, BreezeError, TokenRegistry};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use support::MASTER;

/// Serve one canned HTTP response on a loopback port.
async fn serve_once(status: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/StockScriptNew.csv", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
    });
    url
}

#[test]
fn partitions_are_populated() {
    let registry = TokenRegistry::from_csv(MASTER).unwrap();
    assert_eq!(registry.len(), 5);
    assert_eq!(registry.partition_len(Exchange::Nse), 2);
    assert_eq!(registry.partition_len(Exchange::Nfo), 2);
    assert_eq!(registry.partition_len(Exchange::Bse), 1);
    assert_eq!(registry.partition_len(Exchange::Mcx), 0);
}

#[test]
fn forward_and_reverse_are_inverse() {
    let registry = TokenRegistry::from_csv(MASTER).unwrap();

    let resolved = registry
        .lookup(&InstrumentKey::cash(Exchange::Nse, "RELIND"))
        .unwrap();
    assert_eq!(resolved.exchange, Exchange::Nse);
    assert_eq!(resolved.token, "2885");

    let entry = registry.reverse(Exchange::Nse, "2885").unwrap();
    assert_eq!(entry.composite, "RELIND");
    assert_eq!(entry.display_name, "RELIANCE INDUSTRIES");

    assert_eq!(
        registry.token_for(Exchange::Bse, "RELIND").as_deref(),
        Some("500325")
    );
    assert!(registry.reverse(Exchange::Nse, "500325").is_none());
}

#[test]
fn nse_derivatives_fall_back_to_nfo() {
    let registry = TokenRegistry::from_csv(MASTER).unwrap();

    let key = InstrumentKey::future(Exchange::Nse, "NIFTY", "25-Jan-2024");
    let resolved = registry.lookup(&key).unwrap();
    assert_eq!(resolved.exchange, Exchange::Nfo);
    assert_eq!(resolved.token, "35001");

    let (partition, entry) = registry.resolve_token(Exchange::Nse, "35002").unwrap();
    assert_eq!(partition, Exchange::Nfo);
    assert_eq!(entry.composite, "OPT-NIFTY-25-Jan-2024-21000-CE");

    let meta = codec::parse_stream_symbol(&registry, "4.1!35002").unwrap();
    assert_eq!(meta.exchange_code.as_deref(), Some("NFO"));
    assert_eq!(meta.stock_code.as_deref(), Some("NIFTY"));
    assert_eq!(meta.strike_price.as_deref(), Some("21000"));
    assert_eq!(meta.right.as_deref(), Some("Call"));
}

#[test]
fn bse_cash_does_not_fall_back() {
    let registry = TokenRegistry::from_csv(MASTER).unwrap();
    assert!(registry.resolve_token(Exchange::Bse, "35001").is_none());
    assert!(
        registry
            .lookup(&InstrumentKey::future(Exchange::Bse, "NIFTY", "25-Jan-2024"))
            .is_none()
    );
}

#[test]
fn failed_reload_keeps_previous_tables() {
    let registry = TokenRegistry::from_csv(MASTER).unwrap();

    let bad = "\
1,NIFTY FUT,NFO,,FUT,36000,50,FUT-NIFTY-31-Foo-2024
";
    match registry.load_csv(bad) {
        Err(BreezeError::Load(LoadError::MalformedRow { line, .. })) => assert_eq!(line, 1),
        other => panic!("expected malformed row, got {other:?}"),
    }
    assert_eq!(registry.len(), 5);
    assert!(registry.reverse(Exchange::Nse, "2885").is_some());

    assert!(matches!(
        registry.load_csv("ShortName,DisplayName,ExchangeCode\n"),
        Err(BreezeError::Load(LoadError::Empty))
    ));
    assert_eq!(registry.len(), 5);
}

#[test]
fn reload_replaces_every_partition() {
    let registry = TokenRegistry::from_csv(MASTER).unwrap();
    let snapshot = registry.snapshot();

    let count = registry
        .load_csv("1,TATA CONSULTANCY,NSE,TCS,EQ,11536,1,\n")
        .unwrap();
    assert_eq!(count, 1);
    assert!(registry.reverse(Exchange::Nse, "2885").is_none());
    assert_eq!(registry.partition_len(Exchange::Nfo), 0);

    // Snapshots taken before the reload are untouched.
    assert_eq!(snapshot.len(), 5);
}

#[test]
fn empty_registry_misses_everything() {
    let registry = TokenRegistry::new();
    assert!(registry.is_empty());
    assert!(
        registry
            .lookup(&InstrumentKey::cash(Exchange::Nse, "RELIND"))
            .is_none()
    );
    assert!(matches!(
        codec::parse_stream_symbol(&registry, "4.1!2885"),
        Err(BreezeError::UnknownInstrument { .. })
    ));
}

#[tokio::test]
async fn refresh_downloads_and_loads() {
    let url = serve_once("200 OK", MASTER).await;
    let registry = TokenRegistry::new();
    let count = registry.refresh(&reqwest::Client::new(), &url).await.unwrap();
    assert_eq!(count, 5);
    assert_eq!(registry.token_for(Exchange::Nse, "INFTEC").as_deref(), Some("1594"));
}

#[tokio::test]
async fn refresh_rejects_error_status() {
    let url = serve_once("503 Service Unavailable", "").await;
    let registry = TokenRegistry::from_csv(MASTER).unwrap();
    assert!(matches!(
        registry.refresh(&reqwest::Client::new(), &url).await,
        Err(BreezeError::Load(LoadError::Status(503)))
    ));
    assert_eq!(registry.len(), 5);
}

#[tokio::test]
async fn client_downloads_into_registry() {
    let url = serve_once("200 OK", MASTER).await;
    let client = BreezeClient::new("app-key")
        .unwrap()
        .with_security_master_url(url);
    let registry = TokenRegistry::new();
    assert_eq!(client.download_security_master(&registry).await.unwrap(), 5);
}
