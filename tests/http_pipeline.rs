//! Full created-event path over HTTP: Key Vault and Computer Vision mocked.
use std::sync::Arc;

use access::{AccessConfig, SystemClock};
use analysis::ComputerVisionClient;
use frame_events::{Branch, Dispatcher, Fact, MemorySink, Services};
use mockito::{Matcher, Server};
use secrets::{AccessToken, KeyVaultClient, RetryPolicy, StaticTokenCredential};
use serde_json::json;
use url::Url;

fn services(server: &Server) -> Services {
    let http = reqwest::Client::new();
    let vault = KeyVaultClient::new(
        http.clone(),
        Arc::new(StaticTokenCredential(AccessToken::new("vault-token"))),
    );
    let analyzer = ComputerVisionClient::new(http, Url::parse(&server.url()).unwrap());
    Services {
        access: AccessConfig::new(server.url()),
        secrets: Arc::new(vault),
        retry: RetryPolicy::default(),
        analyzer: Arc::new(analyzer),
        clock: Arc::new(SystemClock),
    }
}

#[tokio::test]
async fn created_event_goes_through_vault_and_analysis() {
    let mut server = Server::new_async().await;
    let vault = server
        .mock("GET", "/secrets/CompVisKey")
        .match_query(Matcher::UrlEncoded("api-version".into(), "7.4".into()))
        .match_header("authorization", "Bearer vault-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"value":"K1"}"#)
        .expect(1)
        .create_async()
        .await;
    let vision = server
        .mock("POST", "/vision/v3.2/analyze")
        .match_query(Matcher::UrlEncoded("visualFeatures".into(), "Faces".into()))
        .match_header("ocp-apim-subscription-key", "K1")
        .match_body(Matcher::Json(json!({"url": "https://acct.blob/cont/img.jpg"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"faces":[{"age":30,"gender":"Female","faceRectangle":{"left":10,"top":20,"width":50,"height":60}}],"requestId":"r-1","metadata":{"width":640,"height":480,"format":"Jpeg"}}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let services = services(&server);
    let sink = MemorySink::new();
    let outcome = Dispatcher::new(&services, &sink)
        .handle(json!({
            "specversion": "1.0",
            "type": "Microsoft.Storage.BlobCreated",
            "source": "/subscriptions/s/resourceGroups/g/providers/Microsoft.Storage/storageAccounts/acct",
            "subject": "/blobServices/default/containers/cont/blobs/img.jpg",
            "id": "evt-http",
            "data": {
                "api": "PutBlob",
                "contentType": "image/jpeg",
                "sequencer": "0000000000000000000000000000ABCD",
                "url": "https://acct.blob/cont/img.jpg"
            }
        }))
        .await
        .unwrap();

    vault.assert_async().await;
    vision.assert_async().await;
    assert_eq!(outcome.branch, Branch::Created);
    assert_eq!(outcome.face_count, 1);
    assert!(outcome
        .facts
        .iter()
        .any(|f| matches!(f, Fact::Face { age: 30, .. })));
}

#[tokio::test]
async fn missing_vault_secret_stops_before_analysis() {
    let mut server = Server::new_async().await;
    let _vault = server
        .mock("GET", "/secrets/CompVisKey")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"error":{"code":"SecretNotFound","message":"A secret with (name/id) CompVisKey was not found in this key vault."}}"#)
        .expect(1)
        .create_async()
        .await;
    let vision = server
        .mock("POST", "/vision/v3.2/analyze")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let services = services(&server);
    let sink = MemorySink::new();
    let err = Dispatcher::new(&services, &sink)
        .handle(json!({
            "id": "evt-legacy",
            "topic": "/subscriptions/s/resourceGroups/g/providers/Microsoft.Storage/storageAccounts/acct",
            "subject": "/blobServices/default/containers/cont/blobs/img.jpg",
            "eventType": "Microsoft.Storage.BlobCreated",
            "eventTime": "2024-05-01T12:00:00Z",
            "data": {"api": "PutBlob", "url": "https://acct.blob/cont/img.jpg"},
            "dataVersion": "",
            "metadataVersion": "1"
        }))
        .await
        .unwrap_err();

    vision.assert_async().await;
    assert_eq!(err.kind(), "secret_not_found");
    // Metadata and strategy are logged before the secret step fails.
    assert_eq!(sink.facts().len(), 2);
}
