use modelgate_core::config::Settings;
use modelgate_core::error::Error;
use modelgate_core::rpc::proto::inference_client::InferenceClient;
use modelgate_core::rpc::proto::ClassificationRequest;
use modelgate_core::{ServiceFactory, ServiceKind};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn local_settings(location: &str) -> Settings {
    let mut settings = Settings::default();
    settings.artifact.location = location.to_string();
    settings.server.host = "127.0.0.1".to_string();
    settings.server.port = 0;
    settings
}

async fn write_pipeline_manifest(dir: &std::path::Path) {
    tokio::fs::write(
        dir.join("manifest.json"),
        r#"{"name": "double", "kind": "pipeline", "pipeline": {"scale": 2.0}}"#,
    )
    .await
    .unwrap();
}

async fn http_post(addr: SocketAddr, path: &str, body: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "POST {} HTTP/1.1\r\nhost: localhost\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        path,
        body.len(),
        body
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_build_and_serve_prediction_rest() {
    let dir = tempfile::tempdir().unwrap();
    write_pipeline_manifest(dir.path()).await;

    let settings = local_settings(dir.path().to_str().unwrap());
    let mut service = ServiceFactory::new()
        .build(ServiceKind::PredictionRest, settings)
        .await
        .unwrap();

    // The factory constructs but never starts the server.
    assert!(service.local_addr().is_none());

    let addr = service.start().await.unwrap();
    let response = http_post(addr, "/predict", r#"{"input": 21}"#).await;
    assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
    assert!(response.contains(r#""output":42.0"#), "{}", response);

    service.stop(Duration::from_secs(1)).await.unwrap();
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_build_and_serve_prediction_rpc() {
    let dir = tempfile::tempdir().unwrap();
    write_pipeline_manifest(dir.path()).await;

    let settings = local_settings(dir.path().to_str().unwrap());
    let mut service = ServiceFactory::new()
        .build(ServiceKind::PredictionRpc, settings)
        .await
        .unwrap();
    let addr = service.start().await.unwrap();

    let mut client = InferenceClient::connect(format!("http://{}", addr))
        .await
        .unwrap();
    let reply = client
        .classify(ClassificationRequest {
            features: vec![21.0],
            custom_data: Vec::new(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(reply.model, "double");
    assert_eq!(reply.values, vec![42.0]);

    service.stop(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn test_loader_failure_builds_no_service() {
    let dir = tempfile::tempdir().unwrap();
    let settings = local_settings(dir.path().join("missing").to_str().unwrap());

    let err = ServiceFactory::new()
        .build(ServiceKind::PredictionRest, settings)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ArtifactLoad(_)));
}

#[tokio::test]
async fn test_capability_mismatch_is_rejected_at_build() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(
        dir.path().join("manifest.json"),
        r#"{"name": "reco", "kind": "recommender", "recommender": {"fallback": ["a"]}}"#,
    )
    .await
    .unwrap();

    let settings = local_settings(dir.path().to_str().unwrap());
    let err = ServiceFactory::new()
        .build(ServiceKind::PredictionRest, settings)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ArtifactLoad(_)));
}

#[tokio::test]
async fn test_model_name_override() {
    let dir = tempfile::tempdir().unwrap();
    write_pipeline_manifest(dir.path()).await;

    let mut settings = local_settings(dir.path().to_str().unwrap());
    settings.artifact.name = Some("renamed".to_string());

    let mut service = ServiceFactory::new()
        .build(ServiceKind::PredictionRest, settings)
        .await
        .unwrap();
    let addr = service.start().await.unwrap();

    let response = http_post(addr, "/predict", r#"{"input": 1}"#).await;
    assert!(response.contains(r#""model":"renamed""#), "{}", response);

    service.stop(Duration::from_secs(1)).await.unwrap();
}
