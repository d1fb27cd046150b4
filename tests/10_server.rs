mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn binary_serves_health_and_rejects_unknown_tenants() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/health", server.base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["data"]["database"], "memory");

    let res = client.get(format!("{}/", server.base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    // Empty store: no subdomain resolves
    let res = client
        .get(format!("{}/api/tenant", server.base_url))
        .header("Host", "ghost.localhost")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["error"]["code"], "TENANT_NOT_FOUND");
    Ok(())
}
