//! Smoke test against a running server.
//!
//! ```sh
//! RUST_PORT=1111 ADMIN_TOKEN=dev cargo run -p server &
//! TESTER_TOKEN=dev cargo run -p tester
//! ```

use serde_json::json;

#[tokio::main]
async fn main() {
    let base = std::env::var("TESTER_BASE").unwrap_or_else(|_| "http://localhost:1111".into());
    let token = std::env::var("TESTER_TOKEN").unwrap_or_else(|_| "dev".into());
    let client = reqwest::Client::new();

    let hero = client
        .get(format!("{base}/api/hero"))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    println!("hero: {hero}");

    let saved = client
        .put(format!("{base}/api/admin/hero"))
        .bearer_auth(&token)
        .json(&json!({
            "heading": "Smoke test",
            "description": "written by tester",
            "images": ["", "", ""]
        }))
        .send()
        .await
        .unwrap();
    println!("save hero: {}", saved.status());

    let subscribe = client
        .post(format!("{base}/api/subscribe"))
        .json(&json!({ "email": "tester@example.com" }))
        .send()
        .await
        .unwrap();
    println!("subscribe: {}", subscribe.status());
}
