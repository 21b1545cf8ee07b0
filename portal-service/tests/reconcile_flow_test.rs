mod common;

use common::TestApp;
use portal_service::services::{DirectoryUser, PortalStore};

async fn fetch_user_auth(app: &TestApp, header: &str) -> serde_json::Value {
    let response = app
        .client
        .get(format!("{}/user-auth", app.address))
        .header("x-remote-user", header)
        .send()
        .await
        .expect("Failed to execute request");
    assert!(response.status().is_success());
    response.json().await.expect("Failed to parse body")
}

#[tokio::test]
async fn memberships_track_the_directory_across_requests() {
    let app = TestApp::spawn().await;
    app.store.create_user("jdoe").await.unwrap();

    app.directory
        .set_user("jdoe", DirectoryUser::new(vec!["GIS".to_string()]));
    let payload = fetch_user_auth(&app, "CORP\\jdoe").await;
    assert_eq!(payload["groups"], serde_json::json!(["GIS"]));

    // The directory moved the user to another team.
    app.directory
        .set_user("jdoe", DirectoryUser::new(vec!["Planning".to_string()]));
    let payload = fetch_user_auth(&app, "CORP\\jdoe").await;
    assert_eq!(payload["groups"], serde_json::json!(["Planning"]));

    // And finally dropped every membership.
    app.directory.set_user("jdoe", DirectoryUser::default());
    let payload = fetch_user_auth(&app, "CORP\\jdoe").await;
    assert_eq!(payload["groups"], serde_json::json!([]));
    assert_eq!(payload["apps"], serde_json::json!(["mobile"]));
}

#[tokio::test]
async fn unprovisioned_directory_groups_are_dropped() {
    let app = TestApp::spawn().await;
    app.store.create_user("jdoe").await.unwrap();
    app.directory.set_user(
        "jdoe",
        DirectoryUser::new(vec!["GIS".to_string(), "Domain Admins".to_string()]),
    );

    let payload = fetch_user_auth(&app, "CORP\\jdoe").await;

    // "Domain Admins" backs no app, so it never becomes a local group.
    assert_eq!(payload["groups"], serde_json::json!(["GIS"]));
}

#[tokio::test]
async fn repeated_requests_do_not_rewrite_the_store() {
    let app = TestApp::spawn().await;
    app.store.create_user("jdoe").await.unwrap();
    app.directory
        .set_user("jdoe", DirectoryUser::new(vec!["GIS".to_string()]));

    fetch_user_auth(&app, "CORP\\jdoe").await;
    let settled = app.store.mutations();

    fetch_user_auth(&app, "CORP\\jdoe").await;
    assert_eq!(app.store.mutations(), settled);
}

#[tokio::test]
async fn user_auth_returns_404_when_the_directory_rejects_the_user() {
    let app = TestApp::spawn().await;
    app.store.create_user("ghost").await.unwrap();

    let response = app
        .client
        .get(format!("{}/user-auth", app.address))
        .header("x-remote-user", "ghost")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}
