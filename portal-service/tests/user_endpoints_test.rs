mod common;

use common::TestApp;
use portal_service::models::UserProfile;
use portal_service::services::{DirectoryUser, PortalStore};

#[tokio::test]
async fn user_auth_returns_the_full_payload() {
    let app = TestApp::spawn().await;
    app.store.create_user("jdoe").await.unwrap();
    app.directory.set_user(
        "jdoe",
        DirectoryUser::new(vec!["GIS".to_string()]).with_profile(UserProfile {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: "jane.doe@example.com".to_string(),
        }),
    );

    let response = app
        .client
        .get(format!("{}/user-auth", app.address))
        .header("x-remote-user", "CORP\\jdoe")
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let payload: serde_json::Value = response.json().await.expect("Failed to parse body");
    assert_eq!(payload["username"], "CORP\\jdoe");
    assert_eq!(payload["local_name"], "jdoe");
    assert_eq!(payload["firstName"], "Jane");
    assert_eq!(payload["lastName"], "Doe");
    assert_eq!(payload["email"], "jane.doe@example.com");
    assert_eq!(payload["groups"], serde_json::json!(["GIS"]));

    let apps: Vec<String> = serde_json::from_value(payload["apps"].clone()).unwrap();
    assert!(apps.contains(&"mobile".to_string()));
    assert!(apps.contains(&"print".to_string()));
}

#[tokio::test]
async fn user_groups_lists_memberships_sorted_by_name() {
    let app = TestApp::spawn().await;
    app.store.create_user("jdoe").await.unwrap();
    app.store.create_group("Planning").await.unwrap();
    app.store.create_group("GIS").await.unwrap();
    app.store.add_user_group("jdoe", "Planning").await.unwrap();
    app.store.add_user_group("jdoe", "GIS").await.unwrap();

    let response = app
        .client
        .get(format!("{}/user-groups", app.address))
        .header("x-remote-user", "CORP\\jdoe")
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let groups: Vec<String> = response.json().await.expect("Failed to parse body");
    assert_eq!(groups, vec!["GIS".to_string(), "Planning".to_string()]);
}

#[tokio::test]
async fn user_groups_falls_back_to_anonymous_for_members_of_nothing() {
    let app = TestApp::spawn().await;
    app.store.create_user("jdoe").await.unwrap();

    let response = app
        .client
        .get(format!("{}/user-groups", app.address))
        .header("x-remote-user", "jdoe")
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let groups: Vec<String> = response.json().await.expect("Failed to parse body");
    assert_eq!(groups, vec!["anonymous".to_string()]);
}

#[tokio::test]
async fn user_groups_returns_404_for_an_unknown_user() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/user-groups", app.address))
        .header("x-remote-user", "nobody")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn remote_login_provisions_the_account_and_opens_a_session() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/login/remote", app.address))
        .header("x-remote-user", "CORP\\jdoe")
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let payload: serde_json::Value = response.json().await.expect("Failed to parse body");
    assert_eq!(payload["username"], "CORP\\jdoe");
    assert!(app.store.find_user("jdoe").await.unwrap().is_some());

    // The session now carries the identity, so the header is no longer needed.
    let response = app
        .client
        .get(format!("{}/user-groups", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let groups: Vec<String> = response.json().await.expect("Failed to parse body");
    assert_eq!(groups, vec!["anonymous".to_string()]);
}

#[tokio::test]
async fn remote_login_without_a_header_echoes_the_session_identity() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/login/remote", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let payload: serde_json::Value = response.json().await.expect("Failed to parse body");
    assert_eq!(payload["username"], "");

    app.client
        .get(format!("{}/login/remote", app.address))
        .header("x-remote-user", "CORP\\jdoe")
        .send()
        .await
        .expect("Failed to execute request");

    let response = app
        .client
        .get(format!("{}/login/remote", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    let payload: serde_json::Value = response.json().await.expect("Failed to parse body");
    assert_eq!(payload["username"], "CORP\\jdoe");
}

#[tokio::test]
async fn logout_clears_the_session() {
    let app = TestApp::spawn().await;

    app.client
        .get(format!("{}/login/remote", app.address))
        .header("x-remote-user", "CORP\\jdoe")
        .send()
        .await
        .expect("Failed to execute request");

    let response = app
        .client
        .get(format!("{}/logout", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    // reqwest follows the redirect to the login page by default.
    assert!(response.status().is_success());

    let response = app
        .client
        .get(format!("{}/login/remote", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    let payload: serde_json::Value = response.json().await.expect("Failed to parse body");
    assert_eq!(payload["username"], "");
}
