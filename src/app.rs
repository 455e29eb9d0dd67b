use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::state::AppState;
use crate::{auth, groups, ingredients, invitations, meal_plans, shopping};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(groups::router())
                .merge(invitations::router())
                .merge(meal_plans::router())
                .merge(ingredients::router())
                .merge(shopping::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::TokenKind;
    use crate::auth::jwt::JwtKeys;
    use crate::testing::Fixture;
    use axum::body::Body;
    use axum::extract::FromRef;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    struct Client {
        app: Router,
        keys: JwtKeys,
    }

    impl Client {
        fn new(fx: &Fixture) -> Self {
            Self {
                app: build_app(fx.state.clone()),
                keys: JwtKeys::from_ref(&fx.state),
            }
        }

        async fn send(
            &self,
            method: Method,
            uri: &str,
            user: Option<Uuid>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut req = Request::builder().method(method).uri(uri);
            if let Some(user) = user {
                req = req.header(
                    header::AUTHORIZATION,
                    format!("Bearer {}", self.keys.sign_access(user)),
                );
            }
            let req = match body {
                Some(b) => req
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(b.to_string())),
                None => req.body(Body::empty()),
            }
            .unwrap();

            let res = self.app.clone().oneshot(req).await.unwrap();
            let status = res.status();
            let bytes = res.into_body().collect().await.unwrap().to_bytes();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                    Value::String(String::from_utf8_lossy(&bytes).into_owned())
                })
            };
            (status, value)
        }
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let fx = Fixture::new();
        let client = Client::new(&fx);
        let (status, body) = client.send(Method::GET, "/api/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("ok".into()));
    }

    #[tokio::test]
    async fn protected_routes_reject_missing_or_refresh_tokens() {
        let fx = Fixture::new();
        let client = Client::new(&fx);
        let (status, _) = client.send(Method::GET, "/api/v1/groups", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let refresh = client
            .keys
            .sign(Uuid::new_v4(), TokenKind::Refresh, time::Duration::minutes(5));
        let req = Request::builder()
            .uri("/api/v1/groups")
            .header(header::AUTHORIZATION, format!("Bearer {refresh}"))
            .body(Body::empty())
            .unwrap();
        let res = client.app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_returns_the_caller() {
        let fx = Fixture::new();
        let ana = fx.user("Ana").await;
        let client = Client::new(&fx);
        let (status, body) = client.send(Method::GET, "/api/v1/me", Some(ana), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Ana");

        let (status, body) = client
            .send(Method::GET, "/api/v1/me", Some(Uuid::new_v4()), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn group_flow_over_http() {
        let fx = Fixture::new();
        let ana = fx.user("Ana").await;
        let ben = fx.user("Ben").await;
        let client = Client::new(&fx);

        let (status, group) = client
            .send(
                Method::POST,
                "/api/v1/groups",
                Some(ana),
                Some(json!({ "name": "Flat 4B" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let group_id = group["id"].as_str().unwrap().to_string();

        let (status, invitation) = client
            .send(
                Method::POST,
                &format!("/api/v1/groups/{group_id}/invitations"),
                Some(ana),
                Some(json!({ "invitedUserId": ben, "expiresInDays": 7 })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(invitation["status"], "pending");
        assert_eq!(invitation["role"], "member");

        let (status, body) = client
            .send(
                Method::POST,
                &format!("/api/v1/invitations/{}/respond", invitation["id"].as_str().unwrap()),
                Some(ben),
                Some(json!({ "action": "accept" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "action": "accepted" }));

        let (status, details) = client
            .send(Method::GET, &format!("/api/v1/groups/{group_id}"), Some(ben), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(details["members"].as_array().unwrap().len(), 2);

        let (status, body) = client
            .send(
                Method::POST,
                &format!("/api/v1/groups/{group_id}/leave"),
                Some(ana),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");
        assert_eq!(body["message"], "A group must keep at least one admin");

        let (status, _) = client
            .send(
                Method::POST,
                &format!("/api/v1/groups/{group_id}/leave"),
                Some(ben),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn shopping_list_generation_over_http() {
        let fx = Fixture::new();
        let ana = fx.user("Ana").await;
        let group = fx.group(ana).await;
        let client = Client::new(&fx);

        let (_, plan) = client
            .send(
                Method::POST,
                &format!("/api/v1/groups/{group}/meal-plans"),
                Some(ana),
                Some(json!({ "name": "Week 10", "startDate": "2024-03-04T00:00:00Z" })),
            )
            .await;
        let plan_id = plan["id"].as_str().unwrap().to_string();
        assert_eq!(plan["isActive"], true);

        let (_, ingredient) = client
            .send(
                Method::POST,
                "/api/v1/ingredients",
                Some(ana),
                Some(json!({ "name": "Rice", "unit": "cup" })),
            )
            .await;
        for (meal, quantity) in [("Pilaf", 2.0), ("Risotto", 1.5)] {
            let (status, created) = client
                .send(
                    Method::POST,
                    &format!("/api/v1/meal-plans/{plan_id}/meals"),
                    Some(ana),
                    Some(json!({ "name": meal, "mealType": "dinner", "dayOfWeek": 1 })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            let (status, _) = client
                .send(
                    Method::POST,
                    &format!("/api/v1/meals/{}/ingredients", created["id"].as_str().unwrap()),
                    Some(ana),
                    Some(json!({
                        "ingredientId": ingredient["id"],
                        "quantity": quantity,
                        "unit": "cup"
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, list) = client
            .send(
                Method::POST,
                &format!("/api/v1/meal-plans/{plan_id}/shopping-lists/generate"),
                Some(ana),
                Some(json!({ "name": "Groceries" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(list["name"], "Groceries");
        let items = list["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["quantity"], 3.5);
        assert_eq!(items[0]["unit"], "cup");
    }

    #[tokio::test]
    async fn invalid_payloads_are_bad_requests() {
        let fx = Fixture::new();
        let ana = fx.user("Ana").await;
        let client = Client::new(&fx);
        let (status, body) = client
            .send(
                Method::POST,
                "/api/v1/groups",
                Some(ana),
                Some(json!({ "name": "" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
        assert_eq!(body["message"], "name is required");
    }

    #[tokio::test]
    async fn malformed_bodies_use_the_error_envelope() {
        let fx = Fixture::new();
        let ana = fx.user("Ana").await;
        let ben = fx.user("Ben").await;
        let group = fx.group(ana).await;
        let client = Client::new(&fx);

        let (status, body) = client
            .send(
                Method::POST,
                &format!("/api/v1/groups/{group}/members"),
                Some(ana),
                Some(json!({ "userId": ben, "role": "owner" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
        assert!(body["message"].as_str().unwrap().contains("owner"));

        let (status, body) = client
            .send(
                Method::POST,
                &format!("/api/v1/groups/{group}/invitations"),
                Some(ana),
                Some(json!({ "invitedUserId": ben, "expiresInDays": 1.5 })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");

        let (status, body) = client
            .send(
                Method::POST,
                &format!("/api/v1/groups/{group}/invitations"),
                Some(ana),
                Some(json!({ "role": "member" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
        assert_eq!(fx.role_of(group, ben).await, None);
    }

    #[tokio::test]
    async fn malformed_path_and_query_use_the_error_envelope() {
        let fx = Fixture::new();
        let ana = fx.user("Ana").await;
        let group = fx.group(ana).await;
        let client = Client::new(&fx);

        let (status, body) = client
            .send(Method::GET, "/api/v1/groups/not-a-uuid", Some(ana), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");

        let (status, body) = client
            .send(
                Method::GET,
                &format!("/api/v1/groups/{group}/user-search?query=an&limit=lots"),
                Some(ana),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }
}
