//! Route table and middleware stack.
//!
//! Layers, outermost first:
//!
//! 1. `TraceLayer` request spans
//! 2. Preflight status rewrite (200 to 204)
//! 3. CORS (answers preflights before anything else runs)
//! 4. Security headers
//! 5. Rate limiting
//! 6. JWT auth, only on the protected routes

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::{
    error::AppError,
    handlers::{auth, bills, categories, documents, health, integrations, payment_methods},
    middleware::{
        auth::auth_middleware,
        rate_limit::rate_limit_middleware,
        security_headers::{
            cors_layer, preflight_no_content_middleware, security_headers_middleware,
        },
    },
    state::AppState,
};

async fn route_not_found() -> AppError {
    AppError::NotFound("route")
}

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        // Account
        .route("/api/v1/auth/me", get(auth::me))
        .route("/api/v1/auth/profile", put(auth::update_profile))
        .route("/api/v1/auth/password", put(auth::change_password))
        // Bills
        .route("/api/v1/bills", get(bills::list_bills).post(bills::create_bill))
        .route("/api/v1/bills/upcoming", get(bills::upcoming_bills))
        .route("/api/v1/bills/statistics", get(bills::bill_statistics))
        .route(
            "/api/v1/bills/{id}",
            get(bills::get_bill)
                .put(bills::update_bill)
                .delete(bills::delete_bill),
        )
        .route("/api/v1/bills/{id}/pay", post(bills::pay_bill))
        // Categories
        .route(
            "/api/v1/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/api/v1/categories/statistics",
            get(categories::category_statistics),
        )
        .route(
            "/api/v1/categories/{id}",
            put(categories::update_category).delete(categories::delete_category),
        )
        // Payment methods
        .route(
            "/api/v1/payment-methods",
            get(payment_methods::list_payment_methods).post(payment_methods::create_payment_method),
        )
        .route(
            "/api/v1/payment-methods/statistics",
            get(payment_methods::payment_method_statistics),
        )
        .route(
            "/api/v1/payment-methods/{id}",
            put(payment_methods::update_payment_method).delete(payment_methods::delete_payment_method),
        )
        // Documents
        .route(
            "/api/v1/documents",
            get(documents::list_documents).post(documents::create_document),
        )
        .route(
            "/api/v1/documents/{id}",
            get(documents::get_document)
                .put(documents::update_document)
                .delete(documents::delete_document),
        )
        .route("/api/v1/documents/{id}/ocr", post(documents::process_ocr))
        .route(
            "/api/v1/documents/{id}/bill",
            post(documents::create_bill_from_document),
        )
        // Integrations
        .route(
            "/api/v1/integrations",
            get(integrations::list_integrations).post(integrations::create_integration),
        )
        .route(
            "/api/v1/integrations/smart-assistant",
            post(integrations::connect_smart_assistant),
        )
        .route(
            "/api/v1/integrations/{id}",
            put(integrations::update_integration).delete(integrations::delete_integration),
        )
        .route(
            "/api/v1/integrations/{id}/sync",
            post(integrations::sync_integration),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .merge(protected)
        .fallback(route_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.cors_allowed_origin))
        .layer(axum_middleware::from_fn(preflight_no_content_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::test_config, db::lazy_pool};
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode, header},
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    fn app() -> Router {
        build_router(AppState::new(lazy_pool(), test_config()))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn protected_route_without_token_is_401() {
        let response = app()
            .oneshot(Request::get("/api/v1/bills").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "unauthorized");
    }

    #[tokio::test]
    async fn forged_token_is_401() {
        let state = AppState::new(lazy_pool(), test_config());
        let forged = crate::security::jwt::JwtKeys::new("another-secret-that-is-also-long-enough!", 24)
            .issue(Uuid::new_v4(), "a@b.co", "A")
            .unwrap();

        let response = build_router(state)
            .oneshot(
                Request::get("/api/v1/categories")
                    .header(header::AUTHORIZATION, format!("Bearer {forged}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn preflight_is_answered_without_auth() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/v1/bills")
                    .header(header::ORIGIN, "https://app.example.com")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(response.headers()[header::ACCESS_CONTROL_MAX_AGE], "86400");
    }

    #[tokio::test]
    async fn register_validates_before_touching_the_database() {
        let response = app()
            .oneshot(
                Request::post("/api/v1/auth/register")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"email":"not-an-email","password":"x"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "validation_failed");
        let details = body["error"]["details"].as_array().unwrap();
        assert!(details.iter().any(|d| d == "name is required"));
        assert!(details.iter().any(|d| d == "email has an invalid format"));
    }

    #[tokio::test]
    async fn clients_over_the_limit_get_429() {
        let mut config = test_config();
        config.rate_limit_requests = 2;
        let app = build_router(AppState::new(lazy_pool(), config));

        let request = || {
            Request::get("/api/v1/bills")
                .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
                .body(Body::empty())
                .unwrap()
        };

        for _ in 0..2 {
            let response = app.clone().oneshot(request()).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let response = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
        assert_eq!(response.headers()["x-frame-options"], "DENY");

        // A different client is unaffected.
        let other = Request::get("/api/v1/bills")
            .header("cf-connecting-ip", "198.51.100.4")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(other).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn plain_options_request_is_not_rewritten() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_ne!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn mistyped_body_gets_error_envelope() {
        let response = app()
            .oneshot(
                Request::post("/api/v1/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"email":42,"password":"hunter22"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "invalid_request");
    }

    #[tokio::test]
    async fn unknown_route_uses_error_envelope() {
        let response = app()
            .oneshot(Request::get("/api/v2/nothing").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "route_not_found");
    }
}
