//! Router construction for the Compass server.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware as axum_mw,
    routing::{get, post, put},
    Extension, Router,
};
use compass_core::transaction::Transactioner;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::jwt::{jwt_auth, JwtConfig};
use crate::state::AppState;

/// Build the full axum router with all routes and middleware.
///
/// Destination-fetcher routes live under `root_api`; director routes are
/// mounted at the top level.
pub fn build_router<T: Transactioner + 'static>(
    state: Arc<AppState<T>>,
    jwt_config: JwtConfig,
    root_api: &str,
    timeout: Duration,
) -> Router {
    let root = root_api.trim_end_matches('/');

    // Routes that require JWT authentication
    let protected = Router::new()
        // Destination fetcher
        .route(
            &format!("{root}/destinations"),
            put(handlers::destinations::sync_tenant_destinations::<T>),
        )
        .route(
            &format!("{root}/destinations/sensitive"),
            get(handlers::destinations::fetch_destinations_sensitive_data::<T>),
        )
        // Director
        .route("/applications", post(handlers::applications::register::<T>))
        .route("/applications/:id", get(handlers::applications::get::<T>))
        .route(
            "/applications/:id/bundles",
            post(handlers::bundles::add::<T>).get(handlers::bundles::list_for_application::<T>),
        )
        .route(
            "/bundles/:id",
            get(handlers::bundles::get::<T>)
                .put(handlers::bundles::update::<T>)
                .delete(handlers::bundles::delete::<T>),
        )
        .route(
            "/bundles/:id/apis",
            post(handlers::apis::add_to_bundle::<T>).get(handlers::apis::list_for_bundle::<T>),
        )
        .route(
            "/apis/:id",
            get(handlers::apis::get::<T>)
                .put(handlers::apis::update::<T>)
                .delete(handlers::apis::delete::<T>),
        )
        .route(
            "/apis/:id/entity-type-mappings",
            post(handlers::entity_type_mappings::add_for_api::<T>)
                .get(handlers::entity_type_mappings::list_for_api::<T>),
        )
        .route(
            "/entity-type-mappings/:id",
            axum::routing::delete(handlers::entity_type_mappings::delete::<T>),
        )
        .layer(axum_mw::from_fn(jwt_auth))
        .layer(Extension(jwt_config));

    // Public routes (no auth)
    let public = Router::new()
        .route(&format!("{root}/healthz"), get(handlers::health::healthz))
        .route(&format!("{root}/readyz"), get(handlers::health::readyz));

    public
        .merge(protected)
        .layer(Extension(state))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::middleware::jwt::{SCOPE_DESTINATIONS_SYNC, SCOPE_SENSITIVE_DATA_READ};
    use crate::testing::{seed_tenant, test_state, FakeDestinationApi, TestFixture};

    const SECRET: &[u8] = b"router-test-secret";
    const ROOT: &str = "/destination-configuration/v1";

    fn app(api: FakeDestinationApi) -> (Router, TestFixture) {
        let (state, fixture) = test_state(api);
        let router = build_router(state, JwtConfig::from_secret(SECRET), ROOT, Duration::from_secs(5));
        (router, fixture)
    }

    fn token(tenant: &str, scopes: &[&str]) -> String {
        let claims = json!({ "sub": "test-client", "tenant": tenant, "scope": scopes.join(" ") });
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    async fn call(router: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    // ── health & auth ──────────────────────────────────────────

    #[tokio::test]
    async fn health_needs_no_token() {
        let (router, _) = app(FakeDestinationApi::default());
        let (status, _) = call(&router, Method::GET, &format!("{ROOT}/healthz"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&router, Method::GET, &format!("{ROOT}/readyz"), None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let (router, _) = app(FakeDestinationApi::default());
        let (status, body) = call(&router, Method::PUT, &format!("{ROOT}/destinations"), None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].as_str().unwrap().contains("bearer token"));
    }

    #[tokio::test]
    async fn wrong_scope_is_forbidden() {
        let (router, fixture) = app(FakeDestinationApi::default());
        seed_tenant(&fixture, "ext-a", Some(("sub-a", "eu10"))).await;

        let token = token("ext-a", &[SCOPE_SENSITIVE_DATA_READ]);
        let (status, _) = call(&router, Method::PUT, &format!("{ROOT}/destinations"), Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    // ── destination fetcher ────────────────────────────────────

    #[tokio::test]
    async fn sync_for_subscribed_tenant() {
        let api = FakeDestinationApi::default();
        api.add_destination("sub-a", "dest-a");
        let (router, fixture) = app(api.clone());
        seed_tenant(&fixture, "ext-a", Some(("sub-a", "eu10"))).await;

        let token = token("ext-a", &[SCOPE_DESTINATIONS_SYNC]);
        let (status, _) = call(&router, Method::PUT, &format!("{ROOT}/destinations"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(api.synced_subdomains(), vec!["sub-a".to_string()]);
    }

    #[tokio::test]
    async fn sync_for_unsubscribed_or_unknown_tenant_is_bad_request() {
        let (router, fixture) = app(FakeDestinationApi::default());
        seed_tenant(&fixture, "ext-plain", None).await;

        let token_plain = token("ext-plain", &[SCOPE_DESTINATIONS_SYNC]);
        let (status, body) = call(&router, Method::PUT, &format!("{ROOT}/destinations"), Some(&token_plain), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("not subscribed"));

        let token_unknown = token("ext-nobody", &[SCOPE_DESTINATIONS_SYNC]);
        let (status, _) = call(&router, Method::PUT, &format!("{ROOT}/destinations"), Some(&token_unknown), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn sync_failure_is_internal_error() {
        let api = FakeDestinationApi::default();
        api.fail_subdomain("sub-a");
        let (router, fixture) = app(api);
        seed_tenant(&fixture, "ext-a", Some(("sub-a", "eu10"))).await;

        let token = token("ext-a", &[SCOPE_DESTINATIONS_SYNC]);
        let (status, body) = call(&router, Method::PUT, &format!("{ROOT}/destinations"), Some(&token), None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().starts_with("Failed to sync destinations"));
    }

    #[tokio::test]
    async fn sensitive_data_for_named_destinations() {
        let api = FakeDestinationApi::default();
        api.add_destination("sub-a", "d1");
        api.add_destination("sub-a", "d2");
        let (router, fixture) = app(api);
        seed_tenant(&fixture, "ext-a", Some(("sub-a", "eu10"))).await;
        let token = token("ext-a", &[SCOPE_SENSITIVE_DATA_READ]);

        let uri = format!("{ROOT}/destinations/sensitive?name=d1&name=d2");
        let (status, body) = call(&router, Method::GET, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["destinations"]["d1"]["authTokens"][0]["value"], "secret-d1");
        assert_eq!(body["destinations"]["d2"]["destinationConfiguration"]["Name"], "d2");

        let uri = format!("{ROOT}/destinations/sensitive?name=d1&name=nope");
        let (status, _) = call(&router, Method::GET, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sensitive_data_without_names_is_bad_request() {
        let (router, fixture) = app(FakeDestinationApi::default());
        seed_tenant(&fixture, "ext-a", Some(("sub-a", "eu10"))).await;
        let token = token("ext-a", &[SCOPE_SENSITIVE_DATA_READ]);

        let (status, body) = call(&router, Method::GET, &format!("{ROOT}/destinations/sensitive"), Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("'name'"));
    }

    // ── director ───────────────────────────────────────────────

    #[tokio::test]
    async fn application_bundle_api_flow() {
        let (router, fixture) = app(FakeDestinationApi::default());
        seed_tenant(&fixture, "ext-a", None).await;
        let token = token("ext-a", &[]);

        let (status, app) = call(&router, Method::POST, "/applications", Some(&token), Some(json!({ "name": "payments" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        let app_id = app["id"].as_str().unwrap().to_string();

        let (status, bundle) = call(
            &router,
            Method::POST,
            &format!("/applications/{app_id}/bundles"),
            Some(&token),
            Some(json!({ "name": "orders", "correlationIDs": ["c-1"] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(bundle["applicationID"], app_id.as_str());
        let bundle_id = bundle["id"].as_str().unwrap().to_string();

        let (status, api) = call(
            &router,
            Method::POST,
            &format!("/bundles/{bundle_id}/apis"),
            Some(&token),
            Some(json!({ "name": "orders-api", "targetURL": "https://orders.example.com/api" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let api_id = api["id"].as_str().unwrap().to_string();

        let (status, fetched) = call(&router, Method::GET, &format!("/apis/{api_id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["targetURL"], "https://orders.example.com/api");
        assert_eq!(fetched["bundleID"], bundle_id.as_str());

        let (status, page) = call(&router, Method::GET, &format!("/bundles/{bundle_id}/apis?first=10"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["totalCount"], 1);

        let (status, bundles) = call(&router, Method::GET, &format!("/applications/{app_id}/bundles"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bundles.as_array().unwrap().len(), 1);

        let (status, _) = call(&router, Method::DELETE, &format!("/bundles/{bundle_id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&router, Method::GET, &format!("/apis/{api_id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn entity_type_mappings_on_api() {
        let (router, fixture) = app(FakeDestinationApi::default());
        seed_tenant(&fixture, "ext-a", None).await;
        let token = token("ext-a", &[]);

        let (_, app) = call(&router, Method::POST, "/applications", Some(&token), Some(json!({ "name": "catalog" }))).await;
        let (_, bundle) = call(
            &router,
            Method::POST,
            &format!("/applications/{}/bundles", app["id"].as_str().unwrap()),
            Some(&token),
            Some(json!({ "name": "products" })),
        )
        .await;
        let (_, api) = call(
            &router,
            Method::POST,
            &format!("/bundles/{}/apis", bundle["id"].as_str().unwrap()),
            Some(&token),
            Some(json!({ "name": "products-api", "targetURL": "https://catalog.example.com" })),
        )
        .await;
        let api_id = api["id"].as_str().unwrap().to_string();

        let (status, mapping) = call(
            &router,
            Method::POST,
            &format!("/apis/{api_id}/entity-type-mappings"),
            Some(&token),
            Some(json!({
                "apiModelSelectors": [{ "type": "ODATA", "entitySetName": "A_Product" }],
                "entityTypeTargets": [{ "ordId": "sap.s4:entityType:Product:v1" }],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(mapping["apiDefinitionID"], api_id.as_str());

        let (status, page) = call(&router, Method::GET, &format!("/apis/{api_id}/entity-type-mappings"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["totalCount"], 1);

        let mapping_uri = format!("/entity-type-mappings/{}", mapping["id"].as_str().unwrap());
        let (status, _) = call(&router, Method::DELETE, &mapping_uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn foreign_tenant_cannot_see_application() {
        let (router, fixture) = app(FakeDestinationApi::default());
        seed_tenant(&fixture, "ext-a", None).await;
        seed_tenant(&fixture, "ext-b", None).await;

        let owner = token("ext-a", &[]);
        let (_, app) = call(&router, Method::POST, "/applications", Some(&owner), Some(json!({ "name": "payments" }))).await;
        let app_id = app["id"].as_str().unwrap();

        let stranger = token("ext-b", &[]);
        let (status, _) = call(&router, Method::GET, &format!("/applications/{app_id}"), Some(&stranger), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(
            &router,
            Method::POST,
            &format!("/applications/{app_id}/bundles"),
            Some(&stranger),
            Some(json!({ "name": "sneaky" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn foreign_tenant_cannot_list_bundle_apis() {
        let (router, fixture) = app(FakeDestinationApi::default());
        seed_tenant(&fixture, "ext-a", None).await;
        seed_tenant(&fixture, "ext-b", None).await;

        let owner = token("ext-a", &[]);
        let (_, app) = call(&router, Method::POST, "/applications", Some(&owner), Some(json!({ "name": "payments" }))).await;
        let app_id = app["id"].as_str().unwrap().to_string();
        let (_, bundle) = call(
            &router,
            Method::POST,
            &format!("/applications/{app_id}/bundles"),
            Some(&owner),
            Some(json!({ "name": "orders" })),
        )
        .await;
        let bundle_id = bundle["id"].as_str().unwrap().to_string();
        for name in ["a", "b", "c"] {
            let (status, _) = call(
                &router,
                Method::POST,
                &format!("/bundles/{bundle_id}/apis"),
                Some(&owner),
                Some(json!({ "name": name, "targetURL": "https://orders.example.com/api" })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let stranger = token("ext-b", &[]);
        let (status, _) = call(&router, Method::GET, &format!("/bundles/{bundle_id}/apis?first=2"), Some(&stranger), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, page) = call(&router, Method::GET, &format!("/bundles/{bundle_id}/apis?first=2"), Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["totalCount"], 3);
    }
}
