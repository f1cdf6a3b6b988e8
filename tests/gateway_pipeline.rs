#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{
        Router,
        body::Body,
        http::{Method, Request, Response, StatusCode, header},
    };
    use bytes::Bytes;
    use chrono::Utc;
    use http_body_util::BodyExt;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use motorway::{
        HttpClient, HttpClientAdapter, HttpHandler, JwtVerifier,
        config::{AuthConfig, ServerConfig},
        ports::http_client::HttpClientResult,
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const SECRET: &str = "integration-test-secret-0123456789";

    #[derive(Debug, Clone)]
    struct Recorded {
        method: Method,
        uri: String,
        authorization: Option<String>,
        content_type: Option<String>,
        body: Bytes,
    }

    /// Records every outbound request and answers with a canned response.
    struct SpyClient {
        status: StatusCode,
        body: &'static str,
        calls: Mutex<Vec<Recorded>>,
    }

    impl SpyClient {
        fn replying(status: StatusCode, body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                status,
                body,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Recorded> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for SpyClient {
        async fn send_request(&self, req: Request<Body>) -> HttpClientResult<Response<Body>> {
            let (parts, body) = req.into_parts();
            let header_text = |name: header::HeaderName| {
                parts
                    .headers
                    .get(name)
                    .map(|v: &header::HeaderValue| v.to_str().unwrap().to_string())
            };
            let recorded = Recorded {
                method: parts.method.clone(),
                uri: parts.uri.to_string(),
                authorization: header_text(header::AUTHORIZATION),
                content_type: header_text(header::CONTENT_TYPE),
                body: body.collect().await.unwrap().to_bytes(),
            };
            self.calls.lock().unwrap().push(recorded);

            Ok(Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(self.body))
                .unwrap())
        }
    }

    fn config(vehicles: &str) -> ServerConfig {
        ServerConfig::builder()
            .vehicles_url(vehicles)
            .accounts_url("http://accounts.test")
            .hmac_secret(SECRET)
            .build()
    }

    fn app_with(config: &ServerConfig, client: Arc<dyn HttpClient>) -> Router {
        let verifier = Arc::new(JwtVerifier::new(&config.auth).unwrap());
        HttpHandler::new(config, verifier, client)
            .unwrap()
            .into_router()
    }

    fn app(client: Arc<SpyClient>) -> Router {
        app_with(&config("http://vehicles.test"), client)
    }

    fn token(exp_offset_secs: i64, secret: &str) -> String {
        encode(
            &Header::default(),
            &json!({"sub": "user-42", "exp": Utc::now().timestamp() + exp_offset_secs}),
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Response<Body>) {
        let response = app.oneshot(req).await.unwrap();
        (response.status(), response)
    }

    async fn json_body(response: Response<Body>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn protected_route_without_token_never_reaches_backend() {
        let spy = SpyClient::replying(StatusCode::CREATED, "{}");

        let (status, response) = send(
            app(spy.clone()),
            Request::post("/crear")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"brand":"Fiat"}"#))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
        let body = json_body(response).await;
        assert_eq!(body["code"], "missing_token");
        assert!(body["error"].is_string());
        assert!(spy.calls().is_empty());
    }

    #[tokio::test]
    async fn expired_or_forged_tokens_are_forbidden() {
        let spy = SpyClient::replying(StatusCode::OK, "{}");

        let (status, response) = send(
            app(spy.clone()),
            Request::delete("/eliminar/7")
                .header(header::AUTHORIZATION, format!("Bearer {}", token(-3600, SECRET)))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["code"], "token_expired");

        let forged = token(3600, "not-the-gateway-secret-at-all");
        let (status, response) = send(
            app(spy.clone()),
            Request::get("/api/isAuth")
                .header(header::AUTHORIZATION, format!("Bearer {forged}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["code"], "invalid_signature");

        assert!(spy.calls().is_empty());
    }

    #[tokio::test]
    async fn malformed_authorization_is_unauthorized() {
        let spy = SpyClient::replying(StatusCode::OK, "{}");

        let (status, response) = send(
            app(spy.clone()),
            Request::get("/api/isAuth")
                .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "malformed_token");
        assert!(spy.calls().is_empty());
    }

    #[tokio::test]
    async fn valid_token_is_forwarded_verbatim() {
        let spy = SpyClient::replying(StatusCode::OK, r#"{"updated":true}"#);
        let authorization = format!("Bearer {}", token(3600, SECRET));

        let (status, response) = send(
            app(spy.clone()),
            Request::put("/actualizar/42")
                .header(header::AUTHORIZATION, &authorization)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"price":19000}"#))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"updated": true}));

        let calls = spy.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, Method::PUT);
        assert_eq!(calls[0].uri, "http://vehicles.test/api/update/car/42");
        assert_eq!(calls[0].authorization.as_deref(), Some(authorization.as_str()));
        assert_eq!(calls[0].content_type.as_deref(), Some("application/json"));
        assert_eq!(calls[0].body, Bytes::from_static(br#"{"price":19000}"#));
    }

    #[tokio::test]
    async fn create_and_delete_forward_the_caller_token() {
        let spy = SpyClient::replying(StatusCode::CREATED, r#"{"id":"9"}"#);
        let authorization = format!("Bearer {}", token(3600, SECRET));

        let (status, _) = send(
            app(spy.clone()),
            Request::post("/crear")
                .header(header::AUTHORIZATION, &authorization)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"brand":"Fiat","model":"Uno"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = send(
            app(spy.clone()),
            Request::delete("/eliminar/9")
                .header(header::AUTHORIZATION, &authorization)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let calls = spy.calls();
        assert_eq!(calls.len(), 2);

        assert_eq!(calls[0].method, Method::POST);
        assert_eq!(calls[0].uri, "http://vehicles.test/api/create/car");
        assert_eq!(calls[0].authorization.as_deref(), Some(authorization.as_str()));
        assert_eq!(
            calls[0].body,
            Bytes::from_static(br#"{"brand":"Fiat","model":"Uno"}"#)
        );

        assert_eq!(calls[1].method, Method::DELETE);
        assert_eq!(calls[1].uri, "http://vehicles.test/api/delete/car/9");
        assert_eq!(calls[1].authorization.as_deref(), Some(authorization.as_str()));
        assert!(calls[1].content_type.is_none());
        assert!(calls[1].body.is_empty());
    }

    #[tokio::test]
    async fn dot_segment_ids_never_reach_backend() {
        let spy = SpyClient::replying(StatusCode::OK, "{}");
        let authorization = format!("Bearer {}", token(3600, SECRET));

        let (status, response) = send(
            app(spy.clone()),
            Request::delete("/eliminar/%2E%2E")
                .header(header::AUTHORIZATION, &authorization)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "bad_request");

        let (status, _) = send(
            app(spy.clone()),
            Request::put("/actualizar/%2e%2e")
                .header(header::AUTHORIZATION, &authorization)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(spy.calls().is_empty());
    }

    #[tokio::test]
    async fn undecodable_id_without_token_is_unauthorized() {
        let spy = SpyClient::replying(StatusCode::OK, "{}");

        let (status, response) = send(
            app(spy.clone()),
            Request::put("/actualizar/%FF")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "missing_token");

        // Once admitted, the same id is a client error
        let (status, _) = send(
            app(spy.clone()),
            Request::put("/actualizar/%FF")
                .header(header::AUTHORIZATION, format!("Bearer {}", token(3600, SECRET)))
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(spy.calls().is_empty());
    }

    #[tokio::test]
    async fn leeway_admits_recently_expired_tokens() {
        let recently_expired = format!("Bearer {}", token(-30, SECRET));
        let request = || {
            Request::get("/api/isAuth")
                .header(header::AUTHORIZATION, &recently_expired)
                .body(Body::empty())
                .unwrap()
        };

        let spy = SpyClient::replying(StatusCode::OK, "{}");
        let (status, _) = send(app(spy.clone()), request()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(spy.calls().is_empty());

        let lenient = ServerConfig::builder()
            .vehicles_url("http://vehicles.test")
            .accounts_url("http://accounts.test")
            .auth(AuthConfig {
                secret: Some(SECRET.to_string()),
                leeway_secs: 120,
                ..AuthConfig::default()
            })
            .build();
        let (status, _) = send(app_with(&lenient, spy.clone()), request()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(spy.calls().len(), 1);
    }

    #[tokio::test]
    async fn auth_check_reaches_account_service() {
        let spy = SpyClient::replying(StatusCode::OK, r#"{"auth":true}"#);
        let authorization = format!("Bearer {}", token(3600, SECRET));

        let (status, _) = send(
            app(spy.clone()),
            Request::get("/api/isAuth")
                .header(header::AUTHORIZATION, &authorization)
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let calls = spy.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].uri, "http://accounts.test/api/isAuth");
        assert_eq!(calls[0].authorization.as_deref(), Some(authorization.as_str()));
        assert!(calls[0].body.is_empty());
    }

    #[tokio::test]
    async fn search_requires_brand() {
        let spy = SpyClient::replying(StatusCode::OK, "[]");

        let (status, response) = send(
            app(spy.clone()),
            Request::get("/api/search/cars").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "bad_request");
        assert!(spy.calls().is_empty());
    }

    #[tokio::test]
    async fn search_forwards_brand_and_relays_backend_status() {
        let spy = SpyClient::replying(StatusCode::NOT_FOUND, r#"{"message":"no cars"}"#);

        let (status, response) = send(
            app(spy.clone()),
            Request::get("/api/search/cars?brand=Toyota")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(json_body(response).await, json!({"message": "no cars"}));

        let calls = spy.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, Method::GET);
        assert_eq!(
            calls[0].uri,
            "http://vehicles.test/api/search/cars?brand=Toyota"
        );
    }

    #[tokio::test]
    async fn non_numeric_limit_uses_default() {
        let spy = SpyClient::replying(StatusCode::OK, "[]");

        let (status, _) = send(
            app(spy.clone()),
            Request::get("/mostrar/autoslimite/abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let calls = spy.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].uri, "http://vehicles.test/api/read/cars/5");
    }

    #[tokio::test]
    async fn open_routes_do_not_forward_authorization() {
        let spy = SpyClient::replying(StatusCode::OK, r#"{"token":"t"}"#);

        let (status, _) = send(
            app(spy.clone()),
            Request::post("/api/login")
                .header(header::AUTHORIZATION, "Bearer leftover")
                .body(Body::from(r#"{"email":"a@b.c","password":"x"}"#))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let calls = spy.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].uri, "http://accounts.test/api/login");
        assert!(calls[0].authorization.is_none());
        // Content-Type defaults to JSON when the client sent none
        assert_eq!(calls[0].content_type.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn unreachable_vehicle_service_is_bad_gateway() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = config(&format!("http://127.0.0.1:{port}"));
        let client = Arc::new(HttpClientAdapter::new().unwrap());

        let (status, response) = send(
            app_with(&config, client),
            Request::get("/mostrar/autos").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Failed to retrieve cars");
        assert!(!body.to_string().contains("127.0.0.1"));
    }

    #[tokio::test]
    async fn repeated_rejection_is_stable() {
        let spy = SpyClient::replying(StatusCode::OK, "{}");
        let app = app(spy.clone());

        let mut seen = Vec::new();
        for _ in 0..3 {
            let (status, response) = send(
                app.clone(),
                Request::delete("/eliminar/1").body(Body::empty()).unwrap(),
            )
            .await;
            seen.push((status, json_body(response).await));
        }

        assert!(seen.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(seen[0].0, StatusCode::UNAUTHORIZED);
        assert!(spy.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_path_and_wrong_method() {
        let spy = SpyClient::replying(StatusCode::OK, "{}");

        let (status, response) = send(
            app(spy.clone()),
            Request::get("/no/such/route").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["code"], "not_found");

        let (status, response) = send(
            app(spy.clone()),
            Request::get("/api/login").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(header::ALLOW).unwrap(), "POST");

        assert!(spy.calls().is_empty());
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let spy = SpyClient::replying(StatusCode::OK, "{}");

        let (_, response) = send(
            app(spy),
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;

        assert!(response.headers().contains_key("x-request-id"));
    }
}
