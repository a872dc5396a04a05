#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use cab_partner_api::config::EnvironmentConfig;
use cab_partner_api::repositories::MemoryStore;
use cab_partner_api::{create_router, AppState};

pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
}

impl TestApp {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let state = AppState::with_memory(store.clone(), EnvironmentConfig::default());
        Self {
            router: create_router(state),
            store,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    /// POST con un body JSON arbitrario, aunque no sea válido
    pub async fn post_raw(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, None).await
    }

    /// Registra un partner y devuelve su ID
    pub async fn create_partner(&self, name: &str, email: &str, phone: &str) -> String {
        let (status, body) = self
            .post(
                "/api/partners",
                serde_json::json!({
                    "name": name,
                    "contact": { "phone": phone, "email": email },
                    "address": "MG Road, Bengaluru",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["partnerId"].as_str().unwrap().to_string()
    }

    /// Añade un vehículo a la flota y devuelve su ID
    pub async fn add_vehicle(&self, partner_id: &str, registration: &str) -> String {
        let (status, body) = self
            .post(
                &format!("/api/partners/{partner_id}/vehicles"),
                serde_json::json!({
                    "type": "sedan",
                    "registration": registration,
                    "make": "Toyota",
                    "model": "Etios",
                    "color": "white",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");

        let (_, fleet) = self.get(&format!("/api/partners/{partner_id}/vehicles")).await;
        fleet
            .as_array()
            .unwrap()
            .iter()
            .find(|v| v["registration"] == registration)
            .map(|v| v["vehicleId"].as_str().unwrap().to_string())
            .unwrap()
    }
}
