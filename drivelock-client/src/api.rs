//! Typed client for the `/api/users` endpoints.

use reqwest::{Method, RequestBuilder};
use serde::{Serialize, de::DeserializeOwned};

use drivelock_core::PasswordStatus;

use crate::{
    error::ClientError,
    types::{
        ChangePasswordRequest, EmailRequest, LoginRequest, LoginResponse, MessageResponse,
        OtpRequest, RegisterRequest, ResetPasswordRequest,
    },
};

/// Where the API lives and how this client identifies itself.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            user_agent: format!("drivelock/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// No client-side timeout is configured; the server's own limits apply.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiConfig,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ClientError> {
        let http = reqwest::ClientBuilder::new()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.send(self.request(Method::POST, "/api/users/login").json(&body), "login")
            .await
    }

    pub async fn password_status(&self, token: &str) -> Result<PasswordStatus, ClientError> {
        let request = self
            .request(Method::GET, "/api/users/password-status")
            .bearer_auth(token);
        self.send(request, "password-status").await
    }

    pub async fn change_password(
        &self,
        token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<MessageResponse, ClientError> {
        let body = ChangePasswordRequest {
            current_password: current_password.to_string(),
            new_password: new_password.to_string(),
        };
        let request = self
            .request(Method::PUT, "/api/users/change-password")
            .bearer_auth(token)
            .json(&body);
        self.send(request, "change-password").await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<MessageResponse, ClientError> {
        let body = EmailRequest {
            email: email.to_string(),
        };
        self.post("/api/users/forgot-password", &body, "forgot-password")
            .await
    }

    pub async fn verify_reset_otp(
        &self,
        email: &str,
        otp: &str,
    ) -> Result<MessageResponse, ClientError> {
        let body = OtpRequest {
            email: email.to_string(),
            otp: otp.to_string(),
        };
        self.post("/api/users/verify-reset-otp", &body, "verify-reset-otp")
            .await
    }

    pub async fn reset_password(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
    ) -> Result<MessageResponse, ClientError> {
        let body = ResetPasswordRequest {
            email: email.to_string(),
            otp: otp.to_string(),
            new_password: new_password.to_string(),
        };
        self.post("/api/users/reset-password", &body, "reset-password")
            .await
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<MessageResponse, ClientError> {
        self.post("/api/users/register", request, "register").await
    }

    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<MessageResponse, ClientError> {
        let body = OtpRequest {
            email: email.to_string(),
            otp: otp.to_string(),
        };
        self.post("/api/users/verify-otp", &body, "verify-otp").await
    }

    pub async fn resend_otp(&self, email: &str) -> Result<MessageResponse, ClientError> {
        let body = EmailRequest {
            email: email.to_string(),
        };
        self.post("/api/users/resend-otp", &body, "resend-otp").await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.config.endpoint(path))
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        operation: &'static str,
    ) -> Result<T, ClientError> {
        self.send(self.request(Method::POST, path).json(body), operation)
            .await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &'static str,
    ) -> Result<T, ClientError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(operation, error = %e, "Request failed");
            ClientError::Network(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<MessageResponse>(&body)
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));
            tracing::debug!(operation, status = status.as_u16(), %message, "API returned error status");
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response.json::<T>().await.map_err(|e| {
            tracing::error!(operation, error = %e, "Failed to parse API response");
            ClientError::Decode(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_paths() {
        let config = ApiConfig::new("https://api.rentals.test/");
        assert_eq!(
            config.endpoint("/api/users/login"),
            "https://api.rentals.test/api/users/login"
        );
        assert_eq!(
            config.endpoint("api/users/login"),
            "https://api.rentals.test/api/users/login"
        );
    }

    #[test]
    fn test_default_user_agent() {
        let config = ApiConfig::default();
        assert!(config.user_agent.starts_with("drivelock/"));
        let config = config.with_user_agent("rental-web/2.0");
        assert_eq!(config.user_agent, "rental-web/2.0");
    }
}
