use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{database::StoreError, payment::PaymentError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload")]
    MalformedPayload,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("AI recipe limit reached")]
    UpgradeRequired,

    #[error("Payment provider error: {0}")]
    PaymentProvider(#[from] PaymentError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::MalformedPayload => "malformed_payload",
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::UpgradeRequired => "upgrade_required",
            AppError::PaymentProvider(_) => "payment_provider",
            AppError::Store(_) => "store",
            AppError::InternalError(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedPayload | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UpgradeRequired => StatusCode::PAYMENT_REQUIRED,
            AppError::PaymentProvider(_) => StatusCode::BAD_GATEWAY,
            AppError::Store(_) | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(self, AppError::PaymentProvider(_))
    }

    /// User-facing text. Provider and storage details only go to the logs.
    pub fn message(&self) -> String {
        match self {
            AppError::MalformedPayload => "Некорректный запрос".to_string(),
            AppError::Validation(message) | AppError::NotFound(message) => message.clone(),
            AppError::UpgradeRequired => {
                "Бесплатные ИИ-рецепты закончились, оформите премиум".to_string()
            }
            AppError::PaymentProvider(_) => {
                "Платежный сервис недоступен, попробуйте еще раз".to_string()
            }
            AppError::Store(_) | AppError::InternalError(_) => "Ошибка сервера".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!("{self}");
        }

        let body = Json(json!({
            "kind": self.kind(),
            "message": self.message(),
            "retryable": self.retryable(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upgrade_required_is_distinct() {
        let err = AppError::UpgradeRequired;

        assert_eq!(err.kind(), "upgrade_required");
        assert_eq!(err.status(), StatusCode::PAYMENT_REQUIRED);
        assert!(!err.retryable());
    }

    #[test]
    fn test_payment_failure_is_retryable() {
        let err = AppError::from(PaymentError::Rejected("shop disabled".to_string()));

        assert_eq!(err.kind(), "payment_provider");
        assert!(err.retryable());
        assert!(!err.message().contains("shop disabled"));
    }

    #[test]
    fn test_response_status() {
        let response = AppError::Validation("Выберите минимум 2 продукта".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
