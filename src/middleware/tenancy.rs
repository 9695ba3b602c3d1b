// src/middleware/tenancy.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::common::error::AppError;

// Cabeçalho HTTP que identifica a loja
const TENANT_ID_HEADER: &str = "x-tenant-id";

/// Loja (tenant) dona dos dados da requisição.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext(pub Uuid);

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(TENANT_ID_HEADER)
            .ok_or_else(|| AppError::validation("O cabeçalho X-Tenant-ID é obrigatório."))?;

        let value_str = value
            .to_str()
            .map_err(|_| AppError::validation("Cabeçalho X-Tenant-ID contém caracteres inválidos."))?;

        let tenant_id = Uuid::parse_str(value_str.trim())
            .map_err(|_| AppError::validation("Cabeçalho X-Tenant-ID inválido (não é um UUID)."))?;

        Ok(TenantContext(tenant_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<TenantContext, AppError> {
        let mut builder = Request::builder().uri("/api/loans");
        if let Some(value) = header {
            builder = builder.header(TENANT_ID_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        TenantContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_the_tenant_header() {
        let id = Uuid::from_u128(42);
        let ctx = extract(Some(&id.to_string())).await.unwrap();
        assert_eq!(ctx, TenantContext(id));
    }

    #[tokio::test]
    async fn missing_header_is_a_validation_error() {
        assert!(matches!(extract(None).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn malformed_header_is_a_validation_error() {
        assert!(matches!(extract(Some("loja-1")).await, Err(AppError::Validation(_))));
    }
}
