// src/models/client.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use sqlx::FromRow;
use uuid::Uuid;

use super::labelled_status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "client_status")]
#[serde(try_from = "String", into = "&'static str")]
pub enum ClientStatus {
    #[sqlx(rename = "Ativo")]
    Active,
    #[sqlx(rename = "Inativo")]
    Inactive,
    #[sqlx(rename = "Lista Negra")]
    Blacklisted,
}

labelled_status!(ClientStatus {
    Active => "Ativo",
    Inactive => "Inativo",
    Blacklisted => "Lista Negra",
});

/// O que o motor precisa saber de um cliente (o cadastro em si é de outro módulo).
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientRef {
    pub id: Uuid,
    pub name: String,
    pub status: ClientStatus,
}
