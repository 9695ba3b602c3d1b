// src/db/client_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::client::ClientRef};

// Só a consulta que o motor precisa; o cadastro de clientes é de outro módulo
#[derive(Clone, Default)]
pub struct ClientRepository;

impl ClientRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn get_client<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<ClientRef>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = sqlx::query_as::<_, ClientRef>(
            "SELECT id, name, status FROM clients WHERE id = $1 AND tenant_id = $2",
        )
            .bind(client_id)
            .bind(tenant_id)
            .fetch_optional(executor)
            .await?;

        Ok(client)
    }
}
