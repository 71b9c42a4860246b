use super::*;

impl PostgresRoleStore {
    pub(super) async fn find_attribute_impl(
        &self,
        role_name: &str,
        attribute_name: &str,
    ) -> AppResult<Option<String>> {
        let value = sqlx::query_scalar::<_, Option<String>>(
            self.statements.find_attribute.as_str(),
        )
        .bind(role_name)
        .bind(attribute_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| map_sqlx_error("find role attribute", error))?;

        Ok(value.flatten())
    }

    pub(super) async fn upsert_attribute_impl(
        &self,
        role_name: &str,
        attribute_name: &str,
        value: &str,
        consistency: ConsistencyLevel,
    ) -> AppResult<()> {
        let mut transaction = self.begin_write(consistency).await?;

        sqlx::query(self.statements.upsert_attribute.as_str())
            .bind(role_name)
            .bind(attribute_name)
            .bind(value)
            .execute(&mut *transaction)
            .await
            .map_err(|error| map_sqlx_error("upsert role attribute", error))?;

        Self::commit(transaction).await
    }

    pub(super) async fn delete_attribute_impl(
        &self,
        role_name: &str,
        attribute_name: &str,
        consistency: ConsistencyLevel,
    ) -> AppResult<()> {
        let mut transaction = self.begin_write(consistency).await?;

        sqlx::query(self.statements.delete_attribute.as_str())
            .bind(role_name)
            .bind(attribute_name)
            .execute(&mut *transaction)
            .await
            .map_err(|error| map_sqlx_error("delete role attribute", error))?;

        Self::commit(transaction).await
    }
}
