use super::*;

impl PostgresRoleStore {
    pub(super) async fn find_role_impl(&self, role_name: &str) -> AppResult<Option<RoleRecord>> {
        let row = sqlx::query_as::<_, RoleRow>(self.statements.find_role.as_str())
            .bind(role_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| map_sqlx_error("find role", error))?;

        Ok(row.map(RoleRecord::from))
    }

    pub(super) async fn upsert_role_impl(
        &self,
        role_name: &str,
        config: RoleConfig,
        consistency: ConsistencyLevel,
    ) -> AppResult<()> {
        let mut transaction = self.begin_write(consistency).await?;

        sqlx::query(self.statements.upsert_role.as_str())
            .bind(role_name)
            .bind(config.is_superuser)
            .bind(config.can_login)
            .execute(&mut *transaction)
            .await
            .map_err(|error| map_sqlx_error("upsert role", error))?;

        Self::commit(transaction).await
    }

    pub(super) async fn list_roles_impl(&self) -> AppResult<Vec<RoleRecord>> {
        let rows = sqlx::query_as::<_, RoleRow>(self.statements.list_roles.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| map_sqlx_error("list roles", error))?;

        Ok(rows.into_iter().map(RoleRecord::from).collect())
    }

    pub(super) async fn any_login_role_impl(&self) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(self.statements.any_login_role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|error| map_sqlx_error("check for login roles", error))
    }
}
