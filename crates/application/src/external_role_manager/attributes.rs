use std::collections::BTreeMap;

use futures::future::try_join_all;

use rolegate_core::{AppError, AppResult, NonEmptyString};
use rolegate_domain::{ConsistencyLevel, RoleName};

use super::ExternalRoleManager;

const ATTRIBUTE_CONSISTENCY: ConsistencyLevel = ConsistencyLevel::LocalOne;

impl ExternalRoleManager {
    /// Returns one attribute value of a role.
    pub async fn get_attribute(
        &self,
        role_name: &str,
        attribute_name: &str,
    ) -> AppResult<Option<String>> {
        let role_name = RoleName::new(role_name)?;
        let attribute_name = NonEmptyString::new(attribute_name)?;
        self.store
            .find_attribute(
                role_name.as_str(),
                attribute_name.as_str(),
                ATTRIBUTE_CONSISTENCY,
            )
            .await
    }

    /// Returns the value of one attribute for every known role that has it set.
    ///
    /// Lookups run concurrently; the first failure fails the whole call.
    pub async fn attribute_for_all(
        &self,
        attribute_name: &str,
    ) -> AppResult<BTreeMap<String, String>> {
        let attribute_name = NonEmptyString::new(attribute_name)?;
        let roles = self.all_roles().await?;

        let lookups = roles.into_iter().map(|role_name| {
            let attribute_name = attribute_name.as_str();
            async move {
                let value = self
                    .store
                    .find_attribute(role_name.as_str(), attribute_name, ATTRIBUTE_CONSISTENCY)
                    .await?;
                Ok::<_, AppError>(value.map(|value| (role_name, value)))
            }
        });

        Ok(try_join_all(lookups).await?.into_iter().flatten().collect())
    }

    /// Sets one attribute value of an existing role.
    pub async fn set_attribute(
        &self,
        role_name: &str,
        attribute_name: &str,
        value: &str,
    ) -> AppResult<()> {
        let role_name = self.require_existing(role_name).await?;
        let attribute_name = NonEmptyString::new(attribute_name)?;
        self.store
            .upsert_attribute(
                role_name.as_str(),
                attribute_name.as_str(),
                value,
                ATTRIBUTE_CONSISTENCY,
            )
            .await
    }

    /// Removes one attribute of an existing role. Removing an unset attribute succeeds.
    pub async fn remove_attribute(&self, role_name: &str, attribute_name: &str) -> AppResult<()> {
        let role_name = self.require_existing(role_name).await?;
        let attribute_name = NonEmptyString::new(attribute_name)?;
        self.store
            .delete_attribute(
                role_name.as_str(),
                attribute_name.as_str(),
                ATTRIBUTE_CONSISTENCY,
            )
            .await
    }

    async fn require_existing(&self, role_name: &str) -> AppResult<RoleName> {
        let role_name = RoleName::new(role_name)?;
        if !self.exists(role_name.as_str()).await? {
            return Err(AppError::NonexistentRole(role_name.into_string()));
        }

        Ok(role_name)
    }
}
