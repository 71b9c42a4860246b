use std::collections::BTreeSet;

use rolegate_core::AppResult;
use rolegate_domain::{
    ConsistencyLevel, RecursiveRoleQuery, collect_role_names, expand_one_level,
};

use super::ExternalRoleManager;

impl ExternalRoleManager {
    /// Returns the grantee and the roles it is directly a member of.
    ///
    /// `mode` is ignored: memberships of memberships are never followed.
    pub async fn granted_roles(
        &self,
        grantee_name: &str,
        _mode: RecursiveRoleQuery,
    ) -> AppResult<BTreeSet<String>> {
        let record = self.require(grantee_name).await?;
        Ok(expand_one_level(grantee_name, &record))
    }

    /// Returns every role with a row plus every name used as a membership target.
    pub async fn all_roles(&self) -> AppResult<BTreeSet<String>> {
        let records = self.store.list_roles(ConsistencyLevel::Quorum).await?;
        Ok(collect_role_names(&records))
    }
}
