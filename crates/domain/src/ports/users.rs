use crate::DomainResult;
use crate::identity::UserProfile;

/// Read-only view of the user store owned by the identity provider.
pub trait UserDirectory: Send + Sync {
    fn find_user(
        &self,
        user_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Option<UserProfile>>>;
}
