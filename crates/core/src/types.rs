use serde::{Deserialize, Serialize};

/// Database primary keys (student logs, email rules) are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Course identifiers are owned by the external catalog.
pub type CourseId = String;

/// User identifiers are owned by the external identity provider.
pub type UserId = String;

/// Chapter identifiers are owned by the external course structure provider.
pub type ChapterId = String;

/// Cache/storage key for a single access grant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantKey {
    pub course_id: CourseId,
    pub user_id: UserId,
}

impl GrantKey {
    pub fn new(course_id: impl Into<CourseId>, user_id: impl Into<UserId>) -> Self {
        Self {
            course_id: course_id.into(),
            user_id: user_id.into(),
        }
    }
}

/// Explicit per-request actor context.
///
/// Every engine operation takes one of these instead of reading ambient
/// "current user / current IP" state.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Acting user, when the operation is user-initiated.
    pub user_id: Option<UserId>,

    /// Client IP for audit trail stamping.
    pub client_ip: Option<String>,
}

impl RequestContext {
    pub fn for_user(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            client_ip: None,
        }
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }
}
