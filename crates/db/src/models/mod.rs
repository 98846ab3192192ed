pub mod email_rule;
pub mod grant;
pub mod student_log;

pub use email_rule::{EmailRuleRow, NewScheduledEmail, ScheduledEmail};
pub use grant::AccessGrantRow;
pub use student_log::{AuditLogEntry, AuditLogFilter, NewAuditLogEntry, UpdateAuditLogEntry};
