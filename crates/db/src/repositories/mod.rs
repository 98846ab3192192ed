pub mod access_grant_repo;
pub mod email_queue_repo;
pub mod email_rule_repo;
pub mod student_log_repo;

pub use access_grant_repo::AccessGrantRepo;
pub use email_queue_repo::EmailQueueRepo;
pub use email_rule_repo::EmailRuleRepo;
pub use student_log_repo::StudentLogRepo;
