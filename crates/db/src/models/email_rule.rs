//! Email rule and scheduled-send entities.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use coursekit_core::trigger::{EmailRule, RuleStatus, TriggerCondition};
use coursekit_core::types::{DbId, Timestamp};

/// A row from the `email_rules` table. The trigger condition is JSONB.
#[derive(Debug, Clone, FromRow)]
pub struct EmailRuleRow {
    pub id: DbId,
    pub status: String,
    pub subject: String,
    pub body_template: String,
    pub trigger_condition: Option<Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl EmailRuleRow {
    pub fn into_domain(self) -> Result<EmailRule, serde_json::Error> {
        let status: RuleStatus = serde_json::from_value(Value::String(self.status))?;
        let trigger: Option<TriggerCondition> = match self.trigger_condition {
            Some(value) => Some(serde_json::from_value(value)?),
            None => None,
        };
        Ok(EmailRule {
            id: self.id,
            status,
            subject: self.subject,
            body_template: self.body_template,
            trigger,
        })
    }
}

/// A queued send decision: rule × recipient × computed send time.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ScheduledEmail {
    pub id: DbId,
    pub rule_id: DbId,
    pub user_id: String,
    pub course_id: String,
    /// Epoch seconds at which the email becomes eligible to send.
    pub send_at: i64,
    pub created_at: Timestamp,
}

/// DTO for enqueueing a send decision.
#[derive(Debug, Clone, Deserialize)]
pub struct NewScheduledEmail {
    pub rule_id: DbId,
    pub user_id: String,
    pub course_id: String,
    pub send_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn row_with_condition_decodes() {
        let now = Utc::now();
        let row = EmailRuleRow {
            id: 7,
            status: "active".into(),
            subject: "Welcome".into(),
            body_template: "".into(),
            trigger_condition: Some(serde_json::json!({
                "trigger_at": "course_granted",
                "course_ids": [],
                "mode": {"mode": "delayed", "value": 7, "unit": "day"},
                "time_window": {"start": "09:00", "end": null},
                "audience": {"audience": "each"}
            })),
            created_at: now,
            updated_at: now,
        };

        let rule = row.into_domain().unwrap();
        assert_eq!(rule.status, RuleStatus::Active);
        let condition = rule.trigger.unwrap();
        assert_eq!(
            condition.time_window.unwrap().start,
            "09:00".parse().unwrap()
        );
    }

    #[test]
    fn row_without_condition_has_no_trigger() {
        let now = Utc::now();
        let row = EmailRuleRow {
            id: 8,
            status: "draft".into(),
            subject: "s".into(),
            body_template: "".into(),
            trigger_condition: None,
            created_at: now,
            updated_at: now,
        };
        assert!(row.into_domain().unwrap().trigger.is_none());
    }

    #[test]
    fn unknown_status_is_a_decode_error() {
        let now = Utc::now();
        let row = EmailRuleRow {
            id: 9,
            status: "archived".into(),
            subject: "s".into(),
            body_template: "".into(),
            trigger_condition: None,
            created_at: now,
            updated_at: now,
        };
        assert!(row.into_domain().is_err());
    }
}
