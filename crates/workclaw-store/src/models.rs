//! Domain records shared by the portal and the scheduler.

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use workclaw_core::error::{Result, WorkClawError};

/// Lifecycle of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a stored status string. Unknown values fall back to Pending.
    pub fn parse(s: &str) -> Self {
        match s {
            "in_progress" => TaskStatus::InProgress,
            "done" => TaskStatus::Done,
            "cancelled" => TaskStatus::Cancelled,
            _ => TaskStatus::Pending,
        }
    }
}

/// How a recurring template spawns occurrences. Stored as tagged JSON in the
/// `recurrence_rule` column:
///
/// ```json
/// {"kind":"interval","every_days":7}
/// {"kind":"weekly","weekdays":[0,2],"fire_at":"09:00:00","duration_days":1}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecurrenceRule {
    /// Fire every `every_days` days, anchored to the last occurrence.
    Interval { every_days: i64 },
    /// Fire on the given weekdays (0 = Monday) at `fire_at` wall-clock time.
    /// Each occurrence is due `duration_days` days after it fires.
    Weekly {
        weekdays: Vec<u8>,
        fire_at: NaiveTime,
        duration_days: i64,
    },
}

impl RecurrenceRule {
    pub fn kind(&self) -> &'static str {
        match self {
            RecurrenceRule::Interval { .. } => "interval",
            RecurrenceRule::Weekly { .. } => "weekly",
        }
    }
}

/// A work item. Recurring templates and the occurrences they spawn share this
/// shape; an occurrence points back at its template via `parent_task_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub creator_id: i64,
    pub status: TaskStatus,
    pub due_at: Option<NaiveDateTime>,
    pub recurrence_enabled: bool,
    /// Raw rule JSON. Parsed lazily via [`Task::rule`] so one malformed row
    /// cannot poison a whole sweep.
    pub recurrence_rule: Option<String>,
    /// UTC anchor of the most recent spawn. None means the template has never
    /// been primed and the generator leaves it alone.
    pub last_occurrence: Option<NaiveDateTime>,
    pub parent_task_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Task {
    /// Plain one-off task.
    pub fn new(title: &str, description: &str, creator_id: i64, now: NaiveDateTime) -> Self {
        Self {
            id: 0,
            title: title.to_string(),
            description: description.to_string(),
            creator_id,
            status: TaskStatus::Pending,
            due_at: None,
            recurrence_enabled: false,
            recurrence_rule: None,
            last_occurrence: None,
            parent_task_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Template that respawns every `every_days` days, starting one interval
    /// from `now`.
    pub fn recurring_interval(
        title: &str,
        description: &str,
        creator_id: i64,
        every_days: i64,
        now: NaiveDateTime,
    ) -> Self {
        let mut task = Self::new(title, description, creator_id, now);
        task.recurrence_enabled = true;
        task.recurrence_rule = encode_rule(&RecurrenceRule::Interval { every_days });
        task.last_occurrence = Some(now);
        task
    }

    /// Template that respawns on fixed weekdays at a wall-clock time.
    pub fn recurring_weekly(
        title: &str,
        description: &str,
        creator_id: i64,
        weekdays: Vec<u8>,
        fire_at: NaiveTime,
        duration_days: i64,
        now: NaiveDateTime,
    ) -> Self {
        let mut task = Self::new(title, description, creator_id, now);
        task.recurrence_enabled = true;
        task.recurrence_rule = encode_rule(&RecurrenceRule::Weekly {
            weekdays,
            fire_at,
            duration_days,
        });
        task.last_occurrence = Some(now);
        task
    }

    pub fn with_due(mut self, due_at: NaiveDateTime) -> Self {
        self.due_at = Some(due_at);
        self
    }

    /// Parse the stored recurrence rule.
    pub fn rule(&self) -> Result<RecurrenceRule> {
        let raw = self.recurrence_rule.as_deref().ok_or_else(|| {
            WorkClawError::Schedule(format!("task {}: recurrence enabled without a rule", self.id))
        })?;
        serde_json::from_str(raw).map_err(|e| {
            WorkClawError::Schedule(format!("task {}: bad recurrence rule: {e}", self.id))
        })
    }
}

fn encode_rule(rule: &RecurrenceRule) -> Option<String> {
    serde_json::to_string(rule).ok()
}

/// Links a user to a task. One row per (task, user).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub id: i64,
    pub task_id: i64,
    pub user_id: i64,
    pub assigned_by: i64,
    pub assigned_group: Option<String>,
    pub accepted: bool,
    pub accepted_at: Option<NaiveDateTime>,
    pub seen: bool,
    pub created_at: NaiveDateTime,
}

impl TaskAssignment {
    /// Fresh assignment awaiting the user's acceptance.
    pub fn pending(
        task_id: i64,
        user_id: i64,
        assigned_by: i64,
        assigned_group: Option<&str>,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            id: 0,
            task_id,
            user_id,
            assigned_by,
            assigned_group: assigned_group.map(str::to_string),
            accepted: false,
            accepted_at: None,
            seen: false,
            created_at: now,
        }
    }
}

/// In-app notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub link: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Notification {
    pub fn new(
        user_id: i64,
        kind: &str,
        title: &str,
        body: &str,
        link: Option<&str>,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            id: 0,
            user_id,
            kind: kind.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            read: false,
            link: link.map(str::to_string),
            created_at: now,
        }
    }

    /// Sent to each assignee when a recurring task spawns a new occurrence.
    pub fn task_reassigned(user_id: i64, task_title: &str, task_id: i64, now: NaiveDateTime) -> Self {
        Self::new(
            user_id,
            "task_assigned",
            "🔁 Nhiệm vụ lặp lại mới",
            &format!("Nhiệm vụ \"{task_title}\" đã được tự động giao lại cho bạn."),
            Some(&format!("/tasks/{task_id}")),
            now,
        )
    }
}

/// One named bonus or deduction line on a salary sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryItem {
    pub name: String,
    pub amount: f64,
}

/// Monthly salary sheet. [`Salary::calculate`] fills the derived figures from
/// the base fields and the bonus/deduction lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Salary {
    pub id: i64,
    pub employee_name: String,
    /// "YYYY-MM".
    pub month: String,
    pub work_days_in_month: f64,
    pub actual_work_days: f64,
    pub basic_salary: f64,
    pub responsibility_salary: f64,
    pub capacity_bonuses: Vec<SalaryItem>,
    pub deductions: Vec<SalaryItem>,
    pub basic_salary_per_day: f64,
    pub responsibility_salary_per_day: f64,
    pub main_salary: f64,
    pub total_capacity_bonus: f64,
    pub total_income: f64,
    pub total_deduction: f64,
    pub net_salary: f64,
    pub created_by: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Salary {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        employee_name: &str,
        month: &str,
        work_days_in_month: f64,
        actual_work_days: f64,
        basic_salary: f64,
        responsibility_salary: f64,
        created_by: i64,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            id: 0,
            employee_name: employee_name.to_string(),
            month: month.to_string(),
            work_days_in_month,
            actual_work_days,
            basic_salary,
            responsibility_salary,
            capacity_bonuses: Vec::new(),
            deductions: Vec::new(),
            basic_salary_per_day: 0.0,
            responsibility_salary_per_day: 0.0,
            main_salary: 0.0,
            total_capacity_bonus: 0.0,
            total_income: 0.0,
            total_deduction: 0.0,
            net_salary: 0.0,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Recompute every derived figure from the base fields.
    pub fn calculate(&mut self) {
        if self.work_days_in_month > 0.0 {
            self.basic_salary_per_day = self.basic_salary / self.work_days_in_month;
            self.responsibility_salary_per_day =
                self.responsibility_salary / self.work_days_in_month;
        } else {
            self.basic_salary_per_day = 0.0;
            self.responsibility_salary_per_day = 0.0;
        }
        self.main_salary =
            (self.basic_salary_per_day + self.responsibility_salary_per_day) * self.actual_work_days;
        self.total_capacity_bonus = self.capacity_bonuses.iter().map(|b| b.amount).sum();
        self.total_income = self.main_salary + self.total_capacity_bonus;
        self.total_deduction = self.deductions.iter().map(|d| d.amount).sum();
        self.net_salary = self.total_income - self.total_deduction;
    }
}

/// Tokenised read-only share of a salary sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalaryShareLink {
    pub id: i64,
    pub salary_id: i64,
    pub token: String,
    pub created_by: i64,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    /// None means unlimited views. Zero means the link can never be viewed.
    pub max_views: Option<i64>,
    pub view_count: i64,
    pub is_active: bool,
}

impl SalaryShareLink {
    pub fn new(
        salary_id: i64,
        created_by: i64,
        expires_at: NaiveDateTime,
        max_views: Option<i64>,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            id: 0,
            salary_id,
            token: mint_token(),
            created_by,
            created_at: now,
            expires_at,
            max_views,
            view_count: 0,
            is_active: true,
        }
    }

    /// Whether the link may still be served at `now`. Every view must pass
    /// this gate before the counter is bumped.
    pub fn is_valid(&self, now: NaiveDateTime) -> bool {
        if !self.is_active {
            return false;
        }
        if now > self.expires_at {
            return false;
        }
        if let Some(max) = self.max_views {
            if self.view_count >= max {
                return false;
            }
        }
        true
    }
}

/// 32 random bytes as URL-safe base64 without padding.
pub fn mint_token() -> String {
    use base64::Engine as _;
    use rand::RngCore as _;

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_rule_json_roundtrip() {
        let rule = RecurrenceRule::Weekly {
            weekdays: vec![0, 2, 4],
            fire_at: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            duration_days: 1,
        };
        let json = serde_json::to_string(&rule).unwrap();
        assert!(json.contains("\"kind\":\"weekly\""));
        assert!(json.contains("\"weekdays\":[0,2,4]"));
        let back: RecurrenceRule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn test_interval_rule_json_shape() {
        let rule = RecurrenceRule::Interval { every_days: 7 };
        let json = serde_json::to_string(&rule).unwrap();
        assert_eq!(json, r#"{"kind":"interval","every_days":7}"#);
    }

    #[test]
    fn test_task_rule_rejects_garbage() {
        let now = dt(2025, 1, 6, 2, 0);
        let mut task = Task::recurring_interval("Báo cáo tuần", "", 1, 7, now);
        task.recurrence_rule = Some("{\"kind\":\"weekly\",\"weekdays\":".to_string());
        assert!(task.rule().is_err());

        task.recurrence_rule = None;
        assert!(task.rule().is_err());
    }

    #[test]
    fn test_recurring_constructors_prime_anchor() {
        let now = dt(2025, 1, 6, 2, 0);
        let task = Task::recurring_weekly(
            "Họp giao ban",
            "",
            1,
            vec![0],
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            1,
            now,
        );
        assert!(task.recurrence_enabled);
        assert_eq!(task.last_occurrence, Some(now));
        assert!(matches!(task.rule().unwrap(), RecurrenceRule::Weekly { .. }));
    }

    #[test]
    fn test_status_parse_fallback() {
        assert_eq!(TaskStatus::parse("done"), TaskStatus::Done);
        assert_eq!(TaskStatus::parse("in_progress"), TaskStatus::InProgress);
        assert_eq!(TaskStatus::parse("???"), TaskStatus::Pending);
    }

    #[test]
    fn test_salary_calculate() {
        let now = dt(2025, 2, 1, 0, 0);
        let mut salary = Salary::new("Nguyễn Văn A", "2025-01", 22.0, 20.0, 22_000_000.0, 2_200_000.0, 1, now);
        salary.capacity_bonuses = vec![
            SalaryItem { name: "Vượt chỉ tiêu".into(), amount: 1_500_000.0 },
            SalaryItem { name: "Chuyên cần".into(), amount: 500_000.0 },
        ];
        salary.deductions = vec![SalaryItem { name: "BHXH".into(), amount: 1_000_000.0 }];
        salary.calculate();

        assert_eq!(salary.basic_salary_per_day, 1_000_000.0);
        assert_eq!(salary.responsibility_salary_per_day, 100_000.0);
        assert_eq!(salary.main_salary, 22_000_000.0);
        assert_eq!(salary.total_capacity_bonus, 2_000_000.0);
        assert_eq!(salary.total_income, 24_000_000.0);
        assert_eq!(salary.total_deduction, 1_000_000.0);
        assert_eq!(salary.net_salary, 23_000_000.0);
    }

    #[test]
    fn test_salary_calculate_zero_work_days() {
        let now = dt(2025, 2, 1, 0, 0);
        let mut salary = Salary::new("B", "2025-01", 0.0, 0.0, 10_000_000.0, 0.0, 1, now);
        salary.calculate();
        assert_eq!(salary.basic_salary_per_day, 0.0);
        assert_eq!(salary.net_salary, 0.0);
    }

    #[test]
    fn test_share_link_validity() {
        let now = dt(2025, 3, 1, 12, 0);
        let mut link = SalaryShareLink::new(1, 1, dt(2025, 3, 8, 12, 0), Some(3), now);
        assert!(link.is_valid(now));
        // Valid exactly at expiry, invalid one minute after.
        assert!(link.is_valid(dt(2025, 3, 8, 12, 0)));
        assert!(!link.is_valid(dt(2025, 3, 8, 12, 1)));

        link.view_count = 3;
        assert!(!link.is_valid(now));

        link.view_count = 2;
        link.is_active = false;
        assert!(!link.is_valid(now));
    }

    #[test]
    fn test_share_link_zero_max_views_blocks() {
        let now = dt(2025, 3, 1, 12, 0);
        let link = SalaryShareLink::new(1, 1, dt(2025, 3, 8, 12, 0), Some(0), now);
        assert!(!link.is_valid(now));
    }

    #[test]
    fn test_share_link_unlimited_views() {
        let now = dt(2025, 3, 1, 12, 0);
        let mut link = SalaryShareLink::new(1, 1, dt(2025, 3, 8, 12, 0), None, now);
        link.view_count = 10_000;
        assert!(link.is_valid(now));
    }

    #[test]
    fn test_mint_token_shape() {
        let token = mint_token();
        // 32 bytes -> 43 base64 chars, no padding.
        assert_eq!(token.len(), 43);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(token, mint_token());
    }
}
