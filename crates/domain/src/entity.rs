//! Entity — the unit of user-defined automation.
//!
//! An entity pairs a script with an HTML/CSS template and a schedule. The
//! script runs every `interval_seconds`; its most recent result feeds the
//! template context.

mod patch;
mod status;

pub use patch::EntityPatch;
pub use status::EntityStatus;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{UnictlError, ValidationError};
use crate::execution::ExecutionError;
use crate::id::EntityId;
use crate::time::{Timestamp, now};

/// Interval used when a creation request does not supply one.
pub const DEFAULT_INTERVAL_SECONDS: i64 = 30;
/// Longest accepted interval.
pub const MAX_INTERVAL_SECONDS: i64 = 3600;
pub const DEFAULT_HTML_TEMPLATE: &str = "<div>Hello from Universal Controller!</div>";
pub const DEFAULT_CSS_STYLES: &str = "div { padding: 16px; background: #f0f0f0; }";

/// A scheduled script with its template and execution record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub script_code: String,
    pub html_template: String,
    pub css_styles: String,
    /// `0` or negative means "not scheduled".
    pub interval_seconds: i64,
    pub enabled: bool,
    pub status: EntityStatus,
    pub last_execution_at: Option<Timestamp>,
    pub last_execution_duration_ms: Option<u64>,
    pub last_error: Option<String>,
    pub last_result: serde_json::Map<String, serde_json::Value>,
    pub execution_count: u64,
    pub consecutive_failures: u32,
    /// Set when scheduling was disabled by the repeated-failure policy.
    pub disabled_after_failures: Option<u32>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Entity {
    /// Create a builder for constructing an [`Entity`].
    #[must_use]
    pub fn builder() -> EntityBuilder {
        EntityBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`UnictlError::Validation`] when:
    /// - `name` is blank ([`ValidationError::EmptyName`])
    /// - `interval_seconds` exceeds [`MAX_INTERVAL_SECONDS`] ([`ValidationError::IntervalTooLong`])
    pub fn validate(&self) -> Result<(), UnictlError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.interval_seconds > MAX_INTERVAL_SECONDS {
            return Err(ValidationError::IntervalTooLong {
                max: MAX_INTERVAL_SECONDS,
                actual: self.interval_seconds,
            }
            .into());
        }
        Ok(())
    }

    /// Timer period, or `None` when the entity must not have a timer.
    #[must_use]
    pub fn schedule_period(&self) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        u64::try_from(self.interval_seconds)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Mark the start of a run.
    pub fn begin_execution(&mut self, at: Timestamp) {
        self.status = EntityStatus::Running;
        self.last_execution_at = Some(at);
    }

    /// Record a successful run: the result replaces `last_result` and the
    /// failure streak resets.
    pub fn record_success(&mut self, result: serde_json::Value, duration_ms: u64) {
        self.status = EntityStatus::Completed;
        self.last_result = normalize_result(result);
        self.last_error = None;
        self.last_execution_duration_ms = Some(duration_ms);
        self.execution_count += 1;
        self.consecutive_failures = 0;
    }

    /// Record a failed run. The previous `last_result` is preserved.
    pub fn record_failure(&mut self, error: &ExecutionError, duration_ms: u64) {
        self.status = EntityStatus::Error;
        self.last_error = Some(error.to_string());
        self.last_execution_duration_ms = Some(duration_ms);
        self.execution_count += 1;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// Stop scheduling after the failure streak reached the threshold.
    pub fn disable_after_failures(&mut self) {
        self.enabled = false;
        self.disabled_after_failures = Some(self.consecutive_failures);
        self.updated_at = now();
    }

    /// Recover from a run that was interrupted (e.g. by a restart).
    ///
    /// Returns `true` if the status changed.
    pub fn reset_interrupted(&mut self) -> bool {
        if self.status.is_running() {
            self.status = EntityStatus::Idle;
            return true;
        }
        false
    }

    /// Summary mapping exposed to scripts and templates as `entity`.
    #[must_use]
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "name": self.name,
            "status": self.status,
            "enabled": self.enabled,
            "interval_seconds": self.interval_seconds,
            "last_execution_at": self.last_execution_at.map(crate::time::to_rfc3339),
            "last_execution_duration_ms": self.last_execution_duration_ms,
            "last_error": self.last_error,
            "execution_count": self.execution_count,
        })
    }
}

/// Scripts may return anything; the entity always stores a mapping.
fn normalize_result(result: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match result {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => serde_json::Map::new(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

/// Step-by-step builder for [`Entity`].
#[derive(Debug, Default)]
pub struct EntityBuilder {
    id: Option<EntityId>,
    name: Option<String>,
    script_code: Option<String>,
    html_template: Option<String>,
    css_styles: Option<String>,
    interval_seconds: Option<i64>,
    enabled: Option<bool>,
}

impl EntityBuilder {
    #[must_use]
    pub fn id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn script_code(mut self, code: impl Into<String>) -> Self {
        self.script_code = Some(code.into());
        self
    }

    #[must_use]
    pub fn html_template(mut self, template: impl Into<String>) -> Self {
        self.html_template = Some(template.into());
        self
    }

    #[must_use]
    pub fn css_styles(mut self, styles: impl Into<String>) -> Self {
        self.css_styles = Some(styles.into());
        self
    }

    #[must_use]
    pub fn interval_seconds(mut self, seconds: i64) -> Self {
        self.interval_seconds = Some(seconds);
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Consume the builder, validate, and return an [`Entity`].
    ///
    /// A random id is assigned when none was supplied.
    ///
    /// # Errors
    ///
    /// Returns [`UnictlError::Validation`] if an invariant fails.
    pub fn build(self) -> Result<Entity, UnictlError> {
        let ts = now();
        let entity = Entity {
            id: self.id.unwrap_or_else(EntityId::generate),
            name: self.name.unwrap_or_default(),
            script_code: self.script_code.unwrap_or_default(),
            html_template: self
                .html_template
                .unwrap_or_else(|| DEFAULT_HTML_TEMPLATE.to_string()),
            css_styles: self
                .css_styles
                .unwrap_or_else(|| DEFAULT_CSS_STYLES.to_string()),
            interval_seconds: self.interval_seconds.unwrap_or(DEFAULT_INTERVAL_SECONDS),
            enabled: self.enabled.unwrap_or(true),
            status: EntityStatus::Idle,
            last_execution_at: None,
            last_execution_duration_ms: None,
            last_error: None,
            last_result: serde_json::Map::new(),
            execution_count: 0,
            consecutive_failures: 0,
            disabled_after_failures: None,
            created_at: ts,
            updated_at: ts,
        };
        entity.validate()?;
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock() -> Entity {
        Entity::builder()
            .id(EntityId::parse("clock").unwrap())
            .name("Clock")
            .build()
            .unwrap()
    }

    #[test]
    fn should_apply_defaults_when_only_name_given() {
        let entity = Entity::builder().name("Clock").build().unwrap();
        assert_eq!(entity.interval_seconds, DEFAULT_INTERVAL_SECONDS);
        assert!(entity.enabled);
        assert_eq!(entity.status, EntityStatus::Idle);
        assert_eq!(entity.html_template, DEFAULT_HTML_TEMPLATE);
        assert_eq!(entity.css_styles, DEFAULT_CSS_STYLES);
        assert!(entity.last_result.is_empty());
        assert!(entity.last_execution_at.is_none());
    }

    #[test]
    fn should_return_validation_error_when_name_is_blank() {
        let result = Entity::builder().name("   ").build();
        assert!(matches!(
            result,
            Err(UnictlError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_return_validation_error_when_interval_too_long() {
        let result = Entity::builder().name("Slow").interval_seconds(7200).build();
        assert!(matches!(
            result,
            Err(UnictlError::Validation(ValidationError::IntervalTooLong { .. }))
        ));
    }

    #[test]
    fn should_have_schedule_period_when_enabled_with_positive_interval() {
        let entity = Entity::builder()
            .name("Fast")
            .interval_seconds(5)
            .build()
            .unwrap();
        assert_eq!(entity.schedule_period(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn should_have_no_schedule_period_when_interval_not_positive() {
        let zero = Entity::builder().name("Zero").interval_seconds(0).build().unwrap();
        let negative = Entity::builder().name("Neg").interval_seconds(-3).build().unwrap();
        assert_eq!(zero.schedule_period(), None);
        assert_eq!(negative.schedule_period(), None);
    }

    #[test]
    fn should_have_no_schedule_period_when_disabled() {
        let entity = Entity::builder().name("Off").enabled(false).build().unwrap();
        assert_eq!(entity.schedule_period(), None);
    }

    #[test]
    fn should_clear_error_and_streak_when_run_succeeds() {
        let mut entity = clock();
        entity.record_failure(
            &ExecutionError::Script {
                message: "boom".to_string(),
            },
            3,
        );
        entity.record_success(serde_json::json!({"time": "12:00"}), 4);

        assert_eq!(entity.status, EntityStatus::Completed);
        assert!(entity.last_error.is_none());
        assert_eq!(entity.consecutive_failures, 0);
        assert_eq!(entity.execution_count, 2);
        assert_eq!(entity.last_result["time"], "12:00");
        assert_eq!(entity.last_execution_duration_ms, Some(4));
    }

    #[test]
    fn should_preserve_last_result_when_run_fails() {
        let mut entity = clock();
        entity.record_success(serde_json::json!({"time": "12:00"}), 1);
        entity.record_failure(
            &ExecutionError::Script {
                message: "boom".to_string(),
            },
            2,
        );

        assert_eq!(entity.status, EntityStatus::Error);
        assert_eq!(entity.last_error.as_deref(), Some("boom"));
        assert_eq!(entity.last_result["time"], "12:00");
        assert_eq!(entity.consecutive_failures, 1);
    }

    #[test]
    fn should_wrap_scalar_result_in_value_key() {
        let mut entity = clock();
        entity.record_success(serde_json::json!(42), 1);
        assert_eq!(entity.last_result["value"], 42);
    }

    #[test]
    fn should_store_empty_result_when_script_returns_null() {
        let mut entity = clock();
        entity.record_success(serde_json::Value::Null, 1);
        assert!(entity.last_result.is_empty());
    }

    #[test]
    fn should_mark_running_and_stamp_start_when_execution_begins() {
        let mut entity = clock();
        let at = now();
        entity.begin_execution(at);
        assert_eq!(entity.status, EntityStatus::Running);
        assert_eq!(entity.last_execution_at, Some(at));
    }

    #[test]
    fn should_disable_and_remember_streak_length() {
        let mut entity = clock();
        for _ in 0..3 {
            entity.record_failure(&ExecutionError::Timeout { timeout_ms: 10 }, 10);
        }
        entity.disable_after_failures();
        assert!(!entity.enabled);
        assert_eq!(entity.disabled_after_failures, Some(3));
        assert_eq!(entity.schedule_period(), None);
    }

    #[test]
    fn should_reset_interrupted_run_to_idle() {
        let mut entity = clock();
        entity.begin_execution(now());
        assert!(entity.reset_interrupted());
        assert_eq!(entity.status, EntityStatus::Idle);
        assert!(!entity.reset_interrupted());
    }

    #[test]
    fn should_expose_summary_fields() {
        let summary = clock().summary();
        assert_eq!(summary["id"], "clock");
        assert_eq!(summary["name"], "Clock");
        assert_eq!(summary["status"], "idle");
        assert!(summary["last_execution_at"].is_null());
    }
}
