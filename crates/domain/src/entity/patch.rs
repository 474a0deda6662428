//! Partial updates coming from the administrative surface.

use serde::Deserialize;

use super::Entity;
use crate::error::UnictlError;
use crate::time::Timestamp;

/// A partial update of an [`Entity`].
///
/// Covers every user-settable field. The id and the execution fields
/// (status, timings, results) are not reachable from here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EntityPatch {
    pub name: Option<String>,
    pub script_code: Option<String>,
    pub html_template: Option<String>,
    pub css_styles: Option<String>,
    pub interval_seconds: Option<i64>,
    pub enabled: Option<bool>,
}

impl EntityPatch {
    /// Whether applying this patch can change the entity's timer.
    #[must_use]
    pub fn touches_schedule(&self) -> bool {
        self.interval_seconds.is_some() || self.enabled.is_some()
    }

    /// Apply the patch, leaving `entity` untouched when validation fails.
    ///
    /// Re-enabling an entity clears its failure streak and the
    /// disabled-after-failures marker.
    ///
    /// # Errors
    ///
    /// Returns [`UnictlError::Validation`] if the patched entity violates an invariant.
    pub fn apply(self, entity: &mut Entity, at: Timestamp) -> Result<(), UnictlError> {
        let mut next = entity.clone();
        if let Some(name) = self.name {
            next.name = name;
        }
        if let Some(script_code) = self.script_code {
            next.script_code = script_code;
        }
        if let Some(html_template) = self.html_template {
            next.html_template = html_template;
        }
        if let Some(css_styles) = self.css_styles {
            next.css_styles = css_styles;
        }
        if let Some(interval_seconds) = self.interval_seconds {
            next.interval_seconds = interval_seconds;
        }
        if let Some(enabled) = self.enabled {
            if enabled && !entity.enabled {
                next.consecutive_failures = 0;
                next.disabled_after_failures = None;
            }
            next.enabled = enabled;
        }
        next.validate()?;
        next.updated_at = at;
        *entity = next;
        Ok(())
    }
}
