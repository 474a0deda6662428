use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use super::RenderEnv;
use super::value::{as_number, format_value};
use crate::time::to_rfc3339;

const LOCALE_FORMAT: &str = "%A, %B %-d, %Y %-I:%M:%S %p";
const SHORT_FORMAT: &str = "%Y-%m-%d";
const MAX_DIGITS: usize = 15;

#[derive(Debug, thiserror::Error)]
pub(crate) enum FunctionError {
    #[error("expected {min} to {max} arguments, got {actual}")]
    Arity {
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("{0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Now,
    FormatDate,
    Upper,
    Lower,
    Length,
    Round,
    Default,
    State,
    Attr,
    Json,
}

impl Builtin {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        let builtin = match name {
            "now" => Self::Now,
            "format_date" => Self::FormatDate,
            "upper" => Self::Upper,
            "lower" => Self::Lower,
            "length" => Self::Length,
            "round" => Self::Round,
            "default" => Self::Default,
            "state" => Self::State,
            "attr" => Self::Attr,
            "json" => Self::Json,
            _ => return None,
        };
        Some(builtin)
    }

    fn arity(self) -> (usize, usize) {
        match self {
            Self::Now => (0, 0),
            Self::Upper | Self::Lower | Self::Length | Self::State | Self::Json => (1, 1),
            Self::FormatDate | Self::Round => (1, 2),
            Self::Default | Self::Attr => (2, 2),
        }
    }

    pub(crate) fn call(self, args: &[Value], env: &RenderEnv<'_>) -> Result<Value, FunctionError> {
        let (min, max) = self.arity();
        if args.len() < min || args.len() > max {
            return Err(FunctionError::Arity {
                min,
                max,
                actual: args.len(),
            });
        }
        match self {
            Self::Now => Ok(Value::String(to_rfc3339(env.now))),
            Self::FormatDate => format_date(&args[0], args.get(1)),
            Self::Upper => Ok(Value::String(format_value(&args[0]).to_uppercase())),
            Self::Lower => Ok(Value::String(format_value(&args[0]).to_lowercase())),
            Self::Length => length(&args[0]),
            Self::Round => round(&args[0], args.get(1)),
            Self::Default => Ok(if args[0].is_null() {
                args[1].clone()
            } else {
                args[0].clone()
            }),
            Self::State => Ok(env
                .states
                .lookup(&format_value(&args[0]))
                .map_or(Value::Null, |s| Value::String(s.state.clone()))),
            Self::Attr => Ok(env
                .states
                .lookup(&format_value(&args[0]))
                .and_then(|s| s.attribute(&format_value(&args[1])))
                .cloned()
                .unwrap_or(Value::Null)),
            Self::Json => Ok(Value::String(args[0].to_string())),
        }
    }
}

fn length(value: &Value) -> Result<Value, FunctionError> {
    let len = match value {
        Value::Null => 0,
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::String(text) => text.chars().count(),
        Value::Bool(_) | Value::Number(_) => {
            return Err(FunctionError::InvalidArgument(format!(
                "cannot take the length of {value}"
            )));
        }
    };
    Ok(Value::from(len))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round(value: &Value, digits: Option<&Value>) -> Result<Value, FunctionError> {
    let number = as_number(value)
        .ok_or_else(|| FunctionError::InvalidArgument(format!("{value} is not a number")))?;
    let digits = match digits {
        None => 0,
        Some(digits) => as_number(digits)
            .filter(|d| *d >= 0.0 && d.fract().abs() < f64::EPSILON)
            .map(|d| d.min(MAX_DIGITS as f64) as usize)
            .ok_or_else(|| {
                FunctionError::InvalidArgument(format!("{digits} is not a digit count"))
            })?,
    };
    Ok(Value::String(format!("{number:.digits$}")))
}

fn format_date(value: &Value, mode: Option<&Value>) -> Result<Value, FunctionError> {
    if value.is_null() || value.as_str().is_some_and(|s| s.trim().is_empty()) {
        return Ok(Value::Null);
    }
    let at = parse_datetime(value).ok_or_else(|| {
        FunctionError::InvalidArgument(format!("cannot interpret {value} as a date"))
    })?;
    let pattern = match mode.map(format_value).as_deref() {
        Some("locale") => LOCALE_FORMAT,
        _ => SHORT_FORMAT,
    };
    Ok(Value::String(at.format(pattern).to_string()))
}

#[allow(clippy::cast_possible_truncation)]
fn parse_datetime(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.naive_local())
                .ok()
                .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").ok())
                .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f").ok())
                .or_else(|| {
                    NaiveDate::parse_from_str(text, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
        }
        Value::Number(n) => {
            let seconds = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            DateTime::from_timestamp(seconds, 0).map(|dt| dt.naive_utc())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateSnapshot;
    use crate::time::now;
    use serde_json::json;

    fn call(name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let states = StateSnapshot::default();
        let env = RenderEnv::new(now(), &states);
        Builtin::from_name(name).unwrap().call(args, &env)
    }

    #[test]
    fn should_render_locale_date() {
        let value = call("format_date", &[json!("2026-10-16T14:05:09Z"), json!("locale")]).unwrap();
        assert_eq!(value, json!("Friday, October 16, 2026 2:05:09 PM"));
    }

    #[test]
    fn should_render_short_date_by_default() {
        assert_eq!(
            call("format_date", &[json!("2026-10-16T14:05:09+02:00")]).unwrap(),
            json!("2026-10-16")
        );
        assert_eq!(
            call("format_date", &[json!("2026-10-16 08:00:00"), json!("short")]).unwrap(),
            json!("2026-10-16")
        );
        assert_eq!(call("format_date", &[json!(0)]).unwrap(), json!("1970-01-01"));
    }

    #[test]
    fn should_render_empty_for_missing_date() {
        assert_eq!(call("format_date", &[Value::Null]).unwrap(), Value::Null);
    }

    #[test]
    fn should_fail_when_date_is_unreadable() {
        assert!(matches!(
            call("format_date", &[json!("yesterday")]),
            Err(FunctionError::InvalidArgument(_))
        ));
    }

    #[test]
    fn should_fail_when_arity_is_wrong() {
        assert!(matches!(
            call("upper", &[]),
            Err(FunctionError::Arity { min: 1, max: 1, actual: 0 })
        ));
    }

    #[test]
    fn should_round_numeric_text() {
        assert_eq!(call("round", &[json!("2.345"), json!(1)]).unwrap(), json!("2.3"));
        assert!(call("round", &[json!(1), json!(-1)]).is_err());
    }

    #[test]
    fn should_count_characters_of_text() {
        assert_eq!(call("length", &[json!("héllo")]).unwrap(), json!(5));
        assert!(call("length", &[json!(3)]).is_err());
    }

    #[test]
    fn should_serialize_value_as_json_text() {
        assert_eq!(call("json", &[json!({"a": [1]})]).unwrap(), json!(r#"{"a":[1]}"#));
    }

    #[test]
    fn should_not_know_unregistered_names() {
        assert!(Builtin::from_name("eval").is_none());
    }
}
