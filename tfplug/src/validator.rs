//! Built-in attribute validators
//!
//! Validators run during ValidateResourceConfig / ValidateDataResourceConfig.
//! Null and unknown values are skipped; required-ness is checked separately.

use crate::schema::{Validator, ValidatorRequest, ValidatorResponse};
use crate::types::{Diagnostic, Dynamic};
use regex::Regex;

fn ok() -> ValidatorResponse {
    ValidatorResponse {
        diagnostics: vec![],
    }
}

fn fail(request: &ValidatorRequest, summary: String, detail: String) -> ValidatorResponse {
    ValidatorResponse {
        diagnostics: vec![Diagnostic::error(summary, detail).with_attribute(request.path.clone())],
    }
}

/// Value must be one of a fixed set of strings
pub struct StringInSlice {
    allowed: Vec<String>,
    ignore_case: bool,
}

impl StringInSlice {
    pub fn new(allowed: &[&str]) -> Self {
        Self {
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
            ignore_case: false,
        }
    }

    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }
}

impl Validator for StringInSlice {
    fn description(&self) -> String {
        format!("value must be one of: {}", self.allowed.join(", "))
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Dynamic::String(value) = &request.config_value.value else {
            return ok();
        };

        let found = self.allowed.iter().any(|a| {
            if self.ignore_case {
                a.eq_ignore_ascii_case(value)
            } else {
                a == value
            }
        });

        if found {
            ok()
        } else {
            fail(
                &request,
                format!("Invalid value for {}", request.path),
                format!(
                    "expected {} to be one of [{}], got {}",
                    request.path,
                    self.allowed.join(", "),
                    value
                ),
            )
        }
    }
}

/// String length (in characters) must be within [min, max]
pub struct StringLenBetween {
    min: usize,
    max: usize,
}

impl StringLenBetween {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }
}

impl Validator for StringLenBetween {
    fn description(&self) -> String {
        format!("length must be between {} and {}", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Dynamic::String(value) = &request.config_value.value else {
            return ok();
        };

        let len = value.chars().count();
        if len < self.min || len > self.max {
            fail(
                &request,
                format!("Invalid length for {}", request.path),
                format!(
                    "expected length of {} to be in the range ({} - {}), got {}",
                    request.path, self.min, self.max, len
                ),
            )
        } else {
            ok()
        }
    }
}

/// Number must be a whole number within [min, max]
pub struct IntBetween {
    min: i64,
    max: i64,
}

impl IntBetween {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }
}

impl Validator for IntBetween {
    fn description(&self) -> String {
        format!("value must be between {} and {}", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Dynamic::Number(value) = request.config_value.value else {
            return ok();
        };

        if value.fract() != 0.0 {
            return fail(
                &request,
                format!("Invalid value for {}", request.path),
                format!("expected {} to be a whole number, got {}", request.path, value),
            );
        }

        if value < self.min as f64 || value > self.max as f64 {
            fail(
                &request,
                format!("Invalid value for {}", request.path),
                format!(
                    "expected {} to be in the range ({} - {}), got {}",
                    request.path, self.min, self.max, value
                ),
            )
        } else {
            ok()
        }
    }
}

/// Number must be one of a fixed set of integers
pub struct IntInSlice {
    allowed: Vec<i64>,
}

impl IntInSlice {
    pub fn new(allowed: &[i64]) -> Self {
        Self {
            allowed: allowed.to_vec(),
        }
    }
}

impl Validator for IntInSlice {
    fn description(&self) -> String {
        format!("value must be one of: {:?}", self.allowed)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Dynamic::Number(value) = request.config_value.value else {
            return ok();
        };

        if value.fract() == 0.0 && self.allowed.contains(&(value as i64)) {
            ok()
        } else {
            fail(
                &request,
                format!("Invalid value for {}", request.path),
                format!(
                    "expected {} to be one of {:?}, got {}",
                    request.path, self.allowed, value
                ),
            )
        }
    }
}

/// String must match a regular expression
pub struct StringMatch {
    pattern: Regex,
    message: String,
}

impl StringMatch {
    pub fn new(pattern: Regex, message: &str) -> Self {
        Self {
            pattern,
            message: message.to_string(),
        }
    }
}

impl Validator for StringMatch {
    fn description(&self) -> String {
        format!("value must match {}", self.pattern)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Dynamic::String(value) = &request.config_value.value else {
            return ok();
        };

        if self.pattern.is_match(value) {
            ok()
        } else {
            fail(
                &request,
                format!("Invalid value for {}", request.path),
                format!("{}: got {}", self.message, value),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributePath, DynamicValue};

    fn request(value: Dynamic) -> ValidatorRequest {
        ValidatorRequest {
            config_value: DynamicValue::new(value),
            path: AttributePath::new("field"),
        }
    }

    #[test]
    fn string_in_slice_accepts_and_rejects() {
        let validator = StringInSlice::new(&["NFS", "SMB"]);
        assert!(validator
            .validate(request(Dynamic::String("NFS".into())))
            .diagnostics
            .is_empty());

        let response = validator.validate(request(Dynamic::String("nfs".into())));
        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].detail.contains("one of [NFS, SMB]"));
        assert_eq!(
            response.diagnostics[0].attribute,
            Some(AttributePath::new("field"))
        );

        let relaxed = StringInSlice::new(&["NFS"]).ignore_case();
        assert!(relaxed
            .validate(request(Dynamic::String("nfs".into())))
            .diagnostics
            .is_empty());
    }

    #[test]
    fn validators_skip_null_and_unknown() {
        let validator = StringLenBetween::new(2, 128);
        assert!(validator.validate(request(Dynamic::Null)).diagnostics.is_empty());
        assert!(validator
            .validate(request(Dynamic::Unknown))
            .diagnostics
            .is_empty());
    }

    #[test]
    fn string_len_between_counts_characters() {
        let validator = StringLenBetween::new(2, 4);
        assert!(validator
            .validate(request(Dynamic::String("文件".into())))
            .diagnostics
            .is_empty());
        assert_eq!(
            validator
                .validate(request(Dynamic::String("x".into())))
                .diagnostics
                .len(),
            1
        );
    }

    #[test]
    fn int_between_checks_range_and_whole_numbers() {
        let validator = IntBetween::new(0, 86400);
        assert!(validator
            .validate(request(Dynamic::Number(300.0)))
            .diagnostics
            .is_empty());
        assert_eq!(
            validator
                .validate(request(Dynamic::Number(86401.0)))
                .diagnostics
                .len(),
            1
        );
        assert_eq!(
            validator
                .validate(request(Dynamic::Number(1.5)))
                .diagnostics
                .len(),
            1
        );
    }

    #[test]
    fn int_in_slice() {
        let validator = IntInSlice::new(&[0, 1, 2]);
        assert!(validator
            .validate(request(Dynamic::Number(2.0)))
            .diagnostics
            .is_empty());
        assert_eq!(
            validator
                .validate(request(Dynamic::Number(3.0)))
                .diagnostics
                .len(),
            1
        );
    }

    #[test]
    fn string_match() {
        let validator = StringMatch::new(
            Regex::new(r"^\d+$").unwrap(),
            "must contain only digits",
        );
        assert!(validator
            .validate(request(Dynamic::String("42".into())))
            .diagnostics
            .is_empty());
        let response = validator.validate(request(Dynamic::String("4a".into())));
        assert!(response.diagnostics[0].detail.starts_with("must contain only digits"));
    }
}
