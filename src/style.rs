//! Style configuration (§6): a flat record of integers and enums that
//! parameterizes every pass in this crate. Grounded in
//! `verible::BasicFormatStyle` / `verilog::formatting::FormatStyle`.
//!
//! This struct derives `serde::{Serialize, Deserialize}` so a caller can
//! load it from whatever config format it likes; this crate parses neither
//! CLI flags nor config files itself (that's the CLI's job, out of scope
//! per §1).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// §6 style record. Field names match the spec's recognized keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatStyle {
    pub column_limit: i64,
    pub indentation_spaces: i64,
    pub wrap_spaces: i64,
    pub over_column_limit_penalty: i64,
    pub line_break_penalty: i64,
    pub format_module_port_declarations: bool,
    pub format_module_instantiations: bool,
    pub try_wrap_long_lines: bool,
}

impl Default for FormatStyle {
    fn default() -> Self {
        Self {
            column_limit: 100,
            indentation_spaces: 2,
            wrap_spaces: 4,
            over_column_limit_penalty: 100,
            line_break_penalty: 2,
            format_module_port_declarations: true,
            format_module_instantiations: true,
            try_wrap_long_lines: true,
        }
    }
}

impl FormatStyle {
    /// Style with `column_limit` reduced by `indent`, used by the layout
    /// solver which always solves a zero-indent subtree (§4.2
    /// "Indentation handling") and by the caller restoring indentation
    /// afterward.
    pub fn dedent(self, indent: i64) -> Self {
        Self {
            column_limit: self.column_limit - indent,
            ..self
        }
    }
}

/// §6 alignment policy enum, parsed case-sensitively from the listed
/// spellings. This is a core-library concern (the enum's wire format), not
/// CLI argument parsing, so it gets a plain `FromStr` impl rather than
/// deferring to a CLI-parsing crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlignmentPolicy {
    Align,
    FlushLeft,
    Preserve,
    #[serde(rename = "infer")]
    InferUserIntent,
}

impl fmt::Display for AlignmentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlignmentPolicy::Align => "align",
            AlignmentPolicy::FlushLeft => "flush-left",
            AlignmentPolicy::Preserve => "preserve",
            AlignmentPolicy::InferUserIntent => "infer",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid alignment policy `{0}`")]
pub struct ParseAlignmentPolicyError(String);

impl FromStr for AlignmentPolicy {
    type Err = ParseAlignmentPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "align" => Ok(AlignmentPolicy::Align),
            "flush-left" => Ok(AlignmentPolicy::FlushLeft),
            "preserve" => Ok(AlignmentPolicy::Preserve),
            "infer" => Ok(AlignmentPolicy::InferUserIntent),
            other => Err(ParseAlignmentPolicyError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_style_matches_spec() {
        let style = FormatStyle::default();
        assert_eq!(style.column_limit, 100);
        assert_eq!(style.indentation_spaces, 2);
        assert_eq!(style.wrap_spaces, 4);
        assert_eq!(style.over_column_limit_penalty, 100);
        assert_eq!(style.line_break_penalty, 2);
    }

    #[test]
    fn alignment_policy_round_trips_through_display() {
        for policy in [
            AlignmentPolicy::Align,
            AlignmentPolicy::FlushLeft,
            AlignmentPolicy::Preserve,
            AlignmentPolicy::InferUserIntent,
        ] {
            assert_eq!(policy.to_string().parse::<AlignmentPolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn alignment_policy_rejects_unknown_spelling() {
        assert!("Align".parse::<AlignmentPolicy>().is_err());
        assert!("".parse::<AlignmentPolicy>().is_err());
    }

    #[test]
    fn dedent_reduces_only_column_limit() {
        let style = FormatStyle::default().dedent(10);
        assert_eq!(style.column_limit, 90);
        assert_eq!(style.indentation_spaces, 2);
    }
}
