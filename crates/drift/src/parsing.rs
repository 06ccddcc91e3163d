//! Plan output classification.
//!
//! The planners are treated as black boxes: drift is decided by an exact
//! no-change phrase whitelist, and the displayable excerpt is cut out of the
//! raw text by marker phrases. Unrecognized output counts as drift; a false
//! positive is cheaper than a missed one.

use std::sync::LazyLock;

use regex::Regex;

/// Exact phrases that mean "no drift". Anything else is drift.
const NO_CHANGES_PATTERNS: [&str; 2] = [
    "Your infrastructure matches the configuration",
    "No changes. Infrastructure is up-to-date.",
];

static CHANGES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(Terraform|OpenTofu) will perform the following actions:")
        .unwrap()
});

static PLAN_FAILED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Planning failed. (Terraform|OpenTofu) encountered an error while generating this plan.")
        .unwrap()
});

static MISSING_OUT_ARG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"Note: You didn't use the -out option to save this plan, so.*can't\sguarantee to take exactly these actions if you run ".*apply" now."#,
    )
    .unwrap()
});

const REFRESH_KEYWORD: &str = "Refreshing state...";

fn trim_output(output: &str) -> &str {
    output.trim_matches([' ', '\n'])
}

/// True unless the output contains one of the exact no-change phrases.
pub fn is_drift_detected(command_output: &str) -> bool {
    !NO_CHANGES_PATTERNS
        .iter()
        .any(|pattern| command_output.contains(pattern))
}

/// Cut the displayable excerpt out of a drifted plan output.
///
/// Prefers the planning-failure section; otherwise starts at the pending
/// actions, dropping the trailing `-out` disclaimer. Output without either
/// marker is returned unmodified.
pub fn parse_plan(output: &str) -> String {
    if let Some(found) = PLAN_FAILED_RE.find(output) {
        return trim_output(&output[found.start()..]).to_string();
    }

    if let Some(found) = CHANGES_RE.find(output) {
        let partial = trim_output(&output[found.start()..]);
        if let Some(disclaimer) = MISSING_OUT_ARG_RE.find(partial) {
            return trim_output(&partial[..disclaimer.start()]).to_string();
        }
        return partial.to_string();
    }

    output.to_string()
}

/// Cut the displayable excerpt out of a failed command's output.
///
/// Drops everything up to and including the last per-resource
/// "Refreshing state..." line; those lines are noise in error reports.
pub fn parse_error_output(output: &str) -> String {
    if let Some(found) = PLAN_FAILED_RE.find(output) {
        return trim_output(&output[found.start()..]).to_string();
    }

    let lines: Vec<&str> = output.split('\n').collect();
    let last_refresh = lines
        .iter()
        .rposition(|line| line.contains(REFRESH_KEYWORD));

    match last_refresh {
        Some(idx) => lines[idx + 1..].join("\n"),
        None => output.to_string(),
    }
}
