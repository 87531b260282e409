//! Environment gate deciding whether a bridge should be installed at all.
//!
//! The default policy reads `APP_ENV` once per process and refuses to
//! activate when it names a production environment.

use std::env;
use std::sync::OnceLock;

/// Environment variable consulted by the default policy.
pub const DEFAULT_ENV_VAR: &str = "APP_ENV";

/// Whether an environment value names a production deployment.
///
/// Matching is case-insensitive and ignores surrounding whitespace; an unset
/// variable is not production.
pub fn is_production_value(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        let v = v.trim();
        v.eq_ignore_ascii_case("production") || v.eq_ignore_ascii_case("prod")
    })
}

/// When a bridge may be installed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActivationPolicy {
    Always,
    Never,
    /// Activate unless the named variable marks a production environment.
    NonProduction { var: String },
}

impl Default for ActivationPolicy {
    fn default() -> Self {
        ActivationPolicy::NonProduction {
            var: DEFAULT_ENV_VAR.to_owned(),
        }
    }
}

impl ActivationPolicy {
    /// Evaluate the policy. The default variable is read only once per
    /// process; other variables are read on every call.
    pub fn should_activate(&self) -> bool {
        match self {
            ActivationPolicy::Always => true,
            ActivationPolicy::Never => false,
            ActivationPolicy::NonProduction { var } if var == DEFAULT_ENV_VAR => default_gate(),
            ActivationPolicy::NonProduction { var } => !production_env(var),
        }
    }
}

fn production_env(var: &str) -> bool {
    is_production_value(env::var(var).ok().as_deref())
}

static DEFAULT_GATE: OnceLock<bool> = OnceLock::new();

/// Result of the default policy, computed on first use.
pub fn default_gate() -> bool {
    *DEFAULT_GATE.get_or_init(|| !production_env(DEFAULT_ENV_VAR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serial_test::serial;

    #[rstest]
    #[case(None, false)]
    #[case(Some("development"), false)]
    #[case(Some("test"), false)]
    #[case(Some(""), false)]
    #[case(Some("production"), true)]
    #[case(Some(" Production "), true)]
    #[case(Some("PROD"), true)]
    fn recognises_production(#[case] value: Option<&str>, #[case] expected: bool) {
        assert_eq!(is_production_value(value), expected);
    }

    #[test]
    fn fixed_policies() {
        assert!(ActivationPolicy::Always.should_activate());
        assert!(!ActivationPolicy::Never.should_activate());
    }

    #[test]
    #[serial]
    fn custom_variable_is_read_each_time() {
        let var = "CONSOLE_BRIDGE_TEST_ENV";
        let policy = ActivationPolicy::NonProduction { var: var.into() };
        // SAFETY: serialised with other environment-mutating tests.
        unsafe { env::set_var(var, "production") };
        assert!(!policy.should_activate());
        unsafe { env::set_var(var, "staging") };
        assert!(policy.should_activate());
        unsafe { env::remove_var(var) };
        assert!(policy.should_activate());
    }
}
