//! Environment variable expansion for configuration strings.

use crate::ConfigError;

/// Expand `${VAR}`, `${VAR:-default}` and a leading `~` in `value`.
///
/// `field` names the config entry and is only used in error messages.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    shellexpand::full(value)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{}}} not set", e.var_name),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_unchanged() {
        assert_eq!(expand_env("/srv/site", "project.root").unwrap(), "/srv/site");
    }

    #[test]
    fn test_default_value_used_when_unset() {
        let expanded = expand_env("${LR_EXPAND_UNSET_VAR:-fallback}/app", "project.root").unwrap();
        assert_eq!(expanded, "fallback/app");
    }

    #[test]
    fn test_unset_var_names_field() {
        let err = expand_env("${LR_EXPAND_MISSING}", "project.root").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Environment variable error in project.root: ${LR_EXPAND_MISSING} not set"
        );
    }
}
