//! Checks on declared listeners that must pass before any reconciliation.

use super::types::{Listener, Rule, MAX_RULE_PRIORITY, MIN_RULE_PRIORITY};
use crate::modules::{ModuleError, ModuleResult};
use std::collections::HashSet;

/// Validate declared listeners and their rules
pub fn validate_listeners(listeners: &[Listener]) -> ModuleResult<()> {
    let mut ports = HashSet::new();
    for listener in listeners {
        if !ports.insert(listener.port) {
            return Err(ModuleError::Configuration(format!(
                "Listener port {} is declared more than once",
                listener.port
            )));
        }
        validate_listener(listener)?;
    }
    Ok(())
}

fn validate_listener(listener: &Listener) -> ModuleResult<()> {
    if listener.protocol.requires_certificate() && listener.certificates.is_empty() {
        return Err(ModuleError::Configuration(format!(
            "Listener on port {} uses {} and requires Certificates",
            listener.port, listener.protocol
        )));
    }

    if listener.default_actions.is_empty() {
        return Err(ModuleError::Configuration(format!(
            "Listener on port {} has no DefaultActions",
            listener.port
        )));
    }

    validate_rules(&listener.rules, &format!("listener port {}", listener.port))
}

/// Validate a declared rule set; `location` names its listener in error messages
pub fn validate_rules(rules: &[Rule], location: &str) -> ModuleResult<()> {
    let mut priorities = HashSet::new();
    for rule in rules {
        if rule.is_default_rule() {
            continue;
        }
        let Some(priority) = rule.priority.number() else {
            continue;
        };
        if !(MIN_RULE_PRIORITY..=MAX_RULE_PRIORITY).contains(&priority) {
            return Err(ModuleError::Configuration(format!(
                "Rule priority {} on {} is outside {}..={}",
                priority, location, MIN_RULE_PRIORITY, MAX_RULE_PRIORITY
            )));
        }
        if !priorities.insert(priority) {
            return Err(ModuleError::Configuration(format!(
                "Rule priority {} is declared more than once on {}",
                priority, location
            )));
        }
        if rule.actions.is_empty() {
            return Err(ModuleError::Configuration(format!(
                "Rule priority {} on {} has no Actions",
                priority, location
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::elbv2::types::{Action, Condition, ListenerProtocol};

    fn http_listener(port: u16) -> Listener {
        Listener::new(port, ListenerProtocol::Http, vec![Action::forward("arn:tg/web")])
    }

    fn rule(priority: u32) -> Rule {
        Rule::new(
            priority,
            vec![Condition::with_values("path-pattern", ["/x"])],
            vec![Action::forward("arn:tg/x")],
        )
    }

    #[test]
    fn test_valid_listeners() {
        let mut listener = http_listener(80);
        listener.rules = vec![rule(1), rule(2)];
        assert!(validate_listeners(&[listener, http_listener(8080)]).is_ok());
    }

    #[test]
    fn test_duplicate_priority_names_priority() {
        let mut listener = http_listener(80);
        listener.rules = vec![rule(7), rule(7)];
        let err = validate_listeners(&[listener]).unwrap_err();
        assert!(matches!(err, ModuleError::Configuration(_)));
        assert!(err.to_string().contains("priority 7"));
    }

    #[test]
    fn test_duplicate_port() {
        let err = validate_listeners(&[http_listener(80), http_listener(80)]).unwrap_err();
        assert!(err.to_string().contains("port 80"));
    }

    #[test]
    fn test_https_without_certificate() {
        let listener = Listener::new(443, ListenerProtocol::Https, vec![Action::forward("arn:tg/web")]);
        let err = validate_listeners(&[listener]).unwrap_err();
        assert!(err.to_string().contains("Certificates"));
    }

    #[test]
    fn test_priority_out_of_range() {
        let mut listener = http_listener(80);
        listener.rules = vec![rule(50_001)];
        assert!(validate_listeners(&[listener]).is_err());
    }

    #[test]
    fn test_rule_without_actions() {
        let mut listener = http_listener(80);
        let mut empty = rule(3);
        empty.actions.clear();
        listener.rules = vec![empty];
        assert!(validate_listeners(&[listener]).is_err());
    }

    #[test]
    fn test_validate_rules_names_location() {
        let err = validate_rules(&[rule(4), rule(4)], "rules.yml").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Rule priority 4 is declared more than once on rules.yml"
        );
    }
}
