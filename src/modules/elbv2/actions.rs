//! Action chain normalization.
//!
//! AWS rewrites actions on the way in: it fills defaults the caller left out,
//! echoes a single-target `forward` as a `ForwardConfig`, and never returns an
//! OIDC client secret (it reports `UseExistingClientSecret` instead). Actions
//! are brought into a comparable form on both sides before equality is
//! decided, and into a write form before they are sent back.

use super::types::{Action, ActionType};

pub const DEFAULT_OIDC_SCOPE: &str = "openid";
pub const DEFAULT_SESSION_TIMEOUT: i64 = 604_800;
pub const DEFAULT_SESSION_COOKIE_NAME: &str = "AWSELBAuthSessionCookie";
pub const DEFAULT_ON_UNAUTHENTICATED_REQUEST: &str = "authenticate";

const REDIRECT_DEFAULT_PROTOCOL: &str = "#{protocol}";
const REDIRECT_DEFAULT_PORT: &str = "#{port}";
const REDIRECT_DEFAULT_HOST: &str = "#{host}";
const REDIRECT_DEFAULT_PATH: &str = "/#{path}";
const REDIRECT_DEFAULT_QUERY: &str = "#{query}";

/// Chain in evaluation order; actions without `Order` take their 1-based position
pub fn ordered(actions: &[Action]) -> Vec<Action> {
    let mut chain: Vec<Action> = actions
        .iter()
        .enumerate()
        .map(|(index, action)| {
            let mut action = action.clone();
            if action.order.is_none() {
                action.order = Some(u32::try_from(index + 1).unwrap_or(u32::MAX));
            }
            action
        })
        .collect();
    chain.sort_by_key(|action| action.order);
    chain
}

/// Collapse a single-target `ForwardConfig` into the `TargetGroupArn` form
fn prune_forward_config(action: &mut Action) {
    if action.action_type != ActionType::Forward {
        return;
    }
    let Some(forward) = &action.forward_config else {
        return;
    };
    if forward.target_groups.len() != 1 {
        return;
    }
    if forward
        .target_group_stickiness_config
        .as_ref()
        .is_some_and(|stickiness| stickiness.enabled)
    {
        return;
    }

    let target_group_arn = forward.target_groups[0].target_group_arn.clone();
    if action
        .target_group_arn
        .as_ref()
        .is_some_and(|arn| *arn != target_group_arn)
    {
        return;
    }

    action.target_group_arn = Some(target_group_arn);
    action.forward_config = None;
}

/// Fill in values AWS assigns when the caller omits them
fn fill_aws_defaults(action: &mut Action) {
    if let Some(oidc) = &mut action.authenticate_oidc_config {
        oidc.scope.get_or_insert_with(|| DEFAULT_OIDC_SCOPE.to_string());
        oidc.session_timeout.get_or_insert(DEFAULT_SESSION_TIMEOUT);
        oidc.session_cookie_name
            .get_or_insert_with(|| DEFAULT_SESSION_COOKIE_NAME.to_string());
        oidc.on_unauthenticated_request
            .get_or_insert_with(|| DEFAULT_ON_UNAUTHENTICATED_REQUEST.to_string());
        if oidc
            .authentication_request_extra_params
            .as_ref()
            .is_some_and(|params| params.is_empty())
        {
            oidc.authentication_request_extra_params = None;
        }
    }

    if let Some(cognito) = &mut action.authenticate_cognito_config {
        cognito.scope.get_or_insert_with(|| DEFAULT_OIDC_SCOPE.to_string());
        cognito.session_timeout.get_or_insert(DEFAULT_SESSION_TIMEOUT);
        cognito
            .session_cookie_name
            .get_or_insert_with(|| DEFAULT_SESSION_COOKIE_NAME.to_string());
        cognito
            .on_unauthenticated_request
            .get_or_insert_with(|| DEFAULT_ON_UNAUTHENTICATED_REQUEST.to_string());
        if cognito
            .authentication_request_extra_params
            .as_ref()
            .is_some_and(|params| params.is_empty())
        {
            cognito.authentication_request_extra_params = None;
        }
    }

    if let Some(redirect) = &mut action.redirect_config {
        redirect
            .protocol
            .get_or_insert_with(|| REDIRECT_DEFAULT_PROTOCOL.to_string());
        redirect
            .port
            .get_or_insert_with(|| REDIRECT_DEFAULT_PORT.to_string());
        redirect
            .host
            .get_or_insert_with(|| REDIRECT_DEFAULT_HOST.to_string());
        redirect
            .path
            .get_or_insert_with(|| REDIRECT_DEFAULT_PATH.to_string());
        redirect
            .query
            .get_or_insert_with(|| REDIRECT_DEFAULT_QUERY.to_string());
    }
}

/// Comparable form of a live action chain.
///
/// A live OIDC action that does not report `UseExistingClientSecret` holds a
/// secret, so the flag reads as `true`.
pub fn comparable_current(actions: &[Action]) -> Vec<Action> {
    ordered(actions)
        .into_iter()
        .map(|mut action| {
            prune_forward_config(&mut action);
            fill_aws_defaults(&mut action);
            if let Some(oidc) = &mut action.authenticate_oidc_config {
                oidc.client_secret = None;
                oidc.use_existing_client_secret.get_or_insert(true);
            }
            action
        })
        .collect()
}

/// Comparable form of a declared action chain against `current`, which must
/// already be in comparable form.
///
/// The secret itself is dropped. The caller's explicit
/// `UseExistingClientSecret` is kept; otherwise the flag is `true` when either
/// the declared action carries a secret or the live action at the same chain
/// position reports one, and `false` when neither does.
pub fn comparable_declared(actions: &[Action], current: &[Action]) -> Vec<Action> {
    ordered(actions)
        .into_iter()
        .enumerate()
        .map(|(index, mut action)| {
            prune_forward_config(&mut action);
            fill_aws_defaults(&mut action);
            if let Some(oidc) = &mut action.authenticate_oidc_config {
                let live_has_secret = current
                    .get(index)
                    .and_then(|live| live.authenticate_oidc_config.as_ref())
                    .and_then(|live| live.use_existing_client_secret)
                    .unwrap_or(false);
                let use_existing = oidc
                    .use_existing_client_secret
                    .unwrap_or(oidc.has_client_secret() || live_has_secret);
                oidc.client_secret = None;
                oidc.use_existing_client_secret = Some(use_existing);
            }
            action
        })
        .collect()
}

/// Positional equality of two action chains after normalization
pub fn actions_equal(current: &[Action], declared: &[Action]) -> bool {
    if current.len() != declared.len() {
        return false;
    }
    let current = comparable_current(current);
    let declared = comparable_declared(declared, &current);
    current == declared
}

/// Write form for `ModifyRule`/`ModifyListener`.
///
/// AWS rejects a client secret together with `UseExistingClientSecret:
/// true`, so the flag is only set when no secret is sent.
pub fn for_modify(actions: &[Action]) -> Vec<Action> {
    ordered(actions)
        .into_iter()
        .map(|mut action| {
            if let Some(oidc) = &mut action.authenticate_oidc_config {
                let has_secret = oidc.has_client_secret();
                if !has_secret {
                    oidc.client_secret = None;
                }
                oidc.use_existing_client_secret = Some(!has_secret);
            }
            action
        })
        .collect()
}

/// Write form for `CreateRule`/`CreateListener`: there is no existing secret
/// to reuse on a new action.
pub fn for_create(actions: &[Action]) -> Vec<Action> {
    ordered(actions)
        .into_iter()
        .map(|mut action| {
            if let Some(oidc) = &mut action.authenticate_oidc_config {
                oidc.use_existing_client_secret = Some(false);
            }
            action
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::elbv2::types::{
        AuthenticateOidcConfig, FixedResponseConfig, ForwardConfig, RedirectConfig,
        TargetGroupStickinessConfig, TargetGroupTuple,
    };

    fn oidc_config() -> AuthenticateOidcConfig {
        AuthenticateOidcConfig {
            issuer: "https://idp.example.com".to_string(),
            authorization_endpoint: "https://idp.example.com/auth".to_string(),
            token_endpoint: "https://idp.example.com/token".to_string(),
            user_info_endpoint: "https://idp.example.com/userinfo".to_string(),
            client_id: "abcdef1234567890".to_string(),
            on_unauthenticated_request: Some("authenticate".to_string()),
            scope: Some("openid".to_string()),
            session_cookie_name: Some("AWSELBAuthSessionCookie".to_string()),
            session_timeout: Some(604_800),
            ..AuthenticateOidcConfig::default()
        }
    }

    fn echoed_forward(arn: &str) -> Action {
        Action {
            forward_config: Some(ForwardConfig {
                target_groups: vec![TargetGroupTuple {
                    target_group_arn: arn.to_string(),
                    weight: Some(1),
                }],
                target_group_stickiness_config: Some(TargetGroupStickinessConfig {
                    enabled: false,
                    duration_seconds: None,
                }),
            }),
            ..Action::forward(arn)
        }
        .with_order(1)
    }

    #[test]
    fn test_ordered_assigns_missing_positions() {
        let chain = ordered(&[
            Action::forward("arn:tg/b").with_order(2),
            Action::authenticate_oidc(oidc_config()).with_order(1),
        ]);
        assert_eq!(chain[0].action_type, ActionType::AuthenticateOidc);

        let chain = ordered(&[Action::forward("arn:tg/a")]);
        assert_eq!(chain[0].order, Some(1));
    }

    #[test]
    fn test_forward_config_echo_is_equal() {
        assert!(actions_equal(
            &[echoed_forward("arn:tg/web")],
            &[Action::forward("arn:tg/web")]
        ));
        assert!(!actions_equal(
            &[echoed_forward("arn:tg/web")],
            &[Action::forward("arn:tg/api")]
        ));
    }

    #[test]
    fn test_weighted_forward_not_pruned() {
        let mut weighted = echoed_forward("arn:tg/web");
        if let Some(forward) = weighted.forward_config.as_mut() {
            forward.target_groups.push(TargetGroupTuple {
                target_group_arn: "arn:tg/canary".to_string(),
                weight: Some(10),
            });
        }
        assert!(!actions_equal(&[weighted], &[Action::forward("arn:tg/web")]));
    }

    #[test]
    fn test_live_oidc_without_flag_matches_declared_secret() {
        let live = vec![
            Action::authenticate_oidc(oidc_config()).with_order(1),
            Action::forward("arn:tg/web").with_order(2),
        ];
        let declared = vec![
            Action::authenticate_oidc(AuthenticateOidcConfig {
                client_secret: Some("s3cr3t".to_string()),
                ..oidc_config()
            })
            .with_order(1),
            Action::forward("arn:tg/web").with_order(2),
        ];
        assert!(actions_equal(&live, &declared));
    }

    #[test]
    fn test_declared_without_secret_reuses_live_secret() {
        let live = vec![Action::authenticate_oidc(oidc_config()).with_order(1)];
        let declared = vec![Action::authenticate_oidc(AuthenticateOidcConfig {
            scope: None,
            session_timeout: None,
            ..oidc_config()
        })];
        assert!(actions_equal(&live, &declared));
    }

    #[test]
    fn test_unauthenticated_request_change_detected() {
        let live = vec![Action::authenticate_oidc(oidc_config()).with_order(1)];
        let declared = vec![Action::authenticate_oidc(AuthenticateOidcConfig {
            on_unauthenticated_request: Some("deny".to_string()),
            client_secret: Some("s3cr3t".to_string()),
            ..oidc_config()
        })
        .with_order(1)];
        assert!(!actions_equal(&live, &declared));
    }

    #[test]
    fn test_explicit_rotation_is_a_change() {
        let live = vec![Action::authenticate_oidc(oidc_config()).with_order(1)];
        let declared = vec![Action::authenticate_oidc(AuthenticateOidcConfig {
            client_secret: Some("rotated".to_string()),
            use_existing_client_secret: Some(false),
            ..oidc_config()
        })
        .with_order(1)];
        assert!(!actions_equal(&live, &declared));
    }

    #[test]
    fn test_action_order_is_significant() {
        let live = vec![
            Action::authenticate_oidc(oidc_config()).with_order(1),
            Action::forward("arn:tg/web").with_order(2),
        ];
        let declared = vec![
            Action::forward("arn:tg/web").with_order(1),
            Action::authenticate_oidc(oidc_config()).with_order(2),
        ];
        assert!(!actions_equal(&live, &declared));
    }

    #[test]
    fn test_redirect_defaults_filled() {
        let live = vec![Action::redirect(RedirectConfig {
            protocol: Some("HTTPS".to_string()),
            port: Some("443".to_string()),
            host: Some("#{host}".to_string()),
            path: Some("/#{path}".to_string()),
            query: Some("#{query}".to_string()),
            status_code: "HTTP_301".to_string(),
        })
        .with_order(1)];
        let declared = vec![Action::redirect(RedirectConfig {
            protocol: Some("HTTPS".to_string()),
            port: Some("443".to_string()),
            status_code: "HTTP_301".to_string(),
            ..RedirectConfig::default()
        })];
        assert!(actions_equal(&live, &declared));
    }

    #[test]
    fn test_length_mismatch_is_a_change() {
        let live = vec![Action::fixed_response(FixedResponseConfig {
            status_code: "404".to_string(),
            ..FixedResponseConfig::default()
        })];
        assert!(!actions_equal(&live, &[]));
    }

    #[test]
    fn test_write_forms_set_secret_flag() {
        let with_secret = vec![Action::authenticate_oidc(AuthenticateOidcConfig {
            client_secret: Some("s3cr3t".to_string()),
            ..oidc_config()
        })];
        let without_secret = vec![Action::authenticate_oidc(oidc_config())];

        let modify = for_modify(&with_secret);
        let oidc = modify[0].authenticate_oidc_config.as_ref().unwrap();
        assert_eq!(oidc.use_existing_client_secret, Some(false));
        assert!(oidc.has_client_secret());

        let modify = for_modify(&without_secret);
        let oidc = modify[0].authenticate_oidc_config.as_ref().unwrap();
        assert_eq!(oidc.use_existing_client_secret, Some(true));

        let create = for_create(&without_secret);
        let oidc = create[0].authenticate_oidc_config.as_ref().unwrap();
        assert_eq!(oidc.use_existing_client_secret, Some(false));
        assert_eq!(create[0].order, Some(1));
    }
}
