//! Built-in evaluator for the security-function rule dialect.
//!
//! Rule conditions are boolean expressions over a fixed function vocabulary
//! (`hasRole`, `isAuthenticated`, `hasIpAddress`, ...). This evaluator is
//! the default [`ConditionEvaluator`] implementation; hosts embedding a
//! different expression engine implement the port themselves.

use std::net::IpAddr;

use policy_engine_sdk::expression::{ConditionExpr, FunctionCall, parse_expression};
use policy_engine_sdk::models::AuthorizationContext;
use policy_engine_sdk::ports::ConditionEvaluator;
use policy_engine_sdk::PolicyEngineError;

/// Evaluator for the built-in function vocabulary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinConditionEvaluator;

impl BuiltinConditionEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ConditionEvaluator for BuiltinConditionEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        context: &AuthorizationContext,
    ) -> Result<bool, PolicyEngineError> {
        let expr = parse_expression(expression).map_err(|e| PolicyEngineError::Evaluation {
            reason: e.to_string(),
        })?;
        eval_expr(&expr, context)
    }
}

fn eval_expr(
    expr: &ConditionExpr,
    context: &AuthorizationContext,
) -> Result<bool, PolicyEngineError> {
    match expr {
        ConditionExpr::And(operands) => {
            for operand in operands {
                if !eval_expr(operand, context)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        ConditionExpr::Or(operands) => {
            for operand in operands {
                if eval_expr(operand, context)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        ConditionExpr::Not(inner) => Ok(!eval_expr(inner, context)?),
        ConditionExpr::Call(call) => eval_call(call, context),
    }
}

fn eval_call(
    call: &FunctionCall,
    context: &AuthorizationContext,
) -> Result<bool, PolicyEngineError> {
    match call.name.as_str() {
        "permitAll" => Ok(true),
        "denyAll" => Ok(false),
        "isAuthenticated" | "isFullyAuthenticated" => Ok(context.subject.authenticated),
        "isAnonymous" => Ok(!context.subject.authenticated),
        // Remember-me principals never reach the engine as such; the
        // context only distinguishes authenticated from anonymous.
        "isRememberMe" => Ok(false),
        "hasRole" | "hasAuthority" => {
            let authority = single_arg(call)?;
            Ok(context.subject.has_authority(authority))
        }
        "hasAnyRole" | "hasAnyAuthority" => {
            if call.args.is_empty() {
                return Err(arity_error(call, "at least one argument"));
            }
            Ok(call
                .args
                .iter()
                .any(|a| context.subject.has_authority(a)))
        }
        "hasIpAddress" => {
            let network = single_arg(call)?;
            Ok(context
                .environment
                .source_address
                .is_some_and(|addr| ip_in_network(addr, network)))
        }
        other => Err(PolicyEngineError::Evaluation {
            reason: format!("unknown condition function: {other}"),
        }),
    }
}

fn single_arg(call: &FunctionCall) -> Result<&str, PolicyEngineError> {
    match call.args.as_slice() {
        [arg] => Ok(arg),
        _ => Err(arity_error(call, "exactly one argument")),
    }
}

fn arity_error(call: &FunctionCall, expected: &str) -> PolicyEngineError {
    PolicyEngineError::Evaluation {
        reason: format!("{} expects {expected}", call.name),
    }
}

/// Whether `addr` falls inside `network` (a CIDR block or a bare address).
///
/// Malformed networks match nothing.
pub(crate) fn ip_in_network(addr: IpAddr, network: &str) -> bool {
    let Some((base, prefix_len)) = network.split_once('/') else {
        return network.parse::<IpAddr>().is_ok_and(|n| n == addr);
    };
    let Ok(prefix_len) = prefix_len.parse::<u32>() else {
        return false;
    };
    match (addr, base.parse::<IpAddr>()) {
        (IpAddr::V4(addr), Ok(IpAddr::V4(base))) => {
            if prefix_len > 32 {
                return false;
            }
            let mask = if prefix_len == 0 {
                0
            } else {
                u32::MAX << (32 - prefix_len)
            };
            (u32::from(addr) & mask) == (u32::from(base) & mask)
        }
        (IpAddr::V6(addr), Ok(IpAddr::V6(base))) => {
            if prefix_len > 128 {
                return false;
            }
            let mask = if prefix_len == 0 {
                0
            } else {
                u128::MAX << (128 - prefix_len)
            };
            (u128::from(addr) & mask) == (u128::from(base) & mask)
        }
        _ => false,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use chrono::Utc;
    use policy_engine_sdk::models::{
        ActionDescriptor, EnvironmentDescriptor, ResourceDescriptor, ResourceKind, Subject,
        SubjectKind,
    };
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn context(authenticated: bool, authorities: &[&str], source: Option<&str>) -> AuthorizationContext {
        AuthorizationContext {
            subject: Subject {
                id: Uuid::nil(),
                kind: SubjectKind::User,
                name: "jdoe".to_owned(),
                authenticated,
                authorities: authorities.iter().map(|a| (*a).to_owned()).collect::<BTreeSet<_>>(),
            },
            action: ActionDescriptor {
                name: "GET".to_owned(),
            },
            resource: ResourceDescriptor {
                kind: ResourceKind::Url,
                identifier: "/admin/policies".to_owned(),
            },
            environment: EnvironmentDescriptor {
                source_address: source.map(|s| s.parse().unwrap()),
                timestamp: Utc::now(),
                request_id: None,
            },
        }
    }

    #[test]
    fn permit_all_and_deny_all() {
        let evaluator = BuiltinConditionEvaluator::new();
        let ctx = context(false, &[], None);
        assert!(evaluator.evaluate("permitAll()", &ctx).unwrap());
        assert!(!evaluator.evaluate("denyAll()", &ctx).unwrap());
    }

    #[test]
    fn authentication_state_functions() {
        let evaluator = BuiltinConditionEvaluator::new();
        let authed = context(true, &[], None);
        let anon = context(false, &[], None);
        assert!(evaluator.evaluate("isAuthenticated()", &authed).unwrap());
        assert!(!evaluator.evaluate("isAuthenticated()", &anon).unwrap());
        assert!(evaluator.evaluate("isAnonymous()", &anon).unwrap());
    }

    #[test]
    fn role_membership_functions() {
        let evaluator = BuiltinConditionEvaluator::new();
        let ctx = context(true, &["AUDITOR"], None);
        assert!(evaluator.evaluate("hasRole('AUDITOR')", &ctx).unwrap());
        assert!(!evaluator.evaluate("hasRole('ADMIN')", &ctx).unwrap());
        assert!(evaluator
            .evaluate("hasAnyRole('ADMIN', 'AUDITOR')", &ctx)
            .unwrap());
    }

    #[test]
    fn compound_expression_short_circuits() {
        let evaluator = BuiltinConditionEvaluator::new();
        let ctx = context(true, &["AUDITOR"], None);
        assert!(evaluator
            .evaluate("hasRole('AUDITOR') and isAuthenticated()", &ctx)
            .unwrap());
        assert!(evaluator
            .evaluate("hasRole('MISSING') or permitAll()", &ctx)
            .unwrap());
        assert!(!evaluator
            .evaluate("not isAuthenticated()", &ctx)
            .unwrap());
    }

    #[test]
    fn ip_function_matches_source_network() {
        let evaluator = BuiltinConditionEvaluator::new();
        let inside = context(true, &[], Some("10.1.2.3"));
        let outside = context(true, &[], Some("203.0.113.9"));
        let unknown = context(true, &[], None);
        assert!(evaluator
            .evaluate("hasIpAddress('10.0.0.0/8')", &inside)
            .unwrap());
        assert!(!evaluator
            .evaluate("hasIpAddress('10.0.0.0/8')", &outside)
            .unwrap());
        assert!(!evaluator
            .evaluate("hasIpAddress('10.0.0.0/8')", &unknown)
            .unwrap());
    }

    #[test]
    fn unknown_function_is_an_evaluation_error() {
        let evaluator = BuiltinConditionEvaluator::new();
        let ctx = context(true, &[], None);
        let err = evaluator.evaluate("fooBar()", &ctx).unwrap_err();
        match err {
            PolicyEngineError::Evaluation { reason } => {
                assert!(reason.contains("fooBar"));
            }
            other => panic!("expected Evaluation, got: {other:?}"),
        }
    }

    #[test]
    fn wrong_arity_is_an_evaluation_error() {
        let evaluator = BuiltinConditionEvaluator::new();
        let ctx = context(true, &[], None);
        assert!(evaluator.evaluate("hasRole()", &ctx).is_err());
        assert!(evaluator.evaluate("hasRole('A', 'B')", &ctx).is_err());
    }

    #[test]
    fn cidr_matching_edges() {
        let addr: IpAddr = "192.168.10.5".parse().unwrap();
        assert!(ip_in_network(addr, "192.168.0.0/16"));
        assert!(!ip_in_network(addr, "192.168.11.0/24"));
        assert!(ip_in_network(addr, "192.168.10.5"));
        assert!(ip_in_network(addr, "0.0.0.0/0"));
        assert!(!ip_in_network(addr, "not-a-network"));
        assert!(!ip_in_network(addr, "192.168.0.0/40"));
    }
}
