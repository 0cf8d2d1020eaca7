//! Rule-expression translation into human-readable condition trees.
//!
//! Translators form an ordered chain: each declares the functions it
//! `supports`, the first match translates, and a universal fallback at the
//! end guarantees total coverage by echoing the raw expression text. New
//! functions get a new translator appended to the chain; existing
//! translators are never edited for that.
#![allow(clippy::non_ascii_literal)] // descriptions are operator-facing Korean copy

use std::collections::BTreeSet;

use policy_engine_sdk::expression::{
    ConditionExpr, ExpressionNode, ExpressionNodeKind, FunctionCall, parse_expression,
};
use policy_engine_sdk::PolicyEngineError;

/// One handler of the translation chain.
pub trait ConditionTranslator: Send + Sync {
    /// Whether this translator renders the given function.
    fn supports(&self, function: &str) -> bool;

    /// Render one function call as a terminal condition node.
    fn translate(&self, call: &FunctionCall) -> ExpressionNode;
}

/// Ordered translator chain with a terminal fallback.
pub struct TranslatorChain {
    translators: Vec<Box<dyn ConditionTranslator>>,
}

impl TranslatorChain {
    /// The built-in chain: role functions, authority functions,
    /// authentication state, blanket access, source network, fallback.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(vec![
            Box::new(RoleFunctionTranslator),
            Box::new(AuthorityFunctionTranslator),
            Box::new(AuthenticationStateTranslator),
            Box::new(BlanketAccessTranslator),
            Box::new(SourceNetworkTranslator),
        ])
    }

    /// Chain over explicit translators, consulted in order. The universal
    /// fallback is appended automatically.
    #[must_use]
    pub fn new(mut translators: Vec<Box<dyn ConditionTranslator>>) -> Self {
        translators.push(Box::new(FallbackTranslator));
        Self { translators }
    }

    /// Parse and translate a rule expression.
    ///
    /// # Errors
    ///
    /// - `Evaluation` when the expression cannot be parsed
    pub fn describe(&self, expression: &str) -> Result<ExpressionNode, PolicyEngineError> {
        let expr = parse_expression(expression).map_err(|e| PolicyEngineError::Evaluation {
            reason: e.to_string(),
        })?;
        Ok(self.translate_expr(&expr))
    }

    fn translate_expr(&self, expr: &ConditionExpr) -> ExpressionNode {
        match expr {
            ConditionExpr::And(operands) => {
                self.branch(ExpressionNodeKind::AllOf, "다음 조건을 모두 충족해야 합니다", operands)
            }
            ConditionExpr::Or(operands) => self.branch(
                ExpressionNodeKind::AnyOf,
                "다음 조건 중 하나 이상을 충족해야 합니다",
                operands,
            ),
            ConditionExpr::Not(inner) => {
                let child = self.translate_expr(inner);
                ExpressionNode {
                    kind: ExpressionNodeKind::Condition,
                    description: format!("다음 조건에 해당하지 않아야 합니다: {}", child.description),
                    required_authorities: BTreeSet::new(),
                    requires_authentication: child.requires_authentication.map(|r| !r),
                    children: vec![child],
                }
            }
            ConditionExpr::Call(call) => self.translate_call(call),
        }
    }

    fn translate_call(&self, call: &FunctionCall) -> ExpressionNode {
        for translator in &self.translators {
            if translator.supports(&call.name) {
                return translator.translate(call);
            }
        }
        // Unreachable: the fallback supports everything. Kept as a plain
        // pass-through so a misbuilt chain still degrades gracefully.
        FallbackTranslator.translate(call)
    }

    fn branch(
        &self,
        kind: ExpressionNodeKind,
        description: &str,
        operands: &[ConditionExpr],
    ) -> ExpressionNode {
        let children: Vec<ExpressionNode> =
            operands.iter().map(|o| self.translate_expr(o)).collect();
        let mut required_authorities = BTreeSet::new();
        for child in &children {
            required_authorities.extend(child.required_authorities.iter().cloned());
        }
        // A conjunction inherits the strongest authentication requirement
        // among its children; a disjunction asserts none.
        let requires_authentication = if kind == ExpressionNodeKind::AllOf {
            if children
                .iter()
                .any(|c| c.requires_authentication == Some(true))
            {
                Some(true)
            } else if children
                .iter()
                .any(|c| c.requires_authentication == Some(false))
            {
                Some(false)
            } else {
                None
            }
        } else {
            None
        };
        ExpressionNode {
            kind,
            description: description.to_owned(),
            required_authorities,
            requires_authentication,
            children,
        }
    }
}

fn quoted_list(args: &[String]) -> String {
    args.iter()
        .map(|a| format!("'{a}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `hasRole` / `hasAnyRole`.
pub struct RoleFunctionTranslator;

impl ConditionTranslator for RoleFunctionTranslator {
    fn supports(&self, function: &str) -> bool {
        matches!(function, "hasRole" | "hasAnyRole")
    }

    fn translate(&self, call: &FunctionCall) -> ExpressionNode {
        let description = if call.name == "hasRole" {
            format!("{} 역할이 필요합니다", quoted_list(&call.args))
        } else {
            format!("{} 역할 중 하나가 필요합니다", quoted_list(&call.args))
        };
        ExpressionNode {
            kind: ExpressionNodeKind::Condition,
            description,
            required_authorities: call.args.iter().cloned().collect(),
            requires_authentication: Some(true),
            children: vec![],
        }
    }
}

/// `hasAuthority` / `hasAnyAuthority`.
pub struct AuthorityFunctionTranslator;

impl ConditionTranslator for AuthorityFunctionTranslator {
    fn supports(&self, function: &str) -> bool {
        matches!(function, "hasAuthority" | "hasAnyAuthority")
    }

    fn translate(&self, call: &FunctionCall) -> ExpressionNode {
        let description = if call.name == "hasAuthority" {
            format!("{} 권한이 필요합니다", quoted_list(&call.args))
        } else {
            format!("{} 권한 중 하나가 필요합니다", quoted_list(&call.args))
        };
        ExpressionNode {
            kind: ExpressionNodeKind::Condition,
            description,
            required_authorities: call.args.iter().cloned().collect(),
            requires_authentication: Some(true),
            children: vec![],
        }
    }
}

/// `isAuthenticated` / `isFullyAuthenticated` / `isRememberMe` /
/// `isAnonymous`.
pub struct AuthenticationStateTranslator;

impl ConditionTranslator for AuthenticationStateTranslator {
    fn supports(&self, function: &str) -> bool {
        matches!(
            function,
            "isAuthenticated" | "isFullyAuthenticated" | "isRememberMe" | "isAnonymous"
        )
    }

    fn translate(&self, call: &FunctionCall) -> ExpressionNode {
        let (description, requires_authentication) = match call.name.as_str() {
            "isFullyAuthenticated" => ("완전히 인증된 사용자만 접근할 수 있습니다", Some(true)),
            "isRememberMe" => ("자동 로그인 사용자만 접근할 수 있습니다", Some(true)),
            "isAnonymous" => ("익명 사용자만 접근할 수 있습니다", Some(false)),
            _ => ("로그인한 사용자만 접근할 수 있습니다", Some(true)),
        };
        ExpressionNode {
            kind: ExpressionNodeKind::Condition,
            description: description.to_owned(),
            required_authorities: BTreeSet::new(),
            requires_authentication,
            children: vec![],
        }
    }
}

/// `permitAll` / `denyAll`.
pub struct BlanketAccessTranslator;

impl ConditionTranslator for BlanketAccessTranslator {
    fn supports(&self, function: &str) -> bool {
        matches!(function, "permitAll" | "denyAll")
    }

    fn translate(&self, call: &FunctionCall) -> ExpressionNode {
        let description = if call.name == "permitAll" {
            "모든 사용자의 접근을 허용합니다"
        } else {
            "모든 접근을 거부합니다"
        };
        ExpressionNode::condition(description)
    }
}

/// `hasIpAddress`.
pub struct SourceNetworkTranslator;

impl ConditionTranslator for SourceNetworkTranslator {
    fn supports(&self, function: &str) -> bool {
        function == "hasIpAddress"
    }

    fn translate(&self, call: &FunctionCall) -> ExpressionNode {
        let network = call.args.first().map_or("?", String::as_str);
        ExpressionNode::condition(format!("{network} 대역에서의 접근만 허용합니다"))
    }
}

/// Universal fallback: echoes the raw expression text.
pub struct FallbackTranslator;

impl ConditionTranslator for FallbackTranslator {
    fn supports(&self, _function: &str) -> bool {
        true
    }

    fn translate(&self, call: &FunctionCall) -> ExpressionNode {
        ExpressionNode::condition(call.to_source())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn has_role_lists_required_authorities() {
        let chain = TranslatorChain::with_defaults();
        let node = chain.describe("hasRole('POLICY_ADMIN')").unwrap();
        assert_eq!(node.kind, ExpressionNodeKind::Condition);
        assert!(node.required_authorities.contains("POLICY_ADMIN"));
        assert_eq!(node.requires_authentication, Some(true));
        assert!(node.description.contains("POLICY_ADMIN"));
    }

    #[test]
    fn authentication_flags_follow_function_semantics() {
        let chain = TranslatorChain::with_defaults();
        let authed = chain.describe("isAuthenticated()").unwrap();
        assert_eq!(authed.requires_authentication, Some(true));
        let anon = chain.describe("isAnonymous()").unwrap();
        assert_eq!(anon.requires_authentication, Some(false));
        let blanket = chain.describe("permitAll()").unwrap();
        assert_eq!(blanket.requires_authentication, None);
    }

    #[test]
    fn conjunction_aggregates_children() {
        let chain = TranslatorChain::with_defaults();
        let node = chain
            .describe("hasRole('AUDITOR') and hasAuthority('PERM_EXPORT')")
            .unwrap();
        assert_eq!(node.kind, ExpressionNodeKind::AllOf);
        assert_eq!(node.children.len(), 2);
        assert!(node.required_authorities.contains("AUDITOR"));
        assert!(node.required_authorities.contains("PERM_EXPORT"));
        assert_eq!(node.requires_authentication, Some(true));
    }

    #[test]
    fn disjunction_does_not_assert_authentication() {
        let chain = TranslatorChain::with_defaults();
        let node = chain
            .describe("isAuthenticated() or hasIpAddress('10.0.0.0/8')")
            .unwrap();
        assert_eq!(node.kind, ExpressionNodeKind::AnyOf);
        assert_eq!(node.requires_authentication, None);
    }

    #[test]
    fn unregistered_function_falls_back_to_verbatim_text() {
        let chain = TranslatorChain::with_defaults();
        let node = chain.describe("fooBar('x')").unwrap();
        assert_eq!(node.kind, ExpressionNodeKind::Condition);
        assert_eq!(node.description, "fooBar('x')");
        assert!(node.required_authorities.is_empty());
        assert_eq!(node.requires_authentication, None);
    }

    #[test]
    fn chain_order_decides_the_winner() {
        struct Override;

        impl ConditionTranslator for Override {
            fn supports(&self, function: &str) -> bool {
                function == "hasRole"
            }

            fn translate(&self, _call: &FunctionCall) -> ExpressionNode {
                ExpressionNode::condition("overridden")
            }
        }

        // The override sits before the built-in role translator.
        let chain = TranslatorChain::new(vec![Box::new(Override), Box::new(RoleFunctionTranslator)]);
        let node = chain.describe("hasRole('X')").unwrap();
        assert_eq!(node.description, "overridden");
    }

    #[test]
    fn negation_wraps_and_flips_authentication() {
        let chain = TranslatorChain::with_defaults();
        let node = chain.describe("not isAnonymous()").unwrap();
        assert_eq!(node.children.len(), 1);
        assert_eq!(node.requires_authentication, Some(true));
    }

    #[test]
    fn unparseable_expression_is_an_evaluation_error() {
        let chain = TranslatorChain::with_defaults();
        let err = chain.describe("hasRole('A' and").unwrap_err();
        match err {
            PolicyEngineError::Evaluation { .. } => {}
            other => panic!("expected Evaluation, got: {other:?}"),
        }
    }
}
