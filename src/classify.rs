//! Expression classification for template lowering.
//!
//! An expression is *template-expressible* when the interpolation
//! grammar can evaluate it directly: identifier and member reads,
//! literals, and operator combinations of those. The template cannot
//! invoke functions or build objects, so calls, object/array literals
//! and arrow functions are complex; complex expressions get hoisted
//! into anonymous state instead of being rejected.

use oxc_ast::ast::{BinaryOperator, Expression, UnaryOperator};

use crate::ast_util::{contains_jsx, member_chain, unparenthesized};

pub fn is_template_expressible(expr: &Expression) -> bool {
    match unparenthesized(expr) {
        Expression::Identifier(_)
        | Expression::StringLiteral(_)
        | Expression::NumericLiteral(_)
        | Expression::BooleanLiteral(_)
        | Expression::NullLiteral(_) => true,
        Expression::StaticMemberExpression(member) => is_template_expressible(&member.object),
        Expression::ComputedMemberExpression(member) => {
            is_template_expressible(&member.object)
                && is_template_expressible(&member.expression)
        }
        Expression::ThisExpression(_) => true,
        Expression::UnaryExpression(unary) => {
            matches!(
                unary.operator,
                UnaryOperator::LogicalNot | UnaryOperator::UnaryNegation | UnaryOperator::UnaryPlus
            ) && is_template_expressible(&unary.argument)
        }
        Expression::BinaryExpression(binary) => {
            !matches!(
                binary.operator,
                BinaryOperator::In | BinaryOperator::Instanceof
            ) && is_template_expressible(&binary.left)
                && is_template_expressible(&binary.right)
        }
        Expression::LogicalExpression(logic) => {
            branch_expressible(&logic.left) && branch_expressible(&logic.right)
        }
        Expression::ConditionalExpression(cond) => {
            is_template_expressible(&cond.test)
                && branch_expressible(&cond.consequent)
                && branch_expressible(&cond.alternate)
        }
        _ => false,
    }
}

/// Branches of logical/conditional expressions may be markup; markup is
/// lowered structurally rather than interpolated.
fn branch_expressible(expr: &Expression) -> bool {
    contains_jsx(expr) || is_template_expressible(expr)
}

/// A `key` attribute must be an identifier or a member read; anything
/// else is hoisted first.
pub fn key_needs_hoist(expr: &Expression) -> bool {
    member_chain(unparenthesized(expr)).is_none()
}
