//! Span-oriented helpers over the oxc AST.
//!
//! The rewriting strategy in this crate never prints an AST. Edits are
//! recorded as `(start, end, replacement)` against the original source
//! and applied in one pass; a slice of the source with only the edits
//! inside it applied can be taken for any byte range, which is how the
//! rewritten render body is extracted.

use oxc_ast::ast::{Argument, BindingPattern, Expression, PropertyKey, Statement};
use oxc_span::Span;

/// Source text of a span.
pub fn slice<'a>(source: &'a str, span: Span) -> &'a str {
    &source[span.start as usize..span.end as usize]
}

#[derive(Debug, Clone)]
struct Edit {
    start: u32,
    end: u32,
    text: String,
}

/// Ordered collection of text replacements keyed by absolute byte span.
/// Overlap resolution keeps the outermost edit; an edit recorded inside
/// the span of another applied edit is dropped.
#[derive(Debug, Default)]
pub struct EditList {
    edits: Vec<Edit>,
}

impl EditList {
    pub fn new() -> Self {
        EditList::default()
    }

    pub fn replace(&mut self, span: Span, text: impl Into<String>) {
        self.edits.push(Edit {
            start: span.start,
            end: span.end,
            text: text.into(),
        });
    }

    pub fn insert(&mut self, at: u32, text: impl Into<String>) {
        self.edits.push(Edit {
            start: at,
            end: at,
            text: text.into(),
        });
    }

    /// Applies every edit falling inside `[start, end)` to that slice of
    /// `source`. Wider edits win over edits nested inside them; ties on
    /// position keep insertion order.
    pub fn apply_range(&self, source: &str, start: u32, end: u32) -> String {
        let mut selected: Vec<&Edit> = self
            .edits
            .iter()
            .filter(|e| e.start >= start && e.end <= end)
            .collect();
        selected.sort_by_key(|e| (e.start, std::cmp::Reverse(e.end)));

        let mut out = String::with_capacity((end - start) as usize);
        let mut cursor = start;
        for edit in selected {
            if edit.start < cursor {
                continue;
            }
            out.push_str(&source[cursor as usize..edit.start as usize]);
            out.push_str(&edit.text);
            cursor = edit.end;
        }
        out.push_str(&source[cursor as usize..end as usize]);
        out
    }

    pub fn apply(&self, source: &str) -> String {
        self.apply_range(source, 0, source.len() as u32)
    }
}

/// Flattens a static member chain into its identifier parts, e.g.
/// `this.props.a.onTick` → `["this", "props", "a", "onTick"]`. Returns
/// `None` when the chain contains anything but identifiers and `this`.
pub fn member_chain<'a>(expr: &'a Expression) -> Option<Vec<&'a str>> {
    let mut parts = Vec::new();
    let mut cur = expr;
    loop {
        match cur {
            Expression::StaticMemberExpression(member) => {
                parts.push(member.property.name.as_str());
                cur = &member.object;
            }
            Expression::ThisExpression(_) => {
                parts.push("this");
                break;
            }
            Expression::Identifier(id) => {
                parts.push(id.name.as_str());
                break;
            }
            Expression::ParenthesizedExpression(paren) => {
                cur = &paren.expression;
            }
            _ => return None,
        }
    }
    parts.reverse();
    Some(parts)
}

/// Name of a statically-known property key.
pub fn prop_key_name<'a>(key: &'a PropertyKey) -> Option<&'a str> {
    match key {
        PropertyKey::StaticIdentifier(id) => Some(id.name.as_str()),
        PropertyKey::StringLiteral(lit) => Some(lit.value.as_str()),
        _ => None,
    }
}

/// Collects the names bound by a pattern. Returns `false` when the
/// pattern contains a rest element, which callers treat as a violation
/// for props destructuring.
pub fn binding_names(pattern: &BindingPattern, out: &mut Vec<String>) -> bool {
    match pattern {
        BindingPattern::BindingIdentifier(id) => {
            out.push(id.name.to_string());
            true
        }
        BindingPattern::ObjectPattern(obj) => {
            if obj.rest.is_some() {
                return false;
            }
            for prop in &obj.properties {
                // for `{ a: b }` the collected name is the source key
                if let Some(name) = prop_key_name(&prop.key) {
                    out.push(name.to_string());
                } else if !binding_names(&prop.value, out) {
                    return false;
                }
            }
            true
        }
        BindingPattern::ArrayPattern(arr) => {
            if arr.rest.is_some() {
                return false;
            }
            for element in arr.elements.iter().flatten() {
                if !binding_names(element, out) {
                    return false;
                }
            }
            true
        }
        BindingPattern::AssignmentPattern(assign) => binding_names(&assign.left, out),
    }
}

/// Names a pattern binds locally, including destructured value names
/// (`{ a: b }` binds `b`). Used for render-scope tracking.
pub fn local_binding_names(pattern: &BindingPattern, out: &mut Vec<String>) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => out.push(id.name.to_string()),
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                local_binding_names(&prop.value, out);
            }
            if let Some(rest) = &obj.rest {
                local_binding_names(&rest.argument, out);
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            for element in arr.elements.iter().flatten() {
                local_binding_names(element, out);
            }
            if let Some(rest) = &arr.rest {
                local_binding_names(&rest.argument, out);
            }
        }
        BindingPattern::AssignmentPattern(assign) => local_binding_names(&assign.left, out),
    }
}

/// Whether an expression contains JSX anywhere inside it.
pub fn contains_jsx(expr: &Expression) -> bool {
    match expr {
        Expression::JSXElement(_) | Expression::JSXFragment(_) => true,
        Expression::ParenthesizedExpression(paren) => contains_jsx(&paren.expression),
        Expression::ConditionalExpression(cond) => {
            contains_jsx(&cond.test)
                || contains_jsx(&cond.consequent)
                || contains_jsx(&cond.alternate)
        }
        Expression::LogicalExpression(logic) => {
            contains_jsx(&logic.left) || contains_jsx(&logic.right)
        }
        Expression::BinaryExpression(binary) => {
            contains_jsx(&binary.left) || contains_jsx(&binary.right)
        }
        Expression::UnaryExpression(unary) => contains_jsx(&unary.argument),
        Expression::SequenceExpression(seq) => seq.expressions.iter().any(contains_jsx),
        Expression::AssignmentExpression(assign) => contains_jsx(&assign.right),
        Expression::CallExpression(call) => {
            call.arguments.iter().any(|arg| match arg {
                Argument::SpreadElement(spread) => contains_jsx(&spread.argument),
                _ => arg.as_expression().map(contains_jsx).unwrap_or(false),
            }) || contains_jsx(&call.callee)
        }
        Expression::ArrayExpression(array) => array.elements.iter().any(|el| {
            el.as_expression().map(contains_jsx).unwrap_or(false)
        }),
        Expression::ArrowFunctionExpression(arrow) => arrow
            .body
            .statements
            .iter()
            .any(statement_contains_jsx),
        Expression::StaticMemberExpression(member) => contains_jsx(&member.object),
        _ => false,
    }
}

/// Whether a statement contains JSX anywhere inside it.
pub fn statement_contains_jsx(stmt: &Statement) -> bool {
    match stmt {
        Statement::ExpressionStatement(expr_stmt) => contains_jsx(&expr_stmt.expression),
        Statement::ReturnStatement(ret) => {
            ret.argument.as_ref().map(contains_jsx).unwrap_or(false)
        }
        Statement::BlockStatement(block) => block.body.iter().any(statement_contains_jsx),
        Statement::IfStatement(if_stmt) => {
            statement_contains_jsx(&if_stmt.consequent)
                || if_stmt
                    .alternate
                    .as_ref()
                    .map(statement_contains_jsx)
                    .unwrap_or(false)
                || contains_jsx(&if_stmt.test)
        }
        Statement::SwitchStatement(switch) => switch
            .cases
            .iter()
            .any(|case| case.consequent.iter().any(statement_contains_jsx)),
        Statement::ForStatement(for_stmt) => statement_contains_jsx(&for_stmt.body),
        Statement::ForInStatement(for_in) => statement_contains_jsx(&for_in.body),
        Statement::ForOfStatement(for_of) => statement_contains_jsx(&for_of.body),
        Statement::VariableDeclaration(decl) => decl
            .declarations
            .iter()
            .any(|d| d.init.as_ref().map(contains_jsx).unwrap_or(false)),
        _ => false,
    }
}

/// Unwraps parentheses around an expression.
pub fn unparenthesized<'a, 'b>(expr: &'a Expression<'b>) -> &'a Expression<'b> {
    match expr {
        Expression::ParenthesizedExpression(paren) => unparenthesized(&paren.expression),
        _ => expr,
    }
}
