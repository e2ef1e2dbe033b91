//! Render lowering.
//!
//! Walks the render method and produces two artifacts at once:
//! - the template IR (`TemplateNode` tree) for emission, and
//! - the statement text that survives into `_createData`, with JSX
//!   statements dropped or neutralized and complex expressions hoisted
//!   into deterministic anonymous bindings.
//!
//! Lowering never prints an AST: statement and expression text is
//! sliced from the original source through the shared `EditList`, so
//! rewrites recorded by the class transformer (dispatch calls, template
//! literals, `this.state`/`this.props` renames) flow into every slice.

use std::collections::{HashMap, HashSet};

use oxc_ast::ast::{
    ArrowFunctionExpression, CallExpression, Expression, FunctionBody, JSXAttributeItem,
    JSXAttributeName, JSXAttributeValue, JSXChild, JSXElement, JSXElementName, JSXFragment,
    Statement,
};
use oxc_span::{GetSpan, Span};

use crate::ast_util::{contains_jsx, member_chain, statement_contains_jsx, unparenthesized, EditList};
use crate::classify::{is_template_expressible, key_needs_hoist};
use crate::constants::{
    builtin_tag, kebab_case, slot_name, ANONYMOUS_CALLEE_PREFIX, ANONYMOUS_STATE_PREFIX,
    BUILTIN_COMPONENTS, EVENT_NAME_RE, FUN_PRIVATE_PREFIX, IMAGE_COMPONENTS, LOOP_ARRAY_PREFIX,
    LOOP_REF_PREFIX, SLOT_PROP_RE,
};
use crate::error::{
    CompilerError, ERR_ATTR_UNSUPPORTED, ERR_EVENT_UNRESOLVED, ERR_FOR_STATEMENT_JSX,
    ERR_JSX_REASSIGNED, ERR_REF_INVALID, ERR_REF_LOOP_NO_INDEX, ERR_REF_STRING_IN_LOOP,
    ERR_SWITCH_CASE_BLOCK, ERR_SWITCH_DEFAULT_ORDER,
};
use crate::ir::{
    Attribute, AttributeValue, ComponentUsage, ConditionalBranch, ConditionalNode, ElementNode,
    ExpressionNode, LoopNode, PropertySet, RefDescriptor, RefKind, SlotNode, TemplateNode,
    TextNode,
};
use crate::options::Adapter;

/// Deterministic generator for every synthesized name. One instance per
/// compile call; repeated compiles of the same input produce identical
/// output.
#[derive(Debug, Default)]
pub struct NameGen {
    temp: usize,
    loop_array: usize,
    callee: usize,
    fun_private: usize,
    ref_id: usize,
}

impl NameGen {
    pub fn next_temp(&mut self) -> String {
        self.temp += 1;
        if self.temp == 1 {
            ANONYMOUS_STATE_PREFIX.to_string()
        } else {
            format!("{}{}", ANONYMOUS_STATE_PREFIX, self.temp)
        }
    }

    pub fn next_loop_array(&mut self) -> String {
        let n = self.loop_array;
        self.loop_array += 1;
        format!("{}{}", LOOP_ARRAY_PREFIX, n)
    }

    pub fn next_callee(&mut self) -> String {
        let n = self.callee;
        self.callee += 1;
        format!("{}{}", ANONYMOUS_CALLEE_PREFIX, n)
    }

    pub fn next_fun_private(&mut self) -> String {
        let n = self.fun_private;
        self.fun_private += 1;
        format!("{}{}", FUN_PRIVATE_PREFIX, n)
    }

    pub fn next_ref_id(&mut self) -> String {
        let n = self.ref_id;
        self.ref_id += 1;
        format!("{}{}", LOOP_REF_PREFIX, n)
    }
}

/// Where a JSX tag name came from.
#[derive(Debug, Clone)]
pub struct ImportBinding {
    pub source: String,
    pub is_default: bool,
}

/// What render lowering hands back to the class transformer.
#[derive(Debug, Default)]
pub struct LoweredRender {
    pub nodes: Vec<TemplateNode>,
    /// Processed `_createData` statements, in source order.
    pub body: Vec<String>,
    /// Trailing anonymous declarations (temps, callees, loop arrays).
    pub hoist_decls: Vec<String>,
    /// Names merged into `Object.assign(this.__state, …)`, hoists first.
    pub assigned: Vec<String>,
    /// Bare identifiers the template reads.
    pub used_names: Vec<String>,
    pub refs: Vec<RefDescriptor>,
    pub multiple_slots: bool,
    /// Handler and proxy names in first-use order.
    pub events: Vec<String>,
    pub proxies: Vec<DispatchProxy>,
    pub store_name: Option<String>,
    pub image_sources: Vec<String>,
    pub components: Vec<ComponentUsage>,
}

/// Synthesized method dispatching an attribute-position props function.
#[derive(Debug)]
pub struct DispatchProxy {
    /// Prop path relative to `this.props`.
    pub path: String,
    pub name: String,
    /// Argument source bound ahead of the event payload, from a
    /// `.bind(this, …)` handler.
    pub bound_args: Option<String>,
}

struct LoopScope {
    item: String,
    index: Option<String>,
    /// Declarations that must run per item inside the loop array map.
    pending: Vec<String>,
    /// Names exported on the snapshot object besides the original item.
    exports: Vec<String>,
    needs_snapshot: bool,
}

pub struct RenderLowerer<'a, 's, 'ast> {
    source: &'s str,
    file: &'s str,
    adapter: Adapter,
    edits: &'a EditList,
    names: &'a mut NameGen,
    imports: &'a HashMap<String, ImportBinding>,
    method_names: &'a HashSet<String>,
    props: &'a mut PropertySet,
    out: LoweredRender,
    loop_stack: Vec<LoopScope>,
    /// Render locals aliasing a props path, e.g. `pAdd` → `add`.
    aliases: HashMap<String, String>,
    /// Locals holding JSX trees; `None` means declared but not yet
    /// assigned.
    jsx_vars: HashMap<String, Option<&'ast Expression<'ast>>>,
    jsx_var_names: HashSet<String>,
}

impl<'a, 's, 'ast> RenderLowerer<'a, 's, 'ast> {
    pub fn new(
        source: &'s str,
        file: &'s str,
        adapter: Adapter,
        edits: &'a EditList,
        names: &'a mut NameGen,
        imports: &'a HashMap<String, ImportBinding>,
        method_names: &'a HashSet<String>,
        props: &'a mut PropertySet,
    ) -> Self {
        RenderLowerer {
            source,
            file,
            adapter,
            edits,
            names,
            imports,
            method_names,
            props,
            out: LoweredRender::default(),
            loop_stack: Vec::new(),
            aliases: HashMap::new(),
            jsx_vars: HashMap::new(),
            jsx_var_names: HashSet::new(),
        }
    }

    pub fn lower(mut self, body: &'ast FunctionBody<'ast>) -> Result<LoweredRender, CompilerError> {
        self.collect_jsx_var_names(&body.statements);
        let mut nodes = Vec::new();
        let mut data_body = Vec::new();
        self.process_block(&body.statements, true, &mut nodes, &mut data_body)?;
        self.out.nodes = nodes;
        self.out.body = data_body;
        Ok(self.out)
    }

    fn err(&self, code: &str, message: impl Into<String>, span: Span) -> CompilerError {
        CompilerError::at_offset(code, message, self.source, span.start, self.file)
    }

    fn code_slice(&self, span: Span) -> String {
        self.edits.apply_range(self.source, span.start, span.end)
    }

    // ── statement processing ──────────────────────────────────────────

    fn collect_jsx_var_names(&mut self, stmts: &'ast [Statement<'ast>]) {
        for stmt in stmts {
            match stmt {
                Statement::ExpressionStatement(expr_stmt) => {
                    if let Expression::AssignmentExpression(assign) = &expr_stmt.expression {
                        if contains_jsx(&assign.right) {
                            if let Some(name) = assignment_target_name(assign) {
                                self.jsx_var_names.insert(name.to_string());
                            }
                        }
                    }
                }
                Statement::BlockStatement(block) => self.collect_jsx_var_names(&block.body),
                _ => {}
            }
        }
    }

    fn process_block(
        &mut self,
        stmts: &'ast [Statement<'ast>],
        top_level: bool,
        nodes: &mut Vec<TemplateNode>,
        data_body: &mut Vec<String>,
    ) -> Result<(), CompilerError> {
        for stmt in stmts {
            self.process_statement(stmt, top_level, nodes, data_body)?;
        }
        Ok(())
    }

    fn process_statement(
        &mut self,
        stmt: &'ast Statement<'ast>,
        top_level: bool,
        nodes: &mut Vec<TemplateNode>,
        data_body: &mut Vec<String>,
    ) -> Result<(), CompilerError> {
        match stmt {
            Statement::VariableDeclaration(decl) => {
                let mut keep = true;
                for declarator in &decl.declarations {
                    let name = match &declarator.id {
                        oxc_ast::ast::BindingPattern::BindingIdentifier(id) => {
                            Some(id.name.to_string())
                        }
                        _ => None,
                    };
                    if let (Some(name), Some(init)) = (&name, &declarator.init) {
                        if contains_jsx(init) {
                            self.store_jsx_var(name, init, declarator.span())?;
                            keep = false;
                            continue;
                        }
                        if self.jsx_var_names.contains(name) {
                            // declared here, JSX assigned later
                            self.jsx_vars.insert(name.clone(), None);
                            keep = false;
                            continue;
                        }
                        if let Some(chain) = member_chain(init) {
                            if chain.len() > 2 && chain[0] == "this" && chain[1] == "props" {
                                self.aliases.insert(name.clone(), chain[2..].join("."));
                            }
                        }
                    } else if let Some(name) = &name {
                        if self.jsx_var_names.contains(name) {
                            self.jsx_vars.insert(name.clone(), None);
                            keep = false;
                        }
                    }
                }
                if keep {
                    data_body.push(self.code_slice(stmt.span()));
                } else {
                    data_body.push(";".to_string());
                }
            }
            Statement::ExpressionStatement(expr_stmt) => {
                if let Expression::AssignmentExpression(assign) = &expr_stmt.expression {
                    if contains_jsx(&assign.right) {
                        let name = assignment_target_name(assign).ok_or_else(|| {
                            self.err(
                                ERR_JSX_REASSIGNED,
                                "markup can only be assigned to a plain local variable",
                                assign.span(),
                            )
                        })?;
                        self.store_jsx_var(&name.to_string(), &assign.right, assign.span())?;
                        return Ok(());
                    }
                }
                data_body.push(self.code_slice(stmt.span()));
            }
            Statement::IfStatement(_) if statement_contains_jsx(stmt) => {
                self.lower_if_chain(stmt, top_level, nodes, data_body)?;
            }
            Statement::SwitchStatement(switch) if statement_contains_jsx(stmt) => {
                self.lower_switch(switch, top_level, nodes, data_body)?;
            }
            Statement::ForStatement(_)
            | Statement::ForInStatement(_)
            | Statement::ForOfStatement(_)
            | Statement::WhileStatement(_)
                if statement_contains_jsx(stmt) =>
            {
                return Err(self
                    .err(
                        ERR_FOR_STATEMENT_JSX,
                        "markup cannot be produced inside a for/while statement",
                        stmt.span(),
                    )
                    .with_hint("use `.map()` on the collection instead"));
            }
            Statement::ReturnStatement(ret) => {
                if let Some(arg) = &ret.argument {
                    if contains_jsx(arg) || self.is_jsx_var_read(arg) {
                        let lowered = self.lower_child_expr(arg)?;
                        nodes.extend(lowered);
                        if !top_level {
                            data_body.push("return null;".to_string());
                        }
                        return Ok(());
                    }
                }
                data_body.push(if top_level {
                    // final non-markup return folds into the state merge
                    ";".to_string()
                } else {
                    "return null;".to_string()
                });
            }
            Statement::BlockStatement(block) => {
                let mut inner = Vec::new();
                self.process_block(&block.body, false, nodes, &mut inner)?;
                data_body.push(format!("{{\n{}\n}}", inner.join("\n")));
            }
            _ => {
                data_body.push(self.code_slice(stmt.span()));
            }
        }
        Ok(())
    }

    fn is_jsx_var_read(&self, expr: &Expression) -> bool {
        match unparenthesized(expr) {
            Expression::Identifier(id) => self.jsx_vars.contains_key(id.name.as_str()),
            _ => false,
        }
    }

    fn store_jsx_var(
        &mut self,
        name: &String,
        init: &'ast Expression<'ast>,
        span: Span,
    ) -> Result<(), CompilerError> {
        if let Some(Some(_)) = self.jsx_vars.get(name) {
            return Err(self.err(
                ERR_JSX_REASSIGNED,
                format!("`{name}` already holds markup and cannot be reassigned"),
                span,
            ));
        }
        self.jsx_vars.insert(name.clone(), Some(init));
        self.jsx_var_names.insert(name.clone());
        Ok(())
    }

    /// `if (t) { return <A/> } else if (u) { … } else { … }` lowers to a
    /// conditional node; the data body keeps the chain with markup
    /// returns replaced by `return null`.
    fn lower_if_chain(
        &mut self,
        stmt: &'ast Statement<'ast>,
        _top_level: bool,
        nodes: &mut Vec<TemplateNode>,
        data_body: &mut Vec<String>,
    ) -> Result<(), CompilerError> {
        let mut branches = Vec::new();
        let mut else_children = Vec::new();
        let mut data_chain = String::new();
        let mut current = stmt;
        loop {
            let Statement::IfStatement(if_stmt) = current else {
                // trailing else block
                let mut inner = Vec::new();
                let mut body_nodes = Vec::new();
                self.branch_statements(current, &mut body_nodes, &mut inner)?;
                else_children = body_nodes;
                data_chain.push_str(&format!(" else {{\n{}\n}}", inner.join("\n")));
                break;
            };
            let (cond_template, cond_js) = self.lower_condition(&if_stmt.test, data_body)?;
            let mut inner = Vec::new();
            let mut body_nodes = Vec::new();
            self.branch_statements(&if_stmt.consequent, &mut body_nodes, &mut inner)?;
            let keyword = if branches.is_empty() { "if" } else { " else if" };
            data_chain.push_str(&format!(
                "{} ({}) {{\n{}\n}}",
                keyword,
                cond_js,
                inner.join("\n")
            ));
            branches.push(ConditionalBranch {
                condition: cond_template,
                children: body_nodes,
            });
            match &if_stmt.alternate {
                Some(alternate) => current = alternate,
                None => break,
            }
        }
        data_body.push(data_chain);
        nodes.push(TemplateNode::Conditional(ConditionalNode {
            branches,
            else_children,
        }));
        Ok(())
    }

    fn branch_statements(
        &mut self,
        stmt: &'ast Statement<'ast>,
        nodes: &mut Vec<TemplateNode>,
        data_body: &mut Vec<String>,
    ) -> Result<(), CompilerError> {
        match stmt {
            Statement::BlockStatement(block) => {
                self.process_block(&block.body, false, nodes, data_body)
            }
            other => self.process_statement(other, false, nodes, data_body),
        }
    }

    /// Hoists a complex condition; returns (template code, data code).
    fn lower_condition(
        &mut self,
        test: &Expression,
        data_body: &mut Vec<String>,
    ) -> Result<(String, String), CompilerError> {
        if is_template_expressible(test) {
            let raw = self.code_slice(test.span());
            Ok((self.template_code(&raw), raw))
        } else {
            let code = self.code_slice(test.span());
            let name = self.names.next_temp();
            data_body.push(format!("const {} = {};", name, code));
            self.out.assigned.push(name.clone());
            Ok((name.clone(), name))
        }
    }

    /// Folds a markup-producing switch into an if/else chain. Case
    /// bodies must be blocks and `default` must come last.
    fn lower_switch(
        &mut self,
        switch: &'ast oxc_ast::ast::SwitchStatement<'ast>,
        _top_level: bool,
        nodes: &mut Vec<TemplateNode>,
        data_body: &mut Vec<String>,
    ) -> Result<(), CompilerError> {
        let disc = self.code_slice(switch.discriminant.span());
        let disc_template = {
            let raw = self.code_slice(switch.discriminant.span());
            self.template_code(&raw)
        };
        let case_count = switch.cases.len();
        let mut branches = Vec::new();
        let mut else_children = Vec::new();
        let mut data_chain = String::new();
        for (i, case) in switch.cases.iter().enumerate() {
            let block = match case.consequent.as_slice() {
                [Statement::BlockStatement(block)] => block,
                _ => {
                    return Err(self
                        .err(
                            ERR_SWITCH_CASE_BLOCK,
                            "switch cases that produce markup must use block bodies",
                            case.span(),
                        )
                        .with_hint("wrap the case body in `{ … }`"));
                }
            };
            let mut inner = Vec::new();
            let mut body_nodes = Vec::new();
            self.process_block(&block.body, false, &mut body_nodes, &mut inner)?;
            match &case.test {
                Some(test) => {
                    let test_js = self.code_slice(test.span());
                    let test_template = self.template_code(&test_js);
                    let keyword = if branches.is_empty() { "if" } else { " else if" };
                    data_chain.push_str(&format!(
                        "{} ({} === {}) {{\n{}\n}}",
                        keyword,
                        disc,
                        test_js,
                        inner.join("\n")
                    ));
                    branches.push(ConditionalBranch {
                        condition: format!("{} === {}", disc_template, test_template),
                        children: body_nodes,
                    });
                }
                None => {
                    if i + 1 != case_count {
                        return Err(self.err(
                            ERR_SWITCH_DEFAULT_ORDER,
                            "`default` must be the last case of a markup-producing switch",
                            case.span(),
                        ));
                    }
                    data_chain.push_str(&format!(" else {{\n{}\n}}", inner.join("\n")));
                    else_children = body_nodes;
                }
            }
        }
        data_body.push(data_chain);
        nodes.push(TemplateNode::Conditional(ConditionalNode {
            branches,
            else_children,
        }));
        Ok(())
    }

    // ── JSX lowering ──────────────────────────────────────────────────

    fn lower_child_expr(
        &mut self,
        expr: &'ast Expression<'ast>,
    ) -> Result<Vec<TemplateNode>, CompilerError> {
        let expr = unparenthesized(expr);
        match expr {
            Expression::JSXElement(element) => self.lower_element(element),
            Expression::JSXFragment(fragment) => self.lower_fragment(fragment),
            Expression::NullLiteral(_) => Ok(Vec::new()),
            Expression::Identifier(id) if id.name == "undefined" => Ok(Vec::new()),
            Expression::Identifier(id) if self.jsx_vars.contains_key(id.name.as_str()) => {
                match self.jsx_vars.get(id.name.as_str()).copied().flatten() {
                    Some(stored) => self.lower_child_expr(stored),
                    None => Ok(Vec::new()),
                }
            }
            Expression::StaticMemberExpression(_) => {
                if let Some(chain) = member_chain(expr) {
                    if chain.as_slice() == ["this", "props", "children"] {
                        return Ok(vec![TemplateNode::Slot(SlotNode { name: None })]);
                    }
                    if let ["this", "props", prop] = chain.as_slice() {
                        if SLOT_PROP_RE.is_match(prop) {
                            self.out.multiple_slots = true;
                            self.out.used_names.push(prop.to_string());
                            return Ok(vec![TemplateNode::Slot(SlotNode {
                                name: Some(slot_name(prop)),
                            })]);
                        }
                    }
                }
                self.lower_value_expr(expr)
            }
            Expression::LogicalExpression(logic) if contains_jsx(expr) => {
                let mut data_sink = Vec::new();
                let (mut cond_template, _) = self.lower_condition(&logic.left, &mut data_sink)?;
                self.out.hoist_decls.extend(data_sink);
                if logic.operator == oxc_ast::ast::LogicalOperator::Or {
                    cond_template = format!("!({})", cond_template);
                }
                let children = self.lower_child_expr(&logic.right)?;
                Ok(vec![TemplateNode::Conditional(ConditionalNode {
                    branches: vec![ConditionalBranch {
                        condition: cond_template,
                        children,
                    }],
                    else_children: Vec::new(),
                })])
            }
            Expression::ConditionalExpression(_) if contains_jsx(expr) => {
                let mut branches = Vec::new();
                let mut else_children = Vec::new();
                self.flatten_conditional(expr, &mut branches, &mut else_children)?;
                Ok(vec![TemplateNode::Conditional(ConditionalNode {
                    branches,
                    else_children,
                })])
            }
            Expression::CallExpression(call) if is_markup_loop(call) => self.lower_loop(call),
            _ => self.lower_value_expr(expr),
        }
    }

    /// A non-markup expression in child position: inline it when the
    /// template can evaluate it, hoist it otherwise.
    fn lower_value_expr(&mut self, expr: &Expression) -> Result<Vec<TemplateNode>, CompilerError> {
        let code = if is_template_expressible(expr) {
            let raw = self.code_slice(expr.span());
            self.template_code(&raw)
        } else {
            let raw = self.code_slice(expr.span());
            self.hoist(raw)
        };
        Ok(vec![TemplateNode::Expression(ExpressionNode { code })])
    }

    fn flatten_conditional(
        &mut self,
        expr: &'ast Expression<'ast>,
        branches: &mut Vec<ConditionalBranch>,
        else_children: &mut Vec<TemplateNode>,
    ) -> Result<(), CompilerError> {
        let expr = unparenthesized(expr);
        let Expression::ConditionalExpression(cond) = expr else {
            *else_children = self.lower_child_expr(expr)?;
            return Ok(());
        };
        let mut data_sink = Vec::new();
        let (cond_template, cond_js) = self.lower_condition(&cond.test, &mut data_sink)?;
        self.out.hoist_decls.extend(data_sink);

        let consequent = unparenthesized(&cond.consequent);
        let children = if contains_jsx(consequent) {
            self.lower_child_expr(consequent)?
        } else {
            self.lower_guarded_branch(consequent, &cond_js, false)?
        };
        branches.push(ConditionalBranch {
            condition: cond_template,
            children,
        });

        let alternate = unparenthesized(&cond.alternate);
        match alternate {
            Expression::ConditionalExpression(_) if contains_jsx(alternate) => {
                self.flatten_conditional(alternate, branches, else_children)?;
            }
            _ if contains_jsx(alternate) => {
                *else_children = self.lower_child_expr(alternate)?;
            }
            _ => {
                *else_children = self.lower_guarded_branch(alternate, &cond_js, true)?;
            }
        }
        Ok(())
    }

    /// Non-markup branch of a conditional whose other side is markup.
    /// Complex branches are hoisted behind the condition so they are
    /// not evaluated when the markup side wins.
    fn lower_guarded_branch(
        &mut self,
        branch: &Expression,
        cond_js: &str,
        negate: bool,
    ) -> Result<Vec<TemplateNode>, CompilerError> {
        match branch {
            Expression::NullLiteral(_) => return Ok(Vec::new()),
            Expression::Identifier(id) if id.name == "undefined" => return Ok(Vec::new()),
            _ => {}
        }
        let code = if is_template_expressible(branch) {
            let raw = self.code_slice(branch.span());
            self.template_code(&raw)
        } else {
            let raw = self.code_slice(branch.span());
            let guarded = if negate {
                format!("{} ? null : {}", cond_js, raw)
            } else {
                format!("{} ? {} : null", cond_js, raw)
            };
            self.hoist(guarded)
        };
        Ok(vec![TemplateNode::Expression(ExpressionNode { code })])
    }

    fn lower_fragment(
        &mut self,
        fragment: &'ast JSXFragment<'ast>,
    ) -> Result<Vec<TemplateNode>, CompilerError> {
        self.lower_children(&fragment.children)
    }

    fn lower_children(
        &mut self,
        children: &'ast [JSXChild<'ast>],
    ) -> Result<Vec<TemplateNode>, CompilerError> {
        let mut out = Vec::new();
        for child in children {
            match child {
                JSXChild::Text(text) => {
                    let trimmed = text.value.trim();
                    if !trimmed.is_empty() {
                        out.push(TemplateNode::Text(TextNode {
                            value: collapse_whitespace(trimmed),
                        }));
                    }
                }
                JSXChild::Element(element) => out.extend(self.lower_element(element)?),
                JSXChild::Fragment(fragment) => out.extend(self.lower_fragment(fragment)?),
                JSXChild::ExpressionContainer(container) => {
                    if let Some(expr) = container.expression.as_expression() {
                        out.extend(self.lower_child_expr(expr)?);
                    }
                }
                JSXChild::Spread(spread) => {
                    return Err(self.err(
                        ERR_ATTR_UNSUPPORTED,
                        "spread children cannot be lowered to a template",
                        spread.span,
                    ));
                }
            }
        }
        Ok(out)
    }

    fn lower_element(
        &mut self,
        element: &'ast JSXElement<'ast>,
    ) -> Result<Vec<TemplateNode>, CompilerError> {
        let name = jsx_name(&element.opening_element.name).ok_or_else(|| {
            self.err(
                ERR_ATTR_UNSUPPORTED,
                "namespaced and member tag names are not supported",
                element.opening_element.span,
            )
        })?;

        // Store provider wrapper: neutral container, attributes dropped
        if name == "Provider" && self.provider_is_store_binding() {
            self.capture_store(element);
            let children = self.lower_children(&element.children)?;
            return Ok(vec![TemplateNode::Element(ElementNode {
                tag: "view".to_string(),
                attributes: Vec::new(),
                children,
            })]);
        }

        let is_builtin = BUILTIN_COMPONENTS.contains(name);
        let is_component = !is_builtin && self.record_component_usage(name);
        let tag = if is_builtin {
            builtin_tag(name)
        } else if name.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
            kebab_case(name)
        } else {
            name.to_string()
        };

        let mut attributes = Vec::new();
        for item in &element.opening_element.attributes {
            let attr = match item {
                JSXAttributeItem::Attribute(attr) => attr,
                JSXAttributeItem::SpreadAttribute(spread) => {
                    return Err(self.err(
                        ERR_ATTR_UNSUPPORTED,
                        "spread attributes cannot be lowered to a template",
                        spread.span,
                    ));
                }
            };
            let attr_name = match &attr.name {
                JSXAttributeName::Identifier(id) => id.name.as_str(),
                JSXAttributeName::NamespacedName(ns) => {
                    return Err(self.err(
                        ERR_ATTR_UNSUPPORTED,
                        "namespaced attributes are not supported",
                        ns.span,
                    ));
                }
            };
            match attr_name {
                "key" => continue, // consumed by the enclosing loop
                "ref" => {
                    let id_attr = self.lower_ref(attr.value.as_ref(), is_component, attr.span)?;
                    attributes.push(id_attr);
                    continue;
                }
                _ => {}
            }
            if EVENT_NAME_RE.is_match(attr_name) {
                let handler = self.resolve_event_handler(attr_name, attr.value.as_ref(), attr.span)?;
                attributes.push(Attribute::fixed(attr_name, handler));
                continue;
            }
            match &attr.value {
                None => attributes.push(Attribute {
                    name: attr_name.to_string(),
                    value: None,
                }),
                Some(JSXAttributeValue::StringLiteral(lit)) => {
                    if is_builtin && attr_name == "src" && IMAGE_COMPONENTS.contains(name) {
                        self.out.image_sources.push(lit.value.to_string());
                    }
                    attributes.push(Attribute::fixed(attr_name, lit.value.as_str()));
                }
                Some(JSXAttributeValue::ExpressionContainer(container)) => {
                    let Some(expr) = container.expression.as_expression() else {
                        continue;
                    };
                    let expr = unparenthesized(expr);
                    let code = if is_template_expressible(expr) {
                        let raw = self.code_slice(expr.span());
                        self.template_code(&raw)
                    } else {
                        let raw = self.code_slice(expr.span());
                        self.hoist(raw)
                    };
                    attributes.push(Attribute::bound(attr_name, code));
                }
                Some(JSXAttributeValue::Element(_)) | Some(JSXAttributeValue::Fragment(_)) => {
                    return Err(self.err(
                        ERR_ATTR_UNSUPPORTED,
                        "markup-valued attributes cannot be lowered to a template",
                        attr.span,
                    ));
                }
            }
        }

        let children = self.lower_children(&element.children)?;
        Ok(vec![TemplateNode::Element(ElementNode {
            tag,
            attributes,
            children,
        })])
    }

    fn provider_is_store_binding(&self) -> bool {
        self.imports.get("Provider").is_some_and(|binding| {
            binding.source == crate::constants::REDUX_PACKAGE
                || binding.source == crate::constants::MOBX_PACKAGE
        })
    }

    fn capture_store(&mut self, element: &JSXElement) {
        for item in &element.opening_element.attributes {
            if let JSXAttributeItem::Attribute(attr) = item {
                if let JSXAttributeName::Identifier(id) = &attr.name {
                    if id.name == "store" {
                        if let Some(JSXAttributeValue::ExpressionContainer(container)) = &attr.value
                        {
                            if let Some(Expression::Identifier(ident)) =
                                container.expression.as_expression()
                            {
                                self.out.store_name = Some(ident.name.to_string());
                            }
                        }
                    }
                }
            }
        }
    }

    /// Records a custom component usage; returns true when the tag is a
    /// known import.
    fn record_component_usage(&mut self, name: &str) -> bool {
        let Some(binding) = self.imports.get(name) else {
            return false;
        };
        // the component package ships with the runtime; the host has
        // nothing to resolve for it
        if binding.source == crate::constants::COMPONENTS_PACKAGE {
            return true;
        }
        let usage_name = kebab_case(name);
        if !self.out.components.iter().any(|c| c.name == usage_name) {
            self.out.components.push(ComponentUsage {
                name: usage_name,
                source: binding.source.clone(),
                is_default_import: binding.is_default,
            });
        }
        true
    }

    // ── refs ──────────────────────────────────────────────────────────

    fn lower_ref(
        &mut self,
        value: Option<&JSXAttributeValue>,
        is_component: bool,
        span: Span,
    ) -> Result<Attribute, CompilerError> {
        let kind = if is_component {
            RefKind::Component
        } else {
            RefKind::Node
        };
        let in_loop = !self.loop_stack.is_empty();

        let by_name = |this: &mut Self, ref_name: &str| -> Result<Attribute, CompilerError> {
            if in_loop {
                return Err(this
                    .err(
                        ERR_REF_STRING_IN_LOOP,
                        "refs inside a loop must use a callback",
                        span,
                    )
                    .with_hint("use `ref={(node) => …}` so each iteration gets its own handle"));
            }
            let id = this.names.next_ref_id();
            this.out.refs.push(RefDescriptor {
                kind,
                id: id.clone(),
                ref_name: ref_name.to_string(),
                fn_expr: None,
                loop_index: None,
            });
            Ok(Attribute::fixed("id", id))
        };

        match value {
            Some(JSXAttributeValue::StringLiteral(lit)) => by_name(self, lit.value.as_str()),
            Some(JSXAttributeValue::ExpressionContainer(container)) => {
                let Some(expr) = container.expression.as_expression() else {
                    return Err(self.err(ERR_REF_INVALID, "empty ref value", span));
                };
                match unparenthesized(expr) {
                    Expression::StringLiteral(lit) => by_name(self, lit.value.as_str()),
                    Expression::Identifier(id) => by_name(self, id.name.as_str()),
                    callback @ (Expression::ArrowFunctionExpression(_)
                    | Expression::FunctionExpression(_)
                    | Expression::StaticMemberExpression(_)) => {
                        let fn_code = self.code_slice(callback.span());
                        let id = self.names.next_ref_id();
                        if in_loop {
                            let scope = self
                                .loop_stack
                                .last()
                                .filter(|s| s.index.is_some())
                                .ok_or_else(|| {
                                    self.err(
                                        ERR_REF_LOOP_NO_INDEX,
                                        "a callback ref inside a loop needs the loop's index parameter",
                                        span,
                                    )
                                    .with_hint("declare the second `.map()` callback parameter")
                                })?;
                            let index = scope.index.clone().unwrap_or_default();
                            self.out.refs.push(RefDescriptor {
                                kind,
                                id: id.clone(),
                                ref_name: String::new(),
                                fn_expr: Some(fn_code),
                                loop_index: Some(index.clone()),
                            });
                            Ok(Attribute::bound("id", format!("'{}' + {}", id, index)))
                        } else {
                            self.out.refs.push(RefDescriptor {
                                kind,
                                id: id.clone(),
                                ref_name: String::new(),
                                fn_expr: Some(fn_code),
                                loop_index: None,
                            });
                            Ok(Attribute::fixed("id", id))
                        }
                    }
                    _ => Err(self
                        .err(
                            ERR_REF_INVALID,
                            "ref values must be a string, identifier, arrow function or method",
                            span,
                        )
                        .with_hint("move the ref logic into a class method")),
                }
            }
            _ => Err(self.err(ERR_REF_INVALID, "ref needs a value", span)),
        }
    }

    // ── events ────────────────────────────────────────────────────────

    fn resolve_event_handler(
        &mut self,
        attr_name: &str,
        value: Option<&JSXAttributeValue>,
        span: Span,
    ) -> Result<String, CompilerError> {
        let unresolved = |this: &Self, detail: &str| {
            this.err(
                ERR_EVENT_UNRESOLVED,
                format!("`{attr_name}` does not resolve to a stable handler: {detail}"),
                span,
            )
            .with_hint("bind to a class method or a props function")
        };

        let Some(JSXAttributeValue::ExpressionContainer(container)) = value else {
            return Err(unresolved(self, "the value is not an expression"));
        };
        let Some(expr) = container.expression.as_expression() else {
            return Err(unresolved(self, "the value is empty"));
        };
        let expr = unparenthesized(expr);

        // `this.method.bind(this, …)` keeps the method as the handler
        if let Expression::CallExpression(call) = expr {
            if let Some(chain) = member_chain(&call.callee) {
                if chain.len() >= 3 && chain[0] == "this" && chain[chain.len() - 1] == "bind" {
                    let inner = &chain[1..chain.len() - 1];
                    if inner.first() == Some(&"props") {
                        // arguments after the receiver stay bound ahead of
                        // the event payload
                        let bound = self.bind_arguments(call);
                        return Ok(self.register_proxy(attr_name, &inner[1..].join("."), bound));
                    }
                    let handler = inner.join(".");
                    self.push_event(&handler);
                    return Ok(handler);
                }
            }
            return Err(unresolved(self, "calls cannot be used as handlers"));
        }

        if let Some(chain) = member_chain(expr) {
            return match chain.as_slice() {
                ["this", "props", path @ ..] if !path.is_empty() => {
                    Ok(self.register_proxy(attr_name, &path.join("."), None))
                }
                ["this", method] => {
                    self.push_event(method);
                    Ok(method.to_string())
                }
                [single] => {
                    if let Some(path) = self.aliases.get(*single).cloned() {
                        Ok(self.register_proxy(attr_name, &path, None))
                    } else if self.method_names.contains(*single) {
                        self.push_event(single);
                        Ok(single.to_string())
                    } else {
                        Err(unresolved(self, "the identifier is not a class method or props alias"))
                    }
                }
                _ => Err(unresolved(self, "only class methods and props paths are supported")),
            };
        }

        Err(unresolved(self, "inline functions are not supported"))
    }

    fn push_event(&mut self, name: &str) {
        if !self.out.events.iter().any(|e| e == name) {
            self.out.events.push(name.to_string());
        }
    }

    /// Source text of the arguments a `.bind(this, …)` handler carries
    /// past the receiver, with any recorded rewrites applied.
    fn bind_arguments(&self, call: &CallExpression) -> Option<String> {
        let texts: Vec<String> = call
            .arguments
            .iter()
            .skip(1)
            .map(|arg| self.code_slice(arg.span()))
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.join(", "))
        }
    }

    /// Memoized dispatch proxy for an attribute-position props function.
    fn register_proxy(&mut self, attr_name: &str, path: &str, bound_args: Option<String>) -> String {
        self.props.add(&format!("__fn_{}", attr_name));
        if let Some(tail) = path.rsplit('.').next() {
            if tail != attr_name {
                self.props.add(&format!("__fn_{}", tail));
            }
            self.props.add(path.split('.').next().unwrap_or(tail));
        }
        if let Some(proxy) = self
            .out
            .proxies
            .iter()
            .find(|p| p.path == path && p.bound_args == bound_args)
        {
            let name = proxy.name.clone();
            self.push_event(&name);
            return name;
        }
        let name = self.names.next_fun_private();
        self.out.proxies.push(DispatchProxy {
            path: path.to_string(),
            name: name.clone(),
            bound_args,
        });
        self.push_event(&name);
        name
    }

    // ── loops ─────────────────────────────────────────────────────────

    fn lower_loop(
        &mut self,
        call: &'ast CallExpression<'ast>,
    ) -> Result<Vec<TemplateNode>, CompilerError> {
        let Expression::StaticMemberExpression(callee) = &call.callee else {
            unreachable!("is_markup_loop checked the callee shape");
        };
        let source_expr = &callee.object;
        let callback = loop_callback(call).ok_or_else(|| {
            self.err(
                ERR_ATTR_UNSUPPORTED,
                "a markup-producing `.map()` needs an inline callback",
                call.span,
            )
        })?;

        let item = callback_param(callback, 0).unwrap_or_else(|| "item".to_string());
        let index = callback_param(callback, 1);

        let derived = !is_template_expressible(source_expr);
        let source_code = self.code_slice(source_expr.span());
        let callee_binding = if derived {
            let name = self.names.next_callee();
            let decl = format!("const {} = {};", name, source_code);
            self.route_decl(&name, decl);
            Some(name)
        } else {
            None
        };

        self.loop_stack.push(LoopScope {
            item: item.clone(),
            index: index.clone(),
            pending: Vec::new(),
            exports: Vec::new(),
            needs_snapshot: derived,
        });

        // per-item statements ahead of the markup return
        let result = (|| -> Result<(Vec<TemplateNode>, Option<String>), CompilerError> {
            let mut key_expr_code = None;
            let mut body_nodes = Vec::new();
            for stmt in &callback.body.statements {
                match stmt {
                    Statement::ReturnStatement(ret) => {
                        if let Some(arg) = &ret.argument {
                            let arg = unparenthesized(arg);
                            if let Expression::JSXElement(element) = arg {
                                key_expr_code = self.take_loop_key(element);
                            }
                            body_nodes = self.lower_child_expr(arg)?;
                        }
                    }
                    Statement::ExpressionStatement(expr_stmt)
                        if callback.expression && contains_jsx(&expr_stmt.expression) =>
                    {
                        if let Expression::JSXElement(element) =
                            unparenthesized(&expr_stmt.expression)
                        {
                            key_expr_code = self.take_loop_key(element);
                        }
                        body_nodes = self.lower_child_expr(&expr_stmt.expression)?;
                    }
                    Statement::VariableDeclaration(decl) => {
                        let mut names = Vec::new();
                        for declarator in &decl.declarations {
                            crate::ast_util::local_binding_names(&declarator.id, &mut names);
                        }
                        let text = self.code_slice(stmt.span());
                        let scope = self.loop_stack.last_mut().unwrap_or_else(|| unreachable!());
                        scope.needs_snapshot = true;
                        scope.pending.push(text);
                        scope.exports.extend(names);
                    }
                    other => {
                        let text = self.code_slice(other.span());
                        let scope = self.loop_stack.last_mut().unwrap_or_else(|| unreachable!());
                        scope.pending.push(text);
                    }
                }
            }
            Ok((body_nodes, key_expr_code))
        })();

        let scope = self.loop_stack.pop().unwrap_or_else(|| unreachable!());
        let (mut body_nodes, key_expr_code) = result?;

        let snapshot = scope.needs_snapshot;
        let snapshot_key = self.adapter.snapshot_key();

        let (template_source, loop_decl) = if snapshot {
            let loop_name = self.names.next_loop_array();
            let src = callee_binding.unwrap_or(source_code);
            let params = match &index {
                Some(idx) => format!("({}, {})", item, idx),
                None => format!("({})", item),
            };
            let mut returned = format!("{}: {}", snapshot_key, item);
            for export in &scope.exports {
                returned.push_str(&format!(",\n    {}: {}", export, export));
            }
            let mut body = String::new();
            for pending in &scope.pending {
                body.push_str("  ");
                body.push_str(pending);
                body.push('\n');
            }
            let decl = format!(
                "const {} = {}.map({} => {{\n{}  return {{\n    {}\n  }};\n}});",
                loop_name, src, params, body, returned
            );
            // item reads in the template go through the snapshot key
            let replacement = format!("{}.{}", item, snapshot_key);
            rewrite_item_refs(&mut body_nodes, &item, &replacement, &scope.exports);
            (loop_name, Some(decl))
        } else {
            (self.template_code(&source_code), None)
        };

        if let Some(decl) = loop_decl {
            let name = template_source.clone();
            self.route_decl(&name, decl);
        }

        let key = match key_expr_code {
            Some(code) => code,
            None => "index".to_string(),
        };

        Ok(vec![TemplateNode::Loop(LoopNode {
            source: template_source,
            item,
            index,
            key,
            children: body_nodes,
        })])
    }

    /// Reads the `key` attribute off a loop's root element. Member keys
    /// collapse to the path below the item; non-member keys hoist.
    fn take_loop_key(&mut self, element: &JSXElement) -> Option<String> {
        for item in &element.opening_element.attributes {
            let JSXAttributeItem::Attribute(attr) = item else {
                continue;
            };
            let JSXAttributeName::Identifier(id) = &attr.name else {
                continue;
            };
            if id.name != "key" {
                continue;
            }
            let scope_item = self.loop_stack.last().map(|s| s.item.clone());
            let scope_index = self.loop_stack.last().and_then(|s| s.index.clone());
            match &attr.value {
                Some(JSXAttributeValue::ExpressionContainer(container)) => {
                    let expr = container.expression.as_expression()?;
                    let expr = unparenthesized(expr);
                    if !key_needs_hoist(expr) {
                        if let Some(chain) = member_chain(expr) {
                            let chain: Vec<String> =
                                chain.iter().map(|s| s.to_string()).collect();
                            if scope_item.as_deref() == Some(chain[0].as_str()) {
                                if chain.len() == 1 {
                                    return Some("*this".to_string());
                                }
                                return Some(chain[1..].join("."));
                            }
                            if scope_index.as_deref() == Some(chain[0].as_str()) {
                                return Some("index".to_string());
                            }
                            return Some(chain.join("."));
                        }
                    }
                    let raw = self.code_slice(expr.span());
                    return Some(self.hoist(raw));
                }
                Some(JSXAttributeValue::StringLiteral(lit)) => {
                    return Some(lit.value.to_string());
                }
                _ => return None,
            }
        }
        None
    }

    // ── hoisting and template code ────────────────────────────────────

    /// Hoists complex code into an anonymous binding and returns the
    /// template reference to it.
    fn hoist(&mut self, code: String) -> String {
        let name = self.names.next_temp();
        let decl = format!("const {} = {};", name, code);
        self.route_decl(&name, decl)
    }

    /// Routes a declaration either into the enclosing loop (when it
    /// reads the loop item/index) or into the trailing hoist block.
    /// Returns the template-side reference for the bound name.
    fn route_decl(&mut self, name: &str, decl: String) -> String {
        for scope in self.loop_stack.iter_mut().rev() {
            let hits_item = references_ident(&decl, &scope.item)
                || scope
                    .index
                    .as_deref()
                    .map(|idx| references_ident(&decl, idx))
                    .unwrap_or(false)
                || scope.exports.iter().any(|e| references_ident(&decl, e));
            if hits_item {
                scope.needs_snapshot = true;
                scope.pending.push(decl);
                scope.exports.push(name.to_string());
                return format!("{}.{}", scope.item, name);
            }
        }
        self.out.hoist_decls.push(decl);
        self.out.assigned.push(name.to_string());
        name.to_string()
    }

    /// Rewrites a raw expression slice into template scope: strips the
    /// `this.state.` / `this.props.` / `this.` prefixes, routes loop
    /// exports through the item, and records bare identifiers the
    /// template will need from data.
    fn template_code(&mut self, raw: &str) -> String {
        let mut code = raw.trim().to_string();
        // slices arrive with the `_createData` view names already in
        // place; the raw forms are kept for spans no edit touched
        code = code.replace("this.__state.", "");
        code = code.replace("this.__props.", "");
        code = code.replace("this.state.", "");
        code = code.replace("this.props.", "");
        code = code.replace("this.", "");

        let idents = scan_root_idents(&code);
        let mut rewritten = String::with_capacity(code.len());
        let mut cursor = 0;
        for (start, end) in idents {
            rewritten.push_str(&code[cursor..start]);
            let ident = &code[start..end];
            let mut replaced = false;
            for scope in self.loop_stack.iter().rev() {
                if scope.exports.iter().any(|e| e == ident) {
                    rewritten.push_str(&format!("{}.{}", scope.item, ident));
                    replaced = true;
                    break;
                }
            }
            if !replaced {
                rewritten.push_str(ident);
                let is_loop_var = self.loop_stack.iter().any(|s| {
                    s.item == ident || s.index.as_deref() == Some(ident)
                });
                if !is_loop_var && !is_reserved_word(ident) {
                    if !self.out.used_names.iter().any(|n| n == ident) {
                        self.out.used_names.push(ident.to_string());
                    }
                }
            }
            cursor = end;
        }
        rewritten.push_str(&code[cursor..]);
        rewritten
    }
}

// ── free helpers ──────────────────────────────────────────────────────

fn jsx_name<'b>(name: &'b JSXElementName<'b>) -> Option<&'b str> {
    match name {
        JSXElementName::Identifier(id) => Some(id.name.as_str()),
        JSXElementName::IdentifierReference(id) => Some(id.name.as_str()),
        _ => None,
    }
}

fn assignment_target_name<'b>(
    assign: &'b oxc_ast::ast::AssignmentExpression<'b>,
) -> Option<&'b str> {
    match &assign.left {
        oxc_ast::ast::AssignmentTarget::AssignmentTargetIdentifier(id) => Some(id.name.as_str()),
        _ => None,
    }
}

/// `xs.map(cb)` where the callback produces markup.
fn is_markup_loop(call: &CallExpression) -> bool {
    let Expression::StaticMemberExpression(callee) = &call.callee else {
        return false;
    };
    if callee.property.name != "map" {
        return false;
    }
    loop_callback(call)
        .map(|cb| cb.body.statements.iter().any(statement_contains_jsx))
        .unwrap_or(false)
}

fn loop_callback<'a, 'b>(call: &'a CallExpression<'b>) -> Option<&'a ArrowFunctionExpression<'b>> {
    match call.arguments.first()?.as_expression()? {
        Expression::ArrowFunctionExpression(arrow) => Some(arrow),
        _ => None,
    }
}

fn callback_param(callback: &ArrowFunctionExpression, n: usize) -> Option<String> {
    let param = callback.params.items.get(n)?;
    match &param.pattern {
        oxc_ast::ast::BindingPattern::BindingIdentifier(id) => Some(id.name.to_string()),
        _ => None,
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn is_reserved_word(word: &str) -> bool {
    matches!(
        word,
        "true" | "false" | "null" | "undefined" | "this" | "typeof" | "in" | "of" | "new"
    )
}

/// Whether `code` contains `name` as a standalone identifier (not a
/// property access and not a fragment of a longer name).
pub(crate) fn references_ident(code: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    scan_root_idents(code)
        .into_iter()
        .any(|(start, end)| &code[start..end] == name)
}

/// Byte ranges of root identifiers in an expression string, skipping
/// string literal contents and property names after `.`.
fn scan_root_idents(code: &str) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let bytes = code.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c == '\'' || c == '"' || c == '`' {
            let quote = c;
            i += 1;
            while i < bytes.len() && bytes[i] as char != quote {
                if bytes[i] == b'\\' {
                    i += 1;
                }
                i += 1;
            }
            i += 1;
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < bytes.len() && is_ident_char(bytes[i] as char) {
                i += 1;
            }
            let preceded_by_dot = start > 0 && bytes[start - 1] == b'.';
            if !preceded_by_dot && !(bytes[start] as char).is_ascii_digit() {
                out.push((start, i));
            }
            continue;
        }
        i += 1;
    }
    out
}

/// After a loop is marked as snapshotted, item reads already lowered in
/// its body must go through the snapshot key. Export references
/// (`item.tempN`) stay as they are.
fn rewrite_item_refs(
    nodes: &mut [TemplateNode],
    item: &str,
    replacement: &str,
    exports: &[String],
) {
    let rewrite = |code: &mut String| {
        let ranges = scan_root_idents(code);
        let mut rewritten = String::with_capacity(code.len());
        let mut cursor = 0;
        for (start, end) in ranges {
            rewritten.push_str(&code[cursor..start]);
            let ident = &code[start..end];
            if ident == item {
                let next_segment = code[end..]
                    .strip_prefix('.')
                    .map(|rest| {
                        rest.chars()
                            .take_while(|c| is_ident_char(*c))
                            .collect::<String>()
                    })
                    .unwrap_or_default();
                if exports.iter().any(|e| *e == next_segment) {
                    rewritten.push_str(ident);
                } else {
                    rewritten.push_str(replacement);
                }
            } else {
                rewritten.push_str(ident);
            }
            cursor = end;
        }
        rewritten.push_str(&code[cursor..]);
        *code = rewritten;
    };

    for node in nodes {
        match node {
            TemplateNode::Expression(expr) => rewrite(&mut expr.code),
            TemplateNode::Element(element) => {
                for attr in &mut element.attributes {
                    if let Some(AttributeValue::Dynamic { expr }) = &mut attr.value {
                        rewrite(expr);
                    }
                }
                rewrite_item_refs(&mut element.children, item, replacement, exports);
            }
            TemplateNode::Conditional(cond) => {
                for branch in &mut cond.branches {
                    rewrite(&mut branch.condition);
                    rewrite_item_refs(&mut branch.children, item, replacement, exports);
                }
                rewrite_item_refs(&mut cond.else_children, item, replacement, exports);
            }
            TemplateNode::Loop(inner) => {
                rewrite(&mut inner.source);
                rewrite_item_refs(&mut inner.children, item, replacement, exports);
            }
            TemplateNode::Text(_) | TemplateNode::Slot(_) => {}
        }
    }
}
