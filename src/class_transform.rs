//! Class transformation.
//!
//! Rewrites the component class in place through span edits:
//! - template literals become `+` concatenation chains,
//! - event-prop calls become `__triggerPropsFn` dispatches,
//! - the constructor is normalized and renamed,
//! - `render` is replaced by `_createData`,
//! - metadata (`static properties`, `static $$events`, `$usedState`,
//!   `$$refs`, proxies, `multipleSlots`) is appended to the class body.

use std::collections::{HashMap, HashSet};

use oxc_ast::ast::{
    Class, ClassElement, Expression, Function, MethodDefinitionKind, ObjectPropertyKind,
    StaticMemberExpression, TaggedTemplateExpression, TemplateLiteral,
};
use oxc_ast_visit::{walk, Visit};
use oxc_span::{GetSpan, Span};

use crate::ast_util::{member_chain, prop_key_name, slice, EditList};
use crate::constants::{EVENT_NAME_RE, SLOT_PROP_RE, TRIGGER_PROPS_FN};
use crate::error::{CompilerError, ERR_RENDER_MISSING};
use crate::ir::{ComponentUsage, PropertySet, RefDescriptor, RefKind, TemplateNode};
use crate::options::CompileOptions;
use crate::props::collect_class_properties;
use crate::render::{ImportBinding, NameGen, RenderLowerer};

/// Everything the compile entry needs after the class is rewritten.
#[derive(Debug)]
pub struct ClassArtifacts {
    pub edits: EditList,
    pub nodes: Vec<TemplateNode>,
    pub components: Vec<ComponentUsage>,
    pub refs: Vec<RefDescriptor>,
    pub image_sources: Vec<String>,
    pub used_state: Vec<String>,
    pub properties: Vec<String>,
    pub store_name: Option<String>,
}

pub fn transform_class<'ast>(
    class: &'ast Class<'ast>,
    source: &str,
    options: &CompileOptions,
    imports: &HashMap<String, ImportBinding>,
    names: &mut NameGen,
    inherited_props: &[String],
) -> Result<ClassArtifacts, CompilerError> {
    let file = options.source_path.as_str();

    let mut method_names = HashSet::new();
    let mut render_fn: Option<&Function> = None;
    let mut render_span = None;
    let mut constructor: Option<(&Function, Span)> = None;
    let mut init_state: Vec<String> = Vec::new();

    for element in &class.body.body {
        match element {
            ClassElement::MethodDefinition(method) => {
                let name = prop_key_name(&method.key).unwrap_or("").to_string();
                if method.kind == MethodDefinitionKind::Constructor {
                    constructor = Some((&*method.value, method.key.span()));
                    collect_ctor_state_keys(&method.value, &mut init_state);
                    continue;
                }
                if name == "render" {
                    render_fn = Some(&*method.value);
                    render_span = Some(method.span());
                }
                method_names.insert(name);
            }
            ClassElement::PropertyDefinition(prop) => {
                let name = prop_key_name(&prop.key).unwrap_or("").to_string();
                match &prop.value {
                    Some(Expression::ArrowFunctionExpression(_))
                    | Some(Expression::FunctionExpression(_)) => {
                        method_names.insert(name);
                    }
                    Some(Expression::ObjectExpression(obj)) if name == "state" => {
                        collect_object_keys(obj, &mut init_state);
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    let (render_fn, render_span) = match (render_fn, render_span) {
        (Some(f), Some(s)) => (f, s),
        _ => {
            return Err(CompilerError::at_offset(
                ERR_RENDER_MISSING,
                "the component class has no render method",
                source,
                class.span.start,
                file,
            ))
        }
    };

    let mut edits = EditList::new();

    // template literals first so later slices see the concat form
    let mut literal_rewriter = TemplateLiteralRewriter {
        source,
        edits: &mut edits,
    };
    literal_rewriter.visit_class(class);

    // property collection before dispatch rewriting: dispatch adds
    // synthetic `__fn_` names on top of the observed set
    let mut props = collect_class_properties(class, source, file)?;
    for inherited in inherited_props {
        props.add(inherited);
    }

    // `this.state` / `this.props` become the `_createData` views, but
    // only inside the render body. Recorded ahead of dispatch rewriting
    // so dispatch argument slices carry the rewritten members.
    if let Some(body) = &render_fn.body {
        let mut members = StateViewRewriter {
            edits: &mut edits,
            span: body.span,
        };
        for stmt in &body.statements {
            members.visit_statement(stmt);
        }
    }

    let mut dispatcher = DispatchRewriter {
        source,
        adapter: options.adapter,
        done: &edits,
        new_edits: Vec::new(),
        props: &mut props,
    };
    dispatcher.visit_class(class);
    let dispatch_edits = dispatcher.new_edits;
    for (span, text) in dispatch_edits {
        edits.replace(span, text);
    }

    rewrite_constructor(class, constructor, options, &mut edits);

    let mut artifacts = ClassArtifacts {
        edits: EditList::new(),
        nodes: Vec::new(),
        components: Vec::new(),
        refs: Vec::new(),
        image_sources: Vec::new(),
        used_state: Vec::new(),
        properties: Vec::new(),
        store_name: None,
    };

    let mut class_tail = String::new();

    if options.is_app {
        edits.replace(render_span, "_createData() {}");
    } else {
        let body = render_fn.body.as_ref().ok_or_else(|| {
            CompilerError::at_offset(
                ERR_RENDER_MISSING,
                "render has no body",
                source,
                render_span.start,
                file,
            )
        })?;
        let lowerer = RenderLowerer::new(
            source,
            file,
            options.adapter,
            &edits,
            names,
            imports,
            &method_names,
            &mut props,
        );
        let lowered = lowerer.lower(body)?;

        let assigned_extra: Vec<String> = lowered
            .used_names
            .iter()
            .filter(|name| {
                !init_state.iter().any(|k| k == *name)
                    && !props.contains(name)
                    && !method_names.contains(*name)
                    && !SLOT_PROP_RE.is_match(name)
                    && !lowered.assigned.iter().any(|a| a == *name)
            })
            .cloned()
            .collect();

        let create_data = build_create_data(&lowered.body, &lowered.hoist_decls, {
            let mut all = lowered.assigned.clone();
            all.extend(assigned_extra.clone());
            all
        });
        edits.replace(render_span, create_data);

        // $usedState covers everything the template can read
        let mut used_state: Vec<String> = Vec::new();
        let mut push_used = |name: &str| {
            if !used_state.iter().any(|u| u == name) {
                used_state.push(name.to_string());
            }
        };
        for name in lowered.assigned.iter().chain(assigned_extra.iter()) {
            push_used(name);
        }
        for name in &lowered.used_names {
            push_used(name);
        }
        for key in &init_state {
            push_used(key);
        }
        for name in props.iter() {
            push_used(name);
        }

        if lowered.multiple_slots {
            class_tail.push_str("\n  static multipleSlots = true;\n");
        }
        for proxy in &lowered.proxies {
            let args = match &proxy.bound_args {
                Some(bound) => format!("[{}, ...arguments]", bound),
                None => "[...arguments]".to_string(),
            };
            class_tail.push_str(&format!(
                "\n  {}() {{\n    this.{}(\"{}\", {});\n  }}\n",
                proxy.name, TRIGGER_PROPS_FN, proxy.path, args
            ));
        }
        if !lowered.events.is_empty() {
            let list = lowered
                .events
                .iter()
                .map(|e| format!("\"{}\"", e))
                .collect::<Vec<_>>()
                .join(", ");
            class_tail.push_str(&format!("\n  static $$events = [{}];\n", list));
        }
        if !lowered.refs.is_empty() {
            class_tail.push_str("\n  $$refs = [");
            for (i, r) in lowered.refs.iter().enumerate() {
                if i > 0 {
                    class_tail.push_str(", ");
                }
                let kind = match r.kind {
                    RefKind::Node => "node",
                    RefKind::Component => "component",
                };
                let fn_text = r.fn_expr.as_deref().unwrap_or("null");
                class_tail.push_str(&format!(
                    "{{\n    type: \"{}\",\n    id: \"{}\",\n    refName: \"{}\",\n    fn: {}\n  }}",
                    kind, r.id, r.ref_name, fn_text
                ));
            }
            class_tail.push_str("];\n");
        }
        if !used_state.is_empty() {
            let list = used_state
                .iter()
                .map(|u| format!("\"{}\"", u))
                .collect::<Vec<_>>()
                .join(", ");
            class_tail.push_str(&format!("\n  $usedState = [{}];\n", list));
        }

        artifacts.nodes = lowered.nodes;
        artifacts.components = lowered.components;
        artifacts.refs = lowered.refs;
        artifacts.image_sources = lowered.image_sources;
        artifacts.used_state = used_state;
        artifacts.store_name = lowered.store_name;
    }

    if !props.is_empty() {
        let mut block = String::from("\n  static properties = {");
        for (i, name) in props.iter().enumerate() {
            if i > 0 {
                block.push(',');
            }
            block.push_str(&format!(
                "\n    \"{}\": {{\n      \"type\": null,\n      \"value\": null\n    }}",
                name
            ));
        }
        block.push_str("\n  };\n");
        class_tail.push_str(&block);
    }

    if !class_tail.is_empty() {
        // before the class body's closing brace
        edits.insert(class.body.span.end - 1, class_tail);
    }

    artifacts.properties = props.clone().into_names();
    artifacts.edits = edits;
    Ok(artifacts)
}

fn build_create_data(body: &[String], hoists: &[String], assigned: Vec<String>) -> String {
    let mut out = String::from("_createData() {\n");
    out.push_str("    this.__state = arguments[0] || this.state || {};\n");
    out.push_str("    this.__props = arguments[1] || this.props || {};\n");
    for stmt in body {
        out.push_str("    ");
        out.push_str(stmt);
        out.push('\n');
    }
    for decl in hoists {
        out.push_str("    ");
        out.push_str(decl);
        out.push('\n');
    }
    if !assigned.is_empty() {
        out.push_str("    Object.assign(this.__state, {\n");
        for (i, name) in assigned.iter().enumerate() {
            out.push_str(&format!(
                "      {}: {}{}\n",
                object_key(name),
                name,
                if i + 1 == assigned.len() { "" } else { "," }
            ));
        }
        out.push_str("    });\n");
    }
    out.push_str("    return this.__state;\n  }");
    out
}

/// Quotes names that are not plain identifiers (`$anonymousCallee__0`
/// is fine, but a dotted name would not be).
fn object_key(name: &str) -> String {
    let plain = name
        .chars()
        .enumerate()
        .all(|(i, c)| c == '_' || c == '$' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit()));
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name)
    }
}

fn collect_ctor_state_keys(ctor: &Function, keys: &mut Vec<String>) {
    let Some(body) = &ctor.body else { return };
    for stmt in &body.statements {
        if let oxc_ast::ast::Statement::ExpressionStatement(expr_stmt) = stmt {
            if let Expression::AssignmentExpression(assign) = &expr_stmt.expression {
                if let oxc_ast::ast::AssignmentTarget::StaticMemberExpression(target) =
                    &assign.left
                {
                    let is_state = matches!(&target.object, Expression::ThisExpression(_))
                        && target.property.name == "state";
                    if is_state {
                        if let Expression::ObjectExpression(obj) = &assign.right {
                            collect_object_keys(obj, keys);
                        }
                    }
                }
            }
        }
    }
}

fn collect_object_keys(obj: &oxc_ast::ast::ObjectExpression, keys: &mut Vec<String>) {
    for prop in &obj.properties {
        if let ObjectPropertyKind::ObjectProperty(p) = prop {
            if let Some(name) = prop_key_name(&p.key) {
                if !keys.iter().any(|k| k == name) {
                    keys.push(name.to_string());
                }
            }
        }
    }
}

/// Synthesizes or renames the constructor. The rename is suppressed in
/// test mode so fixtures keep their original shape.
fn rewrite_constructor(
    class: &Class,
    constructor: Option<(&Function, Span)>,
    options: &CompileOptions,
    edits: &mut EditList,
) {
    match constructor {
        Some((ctor, key_span)) => {
            if options.test_mode {
                return;
            }
            edits.replace(key_span, "_constructor");
            if let Some(body) = &ctor.body {
                let mut rewriter = SuperRewriter { edits };
                for stmt in &body.statements {
                    rewriter.visit_statement(stmt);
                }
            }
        }
        None => {
            let name = if options.test_mode {
                "constructor"
            } else {
                "_constructor"
            };
            // `super` is only legal under an `extends` clause
            let body = if class.super_class.is_none() {
                String::new()
            } else if options.test_mode {
                "\n    super(props);\n  ".to_string()
            } else {
                "\n    super._constructor(props);\n  ".to_string()
            };
            edits.insert(
                class.body.span.start + 1,
                format!("\n  {}(props) {{{}}}\n", name, body),
            );
        }
    }
}

struct SuperRewriter<'a> {
    edits: &'a mut EditList,
}

impl<'a, 'ast> Visit<'ast> for SuperRewriter<'a> {
    fn visit_call_expression(&mut self, call: &oxc_ast::ast::CallExpression<'ast>) {
        if let Expression::Super(sup) = &call.callee {
            self.edits.replace(sup.span, "super._constructor");
        }
        walk::walk_call_expression(self, call);
    }
}

struct TemplateLiteralRewriter<'a, 's> {
    source: &'s str,
    edits: &'a mut EditList,
}

impl<'a, 's, 'ast> Visit<'ast> for TemplateLiteralRewriter<'a, 's> {
    fn visit_template_literal(&mut self, literal: &TemplateLiteral<'ast>) {
        let text = template_literal_concat(self.source, literal);
        self.edits.replace(literal.span, text);
        walk::walk_template_literal(self, literal);
    }

    fn visit_tagged_template_expression(&mut self, _expr: &TaggedTemplateExpression<'ast>) {
        // tagged templates keep their call semantics
    }
}

/// `` `a${b}c` `` → `"a" + b + "c"`; a leading `''` keeps the chain a
/// string concatenation when the first two operands are not literals.
fn template_literal_concat(source: &str, literal: &TemplateLiteral) -> String {
    let mut parts: Vec<(String, bool)> = Vec::new();
    let mut expressions = literal.expressions.iter();
    for (i, quasi) in literal.quasis.iter().enumerate() {
        let raw = quasi
            .value
            .cooked
            .as_ref()
            .map(|c| c.as_str())
            .unwrap_or_else(|| quasi.value.raw.as_str());
        if !raw.is_empty() {
            parts.push((
                serde_json::to_string(raw).unwrap_or_else(|_| format!("\"{}\"", raw)),
                true,
            ));
        }
        if i < literal.quasis.len() - 1 {
            if let Some(expr) = expressions.next() {
                let text = match expr {
                    Expression::TemplateLiteral(inner) => template_literal_concat(source, inner),
                    other => slice(source, other.span()).to_string(),
                };
                parts.push((text, false));
            }
        }
    }
    match parts.len() {
        0 => "''".to_string(),
        1 if parts[0].1 => parts[0].0.clone(),
        _ => {
            let literal_lead = parts[0].1 || parts.get(1).map(|p| p.1).unwrap_or(false);
            let mut chain: Vec<String> = Vec::new();
            if !literal_lead {
                chain.push("''".to_string());
            }
            chain.extend(parts.into_iter().map(|(text, _)| text));
            chain.join(" + ")
        }
    }
}

struct DispatchRewriter<'a, 's> {
    source: &'s str,
    adapter: crate::options::Adapter,
    done: &'a EditList,
    new_edits: Vec<(Span, String)>,
    props: &'a mut PropertySet,
}

impl<'a, 's, 'ast> Visit<'ast> for DispatchRewriter<'a, 's> {
    fn visit_call_expression(&mut self, call: &oxc_ast::ast::CallExpression<'ast>) {
        if let Some(chain) = member_chain(&call.callee) {
            if chain.len() >= 3 && chain[0] == "this" && chain[1] == "props" {
                let mut path: Vec<&str> = chain[2..].to_vec();
                let mut invoke_kind = InvokeKind::Direct;
                if path.len() > 1 {
                    match *path.last().unwrap_or(&"") {
                        "call" => {
                            path.pop();
                            invoke_kind = InvokeKind::Call;
                        }
                        "apply" => {
                            path.pop();
                            invoke_kind = InvokeKind::Apply;
                        }
                        _ => {}
                    }
                }
                let event = path.last().copied().unwrap_or_default();
                // a `.call`/`.apply` tail proves the prop is invoked as a
                // function; direct calls need the event-name shape
                let dispatches = !matches!(invoke_kind, InvokeKind::Direct)
                    || EVENT_NAME_RE.is_match(event);
                if dispatches {
                    self.props.add(&format!("__fn_{}", event));
                    let args = self.argument_list(call, invoke_kind);
                    let packed = if self.adapter.shifts_dispatch_args() {
                        args
                    } else {
                        format!("[null].concat({})", args)
                    };
                    self.new_edits.push((
                        call.span,
                        format!(
                            "this.{}(\"{}\", {})",
                            TRIGGER_PROPS_FN,
                            path.join("."),
                            packed
                        ),
                    ));
                }
            }
        }
        walk::walk_call_expression(self, call);
    }
}

enum InvokeKind {
    Direct,
    /// `.call(thisArg, a, b)` — the bound receiver is dropped.
    Call,
    /// `.apply(thisArg, args)` — the argument array is passed through.
    Apply,
}

impl<'a, 's> DispatchRewriter<'a, 's> {
    fn argument_list(&self, call: &oxc_ast::ast::CallExpression, kind: InvokeKind) -> String {
        let texts: Vec<String> = call
            .arguments
            .iter()
            .map(|arg| {
                let span = arg.span();
                self.done.apply_range(self.source, span.start, span.end)
            })
            .collect();
        match kind {
            InvokeKind::Direct => format!("[{}]", texts.join(", ")),
            InvokeKind::Call => format!(
                "[{}]",
                texts.iter().skip(1).cloned().collect::<Vec<_>>().join(", ")
            ),
            InvokeKind::Apply => texts.get(1).cloned().unwrap_or_else(|| "[]".to_string()),
        }
    }
}

struct StateViewRewriter<'a> {
    edits: &'a mut EditList,
    span: Span,
}

impl<'a, 'ast> Visit<'ast> for StateViewRewriter<'a> {
    fn visit_static_member_expression(&mut self, member: &StaticMemberExpression<'ast>) {
        if matches!(&member.object, Expression::ThisExpression(_))
            && member.span.start >= self.span.start
            && member.span.end <= self.span.end
        {
            match member.property.name.as_str() {
                "props" => self.edits.replace(member.span, "this.__props"),
                "state" => self.edits.replace(member.span, "this.__state"),
                _ => {}
            }
        }
        walk::walk_static_member_expression(self, member);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_ast::ast::Statement;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn parse_and<F: FnOnce(&Class, &str)>(source: &str, check: F) {
        let allocator = Allocator::default();
        let source_type = SourceType::default().with_module(true).with_jsx(true);
        let ret = Parser::new(&allocator, source, source_type).parse();
        assert!(ret.errors.is_empty(), "fixture failed to parse");
        for stmt in &ret.program.body {
            if let Statement::ClassDeclaration(class) = stmt {
                check(class, source);
                return;
            }
        }
        panic!("fixture has no class");
    }

    #[test]
    fn template_literal_concat_inserts_leading_empty_string() {
        let source = "const a = `${x}${y}`;";
        let allocator = Allocator::default();
        let source_type = SourceType::default().with_module(true);
        let ret = Parser::new(&allocator, source, source_type).parse();
        let Some(Statement::VariableDeclaration(decl)) = ret.program.body.first() else {
            panic!("no declaration");
        };
        let Some(Expression::TemplateLiteral(lit)) = &decl.declarations[0].init else {
            panic!("no template literal");
        };
        assert_eq!(template_literal_concat(source, lit), "'' + x + y");
    }

    #[test]
    fn template_literal_concat_keeps_literal_lead() {
        let source = "const a = `hahaha${x}`;";
        let allocator = Allocator::default();
        let source_type = SourceType::default().with_module(true);
        let ret = Parser::new(&allocator, source, source_type).parse();
        let Some(Statement::VariableDeclaration(decl)) = ret.program.body.first() else {
            panic!("no declaration");
        };
        let Some(Expression::TemplateLiteral(lit)) = &decl.declarations[0].init else {
            panic!("no template literal");
        };
        assert_eq!(template_literal_concat(source, lit), "\"hahaha\" + x");
    }

    #[test]
    fn dispatch_rewrites_event_prop_calls() {
        parse_and(
            "class A {\n  tick() {\n    this.props.c.onTick2();\n  }\n  render() { return null; }\n}",
            |class, source| {
                let done = EditList::new();
                let mut props = PropertySet::default();
                let mut rewriter = DispatchRewriter {
                    source,
                    adapter: crate::options::Adapter::Weapp,
                    done: &done,
                    new_edits: Vec::new(),
                    props: &mut props,
                };
                rewriter.visit_class(class);
                assert_eq!(rewriter.new_edits.len(), 1);
                assert_eq!(
                    rewriter.new_edits[0].1,
                    "this.__triggerPropsFn(\"c.onTick2\", [null].concat([]))"
                );
                assert!(props.contains("__fn_onTick2"));
            },
        );
    }

    #[test]
    fn call_and_apply_dispatch_without_event_names() {
        parse_and(
            "class A {\n  tick() {\n    this.props.save.call(this, 1);\n    this.props.persist.apply(this, [2]);\n  }\n  render() { return null; }\n}",
            |class, source| {
                let done = EditList::new();
                let mut props = PropertySet::default();
                let mut rewriter = DispatchRewriter {
                    source,
                    adapter: crate::options::Adapter::Weapp,
                    done: &done,
                    new_edits: Vec::new(),
                    props: &mut props,
                };
                rewriter.visit_class(class);
                assert_eq!(rewriter.new_edits.len(), 2);
                assert_eq!(
                    rewriter.new_edits[0].1,
                    "this.__triggerPropsFn(\"save\", [null].concat([1]))"
                );
                assert_eq!(
                    rewriter.new_edits[1].1,
                    "this.__triggerPropsFn(\"persist\", [null].concat([2]))"
                );
                assert!(props.contains("__fn_save"));
                assert!(props.contains("__fn_persist"));
            },
        );
    }

    #[test]
    fn baseless_class_constructor_skips_super() {
        parse_and(
            "class A {\n  render() { return <view/>; }\n}",
            |class, source| {
                let mut names = NameGen::default();
                let options = CompileOptions::new("fixture.jsx");
                let imports = HashMap::new();
                let artifacts =
                    transform_class(class, source, &options, &imports, &mut names, &[]).unwrap();
                let code = artifacts.edits.apply(source);
                assert!(code.contains("_constructor(props) {}"), "{}", code);
                assert!(!code.contains("super"), "{}", code);
            },
        );
    }

    #[test]
    fn alipay_drops_the_null_slot() {
        parse_and(
            "class A {\n  tick() {\n    this.props.onTick3(1, 2);\n  }\n  render() { return null; }\n}",
            |class, source| {
                let done = EditList::new();
                let mut props = PropertySet::default();
                let mut rewriter = DispatchRewriter {
                    source,
                    adapter: crate::options::Adapter::Alipay,
                    done: &done,
                    new_edits: Vec::new(),
                    props: &mut props,
                };
                rewriter.visit_class(class);
                assert_eq!(
                    rewriter.new_edits[0].1,
                    "this.__triggerPropsFn(\"onTick3\", [1, 2])"
                );
            },
        );
    }

    #[test]
    fn missing_render_is_fatal() {
        parse_and("class A {\n  componentDidMount() {}\n}", |class, source| {
            let mut names = NameGen::default();
            let options = CompileOptions::new("fixture.jsx");
            let imports = HashMap::new();
            let err =
                transform_class(class, source, &options, &imports, &mut names, &[]).unwrap_err();
            assert_eq!(err.code, ERR_RENDER_MISSING);
        });
    }
}
