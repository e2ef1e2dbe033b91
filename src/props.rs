//! Property collection.
//!
//! Builds the component's `PropertySet` from every place a prop can be
//! observed:
//! - `this.props.x` member reads anywhere in the class,
//! - object destructuring of `this.props`,
//! - lifecycle methods that receive props as a parameter (identifier
//!   params are scanned for `param.x` reads and one level of
//!   destructuring; object-pattern params contribute their names).
//!
//! Rest elements in props destructuring are a hard violation: the full
//! prop universe must be statically known.

use oxc_ast::ast::{
    BindingPattern, Class, ClassElement, Expression, Function, StaticMemberExpression,
    VariableDeclarator,
};
use oxc_ast_visit::{walk, Visit};
use oxc_span::GetSpan;

use crate::ast_util::{binding_names, member_chain, prop_key_name};
use crate::constants::{LIFECYCLE_METHODS, SLOT_PROP_RE};
use crate::error::{CompilerError, ERR_PROPS_REST};
use crate::ir::PropertySet;

pub fn collect_class_properties(
    class: &Class,
    source: &str,
    file: &str,
) -> Result<PropertySet, CompilerError> {
    let mut scanner = PropScanner {
        source,
        file,
        props_alias: None,
        props: PropertySet::default(),
        error: None,
    };

    for element in &class.body.body {
        match element {
            ClassElement::MethodDefinition(method) => {
                let name = prop_key_name(&method.key).unwrap_or("");
                scanner.scan_function(name, &method.value)?;
            }
            ClassElement::PropertyDefinition(prop) => {
                let name = prop_key_name(&prop.key).unwrap_or("");
                match &prop.value {
                    Some(Expression::ArrowFunctionExpression(arrow)) => {
                        scanner.props_alias = None;
                        for stmt in &arrow.body.statements {
                            scanner.visit_statement(stmt);
                        }
                        scanner.take_error()?;
                    }
                    Some(Expression::FunctionExpression(func)) => {
                        scanner.scan_function(name, func)?;
                    }
                    Some(value) => {
                        scanner.props_alias = None;
                        scanner.visit_expression(value);
                        scanner.take_error()?;
                    }
                    None => {}
                }
            }
            _ => {}
        }
    }

    Ok(scanner.props)
}

struct PropScanner<'s> {
    source: &'s str,
    file: &'s str,
    /// Identifier the current lifecycle method binds props to.
    props_alias: Option<String>,
    props: PropertySet,
    error: Option<CompilerError>,
}

impl<'s> PropScanner<'s> {
    fn scan_function(&mut self, name: &str, func: &Function) -> Result<(), CompilerError> {
        self.props_alias = None;
        if LIFECYCLE_METHODS.contains(name) {
            if let Some(param) = func.params.items.first() {
                match &param.pattern {
                    BindingPattern::BindingIdentifier(id) => {
                        self.props_alias = Some(id.name.to_string());
                    }
                    BindingPattern::ObjectPattern(_) => {
                        let mut names = Vec::new();
                        if !binding_names(&param.pattern, &mut names) {
                            return Err(self.rest_error(param.pattern.span().start));
                        }
                        for n in &names {
                            self.props.add(n);
                        }
                    }
                    _ => {}
                }
            }
        }
        if let Some(body) = &func.body {
            for stmt in &body.statements {
                self.visit_statement(stmt);
            }
        }
        self.take_error()
    }

    fn take_error(&mut self) -> Result<(), CompilerError> {
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn rest_error(&self, offset: u32) -> CompilerError {
        CompilerError::at_offset(
            ERR_PROPS_REST,
            "props cannot be rest-destructured; every prop name must be statically known",
            self.source,
            offset,
            self.file,
        )
        .with_hint("list each prop explicitly instead of using `...rest`")
    }

    /// True when `chain` denotes the props object itself.
    fn is_props_root(&self, chain: &[&str]) -> bool {
        match chain {
            ["this", "props"] => true,
            [single] => self.props_alias.as_deref() == Some(single),
            _ => false,
        }
    }
}

impl<'a, 's> Visit<'a> for PropScanner<'s> {
    fn visit_static_member_expression(&mut self, member: &StaticMemberExpression<'a>) {
        if let Some(chain) = member_chain(&member.object) {
            if self.is_props_root(&chain) {
                let name = member.property.name.as_str();
                // `children` and `render*` props lower to slots, not data
                if name != "children" && !SLOT_PROP_RE.is_match(name) {
                    self.props.add(name);
                }
            }
        }
        walk::walk_static_member_expression(self, member);
    }

    fn visit_variable_declarator(&mut self, decl: &VariableDeclarator<'a>) {
        if let (BindingPattern::ObjectPattern(_), Some(init)) = (&decl.id, &decl.init) {
            if let Some(chain) = member_chain(init) {
                if self.is_props_root(&chain) {
                    let mut names = Vec::new();
                    if binding_names(&decl.id, &mut names) {
                        for n in &names {
                            self.props.add(n);
                        }
                    } else if self.error.is_none() {
                        self.error = Some(self.rest_error(decl.id.span().start));
                    }
                }
            }
        }
        walk::walk_variable_declarator(self, decl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_ast::ast::Statement;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn collect(class_src: &str) -> Result<Vec<String>, CompilerError> {
        let allocator = Allocator::default();
        let source_type = SourceType::default().with_module(true).with_jsx(true);
        let ret = Parser::new(&allocator, class_src, source_type).parse();
        assert!(ret.errors.is_empty(), "fixture failed to parse");
        for stmt in &ret.program.body {
            if let Statement::ClassDeclaration(class) = stmt {
                return collect_class_properties(class, class_src, "fixture.jsx")
                    .map(|p| p.into_names());
            }
        }
        panic!("fixture has no class");
    }

    #[test]
    fn member_reads_and_destructuring_collect() {
        let props = collect(
            "class A {\n  render() {\n    const { key, children } = this.props;\n    return this.props.value;\n  }\n}",
        )
        .unwrap();
        assert_eq!(props, vec!["key", "children", "value"]);
    }

    #[test]
    fn slot_props_are_skipped_on_member_reads() {
        let props = collect(
            "class A {\n  render() {\n    return [this.props.children, this.props.renderHeader, this.props.title];\n  }\n}",
        )
        .unwrap();
        assert_eq!(props, vec!["title"]);
    }

    #[test]
    fn lifecycle_identifier_param_is_scanned_one_level() {
        let props = collect(
            "class A {\n  componentDidUpdate(props) {\n    console.log(props.arg1);\n    const { arg4, arg5 } = props;\n    const p = props;\n    console.log(p.arg6);\n  }\n  render() { return null; }\n}",
        )
        .unwrap();
        assert_eq!(props, vec!["arg1", "arg4", "arg5"]);
    }

    #[test]
    fn lifecycle_object_pattern_param_contributes_names() {
        let props = collect(
            "class A {\n  shouldComponentUpdate({ arg2, arg3 }) { return arg2 !== arg3; }\n  render() { return null; }\n}",
        )
        .unwrap();
        assert_eq!(props, vec!["arg2", "arg3"]);
    }

    #[test]
    fn rest_destructuring_is_rejected() {
        let err = collect(
            "class A {\n  render() {\n    const { a, ...rest } = this.props;\n    return null;\n  }\n}",
        )
        .unwrap_err();
        assert_eq!(err.code, ERR_PROPS_REST);
        assert_eq!(err.line, 3);
    }
}
