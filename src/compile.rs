//! Compile entry point.
//!
//! Orchestrates a single module compile:
//! 1. env substitution on the raw source,
//! 2. parse (module + JSX, TypeScript when requested),
//! 3. import indexing and component-class location,
//! 4. recursive inherited-base resolution,
//! 5. class transformation and template emission.
//!
//! Recursion state (visited files, depth) lives in a per-call context;
//! nothing is global, so concurrent compiles never interfere.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Class, Declaration, Expression, ExportDefaultDeclarationKind, ImportDeclarationSpecifier,
    ModuleExportName, Program, Statement,
};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};

use crate::class_transform::transform_class;
use crate::constants::{MOBX_PACKAGE, PLATFORM_ENV_KEY, REDUX_PACKAGE, RUNTIME_PACKAGE};
use crate::emit::{emit_compressed, emit_pretty};
use crate::error::{
    CompilerError, Warning, ERR_DUPLICATE_IMPORT, ERR_INHERITANCE_CYCLE, ERR_PARSE,
    ERR_RENDER_MISSING, WARN_BASE_UNRESOLVED, WARN_UNKNOWN_ADAPTER,
};
use crate::ir::TransformResult;
use crate::options::{Adapter, CompileOptions};
use crate::render::{ImportBinding, NameGen};

const MAX_INHERITANCE_DEPTH: usize = 8;

/// Compiles one component module into rewritten code plus a template.
pub fn compile(source: &str, options: &CompileOptions) -> Result<TransformResult, CompilerError> {
    let mut ctx = InheritanceContext::new(&options.source_path);
    compile_with_context(source, options, &mut ctx)
}

/// Maps an adapter name to the enum, degrading unknown names to the
/// default with a warning.
pub fn resolve_adapter(name: &str) -> (Adapter, Option<Warning>) {
    match Adapter::parse(name) {
        Some(adapter) => (adapter, None),
        None => (
            Adapter::default(),
            Some(Warning::new(
                WARN_UNKNOWN_ADAPTER,
                format!("unknown adapter \"{}\", defaulting to weapp", name),
            )),
        ),
    }
}

struct InheritanceContext {
    visited: HashSet<PathBuf>,
    depth: usize,
}

impl InheritanceContext {
    fn new(source_path: &str) -> Self {
        let mut visited = HashSet::new();
        visited.insert(normalize(Path::new(source_path)));
        InheritanceContext { visited, depth: 0 }
    }
}

fn normalize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn compile_with_context(
    source: &str,
    options: &CompileOptions,
    ctx: &mut InheritanceContext,
) -> Result<TransformResult, CompilerError> {
    let source = substitute_env(source, options);
    let file = options.source_path.as_str();

    let allocator = Allocator::default();
    let source_type = SourceType::default()
        .with_module(true)
        .with_jsx(true)
        .with_typescript(options.is_typed);
    let ret = Parser::new(&allocator, &source, source_type).parse();
    if let Some(first) = ret.errors.first() {
        return Err(CompilerError::at_offset(
            ERR_PARSE,
            first.to_string(),
            &source,
            0,
            file,
        ));
    }
    let program = ret.program;

    let index = index_imports(&program, &source, file)?;
    let class = find_component_class(&program).ok_or_else(|| {
        CompilerError::at_offset(
            ERR_RENDER_MISSING,
            "module does not declare a component class",
            &source,
            0,
            file,
        )
    })?;

    let mut warnings = Vec::new();
    let mut inherited_props = Vec::new();
    let mut base_components = Vec::new();
    let mut base_images = Vec::new();

    let mut super_ident: Option<(&str, Span)> = None;
    if let Some(Expression::Identifier(id)) = &class.super_class {
        super_ident = Some((id.name.as_str(), id.span));
    }

    if let Some((name, _)) = super_ident {
        if let Some(binding) = index.imports.get(name) {
            if binding.is_default && binding.source.starts_with('.') {
                match resolve_base(&source, options, &binding.source, ctx)? {
                    Some(base) => {
                        inherited_props = base.component_properties;
                        base_components = base.components;
                        base_images = base.image_sources;
                        warnings.extend(base.warnings);
                    }
                    None => warnings.push(Warning::new(
                        WARN_BASE_UNRESOLVED,
                        format!(
                            "base component \"{}\" could not be read next to {}",
                            binding.source, file
                        ),
                    )),
                }
            }
        }
    }

    let mut names = NameGen::default();
    let mut artifacts = transform_class(
        class,
        &source,
        options,
        &index.imports,
        &mut names,
        &inherited_props,
    )?;

    // runtime base class: keep the user's name working while the
    // rewritten class extends the framework base
    if let Some((name, span)) = super_ident {
        if index.runtime_component_local.as_deref() == Some(name) {
            if let Some(spec_span) = index.runtime_component_span {
                artifacts.edits.replace(spec_span, "Component as __BaseComponent");
            }
            artifacts.edits.replace(span, "__BaseComponent");
        }
    }

    if let Some(store) = &artifacts.store_name {
        if let Some(span) = index.provider_span {
            artifacts.edits.replace(span, "setStore");
        }
        if let Some(end) = store_declaration_end(&program, store) {
            artifacts.edits.insert(end, format!("\nsetStore({});", store));
        }
    }

    let code = artifacts.edits.apply(&source);
    let template = emit_pretty(&artifacts.nodes);
    let compressed_template = emit_compressed(&artifacts.nodes);

    let mut components = artifacts.components;
    for usage in base_components {
        if !components.iter().any(|c| c.name == usage.name) {
            components.push(usage);
        }
    }
    let mut image_sources = artifacts.image_sources;
    for src in base_images {
        if !image_sources.iter().any(|s| *s == src) {
            image_sources.push(src);
        }
    }

    Ok(TransformResult {
        code,
        template,
        compressed_template,
        components,
        component_properties: artifacts.properties,
        refs: artifacts.refs,
        image_sources,
        used_state: artifacts.used_state,
        warnings,
    })
}

/// Textual env substitution. Values are JSON-encoded so strings land
/// quoted; the platform key falls back to the adapter name.
fn substitute_env(source: &str, options: &CompileOptions) -> String {
    let mut pairs: Vec<(&str, String)> = options
        .env
        .iter()
        .map(|(k, v)| {
            (
                k.as_str(),
                serde_json::to_string(v).unwrap_or_else(|_| format!("\"{}\"", v)),
            )
        })
        .collect();
    if !options.env.contains_key(PLATFORM_ENV_KEY) {
        pairs.push((
            PLATFORM_ENV_KEY,
            format!("\"{}\"", options.adapter.name()),
        ));
    }
    // longest key first so overlapping keys substitute predictably
    pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
    let mut out = source.to_string();
    for (key, value) in pairs {
        out = out.replace(key, &value);
    }
    out
}

struct ImportIndex {
    imports: HashMap<String, ImportBinding>,
    /// Local name and specifier span of `Component` from the runtime
    /// package.
    runtime_component_local: Option<String>,
    runtime_component_span: Option<Span>,
    /// Specifier span of `Provider` from a store package.
    provider_span: Option<Span>,
}

fn index_imports(
    program: &Program,
    source: &str,
    file: &str,
) -> Result<ImportIndex, CompilerError> {
    let mut index = ImportIndex {
        imports: HashMap::new(),
        runtime_component_local: None,
        runtime_component_span: None,
        provider_span: None,
    };
    let mut seen_sources: HashSet<String> = HashSet::new();

    for stmt in &program.body {
        let Statement::ImportDeclaration(import) = stmt else {
            continue;
        };
        let module = import.source.value.to_string();
        if !seen_sources.insert(module.clone()) {
            return Err(CompilerError::at_offset(
                ERR_DUPLICATE_IMPORT,
                format!("\"{}\" is imported more than once", module),
                source,
                import.span.start,
                file,
            )
            .with_hint("merge the specifiers into a single import statement"));
        }
        let Some(specifiers) = &import.specifiers else {
            continue;
        };
        for specifier in specifiers {
            match specifier {
                ImportDeclarationSpecifier::ImportSpecifier(spec) => {
                    let imported = export_name(&spec.imported);
                    let local = spec.local.name.to_string();
                    if module == RUNTIME_PACKAGE && imported == "Component" {
                        index.runtime_component_local = Some(local.clone());
                        index.runtime_component_span = Some(spec.span);
                    }
                    if (module == REDUX_PACKAGE || module == MOBX_PACKAGE)
                        && imported == "Provider"
                    {
                        index.provider_span = Some(spec.span);
                    }
                    index.imports.insert(
                        local,
                        ImportBinding {
                            source: module.clone(),
                            is_default: false,
                        },
                    );
                }
                ImportDeclarationSpecifier::ImportDefaultSpecifier(spec) => {
                    index.imports.insert(
                        spec.local.name.to_string(),
                        ImportBinding {
                            source: module.clone(),
                            is_default: true,
                        },
                    );
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(spec) => {
                    index.imports.insert(
                        spec.local.name.to_string(),
                        ImportBinding {
                            source: module.clone(),
                            is_default: false,
                        },
                    );
                }
            }
        }
    }
    Ok(index)
}

fn export_name<'a>(name: &'a ModuleExportName) -> &'a str {
    match name {
        ModuleExportName::IdentifierName(id) => id.name.as_str(),
        ModuleExportName::IdentifierReference(id) => id.name.as_str(),
        ModuleExportName::StringLiteral(lit) => lit.value.as_str(),
    }
}

/// The component is the default-exported class, else the first exported
/// class, else the sole top-level class.
fn find_component_class<'a, 'ast>(program: &'a Program<'ast>) -> Option<&'a Class<'ast>> {
    let mut named: Option<&Class> = None;
    let mut bare: Option<&Class> = None;
    for stmt in &program.body {
        match stmt {
            Statement::ExportDefaultDeclaration(export) => {
                if let ExportDefaultDeclarationKind::ClassDeclaration(class) = &export.declaration {
                    return Some(class);
                }
            }
            Statement::ExportNamedDeclaration(export) => {
                if let Some(Declaration::ClassDeclaration(class)) = &export.declaration {
                    named.get_or_insert(class);
                }
            }
            Statement::ClassDeclaration(class) => {
                bare.get_or_insert(class);
            }
            _ => {}
        }
    }
    named.or(bare)
}

fn store_declaration_end(program: &Program, store: &str) -> Option<u32> {
    for stmt in &program.body {
        if let Statement::VariableDeclaration(decl) = stmt {
            for declarator in &decl.declarations {
                if let oxc_ast::ast::BindingPattern::BindingIdentifier(id) = &declarator.id {
                    if id.name == store {
                        return Some(stmt.span().end);
                    }
                }
            }
        }
    }
    None
}

/// Compiles the inherited base next to the current file. `Ok(None)`
/// means no candidate file could be read.
fn resolve_base(
    source: &str,
    options: &CompileOptions,
    import_source: &str,
    ctx: &mut InheritanceContext,
) -> Result<Option<TransformResult>, CompilerError> {
    let dir = Path::new(&options.source_path)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let joined = dir.join(import_source);

    let mut candidates: Vec<PathBuf> = Vec::new();
    if joined.extension().is_some() {
        candidates.push(joined.clone());
    } else {
        candidates.push(joined.with_extension("js"));
        candidates.push(joined.with_extension("tsx"));
    }

    for candidate in candidates {
        let Ok(base_source) = fs::read_to_string(&candidate) else {
            continue;
        };
        let normalized = normalize(&candidate);
        if ctx.visited.contains(&normalized) {
            return Err(CompilerError::at_offset(
                ERR_INHERITANCE_CYCLE,
                format!(
                    "inheritance cycle through {}",
                    candidate.display()
                ),
                source,
                0,
                &options.source_path,
            ));
        }
        if ctx.depth + 1 > MAX_INHERITANCE_DEPTH {
            return Err(CompilerError::at_offset(
                ERR_INHERITANCE_CYCLE,
                format!(
                    "inheritance chain exceeds {} levels at {}",
                    MAX_INHERITANCE_DEPTH,
                    candidate.display()
                ),
                source,
                0,
                &options.source_path,
            ));
        }
        ctx.visited.insert(normalized);
        ctx.depth += 1;

        let mut base_options = options.clone();
        base_options.source_path = candidate.to_string_lossy().into_owned();
        base_options.is_typed =
            candidate.extension().map(|e| e == "tsx" || e == "ts").unwrap_or(false);
        base_options.is_app = false;

        let result = compile_with_context(&base_source, &base_options, ctx);
        ctx.depth -= 1;
        return result.map(Some);
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    const BASIC: &str = r#"
import { Component } from '@minapp/core';
import { View, Text } from '@minapp/components';

export default class Counter extends Component {
  render() {
    const { count } = this.state;
    return (
      <View class="counter">
        <Text>{count}</Text>
      </View>
    );
  }
}
"#;

    fn options() -> CompileOptions {
        let mut opts = CompileOptions::new("counter.jsx");
        opts.test_mode = true;
        opts
    }

    #[test]
    fn basic_component_compiles() {
        let result = compile(BASIC, &options()).unwrap();
        assert!(result.code.contains("_createData()"));
        assert!(result.code.contains("this.__state = arguments[0] || this.state || {};"));
        assert!(result.template.contains("<view class=\"counter\">"));
        assert!(result.template.contains("{{count}}"));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn runtime_base_class_is_aliased() {
        let result = compile(BASIC, &options()).unwrap();
        assert!(result
            .code
            .contains("import { Component as __BaseComponent } from '@minapp/core';"));
        assert!(result.code.contains("class Counter extends __BaseComponent"));
    }

    #[test]
    fn env_values_substitute_json_encoded() {
        let mut opts = options();
        opts.env
            .insert("process.env.NODE_ENV".to_string(), "production".to_string());
        let src = "import { Component } from '@minapp/core';\nexport default class A extends Component {\n  render() {\n    const mode = process.env.NODE_ENV;\n    return <view>{mode}</view>;\n  }\n}";
        let result = compile(src, &opts).unwrap();
        assert!(result.code.contains("const mode = \"production\";"));
    }

    #[test]
    fn platform_env_defaults_to_adapter() {
        let mut opts = options();
        opts.adapter = Adapter::Swan;
        let src = "import { Component } from '@minapp/core';\nexport default class A extends Component {\n  render() {\n    const p = process.env.MINAPP_ENV;\n    return <view>{p}</view>;\n  }\n}";
        let result = compile(src, &opts).unwrap();
        assert!(result.code.contains("const p = \"swan\";"));
    }

    #[test]
    fn duplicate_import_source_is_rejected() {
        let src = "import { View } from '@minapp/components';\nimport { Text } from '@minapp/components';\nexport default class A {\n  render() { return <View/>; }\n}";
        let err = compile(src, &options()).unwrap_err();
        assert_eq!(err.code, ERR_DUPLICATE_IMPORT);
        assert_eq!(err.line, 2);
    }

    #[test]
    fn parse_failure_reports_code() {
        let err = compile("export default class {", &options()).unwrap_err();
        assert_eq!(err.code, ERR_PARSE);
    }

    #[test]
    fn missing_base_file_degrades_to_warning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("child.jsx");
        let src = "import Base from './base';\nexport default class Child extends Base {\n  render() { return <view/>; }\n}";
        let mut opts = options();
        opts.source_path = path.to_string_lossy().into_owned();
        let result = compile(src, &opts).unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].code, WARN_BASE_UNRESOLVED);
    }

    #[test]
    fn sibling_base_seeds_inherited_properties() {
        let dir = tempfile::tempdir().unwrap();
        let base_path = dir.path().join("base.js");
        let mut base = std::fs::File::create(&base_path).unwrap();
        write!(
            base,
            "export default class Base {{\n  render() {{\n    return <view>{{this.props.title}}</view>;\n  }}\n}}"
        )
        .unwrap();

        let child_path = dir.path().join("child.jsx");
        let src = "import Base from './base';\nexport default class Child extends Base {\n  render() { return <view/>; }\n}";
        let mut opts = options();
        opts.source_path = child_path.to_string_lossy().into_owned();
        let result = compile(src, &opts).unwrap();
        assert!(result.component_properties.contains(&"title".to_string()));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn inheritance_cycle_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let a_path = dir.path().join("a.js");
        let b_path = dir.path().join("b.js");
        std::fs::write(
            &a_path,
            "import B from './b';\nexport default class A extends B {\n  render() { return <view/>; }\n}",
        )
        .unwrap();
        std::fs::write(
            &b_path,
            "import A from './a';\nexport default class B extends A {\n  render() { return <view/>; }\n}",
        )
        .unwrap();
        let mut opts = options();
        opts.source_path = a_path.to_string_lossy().into_owned();
        let src = std::fs::read_to_string(&a_path).unwrap();
        let err = compile(&src, &opts).unwrap_err();
        assert_eq!(err.code, ERR_INHERITANCE_CYCLE);
    }

    #[test]
    fn unknown_adapter_degrades_with_warning() {
        let (adapter, warning) = resolve_adapter("quickapp");
        assert_eq!(adapter, Adapter::Weapp);
        assert_eq!(warning.unwrap().code, WARN_UNKNOWN_ADAPTER);
    }

    #[test]
    fn app_entry_emits_empty_create_data() {
        let mut opts = options();
        opts.is_app = true;
        let src = "import { Component } from '@minapp/core';\nexport default class App extends Component {\n  render() { return <view/>; }\n}";
        let result = compile(src, &opts).unwrap();
        assert!(result.code.contains("_createData() {}"));
        assert!(result.template.is_empty());
    }
}
