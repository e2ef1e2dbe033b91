//! End-to-end tests over the public `compile` entry: whole-module
//! fixtures in, rewritten code and templates out.

use crate::{compile, Adapter, CompileOptions};

fn options() -> CompileOptions {
    let mut opts = CompileOptions::new("fixture.jsx");
    opts.test_mode = true;
    opts
}

fn run(source: &str) -> crate::TransformResult {
    compile(source, &options()).unwrap_or_else(|err| panic!("compile failed: {}", err))
}

fn wrap(render_body: &str) -> String {
    format!(
        "import {{ Component }} from '@minapp/core';\nexport default class Fixture extends Component {{\n  render() {{\n{}\n  }}\n}}",
        render_body
    )
}

#[test]
fn conditional_chain_emits_if_elif_else() {
    let result = run(&wrap(
        "    const { kind } = this.state;\n    return (\n      <view>\n        {kind === 'a' ? <text>A</text> : kind === 'b' ? <text>B</text> : <text>C</text>}\n      </view>\n    );",
    ));
    let out = &result.compressed_template;
    assert!(out.contains("<block wx:if=\"{{kind === 'a'}}\">"), "{}", out);
    assert!(out.contains("<block wx:elif=\"{{kind === 'b'}}\">"), "{}", out);
    assert!(out.contains("<block wx:else>"), "{}", out);
}

#[test]
fn logical_guard_emits_lone_if() {
    let result = run(&wrap(
        "    const { visible } = this.state;\n    return <view>{visible && <text>shown</text>}</view>;",
    ));
    let out = &result.compressed_template;
    assert!(out.contains("wx:if=\"{{visible}}\""), "{}", out);
    assert!(!out.contains("wx:else"), "{}", out);
}

#[test]
fn plain_loop_binds_source_and_params() {
    let result = run(&wrap(
        "    return <view>{this.state.list.map((item, idx) => <text key={idx}>{item}</text>)}</view>;",
    ));
    let out = &result.compressed_template;
    assert!(out.contains("wx:for=\"{{list}}\""), "{}", out);
    assert!(out.contains("wx:for-item=\"item\""), "{}", out);
    assert!(out.contains("wx:for-index=\"idx\""), "{}", out);
    assert!(out.contains("wx:key=\"index\""), "{}", out);
}

#[test]
fn loop_key_defaults_to_index() {
    let result = run(&wrap(
        "    return <view>{this.state.list.map(item => <text>{item}</text>)}</view>;",
    ));
    assert!(result.compressed_template.contains("wx:key=\"index\""));
    assert!(!result.compressed_template.contains("wx:for-index"));
}

#[test]
fn derived_loop_source_is_snapshotted() {
    let result = run(&wrap(
        "    return <view>{this.state.list.filter(x => x > 0).map(item => <text>{item}</text>)}</view>;",
    ));
    assert!(result.code.contains("$anonymousCallee__0"), "{}", result.code);
    assert!(result.code.contains("const loopArray0 ="), "{}", result.code);
    assert!(result.code.contains("$original: item"), "{}", result.code);
    assert!(
        result.compressed_template.contains("wx:for=\"{{loopArray0}}\""),
        "{}",
        result.compressed_template
    );
    assert!(
        result.compressed_template.contains("{{item.$original}}"),
        "{}",
        result.compressed_template
    );
}

#[test]
fn swan_snapshot_uses_its_own_key() {
    let mut opts = options();
    opts.adapter = Adapter::Swan;
    let src = wrap(
        "    return <view>{this.state.list.filter(x => x > 0).map(item => <text>{item}</text>)}</view>;",
    );
    let result = compile(&src, &opts).unwrap();
    assert!(result.code.contains("privateOriginal: item"), "{}", result.code);
    assert!(!result.code.contains("$original: item"));
}

#[test]
fn children_and_named_slots() {
    let result = run(&wrap(
        "    return (\n      <view>\n        {this.props.children}\n        {this.props.renderHeader}\n        {this.props.renderFooter}\n      </view>\n    );",
    ));
    let out = &result.compressed_template;
    assert!(out.contains("<slot/>"), "{}", out);
    assert!(out.contains("<slot name=\"header\"/>"), "{}", out);
    assert!(out.contains("<slot name=\"footer\"/>"), "{}", out);
    assert_eq!(result.code.matches("static multipleSlots = true;").count(), 1);
}

#[test]
fn method_handlers_keep_their_name() {
    let result = run(
        "import { Component } from '@minapp/core';\nexport default class Fixture extends Component {\n  handleClick() {}\n  render() {\n    return <view onClick={this.handleClick}/>;\n  }\n}",
    );
    assert!(
        result.compressed_template.contains("onClick=\"handleClick\""),
        "{}",
        result.compressed_template
    );
    assert!(result.code.contains("static $$events = [\"handleClick\"];"));
}

#[test]
fn props_handlers_get_memoized_proxies() {
    let result = run(
        "import { Component } from '@minapp/core';\nimport Btn from './btn';\nexport default class Fixture extends Component {\n  render() {\n    return (\n      <view>\n        <Btn onAdd={this.props.add} />\n        <Btn onRepeat={this.props.add} />\n      </view>\n    );\n  }\n}",
    );
    let out = &result.compressed_template;
    assert!(out.contains("onAdd=\"funPrivate0\""), "{}", out);
    assert!(out.contains("onRepeat=\"funPrivate0\""), "{}", out);
    assert_eq!(result.code.matches("funPrivate0() {").count(), 1);
    assert!(result
        .code
        .contains("this.__triggerPropsFn(\"add\", [...arguments]);"));
    assert!(result.component_properties.contains(&"__fn_onAdd".to_string()));
}

#[test]
fn dispatch_calls_carry_the_dotted_path() {
    let result = run(
        "import { Component } from '@minapp/core';\nexport default class Fixture extends Component {\n  tick() {\n    this.props.c.onTick2(1);\n  }\n  render() { return <view/>; }\n}",
    );
    assert!(
        result
            .code
            .contains("this.__triggerPropsFn(\"c.onTick2\", [null].concat([1]))"),
        "{}",
        result.code
    );
    assert!(result.component_properties.contains(&"__fn_onTick2".to_string()));
}

#[test]
fn alipay_dispatch_drops_the_null_slot() {
    let mut opts = options();
    opts.adapter = Adapter::Alipay;
    let src = "import { Component } from '@minapp/core';\nexport default class Fixture extends Component {\n  tick() {\n    this.props.onTick(1, 2);\n  }\n  render() { return <view/>; }\n}";
    let result = compile(src, &opts).unwrap();
    assert!(
        result.code.contains("this.__triggerPropsFn(\"onTick\", [1, 2])"),
        "{}",
        result.code
    );
}

#[test]
fn logical_conditions_survive_attribute_escaping() {
    let result = run(&wrap(
        "    const { count, visible } = this.state;\n    return <view>{count > 1 && visible && <text>x</text>}</view>;",
    ));
    let out = &result.compressed_template;
    assert!(out.contains("wx:if=\"{{count > 1 && visible}}\""), "{}", out);
    assert!(!out.contains("&amp;"), "{}", out);
}

#[test]
fn call_and_apply_invocations_dispatch_any_prop() {
    let result = run(
        "import { Component } from '@minapp/core';\nexport default class Fixture extends Component {\n  tick() {\n    this.props.save.call(this, 1);\n    this.props.persist.apply(this, [2]);\n  }\n  render() { return <view/>; }\n}",
    );
    assert!(
        result
            .code
            .contains("this.__triggerPropsFn(\"save\", [null].concat([1]))"),
        "{}",
        result.code
    );
    assert!(
        result
            .code
            .contains("this.__triggerPropsFn(\"persist\", [null].concat([2]))"),
        "{}",
        result.code
    );
    assert!(result.component_properties.contains(&"__fn_save".to_string()));
}

#[test]
fn bound_handler_arguments_stay_with_the_proxy() {
    let result = run(&wrap(
        "    return <view onClick={this.props.add.bind(this, 5)}/>;",
    ));
    assert!(
        result.compressed_template.contains("onClick=\"funPrivate0\""),
        "{}",
        result.compressed_template
    );
    assert!(
        result
            .code
            .contains("this.__triggerPropsFn(\"add\", [5, ...arguments]);"),
        "{}",
        result.code
    );
}

#[test]
fn create_data_publishes_and_returns_state() {
    let result = run(&wrap(
        "    const total = this.state.items.length;\n    return <view>{total}</view>;",
    ));
    assert!(result.code.contains("_createData() {"));
    assert!(result
        .code
        .contains("this.__state = arguments[0] || this.state || {};"));
    assert!(result
        .code
        .contains("this.__props = arguments[1] || this.props || {};"));
    assert!(result.code.contains("Object.assign(this.__state, {"));
    assert!(result.code.contains("total: total"));
    assert!(result.code.contains("return this.__state;"));
    assert!(result.used_state.contains(&"total".to_string()));
}

#[test]
fn repeated_compiles_are_byte_identical() {
    let src = wrap(
        "    const { list } = this.state;\n    return (\n      <view>\n        {list.filter(x => x).map(item => <text key={item.id}>{item.name}</text>)}\n        {this.props.children}\n      </view>\n    );",
    );
    let first = run(&src);
    let second = run(&src);
    assert_eq!(first.code, second.code);
    assert_eq!(first.template, second.template);
    assert_eq!(first.used_state, second.used_state);
}

#[test]
fn compact_emission_keeps_attribute_tokens() {
    let result = run(&wrap(
        "    const { kind } = this.state;\n    return <view>{kind === 'x' && <text>x</text>}</view>;",
    ));
    let token = "wx:if=\"{{kind === 'x'}}\"";
    assert!(result.template.contains(token));
    assert!(result.compressed_template.contains(token));
    assert!(!result.compressed_template.contains('\n'));
}

#[test]
fn template_interpolation_strips_state_prefix() {
    let result = run(&wrap("    return <view>{this.state.count}</view>;"));
    assert!(
        result.compressed_template.contains("{{count}}"),
        "{}",
        result.compressed_template
    );
}

#[test]
fn component_usages_record_import_sources() {
    let result = run(
        "import { Component } from '@minapp/core';\nimport CustomCard from './card';\nexport default class Fixture extends Component {\n  render() {\n    return <CustomCard title=\"hi\"/>;\n  }\n}",
    );
    assert_eq!(result.components.len(), 1);
    assert_eq!(result.components[0].name, "custom-card");
    assert_eq!(result.components[0].source, "./card");
    assert!(result.components[0].is_default_import);
    assert!(result.compressed_template.contains("<custom-card title=\"hi\">"));
}

#[test]
fn runtime_package_components_are_not_usages() {
    let result = run(
        "import { Component } from '@minapp/core';\nimport { Gallery } from '@minapp/components';\nexport default class Fixture extends Component {\n  render() {\n    return <Gallery/>;\n  }\n}",
    );
    assert!(result.components.is_empty(), "{:?}", result.components);
    assert!(
        result.compressed_template.contains("<gallery></gallery>"),
        "{}",
        result.compressed_template
    );
}

#[test]
fn image_sources_collect_static_src() {
    let result = run(
        "import { Component } from '@minapp/core';\nimport { Image } from '@minapp/components';\nexport default class Fixture extends Component {\n  render() {\n    return <Image src=\"./logo.png\"/>;\n  }\n}",
    );
    assert_eq!(result.image_sources, vec!["./logo.png".to_string()]);
}

#[test]
fn refs_outside_loops_get_fixed_ids() {
    let result = run(&wrap(
        "    return <view ref={(node) => this.root = node}/>;",
    ));
    assert_eq!(result.refs.len(), 1);
    assert_eq!(result.refs[0].id, "ref_0");
    assert!(result.refs[0].fn_expr.is_some());
    assert!(result.compressed_template.contains("id=\"ref_0\""));
    assert!(result.code.contains("$$refs = ["));
}

#[test]
fn loop_refs_need_the_index_param() {
    let src = wrap(
        "    return <view>{this.state.list.map(item => <text ref={(n) => this.keep(n)}>{item}</text>)}</view>;",
    );
    let err = compile(&src, &options()).unwrap_err();
    assert_eq!(err.code, crate::error::ERR_REF_LOOP_NO_INDEX);
}

#[test]
fn string_refs_in_loops_are_rejected() {
    let src = wrap(
        "    return <view>{this.state.list.map((item, i) => <text ref=\"x\">{item}</text>)}</view>;",
    );
    let err = compile(&src, &options()).unwrap_err();
    assert_eq!(err.code, crate::error::ERR_REF_STRING_IN_LOOP);
}

#[test]
fn loop_callback_refs_get_dynamic_ids() {
    let result = run(&wrap(
        "    return <view>{this.state.list.map((item, i) => <text ref={(n) => this.keep(n, i)}>{item}</text>)}</view>;",
    ));
    assert_eq!(result.refs.len(), 1);
    assert_eq!(result.refs[0].loop_index.as_deref(), Some("i"));
    assert!(
        result.compressed_template.contains("id=\"{{'ref_0' + i}}\""),
        "{}",
        result.compressed_template
    );
}

#[test]
fn switch_cases_must_use_blocks() {
    let src = wrap(
        "    const { tab } = this.state;\n    switch (tab) {\n      case 'a':\n        return <text>A</text>;\n    }\n    return <view/>;",
    );
    let err = compile(&src, &options()).unwrap_err();
    assert_eq!(err.code, crate::error::ERR_SWITCH_CASE_BLOCK);
}

#[test]
fn for_statements_cannot_wrap_markup() {
    let src = wrap(
        "    const rows = [];\n    for (const x of this.state.list) {\n      rows.push(<text>{x}</text>);\n    }\n    return <view>{rows}</view>;",
    );
    let err = compile(&src, &options()).unwrap_err();
    assert_eq!(err.code, crate::error::ERR_FOR_STATEMENT_JSX);
}

#[test]
fn inline_event_functions_are_rejected() {
    let src = wrap("    return <view onClick={() => console.log(1)}/>;");
    let err = compile(&src, &options()).unwrap_err();
    assert_eq!(err.code, crate::error::ERR_EVENT_UNRESOLVED);
}

#[test]
fn static_properties_cover_observed_props() {
    let result = run(&wrap(
        "    const { title } = this.props;\n    return <view>{title}{this.props.subtitle}</view>;",
    ));
    assert!(result.code.contains("static properties = {"));
    assert!(result.code.contains("\"title\": {"));
    assert!(result.code.contains("\"subtitle\": {"));
    assert!(result.code.contains("\"type\": null"));
    assert!(result.component_properties.contains(&"title".to_string()));
    assert!(result.component_properties.contains(&"subtitle".to_string()));
}

#[test]
fn used_state_includes_initial_state_keys() {
    let result = run(
        "import { Component } from '@minapp/core';\nexport default class Fixture extends Component {\n  state = { count: 0, label: 'x' };\n  render() {\n    return <view>{this.state.count}</view>;\n  }\n}",
    );
    assert!(result.used_state.contains(&"count".to_string()));
    assert!(result.used_state.contains(&"label".to_string()));
}

#[test]
fn store_provider_unwraps_and_registers() {
    let result = run(
        "import { Component } from '@minapp/core';\nimport { Provider } from '@minapp/redux';\nimport { createStore } from 'redux';\nconst store = createStore(() => ({}));\nexport default class Fixture extends Component {\n  render() {\n    return (\n      <Provider store={store}>\n        <view>app</view>\n      </Provider>\n    );\n  }\n}",
    );
    assert!(
        result.code.contains("import { setStore } from '@minapp/redux';"),
        "{}",
        result.code
    );
    assert!(result.code.contains("\nsetStore(store);"), "{}", result.code);
    assert!(
        result.compressed_template.starts_with("<view><view>app</view></view>"),
        "{}",
        result.compressed_template
    );
    assert!(!result.compressed_template.contains("store="));
}

#[test]
fn anonymous_expressions_hoist_into_temps() {
    let result = run(&wrap(
        "    return <view>{this.fmt(this.state.count)}</view>;",
    ));
    assert!(
        result.code.contains("const anonymousState__temp ="),
        "{}",
        result.code
    );
    assert!(
        result.compressed_template.contains("{{anonymousState__temp}}"),
        "{}",
        result.compressed_template
    );
    assert!(result.used_state.contains(&"anonymousState__temp".to_string()));
}
