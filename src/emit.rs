//! Template emission.
//!
//! Serializes the lowered IR into the declarative template dialect:
//! - conditionals become `<block wx:if>` / `wx:elif` / `wx:else` chains,
//! - loops carry `wx:for`, `wx:for-item`, `wx:for-index` (only when the
//!   callback declared one) and `wx:key`,
//! - interpolations render as `{{ expr }}`.
//!
//! Two renditions are produced from the same tree: a pretty one with
//! two-space indentation and a compressed one with no inter-tag
//! whitespace.

use crate::ir::{Attribute, AttributeValue, ConditionalNode, ElementNode, LoopNode, TemplateNode};

/// Tags that never take children and self-close.
fn is_void_tag(tag: &str) -> bool {
    matches!(tag, "image" | "icon" | "progress" | "slider" | "switch" | "input")
}

pub fn emit_pretty(nodes: &[TemplateNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        emit_node(node, 0, true, &mut out);
    }
    out
}

pub fn emit_compressed(nodes: &[TemplateNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        emit_node(node, 0, false, &mut out);
    }
    out
}

fn pad(depth: usize, pretty: bool, out: &mut String) {
    if pretty {
        for _ in 0..depth {
            out.push_str("  ");
        }
    }
}

fn newline(pretty: bool, out: &mut String) {
    if pretty {
        out.push('\n');
    }
}

fn emit_node(node: &TemplateNode, depth: usize, pretty: bool, out: &mut String) {
    match node {
        TemplateNode::Element(element) => emit_element(element, depth, pretty, out),
        TemplateNode::Text(text) => {
            pad(depth, pretty, out);
            out.push_str(&escape_text(&text.value));
            newline(pretty, out);
        }
        TemplateNode::Expression(expr) => {
            pad(depth, pretty, out);
            out.push_str("{{");
            out.push_str(&expr.code);
            out.push_str("}}");
            newline(pretty, out);
        }
        TemplateNode::Conditional(cond) => emit_conditional(cond, depth, pretty, out),
        TemplateNode::Loop(looped) => emit_loop(looped, depth, pretty, out),
        TemplateNode::Slot(slot) => {
            pad(depth, pretty, out);
            match &slot.name {
                Some(name) => {
                    out.push_str("<slot name=\"");
                    out.push_str(name);
                    out.push_str("\"/>");
                }
                None => out.push_str("<slot/>"),
            }
            newline(pretty, out);
        }
    }
}

fn emit_element(element: &ElementNode, depth: usize, pretty: bool, out: &mut String) {
    pad(depth, pretty, out);
    out.push('<');
    out.push_str(&element.tag);
    for attr in &element.attributes {
        emit_attribute(attr, out);
    }
    if element.children.is_empty() {
        if is_void_tag(&element.tag) {
            out.push_str("/>");
        } else {
            out.push_str("></");
            out.push_str(&element.tag);
            out.push('>');
        }
        newline(pretty, out);
        return;
    }
    out.push('>');
    newline(pretty, out);
    for child in &element.children {
        emit_node(child, depth + 1, pretty, out);
    }
    pad(depth, pretty, out);
    out.push_str("</");
    out.push_str(&element.tag);
    out.push('>');
    newline(pretty, out);
}

fn emit_attribute(attr: &Attribute, out: &mut String) {
    out.push(' ');
    out.push_str(&attr.name);
    match &attr.value {
        None => {}
        Some(AttributeValue::Static { value }) => {
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
        Some(AttributeValue::Dynamic { expr }) => {
            out.push_str("=\"{{");
            out.push_str(&escape_attr(expr));
            out.push_str("}}\"");
        }
    }
}

fn emit_conditional(cond: &ConditionalNode, depth: usize, pretty: bool, out: &mut String) {
    for (i, branch) in cond.branches.iter().enumerate() {
        let directive = if i == 0 { "wx:if" } else { "wx:elif" };
        emit_block(
            &format!("{}=\"{{{{{}}}}}\"", directive, escape_attr(&branch.condition)),
            &branch.children,
            depth,
            pretty,
            out,
        );
    }
    if !cond.else_children.is_empty() {
        emit_block("wx:else", &cond.else_children, depth, pretty, out);
    }
}

fn emit_block(
    head: &str,
    children: &[TemplateNode],
    depth: usize,
    pretty: bool,
    out: &mut String,
) {
    pad(depth, pretty, out);
    out.push_str("<block ");
    out.push_str(head);
    out.push('>');
    newline(pretty, out);
    for child in children {
        emit_node(child, depth + 1, pretty, out);
    }
    pad(depth, pretty, out);
    out.push_str("</block>");
    newline(pretty, out);
}

fn emit_loop(looped: &LoopNode, depth: usize, pretty: bool, out: &mut String) {
    pad(depth, pretty, out);
    out.push_str("<block wx:for=\"{{");
    out.push_str(&escape_attr(&looped.source));
    out.push_str("}}\" wx:for-item=\"");
    out.push_str(&looped.item);
    out.push('"');
    if let Some(index) = &looped.index {
        out.push_str(" wx:for-index=\"");
        out.push_str(index);
        out.push('"');
    }
    out.push_str(" wx:key=\"");
    out.push_str(&escape_attr(&looped.key));
    out.push_str("\">");
    newline(pretty, out);
    for child in &looped.children {
        emit_node(child, depth + 1, pretty, out);
    }
    pad(depth, pretty, out);
    out.push_str("</block>");
    newline(pretty, out);
}

fn escape_text(value: &str) -> String {
    value.replace('&', "&amp;").replace('<', "&lt;")
}

/// Only the quote needs escaping; `&` must stay raw so binding
/// expressions like `a && b` survive in attribute position.
fn escape_attr(value: &str) -> String {
    value.replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ConditionalBranch, ExpressionNode, SlotNode, TextNode};

    fn view(children: Vec<TemplateNode>) -> TemplateNode {
        TemplateNode::Element(ElementNode {
            tag: "view".to_string(),
            attributes: vec![Attribute::fixed("class", "card")],
            children,
        })
    }

    #[test]
    fn pretty_output_indents_children() {
        let tree = vec![view(vec![TemplateNode::Expression(ExpressionNode {
            code: "title".to_string(),
        })])];
        assert_eq!(
            emit_pretty(&tree),
            "<view class=\"card\">\n  {{title}}\n</view>\n"
        );
    }

    #[test]
    fn compressed_output_drops_whitespace() {
        let tree = vec![view(vec![TemplateNode::Text(TextNode {
            value: "hi".to_string(),
        })])];
        assert_eq!(emit_compressed(&tree), "<view class=\"card\">hi</view>");
    }

    #[test]
    fn conditional_chain_uses_if_elif_else() {
        let tree = vec![TemplateNode::Conditional(ConditionalNode {
            branches: vec![
                ConditionalBranch {
                    condition: "a".to_string(),
                    children: vec![TemplateNode::Text(TextNode {
                        value: "1".to_string(),
                    })],
                },
                ConditionalBranch {
                    condition: "b".to_string(),
                    children: vec![TemplateNode::Text(TextNode {
                        value: "2".to_string(),
                    })],
                },
            ],
            else_children: vec![TemplateNode::Text(TextNode {
                value: "3".to_string(),
            })],
        })];
        let out = emit_compressed(&tree);
        assert_eq!(
            out,
            "<block wx:if=\"{{a}}\">1</block><block wx:elif=\"{{b}}\">2</block><block wx:else>3</block>"
        );
    }

    #[test]
    fn loop_emits_index_only_when_declared() {
        let without = TemplateNode::Loop(LoopNode {
            source: "list".to_string(),
            item: "item".to_string(),
            index: None,
            key: "index".to_string(),
            children: Vec::new(),
        });
        assert!(!emit_compressed(std::slice::from_ref(&without)).contains("wx:for-index"));

        let with = TemplateNode::Loop(LoopNode {
            source: "loopArray0".to_string(),
            item: "item".to_string(),
            index: Some("idx".to_string()),
            key: "*this".to_string(),
            children: Vec::new(),
        });
        let out = emit_compressed(std::slice::from_ref(&with));
        assert!(out.contains("wx:for=\"{{loopArray0}}\""));
        assert!(out.contains("wx:for-index=\"idx\""));
        assert!(out.contains("wx:key=\"*this\""));
    }

    #[test]
    fn logical_operators_stay_raw_in_attributes() {
        let tree = vec![TemplateNode::Conditional(ConditionalNode {
            branches: vec![ConditionalBranch {
                condition: "count > 1 && visible".to_string(),
                children: vec![TemplateNode::Text(TextNode {
                    value: "x".to_string(),
                })],
            }],
            else_children: Vec::new(),
        })];
        assert_eq!(
            emit_compressed(&tree),
            "<block wx:if=\"{{count > 1 && visible}}\">x</block>"
        );
    }

    #[test]
    fn named_slot_self_closes() {
        let tree = vec![
            TemplateNode::Slot(SlotNode { name: None }),
            TemplateNode::Slot(SlotNode {
                name: Some("header".to_string()),
            }),
        ];
        assert_eq!(emit_compressed(&tree), "<slot/><slot name=\"header\"/>");
    }

    #[test]
    fn dynamic_attributes_render_braced() {
        let tree = vec![TemplateNode::Element(ElementNode {
            tag: "view".to_string(),
            attributes: vec![
                Attribute::bound("id", "'ref_0' + index"),
                Attribute {
                    name: "disabled".to_string(),
                    value: None,
                },
            ],
            children: Vec::new(),
        })];
        assert_eq!(
            emit_compressed(&tree),
            "<view id=\"{{'ref_0' + index}}\" disabled></view>"
        );
    }
}
