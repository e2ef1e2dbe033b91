//! Template IR and result types.
//!
//! The IR is the contract between render lowering and emission. It is
//! fully serde-serializable so the host toolchain can inspect or cache
//! the lowered template as JSON.

use serde::{Deserialize, Serialize};

use crate::error::Warning;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TemplateNode {
    Element(ElementNode),
    Text(TextNode),
    Expression(ExpressionNode),
    Conditional(ConditionalNode),
    Loop(LoopNode),
    Slot(SlotNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub tag: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub children: Vec<TemplateNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub value: String,
}

/// An interpolated child; `code` is already template-scoped (no
/// `this.state.` / `this.props.` prefixes) and carries no braces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionNode {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalNode {
    pub branches: Vec<ConditionalBranch>,
    #[serde(default)]
    pub else_children: Vec<TemplateNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalBranch {
    pub condition: String,
    pub children: Vec<TemplateNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopNode {
    /// Template-scoped source binding, e.g. `list` or `loopArray0`.
    pub source: String,
    pub item: String,
    /// Present only when the callback declared an index parameter.
    #[serde(default)]
    pub index: Option<String>,
    /// `wx:key` value; defaults to the position index.
    pub key: String,
    pub children: Vec<TemplateNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotNode {
    /// `None` for the default slot.
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Static { value: String },
    Dynamic { expr: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub name: String,
    /// `None` renders a bare attribute.
    #[serde(default)]
    pub value: Option<AttributeValue>,
}

impl Attribute {
    pub fn fixed(name: impl Into<String>, value: impl Into<String>) -> Self {
        Attribute {
            name: name.into(),
            value: Some(AttributeValue::Static {
                value: value.into(),
            }),
        }
    }

    pub fn bound(name: impl Into<String>, expr: impl Into<String>) -> Self {
        Attribute {
            name: name.into(),
            value: Some(AttributeValue::Dynamic { expr: expr.into() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefKind {
    /// Ref on a builtin element; resolves to a node handle.
    Node,
    /// Ref on a custom component; resolves to the component instance.
    Component,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefDescriptor {
    pub kind: RefKind,
    /// Synthesized template id; inside a loop this is the id prefix the
    /// index is appended to.
    pub id: String,
    /// Declared name for by-name refs, empty for callback refs.
    pub ref_name: String,
    /// Source of the callback for by-callback refs.
    #[serde(default)]
    pub fn_expr: Option<String>,
    /// Index parameter of the enclosing loop, when the ref sits in one.
    #[serde(default)]
    pub loop_index: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentUsage {
    /// Kebab-case usage name, e.g. `custom-card`.
    pub name: String,
    /// Import source as written; module resolution is the host's job.
    pub source: String,
    pub is_default_import: bool,
}

/// Ordered, de-duplicated property name set. Order is first-appearance,
/// which keeps generated metadata stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySet {
    names: Vec<String>,
}

impl PropertySet {
    pub fn add(&mut self, name: &str) {
        if !self.names.iter().any(|n| n == name) {
            self.names.push(name.to_string());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResult {
    /// Rewritten module source.
    pub code: String,
    pub template: String,
    pub compressed_template: String,
    pub components: Vec<ComponentUsage>,
    pub component_properties: Vec<String>,
    pub refs: Vec<RefDescriptor>,
    pub image_sources: Vec<String>,
    pub used_state: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_nodes_tag_by_kind() {
        let node = TemplateNode::Slot(SlotNode {
            name: Some("header".to_string()),
        });
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "slot");
        assert_eq!(json["name"], "header");
    }

    #[test]
    fn attribute_values_serialize_untagged() {
        let fixed = serde_json::to_value(Attribute::fixed("class", "card")).unwrap();
        assert_eq!(fixed["value"]["value"], "card");
        let bound = serde_json::to_value(Attribute::bound("data", "list")).unwrap();
        assert_eq!(bound["value"]["expr"], "list");
    }

    #[test]
    fn property_set_keeps_first_appearance_order() {
        let mut props = PropertySet::default();
        props.add("value");
        props.add("add");
        props.add("value");
        assert_eq!(props.iter().collect::<Vec<_>>(), vec!["value", "add"]);
    }
}
