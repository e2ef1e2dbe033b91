//! Fixed tables: builtin component names, runtime package ids, the
//! lifecycle set scanned for props, and generated-name prefixes.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

/// Package the base `Component` class and runtime helpers come from.
pub const RUNTIME_PACKAGE: &str = "@minapp/core";
/// Package the builtin view components come from.
pub const COMPONENTS_PACKAGE: &str = "@minapp/components";
/// Store-binding packages whose `Provider` element is unwrapped.
pub const REDUX_PACKAGE: &str = "@minapp/redux";
pub const MOBX_PACKAGE: &str = "@minapp/mobx";

/// Runtime dispatch method for event props.
pub const TRIGGER_PROPS_FN: &str = "__triggerPropsFn";

/// Env expression that defaults to the adapter name when the caller
/// does not substitute it explicitly.
pub const PLATFORM_ENV_KEY: &str = "process.env.MINAPP_ENV";

pub const ANONYMOUS_STATE_PREFIX: &str = "anonymousState__temp";
pub const LOOP_ARRAY_PREFIX: &str = "loopArray";
pub const ANONYMOUS_CALLEE_PREFIX: &str = "$anonymousCallee__";
pub const FUN_PRIVATE_PREFIX: &str = "funPrivate";
pub const LOOP_REF_PREFIX: &str = "ref_";

lazy_static! {
    /// JSX names that lower to builtin template tags instead of
    /// component usages.
    pub static ref BUILTIN_COMPONENTS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        for name in [
            "View", "ScrollView", "Swiper", "SwiperItem", "MovableArea",
            "MovableView", "CoverView", "CoverImage", "Block", "Icon",
            "Text", "RichText", "Progress", "Button", "Checkbox",
            "CheckboxGroup", "Form", "Input", "Label", "Picker",
            "PickerView", "PickerViewColumn", "Radio", "RadioGroup",
            "Slider", "Switch", "Textarea", "Navigator", "Audio",
            "Camera", "Image", "Video", "LivePlayer", "LivePusher",
            "Map", "Canvas", "OpenData", "WebView", "Ad",
        ] {
            s.insert(name);
        }
        s
    };

    /// Components whose static `src` attribute is collected for asset
    /// tracking.
    pub static ref IMAGE_COMPONENTS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("Image");
        s.insert("CoverImage");
        s
    };

    /// Methods whose props parameter is scanned for property usage.
    pub static ref LIFECYCLE_METHODS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        for name in [
            "componentDidUpdate",
            "shouldComponentUpdate",
            "getDerivedStateFromProps",
            "getSnapshotBeforeUpdate",
            "componentWillReceiveProps",
            "componentWillUpdate",
        ] {
            s.insert(name);
        }
        s
    };

    /// Props that lower to named slots: `renderHeader` → slot "header".
    pub static ref SLOT_PROP_RE: Regex = Regex::new(r"^render[A-Z]\w*$").unwrap();

    /// Event attributes/props: `onClick`, `onTick2`, ...
    pub static ref EVENT_NAME_RE: Regex = Regex::new(r"^on[A-Z]\w*$").unwrap();
}

/// Slot name for a `render*` prop: `renderFoo` → `foo`, `renderABC` → `abc`.
pub fn slot_name(prop: &str) -> String {
    prop.trim_start_matches("render").to_lowercase()
}

/// Template tag for a builtin component name: `ScrollView` → `scroll-view`.
pub fn builtin_tag(name: &str) -> String {
    kebab_case(name)
}

pub fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_names_lowercase_the_remainder() {
        assert_eq!(slot_name("renderHeader"), "header");
        assert_eq!(slot_name("renderABC"), "abc");
    }

    #[test]
    fn builtin_tags_are_kebab_case() {
        assert_eq!(builtin_tag("View"), "view");
        assert_eq!(builtin_tag("ScrollView"), "scroll-view");
        assert_eq!(builtin_tag("PickerViewColumn"), "picker-view-column");
    }

    #[test]
    fn slot_prop_pattern() {
        assert!(SLOT_PROP_RE.is_match("renderHeader"));
        assert!(!SLOT_PROP_RE.is_match("render"));
        assert!(!SLOT_PROP_RE.is_match("rendering"));
    }
}
