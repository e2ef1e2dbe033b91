//! Compile options and the target-adapter switch.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Mini-program platform the output targets. The adapter selects the
/// event-dispatch argument convention and the loop snapshot key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Adapter {
    Weapp,
    Swan,
    Alipay,
    Tt,
}

impl Default for Adapter {
    fn default() -> Self {
        Adapter::Weapp
    }
}

impl Adapter {
    /// Parses an adapter id, falling back to the default for unknown
    /// strings. The caller surfaces the fallback as a warning.
    pub fn parse(id: &str) -> Option<Adapter> {
        match id {
            "weapp" => Some(Adapter::Weapp),
            "swan" => Some(Adapter::Swan),
            "alipay" => Some(Adapter::Alipay),
            "tt" => Some(Adapter::Tt),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Adapter::Weapp => "weapp",
            Adapter::Swan => "swan",
            Adapter::Alipay => "alipay",
            Adapter::Tt => "tt",
        }
    }

    /// Alipay handlers receive their arguments as a plain array; the
    /// other platforms prepend a `null` slot for the runtime to fill.
    pub fn shifts_dispatch_args(self) -> bool {
        self == Adapter::Alipay
    }

    /// Key under which a loop snapshot keeps the original item.
    pub fn snapshot_key(self) -> &'static str {
        match self {
            Adapter::Swan => "privateOriginal",
            _ => "$original",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptions {
    #[serde(default)]
    pub adapter: Adapter,
    /// Path of the module being compiled; used for diagnostics and for
    /// resolving an inherited base component next to it.
    pub source_path: String,
    /// Parse TypeScript syntax.
    #[serde(default)]
    pub is_typed: bool,
    /// App entry: the render body is discarded and no template is
    /// produced.
    #[serde(default)]
    pub is_app: bool,
    /// Textual substitutions applied before parsing. Keys are source
    /// expressions (e.g. `process.env.NODE_ENV`), values are substituted
    /// JSON-encoded.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Keeps `constructor` un-renamed so fixtures stay stable.
    #[serde(default)]
    pub test_mode: bool,
}

impl CompileOptions {
    pub fn new(source_path: impl Into<String>) -> Self {
        CompileOptions {
            adapter: Adapter::default(),
            source_path: source_path.into(),
            is_typed: false,
            is_app: false,
            env: HashMap::new(),
            test_mode: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_conventions() {
        assert!(Adapter::Alipay.shifts_dispatch_args());
        assert!(!Adapter::Weapp.shifts_dispatch_args());
        assert_eq!(Adapter::Swan.snapshot_key(), "privateOriginal");
        assert_eq!(Adapter::Tt.snapshot_key(), "$original");
    }

    #[test]
    fn adapter_parse_rejects_unknown() {
        assert_eq!(Adapter::parse("swan"), Some(Adapter::Swan));
        assert_eq!(Adapter::parse("web"), None);
    }
}
