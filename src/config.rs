//! Codec configuration.
//!
//! [`Config`] is the whole configuration surface the encoder and decoder
//! recognize. Defaults match the reference JSON codec: HTML-sensitive
//! characters are escaped, output is compact, numbers decode as floats, unknown
//! object keys are ignored and map keys are emitted in sorted order.
//!
//! ```rust
//! use opjson::Config;
//!
//! let config = Config::builder()
//!     .escape_html(false)
//!     .indent("", "  ")
//!     .use_number(true)
//!     .build();
//! assert!(config.indent.is_some());
//! ```

/// Prefix and per-level unit used by the indent layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndentConfig {
    /// Written at the start of every line after the first.
    pub prefix: String,
    /// Written once per nesting level after the prefix.
    pub unit: String,
}

impl IndentConfig {
    /// Creates an indent configuration.
    pub fn new(prefix: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            unit: unit.into(),
        }
    }
}

/// Options shared by every encode and decode call made through a [`crate::Codec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Escape `<`, `>` and `&` inside strings as `\u003c`, `\u003e`, `\u0026`.
    pub escape_html: bool,
    /// When set, encoding uses the indent layout.
    pub indent: Option<IndentConfig>,
    /// Decode numbers held by [`crate::Value`] verbatim instead of normalising them through `f64`.
    pub use_number: bool,
    /// Fail with [`crate::JsonError::UnknownField`] on object keys that match no field.
    pub disallow_unknown_fields: bool,
    /// Emit map entries ordered by key. Disabling it keeps the container's own iteration order.
    pub sort_map_keys: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            escape_html: true,
            indent: None,
            use_number: false,
            disallow_unknown_fields: false,
            sort_map_keys: true,
        }
    }
}

impl Config {
    /// Starts a builder from the default configuration.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Fluent builder for [`Config`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Enables or disables HTML escaping.
    pub fn escape_html(mut self, enable: bool) -> Self {
        self.config.escape_html = enable;
        self
    }

    /// Switches encoding to the indent layout.
    pub fn indent(mut self, prefix: impl Into<String>, unit: impl Into<String>) -> Self {
        self.config.indent = Some(IndentConfig::new(prefix, unit));
        self
    }

    /// Keeps number text verbatim when decoding into [`crate::Value`].
    pub fn use_number(mut self, enable: bool) -> Self {
        self.config.use_number = enable;
        self
    }

    /// Rejects object keys that match no struct field.
    pub fn disallow_unknown_fields(mut self, enable: bool) -> Self {
        self.config.disallow_unknown_fields = enable;
        self
    }

    /// Controls map key ordering.
    pub fn sort_map_keys(mut self, enable: bool) -> Self {
        self.config.sort_map_keys = enable;
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_codec() {
        let config = Config::default();
        assert!(config.escape_html);
        assert!(config.indent.is_none());
        assert!(!config.use_number);
        assert!(!config.disallow_unknown_fields);
        assert!(config.sort_map_keys);
    }

    #[test]
    fn builder_sets_every_flag() {
        let config = Config::builder()
            .escape_html(false)
            .indent(">", "\t")
            .use_number(true)
            .disallow_unknown_fields(true)
            .sort_map_keys(false)
            .build();
        assert_eq!(config.indent, Some(IndentConfig::new(">", "\t")));
        assert!(!config.escape_html && config.use_number);
        assert!(config.disallow_unknown_fields && !config.sort_map_keys);
    }
}
