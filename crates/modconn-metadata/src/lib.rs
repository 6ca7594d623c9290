//! Plugin metadata collaborator seam.
//!
//! The real bundle scanner that turns an LV2 bundle on disk into a
//! [`PluginMetadata`] record is out of scope for this crate (see the
//! connector's top-level design notes) — it is a separate component with its
//! own licensing and file-format concerns. What the connector needs from it
//! is a narrow, static lookup: given a plugin URI, the declared port and
//! parameter shape of that plugin. This crate defines that seam as a trait,
//! plus an in-memory implementation useful for tests and for embedding a
//! small fixed catalogue (tools, bundled utility plugins) without a scanner.
//!
//! # Example
//!
//! ```rust
//! use modconn_metadata::{InMemoryCatalogue, PluginMetadata, PluginMetadataProvider};
//!
//! let mut catalogue = InMemoryCatalogue::new();
//! catalogue.insert(PluginMetadata::new("urn:test:1in1out", 1, 1));
//!
//! let meta = catalogue.lookup("urn:test:1in1out").unwrap();
//! assert_eq!(meta.num_inputs, 1);
//! assert_eq!(meta.num_outputs, 1);
//! ```

use std::collections::HashMap;

/// A single numeric parameter declared by a plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMetadata {
    /// LV2-style parameter symbol, e.g. `"gain"`.
    pub symbol: String,
    /// Human-readable name, used for quick-pot and UI labels.
    pub name: String,
    /// Minimum declared value.
    pub min: f32,
    /// Maximum declared value.
    pub max: f32,
    /// Default value on fresh instantiation.
    pub default: f32,
    /// Unit label (`"dB"`, `"Hz"`, ...), empty if unitless.
    pub unit: String,
    /// Whether this parameter is an output-only (read) control port.
    pub output: bool,
    /// Declared scale points (named stop values), if any.
    pub scale_points: Vec<ScalePoint>,
    /// Whether this plugin declares this parameter as its preferred quick-pot target.
    pub is_default_quick_pot: bool,
}

impl ParameterMetadata {
    /// Create a plain numeric parameter with no scale points.
    pub fn new(symbol: impl Into<String>, min: f32, max: f32, default: f32) -> Self {
        Self {
            symbol: symbol.into(),
            name: String::new(),
            min,
            max,
            default,
            unit: String::new(),
            output: false,
            scale_points: Vec::new(),
            is_default_quick_pot: false,
        }
    }

    /// Mark this parameter as output-only (monitor port, not settable).
    pub fn with_output(mut self, output: bool) -> Self {
        self.output = output;
        self
    }

    /// Mark this parameter as the plugin's declared quick-pot default.
    pub fn with_quick_pot(mut self, is_default: bool) -> Self {
        self.is_default_quick_pot = is_default;
        self
    }
}

/// A named stop value for a parameter, e.g. a filter-type enum's labels.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalePoint {
    /// Display label.
    pub label: String,
    /// Underlying numeric value.
    pub value: f32,
}

/// A single patch property (non-control-port parameter) declared by a plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMetadata {
    /// The property's URI.
    pub uri: String,
    /// Human-readable name.
    pub name: String,
    /// Default value, if the plugin declares one.
    pub default: Option<String>,
}

impl PropertyMetadata {
    /// Create a property with no declared default.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: String::new(),
            default: None,
        }
    }
}

/// The static shape of one plugin: channel counts, parameters, properties.
///
/// Everything a block needs to initialize itself from a bare URI comes from
/// here; the connector never derives this information itself.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginMetadata {
    /// The plugin's URI.
    pub uri: String,
    /// Display name.
    pub name: String,
    /// Short abbreviation, used on constrained displays.
    pub abbreviation: String,
    /// Number of audio input ports.
    pub num_inputs: u8,
    /// Number of audio output ports.
    pub num_outputs: u8,
    /// Number of CV/sidechain input ports.
    pub num_side_inputs: u8,
    /// Number of CV/sidechain output ports.
    pub num_side_outputs: u8,
    /// Declared control-port parameters, in declaration order (dense index 0..N).
    pub parameters: Vec<ParameterMetadata>,
    /// Declared patch properties.
    pub properties: Vec<PropertyMetadata>,
}

impl PluginMetadata {
    /// Create bare metadata for a plugin with the given channel counts and no parameters.
    pub fn new(uri: impl Into<String>, num_inputs: u8, num_outputs: u8) -> Self {
        Self {
            uri: uri.into(),
            name: String::new(),
            abbreviation: String::new(),
            num_inputs,
            num_outputs,
            num_side_inputs: 0,
            num_side_outputs: 0,
            parameters: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Append a parameter declaration.
    pub fn with_parameter(mut self, param: ParameterMetadata) -> Self {
        self.parameters.push(param);
        self
    }

    /// Append a property declaration.
    pub fn with_property(mut self, prop: PropertyMetadata) -> Self {
        self.properties.push(prop);
        self
    }

    /// The plugin is mono-in: it has exactly one audio input port.
    pub fn is_mono_in(&self) -> bool {
        self.num_inputs == 1
    }

    /// The plugin is stereo-out: it has at least two audio output ports.
    pub fn is_stereo_out(&self) -> bool {
        self.num_outputs >= 2
    }

    /// Index of this plugin's declared default quick-pot parameter, if any.
    pub fn default_quick_pot(&self) -> Option<usize> {
        self.parameters.iter().position(|p| p.is_default_quick_pot)
    }

    /// Index of the first settable (non-output) parameter, used as a
    /// quick-pot fallback when the plugin declares no preference.
    pub fn first_settable_parameter(&self) -> Option<usize> {
        self.parameters.iter().position(|p| !p.output)
    }
}

/// Collaborator seam standing in for the plugin bundle scanner.
///
/// Implementations of this trait are expected to live outside this crate —
/// typically backed by a scanned LV2 bundle cache keyed by URI. This crate
/// only provides [`InMemoryCatalogue`], useful for tests and for small fixed
/// catalogues (e.g. built-in tool plugins).
pub trait PluginMetadataProvider {
    /// Look up a plugin's declared metadata by URI.
    fn lookup(&self, uri: &str) -> Option<&PluginMetadata>;
}

/// A simple in-memory plugin metadata catalogue, keyed by URI.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogue {
    plugins: HashMap<String, PluginMetadata>,
}

impl InMemoryCatalogue {
    /// Create an empty catalogue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a plugin's metadata.
    pub fn insert(&mut self, metadata: PluginMetadata) {
        self.plugins.insert(metadata.uri.clone(), metadata);
    }

    /// Number of plugins known to the catalogue.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether the catalogue holds no plugins.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl PluginMetadataProvider for InMemoryCatalogue {
    fn lookup(&self, uri: &str) -> Option<&PluginMetadata> {
        self.plugins.get(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_insert_and_lookup() {
        let mut cat = InMemoryCatalogue::new();
        cat.insert(PluginMetadata::new("urn:test:2in2out", 2, 2));
        assert_eq!(cat.len(), 1);

        let meta = cat.lookup("urn:test:2in2out").unwrap();
        assert_eq!(meta.num_inputs, 2);
        assert!(meta.is_stereo_out());
        assert!(!meta.is_mono_in());

        assert!(cat.lookup("urn:test:missing").is_none());
    }

    #[test]
    fn quick_pot_fallback_picks_first_settable() {
        let meta = PluginMetadata::new("urn:test:gain", 1, 1)
            .with_parameter(ParameterMetadata::new("meter_out", 0.0, 1.0, 0.0).with_output(true))
            .with_parameter(ParameterMetadata::new("gain", -60.0, 12.0, 0.0));

        assert_eq!(meta.default_quick_pot(), None);
        assert_eq!(meta.first_settable_parameter(), Some(1));
    }

    #[test]
    fn quick_pot_declared_default_wins() {
        let meta = PluginMetadata::new("urn:test:gain", 1, 1)
            .with_parameter(ParameterMetadata::new("tone", 0.0, 1.0, 0.5))
            .with_parameter(
                ParameterMetadata::new("gain", -60.0, 12.0, 0.0).with_quick_pot(true),
            );

        assert_eq!(meta.default_quick_pot(), Some(1));
    }
}
