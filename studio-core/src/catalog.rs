//! Pluggable visual components and prop serialization.
//!
//! The catalog is a closed, tagged registry: a name either resolves to one of
//! the known [`ComponentKind`]s or comes back as [`Resolution::Unresolved`].
//! Kinds without a mount implementation are listed but not available.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dom::{Document, NodeId};
use crate::error::{StudioError, StudioResult};
use crate::geometry::Size;

/// Prefix marking a serialized handler reference.
pub const HANDLER_PREFIX: &str = "handler:";

/// Size used for components without a configured size.
pub const FALLBACK_SIZE: Size = Size::new(200.0, 200.0);

/// An event handler attached to a component prop.
pub type Handler = Arc<dyn Fn(&str) + Send + Sync>;

/// A prop value whose JSON form is computed on demand.
pub trait PropSource: Send + Sync {
    /// JSON form of the value.
    ///
    /// # Errors
    ///
    /// Returns a description when the value cannot be represented as JSON.
    fn to_json(&self) -> Result<Value, String>;
}

impl<T: Serialize + Send + Sync> PropSource for T {
    fn to_json(&self) -> Result<Value, String> {
        serde_json::to_value(self).map_err(|e| e.to_string())
    }
}

/// A component prop.
#[derive(Clone)]
pub enum Prop {
    /// A plain JSON value.
    Value(Value),
    /// An event handler.
    Handler(Handler),
    /// A value that must be probed before it can be persisted.
    Dynamic(Arc<dyn PropSource>),
}

impl fmt::Debug for Prop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Handler(_) => f.write_str("Handler(..)"),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<Value> for Prop {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Props keyed by name.
pub type PropMap = BTreeMap<String, Prop>;

/// Named event handlers that props may reference.
#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: Vec<(String, Handler)>,
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|(n, _)| n))
            .finish()
    }
}

impl HandlerTable {
    /// The built-in handlers.
    #[must_use]
    pub fn standard() -> Self {
        let mut table = Self::default();
        table.register(
            "onDefaultClick",
            Arc::new(|target: &str| tracing::info!(target_id = %target, "Component clicked")),
        );
        table.register(
            "onDefaultHover",
            Arc::new(|target: &str| tracing::debug!(target_id = %target, "Component hovered")),
        );
        table
    }

    /// Add or replace a handler.
    pub fn register(&mut self, name: &str, handler: Handler) {
        self.handlers.retain(|(n, _)| n != name);
        self.handlers.push((name.to_string(), handler));
    }

    /// Look a handler up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Handler> {
        self.handlers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, h)| Arc::clone(h))
    }

    /// Name of a handler, matched by identity.
    #[must_use]
    pub fn name_of(&self, handler: &Handler) -> Option<&str> {
        self.handlers
            .iter()
            .find(|(_, h)| Arc::ptr_eq(h, handler))
            .map(|(n, _)| n.as_str())
    }
}

/// Convert props into their JSON-safe persisted form.
///
/// Handlers become `"handler:<name>"`; handlers missing from the table and
/// values that fail the JSON probe are dropped with a warning. Nulls are
/// omitted.
#[must_use]
pub fn serialize_props(props: &PropMap, handlers: &HandlerTable) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, prop) in props {
        match prop {
            Prop::Value(Value::Null) => {}
            Prop::Value(v) => {
                out.insert(key.clone(), v.clone());
            }
            Prop::Handler(h) => match handlers.name_of(h) {
                Some(name) => {
                    out.insert(key.clone(), Value::String(format!("{HANDLER_PREFIX}{name}")));
                }
                None => tracing::warn!(prop = %key, "Dropping unnamed handler prop"),
            },
            Prop::Dynamic(source) => match source.to_json() {
                Ok(Value::Null) => {}
                Ok(v) => {
                    out.insert(key.clone(), v);
                }
                Err(e) => tracing::warn!(prop = %key, error = %e, "Dropping non-serializable prop"),
            },
        }
    }
    out
}

/// Rebuild props from their persisted form, resolving handler references.
///
/// References to unknown handlers stay as plain strings.
#[must_use]
pub fn deserialize_props(props: &Map<String, Value>, handlers: &HandlerTable) -> PropMap {
    props
        .iter()
        .map(|(key, value)| {
            let prop = value
                .as_str()
                .and_then(|s| s.strip_prefix(HANDLER_PREFIX))
                .and_then(|name| handlers.get(name))
                .map_or_else(|| Prop::Value(value.clone()), Prop::Handler);
            (key.clone(), prop)
        })
        .collect()
}

/// The closed set of component kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    /// Animated prism background.
    Prism,
    /// Animated waves background.
    Waves,
    /// Text with an aurora glow.
    AuroraText,
    /// Text with an animated gradient.
    AnimatedGradientText,
    /// Text with sparkles.
    SparklesText,
    /// Button with a ripple effect.
    RippleButton,
    /// Button with a shimmer effect.
    ShimmerButton,
    /// Blur/fade animation wrapper.
    BlurFade,
}

impl ComponentKind {
    /// Every kind, in catalog order.
    pub const ALL: [Self; 8] = [
        Self::Prism,
        Self::Waves,
        Self::AuroraText,
        Self::AnimatedGradientText,
        Self::SparklesText,
        Self::RippleButton,
        Self::ShimmerButton,
        Self::BlurFade,
    ];

    /// Registry name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Prism => "Prism",
            Self::Waves => "Waves",
            Self::AuroraText => "AuroraText",
            Self::AnimatedGradientText => "AnimatedGradientText",
            Self::SparklesText => "SparklesText",
            Self::RippleButton => "RippleButton",
            Self::ShimmerButton => "ShimmerButton",
            Self::BlurFade => "BlurFade",
        }
    }

    /// Parse a registry name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Kebab-case class stem used in markup, e.g. `aurora-text`.
    #[must_use]
    pub fn class_stem(self) -> String {
        let css = crate::dom::css_property_name(self.name());
        css.trim_start_matches('-').to_string()
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Catalog grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentCategory {
    /// Full-bleed backgrounds.
    Backgrounds,
    /// Buttons.
    Buttons,
    /// Text effects.
    Text,
    /// Animation wrappers.
    Animations,
    /// General UI.
    Ui,
    /// Anything else.
    Misc,
}

/// Builds a component's markup under a host node.
pub type MountFn = fn(&mut Document, NodeId, &Map<String, Value>);

/// Catalog entry for one component kind.
#[derive(Debug, Clone)]
pub struct ComponentSpec {
    /// Kind.
    pub kind: ComponentKind,
    /// Human-readable name.
    pub display_name: &'static str,
    /// Grouping.
    pub category: ComponentCategory,
    /// Module path the component is imported from.
    pub import_path: &'static str,
    /// Short description.
    pub description: &'static str,
    /// Props applied when the component is placed.
    pub default_props: Map<String, Value>,
    /// Size applied when the component is placed.
    pub size: Size,
    /// Search tags.
    pub tags: &'static [&'static str],
    /// Markup builder; `None` means listed but not available.
    pub mount: Option<MountFn>,
}

impl ComponentSpec {
    /// Whether the component can actually be mounted.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.mount.is_some()
    }
}

/// Outcome of looking a component name up.
#[derive(Debug, Clone)]
pub enum Resolution<'a> {
    /// The name maps to a catalog entry.
    Resolved(&'a ComponentSpec),
    /// No entry carries this name.
    Unresolved(String),
}

/// The component catalog plus its handler table.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ComponentCatalog {
    specs: Vec<ComponentSpec>,
    handlers: HandlerTable,
}

impl ComponentCatalog {
    /// A catalog with no components and no handlers.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in catalog: eight kinds, two of them available.
    #[must_use]
    pub fn standard() -> Self {
        let mut catalog = Self {
            specs: Vec::new(),
            handlers: HandlerTable::standard(),
        };
        for spec in standard_specs() {
            catalog.specs.push(spec);
        }
        catalog
    }

    /// Add a component.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::DuplicateComponent`] if the kind is already present.
    pub fn register(&mut self, spec: ComponentSpec) -> StudioResult<()> {
        if self.get(spec.kind).is_some() {
            return Err(StudioError::DuplicateComponent(spec.kind.to_string()));
        }
        self.specs.push(spec);
        Ok(())
    }

    /// Resolve a component name.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Resolution<'_> {
        ComponentKind::from_name(name)
            .and_then(|kind| self.get(kind))
            .map_or_else(|| Resolution::Unresolved(name.to_string()), Resolution::Resolved)
    }

    /// Entry for a kind.
    #[must_use]
    pub fn get(&self, kind: ComponentKind) -> Option<&ComponentSpec> {
        self.specs.iter().find(|s| s.kind == kind)
    }

    fn lookup(&self, name: &str) -> Option<&ComponentSpec> {
        match self.resolve(name) {
            Resolution::Resolved(spec) => Some(spec),
            Resolution::Unresolved(_) => None,
        }
    }

    /// Whether a component can be saved and restored: it resolves and has
    /// an implementation.
    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.lookup(name).is_some_and(ComponentSpec::is_available)
    }

    /// All entries in catalog order.
    #[must_use]
    pub fn specs(&self) -> &[ComponentSpec] {
        &self.specs
    }

    /// Entries that can be mounted.
    #[must_use]
    pub fn available(&self) -> Vec<&ComponentSpec> {
        self.specs.iter().filter(|s| s.is_available()).collect()
    }

    /// Available entries in a category.
    #[must_use]
    pub fn by_category(&self, category: ComponentCategory) -> Vec<&ComponentSpec> {
        self.specs
            .iter()
            .filter(|s| s.category == category && s.is_available())
            .collect()
    }

    /// Import path, falling back to `@/components/<name>`.
    #[must_use]
    pub fn import_path(&self, name: &str) -> String {
        self.lookup(name)
            .map_or_else(|| format!("@/components/{name}"), |s| s.import_path.to_string())
    }

    /// Default props, falling back to `{}`.
    #[must_use]
    pub fn default_props(&self, name: &str) -> Map<String, Value> {
        self.lookup(name)
            .map(|s| s.default_props.clone())
            .unwrap_or_default()
    }

    /// Default size, falling back to 200×200.
    #[must_use]
    pub fn default_size(&self, name: &str) -> Size {
        self.lookup(name).map_or(FALLBACK_SIZE, |s| s.size)
    }

    /// Handler table.
    #[must_use]
    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    /// Mutable handler table, for setup before the catalog is shared.
    pub fn handlers_mut(&mut self) -> &mut HandlerTable {
        &mut self.handlers
    }

    /// Mount a component's markup under `host`. Returns `false` when the
    /// component is unknown or unavailable.
    pub fn mount(
        &self,
        doc: &mut Document,
        host: NodeId,
        name: &str,
        props: &Map<String, Value>,
    ) -> bool {
        match self.lookup(name).and_then(|s| s.mount) {
            Some(mount) => {
                mount(doc, host, props);
                true
            }
            None => false,
        }
    }

    /// Standalone markup for a component, as mounted into an empty host.
    #[must_use]
    pub fn render_markup(&self, name: &str, props: &Map<String, Value>) -> Option<String> {
        let mut scratch = Document::new();
        let host = scratch.create_element("div");
        scratch.append_child(scratch.body(), host);
        self.mount(&mut scratch, host, name, props)
            .then(|| scratch.inner_html(host))
    }
}

fn props(pairs: &[(&str, &str)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), Value::String((*v).to_string())))
        .collect()
}

fn standard_specs() -> Vec<ComponentSpec> {
    vec![
        ComponentSpec {
            kind: ComponentKind::Prism,
            display_name: "Prism Background",
            category: ComponentCategory::Backgrounds,
            import_path: "@/components/Backgrounds/Prism/Prism",
            description: "Animated prism background effect",
            default_props: Map::new(),
            size: Size::new(300.0, 200.0),
            tags: &["animated", "colorful", "background"],
            mount: Some(mount_prism),
        },
        ComponentSpec {
            kind: ComponentKind::Waves,
            display_name: "Waves Background",
            category: ComponentCategory::Backgrounds,
            import_path: "@/components/Backgrounds/Waves/Waves",
            description: "Animated waves background effect",
            default_props: Map::new(),
            size: Size::new(400.0, 250.0),
            tags: &["animated", "fluid", "background"],
            mount: Some(mount_waves),
        },
        ComponentSpec {
            kind: ComponentKind::AuroraText,
            display_name: "Aurora Text",
            category: ComponentCategory::Text,
            import_path: "@/components/TextAnimations/AuroraText",
            description: "Text with aurora effect animation",
            default_props: props(&[("text", "Aurora Text")]),
            size: Size::new(200.0, 50.0),
            tags: &["text", "animated", "glow"],
            mount: None,
        },
        ComponentSpec {
            kind: ComponentKind::AnimatedGradientText,
            display_name: "Gradient Text",
            category: ComponentCategory::Text,
            import_path: "@/components/TextAnimations/AnimatedGradientText",
            description: "Text with animated gradient colors",
            default_props: props(&[("text", "Gradient Text")]),
            size: Size::new(180.0, 40.0),
            tags: &["text", "animated", "gradient"],
            mount: None,
        },
        ComponentSpec {
            kind: ComponentKind::SparklesText,
            display_name: "Sparkles Text",
            category: ComponentCategory::Text,
            import_path: "@/components/TextAnimations/SparklesText",
            description: "Text with sparkles animation effect",
            default_props: props(&[("text", "Sparkles Text")]),
            size: Size::new(200.0, 45.0),
            tags: &["text", "animated", "sparkles"],
            mount: None,
        },
        ComponentSpec {
            kind: ComponentKind::RippleButton,
            display_name: "Ripple Button",
            category: ComponentCategory::Buttons,
            import_path: "@/components/Buttons/RippleButton",
            description: "Button with ripple click effect",
            default_props: props(&[("children", "Click me")]),
            size: Size::new(120.0, 40.0),
            tags: &["button", "animated", "ripple"],
            mount: None,
        },
        ComponentSpec {
            kind: ComponentKind::ShimmerButton,
            display_name: "Shimmer Button",
            category: ComponentCategory::Buttons,
            import_path: "@/components/Buttons/ShimmerButton",
            description: "Button with shimmer hover effect",
            default_props: props(&[("children", "Shimmer")]),
            size: Size::new(130.0, 40.0),
            tags: &["button", "animated", "shimmer"],
            mount: None,
        },
        ComponentSpec {
            kind: ComponentKind::BlurFade,
            display_name: "Blur Fade",
            category: ComponentCategory::Animations,
            import_path: "@/components/Animations/BlurFade",
            description: "Blur fade in/out animation wrapper",
            default_props: Map::new(),
            size: Size::new(200.0, 100.0),
            tags: &["animation", "blur", "fade"],
            mount: None,
        },
    ]
}

/// Fill `host` with a full-size layer carrying the props as `data-prop-*`.
fn mount_layer(
    doc: &mut Document,
    host: NodeId,
    props: &Map<String, Value>,
    class: &str,
    background: &str,
) {
    let layer = doc.create_element("div");
    doc.set_attr(layer, "class", class);
    for (key, value) in props {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        doc.set_attr(layer, &format!("data-prop-{}", crate::dom::css_property_name(key)), &text);
    }
    doc.set_attr(
        layer,
        "style",
        &format!(
            "position: absolute; left: 0px; top: 0px; width: 100%; height: 100%; background: {background}; border-radius: inherit; overflow: hidden"
        ),
    );
    doc.append_child(host, layer);
}

fn mount_prism(doc: &mut Document, host: NodeId, props: &Map<String, Value>) {
    mount_layer(
        doc,
        host,
        props,
        "prism-background",
        "conic-gradient(from 180deg at 50% 50%, #7c3aed, #2563eb, #06b6d4, #a855f7, #7c3aed)",
    );
}

fn mount_waves(doc: &mut Document, host: NodeId, props: &Map<String, Value>) {
    mount_layer(
        doc,
        host,
        props,
        "waves-background",
        "repeating-radial-gradient(ellipse at 50% 120%, #0ea5e9 0px, #0369a1 18px, #0c4a6e 36px)",
    );
}
