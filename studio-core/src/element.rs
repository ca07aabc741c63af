//! Placed elements: identity, kind and per-kind defaults.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::ComponentKind;
use crate::dom::NodeId;
use crate::geometry::{ElementGeometry, Size};

/// Unique, stable element identifier.
///
/// Minted as `<prefix>_<millis>`; duplicates and collisions get an extra
/// random suffix: `<prefix>_<millis>_<9 chars>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    /// Wrap an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Timestamp-based identifier.
    #[must_use]
    pub fn mint(prefix: &str, now_ms: u64) -> Self {
        Self(format!("{prefix}_{now_ms}"))
    }

    /// Timestamp-based identifier with a random suffix.
    #[must_use]
    pub fn mint_unique(prefix: &str, now_ms: u64) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{prefix}_{now_ms}_{}", &suffix[..9]))
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What an element is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    /// Filled rectangle.
    Rectangle,
    /// Filled circle.
    Circle,
    /// Editable text box.
    Text,
    /// Flex container.
    Container,
    /// Editable paragraph.
    Paragraph,
    /// Editable heading.
    Heading,
    /// Uploaded image.
    Image,
    /// A catalog component.
    DynamicComponent,
}

/// Creation defaults for a basic element kind.
#[derive(Debug, Clone, Copy)]
pub struct KindDefaults {
    /// Name shown in the layers list.
    pub display_name: &'static str,
    /// Inline style appended to the common positioning styles.
    pub style: &'static str,
    /// Initial text.
    pub text: Option<&'static str>,
    /// Whether the text is editable in place.
    pub editable: bool,
}

/// Styles shared by every placed element.
pub const BASE_STYLE: &str = "position: absolute; cursor: move; user-select: none;";

impl ElementKind {
    /// Every basic (non-image, non-component) kind.
    pub const BASIC: [Self; 6] = [
        Self::Rectangle,
        Self::Circle,
        Self::Text,
        Self::Container,
        Self::Paragraph,
        Self::Heading,
    ];

    /// Type tag used in persisted records.
    #[must_use]
    pub const fn type_tag(self) -> &'static str {
        match self {
            Self::Rectangle => "rectangle",
            Self::Circle => "circle",
            Self::Text => "text",
            Self::Container => "div",
            Self::Paragraph => "p",
            Self::Heading => "h1",
            Self::Image => "image",
            Self::DynamicComponent => "component",
        }
    }

    /// Parse a persisted type tag.
    #[must_use]
    pub fn from_type_tag(tag: &str) -> Option<Self> {
        match tag {
            "rectangle" => Some(Self::Rectangle),
            "circle" => Some(Self::Circle),
            "text" => Some(Self::Text),
            "div" | "container" => Some(Self::Container),
            "p" | "paragraph" => Some(Self::Paragraph),
            "h1" | "heading" => Some(Self::Heading),
            "image" => Some(Self::Image),
            "component" | "react-component" => Some(Self::DynamicComponent),
            _ => None,
        }
    }

    /// Markup tag of the element's node.
    #[must_use]
    pub const fn tag_name(self) -> &'static str {
        match self {
            Self::Paragraph => "p",
            Self::Heading => "h1",
            _ => "div",
        }
    }

    /// Prefix for minted ids.
    #[must_use]
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Self::Image => "image_element",
            Self::DynamicComponent => "component",
            _ => "element",
        }
    }

    /// Whether this is a basic shape or text kind.
    #[must_use]
    pub const fn is_basic(self) -> bool {
        !matches!(self, Self::Image | Self::DynamicComponent)
    }

    /// Whether the element holds editable text content.
    #[must_use]
    pub const fn is_text_bearing(self) -> bool {
        matches!(
            self,
            Self::Text | Self::Container | Self::Paragraph | Self::Heading
        )
    }

    /// Creation defaults; `None` for images and components, which take
    /// theirs from the upload and the catalog.
    #[must_use]
    pub const fn defaults(self) -> Option<KindDefaults> {
        let defaults = match self {
            Self::Rectangle => KindDefaults {
                display_name: "Rectangle",
                style: "width: 100px; height: 60px; background: #3b82f6; border-radius: 4px;",
                text: None,
                editable: false,
            },
            Self::Circle => KindDefaults {
                display_name: "Circle",
                style: "width: 80px; height: 80px; background: #ef4444; border-radius: 50%;",
                text: None,
                editable: false,
            },
            Self::Text => KindDefaults {
                display_name: "Text",
                style: "width: 180px; height: 45px; background: transparent; border: 2px dashed #6b7280; display: flex; align-items: center; justify-content: center; font-family: \"Inter\", sans-serif; font-size: 16px; color: #374151; text-align: center;",
                text: Some("Click to edit text"),
                editable: true,
            },
            Self::Container => KindDefaults {
                display_name: "Div Container",
                style: "width: 100px; height: 100px; background: rgba(59, 130, 246, 0.3); display: flex; align-items: center; justify-content: center;",
                text: Some("DIV"),
                editable: false,
            },
            Self::Paragraph => KindDefaults {
                display_name: "Paragraph",
                style: "width: 220px; height: 40px; margin: 0px;",
                text: Some("Edit this paragraph text"),
                editable: true,
            },
            Self::Heading => KindDefaults {
                display_name: "Heading 1",
                style: "width: 260px; height: 48px; margin: 0px; font-size: 32px; font-weight: bold;",
                text: Some("Edit this heading"),
                editable: true,
            },
            Self::Image | Self::DynamicComponent => return None,
        };
        Some(defaults)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}

/// Size of the box an uploaded image is placed in.
pub const IMAGE_BOX: Size = Size::new(200.0, 200.0);

/// Source of an image element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSource {
    /// Data URL or remote URL.
    pub src: String,
    /// Original file name.
    pub file_name: String,
}

/// An element placed on the canvas.
///
/// Owns exactly one node in the canvas subtree.
#[derive(Debug, Clone)]
pub struct PlacedElement {
    /// Identifier.
    pub id: ElementId,
    /// Kind.
    pub kind: ElementKind,
    /// Catalog kind for component elements.
    pub component: Option<ComponentKind>,
    /// Image source for image elements.
    pub image: Option<ImageSource>,
    /// The owned node.
    pub node: NodeId,
    /// Locked elements cannot be selected.
    pub locked: bool,
    /// Hidden elements render with `display: none`.
    pub visible: bool,
    /// Stacking order; higher draws on top.
    pub stack_order: i64,
    /// Name shown in the layers list.
    pub display_name: String,
    /// Last committed geometry.
    pub geometry: ElementGeometry,
}

impl PlacedElement {
    /// Name persisted in registry records: the component name, `image`, or
    /// the basic type tag.
    #[must_use]
    pub fn record_name(&self) -> &str {
        match (self.kind, self.component) {
            (ElementKind::DynamicComponent, Some(kind)) => kind.name(),
            (kind, _) => kind.type_tag(),
        }
    }
}
