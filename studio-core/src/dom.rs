//! In-memory document model.
//!
//! A small arena-backed tree standing in for the live markup the editing
//! surface manipulates. Nodes carry a tag, ordered attributes and an inline
//! style declaration block; text nodes carry a string.
//!
//! Layout is deliberately simple: every element box is placed by its inline
//! `left`/`top` relative to its parent box, sized by `width`/`height`
//! (`px` or `%` of the parent), and transformed by `transform` around
//! `transform-origin` (center by default). That is enough to reproduce what
//! the gesture and extraction code reads back: bounding rectangles and
//! resolved transform matrices.

use std::collections::BTreeMap;
use std::fmt;

use crate::geometry::{css_number, parse_transform, px, Matrix2D, Point, Rect, Size};

/// Handle to a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// An ordered inline style declaration block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    declarations: Vec<(String, String)>,
}

impl InlineStyle {
    /// Parse `prop: value; prop: value` text.
    #[must_use]
    pub fn parse(css_text: &str) -> Self {
        let mut style = Self::default();
        for declaration in css_text.split(';') {
            if let Some((prop, value)) = declaration.split_once(':') {
                let (prop, value) = (prop.trim(), value.trim());
                if !prop.is_empty() {
                    style.set(prop, value);
                }
            }
        }
        style
    }

    /// Value of a property, if declared.
    #[must_use]
    pub fn get(&self, prop: &str) -> Option<&str> {
        self.declarations
            .iter()
            .find(|(p, _)| p == prop)
            .map(|(_, v)| v.as_str())
    }

    /// Set a property, keeping its original position if already declared.
    /// An empty value removes the declaration.
    pub fn set(&mut self, prop: &str, value: &str) {
        if value.is_empty() {
            self.remove(prop);
            return;
        }
        if let Some(slot) = self.declarations.iter_mut().find(|(p, _)| p == prop) {
            slot.1 = value.to_string();
        } else {
            self.declarations
                .push((prop.to_string(), value.to_string()));
        }
    }

    /// Remove a property.
    pub fn remove(&mut self, prop: &str) {
        self.declarations.retain(|(p, _)| p != prop);
    }

    /// Iterate declarations in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.declarations
            .iter()
            .map(|(p, v)| (p.as_str(), v.as_str()))
    }

    /// Whether no declarations exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Serialize as `prop: value; prop: value;`.
    #[must_use]
    pub fn to_css_text(&self) -> String {
        self.declarations
            .iter()
            .map(|(p, v)| format!("{p}: {v};"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Convert a camelCase style key (`backgroundColor`) into a CSS property
/// name (`background-color`). Names already in kebab-case pass through.
#[must_use]
pub fn css_property_name(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[derive(Debug, Clone)]
struct ElementData {
    tag: String,
    attrs: Vec<(String, String)>,
    style: InlineStyle,
}

#[derive(Debug, Clone)]
enum NodeData {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

const VOID_TAGS: &[&str] = &["img", "br", "hr", "input", "meta", "link"];

/// Properties inherited from the parent when not declared inline.
const INHERITED: &[(&str, &str)] = &[
    ("color", "rgb(0, 0, 0)"),
    ("font-family", "serif"),
    ("font-size", "16px"),
    ("font-weight", "400"),
    ("font-style", "normal"),
    ("text-align", "start"),
    ("line-height", "normal"),
    ("letter-spacing", "normal"),
];

/// Non-inherited properties and their initial resolved values.
const INITIAL: &[(&str, &str)] = &[
    ("position", "static"),
    ("top", "auto"),
    ("left", "auto"),
    ("background-color", "rgba(0, 0, 0, 0)"),
    ("text-decoration", "none"),
    ("border", "0px none rgb(0, 0, 0)"),
    ("border-radius", "0px"),
    ("box-shadow", "none"),
    ("opacity", "1"),
    ("z-index", "auto"),
    ("flex-direction", "row"),
    ("align-items", "normal"),
    ("justify-content", "normal"),
    ("overflow", "visible"),
    ("cursor", "auto"),
    ("user-select", "auto"),
];

/// Resolved style of a node, as read back by extraction and the
/// properties panel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputedStyle {
    values: BTreeMap<String, String>,
}

impl ComputedStyle {
    /// Resolved value of a property.
    #[must_use]
    pub fn get(&self, prop: &str) -> Option<&str> {
        self.values.get(prop).map(String::as_str)
    }

    /// Iterate resolved properties in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Arena-backed markup tree rooted at a `body` element.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    body: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document containing only `body`.
    #[must_use]
    pub fn new() -> Self {
        let body = Node {
            data: NodeData::Element(ElementData {
                tag: "body".to_string(),
                attrs: Vec::new(),
                style: InlineStyle::default(),
            }),
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![body],
            body: NodeId(0),
        }
    }

    /// The root `body` element.
    #[must_use]
    pub fn body(&self) -> NodeId {
        self.body
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.node(id)?.data {
            NodeData::Element(e) => Some(e),
            NodeData::Text(_) => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes.get_mut(id.0)?.data {
            NodeData::Element(e) => Some(e),
            NodeData::Text(_) => None,
        }
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            style: InlineStyle::default(),
        }))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    ///
    /// Appending a node under itself or one of its descendants is ignored.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if self.node(parent).is_none()
            || self.node(child).is_none()
            || self.contains(child, parent)
        {
            return;
        }
        self.remove(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Detach a node (and its subtree) from its parent.
    pub fn remove(&mut self, node: NodeId) {
        let Some(parent) = self.node(node).and_then(|n| n.parent) else {
            return;
        };
        self.nodes[parent.0].children.retain(|c| *c != node);
        self.nodes[node.0].parent = None;
    }

    /// Detach every child of a node.
    pub fn clear_children(&mut self, node: NodeId) {
        let children = self.children(node).to_vec();
        for child in children {
            self.remove(child);
        }
    }

    /// Copy a subtree. The copy is detached.
    pub fn deep_clone(&mut self, node: NodeId) -> Option<NodeId> {
        let data = self.node(node)?.data.clone();
        let copy = self.push(data);
        for child in self.children(node).to_vec() {
            if let Some(child_copy) = self.deep_clone(child) {
                self.append_child(copy, child_copy);
            }
        }
        Some(copy)
    }

    /// Parent of a node.
    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    /// Children of a node in order.
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node).map_or(&[], |n| n.children.as_slice())
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    #[must_use]
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Whether the node is attached under `body`.
    #[must_use]
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.node(node).is_some() && self.contains(self.body, node)
    }

    /// Tag name of an element node.
    #[must_use]
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|e| e.tag.as_str())
    }

    /// Whether the node is an element (not text).
    #[must_use]
    pub fn is_element(&self, node: NodeId) -> bool {
        self.element(node).is_some()
    }

    /// Attribute value.
    #[must_use]
    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?
            .attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute. `style` replaces the inline declaration block.
    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        let Some(element) = self.element_mut(node) else {
            return;
        };
        if name == "style" {
            element.style = InlineStyle::parse(value);
            return;
        }
        if let Some(slot) = element.attrs.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value.to_string();
        } else {
            element.attrs.push((name.to_string(), value.to_string()));
        }
    }

    /// Remove an attribute.
    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if let Some(element) = self.element_mut(node) {
            element.attrs.retain(|(n, _)| n != name);
        }
    }

    /// All attributes in insertion order (excluding `style`).
    #[must_use]
    pub fn attrs(&self, node: NodeId) -> Vec<(&str, &str)> {
        self.element(node)
            .map(|e| {
                e.attrs
                    .iter()
                    .map(|(n, v)| (n.as_str(), v.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The `id` attribute.
    #[must_use]
    pub fn id_attr(&self, node: NodeId) -> Option<&str> {
        self.attr(node, "id")
    }

    /// Class list.
    #[must_use]
    pub fn classes(&self, node: NodeId) -> Vec<&str> {
        self.attr(node, "class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Whether the node has a class.
    #[must_use]
    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.classes(node).contains(&class)
    }

    /// Add a class if absent.
    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if self.has_class(node, class) || !self.is_element(node) {
            return;
        }
        let mut classes: Vec<String> = self.classes(node).into_iter().map(String::from).collect();
        classes.push(class.to_string());
        self.set_attr(node, "class", &classes.join(" "));
    }

    /// Keep only classes matching the predicate. Drops the attribute when
    /// nothing remains.
    pub fn retain_classes(&mut self, node: NodeId, keep: impl Fn(&str) -> bool) {
        if self.attr(node, "class").is_none() {
            return;
        }
        let kept: Vec<String> = self
            .classes(node)
            .into_iter()
            .filter(|c| keep(c))
            .map(String::from)
            .collect();
        if kept.is_empty() {
            self.remove_attr(node, "class");
        } else {
            self.set_attr(node, "class", &kept.join(" "));
        }
    }

    /// Remove a class.
    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        self.retain_classes(node, |c| c != class);
    }

    /// Inline style of an element.
    #[must_use]
    pub fn style(&self, node: NodeId) -> Option<&InlineStyle> {
        self.element(node).map(|e| &e.style)
    }

    /// Mutable inline style of an element.
    pub fn style_mut(&mut self, node: NodeId) -> Option<&mut InlineStyle> {
        self.element_mut(node).map(|e| &mut e.style)
    }

    /// Set one inline style property verbatim.
    pub fn set_style(&mut self, node: NodeId, prop: &str, value: &str) {
        if let Some(style) = self.style_mut(node) {
            style.set(prop, value);
        }
    }

    /// Concatenated text of the node and its descendants.
    #[must_use]
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match self.node(node).map(|n| &n.data) {
            Some(NodeData::Text(t)) => out.push_str(t),
            Some(NodeData::Element(_)) => {
                for child in self.children(node) {
                    self.collect_text(*child, out);
                }
            }
            None => {}
        }
    }

    /// Replace a node's children with a single text node.
    pub fn set_text_content(&mut self, node: NodeId, text: &str) {
        if !self.is_element(node) {
            if let Some(Node {
                data: NodeData::Text(t),
                ..
            }) = self.nodes.get_mut(node.0)
            {
                *t = text.to_string();
            }
            return;
        }
        self.clear_children(node);
        if !text.is_empty() {
            let text_node = self.create_text(text);
            self.append_child(node, text_node);
        }
    }

    /// All descendants in document (pre-)order, excluding the node itself.
    #[must_use]
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// First connected element with the given `id` attribute.
    #[must_use]
    pub fn query_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.body)
            .into_iter()
            .find(|n| self.id_attr(*n) == Some(id))
    }

    /// Connected elements carrying a class, in document order.
    #[must_use]
    pub fn query_by_class(&self, class: &str) -> Vec<NodeId> {
        self.find_all(self.body, |doc, n| doc.has_class(n, class))
    }

    /// Descendants of `root` matching a predicate, in document order.
    pub fn find_all(&self, root: NodeId, pred: impl Fn(&Self, NodeId) -> bool) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|n| self.is_element(*n) && pred(self, *n))
            .collect()
    }

    // ---------------------------------------------------------------------
    // Serialization
    // ---------------------------------------------------------------------

    /// Markup of the node's children.
    #[must_use]
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_html(*child, &mut out);
        }
        out
    }

    /// Markup of the node including itself.
    #[must_use]
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        match self.node(node).map(|n| &n.data) {
            Some(NodeData::Text(t)) => out.push_str(&escape_text(t)),
            Some(NodeData::Element(e)) => {
                out.push('<');
                out.push_str(&e.tag);
                for (name, value) in &e.attrs {
                    out.push_str(&format!(" {name}=\"{}\"", escape_attr(value)));
                }
                if !e.style.is_empty() {
                    out.push_str(&format!(" style=\"{}\"", escape_attr(&e.style.to_css_text())));
                }
                out.push('>');
                if VOID_TAGS.contains(&e.tag.as_str()) {
                    return;
                }
                for child in self.children(node) {
                    self.write_html(*child, out);
                }
                out.push_str("</");
                out.push_str(&e.tag);
                out.push('>');
            }
            None => {}
        }
    }

    // ---------------------------------------------------------------------
    // Layout
    // ---------------------------------------------------------------------

    /// Size of an element's layout box.
    #[must_use]
    pub fn box_size(&self, node: NodeId) -> Size {
        let Some(style) = self.style(node) else {
            return Size::default();
        };
        let parent = self
            .parent(node)
            .map(|p| self.box_size(p))
            .unwrap_or_default();
        Size::new(
            style
                .get("width")
                .and_then(|v| resolve_length(v, parent.width))
                .unwrap_or(0.0),
            style
                .get("height")
                .and_then(|v| resolve_length(v, parent.height))
                .unwrap_or(0.0),
        )
    }

    /// Matrix mapping the node's box into its parent's box.
    #[must_use]
    pub fn local_matrix(&self, node: NodeId) -> Matrix2D {
        let Some(style) = self.style(node) else {
            return Matrix2D::IDENTITY;
        };
        let parent = self
            .parent(node)
            .map(|p| self.box_size(p))
            .unwrap_or_default();
        let size = self.box_size(node);
        let left = style
            .get("left")
            .and_then(|v| resolve_length(v, parent.width))
            .unwrap_or(0.0);
        let top = style
            .get("top")
            .and_then(|v| resolve_length(v, parent.height))
            .unwrap_or(0.0);
        let transform = style
            .get("transform")
            .and_then(parse_transform)
            .unwrap_or(Matrix2D::IDENTITY);
        let origin = transform_origin(style.get("transform-origin"), size);

        Matrix2D::translate(left, top)
            .multiply(&Matrix2D::translate(origin.x, origin.y))
            .multiply(&transform)
            .multiply(&Matrix2D::translate(-origin.x, -origin.y))
    }

    /// Matrix mapping the node's box into screen space.
    #[must_use]
    pub fn screen_matrix(&self, node: NodeId) -> Matrix2D {
        let mut chain = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            chain.push(id);
            current = self.parent(id);
        }
        chain
            .iter()
            .rev()
            .fold(Matrix2D::IDENTITY, |acc, id| acc.multiply(&self.local_matrix(*id)))
    }

    /// Screen-space axis-aligned bounding box of the node's transformed box.
    #[must_use]
    pub fn bounding_rect(&self, node: NodeId) -> Rect {
        let size = self.box_size(node);
        let m = self.screen_matrix(node);
        Rect::bounding(&[
            m.apply(Point::new(0.0, 0.0)),
            m.apply(Point::new(size.width, 0.0)),
            m.apply(Point::new(0.0, size.height)),
            m.apply(Point::new(size.width, size.height)),
        ])
    }

    /// Resolved style of an element.
    #[must_use]
    pub fn computed_style(&self, node: NodeId) -> ComputedStyle {
        let mut values = BTreeMap::new();
        let Some(element) = self.element(node) else {
            return ComputedStyle { values };
        };
        let style = &element.style;

        for (prop, initial) in INITIAL {
            values.insert((*prop).to_string(), (*initial).to_string());
        }
        for (prop, initial) in INHERITED {
            let inherited = self.inherited_value(node, prop);
            values.insert(
                (*prop).to_string(),
                inherited.unwrap_or_else(|| (*initial).to_string()),
            );
        }
        let display = match element.tag.as_str() {
            "span" | "img" | "a" => "inline",
            _ => "block",
        };
        values.insert("display".to_string(), display.to_string());

        for (prop, value) in style.iter() {
            values.insert(prop.to_string(), value.to_string());
        }

        if let Some(bg) = style.get("background") {
            if style.get("background-color").is_none() && !is_image_background(bg) {
                values.insert("background-color".to_string(), bg.to_string());
            }
        }
        if let Some(weight) = values.get_mut("font-weight") {
            match weight.as_str() {
                "normal" => *weight = "400".to_string(),
                "bold" => *weight = "700".to_string(),
                _ => {}
            }
        }

        let size = self.box_size(node);
        values.insert("width".to_string(), px(size.width));
        values.insert("height".to_string(), px(size.height));
        let transform = style
            .get("transform")
            .and_then(parse_transform)
            .unwrap_or(Matrix2D::IDENTITY);
        values.insert("transform".to_string(), transform.to_css());

        ComputedStyle { values }
    }

    fn inherited_value(&self, node: NodeId, prop: &str) -> Option<String> {
        let mut current = Some(node);
        while let Some(id) = current {
            if let Some(value) = self.style(id).and_then(|s| s.get(prop)) {
                if value != "inherit" {
                    return Some(value.to_string());
                }
            }
            current = self.parent(id);
        }
        None
    }
}

fn is_image_background(value: &str) -> bool {
    value.contains("gradient(") || value.contains("url(")
}

fn resolve_length(value: &str, reference: f64) -> Option<f64> {
    let v = value.trim();
    if let Some(pct) = v.strip_suffix('%') {
        return pct.trim().parse::<f64>().ok().map(|p| p / 100.0 * reference);
    }
    v.strip_suffix("px").unwrap_or(v).trim().parse().ok()
}

fn transform_origin(value: Option<&str>, size: Size) -> Point {
    let Some(value) = value else {
        return Point::new(size.width / 2.0, size.height / 2.0);
    };
    let tokens: Vec<&str> = value.split_whitespace().collect();
    let (mut x_token, mut y_token) = match tokens.as_slice() {
        [single] => (*single, "center"),
        [x, y, ..] => (*x, *y),
        [] => ("center", "center"),
    };
    if matches!(x_token, "top" | "bottom") || matches!(y_token, "left" | "right") {
        std::mem::swap(&mut x_token, &mut y_token);
    }
    let axis = |token: &str, extent: f64| match token {
        "left" | "top" => 0.0,
        "right" | "bottom" => extent,
        "center" => extent / 2.0,
        other => resolve_length(other, extent).unwrap_or(extent / 2.0),
    };
    Point::new(axis(x_token, size.width), axis(y_token, size.height))
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape a string for use inside a double-quoted attribute.
#[must_use]
pub fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

/// Format a canvas-local pixel value for an inline style.
#[must_use]
pub fn style_px(value: f64) -> String {
    format!("{}px", css_number(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positioned(doc: &mut Document, parent: NodeId, css: &str) -> NodeId {
        let node = doc.create_element("div");
        doc.set_attr(node, "style", css);
        doc.append_child(parent, node);
        node
    }

    #[test]
    fn inline_style_keeps_order_and_replaces() {
        let mut style = InlineStyle::parse("left: 10px; top: 5px; width: 20px");
        style.set("top", "7px");
        assert_eq!(style.to_css_text(), "left: 10px; top: 7px; width: 20px;");
        style.set("left", "");
        assert!(style.get("left").is_none());
    }

    #[test]
    fn camel_case_keys_become_css_names() {
        assert_eq!(css_property_name("backgroundColor"), "background-color");
        assert_eq!(css_property_name("zIndex"), "z-index");
        assert_eq!(css_property_name("border-radius"), "border-radius");
    }

    #[test]
    fn append_moves_and_remove_detaches() {
        let mut doc = Document::new();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        let child = doc.create_element("span");
        doc.append_child(doc.body(), a);
        doc.append_child(doc.body(), b);
        doc.append_child(a, child);
        doc.append_child(b, child);
        assert!(doc.children(a).is_empty());
        assert_eq!(doc.children(b), &[child]);

        doc.remove(b);
        assert!(!doc.is_connected(child));
        assert!(doc.contains(b, child));
    }

    #[test]
    fn append_under_own_descendant_is_ignored() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(outer, inner);
        doc.append_child(inner, outer);
        assert_eq!(doc.parent(inner), Some(outer));
        assert_eq!(doc.parent(outer), None);
    }

    #[test]
    fn deep_clone_copies_subtree() {
        let mut doc = Document::new();
        let body = doc.body();
        let node = positioned(&mut doc, body, "left: 1px");
        doc.set_attr(node, "id", "a");
        doc.set_text_content(node, "hello");

        let copy = doc.deep_clone(node).expect("clone");
        assert_eq!(doc.text_content(copy), "hello");
        assert_eq!(doc.attr(copy, "id"), Some("a"));
        assert!(!doc.is_connected(copy));

        doc.set_text_content(copy, "changed");
        assert_eq!(doc.text_content(node), "hello");
    }

    #[test]
    fn classes_add_and_retain() {
        let mut doc = Document::new();
        let node = doc.create_element("div");
        doc.set_attr(node, "class", "moveable-element target absolute");
        doc.add_class(node, "extra");
        doc.retain_classes(node, |c| !c.starts_with("moveable-") && c != "target");
        assert_eq!(doc.classes(node), vec!["absolute", "extra"]);
        doc.retain_classes(node, |_| false);
        assert!(doc.attr(node, "class").is_none());
    }

    #[test]
    fn serializes_markup() {
        let mut doc = Document::new();
        let body = doc.body();
        let node = positioned(&mut doc, body, "left: 1px");
        doc.set_attr(node, "id", "a\"b");
        doc.set_text_content(node, "x < y");
        let img = doc.create_element("img");
        doc.set_attr(img, "src", "data:image/png;base64,AA");
        doc.append_child(node, img);
        assert_eq!(
            doc.outer_html(node),
            "<div id=\"a&quot;b\" style=\"left: 1px;\">x &lt; y<img src=\"data:image/png;base64,AA\"></div>"
        );
    }

    #[test]
    fn query_ignores_detached_nodes() {
        let mut doc = Document::new();
        let body = doc.body();
        let node = positioned(&mut doc, body, "");
        doc.set_attr(node, "id", "target");
        doc.set_attr(node, "class", "box");
        assert_eq!(doc.query_by_id("target"), Some(node));
        assert_eq!(doc.query_by_class("box"), vec![node]);
        doc.remove(node);
        assert!(doc.query_by_id("target").is_none());
    }

    #[test]
    fn bounding_rect_follows_parents_and_scale() {
        let mut doc = Document::new();
        let body = doc.body();
        let canvas = positioned(
            &mut doc,
            body,
            "left: 100px; top: 50px; width: 800px; height: 600px; transform: scale(2); transform-origin: top left",
        );
        let child = positioned(&mut doc, canvas, "left: 10px; top: 20px; width: 30px; height: 40px");
        let rect = doc.bounding_rect(child);
        assert_eq!(rect, Rect::new(120.0, 90.0, 60.0, 80.0));
    }

    #[test]
    fn rotation_uses_center_origin() {
        let mut doc = Document::new();
        let body = doc.body();
        let node = positioned(
            &mut doc,
            body,
            "left: 0px; top: 0px; width: 100px; height: 50px; transform: rotate(90deg)",
        );
        let rect = doc.bounding_rect(node);
        assert!((rect.x - 25.0).abs() < 1e-9);
        assert!((rect.y + 25.0).abs() < 1e-9);
        assert!((rect.width - 50.0).abs() < 1e-9);
        assert!((rect.height - 100.0).abs() < 1e-9);
    }

    #[test]
    fn percent_sizes_resolve_against_parent() {
        let mut doc = Document::new();
        let body = doc.body();
        let parent = positioned(&mut doc, body, "width: 200px; height: 100px");
        let child = positioned(&mut doc, parent, "width: 100%; height: 50%");
        assert_eq!(doc.box_size(child), Size::new(200.0, 50.0));
    }

    #[test]
    fn computed_style_resolves_defaults_and_inheritance() {
        let mut doc = Document::new();
        let body = doc.body();
        let parent = positioned(&mut doc, body, "color: red; font-size: 20px");
        let child = positioned(
            &mut doc,
            parent,
            "width: 10px; background: #fff; font-weight: bold; transform: translate(3px, 4px)",
        );
        let computed = doc.computed_style(child);
        assert_eq!(computed.get("color"), Some("red"));
        assert_eq!(computed.get("font-size"), Some("20px"));
        assert_eq!(computed.get("font-weight"), Some("700"));
        assert_eq!(computed.get("background-color"), Some("#fff"));
        assert_eq!(computed.get("width"), Some("10px"));
        assert_eq!(computed.get("opacity"), Some("1"));
        assert_eq!(computed.get("transform"), Some("matrix(1, 0, 0, 1, 3, 4)"));
    }

    #[test]
    fn gradient_background_is_not_a_color() {
        let mut doc = Document::new();
        let body = doc.body();
        let node = positioned(&mut doc, body, "background: linear-gradient(red, blue)");
        assert_eq!(
            doc.computed_style(node).get("background-color"),
            Some("rgba(0, 0, 0, 0)")
        );
    }
}
