//! Render document generation.
//!
//! Produces a standalone HTML page from a [`CanvasSnapshot`]: inlined CSS,
//! the literal canvas markup, components re-instantiated by name at their
//! absolute positions, and a readiness sentinel appended only after mount.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::ComponentCatalog;
use crate::dom::{css_property_name, escape_attr};
use crate::extract::{CanvasSnapshot, ComponentDescriptor};
use crate::geometry::{css_number, CanvasSize};

/// Route the render server serves the document on.
pub const RENDER_ROUTE: &str = "/render";

/// Id of the canvas container in the render document.
pub const RENDER_CANVAS_ID: &str = "render-canvas";

/// Id of the readiness sentinel.
pub const READY_SENTINEL_ID: &str = "render-ready";

/// Id of the document root.
pub const ROOT_ID: &str = "root";

/// Id of the embedded metadata block.
pub const METADATA_ID: &str = "render-metadata";

/// Default file name of the render document.
pub const DEFAULT_DOCUMENT_NAME: &str = "render.html";

/// Metadata embedded in the render document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderMetadata {
    /// Logical canvas size.
    pub canvas_size: CanvasSize,
    /// Zoom applied to the canvas container.
    pub zoom: f64,
    /// Distinct routes components mount on.
    pub component_routes: Vec<String>,
    /// Component names in document order.
    pub detected_components: Vec<String>,
    /// Generation time in milliseconds.
    pub last_generated: u64,
}

/// A generated render document.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderDocument {
    /// Full page source.
    pub html: String,
    /// Embedded metadata.
    pub metadata: RenderMetadata,
}

const MOUNT_SCRIPT: &str = r"(function () {
  function signalReady() {
    if (document.getElementById('render-ready')) { return; }
    var sentinel = document.createElement('div');
    sentinel.id = 'render-ready';
    sentinel.setAttribute('data-timestamp', String(Date.now()));
    sentinel.style.cssText = 'position:absolute;top:-9999px;left:-9999px;opacity:0;pointer-events:none;';
    sentinel.textContent = 'ready';
    document.body.appendChild(sentinel);
  }
  function mounted() {
    var hosts = document.querySelectorAll('[data-component-host]');
    for (var i = 0; i < hosts.length; i++) { hosts[i].setAttribute('data-mounted', 'true'); }
    window.requestAnimationFrame(function () { window.requestAnimationFrame(signalReady); });
  }
  if (document.readyState === 'complete') { mounted(); } else { window.addEventListener('load', mounted); }
})();";

impl RenderDocument {
    /// Build the document for a snapshot.
    #[must_use]
    pub fn generate(
        snapshot: &CanvasSnapshot,
        catalog: &ComponentCatalog,
        generated_at_ms: u64,
    ) -> Self {
        let mut routes: Vec<String> = Vec::new();
        for descriptor in &snapshot.components {
            if !routes.contains(&descriptor.route) {
                routes.push(descriptor.route.clone());
            }
        }
        let metadata = RenderMetadata {
            canvas_size: snapshot.canvas_size,
            zoom: snapshot.zoom,
            component_routes: routes,
            detected_components: snapshot.components.iter().map(|c| c.name.clone()).collect(),
            last_generated: generated_at_ms,
        };

        let components: String = snapshot
            .components
            .iter()
            .map(|c| component_markup(c, catalog))
            .collect();
        let metadata_json = serde_json::to_string(&metadata)
            .unwrap_or_else(|_| "{}".to_string())
            .replace("</", "<\\/");

        let html = format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Canvas render</title>
<style>
html, body {{ margin: 0; padding: 0; background: transparent; }}
#{root} {{ position: relative; }}
.render-canvas {{
  width: {width}px;
  height: {height}px;
  transform: scale({zoom});
  transform-origin: top left;
  position: relative;
  background: transparent;
  overflow: hidden;
}}
.render-literal {{ position: absolute; left: 0; top: 0; width: 100%; height: 100%; }}
.studio-component {{ position: absolute; pointer-events: none; }}
{styles}
</style>
</head>
<body>
<div id="{root}">
<div id="{canvas}" class="render-canvas">
<div class="render-literal">{literal}</div>
{components}</div>
</div>
<script type="application/json" id="{metadata_id}">{metadata_json}</script>
<script>
{script}
</script>
</body>
</html>
"#,
            root = ROOT_ID,
            canvas = RENDER_CANVAS_ID,
            width = css_number(snapshot.canvas_size.width),
            height = css_number(snapshot.canvas_size.height),
            zoom = css_number(snapshot.zoom),
            styles = snapshot.styles.replace("</", "<\\/"),
            literal = snapshot.html_content,
            metadata_id = METADATA_ID,
            script = MOUNT_SCRIPT,
        );

        Self { html, metadata }
    }
}

fn component_markup(descriptor: &ComponentDescriptor, catalog: &ComponentCatalog) -> String {
    let mut props = descriptor.props.as_object().cloned().unwrap_or_default();
    let style = props
        .remove("style")
        .and_then(|s| s.as_object().cloned())
        .map(|style| {
            style
                .iter()
                .filter_map(|(key, value)| {
                    let value = match value {
                        Value::String(s) => s.clone(),
                        Value::Number(n) => n.to_string(),
                        _ => return None,
                    };
                    Some(format!("{}: {value};", css_property_name(key)))
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    let inner = catalog.render_markup(&descriptor.name, &props).unwrap_or_else(|| {
        tracing::warn!(name = %descriptor.name, "No implementation, rendering placeholder");
        format!(
            "<div class=\"studio-component-placeholder\">{}</div>",
            escape_attr(&descriptor.name)
        )
    });
    let props_json = serde_json::to_string(&Value::Object(props)).unwrap_or_default();

    format!(
        "<div class=\"studio-component\" data-component-host=\"{name}\" data-component-id=\"{id}\" data-props=\"{props}\" style=\"{style}\">{inner}</div>\n",
        name = escape_attr(&descriptor.name),
        id = escape_attr(&descriptor.id),
        props = escape_attr(&props_json),
    )
}
