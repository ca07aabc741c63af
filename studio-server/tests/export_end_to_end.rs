//! Full export: editing surface → pipeline → render server → download.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeBrowser, TestServer, FAKE_PNG};
use studio_core::{
    ComponentCatalog, EditingSurface, ElementKind, MemoryStorage, Point, PropMap, SurfaceConfig,
};
use studio_export::{ExportConfig, ExportPipeline, HttpCollaborator, MemorySink};

fn surface() -> EditingSurface {
    EditingSurface::with_canvas(
        SurfaceConfig::default(),
        Arc::new(ComponentCatalog::standard()),
        Arc::new(MemoryStorage::new()),
    )
}

fn pipeline(server: &TestServer, sink: Arc<MemorySink>) -> ExportPipeline {
    ExportPipeline::with_config(
        Arc::new(HttpCollaborator::new(server.base_url()).expect("client")),
        sink,
        ExportConfig {
            settle_delay: Duration::from_millis(1),
            restore_delay: Duration::ZERO,
            ..ExportConfig::default()
        },
    )
}

// ==========================================================================
// Export through the real server
// ==========================================================================

#[tokio::test]
async fn test_export_renders_canvas_and_downloads_png() {
    let browser = Arc::new(FakeBrowser::new(Some(1)));
    let server = TestServer::start(browser.clone()).await;

    let mut surface = surface();
    let rect = surface
        .add_element(ElementKind::Rectangle, Some(Point::new(30.0, 40.0)))
        .expect("rect");
    let prism = surface
        .add_component("Prism", &PropMap::new(), None)
        .expect("prism");
    surface.select(&rect);

    let sink = Arc::new(MemorySink::new());
    let report = pipeline(&server, sink.clone())
        .run(&mut surface)
        .await
        .expect("export");

    assert!(!report.degraded());
    assert_eq!(report.components, 1);
    assert_eq!(sink.downloads(), vec![(report.file_name.clone(), FAKE_PNG.to_vec())]);

    let document =
        std::fs::read_to_string(server.render_dir().join("render.html")).expect("render document");
    assert!(document.contains(rect.as_str()));
    assert!(document.contains(&format!("data-component-id=\"{}\"", prism.as_str())));
    assert!(document.contains("id=\"render-canvas\""));
    assert!(!document.contains("id=\"render-ready\""));

    assert_eq!(browser.opened().len(), 1);
    assert!(surface.selection().contains(&rect));
    assert_eq!(
        surface.last_export().expect("read").map(|e| e.file_name),
        Some(report.file_name)
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_export_without_browser_is_reported_and_recoverable() {
    let server = TestServer::start(Arc::new(studio_server::UnavailableBrowser)).await;

    let mut surface = surface();
    let id = surface.add_element(ElementKind::Circle, None).expect("circle");

    let sink = Arc::new(MemorySink::new());
    let err = pipeline(&server, sink.clone())
        .run(&mut surface)
        .await
        .expect_err("should fail");
    assert!(err.user_message().contains("Chrome browser not found"));
    assert!(sink.downloads().is_empty());
    assert!(surface.selection().contains(&id));
    surface.check_integrity().expect("surface intact");

    server.shutdown().await;
}
