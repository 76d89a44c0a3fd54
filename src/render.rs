//! Runs the widget over a complete HTML document without a browser, the
//! way a page would execute it while loading.

use crate::config::Resources;
use crate::dom;
use crate::page::{HeadlessPage, Page, ReadyState};
use crate::storage::Storage;
use crate::widget;
use anyhow::Context;
use kuchiki::NodeRef;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub html: String,
    /// Number of banners that ended up in the document.
    pub mounted: usize,
}

/// Executes every hosting script tag in `html` and serialises the result.
///
/// Without `storage` no site identifier survives option resolution, so the
/// output never carries a tracking script.
pub fn render_page(
    html: &str,
    location: Url,
    storage: Option<Rc<dyn Storage>>,
    resources: Rc<Resources>,
) -> RenderedPage {
    let mut page = HeadlessPage::parse(html, location);
    if let Some(storage) = storage {
        page = page.with_storage(storage);
    }
    let page = Rc::new(page);

    let scripts = hosting_scripts(page.as_ref(), &resources);
    debug!(count = scripts.len(), "found legal script tags");

    let mut widgets = Vec::new();
    for script in scripts {
        page.set_current_script(Some(script));
        match widget::init_script(page.clone(), resources.clone()) {
            Ok(widget) => widgets.push(widget),
            Err(err) => warn!(%err, "legal script tag skipped"),
        }
    }
    page.set_current_script(None);
    page.set_ready_state(ReadyState::Interactive);

    let mounted = widgets
        .iter_mut()
        .filter_map(|widget| widget.take_mounted())
        .filter_map(|mut rx| rx.try_recv().ok())
        .count();

    RenderedPage {
        html: page.to_html(),
        mounted,
    }
}

pub async fn render_file(
    path: &Path,
    location: Url,
    storage: Option<Rc<dyn Storage>>,
    resources: Rc<Resources>,
) -> anyhow::Result<RenderedPage> {
    let html = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading html {path:?}"))?;
    Ok(render_page(&html, location, storage, resources))
}

/// `<script src>` tags whose resolved path ends in the widget's file name.
fn hosting_scripts(page: &dyn Page, resources: &Resources) -> Vec<NodeRef> {
    let Ok(found) = page.document().select("script[src]") else {
        return Vec::new();
    };
    found
        .map(|script| script.as_node().clone())
        .filter(|node| {
            dom::attribute(node, "src")
                .and_then(|src| page.location().join(&src).ok())
                .and_then(|url| {
                    url.path_segments()
                        .and_then(|mut segments| segments.next_back().map(str::to_string))
                })
                .is_some_and(|name| name == resources.script_name)
        })
        .collect()
}
