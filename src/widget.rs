use crate::config::Resources;
use crate::dom;
use crate::options::{self, LayoutMode, OptionWarning, Options, OptionsError, ScriptTag};
use crate::page::{self, Page};
use crate::stats::StatsController;
use crate::storage::Storage;
use crate::theme::{self, Palette};
use crate::view::View;
use kuchiki::NodeRef;
use std::rc::Rc;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum InitError {
    #[error("no current script; the environment probably lacks document.currentScript")]
    NoCurrentScript,
    #[error(transparent)]
    Options(#[from] OptionsError),
}

/// One legal banner bound to its hosting script tag.
pub struct Widget {
    page: Rc<dyn Page>,
    storage: Option<Rc<dyn Storage>>,
    resources: Rc<Resources>,
    options: Options,
    warnings: Vec<OptionWarning>,
    palette: Palette,
    view: View,
    stats: Option<StatsController>,
    mounted: Option<oneshot::Receiver<LayoutMode>>,
}

impl Widget {
    /// Resolves options and palette and builds the unstyled subtree.
    pub fn from_script_tag(
        page: Rc<dyn Page>,
        script: &NodeRef,
        resources: Rc<Resources>,
    ) -> Result<Self, InitError> {
        let tag = ScriptTag::read(script, &resources);
        let storage = page.local_storage();
        let resolution = options::resolve_options(&tag, page.location(), storage.is_some())?;
        let options = resolution.options;
        let palette =
            theme::resolve_palette(options.dark, options.float, options.element.is_some());
        let view = View::build(&options, &resources);
        Ok(Self {
            page,
            storage,
            resources,
            options,
            warnings: resolution.warnings,
            palette,
            view,
            stats: None,
            mounted: None,
        })
    }

    /// Starts stats (when a site id is configured), styles the subtree and
    /// attaches it once the document is ready.
    pub fn run(&mut self) {
        let layout = self.options.layout();

        // A site id only survives option resolution when storage was present.
        if let (Some(site_id), Some(storage)) =
            (self.options.site_id.clone(), self.storage.clone())
        {
            let link_color = (layout != LayoutMode::Anchored).then_some(self.palette.link);
            let stats = StatsController::new(
                self.page.clone(),
                storage,
                self.resources.clone(),
                site_id,
                self.view.opt_out.clone(),
                link_color,
            );
            stats.start();
            self.stats = Some(stats);
        }

        self.view
            .apply_style(&self.options, &self.palette, &self.resources);

        let (tx, rx) = oneshot::channel();
        self.mounted = Some(rx);
        let node = self.view.mount_node(layout).clone();
        let anchor = self.options.element.clone();
        let weak_page = Rc::downgrade(&self.page);
        page::on_dom_ready(
            self.page.as_ref(),
            Box::new(move || {
                let Some(page) = weak_page.upgrade() else {
                    return;
                };
                if attach(page.as_ref(), &node, anchor.as_ref()) {
                    debug!(?layout, "legal banner attached");
                    let _ = tx.send(layout);
                }
            }),
        );
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn warnings(&self) -> &[OptionWarning] {
        &self.warnings
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn stats(&self) -> Option<&StatsController> {
        self.stats.as_ref()
    }

    pub fn layout(&self) -> LayoutMode {
        self.options.layout()
    }

    /// Resolves with the layout once the banner is in the document. The
    /// sender is dropped if attaching fails.
    pub fn take_mounted(&mut self) -> Option<oneshot::Receiver<LayoutMode>> {
        self.mounted.take()
    }
}

fn attach(page: &dyn Page, node: &NodeRef, anchor: Option<&NodeRef>) -> bool {
    match anchor {
        Some(anchor) => match dom::insert_after(node, anchor) {
            Ok(()) => true,
            Err(err) => {
                error!(%err, "failed to insert legal banner");
                false
            }
        },
        None => match page.body() {
            Some(body) => {
                body.append(node.clone());
                true
            }
            None => {
                error!("document has no body; legal banner not attached");
                false
            }
        },
    }
}

/// Creates and runs the widget for the script that is currently executing.
pub fn init_script(page: Rc<dyn Page>, resources: Rc<Resources>) -> Result<Widget, InitError> {
    let Some(script) = page.current_script() else {
        error!("something went wrong loading the legal script; bailing out");
        return Err(InitError::NoCurrentScript);
    };
    let mut widget = Widget::from_script_tag(page, &script, resources).inspect_err(|err| {
        error!(%err, "legal script cannot start; bailing out");
    })?;
    widget.run();
    Ok(widget)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{HeadlessPage, ReadyState};
    use crate::stats::StatsState;
    use crate::storage::{MemoryStorage, Storage};
    use tokio::sync::oneshot::error::TryRecvError;
    use tracing_subscriber::EnvFilter;
    use url::Url;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn page_with(script: &str, storage: Option<Rc<MemoryStorage>>) -> Rc<HeadlessPage> {
        init_tracing();
        let html = format!(
            "<html><head><title>t</title></head><body><p id=before>x</p>{script}<p id=after>y</p></body></html>"
        );
        let mut page = HeadlessPage::parse(&html, Url::parse("https://example.com/blog/").unwrap());
        if let Some(storage) = storage {
            page = page.with_storage(storage);
        }
        let page = Rc::new(page);
        page.set_current_script(dom::select_first(&page.document(), "script"));
        page
    }

    fn start(page: &Rc<HeadlessPage>) -> Widget {
        init_script(page.clone(), Rc::new(Resources::default())).unwrap()
    }

    fn head_scripts(page: &HeadlessPage) -> usize {
        page.document()
            .select("head script")
            .map(|found| found.count())
            .unwrap_or(0)
    }

    #[test]
    fn scenario_anchored_dark_without_stats() {
        let page = page_with(
            r#"<script src="https://cdn.example.com/legal.js?dark,float"></script>"#,
            Some(Rc::new(MemoryStorage::new())),
        );
        page.set_ready_state(ReadyState::Interactive);
        let widget = start(&page);

        let opts = widget.options();
        assert!(opts.dark);
        assert!(opts.float);
        assert!(opts.element.is_some());
        assert_eq!(widget.layout(), LayoutMode::Anchored);
        assert!(widget.stats().is_none());
        assert!(widget.view().opt_out.first_child().is_none());

        let script = dom::select_first(&page.document(), "script").unwrap();
        let next = script.next_sibling().unwrap();
        assert!(dom::same_node(&next, &widget.view().banner));
        assert!(dom::attribute(&widget.view().banner, "style").is_none());
        assert_eq!(head_scripts(&page), 0);
    }

    #[test]
    fn scenario_fixed_with_stats() {
        let storage = Rc::new(MemoryStorage::new());
        let page = page_with(
            r#"<script async src="/static/legal.js" data-site-id="site-1"></script>"#,
            Some(storage.clone()),
        );
        page.set_ready_state(ReadyState::Interactive);
        let widget = start(&page);

        assert_eq!(widget.layout(), LayoutMode::Fixed);
        let stats = widget.stats().unwrap();
        assert_eq!(stats.state(), StatsState::Tracking);
        assert!(stats.is_script_attached());
        assert_eq!(head_scripts(&page), 1);
        assert_eq!(
            widget.view().opt_out.text_contents(),
            "Opt-Out of Stats. "
        );

        let body = page.body().unwrap();
        let last = body.last_child().unwrap();
        assert!(dom::same_node(&last, &widget.view().container));
        assert_eq!(
            dom::style(&widget.view().container, "position").as_deref(),
            Some("fixed")
        );
        assert!(storage.get_item(&Resources::default().opt_out_key).is_none());
    }

    #[test]
    fn scenario_no_storage_disables_stats() {
        let page = page_with(
            r#"<script async src="/static/legal.js" data-site-id="site-1"></script>"#,
            None,
        );
        page.set_ready_state(ReadyState::Interactive);
        let widget = start(&page);

        assert!(widget.options().site_id.is_none());
        assert_eq!(
            widget.warnings(),
            &[
                OptionWarning::StorageUnavailable,
                OptionWarning::AssumedOptOut
            ]
        );
        assert!(widget.stats().is_none());
        assert!(widget.view().opt_out.first_child().is_none());
        assert_eq!(head_scripts(&page), 0);
    }

    #[test]
    fn previous_opt_out_is_honoured() {
        let storage = Rc::new(MemoryStorage::new());
        let res = Resources::default();
        storage.set_item(&res.opt_out_key, &res.opt_out_value);
        let page = page_with(
            r#"<script async src="/legal.js?float" data-site-id="site-1"></script>"#,
            Some(storage),
        );
        page.set_ready_state(ReadyState::Interactive);
        let widget = start(&page);

        assert_eq!(widget.layout(), LayoutMode::Floating);
        assert_eq!(widget.stats().unwrap().state(), StatsState::OptedOut);
        assert_eq!(head_scripts(&page), 0);
        assert_eq!(
            widget.view().opt_out.text_contents(),
            "Undo Opt-Out of Stats. "
        );
    }

    #[test]
    fn attachment_waits_for_content_loaded() {
        let page = page_with(r#"<script async src="/legal.js"></script>"#, None);
        let mut widget = start(&page);
        let mut mounted = widget.take_mounted().unwrap();

        assert!(widget.view().container.parent().is_none());
        assert!(matches!(mounted.try_recv(), Err(TryRecvError::Empty)));

        page.set_ready_state(ReadyState::Interactive);
        assert!(widget.view().container.parent().is_some());
        assert_eq!(mounted.try_recv().unwrap(), LayoutMode::Fixed);
    }

    #[tokio::test]
    async fn mounted_resolves_after_attach() {
        let page = page_with(r#"<script src="/legal.js"></script>"#, None);
        let mut widget = start(&page);
        let mounted = widget.take_mounted().unwrap();
        page.set_ready_state(ReadyState::Complete);
        assert_eq!(mounted.await.unwrap(), LayoutMode::Anchored);
    }

    #[test]
    fn orphan_anchor_drops_mount_signal() {
        init_tracing();
        let page = Rc::new(HeadlessPage::parse(
            "<html><body></body></html>",
            Url::parse("https://example.com/").unwrap(),
        ));
        let loose = dom::create_element("script");
        dom::set_attribute(&loose, "src", "/legal.js");
        page.set_current_script(Some(loose));
        page.set_ready_state(ReadyState::Interactive);

        let mut widget = start(&page);
        let mut mounted = widget.take_mounted().unwrap();
        assert!(matches!(mounted.try_recv(), Err(TryRecvError::Closed)));
        assert!(page.body().unwrap().first_child().is_none());
    }

    #[test]
    fn missing_src_aborts_without_partial_widget() {
        let page = page_with(r#"<script async data-site-id="site-1"></script>"#, None);
        page.set_ready_state(ReadyState::Interactive);
        let before = page.to_html();
        let err = init_script(page.clone(), Rc::new(Resources::default())).err();
        assert!(matches!(
            err,
            Some(InitError::Options(OptionsError::MissingSrc))
        ));
        assert_eq!(page.to_html(), before);
    }

    #[test]
    fn missing_current_script_aborts() {
        let page = page_with("", None);
        page.set_current_script(None);
        let err = init_script(page.clone(), Rc::new(Resources::default())).err();
        assert!(matches!(err, Some(InitError::NoCurrentScript)));
    }
}
