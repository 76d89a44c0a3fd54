//! The hosting page as seen by the widget, plus a headless implementation
//! over a kuchiki document.

use crate::dom;
use crate::storage::Storage;
use kuchiki::NodeRef;
use kuchiki::traits::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

pub type Continuation = Box<dyn FnOnce()>;
pub type ClickHandler = Rc<dyn Fn()>;

/// Capabilities the widget needs from the document environment.
pub trait Page {
    fn document(&self) -> NodeRef;
    fn location(&self) -> &Url;
    /// The `<script>` element currently being executed, if the environment can tell.
    fn current_script(&self) -> Option<NodeRef>;
    fn ready_state(&self) -> ReadyState;
    /// Registers `continuation` to run once, when the document leaves `Loading`.
    fn on_content_loaded(&self, continuation: Continuation);
    /// `None` when the environment has no persistent storage.
    fn local_storage(&self) -> Option<Rc<dyn Storage>>;
    fn add_click_listener(&self, node: &NodeRef, handler: ClickHandler);
    /// Drops every listener registered on `node`.
    fn remove_click_listeners(&self, node: &NodeRef);
    fn confirm(&self, message: &str) -> bool;
    fn reload(&self);

    fn head(&self) -> Option<NodeRef> {
        dom::select_first(&self.document(), "head")
    }

    fn body(&self) -> Option<NodeRef> {
        dom::select_first(&self.document(), "body")
    }
}

/// Runs `continuation` now if the document is at least interactive,
/// otherwise once the content-loaded transition happens.
pub fn on_dom_ready(page: &dyn Page, continuation: Continuation) {
    match page.ready_state() {
        ReadyState::Loading => page.on_content_loaded(continuation),
        ReadyState::Interactive | ReadyState::Complete => continuation(),
    }
}

/// A page without a browser: kuchiki holds the tree, everything interactive
/// (confirm dialogs, reloads, clicks) is scripted by the embedder.
pub struct HeadlessPage {
    document: NodeRef,
    location: Url,
    ready_state: Cell<ReadyState>,
    current_script: RefCell<Option<NodeRef>>,
    pending: RefCell<Vec<Continuation>>,
    storage: Option<Rc<dyn Storage>>,
    listeners: RefCell<Vec<(NodeRef, ClickHandler)>>,
    confirm_answer: Cell<bool>,
    prompts: RefCell<Vec<String>>,
    reloads: Cell<usize>,
}

impl HeadlessPage {
    /// Parses `html`; the page starts out `Loading`.
    pub fn parse(html: &str, location: Url) -> Self {
        Self {
            document: kuchiki::parse_html().one(html),
            location,
            ready_state: Cell::new(ReadyState::Loading),
            current_script: RefCell::new(None),
            pending: RefCell::new(Vec::new()),
            storage: None,
            listeners: RefCell::new(Vec::new()),
            confirm_answer: Cell::new(false),
            prompts: RefCell::new(Vec::new()),
            reloads: Cell::new(0),
        }
    }

    pub fn with_storage(mut self, storage: Rc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn set_current_script(&self, script: Option<NodeRef>) {
        *self.current_script.borrow_mut() = script;
    }

    /// Leaving `Loading` fires every registered continuation exactly once.
    pub fn set_ready_state(&self, state: ReadyState) {
        let previous = self.ready_state.replace(state);
        if previous != ReadyState::Loading || state == ReadyState::Loading {
            return;
        }
        let pending = std::mem::take(&mut *self.pending.borrow_mut());
        debug!(count = pending.len(), "content loaded; running continuations");
        for continuation in pending {
            continuation();
        }
    }

    /// Answer returned by subsequent `confirm` prompts.
    pub fn set_confirm_answer(&self, answer: bool) {
        self.confirm_answer.set(answer);
    }

    /// Dispatches a click to every listener registered on `node`.
    /// Returns how many handlers ran; nodes outside the document get none.
    pub fn click(&self, node: &NodeRef) -> usize {
        self.listeners
            .borrow_mut()
            .retain(|(target, _)| self.is_connected(target));
        if !self.is_connected(node) {
            debug!("click on a node outside the document ignored");
            return 0;
        }
        let handlers: Vec<ClickHandler> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(target, _)| dom::same_node(target, node))
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in &handlers {
            handler();
        }
        handlers.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn is_connected(&self, node: &NodeRef) -> bool {
        node.inclusive_ancestors()
            .any(|ancestor| dom::same_node(&ancestor, &self.document))
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn reload_count(&self) -> usize {
        self.reloads.get()
    }

    pub fn to_html(&self) -> String {
        self.document.to_string()
    }
}

impl Page for HeadlessPage {
    fn document(&self) -> NodeRef {
        self.document.clone()
    }

    fn location(&self) -> &Url {
        &self.location
    }

    fn current_script(&self) -> Option<NodeRef> {
        self.current_script.borrow().clone()
    }

    fn ready_state(&self) -> ReadyState {
        self.ready_state.get()
    }

    fn on_content_loaded(&self, continuation: Continuation) {
        self.pending.borrow_mut().push(continuation);
    }

    fn local_storage(&self) -> Option<Rc<dyn Storage>> {
        self.storage.clone()
    }

    fn add_click_listener(&self, node: &NodeRef, handler: ClickHandler) {
        self.listeners.borrow_mut().push((node.clone(), handler));
    }

    fn remove_click_listeners(&self, node: &NodeRef) {
        self.listeners
            .borrow_mut()
            .retain(|(target, _)| !dom::same_node(target, node));
    }

    fn confirm(&self, message: &str) -> bool {
        self.prompts.borrow_mut().push(message.to_string());
        self.confirm_answer.get()
    }

    fn reload(&self) {
        info!(location = %self.location, "page reload requested");
        self.reloads.set(self.reloads.get() + 1);
    }
}
