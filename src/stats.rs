//! Stats opt-out: persists the visitor's choice, attaches the tracking
//! script while tracking is allowed and keeps the opt-out link in sync.

use crate::config::Resources;
use crate::dom;
use crate::page::Page;
use crate::storage::Storage;
use kuchiki::NodeRef;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsState {
    Tracking,
    OptedOut,
}

impl StatsState {
    pub fn toggled(self) -> Self {
        match self {
            Self::Tracking => Self::OptedOut,
            Self::OptedOut => Self::Tracking,
        }
    }
}

/// Outcome of trying to unload the tracking script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detach {
    /// Nothing was attached in this page session.
    NotAttached,
    /// The visitor postponed the reload; the script keeps running until then.
    Declined,
    Reloading,
}

/// Cheap handle; clones share the same controller.
#[derive(Clone)]
pub struct StatsController {
    shared: Rc<Shared>,
}

struct Shared {
    page: Rc<dyn Page>,
    storage: Rc<dyn Storage>,
    resources: Rc<Resources>,
    site_id: String,
    slot: NodeRef,
    link_color: Option<&'static str>,
    state: Cell<StatsState>,
    script: RefCell<Option<NodeRef>>,
}

impl StatsController {
    /// Reads the persisted choice; nothing is attached or rendered until
    /// [`StatsController::start`].
    pub fn new(
        page: Rc<dyn Page>,
        storage: Rc<dyn Storage>,
        resources: Rc<Resources>,
        site_id: String,
        slot: NodeRef,
        link_color: Option<&'static str>,
    ) -> Self {
        let state = persisted_state(storage.as_ref(), &resources);
        Self {
            shared: Rc::new(Shared {
                page,
                storage,
                resources,
                site_id,
                slot,
                link_color,
                state: Cell::new(state),
                script: RefCell::new(None),
            }),
        }
    }

    pub fn state(&self) -> StatsState {
        self.shared.state.get()
    }

    /// Applies the initial state: opt-out link plus attach or detach.
    pub fn start(&self) {
        debug!(site_id = %self.shared.site_id, state = ?self.state(), "starting stats");
        self.set_state(self.state());
    }

    pub fn toggle(&self) {
        self.set_state(self.state().toggled());
    }

    pub fn set_state(&self, next: StatsState) {
        let res = &self.shared.resources;
        match next {
            StatsState::Tracking => self.shared.storage.remove_item(&res.opt_out_key),
            StatsState::OptedOut => self
                .shared
                .storage
                .set_item(&res.opt_out_key, &res.opt_out_value),
        }
        self.shared.state.set(next);
        self.render_link();
        match next {
            StatsState::Tracking => self.attach_script(),
            StatsState::OptedOut => {
                let outcome = self.detach_script();
                debug!(?outcome, "stats opt-out applied");
            }
        }
    }

    pub fn is_script_attached(&self) -> bool {
        self.shared.script.borrow().is_some()
    }

    pub fn attach_script(&self) {
        if self.is_script_attached() {
            return;
        }
        let Some(head) = self.shared.page.head() else {
            error!("document has no head; tracking script not attached");
            return;
        };
        let res = &self.shared.resources;
        let script = dom::create_element("script");
        dom::set_attribute(&script, &res.tracker_server_attr, &res.tracker_server);
        dom::set_attribute(&script, &res.tracker_site_attr, &self.shared.site_id);
        dom::set_attribute(&script, "async", "");
        dom::set_attribute(&script, "src", &res.tracker_script_url());
        head.append(script.clone());
        info!(site_id = %self.shared.site_id, "tracking script attached");
        *self.shared.script.borrow_mut() = Some(script);
    }

    /// A loaded script cannot be unloaded in place, so the page must reload;
    /// the visitor decides when.
    pub fn detach_script(&self) -> Detach {
        if !self.is_script_attached() {
            return Detach::NotAttached;
        }
        if !self.shared.page.confirm(&self.shared.resources.reload_prompt) {
            info!("reload declined; opt-out applies on next page load");
            return Detach::Declined;
        }
        self.shared.page.reload();
        Detach::Reloading
    }

    /// Rebuilds the opt-out slot. The click handler targets the opposite state.
    fn render_link(&self) {
        let res = &self.shared.resources;
        let state = self.state();
        let label = match state {
            StatsState::Tracking => &res.stats_on_label,
            StatsState::OptedOut => &res.stats_off_label,
        };

        let link = dom::create_element("a");
        dom::set_attribute(&link, "href", "javascript:void");
        if let Some(color) = self.shared.link_color {
            dom::set_style(&link, "color", color);
        }
        link.append(dom::text(label));

        let target = state.toggled();
        let weak: Weak<Shared> = Rc::downgrade(&self.shared);
        self.shared.page.add_click_listener(
            &link,
            Rc::new(move || {
                if let Some(shared) = weak.upgrade() {
                    StatsController { shared }.set_state(target);
                }
            }),
        );

        let slot = &self.shared.slot;
        for old in slot.children() {
            self.shared.page.remove_click_listeners(&old);
        }
        dom::clear_children(slot);
        slot.append(link);
        slot.append(dom::text(&res.stats_suffix));
    }

    pub fn opt_out_link(&self) -> Option<NodeRef> {
        self.shared.slot.first_child()
    }
}

fn persisted_state(storage: &dyn Storage, resources: &Resources) -> StatsState {
    match storage.get_item(&resources.opt_out_key) {
        Some(value) if value == resources.opt_out_value => StatsState::OptedOut,
        _ => StatsState::Tracking,
    }
}
