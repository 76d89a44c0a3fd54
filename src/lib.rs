//! A small legal-notice banner (privacy policy link, optional cookie note)
//! with an optional opt-out for the site's statistics script.
//!
//! The widget is configured by the `<script>` tag that loads it:
//!
//! * the `src` query is a comma separated list of flags: `cookies`, `dark`, `float`;
//! * a tag without `async` gets the banner inserted right after itself;
//! * `data-site-id` enables statistics and the opt-out link.
//!
//! The document, storage and dialogs are reached through [`page::Page`];
//! [`page::HeadlessPage`] implements it over a kuchiki tree.

pub mod config;
pub mod dom;
pub mod options;
pub mod page;
pub mod render;
pub mod stats;
pub mod storage;
pub mod theme;
pub mod view;
pub mod widget;

pub use config::Resources;
pub use options::{LayoutMode, Options};
pub use page::{HeadlessPage, Page, ReadyState};
pub use render::{RenderedPage, render_file, render_page};
pub use stats::{StatsController, StatsState};
pub use storage::{MemoryStorage, Storage};
pub use widget::{InitError, Widget, init_script};
