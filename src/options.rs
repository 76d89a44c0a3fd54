use crate::config::Resources;
use crate::dom;
use kuchiki::NodeRef;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Marker attribute distinguishing a floating widget from an anchored one.
pub const ASYNC_ATTR: &str = "async";

/// Flags that may appear in the query of the widget's `src`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlOption {
    Cookies,
    Dark,
    Float,
}

impl UrlOption {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "cookies" => Some(Self::Cookies),
            "dark" => Some(Self::Dark),
            "float" => Some(Self::Float),
            _ => None,
        }
    }
}

/// How the banner is placed on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    /// Inline, right after the hosting script tag; styled by the host page.
    Anchored,
    /// Full-width strip appended to the end of the body.
    Floating,
    /// Rounded box pinned to the bottom-right corner of the viewport.
    Fixed,
}

/// Validated widget configuration. Built once by [`resolve_options`].
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub cookies: bool,
    pub dark: bool,
    pub float: bool,
    /// Element to insert the banner after.
    pub element: Option<NodeRef>,
    pub site_id: Option<String>,
}

impl Options {
    pub fn layout(&self) -> LayoutMode {
        match (self.element.is_some(), self.float) {
            (true, _) => LayoutMode::Anchored,
            (false, true) => LayoutMode::Floating,
            (false, false) => LayoutMode::Fixed,
        }
    }

    fn enable(&mut self, option: UrlOption) {
        match option {
            UrlOption::Cookies => self.cookies = true,
            UrlOption::Dark => self.dark = true,
            UrlOption::Float => self.float = true,
        }
    }
}

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("missing 'src' attribute of script")]
    MissingSrc,
    #[error("script src {src:?} cannot be resolved: {source}")]
    InvalidSrc {
        src: String,
        #[source]
        source: url::ParseError,
    },
}

/// Non-fatal findings while resolving options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionWarning {
    #[error("option '{0}' is not known")]
    UnknownOption(String),
    #[error("local storage is not supported by this browser")]
    StorageUnavailable,
    #[error("assuming that the user has opted out of statistics to be safe")]
    AssumedOptOut,
}

/// The attributes of a hosting `<script>` tag that drive configuration.
#[derive(Debug, Clone)]
pub struct ScriptTag {
    pub node: NodeRef,
    pub src: Option<String>,
    pub is_async: bool,
    pub site_id: Option<String>,
}

impl ScriptTag {
    pub fn read(node: &NodeRef, resources: &Resources) -> Self {
        Self {
            node: node.clone(),
            src: dom::attribute(node, "src"),
            is_async: dom::has_attribute(node, ASYNC_ATTR),
            site_id: dom::attribute(node, &resources.site_id_attr),
        }
    }
}

#[derive(Debug)]
pub struct Resolution {
    pub options: Options,
    pub warnings: Vec<OptionWarning>,
}

/// Turns a hosting script tag into validated [`Options`].
///
/// `base` is the page location used to resolve a relative `src`.
/// `storage_available` reports whether the environment can persist an
/// opt-out; without it the site identifier is dropped so that nobody is
/// tracked who cannot opt out.
pub fn resolve_options(
    tag: &ScriptTag,
    base: &Url,
    storage_available: bool,
) -> Result<Resolution, OptionsError> {
    let src = tag.src.as_deref().ok_or(OptionsError::MissingSrc)?;
    let url = base.join(src).map_err(|source| OptionsError::InvalidSrc {
        src: src.to_string(),
        source,
    })?;

    let mut options = Options::default();
    let mut warnings = Vec::new();

    // An empty entry comes from a missing or bare `?`.
    for name in url.query().unwrap_or_default().split(',') {
        if name.is_empty() {
            continue;
        }
        match UrlOption::parse(name) {
            Some(option) => options.enable(option),
            None => record(&mut warnings, OptionWarning::UnknownOption(name.to_string())),
        }
    }

    if !tag.is_async {
        options.element = Some(tag.node.clone());
    }

    options.site_id = tag.site_id.clone().filter(|id| !id.is_empty());

    if !storage_available && options.site_id.is_some() {
        record(&mut warnings, OptionWarning::StorageUnavailable);
        record(&mut warnings, OptionWarning::AssumedOptOut);
        options.site_id = None;
    }

    if options.element.is_some() {
        options.float = true;
    }

    debug!(
        cookies = options.cookies,
        dark = options.dark,
        float = options.float,
        anchored = options.element.is_some(),
        site_id = ?options.site_id,
        "resolved widget options"
    );
    Ok(Resolution { options, warnings })
}

fn record(warnings: &mut Vec<OptionWarning>, warning: OptionWarning) {
    warn!(%warning, "legal widget configuration");
    warnings.push(warning);
}
