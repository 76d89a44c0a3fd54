use crate::config::Resources;
use crate::dom::{self, set_style};
use crate::options::{LayoutMode, Options};
use crate::theme::Palette;
use kuchiki::NodeRef;

/// The widget's subtree: container > banner > [prefix, link, suffix, opt-out slot].
#[derive(Debug, Clone)]
pub struct View {
    pub container: NodeRef,
    pub banner: NodeRef,
    pub link: NodeRef,
    /// Children are replaced wholesale by the stats controller.
    pub opt_out: NodeRef,
}

impl View {
    /// Builds the unstyled tree.
    pub fn build(options: &Options, resources: &Resources) -> Self {
        let container = dom::create_element("div");
        let banner = dom::create_element(match options.layout() {
            LayoutMode::Anchored => "span",
            LayoutMode::Floating | LayoutMode::Fixed => "small",
        });
        let link = dom::create_element("a");
        let opt_out = dom::create_element("span");

        dom::set_attribute(&link, "href", &resources.policy_url);
        dom::set_attribute(&link, "target", "_blank");
        link.append(dom::text(resources.policy_title(options.cookies)));

        banner.append(dom::text(&resources.prefix(options.cookies)));
        banner.append(link.clone());
        banner.append(dom::text(&resources.text_suffix));
        banner.append(opt_out.clone());

        container.append(banner.clone());

        Self {
            container,
            banner,
            link,
            opt_out,
        }
    }

    /// The node inserted into the document for `layout`.
    pub fn mount_node(&self, layout: LayoutMode) -> &NodeRef {
        match layout {
            LayoutMode::Anchored => &self.banner,
            LayoutMode::Floating | LayoutMode::Fixed => &self.container,
        }
    }

    pub fn apply_style(&self, options: &Options, palette: &Palette, resources: &Resources) {
        let layout = options.layout();
        if layout == LayoutMode::Anchored {
            return;
        }

        set_style(&self.banner, "color", palette.color);
        set_style(&self.link, "color", palette.link);
        set_style(&self.banner, "border-color", palette.border);
        set_style(&self.banner, "display", "block");

        let border = format!("{} solid {}", resources.border_size, palette.border);
        match layout {
            LayoutMode::Fixed => {
                set_style(&self.banner, "background", palette.background);

                set_style(&self.container, "position", "fixed");
                set_style(&self.container, "right", &resources.large_space);
                set_style(&self.container, "bottom", "0px");

                set_style(&self.banner, "position", "relative");
                set_style(&self.banner, "right", &resources.large_space);
                set_style(&self.banner, "border", &border);
                set_style(&self.banner, "padding", &resources.small_space);
                set_style(&self.banner, "border-radius", &resources.large_space);
            }
            LayoutMode::Floating => {
                set_style(&self.banner, "text-align", "right");

                set_style(&self.container, "margin", "0");
                set_style(&self.container, "padding", "0");
                set_style(&self.container, "overflow", "none");
                set_style(&self.container, "width", "100%");

                set_style(&self.banner, "margin", "0");
                set_style(&self.banner, "padding-top", &resources.small_space);
                set_style(&self.banner, "padding-bottom", &resources.small_space);
                set_style(&self.banner, "padding-right", &resources.large_space);
                set_style(&self.banner, "border-top", &border);
            }
            LayoutMode::Anchored => {}
        }
    }
}
