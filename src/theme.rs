/// Colour tokens applied to the banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub color: &'static str,
    pub background: &'static str,
    pub border: &'static str,
    pub link: &'static str,
}

pub const LIGHT: Palette = Palette {
    color: "black",
    background: "white",
    border: "black",
    link: "blue",
};

pub const DARK: Palette = Palette {
    color: "white",
    background: "black",
    border: "white",
    link: "blue",
};

pub const TRANSPARENT: &str = "transparent";

/// Picks the base palette and hides the border unless the banner is fixed.
pub fn resolve_palette(dark: bool, float: bool, element: bool) -> Palette {
    let mut palette = if dark { DARK } else { LIGHT };
    if float || element {
        palette.border = TRANSPARENT;
    }
    palette
}
