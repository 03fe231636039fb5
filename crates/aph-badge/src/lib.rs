//! aph-badge: badge selection and poster compositing.
//!
//! The [`BadgeCatalog`] maps resolved attributes to badge instances via
//! declarative rules from the settings store. The [`Renderer`] turns those
//! instances into bitmaps (fonts, rounded backgrounds, shadows), stacks
//! badges that share an anchor, and places them on the poster with
//! configured edge padding.

mod catalog;
mod compose;
mod font;
mod layout;
mod place;
mod renderer;
mod style;

pub use catalog::{BadgeCatalog, BadgeInstance, BadgeRules, BadgeVisual, Selection};
pub use compose::compose_badge;
pub use font::FontLibrary;
pub use layout::{stack_badges, LayoutDirection};
pub use place::{place_at, placement_origin};
pub use renderer::{RenderOutcome, Renderer};
pub use style::{Anchor, BadgeStyle, Corner, Rgba, SizePolicy};
