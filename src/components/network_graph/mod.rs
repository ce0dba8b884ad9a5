//! SVG referral network: tree reconstruction, portrait layout, render
//! geometry and the interaction state behind the `<NetworkGraph>` component.

mod component;
mod error;
pub(crate) mod layout;
pub(crate) mod render;
pub(crate) mod state;
pub(crate) mod tree;
mod types;

pub use component::NetworkGraph;
pub use error::{GraphError, Result};
pub use types::{
	DEFAULT_EMPTY_STATE_TEXT, DEFAULT_PORTRAIT_BREAKPOINT, GraphData, GraphEvent, GraphLink,
	GraphNode, GraphOptions, LabelMode, LinkStyle, NodeRole, PortraitMode, RenderLink, SvgPoint,
};
