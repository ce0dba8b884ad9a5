use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::GraphError;

/// A member of the referral network as supplied by the owning page.
///
/// Coordinates are in viewBox units. Links do not reference nodes by id, they
/// touch them by position, so two nodes should never share a point.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
	/// Unique within one graph.
	pub id: String,
	/// Horizontal position in the free layout.
	pub x: f64,
	/// Vertical position in the free layout.
	pub y: f64,
	/// Fallback text when there is no `name`.
	#[serde(default)]
	pub label: String,
	/// Member name shown in captions, plates and the tooltip.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Tier: `root`, `L1`, `L2` or `L3`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub level: Option<String>,
	/// Free text. Anything containing "inactiv" is drawn as inactive.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
	/// Consulted for the tier when `level` is empty.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub role: Option<String>,
	/// Open bag of extras. `parentId`, `spend` and `radius` are understood.
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub meta: Map<String, Value>,
}

impl GraphNode {
	/// Node at `(x, y)` with nothing else set.
	pub fn new(id: impl Into<String>, x: f64, y: f64) -> Self {
		Self {
			id: id.into(),
			x,
			y,
			..Self::default()
		}
	}

	/// Sets the fallback label.
	pub fn with_label(mut self, label: impl Into<String>) -> Self {
		self.label = label.into();
		self
	}

	/// Sets the member name.
	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	/// Sets the tier.
	pub fn with_level(mut self, level: impl Into<String>) -> Self {
		self.level = Some(level.into());
		self
	}

	/// Sets the status text.
	pub fn with_status(mut self, status: impl Into<String>) -> Self {
		self.status = Some(status.into());
		self
	}

	/// Records an explicit parent in `meta.parentId`.
	pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
		self.meta
			.insert("parentId".into(), Value::String(parent_id.into()));
		self
	}

	/// Records the member's spend in `meta.spend`.
	pub fn with_spend(mut self, spend: f64) -> Self {
		self.meta.insert("spend".into(), Value::from(spend));
		self
	}

	/// Explicit parent reference from `meta.parentId`. Numbers are accepted and
	/// stringified; empty strings and other shapes count as absent.
	pub fn parent_id(&self) -> Option<String> {
		let parent = match self.meta.get("parentId")? {
			Value::String(s) => s.clone(),
			Value::Number(n) => n.to_string(),
			_ => return None,
		};
		(!parent.is_empty()).then_some(parent)
	}

	/// Numeric meta value, accepting numbers and numeric strings.
	pub fn meta_number(&self, key: &str) -> Option<f64> {
		match self.meta.get(key)? {
			Value::Number(n) => n.as_f64(),
			Value::String(s) => s.trim().parse().ok(),
			_ => None,
		}
	}
}

/// Segment between two node positions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphLink {
	/// Start x, normally the parent.
	pub x1: f64,
	/// Start y.
	pub y1: f64,
	/// End x, normally the child.
	pub x2: f64,
	/// End y.
	pub y2: f64,
}

impl GraphLink {
	/// Link from `parent` to `child`, in that endpoint order.
	pub fn between(parent: &GraphNode, child: &GraphNode) -> Self {
		Self {
			x1: parent.x,
			y1: parent.y,
			x2: child.x,
			y2: child.y,
		}
	}
}

/// A link as drawn, optionally carrying the ids it was derived from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderLink {
	/// Endpoints in the active layout.
	pub link: GraphLink,
	/// Parent id, known for links rebuilt by the tree layout.
	pub parent_id: Option<String>,
	/// Child id, known for links rebuilt by the tree layout.
	pub child_id: Option<String>,
}

impl From<GraphLink> for RenderLink {
	fn from(link: GraphLink) -> Self {
		Self {
			link,
			parent_id: None,
			child_id: None,
		}
	}
}

/// Nodes and links handed to the graph together.
#[derive(Clone, Debug, Default)]
pub struct GraphData {
	/// Members in input order.
	pub nodes: Vec<GraphNode>,
	/// Parent to child segments.
	pub links: Vec<GraphLink>,
}

/// A point in viewBox units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SvgPoint {
	/// Horizontal, growing right.
	pub x: f64,
	/// Vertical, growing down.
	pub y: f64,
}

/// Network tier. Anything unrecognised is treated as the deepest tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeRole {
	/// The viewing member.
	Root,
	/// Direct referrals.
	L1,
	/// Second tier.
	L2,
	/// Third tier and anything unrecognised.
	L3,
}

impl NodeRole {
	/// Tier of `node`, read from `level` and then `role`, ignoring case.
	pub fn of(node: &GraphNode) -> Self {
		let raw = node
			.level
			.as_deref()
			.filter(|s| !s.is_empty())
			.or(node.role.as_deref())
			.unwrap_or_default();
		match raw.to_uppercase().as_str() {
			"ROOT" => Self::Root,
			"L1" => Self::L1,
			"L2" => Self::L2,
			_ => Self::L3,
		}
	}

	/// Label as shown in plates and the legend.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Root => "root",
			Self::L1 => "L1",
			Self::L2 => "L2",
			Self::L3 => "L3",
		}
	}
}

impl fmt::Display for NodeRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Shape of links in the free layout. The portrait tree always uses elbows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStyle {
	/// Quadratic curve through the midpoint.
	#[default]
	Curved,
	/// Right-angled elbow.
	Straight,
}

impl FromStr for LinkStyle {
	type Err = GraphError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"curved" => Ok(Self::Curved),
			"straight" => Ok(Self::Straight),
			_ => Err(GraphError::invalid_option("link style", s)),
		}
	}
}

/// What is written inside or under each node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelMode {
	/// Two-letter badge only.
	Initials,
	/// First name plus initials of the rest.
	#[default]
	Short,
	/// Whole name.
	Full,
}

impl FromStr for LabelMode {
	type Err = GraphError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"initials" => Ok(Self::Initials),
			"short" => Ok(Self::Short),
			"full" => Ok(Self::Full),
			_ => Err(GraphError::invalid_option("label mode", s)),
		}
	}
}

/// Forces the portrait tree layout on or off, or lets the viewport decide.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortraitMode {
	/// Portrait on narrow or tall viewports.
	#[default]
	#[serde(rename = "auto")]
	Auto,
	/// Always the portrait tree.
	#[serde(rename = "true")]
	On,
	/// Always the free layout.
	#[serde(rename = "false")]
	Off,
}

impl PortraitMode {
	/// Attribute spelling, accepted back by `FromStr`.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Auto => "auto",
			Self::On => "true",
			Self::Off => "false",
		}
	}
}

impl FromStr for PortraitMode {
	type Err = GraphError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"auto" => Ok(Self::Auto),
			"true" | "on" => Ok(Self::On),
			"false" | "off" => Ok(Self::Off),
			_ => Err(GraphError::invalid_option("portrait mode", s)),
		}
	}
}

/// Window width in CSS pixels at or below which `Auto` switches to portrait.
pub const DEFAULT_PORTRAIT_BREAKPOINT: f64 = 860.0;
/// Shown in place of the graph when there are no nodes.
pub const DEFAULT_EMPTY_STATE_TEXT: &str = "Sin datos para mostrar";

/// Presentation inputs of the graph besides its nodes and links.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphOptions {
	/// Free-layout viewBox width. Estimated from the nodes when unset.
	pub view_box_width: Option<f64>,
	/// Free-layout viewBox height. Estimated from the nodes when unset.
	pub view_box_height: Option<f64>,
	/// Element height in CSS pixels for the free layout.
	pub height_px: Option<f64>,
	/// Link shape in the free layout.
	pub link_style: LinkStyle,
	/// Caption under each node in the free layout.
	pub label_mode: LabelMode,
	/// When false, hover, focus and clicks are ignored.
	pub interactive: bool,
	/// Highlighted node when nothing is hovered. Its plate stays open.
	pub selected_node_id: Option<String>,
	/// Draws the tier legend under the graph.
	pub show_legend: bool,
	/// Message for an empty graph.
	pub empty_state_text: String,
	/// Spend that fills a ring. Defaults to the largest spend present.
	pub spend_max: Option<f64>,
	/// Draws spend rings and the tooltip spend line.
	pub show_spend: bool,
	/// Marks inactive members with a dot.
	pub show_status_dot: bool,
	/// Portrait tree on, off or automatic.
	pub portrait_tree: PortraitMode,
	/// See [`DEFAULT_PORTRAIT_BREAKPOINT`].
	pub portrait_breakpoint: f64,
}

impl Default for GraphOptions {
	fn default() -> Self {
		Self {
			view_box_width: None,
			view_box_height: None,
			height_px: None,
			link_style: LinkStyle::Curved,
			label_mode: LabelMode::Short,
			interactive: true,
			selected_node_id: None,
			show_legend: false,
			empty_state_text: DEFAULT_EMPTY_STATE_TEXT.into(),
			spend_max: None,
			show_spend: true,
			show_status_dot: true,
			portrait_tree: PortraitMode::Auto,
			portrait_breakpoint: DEFAULT_PORTRAIT_BREAKPOINT,
		}
	}
}

/// Outputs raised by the interaction controller for the owning page.
#[derive(Clone, Debug, PartialEq)]
pub enum GraphEvent {
	/// A node was clicked or activated from the keyboard.
	NodeClick(GraphNode),
	/// `None` when the hover ended.
	NodeHover(Option<GraphNode>),
}
