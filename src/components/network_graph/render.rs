//! Presentation values for nodes, links and label plates.

use std::f64::consts::PI;

use super::layout::ViewSize;
use super::types::{GraphLink, GraphNode, LabelMode, LinkStyle, NodeRole};

pub const ROOT_RADIUS: f64 = 25.0;
pub const L1_RADIUS: f64 = 17.0;
pub const L2_RADIUS: f64 = 14.0;
pub const L3_RADIUS: f64 = 12.0;
pub const RING_GAP: f64 = 7.0;

const ELBOW_INSET: f64 = 10.0;
const ELBOW_MIN_RUN: f64 = 12.0;

pub const PLATE_WIDTH: f64 = 150.0;
pub const ROOT_PLATE_WIDTH: f64 = 170.0;
pub const PLATE_HEIGHT: f64 = 64.0;
const PLATE_PADDING: f64 = 8.0;
const PLATE_MARGIN: f64 = 4.0;

const ALWAYS_LABEL_MAX: usize = 28;
const NO_NAME: &str = "Sin nombre";

/// `min(max(value, min), max)`. Unlike `f64::clamp` this never panics when the
/// range is inverted; `max` wins.
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
	value.max(min).min(max)
}

/// Position of `value` within `total` as a percentage kept off the edges.
pub fn to_pct(value: f64, total: f64) -> f64 {
	if total == 0.0 || !total.is_finite() {
		return 50.0;
	}
	clamp(value / total * 100.0, 3.0, 97.0)
}

fn custom_radius(node: &GraphNode) -> Option<f64> {
	node.meta_number("radius").filter(|r| r.is_finite() && *r > 0.0)
}

fn role_radius(role: NodeRole) -> f64 {
	match role {
		NodeRole::Root => ROOT_RADIUS,
		NodeRole::L1 => L1_RADIUS,
		NodeRole::L2 => L2_RADIUS,
		NodeRole::L3 => L3_RADIUS,
	}
}

/// Radius before any hover inflation.
pub fn base_node_radius(node: &GraphNode) -> f64 {
	custom_radius(node).unwrap_or_else(|| role_radius(NodeRole::of(node)))
}

/// Hovered non-root nodes grow to root size; role and colour are unchanged.
pub fn node_radius(node: &GraphNode, hovered: bool) -> f64 {
	let base = base_node_radius(node);
	if hovered && NodeRole::of(node) != NodeRole::Root {
		return base.max(custom_radius(node).unwrap_or(ROOT_RADIUS));
	}
	base
}

pub fn is_inactive(status: Option<&str>) -> bool {
	status.is_some_and(|s| s.trim().to_lowercase().contains("inactiv"))
}

pub fn node_fill(node: &GraphNode) -> &'static str {
	if is_inactive(node.status.as_deref()) {
		return "rgba(var(--rgb-text), 0.24)";
	}
	match NodeRole::of(node) {
		NodeRole::Root => "var(--ng-root)",
		NodeRole::L1 => "var(--ng-l1)",
		NodeRole::L2 => "var(--ng-l2)",
		NodeRole::L3 => "var(--ng-l3)",
	}
}

pub fn node_stroke(node: &GraphNode) -> &'static str {
	if is_inactive(node.status.as_deref()) {
		"rgba(var(--rgb-text), 0.28)"
	} else if NodeRole::of(node) == NodeRole::Root {
		"rgba(var(--rgb-primary), 0.62)"
	} else {
		"rgba(var(--rgb-surface-1), 0.95)"
	}
}

pub fn ring_radius(node_radius: f64) -> f64 {
	node_radius + RING_GAP
}

pub fn ring_circumference(node_radius: f64) -> f64 {
	2.0 * PI * ring_radius(node_radius)
}

/// Dash offset leaving `ratio` of the ring visible.
pub fn ring_dashoffset(node_radius: f64, ratio: f64) -> f64 {
	ring_circumference(node_radius) * (1.0 - ratio)
}

/// Starts the spend gauge at 12 o'clock.
pub fn ring_transform(node: &GraphNode) -> String {
	format!("rotate(-90 {} {})", node.x, node.y)
}

pub fn spend_value(node: &GraphNode) -> f64 {
	node.meta_number("spend")
		.filter(|v| v.is_finite() && *v > 0.0)
		.unwrap_or(0.0)
}

/// Explicit positive override, else the largest observed spend, at least 1.
pub fn resolved_spend_max(nodes: &[GraphNode], spend_max: Option<f64>) -> f64 {
	if let Some(max) = spend_max.filter(|m| m.is_finite() && *m > 0.0) {
		return max;
	}
	nodes.iter().map(spend_value).fold(0.0, f64::max).max(1.0)
}

pub fn spend_ratio(node: &GraphNode, spend_max: f64) -> f64 {
	if !spend_max.is_finite() || spend_max <= 0.0 {
		return 0.0;
	}
	clamp(spend_value(node) / spend_max, 0.0, 1.0)
}

fn trim_zeros(value: &str) -> &str {
	if value.contains('.') {
		value.trim_end_matches('0').trim_end_matches('.')
	} else {
		value
	}
}

/// `$950`, `$12K`, `$2.4M`. Thousands and millions are floored, never rounded up.
pub fn compact_money(value: f64) -> String {
	let amount = if value.is_finite() { value.max(0.0) } else { 0.0 };
	if amount < 1_000.0 {
		return format!("${}", amount.round());
	}
	if amount < 1_000_000.0 {
		return format!("${}K", (amount / 1_000.0).floor());
	}
	let millions = (amount / 100_000.0).floor() / 10.0;
	format!("${}M", trim_zeros(&format!("{millions:.1}")))
}

fn name_source(node: &GraphNode) -> Option<&str> {
	node.name
		.as_deref()
		.filter(|s| !s.is_empty())
		.or_else(|| Some(node.label.as_str()).filter(|s| !s.is_empty()))
}

pub fn node_display_name(node: &GraphNode) -> String {
	name_source(node).unwrap_or(NO_NAME).trim().to_owned()
}

/// Two-letter badge: initials of the first two words, or the first two characters.
pub fn node_badge(node: &GraphNode) -> String {
	let source = name_source(node).unwrap_or_default().trim();
	if source.is_empty() {
		return "ID".into();
	}
	let words: Vec<&str> = source.split_whitespace().collect();
	if words.len() >= 2 {
		return words[..2]
			.iter()
			.filter_map(|w| w.chars().next())
			.collect::<String>()
			.to_uppercase();
	}
	source.chars().take(2).collect::<String>().to_uppercase()
}

/// First word cut to five characters followed by the initials of the rest.
pub fn compact_node_name(node: &GraphNode) -> String {
	let full = node_display_name(node);
	let mut parts = full.split_whitespace();
	let Some(first) = parts.next() else {
		return "Sin n".into();
	};
	let first: String = first.chars().take(5).collect();
	let initials: Vec<String> = parts
		.filter_map(|p| p.chars().next())
		.map(|c| format!("{}.", c.to_uppercase()))
		.collect();
	if initials.is_empty() {
		first
	} else {
		format!("{first} {}", initials.join(" "))
	}
}

pub fn node_always_label(node: &GraphNode) -> String {
	let value = format!(
		"{} | {}",
		compact_node_name(node),
		compact_money(spend_value(node))
	);
	if value.chars().count() > ALWAYS_LABEL_MAX {
		let head: String = value.chars().take(ALWAYS_LABEL_MAX - 1).collect();
		format!("{head}...")
	} else {
		value
	}
}

pub fn node_caption(node: &GraphNode, mode: LabelMode) -> String {
	match mode {
		LabelMode::Initials => node_badge(node),
		LabelMode::Short => compact_node_name(node),
		LabelMode::Full => node_display_name(node),
	}
}

pub fn node_aria_label(node: &GraphNode) -> String {
	let role = [node.role.as_deref(), node.level.as_deref()]
		.into_iter()
		.flatten()
		.find(|s| !s.is_empty())
		.unwrap_or("Sin nivel");
	let status = match node.status.as_deref() {
		Some(s) if !s.is_empty() => s,
		_ => "Activa",
	};
	format!(
		"{}, nivel {role}, estado {status}, consumo {}",
		node_display_name(node),
		compact_money(spend_value(node))
	)
}

pub fn graph_aria_label(node_count: usize, link_count: usize) -> String {
	format!("Grafo de red con {node_count} nodos y {link_count} enlaces")
}

/// Quadratic curve through the midpoint, optionally bowed vertically.
pub fn curve_path(link: &GraphLink, offset: f64) -> String {
	let mid_x = (link.x1 + link.x2) / 2.0;
	let mid_y = (link.y1 + link.y2) / 2.0 + offset;
	format!(
		"M {} {} Q {} {}, {} {}",
		link.x1, link.y1, mid_x, mid_y, link.x2, link.y2
	)
}

/// Right-angled connector inset from both ends; curves instead when the
/// child sits left of its parent.
pub fn elbow_path(link: &GraphLink) -> String {
	let start_x = link.x1 + ELBOW_INSET;
	let end_x = link.x2 - ELBOW_INSET;
	if end_x <= start_x {
		return curve_path(link, 0.0);
	}
	let elbow_x = start_x + ELBOW_MIN_RUN.max((end_x - start_x) * 0.45);
	format!(
		"M {} {} H {} V {} H {}",
		start_x, link.y1, elbow_x, link.y2, end_x
	)
}

pub fn link_path(link: &GraphLink, style: LinkStyle, portrait: bool) -> String {
	if portrait || style == LinkStyle::Straight {
		elbow_path(link)
	} else {
		curve_path(link, 0.0)
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlateBox {
	pub x: f64,
	pub y: f64,
	pub width: f64,
	pub height: f64,
}

/// Whether `plate`, grown by the padding, touches the node's circle.
pub fn box_overlaps_node(plate: &PlateBox, node_x: f64, node_y: f64, node_radius: f64) -> bool {
	let left = plate.x - PLATE_PADDING;
	let right = plate.x + plate.width + PLATE_PADDING;
	let top = plate.y - PLATE_PADDING;
	let bottom = plate.y + plate.height + PLATE_PADDING;
	if node_x >= left && node_x <= right && node_y >= top && node_y <= bottom {
		return true;
	}

	let closest_x = clamp(node_x, plate.x, plate.x + plate.width);
	let closest_y = clamp(node_y, plate.y, plate.y + plate.height);
	(node_x - closest_x).hypot(node_y - closest_y) <= node_radius + PLATE_PADDING
}

/// Places the detail plate below, above, right or left of the node, taking
/// the first side that clears the node. Left is the last resort.
pub fn plate_box(node: &GraphNode, radius: f64, inv_svg_scale: f64, view: ViewSize) -> PlateBox {
	let width = if NodeRole::of(node) == NodeRole::Root {
		ROOT_PLATE_WIDTH
	} else {
		PLATE_WIDTH
	};
	let height = PLATE_HEIGHT;
	let air = 18.0 + clamp((inv_svg_scale - 1.0) * 14.0, 0.0, 20.0);
	let max_x = view.width - width - PLATE_MARGIN;
	let max_y = view.height - height - PLATE_MARGIN;
	let place = |x: f64, y: f64| PlateBox {
		x: clamp(x, PLATE_MARGIN, max_x),
		y: clamp(y, PLATE_MARGIN, max_y),
		width,
		height,
	};

	let candidates = [
		place(node.x - width / 2.0, node.y + radius + air),
		place(node.x - width / 2.0, node.y - radius - height - air),
		place(node.x + radius + air, node.y - height / 2.0),
	];
	candidates
		.into_iter()
		.find(|b| !box_overlaps_node(b, node.x, node.y, radius))
		.unwrap_or_else(|| place(node.x - radius - air - width, node.y - height / 2.0))
}
