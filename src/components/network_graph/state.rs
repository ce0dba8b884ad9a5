use std::rc::Rc;
use std::sync::Arc;

use log::debug;

use super::layout::{
	PortraitLayoutCache, ViewSize, ViewportProbe, ViewportSnapshot, estimate_graph_size,
	is_portrait_active,
};
use super::render::{self, PlateBox, clamp, to_pct};
use super::tree::is_same_point;
use super::types::{
	GraphEvent, GraphLink, GraphNode, GraphOptions, LabelMode, NodeRole, RenderLink, SvgPoint,
};

pub const LANDSCAPE_ZOOM: f64 = 1.36;
pub const PORTRAIT_ZOOM: f64 = 1.28;

#[derive(Clone, Debug, PartialEq)]
pub struct TooltipState {
	pub node: GraphNode,
	pub left_pct: f64,
	pub top_pct: f64,
}

/// Bounding rectangle of the rendered SVG in client pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClientRect {
	pub left: f64,
	pub top: f64,
	pub width: f64,
	pub height: f64,
}

/// Nodes and links as currently drawn, in whichever layout is active.
#[derive(Clone, Debug)]
pub struct Scene {
	pub nodes: Rc<Vec<GraphNode>>,
	pub links: Rc<Vec<RenderLink>>,
}

/// Everything needed to draw one node, derived from the current state.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeVisual {
	pub node: GraphNode,
	pub role: NodeRole,
	pub radius: f64,
	pub fill: &'static str,
	pub stroke: &'static str,
	pub inactive: bool,
	pub active: bool,
	/// Another node is active and this one is not linked to it.
	pub dimmed: bool,
	/// Text inside the circle. Left out when the caption already shows it.
	pub badge: Option<String>,
	/// Caption under the node, or the name and spend line beside it in portrait.
	pub label: String,
	pub label_beside: bool,
	pub aria_label: String,
	pub status_dot: bool,
	pub ring_visible: bool,
	pub ring_radius: f64,
	pub ring_circumference: f64,
	pub ring_dashoffset: f64,
	pub ring_transform: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinkVisual {
	pub path: String,
	pub connected: bool,
	pub dimmed: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlateVisual {
	pub node: GraphNode,
	pub plate: PlateBox,
	pub title: String,
	pub subtitle: String,
	pub spend: String,
	pub closable: bool,
}

/// Interaction and layout state of one graph instance.
///
/// Event handlers return the [`GraphEvent`] the owning page should see, if any.
pub struct NetworkGraphState {
	nodes: Arc<Vec<GraphNode>>,
	links: Arc<Vec<GraphLink>>,
	free_nodes: Rc<Vec<GraphNode>>,
	free_links: Rc<Vec<RenderLink>>,
	pub options: GraphOptions,
	pub hovered_node_id: Option<String>,
	pub zoomed_node_id: Option<String>,
	pub tooltip: Option<TooltipState>,
	hover_anchor: Option<SvgPoint>,
	viewport_animating: bool,
	pending_hover_clear: bool,
	probe: Box<dyn ViewportProbe>,
	viewport: ViewportSnapshot,
	container: ViewSize,
	svg_scale_meet: f64,
	portrait_cache: PortraitLayoutCache,
}

impl NetworkGraphState {
	pub fn new(
		nodes: Arc<Vec<GraphNode>>,
		links: Arc<Vec<GraphLink>>,
		options: GraphOptions,
		probe: Box<dyn ViewportProbe>,
	) -> Self {
		let viewport = ViewportSnapshot::read(probe.as_ref());
		Self {
			free_nodes: Rc::new(nodes.as_ref().clone()),
			free_links: Rc::new(links.iter().copied().map(RenderLink::from).collect()),
			nodes,
			links,
			options,
			hovered_node_id: None,
			zoomed_node_id: None,
			tooltip: None,
			hover_anchor: None,
			viewport_animating: false,
			pending_hover_clear: false,
			probe,
			viewport,
			container: ViewSize {
				width: 0.0,
				height: 0.0,
			},
			svg_scale_meet: 1.0,
			portrait_cache: PortraitLayoutCache::default(),
		}
	}

	/// Replaces the inputs. Unchanged `Arc`s are a no-op so the portrait cache
	/// keeps serving the same layout.
	pub fn set_data(&mut self, nodes: Arc<Vec<GraphNode>>, links: Arc<Vec<GraphLink>>) {
		if !Arc::ptr_eq(&self.nodes, &nodes) {
			self.free_nodes = Rc::new(nodes.as_ref().clone());
			self.nodes = nodes;
		}
		if !Arc::ptr_eq(&self.links, &links) {
			self.free_links = Rc::new(links.iter().copied().map(RenderLink::from).collect());
			self.links = links;
		}
	}

	pub fn is_portrait(&self) -> bool {
		is_portrait_active(
			self.options.portrait_tree,
			self.container,
			self.viewport,
			self.options.portrait_breakpoint,
		)
	}

	pub fn preserve_aspect(&self) -> &'static str {
		if self.is_portrait() {
			"xMinYMin meet"
		} else {
			"xMidYMid meet"
		}
	}

	pub fn scene(&self) -> Scene {
		if self.is_portrait() {
			let layout = self
				.portrait_cache
				.get_or_compute(&self.nodes, &self.links, self.container);
			Scene {
				nodes: Rc::clone(&layout.nodes),
				links: Rc::clone(&layout.links),
			}
		} else {
			Scene {
				nodes: Rc::clone(&self.free_nodes),
				links: Rc::clone(&self.free_links),
			}
		}
	}

	pub fn render_node(&self, id: &str) -> Option<GraphNode> {
		self.scene().nodes.iter().find(|n| n.id == id).cloned()
	}

	pub fn view_box(&self) -> ViewSize {
		if self.is_portrait() {
			let layout = self
				.portrait_cache
				.get_or_compute(&self.nodes, &self.links, self.container);
			return ViewSize {
				width: layout.width,
				height: layout.height,
			};
		}
		let explicit = |v: Option<f64>| v.filter(|v| v.is_finite() && *v > 0.0);
		match (
			explicit(self.options.view_box_width),
			explicit(self.options.view_box_height),
		) {
			(Some(width), Some(height)) => ViewSize { width, height },
			(width, height) => {
				let estimate = estimate_graph_size(&self.nodes);
				ViewSize {
					width: width.unwrap_or(estimate.width),
					height: height.unwrap_or(estimate.height),
				}
			}
		}
	}

	pub fn computed_view_box_height(&self) -> f64 {
		self.view_box().height
	}

	/// Rendered height of the graph element in CSS pixels.
	pub fn computed_height_px(&self) -> f64 {
		if self.is_portrait() {
			return self.computed_view_box_height();
		}
		if let Some(height) = self.options.height_px.filter(|h| *h > 0.0) {
			return height;
		}
		if let Some(height) = self.options.view_box_height.filter(|h| *h > 0.0) {
			return height;
		}
		estimate_graph_size(&self.nodes).height
	}

	pub fn has_data(&self) -> bool {
		!self.nodes.is_empty()
	}

	pub fn active_node_id(&self) -> Option<&str> {
		self.hovered_node_id
			.as_deref()
			.or(self.options.selected_node_id.as_deref())
	}

	pub fn resolved_spend_max(&self) -> f64 {
		render::resolved_spend_max(&self.nodes, self.options.spend_max)
	}

	pub fn aria_label(&self) -> String {
		render::graph_aria_label(self.nodes.len(), self.links.len())
	}

	pub fn node_radius(&self, node: &GraphNode) -> f64 {
		render::node_radius(node, self.hovered_node_id.as_deref() == Some(node.id.as_str()))
	}

	pub fn spend_ratio(&self, node: &GraphNode) -> f64 {
		render::spend_ratio(node, self.resolved_spend_max())
	}

	pub fn ring_dashoffset(&self, node: &GraphNode) -> f64 {
		render::ring_dashoffset(self.node_radius(node), self.spend_ratio(node))
	}

	pub fn link_path(&self, link: &GraphLink) -> String {
		render::link_path(link, self.options.link_style, self.is_portrait())
	}

	fn click_zoom_scale(&self) -> f64 {
		if self.is_portrait() {
			PORTRAIT_ZOOM
		} else {
			LANDSCAPE_ZOOM
		}
	}

	pub fn zoom_scale(&self) -> f64 {
		if self.zoomed_node_id.is_some() {
			self.click_zoom_scale()
		} else {
			1.0
		}
	}

	/// Hover zoom covers half the distance to the click zoom.
	pub fn hover_zoom_scale(&self) -> f64 {
		1.0 + (self.click_zoom_scale() - 1.0) * 0.5
	}

	/// SVG transform for the viewport group. Click zoom centres the target,
	/// hover zoom keeps it under the pointer.
	pub fn viewport_transform(&self) -> String {
		let Some(id) = self.zoomed_node_id.as_deref().or(self.hovered_node_id.as_deref()) else {
			return String::new();
		};
		let Some(target) = self.render_node(id) else {
			return String::new();
		};
		let view = self.view_box();
		let (anchor, scale) = if self.zoomed_node_id.is_some() {
			let center = SvgPoint {
				x: view.width / 2.0,
				y: view.height / 2.0,
			};
			(center, self.zoom_scale())
		} else {
			let anchor = self.hover_anchor.unwrap_or(SvgPoint {
				x: view.width / 2.0,
				y: view.height / 2.0,
			});
			(anchor, self.hover_zoom_scale())
		};
		let tx = anchor.x - target.x * scale;
		let ty = anchor.y - target.y * scale;
		format!("translate({tx} {ty}) scale({scale})")
	}

	fn svg_scale_meet_safe(&self) -> f64 {
		if self.svg_scale_meet.is_finite() && self.svg_scale_meet > 0.0 {
			self.svg_scale_meet
		} else {
			1.0
		}
	}

	pub fn inv_svg_scale(&self) -> f64 {
		clamp(1.0 / self.svg_scale_meet_safe(), 0.7, 1.8)
	}

	pub fn plate_inverse_css_scale(&self) -> String {
		format!("scale({})", self.inv_svg_scale())
	}

	pub fn node_plate_box(&self, node: &GraphNode) -> PlateBox {
		render::plate_box(node, self.node_radius(node), self.inv_svg_scale(), self.view_box())
	}

	pub fn should_show_plate(&self, node: &GraphNode) -> bool {
		let id = Some(node.id.as_str());
		self.hovered_node_id.as_deref() == id
			|| self.options.selected_node_id.as_deref() == id
			|| self.zoomed_node_id.as_deref() == id
	}

	/// Whether either end of `link` sits on the rendered node `node_id`.
	pub fn is_link_connected(&self, link: &GraphLink, node_id: Option<&str>) -> bool {
		let Some(node) = node_id.and_then(|id| self.render_node(id)) else {
			return false;
		};
		link_touches(link, &node)
	}

	pub fn is_node_connected(&self, node: &GraphNode) -> bool {
		let Some(current) = self.active_node_id() else {
			return false;
		};
		if node.id == current {
			return true;
		}
		let Some(active) = self.render_node(current) else {
			return false;
		};
		self.scene()
			.links
			.iter()
			.any(|l| link_touches(&l.link, &active) && link_touches(&l.link, node))
	}

	pub fn node_visual(&self, id: &str) -> Option<NodeVisual> {
		let node = self.render_node(id)?;
		let radius = self.node_radius(&node);
		let active_id = self.active_node_id();
		let active = active_id == Some(id);
		let label_beside = self.is_portrait();
		let label = if label_beside {
			render::node_always_label(&node)
		} else {
			render::node_caption(&node, self.options.label_mode)
		};
		let caption_is_badge = !label_beside && self.options.label_mode == LabelMode::Initials;
		let inactive = render::is_inactive(node.status.as_deref());
		Some(NodeVisual {
			role: NodeRole::of(&node),
			radius,
			fill: render::node_fill(&node),
			stroke: render::node_stroke(&node),
			inactive,
			active,
			dimmed: active_id.is_some() && !self.is_node_connected(&node),
			badge: (!caption_is_badge).then(|| render::node_badge(&node)),
			label,
			label_beside,
			aria_label: render::node_aria_label(&node),
			status_dot: self.options.show_status_dot && inactive,
			ring_visible: self.options.show_spend,
			ring_radius: render::ring_radius(radius),
			ring_circumference: render::ring_circumference(radius),
			ring_dashoffset: self.ring_dashoffset(&node),
			ring_transform: render::ring_transform(&node),
			node,
		})
	}

	pub fn link_visuals(&self) -> Vec<LinkVisual> {
		let active = self.active_node_id();
		self.scene()
			.links
			.iter()
			.map(|l| {
				let connected = self.is_link_connected(&l.link, active);
				LinkVisual {
					path: self.link_path(&l.link),
					connected,
					dimmed: active.is_some() && !connected,
				}
			})
			.collect()
	}

	/// Detail plates for the hovered, selected and zoomed nodes, in render order.
	pub fn plate_visuals(&self) -> Vec<PlateVisual> {
		self.scene()
			.nodes
			.iter()
			.filter(|n| self.should_show_plate(n))
			.map(|node| {
				let level = NodeRole::of(node);
				let status = match node.status.as_deref() {
					Some(s) if !s.is_empty() => s,
					_ => "Activa",
				};
				PlateVisual {
					plate: self.node_plate_box(node),
					title: render::node_display_name(node),
					subtitle: format!("{level} · {status}"),
					spend: render::compact_money(render::spend_value(node)),
					closable: self.zoomed_node_id.as_deref() == Some(node.id.as_str()),
					node: node.clone(),
				}
			})
			.collect()
	}

	fn tooltip_for(&self, node: GraphNode) -> TooltipState {
		let view = self.view_box();
		TooltipState {
			left_pct: to_pct(node.x, view.width),
			top_pct: to_pct(node.y, view.height),
			node,
		}
	}

	/// Maps client coordinates into viewBox units, honouring the meet scale
	/// and the aspect alignment. Without a rectangle the viewBox centre is used.
	pub fn client_to_svg_point(&self, client_x: f64, client_y: f64, rect: Option<ClientRect>) -> SvgPoint {
		let view = self.view_box();
		let Some(rect) = rect else {
			return SvgPoint {
				x: view.width / 2.0,
				y: view.height / 2.0,
			};
		};
		let scale = self.svg_scale_meet_safe();
		let centered = !self.is_portrait();
		let offset_x = if centered { (rect.width - view.width * scale) / 2.0 } else { 0.0 };
		let offset_y = if centered { (rect.height - view.height * scale) / 2.0 } else { 0.0 };
		SvgPoint {
			x: clamp((client_x - rect.left - offset_x) / scale, 0.0, view.width),
			y: clamp((client_y - rect.top - offset_y) / scale, 0.0, view.height),
		}
	}

	pub fn on_node_pointer_enter(&mut self, id: &str, anchor: SvgPoint) -> Option<GraphEvent> {
		if !self.options.interactive {
			return None;
		}
		let node = self.render_node(id)?;
		self.pending_hover_clear = false;
		self.hovered_node_id = Some(node.id.clone());
		self.hover_anchor = Some(anchor);
		self.tooltip = Some(self.tooltip_for(node.clone()));
		Some(GraphEvent::NodeHover(Some(node)))
	}

	/// Hover zoom follows the pointer until a click zoom takes over.
	pub fn follows_pointer(&self) -> bool {
		self.options.interactive && self.hovered_node_id.is_some() && self.zoomed_node_id.is_none()
	}

	pub fn on_node_pointer_move(&mut self, anchor: SvgPoint) {
		if self.follows_pointer() {
			self.hover_anchor = Some(anchor);
		}
	}

	/// Clearing is deferred while the viewport is mid-transition.
	pub fn on_node_pointer_leave(&mut self, id: &str) -> Option<GraphEvent> {
		if !self.options.interactive || self.hovered_node_id.as_deref() != Some(id) {
			return None;
		}
		if self.viewport_animating && self.zoomed_node_id.is_none() {
			self.pending_hover_clear = true;
			return None;
		}
		Some(self.clear_hover_state())
	}

	pub fn on_viewport_transition_start(&mut self) {
		self.viewport_animating = true;
	}

	pub fn on_viewport_transition_end(&mut self) -> Option<GraphEvent> {
		self.viewport_animating = false;
		let pending = std::mem::take(&mut self.pending_hover_clear);
		(pending && self.zoomed_node_id.is_none()).then(|| self.clear_hover_state())
	}

	fn clear_hover_state(&mut self) -> GraphEvent {
		self.hovered_node_id = None;
		self.hover_anchor = None;
		self.tooltip = None;
		GraphEvent::NodeHover(None)
	}

	pub fn on_node_focus(&mut self, id: &str) -> Option<GraphEvent> {
		if !self.options.interactive {
			return None;
		}
		let node = self.render_node(id)?;
		self.hovered_node_id = Some(node.id.clone());
		self.tooltip = Some(self.tooltip_for(node.clone()));
		Some(GraphEvent::NodeHover(Some(node)))
	}

	pub fn on_node_blur(&mut self, id: &str) -> Option<GraphEvent> {
		if !self.options.interactive || self.hovered_node_id.as_deref() != Some(id) {
			return None;
		}
		self.hovered_node_id = None;
		self.tooltip = None;
		Some(GraphEvent::NodeHover(None))
	}

	/// Toggles click zoom on the node and reports the click.
	pub fn on_node_click(&mut self, id: &str) -> Option<GraphEvent> {
		if !self.options.interactive {
			return None;
		}
		let node = self.render_node(id)?;
		if self.zoomed_node_id.as_deref() == Some(id) {
			debug!("network graph: zoom released from {id}");
			self.zoomed_node_id = None;
		} else {
			debug!("network graph: zoom to {id}");
			self.zoomed_node_id = Some(node.id.clone());
		}
		Some(GraphEvent::NodeClick(node))
	}

	/// Enter and Space act as a click. Returns `None` for other keys.
	pub fn on_node_keydown(&mut self, id: &str, key: &str) -> Option<GraphEvent> {
		match key {
			"Enter" | " " => self.on_node_click(id),
			_ => None,
		}
	}

	pub fn close_node_plate(&mut self) {
		self.zoomed_node_id = None;
	}

	pub fn on_canvas_click(&mut self) {
		if self.zoomed_node_id.take().is_some() {
			debug!("network graph: zoom released by canvas click");
		}
	}

	/// Host element resized. Drops the cached portrait layout.
	pub fn on_container_resize(&mut self, width: f64, height: f64) {
		let was_portrait = self.is_portrait();
		self.container = ViewSize { width, height };
		self.portrait_cache.invalidate();
		self.log_orientation_change(was_portrait);
	}

	/// Window resized or rotated. Re-reads the viewport probe.
	pub fn on_viewport_resize(&mut self) {
		let was_portrait = self.is_portrait();
		self.viewport = ViewportSnapshot::read(self.probe.as_ref());
		self.portrait_cache.invalidate();
		self.log_orientation_change(was_portrait);
	}

	fn log_orientation_change(&self, was_portrait: bool) {
		let portrait = self.is_portrait();
		if portrait != was_portrait {
			debug!(
				"network graph: switched to {} layout",
				if portrait { "portrait tree" } else { "free" }
			);
		}
	}

	/// Recomputes the `meet` scale from the SVG element's client size and
	/// reports whether it changed.
	pub fn update_svg_meet_scale(&mut self, client_size: Option<(f64, f64)>) -> bool {
		let view = self.view_box();
		let scale = match client_size {
			Some((width, height)) if view.width > 0.0 && view.height > 0.0 => {
				let scale = (width / view.width).min(height / view.height);
				if scale.is_finite() && scale > 0.0 { scale } else { 1.0 }
			}
			_ => 1.0,
		};
		let changed = scale != self.svg_scale_meet;
		self.svg_scale_meet = scale;
		changed
	}
}

fn link_touches(link: &GraphLink, node: &GraphNode) -> bool {
	is_same_point(node.x, node.y, link.x1, link.y1) || is_same_point(node.x, node.y, link.x2, link.y2)
}
