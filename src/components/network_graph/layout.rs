//! Portrait tree layout, viewBox sizing and viewport classification.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;
use log::debug;

use super::render::{base_node_radius, node_always_label};
use super::tree::{build_tree, compute_depths, compute_subtree_sizes};
use super::types::{GraphLink, GraphNode, PortraitMode, RenderLink, SvgPoint};

pub const TOP_PADDING: f64 = 42.0;
pub const LEFT_PADDING: f64 = 34.0;
pub const DEPTH_INDENT: f64 = 92.0;
pub const ROW_GAP: f64 = 86.0;
pub const ROOT_GAP_ROWS: usize = 1;

const BOUNDS_LEFT_PAD: f64 = 24.0;
const BOUNDS_TOP_PAD: f64 = 24.0;
const BOUNDS_RIGHT_PAD: f64 = 24.0;
const BOUNDS_BOTTOM_PAD: f64 = 28.0;

pub const MIN_FREE_WIDTH: f64 = 360.0;
pub const MIN_FREE_HEIGHT: f64 = 240.0;
pub const MIN_PORTRAIT_WIDTH: f64 = 320.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewSize {
	pub width: f64,
	pub height: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PortraitLayout {
	pub nodes: Rc<Vec<GraphNode>>,
	pub links: Rc<Vec<RenderLink>>,
	pub width: f64,
	pub height: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PortraitBounds {
	pub shift_x: f64,
	pub shift_y: f64,
	pub view_width: f64,
	pub view_height: f64,
}

/// Depth-first placement: one row per visited node, indented by depth.
/// Larger subtrees are visited first and a blank row separates root trees.
pub fn assign_positions(
	roots: &[String],
	children_by_parent: &IndexMap<String, Vec<String>>,
	subtree_sizes: &HashMap<String, usize>,
	depths: &HashMap<String, usize>,
) -> HashMap<String, SvgPoint> {
	struct Placer<'a> {
		children_by_parent: &'a IndexMap<String, Vec<String>>,
		subtree_sizes: &'a HashMap<String, usize>,
		depths: &'a HashMap<String, usize>,
		positions: HashMap<String, SvgPoint>,
		row_index: usize,
	}

	impl Placer<'_> {
		fn place(&mut self, id: &str) {
			if self.positions.contains_key(id) {
				return;
			}
			let depth = self.depths.get(id).copied().unwrap_or(0);
			self.positions.insert(
				id.to_owned(),
				SvgPoint {
					x: LEFT_PADDING + depth as f64 * DEPTH_INDENT,
					y: TOP_PADDING + self.row_index as f64 * ROW_GAP,
				},
			);
			self.row_index += 1;

			let (children, sizes) = (self.children_by_parent, self.subtree_sizes);
			let mut ordered: Vec<&String> = children
				.get(id)
				.map(|c| c.iter().collect())
				.unwrap_or_default();
			let size = |id: &String| sizes.get(id).copied().unwrap_or(1);
			ordered.sort_by(|a, b| size(b).cmp(&size(a)));
			for child in ordered {
				self.place(child);
			}
		}
	}

	let mut placer = Placer {
		children_by_parent,
		subtree_sizes,
		depths,
		positions: HashMap::new(),
		row_index: 0,
	};
	for root in roots {
		placer.place(root);
		placer.row_index += ROOT_GAP_ROWS;
	}
	placer.positions
}

/// Label plate half width estimated from character count, no font metrics.
pub fn estimated_label_half_width(node: &GraphNode) -> f64 {
	let chars = node_always_label(node).chars().count() as f64;
	(chars * 3.4).clamp(42.0, 112.0)
}

pub fn portrait_bounds(nodes: &[GraphNode], depths: &HashMap<String, usize>) -> PortraitBounds {
	if nodes.is_empty() {
		return PortraitBounds {
			shift_x: 0.0,
			shift_y: 0.0,
			view_width: 360.0,
			view_height: 520.0,
		};
	}

	let mut min_x = f64::INFINITY;
	let mut max_x = f64::NEG_INFINITY;
	let mut min_y = f64::INFINITY;
	let mut max_y = f64::NEG_INFINITY;
	for node in nodes {
		let radius = base_node_radius(node);
		let half = (radius + 12.0).max(estimated_label_half_width(node));
		min_x = min_x.min(node.x - half);
		max_x = max_x.max(node.x + half);
		min_y = min_y.min(node.y - radius - 16.0);
		max_y = max_y.max(node.y + radius + 26.0);
	}

	let shift_x = if min_x < BOUNDS_LEFT_PAD { BOUNDS_LEFT_PAD - min_x } else { 0.0 };
	let shift_y = if min_y < BOUNDS_TOP_PAD { BOUNDS_TOP_PAD - min_y } else { 0.0 };

	let max_depth = depths.values().copied().max().unwrap_or(0);
	let min_height_by_depth = 48.0 + (max_depth as f64 + 1.0) * 88.0 + 64.0;
	let view_width =
		MIN_PORTRAIT_WIDTH.max((max_x - min_x + BOUNDS_LEFT_PAD + BOUNDS_RIGHT_PAD).round());
	let view_height =
		min_height_by_depth.max((max_y - min_y + BOUNDS_TOP_PAD + BOUNDS_BOTTOM_PAD).round());

	PortraitBounds {
		shift_x,
		shift_y,
		view_width,
		view_height,
	}
}

/// Computes the portrait tree layout. Links are re-derived from the resolved
/// parents, never copied from the input links.
pub fn portrait_layout(nodes: &[GraphNode], links: &[GraphLink]) -> PortraitLayout {
	let tree = build_tree(nodes, links);
	let mut depths = compute_depths(&tree.roots, &tree.children_by_parent);
	for node in nodes {
		depths.entry(node.id.clone()).or_insert(0);
	}
	let sizes = compute_subtree_sizes(&tree.roots, &tree.children_by_parent);
	let positions = assign_positions(&tree.roots, &tree.children_by_parent, &sizes, &depths);

	let mut positioned: Vec<GraphNode> = nodes
		.iter()
		.map(|node| {
			let point = positions.get(&node.id).copied().unwrap_or(SvgPoint {
				x: node.x,
				y: node.y,
			});
			GraphNode {
				x: point.x,
				y: point.y,
				..node.clone()
			}
		})
		.collect();

	let bounds = portrait_bounds(&positioned, &depths);
	for node in &mut positioned {
		node.x += bounds.shift_x;
		node.y += bounds.shift_y;
	}

	let by_id: HashMap<&str, &GraphNode> = positioned.iter().map(|n| (n.id.as_str(), n)).collect();
	let rendered: Vec<RenderLink> = tree
		.parent_by_id
		.iter()
		.filter_map(|(child_id, parent_id)| {
			let parent_id = parent_id.as_deref()?;
			let parent = by_id.get(parent_id)?;
			let child = by_id.get(child_id.as_str())?;
			Some(RenderLink {
				link: GraphLink::between(parent, child),
				parent_id: Some(parent_id.to_owned()),
				child_id: Some(child_id.clone()),
			})
		})
		.collect();

	PortraitLayout {
		nodes: Rc::new(positioned),
		links: Rc::new(rendered),
		width: bounds.view_width,
		height: bounds.view_height,
	}
}

/// viewBox for the free layout when no explicit size is given.
pub fn estimate_graph_size(nodes: &[GraphNode]) -> ViewSize {
	if nodes.is_empty() {
		return ViewSize {
			width: 700.0,
			height: 250.0,
		};
	}

	let mut min_x = f64::INFINITY;
	let mut max_x = f64::NEG_INFINITY;
	let mut min_y = f64::INFINITY;
	let mut max_y = f64::NEG_INFINITY;
	for node in nodes {
		let y = node.y + base_node_radius(node) + 64.0;
		min_x = min_x.min(node.x);
		max_x = max_x.max(node.x);
		min_y = min_y.min(y);
		max_y = max_y.max(y);
	}

	ViewSize {
		width: MIN_FREE_WIDTH.max((max_x - min_x + 180.0).ceil()),
		height: MIN_FREE_HEIGHT.max((max_y - min_y + 60.0).ceil()),
	}
}

/// Read access to the browsing viewport, injected so layout can be tested
/// without a display.
pub trait ViewportProbe {
	fn width(&self) -> f64;
	fn height(&self) -> f64;
	fn is_portrait(&self) -> bool;
}

/// A viewport that never changes. Also supplies the size assumed when no
/// window is available.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedViewport {
	pub width: f64,
	pub height: f64,
	pub portrait: bool,
}

impl FixedViewport {
	pub fn new(width: f64, height: f64) -> Self {
		Self {
			width,
			height,
			portrait: height >= width,
		}
	}
}

impl Default for FixedViewport {
	fn default() -> Self {
		Self::new(1024.0, 768.0)
	}
}

impl ViewportProbe for FixedViewport {
	fn width(&self) -> f64 {
		self.width
	}

	fn height(&self) -> f64 {
		self.height
	}

	fn is_portrait(&self) -> bool {
		self.portrait
	}
}

/// Last values read from a [`ViewportProbe`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportSnapshot {
	pub width: f64,
	pub is_portrait: bool,
}

impl ViewportSnapshot {
	pub fn read(probe: &dyn ViewportProbe) -> Self {
		Self {
			width: probe.width(),
			is_portrait: probe.is_portrait(),
		}
	}
}

/// Portrait when forced, otherwise when the container is taller than wide, the
/// device is held upright, or the window is at or below the breakpoint.
pub fn is_portrait_active(
	mode: PortraitMode,
	container: ViewSize,
	viewport: ViewportSnapshot,
	breakpoint: f64,
) -> bool {
	match mode {
		PortraitMode::On => true,
		PortraitMode::Off => false,
		PortraitMode::Auto => {
			let container_portrait = container.width > 0.0
				&& container.height > 0.0
				&& container.height >= container.width;
			container_portrait || viewport.is_portrait || viewport.width <= breakpoint
		}
	}
}

struct CacheEntry {
	nodes: Arc<Vec<GraphNode>>,
	links: Arc<Vec<GraphLink>>,
	container: ViewSize,
	layout: Rc<PortraitLayout>,
}

/// Memoizes the portrait layout by input identity and container size.
///
/// Identity is pointer identity of the shared node and link vectors: a data
/// refresh must hand over new `Arc`s or the cached layout is served.
#[derive(Default)]
pub struct PortraitLayoutCache {
	entry: RefCell<Option<CacheEntry>>,
}

impl PortraitLayoutCache {
	pub fn get_or_compute(
		&self,
		nodes: &Arc<Vec<GraphNode>>,
		links: &Arc<Vec<GraphLink>>,
		container: ViewSize,
	) -> Rc<PortraitLayout> {
		if let Some(entry) = self.entry.borrow().as_ref() {
			if Arc::ptr_eq(&entry.nodes, nodes)
				&& Arc::ptr_eq(&entry.links, links)
				&& entry.container == container
			{
				return Rc::clone(&entry.layout);
			}
		}

		debug!(
			"portrait layout: recomputing for {} nodes in {}x{} container",
			nodes.len(),
			container.width,
			container.height
		);
		let layout = Rc::new(portrait_layout(nodes, links));
		*self.entry.borrow_mut() = Some(CacheEntry {
			nodes: Arc::clone(nodes),
			links: Arc::clone(links),
			container,
			layout: Rc::clone(&layout),
		});
		layout
	}

	pub fn invalidate(&self) {
		self.entry.borrow_mut().take();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn referral_tree() -> (Vec<GraphNode>, Vec<GraphLink>) {
		let nodes = vec![
			GraphNode::new("root", 120.0, 130.0).with_level("root").with_name("Tu"),
			GraphNode::new("a", 260.0, 70.0).with_level("L1").with_parent("root"),
			GraphNode::new("b", 260.0, 190.0).with_level("L1").with_parent("root"),
			GraphNode::new("a1", 420.0, 50.0).with_level("L2").with_parent("a"),
			GraphNode::new("b1", 420.0, 150.0).with_level("L2").with_parent("b"),
			GraphNode::new("b2", 420.0, 210.0).with_level("L2").with_parent("b"),
		];
		(nodes, Vec::new())
	}

	#[test]
	fn positions_follow_depth_and_visit_order() {
		let (nodes, links) = referral_tree();
		let tree = build_tree(&nodes, &links);
		let depths = compute_depths(&tree.roots, &tree.children_by_parent);
		let sizes = compute_subtree_sizes(&tree.roots, &tree.children_by_parent);
		let positions = assign_positions(&tree.roots, &tree.children_by_parent, &sizes, &depths);

		assert_eq!(positions["root"], SvgPoint { x: 34.0, y: 42.0 });
		// "b" holds two leaves, so it is placed before "a".
		assert_eq!(positions["b"], SvgPoint { x: 126.0, y: 128.0 });
		assert_eq!(positions["b1"], SvgPoint { x: 218.0, y: 214.0 });
		assert_eq!(positions["b2"], SvgPoint { x: 218.0, y: 300.0 });
		assert_eq!(positions["a"], SvgPoint { x: 126.0, y: 386.0 });
		assert_eq!(positions["a1"], SvgPoint { x: 218.0, y: 472.0 });
	}

	#[test]
	fn separate_roots_are_one_blank_row_apart() {
		let nodes = vec![
			GraphNode::new("r1", 0.0, 0.0).with_level("root"),
			GraphNode::new("c1", 50.0, 0.0).with_parent("r1"),
			GraphNode::new("r2", 100.0, 0.0).with_level("root"),
		];
		let tree = build_tree(&nodes, &[]);
		let depths = compute_depths(&tree.roots, &tree.children_by_parent);
		let sizes = compute_subtree_sizes(&tree.roots, &tree.children_by_parent);
		let positions = assign_positions(&tree.roots, &tree.children_by_parent, &sizes, &depths);

		assert_eq!(positions["c1"].y, TOP_PADDING + ROW_GAP);
		assert_eq!(positions["r2"].y, TOP_PADDING + 3.0 * ROW_GAP);
	}

	#[test]
	fn portrait_indent_matches_depth() {
		let (nodes, links) = referral_tree();
		let layout = portrait_layout(&nodes, &links);
		let tree = build_tree(&nodes, &links);
		let depths = compute_depths(&tree.roots, &tree.children_by_parent);
		let root_x = layout.nodes.iter().find(|n| n.id == "root").unwrap().x;

		for node in layout.nodes.iter() {
			let indent = ((node.x - root_x) / DEPTH_INDENT).round() as usize;
			assert_eq!(indent, depths[&node.id], "depth of {}", node.id);
		}
	}

	#[test]
	fn portrait_links_join_parents_at_new_positions() {
		let (nodes, links) = referral_tree();
		let layout = portrait_layout(&nodes, &links);
		let find = |id: &str| layout.nodes.iter().find(|n| n.id == id).unwrap();

		assert_eq!(layout.links.len(), 5);
		let b2 = layout
			.links
			.iter()
			.find(|l| l.child_id.as_deref() == Some("b2"))
			.unwrap();
		assert_eq!(b2.parent_id.as_deref(), Some("b"));
		assert_eq!(b2.link, GraphLink::between(find("b"), find("b2")));
	}

	#[test]
	fn portrait_layout_keeps_padding_and_depth_height() {
		let (nodes, links) = referral_tree();
		let layout = portrait_layout(&nodes, &links);

		for node in layout.nodes.iter() {
			assert!(node.x - estimated_label_half_width(node) >= BOUNDS_LEFT_PAD - 1e-9);
			assert!(node.y - base_node_radius(node) - 16.0 >= BOUNDS_TOP_PAD - 1e-9);
		}
		assert!(layout.width >= MIN_PORTRAIT_WIDTH);
		assert!(layout.height >= 48.0 + 3.0 * 88.0 + 64.0);
	}

	#[test]
	fn portrait_layout_never_mutates_input() {
		let (nodes, links) = referral_tree();
		let before = nodes.clone();
		let _ = portrait_layout(&nodes, &links);
		assert_eq!(nodes, before);
	}

	#[test]
	fn empty_portrait_bounds_use_defaults() {
		let layout = portrait_layout(&[], &[]);
		assert_eq!((layout.width, layout.height), (360.0, 520.0));
		assert!(layout.nodes.is_empty());
	}

	#[test]
	fn free_size_estimate_has_minimums() {
		assert_eq!(
			estimate_graph_size(&[]),
			ViewSize {
				width: 700.0,
				height: 250.0
			}
		);
		let single = [GraphNode::new("a", 10.0, 10.0)];
		assert_eq!(
			estimate_graph_size(&single),
			ViewSize {
				width: 360.0,
				height: 240.0
			}
		);
		let wide = [GraphNode::new("a", 0.0, 0.0), GraphNode::new("b", 600.0, 400.0)];
		assert_eq!(estimate_graph_size(&wide).width, 780.0);
		assert_eq!(estimate_graph_size(&wide).height, 460.0);
	}

	#[test]
	fn label_half_width_is_clamped() {
		let short = GraphNode::new("a", 0.0, 0.0).with_name("Al");
		assert_eq!(estimated_label_half_width(&short), 42.0);
		let long = GraphNode::new("b", 0.0, 0.0)
			.with_name("Maximiliano Bartolome")
			.with_spend(12_345.0);
		let chars = node_always_label(&long).chars().count() as f64;
		assert_eq!(estimated_label_half_width(&long), (chars * 3.4).clamp(42.0, 112.0));
	}

	#[test]
	fn classification_rules() {
		let wide = ViewportSnapshot {
			width: 1280.0,
			is_portrait: false,
		};
		let none = ViewSize {
			width: 0.0,
			height: 0.0,
		};
		let tall = ViewSize {
			width: 400.0,
			height: 700.0,
		};

		assert!(!is_portrait_active(PortraitMode::Auto, none, wide, 860.0));
		assert!(is_portrait_active(PortraitMode::Auto, tall, wide, 860.0));
		assert!(is_portrait_active(
			PortraitMode::Auto,
			none,
			ViewportSnapshot {
				width: 860.0,
				is_portrait: false
			},
			860.0
		));
		assert!(is_portrait_active(PortraitMode::On, none, wide, 860.0));
		assert!(!is_portrait_active(PortraitMode::Off, tall, wide, 860.0));
	}

	#[test]
	fn square_fixed_viewport_reports_portrait() {
		assert!(FixedViewport::new(900.0, 900.0).portrait);
		assert!(FixedViewport::new(700.0, 1200.0).portrait);
		assert!(!FixedViewport::new(1280.0, 800.0).portrait);
		assert!(!FixedViewport::default().is_portrait());
	}

	#[test]
	fn cache_serves_identical_layout_until_inputs_change() {
		let (nodes, links) = referral_tree();
		let nodes = Arc::new(nodes);
		let links = Arc::new(links);
		let size = ViewSize {
			width: 400.0,
			height: 800.0,
		};
		let cache = PortraitLayoutCache::default();

		let first = cache.get_or_compute(&nodes, &links, size);
		let second = cache.get_or_compute(&nodes, &links, size);
		assert!(Rc::ptr_eq(&first, &second));

		let resized = cache.get_or_compute(
			&nodes,
			&links,
			ViewSize {
				width: 420.0,
				height: 800.0,
			},
		);
		assert!(!Rc::ptr_eq(&first, &resized));

		let refreshed = Arc::new(nodes.as_ref().clone());
		let third = cache.get_or_compute(&refreshed, &links, size);
		assert!(!Rc::ptr_eq(&resized, &third));
		assert_eq!(*third, *first);

		cache.invalidate();
		let fourth = cache.get_or_compute(&refreshed, &links, size);
		assert!(!Rc::ptr_eq(&third, &fourth));
	}
}
