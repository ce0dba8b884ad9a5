//! Rebuilds the referral hierarchy from unordered nodes and positional links.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::{IndexMap, IndexSet};

use super::types::{GraphLink, GraphNode, NodeRole};

/// Two points closer than this on both axes are the same point.
pub const SAME_POINT_EPSILON: f64 = 0.01;
/// Farthest a link endpoint may sit from a node and still attach to it.
pub const NEAREST_POINT_MAX_DISTANCE: f64 = 3.0;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TreeData {
	pub roots: Vec<String>,
	/// Every node id in input order, mapped to its resolved parent.
	pub parent_by_id: IndexMap<String, Option<String>>,
	/// Direct children per node, ordered by the child's input x.
	pub children_by_parent: IndexMap<String, Vec<String>>,
}

#[cfg(test)]
impl TreeData {
	pub fn parent_of(&self, id: &str) -> Option<&str> {
		self.parent_by_id.get(id).and_then(|p| p.as_deref())
	}

	pub fn children_of(&self, id: &str) -> &[String] {
		children(&self.children_by_parent, id)
	}
}

pub fn is_same_point(x1: f64, y1: f64, x2: f64, y2: f64) -> bool {
	(x1 - x2).abs() < SAME_POINT_EPSILON && (y1 - y2).abs() < SAME_POINT_EPSILON
}

/// Resolves a link endpoint to a node id.
///
/// An exact hit wins, first in node order when several nodes coincide.
/// Otherwise the nearest node within [`NEAREST_POINT_MAX_DISTANCE`] is used,
/// again the first one on ties.
pub fn find_node_id_by_point(nodes: &[GraphNode], x: f64, y: f64) -> Option<&str> {
	if let Some(node) = nodes.iter().find(|n| is_same_point(n.x, n.y, x, y)) {
		return Some(node.id.as_str());
	}

	let mut best_id = None;
	let mut best_distance = f64::INFINITY;
	for node in nodes {
		let distance = (node.x - x).hypot(node.y - y);
		if distance < best_distance {
			best_distance = distance;
			best_id = Some(node.id.as_str());
		}
	}

	if best_distance <= NEAREST_POINT_MAX_DISTANCE {
		best_id
	} else {
		None
	}
}

pub fn build_tree(nodes: &[GraphNode], links: &[GraphLink]) -> TreeData {
	let x_by_id: HashMap<&str, f64> = nodes.iter().map(|n| (n.id.as_str(), n.x)).collect();
	let mut parent_by_id: IndexMap<String, Option<String>> = IndexMap::with_capacity(nodes.len());
	let mut children_sets: IndexMap<String, IndexSet<String>> = IndexMap::with_capacity(nodes.len());

	for node in nodes {
		parent_by_id.insert(node.id.clone(), None);
		children_sets.insert(node.id.clone(), IndexSet::new());
	}

	for node in nodes {
		let Some(parent_id) = node.parent_id() else {
			continue;
		};
		if parent_id == node.id || !x_by_id.contains_key(parent_id.as_str()) {
			continue;
		}
		if creates_cycle(&parent_by_id, &node.id, &parent_id) {
			continue;
		}
		attach(&mut parent_by_id, &mut children_sets, &node.id, &parent_id);
	}

	// Links only fill in parents that explicit references left open.
	for link in links {
		let (Some(parent_id), Some(child_id)) = (
			find_node_id_by_point(nodes, link.x1, link.y1),
			find_node_id_by_point(nodes, link.x2, link.y2),
		) else {
			continue;
		};
		if parent_id == child_id {
			continue;
		}
		if matches!(parent_by_id.get(child_id), Some(Some(_))) {
			continue;
		}
		if creates_cycle(&parent_by_id, child_id, parent_id) {
			continue;
		}
		attach(&mut parent_by_id, &mut children_sets, child_id, parent_id);
	}

	let roots = resolve_roots(nodes, &parent_by_id);

	let children_by_parent = children_sets
		.into_iter()
		.map(|(id, set)| {
			let mut ordered: Vec<String> = set.into_iter().collect();
			ordered.sort_by(|a, b| {
				let xa = x_by_id.get(a.as_str()).copied().unwrap_or(0.0);
				let xb = x_by_id.get(b.as_str()).copied().unwrap_or(0.0);
				xa.partial_cmp(&xb).unwrap_or(Ordering::Equal)
			});
			(id, ordered)
		})
		.collect();

	TreeData {
		roots,
		parent_by_id,
		children_by_parent,
	}
}

fn attach(
	parent_by_id: &mut IndexMap<String, Option<String>>,
	children_sets: &mut IndexMap<String, IndexSet<String>>,
	child_id: &str,
	parent_id: &str,
) {
	parent_by_id.insert(child_id.to_owned(), Some(parent_id.to_owned()));
	if let Some(children) = children_sets.get_mut(parent_id) {
		children.insert(child_id.to_owned());
	}
}

/// True when `child_id` is already an ancestor of (or equal to) `parent_id`.
fn creates_cycle(
	parent_by_id: &IndexMap<String, Option<String>>,
	child_id: &str,
	parent_id: &str,
) -> bool {
	let mut current = Some(parent_id);
	let mut hops = 0;
	while let Some(id) = current {
		if id == child_id {
			return true;
		}
		hops += 1;
		if hops > parent_by_id.len() {
			return true;
		}
		current = parent_by_id.get(id).and_then(|p| p.as_deref());
	}
	false
}

fn resolve_roots(nodes: &[GraphNode], parent_by_id: &IndexMap<String, Option<String>>) -> Vec<String> {
	let by_role: Vec<String> = nodes
		.iter()
		.filter(|n| NodeRole::of(n) == NodeRole::Root)
		.map(|n| n.id.clone())
		.collect();
	if !by_role.is_empty() {
		return by_role;
	}

	let parentless: Vec<String> = nodes
		.iter()
		.filter(|n| !matches!(parent_by_id.get(&n.id), Some(Some(_))))
		.map(|n| n.id.clone())
		.collect();
	if !parentless.is_empty() {
		return parentless;
	}

	nodes.first().map(|n| vec![n.id.clone()]).unwrap_or_default()
}

fn children<'a>(children_by_parent: &'a IndexMap<String, Vec<String>>, id: &str) -> &'a [String] {
	children_by_parent
		.get(id)
		.map(Vec::as_slice)
		.unwrap_or_default()
}

/// Breadth-first depth from the roots. A node reachable from several roots
/// keeps the first depth it was given.
pub fn compute_depths(
	roots: &[String],
	children_by_parent: &IndexMap<String, Vec<String>>,
) -> HashMap<String, usize> {
	let mut depths = HashMap::new();
	let mut queue: VecDeque<(&str, usize)> = roots.iter().map(|id| (id.as_str(), 0)).collect();

	while let Some((id, depth)) = queue.pop_front() {
		if depths.contains_key(id) {
			continue;
		}
		depths.insert(id.to_owned(), depth);
		for child in children(children_by_parent, id) {
			queue.push_back((child, depth + 1));
		}
	}

	depths
}

/// Number of leaves under each node reachable from the roots; a leaf counts 1.
pub fn compute_subtree_sizes(
	roots: &[String],
	children_by_parent: &IndexMap<String, Vec<String>>,
) -> HashMap<String, usize> {
	let mut sizes = HashMap::new();
	let mut stack = HashSet::new();
	for root in roots {
		visit_subtree(root, children_by_parent, &mut sizes, &mut stack);
	}
	sizes
}

fn visit_subtree<'a>(
	id: &'a str,
	children_by_parent: &'a IndexMap<String, Vec<String>>,
	sizes: &mut HashMap<String, usize>,
	stack: &mut HashSet<&'a str>,
) -> usize {
	if let Some(&size) = sizes.get(id) {
		return size;
	}
	// Already on the current path: inconsistent hierarchy, count it once.
	if stack.contains(id) {
		return 1;
	}

	let kids = children(children_by_parent, id);
	if kids.is_empty() {
		sizes.insert(id.to_owned(), 1);
		return 1;
	}

	stack.insert(id);
	let mut sum = 0;
	for child in kids {
		sum += visit_subtree(child, children_by_parent, sizes, stack);
	}
	stack.remove(id);

	let size = sum.max(1);
	sizes.insert(id.to_owned(), size);
	size
}

#[cfg(test)]
mod tests {
	use super::*;

	fn family() -> (Vec<GraphNode>, Vec<GraphLink>) {
		let root = GraphNode::new("root", 100.0, 100.0).with_level("root");
		let right = GraphNode::new("right", 300.0, 200.0).with_level("L1");
		let left = GraphNode::new("left", 50.0, 200.0).with_level("L1");
		let grandchild = GraphNode::new("grand", 60.0, 300.0).with_level("L2");
		let links = vec![
			GraphLink::between(&root, &right),
			GraphLink::between(&root, &left),
			GraphLink::between(&left, &grandchild),
		];
		(vec![root, right, left, grandchild], links)
	}

	fn hops_to_root(tree: &TreeData, id: &str) -> usize {
		let mut hops = 0;
		let mut current = id;
		while let Some(parent) = tree.parent_of(current) {
			hops += 1;
			current = parent;
		}
		hops
	}

	#[test]
	fn links_alone_rebuild_the_hierarchy() {
		let (nodes, links) = family();
		let tree = build_tree(&nodes, &links);

		assert_eq!(tree.roots, vec!["root"]);
		assert_eq!(tree.parent_of("left"), Some("root"));
		assert_eq!(tree.parent_of("grand"), Some("left"));
		assert_eq!(tree.parent_of("root"), None);
		assert_eq!(tree.children_of("root"), ["left", "right"]);
		assert!(tree.children_of("grand").is_empty());
	}

	#[test]
	fn explicit_parent_wins_over_links() {
		let (mut nodes, links) = family();
		nodes[3] = nodes[3].clone().with_parent("right");
		let tree = build_tree(&nodes, &links);

		assert_eq!(tree.parent_of("grand"), Some("right"));
		assert!(tree.children_of("left").is_empty());
		assert_eq!(tree.children_of("right"), ["grand"]);
	}

	#[test]
	fn unknown_or_self_parent_is_ignored() {
		let nodes = vec![
			GraphNode::new("a", 0.0, 0.0).with_parent("a"),
			GraphNode::new("b", 50.0, 0.0).with_parent("missing"),
		];
		let tree = build_tree(&nodes, &[]);

		assert_eq!(tree.parent_of("a"), None);
		assert_eq!(tree.parent_of("b"), None);
		assert_eq!(tree.roots, vec!["a", "b"]);
	}

	#[test]
	fn opposing_links_never_form_a_cycle() {
		let a = GraphNode::new("a", 0.0, 0.0);
		let b = GraphNode::new("b", 100.0, 0.0);
		let links = vec![GraphLink::between(&a, &b), GraphLink::between(&b, &a)];
		let tree = build_tree(&[a, b], &links);

		assert_eq!(tree.parent_of("b"), Some("a"));
		assert_eq!(tree.parent_of("a"), None);
		assert_eq!(tree.roots, vec!["a"]);
	}

	#[test]
	fn mutual_explicit_parents_keep_the_first() {
		let nodes = vec![
			GraphNode::new("a", 0.0, 0.0).with_parent("b"),
			GraphNode::new("b", 10.0, 0.0).with_parent("a"),
		];
		let tree = build_tree(&nodes, &[]);

		assert_eq!(tree.parent_of("a"), Some("b"));
		assert_eq!(tree.parent_of("b"), None);
		assert_eq!(tree.roots, vec!["b"]);
	}

	#[test]
	fn every_non_root_has_a_parent() {
		let nodes = vec![
			GraphNode::new("r", 0.0, 0.0),
			GraphNode::new("c1", 10.0, 10.0).with_parent("r"),
			GraphNode::new("c2", 20.0, 10.0).with_parent("r"),
			GraphNode::new("g1", 30.0, 20.0).with_parent("c2"),
		];
		let tree = build_tree(&nodes, &[]);

		assert_eq!(tree.roots, vec!["r"]);
		for node in &nodes[1..] {
			assert!(tree.parent_of(&node.id).is_some(), "{} lost its parent", node.id);
		}
	}

	#[test]
	fn roots_fall_back_to_parentless_nodes() {
		let a = GraphNode::new("a", 0.0, 0.0);
		let b = GraphNode::new("b", 10.0, 10.0);
		let c = GraphNode::new("c", 500.0, 500.0);
		let links = vec![GraphLink::between(&a, &b)];
		let tree = build_tree(&[a, b, c], &links);

		assert_eq!(tree.roots, vec!["a", "c"]);
		assert!(build_tree(&[], &[]).roots.is_empty());
	}

	#[test]
	fn point_lookup_prefers_exact_then_nearest() {
		let (nodes, _) = family();
		assert_eq!(find_node_id_by_point(&nodes, 300.0, 200.0), Some("right"));
		assert_eq!(find_node_id_by_point(&nodes, 302.0, 201.0), Some("right"));
		assert_eq!(find_node_id_by_point(&nodes, 310.0, 200.0), None);
	}

	#[test]
	fn coincident_nodes_resolve_to_the_first() {
		let nodes = vec![
			GraphNode::new("root", 0.0, 0.0).with_level("root"),
			GraphNode::new("twin-a", 100.0, 50.0),
			GraphNode::new("twin-b", 100.0, 50.0),
			GraphNode::new("grand", 200.0, 80.0),
		];
		assert_eq!(find_node_id_by_point(&nodes, 100.0, 50.0), Some("twin-a"));
		assert_eq!(find_node_id_by_point(&nodes, 101.0, 51.0), Some("twin-a"));
	}

	#[test]
	fn depths_match_parent_hops() {
		let (nodes, links) = family();
		let tree = build_tree(&nodes, &links);
		let depths = compute_depths(&tree.roots, &tree.children_by_parent);

		for node in &nodes {
			assert_eq!(depths[&node.id], hops_to_root(&tree, &node.id));
		}
		assert_eq!(depths["grand"], 2);
	}

	#[test]
	fn subtree_sizes_count_leaves() {
		let (nodes, links) = family();
		let tree = build_tree(&nodes, &links);
		let sizes = compute_subtree_sizes(&tree.roots, &tree.children_by_parent);

		assert_eq!(sizes["grand"], 1);
		assert_eq!(sizes["left"], 1);
		assert_eq!(sizes["right"], 1);
		assert_eq!(sizes["root"], 2);
	}

	#[test]
	fn subtree_sizes_survive_cyclic_children() {
		let mut children = IndexMap::new();
		children.insert("a".to_string(), vec!["b".to_string()]);
		children.insert("b".to_string(), vec!["a".to_string(), "c".to_string()]);
		children.insert("c".to_string(), Vec::new());
		let sizes = compute_subtree_sizes(&["a".to_string()], &children);

		assert_eq!(sizes["c"], 1);
		assert_eq!(sizes["b"], 2);
		assert_eq!(sizes["a"], 2);
	}
}
