use std::collections::HashMap;
use std::sync::Arc;

use leptos::prelude::*;
use log::{info, warn};
use serde::Deserialize;

use crate::components::network_graph::render::{compact_money, node_display_name, spend_value};
use crate::components::network_graph::{
	GraphData, GraphLink, GraphNode, LabelMode, LinkStyle, NetworkGraph, NodeRole, PortraitMode,
	Result,
};

const MEMBERS_FIXTURE: &str = include_str!("network_members.json");

const ROOT_POSITION: (f64, f64) = (120.0, 130.0);
const L1_COLUMN: f64 = 260.0;
const L2_COLUMN: f64 = 420.0;
const MAX_L1: usize = 3;
const MAX_L2: usize = 6;

/// A member of the viewer's downline as listed by the dashboard.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMember {
	#[serde(default)]
	pub name: String,
	pub level: String,
	#[serde(default)]
	pub spend: f64,
	pub status: String,
	#[serde(default)]
	pub id: Option<String>,
	#[serde(default)]
	pub leader_id: Option<String>,
}

pub fn load_members(raw: &str) -> Result<Vec<NetworkMember>> {
	Ok(serde_json::from_str(raw)?)
}

/// `count` rows evenly spread over `[min_y, max_y]`, rounded. A single row
/// sits on the midpoint.
pub fn spread_positions(count: usize, min_y: f64, max_y: f64) -> Vec<f64> {
	if count <= 1 {
		return vec![((min_y + max_y) / 2.0).round()];
	}
	let step = (max_y - min_y) / (count - 1) as f64;
	(0..count)
		.map(|i| (min_y + step * i as f64).round())
		.collect()
}

fn member_node(id: String, level: &str, x: f64, y: f64, member: &NetworkMember) -> GraphNode {
	let name = if member.name.is_empty() {
		"Miembro"
	} else {
		member.name.as_str()
	};
	GraphNode::new(id, x, y)
		.with_level(level)
		.with_label(level)
		.with_name(name)
		.with_status(member.status.as_str())
		.with_spend(member.spend)
}

/// Root, up to three L1 members and up to six L2 members in fixed columns.
///
/// An L2 member hangs off its leader when the leader is among the drawn L1
/// members, otherwise L1 members take them in turn. Without L1 members
/// everything hangs off the root.
pub fn build_referral_graph(members: &[NetworkMember]) -> GraphData {
	let root = GraphNode::new("root", ROOT_POSITION.0, ROOT_POSITION.1)
		.with_level("root")
		.with_label("Tu")
		.with_name("Tu");

	let l1_members: Vec<&NetworkMember> = members
		.iter()
		.filter(|m| m.level == "L1")
		.take(MAX_L1)
		.collect();
	let l2_members: Vec<&NetworkMember> = members
		.iter()
		.filter(|m| m.level == "L2")
		.take(MAX_L2)
		.collect();

	let l1_rows = spread_positions(l1_members.len(), 70.0, 190.0);
	let l2_rows = spread_positions(l2_members.len(), 50.0, 210.0);

	let l1_nodes: Vec<GraphNode> = l1_members
		.iter()
		.zip(&l1_rows)
		.enumerate()
		.map(|(i, (member, y))| {
			member_node(format!("l1-{i}"), "L1", L1_COLUMN, *y, member).with_parent("root")
		})
		.collect();
	let l1_by_member: HashMap<&str, usize> = l1_members
		.iter()
		.enumerate()
		.filter_map(|(i, m)| m.id.as_deref().map(|id| (id, i)))
		.collect();

	let mut links: Vec<GraphLink> = l1_nodes
		.iter()
		.map(|node| GraphLink::between(&root, node))
		.collect();
	let mut l2_nodes = Vec::with_capacity(l2_members.len());
	for (i, (member, y)) in l2_members.iter().zip(&l2_rows).enumerate() {
		let leader = member
			.leader_id
			.as_deref()
			.and_then(|id| l1_by_member.get(id).copied());
		let parent = match leader {
			Some(idx) => &l1_nodes[idx],
			None if !l1_nodes.is_empty() => &l1_nodes[i % l1_nodes.len()],
			None => &root,
		};
		let node =
			member_node(format!("l2-{i}"), "L2", L2_COLUMN, *y, member).with_parent(parent.id.as_str());
		links.push(GraphLink::between(parent, &node));
		l2_nodes.push(node);
	}

	let mut nodes = Vec::with_capacity(1 + l1_nodes.len() + l2_nodes.len());
	nodes.push(root);
	nodes.extend(l1_nodes);
	nodes.extend(l2_nodes);
	GraphData { nodes, links }
}

fn member_details(node: GraphNode, selected: RwSignal<Option<GraphNode>>) -> impl IntoView {
	let status = node.status.clone().unwrap_or_else(|| "Activa".into());
	view! {
		<aside class="member-details">
			<h2>{node_display_name(&node)}</h2>
			<dl>
				<dt>"Nivel"</dt>
				<dd>{NodeRole::of(&node).to_string()}</dd>
				<dt>"Estado"</dt>
				<dd>{status}</dd>
				<dt>"Consumo"</dt>
				<dd>{compact_money(spend_value(&node))}</dd>
			</dl>
			<button on:click=move |_| selected.set(None)>"Cerrar"</button>
		</aside>
	}
}

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	let selected = RwSignal::new(None::<GraphNode>);
	let hovered = RwSignal::new(None::<GraphNode>);
	let portrait_mode = RwSignal::new(PortraitMode::Auto);
	let link_style = RwSignal::new(LinkStyle::Curved);
	let label_mode = RwSignal::new(LabelMode::Short);

	let graph = load_members(MEMBERS_FIXTURE).map(|members| {
		let data = build_referral_graph(&members);
		info!(
			"home: referral graph with {} nodes from {} members",
			data.nodes.len(),
			members.len()
		);
		view! {
			<NetworkGraph
				nodes=Signal::stored(Arc::new(data.nodes))
				links=Signal::stored(Arc::new(data.links))
				link_style=link_style
				label_mode=label_mode
				show_legend=true
				selected_node_id=Signal::derive(move || selected.get().map(|n| n.id))
				portrait_tree=portrait_mode
				on_node_click=Callback::new(move |node: GraphNode| {
					info!("home: selected {}", node.id);
					selected.set(Some(node));
				})
				on_node_hover=Callback::new(move |node: Option<GraphNode>| hovered.set(node))
			/>
		}
	});

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="network-page">
				<header class="network-page__header">
					<h1>"Mi red"</h1>
					<label>
						"Vista "
						<select on:change=move |ev| {
							match event_target_value(&ev).parse::<PortraitMode>() {
								Ok(mode) => portrait_mode.set(mode),
								Err(err) => warn!("home: {err}"),
							}
						}>
							<option value="auto" selected=true>"Automática"</option>
							<option value="true">"Árbol vertical"</option>
							<option value="false">"Libre"</option>
						</select>
					</label>
					<label>
						"Enlaces "
						<select on:change=move |ev| {
							match event_target_value(&ev).parse::<LinkStyle>() {
								Ok(style) => link_style.set(style),
								Err(err) => warn!("home: {err}"),
							}
						}>
							<option value="curved" selected=true>"Curvos"</option>
							<option value="straight">"Rectos"</option>
						</select>
					</label>
					<label>
						"Etiquetas "
						<select on:change=move |ev| {
							match event_target_value(&ev).parse::<LabelMode>() {
								Ok(mode) => label_mode.set(mode),
								Err(err) => warn!("home: {err}"),
							}
						}>
							<option value="initials">"Iniciales"</option>
							<option value="short" selected=true>"Cortas"</option>
							<option value="full">"Completas"</option>
						</select>
					</label>
					<p class="network-page__hint">
						{move || {
							hovered
								.get()
								.map(|n| format!("Viendo: {}", node_display_name(&n)))
								.unwrap_or_else(|| "Pasa el cursor sobre un miembro".into())
						}}
					</p>
				</header>
				{graph}
				{move || selected.get().map(|node| member_details(node, selected))}
			</div>
		</ErrorBoundary>
	}
}
