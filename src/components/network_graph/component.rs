use std::sync::Arc;

use leptos::html::Div;
use leptos::prelude::*;
use log::warn;
use wasm_bindgen::prelude::*;
use web_sys::{
	Element, FocusEvent, KeyboardEvent, MouseEvent, ResizeObserver, ResizeObserverEntry,
	SvgElement, TransitionEvent,
};

use super::layout::{FixedViewport, ViewportProbe};
use super::render::{compact_money, node_display_name, spend_value};
use super::state::{ClientRect, NetworkGraphState, NodeVisual, PlateVisual};
use super::types::{
	DEFAULT_EMPTY_STATE_TEXT, DEFAULT_PORTRAIT_BREAKPOINT, GraphEvent, GraphLink, GraphNode,
	GraphOptions, LabelMode, LinkStyle, NodeRole, PortraitMode,
};

const STATUS_DOT_RADIUS: f64 = 4.0;
const CAPTION_GAP: f64 = 14.0;

const LEGEND: [(&str, &str); 5] = [
	("root", "Tú"),
	("L1", "Nivel 1"),
	("L2", "Nivel 2"),
	("L3", "Nivel 3"),
	("inactive", "Inactiva"),
];

/// Browser window as seen by the layout classifier.
struct WindowViewport;

impl ViewportProbe for WindowViewport {
	fn width(&self) -> f64 {
		web_sys::window()
			.and_then(|w| w.inner_width().ok())
			.and_then(|v| v.as_f64())
			.unwrap_or_else(|| FixedViewport::default().width)
	}

	fn height(&self) -> f64 {
		web_sys::window()
			.and_then(|w| w.inner_height().ok())
			.and_then(|v| v.as_f64())
			.unwrap_or_else(|| FixedViewport::default().height)
	}

	fn is_portrait(&self) -> bool {
		web_sys::window()
			.and_then(|w| w.match_media("(orientation: portrait)").ok().flatten())
			.is_some_and(|m| m.matches())
	}
}

type ObserverSlot = Option<(ResizeObserver, Closure<dyn FnMut(js_sys::Array)>)>;

/// Referral network drawn as SVG, with hover and click zoom and a portrait
/// tree layout on narrow screens.
///
/// Every input is reactive. A change re-lays out and re-renders the graph.
#[component]
pub fn NetworkGraph(
	#[prop(into)] nodes: Signal<Arc<Vec<GraphNode>>>,
	#[prop(into)] links: Signal<Arc<Vec<GraphLink>>>,
	#[prop(into, optional)] view_box_width: MaybeProp<f64>,
	#[prop(into, optional)] view_box_height: MaybeProp<f64>,
	#[prop(into, optional)] height_px: MaybeProp<f64>,
	#[prop(into, default = Signal::stored(LinkStyle::Curved))] link_style: Signal<LinkStyle>,
	#[prop(into, default = Signal::stored(LabelMode::Short))] label_mode: Signal<LabelMode>,
	#[prop(into, default = Signal::stored(true))] interactive: Signal<bool>,
	#[prop(into, optional)] selected_node_id: MaybeProp<String>,
	#[prop(into, default = Signal::stored(false))] show_legend: Signal<bool>,
	#[prop(into, optional)] empty_state_text: MaybeProp<String>,
	#[prop(into, optional)] spend_max: MaybeProp<f64>,
	#[prop(into, default = Signal::stored(true))] show_spend: Signal<bool>,
	#[prop(into, default = Signal::stored(true))] show_status_dot: Signal<bool>,
	#[prop(into, default = Signal::stored(PortraitMode::Auto))] portrait_tree: Signal<PortraitMode>,
	#[prop(into, default = Signal::stored(DEFAULT_PORTRAIT_BREAKPOINT))]
	portrait_breakpoint: Signal<f64>,
	#[prop(optional)] on_node_click: Option<Callback<GraphNode>>,
	#[prop(optional)] on_node_hover: Option<Callback<Option<GraphNode>>>,
) -> impl IntoView {
	let read_options = move || GraphOptions {
		view_box_width: view_box_width.get(),
		view_box_height: view_box_height.get(),
		height_px: height_px.get(),
		link_style: link_style.get(),
		label_mode: label_mode.get(),
		interactive: interactive.get(),
		selected_node_id: selected_node_id.get(),
		show_legend: show_legend.get(),
		empty_state_text: empty_state_text
			.get()
			.unwrap_or_else(|| DEFAULT_EMPTY_STATE_TEXT.into()),
		spend_max: spend_max.get(),
		show_spend: show_spend.get(),
		show_status_dot: show_status_dot.get(),
		portrait_tree: portrait_tree.get(),
		portrait_breakpoint: portrait_breakpoint.get(),
	};
	let state = RwSignal::new_local(NetworkGraphState::new(
		nodes.get_untracked(),
		links.get_untracked(),
		untrack(read_options),
		Box::new(WindowViewport),
	));

	Effect::new(move |_| {
		let (nodes, links) = (nodes.get(), links.get());
		state.update(|s| s.set_data(nodes, links));
	});
	Effect::new(move |_| {
		let options = read_options();
		state.try_maybe_update(|s| {
			let changed = s.options != options;
			if changed {
				s.options = options;
			}
			(changed, ())
		});
	});
	let is_interactive = move || state.with(|s| s.options.interactive);

	let emit = move |event: Option<GraphEvent>| match event {
		Some(GraphEvent::NodeClick(node)) => {
			if let Some(cb) = on_node_click {
				cb.run(node);
			}
		}
		Some(GraphEvent::NodeHover(node)) => {
			if let Some(cb) = on_node_hover {
				cb.run(node);
			}
		}
		None => {}
	};

	let host_ref = NodeRef::<Div>::new();
	let svg_element = move || -> Option<Element> {
		host_ref
			.get_untracked()
			.and_then(|host| host.query_selector("svg").ok().flatten())
	};
	let pointer_anchor = move |ev: &MouseEvent| {
		let rect = svg_element().map(|svg| {
			let r = svg.get_bounding_client_rect();
			ClientRect {
				left: r.left(),
				top: r.top(),
				width: r.width(),
				height: r.height(),
			}
		});
		state.with_untracked(|s| {
			s.client_to_svg_point(ev.client_x() as f64, ev.client_y() as f64, rect)
		})
	};
	let refresh_meet_scale = move || {
		let size = svg_element().map(|svg| (svg.client_width() as f64, svg.client_height() as f64));
		state.try_maybe_update(|s| (s.update_svg_meet_scale(size), ()));
	};

	let observer = StoredValue::new_local(ObserverSlot::None);
	let window_listener = StoredValue::new_local(None::<Closure<dyn FnMut()>>);

	Effect::new(move |_| {
		let Some(host) = host_ref.get() else {
			return;
		};
		if observer.with_value(|o| o.is_some()) {
			return;
		}
		let host: Element = host.into();
		let target = host.clone();
		let on_resize = Closure::<dyn FnMut(js_sys::Array)>::new(move |entries: js_sys::Array| {
			for entry in entries.iter() {
				let entry: ResizeObserverEntry = entry.unchecked_into();
				if js_sys::Object::is(&entry.target(), &target) {
					let rect = entry.content_rect();
					state.try_update(|s| s.on_container_resize(rect.width(), rect.height()));
				}
			}
			refresh_meet_scale();
		});
		match ResizeObserver::new(on_resize.as_ref().unchecked_ref()) {
			Ok(ro) => {
				ro.observe(&host);
				if let Some(svg) = svg_element() {
					ro.observe(&svg);
				}
				observer.set_value(Some((ro, on_resize)));
			}
			Err(err) => warn!("network graph: resize observer unavailable: {err:?}"),
		}

		let on_window_resize = Closure::<dyn FnMut()>::new(move || {
			state.try_update(|s| s.on_viewport_resize());
			refresh_meet_scale();
		});
		if let Some(window) = web_sys::window() {
			let _ = window
				.add_event_listener_with_callback("resize", on_window_resize.as_ref().unchecked_ref());
		}
		window_listener.set_value(Some(on_window_resize));
	});

	let view_box = Memo::new(move |_| state.with(|s| s.view_box()));
	// The meet scale depends on the viewBox as well as the element size.
	Effect::new(move |_| {
		view_box.track();
		refresh_meet_scale();
	});

	on_cleanup(move || {
		observer.try_with_value(|o| {
			if let Some((ro, _)) = o {
				ro.disconnect();
			}
		});
		window_listener.try_with_value(|cb| {
			if let (Some(window), Some(cb)) = (web_sys::window(), cb) {
				let _ = window
					.remove_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		});
	});

	let node_ids = move || {
		state.with(|s| {
			s.scene()
				.nodes
				.iter()
				.map(|n| n.id.clone())
				.collect::<Vec<_>>()
		})
	};

	let node_view = move |id: String| {
		let visual = Memo::new({
			let id = id.clone();
			move |_| state.with(|s| s.node_visual(&id))
		});
		let on_enter = {
			let id = id.clone();
			move |ev: MouseEvent| {
				let anchor = pointer_anchor(&ev);
				emit(state.try_update(|s| s.on_node_pointer_enter(&id, anchor)).flatten());
			}
		};
		let on_move = move |ev: MouseEvent| {
			if state.with_untracked(|s| s.follows_pointer()) {
				let anchor = pointer_anchor(&ev);
				state.update(|s| s.on_node_pointer_move(anchor));
			}
		};
		let on_leave = {
			let id = id.clone();
			move |_: MouseEvent| {
				emit(state.try_update(|s| s.on_node_pointer_leave(&id)).flatten());
			}
		};
		let on_focus = {
			let id = id.clone();
			move |_: FocusEvent| {
				emit(state.try_update(|s| s.on_node_focus(&id)).flatten());
			}
		};
		let on_blur = {
			let id = id.clone();
			move |_: FocusEvent| {
				emit(state.try_update(|s| s.on_node_blur(&id)).flatten());
			}
		};
		let on_click = {
			let id = id.clone();
			move |ev: MouseEvent| {
				if !state.with_untracked(|s| s.options.interactive) {
					return;
				}
				ev.stop_propagation();
				if let Some(el) = ev.current_target().and_then(|t| t.dyn_into::<SvgElement>().ok()) {
					let _ = el.blur();
				}
				emit(state.try_update(|s| s.on_node_click(&id)).flatten());
			}
		};
		let on_keydown = move |ev: KeyboardEvent| {
			if !state.with_untracked(|s| s.options.interactive) {
				return;
			}
			let key = ev.key();
			if key == "Enter" || key == " " {
				ev.prevent_default();
			}
			emit(state.try_update(|s| s.on_node_keydown(&id, &key)).flatten());
		};

		view! {
			<g
				class=move || visual.with(|v| v.as_ref().map(node_class).unwrap_or_default())
				tabindex=move || if is_interactive() { "0" } else { "-1" }
				role="button"
				aria-label=move || {
					visual.with(|v| v.as_ref().map(|v| v.aria_label.clone()).unwrap_or_default())
				}
				on:mouseenter=on_enter
				on:mousemove=on_move
				on:mouseleave=on_leave
				on:focus=on_focus
				on:blur=on_blur
				on:click=on_click
				on:keydown=on_keydown
			>
				{move || visual.get().map(node_body)}
			</g>
		}
	};

	let plates = move || {
		state
			.with(|s| s.plate_visuals())
			.into_iter()
			.map(|p| plate_view(p, state))
			.collect_view()
	};

	let tooltip = move || {
		let (tooltip, show_spend) = state.with(|s| (s.tooltip.clone(), s.options.show_spend));
		tooltip.map(|t| {
			let spend = show_spend.then(|| {
				view! { <span class="network-graph__tooltip-spend">{compact_money(spend_value(&t.node))}</span> }
			});
			view! {
				<div
					class="network-graph__tooltip"
					role="tooltip"
					style:left=format!("{}%", t.left_pct)
					style:top=format!("{}%", t.top_pct)
				>
					<strong>{node_display_name(&t.node)}</strong>
					<span class="network-graph__tooltip-level">{NodeRole::of(&t.node).to_string()}</span>
					{spend}
				</div>
			}
		})
	};

	let legend = move || {
		state.with(|s| s.options.show_legend).then(|| {
			view! {
				<ul class="network-graph__legend">
					{LEGEND
						.iter()
						.map(|(key, label)| {
							view! {
								<li class="network-graph__legend-item">
									<span class=format!("network-graph__swatch network-graph__swatch--{key}") />
									{*label}
								</li>
							}
						})
						.collect_view()}
				</ul>
			}
		})
	};

	view! {
		<div
			node_ref=host_ref
			class="network-graph"
			class:is-portrait=move || state.with(|s| s.is_portrait())
			class:is-interactive=is_interactive
			style=move || {
				state.with(|s| {
					format!(
						"height: {}px; --ng-plate-transform: {};",
						s.computed_height_px(),
						s.plate_inverse_css_scale()
					)
				})
			}
		>
			<svg
				class="network-graph__svg"
				hidden=move || !state.with(|s| s.has_data())
				role="img"
				aria-label=move || state.with(|s| s.aria_label())
				viewBox=move || view_box.with(|v| format!("0 0 {} {}", v.width, v.height))
				preserveAspectRatio=move || state.with(|s| s.preserve_aspect())
				on:click=move |_: MouseEvent| state.update(|s| s.on_canvas_click())
			>
				<g
					class="network-graph__viewport"
					transform=move || state.with(|s| s.viewport_transform())
					on:transitionstart=move |ev: TransitionEvent| {
						if ev.target() == ev.current_target() {
							state.update(|s| s.on_viewport_transition_start());
						}
					}
					on:transitionend=move |ev: TransitionEvent| {
						if ev.target() == ev.current_target() {
							emit(state.try_update(|s| s.on_viewport_transition_end()).flatten());
						}
					}
				>
					<g class="network-graph__links">
						{move || {
							state
								.with(|s| s.link_visuals())
								.into_iter()
								.map(|l| {
									view! {
										<path
											class="network-graph__link"
											class:is-connected=l.connected
											class:is-dimmed=l.dimmed
											d=l.path
										/>
									}
								})
								.collect_view()
						}}
					</g>
					<g class="network-graph__nodes">
						<For each=node_ids key=|id: &String| id.clone() children=node_view />
					</g>
					<g class="network-graph__plates">{plates}</g>
				</g>
			</svg>
			{tooltip}
			{move || {
				state
					.with(|s| (!s.has_data()).then(|| s.options.empty_state_text.clone()))
					.map(|text| view! { <p class="network-graph__empty">{text}</p> })
			}}
			{legend}
		</div>
	}
}

fn node_class(v: &NodeVisual) -> String {
	let mut class = format!("network-graph__node network-graph__node--{}", v.role);
	for (on, name) in [
		(v.active, " is-active"),
		(v.dimmed, " is-dimmed"),
		(v.inactive, " is-inactive"),
	] {
		if on {
			class.push_str(name);
		}
	}
	class
}

fn node_body(v: NodeVisual) -> impl IntoView {
	let (x, y, r) = (v.node.x, v.node.y, v.radius);
	let ring = v.ring_visible.then(|| {
		view! {
			<circle
				class="network-graph__ring-track"
				cx=x.to_string()
				cy=y.to_string()
				r=v.ring_radius.to_string()
			/>
			<circle
				class="network-graph__ring"
				cx=x.to_string()
				cy=y.to_string()
				r=v.ring_radius.to_string()
				transform=v.ring_transform.clone()
				stroke-dasharray=v.ring_circumference.to_string()
				stroke-dashoffset=v.ring_dashoffset.to_string()
			/>
		}
	});
	let dot = v.status_dot.then(|| {
		view! {
			<circle
				class="network-graph__status-dot"
				cx=(x + r * 0.72).to_string()
				cy=(y - r * 0.72).to_string()
				r=STATUS_DOT_RADIUS.to_string()
			/>
		}
	});
	let badge = v.badge.map(|badge| {
		view! {
			<text
				class="network-graph__badge"
				x=x.to_string()
				y=y.to_string()
				text-anchor="middle"
				dominant-baseline="central"
			>
				{badge}
			</text>
		}
	});
	let (label_x, label_y, anchor) = if v.label_beside {
		(x + r + CAPTION_GAP, y, "start")
	} else {
		(x, y + r + CAPTION_GAP, "middle")
	};

	view! {
		{ring}
		<circle
			class="network-graph__dot"
			cx=x.to_string()
			cy=y.to_string()
			r=r.to_string()
			fill=v.fill
			stroke=v.stroke
		/>
		{badge}
		{dot}
		<text
			class="network-graph__label"
			x=label_x.to_string()
			y=label_y.to_string()
			text-anchor=anchor
			dominant-baseline="central"
		>
			{v.label}
		</text>
	}
}

fn plate_view(p: PlateVisual, state: RwSignal<NetworkGraphState, LocalStorage>) -> impl IntoView {
	let b = p.plate;
	let close = p.closable.then(|| {
		view! {
			<g
				class="network-graph__plate-close"
				role="button"
				aria-label="Cerrar detalle"
				on:click=move |ev: MouseEvent| {
					ev.stop_propagation();
					state.update(|s| s.close_node_plate());
				}
			>
				<circle cx=(b.width - 14.0).to_string() cy="14" r="9" />
				<text
					x=(b.width - 14.0).to_string()
					y="14"
					text-anchor="middle"
					dominant-baseline="central"
				>
					"×"
				</text>
			</g>
		}
	});

	view! {
		<g
			class="network-graph__plate"
			data-node-id=p.node.id.clone()
			transform=format!("translate({} {})", b.x, b.y)
			on:click=|ev: MouseEvent| ev.stop_propagation()
		>
			<rect width=b.width.to_string() height=b.height.to_string() rx="10" />
			<text class="network-graph__plate-title" x="12" y="22">
				{p.title}
			</text>
			<text class="network-graph__plate-subtitle" x="12" y="40">
				{p.subtitle}
			</text>
			<text class="network-graph__plate-spend" x="12" y="56">
				{p.spend}
			</text>
			{close}
		</g>
	}
}
