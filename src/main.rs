//! Browser entry point: mounts the referral network app.

use network_tree_graph::{App, init_logging};

fn main() {
	init_logging();
	leptos::mount::mount_to_body(App);
}
