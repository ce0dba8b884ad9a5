use leptos::prelude::*;

/// 404 Not Found Page
#[component]
pub fn NotFound() -> impl IntoView {
	view! {
		<h1>"Página no encontrada"</h1>
		<a href="/">"Volver a la red"</a>
	}
}
