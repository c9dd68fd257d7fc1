//! HTML views
//!
//! Leptos components rendered to strings on the server. Text and attribute
//! values are escaped by the renderer.

pub mod forms;
pub mod landing;
pub mod tracker;

use leptos::*;

use crate::auth::Identity;

const STYLE: &str = r#"
body { margin: 0; font-family: system-ui, sans-serif; background: #f9fafb; color: #111827; }
nav { background: #fff; box-shadow: 0 1px 2px rgba(0,0,0,.08); }
nav .bar { max-width: 80rem; margin: 0 auto; padding: 0 1rem; height: 4rem; display: flex; align-items: center; justify-content: space-between; }
nav .brand { font-size: 1.25rem; font-weight: 700; color: #1f2937; text-decoration: none; }
nav .user { display: flex; align-items: center; gap: .75rem; font-size: .875rem; }
main { max-width: 56rem; margin: 0 auto; padding: 2rem 1rem; }
.card { background: #fff; border-radius: .5rem; box-shadow: 0 4px 12px rgba(0,0,0,.08); padding: 1.5rem; }
.btn { padding: .5rem 1rem; border-radius: .375rem; border: 1px solid #d1d5db; background: #fff; cursor: pointer; }
.btn-primary { background: #2563eb; border-color: #2563eb; color: #fff; }
.btn:disabled { opacity: .5; cursor: not-allowed; }
.alert { background: #fee2e2; border: 1px solid #f87171; color: #b91c1c; padding: .75rem 1rem; border-radius: .25rem; }
.field-error { margin-top: .25rem; font-size: .875rem; color: #dc2626; }
.spinner { width: 3rem; height: 3rem; border: 4px solid #e5e7eb; border-top-color: #2563eb; border-radius: 50%; animation: spin 1s linear infinite; }
@keyframes spin { to { transform: rotate(360deg); } }
"#;

/// Render a full page to an HTML document
pub fn render<F, N>(page: F) -> String
where
    F: FnOnce() -> N + 'static,
    N: IntoView,
{
    format!("<!DOCTYPE html>\n{}", leptos::ssr::render_to_string(page))
}

/// Complete HTML document
#[component]
pub fn Document(
    #[prop(into)] title: String,
    /// Reload the page every second
    #[prop(optional)]
    refresh: bool,
    children: Children,
) -> impl IntoView {
    view! {
        <html lang="en">
            <head>
                <meta charset="utf-8"/>
                <meta name="viewport" content="width=device-width, initial-scale=1"/>
                {refresh.then(|| view! { <meta http-equiv="refresh" content="1"/> })}
                <title>{title}</title>
                <style inner_html=STYLE></style>
            </head>
            <body>{children()}</body>
        </html>
    }
}

/// Red alert box; nothing when there is nothing to say
#[component]
pub fn ErrorBanner(#[prop(into)] message: String) -> impl IntoView {
    (!message.is_empty()).then(move || {
        view! {
            <div class="alert" role="alert">
                <span>{message}</span>
            </div>
        }
    })
}

/// Top bar with the brand and, when signed in, the account menu
#[component]
pub fn Navbar(base: String, identity: Option<Identity>) -> impl IntoView {
    let account = identity.map(|identity| {
        let name = identity.email.unwrap_or(identity.user_id);
        view! {
            <div class="user">
                <span>"Signed in as " <strong>{name}</strong></span>
                <form method="post" action={format!("{}/logout", base)}>
                    <button class="btn" type="submit">"Sign out"</button>
                </form>
            </div>
        }
    });

    view! {
        <nav>
            <div class="bar">
                <a class="brand" href={format!("{}/dashboard", base)}>"TimeTracker"</a>
                {account}
            </div>
        </nav>
    }
}

/// Page frame for signed-in screens
#[component]
pub fn AuthenticatedLayout(
    base: String,
    identity: Identity,
    #[prop(into)] title: String,
    children: Children,
) -> impl IntoView {
    view! {
        <Document title=title>
            <Navbar base=base identity={Some(identity)}/>
            <main>{children()}</main>
        </Document>
    }
}

/// Shown while the initial session check is still running; reloads itself
pub fn loading_page() -> String {
    render(|| {
        view! {
            <Document title="Loading" refresh=true>
                <div style="min-height:100vh;display:flex;align-items:center;justify-content:center">
                    <div class="spinner" role="status" aria-label="Loading"></div>
                </div>
            </Document>
        }
    })
}

/// Error screen with the request id the failure was logged under
pub fn error_page(title: &str, message: String, request_id: String) -> String {
    let title = title.to_string();
    render(move || {
        view! {
            <Document title=title>
                <main>
                    <ErrorBanner message=message/>
                    <p><small>"Request id: " {request_id}</small></p>
                </main>
            </Document>
        }
    })
}
