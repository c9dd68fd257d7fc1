//! Landing page for visitors without a session

use leptos::*;

use super::{render, Document, Navbar};

const FEATURES: [(&str, &str); 3] = [
    (
        "Easy Time Tracking",
        "Clock in and out with a single click. Track breaks and manage time off requests \
         effortlessly.",
    ),
    (
        "Team Management",
        "Manage your team's attendance, breaks, and time off requests from a single dashboard.",
    ),
    (
        "Detailed Reports",
        "Generate comprehensive reports on attendance, work hours, and time off for better \
         insights.",
    ),
];

#[component]
fn FeatureCard(title: &'static str, text: &'static str) -> impl IntoView {
    view! {
        <div class="card">
            <h3>{title}</h3>
            <p>{text}</p>
        </div>
    }
}

pub fn landing_page(base: &str) -> String {
    let base = base.to_string();

    render(move || {
        view! {
            <Document title="TimeTracker">
                <Navbar base={base.clone()} identity=None/>
                <main style="text-align:center">
                    <h1>
                        "Time Tracking Made Simple" <br/>
                        <span style="color:#2563eb">"For Teams and Companies"</span>
                    </h1>
                    <p>
                        "Track work hours, breaks, and time off with our easy-to-use platform. \
                         Perfect for remote teams and companies of all sizes."
                    </p>
                    <p>
                        <a class="btn btn-primary" href={format!("{}/register", base)}>
                            "Get Started"
                        </a>
                        " "
                        <a class="btn" href={format!("{}/login", base)}>"Sign In"</a>
                    </p>
                    <div style="display:grid;grid-template-columns:repeat(auto-fit,minmax(14rem,1fr));gap:2rem;margin-top:4rem;text-align:left">
                        {FEATURES
                            .iter()
                            .map(|&(title, text)| view! { <FeatureCard title=title text=text/> })
                            .collect_view()}
                    </div>
                </main>
            </Document>
        }
    })
}
