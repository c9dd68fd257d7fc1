//! Login and registration forms

use leptos::*;

use super::{render, Document, ErrorBanner};
use crate::validation::{Field, ValidationErrors};

/// What a form render needs besides the base path
#[derive(Debug, Default)]
pub struct FormView<'a> {
    /// Previously submitted email, echoed back
    pub email: &'a str,
    pub errors: Option<&'a ValidationErrors>,
    /// Generic failure message from the backend
    pub banner: &'a str,
    /// Offer "Sign in with Google"
    pub google: bool,
}

impl FormView<'_> {
    fn field_error(&self, field: Field) -> Option<&'static str> {
        self.errors.and_then(|e| e.get(field))
    }
}

#[component]
fn FormField(
    name: &'static str,
    kind: &'static str,
    placeholder: &'static str,
    autocomplete: &'static str,
    #[prop(optional, into)] value: String,
    error: Option<&'static str>,
) -> impl IntoView {
    view! {
        <div>
            <label for=name hidden=true>{placeholder}</label>
            <input
                id=name
                name=name
                type=kind
                placeholder=placeholder
                autocomplete=autocomplete
                value=value
            />
            {error.map(|message| view! { <p class="field-error">{message}</p> })}
        </div>
    }
}

#[component]
fn FormFrame(
    #[prop(into)] title: String,
    heading: &'static str,
    children: Children,
) -> impl IntoView {
    view! {
        <Document title=title>
            <main style="max-width:28rem">
                <h2 style="text-align:center">{heading}</h2>
                {children()}
            </main>
        </Document>
    }
}

pub fn login_page(base: &str, view: &FormView<'_>) -> String {
    let base = base.to_string();
    let email = view.email.to_string();
    let banner = view.banner.to_string();
    let email_error = view.field_error(Field::Email);
    let password_error = view.field_error(Field::Password);
    let google = view.google;

    render(move || {
        view! {
            <FormFrame title="Sign in" heading="Sign in to your account">
                <ErrorBanner message=banner/>
                <form method="post" action={format!("{}/login", base)} novalidate=true>
                    <FormField
                        name="email"
                        kind="email"
                        placeholder="Email address"
                        autocomplete="email"
                        value=email
                        error=email_error
                    />
                    <FormField
                        name="password"
                        kind="password"
                        placeholder="Password"
                        autocomplete="current-password"
                        error=password_error
                    />
                    <div>
                        <button class="btn btn-primary" type="submit">"Sign in"</button>
                    </div>
                </form>
                {google.then(|| view! {
                    <p style="text-align:center">"Or continue with"</p>
                    <p>
                        <a class="btn" href={format!("{}/login/google", base)}>
                            "Sign in with Google"
                        </a>
                    </p>
                })}
                <p>
                    "Don't have an account? "
                    <a href={format!("{}/register", base)}>"Sign up"</a>
                </p>
            </FormFrame>
        }
    })
}

pub fn register_page(base: &str, view: &FormView<'_>) -> String {
    let base = base.to_string();
    let email = view.email.to_string();
    let banner = view.banner.to_string();
    let email_error = view.field_error(Field::Email);
    let password_error = view.field_error(Field::Password);
    let confirm_error = view.field_error(Field::ConfirmPassword);

    render(move || {
        view! {
            <FormFrame title="Create account" heading="Create your account">
                <ErrorBanner message=banner/>
                <form method="post" action={format!("{}/register", base)} novalidate=true>
                    <FormField
                        name="email"
                        kind="email"
                        placeholder="Email address"
                        autocomplete="email"
                        value=email
                        error=email_error
                    />
                    <FormField
                        name="password"
                        kind="password"
                        placeholder="Password"
                        autocomplete="new-password"
                        error=password_error
                    />
                    <FormField
                        name="confirm_password"
                        kind="password"
                        placeholder="Confirm Password"
                        autocomplete="new-password"
                        error=confirm_error
                    />
                    <div>
                        <button class="btn btn-primary" type="submit">"Create Account"</button>
                    </div>
                </form>
                <p>
                    "Already have an account? "
                    <a href={format!("{}/login", base)}>"Sign in"</a>
                </p>
            </FormFrame>
        }
    })
}
