// Login form detection

use scraper::ElementRef;

const FORM_KEYWORDS: [&str; 3] = ["login", "signin", "auth"];
const IDENTITY_KEYWORDS: [&str; 3] = ["user", "email", "login"];

/// Decides whether a `<form>` element looks like a login form.
///
/// A form qualifies when its own `id`, `class` or `name` mentions a login
/// keyword, or when it contains both a password input and a text/email input
/// whose `name` or `id` looks like a user identity.
pub fn is_login_form(form: ElementRef<'_>) -> bool {
    if has_login_attribute(form) {
        return true;
    }

    let mut has_password = false;
    let mut has_identity = false;

    for node in form.descendants() {
        let Some(input) = ElementRef::wrap(node) else {
            continue;
        };
        if input.value().name() != "input" {
            continue;
        }

        let input_type = input
            .value()
            .attr("type")
            .map(str::to_lowercase)
            .unwrap_or_default();

        match input_type.as_str() {
            "password" => has_password = true,
            "text" | "email" if is_identity_input(input) => has_identity = true,
            _ => {}
        }

        if has_password && has_identity {
            return true;
        }
    }

    false
}

fn has_login_attribute(form: ElementRef<'_>) -> bool {
    ["id", "class", "name"]
        .iter()
        .filter_map(|key| form.value().attr(key))
        .any(|value| contains_any(value, &FORM_KEYWORDS))
}

fn is_identity_input(input: ElementRef<'_>) -> bool {
    ["name", "id"]
        .iter()
        .filter_map(|key| input.value().attr(key))
        .any(|value| contains_any(value, &IDENTITY_KEYWORDS))
}

fn contains_any(value: &str, keywords: &[&str]) -> bool {
    let lower = value.to_lowercase();
    keywords.iter().any(|keyword| lower.contains(keyword))
}
