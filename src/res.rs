use axum::http::StatusCode;
use time::OffsetDateTime;

#[macro_export]
macro_rules! include_res {
    (bytes, $p:expr) => {
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
    (str, $p:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
}

/// Wraps a page body in the shared layout.
pub fn page(title: &str, viewer: Option<&str>, body: &str) -> String {
    let account = match viewer {
        Some(uid) => format!(
            r#"<a href="/u/{uid}">My garden</a> <a href="/logout">Log out</a>"#,
            uid = escape(uid)
        ),
        None => r#"<a href="/login">Log in</a>"#.to_owned(),
    };

    fill(include_res!(str, "/pages/layout.html"), &[
        ("title", &escape(title)),
        ("account", &account),
        ("body", body),
    ])
}

pub fn error_page(status: StatusCode, msg: &str) -> String {
    page(
        status.canonical_reason().unwrap_or("Error"),
        None,
        &fill(include_res!(str, "/pages/error.html"), &[
            ("status", status.as_str()),
            ("message", &escape(msg)),
        ]),
    )
}

/// Substitutes `{key}` placeholders in one pass, so filled-in text is never
/// scanned for placeholders again. Unknown `{…}` are left as they are.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut filled = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        filled.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let value = after
            .find('}')
            .map(|end| &after[..end])
            .and_then(|key| values.iter().find(|(k, _)| *k == key));

        match value {
            Some((key, value)) => {
                filled.push_str(value);
                rest = &after[key.len() + 1..];
            }
            None => {
                filled.push('{');
                rest = after;
            }
        }
    }

    filled.push_str(rest);
    filled
}

/// Escapes text for use in element content and quoted attributes.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// `created_at` millis as a UTC timestamp for display.
pub fn timestamp(millis: i64) -> String {
    match OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000) {
        Ok(at) => format!(
            "{}-{:02}-{:02} {:02}:{:02} UTC",
            at.year(),
            u8::from(at.month()),
            at.day(),
            at.hour(),
            at.minute()
        ),
        Err(_) => "some time".to_owned(),
    }
}

/// `<img>` for a picture url, or nothing when there is none.
pub fn picture(url: &str, alt: &str, class: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    format!(
        r#"<img class="{class}" src="{}" alt="{}">"#,
        escape(url),
        escape(alt)
    )
}
