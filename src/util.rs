use chrono::Utc;
use uuid::Uuid;

/// `<prefix>-<unix millis>-<random>`. Unique with high probability only;
/// callers never check for collisions.
pub fn fresh_id(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let rand = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", prefix, millis, &rand[..9])
}

pub fn slugify(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_dash = false;
    for c in lowered.chars() {
        if c.is_whitespace() {
            pending_dash = !out.is_empty();
            continue;
        }
        if c.is_ascii_alphanumeric() || c == '-' {
            if pending_dash {
                out.push('-');
                pending_dash = false;
            }
            out.push(c);
        }
    }
    out
}
