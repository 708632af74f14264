//! Codec for the `comment` column.
//!
//! The admin store has no columns for role or operator override, so both are
//! packed into the free-text comment. Two encodings exist in deployed tables:
//!
//! ```text
//! Writer                                            legacy plain role
//! {"role": {"writer": true, "reader": false},       JSON, role as flags
//!  "admin_status": "OFFLINE_HARD"}
//! {"role": "reader", "admin_status": null}          JSON, role as a name
//! ```
//!
//! Decoding never fails; anything unrecognised is `Annotation::default()`.
//! Encoding always writes the JSON form with role flags.

use serde::{Deserialize, Serialize};

use crate::registry::backend::{Annotation, BackendRole, BackendStatus};

#[derive(Deserialize)]
struct WireAnnotation {
    #[serde(default)]
    role: Option<WireRole>,
    #[serde(default)]
    admin_status: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireRole {
    Flags {
        #[serde(default)]
        writer: bool,
        #[serde(default)]
        reader: bool,
    },
    Name(String),
}

#[derive(Serialize)]
struct EncodedAnnotation<'a> {
    admin_status: Option<&'a str>,
    role: RoleFlags,
}

#[derive(Serialize)]
struct RoleFlags {
    reader: bool,
    writer: bool,
}

fn role_from_name(name: &str) -> BackendRole {
    match name.trim().to_ascii_lowercase().as_str() {
        "writer" => BackendRole::Writer,
        "reader" => BackendRole::Reader,
        _ => BackendRole::None,
    }
}

/// Decode a comment cell.
pub fn decode(comment: Option<&str>) -> Annotation {
    let Some(text) = comment.map(str::trim).filter(|t| !t.is_empty()) else {
        return Annotation::default();
    };

    if !text.starts_with('{') {
        return Annotation::role(role_from_name(text));
    }

    let wire: WireAnnotation = match serde_json::from_str(text) {
        Ok(wire) => wire,
        Err(e) => {
            tracing::debug!(comment = %text, error = %e, "Unreadable backend comment, ignoring");
            return Annotation::default();
        }
    };

    let role = match wire.role {
        Some(WireRole::Flags { writer: true, .. }) => BackendRole::Writer,
        Some(WireRole::Flags { reader: true, .. }) => BackendRole::Reader,
        Some(WireRole::Flags { .. }) | None => BackendRole::None,
        Some(WireRole::Name(name)) => role_from_name(&name),
    };
    let admin_override = wire
        .admin_status
        .as_deref()
        .and_then(|s| s.parse::<BackendStatus>().ok());

    Annotation {
        role,
        admin_override,
    }
}

/// Encode for the comment column. An empty annotation is stored as NULL.
pub fn encode(annotation: &Annotation) -> Option<String> {
    if *annotation == Annotation::default() {
        return None;
    }
    let encoded = EncodedAnnotation {
        admin_status: annotation.admin_override.as_ref().map(BackendStatus::as_str),
        role: RoleFlags {
            reader: annotation.role == BackendRole::Reader,
            writer: annotation.role == BackendRole::Writer,
        },
    };
    serde_json::to_string(&encoded).ok()
}
