//! Name derivation shared by the wiring resolver, compose assembler and file tree.

use std::collections::HashSet;

const MAX_SERVICE_NAME: usize = 63;

/// DNS- and filesystem-safe name: lowercase `[a-z0-9-]`, no leading, trailing
/// or repeated dashes. Returns an empty string when nothing usable remains.
pub fn sanitize_service_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.len() > MAX_SERVICE_NAME {
        out.truncate(MAX_SERVICE_NAME);
        while out.ends_with('-') {
            out.pop();
        }
    }
    out
}

/// Assigns each `(label, service_type)` a unique service name in input order.
/// Later duplicates get `-2`, `-3`, ... skipping names already taken.
pub fn assign_service_names<'a, I>(services: I) -> Vec<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut taken = HashSet::new();
    let mut names = Vec::new();
    for (label, service_type) in services {
        let mut base = sanitize_service_name(label);
        if base.is_empty() {
            base = sanitize_service_name(service_type);
        }
        if base.is_empty() {
            base = "service".to_string();
        }

        let mut candidate = base.clone();
        let mut suffix = 2;
        while taken.contains(&candidate) {
            let tail = format!("-{}", suffix);
            let mut head = base.clone();
            head.truncate(MAX_SERVICE_NAME - tail.len());
            candidate = format!("{}{}", head.trim_end_matches('-'), tail);
            suffix += 1;
        }
        taken.insert(candidate.clone());
        names.push(candidate);
    }
    names
}

/// Environment-variable identifier: uppercase `[A-Z0-9_]`, never starting
/// with a digit and never empty.
pub fn env_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        let c = c.to_ascii_uppercase();
        if c.is_ascii_uppercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, "SVC_");
        while out.ends_with('_') {
            out.pop();
        }
    }
    out
}

/// Slug used for the compose project, network and archive file name.
pub fn project_slug(name: &str) -> String {
    let slug = sanitize_service_name(name);
    if slug.is_empty() {
        "project".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_service_name() {
        assert_eq!(sanitize_service_name("User Service"), "user-service");
        assert_eq!(sanitize_service_name("  API__v2!! "), "api-v2");
        assert_eq!(sanitize_service_name("Ünïcode DB"), "n-code-db");
        assert_eq!(sanitize_service_name("---"), "");
        assert_eq!(sanitize_service_name(&"x".repeat(80)).len(), 63);
    }

    #[test]
    fn test_duplicate_labels_get_numeric_suffix() {
        let names = assign_service_names([
            ("API", "node"),
            ("api", "python-flask"),
            ("Api!", "python-fastapi"),
            ("", "redis"),
            ("", "redis"),
        ]);
        assert_eq!(names, vec!["api", "api-2", "api-3", "redis", "redis-2"]);
    }

    #[test]
    fn test_suffix_skips_taken_names() {
        let names = assign_service_names([("api-2", "node"), ("api", "node"), ("api", "node")]);
        assert_eq!(names, vec!["api-2", "api", "api-3"]);
    }

    #[test]
    fn test_env_identifier() {
        assert_eq!(env_identifier("Users DB"), "USERS_DB");
        assert_eq!(env_identifier("redis-cache"), "REDIS_CACHE");
        assert_eq!(env_identifier("3rd party"), "SVC_3RD_PARTY");
        assert_eq!(env_identifier("!!!"), "SVC");
    }

    #[test]
    fn test_project_slug_fallback() {
        assert_eq!(project_slug("My Shop"), "my-shop");
        assert_eq!(project_slug("   "), "project");
    }
}
