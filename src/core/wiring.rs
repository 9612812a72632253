use crate::core::naming::{assign_service_names, env_identifier};
use crate::core::validator::{ValidatedGraph, ValidatedService};
use crate::templates::ServiceLink;
use crate::utils::error::{Result, ScaffoldError};
use std::collections::{BTreeMap, HashMap, HashSet};

/// A service with its final name and effective environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WiredService {
    pub service_name: String,
    /// Explicit port, else the template default. Also the container port.
    pub port: u16,
    /// Set only when the user asked for a host port.
    pub host_port: Option<u16>,
    pub environment: BTreeMap<String, String>,
    /// Distinct dependencies in connection order.
    pub links: Vec<ServiceLink>,
    /// Derived keys the user's own environment shadowed.
    pub overridden: Vec<String>,
}

impl WiredService {
    pub fn depends_on(&self) -> Vec<String> {
        self.links.iter().map(|l| l.service_name.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct WiredGraph {
    validated: ValidatedGraph,
    services: Vec<WiredService>,
}

impl WiredGraph {
    pub fn validated(&self) -> &ValidatedGraph {
        &self.validated
    }

    /// Wired services, index-aligned with `validated().services()`.
    pub fn services(&self) -> &[WiredService] {
        &self.services
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ValidatedService, &WiredService)> {
        self.validated.services().iter().zip(&self.services)
    }

    pub fn by_id(&self, id: &str) -> Option<&WiredService> {
        self.validated.position_of(id).map(|i| &self.services[i])
    }
}

pub struct WiringResolver;

impl WiringResolver {
    pub fn resolve(validated: ValidatedGraph) -> Result<WiredGraph> {
        let services = validated.services();
        let names = assign_service_names(
            services
                .iter()
                .map(|s| (s.label.as_str(), s.service_type.as_str())),
        );

        let defaults: Vec<BTreeMap<String, String>> = services
            .iter()
            .zip(&names)
            .map(|(service, name)| {
                service
                    .template
                    .default_environment(name, service.resolved_port())
                    .into_iter()
                    .collect()
            })
            .collect();

        // Template defaults overlaid with user values: what each service
        // itself runs with. Connection URLs are composed from this.
        let own_env: Vec<BTreeMap<String, String>> = services
            .iter()
            .zip(&defaults)
            .map(|(service, defaults)| {
                let mut env = defaults.clone();
                env.extend(service.settings.environment.clone());
                env
            })
            .collect();

        let targets = outbound_targets(&validated);

        let mut wired = Vec::with_capacity(services.len());
        for (i, service) in services.iter().enumerate() {
            let prefixes = link_prefixes(&service.id, services, &names, &targets[i], &defaults[i])?;

            let mut derived: BTreeMap<String, String> = BTreeMap::new();
            let mut links = Vec::with_capacity(targets[i].len());
            for (&t, prefix) in targets[i].iter().zip(prefixes) {
                let target = &services[t];
                let host = names[t].as_str();
                let port = target.resolved_port();
                let url = target.template.connection_url(host, port, &own_env[t]);

                let link = ServiceLink {
                    service_name: host.to_string(),
                    env_prefix: prefix,
                    has_url: url.is_some(),
                };
                let mut entries = vec![
                    (link.host_var(), host.to_string()),
                    (link.port_var(), port.to_string()),
                ];
                if let Some(url) = url {
                    entries.push((link.url_var(), url));
                }
                for (key, value) in entries {
                    if derived.insert(key.clone(), value).is_some() {
                        return Err(ScaffoldError::WiringConflict {
                            node_id: service.id.clone(),
                            keys: vec![key],
                        });
                    }
                }
                links.push(link);
            }

            let overridden: Vec<String> = derived
                .keys()
                .filter(|key| service.settings.environment.contains_key(*key))
                .cloned()
                .collect();
            if !overridden.is_empty() {
                tracing::debug!(
                    "Service '{}' keeps its own value for {}",
                    names[i],
                    overridden.join(", ")
                );
            }

            let mut environment = defaults[i].clone();
            environment.extend(derived);
            environment.extend(service.settings.environment.clone());

            wired.push(WiredService {
                service_name: names[i].clone(),
                port: service.resolved_port(),
                host_port: service.settings.port,
                environment,
                links,
                overridden,
            });
        }

        Ok(WiredGraph {
            validated,
            services: wired,
        })
    }
}

/// Distinct, non-self targets of every service, in connection order.
fn outbound_targets(validated: &ValidatedGraph) -> Vec<Vec<usize>> {
    let mut targets = vec![Vec::new(); validated.services().len()];
    let mut seen = HashSet::new();
    for connection in &validated.graph().connections {
        let (Some(source), Some(target)) = (
            validated.position_of(&connection.source),
            validated.position_of(&connection.target),
        ) else {
            continue;
        };
        if source != target && seen.insert((source, target)) {
            targets[source].push(target);
        }
    }
    targets
}

/// Variable prefixes for one source's targets. Targets whose label-derived
/// prefixes collide with each other, or whose variables would shadow one of
/// the source's own template defaults, get their id appended.
fn link_prefixes(
    source_id: &str,
    services: &[ValidatedService],
    names: &[String],
    targets: &[usize],
    source_defaults: &BTreeMap<String, String>,
) -> Result<Vec<String>> {
    let reserved = |prefix: &str| {
        ["HOST", "PORT", "URL"]
            .iter()
            .any(|suffix| source_defaults.contains_key(&format!("{}_{}", prefix, suffix)))
    };

    let base: Vec<String> = targets
        .iter()
        .map(|&t| {
            let label = services[t].label.trim();
            env_identifier(if label.is_empty() { names[t].as_str() } else { label })
        })
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for prefix in &base {
        *counts.entry(prefix.as_str()).or_insert(0) += 1;
    }

    let prefixes: Vec<String> = base
        .iter()
        .zip(targets)
        .map(|(prefix, &t)| {
            if counts[prefix.as_str()] > 1 || reserved(prefix) {
                format!("{}_{}", prefix, id_suffix(&services[t].id))
            } else {
                prefix.clone()
            }
        })
        .collect();

    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut conflicts = Vec::new();
    for (pos, prefix) in prefixes.iter().enumerate() {
        if let Some(first) = seen.insert(prefix.as_str(), pos) {
            conflicts.push(format!("{}_HOST", prefixes[first]));
        }
        if reserved(prefix) {
            conflicts.push(format!("{}_HOST", prefix));
        }
    }
    if !conflicts.is_empty() {
        conflicts.sort();
        conflicts.dedup();
        return Err(ScaffoldError::WiringConflict {
            node_id: source_id.to_string(),
            keys: conflicts,
        });
    }
    Ok(prefixes)
}

fn id_suffix(id: &str) -> String {
    let mut out = String::new();
    for c in id.chars() {
        let c = c.to_ascii_uppercase();
        if c.is_ascii_uppercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}
