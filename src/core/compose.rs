use crate::core::naming::project_slug;
use crate::core::validator::GraphWarning;
use crate::core::wiring::WiredGraph;
use crate::utils::error::Result;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;

pub const MANIFEST_FILE: &str = "docker-compose.yml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSpec {
    pub context: String,
    pub dockerfile: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposeService {
    pub build: BuildSpec,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expose: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    pub networks: Vec<String>,
}

/// Services keyed by name, serialized in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeServices(Vec<(String, ComposeService)>);

impl ComposeServices {
    pub fn get(&self, name: &str) -> Option<&ComposeService> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ComposeService)> {
        self.0.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for ComposeServices {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, service) in &self.0 {
            map.serialize_entry(name, service)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSpec {
    pub driver: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VolumeSpec {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposeManifest {
    pub name: String,
    pub services: ComposeServices,
    pub networks: BTreeMap<String, NetworkSpec>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, VolumeSpec>,
    /// Graph warnings plus detected dependency cycles; not part of the YAML.
    #[serde(skip)]
    pub warnings: Vec<GraphWarning>,
}

impl ComposeManifest {
    pub fn network_name(&self) -> Option<&str> {
        self.networks.keys().next().map(String::as_str)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

pub struct ComposeAssembler;

impl ComposeAssembler {
    pub fn assemble(wired: &WiredGraph) -> ComposeManifest {
        let slug = project_slug(&wired.validated().graph().name);
        let network = format!("{}-network", slug);

        let mut services = Vec::with_capacity(wired.services().len());
        let mut volumes = BTreeMap::new();

        for (validated, service) in wired.iter() {
            let name = &service.service_name;

            let mut mounts = Vec::new();
            for volume in &validated.settings.volumes {
                if let Some(named) = named_volume(volume) {
                    volumes.insert(named.to_string(), VolumeSpec::default());
                }
                mounts.push(volume.clone());
            }
            if let Some(mount) = validated.template.data_mount() {
                let data_volume = format!("{}-data", name);
                if !mounts.iter().any(|m| container_path(m) == Some(mount)) {
                    mounts.push(format!("{}:{}", data_volume, mount));
                    volumes.insert(data_volume, VolumeSpec::default());
                }
            }

            let (ports, expose) = match service.host_port {
                Some(port) => (vec![format!("{}:{}", port, service.port)], Vec::new()),
                None => (Vec::new(), vec![service.port.to_string()]),
            };

            services.push((
                name.clone(),
                ComposeService {
                    build: BuildSpec {
                        context: format!("./{}", name),
                        dockerfile: "Dockerfile".to_string(),
                    },
                    ports,
                    expose,
                    environment: service.environment.clone(),
                    volumes: mounts,
                    depends_on: service.depends_on(),
                    networks: vec![network.clone()],
                },
            ));
        }

        let mut warnings = wired.validated().warnings().to_vec();
        for cycle in dependency_cycles(wired) {
            let warning = GraphWarning::DependencyCycle { services: cycle };
            tracing::warn!("{}", warning);
            warnings.push(warning);
        }

        let mut networks = BTreeMap::new();
        networks.insert(
            network,
            NetworkSpec {
                driver: "bridge".to_string(),
            },
        );

        ComposeManifest {
            name: slug,
            services: ComposeServices(services),
            networks,
            volumes,
            warnings,
        }
    }
}

/// `name:/path[:mode]` where `name` is not a host path.
fn named_volume(spec: &str) -> Option<&str> {
    let (source, _) = spec.split_once(':')?;
    let is_host_path = source.is_empty()
        || source.starts_with('.')
        || source.starts_with('/')
        || source.starts_with('~')
        || source.starts_with('$');
    (!is_host_path).then_some(source)
}

fn container_path(spec: &str) -> Option<&str> {
    spec.split(':').nth(1)
}

/// Strongly connected components with more than one service, members in
/// input order. Uses Tarjan's algorithm over the dependency links.
fn dependency_cycles(wired: &WiredGraph) -> Vec<Vec<String>> {
    let services = wired.services();
    let adjacency: Vec<Vec<usize>> = services
        .iter()
        .map(|s| {
            s.links
                .iter()
                .filter_map(|l| services.iter().position(|o| o.service_name == l.service_name))
                .collect()
        })
        .collect();

    struct Tarjan<'g> {
        adjacency: &'g [Vec<usize>],
        index: Vec<Option<usize>>,
        lowlink: Vec<usize>,
        on_stack: Vec<bool>,
        stack: Vec<usize>,
        next: usize,
        components: Vec<Vec<usize>>,
    }

    impl Tarjan<'_> {
        fn visit(&mut self, v: usize) {
            self.index[v] = Some(self.next);
            self.lowlink[v] = self.next;
            self.next += 1;
            self.stack.push(v);
            self.on_stack[v] = true;

            for &w in &self.adjacency[v] {
                match self.index[w] {
                    None => {
                        self.visit(w);
                        self.lowlink[v] = self.lowlink[v].min(self.lowlink[w]);
                    }
                    Some(index) if self.on_stack[w] => {
                        self.lowlink[v] = self.lowlink[v].min(index);
                    }
                    Some(_) => {}
                }
            }

            if Some(self.lowlink[v]) == self.index[v] {
                let mut component = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                if component.len() > 1 {
                    component.sort_unstable();
                    self.components.push(component);
                }
            }
        }
    }

    let n = services.len();
    let mut tarjan = Tarjan {
        adjacency: &adjacency,
        index: vec![None; n],
        lowlink: vec![0; n],
        on_stack: vec![false; n],
        stack: Vec::new(),
        next: 0,
        components: Vec::new(),
    };
    for v in 0..n {
        if tarjan.index[v].is_none() {
            tarjan.visit(v);
        }
    }

    let mut components = tarjan.components;
    components.sort();
    components
        .into_iter()
        .map(|c| c.into_iter().map(|i| services[i].service_name.clone()).collect())
        .collect()
}
