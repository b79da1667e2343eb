//! Hosting topology: the resource graph that serves the site.
//!
//! The topology is an explicit DAG. Nodes are resource declarations, edges
//! point from a dependent resource to the resource it needs. Every reference
//! a declaration makes to another resource must be backed by an edge, so the
//! ordering contract can be checked without knowing anything about the engine
//! that will eventually create the resources.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::environment::ResolvedIdentifiers;
use crate::id::LogicalId;
use crate::{Error, Result};

/// CloudFront only accepts certificates issued in this region.
pub const CERTIFICATE_REGION: &str = "us-east-1";

/// Object served for requests to the distribution root.
pub const DEFAULT_ROOT_OBJECT: &str = "index.html";

pub const HOSTED_ZONE_ID: &str = "HostedZone";
pub const BUCKET_ID: &str = "WebsiteBucket";
pub const CERTIFICATE_ID: &str = "WebsiteCert";
pub const DISTRIBUTION_ID: &str = "WebsiteDistribution";
pub const ALIAS_RECORD_ID: &str = "AliasRecord";

/// A declared hosting resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "properties", rename_all = "snake_case")]
pub enum Resource {
    HostedZone(HostedZoneSpec),
    Storage(StorageSpec),
    Certificate(CertificateSpec),
    Distribution(DistributionSpec),
    AliasRecord(AliasRecordSpec),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::HostedZone(_) => ResourceKind::HostedZone,
            Resource::Storage(_) => ResourceKind::Storage,
            Resource::Certificate(_) => ResourceKind::Certificate,
            Resource::Distribution(_) => ResourceKind::Distribution,
            Resource::AliasRecord(_) => ResourceKind::AliasRecord,
        }
    }

    /// Other resources this declaration refers to.
    pub fn references(&self) -> Vec<&LogicalId> {
        match self {
            Resource::HostedZone(_) | Resource::Storage(_) => vec![],
            Resource::Certificate(spec) => match &spec.validation {
                CertificateValidation::Dns { hosted_zone } => vec![hosted_zone],
            },
            Resource::Distribution(spec) => {
                let Origin::Storage { bucket } = &spec.origin;
                vec![bucket, &spec.certificate]
            }
            Resource::AliasRecord(spec) => {
                let AliasTarget::Distribution { distribution } = &spec.target;
                vec![&spec.hosted_zone, distribution]
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    HostedZone,
    Storage,
    Certificate,
    Distribution,
    AliasRecord,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::HostedZone => write!(f, "hosted_zone"),
            ResourceKind::Storage => write!(f, "storage"),
            ResourceKind::Certificate => write!(f, "certificate"),
            ResourceKind::Distribution => write!(f, "distribution"),
            ResourceKind::AliasRecord => write!(f, "alias_record"),
        }
    }
}

/// The DNS zone the site's records and certificate validation live in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostedZoneSpec {
    pub zone_name: String,
    pub resolution: ZoneResolution,
}

/// How the hosted zone is found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ZoneResolution {
    /// Look the zone up by name at provisioning time.
    Lookup { private_zone: bool },
    /// Reference a known zone id directly.
    Explicit { zone_id: String },
}

/// Private object storage holding the built site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageSpec {
    pub bucket_name: String,
    pub public_access: PublicAccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicAccess {
    /// All public access blocked; the distribution is the only reader.
    BlockAll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateSpec {
    pub domain_name: String,
    pub region: String,
    pub validation: CertificateValidation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum CertificateValidation {
    /// Ownership proven by a record inserted into the hosted zone.
    Dns { hosted_zone: LogicalId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionSpec {
    pub origin: Origin,
    pub domain_names: Vec<String>,
    pub certificate: LogicalId,
    pub default_root_object: String,
    pub viewer_protocol_policy: ViewerProtocolPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Origin {
    Storage { bucket: LogicalId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerProtocolPolicy {
    /// Plain HTTP requests are redirected, never served.
    RedirectToHttps,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasRecordSpec {
    pub record_name: String,
    pub hosted_zone: LogicalId,
    pub target: AliasTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AliasTarget {
    Distribution { distribution: LogicalId },
}

/// A node in the topology graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceNode {
    pub id: LogicalId,
    #[serde(flatten)]
    pub resource: Resource,
}

/// `dependent` must not be submitted before `dependency` is ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyEdge {
    pub dependent: LogicalId,
    pub dependency: LogicalId,
}

/// A validated, acyclic hosting topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostingTopology {
    resources: Vec<ResourceNode>,
    dependencies: Vec<DependencyEdge>,
    submission_order: Vec<LogicalId>,
}

impl HostingTopology {
    pub fn resources(&self) -> &[ResourceNode] {
        &self.resources
    }

    pub fn dependencies(&self) -> &[DependencyEdge] {
        &self.dependencies
    }

    pub fn get(&self, id: &LogicalId) -> Option<&Resource> {
        self.resources
            .iter()
            .find(|n| &n.id == id)
            .map(|n| &n.resource)
    }

    /// Direct dependencies of `id`.
    pub fn dependencies_of<'a>(
        &'a self,
        id: &'a LogicalId,
    ) -> impl Iterator<Item = &'a LogicalId> {
        self.dependencies
            .iter()
            .filter(move |e| &e.dependent == id)
            .map(|e| &e.dependency)
    }

    /// Whether `dependent` transitively depends on `dependency`.
    pub fn depends_on(&self, dependent: &LogicalId, dependency: &LogicalId) -> bool {
        let mut stack: Vec<&LogicalId> = self.dependencies_of(dependent).collect();
        let mut seen = BTreeSet::new();
        while let Some(next) = stack.pop() {
            if next == dependency {
                return true;
            }
            if seen.insert(next) {
                stack.extend(self.dependencies_of(next));
            }
        }
        false
    }

    /// Resources in an order where every dependency comes first.
    /// Ties are broken by declaration order, so the order is stable.
    pub fn submission_order(&self) -> Vec<&ResourceNode> {
        self.submission_order
            .iter()
            .filter_map(|id| self.resources.iter().find(|n| &n.id == id))
            .collect()
    }

    /// Position of `id` in the submission order.
    pub fn position(&self, id: &LogicalId) -> Option<usize> {
        self.submission_order.iter().position(|o| o == id)
    }

    /// The storage declaration the site is served from.
    pub fn storage(&self) -> Option<&StorageSpec> {
        self.resources.iter().find_map(|n| match &n.resource {
            Resource::Storage(spec) => Some(spec),
            _ => None,
        })
    }
}

/// Accumulates declarations and edges, then validates them into a
/// [`HostingTopology`].
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    resources: Vec<ResourceNode>,
    dependencies: Vec<DependencyEdge>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(mut self, id: impl Into<LogicalId>, resource: Resource) -> Self {
        self.resources.push(ResourceNode {
            id: id.into(),
            resource,
        });
        self
    }

    pub fn depends(
        mut self,
        dependent: impl Into<LogicalId>,
        dependency: impl Into<LogicalId>,
    ) -> Self {
        self.dependencies.push(DependencyEdge {
            dependent: dependent.into(),
            dependency: dependency.into(),
        });
        self
    }

    pub fn finish(self) -> Result<HostingTopology> {
        let index: HashMap<&LogicalId, usize> = self
            .resources
            .iter()
            .enumerate()
            .map(|(i, n)| (&n.id, i))
            .collect();
        if index.len() != self.resources.len() {
            let mut seen = BTreeSet::new();
            let dup = self
                .resources
                .iter()
                .find(|n| !seen.insert(&n.id))
                .map(|n| n.id.to_string())
                .unwrap_or_default();
            return Err(Error::InvalidTopology(format!(
                "resource '{dup}' declared more than once"
            )));
        }

        for edge in &self.dependencies {
            for end in [&edge.dependent, &edge.dependency] {
                if !index.contains_key(end) {
                    return Err(Error::InvalidTopology(format!(
                        "dependency '{} -> {}' refers to undeclared resource '{}'",
                        edge.dependent, edge.dependency, end
                    )));
                }
            }
        }

        for node in &self.resources {
            for reference in node.resource.references() {
                if !index.contains_key(reference) {
                    return Err(Error::InvalidTopology(format!(
                        "resource '{}' refers to undeclared resource '{}'",
                        node.id, reference
                    )));
                }
                let backed = self
                    .dependencies
                    .iter()
                    .any(|e| e.dependent == node.id && &e.dependency == reference);
                if !backed {
                    return Err(Error::InvalidTopology(format!(
                        "resource '{}' refers to '{}' without declaring a dependency on it",
                        node.id, reference
                    )));
                }
            }
        }

        let submission_order = topological_order(&self.resources, &self.dependencies, &index)?;

        Ok(HostingTopology {
            resources: self.resources,
            dependencies: self.dependencies,
            submission_order,
        })
    }
}

/// Kahn's algorithm; among ready nodes the earliest declared goes first.
fn topological_order(
    resources: &[ResourceNode],
    dependencies: &[DependencyEdge],
    index: &HashMap<&LogicalId, usize>,
) -> Result<Vec<LogicalId>> {
    let mut pending = vec![0usize; resources.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); resources.len()];
    for edge in dependencies {
        let from = index[&edge.dependent];
        let to = index[&edge.dependency];
        pending[from] += 1;
        dependents[to].push(from);
    }

    let mut ready: BTreeSet<usize> = (0..resources.len()).filter(|&i| pending[i] == 0).collect();
    let mut order = Vec::with_capacity(resources.len());

    while let Some(next) = ready.pop_first() {
        order.push(resources[next].id.clone());
        for &d in &dependents[next] {
            pending[d] -= 1;
            if pending[d] == 0 {
                ready.insert(d);
            }
        }
    }

    if order.len() != resources.len() {
        let stuck: Vec<String> = (0..resources.len())
            .filter(|&i| pending[i] > 0)
            .map(|i| resources[i].id.to_string())
            .collect();
        return Err(Error::InvalidTopology(format!(
            "cycle detected among: {}",
            stuck.join(", ")
        )));
    }

    Ok(order)
}

/// Declare the hosting topology for one environment.
pub fn build(ids: &ResolvedIdentifiers) -> Result<HostingTopology> {
    let resolution = match ids.hosted_zone_id() {
        Some(zone_id) => ZoneResolution::Explicit {
            zone_id: zone_id.to_string(),
        },
        None => ZoneResolution::Lookup {
            private_zone: false,
        },
    };

    TopologyBuilder::new()
        .declare(
            BUCKET_ID,
            Resource::Storage(StorageSpec {
                bucket_name: ids.hosting_bucket_name().to_string(),
                public_access: PublicAccess::BlockAll,
            }),
        )
        .declare(
            HOSTED_ZONE_ID,
            Resource::HostedZone(HostedZoneSpec {
                zone_name: ids.hosted_zone_name().to_string(),
                resolution,
            }),
        )
        .declare(
            CERTIFICATE_ID,
            Resource::Certificate(CertificateSpec {
                domain_name: ids.certificate_domain().to_string(),
                region: CERTIFICATE_REGION.to_string(),
                validation: CertificateValidation::Dns {
                    hosted_zone: HOSTED_ZONE_ID.into(),
                },
            }),
        )
        .depends(CERTIFICATE_ID, HOSTED_ZONE_ID)
        .declare(
            DISTRIBUTION_ID,
            Resource::Distribution(DistributionSpec {
                origin: Origin::Storage {
                    bucket: BUCKET_ID.into(),
                },
                domain_names: vec![ids.domain_name().to_string()],
                certificate: CERTIFICATE_ID.into(),
                default_root_object: DEFAULT_ROOT_OBJECT.to_string(),
                viewer_protocol_policy: ViewerProtocolPolicy::RedirectToHttps,
            }),
        )
        .depends(DISTRIBUTION_ID, BUCKET_ID)
        .depends(DISTRIBUTION_ID, CERTIFICATE_ID)
        .declare(
            ALIAS_RECORD_ID,
            Resource::AliasRecord(AliasRecordSpec {
                record_name: ids.domain_name().to_string(),
                hosted_zone: HOSTED_ZONE_ID.into(),
                target: AliasTarget::Distribution {
                    distribution: DISTRIBUTION_ID.into(),
                },
            }),
        )
        .depends(ALIAS_RECORD_ID, DISTRIBUTION_ID)
        .depends(ALIAS_RECORD_ID, HOSTED_ZONE_ID)
        .finish()
}
