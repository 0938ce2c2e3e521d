//! Sweepers: cleanup of cloud resources leaked by acceptance runs
//!
//! Each resource type registers a [`Sweeper`]. Sweepers may depend on others
//! (an IP cannot be released while a load balancer still holds it), so
//! [`run_sweepers`] runs dependencies first and every sweeper at most once.

mod sweepers;

use std::collections::HashSet;
use std::future::Future;

use anyhow::{bail, Context, Result};
use futures::future::BoxFuture;

use crate::scw::{Region, ScwClient, Zone};

pub use sweepers::all;

/// Prefix carried by the names of resources created by acceptance tests
pub const TEST_PREFIX: &str = "tf-";

/// Sweep function: receives a client and the region being swept
pub type SweepFn = fn(ScwClient, Region) -> BoxFuture<'static, Result<()>>;

#[derive(Clone, Copy)]
pub struct Sweeper {
    pub name: &'static str,
    /// Sweepers that must run before this one
    pub dependencies: &'static [&'static str],
    pub run: SweepFn,
}

impl std::fmt::Debug for Sweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sweeper")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// Run `f` once per zone with a client defaulting to that zone.
///
/// A failing zone is logged and skipped; sweeping is best effort.
pub async fn sweep_zones<F, Fut>(client: &ScwClient, zones: &[Zone], f: F) -> Result<()>
where
    F: Fn(ScwClient, Zone) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    for zone in zones {
        if let Err(e) = f(client.for_zone(zone), zone.clone()).await {
            tracing::warn!("error running sweep in zone {}, ignoring: {:#}", zone, e);
        }
    }
    Ok(())
}

/// Run `f` once per region with a client defaulting to that region
pub async fn sweep_regions<F, Fut>(client: &ScwClient, regions: &[Region], f: F) -> Result<()>
where
    F: Fn(ScwClient, Region) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    for region in regions {
        if let Err(e) = f(client.for_region(region), region.clone()).await {
            tracing::warn!("error running sweep in region {}, ignoring: {:#}", region, e);
        }
    }
    Ok(())
}

/// Names of the sweepers to run, dependencies first
///
/// With `only`, that sweeper and its transitive dependencies are selected.
pub fn execution_order(sweepers: &[Sweeper], only: Option<&str>) -> Result<Vec<&'static str>> {
    fn visit(
        sweepers: &[Sweeper],
        name: &str,
        visiting: &mut Vec<&'static str>,
        done: &mut HashSet<&'static str>,
        order: &mut Vec<&'static str>,
    ) -> Result<()> {
        let Some(sweeper) = sweepers.iter().find(|s| s.name == name) else {
            bail!("unknown sweeper: {name}");
        };
        if done.contains(sweeper.name) {
            return Ok(());
        }
        if visiting.contains(&sweeper.name) {
            bail!(
                "sweeper dependency cycle: {} -> {}",
                visiting.join(" -> "),
                sweeper.name
            );
        }

        visiting.push(sweeper.name);
        for dependency in sweeper.dependencies {
            visit(sweepers, dependency, visiting, done, order)?;
        }
        visiting.pop();

        done.insert(sweeper.name);
        order.push(sweeper.name);
        Ok(())
    }

    let mut visiting = Vec::new();
    let mut done = HashSet::new();
    let mut order = Vec::new();

    match only {
        Some(name) => visit(sweepers, name, &mut visiting, &mut done, &mut order)?,
        None => {
            for sweeper in sweepers {
                visit(sweepers, sweeper.name, &mut visiting, &mut done, &mut order)?;
            }
        }
    }
    Ok(order)
}

/// Run the selected sweepers against `region`, stopping at the first failure
pub async fn run_sweepers(
    sweepers: &[Sweeper],
    client: &ScwClient,
    region: &Region,
    only: Option<&str>,
) -> Result<Vec<&'static str>> {
    let order = execution_order(sweepers, only)?;

    for name in &order {
        let Some(sweeper) = sweepers.iter().find(|s| s.name == *name) else {
            continue;
        };
        tracing::info!("running sweeper {} in {}", name, region);
        (sweeper.run)(client.for_region(region), region.clone())
            .await
            .with_context(|| format!("sweeper {name} failed"))?;
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    fn noop(_client: ScwClient, _region: Region) -> BoxFuture<'static, Result<()>> {
        async { Ok(()) }.boxed()
    }

    fn sweeper(name: &'static str, dependencies: &'static [&'static str]) -> Sweeper {
        Sweeper {
            name,
            dependencies,
            run: noop,
        }
    }

    #[test]
    fn test_dependencies_run_first_and_once() {
        let sweepers = [
            sweeper("pn", &["lb", "bm"]),
            sweeper("ip", &["lb"]),
            sweeper("lb", &[]),
            sweeper("bm", &[]),
        ];
        let order = execution_order(&sweepers, None).unwrap();
        assert_eq!(order, vec!["lb", "bm", "pn", "ip"]);
    }

    #[test]
    fn test_only_selects_dependencies() {
        let sweepers = [
            sweeper("ip", &["lb"]),
            sweeper("lb", &[]),
            sweeper("token", &[]),
        ];
        assert_eq!(execution_order(&sweepers, Some("ip")).unwrap(), vec!["lb", "ip"]);
        assert!(execution_order(&sweepers, Some("nope")).is_err());
    }

    #[test]
    fn test_cycle_is_an_error() {
        let sweepers = [sweeper("a", &["b"]), sweeper("b", &["a"])];
        let err = execution_order(&sweepers, None).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    fn client() -> ScwClient {
        ScwClient::new(crate::scw::Credentials {
            secret_key: Some("secret".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_sweep_zones_ignores_failing_zones() {
        let zones = Region::parse("fr-par").unwrap().zones();
        let visited = std::sync::Mutex::new(Vec::new());

        sweep_zones(&client(), &zones, |client, zone| {
            let visited = &visited;
            async move {
                assert_eq!(client.default_zone(), Some(zone.clone()));
                visited.lock().unwrap().push(zone.to_string());
                if zone.as_str() == "fr-par-1" {
                    bail!("listing failed");
                }
                Ok(())
            }
        })
        .await
        .unwrap();

        assert_eq!(
            *visited.lock().unwrap(),
            vec!["fr-par-1", "fr-par-2", "fr-par-3"]
        );
    }

    #[tokio::test]
    async fn test_sweep_regions_sets_default_region() {
        let regions = Region::known();
        let visited = std::sync::Mutex::new(Vec::new());

        sweep_regions(&client(), &regions, |client, region| {
            let visited = &visited;
            async move {
                assert_eq!(client.default_region(), Some(region.clone()));
                visited.lock().unwrap().push(region.to_string());
                Ok(())
            }
        })
        .await
        .unwrap();

        assert_eq!(*visited.lock().unwrap(), vec!["fr-par", "nl-ams", "pl-waw"]);
    }

    #[test]
    fn test_registry_is_consistent() {
        let sweepers = all();
        let order = execution_order(&sweepers, None).unwrap();
        assert_eq!(order.len(), sweepers.len());

        let position = |name: &str| order.iter().position(|n| *n == name).unwrap();
        assert!(position("scaleway_lb") < position("scaleway_lb_ip"));
        assert!(position("scaleway_baremetal_server") < position("scaleway_vpc_private_network"));
    }
}
