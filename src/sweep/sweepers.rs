use std::time::Duration;

use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::api::{AccountApi, BaremetalApi, CockpitApi, LbApi, VpcApi};
use crate::resources;
use crate::scw::{Region, ScwClient, WaitOptions, Zone};

use super::{sweep_zones, Sweeper, TEST_PREFIX};

/// Upper bound for load balancer instances to settle before deletion
const LB_INSTANCES_WAIT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Zones always swept for load balancers, whatever the requested region
const LB_ZONES: [&str; 3] = ["fr-par-1", "nl-ams-1", "pl-waw-1"];

/// Every registered sweeper
pub fn all() -> Vec<Sweeper> {
    vec![
        Sweeper {
            name: resources::lb::TYPE_NAME,
            dependencies: &[],
            run: sweep_lb,
        },
        Sweeper {
            name: resources::lb_ip::TYPE_NAME,
            dependencies: &[resources::lb::TYPE_NAME],
            run: sweep_lb_ip,
        },
        Sweeper {
            name: resources::baremetal_server::TYPE_NAME,
            dependencies: &[],
            run: sweep_baremetal_server,
        },
        Sweeper {
            name: resources::vpc_private_network::TYPE_NAME,
            dependencies: &[
                resources::lb::TYPE_NAME,
                resources::baremetal_server::TYPE_NAME,
            ],
            run: sweep_vpc_private_network,
        },
        Sweeper {
            name: resources::cockpit_token::TYPE_NAME,
            dependencies: &[],
            run: sweep_cockpit_token,
        },
        Sweeper {
            name: resources::account_ssh_key::TYPE_NAME,
            dependencies: &[resources::baremetal_server::TYPE_NAME],
            run: sweep_account_ssh_key,
        },
    ]
}

fn is_test_resource(name: &str) -> bool {
    name.starts_with(TEST_PREFIX)
}

fn sweep_lb(client: ScwClient, _region: Region) -> BoxFuture<'static, Result<()>> {
    async move {
        let zones: Vec<Zone> = LB_ZONES
            .iter()
            .filter_map(|z| Zone::parse(z).ok())
            .collect();

        sweep_zones(&client, &zones, |client, zone| async move {
            let api = LbApi::new(&client);
            tracing::debug!("sweeper: destroying the lbs in ({})", zone);

            let lbs = api
                .list_lbs(&zone)
                .await
                .map_err(|e| anyhow!("error listing lbs in ({zone}) in sweeper: {e}"))?;

            let options = WaitOptions::new(LB_INSTANCES_WAIT_TIMEOUT, client.retry_interval());
            for lb in lbs {
                api.wait_for_lb_instances(&zone, &lb.id, options)
                    .await
                    .map_err(|e| anyhow!("error waiting for lb in sweeper: {e}"))?;
                api.delete_lb(&zone, &lb.id, true)
                    .await
                    .map_err(|e| anyhow!("error deleting lb in sweeper: {e}"))?;
            }
            Ok(())
        })
        .await
    }
    .boxed()
}

fn sweep_lb_ip(client: ScwClient, region: Region) -> BoxFuture<'static, Result<()>> {
    async move {
        sweep_zones(&client, &region.zones(), |client, zone| async move {
            let api = LbApi::new(&client);
            tracing::debug!("sweeper: destroying the lb ips in ({})", zone);

            for ip in api.list_ips(&zone).await? {
                if ip.lb_id.as_deref().map_or(true, str::is_empty) {
                    api.release_ip(&zone, &ip.id)
                        .await
                        .map_err(|e| anyhow!("error deleting lb ip in sweeper: {e}"))?;
                }
            }
            Ok(())
        })
        .await
    }
    .boxed()
}

fn sweep_baremetal_server(client: ScwClient, region: Region) -> BoxFuture<'static, Result<()>> {
    async move {
        sweep_zones(&client, &region.zones(), |client, zone| async move {
            let api = BaremetalApi::new(&client);
            tracing::debug!("sweeper: destroying the baremetal server in ({})", zone);

            let servers = match api.list_servers(&zone).await {
                Ok(servers) => servers,
                Err(e) => {
                    tracing::warn!("error listing servers in ({}) in sweeper: {}", zone, e);
                    return Ok(());
                }
            };

            for server in servers {
                api.delete_server(&zone, &server.id)
                    .await
                    .map_err(|e| anyhow!("error deleting server in sweeper: {e}"))?;
            }
            Ok(())
        })
        .await
    }
    .boxed()
}

fn sweep_vpc_private_network(client: ScwClient, region: Region) -> BoxFuture<'static, Result<()>> {
    async move {
        sweep_zones(&client, &region.zones(), |client, zone| async move {
            let api = VpcApi::new(&client);
            tracing::debug!("sweeper: destroying the private networks in ({})", zone);

            for pn in api.list_private_networks(&zone).await? {
                if is_test_resource(&pn.name) {
                    api.delete_private_network(&zone, &pn.id)
                        .await
                        .map_err(|e| anyhow!("error deleting private network in sweeper: {e}"))?;
                }
            }
            Ok(())
        })
        .await
    }
    .boxed()
}

fn sweep_cockpit_token(client: ScwClient, _region: Region) -> BoxFuture<'static, Result<()>> {
    async move {
        let Some(project_id) = client.default_project_id().map(str::to_string) else {
            tracing::warn!("sweeper: no default project, skipping cockpit tokens");
            return Ok(());
        };

        let api = CockpitApi::new(&client);
        for token in api.list_tokens(&project_id).await? {
            if is_test_resource(&token.name) {
                api.delete_token(&token.id)
                    .await
                    .map_err(|e| anyhow!("error deleting cockpit token in sweeper: {e}"))?;
            }
        }
        Ok(())
    }
    .boxed()
}

fn sweep_account_ssh_key(client: ScwClient, _region: Region) -> BoxFuture<'static, Result<()>> {
    async move {
        let api = AccountApi::new(&client);
        for key in api.list_ssh_keys(client.default_project_id()).await? {
            if is_test_resource(&key.name) {
                api.delete_ssh_key(&key.id)
                    .await
                    .map_err(|e| anyhow!("error deleting ssh key in sweeper: {e}"))?;
            }
        }
        Ok(())
    }
    .boxed()
}
