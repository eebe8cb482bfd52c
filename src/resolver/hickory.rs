//! SRV resolver backed by [`hickory_resolver`].

use super::SrvResolver;
use crate::SrvRecord;
use async_trait::async_trait;
use hickory_resolver::{
    config::{NameServerConfig, ResolverConfig, ResolverOpts},
    name_server::{ConnectionProvider, TokioConnectionProvider},
    proto::{rr::rdata::SRV, xfer::Protocol},
    Name, ResolveError, Resolver, TokioResolver,
};
use std::{
    net::SocketAddr,
    time::{Duration, Instant},
};

#[async_trait]
impl<P> SrvResolver for Resolver<P>
where
    P: ConnectionProvider,
{
    type Record = SRV;
    type Error = ResolveError;

    async fn get_srv_records_unordered(
        &self,
        srv: &str,
    ) -> Result<(Vec<Self::Record>, Instant), Self::Error> {
        match self.srv_lookup(srv).await {
            Ok(lookup) => {
                let valid_until = lookup.as_lookup().valid_until();
                Ok((lookup.into_iter().collect(), valid_until))
            }
            // NXDOMAIN and NODATA answers are empty results, not transport failures.
            Err(e) if e.is_no_records_found() => Ok((Vec::new(), Instant::now())),
            Err(e) => Err(e),
        }
    }
}

impl SrvRecord for SRV {
    type Target = Name;

    fn target(&self) -> &Self::Target {
        self.target()
    }

    fn port(&self) -> u16 {
        self.port()
    }

    fn priority(&self) -> u16 {
        self.priority()
    }

    fn weight(&self) -> u16 {
        self.weight()
    }
}

/// Builds a resolver from the system configuration (e.g. `/etc/resolv.conf`)
/// whose queries give up after `lookup_timeout`.
pub fn from_system_config(lookup_timeout: Duration) -> Result<TokioResolver, ResolveError> {
    let mut builder = TokioResolver::builder_tokio()?;
    apply_options(builder.options_mut(), lookup_timeout);
    Ok(builder.build())
}

/// Builds a resolver that queries the given name servers over UDP and TCP.
pub fn from_name_servers(name_servers: &[SocketAddr], lookup_timeout: Duration) -> TokioResolver {
    let mut config = ResolverConfig::new();
    for addr in name_servers {
        config.add_name_server(NameServerConfig::new(*addr, Protocol::Udp));
        config.add_name_server(NameServerConfig::new(*addr, Protocol::Tcp));
    }

    let mut builder = Resolver::builder_with_config(config, TokioConnectionProvider::default());
    apply_options(builder.options_mut(), lookup_timeout);
    builder.build()
}

fn apply_options(opts: &mut ResolverOpts, lookup_timeout: Duration) {
    opts.timeout = lookup_timeout;
    opts.attempts = 1;
    // Caching happens one layer up, in `ServiceResolver`.
    opts.cache_size = 0;
}
