// # OpenDNS Address Resolver
//
// Discovers the host's public address by asking OpenDNS for
// `myip.opendns.com`, which it answers with the source address of the query.
//
// ## Transport
//
// One UDP socket per call, bound to the unspecified address of the
// endpoint's family and connected to the resolver on port 53. The same query
// is re-sent on that socket for each retry; each attempt waits `timeout` for
// a matching response. Datagrams that do not parse or do not answer the
// query are ignored. A send or receive error (such as an ICMP port
// unreachable reported on the connected socket) ends the attempt like a lost
// datagram, so only bind and connect failures surface as `Transport`.
//
// ## Cancellation
//
// The whole exchange is one future raced against the cancellation token.
// Cancelling drops that future, and with it the socket, before `resolve`
// returns `Cancelled`.

pub mod wire;

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use async_trait::async_trait;
use domain::base::Message;
use ipsync_core::ProviderRegistry;
use ipsync_core::error::ResolveError;
use ipsync_core::traits::{AddressFamily, AddressResolver, AddressResolverFactory, ResolveOptions};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// OpenDNS resolver for IPv4 queries
pub const OPENDNS_V4: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(208, 67, 222, 222)), 53);

/// OpenDNS resolver for IPv6 queries (2620:0:ccc::2)
pub const OPENDNS_V6: SocketAddr = SocketAddr::new(
    IpAddr::V6(Ipv6Addr::new(0x2620, 0, 0xccc, 0, 0, 0, 0, 2)),
    53,
);

/// Largest response accepted; the answer is a single address record
const RECV_BUFFER_SIZE: usize = 1232;

/// Resolver endpoints per address family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverEndpoints {
    pub v4: SocketAddr,
    pub v6: SocketAddr,
}

impl ResolverEndpoints {
    pub fn for_family(&self, family: AddressFamily) -> SocketAddr {
        match family {
            AddressFamily::V4 => self.v4,
            AddressFamily::V6 => self.v6,
        }
    }
}

impl Default for ResolverEndpoints {
    fn default() -> Self {
        Self {
            v4: OPENDNS_V4,
            v6: OPENDNS_V6,
        }
    }
}

/// Public address resolver using the OpenDNS "myip" name
#[derive(Debug, Clone, Default)]
pub struct OpenDnsResolver {
    endpoints: ResolverEndpoints,
}

impl OpenDnsResolver {
    /// Create a resolver against the public OpenDNS servers
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver against other servers (e.g. a local test responder)
    pub fn with_endpoints(endpoints: ResolverEndpoints) -> Self {
        Self { endpoints }
    }

    pub fn endpoints(&self) -> ResolverEndpoints {
        self.endpoints
    }

    async fn exchange(
        &self,
        family: AddressFamily,
        options: &ResolveOptions,
    ) -> Result<IpAddr, ResolveError> {
        let endpoint = self.endpoints.for_family(family);
        let query = wire::build_query(family)?;
        let socket = connect(endpoint).await?;
        let attempts = options.attempts();

        for attempt in 1..=attempts {
            let deadline = Instant::now() + options.timeout;
            let outcome = tokio::time::timeout_at(deadline, async {
                socket.send(query.as_slice()).await?;
                receive_response(&socket, &query).await
            })
            .await;

            match outcome {
                Ok(Ok(response)) => return wire::extract_address(&response, family),
                // Refused or unreachable counts as a lost datagram; the
                // attempt still lasts its full timeout.
                Ok(Err(e)) => {
                    debug!(
                        "{} query to {} failed (attempt {}/{}): {}",
                        family, endpoint, attempt, attempts, e
                    );
                    tokio::time::sleep_until(deadline).await;
                }
                Err(_) => debug!(
                    "{} query to {} timed out (attempt {}/{})",
                    family, endpoint, attempt, attempts
                ),
            }
        }

        Err(ResolveError::Timeout { attempts })
    }
}

#[async_trait]
impl AddressResolver for OpenDnsResolver {
    async fn resolve(
        &self,
        family: AddressFamily,
        options: &ResolveOptions,
        cancel: &CancellationToken,
    ) -> Result<IpAddr, ResolveError> {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("{} query cancelled", family);
                Err(ResolveError::Cancelled)
            }

            result = self.exchange(family, options) => result,
        }
    }

    fn resolver_name(&self) -> &'static str {
        "opendns"
    }
}

/// Bind an ephemeral socket of the endpoint's family and connect it
async fn connect(endpoint: SocketAddr) -> Result<UdpSocket, ResolveError> {
    let local: SocketAddr = match endpoint {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };

    let socket = UdpSocket::bind(local)
        .await
        .map_err(ResolveError::transport)?;
    socket
        .connect(endpoint)
        .await
        .map_err(ResolveError::transport)?;

    Ok(socket)
}

/// Receive until a datagram answers `query`
async fn receive_response(
    socket: &UdpSocket,
    query: &Message<Vec<u8>>,
) -> io::Result<Message<Vec<u8>>> {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    loop {
        let len = socket.recv(&mut buf).await?;
        match wire::accept_response(&buf[..len], query) {
            Some(response) => return Ok(response),
            None => trace!("Ignoring unrelated datagram ({} bytes)", len),
        }
    }
}

/// Factory for creating OpenDNS resolvers
pub struct OpenDnsFactory;

impl AddressResolverFactory for OpenDnsFactory {
    fn create(&self) -> ipsync_core::Result<Box<dyn AddressResolver>> {
        Ok(Box::new(OpenDnsResolver::new()))
    }
}

/// Register the OpenDNS resolver with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_resolver("opendns", Box::new(OpenDnsFactory));
}
