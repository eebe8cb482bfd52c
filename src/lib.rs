#![deny(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

/*!
Resolve services located by DNS SRV records and relay HTTP requests to them.

# Introduction

SRV Records, as defined in [RFC 2782](https://tools.ietf.org/html/rfc2782),
are DNS records of the form

`_Service._Proto.Name TTL Class SRV Priority Weight Port Target`

For instance, a DNS server might respond with the following SRV records for
`_lagom._tcp.example.com`:

```text
_lagom._tcp.example.com. 60 IN SRV 0 10 9000 node1.example.com.
_lagom._tcp.example.com. 60 IN SRV 1 50 9000 node2.example.com.
_lagom._tcp.example.com. 60 IN SRV 1 50 9000 node3.example.com.
```

A client wanting to talk to this service would first try `node1.example.com:9000`
(the record with the lowest priority), then the other two in a random order
weighted by their weights.

# Resolution

[`ServiceResolver`] wraps a [`SrvResolver`] backend and turns lookups into an
ordered, never empty list of [`Endpoint`]s. It can cache successful lookups,
fall back to the last successful result when a lookup fails, bound every
lookup with a timeout and report timings and failures to a [`Reporter`].

The provided backend is enabled by the `hickory` feature (via
[`hickory_resolver::Resolver`]). Logging through `tracing`, including the
[`TracingReporter`], is enabled by the `log` feature.

# Forwarding

[`Forwarder`] issues a plain HTTP GET against an endpoint and returns the body
as text, and [`ServiceProxy`] ties both halves together: it reads the SRV name
from the environment, resolves it, forwards to the preferred endpoint and
turns any failure into a plain-text message.

[`SrvResolver`]: resolver::SrvResolver
[`Reporter`]: reporter::Reporter
[`TracingReporter`]: reporter::TracingReporter
[`Forwarder`]: forward::Forwarder
[`ServiceProxy`]: proxy::ServiceProxy
*/

mod client;
pub use client::{Cache, CacheTtl, ResolutionError, ServiceResolver, DEFAULT_LOOKUP_TIMEOUT};

mod record;
pub use record::{Endpoint, SrvRecord};

pub mod config;
pub mod forward;
pub mod proxy;
pub mod reporter;
pub mod resolver;
