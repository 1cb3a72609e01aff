use std::{fmt, net::IpAddr};

use thiserror::Error;

use cong_net::{normalize, IpNetwork};

/// Which intercepted call a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Outbound `connect(2)`.
    Connect,
    /// Inbound `accept(2)` / `accept4(2)`.
    Accept,
}

impl CallKind {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "connect" => Some(Self::Connect),
            "accept" => Some(Self::Accept),
            _ => None,
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect",
            Self::Accept => "accept",
        })
    }
}

/// A TCP congestion-control algorithm a rule can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Bottleneck Bandwidth and RTT.
    Bbr,
    /// CUBIC, the Linux default.
    Cubic,
    /// Classic NewReno.
    Reno,
}

impl Algorithm {
    /// The kernel-facing algorithm name, as passed to `TCP_CONGESTION`.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bbr => "bbr",
            Self::Cubic => "cubic",
            Self::Reno => "reno",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "bbr" => Some(Self::Bbr),
            "cubic" => Some(Self::Cubic),
            "reno" => Some(Self::Reno),
            _ => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors produced while parsing a rule file. The line number is 1-based.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// A line did not have the `call: network: algorithm` shape.
    #[error("line {line}: malformed rule: {text:?}")]
    Malformed {
        /// Offending line number.
        line: usize,
        /// Offending line text.
        text: String,
    },
    /// The call-kind token is neither `connect` nor `accept`.
    #[error("line {line}: unknown call kind: {token:?}")]
    CallKind {
        /// Offending line number.
        line: usize,
        /// The rejected token.
        token: String,
    },
    /// The network field did not parse as an address range.
    #[error("line {line}: {source}")]
    Network {
        /// Offending line number.
        line: usize,
        /// The underlying range parse failure.
        #[source]
        source: cong_net::ParseError,
    },
    /// The algorithm token is not one of `bbr`, `cubic`, `reno`.
    #[error("line {line}: unknown congestion algorithm: {token:?}")]
    Algorithm {
        /// Offending line number.
        line: usize,
        /// The rejected token.
        token: String,
    },
}

/// One configured association of call kind, address range and algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    /// The call this rule applies to.
    pub call: CallKind,
    /// The peer address range.
    pub net: IpNetwork,
    /// The algorithm selected on a match.
    pub algo: Algorithm,
}

impl Rule {
    /// Parses one non-comment line. The line is split at the first and the
    /// last colon, which keeps colons inside an IPv6 literal intact whether
    /// or not it is bracketed.
    fn parse(line: usize, text: &str) -> Result<Self, ParseError> {
        let malformed = || ParseError::Malformed { line, text: text.to_owned() };

        let (call, rest) = text.split_once(':').ok_or_else(malformed)?;
        let (net, algo) = rest.rsplit_once(':').ok_or_else(malformed)?;

        let call = CallKind::from_token(call.trim())
            .ok_or_else(|| ParseError::CallKind { line, token: call.trim().to_owned() })?;
        let net = net
            .trim()
            .parse::<IpNetwork>()
            .map_err(|source| ParseError::Network { line, source })?;
        let algo = Algorithm::from_token(algo.trim())
            .ok_or_else(|| ParseError::Algorithm { line, token: algo.trim().to_owned() })?;

        Ok(Self { call, net, algo })
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.call, self.net, self.algo)
    }
}

/// An immutable, ordered rule snapshot parsed from one source in full.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Parses an entire rule file. Blank lines and `#` comments are
    /// skipped; any malformed line rejects the whole file, so a rule set is
    /// either fully valid or not installed at all.
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let mut rules = Vec::new();
        for (idx, raw) in source.lines().enumerate() {
            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            rules.push(Rule::parse(idx + 1, text)?);
        }
        Ok(Self { rules })
    }

    /// Returns the algorithm selected for this call and peer, if any.
    ///
    /// The peer is normalized once (IPv4-mapped IPv6 becomes plain IPv4),
    /// then every rule is scanned in file order. The last matching rule
    /// wins, which lets broad ranges come first and exceptions later.
    pub fn lookup(&self, call: CallKind, peer: IpAddr) -> Option<Algorithm> {
        let peer = normalize(peer);
        let mut selected = None;
        for rule in &self.rules {
            if rule.call == call && rule.net.contains(peer) {
                selected = Some(rule.algo);
            }
        }
        selected
    }

    /// Number of rules in the set.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
