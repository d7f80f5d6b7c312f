//! DNS bind-mount generation for isolated-network containers (§4.6).

const PUBLIC_DNS_FALLBACKS: [&str; 4] = [
    "8.8.8.8",
    "8.8.4.4",
    "2001:4860:4860::8888",
    "2001:4860:4860::8844",
];

const LOOPBACK_PREFIXES: [&str; 2] = ["127.", "::1"];

/// Parses a host `resolv.conf`, substituting public-DNS fallbacks when every
/// nameserver resolves to loopback (the common `systemd-resolved` stub at
/// `127.0.0.53`). Search domains and options pass through untouched.
pub fn render_resolv_conf(host_resolv_conf: &str) -> String {
    let mut nameservers = Vec::new();
    let mut other_lines = Vec::new();

    for line in host_resolv_conf.lines() {
        let trimmed = line.trim();
        if let Some(addr) = trimmed.strip_prefix("nameserver ") {
            nameservers.push(addr.trim().to_string());
        } else if !trimmed.is_empty() {
            other_lines.push(line.to_string());
        }
    }

    let all_loopback = !nameservers.is_empty()
        && nameservers
            .iter()
            .all(|ns| LOOPBACK_PREFIXES.iter().any(|prefix| ns.starts_with(prefix)));

    let effective: Vec<String> = if all_loopback {
        PUBLIC_DNS_FALLBACKS.iter().map(|s| s.to_string()).collect()
    } else {
        nameservers
    };

    let mut out = String::new();
    for ns in effective {
        out.push_str("nameserver ");
        out.push_str(&ns);
        out.push('\n');
    }
    for line in other_lines {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Truncates a hostname to the 12-character limit container DNS files use.
pub fn truncate_hostname(hostname: &str) -> String {
    hostname.chars().take(12).collect()
}

/// `hosts` bind-mount content: localhost entries plus the truncated
/// container hostname mapped to both IPv4 and IPv6 loopback.
pub fn render_hosts(hostname: &str) -> String {
    let short = truncate_hostname(hostname);
    format!(
        "127.0.0.1\tlocalhost\n::1\tlocalhost ip6-localhost ip6-loopback\n127.0.0.1\t{short}\n::1\t{short}\n"
    )
}

pub fn render_hostname_file(hostname: &str) -> String {
    format!("{}\n", truncate_hostname(hostname))
}
