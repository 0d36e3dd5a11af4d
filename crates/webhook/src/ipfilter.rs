//! IP allowlist with CIDR support (spec §4.1 step 4).

use std::net::IpAddr;

/// Check `ip` against a comma-separated allowlist of individual addresses
/// and/or CIDR ranges (e.g. `10.0.0.0/8, 2001:db8::/32, 127.0.0.1`).
///
/// An empty allowlist is unrestricted. A malformed entry is ignored rather
/// than rejecting the whole list (one bad entry should not lock everyone
/// out).
#[must_use]
pub fn ip_allowed(ip: IpAddr, allowlist: &str) -> bool {
    let allowlist = allowlist.trim();
    if allowlist.is_empty() {
        return true;
    }

    allowlist
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .any(|entry| entry_matches(entry, ip))
}

fn entry_matches(entry: &str, ip: IpAddr) -> bool {
    match entry.split_once('/') {
        Some((addr, prefix)) => match (addr.parse::<IpAddr>(), prefix.parse::<u32>()) {
            (Ok(network), Ok(prefix_len)) => in_cidr(network, prefix_len, ip),
            _ => false,
        },
        None => entry.parse::<IpAddr>().map(|addr| addr == ip).unwrap_or(false),
    }
}

fn in_cidr(network: IpAddr, prefix_len: u32, ip: IpAddr) -> bool {
    match (network, ip) {
        (IpAddr::V4(net), IpAddr::V4(addr)) => {
            if prefix_len > 32 {
                return false;
            }
            let mask = mask_for(prefix_len, 32);
            (u32::from(net) & mask) == (u32::from(addr) & mask)
        }
        (IpAddr::V6(net), IpAddr::V6(addr)) => {
            if prefix_len > 128 {
                return false;
            }
            let mask = mask_for(prefix_len, 128);
            (u128::from(net) & mask) == (u128::from(addr) & mask)
        }
        _ => false,
    }
}

/// A `width`-bit mask with the top `prefix_len` bits set.
fn mask_for(prefix_len: u32, width: u32) -> u128 {
    if prefix_len == 0 {
        0
    } else {
        u128::MAX << (width - prefix_len) & (u128::MAX >> (128 - width))
    }
}
