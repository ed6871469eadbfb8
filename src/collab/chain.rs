//! Attribution chain (`X-Forwarded-For`) extension.
//!
//! Each gateway appends its own public address exactly once. The origin
//! hop concatenates without a separator; every later hop joins with a
//! comma, so prior entries are never rewritten.

use super::route::GatewayRole;

#[must_use]
pub fn append(existing: &str, role: GatewayRole, local_address: &str) -> String {
    let mut chain = String::with_capacity(existing.len() + local_address.len() + 1);
    chain.push_str(existing);
    if role != GatewayRole::Origin {
        chain.push(',');
    }
    chain.push_str(local_address);
    chain
}
