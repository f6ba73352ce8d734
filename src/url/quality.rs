//! Record quality gate: host sanity and denylist checks.

use super::record::UrlRecord;
use crate::config::FilterTables;
use std::net::Ipv4Addr;

/// Characters that mark a host as broken markup rather than a hostname.
const BAD_HOST_CHARS: &[char] = &[
    '%', '[', ']', '=', '\'', ':', '*', '(', ')', '<', '>', '&', '!', '+', '`', ',', '}', '{',
    '$', '"', ';',
];

/// Longest raw query kept; anything longer is treated as garbage.
const MAX_QUERY_LEN: usize = 200;

/// Gate a normalized record. Never errors; a `false` verdict means the
/// caller drops or reclassifies the link.
pub fn verify_record_quality(record: &UrlRecord, filters: &FilterTables) -> bool {
    if record.domain.is_empty() {
        return false;
    }
    if filters.is_ignored_tld(&record.domain) {
        return false;
    }
    if !validate_host(&record.host) {
        return false;
    }
    if record.raw_query.len() > MAX_QUERY_LEN {
        return false;
    }
    if record.raw_query.contains('|') {
        return false;
    }
    true
}

/// Host sanity: must contain a dot, must not be a bare IPv4 address, must
/// not contain markup debris.
pub fn validate_host(host: &str) -> bool {
    if host.contains(BAD_HOST_CHARS) {
        return false;
    }
    // Links to bare IPs are noise.
    if host.parse::<Ipv4Addr>().is_ok() {
        return false;
    }
    if !host.contains('.') {
        return false;
    }
    true
}
