//! DNS hijack answer synthesis.
//!
//! The captive portal answers every DNS query with an A record pointing at
//! the device's own address, regardless of the queried name. A response is
//! synthesized from the query's transaction id and question section; no
//! state is retained between queries.

use std::net::Ipv4Addr;

/// Size of the fixed DNS header; the question section starts here.
pub const HEADER_LEN: usize = 12;

/// Standard query response, no error.
const FLAGS_RESPONSE_NO_ERROR: [u8; 2] = [0x81, 0x80];

/// Name-compression pointer to offset 12, where the question name begins.
const QUESTION_NAME_POINTER: [u8; 2] = [0xC0, 0x0C];

const TYPE_A: [u8; 2] = [0x00, 0x01];
const CLASS_IN: [u8; 2] = [0x00, 0x01];
const RDLENGTH_IPV4: [u8; 2] = [0x00, 0x04];

/// Synthesize an authoritative answer for `query` pointing at `redirect`.
///
/// The header copies the transaction id and question count from the query,
/// sets the response/no-error flags, and reports exactly one answer. The
/// original question section is echoed verbatim, followed by one A record
/// that names the question via a compression pointer.
///
/// Returns `None` for datagrams too short to carry a DNS header; the
/// caller simply sends no response.
pub fn hijack_response(query: &[u8], redirect: Ipv4Addr, ttl_secs: u32) -> Option<Vec<u8>> {
    if query.len() < HEADER_LEN {
        return None;
    }

    let mut response = Vec::with_capacity(query.len() + 16);

    // Header
    response.extend_from_slice(&query[0..2]); // transaction id
    response.extend_from_slice(&FLAGS_RESPONSE_NO_ERROR);
    response.extend_from_slice(&query[4..6]); // question count
    response.extend_from_slice(&[0x00, 0x01]); // answer count
    response.extend_from_slice(&[0x00, 0x00]); // authority count
    response.extend_from_slice(&[0x00, 0x00]); // additional count

    // Question section, echoed verbatim
    response.extend_from_slice(&query[HEADER_LEN..]);

    // Answer record
    response.extend_from_slice(&QUESTION_NAME_POINTER);
    response.extend_from_slice(&TYPE_A);
    response.extend_from_slice(&CLASS_IN);
    response.extend_from_slice(&ttl_secs.to_be_bytes());
    response.extend_from_slice(&RDLENGTH_IPV4);
    response.extend_from_slice(&redirect.octets());

    Some(response)
}
