//! DNS wire handling for the "myip" query
//!
//! Builds the single-question query and pulls the address out of a
//! response. Transport lives in the crate root.

use std::net::IpAddr;

use domain::base::{Message, MessageBuilder, Name, Rtype};
use domain::rdata::{A, Aaaa};
use ipsync_core::error::ResolveError;
use ipsync_core::traits::AddressFamily;

/// Name that OpenDNS answers with the querying address
pub const MYIP_QNAME: &str = "myip.opendns.com.";

/// Question type for a family
pub fn qtype(family: AddressFamily) -> Rtype {
    match family {
        AddressFamily::V4 => Rtype::A,
        AddressFamily::V6 => Rtype::AAAA,
    }
}

/// Build the query for `family`: one question, recursion desired, random id
pub fn build_query(family: AddressFamily) -> Result<Message<Vec<u8>>, ResolveError> {
    let qname = Name::<Vec<u8>>::vec_from_str(MYIP_QNAME)
        .map_err(|e| ResolveError::transport(format!("cannot encode {}: {}", MYIP_QNAME, e)))?;

    let mut builder = MessageBuilder::new_vec();
    builder.header_mut().set_random_id();
    builder.header_mut().set_rd(true);

    let mut question = builder.question();
    question
        .push((qname, qtype(family)))
        .map_err(|e| ResolveError::transport(format!("cannot build query: {}", e)))?;

    Ok(question.into_message())
}

/// Parse a datagram and keep it only if it answers `query`
///
/// Returns `None` for anything that is not a well-formed response to this
/// exact query (id, QR flag and question must match).
pub fn accept_response(datagram: &[u8], query: &Message<Vec<u8>>) -> Option<Message<Vec<u8>>> {
    let response = Message::from_octets(datagram.to_vec()).ok()?;
    response.is_answer(query).then_some(response)
}

/// Extract the address carried by the first answer record of the family's type
///
/// Records of other types are skipped. A record of the right type whose data
/// does not decode as an address of the family is a validation failure
/// rather than a missing answer.
pub fn extract_address(
    response: &Message<Vec<u8>>,
    family: AddressFamily,
) -> Result<IpAddr, ResolveError> {
    let answer = response
        .answer()
        .map_err(|e| ResolveError::InvalidAnswer(format!("malformed answer section: {}", e)))?;

    let first = match family {
        AddressFamily::V4 => answer
            .limit_to::<A>()
            .next()
            .map(|record| record.map(|r| IpAddr::V4(r.data().addr()))),
        AddressFamily::V6 => answer
            .limit_to::<Aaaa>()
            .next()
            .map(|record| record.map(|r| IpAddr::V6(r.data().addr()))),
    };

    match first {
        Some(Ok(ip)) => Ok(ip),
        Some(Err(e)) => Err(ResolveError::ValidationFailed(format!(
            "malformed {} record: {}",
            family.record_type(),
            e
        ))),
        None => Err(ResolveError::InvalidAnswer(format!(
            "no {} record in response (rcode {})",
            family.record_type(),
            response.header().rcode()
        ))),
    }
}
