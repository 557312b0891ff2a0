//! Server address list as it appears inside connect tokens.
//!
//! ```text
//! [num server addresses] (uint32) // in [1,8]
//! <for each server address>
//! {
//!     [address type] (uint8) // value of 1 = IPv4 address, 2 = IPv6 address.
//!     [host] (4 bytes for IPv4, 16 bytes for IPv6, network byte order)
//!     [port] (uint16)
//! }
//! ```
use std::{
    io::{self, Cursor},
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    ops::Deref,
};

use crate::{serialize::*, TokenError, NETCODE_ADDRESS_IPV4, NETCODE_ADDRESS_IPV6, NETCODE_MAX_SERVERS_PER_CONNECT};

const IPV4_ENTRY_BYTES: usize = 1 + 4 + 2;
const IPV6_ENTRY_BYTES: usize = 1 + 16 + 2;

/// The largest encoded address list, 8 IPv6 addresses.
pub const MAX_ENCODED_ADDRESSES_BYTES: usize = 4 + NETCODE_MAX_SERVERS_PER_CONNECT * IPV6_ENTRY_BYTES;

/// A non-empty list of at most 8 server addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddresses(Vec<SocketAddr>);

impl ServerAddresses {
    pub fn new(addresses: Vec<SocketAddr>) -> Result<Self, TokenError> {
        check_count(addresses.len())?;
        Ok(Self(addresses))
    }

    pub fn as_slice(&self) -> &[SocketAddr] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<SocketAddr> {
        self.0
    }

    /// Number of bytes this list takes once encoded.
    pub fn encoded_len(&self) -> usize {
        4 + self.0.iter().map(entry_len).sum::<usize>()
    }
}

impl Deref for ServerAddresses {
    type Target = [SocketAddr];

    fn deref(&self) -> &[SocketAddr] {
        &self.0
    }
}

impl TryFrom<Vec<SocketAddr>> for ServerAddresses {
    type Error = TokenError;

    fn try_from(addresses: Vec<SocketAddr>) -> Result<Self, TokenError> {
        Self::new(addresses)
    }
}

impl TryFrom<&[SocketAddr]> for ServerAddresses {
    type Error = TokenError;

    fn try_from(addresses: &[SocketAddr]) -> Result<Self, TokenError> {
        Self::new(addresses.to_vec())
    }
}

fn check_count(count: usize) -> Result<(), TokenError> {
    if count == 0 || count > NETCODE_MAX_SERVERS_PER_CONNECT {
        return Err(TokenError::InvalidAddressCount(count));
    }
    Ok(())
}

fn entry_len(address: &SocketAddr) -> usize {
    match address {
        SocketAddr::V4(_) => IPV4_ENTRY_BYTES,
        SocketAddr::V6(_) => IPV6_ENTRY_BYTES,
    }
}

/// Encode the addresses, failing if the list is empty or above the limit.
pub fn encode(addresses: &[SocketAddr]) -> Result<Vec<u8>, TokenError> {
    check_count(addresses.len())?;
    let mut buffer = Vec::with_capacity(MAX_ENCODED_ADDRESSES_BYTES);
    write_entries(&mut buffer, addresses)?;
    Ok(buffer)
}

/// Decode an address list from the start of `buffer`, returning it with the number of bytes read.
pub fn decode(buffer: &[u8]) -> Result<(ServerAddresses, usize), TokenError> {
    let mut cursor = Cursor::new(buffer);
    let addresses = read_server_addresses(&mut cursor)?;
    Ok((addresses, cursor.position() as usize))
}

pub(crate) fn write_server_addresses(writer: &mut impl io::Write, addresses: &ServerAddresses) -> Result<(), io::Error> {
    write_entries(writer, addresses)
}

fn write_entries(writer: &mut impl io::Write, addresses: &[SocketAddr]) -> Result<(), io::Error> {
    writer.write_all(&(addresses.len() as u32).to_le_bytes())?;

    for address in addresses {
        match address.ip() {
            IpAddr::V4(ip) => {
                writer.write_all(&[NETCODE_ADDRESS_IPV4])?;
                writer.write_all(&ip.octets())?;
            }
            IpAddr::V6(ip) => {
                writer.write_all(&[NETCODE_ADDRESS_IPV6])?;
                writer.write_all(&ip.octets())?;
            }
        }
        writer.write_all(&address.port().to_le_bytes())?;
    }

    Ok(())
}

pub(crate) fn read_server_addresses(src: &mut Cursor<&[u8]>) -> Result<ServerAddresses, TokenError> {
    let count = read_u32(src)? as usize;
    check_count(count)?;

    let remaining = src.get_ref().len().saturating_sub(src.position() as usize);
    if count * IPV4_ENTRY_BYTES > remaining {
        return Err(TokenError::TruncatedBuffer);
    }

    let mut addresses = Vec::with_capacity(count);
    for _ in 0..count {
        let ip = match read_u8(src)? {
            NETCODE_ADDRESS_IPV4 => IpAddr::V4(Ipv4Addr::from(read_bytes::<4>(src)?)),
            NETCODE_ADDRESS_IPV6 => IpAddr::V6(Ipv6Addr::from(read_bytes::<16>(src)?)),
            tag => return Err(TokenError::InvalidAddressType(tag)),
        };
        let port = read_u16(src)?;
        addresses.push(SocketAddr::new(ip, port));
    }

    Ok(ServerAddresses(addresses))
}
