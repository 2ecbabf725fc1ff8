//! Radio addresses and connection addressing.

use std::fmt;

/// Length of a 64-bit address in bytes.
pub const ADDR64_LEN: usize = 8;

/// Length of a 16-bit address in bytes.
pub const ADDR16_LEN: usize = 2;

/// A 16-bit network address (`ATMY`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Addr16(pub u16);

impl Addr16 {
    /// Broadcast to every module on the PAN.
    pub const BROADCAST: Self = Self(0xffff);

    /// Marks 16-bit addressing as disabled.
    pub const UNKNOWN: Self = Self(0xfffe);

    /// Creates an address from big-endian bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; ADDR16_LEN]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }

    /// Returns the address as big-endian bytes.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; ADDR16_LEN] {
        self.0.to_be_bytes()
    }

    /// Returns true if this is the broadcast address.
    #[must_use]
    pub const fn is_broadcast(self) -> bool {
        self.0 == Self::BROADCAST.0
    }
}

impl fmt::Display for Addr16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

/// A 64-bit IEEE address (`ATSH` + `ATSL`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Addr64([u8; ADDR64_LEN]);

impl Addr64 {
    /// Broadcast to every module on the PAN.
    pub const BROADCAST: Self = Self([0, 0, 0, 0, 0, 0, 0xff, 0xff]);

    /// Creates an address from big-endian bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; ADDR64_LEN]) -> Self {
        Self(bytes)
    }

    /// Tries to create an address from a slice.
    ///
    /// Returns `None` if the slice is not exactly 8 bytes.
    #[must_use]
    pub fn try_from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; ADDR64_LEN]>::try_from(bytes).ok().map(Self)
    }

    /// Creates an address from the high (`SH`) and low (`SL`) halves.
    #[must_use]
    pub const fn from_parts(high: u32, low: u32) -> Self {
        Self::from_u64(((high as u64) << 32) | low as u64)
    }

    /// Creates an address from its integer value.
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value.to_be_bytes())
    }

    /// Returns the address as an integer.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    /// Returns the address as a byte slice.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the address as big-endian bytes.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; ADDR64_LEN] {
        self.0
    }

    /// Returns true if this is the broadcast address.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Returns the address as a hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses an address from a hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid hex or not 16 characters.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        Self::try_from_slice(&bytes).ok_or(hex::FromHexError::InvalidStringLength)
    }
}

impl fmt::Debug for Addr64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Addr64({})", self.to_hex())
    }
}

impl fmt::Display for Addr64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// The remote end of a connection.
///
/// Either half may be absent. Connection types without a remote end
/// (local AT, status frames) use the empty address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ConAddress {
    /// 16-bit network address.
    pub addr16: Option<Addr16>,
    /// 64-bit IEEE address.
    pub addr64: Option<Addr64>,
}

impl ConAddress {
    /// The empty address.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            addr16: None,
            addr64: None,
        }
    }

    /// An address with only a 16-bit part.
    #[must_use]
    pub const fn from_addr16(addr: Addr16) -> Self {
        Self {
            addr16: Some(addr),
            addr64: None,
        }
    }

    /// An address with only a 64-bit part.
    #[must_use]
    pub const fn from_addr64(addr: Addr64) -> Self {
        Self {
            addr16: None,
            addr64: Some(addr),
        }
    }

    /// Returns true if neither half is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.addr16.is_none() && self.addr64.is_none()
    }

    /// Checks whether two addresses refer to the same remote end.
    ///
    /// 64-bit addresses win when both sides carry one, then 16-bit
    /// addresses. Two empty addresses match; an empty address never
    /// matches a non-empty one.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.addr64, other.addr64) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (self.addr16, other.addr16) {
            return a == b;
        }
        self.is_empty() && other.is_empty()
    }
}

impl From<Addr16> for ConAddress {
    fn from(addr: Addr16) -> Self {
        Self::from_addr16(addr)
    }
}

impl From<Addr64> for ConAddress {
    fn from(addr: Addr64) -> Self {
        Self::from_addr64(addr)
    }
}

impl fmt::Display for ConAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.addr64, self.addr16) {
            (Some(a64), Some(a16)) => write!(f, "{a64}/{a16}"),
            (Some(a64), None) => write!(f, "{a64}"),
            (None, Some(a16)) => write!(f, "{a16}"),
            (None, None) => f.write_str("-"),
        }
    }
}
